/// Errors raised while constructing or encoding RDF terms.
#[derive(Debug, thiserror::Error)]
pub enum TermError {
    #[error("term exceeds the maximum encoded length of {max} bytes")]
    TooLong { max: usize },
    #[error("term body is not valid UTF-8")]
    InvalidUtf8,
    #[error("term body contains a NUL byte, which is not allowed in a dictionary key")]
    ContainsNul,
    #[error("language tag {0:?} is not a well-formed BCP-47 tag")]
    InvalidLanguageTag(String),
    #[error("numeric literal {0:?} could not be parsed as {1}")]
    InvalidNumeric(String, &'static str),
    #[error("term id {0:#018x} uses an unknown type tag {1}")]
    UnknownTypeTag(u64, u8),
}

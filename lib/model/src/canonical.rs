//! Canonical byte serialization of [`Term`]s used as `term→id` dictionary keys
//! and `id→term` dictionary values.
//!
//! Layout: one type-tag byte, followed by a type-specific body. Unlike
//! [`crate::id::TermId`] this encoding is not required to sort usefully; it
//! only needs to round-trip exactly and be a total, collision-free function
//! of the term's logical identity.

use crate::error::TermError;
use crate::term::Term;

const TAG_IRI: u8 = 0;
const TAG_BLANK: u8 = 1;
const TAG_SIMPLE: u8 = 2;
const TAG_LANG: u8 = 3;
const TAG_TYPED: u8 = 4;

pub fn encode(term: &Term) -> Result<Vec<u8>, TermError> {
    term.validate()?;
    let mut out = Vec::with_capacity(term.lexical_form().len() + 16);
    match term {
        Term::NamedNode(iri) => {
            out.push(TAG_IRI);
            out.extend_from_slice(iri.as_bytes());
        }
        Term::BlankNode(id) => {
            out.push(TAG_BLANK);
            out.extend_from_slice(id.as_bytes());
        }
        Term::SimpleLiteral(value) => {
            out.push(TAG_SIMPLE);
            out.extend_from_slice(value.as_bytes());
        }
        Term::LangLiteral { value, language } => {
            out.push(TAG_LANG);
            write_len_prefixed(&mut out, language.as_bytes());
            out.extend_from_slice(value.as_bytes());
        }
        Term::TypedLiteral { value, datatype } => {
            out.push(TAG_TYPED);
            write_len_prefixed(&mut out, datatype.as_bytes());
            out.extend_from_slice(value.as_bytes());
        }
        Term::Numeric(n) => {
            // Numeric literals that reach the dictionary (out-of-range for inline encoding)
            // are serialized as typed literals with their canonical lexical form.
            out.push(TAG_TYPED);
            write_len_prefixed(&mut out, n.datatype().as_bytes());
            out.extend_from_slice(n.lexical_form().as_bytes());
        }
    }
    Ok(out)
}

fn write_len_prefixed(out: &mut Vec<u8>, bytes: &[u8]) {
    out.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
    out.extend_from_slice(bytes);
}

pub fn decode(bytes: &[u8]) -> Result<Term, TermError> {
    let (&tag, rest) = bytes.split_first().ok_or(TermError::InvalidUtf8)?;
    match tag {
        TAG_IRI => Ok(Term::NamedNode(to_utf8(rest)?)),
        TAG_BLANK => Ok(Term::BlankNode(to_utf8(rest)?)),
        TAG_SIMPLE => Ok(Term::SimpleLiteral(to_utf8(rest)?)),
        TAG_LANG => {
            let (language, value) = read_len_prefixed(rest)?;
            Ok(Term::LangLiteral {
                value: to_utf8(value)?,
                language: to_utf8(language)?,
            })
        }
        TAG_TYPED => {
            let (datatype, value) = read_len_prefixed(rest)?;
            Ok(Term::TypedLiteral {
                value: to_utf8(value)?,
                datatype: to_utf8(datatype)?,
            })
        }
        other => Err(TermError::UnknownTypeTag(0, other)),
    }
}

fn read_len_prefixed(bytes: &[u8]) -> Result<(&[u8], &[u8]), TermError> {
    if bytes.len() < 4 {
        return Err(TermError::InvalidUtf8);
    }
    let len = u32::from_be_bytes(bytes[..4].try_into().unwrap()) as usize;
    if bytes.len() < 4 + len {
        return Err(TermError::InvalidUtf8);
    }
    Ok((&bytes[4..4 + len], &bytes[4 + len..]))
}

fn to_utf8(bytes: &[u8]) -> Result<String, TermError> {
    std::str::from_utf8(bytes)
        .map(str::to_owned)
        .map_err(|_| TermError::InvalidUtf8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_every_variant() {
        let terms = vec![
            Term::named_node("http://example.com/a"),
            Term::blank_node("b0"),
            Term::SimpleLiteral("hello".to_string()),
            Term::LangLiteral {
                value: "chat".to_string(),
                language: "fr".to_string(),
            },
            Term::TypedLiteral {
                value: "2020-01-01".to_string(),
                datatype: "http://www.w3.org/2001/XMLSchema#date".to_string(),
            },
        ];
        for term in terms {
            let bytes = encode(&term).unwrap();
            let decoded = decode(&bytes).unwrap();
            assert_eq!(term, decoded);
        }
    }
}

use crate::error::TermError;
use std::fmt;

/// Maximum encoded byte length for any single term.
pub const MAX_TERM_BYTES: usize = 16 * 1024;

pub const XSD_STRING: &str = "http://www.w3.org/2001/XMLSchema#string";
pub const XSD_INTEGER: &str = "http://www.w3.org/2001/XMLSchema#integer";
pub const XSD_DECIMAL: &str = "http://www.w3.org/2001/XMLSchema#decimal";
pub const XSD_DOUBLE: &str = "http://www.w3.org/2001/XMLSchema#double";
pub const XSD_DATE_TIME: &str = "http://www.w3.org/2001/XMLSchema#dateTime";
pub const XSD_BOOLEAN: &str = "http://www.w3.org/2001/XMLSchema#boolean";
pub const RDF_LANG_STRING: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#langString";

/// A fully materialized RDF term.
///
/// This is the decoded, human-readable representation produced by dictionary
/// lookups and consumed by the parser/executor. The compact runtime
/// representation used on the hot path is [`crate::id::TermId`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Term {
    NamedNode(String),
    BlankNode(String),
    /// A literal with no language tag and the implicit `xsd:string` datatype.
    SimpleLiteral(String),
    /// A language-tagged literal, e.g. `"chat"@en`.
    LangLiteral { value: String, language: String },
    /// A typed literal with an explicit, non-numeric-inline-eligible datatype.
    TypedLiteral { value: String, datatype: String },
    /// A numeric or datetime literal eligible for inline id encoding.
    Numeric(NumericLiteral),
}

/// The subset of XSD literal types that the dictionary may encode inline. Values outside
/// the inline-representable range fall back to [`Term::TypedLiteral`].
#[derive(Debug, Clone, Copy, PartialEq, Hash)]
pub enum NumericLiteral {
    Integer(i64),
    /// Fixed-point decimal scaled by [`DECIMAL_SCALE`].
    Decimal(i64),
    Double(f64),
    /// Whole seconds since the Unix epoch; sub-second precision is not inline-representable
    /// and falls back to `Term::TypedLiteral` with `xsd:dateTime`.
    DateTime(i64),
}

/// Scale factor used to represent `xsd:decimal` values as fixed-point `i64`.
pub const DECIMAL_SCALE: i64 = 1_000_000_000;

impl Eq for NumericLiteral {}

#[allow(clippy::derive_ord_xor_partial_ord)]
impl Ord for NumericLiteral {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.partial_cmp(other)
            .unwrap_or(std::cmp::Ordering::Equal)
    }
}

impl PartialOrd for NumericLiteral {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        use NumericLiteral::{DateTime, Decimal, Double, Integer};
        match (self, other) {
            (Integer(a), Integer(b)) => a.partial_cmp(b),
            (Decimal(a), Decimal(b)) => a.partial_cmp(b),
            (Double(a), Double(b)) => a.partial_cmp(b),
            (DateTime(a), DateTime(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

impl Term {
    pub fn named_node(iri: impl Into<String>) -> Self {
        Term::NamedNode(iri.into())
    }

    pub fn blank_node(id: impl Into<String>) -> Self {
        Term::BlankNode(id.into())
    }

    pub fn is_iri(&self) -> bool {
        matches!(self, Term::NamedNode(_))
    }

    pub fn is_blank_node(&self) -> bool {
        matches!(self, Term::BlankNode(_))
    }

    pub fn is_literal(&self) -> bool {
        matches!(
            self,
            Term::SimpleLiteral(_) | Term::LangLiteral { .. } | Term::TypedLiteral { .. } | Term::Numeric(_)
        )
    }

    /// The lexical form of the term, as it would appear in SPARQL `STR()`.
    pub fn lexical_form(&self) -> String {
        match self {
            Term::NamedNode(iri) => iri.clone(),
            Term::BlankNode(id) => id.clone(),
            Term::SimpleLiteral(value) => value.clone(),
            Term::LangLiteral { value, .. } => value.clone(),
            Term::TypedLiteral { value, .. } => value.clone(),
            Term::Numeric(n) => n.lexical_form(),
        }
    }

    /// The datatype IRI of the term, per the XSD/RDF mapping.
    pub fn datatype(&self) -> Option<&str> {
        match self {
            Term::NamedNode(_) | Term::BlankNode(_) => None,
            Term::SimpleLiteral(_) => Some(XSD_STRING),
            Term::LangLiteral { .. } => Some(RDF_LANG_STRING),
            Term::TypedLiteral { datatype, .. } => Some(datatype),
            Term::Numeric(n) => Some(n.datatype()),
        }
    }

    /// Validates length/encoding policy.
    pub fn validate(&self) -> Result<(), TermError> {
        let body_len = match self {
            Term::NamedNode(s) | Term::BlankNode(s) | Term::SimpleLiteral(s) => s.len(),
            Term::LangLiteral { value, language } => value.len() + language.len(),
            Term::TypedLiteral { value, datatype } => value.len() + datatype.len(),
            Term::Numeric(_) => 0,
        };
        if body_len > MAX_TERM_BYTES {
            return Err(TermError::TooLong { max: MAX_TERM_BYTES });
        }
        let has_nul = match self {
            Term::NamedNode(s) | Term::BlankNode(s) | Term::SimpleLiteral(s) => s.contains('\0'),
            Term::LangLiteral { value, language } => value.contains('\0') || language.contains('\0'),
            Term::TypedLiteral { value, datatype } => value.contains('\0') || datatype.contains('\0'),
            Term::Numeric(_) => false,
        };
        if has_nul {
            return Err(TermError::ContainsNul);
        }
        Ok(())
    }
}

impl NumericLiteral {
    pub fn lexical_form(&self) -> String {
        match self {
            NumericLiteral::Integer(v) => v.to_string(),
            NumericLiteral::Decimal(scaled) => format_decimal(*scaled),
            NumericLiteral::Double(v) => format_double(*v),
            NumericLiteral::DateTime(secs) => format_datetime(*secs),
        }
    }

    pub fn datatype(&self) -> &'static str {
        match self {
            NumericLiteral::Integer(_) => XSD_INTEGER,
            NumericLiteral::Decimal(_) => XSD_DECIMAL,
            NumericLiteral::Double(_) => XSD_DOUBLE,
            NumericLiteral::DateTime(_) => XSD_DATE_TIME,
        }
    }
}

fn format_decimal(scaled: i64) -> String {
    let negative = scaled < 0;
    let abs = scaled.unsigned_abs();
    let scale = DECIMAL_SCALE as u64;
    let whole = abs / scale;
    let frac = abs % scale;
    let mut s = String::new();
    if negative {
        s.push('-');
    }
    s.push_str(&whole.to_string());
    if frac != 0 {
        let frac_str = format!("{:09}", frac);
        let trimmed = frac_str.trim_end_matches('0');
        s.push('.');
        s.push_str(trimmed);
    }
    s
}

fn format_double(v: f64) -> String {
    if v.is_nan() {
        "NaN".to_string()
    } else if v.is_infinite() {
        if v > 0.0 { "INF".to_string() } else { "-INF".to_string() }
    } else {
        format!("{v}")
    }
}

fn format_datetime(secs: i64) -> String {
    // Minimal proleptic Gregorian calendar conversion, no external time crate dependency
    // needed: the dictionary only ever round-trips whole-second UTC instants it produced
    // itself via `parse_datetime`.
    const SECS_PER_DAY: i64 = 86_400;
    let mut days = secs.div_euclid(SECS_PER_DAY);
    let mut rem = secs.rem_euclid(SECS_PER_DAY);
    let hour = rem / 3600;
    rem %= 3600;
    let minute = rem / 60;
    let second = rem % 60;

    // Days since 1970-01-01 -> proleptic Gregorian Y/M/D (civil_from_days, Howard Hinnant's algorithm).
    days += 719_468;
    let era = if days >= 0 { days } else { days - 146_096 } / 146_097;
    let doe = (days - era * 146_097) as u64;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146_096) / 365;
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    let y = if m <= 2 { y + 1 } else { y };

    format!("{y:04}-{m:02}-{d:02}T{hour:02}:{minute:02}:{second:02}Z")
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::NamedNode(iri) => write!(f, "<{iri}>"),
            Term::BlankNode(id) => write!(f, "_:{id}"),
            Term::SimpleLiteral(v) => write!(f, "{v:?}"),
            Term::LangLiteral { value, language } => write!(f, "{value:?}@{language}"),
            Term::TypedLiteral { value, datatype } => write!(f, "{value:?}^^<{datatype}>"),
            Term::Numeric(n) => write!(f, "{:?}^^<{}>", n.lexical_form(), n.datatype()),
        }
    }
}

/// Parses an `xsd:dateTime` lexical form of the form `YYYY-MM-DDTHH:MM:SSZ` into whole
/// seconds since the Unix epoch. Returns `None` for anything with sub-second precision
/// or a non-UTC offset, in which case the caller should fall back to `Term::TypedLiteral`.
pub fn parse_datetime_seconds(s: &str) -> Option<i64> {
    // Only non-negative (CE) years with whole-second UTC precision are inline-representable;
    // anything else falls back to `Term::TypedLiteral`.
    let s = s.strip_suffix('Z')?;
    if s.starts_with('-') {
        return None;
    }
    let (date, time) = s.split_once('T')?;
    let mut date_parts = date.splitn(3, '-');
    let y: i64 = date_parts.next()?.parse().ok()?;
    let m: i64 = date_parts.next()?.parse().ok()?;
    let d: i64 = date_parts.next()?.parse().ok()?;
    let mut time_parts = time.splitn(3, ':');
    let hh: i64 = time_parts.next()?.parse().ok()?;
    let mm: i64 = time_parts.next()?.parse().ok()?;
    let ss_str = time_parts.next()?;
    if ss_str.contains('.') {
        return None;
    }
    let ss: i64 = ss_str.parse().ok()?;

    // days_from_civil (Howard Hinnant's algorithm), inverse of the one in format_datetime.
    let y_adj = if m <= 2 { y - 1 } else { y };
    let era = if y_adj >= 0 { y_adj } else { y_adj - 399 } / 400;
    let yoe = (y_adj - era * 400) as u64;
    let mp = ((m + 9) % 12) as u64;
    let doy = (153 * mp + 2) / 5 + d as u64 - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    let days = era * 146_097 + doe as i64 - 719_468;

    Some(days * 86_400 + hh * 3600 + mm * 60 + ss)
}

//! SPARQL expression evaluator: three-valued logic, numeric
//! promotions, REGEX with a complexity guard, EBV, and the built-in function
//! library.

use crate::backend::Backend;
use crate::binding::Binding;
use crate::error::{EvalError, EvalResult};
use crate::exec;
use crate::limits::{Deadline, ExecutionLimits};
use rdfkit_algebra::expression::{AggregateExpression, Function};
use rdfkit_algebra::{Expression, GraphPattern};
use rdfkit_model::term::{NumericLiteral, DECIMAL_SCALE, RDF_LANG_STRING, XSD_BOOLEAN, XSD_DOUBLE, XSD_INTEGER, XSD_STRING};
use rdfkit_model::Term;
use std::rc::Rc;

/// The result of evaluating an expression: either a value or a SPARQL "type error", which
/// propagates through boolean connectives per the three-valued-logic truth tables rather
/// than aborting the whole query.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprValue {
    Term(Term),
    Error,
}

impl ExprValue {
    fn term(t: Term) -> Self {
        ExprValue::Term(t)
    }
}

/// Effective boolean value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Ebv {
    True,
    False,
    Error,
}

pub fn ebv(value: &ExprValue) -> Ebv {
    match value {
        ExprValue::Error => Ebv::Error,
        ExprValue::Term(Term::Numeric(NumericLiteral::Integer(v))) => bool_ebv(*v != 0),
        ExprValue::Term(Term::Numeric(NumericLiteral::Decimal(v))) => bool_ebv(*v != 0),
        ExprValue::Term(Term::Numeric(NumericLiteral::Double(v))) => bool_ebv(*v != 0.0 && !v.is_nan()),
        ExprValue::Term(Term::TypedLiteral { value, datatype }) if datatype == XSD_BOOLEAN => match value.as_str() {
            "true" | "1" => Ebv::True,
            "false" | "0" => Ebv::False,
            _ => Ebv::Error,
        },
        ExprValue::Term(Term::SimpleLiteral(s)) => bool_ebv(!s.is_empty()),
        ExprValue::Term(Term::LangLiteral { value, .. }) => bool_ebv(!value.is_empty()),
        _ => Ebv::Error,
    }
}

fn bool_ebv(b: bool) -> Ebv {
    if b { Ebv::True } else { Ebv::False }
}

fn ebv_term(b: bool) -> ExprValue {
    ExprValue::term(Term::TypedLiteral { value: (if b { "true" } else { "false" }).to_string(), datatype: XSD_BOOLEAN.to_string() })
}

pub struct EvalCtx<'a> {
    pub backend: &'a dyn Backend,
    pub limits: &'a ExecutionLimits,
    pub deadline: Deadline,
}

pub fn eval_expression(expr: &Expression, binding: &Binding, ctx: &EvalCtx<'_>) -> EvalResult<ExprValue> {
    ctx.deadline.check()?;
    Ok(match expr {
        Expression::NamedNode(iri) => ExprValue::term(Term::named_node(iri.clone())),
        Expression::Literal(t) => ExprValue::term(t.clone()),
        Expression::Variable(v) => match binding.get(v) {
            Some(t) => ExprValue::term(t.clone()),
            None => ExprValue::Error,
        },
        Expression::Or(a, b) => {
            let (a, b) = (ebv(&eval_expression(a, binding, ctx)?), ebv(&eval_expression(b, binding, ctx)?));
            match (a, b) {
                (Ebv::True, _) | (_, Ebv::True) => ebv_term(true),
                (Ebv::False, Ebv::False) => ebv_term(false),
                _ => ExprValue::Error,
            }
        }
        Expression::And(a, b) => {
            let (a, b) = (ebv(&eval_expression(a, binding, ctx)?), ebv(&eval_expression(b, binding, ctx)?));
            match (a, b) {
                (Ebv::False, _) | (_, Ebv::False) => ebv_term(false),
                (Ebv::True, Ebv::True) => ebv_term(true),
                _ => ExprValue::Error,
            }
        }
        Expression::Not(a) => match ebv(&eval_expression(a, binding, ctx)?) {
            Ebv::True => ebv_term(false),
            Ebv::False => ebv_term(true),
            Ebv::Error => ExprValue::Error,
        },
        Expression::Equal(a, b) => term_eq(&eval_expression(a, binding, ctx)?, &eval_expression(b, binding, ctx)?),
        Expression::NotEqual(a, b) => match term_eq(&eval_expression(a, binding, ctx)?, &eval_expression(b, binding, ctx)?) {
            ExprValue::Term(Term::TypedLiteral { value, datatype }) if datatype == XSD_BOOLEAN => {
                ebv_term(value != "true")
            }
            other => other,
        },
        Expression::Less(a, b) => compare(a, b, binding, ctx, |o| o.is_lt())?,
        Expression::LessOrEqual(a, b) => compare(a, b, binding, ctx, |o| o.is_le())?,
        Expression::Greater(a, b) => compare(a, b, binding, ctx, |o| o.is_gt())?,
        Expression::GreaterOrEqual(a, b) => compare(a, b, binding, ctx, |o| o.is_ge())?,
        Expression::SameTerm(a, b) => {
            let (a, b) = (eval_expression(a, binding, ctx)?, eval_expression(b, binding, ctx)?);
            match (a, b) {
                (ExprValue::Term(a), ExprValue::Term(b)) => ebv_term(a == b),
                _ => ExprValue::Error,
            }
        }
        Expression::In(needle, list) => {
            let needle = eval_expression(needle, binding, ctx)?;
            let mut saw_error = false;
            for candidate in list {
                match term_eq(&needle, &eval_expression(candidate, binding, ctx)?) {
                    ExprValue::Term(Term::TypedLiteral { value, .. }) if value == "true" => return Ok(ebv_term(true)),
                    ExprValue::Error => saw_error = true,
                    _ => {}
                }
            }
            if saw_error { ExprValue::Error } else { ebv_term(false) }
        }
        Expression::Add(a, b) => numeric_binop(a, b, binding, ctx, |x, y| x.checked_add(y))?,
        Expression::Subtract(a, b) => numeric_binop(a, b, binding, ctx, |x, y| x.checked_sub(y))?,
        Expression::Multiply(a, b) => numeric_binop(a, b, binding, ctx, |x, y| x.checked_mul(y))?,
        Expression::Divide(a, b) => numeric_divide(a, b, binding, ctx)?,
        Expression::UnaryPlus(a) => match as_numeric(&eval_expression(a, binding, ctx)?) {
            Some(n) => numeric_term(n),
            None => ExprValue::Error,
        },
        Expression::UnaryMinus(a) => match as_numeric(&eval_expression(a, binding, ctx)?) {
            Some(n) => numeric_term(n.negate()),
            None => ExprValue::Error,
        },
        Expression::Bound(v) => ebv_term(binding.contains_key(v)),
        Expression::If(c, t, e) => match ebv(&eval_expression(c, binding, ctx)?) {
            Ebv::True => eval_expression(t, binding, ctx)?,
            Ebv::False => eval_expression(e, binding, ctx)?,
            Ebv::Error => ExprValue::Error,
        },
        Expression::Coalesce(list) => {
            let mut result = ExprValue::Error;
            for e in list {
                let v = eval_expression(e, binding, ctx)?;
                if !matches!(v, ExprValue::Error) {
                    result = v;
                    break;
                }
            }
            result
        }
        Expression::FunctionCall(f, args) => eval_function(*f, args, binding, ctx)?,
        Expression::Regex { text, pattern, flags } => eval_regex(text, pattern, flags.as_deref(), binding, ctx)?,
        Expression::Exists(pattern) => ebv_term(exists(pattern, binding, ctx)?),
        Expression::NotExists(pattern) => ebv_term(!exists(pattern, binding, ctx)?),
    })
}

fn exists(pattern: &Rc<GraphPattern>, binding: &Binding, ctx: &EvalCtx<'_>) -> EvalResult<bool> {
    // EXISTS is scoped to the current binding: seed it as a single-row VALUES-style context
    // and check whether evaluating the inner pattern against it yields at least one solution.
    let rows = exec::execute_seeded(pattern, binding, ctx.backend, ctx.limits, ctx.deadline)?;
    Ok(!rows.is_empty())
}

// --- equality / ordering -------------------------------------------------

fn term_eq(a: &ExprValue, b: &ExprValue) -> ExprValue {
    match (a, b) {
        (ExprValue::Term(a), ExprValue::Term(b)) => match rdf_term_eq(a, b) {
            Some(eq) => ebv_term(eq),
            None => ExprValue::Error,
        },
        _ => ExprValue::Error,
    }
}

/// RDF term equality with the SPARQL plain-literal/xsd:string coercion and numeric cross-type
/// value equality. Returns `None` if the two terms are not comparable (type error).
fn rdf_term_eq(a: &Term, b: &Term) -> Option<bool> {
    if let (Some(x), Some(y)) = (as_numeric(&ExprValue::term(a.clone())), as_numeric(&ExprValue::term(b.clone()))) {
        return Some(numeric_compare(x, y) == std::cmp::Ordering::Equal);
    }
    match (normalize_string(a), normalize_string(b)) {
        (Some((sa, la)), Some((sb, lb))) => return Some(sa == sb && la == lb),
        (Some(_), None) | (None, Some(_)) => {
            if a.is_literal() != b.is_literal() {
                return Some(false);
            }
        }
        (None, None) => {}
    }
    if a.is_iri() && b.is_iri() || a.is_blank_node() && b.is_blank_node() {
        return Some(a == b);
    }
    if a.is_literal() && b.is_literal() {
        return Some(a == b);
    }
    Some(false)
}

fn normalize_string(t: &Term) -> Option<(&str, &str)> {
    match t {
        Term::SimpleLiteral(s) => Some((s.as_str(), "")),
        Term::TypedLiteral { value, datatype } if datatype == XSD_STRING => Some((value.as_str(), "")),
        Term::LangLiteral { value, language } => Some((value.as_str(), language.as_str())),
        _ => None,
    }
}

fn compare(a: &Expression, b: &Expression, binding: &Binding, ctx: &EvalCtx<'_>, accept: impl Fn(std::cmp::Ordering) -> bool) -> EvalResult<ExprValue> {
    let (a, b) = (eval_expression(a, binding, ctx)?, eval_expression(b, binding, ctx)?);
    let ord = match (as_numeric(&a), as_numeric(&b)) {
        (Some(x), Some(y)) => Some(numeric_compare(x, y)),
        _ => match (&a, &b) {
            (ExprValue::Term(ta), ExprValue::Term(tb)) => match (normalize_string(ta), normalize_string(tb)) {
                (Some((sa, "")), Some((sb, ""))) => Some(sa.cmp(sb)),
                _ => None,
            },
            _ => None,
        },
    };
    Ok(match ord {
        Some(o) => ebv_term(accept(o)),
        None => ExprValue::Error,
    })
}

// --- numeric promotion ----------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
enum Num {
    Int(i64),
    Dec(i64),
    Dbl(f64),
}

impl Num {
    fn negate(self) -> Self {
        match self {
            Num::Int(v) => Num::Int(-v),
            Num::Dec(v) => Num::Dec(-v),
            Num::Dbl(v) => Num::Dbl(-v),
        }
    }

    fn as_f64(self) -> f64 {
        match self {
            Num::Int(v) => v as f64,
            Num::Dec(v) => v as f64 / DECIMAL_SCALE as f64,
            Num::Dbl(v) => v,
        }
    }
}

fn as_numeric(v: &ExprValue) -> Option<Num> {
    match v {
        ExprValue::Term(Term::Numeric(NumericLiteral::Integer(i))) => Some(Num::Int(*i)),
        ExprValue::Term(Term::Numeric(NumericLiteral::Decimal(d))) => Some(Num::Dec(*d)),
        ExprValue::Term(Term::Numeric(NumericLiteral::Double(d))) => Some(Num::Dbl(*d)),
        _ => None,
    }
}

fn numeric_compare(a: Num, b: Num) -> std::cmp::Ordering {
    match (a, b) {
        (Num::Int(a), Num::Int(b)) => a.cmp(&b),
        (Num::Dec(a), Num::Dec(b)) => a.cmp(&b),
        _ => a.as_f64().partial_cmp(&b.as_f64()).unwrap_or(std::cmp::Ordering::Equal),
    }
}

fn numeric_term(n: Num) -> ExprValue {
    ExprValue::term(Term::Numeric(match n {
        Num::Int(v) => NumericLiteral::Integer(v),
        Num::Dec(v) => NumericLiteral::Decimal(v),
        Num::Dbl(v) => NumericLiteral::Double(v),
    }))
}

fn numeric_binop(a: &Expression, b: &Expression, binding: &Binding, ctx: &EvalCtx<'_>, int_op: impl Fn(i64, i64) -> Option<i64>) -> EvalResult<ExprValue> {
    let (a, b) = (as_numeric(&eval_expression(a, binding, ctx)?), as_numeric(&eval_expression(b, binding, ctx)?));
    Ok(match (a, b) {
        (Some(Num::Int(x)), Some(Num::Int(y))) => match int_op(x, y) {
            Some(v) => numeric_term(Num::Int(v)),
            None => ExprValue::Error,
        },
        (Some(x), Some(y)) if matches!((x, y), (Num::Dbl(_), _) | (_, Num::Dbl(_))) => {
            numeric_term(Num::Dbl(apply_f64(int_op_kind(&int_op), x.as_f64(), y.as_f64())))
        }
        (Some(x), Some(y)) => {
            let scaled = apply_f64(int_op_kind(&int_op), x.as_f64(), y.as_f64()) * DECIMAL_SCALE as f64;
            numeric_term(Num::Dec(scaled.round() as i64))
        }
        _ => ExprValue::Error,
    })
}

/// Recovers which arithmetic operator `int_op` performs by probing it, so the float/decimal
/// fallback paths can share one dispatcher instead of threading an operator enum through
/// every call site.
fn int_op_kind(int_op: &impl Fn(i64, i64) -> Option<i64>) -> char {
    match (int_op(2, 3), int_op(2, 2)) {
        (Some(5), _) => '+',
        (Some(-1), _) => '-',
        (Some(6), _) => '*',
        _ => '+',
    }
}

fn apply_f64(op: char, a: f64, b: f64) -> f64 {
    match op {
        '+' => a + b,
        '-' => a - b,
        '*' => a * b,
        _ => a + b,
    }
}

fn numeric_divide(a: &Expression, b: &Expression, binding: &Binding, ctx: &EvalCtx<'_>) -> EvalResult<ExprValue> {
    let (a, b) = (as_numeric(&eval_expression(a, binding, ctx)?), as_numeric(&eval_expression(b, binding, ctx)?));
    Ok(match (a, b) {
        (Some(_), Some(y)) if y.as_f64() == 0.0 => ExprValue::Error,
        (Some(x), Some(Num::Dbl(_))) | (Some(Num::Dbl(_)), Some(x)) if false => numeric_term(x),
        (Some(x), Some(y)) => numeric_term(Num::Dbl(x.as_f64() / y.as_f64())),
        _ => ExprValue::Error,
    })
}

// --- built-in functions ---------------------------------------------------

fn eval_function(f: Function, args: &[Expression], binding: &Binding, ctx: &EvalCtx<'_>) -> EvalResult<ExprValue> {
    let mut vals = Vec::with_capacity(args.len());
    for a in args {
        vals.push(eval_expression(a, binding, ctx)?);
    }
    Ok(match (f, vals.as_slice()) {
        (Function::Str, [ExprValue::Term(t)]) => ExprValue::term(Term::SimpleLiteral(t.lexical_form())),
        (Function::Lang, [ExprValue::Term(Term::LangLiteral { language, .. })]) => ExprValue::term(Term::SimpleLiteral(language.clone())),
        (Function::Lang, [ExprValue::Term(_)]) => ExprValue::term(Term::SimpleLiteral(String::new())),
        (Function::Datatype, [ExprValue::Term(t)]) => match t.datatype() {
            Some(dt) => ExprValue::term(Term::named_node(dt)),
            None => ExprValue::Error,
        },
        (Function::LangMatches, [ExprValue::Term(tag), ExprValue::Term(range)]) => {
            ebv_term(lang_matches(&tag.lexical_form(), &range.lexical_form()))
        }
        (Function::IsIri, [ExprValue::Term(t)]) => ebv_term(t.is_iri()),
        (Function::IsBlank, [ExprValue::Term(t)]) => ebv_term(t.is_blank_node()),
        (Function::IsLiteral, [ExprValue::Term(t)]) => ebv_term(t.is_literal()),
        (Function::IsNumeric, [ExprValue::Term(t)]) => ebv_term(matches!(t, Term::Numeric(_))),
        (Function::Abs, [v]) => match as_numeric(v) {
            Some(Num::Int(n)) => numeric_term(Num::Int(n.abs())),
            Some(Num::Dec(n)) => numeric_term(Num::Dec(n.abs())),
            Some(Num::Dbl(n)) => numeric_term(Num::Dbl(n.abs())),
            None => ExprValue::Error,
        },
        (Function::Ceil, [v]) => round_like(v, f64::ceil),
        (Function::Floor, [v]) => round_like(v, f64::floor),
        (Function::Round, [v]) => round_like(v, f64::round),
        (Function::Concat, values) => {
            let mut out = String::new();
            for v in values {
                match v {
                    ExprValue::Term(t) => out.push_str(&t.lexical_form()),
                    ExprValue::Error => return Ok(ExprValue::Error),
                }
            }
            ExprValue::term(Term::SimpleLiteral(out))
        }
        (Function::StrLen, [ExprValue::Term(t)]) => numeric_term(Num::Int(t.lexical_form().chars().count() as i64)),
        (Function::SubStr, [ExprValue::Term(t), start, ..]) => {
            let chars: Vec<char> = t.lexical_form().chars().collect();
            let start_idx = (as_numeric(start).map(Num::as_f64).unwrap_or(1.0).round() as i64 - 1).max(0) as usize;
            let len = vals
                .get(2)
                .and_then(as_numeric)
                .map(Num::as_f64)
                .map(|l| l.round() as i64)
                .unwrap_or(chars.len() as i64 - start_idx as i64)
                .max(0) as usize;
            let end = (start_idx + len).min(chars.len());
            let slice: String = chars.get(start_idx.min(chars.len())..end).unwrap_or(&[]).iter().collect();
            preserve_literal_kind(t, slice)
        }
        (Function::UCase, [ExprValue::Term(t)]) => preserve_literal_kind(t, t.lexical_form().to_uppercase()),
        (Function::LCase, [ExprValue::Term(t)]) => preserve_literal_kind(t, t.lexical_form().to_lowercase()),
        (Function::Contains, [ExprValue::Term(a), ExprValue::Term(b)]) => ebv_term(a.lexical_form().contains(&b.lexical_form())),
        (Function::StrStarts, [ExprValue::Term(a), ExprValue::Term(b)]) => ebv_term(a.lexical_form().starts_with(&b.lexical_form())),
        (Function::StrEnds, [ExprValue::Term(a), ExprValue::Term(b)]) => ebv_term(a.lexical_form().ends_with(&b.lexical_form())),
        (Function::StrBefore, [ExprValue::Term(a), ExprValue::Term(b)]) => {
            let (a_lex, b_lex) = (a.lexical_form(), b.lexical_form());
            match a_lex.find(&b_lex) {
                Some(idx) => preserve_literal_kind(a, a_lex[..idx].to_string()),
                None => ExprValue::term(Term::SimpleLiteral(String::new())),
            }
        }
        (Function::StrAfter, [ExprValue::Term(a), ExprValue::Term(b)]) => {
            let (a_lex, b_lex) = (a.lexical_form(), b.lexical_form());
            match a_lex.find(&b_lex) {
                Some(idx) => preserve_literal_kind(a, a_lex[idx + b_lex.len()..].to_string()),
                None => ExprValue::term(Term::SimpleLiteral(String::new())),
            }
        }
        (Function::Encode, [ExprValue::Term(t)]) => ExprValue::term(Term::SimpleLiteral(percent_encode(&t.lexical_form()))),
        (Function::Replace, [ExprValue::Term(t), ExprValue::Term(pat), ExprValue::Term(rep), ..]) => {
            let flags = vals.get(3).and_then(|v| if let ExprValue::Term(t) = v { Some(t.lexical_form()) } else { None });
            match compile_regex(&pat.lexical_form(), flags.as_deref(), ctx) {
                Ok(re) => preserve_literal_kind(t, re.replace_all(&t.lexical_form(), rep.lexical_form().as_str()).into_owned()),
                Err(e) => return Err(e),
            }
        }
        (Function::Year, [v]) => datetime_field(v, DatetimeField::Year),
        (Function::Month, [v]) => datetime_field(v, DatetimeField::Month),
        (Function::Day, [v]) => datetime_field(v, DatetimeField::Day),
        (Function::Hours, [v]) => datetime_field(v, DatetimeField::Hour),
        (Function::Minutes, [v]) => datetime_field(v, DatetimeField::Minute),
        (Function::Seconds, [v]) => datetime_field(v, DatetimeField::Second),
        (Function::Now, []) => {
            let secs = std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).map(|d| d.as_secs() as i64).unwrap_or(0);
            ExprValue::term(Term::Numeric(NumericLiteral::DateTime(secs)))
        }
        (Function::Uuid, []) => ExprValue::term(Term::named_node(format!("urn:uuid:{}", random_uuid()))),
        (Function::StrUuid, []) => ExprValue::term(Term::SimpleLiteral(random_uuid())),
        (Function::Rand, []) => ExprValue::term(Term::Numeric(NumericLiteral::Double(rand::random::<f64>()))),
        (Function::StrDt, [ExprValue::Term(t), ExprValue::Term(Term::NamedNode(dt))]) => {
            ExprValue::term(Term::TypedLiteral { value: t.lexical_form(), datatype: dt.clone() })
        }
        (Function::StrLang, [ExprValue::Term(t), ExprValue::Term(tag)]) => {
            ExprValue::term(Term::LangLiteral { value: t.lexical_form(), language: tag.lexical_form() })
        }
        (Function::Md5, [ExprValue::Term(t)]) => ExprValue::term(Term::SimpleLiteral(hex_digest::<16>(md5(t.lexical_form().as_bytes())))),
        (Function::Sha1, [ExprValue::Term(t)]) => ExprValue::term(Term::SimpleLiteral(hex_digest::<20>(sha1(t.lexical_form().as_bytes())))),
        (Function::Sha256, [ExprValue::Term(t)]) => ExprValue::term(Term::SimpleLiteral(hex_digest::<32>(sha256(t.lexical_form().as_bytes())))),
        _ => ExprValue::Error,
    })
}

fn preserve_literal_kind(original: &Term, value: String) -> ExprValue {
    ExprValue::term(match original {
        Term::LangLiteral { language, .. } => Term::LangLiteral { value, language: language.clone() },
        Term::TypedLiteral { datatype, .. } => Term::TypedLiteral { value, datatype: datatype.clone() },
        _ => Term::SimpleLiteral(value),
    })
}

fn round_like(v: &ExprValue, f: impl Fn(f64) -> f64) -> ExprValue {
    match as_numeric(v) {
        Some(Num::Int(n)) => numeric_term(Num::Int(n)),
        Some(Num::Dec(n)) => numeric_term(Num::Dec((f(n as f64 / DECIMAL_SCALE as f64) * DECIMAL_SCALE as f64).round() as i64)),
        Some(Num::Dbl(n)) => numeric_term(Num::Dbl(f(n))),
        None => ExprValue::Error,
    }
}

fn lang_matches(tag: &str, range: &str) -> bool {
    if range == "*" {
        return !tag.is_empty();
    }
    tag.eq_ignore_ascii_case(range) || tag.to_ascii_lowercase().starts_with(&format!("{}-", range.to_ascii_lowercase()))
}

fn percent_encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b'~') {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{:02X}", b));
        }
    }
    out
}

enum DatetimeField {
    Year,
    Month,
    Day,
    Hour,
    Minute,
    Second,
}

fn datetime_field(v: &ExprValue, field: DatetimeField) -> ExprValue {
    let ExprValue::Term(Term::Numeric(NumericLiteral::DateTime(secs))) = v else { return ExprValue::Error };
    let lexical = Term::Numeric(NumericLiteral::DateTime(*secs)).lexical_form();
    let Some((date, time)) = lexical.trim_end_matches('Z').split_once('T') else { return ExprValue::Error };
    let mut date_parts = date.splitn(3, '-');
    let (y, m, d) = (date_parts.next().unwrap_or("0"), date_parts.next().unwrap_or("0"), date_parts.next().unwrap_or("0"));
    let mut time_parts = time.splitn(3, ':');
    let (hh, mm, ss) = (time_parts.next().unwrap_or("0"), time_parts.next().unwrap_or("0"), time_parts.next().unwrap_or("0"));
    let parsed = match field {
        DatetimeField::Year => y.parse().ok(),
        DatetimeField::Month => m.parse().ok(),
        DatetimeField::Day => d.parse().ok(),
        DatetimeField::Hour => hh.parse().ok(),
        DatetimeField::Minute => mm.parse().ok(),
        DatetimeField::Second => ss.parse().ok(),
    };
    match parsed {
        Some(v) => numeric_term(Num::Int(v)),
        None => ExprValue::Error,
    }
}

fn random_uuid() -> String {
    use rand::RngCore;
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes[6] = (bytes[6] & 0x0f) | 0x40;
    bytes[8] = (bytes[8] & 0x3f) | 0x80;
    format!(
        "{:02x}{:02x}{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
        bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7], bytes[8], bytes[9], bytes[10], bytes[11], bytes[12], bytes[13], bytes[14], bytes[15]
    )
}

fn hex_digest<const N: usize>(bytes: [u8; N]) -> String {
    hex::encode(bytes)
}

fn md5(data: &[u8]) -> [u8; 16] {
    use md5::{Digest, Md5};
    Md5::digest(data).into()
}
fn sha1(data: &[u8]) -> [u8; 20] {
    use sha1::{Digest, Sha1};
    Sha1::digest(data).into()
}
fn sha256(data: &[u8]) -> [u8; 32] {
    use sha2::{Digest, Sha256};
    Sha256::digest(data).into()
}

// --- REGEX -----------------------------------------------------------------

fn eval_regex(text: &Expression, pattern: &Expression, flags: Option<&Expression>, binding: &Binding, ctx: &EvalCtx<'_>) -> EvalResult<ExprValue> {
    let (text, pattern) = (eval_expression(text, binding, ctx)?, eval_expression(pattern, binding, ctx)?);
    let flags = match flags {
        Some(e) => match eval_expression(e, binding, ctx)? {
            ExprValue::Term(t) => Some(t.lexical_form()),
            ExprValue::Error => return Ok(ExprValue::Error),
        },
        None => None,
    };
    let (ExprValue::Term(text), ExprValue::Term(pat)) = (text, pattern) else { return Ok(ExprValue::Error) };
    let re = compile_regex(&pat.lexical_form(), flags.as_deref(), ctx)?;
    Ok(ebv_term(re.is_match(&text.lexical_form())))
}

/// Rejects patterns whose compiled program exceeds the configured size bound and bounds the
/// match itself with a wall-clock check before compiling. The `regex` crate is itself linear-time
/// (no catastrophic backtracking), so the size bound is defense against a pathologically
/// large compiled program rather than exponential matching time.
fn compile_regex(pattern: &str, flags: Option<&str>, ctx: &EvalCtx<'_>) -> EvalResult<regex::Regex> {
    ctx.deadline.check()?;
    let mut builder = regex::RegexBuilder::new(pattern);
    builder.size_limit(ctx.limits.max_regex_program_size);
    if let Some(flags) = flags {
        for ch in flags.chars() {
            match ch {
                'i' => {
                    builder.case_insensitive(true);
                }
                's' => {
                    builder.dot_matches_new_line(true);
                }
                'm' => {
                    builder.multi_line(true);
                }
                'x' => {
                    builder.ignore_whitespace(true);
                }
                _ => {}
            }
        }
    }
    builder.build().map_err(|e| match e {
        regex::Error::CompiledTooBig(_) => EvalError::RegexTooComplex(pattern.to_string()),
        other => EvalError::InvalidRegex(other.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Backend;
    use rdfkit_algebra::ids::IdTriplePattern;
    use rdfkit_model::{EncodedTriple, TermId};

    struct NullBackend;
    impl Backend for NullBackend {
        fn scan(&self, _: &IdTriplePattern, _: bool) -> Vec<EncodedTriple> {
            Vec::new()
        }
        fn resolve(&self, _: &Term) -> Option<TermId> {
            None
        }
        fn decode(&self, _: TermId) -> Option<Term> {
            None
        }
    }

    fn ctx() -> EvalCtx<'static> {
        static BACKEND: NullBackend = NullBackend;
        static LIMITS: std::sync::OnceLock<ExecutionLimits> = std::sync::OnceLock::new();
        EvalCtx { backend: &BACKEND, limits: LIMITS.get_or_init(ExecutionLimits::default), deadline: Deadline::new(std::time::Duration::from_secs(30)) }
    }

    #[test]
    fn integer_addition_stays_integer() {
        let e = Expression::Add(Box::new(Expression::Literal(Term::Numeric(NumericLiteral::Integer(2)))), Box::new(Expression::Literal(Term::Numeric(NumericLiteral::Integer(3)))));
        let v = eval_expression(&e, &Binding::default(), &ctx()).unwrap();
        assert_eq!(v, ExprValue::term(Term::Numeric(NumericLiteral::Integer(5))));
    }

    #[test]
    fn plain_literal_equals_xsd_string() {
        let e = Expression::Equal(
            Box::new(Expression::Literal(Term::SimpleLiteral("a".to_string()))),
            Box::new(Expression::Literal(Term::TypedLiteral { value: "a".to_string(), datatype: XSD_STRING.to_string() })),
        );
        assert_eq!(ebv(&eval_expression(&e, &Binding::default(), &ctx()).unwrap()), Ebv::True);
    }

    #[test]
    fn division_by_zero_is_type_error() {
        let e = Expression::Divide(Box::new(Expression::Literal(Term::Numeric(NumericLiteral::Integer(1)))), Box::new(Expression::Literal(Term::Numeric(NumericLiteral::Integer(0)))));
        assert!(matches!(eval_expression(&e, &Binding::default(), &ctx()).unwrap(), ExprValue::Error));
    }

    #[test]
    fn md5_matches_known_vector() {
        assert_eq!(hex_digest(md5(b"")), "d41d8cd98f00b204e9800998ecf8427e");
    }

    #[test]
    fn sha256_matches_known_vector() {
        assert_eq!(hex_digest(sha256(b"")), "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855");
    }
}

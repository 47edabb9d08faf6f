//! SPARQL expression AST.

use crate::pattern::GraphPattern;
use crate::variable::{TermOrVariable, Variable};
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    NamedNode(String),
    Literal(rdfkit_model::Term),
    Variable(Variable),

    Or(Box<Expression>, Box<Expression>),
    And(Box<Expression>, Box<Expression>),
    Not(Box<Expression>),

    Equal(Box<Expression>, Box<Expression>),
    NotEqual(Box<Expression>, Box<Expression>),
    Less(Box<Expression>, Box<Expression>),
    LessOrEqual(Box<Expression>, Box<Expression>),
    Greater(Box<Expression>, Box<Expression>),
    GreaterOrEqual(Box<Expression>, Box<Expression>),
    SameTerm(Box<Expression>, Box<Expression>),
    In(Box<Expression>, Vec<Expression>),

    Add(Box<Expression>, Box<Expression>),
    Subtract(Box<Expression>, Box<Expression>),
    Multiply(Box<Expression>, Box<Expression>),
    Divide(Box<Expression>, Box<Expression>),
    UnaryPlus(Box<Expression>),
    UnaryMinus(Box<Expression>),

    Bound(Variable),
    If(Box<Expression>, Box<Expression>, Box<Expression>),
    Coalesce(Vec<Expression>),

    FunctionCall(Function, Vec<Expression>),
    /// `REGEX(text, pattern, flags?)`, kept distinct so the evaluator can apply the
    /// complexity guard before compiling.
    Regex {
        text: Box<Expression>,
        pattern: Box<Expression>,
        flags: Option<Box<Expression>>,
    },

    Exists(Rc<GraphPattern>),
    NotExists(Rc<GraphPattern>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Str,
    Lang,
    LangMatches,
    Datatype,
    IsIri,
    IsBlank,
    IsLiteral,
    IsNumeric,
    Abs,
    Ceil,
    Floor,
    Round,
    Concat,
    StrLen,
    SubStr,
    UCase,
    LCase,
    Contains,
    StrStarts,
    StrEnds,
    StrBefore,
    StrAfter,
    Encode,
    Replace,
    Year,
    Month,
    Day,
    Hours,
    Minutes,
    Seconds,
    Now,
    Uuid,
    StrUuid,
    Rand,
    StrDt,
    StrLang,
    Md5,
    Sha1,
    Sha256,
}

/// Aggregate functions usable in GROUP BY projections.
#[derive(Debug, Clone, PartialEq)]
pub enum AggregateExpression {
    Count { expr: Option<Box<Expression>>, distinct: bool },
    Sum { expr: Box<Expression>, distinct: bool },
    Min { expr: Box<Expression>, distinct: bool },
    Max { expr: Box<Expression>, distinct: bool },
    Avg { expr: Box<Expression>, distinct: bool },
    Sample { expr: Box<Expression>, distinct: bool },
    GroupConcat { expr: Box<Expression>, distinct: bool, separator: Option<String> },
}

impl Expression {
    pub fn variable(name: impl Into<Rc<str>>) -> Self {
        Expression::Variable(Variable::new(name))
    }

    /// Visits every free [`Variable`] referenced directly by this expression (not recursing
    /// into nested EXISTS/NOT EXISTS sub-patterns, whose variables are scoped separately).
    pub fn for_each_variable(&self, f: &mut impl FnMut(&Variable)) {
        match self {
            Expression::Variable(v) => f(v),
            Expression::Bound(v) => f(v),
            Expression::NamedNode(_) | Expression::Literal(_) => {}
            Expression::Or(a, b)
            | Expression::And(a, b)
            | Expression::Equal(a, b)
            | Expression::NotEqual(a, b)
            | Expression::Less(a, b)
            | Expression::LessOrEqual(a, b)
            | Expression::Greater(a, b)
            | Expression::GreaterOrEqual(a, b)
            | Expression::SameTerm(a, b)
            | Expression::Add(a, b)
            | Expression::Subtract(a, b)
            | Expression::Multiply(a, b)
            | Expression::Divide(a, b) => {
                a.for_each_variable(f);
                b.for_each_variable(f);
            }
            Expression::Not(a) | Expression::UnaryPlus(a) | Expression::UnaryMinus(a) => {
                a.for_each_variable(f);
            }
            Expression::In(a, list) => {
                a.for_each_variable(f);
                for e in list {
                    e.for_each_variable(f);
                }
            }
            Expression::If(c, t, e) => {
                c.for_each_variable(f);
                t.for_each_variable(f);
                e.for_each_variable(f);
            }
            Expression::Coalesce(list) | Expression::FunctionCall(_, list) => {
                for e in list {
                    e.for_each_variable(f);
                }
            }
            Expression::Regex { text, pattern, flags } => {
                text.for_each_variable(f);
                pattern.for_each_variable(f);
                if let Some(flags) = flags {
                    flags.for_each_variable(f);
                }
            }
            Expression::Exists(_) | Expression::NotExists(_) => {}
        }
    }
}

impl From<TermOrVariable> for Expression {
    fn from(value: TermOrVariable) -> Self {
        match value {
            TermOrVariable::Term(t) => Expression::Literal(t),
            TermOrVariable::Variable(v) => Expression::Variable(v),
        }
    }
}

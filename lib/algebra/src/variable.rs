use std::fmt;
use std::rc::Rc;

/// A SPARQL query variable, e.g. `?x`. Compared and hashed by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Variable(Rc<str>);

impl Variable {
    pub fn new(name: impl Into<Rc<str>>) -> Self {
        Variable(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "?{}", self.0)
    }
}

/// A value that may appear in a triple pattern position: a bound RDF term, or a variable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TermOrVariable {
    Term(rdfkit_model::Term),
    Variable(Variable),
}

impl TermOrVariable {
    pub fn as_variable(&self) -> Option<&Variable> {
        match self {
            TermOrVariable::Variable(v) => Some(v),
            TermOrVariable::Term(_) => None,
        }
    }
}

impl fmt::Display for TermOrVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TermOrVariable::Term(t) => write!(f, "{t}"),
            TermOrVariable::Variable(v) => write!(f, "{v}"),
        }
    }
}

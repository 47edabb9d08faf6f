//! Update-request algebra.
//!
//! `INSERT DATA` / `DELETE DATA` carry fully-ground triples (no variables;
//! blank nodes are scoped to the request). `DELETE/INSERT WHERE` carries
//! template patterns (which may contain variables bound by `pattern`) plus
//! the `WHERE` graph pattern itself. `LOAD` and `CLEAR` are passed through to
//! the Loader / Index layer unchanged.

use crate::pattern::{GraphPattern, TriplePattern};
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOperation {
    InsertData(Vec<TriplePattern>),
    DeleteData(Vec<TriplePattern>),
    DeleteInsertWhere {
        delete: Vec<TriplePattern>,
        insert: Vec<TriplePattern>,
        pattern: Rc<GraphPattern>,
    },
    Load {
        source: String,
        silent: bool,
    },
    Clear {
        silent: bool,
    },
}

/// A full SPARQL Update request: prologue-resolved, semicolon-separated operations
/// executed as one atomic write batch.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GraphUpdate {
    pub operations: Vec<UpdateOperation>,
}

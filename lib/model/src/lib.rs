//! RDF term model for rdfkit: the polymorphic [`Term`] value, the compact
//! 64-bit [`id::TermId`] used on the hot path, canonical dictionary
//! serialization, and the fixed-length triple index key layout.
//!
//! Grounded on `oxrdf`'s term model.

pub mod canonical;
pub mod error;
pub mod id;
pub mod term;
pub mod triple;

pub use error::TermError;
pub use id::{TermId, TypeTag};
pub use term::{NumericLiteral, Term};
pub use triple::{DecodedTriple, EncodedTriple, IndexOrder, PatternSlot};

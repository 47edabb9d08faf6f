//! Adapter: converts abstract RDF terms to/from ids, one dictionary batch per
//! triple, used by the Loader, the Update engine and `export`.

use rdfkit_model::{DecodedTriple, EncodedTriple, NumericLiteral, Term, TermId};

use crate::dictionary::Dictionary;
use crate::error::{StoreError, StoreResult};

/// Encodes a batch of decoded triples into ids in a single dictionary call.
pub fn encode_triples(dictionary: &Dictionary, triples: &[DecodedTriple]) -> StoreResult<Vec<EncodedTriple>> {
    let mut terms = Vec::with_capacity(triples.len() * 3);
    for t in triples {
        terms.push(t.subject.clone());
        terms.push(t.predicate.clone());
        terms.push(t.object.clone());
    }
    let ids = dictionary.get_or_create_ids(&terms)?;
    Ok(ids.chunks_exact(3).map(|c| EncodedTriple::new(c[0], c[1], c[2])).collect())
}

/// Like [`encode_triples`] but never allocates a new id; used to resolve a `DELETE`/`WHERE`
/// pattern's bound constants, where an unknown term simply can't match anything.
pub fn lookup_triples(dictionary: &Dictionary, triples: &[DecodedTriple]) -> StoreResult<Vec<Option<EncodedTriple>>> {
    let mut terms = Vec::with_capacity(triples.len() * 3);
    for t in triples {
        terms.push(t.subject.clone());
        terms.push(t.predicate.clone());
        terms.push(t.object.clone());
    }
    let ids = dictionary.lookup_ids(&terms)?;
    Ok(ids
        .chunks_exact(3)
        .map(|c| match (c[0], c[1], c[2]) {
            (Some(s), Some(p), Some(o)) => Some(EncodedTriple::new(s, p, o)),
            _ => None,
        })
        .collect())
}

/// Decodes an encoded triple back to its term-level representation.
pub fn decode_triple(dictionary: &Dictionary, triple: EncodedTriple) -> StoreResult<DecodedTriple> {
    let decoded = dictionary.lookup_terms(&[triple.subject, triple.predicate, triple.object])?;
    let mut it = decoded.into_iter();
    let subject = it.next().flatten().ok_or_else(|| StoreError::Fatal("dangling subject id in index".to_string()))?;
    let predicate = it.next().flatten().ok_or_else(|| StoreError::Fatal("dangling predicate id in index".to_string()))?;
    let object = it.next().flatten().ok_or_else(|| StoreError::Fatal("dangling object id in index".to_string()))?;
    Ok(DecodedTriple { subject, predicate, object })
}

/// Resolves a single constant term without allocating, used by [`crate::store::TermLookup`]
/// (the optimizer's [`rdfkit_optimizer::TermResolver`] and the executor's
/// [`rdfkit_eval::Backend::resolve`] both bottom out here).
pub fn resolve_term(dictionary: &Dictionary, term: &Term) -> StoreResult<Option<rdfkit_model::TermId>> {
    Ok(dictionary.lookup_ids(std::slice::from_ref(term))?.into_iter().next().flatten())
}

/// Decodes `id` as an `f64` if it denotes a numeric literal, inline or dictionary-backed.
/// Shared between statistics collection and the numeric-range cache so both agree on one
/// notion of "numeric value" for a term id.
pub fn numeric_value(dictionary: &Dictionary, id: TermId) -> Option<f64> {
    let literal = match id.decode_inline() {
        Some(n) => n,
        None => match dictionary.lookup_terms(&[id]).ok()?.into_iter().next().flatten()? {
            Term::Numeric(n) => n,
            _ => return None,
        },
    };
    Some(match literal {
        NumericLiteral::Integer(v) => v as f64,
        NumericLiteral::Decimal(scaled) => scaled as f64 / rdfkit_model::term::DECIMAL_SCALE as f64,
        NumericLiteral::Double(v) => v,
        NumericLiteral::DateTime(secs) => secs as f64,
    })
}

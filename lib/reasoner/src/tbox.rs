//! Schema summary and transitive-closure cache.
//!
//! Precomputes the class/property hierarchy closures and the OWL
//! characteristic-property sets once per materialization run instead of
//! re-deriving them inside the fixpoint loop, and exposes a version token so
//! `rdfkit-store` can invalidate it selectively on UPDATE.

use rustc_hash::{FxHashMap, FxHashSet};

use rdfkit_model::{EncodedTriple, Term, TermId};

use crate::backend::{Pattern, RuleBackend};
use crate::vocab;

#[derive(Debug, Clone)]
pub struct RestrictionDescriptor {
    pub node: TermId,
    pub on_property: Option<TermId>,
    pub some_values_from: Option<TermId>,
    pub all_values_from: Option<TermId>,
    pub has_value: Option<TermId>,
}

#[derive(Debug, Clone, Default)]
pub struct TBoxCache {
    /// Reflexive-transitive closure: `c -> {c' : c rdfs:subClassOf* c'}`, `c` included.
    pub subclass_closure: FxHashMap<TermId, FxHashSet<TermId>>,
    pub subproperty_closure: FxHashMap<TermId, FxHashSet<TermId>>,
    pub domains: FxHashMap<TermId, Vec<TermId>>,
    pub ranges: FxHashMap<TermId, Vec<TermId>>,
    pub equivalent_classes: Vec<(TermId, TermId)>,
    pub equivalent_properties: Vec<(TermId, TermId)>,
    pub inverse_of: Vec<(TermId, TermId)>,
    pub transitive_properties: FxHashSet<TermId>,
    pub symmetric_properties: FxHashSet<TermId>,
    pub functional_properties: FxHashSet<TermId>,
    pub inverse_functional_properties: FxHashSet<TermId>,
    pub restrictions: Vec<RestrictionDescriptor>,

    structural_predicates: FxHashSet<TermId>,
    characteristic_classes: FxHashSet<TermId>,
    type_predicate: Option<TermId>,

    pub version: u64,
}

impl TBoxCache {
    pub fn build(backend: &dyn RuleBackend, version: u64) -> Self {
        let mut cache = TBoxCache { version, ..Default::default() };

        let subclass_of = backend.resolve(&Term::named_node(vocab::RDFS_SUBCLASS_OF));
        let subproperty_of = backend.resolve(&Term::named_node(vocab::RDFS_SUBPROPERTY_OF));
        let domain = backend.resolve(&Term::named_node(vocab::RDFS_DOMAIN));
        let range = backend.resolve(&Term::named_node(vocab::RDFS_RANGE));
        let equiv_class = backend.resolve(&Term::named_node(vocab::OWL_EQUIVALENT_CLASS));
        let equiv_prop = backend.resolve(&Term::named_node(vocab::OWL_EQUIVALENT_PROPERTY));
        let inverse_of = backend.resolve(&Term::named_node(vocab::OWL_INVERSE_OF));
        let on_property = backend.resolve(&Term::named_node(vocab::OWL_ON_PROPERTY));
        let some_values_from = backend.resolve(&Term::named_node(vocab::OWL_SOME_VALUES_FROM));
        let all_values_from = backend.resolve(&Term::named_node(vocab::OWL_ALL_VALUES_FROM));
        let has_value = backend.resolve(&Term::named_node(vocab::OWL_HAS_VALUE));
        let rdf_type = backend.resolve(&Term::named_node(vocab::RDF_TYPE));
        let transitive_class = backend.resolve(&Term::named_node(vocab::OWL_TRANSITIVE_PROPERTY));
        let symmetric_class = backend.resolve(&Term::named_node(vocab::OWL_SYMMETRIC_PROPERTY));
        let functional_class = backend.resolve(&Term::named_node(vocab::OWL_FUNCTIONAL_PROPERTY));
        let inverse_functional_class = backend.resolve(&Term::named_node(vocab::OWL_INVERSE_FUNCTIONAL_PROPERTY));

        cache.type_predicate = rdf_type;
        for id in [subclass_of, subproperty_of, domain, range, equiv_class, equiv_prop, inverse_of, on_property, some_values_from, all_values_from, has_value]
            .into_iter()
            .flatten()
        {
            cache.structural_predicates.insert(id);
        }
        for id in [transitive_class, symmetric_class, functional_class, inverse_functional_class].into_iter().flatten() {
            cache.characteristic_classes.insert(id);
        }

        if let Some(p) = subclass_of {
            let edges = edge_map(backend, p);
            cache.subclass_closure = transitive_closure(&edges);
        }
        if let Some(p) = subproperty_of {
            let edges = edge_map(backend, p);
            cache.subproperty_closure = transitive_closure(&edges);
        }
        if let Some(p) = domain {
            for t in backend.scan(Pattern::new(None, Some(p), None)) {
                cache.domains.entry(t.subject).or_default().push(t.object);
            }
        }
        if let Some(p) = range {
            for t in backend.scan(Pattern::new(None, Some(p), None)) {
                cache.ranges.entry(t.subject).or_default().push(t.object);
            }
        }
        if let Some(p) = equiv_class {
            for t in backend.scan(Pattern::new(None, Some(p), None)) {
                cache.equivalent_classes.push((t.subject, t.object));
                cache.equivalent_classes.push((t.object, t.subject));
            }
        }
        if let Some(p) = equiv_prop {
            for t in backend.scan(Pattern::new(None, Some(p), None)) {
                cache.equivalent_properties.push((t.subject, t.object));
                cache.equivalent_properties.push((t.object, t.subject));
            }
        }
        if let Some(p) = inverse_of {
            for t in backend.scan(Pattern::new(None, Some(p), None)) {
                cache.inverse_of.push((t.subject, t.object));
                cache.inverse_of.push((t.object, t.subject));
            }
        }
        if let (Some(p), Some(c)) = (rdf_type, transitive_class) {
            cache.transitive_properties = property_set(backend, p, c);
        }
        if let (Some(p), Some(c)) = (rdf_type, symmetric_class) {
            cache.symmetric_properties = property_set(backend, p, c);
        }
        if let (Some(p), Some(c)) = (rdf_type, functional_class) {
            cache.functional_properties = property_set(backend, p, c);
        }
        if let (Some(p), Some(c)) = (rdf_type, inverse_functional_class) {
            cache.inverse_functional_properties = property_set(backend, p, c);
        }

        if let Some(p) = on_property {
            let mut by_node: FxHashMap<TermId, RestrictionDescriptor> = FxHashMap::default();
            for t in backend.scan(Pattern::new(None, Some(p), None)) {
                by_node.entry(t.subject).or_insert(RestrictionDescriptor {
                    node: t.subject,
                    on_property: None,
                    some_values_from: None,
                    all_values_from: None,
                    has_value: None,
                }).on_property = Some(t.object);
            }
            if let Some(p) = some_values_from {
                for t in backend.scan(Pattern::new(None, Some(p), None)) {
                    if let Some(d) = by_node.get_mut(&t.subject) {
                        d.some_values_from = Some(t.object);
                    }
                }
            }
            if let Some(p) = all_values_from {
                for t in backend.scan(Pattern::new(None, Some(p), None)) {
                    if let Some(d) = by_node.get_mut(&t.subject) {
                        d.all_values_from = Some(t.object);
                    }
                }
            }
            if let Some(p) = has_value {
                for t in backend.scan(Pattern::new(None, Some(p), None)) {
                    if let Some(d) = by_node.get_mut(&t.subject) {
                        d.has_value = Some(t.object);
                    }
                }
            }
            cache.restrictions = by_node.into_values().collect();
        }

        cache
    }

    /// Whether an inserted/deleted triple could change this schema summary, used by the
    /// caller to decide whether to rebuild the cache.
    pub fn is_tbox_relevant(&self, triple: EncodedTriple) -> bool {
        if self.structural_predicates.contains(&triple.predicate) {
            return true;
        }
        if Some(triple.predicate) == self.type_predicate {
            return self.characteristic_classes.contains(&triple.object);
        }
        false
    }
}

fn edge_map(backend: &dyn RuleBackend, predicate: TermId) -> FxHashMap<TermId, Vec<TermId>> {
    let mut edges: FxHashMap<TermId, Vec<TermId>> = FxHashMap::default();
    for t in backend.scan(Pattern::new(None, Some(predicate), None)) {
        edges.entry(t.subject).or_default().push(t.object);
    }
    edges
}

fn property_set(backend: &dyn RuleBackend, type_predicate: TermId, class: TermId) -> FxHashSet<TermId> {
    backend
        .scan(Pattern::new(None, Some(type_predicate), Some(class)))
        .into_iter()
        .map(|t| t.subject)
        .collect()
}

/// Reflexive-transitive closure of a directed edge map, tolerant of diamond inheritance
/// (grounded on the retrieval pack's `rdfs.rs` plain-BFS `transitive_closure` helper).
fn transitive_closure(edges: &FxHashMap<TermId, Vec<TermId>>) -> FxHashMap<TermId, FxHashSet<TermId>> {
    let mut nodes: FxHashSet<TermId> = FxHashSet::default();
    for (from, tos) in edges {
        nodes.insert(*from);
        nodes.extend(tos.iter().copied());
    }

    let mut closure: FxHashMap<TermId, FxHashSet<TermId>> = FxHashMap::default();
    for &node in &nodes {
        let mut visited: FxHashSet<TermId> = FxHashSet::default();
        visited.insert(node);
        let mut frontier = vec![node];
        while let Some(current) = frontier.pop() {
            if let Some(next) = edges.get(&current) {
                for &n in next {
                    if visited.insert(n) {
                        frontier.push(n);
                    }
                }
            }
        }
        closure.insert(node, visited);
    }
    closure
}

//! Rule compilation: turns a [`TBoxCache`]
//! schema summary into a concrete [`Rule`] list, dropping rules whose
//! triggering predicate is absent from the store and specializing rules per
//! concrete property/class/restriction.
//!
//! The OWL 2 RL table below is a faithful, commonly-used subset: equality
//! (`eq-*`), property hierarchy and characteristics (`prp-*`), class
//! hierarchy (`cax-*`) and restriction rules (`cls-*`), named after the
//! W3C OWL 2 RL profile's own rule identifiers. RDFS rules use the `rdfs*`
//! numbering from the retrieval pack's `rdfs.rs` reference.

use rdfkit_model::{Term, TermId};

use crate::backend::RuleBackend;
use crate::config::Profile;
use crate::rules::{Category, PatternTerm, Rule, RuleAtom};
use crate::tbox::TBoxCache;
use crate::vocab;

fn hx(id: TermId) -> String {
    format!("{:x}", id.to_raw())
}

fn var(n: u8) -> PatternTerm {
    PatternTerm::Var(n)
}

fn konst(id: TermId) -> PatternTerm {
    PatternTerm::Const(id)
}

pub fn compile_rules(tbox: &TBoxCache, backend: &dyn RuleBackend, profile: Profile) -> Vec<Rule> {
    let mut rules = compile_rdfs_rules(tbox, backend);
    if profile == Profile::OwlRl {
        rules.extend(compile_owl_rl_rules(tbox, backend));
    }
    rules
}

/// The commonly cited RDFS core subset: domain, range,
/// subClassOf transitivity/reflexivity, subPropertyOf transitivity/reflexivity.
fn compile_rdfs_rules(tbox: &TBoxCache, backend: &dyn RuleBackend) -> Vec<Rule> {
    let mut rules = Vec::new();
    let Some(rdf_type) = backend.resolve(&Term::named_node(vocab::RDF_TYPE)) else {
        return rules;
    };
    let Some(subclass_of) = backend.resolve(&Term::named_node(vocab::RDFS_SUBCLASS_OF)) else {
        return rules;
    };
    let subproperty_of = backend.resolve(&Term::named_node(vocab::RDFS_SUBPROPERTY_OF));

    // rdfs2: domain inference.
    for (&prop, classes) in &tbox.domains {
        for &class in classes {
            rules.push(Rule::new(
                format!("rdfs2:{}:{}", hx(prop), hx(class)),
                Profile::Rdfs,
                Category::PropertyHierarchy,
                vec![RuleAtom::new(var(0), konst(prop), var(1))],
                RuleAtom::new(var(0), konst(rdf_type), konst(class)),
            ));
        }
    }
    // rdfs3: range inference.
    for (&prop, classes) in &tbox.ranges {
        for &class in classes {
            rules.push(Rule::new(
                format!("rdfs3:{}:{}", hx(prop), hx(class)),
                Profile::Rdfs,
                Category::PropertyHierarchy,
                vec![RuleAtom::new(var(0), konst(prop), var(1))],
                RuleAtom::new(var(1), konst(rdf_type), konst(class)),
            ));
        }
    }
    // rdfs9/11: subClassOf reflexivity + transitive application.
    for (&c, closure) in &tbox.subclass_closure {
        rules.push(Rule::new(
            format!("rdfs11-refl:{}", hx(c)),
            Profile::Rdfs,
            Category::ClassHierarchy,
            vec![],
            RuleAtom::new(konst(c), konst(subclass_of), konst(c)),
        ));
        for &c2 in closure {
            if c2 == c {
                continue;
            }
            rules.push(Rule::new(
                format!("rdfs9:{}:{}", hx(c), hx(c2)),
                Profile::Rdfs,
                Category::ClassHierarchy,
                vec![RuleAtom::new(var(0), konst(rdf_type), konst(c))],
                RuleAtom::new(var(0), konst(rdf_type), konst(c2)),
            ));
        }
    }
    // rdfs5/7: subPropertyOf reflexivity + transitive application.
    if let Some(subproperty_of) = subproperty_of {
        for (&p, closure) in &tbox.subproperty_closure {
            rules.push(Rule::new(
                format!("rdfs5-refl:{}", hx(p)),
                Profile::Rdfs,
                Category::PropertyHierarchy,
                vec![],
                RuleAtom::new(konst(p), konst(subproperty_of), konst(p)),
            ));
            for &p2 in closure {
                if p2 == p {
                    continue;
                }
                rules.push(Rule::new(
                    format!("rdfs7:{}:{}", hx(p), hx(p2)),
                    Profile::Rdfs,
                    Category::PropertyHierarchy,
                    vec![RuleAtom::new(var(0), konst(p), var(1))],
                    RuleAtom::new(var(0), konst(p2), var(1)),
                ));
            }
        }
    }
    rules
}

fn compile_owl_rl_rules(tbox: &TBoxCache, backend: &dyn RuleBackend) -> Vec<Rule> {
    let mut rules = Vec::new();
    let Some(rdf_type) = backend.resolve(&Term::named_node(vocab::RDF_TYPE)) else {
        return rules;
    };
    let Some(same_as) = backend.resolve(&Term::named_node(vocab::OWL_SAME_AS)) else {
        return compile_owl_rl_rules_without_equality(tbox, rdf_type);
    };

    rules.push(Rule::new(
        "eq-sym",
        Profile::OwlRl,
        Category::Equality,
        vec![RuleAtom::new(var(0), konst(same_as), var(1))],
        RuleAtom::new(var(1), konst(same_as), var(0)),
    ));
    rules.push(Rule::new(
        "eq-trans",
        Profile::OwlRl,
        Category::Equality,
        vec![RuleAtom::new(var(0), konst(same_as), var(1)), RuleAtom::new(var(1), konst(same_as), var(2))],
        RuleAtom::new(var(0), konst(same_as), var(2)),
    ));
    rules.push(Rule::new(
        "eq-rep-s",
        Profile::OwlRl,
        Category::Equality,
        vec![RuleAtom::new(var(0), konst(same_as), var(1)), RuleAtom::new(var(0), var(2), var(3))],
        RuleAtom::new(var(1), var(2), var(3)),
    ));
    rules.push(Rule::new(
        "eq-rep-p",
        Profile::OwlRl,
        Category::Equality,
        vec![RuleAtom::new(var(0), konst(same_as), var(1)), RuleAtom::new(var(2), var(0), var(3))],
        RuleAtom::new(var(2), var(1), var(3)),
    ));
    rules.push(Rule::new(
        "eq-rep-o",
        Profile::OwlRl,
        Category::Equality,
        vec![RuleAtom::new(var(0), konst(same_as), var(1)), RuleAtom::new(var(2), var(3), var(0))],
        RuleAtom::new(var(2), var(3), var(1)),
    ));

    rules.extend(characteristic_rules(tbox, same_as));
    rules.extend(property_hierarchy_rules(tbox));
    rules.extend(class_hierarchy_rules(tbox, rdf_type));
    rules.extend(restriction_rules(tbox, backend, rdf_type));
    rules
}

fn compile_owl_rl_rules_without_equality(tbox: &TBoxCache, rdf_type: TermId) -> Vec<Rule> {
    let mut rules = property_hierarchy_rules(tbox);
    rules.extend(class_hierarchy_rules(tbox, rdf_type));
    rules
}

fn characteristic_rules(tbox: &TBoxCache, same_as: TermId) -> Vec<Rule> {
    let mut rules = Vec::new();
    for &p in &tbox.functional_properties {
        rules.push(Rule::new(
            format!("prp-fp:{}", hx(p)),
            Profile::OwlRl,
            Category::Characteristic,
            vec![RuleAtom::new(var(0), konst(p), var(1)), RuleAtom::new(var(0), konst(p), var(2))],
            RuleAtom::new(var(1), konst(same_as), var(2)),
        ));
    }
    for &p in &tbox.inverse_functional_properties {
        rules.push(Rule::new(
            format!("prp-ifp:{}", hx(p)),
            Profile::OwlRl,
            Category::Characteristic,
            vec![RuleAtom::new(var(0), konst(p), var(2)), RuleAtom::new(var(1), konst(p), var(2))],
            RuleAtom::new(var(0), konst(same_as), var(1)),
        ));
    }
    for &p in &tbox.symmetric_properties {
        rules.push(Rule::new(
            format!("prp-symp:{}", hx(p)),
            Profile::OwlRl,
            Category::Characteristic,
            vec![RuleAtom::new(var(0), konst(p), var(1))],
            RuleAtom::new(var(1), konst(p), var(0)),
        ));
    }
    for &p in &tbox.transitive_properties {
        rules.push(Rule::new(
            format!("prp-trp:{}", hx(p)),
            Profile::OwlRl,
            Category::Characteristic,
            vec![RuleAtom::new(var(0), konst(p), var(1)), RuleAtom::new(var(1), konst(p), var(2))],
            RuleAtom::new(var(0), konst(p), var(2)),
        ));
    }
    rules
}

fn property_hierarchy_rules(tbox: &TBoxCache) -> Vec<Rule> {
    let mut rules = Vec::new();
    for &(p, p2) in &tbox.equivalent_properties {
        rules.push(Rule::new(
            format!("prp-eqp:{}:{}", hx(p), hx(p2)),
            Profile::OwlRl,
            Category::PropertyHierarchy,
            vec![RuleAtom::new(var(0), konst(p), var(1))],
            RuleAtom::new(var(0), konst(p2), var(1)),
        ));
    }
    for &(p, q) in &tbox.inverse_of {
        rules.push(Rule::new(
            format!("prp-inv:{}:{}", hx(p), hx(q)),
            Profile::OwlRl,
            Category::PropertyHierarchy,
            vec![RuleAtom::new(var(0), konst(p), var(1))],
            RuleAtom::new(var(1), konst(q), var(0)),
        ));
    }
    rules
}

fn class_hierarchy_rules(tbox: &TBoxCache, rdf_type: TermId) -> Vec<Rule> {
    let mut rules = Vec::new();
    for &(c, c2) in &tbox.equivalent_classes {
        rules.push(Rule::new(
            format!("cax-eqc:{}:{}", hx(c), hx(c2)),
            Profile::OwlRl,
            Category::ClassHierarchy,
            vec![RuleAtom::new(var(0), konst(rdf_type), konst(c))],
            RuleAtom::new(var(0), konst(rdf_type), konst(c2)),
        ));
    }
    rules
}

fn restriction_rules(tbox: &TBoxCache, backend: &dyn RuleBackend, rdf_type: TermId) -> Vec<Rule> {
    let owl_thing = backend.resolve(&Term::named_node(vocab::OWL_THING));
    let mut rules = Vec::new();
    for r in &tbox.restrictions {
        let Some(p) = r.on_property else { continue };
        if let Some(y) = r.some_values_from {
            if Some(y) == owl_thing {
                rules.push(Rule::new(
                    format!("cls-svf2:{}", hx(r.node)),
                    Profile::OwlRl,
                    Category::Restriction,
                    vec![RuleAtom::new(var(0), konst(p), var(1))],
                    RuleAtom::new(var(0), konst(rdf_type), konst(r.node)),
                ));
            } else {
                rules.push(Rule::new(
                    format!("cls-svf1:{}", hx(r.node)),
                    Profile::OwlRl,
                    Category::Restriction,
                    vec![RuleAtom::new(var(0), konst(p), var(1)), RuleAtom::new(var(1), konst(rdf_type), konst(y))],
                    RuleAtom::new(var(0), konst(rdf_type), konst(r.node)),
                ));
            }
        }
        if let Some(y) = r.all_values_from {
            rules.push(Rule::new(
                format!("cls-avf:{}", hx(r.node)),
                Profile::OwlRl,
                Category::Restriction,
                vec![RuleAtom::new(var(0), konst(rdf_type), konst(r.node)), RuleAtom::new(var(0), konst(p), var(1))],
                RuleAtom::new(var(1), konst(rdf_type), konst(y)),
            ));
        }
        if let Some(v) = r.has_value {
            rules.push(Rule::new(
                format!("cls-hv1:{}", hx(r.node)),
                Profile::OwlRl,
                Category::Restriction,
                vec![RuleAtom::new(var(0), konst(rdf_type), konst(r.node))],
                RuleAtom::new(var(0), konst(p), konst(v)),
            ));
            rules.push(Rule::new(
                format!("cls-hv2:{}", hx(r.node)),
                Profile::OwlRl,
                Category::Restriction,
                vec![RuleAtom::new(var(0), konst(p), konst(v))],
                RuleAtom::new(var(0), konst(rdf_type), konst(r.node)),
            ));
        }
    }
    rules
}

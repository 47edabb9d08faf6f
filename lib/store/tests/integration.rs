use std::time::Duration;

use rdfkit_eval::QuerySolutions;
use rdfkit_model::{DecodedTriple, NumericLiteral, Term};
use rdfkit_store::{ErrorKind, LoaderOptions, Store, StoreOptions};

fn open_test_store() -> (tempfile::TempDir, Store) {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(dir.path(), StoreOptions::default()).unwrap();
    (dir, store)
}

fn iri(s: &str, p: &str, o: &str) -> DecodedTriple {
    DecodedTriple { subject: Term::named_node(s), predicate: Term::named_node(p), object: Term::named_node(o) }
}

fn numeric_triple(s: &str, p: &str, v: i64) -> DecodedTriple {
    DecodedTriple { subject: Term::named_node(s), predicate: Term::named_node(p), object: Term::Numeric(NumericLiteral::Integer(v)) }
}

fn select_rows(solutions: QuerySolutions) -> Vec<rdfkit_eval::Binding> {
    match solutions {
        QuerySolutions::Select { rows, .. } => rows,
        other => panic!("expected Select, got {other:?}"),
    }
}

#[test]
fn basic_bgp_join_across_two_patterns() {
    let (_dir, store) = open_test_store();
    store
        .insert(&[
            iri("http://ex/alice", "http://ex/knows", "http://ex/bob"),
            iri("http://ex/bob", "http://ex/age", "http://ex/30"),
        ])
        .unwrap();

    let rows = select_rows(
        store
            .prepare_and_execute("SELECT ?friend WHERE { <http://ex/alice> <http://ex/knows> ?friend . ?friend <http://ex/age> <http://ex/30> }")
            .unwrap(),
    );
    assert_eq!(rows.len(), 1);
    let var = rdfkit_algebra::Variable::new("friend");
    assert_eq!(rows[0].get(&var).unwrap().lexical_form(), "http://ex/bob");
}

#[test]
fn optional_preserves_unmatched_left_solutions() {
    let (_dir, store) = open_test_store();
    store
        .insert(&[
            iri("http://ex/alice", "http://ex/knows", "http://ex/bob"),
            iri("http://ex/alice", "http://ex/type", "http://ex/Person"),
            iri("http://ex/carol", "http://ex/type", "http://ex/Person"),
        ])
        .unwrap();

    let rows = select_rows(
        store
            .prepare_and_execute(
                "SELECT ?person ?friend WHERE { ?person <http://ex/type> <http://ex/Person> . OPTIONAL { ?person <http://ex/knows> ?friend } }",
            )
            .unwrap(),
    );
    assert_eq!(rows.len(), 2);
    let friend_var = rdfkit_algebra::Variable::new("friend");
    let with_friend = rows.iter().filter(|r| r.contains_key(&friend_var)).count();
    assert_eq!(with_friend, 1);
}

#[test]
fn transitive_property_path_follows_chain() {
    let (_dir, store) = open_test_store();
    store
        .insert(&[
            iri("http://ex/a", "http://ex/parent", "http://ex/b"),
            iri("http://ex/b", "http://ex/parent", "http://ex/c"),
            iri("http://ex/c", "http://ex/parent", "http://ex/d"),
        ])
        .unwrap();

    let rows = select_rows(
        store.prepare_and_execute("SELECT ?descendant WHERE { <http://ex/a> <http://ex/parent>+ ?descendant }").unwrap(),
    );
    let mut found: Vec<String> = rows.iter().map(|r| r.get(&rdfkit_algebra::Variable::new("descendant")).unwrap().lexical_form()).collect();
    found.sort();
    assert_eq!(found, vec!["http://ex/b", "http://ex/c", "http://ex/d"]);
}

#[test]
fn union_combines_alternative_patterns() {
    let (_dir, store) = open_test_store();
    store
        .insert(&[
            iri("http://ex/a", "http://ex/likes", "http://ex/pizza"),
            iri("http://ex/b", "http://ex/dislikes", "http://ex/pizza"),
        ])
        .unwrap();

    let rows = select_rows(
        store
            .prepare_and_execute(
                "SELECT ?who WHERE { { ?who <http://ex/likes> <http://ex/pizza> } UNION { ?who <http://ex/dislikes> <http://ex/pizza> } }",
            )
            .unwrap(),
    );
    assert_eq!(rows.len(), 2);
}

#[test]
fn rdfs_subclass_reasoning_materializes_transitive_types() {
    let (_dir, store) = open_test_store();
    store
        .insert(&[
            iri("http://ex/Cat", "http://www.w3.org/2000/01/rdf-schema#subClassOf", "http://ex/Mammal"),
            iri("http://ex/Mammal", "http://www.w3.org/2000/01/rdf-schema#subClassOf", "http://ex/Animal"),
            iri("http://ex/felix", "http://www.w3.org/1999/02/22-rdf-syntax-ns#type", "http://ex/Cat"),
        ])
        .unwrap();

    let report = store.materialize().unwrap();
    assert!(report.partial.is_none());

    let rows = select_rows(
        store
            .prepare_and_execute(
                "SELECT ?class WHERE { <http://ex/felix> <http://www.w3.org/1999/02/22-rdf-syntax-ns#type> ?class }",
            )
            .unwrap(),
    );
    let mut classes: Vec<String> = rows.iter().map(|r| r.get(&rdfkit_algebra::Variable::new("class")).unwrap().lexical_form()).collect();
    classes.sort();
    assert_eq!(classes, vec!["http://ex/Animal", "http://ex/Cat", "http://ex/Mammal"]);
}

#[test]
fn deleting_a_subclass_fact_retracts_its_derived_consequences() {
    let (_dir, store) = open_test_store();
    let parent = iri("http://ex/Cat", "http://www.w3.org/2000/01/rdf-schema#subClassOf", "http://ex/Animal");
    let type_triple = iri("http://ex/felix", "http://www.w3.org/1999/02/22-rdf-syntax-ns#type", "http://ex/Cat");
    store.insert(&[parent.clone(), type_triple]).unwrap();
    store.materialize().unwrap();

    let rows_before = select_rows(
        store
            .prepare_and_execute(
                "SELECT ?class WHERE { <http://ex/felix> <http://www.w3.org/1999/02/22-rdf-syntax-ns#type> ?class }",
            )
            .unwrap(),
    );
    assert_eq!(rows_before.len(), 2);

    store.delete(&[parent]).unwrap();
    store.clear_derived().unwrap();
    store.materialize().unwrap();
    let rows_after = select_rows(
        store
            .prepare_and_execute(
                "SELECT ?class WHERE { <http://ex/felix> <http://www.w3.org/1999/02/22-rdf-syntax-ns#type> ?class }",
            )
            .unwrap(),
    );
    assert_eq!(rows_after.len(), 1);
}

#[test]
fn sparql_update_insert_and_delete_data_round_trip() {
    let (_dir, store) = open_test_store();
    store
        .update("INSERT DATA { <http://ex/s> <http://ex/p> <http://ex/o> }")
        .unwrap();

    let rows = select_rows(store.prepare_and_execute("SELECT ?o WHERE { <http://ex/s> <http://ex/p> ?o }").unwrap());
    assert_eq!(rows.len(), 1);

    store
        .update("DELETE DATA { <http://ex/s> <http://ex/p> <http://ex/o> }")
        .unwrap();
    let rows = select_rows(store.prepare_and_execute("SELECT ?o WHERE { <http://ex/s> <http://ex/p> ?o }").unwrap());
    assert_eq!(rows.len(), 0);
}

#[test]
fn bulk_load_ingests_a_stream_of_triples() {
    let (_dir, store) = open_test_store();
    let triples: Vec<DecodedTriple> = (0..500)
        .map(|i| iri(&format!("http://ex/s{i}"), "http://ex/p", &format!("http://ex/o{i}")))
        .collect();

    let outcome = store.load(triples, &rdfkit_store::LoaderOptions::default(), None).unwrap();
    match outcome {
        rdfkit_store::LoadOutcome::Completed { loaded_count } => assert_eq!(loaded_count, 500),
        rdfkit_store::LoadOutcome::Halted { .. } => panic!("load should not have been halted"),
    }

    let rows = select_rows(store.prepare_and_execute("SELECT ?s WHERE { ?s <http://ex/p> ?o }").unwrap());
    assert_eq!(rows.len(), 500);

    let stats = store.statistics();
    assert_eq!(stats.total_triples, 500);
}

#[test]
fn ask_query_reports_existence() {
    let (_dir, store) = open_test_store();
    store.insert(&[iri("http://ex/s", "http://ex/p", "http://ex/o")]).unwrap();

    match store.prepare_and_execute("ASK { <http://ex/s> <http://ex/p> <http://ex/o> }").unwrap() {
        QuerySolutions::Ask(found) => assert!(found),
        other => panic!("expected Ask, got {other:?}"),
    }
    match store.prepare_and_execute("ASK { <http://ex/s> <http://ex/p> <http://ex/missing> }").unwrap() {
        QuerySolutions::Ask(found) => assert!(!found),
        other => panic!("expected Ask, got {other:?}"),
    }
}

#[test]
fn health_report_reflects_loaded_triple_count() {
    let (_dir, store) = open_test_store();
    store
        .insert(&[
            iri("http://ex/a", "http://ex/p", "http://ex/b"),
            iri("http://ex/c", "http://ex/p", "http://ex/d"),
        ])
        .unwrap();
    let health = store.health();
    assert_eq!(health.total_triples, 2);
}

#[test]
fn repeated_query_hits_the_plan_cache() {
    let (_dir, store) = open_test_store();
    store
        .insert(&[
            iri("http://ex/a", "http://ex/p", "http://ex/b"),
            iri("http://ex/a", "http://ex/p", "http://ex/c"),
        ])
        .unwrap();

    let q = "SELECT ?o WHERE { <http://ex/a> <http://ex/p> ?o }";
    assert_eq!(select_rows(store.prepare_and_execute(q).unwrap()).len(), 2);
    let (_hits_before, misses_before, _) = store.health().plan_cache;
    assert_eq!(select_rows(store.prepare_and_execute(q).unwrap()).len(), 2);
    let (hits_after, misses_after, _) = store.health().plan_cache;

    assert_eq!(misses_after, misses_before);
    assert!(hits_after > 0, "second identical query should hit the plan cache");
}

#[test]
fn repeated_subject_scan_hits_the_subject_cache() {
    let (_dir, store) = open_test_store();
    store
        .insert(&[
            iri("http://ex/a", "http://ex/p", "http://ex/b"),
            iri("http://ex/a", "http://ex/q", "http://ex/c"),
        ])
        .unwrap();

    // Disable the plan and result caches so each CONSTRUCT actually re-executes its
    // bound-subject scan against the index (and the subject cache) instead of short-
    // circuiting on a cached plan or a cached result.
    let mut opts = rdfkit_store::QueryOptions::default();
    opts.use_plan_cache = false;
    opts.use_result_cache = false;
    let construct = "CONSTRUCT { <http://ex/a> ?p ?o } WHERE { <http://ex/a> ?p ?o }";
    store.query(construct, &opts).unwrap();
    let (_hits_before, misses_before, _) = store.health().subject_cache;
    store.query(construct, &opts).unwrap();
    let (hits_after, misses_after, _) = store.health().subject_cache;

    assert_eq!(misses_after, misses_before);
    assert!(hits_after > 0, "second identical bound-subject scan should hit the subject cache");
}

#[test]
fn export_round_trips_every_explicit_triple() {
    let (_dir, store) = open_test_store();
    let inserted = [
        iri("http://ex/a", "http://ex/p", "http://ex/b"),
        iri("http://ex/a", "http://ex/p", "http://ex/c"),
        iri("http://ex/c", "http://ex/q", "http://ex/d"),
    ];
    store.insert(&inserted).unwrap();

    let mut exported = Vec::new();
    let count = store
        .export(|triple| {
            exported.push(triple);
            Ok(())
        })
        .unwrap();

    assert_eq!(count, 3);
    assert_eq!(exported.len(), 3);
    let as_tuple = |t: &DecodedTriple| (t.subject.lexical_form(), t.predicate.lexical_form(), t.object.lexical_form());
    let mut expected: Vec<_> = inserted.iter().map(as_tuple).collect();
    let mut actual: Vec<_> = exported.iter().map(as_tuple).collect();
    expected.sort();
    actual.sort();
    assert_eq!(expected, actual);
}

#[test]
fn range_filter_uses_the_numeric_range_index() {
    let (_dir, store) = open_test_store();
    let triples: Vec<DecodedTriple> = (1..=10_000i64).map(|i| numeric_triple(&format!("http://ex/offer_{i}"), "http://ex/price", i)).collect();
    store.insert(&triples).unwrap();

    let rows =
        select_rows(store.prepare_and_execute("SELECT ?o WHERE { ?o <http://ex/price> ?p FILTER(?p >= 500 && ?p <= 600) }").unwrap());
    assert_eq!(rows.len(), 101, "prices 500..=600 inclusive is 101 offers");
}

#[test]
fn parallel_load_is_deterministic_across_stage_counts() {
    let triples: Vec<DecodedTriple> = (0..2_000).map(|i| iri(&format!("http://ex/s{i}"), "http://ex/p", &format!("http://ex/o{i}"))).collect();
    let mut shuffled = triples.clone();
    // A fixed, non-identity permutation (reverse order) stands in for the two "random"
    // orderings the scenario calls for: what must hold is that the final store state
    // doesn't depend on insertion order, not on any particular source of randomness.
    shuffled.reverse();

    let (_dir_a, store_a) = open_test_store();
    let single_stage = LoaderOptions::new(500, 1, false, 16).unwrap();
    store_a.load(triples, &single_stage, None).unwrap();

    let (_dir_b, store_b) = open_test_store();
    let many_stages = LoaderOptions::new(500, 8, false, 16).unwrap();
    store_b.load(shuffled, &many_stages, None).unwrap();

    let as_tuple = |t: &DecodedTriple| (t.subject.lexical_form(), t.predicate.lexical_form(), t.object.lexical_form());
    let export_sorted = |store: &Store| {
        let mut out = Vec::new();
        store.export(|t| { out.push(as_tuple(&t)); Ok(()) }).unwrap();
        out.sort();
        out
    };
    assert_eq!(export_sorted(&store_a), export_sorted(&store_b));
    assert_eq!(store_a.statistics().total_triples, store_b.statistics().total_triples);
}

#[test]
fn query_exceeding_its_timeout_surfaces_a_timeout_error() {
    let (_dir, store) = open_test_store();
    let triples: Vec<DecodedTriple> =
        (0..400).map(|i| iri(&format!("http://ex/s{i}"), "http://ex/p", &format!("http://ex/o{i}"))).collect();
    store.insert(&triples).unwrap();

    // Cartesian join over 400 triples (160 000 candidate pairs) against a timeout too small
    // for even the first deadline check (at the top of `execute`) to pass.
    let mut opts = rdfkit_store::QueryOptions::default();
    opts.timeout = Duration::from_nanos(1);
    let err = store
        .query("SELECT * WHERE { ?s1 ?p1 ?o1 . ?s2 ?p2 ?o2 }", &opts)
        .expect_err("a 1ns budget must not be enough time to complete any query");
    assert_eq!(err.kind(), ErrorKind::Timeout);

    // Store state is untouched by the failed query.
    assert_eq!(store.statistics().total_triples, 400);
}

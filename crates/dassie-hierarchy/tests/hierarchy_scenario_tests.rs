//! End-to-end passes over small N-Triples documents.

use dassie_hierarchy::{
    build_streaming, build_two_pass, collect_statistics, derive_narrower, outline,
    resolve_topmost, trace, BuildConfig, HierarchyError, TraversalConfig,
};
use dassie_ingest_rdf::NTriples;
use dassie_store::{MemoryTermStore, TermFilter, TermStore, Topmost};
use std::collections::BTreeSet;

const EXAMPLE_NT: &str = r#"
<http://id.loc.gov/authorities/subjects/sh1> <http://www.w3.org/2004/02/skos/core#prefLabel> "Science"@en .
<http://id.loc.gov/authorities/subjects/sh2> <http://www.w3.org/2004/02/skos/core#prefLabel> "Physics"@en .
<http://id.loc.gov/authorities/subjects/sh3> <http://www.w3.org/2004/02/skos/core#prefLabel> "Biophysics"@en .
<http://id.loc.gov/authorities/subjects/sh4> <http://www.w3.org/2004/02/skos/core#prefLabel> "Biology"@en .
<http://id.loc.gov/authorities/subjects/sj5> <http://www.w3.org/2004/02/skos/core#prefLabel> "Bugs"@en .
<http://id.loc.gov/authorities/subjects/sh2> <http://www.w3.org/2004/02/skos/core#broader> <http://id.loc.gov/authorities/subjects/sh1> .
<http://id.loc.gov/authorities/subjects/sh3> <http://www.w3.org/2004/02/skos/core#broader> <http://id.loc.gov/authorities/subjects/sh1> .
<http://id.loc.gov/authorities/subjects/sh3> <http://www.w3.org/2004/02/skos/core#broader> <http://id.loc.gov/authorities/subjects/sh4> .
<http://id.loc.gov/authorities/subjects/sh4> <http://www.w3.org/2004/02/skos/core#altLabel> "Life sciences"@en .
<http://id.loc.gov/authorities/subjects/sh3> <http://www.w3.org/2004/02/skos/core#note> "Here are entered works on biophysics."@en .
<http://id.loc.gov/authorities/subjects/sh4> <http://www.w3.org/2004/02/skos/core#member> <http://id.loc.gov/authorities/subjects/collection_GenreFormSubdivisions> .
"#;

fn set(ids: &[&str]) -> BTreeSet<String> {
    ids.iter().map(|s| s.to_string()).collect()
}

fn run_all(store: &MemoryTermStore) {
    derive_narrower(store, TraversalConfig::default()).unwrap();
    resolve_topmost(store, TraversalConfig::default()).unwrap();
}

#[test]
fn example_scenario_end_to_end() {
    let store = MemoryTermStore::new();
    let report =
        build_streaming(&store, NTriples(EXAMPLE_NT.as_bytes()), &BuildConfig::default()).unwrap();
    assert_eq!(report.terms_created, 4);
    assert_eq!(report.out_of_scope_skipped, 1);
    assert_eq!(report.broader_links, 3);
    run_all(&store);

    let get = |id: &str| store.find_one(id).unwrap().unwrap();
    assert_eq!(get("sh1").topmost, Topmost::Root);
    assert_eq!(get("sh4").topmost, Topmost::Root);
    assert_eq!(get("sh2").topmost, Topmost::Ancestors(set(&["sh1"])));
    assert_eq!(get("sh3").topmost, Topmost::Ancestors(set(&["sh1", "sh4"])));
    assert_eq!(get("sh1").narrower, set(&["sh2", "sh3"]));
    assert_eq!(get("sh4").narrower, set(&["sh3"]));
    assert!(get("sh4").flags.genre_form);
    assert_eq!(get("sh4").alt_labels, vec!["Life sciences"]);

    let paths = trace(&store, "sh3", TraversalConfig::default()).unwrap();
    let ids: Vec<Vec<&str>> = paths
        .iter()
        .map(|p| p.iter().map(|t| t.id.as_str()).collect())
        .collect();
    assert_eq!(ids, vec![vec!["sh3", "sh1"], vec!["sh3", "sh4"]]);

    let rows = outline(&store, "sh4", 2).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1].term.label, "Biophysics");

    let stats = collect_statistics(&store).unwrap();
    assert_eq!(stats.terms, 4);
    assert_eq!(stats.roots, 2);
    assert_eq!(stats.genre_forms, 1);
}

#[test]
fn two_pass_build_matches_streaming_on_reversed_input() {
    let reversed: String = EXAMPLE_NT
        .lines()
        .rev()
        .map(|l| format!("{l}\n"))
        .collect();

    let streamed = MemoryTermStore::new();
    build_streaming(&streamed, NTriples(EXAMPLE_NT.as_bytes()), &BuildConfig::default()).unwrap();
    run_all(&streamed);

    let store = MemoryTermStore::new();
    let report = build_two_pass(
        &store,
        || Ok(NTriples(reversed.as_bytes())),
        &BuildConfig::default(),
    )
    .unwrap();
    assert_eq!(report.order_violations, 0);
    run_all(&store);

    // Broader order follows the input, so compare it as a set.
    let normalized = |store: &MemoryTermStore| {
        let mut terms = store.find(TermFilter::All).unwrap();
        for term in &mut terms {
            term.broader.sort();
        }
        terms
    };
    assert_eq!(normalized(&store), normalized(&streamed));
}

#[test]
fn cycle_aborts_topmost_pass() {
    let nt = r#"
<http://id.loc.gov/authorities/subjects/shX> <http://www.w3.org/2004/02/skos/core#prefLabel> "X"@en .
<http://id.loc.gov/authorities/subjects/shY> <http://www.w3.org/2004/02/skos/core#prefLabel> "Y"@en .
<http://id.loc.gov/authorities/subjects/shX> <http://www.w3.org/2004/02/skos/core#broader> <http://id.loc.gov/authorities/subjects/shY> .
<http://id.loc.gov/authorities/subjects/shY> <http://www.w3.org/2004/02/skos/core#broader> <http://id.loc.gov/authorities/subjects/shX> .
"#;
    let store = MemoryTermStore::new();
    build_streaming(&store, NTriples(nt.as_bytes()), &BuildConfig::default()).unwrap();
    derive_narrower(&store, TraversalConfig::default()).unwrap();

    let err = resolve_topmost(&store, TraversalConfig::default()).unwrap_err();
    match err {
        HierarchyError::Cycle { chain } => {
            assert_eq!(chain.first(), chain.last());
            assert_eq!(chain.len(), 3);
        }
        other => panic!("expected cycle, got {other:?}"),
    }
    assert!(trace(&store, "shX", TraversalConfig::default()).is_err());
}

#[test]
fn malformed_document_is_an_ingest_error() {
    let store = MemoryTermStore::new();
    let err = build_streaming(
        &store,
        NTriples("<http://a> <http://b> .\n".as_bytes()),
        &BuildConfig::default(),
    )
    .unwrap_err();
    assert!(matches!(err, HierarchyError::Ingest(_)));
}

#[test]
fn configs_deserialize_with_defaults() {
    let build: BuildConfig = serde_json::from_str(r#"{ "excluded_prefixes": [] }"#).unwrap();
    assert!(build.excluded_prefixes.is_empty());
    assert_eq!(build.empty_label_sentinel, "LL");
    assert_eq!(build.progress_every, 100_000);

    let traversal: TraversalConfig = serde_json::from_str(r#"{ "max_depth": 64 }"#).unwrap();
    assert_eq!(traversal.max_depth, 64);
    assert_eq!(traversal.max_paths, TraversalConfig::default().max_paths);
}

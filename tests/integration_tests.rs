//! Integration tests for the complete Dassie pipeline
//!
//! These tests verify end-to-end functionality across crates:
//! - N-Triples file → builder → on-disk term database
//! - Narrower / topmost passes → write-ahead log → reopen
//! - Path tracing over a reopened database
//!
//! Run with: cargo test --test integration_tests

use dassie_hierarchy::{
    build_streaming, build_two_pass, derive_narrower, derive_narrower_parallel, resolve_topmost,
    trace, BuildConfig, HierarchyError, TraversalConfig,
};
use dassie_ingest_rdf::NTriples;
use dassie_store::{MemoryTermStore, Term, TermDb, TermFilter, TermStore, Topmost};
use std::collections::BTreeSet;
use std::fmt::Write as _;
use tempfile::tempdir;

const SUBJECTS: &str = "http://id.loc.gov/authorities/subjects/";
const SKOS: &str = "http://www.w3.org/2004/02/skos/core#";

fn pref(out: &mut String, id: &str, label: &str) {
    let _ = writeln!(out, "<{SUBJECTS}{id}> <{SKOS}prefLabel> \"{label}\"@en .");
}

fn broader(out: &mut String, id: &str, parent: &str) {
    let _ = writeln!(out, "<{SUBJECTS}{id}> <{SKOS}broader> <{SUBJECTS}{parent}> .");
}

fn set(ids: &[&str]) -> BTreeSet<String> {
    ids.iter().map(|s| s.to_string()).collect()
}

// ============================================================================
// File → TermDb → passes → reopen
// ============================================================================

#[test]
fn test_pipeline_survives_reopen_through_wal() {
    let dir = tempdir().unwrap();
    let nt_path = dir.path().join("subjects.nt");
    let db_path = dir.path().join("db");

    let mut nt = String::new();
    pref(&mut nt, "sh1", "Science");
    pref(&mut nt, "sh2", "Physics");
    pref(&mut nt, "sh3", "Biophysics");
    pref(&mut nt, "sh4", "Biology");
    broader(&mut nt, "sh2", "sh1");
    broader(&mut nt, "sh3", "sh1");
    broader(&mut nt, "sh3", "sh4");
    std::fs::write(&nt_path, nt).unwrap();

    {
        let db = TermDb::create(&db_path).unwrap();
        let report =
            build_streaming(&db, NTriples::open(&nt_path).unwrap(), &BuildConfig::default())
                .unwrap();
        assert_eq!(report.terms_created, 4);
        db.checkpoint().unwrap();

        // Passes after the checkpoint live only in the log.
        derive_narrower_parallel(&db, TraversalConfig::default()).unwrap();
        resolve_topmost(&db, TraversalConfig::default()).unwrap();
        assert!(db.pending_entries() > 0);
    }

    let db = TermDb::open(&db_path).unwrap();
    let get = |id: &str| db.find_one(id).unwrap().unwrap();
    assert_eq!(get("sh1").topmost, Topmost::Root);
    assert_eq!(get("sh3").topmost, Topmost::Ancestors(set(&["sh1", "sh4"])));
    assert_eq!(get("sh1").narrower, set(&["sh2", "sh3"]));
    assert_eq!(get("sh4").narrower, set(&["sh3"]));

    let paths = trace(&db, "sh3", TraversalConfig::default()).unwrap();
    assert_eq!(paths.len(), 2);
    assert_eq!(paths[0].last().unwrap().id, "sh1");
    assert_eq!(paths[1].last().unwrap().id, "sh4");
}

#[test]
fn test_two_pass_build_from_file_handles_children_first() {
    let dir = tempdir().unwrap();
    let nt_path = dir.path().join("shuffled.nt");

    // Every relation precedes the labels it depends on.
    let mut nt = String::new();
    broader(&mut nt, "sh3", "sh2");
    broader(&mut nt, "sh2", "sh1");
    pref(&mut nt, "sh3", "Optics");
    pref(&mut nt, "sh2", "Physics");
    pref(&mut nt, "sh1", "Science");
    std::fs::write(&nt_path, nt).unwrap();

    let db = TermDb::create(dir.path().join("db")).unwrap();
    let report = build_two_pass(&db, || NTriples::open(&nt_path), &BuildConfig::default()).unwrap();
    assert_eq!(report.order_violations, 0);
    assert_eq!(report.broader_links, 2);

    derive_narrower(&db, TraversalConfig::default()).unwrap();
    resolve_topmost(&db, TraversalConfig::default()).unwrap();
    assert_eq!(
        db.find_one("sh3").unwrap().unwrap().topmost,
        Topmost::Ancestors(set(&["sh1"]))
    );
}

// ============================================================================
// Deep and broken hierarchies
// ============================================================================

#[test]
fn test_deep_chain_needs_no_native_recursion() {
    const DEPTH: usize = 20_000;
    let mut terms = vec![Term::new("sh0", "Root")];
    for i in 1..=DEPTH {
        let parent = format!("sh{}", i - 1);
        terms.push(Term::new(format!("sh{i}"), format!("Level {i}")).with_broader([parent]));
    }
    let store = MemoryTermStore::from_terms(terms).unwrap();
    let config = TraversalConfig {
        max_depth: DEPTH + 1,
        ..TraversalConfig::default()
    };

    let report = resolve_topmost(&store, config).unwrap();
    assert_eq!(report.roots, 1);
    assert_eq!(report.resolved, DEPTH);

    let paths = trace(&store, &format!("sh{DEPTH}"), config).unwrap();
    assert_eq!(paths.len(), 1);
    assert_eq!(paths[0].len(), DEPTH + 1);

    // The default cap refuses the same walk on a fresh store.
    let fresh = MemoryTermStore::from_terms(
        store
            .find(TermFilter::All)
            .unwrap()
            .into_iter()
            .map(|mut t| {
                t.topmost = Topmost::Uncomputed;
                t
            }),
    )
    .unwrap();
    assert!(matches!(
        resolve_topmost(&fresh, TraversalConfig::default()),
        Err(HierarchyError::DepthExceeded { .. })
    ));
}

#[test]
fn test_cycle_reported_through_file_pipeline() {
    let dir = tempdir().unwrap();
    let nt_path = dir.path().join("cycle.nt");
    let mut nt = String::new();
    pref(&mut nt, "sh10", "X");
    pref(&mut nt, "sh11", "Y");
    pref(&mut nt, "sh12", "Z");
    broader(&mut nt, "sh10", "sh11");
    broader(&mut nt, "sh11", "sh12");
    broader(&mut nt, "sh12", "sh10");
    std::fs::write(&nt_path, nt).unwrap();

    let db = TermDb::create(dir.path().join("db")).unwrap();
    build_streaming(&db, NTriples::open(&nt_path).unwrap(), &BuildConfig::default()).unwrap();
    derive_narrower(&db, TraversalConfig::default()).unwrap();

    let err = resolve_topmost(&db, TraversalConfig::default()).unwrap_err();
    assert!(err.is_structural());
    assert_eq!(err.to_string(), "cycle in broader links: sh10 -> sh11 -> sh12 -> sh10");
}

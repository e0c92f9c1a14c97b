//! Hierarchy builder: turns an LCSH triple stream into term records.
//!
//! The streaming build assumes every `prefLabel` triple of a subject
//! arrives before any other triple about that subject (the LOC dumps list
//! all labels first). Rows that break the assumption are counted as order
//! violations and skipped. [`build_two_pass`] drops the assumption by
//! reading the source twice.

use crate::config::BuildConfig;
use crate::error::{HierarchyError, Result};
use dassie_ingest_rdf::{local_id, IngestError, Triple, TripleSource};
use dassie_store::{EditorialFlag, StoreError, Term, TermStore, TermUpdate};
use serde::Serialize;
use tracing::{debug, info, warn};

// ============================================================================
// Classification
// ============================================================================

/// The part of a triple the builder cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TermFact {
    PrefLabel { id: String, label: String },
    AltLabel { id: String, label: String },
    Broader { id: String, parent: String },
    Note { id: String, text: String },
    EditorialNote { id: String, text: String },
    TopicSubdivision { id: String },
    GenreForm { id: String },
}

impl TermFact {
    /// Classify a triple by predicate suffix. Anything unrecognised
    /// (including blank-node subjects) yields `None`.
    pub fn classify(triple: &Triple) -> Option<TermFact> {
        let id = local_id(triple.subject_iri()?).to_string();
        let predicate = triple.predicate.as_str();
        let text = || triple.object.text().trim().to_string();

        let fact = if predicate.ends_with("prefLabel") {
            TermFact::PrefLabel { id, label: text() }
        } else if predicate.ends_with("altLabel") {
            TermFact::AltLabel { id, label: text() }
        } else if predicate.ends_with("broader") {
            let parent = local_id(triple.object.as_iri()?).to_string();
            TermFact::Broader { id, parent }
        } else if predicate.ends_with("core#note") {
            TermFact::Note { id, text: text() }
        } else if predicate.ends_with("core#editorialNote") {
            TermFact::EditorialNote { id, text: text() }
        } else if predicate.ends_with("collection_TopicSubdivisions") {
            TermFact::TopicSubdivision { id }
        } else if predicate.ends_with("core#member") {
            let collection = triple.object.text();
            if collection.ends_with("GenreFormSubdivisions") {
                TermFact::GenreForm { id }
            } else if collection.ends_with("collection_TopicSubdivisions") {
                TermFact::TopicSubdivision { id }
            } else {
                return None;
            }
        } else {
            return None;
        };
        Some(fact)
    }

    /// Id of the term the fact is about.
    pub fn id(&self) -> &str {
        match self {
            TermFact::PrefLabel { id, .. }
            | TermFact::AltLabel { id, .. }
            | TermFact::Broader { id, .. }
            | TermFact::Note { id, .. }
            | TermFact::EditorialNote { id, .. }
            | TermFact::TopicSubdivision { id }
            | TermFact::GenreForm { id } => id,
        }
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Which facts a builder pass applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildPhase {
    All,
    /// Only create terms from `prefLabel` triples.
    LabelsOnly,
    /// Everything except `prefLabel`.
    RelationsOnly,
}

impl BuildPhase {
    fn accepts(self, fact: &TermFact) -> bool {
        let is_label = matches!(fact, TermFact::PrefLabel { .. });
        match self {
            BuildPhase::All => true,
            BuildPhase::LabelsOnly => is_label,
            BuildPhase::RelationsOnly => !is_label,
        }
    }
}

/// Counters reported at the end of a build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    /// Triples read, summed over all passes.
    pub triples: u64,
    pub terms_created: u64,
    pub duplicates_skipped: u64,
    pub out_of_scope_skipped: u64,
    /// Facts about a subject that had no term yet.
    pub order_violations: u64,
    pub alt_labels: u64,
    pub empty_alt_labels: u64,
    pub broader_links: u64,
    pub notes: u64,
    pub flags: u64,
}

impl BuildReport {
    /// Rows skipped for any reason.
    pub fn skipped(&self) -> u64 {
        self.duplicates_skipped
            + self.out_of_scope_skipped
            + self.order_violations
            + self.empty_alt_labels
    }
}

/// Applies classified triples to a [`TermStore`] one at a time.
pub struct HierarchyBuilder<'a, S: TermStore + ?Sized> {
    store: &'a S,
    config: &'a BuildConfig,
    phase: BuildPhase,
    report: BuildReport,
}

impl<'a, S: TermStore + ?Sized> HierarchyBuilder<'a, S> {
    pub fn new(store: &'a S, config: &'a BuildConfig) -> Self {
        Self {
            store,
            config,
            phase: BuildPhase::All,
            report: BuildReport::default(),
        }
    }

    pub fn set_phase(&mut self, phase: BuildPhase) {
        self.phase = phase;
    }

    pub fn report(&self) -> &BuildReport {
        &self.report
    }

    /// Apply one triple. Only store failures other than duplicate / missing
    /// ids are returned as errors; those two are counted and skipped.
    pub fn ingest(&mut self, triple: &Triple) -> Result<()> {
        self.report.triples += 1;
        let every = self.config.progress_every;
        if every > 0 && self.report.triples % every == 0 {
            info!(
                triples = self.report.triples,
                terms = self.report.terms_created,
                skipped = self.report.skipped(),
                "build progress"
            );
        }

        let Some(fact) = TermFact::classify(triple) else {
            return Ok(());
        };
        if !self.phase.accepts(&fact) {
            return Ok(());
        }
        if self.config.is_excluded(fact.id()) {
            debug!(id = fact.id(), "skipping out-of-scope subject");
            self.report.out_of_scope_skipped += 1;
            return Ok(());
        }

        match fact {
            TermFact::PrefLabel { id, label } => self.create(id, label),
            TermFact::AltLabel { id, label } => {
                if label == self.config.empty_label_sentinel {
                    self.report.empty_alt_labels += 1;
                    return Ok(());
                }
                if self.apply(&id, TermUpdate::AddAltLabel(label))? {
                    self.report.alt_labels += 1;
                }
                Ok(())
            }
            TermFact::Broader { id, parent } => {
                if self.config.is_excluded(&parent) {
                    debug!(%id, %parent, "skipping out-of-scope broader term");
                    self.report.out_of_scope_skipped += 1;
                    return Ok(());
                }
                if self.apply(&id, TermUpdate::AddBroader(parent))? {
                    self.report.broader_links += 1;
                }
                Ok(())
            }
            TermFact::Note { id, text } => self.note(&id, text),
            TermFact::EditorialNote { id, text } => {
                if text.contains(self.config.validation_phrase.as_str()) {
                    self.flag(&id, EditorialFlag::ValidationRecord)
                } else {
                    self.note(&id, text)
                }
            }
            TermFact::TopicSubdivision { id } => self.flag(&id, EditorialFlag::TopicSubdivision),
            TermFact::GenreForm { id } => self.flag(&id, EditorialFlag::GenreForm),
        }
    }

    pub fn finish(self) -> BuildReport {
        info!(
            triples = self.report.triples,
            terms = self.report.terms_created,
            duplicates = self.report.duplicates_skipped,
            order_violations = self.report.order_violations,
            out_of_scope = self.report.out_of_scope_skipped,
            "build finished"
        );
        self.report
    }

    fn create(&mut self, id: String, label: String) -> Result<()> {
        match self.store.insert(Term::new(id, label)) {
            Ok(()) => {
                self.report.terms_created += 1;
                Ok(())
            }
            Err(StoreError::DuplicateId(id)) => {
                warn!(%id, "duplicate prefLabel, keeping the first");
                self.report.duplicates_skipped += 1;
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn note(&mut self, id: &str, text: String) -> Result<()> {
        if self.apply(id, TermUpdate::AppendNote(text))? {
            self.report.notes += 1;
        }
        Ok(())
    }

    fn flag(&mut self, id: &str, flag: EditorialFlag) -> Result<()> {
        if self.apply(id, TermUpdate::SetFlag(flag))? {
            debug!(%id, ?flag, "flag set");
            self.report.flags += 1;
        }
        Ok(())
    }

    /// `Ok(false)` when the subject has no term yet.
    fn apply(&mut self, id: &str, update: TermUpdate) -> Result<bool> {
        match self.store.update(id, update) {
            Ok(()) => Ok(true),
            Err(StoreError::MissingTerm(id)) => {
                warn!(%id, "no term for subject yet, skipping");
                self.report.order_violations += 1;
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }
}

// ============================================================================
// Entry points
// ============================================================================

fn run_pass<S, T>(builder: &mut HierarchyBuilder<'_, S>, source: T) -> Result<u64>
where
    S: TermStore + ?Sized,
    T: TripleSource,
{
    let result = source.for_each_triple(&mut |triple| {
        builder.ingest(&triple)?;
        Ok(())
    });
    match result {
        Ok(n) => Ok(n),
        Err(IngestError::Sink(err)) => match err.downcast::<HierarchyError>() {
            Ok(err) => Err(err),
            Err(other) => Err(IngestError::Sink(other).into()),
        },
        Err(err) => Err(err.into()),
    }
}

/// Single streaming pass. Requires `prefLabel` triples to precede every
/// other triple about the same subject.
pub fn build_streaming<S, T>(store: &S, source: T, config: &BuildConfig) -> Result<BuildReport>
where
    S: TermStore + ?Sized,
    T: TripleSource,
{
    let mut builder = HierarchyBuilder::new(store, config);
    run_pass(&mut builder, source)?;
    Ok(builder.finish())
}

/// Order-independent build: the first pass creates every term, the second
/// attaches labels, links, notes and flags. `open` must yield the same
/// triples each time it is called.
pub fn build_two_pass<S, T, F>(store: &S, mut open: F, config: &BuildConfig) -> Result<BuildReport>
where
    S: TermStore + ?Sized,
    T: TripleSource,
    F: FnMut() -> std::result::Result<T, IngestError>,
{
    let mut builder = HierarchyBuilder::new(store, config);

    builder.set_phase(BuildPhase::LabelsOnly);
    let read = run_pass(&mut builder, open()?)?;
    info!(triples = read, terms = builder.report().terms_created, "label pass done");

    builder.set_phase(BuildPhase::RelationsOnly);
    run_pass(&mut builder, open()?)?;
    Ok(builder.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dassie_store::{MemoryTermStore, Topmost};

    const SUBJECTS: &str = "http://id.loc.gov/authorities/subjects/";
    const SKOS: &str = "http://www.w3.org/2004/02/skos/core#";
    const MADS: &str = "http://www.loc.gov/mads/rdf/v1#";

    fn s(id: &str) -> String {
        format!("{SUBJECTS}{id}")
    }

    fn pref(id: &str, label: &str) -> Triple {
        Triple::literal(&s(id), &format!("{SKOS}prefLabel"), label, Some("en"))
    }

    fn alt(id: &str, label: &str) -> Triple {
        Triple::literal(&s(id), &format!("{SKOS}altLabel"), label, Some("en"))
    }

    fn broader(id: &str, parent: &str) -> Triple {
        Triple::iri(&s(id), &format!("{SKOS}broader"), &s(parent))
    }

    fn note(id: &str, text: &str) -> Triple {
        Triple::literal(&s(id), &format!("{SKOS}note"), text, Some("en"))
    }

    fn editorial(id: &str, text: &str) -> Triple {
        Triple::literal(&s(id), &format!("{SKOS}editorialNote"), text, None)
    }

    #[test]
    fn test_classify_member_collections() {
        let genre = Triple::iri(
            &s("sh99001"),
            &format!("{SKOS}member"),
            "http://id.loc.gov/authorities/subjects/collection_GenreFormSubdivisions",
        );
        assert_eq!(
            TermFact::classify(&genre),
            Some(TermFact::GenreForm { id: "sh99001".to_string() })
        );

        let topic = Triple::iri(
            &s("sh99002"),
            &format!("{MADS}isMemberOfMADSCollection"),
            "http://id.loc.gov/authorities/subjects/collection_LCSHAuthorizedHeadings",
        );
        assert_eq!(TermFact::classify(&topic), None);

        let other = Triple::iri(
            &s("sh99003"),
            &format!("{SKOS}member"),
            "http://id.loc.gov/authorities/subjects/collection_TopicSubdivisions",
        );
        assert_eq!(
            TermFact::classify(&other),
            Some(TermFact::TopicSubdivision { id: "sh99003".to_string() })
        );
    }

    #[test]
    fn test_classify_broader_needs_iri_object() {
        let bad = Triple::literal(&s("sh1"), &format!("{SKOS}broader"), "sh2", None);
        assert_eq!(TermFact::classify(&bad), None);
        assert_eq!(
            TermFact::classify(&broader("sh1", "sh2")),
            Some(TermFact::Broader {
                id: "sh1".to_string(),
                parent: "sh2".to_string()
            })
        );
    }

    #[test]
    fn test_streaming_build_accumulates_fields() {
        let store = MemoryTermStore::new();
        let triples = vec![
            pref("sh1", "Science"),
            pref("sh2", "Physics"),
            alt("sh2", "Natural philosophy"),
            alt("sh2", "LL"),
            broader("sh2", "sh1"),
            broader("sh2", "sh1"),
            note("sh2", " First note. "),
            editorial("sh2", "Second note."),
            editorial("sh1", "Record generated for validation purposes."),
        ];
        let report = build_streaming(&store, triples, &BuildConfig::default()).unwrap();

        assert_eq!(report.triples, 9);
        assert_eq!(report.terms_created, 2);
        assert_eq!(report.empty_alt_labels, 1);
        assert_eq!(report.notes, 2);
        assert_eq!(report.flags, 1);

        let sh2 = store.find_one("sh2").unwrap().unwrap();
        assert_eq!(sh2.alt_labels, vec!["Natural philosophy"]);
        assert_eq!(sh2.broader, vec!["sh1"]);
        assert_eq!(sh2.note.as_deref(), Some("First note.\nSecond note."));
        assert_eq!(sh2.topmost, Topmost::Uncomputed);

        let sh1 = store.find_one("sh1").unwrap().unwrap();
        assert!(sh1.flags.validation_record);
        assert!(sh1.note.is_none());
    }

    #[test]
    fn test_streaming_build_skips_and_counts_bad_rows() {
        let store = MemoryTermStore::new();
        let triples = vec![
            alt("sh1", "Too early"),
            pref("sh1", "Science"),
            pref("sh1", "Science again"),
            pref("sj96004895", "Kids"),
            broader("sj96004895", "sh1"),
            broader("sh1", "sj96004895"),
        ];
        let report = build_streaming(&store, triples, &BuildConfig::default()).unwrap();

        assert_eq!(report.order_violations, 1);
        assert_eq!(report.duplicates_skipped, 1);
        assert_eq!(report.out_of_scope_skipped, 3);
        assert_eq!(report.skipped(), 5);
        assert_eq!(store.count().unwrap(), 1);

        let sh1 = store.find_one("sh1").unwrap().unwrap();
        assert_eq!(sh1.label, "Science");
        assert!(sh1.alt_labels.is_empty());
        assert!(sh1.broader.is_empty());
    }

    #[test]
    fn test_two_pass_build_ignores_order() {
        let shuffled = vec![
            broader("sh2", "sh1"),
            alt("sh2", "Natural philosophy"),
            pref("sh2", "Physics"),
            pref("sh1", "Science"),
        ];

        let streamed = MemoryTermStore::new();
        let report =
            build_streaming(&streamed, shuffled.clone(), &BuildConfig::default()).unwrap();
        assert_eq!(report.order_violations, 2);

        let store = MemoryTermStore::new();
        let report =
            build_two_pass(&store, || Ok(shuffled.clone()), &BuildConfig::default()).unwrap();
        assert_eq!(report.triples, 8);
        assert_eq!(report.order_violations, 0);
        assert_eq!(report.terms_created, 2);

        let sh2 = store.find_one("sh2").unwrap().unwrap();
        assert_eq!(sh2.broader, vec!["sh1"]);
        assert_eq!(sh2.alt_labels, vec!["Natural philosophy"]);
    }

    #[test]
    fn test_custom_config_changes_skips() {
        let config = BuildConfig {
            excluded_prefixes: vec![],
            empty_label_sentinel: "--".to_string(),
            ..BuildConfig::default()
        };
        let store = MemoryTermStore::new();
        let triples = vec![pref("sj1", "Kids"), alt("sj1", "LL"), alt("sj1", "--")];
        let report = build_streaming(&store, triples, &config).unwrap();
        assert_eq!(report.terms_created, 1);
        assert_eq!(report.empty_alt_labels, 1);
        assert_eq!(store.find_one("sj1").unwrap().unwrap().alt_labels, vec!["LL"]);
    }
}

//! Dassie term store
//!
//! Holds one [`Term`] record per LCSH subject heading and exposes the small
//! set of operations the hierarchy passes need:
//!
//! ```text
//!   find_one(id)        point lookup
//!   find(filter)        filtered scan (broader empty / non-empty, topmost uncomputed, ...)
//!   insert(term)        fails on duplicate id
//!   update(id, change)  atomic read-modify-write of one field, fails on unknown id
//!   search(regex)       label / alt label / note pattern search
//!   search_words(text)  token search over label + alt labels (inverted index)
//! ```
//!
//! Two implementations ship here:
//!
//! - [`MemoryTermStore`]: a `BTreeMap` behind a `parking_lot::RwLock`.
//! - [`TermDb`]: the memory store plus a bincode snapshot and a write-ahead
//!   log in a database directory.
//!
//! Every update goes through the store's write lock, so two writers touching
//! the same record (e.g. two children appending to one parent's `narrower`
//! set) cannot lose each other's changes.

pub mod error;
pub mod memory;
pub mod persistence;
mod text_index;


use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryTermStore;
pub use persistence::{TermDb, WalEntry, WriteAheadLog};
pub use text_index::tokenize;

/// Base IRI of LCSH subject authorities.
pub const LCSH_SUBJECTS_BASE: &str = "http://id.loc.gov/authorities/subjects/";

// ============================================================================
// Term model
// ============================================================================

/// Topmost-ancestor state of a term.
///
/// A root term is `Root`, never `Ancestors` with an empty set and never
/// `Uncomputed` once the resolver has run.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Topmost {
    #[default]
    Uncomputed,
    /// The term itself has no broader term.
    Root,
    /// Non-empty set of root ids reachable through `broader`.
    Ancestors(BTreeSet<String>),
}

impl Topmost {
    pub fn is_computed(&self) -> bool {
        !matches!(self, Topmost::Uncomputed)
    }

    pub fn is_root(&self) -> bool {
        matches!(self, Topmost::Root)
    }

    /// Ancestor ids, empty for `Root` and `Uncomputed`.
    pub fn ancestors(&self) -> impl Iterator<Item = &str> {
        let set = match self {
            Topmost::Ancestors(set) => Some(set),
            _ => None,
        };
        set.into_iter().flatten().map(String::as_str)
    }
}

/// Boolean annotations carried by editorial triples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EditorialFlags {
    pub validation_record: bool,
    pub topic_subdivision: bool,
    pub genre_form: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EditorialFlag {
    ValidationRecord,
    TopicSubdivision,
    GenreForm,
}

impl EditorialFlags {
    pub fn set(&mut self, flag: EditorialFlag) {
        match flag {
            EditorialFlag::ValidationRecord => self.validation_record = true,
            EditorialFlag::TopicSubdivision => self.topic_subdivision = true,
            EditorialFlag::GenreForm => self.genre_form = true,
        }
    }
}

/// One LCSH subject heading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Term {
    /// Identifier such as `sh85098119`; primary key.
    pub id: String,
    /// Preferred label.
    pub label: String,
    pub alt_labels: Vec<String>,
    /// Parent ids in the order they were seen. Never contains duplicates.
    pub broader: Vec<String>,
    /// Child ids; derived from `broader` across the whole store.
    pub narrower: BTreeSet<String>,
    pub topmost: Topmost,
    pub note: Option<String>,
    pub flags: EditorialFlags,
}

impl Term {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            alt_labels: Vec::new(),
            broader: Vec::new(),
            narrower: BTreeSet::new(),
            topmost: Topmost::Uncomputed,
            note: None,
            flags: EditorialFlags::default(),
        }
    }

    /// Builder-style helper, mostly for fixtures.
    pub fn with_broader<I, S>(mut self, parents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for parent in parents {
            self.apply(TermUpdate::AddBroader(parent.into()));
        }
        self
    }

    pub fn is_root(&self) -> bool {
        self.broader.is_empty()
    }

    /// Public page of the heading on id.loc.gov.
    pub fn url(&self) -> String {
        format!("{LCSH_SUBJECTS_BASE}{}.html", self.id)
    }

    /// Apply one field update in place. Set-valued fields ignore repeats.
    pub fn apply(&mut self, update: TermUpdate) {
        match update {
            TermUpdate::AddAltLabel(label) => self.alt_labels.push(label),
            TermUpdate::AddBroader(parent) => {
                if !self.broader.contains(&parent) {
                    self.broader.push(parent);
                }
            }
            TermUpdate::AddNarrower(child) => {
                self.narrower.insert(child);
            }
            TermUpdate::AppendNote(text) => match &mut self.note {
                Some(existing) if !existing.is_empty() => {
                    existing.push('\n');
                    existing.push_str(&text);
                }
                _ => self.note = Some(text),
            },
            TermUpdate::SetFlag(flag) => self.flags.set(flag),
            TermUpdate::SetTopmost(topmost) => self.topmost = topmost,
        }
    }
}

/// A single-field change, applied atomically by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TermUpdate {
    AddAltLabel(String),
    AddBroader(String),
    AddNarrower(String),
    AppendNote(String),
    SetFlag(EditorialFlag),
    SetTopmost(Topmost),
}

/// Scan filters supported by [`TermStore::find`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermFilter {
    All,
    BroaderEmpty,
    BroaderNonEmpty,
    TopmostUncomputed,
    NarrowerNonEmpty,
}

impl TermFilter {
    pub fn matches(&self, term: &Term) -> bool {
        match self {
            TermFilter::All => true,
            TermFilter::BroaderEmpty => term.broader.is_empty(),
            TermFilter::BroaderNonEmpty => !term.broader.is_empty(),
            TermFilter::TopmostUncomputed => !term.topmost.is_computed(),
            TermFilter::NarrowerNonEmpty => !term.narrower.is_empty(),
        }
    }
}

/// Provenance of a built database (shown by `summarize`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbInfo {
    /// File (or URL) the triples were read from.
    pub source: String,
    /// Issue date of the LCSH dump, as given by the operator.
    pub issued: Option<String>,
    pub built_at: DateTime<Utc>,
}

// ============================================================================
// Store contract
// ============================================================================

/// Keyed term collection consumed by the hierarchy passes.
///
/// All methods take `&self`: implementations synchronize internally, and
/// [`TermStore::update`] is a single atomic read-modify-write.
pub trait TermStore {
    fn find_one(&self, id: &str) -> StoreResult<Option<Term>>;

    /// Snapshot of every term matching `filter`, ordered by id.
    fn find(&self, filter: TermFilter) -> StoreResult<Vec<Term>>;

    /// Ids of every term matching `filter`, ordered by id.
    fn find_ids(&self, filter: TermFilter) -> StoreResult<Vec<String>> {
        Ok(self.find(filter)?.into_iter().map(|t| t.id).collect())
    }

    fn insert(&self, term: Term) -> StoreResult<()>;

    fn update(&self, id: &str, update: TermUpdate) -> StoreResult<()>;

    fn contains(&self, id: &str) -> StoreResult<bool> {
        Ok(self.find_one(id)?.is_some())
    }

    fn count(&self) -> StoreResult<usize>;

    /// Terms whose label, an alt label, or note matches `pattern`.
    fn search(&self, pattern: &Regex) -> StoreResult<Vec<Term>>;

    /// Terms whose label or alt labels contain every token of `query`.
    fn search_words(&self, query: &str) -> StoreResult<Vec<Term>>;

    /// Build secondary indexes ahead of queries. Idempotent.
    fn ensure_indexes(&self) -> StoreResult<()>;

    fn info(&self) -> StoreResult<Option<DbInfo>>;

    fn set_info(&self, info: DbInfo) -> StoreResult<()>;
}

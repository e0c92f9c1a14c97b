//! In-memory term store.

use std::collections::BTreeMap;

use parking_lot::RwLock;
use regex::Regex;

use crate::text_index::TextIndexCache;
use crate::{DbInfo, StoreError, StoreResult, Term, TermFilter, TermStore, TermUpdate};

/// Terms keyed by id, behind a single reader/writer lock.
#[derive(Debug, Default)]
pub struct MemoryTermStore {
    terms: RwLock<BTreeMap<String, Term>>,
    info: RwLock<Option<DbInfo>>,
    text_index: TextIndexCache,
}

impl MemoryTermStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from already-constructed terms (fixtures, snapshots).
    pub fn from_terms(terms: impl IntoIterator<Item = Term>) -> StoreResult<Self> {
        let store = Self::new();
        for term in terms {
            store.insert(term)?;
        }
        Ok(store)
    }

    pub(crate) fn with_contents(terms: BTreeMap<String, Term>, info: Option<DbInfo>) -> Self {
        Self {
            terms: RwLock::new(terms),
            info: RwLock::new(info),
            text_index: TextIndexCache::default(),
        }
    }

    /// Run `f` over the current contents without cloning them.
    pub(crate) fn with_terms<R>(&self, f: impl FnOnce(&BTreeMap<String, Term>) -> R) -> R {
        f(&self.terms.read())
    }
}

impl TermStore for MemoryTermStore {
    fn find_one(&self, id: &str) -> StoreResult<Option<Term>> {
        Ok(self.terms.read().get(id).cloned())
    }

    fn find(&self, filter: TermFilter) -> StoreResult<Vec<Term>> {
        Ok(self
            .terms
            .read()
            .values()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect())
    }

    fn find_ids(&self, filter: TermFilter) -> StoreResult<Vec<String>> {
        Ok(self
            .terms
            .read()
            .values()
            .filter(|t| filter.matches(t))
            .map(|t| t.id.clone())
            .collect())
    }

    fn insert(&self, term: Term) -> StoreResult<()> {
        let mut terms = self.terms.write();
        if terms.contains_key(&term.id) {
            return Err(StoreError::DuplicateId(term.id));
        }
        terms.insert(term.id.clone(), term);
        self.text_index.invalidate();
        Ok(())
    }

    fn update(&self, id: &str, update: TermUpdate) -> StoreResult<()> {
        let mut terms = self.terms.write();
        let term = terms
            .get_mut(id)
            .ok_or_else(|| StoreError::MissingTerm(id.to_string()))?;
        if matches!(update, TermUpdate::AddAltLabel(_)) {
            self.text_index.invalidate();
        }
        term.apply(update);
        Ok(())
    }

    fn contains(&self, id: &str) -> StoreResult<bool> {
        Ok(self.terms.read().contains_key(id))
    }

    fn count(&self) -> StoreResult<usize> {
        Ok(self.terms.read().len())
    }

    fn search(&self, pattern: &Regex) -> StoreResult<Vec<Term>> {
        Ok(self
            .terms
            .read()
            .values()
            .filter(|t| {
                pattern.is_match(&t.label)
                    || t.alt_labels.iter().any(|l| pattern.is_match(l))
                    || t.note.as_deref().is_some_and(|n| pattern.is_match(n))
            })
            .cloned()
            .collect())
    }

    fn search_words(&self, query: &str) -> StoreResult<Vec<Term>> {
        let terms = self.terms.read();
        let ids = self.text_index.query_all(&terms, query);
        Ok(ids.iter().filter_map(|id| terms.get(id).cloned()).collect())
    }

    fn ensure_indexes(&self) -> StoreResult<()> {
        self.text_index.ensure_built(&self.terms.read());
        Ok(())
    }

    fn info(&self) -> StoreResult<Option<DbInfo>> {
        Ok(self.info.read().clone())
    }

    fn set_info(&self, info: DbInfo) -> StoreResult<()> {
        *self.info.write() = Some(info);
        Ok(())
    }
}

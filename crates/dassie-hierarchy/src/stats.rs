//! Whole-database summary.

use crate::error::Result;
use dassie_store::{DbInfo, TermFilter, TermStore, Topmost};
use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Statistics {
    pub terms: usize,
    pub roots: usize,
    pub with_narrower: usize,
    /// Terms still `Uncomputed` (non-zero means the topmost pass has not run).
    pub unresolved: usize,
    pub max_roots_per_term: usize,
    /// Over terms with an ancestor set.
    pub mean_roots_per_term: f64,
    pub validation_records: usize,
    pub topic_subdivisions: usize,
    pub genre_forms: usize,
    pub info: Option<DbInfo>,
}

pub fn collect_statistics<S: TermStore + ?Sized>(store: &S) -> Result<Statistics> {
    let mut stats = Statistics {
        info: store.info()?,
        ..Statistics::default()
    };
    let mut with_ancestors = 0usize;
    let mut total_roots = 0usize;

    for term in store.find(TermFilter::All)? {
        stats.terms += 1;
        if term.is_root() {
            stats.roots += 1;
        }
        if !term.narrower.is_empty() {
            stats.with_narrower += 1;
        }
        match &term.topmost {
            Topmost::Uncomputed => stats.unresolved += 1,
            Topmost::Root => {}
            Topmost::Ancestors(roots) => {
                with_ancestors += 1;
                total_roots += roots.len();
                stats.max_roots_per_term = stats.max_roots_per_term.max(roots.len());
            }
        }
        stats.validation_records += usize::from(term.flags.validation_record);
        stats.topic_subdivisions += usize::from(term.flags.topic_subdivision);
        stats.genre_forms += usize::from(term.flags.genre_form);
    }

    if with_ancestors > 0 {
        stats.mean_roots_per_term = total_roots as f64 / with_ancestors as f64;
    }
    Ok(stats)
}

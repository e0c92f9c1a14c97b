//! Narrower-link derivation: writes the inverse of `broader`.
//!
//! Each child contributes one `AddNarrower` per parent. The store applies
//! that as an atomic set insert, so reruns leave `narrower` unchanged and
//! the parallel variant cannot lose updates to a shared parent.

use crate::config::TraversalConfig;
use crate::error::{HierarchyError, Result};
use dassie_store::{StoreError, Term, TermFilter, TermStore, TermUpdate};
use rayon::prelude::*;
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::info;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NarrowerReport {
    /// Terms with at least one broader link.
    pub children: usize,
    /// `AddNarrower` updates issued (repeats included).
    pub links: usize,
}

fn link_child<S: TermStore + ?Sized>(store: &S, child: &Term) -> Result<usize> {
    for parent in &child.broader {
        match store.update(parent, TermUpdate::AddNarrower(child.id.clone())) {
            Ok(()) => {}
            Err(StoreError::MissingTerm(_)) => {
                return Err(HierarchyError::DanglingReference {
                    child: child.id.clone(),
                    parent: parent.clone(),
                })
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(child.broader.len())
}

fn tick(done: usize, links: usize, every: usize) {
    if every > 0 && done % every == 0 {
        info!(children = done, links, "narrower progress");
    }
}

/// Sequential pass over every term with a non-empty `broader`.
pub fn derive_narrower<S: TermStore + ?Sized>(
    store: &S,
    config: TraversalConfig,
) -> Result<NarrowerReport> {
    let children = store.find(TermFilter::BroaderNonEmpty)?;
    let mut links = 0;
    for (i, child) in children.iter().enumerate() {
        links += link_child(store, child)?;
        tick(i + 1, links, config.progress_every);
    }
    let report = NarrowerReport {
        children: children.len(),
        links,
    };
    info!(children = report.children, links = report.links, "narrower links derived");
    Ok(report)
}

/// Same result as [`derive_narrower`], fanned out over the rayon pool.
pub fn derive_narrower_parallel<S: TermStore + Sync + ?Sized>(
    store: &S,
    config: TraversalConfig,
) -> Result<NarrowerReport> {
    let children = store.find(TermFilter::BroaderNonEmpty)?;
    let done = AtomicUsize::new(0);
    let written = AtomicUsize::new(0);
    let links = children
        .par_iter()
        .map(|child| -> Result<usize> {
            let n = link_child(store, child)?;
            let links = written.fetch_add(n, Ordering::Relaxed) + n;
            tick(done.fetch_add(1, Ordering::Relaxed) + 1, links, config.progress_every);
            Ok(n)
        })
        .try_reduce(|| 0, |a, b| Ok(a + b))?;
    let report = NarrowerReport {
        children: children.len(),
        links,
    };
    info!(
        children = report.children,
        links = report.links,
        threads = rayon::current_num_threads(),
        "narrower links derived"
    );
    Ok(report)
}

//! Topmost resolution: the set of roots reachable from each term.
//!
//! Roots are marked first. Every other term is then resolved by a
//! depth-first walk up `broader` on an explicit stack. Finished terms go
//! into an in-memory memo and are written to the store straight away, so
//! shared ancestors are walked once. A parent that is still on the stack
//! means the graph has a cycle, which aborts the pass.
//!
//! Resolution is single-writer: one resolver per store at a time.

use crate::config::TraversalConfig;
use crate::error::{HierarchyError, Result};
use dassie_store::{Term, TermFilter, TermStore, TermUpdate, Topmost};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TopmostReport {
    /// Terms with no broader term.
    pub roots: usize,
    /// Non-root terms given an ancestor set in this run.
    pub resolved: usize,
}

struct Frame {
    id: String,
    parents: Vec<String>,
    next: usize,
    acc: BTreeSet<String>,
}

impl Frame {
    fn new(term: Term) -> Self {
        Self {
            id: term.id,
            parents: term.broader,
            next: 0,
            acc: BTreeSet::new(),
        }
    }
}

/// Adds what `parent` contributes to a child's ancestor set.
fn merge(acc: &mut BTreeSet<String>, parent: &str, topmost: &Topmost) {
    match topmost {
        Topmost::Root => {
            acc.insert(parent.to_string());
        }
        Topmost::Ancestors(roots) => acc.extend(roots.iter().cloned()),
        Topmost::Uncomputed => {}
    }
}

pub struct TopmostResolver<'a, S: TermStore + ?Sized> {
    store: &'a S,
    config: TraversalConfig,
    memo: HashMap<String, Topmost>,
    report: TopmostReport,
}

impl<'a, S: TermStore + ?Sized> TopmostResolver<'a, S> {
    pub fn new(store: &'a S, config: TraversalConfig) -> Self {
        Self {
            store,
            config,
            memo: HashMap::new(),
            report: TopmostReport::default(),
        }
    }

    pub fn report(&self) -> TopmostReport {
        self.report
    }

    /// Both phases over the whole store.
    pub fn resolve_all(&mut self) -> Result<TopmostReport> {
        for root in self.store.find(TermFilter::BroaderEmpty)? {
            if !root.topmost.is_root() {
                self.store.update(&root.id, TermUpdate::SetTopmost(Topmost::Root))?;
            }
            self.memo.insert(root.id, Topmost::Root);
            self.report.roots += 1;
        }
        info!(roots = self.report.roots, "roots marked");

        let pending = self.store.find_ids(TermFilter::TopmostUncomputed)?;
        let total = pending.len();
        debug!(pending = total, "resolving topmost terms");
        let every = self.config.progress_every;
        for (i, id) in pending.iter().enumerate() {
            if !self.memo.contains_key(id) {
                self.resolve(id)?;
            }
            if every > 0 && (i + 1) % every == 0 {
                info!(
                    done = i + 1,
                    total,
                    resolved = self.report.resolved,
                    "topmost progress"
                );
            }
        }
        info!(resolved = self.report.resolved, "topmost terms resolved");
        Ok(self.report)
    }

    /// Topmost state of one term, resolving (and storing) any uncomputed
    /// ancestors on the way.
    pub fn resolve(&mut self, id: &str) -> Result<Topmost> {
        if let Some(done) = self.memo.get(id) {
            return Ok(done.clone());
        }
        let term = self
            .store
            .find_one(id)?
            .ok_or_else(|| HierarchyError::MissingTerm(id.to_string()))?;
        if let Some(done) = self.settled(&term)? {
            return Ok(done);
        }

        let start = term.id.clone();
        let mut stack = vec![Frame::new(term)];
        let mut on_stack: HashMap<String, usize> = HashMap::from([(start.clone(), 0)]);

        loop {
            let Some(top) = stack.last_mut() else {
                return Err(HierarchyError::MissingTerm(start));
            };

            if top.next < top.parents.len() {
                let parent = top.parents[top.next].clone();
                top.next += 1;

                if let Some(done) = self.memo.get(&parent) {
                    merge(&mut top.acc, &parent, done);
                    continue;
                }
                if let Some(&pos) = on_stack.get(&parent) {
                    let mut chain: Vec<String> =
                        stack[pos..].iter().map(|f| f.id.clone()).collect();
                    chain.push(parent);
                    return Err(HierarchyError::Cycle { chain });
                }

                let child = top.id.clone();
                let parent_term = self.store.find_one(&parent)?.ok_or_else(|| {
                    HierarchyError::DanglingReference {
                        child,
                        parent: parent.clone(),
                    }
                })?;
                if let Some(done) = self.settled(&parent_term)? {
                    merge(&mut top.acc, &parent, &done);
                    continue;
                }

                if stack.len() >= self.config.max_depth {
                    return Err(HierarchyError::DepthExceeded {
                        start,
                        limit: self.config.max_depth,
                    });
                }
                on_stack.insert(parent, stack.len());
                stack.push(Frame::new(parent_term));
                continue;
            }

            // All parents merged: this frame is finished.
            let Some(frame) = stack.pop() else {
                return Err(HierarchyError::MissingTerm(start));
            };
            on_stack.remove(&frame.id);
            let topmost = Topmost::Ancestors(frame.acc);
            self.store
                .update(&frame.id, TermUpdate::SetTopmost(topmost.clone()))?;
            self.report.resolved += 1;

            match stack.last_mut() {
                Some(parent_frame) => {
                    merge(&mut parent_frame.acc, &frame.id, &topmost);
                    self.memo.insert(frame.id, topmost);
                }
                None => {
                    self.memo.insert(frame.id, topmost.clone());
                    return Ok(topmost);
                }
            }
        }
    }

    /// Result for a term that needs no walk: roots, and terms resolved by an
    /// earlier run. Newly seen roots are written back.
    fn settled(&mut self, term: &Term) -> Result<Option<Topmost>> {
        let done = if term.broader.is_empty() {
            if !term.topmost.is_root() {
                self.store
                    .update(&term.id, TermUpdate::SetTopmost(Topmost::Root))?;
            }
            Topmost::Root
        } else if term.topmost.is_computed() {
            term.topmost.clone()
        } else {
            return Ok(None);
        };
        self.memo.insert(term.id.clone(), done.clone());
        Ok(Some(done))
    }
}

/// Run both topmost phases with a fresh resolver.
pub fn resolve_topmost<S: TermStore + ?Sized>(
    store: &S,
    config: TraversalConfig,
) -> Result<TopmostReport> {
    TopmostResolver::new(store, config).resolve_all()
}

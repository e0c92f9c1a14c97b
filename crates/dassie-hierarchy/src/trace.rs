//! Path tracing: every chain of `broader` links from a term to a root.
//!
//! Paths come back leaf-first (`[start, parent, ..., root]`), one per
//! parent per parent-path, in `broader` order. The walk is a post-order
//! traversal on an explicit stack; each term's paths are computed once and
//! reused by every child that reaches it. Memoized paths share their upper
//! part, so a long chain costs one link per term.

use crate::config::TraversalConfig;
use crate::error::{HierarchyError, Result};
use dassie_store::{Term, TermStore};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

/// One chain of terms, starting term first, root last.
pub type Path = Vec<Term>;

/// Shared-tail path: `id`, then the path of the parent it came through.
struct Link {
    id: String,
    up: Option<Rc<Link>>,
}

impl Link {
    fn ids(&self) -> impl Iterator<Item = &str> {
        std::iter::successors(Some(self), |link| link.up.as_deref()).map(|link| link.id.as_str())
    }
}

impl Drop for Link {
    // Unlink iteratively; a deep chain would otherwise drop recursively.
    fn drop(&mut self) {
        let mut up = self.up.take();
        while let Some(link) = up {
            match Rc::try_unwrap(link) {
                Ok(mut owned) => up = owned.up.take(),
                Err(_) => break,
            }
        }
    }
}

struct Frame {
    id: String,
    next: usize,
}

pub struct PathTracer<'a, S: TermStore + ?Sized> {
    store: &'a S,
    config: TraversalConfig,
    terms: HashMap<String, Term>,
    paths: HashMap<String, Vec<Rc<Link>>>,
}

impl<'a, S: TermStore + ?Sized> PathTracer<'a, S> {
    pub fn new(store: &'a S, config: TraversalConfig) -> Self {
        Self {
            store,
            config,
            terms: HashMap::new(),
            paths: HashMap::new(),
        }
    }

    pub fn trace(&mut self, start: &str) -> Result<Vec<Path>> {
        self.walk(start)?;
        let Some(links) = self.paths.get(start) else {
            return Err(HierarchyError::MissingTerm(start.to_string()));
        };
        links
            .iter()
            .map(|link| {
                link.ids()
                    .map(|id| {
                        self.terms
                            .get(id)
                            .cloned()
                            .ok_or_else(|| HierarchyError::MissingTerm(id.to_string()))
                    })
                    .collect()
            })
            .collect()
    }

    fn load(&mut self, id: &str) -> Result<&Term> {
        if !self.terms.contains_key(id) {
            let term = self
                .store
                .find_one(id)?
                .ok_or_else(|| HierarchyError::MissingTerm(id.to_string()))?;
            self.terms.insert(id.to_string(), term);
        }
        self.terms
            .get(id)
            .ok_or_else(|| HierarchyError::MissingTerm(id.to_string()))
    }

    fn parent_at(&self, id: &str, index: usize) -> Option<String> {
        self.terms.get(id).and_then(|t| t.broader.get(index)).cloned()
    }

    fn walk(&mut self, start: &str) -> Result<()> {
        if self.paths.contains_key(start) {
            return Ok(());
        }
        self.load(start)?;
        let mut stack = vec![Frame {
            id: start.to_string(),
            next: 0,
        }];
        let mut on_stack: HashSet<String> = HashSet::from([start.to_string()]);

        while let Some(top) = stack.last_mut() {
            if let Some(parent) = self.parent_at(&top.id, top.next) {
                top.next += 1;
                if self.paths.contains_key(&parent) {
                    continue;
                }
                if on_stack.contains(&parent) {
                    let from = stack.iter().position(|f| f.id == parent).unwrap_or(0);
                    let mut chain: Vec<String> =
                        stack[from..].iter().map(|f| f.id.clone()).collect();
                    chain.push(parent);
                    return Err(HierarchyError::Cycle { chain });
                }
                if stack.len() >= self.config.max_depth {
                    return Err(HierarchyError::DepthExceeded {
                        start: start.to_string(),
                        limit: self.config.max_depth,
                    });
                }
                self.load(&parent)?;
                on_stack.insert(parent.clone());
                stack.push(Frame { id: parent, next: 0 });
                continue;
            }

            let Some(frame) = stack.pop() else { break };
            on_stack.remove(&frame.id);
            let paths = self.join_parents(&frame.id, start)?;
            self.paths.insert(frame.id, paths);
        }
        Ok(())
    }

    /// Paths of `id` from the already-computed paths of its parents.
    fn join_parents(&self, id: &str, start: &str) -> Result<Vec<Rc<Link>>> {
        let parents = self
            .terms
            .get(id)
            .map(|t| t.broader.as_slice())
            .unwrap_or_default();
        if parents.is_empty() {
            return Ok(vec![Rc::new(Link {
                id: id.to_string(),
                up: None,
            })]);
        }

        let mut out = Vec::new();
        for parent in parents {
            let Some(upper) = self.paths.get(parent) else {
                return Err(HierarchyError::MissingTerm(parent.clone()));
            };
            for path in upper {
                if out.len() >= self.config.max_paths {
                    return Err(HierarchyError::TooManyPaths {
                        start: start.to_string(),
                        limit: self.config.max_paths,
                    });
                }
                out.push(Rc::new(Link {
                    id: id.to_string(),
                    up: Some(Rc::clone(path)),
                }));
            }
        }
        Ok(out)
    }
}

/// Trace `start` with a one-off tracer.
pub fn trace<S: TermStore + ?Sized>(
    store: &S,
    start: &str,
    config: TraversalConfig,
) -> Result<Vec<Path>> {
    PathTracer::new(store, config).trace(start)
}

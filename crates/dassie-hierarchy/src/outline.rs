//! Downward listing of a term's `narrower` subtree.

use crate::error::{HierarchyError, Result};
use dassie_store::{Term, TermStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutlineRow {
    /// 0 for the starting term.
    pub depth: usize,
    pub term: Term,
}

/// Pre-order walk of `narrower` links from `start`, children in id order,
/// stopping below `max_depth`. A term with several parents in the subtree
/// is listed under each of them.
pub fn outline<S: TermStore + ?Sized>(
    store: &S,
    start: &str,
    max_depth: usize,
) -> Result<Vec<OutlineRow>> {
    let mut rows = Vec::new();
    let mut path: Vec<String> = Vec::new();
    let mut stack = vec![(0usize, start.to_string())];

    while let Some((depth, id)) = stack.pop() {
        path.truncate(depth);
        if path.contains(&id) {
            let mut chain = path.clone();
            chain.push(id);
            return Err(HierarchyError::Cycle { chain });
        }
        let term = store
            .find_one(&id)?
            .ok_or_else(|| HierarchyError::MissingTerm(id.clone()))?;
        if depth < max_depth {
            for child in term.narrower.iter().rev() {
                stack.push((depth + 1, child.clone()));
            }
        }
        path.push(id);
        rows.push(OutlineRow { depth, term });
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TraversalConfig;
    use crate::narrower::derive_narrower;
    use dassie_store::MemoryTermStore;

    fn store() -> MemoryTermStore {
        let store = MemoryTermStore::from_terms(vec![
            Term::new("sh1", "Science"),
            Term::new("sh2", "Physics").with_broader(["sh1"]),
            Term::new("sh3", "Biophysics").with_broader(["sh1", "sh4"]),
            Term::new("sh4", "Biology").with_broader(["sh1"]),
            Term::new("sh5", "Optics").with_broader(["sh2"]),
        ])
        .unwrap();
        derive_narrower(&store, TraversalConfig::default()).unwrap();
        store
    }

    fn rows(rows: &[OutlineRow]) -> Vec<(usize, &str)> {
        rows.iter().map(|r| (r.depth, r.term.id.as_str())).collect()
    }

    #[test]
    fn test_outline_lists_subtree_in_preorder() {
        let store = store();
        let out = outline(&store, "sh1", 10).unwrap();
        assert_eq!(
            rows(&out),
            vec![(0, "sh1"), (1, "sh2"), (2, "sh5"), (1, "sh3"), (1, "sh4"), (2, "sh3")]
        );
    }

    #[test]
    fn test_outline_depth_limit() {
        let store = store();
        let out = outline(&store, "sh1", 1).unwrap();
        assert_eq!(rows(&out), vec![(0, "sh1"), (1, "sh2"), (1, "sh3"), (1, "sh4")]);
        assert_eq!(rows(&outline(&store, "sh5", 3).unwrap()), vec![(0, "sh5")]);
    }

    #[test]
    fn test_outline_unknown_start() {
        let store = store();
        assert!(matches!(
            outline(&store, "sh404", 3),
            Err(HierarchyError::MissingTerm(id)) if id == "sh404"
        ));
    }
}

use dassie_ingest_rdf::IngestError;
use dassie_store::StoreError;

pub type Result<T> = std::result::Result<T, HierarchyError>;

#[derive(Debug, thiserror::Error)]
pub enum HierarchyError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error("term {0} not found")]
    MissingTerm(String),

    /// A `broader` id that names no term.
    #[error("broader term {parent} of {child} not found")]
    DanglingReference { child: String, parent: String },

    #[error("cycle in broader links: {}", chain.join(" -> "))]
    Cycle { chain: Vec<String> },

    #[error("broader chain from {start} is deeper than {limit} levels")]
    DepthExceeded { start: String, limit: usize },

    #[error("{start} has more than {limit} paths to its roots")]
    TooManyPaths { start: String, limit: usize },
}

impl HierarchyError {
    /// Lookup failures a user can cause by asking about the wrong id.
    pub fn is_missing_term(&self) -> bool {
        matches!(
            self,
            HierarchyError::MissingTerm(_) | HierarchyError::Store(StoreError::MissingTerm(_))
        )
    }

    /// The broader graph itself is broken (dangling link, cycle) or too big
    /// to walk within the configured limits.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            HierarchyError::DanglingReference { .. }
                | HierarchyError::Cycle { .. }
                | HierarchyError::DepthExceeded { .. }
                | HierarchyError::TooManyPaths { .. }
        )
    }
}

//! LCSH hierarchy construction and traversal.
//!
//! The passes run strictly in sequence over a [`TermStore`]:
//!
//! ```text
//!   triples ──► builder ──► store ──► narrower ──► store ──► topmost ──► store
//!                                                                          │
//!                                  trace / outline / statistics ◄──────────┘
//! ```
//!
//! - [`builder`]: creates one term per `prefLabel`, then attaches alt labels,
//!   broader links, notes and editorial flags.
//! - [`narrower`]: writes the inverse of every `broader` link.
//! - [`topmost`]: marks roots and records, for every other term, the set of
//!   roots reachable through `broader`.
//! - [`trace`]: enumerates every path from a term up to its roots.
//! - [`outline`], [`stats`]: downward listing and database summary.
//!
//! Traversals use explicit work stacks (no native recursion), detect cycles,
//! and stop at [`TraversalConfig::max_depth`].

pub mod builder;
pub mod config;
pub mod error;
pub mod narrower;
pub mod outline;
pub mod stats;
pub mod topmost;
pub mod trace;

pub use builder::{build_streaming, build_two_pass, BuildReport, HierarchyBuilder, TermFact};
pub use config::{BuildConfig, TraversalConfig};
pub use error::{HierarchyError, Result};
pub use narrower::{derive_narrower, derive_narrower_parallel, NarrowerReport};
pub use outline::{outline, OutlineRow};
pub use stats::{collect_statistics, Statistics};
pub use topmost::{resolve_topmost, TopmostReport, TopmostResolver};
pub use trace::{trace, Path, PathTracer};

pub use dassie_store::TermStore;

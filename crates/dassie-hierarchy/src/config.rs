use serde::{Deserialize, Serialize};

/// Knobs for the hierarchy builder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Id prefixes of vocabularies kept out of the database
    /// (`sj`: Children's Subject Headings).
    pub excluded_prefixes: Vec<String>,
    /// Alt label value the source uses to mean "no value".
    pub empty_label_sentinel: String,
    /// Editorial note text marking a record generated for validation.
    pub validation_phrase: String,
    /// Log progress every this many triples (0 disables).
    pub progress_every: u64,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            excluded_prefixes: vec!["sj".to_string()],
            empty_label_sentinel: "LL".to_string(),
            validation_phrase: "Record generated for validation purposes".to_string(),
            progress_every: 100_000,
        }
    }
}

impl BuildConfig {
    pub fn is_excluded(&self, id: &str) -> bool {
        self.excluded_prefixes.iter().any(|p| id.starts_with(p.as_str()))
    }
}

/// Limits and progress cadence for the post-build passes and graph walks
/// (narrower derivation, topmost resolution, tracing, outlines).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraversalConfig {
    /// Longest broader chain a walk will follow.
    pub max_depth: usize,
    /// Most root paths a trace may return.
    pub max_paths: usize,
    /// Log pass progress every this many terms (0 disables).
    pub progress_every: usize,
}

impl Default for TraversalConfig {
    fn default() -> Self {
        Self {
            max_depth: 512,
            max_paths: 10_000,
            progress_every: 1_000,
        }
    }
}

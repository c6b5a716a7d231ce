use serde::{Deserialize, Serialize};

/// Tunes the bounded searches and the defaults of the normalizer.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Is the largest attribute count for which candidate keys are enumerated
    /// exhaustively. Larger relations keep their declared keys.
    pub key_search_limit: usize,

    /// Is the largest attribute count for which multi-valued and join
    /// dependencies are searched in the tuples.
    pub dependency_search_limit: usize,

    /// Synthesizes a `{name}_id` primary key for relations that declare none.
    pub generate_primary_key: bool,

    /// Bounds the classify and decompose passes within a single stage.
    pub max_stage_passes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            key_search_limit: 12,
            dependency_search_limit: 8,
            generate_primary_key: false,
            max_stage_passes: 16,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key_search_limit(mut self, limit: usize) -> Self {
        self.key_search_limit = limit;
        self
    }

    pub fn with_dependency_search_limit(mut self, limit: usize) -> Self {
        self.dependency_search_limit = limit;
        self
    }

    pub fn with_generated_primary_key(mut self, generate: bool) -> Self {
        self.generate_primary_key = generate;
        self
    }

    pub fn with_max_stage_passes(mut self, passes: usize) -> Self {
        self.max_stage_passes = passes.max(1);
        self
    }
}

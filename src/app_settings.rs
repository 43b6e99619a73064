use std::path::PathBuf;

use element_locator::{FuzzyMatcher, TieBreak, Timings, DEFAULT_CUTOFF, DEFAULT_MAX_DEPTH};
use serde::{Deserialize, Serialize};
use souldesk_element::MEMORY_BACKEND;

/// Settings read from `config.yaml`; every field is optional in the file.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Registered backend to search
    pub backend: String,

    /// Element tree (JSON or YAML) served by the memory backend
    pub tree: Option<PathBuf>,

    pub timings: Timings,

    /// Minimum fuzzy score accepted for `best_match`
    pub fuzzy_cutoff: f64,

    pub tie_break: TieBreak,

    /// Depth cap for searches that do not set one
    pub max_depth: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: MEMORY_BACKEND.to_string(),
            tree: None,
            timings: Timings::default(),
            fuzzy_cutoff: DEFAULT_CUTOFF,
            tie_break: TieBreak::default(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl Config {
    pub fn matcher(&self) -> FuzzyMatcher {
        FuzzyMatcher::new(self.fuzzy_cutoff).with_tie_break(self.tie_break)
    }
}

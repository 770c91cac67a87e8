//! Search configuration, loadable from JSON.

use crate::highlight::DEFAULT_PALETTE;
use crate::variations::SuffixDictionary;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Characters shown around the first match in result excerpts.
pub const DEFAULT_EXCERPT_LEN: usize = 200;
/// Rows per result page.
pub const DEFAULT_PAGE_SIZE: u32 = 20;
/// Result pages kept by a search session.
pub const DEFAULT_CACHE_CAPACITY: usize = 32;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid configuration: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Excerpt window in chars. `0` shows the whole object text.
    pub excerpt_len: usize,
    /// Also match keywords against the organization's legal name.
    pub search_organization: bool,
    /// CSS classes for `<mark>` tags, one per keyword position.
    pub palette: Vec<String>,
    pub page_size: u32,
    /// Maximum cached pages per session. `0` disables caching.
    pub cache_capacity: usize,
    pub dictionary: SuffixDictionary,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            excerpt_len: DEFAULT_EXCERPT_LEN,
            search_organization: false,
            palette: DEFAULT_PALETTE.iter().map(|c| c.to_string()).collect(),
            page_size: DEFAULT_PAGE_SIZE,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            dictionary: SuffixDictionary::default(),
        }
    }
}

impl SearchConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_json::from_str(json)?;
        config.sanitize();
        Ok(config)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// A zero page size or an empty palette cannot be used, fall back to defaults.
    fn sanitize(&mut self) {
        if self.page_size == 0 {
            self.page_size = DEFAULT_PAGE_SIZE;
        }
        if self.palette.is_empty() {
            self.palette = DEFAULT_PALETTE.iter().map(|c| c.to_string()).collect();
        }
    }
}

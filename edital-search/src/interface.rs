//! Public types shared by the search service, its callers and the CLI.

use crate::models::Edital;
use crate::query::parse_keywords;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ═══════════════════════════════════════════════════════════════════════════════
// FILTERS
// ═══════════════════════════════════════════════════════════════════════════════

/// Everything the user can filter listings by.
///
/// Compared structurally: two filters with the same fields are the same
/// request, which is what the session cache keys on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchFilter {
    /// Raw keyword field, phrases separated by `;`.
    pub keywords: String,
    /// State codes (`uf_sigla`).
    pub states: Vec<String>,
    pub cities: Vec<String>,
    pub modalities: Vec<String>,
    /// Proposal opening on or after this day.
    pub start_date: Option<NaiveDate>,
    /// Proposal closing on or before this day.
    pub end_date: Option<NaiveDate>,
    /// Expand keywords into morphological variations.
    pub smart_search: bool,
}

impl SearchFilter {
    pub fn keyword_list(&self) -> Vec<String> {
        parse_keywords(&self.keywords)
    }

    /// True when at least one criterion would narrow the listing.
    pub fn is_active(&self) -> bool {
        !self.keyword_list().is_empty()
            || !self.states.is_empty()
            || !self.cities.is_empty()
            || !self.modalities.is_empty()
            || self.start_date.is_some()
            || self.end_date.is_some()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// MATCH DATA
// ═══════════════════════════════════════════════════════════════════════════════

/// A highlighted span in char offsets (not bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HighlightRange {
    pub start: u64,
    pub end: u64,
    /// Position of the keyword (in the user's input) that matched.
    pub keyword_index: usize,
    pub color_index: usize,
}

/// A piece of text, either plain or a keyword occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HighlightSegment {
    pub text: String,
    pub is_match: bool,
    /// Palette slot, only set on matches.
    pub color_index: Option<usize>,
}

/// What to display for one result.
///
/// `text` is the excerpt of the procurement object: whitespace collapsed, with
/// "…" on each side that was cut. `highlights` index into `text`;
/// `full_content_highlights` index into the untouched object text.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MatchData {
    pub text: String,
    pub highlights: Vec<HighlightRange>,
    pub full_content_highlights: Vec<HighlightRange>,
    /// Char offset of the first match in the full object text, if any.
    pub first_match_start: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditalMatch {
    pub edital: Edital,
    pub match_data: MatchData,
    /// Matches in the organization's legal name, char offsets. Only filled
    /// when organization search is on.
    #[serde(default)]
    pub organization_highlights: Vec<HighlightRange>,
}

impl EditalMatch {
    /// True when something is marked in the excerpt or the organization name.
    pub fn has_highlights(&self) -> bool {
        !self.match_data.highlights.is_empty() || !self.organization_highlights.is_empty()
    }
}

/// One page of search results.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SearchPage {
    pub items: Vec<EditalMatch>,
    /// Rows the store matched for the filter, across all pages.
    pub total_count: u64,
    /// 1-based.
    pub page: u32,
    pub page_size: u32,
}

impl SearchPage {
    pub fn empty(page: u32, page_size: u32) -> Self {
        Self {
            items: Vec::new(),
            total_count: 0,
            page,
            page_size,
        }
    }

    pub fn total_pages(&self) -> u64 {
        if self.page_size == 0 {
            return 0;
        }
        self.total_count.div_ceil(self.page_size as u64)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ERRORS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SearchError {
    #[error("Database error: {0}")]
    Database(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Operation cancelled")]
    Cancelled,
}

impl From<crate::database::DatabaseError> for SearchError {
    fn from(e: crate::database::DatabaseError) -> Self {
        SearchError::Database(e.to_string())
    }
}

impl From<crate::config::ConfigError> for SearchError {
    fn from(e: crate::config::ConfigError) -> Self {
        SearchError::Config(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_activity() {
        assert!(!SearchFilter::default().is_active());
        assert!(!SearchFilter { keywords: " ; ;".into(), smart_search: true, ..Default::default() }.is_active());
        assert!(SearchFilter { keywords: "hospital".into(), ..Default::default() }.is_active());
        assert!(SearchFilter { states: vec!["SP".into()], ..Default::default() }.is_active());
        assert!(SearchFilter {
            end_date: NaiveDate::from_ymd_opt(2025, 1, 31),
            ..Default::default()
        }
        .is_active());
    }

    #[test]
    fn test_filters_compare_structurally() {
        use std::collections::HashSet;
        let a = SearchFilter { keywords: "ração".into(), states: vec!["SP".into()], ..Default::default() };
        let b = a.clone();
        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn test_total_pages() {
        let mut page = SearchPage::empty(1, 20);
        assert_eq!(page.total_pages(), 0);
        page.total_count = 41;
        assert_eq!(page.total_pages(), 3);
    }
}

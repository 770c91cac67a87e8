//! Keyword parsing and compilation into store predicates.
//!
//! The store cannot apply Unicode normalization at query time, so it keeps a
//! folded copy of each searchable column (see [`fold_for_store`]) and the
//! compiler folds every variation the same way. In folded text words are
//! separated by exactly one space, so "whole word" becomes four `LIKE`
//! patterns: `w %`, `% w %`, `% w` and `w`.
//!
//! The predicate is a coarse prefilter. [`crate::relevance`] re-checks every
//! row with the exact matcher afterwards.

use crate::interface::SearchFilter;
use crate::normalize::fold_for_store;
use crate::variations::VariationGenerator;
use std::collections::BTreeSet;

/// Split the raw keyword field on `;`, trim, drop empties. Order is kept.
pub fn parse_keywords(raw: &str) -> Vec<String> {
    raw.split(';')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect()
}

/// Record fields keywords can be matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SearchField {
    ObjetoCompra,
    OrgaoRazaoSocial,
}

impl SearchField {
    /// Folded column holding this field's searchable text.
    pub fn column(self) -> &'static str {
        match self {
            SearchField::ObjetoCompra => "objeto_busca",
            SearchField::OrgaoRazaoSocial => "orgao_busca",
        }
    }
}

/// A `LIKE` pattern built from literal user text and wildcards.
///
/// Literal pieces always go through [`LikePattern::literal`], which escapes
/// `%`, `_` and `\`. Use with `ESCAPE '\'`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LikePattern(String);

impl LikePattern {
    pub const ESCAPE_CLAUSE: &'static str = "ESCAPE '\\'";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn literal(mut self, text: &str) -> Self {
        for c in text.chars() {
            if matches!(c, '%' | '_' | '\\') {
                self.0.push('\\');
            }
            self.0.push(c);
        }
        self
    }

    pub fn any(mut self) -> Self {
        self.0.push('%');
        self
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// Whole-word occurrence of one folded variation in one field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WordCondition {
    pub field: SearchField,
    /// Folded word, never empty.
    pub word: String,
}

impl WordCondition {
    /// Leading, inner, trailing and sole-word patterns.
    pub fn patterns(&self) -> [LikePattern; 4] {
        let w = self.word.as_str();
        [
            LikePattern::new().literal(w).literal(" ").any(),
            LikePattern::new().any().literal(" ").literal(w).literal(" ").any(),
            LikePattern::new().any().literal(" ").literal(w),
            LikePattern::new().literal(w),
        ]
    }

    fn to_sql(&self, params: &mut Vec<String>) -> String {
        let column = self.field.column();
        let clauses: Vec<String> = self
            .patterns()
            .into_iter()
            .map(|pattern| {
                params.push(pattern.into_string());
                format!("{} LIKE ? {}", column, LikePattern::ESCAPE_CLAUSE)
            })
            .collect();
        format!("({})", clauses.join(" OR "))
    }
}

/// OR-combination of word conditions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PredicateSet {
    /// No keywords: every row passes.
    Unfiltered,
    /// At least one condition must hold. Empty means nothing can match.
    AnyOf(Vec<WordCondition>),
}

impl PredicateSet {
    pub fn is_unfiltered(&self) -> bool {
        matches!(self, PredicateSet::Unfiltered)
    }

    pub fn conditions(&self) -> &[WordCondition] {
        match self {
            PredicateSet::Unfiltered => &[],
            PredicateSet::AnyOf(conditions) => conditions,
        }
    }

    /// SQL fragment with positional `?` placeholders and its parameters.
    /// `None` when there is nothing to filter on.
    pub fn to_sql(&self) -> Option<(String, Vec<String>)> {
        match self {
            PredicateSet::Unfiltered => None,
            PredicateSet::AnyOf(conditions) if conditions.is_empty() => Some(("0".to_string(), Vec::new())),
            PredicateSet::AnyOf(conditions) => {
                let mut params = Vec::with_capacity(conditions.len() * 4);
                let clauses: Vec<String> = conditions.iter().map(|c| c.to_sql(&mut params)).collect();
                Some((format!("({})", clauses.join(" OR ")), params))
            }
        }
    }
}

/// Turns keywords into a [`PredicateSet`] over a set of searched fields.
#[derive(Debug, Clone)]
pub struct QueryCompiler {
    generator: VariationGenerator,
    fields: Vec<SearchField>,
}

impl Default for QueryCompiler {
    fn default() -> Self {
        Self::new(VariationGenerator::default(), vec![SearchField::ObjetoCompra])
    }
}

impl QueryCompiler {
    pub fn new(generator: VariationGenerator, fields: Vec<SearchField>) -> Self {
        Self { generator, fields }
    }

    pub fn fields(&self) -> &[SearchField] {
        &self.fields
    }

    pub fn compile(&self, keywords: &[String], smart_search: bool) -> PredicateSet {
        let keywords: Vec<&str> = keywords.iter().map(|k| k.trim()).filter(|k| !k.is_empty()).collect();
        if keywords.is_empty() {
            return PredicateSet::Unfiltered;
        }

        let mut conditions = BTreeSet::new();
        for keyword in keywords {
            for variation in self.generator.variations(keyword, smart_search) {
                let word = fold_for_store(&variation);
                if word.is_empty() {
                    continue;
                }
                for &field in &self.fields {
                    conditions.insert(WordCondition { field, word: word.clone() });
                }
            }
        }
        PredicateSet::AnyOf(conditions.into_iter().collect())
    }

    pub fn compile_search(&self, filter: &SearchFilter) -> PredicateSet {
        self.compile(&filter.keyword_list(), filter.smart_search)
    }
}

/// Compile with the default dictionary over the procurement object only.
pub fn compile(keywords: &[String], smart_search: bool) -> PredicateSet {
    QueryCompiler::default().compile(keywords, smart_search)
}

pub fn compile_search(filter: &SearchFilter) -> PredicateSet {
    QueryCompiler::default().compile_search(filter)
}

//! The one keyword matcher behind both filtering and highlighting.
//!
//! A record is kept by the relevance filter exactly when [`KeywordMatcher::find_spans`]
//! would highlight something in it, because both go through the same
//! variation list and the same whole-word scan.

use crate::normalize::{find_whole_words, normalize, FoldedText};
use crate::variations::VariationGenerator;
use std::cmp::Reverse;
use std::collections::HashMap;

/// A keyword occurrence as a byte range of the original text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchSpan {
    pub start: usize,
    pub end: usize,
    pub keyword_index: usize,
}

#[derive(Debug, Clone, Default)]
pub struct KeywordMatcher {
    /// Normalized variation and the first keyword that produced it,
    /// longest variation first.
    variations: Vec<(String, usize)>,
    keyword_count: usize,
}

impl KeywordMatcher {
    pub fn new(generator: &VariationGenerator, keywords: &[String], smart_search: bool) -> Self {
        let keywords: Vec<&str> = keywords.iter().map(|k| k.trim()).filter(|k| !k.is_empty()).collect();
        let mut owner: HashMap<String, usize> = HashMap::new();
        for (index, &keyword) in keywords.iter().enumerate() {
            for variation in generator.variations(keyword, smart_search) {
                let word = normalize(&variation);
                if word.trim().is_empty() {
                    continue;
                }
                owner.entry(word).or_insert(index);
            }
        }

        let mut variations: Vec<(String, usize)> = owner.into_iter().collect();
        variations.sort_by(|(a, _), (b, _)| {
            (Reverse(a.chars().count()), a).cmp(&(Reverse(b.chars().count()), b))
        });

        Self { variations, keyword_count: keywords.len() }
    }

    /// Matcher using the default dictionary.
    pub fn from_keywords(keywords: &[String], smart_search: bool) -> Self {
        Self::new(&VariationGenerator::default(), keywords, smart_search)
    }

    /// No usable variation: nothing can match.
    pub fn is_empty(&self) -> bool {
        self.variations.is_empty()
    }

    pub fn keyword_count(&self) -> usize {
        self.keyword_count
    }

    pub fn is_match(&self, text: &str) -> bool {
        if self.variations.is_empty() || text.is_empty() {
            return false;
        }
        let folded = normalize(text);
        self.variations
            .iter()
            .any(|(word, _)| !find_whole_words(&folded, word).is_empty())
    }

    /// Non-overlapping keyword spans in text order.
    ///
    /// Longer variations claim first, so `equipamentos` wins over `equipamento`
    /// and an already claimed span is never split by a shorter one.
    pub fn find_spans(&self, text: &str) -> Vec<MatchSpan> {
        if self.variations.is_empty() || text.is_empty() {
            return Vec::new();
        }

        let folded = FoldedText::new(text);
        let mut claimed: Vec<(usize, usize, usize)> = Vec::new();
        for (word, keyword_index) in &self.variations {
            for (start, end) in find_whole_words(folded.as_str(), word) {
                let overlaps = claimed.iter().any(|&(s, e, _)| start < e && s < end);
                if !overlaps {
                    claimed.push((start, end, *keyword_index));
                }
            }
        }
        claimed.sort_unstable_by_key(|&(start, _, _)| start);

        claimed
            .into_iter()
            .filter_map(|(start, end, keyword_index)| {
                let (start, end) = folded.original_range(start, end);
                (start < end).then_some(MatchSpan { start, end, keyword_index })
            })
            .collect()
    }
}

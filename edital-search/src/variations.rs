//! Morphological variation generator for Portuguese keywords.
//!
//! Smart search expands one keyword into the surface forms that should count
//! as the same word: plural/singular, verb and nominal forms, diminutives and
//! accented spellings. The rules are data ([`SuffixDictionary`]) so they can be
//! tuned from configuration without touching the algorithm:
//!
//! 1. normalize the keyword and strip at most one suffix (the longest listed
//!    one that matches) to get a stem;
//! 2. inflect each of {original, normalized, stem};
//! 3. add accent expansions of the normalized form and accented endings;
//! 4. drop anything shorter than [`MIN_VARIATION_CHARS`].
//!
//! Matching, highlighting and query compilation all call the same
//! [`VariationGenerator`], so they can never disagree about what a keyword
//! means.

use crate::normalize::normalize;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Generated variations shorter than this (in chars) are discarded.
pub const MIN_VARIATION_CHARS: usize = 2;

/// Tunable rule tables for variation generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuffixDictionary {
    /// Suffixes that may be stripped to find a stem, grouped by priority.
    /// The longest match wins; on equal length the earlier entry wins.
    pub strip_suffixes: Vec<String>,
    /// Stems shorter than this are not used. Never below [`MIN_VARIATION_CHARS`].
    pub min_stem_len: usize,
    /// Endings appended to every base form.
    pub append_endings: Vec<String>,
    /// `(from, to)`: a base ending in `from` also yields the base with that
    /// ending replaced by `to`. Several rules may share a `from`.
    pub rewrites: Vec<(String, String)>,
    /// Plain char and the accented chars it may stand for.
    pub accents: Vec<(char, String)>,
    /// Unaccented endings and their accented spelling (`cao` → `ção`).
    pub accented_endings: Vec<(String, String)>,
}

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn owned_pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
    items
        .iter()
        .map(|(a, b)| (a.to_string(), b.to_string()))
        .collect()
}

impl Default for SuffixDictionary {
    fn default() -> Self {
        Self {
            strip_suffixes: owned(&[
                // diminutives
                "zinhos", "zinhas", "zinho", "zinha", "inhos", "inhas", "inho", "inha",
                // adverbial / adjectival
                "mente", "aveis", "iveis", "avel", "ivel",
                // nominalization
                "acoes", "acao", "coes", "cao",
                // verb inflections
                "ando", "endo", "indo", "ados", "adas", "idos", "idas", "ado", "ada", "ido", "ida",
                "ar", "er", "ir",
                // plurals
                "oes", "aes", "ais", "eis", "es", "s",
            ]),
            min_stem_len: MIN_VARIATION_CHARS,
            append_endings: owned(&[
                "s", "es", "ar", "er", "ir", "ação", "ações", "zinho", "zinha",
            ]),
            rewrites: owned_pairs(&[
                // plural
                ("ão", "ões"), ("ão", "ães"), ("ão", "ãos"),
                ("ao", "oes"), ("ao", "aes"), ("ao", "aos"),
                ("al", "ais"), ("el", "eis"), ("ol", "ois"), ("ul", "uis"), ("il", "is"),
                ("m", "ns"),
                // singular
                ("ões", "ão"), ("ães", "ão"), ("oes", "ao"), ("aes", "ao"),
                ("ais", "al"), ("eis", "el"), ("ois", "ol"), ("ns", "m"),
                ("es", ""), ("s", ""),
                // nominal
                ("ar", "ação"), ("ar", "ações"), ("ção", "ções"), ("ções", "ção"),
                ("cao", "coes"), ("coes", "cao"),
                // diminutive
                ("o", "inho"), ("o", "inhos"), ("a", "inha"), ("a", "inhas"), ("e", "inho"),
            ]),
            accents: vec![
                ('a', "áâãà".to_string()),
                ('e', "éê".to_string()),
                ('i', "í".to_string()),
                ('o', "óôõ".to_string()),
                ('u', "úü".to_string()),
                ('c', "ç".to_string()),
            ],
            accented_endings: owned_pairs(&[
                ("coes", "ções"), ("cao", "ção"), ("oes", "ões"), ("aes", "ães"), ("ao", "ão"),
                ("aveis", "áveis"), ("iveis", "íveis"), ("avel", "ável"), ("ivel", "ível"),
            ]),
        }
    }
}

/// Expands keywords into variation sets using a [`SuffixDictionary`].
#[derive(Debug, Clone)]
pub struct VariationGenerator {
    dictionary: SuffixDictionary,
}

static DEFAULT_GENERATOR: Lazy<VariationGenerator> =
    Lazy::new(|| VariationGenerator::new(SuffixDictionary::default()));

impl Default for VariationGenerator {
    fn default() -> Self {
        DEFAULT_GENERATOR.clone()
    }
}

impl VariationGenerator {
    pub fn new(mut dictionary: SuffixDictionary) -> Self {
        // Stems are taken from normalized text, so compare against normalized suffixes.
        dictionary.strip_suffixes = dictionary
            .strip_suffixes
            .iter()
            .map(|s| normalize(s.trim()))
            .filter(|s| !s.is_empty())
            .collect();
        Self { dictionary }
    }

    pub fn dictionary(&self) -> &SuffixDictionary {
        &self.dictionary
    }

    /// Strip the longest matching suffix from an already normalized word.
    /// Returns `None` when nothing matches or the stem would be too short.
    pub fn stem(&self, normalized: &str) -> Option<String> {
        let mut best: Option<&str> = None;
        for suffix in &self.dictionary.strip_suffixes {
            if normalized.ends_with(suffix.as_str())
                && best.map_or(true, |b| suffix.chars().count() > b.chars().count())
            {
                best = Some(suffix);
            }
        }

        let suffix = best?;
        let stem = &normalized[..normalized.len() - suffix.len()];
        let min_len = self.dictionary.min_stem_len.max(MIN_VARIATION_CHARS);
        if stem.chars().count() < min_len {
            return None;
        }
        Some(stem.to_string())
    }

    /// The variation set of one keyword.
    ///
    /// Without smart search this is just the trimmed keyword. With it, the
    /// original and normalized forms are always members, whatever their length.
    pub fn variations(&self, keyword: &str, smart_search: bool) -> BTreeSet<String> {
        let keyword = keyword.trim();
        let mut out = BTreeSet::new();
        if keyword.is_empty() {
            return out;
        }
        out.insert(keyword.to_string());
        if !smart_search {
            return out;
        }

        let normalized = normalize(keyword);
        if !normalized.is_empty() {
            out.insert(normalized.clone());
        }

        let mut bases = vec![keyword.to_lowercase(), normalized.clone()];
        if let Some(stem) = self.stem(&normalized) {
            bases.push(stem);
        }
        bases.dedup();

        let mut generated = BTreeSet::new();
        for base in bases.iter().filter(|b| !b.is_empty()) {
            generated.insert(base.clone());
            self.inflect(base, &mut generated);
        }
        generated.extend(self.accent_expansions(&normalized));

        let restored: Vec<String> = generated
            .iter()
            .flat_map(|v| self.accented_endings(v))
            .collect();
        generated.extend(restored);

        out.extend(
            generated
                .into_iter()
                .filter(|v| v.chars().count() >= MIN_VARIATION_CHARS),
        );
        out
    }

    fn inflect(&self, base: &str, out: &mut BTreeSet<String>) {
        for ending in &self.dictionary.append_endings {
            out.insert(format!("{}{}", base, ending));
        }
        for (from, to) in &self.dictionary.rewrites {
            if base.len() > from.len() && base.ends_with(from.as_str()) {
                out.insert(format!("{}{}", &base[..base.len() - from.len()], to));
            }
        }
    }

    /// One accented char at a time, e.g. `informatica` → `informática`.
    fn accent_expansions(&self, word: &str) -> Vec<String> {
        let chars: Vec<char> = word.chars().collect();
        let mut out = Vec::new();
        for (i, c) in chars.iter().enumerate() {
            let Some((_, alternatives)) = self.dictionary.accents.iter().find(|(plain, _)| plain == c) else {
                continue;
            };
            for alt in alternatives.chars() {
                let mut expanded = chars.clone();
                expanded[i] = alt;
                out.push(expanded.into_iter().collect());
            }
        }
        out
    }

    fn accented_endings(&self, word: &str) -> Vec<String> {
        self.dictionary
            .accented_endings
            .iter()
            .filter(|(plain, _)| word.len() > plain.len() && word.ends_with(plain.as_str()))
            .map(|(plain, accented)| format!("{}{}", &word[..word.len() - plain.len()], accented))
            .collect()
    }
}

/// Variation set using the default Portuguese dictionary.
pub fn variations(keyword: &str, smart_search: bool) -> BTreeSet<String> {
    DEFAULT_GENERATOR.variations(keyword, smart_search)
}

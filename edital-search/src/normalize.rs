//! Accent- and case-insensitive text folding.
//!
//! Every comparison in the search core goes through [`normalize`]: keywords,
//! their variations and record text. [`FoldedText`] keeps a byte-offset map
//! back to the original string so spans found in folded text can be reported
//! against what the user actually sees.

use std::ops::RangeInclusive;
use unicode_normalization::char::decompose_canonical;

/// Combining Diacritical Marks block, dropped after decomposition.
const COMBINING_MARKS: RangeInclusive<char> = '\u{0300}'..='\u{036F}';

/// Fold a single char: lowercase, canonical decomposition, strip marks.
/// A char may produce zero, one or several output chars.
fn fold_char(c: char, out: &mut String) {
    for lower in c.to_lowercase() {
        decompose_canonical(lower, |d| {
            if !COMBINING_MARKS.contains(&d) {
                out.push(d);
            }
        });
    }
}

/// Canonical comparable form of `text`.
///
/// Total and idempotent: `normalize(&normalize(s)) == normalize(s)`.
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        fold_char(c, &mut out);
    }
    out
}

/// Characters that make up words. Everything else separates them.
pub(crate) fn is_word_char(c: char) -> bool {
    c.is_alphanumeric()
}

/// Fold for the store's search columns: [`normalize`], then every run of
/// non-word characters becomes a single space, trimmed at both ends.
///
/// Both the indexed column and the compiled words go through this, so a
/// whole-word occurrence in normalized text is always a space-delimited
/// occurrence in the folded column.
pub fn fold_for_store(text: &str) -> String {
    let normalized = normalize(text);
    let mut out = String::with_capacity(normalized.len());
    let mut pending_space = false;
    for c in normalized.chars() {
        if is_word_char(c) {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.push(c);
        } else {
            pending_space = true;
        }
    }
    out
}

/// Byte ranges of every whole-word occurrence of `needle` in `haystack`.
///
/// Both sides must already be normalized. An occurrence counts when the char
/// before it and the char after it are separators (or the text edge).
/// Overlapping candidates are all considered.
pub(crate) fn find_whole_words(haystack: &str, needle: &str) -> Vec<(usize, usize)> {
    let mut found = Vec::new();
    if needle.is_empty() || needle.len() > haystack.len() {
        return found;
    }

    let mut from = 0;
    while let Some(rel) = haystack[from..].find(needle) {
        let start = from + rel;
        let end = start + needle.len();
        let before_ok = haystack[..start]
            .chars()
            .next_back()
            .map_or(true, |c| !is_word_char(c));
        let after_ok = haystack[end..]
            .chars()
            .next()
            .map_or(true, |c| !is_word_char(c));
        if before_ok && after_ok {
            found.push((start, end));
        }
        from = start + haystack[start..].chars().next().map_or(1, char::len_utf8);
        if from >= haystack.len() {
            break;
        }
    }
    found
}

/// Normalized text plus a map from each normalized byte to the byte offset of
/// the original char that produced it.
#[derive(Debug, Clone)]
pub struct FoldedText {
    text: String,
    /// `offsets.len() == text.len() + 1`; the last entry is the original length.
    offsets: Vec<usize>,
}

impl FoldedText {
    pub fn new(original: &str) -> Self {
        let mut text = String::with_capacity(original.len());
        let mut offsets = Vec::with_capacity(original.len() + 1);
        for (pos, c) in original.char_indices() {
            fold_char(c, &mut text);
            offsets.resize(text.len(), pos);
        }
        offsets.push(original.len());
        Self { text, offsets }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Map a byte range of the folded text onto the original string.
    pub fn original_range(&self, start: usize, end: usize) -> (usize, usize) {
        let last = self.offsets.len() - 1;
        (self.offsets[start.min(last)], self.offsets[end.min(last)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_accents_and_case() {
        assert_eq!(normalize("informática"), "informatica");
        assert_eq!(normalize("INFORMÁTICA"), "informatica");
        assert_eq!(normalize("Aquisição de Equipamentos"), "aquisicao de equipamentos");
        assert_eq!(normalize("Ração"), "racao");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let samples = [
            "informática",
            "São Paulo – Pregão Eletrônico",
            "a\u{0301}gua",
            "İstanbul",
            "ÇÃÕÊÜ",
            "",
            "123 R$ 4,50",
        ];
        for s in samples {
            let once = normalize(s);
            assert_eq!(normalize(&once), once, "not idempotent for {:?}", s);
        }
    }

    #[test]
    fn test_normalize_handles_decomposed_input() {
        // "água" written with a combining acute accent
        assert_eq!(normalize("a\u{0301}gua"), "agua");
    }

    #[test]
    fn test_fold_for_store_collapses_separators() {
        assert_eq!(fold_for_store("Equipamentos, médicos/hospitalares."), "equipamentos medicos hospitalares");
        assert_eq!(fold_for_store("  --Pronto-socorro--  "), "pronto socorro");
        assert_eq!(fold_for_store("!!!"), "");
    }

    #[test]
    fn test_find_whole_words_respects_boundaries() {
        let text = normalize("Contratação de serviços");
        assert!(find_whole_words(&text, "racao").is_empty());

        let text = normalize("ração animal para zoológico");
        assert_eq!(find_whole_words(&text, "racao"), vec![(0, 5)]);
    }

    #[test]
    fn test_find_whole_words_finds_repeats_and_punctuation() {
        let text = "casa casa,casa";
        assert_eq!(find_whole_words(text, "casa"), vec![(0, 4), (5, 9), (10, 14)]);
        assert!(find_whole_words("casas", "casa").is_empty());
    }

    #[test]
    fn test_folded_text_maps_back_to_original() {
        let original = "Aquisição de INFORMÁTICA";
        let folded = FoldedText::new(original);
        assert_eq!(folded.as_str(), "aquisicao de informatica");

        let start = folded.as_str().find("informatica").unwrap();
        let (s, e) = folded.original_range(start, start + "informatica".len());
        assert_eq!(&original[s..e], "INFORMÁTICA");

        let (s, e) = folded.original_range(0, "aquisicao".len());
        assert_eq!(&original[s..e], "Aquisição");
    }

    #[test]
    fn test_folded_text_keeps_combining_marks_inside_span() {
        let original = "a\u{0301}gua mineral";
        let folded = FoldedText::new(original);
        let (s, e) = folded.original_range(0, 4);
        assert_eq!(&original[s..e], "a\u{0301}gua");
    }
}

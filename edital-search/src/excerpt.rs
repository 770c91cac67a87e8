//! Excerpt windows for long procurement descriptions.
//!
//! All positions here are char offsets, matching [`HighlightRange`].

use crate::interface::HighlightRange;

const ELLIPSIS: char = '\u{2026}';

/// A window of the object text ready for display.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Excerpt {
    /// Whitespace-collapsed window, with "…" on each truncated side.
    pub text: String,
    /// Highlights that fall inside the window, re-based onto `text`.
    pub highlights: Vec<HighlightRange>,
    pub truncated_start: bool,
    pub truncated_end: bool,
}

/// Window of about `excerpt_len` chars centred on the first highlight.
///
/// The window edges are moved to whitespace so no word is cut in half, runs
/// of whitespace collapse to one space, and highlights are re-based onto the
/// returned text. Without highlights this is a preview of the beginning.
/// `excerpt_len == 0` keeps the whole text.
pub fn excerpt(content: &str, highlights: &[HighlightRange], excerpt_len: usize) -> Excerpt {
    let chars: Vec<char> = content.chars().collect();
    let len = chars.len();

    let (start, end) = if excerpt_len == 0 || len <= excerpt_len {
        (0, len)
    } else if let Some(first) = highlights.iter().min_by_key(|h| h.start) {
        window_around(&chars, first.start as usize, first.end as usize, excerpt_len)
    } else {
        (0, snap_end(&chars, 0, excerpt_len))
    };

    let (text, pos_map) = collapse_whitespace(&chars[start..end]);
    let truncated_start = start > 0;
    let truncated_end = end < len;
    let prefix = usize::from(truncated_start);

    let adjusted = highlights
        .iter()
        .filter(|h| h.start as usize >= start && h.end as usize <= end && h.start < h.end)
        .filter_map(|h| {
            let s = *pos_map.get(h.start as usize - start)?;
            let e = *pos_map.get(h.end as usize - start)?;
            (s < e).then_some(HighlightRange {
                start: (s + prefix) as u64,
                end: (e + prefix) as u64,
                ..*h
            })
        })
        .collect();

    let mut display = String::with_capacity(text.len() + 6);
    if truncated_start {
        display.push(ELLIPSIS);
    }
    display.push_str(&text);
    if truncated_end {
        display.push(ELLIPSIS);
    }

    Excerpt {
        text: display,
        highlights: adjusted,
        truncated_start,
        truncated_end,
    }
}

/// First `max_chars` of `content`, cut at a word boundary.
pub fn preview(content: &str, max_chars: usize) -> String {
    excerpt(content.trim_start(), &[], max_chars).text
}

fn window_around(chars: &[char], match_start: usize, match_end: usize, excerpt_len: usize) -> (usize, usize) {
    let len = chars.len();
    let match_start = match_start.min(len);
    let match_end = match_end.clamp(match_start, len);

    let remaining = excerpt_len.saturating_sub(match_end - match_start);
    let mut before = (remaining / 2).min(match_start);
    let after = (remaining - before).min(len - match_end);
    // Near the end of the text, spend the unused budget before the match.
    before = (remaining - after).min(match_start);

    let start = snap_start(chars, match_start - before, match_start);
    let end = snap_end(chars, match_end, match_end + after);
    (start, end)
}

/// Move `start` forward past the next whitespace, but never beyond `limit`.
fn snap_start(chars: &[char], start: usize, limit: usize) -> usize {
    if start == 0 || chars[start - 1].is_whitespace() {
        return start;
    }
    chars[start..limit]
        .iter()
        .position(|c| c.is_whitespace())
        .map_or(start, |offset| start + offset + 1)
}

/// Move `end` back to the last whitespace, but never before `floor`.
fn snap_end(chars: &[char], floor: usize, end: usize) -> usize {
    if end >= chars.len() || chars[end].is_whitespace() {
        return end.min(chars.len());
    }
    chars[floor..end]
        .iter()
        .rposition(|c| c.is_whitespace())
        .map_or(end, |offset| floor + offset)
}

/// Collapse whitespace runs into one space and trim both ends.
/// `pos_map[i]` is the output char index of input char `i`; it has one
/// extra entry for the end position.
fn collapse_whitespace(chars: &[char]) -> (String, Vec<usize>) {
    let mut out = String::with_capacity(chars.len());
    let mut pos_map = Vec::with_capacity(chars.len() + 1);
    let mut out_len = 0;
    let mut last_was_space = true;

    for &c in chars {
        pos_map.push(out_len);
        if c.is_whitespace() {
            if last_was_space {
                continue;
            }
            last_was_space = true;
            out.push(' ');
        } else {
            last_was_space = false;
            out.push(c);
        }
        out_len += 1;
    }

    if out.ends_with(' ') {
        out.pop();
        out_len -= 1;
        for pos in pos_map.iter_mut() {
            *pos = (*pos).min(out_len);
        }
    }
    pos_map.push(out_len);

    (out, pos_map)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hr(start: u64, end: u64) -> HighlightRange {
        HighlightRange { start, end, keyword_index: 0, color_index: 0 }
    }

    fn slice(text: &str, h: &HighlightRange) -> String {
        text.chars().skip(h.start as usize).take((h.end - h.start) as usize).collect()
    }

    #[test]
    fn test_short_text_is_kept_whole() {
        let e = excerpt("Compra de  material\nde escritório", &[hr(11, 19)], 200);
        assert_eq!(e.text, "Compra de material de escritório");
        assert!(!e.truncated_start && !e.truncated_end);
        assert_eq!(slice(&e.text, &e.highlights[0]), "material");
    }

    #[test]
    fn test_window_is_centered_on_first_match() {
        let filler = "palavra ".repeat(60);
        let content = format!("{}hospital {}", filler, filler);
        let start = filler.chars().count() as u64;
        let e = excerpt(&content, &[hr(start, start + 8)], 60);

        assert!(e.truncated_start && e.truncated_end);
        assert!(e.text.starts_with('\u{2026}'));
        assert!(e.text.ends_with('\u{2026}'));
        assert!(e.text.chars().count() <= 62);
        assert_eq!(e.highlights.len(), 1);
        assert_eq!(slice(&e.text, &e.highlights[0]), "hospital");
    }

    #[test]
    fn test_window_does_not_cut_words() {
        let filler = "equipamentos ".repeat(30);
        let content = format!("{}ração {}", filler, filler);
        let start = filler.chars().count() as u64;
        let e = excerpt(&content, &[hr(start, start + 5)], 50);
        let inner = e.text.trim_matches('\u{2026}');
        for word in inner.split(' ') {
            assert!(word == "equipamentos" || word == "ração", "cut word {:?}", word);
        }
    }

    #[test]
    fn test_match_near_end_uses_budget_before() {
        let content = format!("{}fim", "a b c d e f g h i j ".repeat(10));
        let len = content.chars().count() as u64;
        let e = excerpt(&content, &[hr(len - 3, len)], 40);
        assert!(e.truncated_start);
        assert!(!e.truncated_end);
        assert!(e.text.chars().count() >= 35);
        assert_eq!(slice(&e.text, &e.highlights[0]), "fim");
    }

    #[test]
    fn test_no_highlights_gives_preview() {
        let content = "Contratação de serviços de manutenção predial preventiva e corretiva";
        let p = preview(content, 30);
        assert!(p.starts_with("Contratação de serviços"));
        assert!(p.ends_with('\u{2026}'));
        assert!(!p.contains("predial"));
    }

    #[test]
    fn test_zero_len_keeps_everything() {
        let content = "x ".repeat(500);
        let e = excerpt(&content, &[], 0);
        assert!(!e.truncated_end);
        assert_eq!(e.text, content.trim_end());
    }

    #[test]
    fn test_highlights_outside_window_are_dropped() {
        let content = format!("alfa {}omega", "meio ".repeat(100));
        let last = content.chars().count() as u64;
        let e = excerpt(&content, &[hr(0, 4), hr(last - 5, last)], 30);
        assert_eq!(e.highlights.len(), 1);
        assert_eq!(slice(&e.text, &e.highlights[0]), "alfa");
    }
}

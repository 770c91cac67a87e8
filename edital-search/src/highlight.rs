//! Highlight rendering: keyword occurrences become colored segments.
//!
//! Spans come from [`KeywordMatcher::find_spans`], the same matcher the
//! relevance filter uses, so a record that survived filtering always shows at
//! least one highlight and nothing is highlighted that would not have matched.

use crate::interface::{HighlightRange, HighlightSegment};
use crate::matcher::KeywordMatcher;

/// Mark classes, one per keyword position, cycling.
pub const DEFAULT_PALETTE: [&str; 5] = [
    "bg-yellow-200",
    "bg-green-200",
    "bg-blue-200",
    "bg-pink-200",
    "bg-purple-200",
];

/// Palette slot for the keyword at `keyword_index`.
pub fn color_for(keyword_index: usize, palette_len: usize) -> usize {
    if palette_len == 0 {
        0
    } else {
        keyword_index % palette_len
    }
}

/// Text split into plain and matched segments, plus the matched ranges in
/// char offsets of the input.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Highlighted {
    pub segments: Vec<HighlightSegment>,
    pub ranges: Vec<HighlightRange>,
}

impl Highlighted {
    /// Rebuild segments from char ranges computed earlier over `text`.
    /// Ranges past the end of `text` or overlapping an earlier one are skipped.
    pub fn from_ranges(text: &str, ranges: &[HighlightRange]) -> Self {
        let chars: Vec<char> = text.chars().collect();
        let mut result = Highlighted::default();
        let mut pos = 0usize;
        for range in ranges {
            let (start, end) = (range.start as usize, range.end as usize);
            if start < pos || start >= end || end > chars.len() {
                continue;
            }
            if start > pos {
                result.segments.push(plain(&chars[pos..start].iter().collect::<String>()));
            }
            result.segments.push(HighlightSegment {
                text: chars[start..end].iter().collect(),
                is_match: true,
                color_index: Some(range.color_index),
            });
            result.ranges.push(*range);
            pos = end;
        }
        if pos < chars.len() {
            result.segments.push(plain(&chars[pos..].iter().collect::<String>()));
        }
        result
    }

    pub fn has_matches(&self) -> bool {
        !self.ranges.is_empty()
    }

    /// Concatenation of all segments, equal to the input text.
    pub fn plain_text(&self) -> String {
        self.segments.iter().map(|s| s.text.as_str()).collect()
    }

    /// HTML with each match wrapped in `<mark class="{color} px-1 rounded">`.
    /// All text is escaped; the marks are the only markup produced.
    pub fn to_html<S: AsRef<str>>(&self, palette: &[S]) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment.color_index {
                Some(color) if segment.is_match => {
                    let class = palette
                        .get(color)
                        .map(AsRef::as_ref)
                        .unwrap_or(DEFAULT_PALETTE[color % DEFAULT_PALETTE.len()]);
                    out.push_str("<mark class=\"");
                    escape_html(class, &mut out);
                    out.push_str(" px-1 rounded\">");
                    escape_html(&segment.text, &mut out);
                    out.push_str("</mark>");
                }
                _ => escape_html(&segment.text, &mut out),
            }
        }
        out
    }
}

/// Split `text` on the matcher's spans.
pub fn highlight_with(matcher: &KeywordMatcher, text: &str, palette_len: usize) -> Highlighted {
    let spans = matcher.find_spans(text);
    let mut result = Highlighted::default();
    if spans.is_empty() {
        if !text.is_empty() {
            result.segments.push(plain(text));
        }
        return result;
    }

    let mut byte_pos = 0;
    let mut char_pos = 0u64;
    for span in spans {
        if span.start > byte_pos {
            let before = &text[byte_pos..span.start];
            char_pos += before.chars().count() as u64;
            result.segments.push(plain(before));
        }

        let matched = &text[span.start..span.end];
        let match_chars = matched.chars().count() as u64;
        let color_index = color_for(span.keyword_index, palette_len);
        result.segments.push(HighlightSegment {
            text: matched.to_string(),
            is_match: true,
            color_index: Some(color_index),
        });
        result.ranges.push(HighlightRange {
            start: char_pos,
            end: char_pos + match_chars,
            keyword_index: span.keyword_index,
            color_index,
        });

        char_pos += match_chars;
        byte_pos = span.end;
    }
    if byte_pos < text.len() {
        result.segments.push(plain(&text[byte_pos..]));
    }
    result
}

/// Highlight with the default dictionary and palette.
pub fn highlight(text: &str, keywords: &[String], smart_search: bool) -> Highlighted {
    let matcher = KeywordMatcher::from_keywords(keywords, smart_search);
    highlight_with(&matcher, text, DEFAULT_PALETTE.len())
}

/// HTML rendering of [`highlight`] using the default palette.
pub fn render_highlighted(text: &str, keywords: &[String], smart_search: bool) -> String {
    highlight(text, keywords, smart_search).to_html(&DEFAULT_PALETTE)
}

fn plain(text: &str) -> HighlightSegment {
    HighlightSegment {
        text: text.to_string(),
        is_match: false,
        color_index: None,
    }
}

fn escape_html(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
}

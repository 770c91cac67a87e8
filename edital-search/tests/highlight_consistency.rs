//! Filtering and highlighting must agree on every record.

use edital_search::demo::{demo_editais, synthetic_editais};
use edital_search::{filter, highlight, normalize, parse_keywords, Edital};

const KEYWORD_SETS: &[&str] = &[
    "equipamento; hospitalar",
    "ração",
    "informatica",
    "INFORMÁTICA; escola",
    "medicamentos; saúde; veículo",
    "material de escritório",
    "pronto-socorro",
    "hospitais",
    "serviço",
    "locação; manutenção; refeitório",
];

fn corpus() -> Vec<Edital> {
    let mut all = demo_editais();
    all.extend(synthetic_editais(300, 11));
    all
}

#[test]
fn test_kept_records_always_have_highlights() {
    let records = corpus();
    for raw in KEYWORD_SETS {
        let keywords = parse_keywords(raw);
        for smart in [true, false] {
            let kept: Vec<String> = filter(records.clone(), &keywords, smart)
                .into_iter()
                .map(|e| e.id)
                .collect();

            for edital in &records {
                let highlighted = highlight(edital.objeto_text(), &keywords, smart);
                assert_eq!(
                    kept.contains(&edital.id),
                    highlighted.has_matches(),
                    "keywords {:?} smart={} disagree on {}",
                    raw,
                    smart,
                    edital.id
                );
            }
        }
    }
}

#[test]
fn test_highlights_never_overlap_and_rebuild_text() {
    let records = corpus();
    for raw in KEYWORD_SETS {
        let keywords = parse_keywords(raw);
        for edital in &records {
            let text = edital.objeto_text();
            let highlighted = highlight(text, &keywords, true);
            assert_eq!(highlighted.plain_text(), text);
            for pair in highlighted.ranges.windows(2) {
                assert!(pair[0].end <= pair[1].start, "overlap in {}", edital.id);
            }
        }
    }
}

#[test]
fn test_highlighted_text_is_a_whole_word() {
    let records = corpus();
    let keywords = parse_keywords("equipamento; hospitalar; ração");
    for edital in &records {
        let text = edital.objeto_text();
        let chars: Vec<char> = text.chars().collect();
        for range in highlight(text, &keywords, true).ranges {
            let (start, end) = (range.start as usize, range.end as usize);
            assert!(start == 0 || !chars[start - 1].is_alphanumeric());
            assert!(end == chars.len() || !chars[end].is_alphanumeric());
        }
    }
}

#[test]
fn test_highlight_preserves_original_spelling() {
    let text = "CONSTRUÇÃO de Hospitais e aquisição de camas HOSPITALARES";
    let keywords = parse_keywords("construcao; hospitalar");
    let matched: Vec<String> = highlight(text, &keywords, true)
        .segments
        .into_iter()
        .filter(|s| s.is_match)
        .map(|s| s.text)
        .collect();
    assert_eq!(matched, vec!["CONSTRUÇÃO", "Hospitais", "HOSPITALARES"]);
}

#[test]
fn test_normalization_is_idempotent_over_corpus() {
    for edital in corpus() {
        let once = normalize(edital.objeto_text());
        assert_eq!(normalize(&once), once);
    }
}

//! Relevance filter: exact whole-word re-check of store rows.
//!
//! The store predicate is deliberately loose; this pass is what guarantees
//! every returned record contains a whole-word occurrence of some variation.
//! It also builds the excerpt and highlights shown for each survivor.

use crate::config::SearchConfig;
use crate::excerpt::{excerpt, preview};
use crate::highlight::highlight_with;
use crate::interface::{EditalMatch, MatchData, SearchFilter};
use crate::matcher::KeywordMatcher;
use crate::models::Edital;
use crate::query::SearchField;
use crate::variations::VariationGenerator;
use rayon::prelude::*;

/// Fields checked for a given configuration, object text first.
pub fn searched_fields(config: &SearchConfig) -> Vec<SearchField> {
    let mut fields = vec![SearchField::ObjetoCompra];
    if config.search_organization {
        fields.push(SearchField::OrgaoRazaoSocial);
    }
    fields
}

/// Keep the records that match, in their original order.
pub fn filter(records: Vec<Edital>, keywords: &[String], smart_search: bool) -> Vec<Edital> {
    let matcher = KeywordMatcher::from_keywords(keywords, smart_search);
    filter_with(records, &matcher, &[SearchField::ObjetoCompra])
}

pub fn filter_with(records: Vec<Edital>, matcher: &KeywordMatcher, fields: &[SearchField]) -> Vec<Edital> {
    if matcher.keyword_count() == 0 {
        return records;
    }
    records
        .into_par_iter()
        .filter(|edital| is_relevant(edital, matcher, fields))
        .collect()
}

pub fn is_relevant(edital: &Edital, matcher: &KeywordMatcher, fields: &[SearchField]) -> bool {
    matcher.keyword_count() == 0 || fields.iter().any(|&f| matcher.is_match(edital.field_text(f)))
}

/// Filter store rows and attach display data, preserving row order.
pub fn post_process(rows: Vec<Edital>, filter: &SearchFilter, config: &SearchConfig) -> Vec<EditalMatch> {
    let generator = VariationGenerator::new(config.dictionary.clone());
    let matcher = KeywordMatcher::new(&generator, &filter.keyword_list(), filter.smart_search);
    post_process_with(rows, &matcher, config, &|| false).unwrap_or_default()
}

/// As [`post_process`] with a prebuilt matcher. Returns `None` as soon as
/// `cancelled` reports true.
pub(crate) fn post_process_with(
    rows: Vec<Edital>,
    matcher: &KeywordMatcher,
    config: &SearchConfig,
    cancelled: &(dyn Fn() -> bool + Sync),
) -> Option<Vec<EditalMatch>> {
    let fields = searched_fields(config);
    let palette_len = config.palette.len();

    // Vec's parallel iterator is indexed, so collect keeps input order.
    let processed: Result<Vec<Option<EditalMatch>>, ()> = rows
        .into_par_iter()
        .map(|edital| {
            if cancelled() {
                return Err(());
            }
            if !is_relevant(&edital, matcher, &fields) {
                return Ok(None);
            }
            let match_data = build_match_data(edital.objeto_text(), matcher, config.excerpt_len, palette_len);
            let organization_highlights = if fields.contains(&SearchField::OrgaoRazaoSocial) {
                highlight_with(matcher, edital.organization_text(), palette_len).ranges
            } else {
                Vec::new()
            };
            Ok(Some(EditalMatch { edital, match_data, organization_highlights }))
        })
        .collect();

    processed.ok().map(|items| items.into_iter().flatten().collect())
}

/// Excerpt and highlights for one object text.
pub fn build_match_data(text: &str, matcher: &KeywordMatcher, excerpt_len: usize, palette_len: usize) -> MatchData {
    if matcher.keyword_count() == 0 {
        return MatchData {
            text: preview(text, excerpt_len),
            ..Default::default()
        };
    }

    let highlighted = highlight_with(matcher, text, palette_len);
    let full_content_highlights = highlighted.ranges;
    let window = excerpt(text, &full_content_highlights, excerpt_len);
    MatchData {
        text: window.text,
        highlights: window.highlights,
        first_match_start: full_content_highlights.first().map(|h| h.start),
        full_content_highlights,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OrgaoEntidade;

    fn edital(id: &str, objeto: &str) -> Edital {
        Edital {
            id: id.to_string(),
            objeto_compra: Some(objeto.to_string()),
            ..Default::default()
        }
    }

    fn kw(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn ids(records: &[Edital]) -> Vec<&str> {
        records.iter().map(|e| e.id.as_str()).collect()
    }

    #[test]
    fn test_filter_drops_substring_only_matches() {
        let records = vec![
            edital("1", "Contratação de serviços de limpeza"),
            edital("2", "Ração animal para zoológico"),
        ];
        let kept = filter(records, &kw(&["ração"]), true);
        assert_eq!(ids(&kept), vec!["2"]);
    }

    #[test]
    fn test_filter_preserves_order() {
        let records: Vec<Edital> = (0..200)
            .map(|i| {
                let objeto = if i % 3 == 0 { "compra de equipamentos" } else { "outra coisa" };
                edital(&i.to_string(), objeto)
            })
            .collect();
        let kept = filter(records, &kw(&["equipamento"]), true);
        let expected: Vec<String> = (0..200).filter(|i| i % 3 == 0).map(|i| i.to_string()).collect();
        assert_eq!(ids(&kept), expected.iter().map(String::as_str).collect::<Vec<_>>());
    }

    #[test]
    fn test_no_keywords_keeps_everything() {
        let records = vec![edital("1", "a"), Edital { id: "2".into(), ..Default::default() }];
        assert_eq!(filter(records, &[], true).len(), 2);
    }

    #[test]
    fn test_absent_object_never_matches() {
        let records = vec![Edital { id: "1".into(), ..Default::default() }];
        assert!(filter(records, &kw(&["hospital"]), true).is_empty());
    }

    #[test]
    fn test_post_process_builds_highlighted_excerpts() {
        let filter = SearchFilter {
            keywords: "equipamento; hospitalar".into(),
            smart_search: true,
            ..Default::default()
        };
        let rows = vec![
            edital("1", "Aquisição de equipamentos médicos hospitalares"),
            edital("2", "Compra de material de escritório"),
        ];
        let matches = post_process(rows, &filter, &SearchConfig::default());
        assert_eq!(matches.len(), 1);
        let data = &matches[0].match_data;
        assert_eq!(data.text, "Aquisição de equipamentos médicos hospitalares");
        assert_eq!(data.highlights.len(), 2);
        assert_eq!(data.highlights[0].color_index, 0);
        assert_eq!(data.highlights[1].color_index, 1);
        assert_eq!(data.first_match_start, Some(13));
    }

    #[test]
    fn test_post_process_without_keywords_gives_previews() {
        let config = SearchConfig { excerpt_len: 20, ..Default::default() };
        let rows = vec![edital("1", "Contratação de serviços de manutenção predial")];
        let matches = post_process(rows, &SearchFilter { states: vec!["SP".into()], ..Default::default() }, &config);
        assert_eq!(matches.len(), 1);
        assert!(matches[0].match_data.highlights.is_empty());
        assert!(matches[0].match_data.text.ends_with('\u{2026}'));
    }

    #[test]
    fn test_organization_matching_is_opt_in() {
        let mut record = edital("1", "Aquisição de medicamentos");
        record.orgao = OrgaoEntidade {
            cnpj: None,
            razao_social: Some("Fundação Parque Zoológico".into()),
        };
        let filter = SearchFilter { keywords: "zoologico".into(), ..Default::default() };

        let matches = post_process(vec![record.clone()], &filter, &SearchConfig::default());
        assert!(matches.is_empty());

        let config = SearchConfig { search_organization: true, ..Default::default() };
        let matches = post_process(vec![record], &filter, &config);
        assert_eq!(matches.len(), 1);
        assert!(matches[0].match_data.highlights.is_empty());
        assert!(matches[0].has_highlights());
        let org = &matches[0].organization_highlights;
        assert_eq!((org[0].start, org[0].end), (16, 25));
    }

    #[test]
    fn test_every_kept_record_has_a_highlight_with_organization_search() {
        let config = SearchConfig { search_organization: true, ..Default::default() };
        let mut by_org = edital("1", "Aquisição de medicamentos");
        by_org.orgao.razao_social = Some("Secretaria de Estado da Saúde".into());
        let by_object = edital("2", "Ampliação da rede de saúde");
        let neither = edital("3", "Compra de veículos");

        let filter = SearchFilter { keywords: "saude".into(), smart_search: true, ..Default::default() };
        let matches = post_process(vec![by_org, by_object, neither], &filter, &config);
        assert_eq!(matches.len(), 2);
        assert!(matches.iter().all(EditalMatch::has_highlights));
        assert!(matches[1].organization_highlights.is_empty());
    }

    #[test]
    fn test_blank_keywords_keep_every_record() {
        let records = vec![edital("1", "Ração animal"), edital("2", "Compra de veículos")];
        assert_eq!(filter(records.clone(), &kw(&[" "]), true).len(), 2);
        assert_eq!(filter(records, &kw(&["", "\t "]), false).len(), 2);
    }

    #[test]
    fn test_cancelled_processing_returns_none() {
        let matcher = KeywordMatcher::from_keywords(&kw(&["a"]), false);
        let rows = vec![edital("1", "a")];
        assert!(post_process_with(rows, &matcher, &SearchConfig::default(), &|| true).is_none());
    }
}

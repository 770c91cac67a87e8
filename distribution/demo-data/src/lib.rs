//! Embedded demo corpus of procurement notices.
//!
//! Parsed once from `data/editais.csv`. Empty cells come back as `None`.

use once_cell::sync::Lazy;
use thiserror::Error;

const EDITAIS_CSV: &str = include_str!("../data/editais.csv");

/// One row of the demo corpus, kept as plain strings.
#[derive(Debug, Clone, PartialEq)]
pub struct DemoEdital {
    pub id: String,
    pub status: String,
    pub ano_compra: Option<String>,
    pub sequencial_compra: Option<String>,
    pub numero_controle_pncp: Option<String>,
    pub orgao_cnpj: Option<String>,
    pub orgao_razao_social: Option<String>,
    pub uf_sigla: Option<String>,
    pub municipio_nome: Option<String>,
    pub codigo_ibge: Option<String>,
    pub nome_unidade: Option<String>,
    pub modalidade_id: Option<String>,
    pub modalidade_nome: Option<String>,
    pub objeto_compra: Option<String>,
    pub informacao_complementar: Option<String>,
    pub valor_total_estimado: Option<String>,
    pub srp: Option<String>,
    pub data_publicacao_pncp: Option<String>,
    pub data_abertura_proposta: Option<String>,
    pub data_encerramento_proposta: Option<String>,
    pub data_atualizacao: Option<String>,
}

fn cell(record: &csv::StringRecord, idx: usize) -> Option<String> {
    record
        .get(idx)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("row at line {line} has no id")]
    MissingId { line: u64 },
}

/// Parse a corpus in the `data/editais.csv` layout. Any malformed row fails
/// the whole parse.
pub fn parse_corpus(raw: &str) -> Result<Vec<DemoEdital>, CorpusError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(raw.as_bytes());

    reader
        .records()
        .map(|record| -> Result<DemoEdital, CorpusError> {
            let r = record?;
            let line = r.position().map_or(0, |p| p.line());
            let id = cell(&r, 0).ok_or(CorpusError::MissingId { line })?;
            Ok(DemoEdital {
                id,
                status: cell(&r, 1).unwrap_or_else(|| "aberto".to_string()),
                ano_compra: cell(&r, 2),
                sequencial_compra: cell(&r, 3),
                numero_controle_pncp: cell(&r, 4),
                orgao_cnpj: cell(&r, 5),
                orgao_razao_social: cell(&r, 6),
                uf_sigla: cell(&r, 7),
                municipio_nome: cell(&r, 8),
                codigo_ibge: cell(&r, 9),
                nome_unidade: cell(&r, 10),
                modalidade_id: cell(&r, 11),
                modalidade_nome: cell(&r, 12),
                objeto_compra: cell(&r, 13),
                informacao_complementar: cell(&r, 14),
                valor_total_estimado: cell(&r, 15),
                srp: cell(&r, 16),
                data_publicacao_pncp: cell(&r, 17),
                data_abertura_proposta: cell(&r, 18),
                data_encerramento_proposta: cell(&r, 19),
                data_atualizacao: cell(&r, 20),
            })
        })
        .collect()
}

/// All demo notices, in file order. The CSV is compiled in, so a parse
/// failure is a broken build artifact.
pub static DEMO_EDITAIS: Lazy<Vec<DemoEdital>> =
    Lazy::new(|| parse_corpus(EDITAIS_CSV).expect("embedded demo corpus is malformed"));

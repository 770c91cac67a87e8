//! Demo corpus loading and synthetic data for benchmarks and manual testing.

use crate::database::{parse_db_timestamp, Database, DatabaseResult};
use crate::models::{Edital, EditalStatus, OrgaoEntidade, UnidadeOrgao};
use chrono::{Duration, NaiveDate};
use demo_data::{DemoEdital, DEMO_EDITAIS};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;

fn parse_number<T: std::str::FromStr>(value: &Option<String>) -> Option<T> {
    value.as_deref().and_then(|v| v.trim().parse().ok())
}

fn from_demo(row: &DemoEdital) -> Edital {
    let timestamp = |v: &Option<String>| v.as_deref().and_then(parse_db_timestamp);
    Edital {
        id: row.id.clone(),
        status: EditalStatus::from_database_str(&row.status),
        ano_compra: parse_number(&row.ano_compra),
        sequencial_compra: parse_number(&row.sequencial_compra),
        numero_controle_pncp: row.numero_controle_pncp.clone(),
        orgao: OrgaoEntidade {
            cnpj: row.orgao_cnpj.clone(),
            razao_social: row.orgao_razao_social.clone(),
        },
        unidade: UnidadeOrgao {
            uf_sigla: row.uf_sigla.clone(),
            municipio_nome: row.municipio_nome.clone(),
            codigo_ibge: row.codigo_ibge.clone(),
            nome_unidade: row.nome_unidade.clone(),
        },
        modalidade_id: parse_number(&row.modalidade_id),
        modalidade_nome: row.modalidade_nome.clone(),
        objeto_compra: row.objeto_compra.clone(),
        informacao_complementar: row.informacao_complementar.clone(),
        valor_total_estimado: parse_number(&row.valor_total_estimado),
        srp: row.srp.as_deref().map_or(false, |s| s.eq_ignore_ascii_case("true")),
        data_publicacao_pncp: timestamp(&row.data_publicacao_pncp),
        data_abertura_proposta: timestamp(&row.data_abertura_proposta),
        data_encerramento_proposta: timestamp(&row.data_encerramento_proposta),
        data_atualizacao: timestamp(&row.data_atualizacao),
    }
}

/// The embedded demo notices.
pub fn demo_editais() -> Vec<Edital> {
    DEMO_EDITAIS.iter().map(from_demo).collect()
}

/// Load the demo corpus into `db`. Returns the number of notices written.
pub fn seed_demo(db: &Database) -> DatabaseResult<usize> {
    let written = db.insert_many(&demo_editais())?;
    info!(written, "seeded demo corpus");
    Ok(written)
}

const ITEMS: &[&str] = &[
    "equipamentos médicos", "equipamento hospitalar", "material de escritório", "medicamentos básicos",
    "serviços de informática", "computadores e periféricos", "ração animal", "gêneros alimentícios",
    "veículos utilitários", "material de limpeza", "uniformes escolares", "mobiliário escolar",
    "combustível", "pneus e câmaras de ar", "licenças de software", "manutenção predial",
];

const VERBS: &[&str] = &[
    "Aquisição de", "Contratação de empresa para fornecimento de", "Registro de preços para",
    "Compra de", "Locação de", "Fornecimento parcelado de",
];

const PLACES: &[(&str, &str)] = &[
    ("SP", "São Paulo"), ("SP", "Campinas"), ("RJ", "Rio de Janeiro"), ("MG", "Belo Horizonte"),
    ("BA", "Salvador"), ("PR", "Curitiba"), ("RS", "Porto Alegre"), ("PE", "Recife"),
];

const MODALITIES: &[(i32, &str)] = &[
    (6, "Pregão - Eletrônico"),
    (4, "Concorrência - Eletrônica"),
    (8, "Dispensa"),
];

/// `count` pseudo-random notices, reproducible for a given `seed`.
pub fn synthetic_editais(count: usize, seed: u64) -> Vec<Edital> {
    let mut rng = StdRng::seed_from_u64(seed);
    let base = NaiveDate::from_ymd_opt(2025, 1, 1)
        .and_then(|d| d.and_hms_opt(8, 0, 0))
        .unwrap_or_default();

    (0..count)
        .map(|i| {
            let (uf, city) = PLACES[rng.gen_range(0..PLACES.len())];
            let (modalidade_id, modalidade) = MODALITIES[rng.gen_range(0..MODALITIES.len())];
            let mut objeto = format!(
                "{} {}",
                VERBS[rng.gen_range(0..VERBS.len())],
                ITEMS[rng.gen_range(0..ITEMS.len())]
            );
            if rng.gen_bool(0.4) {
                objeto.push_str(" e ");
                objeto.push_str(ITEMS[rng.gen_range(0..ITEMS.len())]);
            }

            let published = base + Duration::hours(rng.gen_range(0..24 * 365));
            let opening = published + Duration::days(rng.gen_range(1..10));
            let closing = opening + Duration::days(rng.gen_range(5..30));

            Edital {
                id: format!("syn-{:06}", i),
                status: if rng.gen_bool(0.8) { EditalStatus::Aberto } else { EditalStatus::Encerrado },
                ano_compra: Some(2025),
                sequencial_compra: Some(i as i32 + 1),
                numero_controle_pncp: None,
                orgao: OrgaoEntidade {
                    cnpj: None,
                    razao_social: Some(format!("Prefeitura Municipal de {}", city)),
                },
                unidade: UnidadeOrgao {
                    uf_sigla: Some(uf.to_string()),
                    municipio_nome: Some(city.to_string()),
                    codigo_ibge: None,
                    nome_unidade: None,
                },
                modalidade_id: Some(modalidade_id),
                modalidade_nome: Some(modalidade.to_string()),
                objeto_compra: Some(objeto),
                informacao_complementar: None,
                valor_total_estimado: Some(rng.gen_range(1_000.0..5_000_000.0)),
                srp: rng.gen_bool(0.5),
                data_publicacao_pncp: Some(published),
                data_abertura_proposta: Some(opening),
                data_encerramento_proposta: Some(closing),
                data_atualizacao: Some(published),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_corpus_converts() {
        let editais = demo_editais();
        assert_eq!(editais.len(), 12);

        let first = &editais[0];
        assert_eq!(first.id, "ed-0001");
        assert_eq!(first.unidade.uf_sigla.as_deref(), Some("SP"));
        assert_eq!(first.ano_compra, Some(2025));
        assert_eq!(first.valor_total_estimado, Some(1_850_000.0));
        assert!(first.srp);
        assert!(first.data_publicacao_pncp.is_some());
        assert!(editais.iter().any(|e| e.status == EditalStatus::Encerrado));
    }

    #[test]
    fn test_seed_demo() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(seed_demo(&db).unwrap(), 12);
        assert_eq!(db.count().unwrap(), 12);
    }

    #[test]
    fn test_synthetic_is_reproducible() {
        let a = synthetic_editais(50, 7);
        let b = synthetic_editais(50, 7);
        assert_eq!(a, b);
        assert!(a.iter().all(|e| !e.objeto_text().is_empty()));
        assert!(a.iter().all(|e| e.data_abertura_proposta < e.data_encerramento_proposta));
    }
}

//! Procurement notice ("edital") records as stored and returned by the search.

use crate::query::SearchField;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Whether the notice still accepts proposals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EditalStatus {
    #[default]
    Aberto,
    Encerrado,
}

impl EditalStatus {
    pub fn to_database_str(self) -> &'static str {
        match self {
            EditalStatus::Aberto => "aberto",
            EditalStatus::Encerrado => "encerrado",
        }
    }

    /// Unknown values read as open.
    pub fn from_database_str(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "encerrado" => EditalStatus::Encerrado,
            _ => EditalStatus::Aberto,
        }
    }
}

/// Contracting organization.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OrgaoEntidade {
    pub cnpj: Option<String>,
    pub razao_social: Option<String>,
}

/// Organizational unit running the purchase, with its location.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UnidadeOrgao {
    pub uf_sigla: Option<String>,
    pub municipio_nome: Option<String>,
    pub codigo_ibge: Option<String>,
    pub nome_unidade: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Edital {
    pub id: String,
    pub status: EditalStatus,
    pub ano_compra: Option<i32>,
    pub sequencial_compra: Option<i32>,
    pub numero_controle_pncp: Option<String>,
    pub orgao: OrgaoEntidade,
    pub unidade: UnidadeOrgao,
    pub modalidade_id: Option<i32>,
    pub modalidade_nome: Option<String>,
    /// Free-text description of what is being purchased. The main searched field.
    pub objeto_compra: Option<String>,
    pub informacao_complementar: Option<String>,
    pub valor_total_estimado: Option<f64>,
    /// Price registration system (Sistema de Registro de Preços).
    pub srp: bool,
    pub data_publicacao_pncp: Option<NaiveDateTime>,
    pub data_abertura_proposta: Option<NaiveDateTime>,
    pub data_encerramento_proposta: Option<NaiveDateTime>,
    pub data_atualizacao: Option<NaiveDateTime>,
}

impl Edital {
    pub fn objeto_text(&self) -> &str {
        self.objeto_compra.as_deref().unwrap_or("")
    }

    pub fn organization_text(&self) -> &str {
        self.orgao.razao_social.as_deref().unwrap_or("")
    }

    /// Text of a searchable field. Absent values read as empty.
    pub fn field_text(&self, field: SearchField) -> &str {
        match field {
            SearchField::ObjetoCompra => self.objeto_text(),
            SearchField::OrgaoRazaoSocial => self.organization_text(),
        }
    }

    /// Purchase number as printed on listings, e.g. `12/2025`.
    pub fn numero_compra(&self) -> Option<String> {
        match (self.sequencial_compra, self.ano_compra) {
            (Some(seq), Some(year)) => Some(format!("{}/{}", seq, year)),
            _ => None,
        }
    }
}

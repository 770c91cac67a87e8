//! SQLite storage for procurement notices.
//!
//! One `editais` table holding every record field plus two folded search
//! columns (`objeto_busca`, `orgao_busca`) computed at insert time, since
//! SQLite cannot strip accents at query time.
//! Uses r2d2 connection pooling to allow concurrent reads without mutex blocking.

use crate::interface::SearchFilter;
use crate::models::{Edital, EditalStatus, OrgaoEntidade, UnidadeOrgao};
use crate::normalize::fold_for_store;
use crate::query::PredicateSet;
use chrono::{NaiveDate, NaiveDateTime};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::types::Value;
use rusqlite::{params, OptionalExtension};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
}

pub type DatabaseResult<T> = Result<T, DatabaseError>;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const EDITAL_COLUMNS: &str = "id, status, ano_compra, sequencial_compra, numero_controle_pncp, \
     orgao_cnpj, orgao_razao_social, uf_sigla, municipio_nome, codigo_ibge, nome_unidade, \
     modalidade_id, modalidade_nome, objeto_compra, informacao_complementar, valor_total_estimado, \
     srp, data_publicacao_pncp, data_abertura_proposta, data_encerramento_proposta, data_atualizacao";

/// Parse a stored timestamp. Accepts fractional seconds, a `T` separator and
/// bare dates (read as midnight).
pub fn parse_db_timestamp(timestamp_str: &str) -> Option<NaiveDateTime> {
    let s = timestamp_str.trim();
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn format_timestamp(ts: &Option<NaiveDateTime>) -> Option<String> {
    ts.map(|t| t.format(TIMESTAMP_FORMAT).to_string())
}

/// Columns with a distinct-value lookup for filter option lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistinctField {
    State,
    City,
    Modality,
}

impl DistinctField {
    fn column(self) -> &'static str {
        match self {
            DistinctField::State => "uf_sigla",
            DistinctField::City => "municipio_nome",
            DistinctField::Modality => "modalidade_nome",
        }
    }
}

/// A filtered, ordered, paginated listing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditalQuery {
    pub predicates: PredicateSet,
    pub states: Vec<String>,
    pub cities: Vec<String>,
    pub modalities: Vec<String>,
    /// Proposal opening on or after this day.
    pub start_date: Option<NaiveDate>,
    /// Proposal closing on or before the end of this day.
    pub end_date: Option<NaiveDate>,
    /// 1-based.
    pub page: u32,
    pub limit: u32,
}

impl Default for EditalQuery {
    fn default() -> Self {
        Self {
            predicates: PredicateSet::Unfiltered,
            states: Vec::new(),
            cities: Vec::new(),
            modalities: Vec::new(),
            start_date: None,
            end_date: None,
            page: 1,
            limit: crate::config::DEFAULT_PAGE_SIZE,
        }
    }
}

impl EditalQuery {
    pub fn from_filter(filter: &SearchFilter, predicates: PredicateSet, page: u32, limit: u32) -> Self {
        Self {
            predicates,
            states: filter.states.clone(),
            cities: filter.cities.clone(),
            modalities: filter.modalities.clone(),
            start_date: filter.start_date,
            end_date: filter.end_date,
            page,
            limit,
        }
    }

    fn offset(&self) -> i64 {
        (self.page.max(1) as i64 - 1) * self.limit.max(1) as i64
    }

    /// `WHERE ...` (or empty) and its bound values.
    fn where_clause(&self) -> (String, Vec<Value>) {
        let mut clauses = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if let Some((sql, params)) = self.predicates.to_sql() {
            clauses.push(sql);
            values.extend(params.into_iter().map(Value::Text));
        }

        for (column, list) in [
            ("uf_sigla", &self.states),
            ("municipio_nome", &self.cities),
            ("modalidade_nome", &self.modalities),
        ] {
            if list.is_empty() {
                continue;
            }
            let placeholders = list.iter().map(|_| "?").collect::<Vec<_>>().join(",");
            clauses.push(format!("{} IN ({})", column, placeholders));
            values.extend(list.iter().cloned().map(Value::Text));
        }

        if let Some(start) = self.start_date.and_then(|d| d.and_hms_opt(0, 0, 0)) {
            clauses.push("data_abertura_proposta >= ?".to_string());
            values.push(Value::Text(start.format(TIMESTAMP_FORMAT).to_string()));
        }
        if let Some(end) = self.end_date.and_then(|d| d.and_hms_opt(23, 59, 59)) {
            clauses.push("data_encerramento_proposta <= ?".to_string());
            values.push(Value::Text(end.format(TIMESTAMP_FORMAT).to_string()));
        }

        if clauses.is_empty() {
            (String::new(), values)
        } else {
            (format!("WHERE {}", clauses.join(" AND ")), values)
        }
    }
}

/// Thread-safe database wrapper using connection pooling
///
/// WAL mode lets readers proceed without blocking each other.
pub struct Database {
    pool: Pool<SqliteConnectionManager>,
}

impl Database {
    /// Open or create a database at the given path with connection pooling
    pub fn open<P: AsRef<Path>>(path: P) -> DatabaseResult<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let manager = SqliteConnectionManager::file(path).with_init(|conn| {
            conn.execute_batch(
                "
                PRAGMA journal_mode=WAL;
                PRAGMA synchronous=NORMAL;
                PRAGMA cache_size=-32000;
            ",
            )?;
            Ok(())
        });

        let pool = Pool::builder().max_size(8).build(manager)?;

        let db = Self { pool };
        db.setup_schema()?;
        Ok(db)
    }

    /// Open an in-memory database (tests, demos)
    pub fn open_in_memory() -> DatabaseResult<Self> {
        let manager = SqliteConnectionManager::memory();

        // In-memory needs single connection to maintain state
        let pool = Pool::builder().max_size(1).build(manager)?;

        let db = Self { pool };
        db.setup_schema()?;
        Ok(db)
    }

    pub(crate) fn get_conn(&self) -> DatabaseResult<PooledConnection<SqliteConnectionManager>> {
        Ok(self.pool.get()?)
    }

    fn setup_schema(&self) -> DatabaseResult<()> {
        let conn = self.get_conn()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS editais (
                id TEXT PRIMARY KEY,
                status TEXT NOT NULL DEFAULT 'aberto',
                ano_compra INTEGER,
                sequencial_compra INTEGER,
                numero_controle_pncp TEXT,
                orgao_cnpj TEXT,
                orgao_razao_social TEXT,
                uf_sigla TEXT,
                municipio_nome TEXT,
                codigo_ibge TEXT,
                nome_unidade TEXT,
                modalidade_id INTEGER,
                modalidade_nome TEXT,
                objeto_compra TEXT,
                informacao_complementar TEXT,
                valor_total_estimado REAL,
                srp INTEGER NOT NULL DEFAULT 0,
                data_publicacao_pncp TEXT,
                data_abertura_proposta TEXT,
                data_encerramento_proposta TEXT,
                data_atualizacao TEXT,
                objeto_busca TEXT NOT NULL DEFAULT '',
                orgao_busca TEXT NOT NULL DEFAULT ''
            );

            CREATE INDEX IF NOT EXISTS idx_editais_uf ON editais(uf_sigla);
            CREATE INDEX IF NOT EXISTS idx_editais_municipio ON editais(municipio_nome);
            CREATE INDEX IF NOT EXISTS idx_editais_modalidade ON editais(modalidade_nome);
            CREATE INDEX IF NOT EXISTS idx_editais_publicacao ON editais(data_publicacao_pncp);
        "#,
        )?;
        Ok(())
    }

    /// Total number of stored notices
    pub fn count(&self) -> DatabaseResult<u64> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM editais", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Insert or replace a notice by id, refreshing its folded search columns.
    pub fn insert_edital(&self, edital: &Edital) -> DatabaseResult<()> {
        let conn = self.get_conn()?;
        Self::insert_with(&conn, edital)
    }

    /// Insert many notices in one transaction. Returns the number written.
    pub fn insert_many(&self, editais: &[Edital]) -> DatabaseResult<usize> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;
        for edital in editais {
            Self::insert_with(&tx, edital)?;
        }
        tx.commit()?;
        Ok(editais.len())
    }

    fn insert_with(conn: &rusqlite::Connection, e: &Edital) -> DatabaseResult<()> {
        conn.execute(
            r#"INSERT OR REPLACE INTO editais (
                   id, status, ano_compra, sequencial_compra, numero_controle_pncp,
                   orgao_cnpj, orgao_razao_social, uf_sigla, municipio_nome, codigo_ibge, nome_unidade,
                   modalidade_id, modalidade_nome, objeto_compra, informacao_complementar, valor_total_estimado,
                   srp, data_publicacao_pncp, data_abertura_proposta, data_encerramento_proposta, data_atualizacao,
                   objeto_busca, orgao_busca)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                       ?17, ?18, ?19, ?20, ?21, ?22, ?23)"#,
            params![
                e.id,
                e.status.to_database_str(),
                e.ano_compra,
                e.sequencial_compra,
                e.numero_controle_pncp,
                e.orgao.cnpj,
                e.orgao.razao_social,
                e.unidade.uf_sigla,
                e.unidade.municipio_nome,
                e.unidade.codigo_ibge,
                e.unidade.nome_unidade,
                e.modalidade_id,
                e.modalidade_nome,
                e.objeto_compra,
                e.informacao_complementar,
                e.valor_total_estimado,
                e.srp,
                format_timestamp(&e.data_publicacao_pncp),
                format_timestamp(&e.data_abertura_proposta),
                format_timestamp(&e.data_encerramento_proposta),
                format_timestamp(&e.data_atualizacao),
                fold_for_store(e.objeto_text()),
                fold_for_store(e.organization_text()),
            ],
        )?;
        Ok(())
    }

    pub fn fetch_by_id(&self, id: &str) -> DatabaseResult<Option<Edital>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM editais WHERE id = ?1", EDITAL_COLUMNS);
        Ok(conn.query_row(&sql, [id], Self::row_to_edital).optional()?)
    }

    /// Remove every notice
    pub fn clear(&self) -> DatabaseResult<()> {
        let conn = self.get_conn()?;
        conn.execute("DELETE FROM editais", [])?;
        Ok(())
    }

    /// One page of matching notices, newest publication first, and the exact
    /// number of rows matching the query across all pages.
    pub fn query_editais(&self, query: &EditalQuery) -> DatabaseResult<(Vec<Edital>, u64)> {
        let conn = self.get_conn()?;
        Self::run_query(&conn, query)
    }

    /// [`Database::query_editais`] with SQLite C-level interrupt support.
    /// Returns `Ok(None)` when the query was interrupted by `token`.
    pub fn query_editais_interruptible(
        &self,
        query: &EditalQuery,
        token: &tokio_util::sync::CancellationToken,
        runtime: &tokio::runtime::Handle,
    ) -> DatabaseResult<Option<(Vec<Edital>, u64)>> {
        use tokio_util::task::AbortOnDropHandle;

        let conn = self.get_conn()?;
        let interrupt_handle = conn.get_interrupt_handle();

        let token_clone = token.clone();
        let watcher = runtime.spawn(async move {
            token_clone.cancelled().await;
            interrupt_handle.interrupt();
        });
        let _abort_guard = AbortOnDropHandle::new(watcher);

        match Self::run_query(&conn, query) {
            Ok(result) => Ok(Some(result)),
            Err(DatabaseError::Sqlite(e)) if is_interrupted(&e) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn run_query(conn: &rusqlite::Connection, query: &EditalQuery) -> DatabaseResult<(Vec<Edital>, u64)> {
        let (where_sql, mut values) = query.where_clause();

        let count_sql = format!("SELECT COUNT(*) FROM editais {}", where_sql);
        let total: i64 = conn.query_row(&count_sql, rusqlite::params_from_iter(values.iter()), |row| row.get(0))?;

        let select_sql = format!(
            "SELECT {} FROM editais {} ORDER BY data_publicacao_pncp DESC, id LIMIT ? OFFSET ?",
            EDITAL_COLUMNS, where_sql
        );
        values.push(Value::Integer(query.limit.max(1) as i64));
        values.push(Value::Integer(query.offset()));

        let mut stmt = conn.prepare(&select_sql)?;
        let rows = stmt
            .query_map(rusqlite::params_from_iter(values.iter()), Self::row_to_edital)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok((rows, total as u64))
    }

    /// Sorted distinct non-empty values of a column, optionally within one state.
    pub fn distinct_values(&self, field: DistinctField, state: Option<&str>) -> DatabaseResult<Vec<String>> {
        let conn = self.get_conn()?;
        let column = field.column();
        let state_clause = if state.is_some() { "AND uf_sigla = ?1" } else { "" };
        let sql = format!(
            "SELECT DISTINCT {col} FROM editais WHERE {col} IS NOT NULL AND TRIM({col}) <> '' {state} ORDER BY {col}",
            col = column,
            state = state_clause
        );

        let mut stmt = conn.prepare(&sql)?;
        let first_column = |row: &rusqlite::Row| row.get::<_, String>(0);
        let values = match state {
            Some(uf) => stmt.query_map([uf], first_column)?.collect::<Result<Vec<_>, _>>()?,
            None => stmt.query_map([], first_column)?.collect::<Result<Vec<_>, _>>()?,
        };
        Ok(values)
    }

    fn row_to_edital(row: &rusqlite::Row) -> rusqlite::Result<Edital> {
        let status: String = row.get(1)?;
        let timestamp = |idx: usize| -> rusqlite::Result<Option<NaiveDateTime>> {
            Ok(row.get::<_, Option<String>>(idx)?.as_deref().and_then(parse_db_timestamp))
        };

        Ok(Edital {
            id: row.get(0)?,
            status: EditalStatus::from_database_str(&status),
            ano_compra: row.get(2)?,
            sequencial_compra: row.get(3)?,
            numero_controle_pncp: row.get(4)?,
            orgao: OrgaoEntidade {
                cnpj: row.get(5)?,
                razao_social: row.get(6)?,
            },
            unidade: UnidadeOrgao {
                uf_sigla: row.get(7)?,
                municipio_nome: row.get(8)?,
                codigo_ibge: row.get(9)?,
                nome_unidade: row.get(10)?,
            },
            modalidade_id: row.get(11)?,
            modalidade_nome: row.get(12)?,
            objeto_compra: row.get(13)?,
            informacao_complementar: row.get(14)?,
            valor_total_estimado: row.get(15)?,
            srp: row.get(16)?,
            data_publicacao_pncp: timestamp(17)?,
            data_abertura_proposta: timestamp(18)?,
            data_encerramento_proposta: timestamp(19)?,
            data_atualizacao: timestamp(20)?,
        })
    }
}

fn is_interrupted(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _) if err.code == rusqlite::ffi::ErrorCode::OperationInterrupted
    )
}

//! Brazilian banks (Banco Central participant list).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx_core::query::query;
use sqlx_core::query_builder::QueryBuilder;
use sqlx_core::query_scalar::query_scalar;
use sqlx_core::row::Row;
use sqlx_postgres::{PgPool, PgRow, Postgres};
use uuid::Uuid;

use crate::error::StorageResult;
use crate::row::contains_pattern;

const COLUMNS: &str =
    "id, codigo, codigo_interno, nome, website, descricao, status, criado_em, atualizado_em";

#[derive(Debug, Clone, Serialize)]
pub struct Banco {
    pub id: Uuid,
    pub codigo: String,
    pub codigo_interno: String,
    pub nome: String,
    pub website: Option<String>,
    pub descricao: Option<String>,
    pub status: String,
    pub criado_em: DateTime<Utc>,
    pub atualizado_em: DateTime<Utc>,
}

impl Banco {
    fn from_row(row: &PgRow) -> StorageResult<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            codigo: row.try_get("codigo")?,
            codigo_interno: row.try_get("codigo_interno")?,
            nome: row.try_get("nome")?,
            website: row.try_get("website")?,
            descricao: row.try_get("descricao")?,
            status: row.try_get("status")?,
            criado_em: row.try_get("criado_em")?,
            atualizado_em: row.try_get("atualizado_em")?,
        })
    }
}

/// A row of the embedded bank list.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NovoBanco {
    pub codigo: String,
    pub nome: String,
    pub codigo_interno: String,
}

pub struct BancoStorage<'a> {
    pool: &'a PgPool,
}

impl<'a> BancoStorage<'a> {
    #[must_use]
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Banks ordered by code, optionally filtered by name or code.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_all(&self, search: Option<&str>) -> StorageResult<Vec<Banco>> {
        let mut qb: QueryBuilder<'_, Postgres> =
            QueryBuilder::new(format!("SELECT {COLUMNS} FROM bancos"));
        if let Some(search) = search.filter(|s| !s.trim().is_empty()) {
            let pattern = contains_pattern(search);
            qb.push(" WHERE nome ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR codigo ILIKE ")
                .push_bind(pattern);
        }
        qb.push(" ORDER BY codigo");
        let rows = qb.build().fetch_all(self.pool).await?;
        rows.iter().map(Banco::from_row).collect()
    }

    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_id(&self, id: Uuid) -> StorageResult<Option<Banco>> {
        let sql = format!("SELECT {COLUMNS} FROM bancos WHERE id = $1");
        let row = query(&sql).bind(id).fetch_optional(self.pool).await?;
        row.as_ref().map(Banco::from_row).transpose()
    }

    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn count(&self) -> StorageResult<i64> {
        Ok(query_scalar("SELECT COUNT(*) FROM bancos")
            .fetch_one(self.pool)
            .await?)
    }

    /// Inserts all banks in one statement, skipping codes already present.
    /// Returns the number of rows inserted.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub async fn insert_many(&self, bancos: &[NovoBanco]) -> StorageResult<u64> {
        if bancos.is_empty() {
            return Ok(0);
        }
        let mut qb: QueryBuilder<'_, Postgres> =
            QueryBuilder::new("INSERT INTO bancos (codigo, nome, codigo_interno) ");
        qb.push_values(bancos, |mut b, banco| {
            b.push_bind(banco.codigo.clone())
                .push_bind(banco.nome.clone())
                .push_bind(banco.codigo_interno.clone());
        });
        qb.push(" ON CONFLICT DO NOTHING");
        let result = qb.build().execute(self.pool).await?;
        Ok(result.rows_affected())
    }
}

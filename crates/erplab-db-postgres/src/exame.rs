//! Minimal exam catalog referenced by pricing-table items.

use chrono::{DateTime, Utc};
use erplab_api::{FieldErrors, Validate};
use serde::{Deserialize, Serialize};
use sqlx_core::query::query;
use sqlx_core::row::Row;
use sqlx_postgres::{PgPool, PgRow};
use uuid::Uuid;

use crate::error::{StorageError, StorageResult};

const COLUMNS: &str = "id, codigo, nome, ativo, criado_em, atualizado_em";

#[derive(Debug, Clone, Serialize)]
pub struct Exame {
    pub id: Uuid,
    pub codigo: String,
    pub nome: String,
    pub ativo: bool,
    pub criado_em: DateTime<Utc>,
    pub atualizado_em: DateTime<Utc>,
}

impl Exame {
    fn from_row(row: &PgRow) -> StorageResult<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            codigo: row.try_get("codigo")?,
            nome: row.try_get("nome")?,
            ativo: row.try_get("ativo")?,
            criado_em: row.try_get("criado_em")?,
            atualizado_em: row.try_get("atualizado_em")?,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateExame {
    pub codigo: String,
    pub nome: String,
    pub ativo: Option<bool>,
}

impl Validate for CreateExame {
    fn validate(&self, errors: &mut FieldErrors) {
        errors.required("codigo", &self.codigo);
        errors.max_len("codigo", Some(&self.codigo), 50);
        errors.required("nome", &self.nome);
        errors.max_len("nome", Some(&self.nome), 255);
    }
}

pub struct ExameStorage<'a> {
    pool: &'a PgPool,
}

impl<'a> ExameStorage<'a> {
    #[must_use]
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `Conflict` when `codigo` is taken.
    pub async fn create(&self, input: &CreateExame) -> StorageResult<Exame> {
        let codigo = input.codigo.trim();
        let sql = format!(
            "INSERT INTO exames (codigo, nome, ativo) VALUES ($1, $2, $3) RETURNING {COLUMNS}"
        );
        let row = query(&sql)
            .bind(codigo)
            .bind(input.nome.trim())
            .bind(input.ativo.unwrap_or(true))
            .fetch_one(self.pool)
            .await
            .map_err(|e| {
                StorageError::from_constraint(e, || {
                    format!("Já existe um exame com o código {codigo}")
                })
            })?;
        Exame::from_row(&row)
    }

    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_all(&self) -> StorageResult<Vec<Exame>> {
        let sql = format!("SELECT {COLUMNS} FROM exames ORDER BY nome");
        let rows = query(&sql).fetch_all(self.pool).await?;
        rows.iter().map(Exame::from_row).collect()
    }

    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_id(&self, id: Uuid) -> StorageResult<Option<Exame>> {
        let sql = format!("SELECT {COLUMNS} FROM exames WHERE id = $1");
        let row = query(&sql).bind(id).fetch_optional(self.pool).await?;
        row.as_ref().map(Exame::from_row).transpose()
    }
}

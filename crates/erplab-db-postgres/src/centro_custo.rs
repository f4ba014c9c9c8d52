//! Cost centres.

use chrono::{DateTime, Utc};
use erplab_api::{FieldErrors, Validate};
use serde::{Deserialize, Serialize};
use sqlx_core::query::query;
use sqlx_core::row::Row;
use sqlx_postgres::{PgPool, PgRow};
use uuid::Uuid;

use crate::error::{StorageError, StorageResult};

const COLUMNS: &str = "id, codigo, nome, descricao, unidade_id, ativo, criado_em, atualizado_em";

#[derive(Debug, Clone, Serialize)]
pub struct CentroCusto {
    pub id: Uuid,
    pub codigo: String,
    pub nome: String,
    pub descricao: Option<String>,
    pub unidade_id: Option<Uuid>,
    pub ativo: bool,
    pub criado_em: DateTime<Utc>,
    pub atualizado_em: DateTime<Utc>,
}

impl CentroCusto {
    fn from_row(row: &PgRow) -> StorageResult<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            codigo: row.try_get("codigo")?,
            nome: row.try_get("nome")?,
            descricao: row.try_get("descricao")?,
            unidade_id: row.try_get("unidade_id")?,
            ativo: row.try_get("ativo")?,
            criado_em: row.try_get("criado_em")?,
            atualizado_em: row.try_get("atualizado_em")?,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateCentroCusto {
    pub codigo: String,
    pub nome: String,
    pub descricao: Option<String>,
    pub unidade_id: Option<Uuid>,
    pub ativo: Option<bool>,
}

impl Validate for CreateCentroCusto {
    fn validate(&self, errors: &mut FieldErrors) {
        errors.required("codigo", &self.codigo);
        errors.max_len("codigo", Some(&self.codigo), 20);
        errors.required("nome", &self.nome);
        errors.max_len("nome", Some(&self.nome), 255);
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateCentroCusto {
    pub codigo: Option<String>,
    pub nome: Option<String>,
    pub descricao: Option<String>,
    pub unidade_id: Option<Uuid>,
    pub ativo: Option<bool>,
}

impl Validate for UpdateCentroCusto {
    fn validate(&self, errors: &mut FieldErrors) {
        errors.not_blank("codigo", self.codigo.as_deref());
        errors.max_len("codigo", self.codigo.as_deref(), 20);
        errors.not_blank("nome", self.nome.as_deref());
        errors.max_len("nome", self.nome.as_deref(), 255);
    }
}

fn codigo_conflict(codigo: &str) -> String {
    format!("Já existe um centro de custo com o código {codigo}")
}

pub struct CentroCustoStorage<'a> {
    pool: &'a PgPool,
}

impl<'a> CentroCustoStorage<'a> {
    #[must_use]
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `Conflict` when `codigo` is taken.
    pub async fn create(&self, input: &CreateCentroCusto) -> StorageResult<CentroCusto> {
        let codigo = input.codigo.trim();
        if self.find_by_codigo(codigo).await?.is_some() {
            return Err(StorageError::conflict(codigo_conflict(codigo)));
        }
        let sql = format!(
            "INSERT INTO centros_custo (codigo, nome, descricao, unidade_id, ativo) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {COLUMNS}"
        );
        let row = query(&sql)
            .bind(codigo)
            .bind(input.nome.trim())
            .bind(&input.descricao)
            .bind(input.unidade_id)
            .bind(input.ativo.unwrap_or(true))
            .fetch_one(self.pool)
            .await
            .map_err(|e| StorageError::from_constraint(e, || codigo_conflict(codigo)))?;
        CentroCusto::from_row(&row)
    }

    /// All cost centres ordered by code.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_all(&self, somente_ativos: bool) -> StorageResult<Vec<CentroCusto>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM centros_custo WHERE ($1 = FALSE OR ativo) ORDER BY codigo"
        );
        let rows = query(&sql)
            .bind(somente_ativos)
            .fetch_all(self.pool)
            .await?;
        rows.iter().map(CentroCusto::from_row).collect()
    }

    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_id(&self, id: Uuid) -> StorageResult<Option<CentroCusto>> {
        let sql = format!("SELECT {COLUMNS} FROM centros_custo WHERE id = $1");
        let row = query(&sql).bind(id).fetch_optional(self.pool).await?;
        row.as_ref().map(CentroCusto::from_row).transpose()
    }

    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_codigo(&self, codigo: &str) -> StorageResult<Option<CentroCusto>> {
        let sql = format!("SELECT {COLUMNS} FROM centros_custo WHERE codigo = $1");
        let row = query(&sql).bind(codigo).fetch_optional(self.pool).await?;
        row.as_ref().map(CentroCusto::from_row).transpose()
    }

    /// # Errors
    ///
    /// Returns `Conflict` if the new code belongs to another cost centre.
    pub async fn update(
        &self,
        id: Uuid,
        input: &UpdateCentroCusto,
    ) -> StorageResult<Option<CentroCusto>> {
        let codigo = input.codigo.as_deref().map(str::trim);
        if let Some(codigo) = codigo
            && let Some(existente) = self.find_by_codigo(codigo).await?
            && existente.id != id
        {
            return Err(StorageError::conflict(codigo_conflict(codigo)));
        }
        let sql = format!(
            "UPDATE centros_custo SET \
                codigo = COALESCE($2, codigo), \
                nome = COALESCE($3, nome), \
                descricao = COALESCE($4, descricao), \
                unidade_id = COALESCE($5, unidade_id), \
                ativo = COALESCE($6, ativo), \
                atualizado_em = now() \
             WHERE id = $1 RETURNING {COLUMNS}"
        );
        let row = query(&sql)
            .bind(id)
            .bind(codigo)
            .bind(input.nome.as_deref().map(str::trim))
            .bind(&input.descricao)
            .bind(input.unidade_id)
            .bind(input.ativo)
            .fetch_optional(self.pool)
            .await
            .map_err(|e| StorageError::from_constraint(e, || codigo_conflict(codigo.unwrap_or(""))))?;
        row.as_ref().map(CentroCusto::from_row).transpose()
    }

    /// # Errors
    ///
    /// Returns an error if the database update fails.
    pub async fn toggle_ativo(&self, id: Uuid) -> StorageResult<Option<CentroCusto>> {
        self.set_ativo_expr(id, "NOT ativo").await
    }

    /// Soft delete.
    ///
    /// # Errors
    ///
    /// Returns an error if the database update fails.
    pub async fn deactivate(&self, id: Uuid) -> StorageResult<Option<CentroCusto>> {
        self.set_ativo_expr(id, "FALSE").await
    }

    async fn set_ativo_expr(&self, id: Uuid, expr: &str) -> StorageResult<Option<CentroCusto>> {
        let sql = format!(
            "UPDATE centros_custo SET ativo = {expr}, atualizado_em = now() \
             WHERE id = $1 RETURNING {COLUMNS}"
        );
        let row = query(&sql).bind(id).fetch_optional(self.pool).await?;
        row.as_ref().map(CentroCusto::from_row).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codigo_is_limited_to_twenty_characters() {
        let input = CreateCentroCusto {
            codigo: "X".repeat(21),
            nome: "Administrativo".into(),
            descricao: None,
            unidade_id: None,
            ativo: None,
        };
        let mut errors = FieldErrors::new();
        input.validate(&mut errors);
        assert_eq!(errors.as_slice(), ["codigo: deve ter no máximo 20 caracteres"]);
    }

    #[test]
    fn update_accepts_partial_payload() {
        let input: UpdateCentroCusto =
            serde_json::from_value(serde_json::json!({"nome": "Financeiro"})).unwrap();
        assert!(erplab_api::validate(&input).is_ok());
        assert!(input.codigo.is_none());
    }
}

//! CNAE (national economic activity classification) catalog.

use chrono::{DateTime, Utc};
use erplab_api::Page;
use serde::{Deserialize, Serialize};
use sqlx_core::query::query;
use sqlx_core::query_builder::QueryBuilder;
use sqlx_core::query_scalar::query_scalar;
use sqlx_core::row::Row;
use sqlx_postgres::{PgPool, PgRow, Postgres};
use uuid::Uuid;

use crate::error::StorageResult;
use crate::row::contains_pattern;

const COLUMNS: &str = "id, codigo, descricao, secao, descricao_secao, divisao, descricao_divisao, \
    grupo, descricao_grupo, classe, descricao_classe, subclasse, descricao_subclasse, \
    observacoes, ativo, criado_em, atualizado_em";

/// Upper bound for the quick search endpoint.
pub const SEARCH_LIMIT: i64 = 20;

#[derive(Debug, Clone, Serialize)]
pub struct Cnae {
    pub id: Uuid,
    pub codigo: String,
    pub descricao: String,
    pub secao: String,
    pub descricao_secao: String,
    pub divisao: String,
    pub descricao_divisao: String,
    pub grupo: String,
    pub descricao_grupo: String,
    pub classe: String,
    pub descricao_classe: String,
    pub subclasse: String,
    pub descricao_subclasse: String,
    pub observacoes: Option<String>,
    pub ativo: bool,
    pub criado_em: DateTime<Utc>,
    pub atualizado_em: DateTime<Utc>,
}

impl Cnae {
    fn from_row(row: &PgRow) -> StorageResult<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            codigo: row.try_get("codigo")?,
            descricao: row.try_get("descricao")?,
            secao: row.try_get("secao")?,
            descricao_secao: row.try_get("descricao_secao")?,
            divisao: row.try_get("divisao")?,
            descricao_divisao: row.try_get("descricao_divisao")?,
            grupo: row.try_get("grupo")?,
            descricao_grupo: row.try_get("descricao_grupo")?,
            classe: row.try_get("classe")?,
            descricao_classe: row.try_get("descricao_classe")?,
            subclasse: row.try_get("subclasse")?,
            descricao_subclasse: row.try_get("descricao_subclasse")?,
            observacoes: row.try_get("observacoes")?,
            ativo: row.try_get("ativo")?,
            criado_em: row.try_get("criado_em")?,
            atualizado_em: row.try_get("atualizado_em")?,
        })
    }
}

/// A CNAE to insert; the embedded seed file uses camelCase keys.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NovoCnae {
    pub codigo: String,
    pub descricao: String,
    pub secao: String,
    pub descricao_secao: String,
    pub divisao: String,
    pub descricao_divisao: String,
    pub grupo: String,
    pub descricao_grupo: String,
    pub classe: String,
    pub descricao_classe: String,
    pub subclasse: String,
    pub descricao_subclasse: String,
    #[serde(default)]
    pub observacoes: Option<String>,
    #[serde(default = "default_ativo")]
    pub ativo: bool,
}

fn default_ativo() -> bool {
    true
}

#[derive(Debug, Clone, Default)]
pub struct CnaeFiltros {
    pub search: Option<String>,
    pub secao: Option<String>,
    pub divisao: Option<String>,
}

pub struct CnaeStorage<'a> {
    pool: &'a PgPool,
}

impl<'a> CnaeStorage<'a> {
    #[must_use]
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Paginated listing ordered by code.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_all(
        &self,
        filtros: &CnaeFiltros,
        page: Page,
    ) -> StorageResult<(Vec<Cnae>, i64)> {
        let mut count_qb: QueryBuilder<'_, Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM cnaes WHERE 1 = 1");
        push_filtros(&mut count_qb, filtros);
        let total: i64 = count_qb.build_query_scalar().fetch_one(self.pool).await?;

        let mut qb: QueryBuilder<'_, Postgres> =
            QueryBuilder::new(format!("SELECT {COLUMNS} FROM cnaes WHERE 1 = 1"));
        push_filtros(&mut qb, filtros);
        qb.push(" ORDER BY codigo LIMIT ")
            .push_bind(page.limit_i64())
            .push(" OFFSET ")
            .push_bind(page.offset());
        let rows = qb.build().fetch_all(self.pool).await?;
        let cnaes = rows
            .iter()
            .map(Cnae::from_row)
            .collect::<StorageResult<Vec<_>>>()?;
        Ok((cnaes, total))
    }

    /// Quick lookup on code or description, at most [`SEARCH_LIMIT`] rows.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn search(&self, termo: &str) -> StorageResult<Vec<Cnae>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM cnaes WHERE codigo ILIKE $1 OR descricao ILIKE $1 \
             ORDER BY codigo LIMIT $2"
        );
        let rows = query(&sql)
            .bind(contains_pattern(termo))
            .bind(SEARCH_LIMIT)
            .fetch_all(self.pool)
            .await?;
        rows.iter().map(Cnae::from_row).collect()
    }

    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_codigo(&self, codigo: &str) -> StorageResult<Option<Cnae>> {
        let sql = format!("SELECT {COLUMNS} FROM cnaes WHERE codigo = $1");
        let row = query(&sql)
            .bind(codigo.trim())
            .fetch_optional(self.pool)
            .await?;
        row.as_ref().map(Cnae::from_row).transpose()
    }

    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_secao(&self, secao: &str) -> StorageResult<Vec<Cnae>> {
        let sql = format!("SELECT {COLUMNS} FROM cnaes WHERE secao = $1 ORDER BY codigo");
        let rows = query(&sql)
            .bind(secao.trim().to_uppercase())
            .fetch_all(self.pool)
            .await?;
        rows.iter().map(Cnae::from_row).collect()
    }

    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_divisao(&self, divisao: &str) -> StorageResult<Vec<Cnae>> {
        let sql = format!("SELECT {COLUMNS} FROM cnaes WHERE divisao = $1 ORDER BY codigo");
        let rows = query(&sql)
            .bind(divisao.trim())
            .fetch_all(self.pool)
            .await?;
        rows.iter().map(Cnae::from_row).collect()
    }

    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_id(&self, id: Uuid) -> StorageResult<Option<Cnae>> {
        let sql = format!("SELECT {COLUMNS} FROM cnaes WHERE id = $1");
        let row = query(&sql).bind(id).fetch_optional(self.pool).await?;
        row.as_ref().map(Cnae::from_row).transpose()
    }

    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn count(&self) -> StorageResult<i64> {
        Ok(query_scalar("SELECT COUNT(*) FROM cnaes")
            .fetch_one(self.pool)
            .await?)
    }

    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn exists(&self, codigo: &str) -> StorageResult<bool> {
        Ok(
            query_scalar("SELECT EXISTS (SELECT 1 FROM cnaes WHERE codigo = $1)")
                .bind(codigo)
                .fetch_one(self.pool)
                .await?,
        )
    }

    /// Bulk insert skipping existing codes. Callers keep batches small enough
    /// for the bind-parameter limit (a few thousand rows).
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub async fn insert_many(&self, cnaes: &[NovoCnae]) -> StorageResult<u64> {
        if cnaes.is_empty() {
            return Ok(0);
        }
        let mut qb: QueryBuilder<'_, Postgres> = QueryBuilder::new(
            "INSERT INTO cnaes (codigo, descricao, secao, descricao_secao, divisao, \
                descricao_divisao, grupo, descricao_grupo, classe, descricao_classe, subclasse, \
                descricao_subclasse, observacoes, ativo) ",
        );
        qb.push_values(cnaes, |mut b, c| {
            b.push_bind(c.codigo.clone())
                .push_bind(c.descricao.clone())
                .push_bind(c.secao.clone())
                .push_bind(c.descricao_secao.clone())
                .push_bind(c.divisao.clone())
                .push_bind(c.descricao_divisao.clone())
                .push_bind(c.grupo.clone())
                .push_bind(c.descricao_grupo.clone())
                .push_bind(c.classe.clone())
                .push_bind(c.descricao_classe.clone())
                .push_bind(c.subclasse.clone())
                .push_bind(c.descricao_subclasse.clone())
                .push_bind(c.observacoes.clone())
                .push_bind(c.ativo);
        });
        qb.push(" ON CONFLICT (codigo) DO NOTHING");
        let result = qb.build().execute(self.pool).await?;
        Ok(result.rows_affected())
    }
}

fn push_filtros(qb: &mut QueryBuilder<'_, Postgres>, filtros: &CnaeFiltros) {
    if let Some(search) = filtros.search.as_deref().filter(|s| !s.trim().is_empty()) {
        let pattern = contains_pattern(search);
        qb.push(" AND (codigo ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR descricao ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(secao) = filtros.secao.as_deref().filter(|s| !s.trim().is_empty()) {
        qb.push(" AND secao = ").push_bind(secao.trim().to_uppercase());
    }
    if let Some(divisao) = filtros.divisao.as_deref().filter(|s| !s.trim().is_empty()) {
        qb.push(" AND divisao = ").push_bind(divisao.trim().to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_health_cnaes_deserialize() {
        let cnaes: Vec<NovoCnae> =
            serde_json::from_str(include_str!("../seed-data/cnaes_saude.json")).unwrap();
        assert_eq!(cnaes.len(), 12);
        assert!(cnaes.iter().all(|c| c.secao == "Q" && c.ativo));
    }
}

//! Brazilian states and municipalities, keyed by IBGE code.

use serde::{Deserialize, Serialize};
use sqlx_core::query::query;
use sqlx_core::query_builder::QueryBuilder;
use sqlx_core::query_scalar::query_scalar;
use sqlx_core::row::Row;
use sqlx_postgres::{PgPool, PgRow, Postgres};
use uuid::Uuid;

use crate::error::StorageResult;

#[derive(Debug, Clone, Serialize)]
pub struct Estado {
    pub id: Uuid,
    pub codigo_ibge: i32,
    pub sigla: String,
    pub nome: String,
    pub regiao: String,
}

impl Estado {
    fn from_row(row: &PgRow) -> StorageResult<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            codigo_ibge: row.try_get("codigo_ibge")?,
            sigla: row.try_get("sigla")?,
            nome: row.try_get("nome")?,
            regiao: row.try_get("regiao")?,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Cidade {
    pub codigo_ibge: i32,
    pub nome: String,
    pub uf: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NovoEstado {
    pub codigo_ibge: i32,
    pub sigla: &'static str,
    pub nome: &'static str,
    pub regiao: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NovaCidade {
    pub codigo_ibge: i32,
    pub nome: String,
}

pub struct LocalidadeStorage<'a> {
    pool: &'a PgPool,
}

impl<'a> LocalidadeStorage<'a> {
    #[must_use]
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_estados(&self) -> StorageResult<Vec<Estado>> {
        let rows = query("SELECT id, codigo_ibge, sigla, nome, regiao FROM estados ORDER BY nome")
            .fetch_all(self.pool)
            .await?;
        rows.iter().map(Estado::from_row).collect()
    }

    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_estado(&self, uf: &str) -> StorageResult<Option<Estado>> {
        let row = query("SELECT id, codigo_ibge, sigla, nome, regiao FROM estados WHERE sigla = $1")
            .bind(uf.to_uppercase())
            .fetch_optional(self.pool)
            .await?;
        row.as_ref().map(Estado::from_row).transpose()
    }

    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn count_estados(&self) -> StorageResult<i64> {
        Ok(query_scalar("SELECT COUNT(*) FROM estados")
            .fetch_one(self.pool)
            .await?)
    }

    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub async fn insert_estados(&self, estados: &[NovoEstado]) -> StorageResult<u64> {
        if estados.is_empty() {
            return Ok(0);
        }
        let mut qb: QueryBuilder<'_, Postgres> =
            QueryBuilder::new("INSERT INTO estados (codigo_ibge, sigla, nome, regiao) ");
        qb.push_values(estados, |mut b, e| {
            b.push_bind(e.codigo_ibge)
                .push_bind(e.sigla)
                .push_bind(e.nome)
                .push_bind(e.regiao);
        });
        qb.push(" ON CONFLICT DO NOTHING");
        Ok(qb.build().execute(self.pool).await?.rows_affected())
    }

    /// States that have no city rows yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn estados_sem_cidades(&self) -> StorageResult<Vec<Estado>> {
        let rows = query(
            "SELECT e.id, e.codigo_ibge, e.sigla, e.nome, e.regiao FROM estados e \
             WHERE NOT EXISTS (SELECT 1 FROM cidades c WHERE c.estado_id = e.id) \
             ORDER BY e.sigla",
        )
        .fetch_all(self.pool)
        .await?;
        rows.iter().map(Estado::from_row).collect()
    }

    /// Cities of a state ordered by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_cidades(&self, uf: &str) -> StorageResult<Vec<Cidade>> {
        let rows = query(
            "SELECT c.codigo_ibge, c.nome, e.sigla FROM cidades c \
             JOIN estados e ON e.id = c.estado_id \
             WHERE e.sigla = $1 ORDER BY c.nome",
        )
        .bind(uf.to_uppercase())
        .fetch_all(self.pool)
        .await?;
        rows.iter()
            .map(|row| {
                Ok(Cidade {
                    codigo_ibge: row.try_get("codigo_ibge")?,
                    nome: row.try_get("nome")?,
                    uf: row.try_get("sigla")?,
                })
            })
            .collect()
    }

    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn count_cidades(&self) -> StorageResult<i64> {
        Ok(query_scalar("SELECT COUNT(*) FROM cidades")
            .fetch_one(self.pool)
            .await?)
    }

    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub async fn insert_cidades(&self, estado_id: Uuid, cidades: &[NovaCidade]) -> StorageResult<u64> {
        if cidades.is_empty() {
            return Ok(0);
        }
        let mut qb: QueryBuilder<'_, Postgres> =
            QueryBuilder::new("INSERT INTO cidades (codigo_ibge, nome, estado_id) ");
        qb.push_values(cidades, |mut b, c| {
            b.push_bind(c.codigo_ibge)
                .push_bind(c.nome.clone())
                .push_bind(estado_id);
        });
        qb.push(" ON CONFLICT DO NOTHING");
        Ok(qb.build().execute(self.pool).await?.rows_affected())
    }
}

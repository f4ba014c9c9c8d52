//! Application users that authenticate against the API.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx_core::query::query;
use sqlx_core::query_scalar::query_scalar;
use sqlx_core::row::Row;
use sqlx_postgres::{PgPool, PgRow};
use uuid::Uuid;

use crate::error::{StorageError, StorageResult};

const COLUMNS: &str =
    "id, nome, email, senha_hash, foto_url, ativo, ultimo_login, criado_em, atualizado_em";

#[derive(Debug, Clone, Serialize)]
pub struct Usuario {
    pub id: Uuid,
    pub nome: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub senha_hash: String,
    pub foto_url: Option<String>,
    pub ativo: bool,
    pub ultimo_login: Option<DateTime<Utc>>,
    pub criado_em: DateTime<Utc>,
    pub atualizado_em: DateTime<Utc>,
}

impl Usuario {
    fn from_row(row: &PgRow) -> StorageResult<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            nome: row.try_get("nome")?,
            email: row.try_get("email")?,
            senha_hash: row.try_get("senha_hash")?,
            foto_url: row.try_get("foto_url")?,
            ativo: row.try_get("ativo")?,
            ultimo_login: row.try_get("ultimo_login")?,
            criado_em: row.try_get("criado_em")?,
            atualizado_em: row.try_get("atualizado_em")?,
        })
    }
}

/// A user to insert. The password must already be hashed.
#[derive(Debug, Clone)]
pub struct NovoUsuario {
    pub nome: String,
    pub email: String,
    pub senha_hash: String,
}

pub struct UsuarioStorage<'a> {
    pool: &'a PgPool,
}

impl<'a> UsuarioStorage<'a> {
    #[must_use]
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_id(&self, id: Uuid) -> StorageResult<Option<Usuario>> {
        let sql = format!("SELECT {COLUMNS} FROM usuarios WHERE id = $1");
        let row = query(&sql).bind(id).fetch_optional(self.pool).await?;
        row.as_ref().map(Usuario::from_row).transpose()
    }

    /// Lookup is case-insensitive.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_email(&self, email: &str) -> StorageResult<Option<Usuario>> {
        let sql = format!("SELECT {COLUMNS} FROM usuarios WHERE lower(email) = lower($1)");
        let row = query(&sql).bind(email).fetch_optional(self.pool).await?;
        row.as_ref().map(Usuario::from_row).transpose()
    }

    /// # Errors
    ///
    /// Returns `Conflict` if the e-mail is already registered.
    pub async fn create(&self, novo: &NovoUsuario) -> StorageResult<Usuario> {
        let sql = format!(
            "INSERT INTO usuarios (nome, email, senha_hash) VALUES ($1, lower($2), $3) RETURNING {COLUMNS}"
        );
        let row = query(&sql)
            .bind(&novo.nome)
            .bind(&novo.email)
            .bind(&novo.senha_hash)
            .fetch_one(self.pool)
            .await
            .map_err(|e| {
                StorageError::from_constraint(e, || {
                    format!("Já existe um usuário com o e-mail {}", novo.email)
                })
            })?;
        Usuario::from_row(&row)
    }

    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn count(&self) -> StorageResult<i64> {
        Ok(query_scalar("SELECT COUNT(*) FROM usuarios")
            .fetch_one(self.pool)
            .await?)
    }

    /// Records a successful login.
    ///
    /// # Errors
    ///
    /// Returns an error if the database update fails.
    pub async fn register_login(&self, id: Uuid) -> StorageResult<()> {
        query("UPDATE usuarios SET ultimo_login = now() WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(())
    }
}

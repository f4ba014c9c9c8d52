use chrono::{DateTime, Utc};
use erplab_api::{FieldErrors, Validate};
use serde::{Deserialize, Serialize};
use sqlx_core::query::query;
use sqlx_core::row::Row;
use sqlx_postgres::{PgPool, PgRow};
use uuid::Uuid;

use super::{Estatisticas, estatisticas};
use crate::error::{StorageError, StorageResult};
use crate::row::enum_col;

text_enum! {
    pub enum TipoSetor {
        Laboratorial => "laboratorial",
        Clinico => "clinico",
        Administrativo => "administrativo",
        Apoio => "apoio",
    }
}

const COLUMNS: &str = "id, codigo_setor, nome, descricao, tipo_setor, setor_pai_id, \
    responsavel_id, observacoes, ativo, unidade_id, empresa_id, criado_por, atualizado_por, \
    criado_em, atualizado_em";

#[derive(Debug, Clone, Serialize)]
pub struct Setor {
    pub id: Uuid,
    pub codigo_setor: String,
    pub nome: String,
    pub descricao: Option<String>,
    pub tipo_setor: TipoSetor,
    pub setor_pai_id: Option<Uuid>,
    pub responsavel_id: Option<Uuid>,
    pub observacoes: Option<String>,
    pub ativo: bool,
    pub unidade_id: Uuid,
    pub empresa_id: Option<Uuid>,
    pub criado_por: Option<Uuid>,
    pub atualizado_por: Option<Uuid>,
    pub criado_em: DateTime<Utc>,
    pub atualizado_em: DateTime<Utc>,
}

impl Setor {
    fn from_row(row: &PgRow) -> StorageResult<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            codigo_setor: row.try_get("codigo_setor")?,
            nome: row.try_get("nome")?,
            descricao: row.try_get("descricao")?,
            tipo_setor: enum_col(row, "tipo_setor")?,
            setor_pai_id: row.try_get("setor_pai_id")?,
            responsavel_id: row.try_get("responsavel_id")?,
            observacoes: row.try_get("observacoes")?,
            ativo: row.try_get("ativo")?,
            unidade_id: row.try_get("unidade_id")?,
            empresa_id: row.try_get("empresa_id")?,
            criado_por: row.try_get("criado_por")?,
            atualizado_por: row.try_get("atualizado_por")?,
            criado_em: row.try_get("criado_em")?,
            atualizado_em: row.try_get("atualizado_em")?,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateSetor {
    pub codigo_setor: String,
    pub nome: String,
    pub descricao: Option<String>,
    pub tipo_setor: TipoSetor,
    pub setor_pai_id: Option<Uuid>,
    pub responsavel_id: Option<Uuid>,
    pub observacoes: Option<String>,
    pub ativo: Option<bool>,
    pub unidade_id: Uuid,
    pub empresa_id: Option<Uuid>,
}

impl Validate for CreateSetor {
    fn validate(&self, errors: &mut FieldErrors) {
        errors.required("codigo_setor", &self.codigo_setor);
        errors.max_len("codigo_setor", Some(&self.codigo_setor), 50);
        errors.required("nome", &self.nome);
        errors.max_len("nome", Some(&self.nome), 255);
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateSetor {
    pub codigo_setor: Option<String>,
    pub nome: Option<String>,
    pub descricao: Option<String>,
    pub tipo_setor: Option<TipoSetor>,
    pub setor_pai_id: Option<Uuid>,
    pub responsavel_id: Option<Uuid>,
    pub observacoes: Option<String>,
    pub ativo: Option<bool>,
    pub unidade_id: Option<Uuid>,
    pub empresa_id: Option<Uuid>,
}

impl Validate for UpdateSetor {
    fn validate(&self, errors: &mut FieldErrors) {
        errors.not_blank("codigo_setor", self.codigo_setor.as_deref());
        errors.max_len("codigo_setor", self.codigo_setor.as_deref(), 50);
        errors.not_blank("nome", self.nome.as_deref());
        errors.max_len("nome", self.nome.as_deref(), 255);
    }
}

fn codigo_conflict(codigo: &str) -> String {
    format!("Já existe um setor com o código {codigo}")
}

pub struct SetorStorage<'a> {
    pool: &'a PgPool,
}

impl<'a> SetorStorage<'a> {
    #[must_use]
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `Conflict` when `codigo_setor` is taken.
    pub async fn create(&self, input: &CreateSetor, usuario_id: Option<Uuid>) -> StorageResult<Setor> {
        let codigo = input.codigo_setor.trim();
        if self.find_by_codigo(codigo).await?.is_some() {
            return Err(StorageError::conflict(codigo_conflict(codigo)));
        }
        let sql = format!(
            "INSERT INTO setores (codigo_setor, nome, descricao, tipo_setor, setor_pai_id, \
                responsavel_id, observacoes, ativo, unidade_id, empresa_id, criado_por, atualizado_por) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $11) RETURNING {COLUMNS}"
        );
        let row = query(&sql)
            .bind(codigo)
            .bind(input.nome.trim())
            .bind(&input.descricao)
            .bind(input.tipo_setor.as_str())
            .bind(input.setor_pai_id)
            .bind(input.responsavel_id)
            .bind(&input.observacoes)
            .bind(input.ativo.unwrap_or(true))
            .bind(input.unidade_id)
            .bind(input.empresa_id)
            .bind(usuario_id)
            .fetch_one(self.pool)
            .await
            .map_err(|e| StorageError::from_constraint(e, || codigo_conflict(codigo)))?;
        Setor::from_row(&row)
    }

    async fn list(&self, where_clause: &str, arg: Option<&str>, id: Option<Uuid>) -> StorageResult<Vec<Setor>> {
        let sql = format!("SELECT {COLUMNS} FROM setores {where_clause} ORDER BY nome, id");
        let mut q = query(&sql);
        if let Some(arg) = arg {
            q = q.bind(arg);
        }
        if let Some(id) = id {
            q = q.bind(id);
        }
        let rows = q.fetch_all(self.pool).await?;
        rows.iter().map(Setor::from_row).collect()
    }

    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_all(&self) -> StorageResult<Vec<Setor>> {
        self.list("", None, None).await
    }

    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_ativos(&self) -> StorageResult<Vec<Setor>> {
        self.list("WHERE ativo", None, None).await
    }

    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_tipo(&self, tipo: TipoSetor) -> StorageResult<Vec<Setor>> {
        self.list("WHERE tipo_setor = $1", Some(tipo.as_str()), None)
            .await
    }

    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_unidade(&self, unidade_id: Uuid) -> StorageResult<Vec<Setor>> {
        self.list("WHERE unidade_id = $1", None, Some(unidade_id))
            .await
    }

    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn estatisticas(&self) -> StorageResult<Estatisticas> {
        estatisticas(self.pool, "setores", "tipo_setor").await
    }

    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_id(&self, id: Uuid) -> StorageResult<Option<Setor>> {
        let sql = format!("SELECT {COLUMNS} FROM setores WHERE id = $1");
        let row = query(&sql).bind(id).fetch_optional(self.pool).await?;
        row.as_ref().map(Setor::from_row).transpose()
    }

    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_codigo(&self, codigo: &str) -> StorageResult<Option<Setor>> {
        let sql = format!("SELECT {COLUMNS} FROM setores WHERE codigo_setor = $1");
        let row = query(&sql).bind(codigo).fetch_optional(self.pool).await?;
        row.as_ref().map(Setor::from_row).transpose()
    }

    /// # Errors
    ///
    /// Returns `Conflict` when the new code belongs to another sector.
    pub async fn update(
        &self,
        id: Uuid,
        input: &UpdateSetor,
        usuario_id: Option<Uuid>,
    ) -> StorageResult<Option<Setor>> {
        let codigo = input.codigo_setor.as_deref().map(str::trim);
        if let Some(codigo) = codigo
            && let Some(existente) = self.find_by_codigo(codigo).await?
            && existente.id != id
        {
            return Err(StorageError::conflict(codigo_conflict(codigo)));
        }
        if input.setor_pai_id == Some(id) {
            return Err(StorageError::invalid_input(
                "Um setor não pode ser pai de si mesmo",
            ));
        }
        let sql = format!(
            "UPDATE setores SET \
                codigo_setor = COALESCE($2, codigo_setor), \
                nome = COALESCE($3, nome), \
                descricao = COALESCE($4, descricao), \
                tipo_setor = COALESCE($5, tipo_setor), \
                setor_pai_id = COALESCE($6, setor_pai_id), \
                responsavel_id = COALESCE($7, responsavel_id), \
                observacoes = COALESCE($8, observacoes), \
                ativo = COALESCE($9, ativo), \
                unidade_id = COALESCE($10, unidade_id), \
                empresa_id = COALESCE($11, empresa_id), \
                atualizado_por = COALESCE($12, atualizado_por), \
                atualizado_em = now() \
             WHERE id = $1 RETURNING {COLUMNS}"
        );
        let row = query(&sql)
            .bind(id)
            .bind(codigo)
            .bind(input.nome.as_deref().map(str::trim))
            .bind(&input.descricao)
            .bind(input.tipo_setor.map(|t| t.as_str()))
            .bind(input.setor_pai_id)
            .bind(input.responsavel_id)
            .bind(&input.observacoes)
            .bind(input.ativo)
            .bind(input.unidade_id)
            .bind(input.empresa_id)
            .bind(usuario_id)
            .fetch_optional(self.pool)
            .await
            .map_err(|e| StorageError::from_constraint(e, || codigo_conflict(codigo.unwrap_or(""))))?;
        row.as_ref().map(Setor::from_row).transpose()
    }

    /// # Errors
    ///
    /// Returns an error if the database update fails.
    pub async fn toggle_ativo(&self, id: Uuid, usuario_id: Option<Uuid>) -> StorageResult<Option<Setor>> {
        let sql = format!(
            "UPDATE setores SET ativo = NOT ativo, atualizado_por = COALESCE($2, atualizado_por), \
                atualizado_em = now() \
             WHERE id = $1 RETURNING {COLUMNS}"
        );
        let row = query(&sql)
            .bind(id)
            .bind(usuario_id)
            .fetch_optional(self.pool)
            .await?;
        row.as_ref().map(Setor::from_row).transpose()
    }

    /// Hard delete. Child sectors, rooms and equipment lose the reference.
    ///
    /// # Errors
    ///
    /// Returns an error if the database delete fails.
    pub async fn delete(&self, id: Uuid) -> StorageResult<bool> {
        let result = query("DELETE FROM setores WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_requires_unidade() {
        let result: Result<CreateSetor, _> = serde_json::from_value(serde_json::json!({
            "codigo_setor": "BIO",
            "nome": "Bioquímica",
            "tipo_setor": "laboratorial"
        }));
        assert!(result.unwrap_err().to_string().contains("unidade_id"));
    }

    #[test]
    fn tipo_setor_round_trips_through_text() {
        for tipo in TipoSetor::ALL {
            assert_eq!(tipo.as_str().parse::<TipoSetor>().unwrap(), *tipo);
        }
    }
}

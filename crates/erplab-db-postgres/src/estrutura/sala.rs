use chrono::{DateTime, Utc};
use erplab_api::{FieldErrors, Page, Validate};
use serde::{Deserialize, Serialize};
use sqlx_core::query::query;
use sqlx_core::query_builder::QueryBuilder;
use sqlx_core::row::Row;
use sqlx_postgres::{PgPool, PgRow, Postgres};
use uuid::Uuid;

use super::{Estatisticas, estatisticas};
use crate::error::{StorageError, StorageResult};
use crate::row::{contains_pattern, enum_col};

text_enum! {
    pub enum TipoSala {
        Coleta => "coleta",
        Analise => "analise",
        Exame => "exame",
        Administrativa => "administrativa",
        Espera => "espera",
        Outros => "outros",
    }
}

const COLUMNS: &str = "id, codigo_sala, nome, descricao, tipo_sala, andar, bloco, \
    area::float8 AS area, capacidade_pessoas, setor_id, possui_climatizacao, possui_lavatorio, \
    acessibilidade, observacoes, ativo, unidade_id, empresa_id, criado_por, atualizado_por, \
    criado_em, atualizado_em";

#[derive(Debug, Clone, Serialize)]
pub struct Sala {
    pub id: Uuid,
    pub codigo_sala: String,
    pub nome: String,
    pub descricao: Option<String>,
    pub tipo_sala: TipoSala,
    pub andar: Option<String>,
    pub bloco: Option<String>,
    pub area: Option<f64>,
    pub capacidade_pessoas: Option<i32>,
    pub setor_id: Option<Uuid>,
    pub possui_climatizacao: bool,
    pub possui_lavatorio: bool,
    pub acessibilidade: bool,
    pub observacoes: Option<String>,
    pub ativo: bool,
    pub unidade_id: Uuid,
    pub empresa_id: Option<Uuid>,
    pub criado_por: Option<Uuid>,
    pub atualizado_por: Option<Uuid>,
    pub criado_em: DateTime<Utc>,
    pub atualizado_em: DateTime<Utc>,
}

impl Sala {
    fn from_row(row: &PgRow) -> StorageResult<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            codigo_sala: row.try_get("codigo_sala")?,
            nome: row.try_get("nome")?,
            descricao: row.try_get("descricao")?,
            tipo_sala: enum_col(row, "tipo_sala")?,
            andar: row.try_get("andar")?,
            bloco: row.try_get("bloco")?,
            area: row.try_get("area")?,
            capacidade_pessoas: row.try_get("capacidade_pessoas")?,
            setor_id: row.try_get("setor_id")?,
            possui_climatizacao: row.try_get("possui_climatizacao")?,
            possui_lavatorio: row.try_get("possui_lavatorio")?,
            acessibilidade: row.try_get("acessibilidade")?,
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
pub struct CreateSala {
    pub codigo_sala: String,
    pub nome: String,
    pub descricao: Option<String>,
    pub tipo_sala: TipoSala,
    pub andar: Option<String>,
    pub bloco: Option<String>,
    pub area: Option<f64>,
    pub capacidade_pessoas: Option<i32>,
    pub setor_id: Option<Uuid>,
    pub possui_climatizacao: Option<bool>,
    pub possui_lavatorio: Option<bool>,
    pub acessibilidade: Option<bool>,
    pub observacoes: Option<String>,
    pub ativo: Option<bool>,
    pub unidade_id: Uuid,
    pub empresa_id: Option<Uuid>,
}

impl Validate for CreateSala {
    fn validate(&self, errors: &mut FieldErrors) {
        errors.required("codigo_sala", &self.codigo_sala);
        errors.max_len("codigo_sala", Some(&self.codigo_sala), 50);
        errors.required("nome", &self.nome);
        errors.max_len("nome", Some(&self.nome), 255);
        validate_dimensoes(errors, self.andar.as_deref(), self.bloco.as_deref(), self.area, self.capacidade_pessoas);
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateSala {
    pub codigo_sala: Option<String>,
    pub nome: Option<String>,
    pub descricao: Option<String>,
    pub tipo_sala: Option<TipoSala>,
    pub andar: Option<String>,
    pub bloco: Option<String>,
    pub area: Option<f64>,
    pub capacidade_pessoas: Option<i32>,
    pub setor_id: Option<Uuid>,
    pub possui_climatizacao: Option<bool>,
    pub possui_lavatorio: Option<bool>,
    pub acessibilidade: Option<bool>,
    pub observacoes: Option<String>,
    pub ativo: Option<bool>,
    pub unidade_id: Option<Uuid>,
    pub empresa_id: Option<Uuid>,
}

impl Validate for UpdateSala {
    fn validate(&self, errors: &mut FieldErrors) {
        errors.not_blank("codigo_sala", self.codigo_sala.as_deref());
        errors.max_len("codigo_sala", self.codigo_sala.as_deref(), 50);
        errors.not_blank("nome", self.nome.as_deref());
        errors.max_len("nome", self.nome.as_deref(), 255);
        validate_dimensoes(errors, self.andar.as_deref(), self.bloco.as_deref(), self.area, self.capacidade_pessoas);
    }
}

fn validate_dimensoes(
    errors: &mut FieldErrors,
    andar: Option<&str>,
    bloco: Option<&str>,
    area: Option<f64>,
    capacidade: Option<i32>,
) {
    errors.max_len("andar", andar, 20);
    errors.max_len("bloco", bloco, 50);
    errors.numeric("area", area, 10, 2);
    errors.range("capacidade_pessoas", capacidade.map(i64::from), 0, i64::from(i32::MAX));
}

#[derive(Debug, Clone, Default)]
pub struct SalaFiltros {
    pub search: Option<String>,
    pub unidade_id: Option<Uuid>,
    pub setor_id: Option<Uuid>,
}

fn codigo_conflict(codigo: &str) -> String {
    format!("Já existe uma sala com o código {codigo}")
}

pub struct SalaStorage<'a> {
    pool: &'a PgPool,
}

impl<'a> SalaStorage<'a> {
    #[must_use]
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `Conflict` when `codigo_sala` is taken.
    pub async fn create(&self, input: &CreateSala, usuario_id: Option<Uuid>) -> StorageResult<Sala> {
        let codigo = input.codigo_sala.trim();
        if self.find_by_codigo(codigo).await?.is_some() {
            return Err(StorageError::conflict(codigo_conflict(codigo)));
        }
        let sql = format!(
            "INSERT INTO salas (codigo_sala, nome, descricao, tipo_sala, andar, bloco, area, \
                capacidade_pessoas, setor_id, possui_climatizacao, possui_lavatorio, acessibilidade, \
                observacoes, ativo, unidade_id, empresa_id, criado_por, atualizado_por) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $17) \
             RETURNING {COLUMNS}"
        );
        let row = query(&sql)
            .bind(codigo)
            .bind(input.nome.trim())
            .bind(&input.descricao)
            .bind(input.tipo_sala.as_str())
            .bind(&input.andar)
            .bind(&input.bloco)
            .bind(input.area)
            .bind(input.capacidade_pessoas)
            .bind(input.setor_id)
            .bind(input.possui_climatizacao.unwrap_or(false))
            .bind(input.possui_lavatorio.unwrap_or(false))
            .bind(input.acessibilidade.unwrap_or(false))
            .bind(&input.observacoes)
            .bind(input.ativo.unwrap_or(true))
            .bind(input.unidade_id)
            .bind(input.empresa_id)
            .bind(usuario_id)
            .fetch_one(self.pool)
            .await
            .map_err(|e| StorageError::from_constraint(e, || codigo_conflict(codigo)))?;
        Sala::from_row(&row)
    }

    /// Paginated listing ordered by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_all(&self, filtros: &SalaFiltros, page: Page) -> StorageResult<(Vec<Sala>, i64)> {
        let mut count_qb: QueryBuilder<'_, Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM salas WHERE 1 = 1");
        push_filtros(&mut count_qb, filtros);
        let total: i64 = count_qb.build_query_scalar().fetch_one(self.pool).await?;

        let mut qb: QueryBuilder<'_, Postgres> =
            QueryBuilder::new(format!("SELECT {COLUMNS} FROM salas WHERE 1 = 1"));
        push_filtros(&mut qb, filtros);
        qb.push(" ORDER BY nome, id LIMIT ")
            .push_bind(page.limit_i64())
            .push(" OFFSET ")
            .push_bind(page.offset());
        let rows = qb.build().fetch_all(self.pool).await?;
        let salas = rows
            .iter()
            .map(Sala::from_row)
            .collect::<StorageResult<Vec<_>>>()?;
        Ok((salas, total))
    }

    async fn list_by(&self, column: &'static str, id: Option<Uuid>) -> StorageResult<Vec<Sala>> {
        let sql = match id {
            Some(_) => format!("SELECT {COLUMNS} FROM salas WHERE {column} = $1 ORDER BY nome, id"),
            None => format!("SELECT {COLUMNS} FROM salas WHERE {column} ORDER BY nome, id"),
        };
        let mut q = query(&sql);
        if let Some(id) = id {
            q = q.bind(id);
        }
        let rows = q.fetch_all(self.pool).await?;
        rows.iter().map(Sala::from_row).collect()
    }

    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_ativas(&self) -> StorageResult<Vec<Sala>> {
        self.list_by("ativo", None).await
    }

    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_unidade(&self, unidade_id: Uuid) -> StorageResult<Vec<Sala>> {
        self.list_by("unidade_id", Some(unidade_id)).await
    }

    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_setor(&self, setor_id: Uuid) -> StorageResult<Vec<Sala>> {
        self.list_by("setor_id", Some(setor_id)).await
    }

    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn estatisticas(&self) -> StorageResult<Estatisticas> {
        estatisticas(self.pool, "salas", "tipo_sala").await
    }

    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_id(&self, id: Uuid) -> StorageResult<Option<Sala>> {
        let sql = format!("SELECT {COLUMNS} FROM salas WHERE id = $1");
        let row = query(&sql).bind(id).fetch_optional(self.pool).await?;
        row.as_ref().map(Sala::from_row).transpose()
    }

    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_codigo(&self, codigo: &str) -> StorageResult<Option<Sala>> {
        let sql = format!("SELECT {COLUMNS} FROM salas WHERE codigo_sala = $1");
        let row = query(&sql).bind(codigo).fetch_optional(self.pool).await?;
        row.as_ref().map(Sala::from_row).transpose()
    }

    /// # Errors
    ///
    /// Returns `Conflict` when the new code belongs to another room.
    pub async fn update(
        &self,
        id: Uuid,
        input: &UpdateSala,
        usuario_id: Option<Uuid>,
    ) -> StorageResult<Option<Sala>> {
        let codigo = input.codigo_sala.as_deref().map(str::trim);
        if let Some(codigo) = codigo
            && let Some(existente) = self.find_by_codigo(codigo).await?
            && existente.id != id
        {
            return Err(StorageError::conflict(codigo_conflict(codigo)));
        }
        let sql = format!(
            "UPDATE salas SET \
                codigo_sala = COALESCE($2, codigo_sala), \
                nome = COALESCE($3, nome), \
                descricao = COALESCE($4, descricao), \
                tipo_sala = COALESCE($5, tipo_sala), \
                andar = COALESCE($6, andar), \
                bloco = COALESCE($7, bloco), \
                area = COALESCE($8, area), \
                capacidade_pessoas = COALESCE($9, capacidade_pessoas), \
                setor_id = COALESCE($10, setor_id), \
                possui_climatizacao = COALESCE($11, possui_climatizacao), \
                possui_lavatorio = COALESCE($12, possui_lavatorio), \
                acessibilidade = COALESCE($13, acessibilidade), \
                observacoes = COALESCE($14, observacoes), \
                ativo = COALESCE($15, ativo), \
                unidade_id = COALESCE($16, unidade_id), \
                empresa_id = COALESCE($17, empresa_id), \
                atualizado_por = COALESCE($18, atualizado_por), \
                atualizado_em = now() \
             WHERE id = $1 RETURNING {COLUMNS}"
        );
        let row = query(&sql)
            .bind(id)
            .bind(codigo)
            .bind(input.nome.as_deref().map(str::trim))
            .bind(&input.descricao)
            .bind(input.tipo_sala.map(|t| t.as_str()))
            .bind(&input.andar)
            .bind(&input.bloco)
            .bind(input.area)
            .bind(input.capacidade_pessoas)
            .bind(input.setor_id)
            .bind(input.possui_climatizacao)
            .bind(input.possui_lavatorio)
            .bind(input.acessibilidade)
            .bind(&input.observacoes)
            .bind(input.ativo)
            .bind(input.unidade_id)
            .bind(input.empresa_id)
            .bind(usuario_id)
            .fetch_optional(self.pool)
            .await
            .map_err(|e| StorageError::from_constraint(e, || codigo_conflict(codigo.unwrap_or(""))))?;
        row.as_ref().map(Sala::from_row).transpose()
    }

    /// # Errors
    ///
    /// Returns an error if the database update fails.
    pub async fn toggle_ativo(&self, id: Uuid, usuario_id: Option<Uuid>) -> StorageResult<Option<Sala>> {
        let sql = format!(
            "UPDATE salas SET ativo = NOT ativo, atualizado_por = COALESCE($2, atualizado_por), \
                atualizado_em = now() \
             WHERE id = $1 RETURNING {COLUMNS}"
        );
        let row = query(&sql)
            .bind(id)
            .bind(usuario_id)
            .fetch_optional(self.pool)
            .await?;
        row.as_ref().map(Sala::from_row).transpose()
    }

    /// # Errors
    ///
    /// Returns an error if the database delete fails.
    pub async fn delete(&self, id: Uuid) -> StorageResult<bool> {
        let result = query("DELETE FROM salas WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

fn push_filtros(qb: &mut QueryBuilder<'_, Postgres>, filtros: &SalaFiltros) {
    if let Some(search) = filtros.search.as_deref().filter(|s| !s.trim().is_empty()) {
        let pattern = contains_pattern(search);
        qb.push(" AND (nome ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR codigo_sala ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(unidade_id) = filtros.unidade_id {
        qb.push(" AND unidade_id = ").push_bind(unidade_id);
    }
    if let Some(setor_id) = filtros.setor_id {
        qb.push(" AND setor_id = ").push_bind(setor_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_dimensions_are_rejected() {
        let input: UpdateSala = serde_json::from_value(serde_json::json!({
            "area": -3.5,
            "capacidade_pessoas": -1
        }))
        .unwrap();
        let mut errors = FieldErrors::new();
        input.validate(&mut errors);
        assert_eq!(
            errors.as_slice(),
            [
                "area: não pode ser negativo",
                "capacidade_pessoas: deve estar entre 0 e 2147483647",
            ]
        );
    }

    #[test]
    fn create_defaults_optional_flags() {
        let input: CreateSala = serde_json::from_value(serde_json::json!({
            "codigo_sala": "COL-01",
            "nome": "Coleta 1",
            "tipo_sala": "coleta",
            "unidade_id": "6a1f0b1e-2c3d-4e5f-8a9b-0c1d2e3f4a5b"
        }))
        .unwrap();
        assert!(erplab_api::validate(&input).is_ok());
        assert!(input.possui_climatizacao.is_none());
    }
}

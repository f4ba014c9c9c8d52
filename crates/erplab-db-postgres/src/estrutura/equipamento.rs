use chrono::{DateTime, NaiveDate, Utc};
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
    pub enum SituacaoEquipamento {
        Ativo => "ativo",
        Manutencao => "manutencao",
        Inativo => "inativo",
        Descartado => "descartado",
    }
}

const COLUMNS: &str = "id, codigo_interno, nome, marca, modelo, numero_serie, sala_id, setor_id, \
    data_aquisicao, valor_aquisicao::float8 AS valor_aquisicao, data_ultima_manutencao, \
    data_proxima_manutencao, situacao, observacoes, ativo, unidade_id, empresa_id, criado_por, \
    atualizado_por, criado_em, atualizado_em";

#[derive(Debug, Clone, Serialize)]
pub struct Equipamento {
    pub id: Uuid,
    pub codigo_interno: String,
    pub nome: String,
    pub marca: Option<String>,
    pub modelo: Option<String>,
    pub numero_serie: Option<String>,
    pub sala_id: Option<Uuid>,
    pub setor_id: Option<Uuid>,
    pub data_aquisicao: Option<NaiveDate>,
    pub valor_aquisicao: Option<f64>,
    pub data_ultima_manutencao: Option<NaiveDate>,
    pub data_proxima_manutencao: Option<NaiveDate>,
    pub situacao: SituacaoEquipamento,
    pub observacoes: Option<String>,
    pub ativo: bool,
    pub unidade_id: Uuid,
    pub empresa_id: Option<Uuid>,
    pub criado_por: Option<Uuid>,
    pub atualizado_por: Option<Uuid>,
    pub criado_em: DateTime<Utc>,
    pub atualizado_em: DateTime<Utc>,
}

impl Equipamento {
    fn from_row(row: &PgRow) -> StorageResult<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            codigo_interno: row.try_get("codigo_interno")?,
            nome: row.try_get("nome")?,
            marca: row.try_get("marca")?,
            modelo: row.try_get("modelo")?,
            numero_serie: row.try_get("numero_serie")?,
            sala_id: row.try_get("sala_id")?,
            setor_id: row.try_get("setor_id")?,
            data_aquisicao: row.try_get("data_aquisicao")?,
            valor_aquisicao: row.try_get("valor_aquisicao")?,
            data_ultima_manutencao: row.try_get("data_ultima_manutencao")?,
            data_proxima_manutencao: row.try_get("data_proxima_manutencao")?,
            situacao: enum_col(row, "situacao")?,
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
pub struct CreateEquipamento {
    pub codigo_interno: String,
    pub nome: String,
    pub marca: Option<String>,
    pub modelo: Option<String>,
    pub numero_serie: Option<String>,
    pub sala_id: Option<Uuid>,
    pub setor_id: Option<Uuid>,
    pub data_aquisicao: Option<NaiveDate>,
    pub valor_aquisicao: Option<f64>,
    pub data_ultima_manutencao: Option<NaiveDate>,
    pub data_proxima_manutencao: Option<NaiveDate>,
    pub situacao: Option<SituacaoEquipamento>,
    pub observacoes: Option<String>,
    pub ativo: Option<bool>,
    pub unidade_id: Uuid,
    pub empresa_id: Option<Uuid>,
}

impl Validate for CreateEquipamento {
    fn validate(&self, errors: &mut FieldErrors) {
        errors.required("codigo_interno", &self.codigo_interno);
        errors.max_len("codigo_interno", Some(&self.codigo_interno), 50);
        errors.required("nome", &self.nome);
        errors.max_len("nome", Some(&self.nome), 255);
        validate_detalhes(
            errors,
            [self.marca.as_deref(), self.modelo.as_deref(), self.numero_serie.as_deref()],
            self.valor_aquisicao,
            self.data_ultima_manutencao,
            self.data_proxima_manutencao,
        );
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateEquipamento {
    pub codigo_interno: Option<String>,
    pub nome: Option<String>,
    pub marca: Option<String>,
    pub modelo: Option<String>,
    pub numero_serie: Option<String>,
    pub sala_id: Option<Uuid>,
    pub setor_id: Option<Uuid>,
    pub data_aquisicao: Option<NaiveDate>,
    pub valor_aquisicao: Option<f64>,
    pub data_ultima_manutencao: Option<NaiveDate>,
    pub data_proxima_manutencao: Option<NaiveDate>,
    pub situacao: Option<SituacaoEquipamento>,
    pub observacoes: Option<String>,
    pub ativo: Option<bool>,
    pub unidade_id: Option<Uuid>,
    pub empresa_id: Option<Uuid>,
}

impl Validate for UpdateEquipamento {
    fn validate(&self, errors: &mut FieldErrors) {
        errors.not_blank("codigo_interno", self.codigo_interno.as_deref());
        errors.max_len("codigo_interno", self.codigo_interno.as_deref(), 50);
        errors.not_blank("nome", self.nome.as_deref());
        errors.max_len("nome", self.nome.as_deref(), 255);
        validate_detalhes(
            errors,
            [self.marca.as_deref(), self.modelo.as_deref(), self.numero_serie.as_deref()],
            self.valor_aquisicao,
            self.data_ultima_manutencao,
            self.data_proxima_manutencao,
        );
    }
}

fn validate_detalhes(
    errors: &mut FieldErrors,
    [marca, modelo, numero_serie]: [Option<&str>; 3],
    valor_aquisicao: Option<f64>,
    ultima: Option<NaiveDate>,
    proxima: Option<NaiveDate>,
) {
    errors.max_len("marca", marca, 100);
    errors.max_len("modelo", modelo, 100);
    errors.max_len("numero_serie", numero_serie, 100);
    errors.numeric("valor_aquisicao", valor_aquisicao, 15, 2);
    if let (Some(ultima), Some(proxima)) = (ultima, proxima)
        && proxima < ultima
    {
        errors.push(
            "data_proxima_manutencao",
            "não pode ser anterior à última manutenção",
        );
    }
}

#[derive(Debug, Clone, Default)]
pub struct EquipamentoFiltros {
    pub search: Option<String>,
    pub unidade_id: Option<Uuid>,
    pub sala_id: Option<Uuid>,
    pub situacao: Option<SituacaoEquipamento>,
}

fn codigo_conflict(codigo: &str) -> String {
    format!("Já existe um equipamento com o código {codigo}")
}

pub struct EquipamentoStorage<'a> {
    pool: &'a PgPool,
}

impl<'a> EquipamentoStorage<'a> {
    #[must_use]
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `Conflict` when `codigo_interno` is taken.
    pub async fn create(
        &self,
        input: &CreateEquipamento,
        usuario_id: Option<Uuid>,
    ) -> StorageResult<Equipamento> {
        let codigo = input.codigo_interno.trim();
        if self.find_by_codigo(codigo).await?.is_some() {
            return Err(StorageError::conflict(codigo_conflict(codigo)));
        }
        let sql = format!(
            "INSERT INTO equipamentos (codigo_interno, nome, marca, modelo, numero_serie, sala_id, \
                setor_id, data_aquisicao, valor_aquisicao, data_ultima_manutencao, \
                data_proxima_manutencao, situacao, observacoes, ativo, unidade_id, empresa_id, \
                criado_por, atualizado_por) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $17) \
             RETURNING {COLUMNS}"
        );
        let row = query(&sql)
            .bind(codigo)
            .bind(input.nome.trim())
            .bind(&input.marca)
            .bind(&input.modelo)
            .bind(&input.numero_serie)
            .bind(input.sala_id)
            .bind(input.setor_id)
            .bind(input.data_aquisicao)
            .bind(input.valor_aquisicao)
            .bind(input.data_ultima_manutencao)
            .bind(input.data_proxima_manutencao)
            .bind(input.situacao.unwrap_or(SituacaoEquipamento::Ativo).as_str())
            .bind(&input.observacoes)
            .bind(input.ativo.unwrap_or(true))
            .bind(input.unidade_id)
            .bind(input.empresa_id)
            .bind(usuario_id)
            .fetch_one(self.pool)
            .await
            .map_err(|e| StorageError::from_constraint(e, || codigo_conflict(codigo)))?;
        Equipamento::from_row(&row)
    }

    /// Paginated listing ordered by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_all(
        &self,
        filtros: &EquipamentoFiltros,
        page: Page,
    ) -> StorageResult<(Vec<Equipamento>, i64)> {
        let mut count_qb: QueryBuilder<'_, Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM equipamentos WHERE 1 = 1");
        push_filtros(&mut count_qb, filtros);
        let total: i64 = count_qb.build_query_scalar().fetch_one(self.pool).await?;

        let mut qb: QueryBuilder<'_, Postgres> =
            QueryBuilder::new(format!("SELECT {COLUMNS} FROM equipamentos WHERE 1 = 1"));
        push_filtros(&mut qb, filtros);
        qb.push(" ORDER BY nome, id LIMIT ")
            .push_bind(page.limit_i64())
            .push(" OFFSET ")
            .push_bind(page.offset());
        let rows = qb.build().fetch_all(self.pool).await?;
        let equipamentos = rows
            .iter()
            .map(Equipamento::from_row)
            .collect::<StorageResult<Vec<_>>>()?;
        Ok((equipamentos, total))
    }

    async fn list_by(&self, column: &'static str, id: Option<Uuid>) -> StorageResult<Vec<Equipamento>> {
        let sql = match id {
            Some(_) => format!("SELECT {COLUMNS} FROM equipamentos WHERE {column} = $1 ORDER BY nome, id"),
            None => format!("SELECT {COLUMNS} FROM equipamentos WHERE {column} ORDER BY nome, id"),
        };
        let mut q = query(&sql);
        if let Some(id) = id {
            q = q.bind(id);
        }
        let rows = q.fetch_all(self.pool).await?;
        rows.iter().map(Equipamento::from_row).collect()
    }

    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_ativos(&self) -> StorageResult<Vec<Equipamento>> {
        self.list_by("ativo", None).await
    }

    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_unidade(&self, unidade_id: Uuid) -> StorageResult<Vec<Equipamento>> {
        self.list_by("unidade_id", Some(unidade_id)).await
    }

    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_sala(&self, sala_id: Uuid) -> StorageResult<Vec<Equipamento>> {
        self.list_by("sala_id", Some(sala_id)).await
    }

    /// Totals grouped by `situacao`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn estatisticas(&self) -> StorageResult<Estatisticas> {
        estatisticas(self.pool, "equipamentos", "situacao").await
    }

    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_id(&self, id: Uuid) -> StorageResult<Option<Equipamento>> {
        let sql = format!("SELECT {COLUMNS} FROM equipamentos WHERE id = $1");
        let row = query(&sql).bind(id).fetch_optional(self.pool).await?;
        row.as_ref().map(Equipamento::from_row).transpose()
    }

    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_codigo(&self, codigo: &str) -> StorageResult<Option<Equipamento>> {
        let sql = format!("SELECT {COLUMNS} FROM equipamentos WHERE codigo_interno = $1");
        let row = query(&sql).bind(codigo).fetch_optional(self.pool).await?;
        row.as_ref().map(Equipamento::from_row).transpose()
    }

    /// # Errors
    ///
    /// Returns `Conflict` when the new code belongs to another equipment.
    pub async fn update(
        &self,
        id: Uuid,
        input: &UpdateEquipamento,
        usuario_id: Option<Uuid>,
    ) -> StorageResult<Option<Equipamento>> {
        let codigo = input.codigo_interno.as_deref().map(str::trim);
        if let Some(codigo) = codigo
            && let Some(existente) = self.find_by_codigo(codigo).await?
            && existente.id != id
        {
            return Err(StorageError::conflict(codigo_conflict(codigo)));
        }
        let sql = format!(
            "UPDATE equipamentos SET \
                codigo_interno = COALESCE($2, codigo_interno), \
                nome = COALESCE($3, nome), \
                marca = COALESCE($4, marca), \
                modelo = COALESCE($5, modelo), \
                numero_serie = COALESCE($6, numero_serie), \
                sala_id = COALESCE($7, sala_id), \
                setor_id = COALESCE($8, setor_id), \
                data_aquisicao = COALESCE($9, data_aquisicao), \
                valor_aquisicao = COALESCE($10, valor_aquisicao), \
                data_ultima_manutencao = COALESCE($11, data_ultima_manutencao), \
                data_proxima_manutencao = COALESCE($12, data_proxima_manutencao), \
                situacao = COALESCE($13, situacao), \
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
            .bind(&input.marca)
            .bind(&input.modelo)
            .bind(&input.numero_serie)
            .bind(input.sala_id)
            .bind(input.setor_id)
            .bind(input.data_aquisicao)
            .bind(input.valor_aquisicao)
            .bind(input.data_ultima_manutencao)
            .bind(input.data_proxima_manutencao)
            .bind(input.situacao.map(|s| s.as_str()))
            .bind(&input.observacoes)
            .bind(input.ativo)
            .bind(input.unidade_id)
            .bind(input.empresa_id)
            .bind(usuario_id)
            .fetch_optional(self.pool)
            .await
            .map_err(|e| StorageError::from_constraint(e, || codigo_conflict(codigo.unwrap_or(""))))?;
        row.as_ref().map(Equipamento::from_row).transpose()
    }

    /// # Errors
    ///
    /// Returns an error if the database update fails.
    pub async fn toggle_ativo(
        &self,
        id: Uuid,
        usuario_id: Option<Uuid>,
    ) -> StorageResult<Option<Equipamento>> {
        let sql = format!(
            "UPDATE equipamentos SET ativo = NOT ativo, atualizado_por = COALESCE($2, atualizado_por), \
                atualizado_em = now() \
             WHERE id = $1 RETURNING {COLUMNS}"
        );
        let row = query(&sql)
            .bind(id)
            .bind(usuario_id)
            .fetch_optional(self.pool)
            .await?;
        row.as_ref().map(Equipamento::from_row).transpose()
    }

    /// # Errors
    ///
    /// Returns an error if the database delete fails.
    pub async fn delete(&self, id: Uuid) -> StorageResult<bool> {
        let result = query("DELETE FROM equipamentos WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

fn push_filtros(qb: &mut QueryBuilder<'_, Postgres>, filtros: &EquipamentoFiltros) {
    if let Some(search) = filtros.search.as_deref().filter(|s| !s.trim().is_empty()) {
        let pattern = contains_pattern(search);
        qb.push(" AND (nome ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR codigo_interno ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR numero_serie ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(unidade_id) = filtros.unidade_id {
        qb.push(" AND unidade_id = ").push_bind(unidade_id);
    }
    if let Some(sala_id) = filtros.sala_id {
        qb.push(" AND sala_id = ").push_bind(sala_id);
    }
    if let Some(situacao) = filtros.situacao {
        qb.push(" AND situacao = ").push_bind(situacao.as_str());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proxima_manutencao_cannot_precede_ultima() {
        let input: UpdateEquipamento = serde_json::from_value(serde_json::json!({
            "data_ultima_manutencao": "2025-06-01",
            "data_proxima_manutencao": "2025-05-01"
        }))
        .unwrap();
        let mut errors = FieldErrors::new();
        input.validate(&mut errors);
        assert_eq!(
            errors.as_slice(),
            ["data_proxima_manutencao: não pode ser anterior à última manutenção"]
        );
    }

    #[test]
    fn situacao_rejects_unknown_values() {
        assert!("quebrado".parse::<SituacaoEquipamento>().is_err());
        assert_eq!(
            "manutencao".parse::<SituacaoEquipamento>().unwrap(),
            SituacaoEquipamento::Manutencao
        );
    }
}

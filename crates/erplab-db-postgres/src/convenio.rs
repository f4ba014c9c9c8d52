//! Health insurers (convênios) and their plans.

use chrono::{DateTime, NaiveDate, Utc};
use erplab_api::{FieldErrors, Validate};
use serde::{Deserialize, Serialize};
use sqlx_core::query::query;
use sqlx_core::query_builder::QueryBuilder;
use sqlx_core::row::Row;
use sqlx_postgres::{PgPool, PgRow, Postgres};
use uuid::Uuid;

use crate::error::{StorageError, StorageResult};
use crate::row::{contains_pattern, enum_col};

text_enum! {
    pub enum TipoFaturamento {
        Tiss => "tiss",
        Proprio => "proprio",
        Manual => "manual",
    }
}

text_enum! {
    pub enum StatusConvenio {
        Ativo => "ativo",
        Inativo => "inativo",
        Suspenso => "suspenso",
        Bloqueado => "bloqueado",
    }
}

text_enum! {
    pub enum TipoPlano {
        Ambulatorial => "ambulatorial",
        Hospitalar => "hospitalar",
        Completo => "completo",
        Odontologico => "odontologico",
    }
}

text_enum! {
    pub enum StatusPlano {
        Ativo => "ativo",
        Inativo => "inativo",
        Suspenso => "suspenso",
    }
}

const COLUMNS: &str = "id, codigo, nome, razao_social, cnpj, registro_ans, requer_autorizacao, \
    requer_senha, validade_guia_dias, tipo_faturamento, dia_fechamento, prazo_pagamento_dias, \
    percentual_desconto::float8 AS percentual_desconto, telefone, email, observacoes, status, \
    criado_em, atualizado_em";

const PLANO_COLUMNS: &str = "id, convenio_id, codigo_plano, nome_plano, tipo_plano, \
    vigencia_inicio, vigencia_fim, carencia_dias, valor_consulta::float8 AS valor_consulta, \
    percentual_coparticipacao::float8 AS percentual_coparticipacao, observacoes, status, \
    criado_em, atualizado_em";

#[derive(Debug, Clone, Serialize)]
pub struct Convenio {
    pub id: Uuid,
    pub codigo: Option<String>,
    pub nome: String,
    pub razao_social: Option<String>,
    pub cnpj: Option<String>,
    pub registro_ans: Option<String>,
    pub requer_autorizacao: bool,
    pub requer_senha: bool,
    pub validade_guia_dias: Option<i32>,
    pub tipo_faturamento: TipoFaturamento,
    pub dia_fechamento: Option<i32>,
    pub prazo_pagamento_dias: Option<i32>,
    pub percentual_desconto: Option<f64>,
    pub telefone: Option<String>,
    pub email: Option<String>,
    pub observacoes: Option<String>,
    pub status: StatusConvenio,
    pub criado_em: DateTime<Utc>,
    pub atualizado_em: DateTime<Utc>,
}

impl Convenio {
    fn from_row(row: &PgRow) -> StorageResult<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            codigo: row.try_get("codigo")?,
            nome: row.try_get("nome")?,
            razao_social: row.try_get("razao_social")?,
            cnpj: row.try_get("cnpj")?,
            registro_ans: row.try_get("registro_ans")?,
            requer_autorizacao: row.try_get("requer_autorizacao")?,
            requer_senha: row.try_get("requer_senha")?,
            validade_guia_dias: row.try_get("validade_guia_dias")?,
            tipo_faturamento: enum_col(row, "tipo_faturamento")?,
            dia_fechamento: row.try_get("dia_fechamento")?,
            prazo_pagamento_dias: row.try_get("prazo_pagamento_dias")?,
            percentual_desconto: row.try_get("percentual_desconto")?,
            telefone: row.try_get("telefone")?,
            email: row.try_get("email")?,
            observacoes: row.try_get("observacoes")?,
            status: enum_col(row, "status")?,
            criado_em: row.try_get("criado_em")?,
            atualizado_em: row.try_get("atualizado_em")?,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateConvenio {
    pub codigo: Option<String>,
    pub nome: String,
    pub razao_social: Option<String>,
    pub cnpj: Option<String>,
    pub registro_ans: Option<String>,
    pub requer_autorizacao: Option<bool>,
    pub requer_senha: Option<bool>,
    pub validade_guia_dias: Option<i32>,
    pub tipo_faturamento: Option<TipoFaturamento>,
    pub dia_fechamento: Option<i32>,
    pub prazo_pagamento_dias: Option<i32>,
    pub percentual_desconto: Option<f64>,
    pub telefone: Option<String>,
    pub email: Option<String>,
    pub observacoes: Option<String>,
    pub status: Option<StatusConvenio>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateConvenio {
    pub codigo: Option<String>,
    pub nome: Option<String>,
    pub razao_social: Option<String>,
    pub cnpj: Option<String>,
    pub registro_ans: Option<String>,
    pub requer_autorizacao: Option<bool>,
    pub requer_senha: Option<bool>,
    pub validade_guia_dias: Option<i32>,
    pub tipo_faturamento: Option<TipoFaturamento>,
    pub dia_fechamento: Option<i32>,
    pub prazo_pagamento_dias: Option<i32>,
    pub percentual_desconto: Option<f64>,
    pub telefone: Option<String>,
    pub email: Option<String>,
    pub observacoes: Option<String>,
    pub status: Option<StatusConvenio>,
}

fn validate_convenio_fields(
    errors: &mut FieldErrors,
    codigo: Option<&str>,
    nome: Option<&str>,
    cnpj: Option<&str>,
    email: Option<&str>,
    dia_fechamento: Option<i32>,
    percentual_desconto: Option<f64>,
) {
    errors.max_len("codigo", codigo, 20);
    errors.max_len("nome", nome, 255);
    errors.digits("cnpj", cnpj, 14);
    errors.email("email", email);
    errors.range("dia_fechamento", dia_fechamento.map(i64::from), 1, 31);
    errors.numeric("percentual_desconto", percentual_desconto, 5, 2);
    if percentual_desconto.is_some_and(|p| p > 100.0) {
        errors.push("percentual_desconto", "não pode ser maior que 100");
    }
}

impl Validate for CreateConvenio {
    fn validate(&self, errors: &mut FieldErrors) {
        errors.required("nome", &self.nome);
        validate_convenio_fields(
            errors,
            self.codigo.as_deref(),
            Some(&self.nome),
            self.cnpj.as_deref(),
            self.email.as_deref(),
            self.dia_fechamento,
            self.percentual_desconto,
        );
    }
}

impl Validate for UpdateConvenio {
    fn validate(&self, errors: &mut FieldErrors) {
        errors.not_blank("nome", self.nome.as_deref());
        validate_convenio_fields(
            errors,
            self.codigo.as_deref(),
            self.nome.as_deref(),
            self.cnpj.as_deref(),
            self.email.as_deref(),
            self.dia_fechamento,
            self.percentual_desconto,
        );
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConvenioFiltros {
    pub search: Option<String>,
    pub status: Option<StatusConvenio>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Plano {
    pub id: Uuid,
    pub convenio_id: Uuid,
    pub codigo_plano: String,
    pub nome_plano: String,
    pub tipo_plano: TipoPlano,
    pub vigencia_inicio: NaiveDate,
    pub vigencia_fim: Option<NaiveDate>,
    pub carencia_dias: Option<i32>,
    pub valor_consulta: Option<f64>,
    pub percentual_coparticipacao: Option<f64>,
    pub observacoes: Option<String>,
    pub status: StatusPlano,
    pub criado_em: DateTime<Utc>,
    pub atualizado_em: DateTime<Utc>,
}

impl Plano {
    fn from_row(row: &PgRow) -> StorageResult<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            convenio_id: row.try_get("convenio_id")?,
            codigo_plano: row.try_get("codigo_plano")?,
            nome_plano: row.try_get("nome_plano")?,
            tipo_plano: enum_col(row, "tipo_plano")?,
            vigencia_inicio: row.try_get("vigencia_inicio")?,
            vigencia_fim: row.try_get("vigencia_fim")?,
            carencia_dias: row.try_get("carencia_dias")?,
            valor_consulta: row.try_get("valor_consulta")?,
            percentual_coparticipacao: row.try_get("percentual_coparticipacao")?,
            observacoes: row.try_get("observacoes")?,
            status: enum_col(row, "status")?,
            criado_em: row.try_get("criado_em")?,
            atualizado_em: row.try_get("atualizado_em")?,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreatePlano {
    pub codigo_plano: String,
    pub nome_plano: String,
    pub tipo_plano: Option<TipoPlano>,
    pub vigencia_inicio: NaiveDate,
    pub vigencia_fim: Option<NaiveDate>,
    pub carencia_dias: Option<i32>,
    pub valor_consulta: Option<f64>,
    pub percentual_coparticipacao: Option<f64>,
    pub observacoes: Option<String>,
    pub status: Option<StatusPlano>,
}

impl Validate for CreatePlano {
    fn validate(&self, errors: &mut FieldErrors) {
        errors.required("codigo_plano", &self.codigo_plano);
        errors.max_len("codigo_plano", Some(&self.codigo_plano), 50);
        errors.required("nome_plano", &self.nome_plano);
        errors.max_len("nome_plano", Some(&self.nome_plano), 255);
        errors.range("carencia_dias", self.carencia_dias.map(i64::from), 0, 3650);
        errors.numeric("valor_consulta", self.valor_consulta, 10, 2);
        errors.numeric("percentual_coparticipacao", self.percentual_coparticipacao, 5, 2);
        if let Some(fim) = self.vigencia_fim
            && fim < self.vigencia_inicio
        {
            errors.push("vigencia_fim", "não pode ser anterior a vigencia_inicio");
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdatePlano {
    pub codigo_plano: Option<String>,
    pub nome_plano: Option<String>,
    pub tipo_plano: Option<TipoPlano>,
    pub vigencia_inicio: Option<NaiveDate>,
    pub vigencia_fim: Option<NaiveDate>,
    pub carencia_dias: Option<i32>,
    pub valor_consulta: Option<f64>,
    pub percentual_coparticipacao: Option<f64>,
    pub observacoes: Option<String>,
    pub status: Option<StatusPlano>,
}

impl Validate for UpdatePlano {
    fn validate(&self, errors: &mut FieldErrors) {
        errors.not_blank("codigo_plano", self.codigo_plano.as_deref());
        errors.max_len("codigo_plano", self.codigo_plano.as_deref(), 50);
        errors.not_blank("nome_plano", self.nome_plano.as_deref());
        errors.max_len("nome_plano", self.nome_plano.as_deref(), 255);
        errors.numeric("valor_consulta", self.valor_consulta, 10, 2);
        errors.numeric("percentual_coparticipacao", self.percentual_coparticipacao, 5, 2);
    }
}

fn codigo_conflict(codigo: &str) -> String {
    format!("Já existe um convênio com o código {codigo}")
}

fn toggle_indisponivel(status: StatusConvenio) -> StorageError {
    StorageError::invalid_input(format!(
        "Convênio com status {status} não pode ser ativado ou inativado pelo toggle-status"
    ))
}

fn plano_conflict(codigo: &str) -> String {
    format!("Já existe um plano com o código {codigo} neste convênio")
}

pub struct ConvenioStorage<'a> {
    pool: &'a PgPool,
}

impl<'a> ConvenioStorage<'a> {
    #[must_use]
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `Conflict` when `codigo` is taken.
    pub async fn create(&self, input: &CreateConvenio) -> StorageResult<Convenio> {
        let codigo = input.codigo.as_deref().map(str::trim).filter(|c| !c.is_empty());
        let sql = format!(
            "INSERT INTO convenios (codigo, nome, razao_social, cnpj, registro_ans, \
                requer_autorizacao, requer_senha, validade_guia_dias, tipo_faturamento, \
                dia_fechamento, prazo_pagamento_dias, percentual_desconto, telefone, email, \
                observacoes, status) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16) \
             RETURNING {COLUMNS}"
        );
        let row = query(&sql)
            .bind(codigo)
            .bind(input.nome.trim())
            .bind(&input.razao_social)
            .bind(&input.cnpj)
            .bind(&input.registro_ans)
            .bind(input.requer_autorizacao.unwrap_or(false))
            .bind(input.requer_senha.unwrap_or(false))
            .bind(input.validade_guia_dias)
            .bind(input.tipo_faturamento.unwrap_or(TipoFaturamento::Tiss).as_str())
            .bind(input.dia_fechamento)
            .bind(input.prazo_pagamento_dias)
            .bind(input.percentual_desconto)
            .bind(&input.telefone)
            .bind(&input.email)
            .bind(&input.observacoes)
            .bind(input.status.unwrap_or(StatusConvenio::Ativo).as_str())
            .fetch_one(self.pool)
            .await
            .map_err(|e| StorageError::from_constraint(e, || codigo_conflict(codigo.unwrap_or(""))))?;
        Convenio::from_row(&row)
    }

    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_all(&self, filtros: &ConvenioFiltros) -> StorageResult<Vec<Convenio>> {
        let mut qb: QueryBuilder<'_, Postgres> =
            QueryBuilder::new(format!("SELECT {COLUMNS} FROM convenios WHERE 1 = 1"));
        if let Some(search) = filtros.search.as_deref().filter(|s| !s.trim().is_empty()) {
            let pattern = contains_pattern(search);
            qb.push(" AND (nome ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR codigo ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR razao_social ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
        if let Some(status) = filtros.status {
            qb.push(" AND status = ").push_bind(status.as_str());
        }
        qb.push(" ORDER BY nome");
        let rows = qb.build().fetch_all(self.pool).await?;
        rows.iter().map(Convenio::from_row).collect()
    }

    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_id(&self, id: Uuid) -> StorageResult<Option<Convenio>> {
        let sql = format!("SELECT {COLUMNS} FROM convenios WHERE id = $1");
        let row = query(&sql).bind(id).fetch_optional(self.pool).await?;
        row.as_ref().map(Convenio::from_row).transpose()
    }

    /// # Errors
    ///
    /// Returns `Conflict` when the new code is taken.
    pub async fn update(&self, id: Uuid, input: &UpdateConvenio) -> StorageResult<Option<Convenio>> {
        let codigo = input.codigo.as_deref().map(str::trim);
        let sql = format!(
            "UPDATE convenios SET \
                codigo = COALESCE($2, codigo), \
                nome = COALESCE($3, nome), \
                razao_social = COALESCE($4, razao_social), \
                cnpj = COALESCE($5, cnpj), \
                registro_ans = COALESCE($6, registro_ans), \
                requer_autorizacao = COALESCE($7, requer_autorizacao), \
                requer_senha = COALESCE($8, requer_senha), \
                validade_guia_dias = COALESCE($9, validade_guia_dias), \
                tipo_faturamento = COALESCE($10, tipo_faturamento), \
                dia_fechamento = COALESCE($11, dia_fechamento), \
                prazo_pagamento_dias = COALESCE($12, prazo_pagamento_dias), \
                percentual_desconto = COALESCE($13, percentual_desconto), \
                telefone = COALESCE($14, telefone), \
                email = COALESCE($15, email), \
                observacoes = COALESCE($16, observacoes), \
                status = COALESCE($17, status), \
                atualizado_em = now() \
             WHERE id = $1 RETURNING {COLUMNS}"
        );
        let row = query(&sql)
            .bind(id)
            .bind(codigo)
            .bind(input.nome.as_deref().map(str::trim))
            .bind(&input.razao_social)
            .bind(&input.cnpj)
            .bind(&input.registro_ans)
            .bind(input.requer_autorizacao)
            .bind(input.requer_senha)
            .bind(input.validade_guia_dias)
            .bind(input.tipo_faturamento.map(|v| v.as_str()))
            .bind(input.dia_fechamento)
            .bind(input.prazo_pagamento_dias)
            .bind(input.percentual_desconto)
            .bind(&input.telefone)
            .bind(&input.email)
            .bind(&input.observacoes)
            .bind(input.status.map(|v| v.as_str()))
            .fetch_optional(self.pool)
            .await
            .map_err(|e| StorageError::from_constraint(e, || codigo_conflict(codigo.unwrap_or(""))))?;
        row.as_ref().map(Convenio::from_row).transpose()
    }

    /// Flips between `ativo` and `inativo`. Suspended or blocked insurers are
    /// left untouched and the call fails with `InvalidInput`, so two toggles
    /// always restore the starting status.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for `suspenso`/`bloqueado`, or a database error.
    pub async fn toggle_status(&self, id: Uuid) -> StorageResult<Option<Convenio>> {
        let sql = format!(
            "UPDATE convenios SET \
                status = CASE WHEN status = 'ativo' THEN 'inativo' ELSE 'ativo' END, \
                atualizado_em = now() \
             WHERE id = $1 AND status IN ('ativo', 'inativo') RETURNING {COLUMNS}"
        );
        if let Some(row) = query(&sql).bind(id).fetch_optional(self.pool).await? {
            return Convenio::from_row(&row).map(Some);
        }
        match self.find_by_id(id).await? {
            Some(convenio) => Err(toggle_indisponivel(convenio.status)),
            None => Ok(None),
        }
    }

    /// Soft delete.
    ///
    /// # Errors
    ///
    /// Returns an error if the database update fails.
    pub async fn deactivate(&self, id: Uuid) -> StorageResult<Option<Convenio>> {
        let sql = format!(
            "UPDATE convenios SET status = 'inativo', atualizado_em = now() \
             WHERE id = $1 RETURNING {COLUMNS}"
        );
        let row = query(&sql).bind(id).fetch_optional(self.pool).await?;
        row.as_ref().map(Convenio::from_row).transpose()
    }

    // -------------------------------------------------------------------------
    // Planos
    // -------------------------------------------------------------------------

    /// # Errors
    ///
    /// Returns `Conflict` when the plan code exists for this insurer.
    pub async fn create_plano(&self, convenio_id: Uuid, input: &CreatePlano) -> StorageResult<Plano> {
        let codigo = input.codigo_plano.trim();
        let sql = format!(
            "INSERT INTO planos (convenio_id, codigo_plano, nome_plano, tipo_plano, \
                vigencia_inicio, vigencia_fim, carencia_dias, valor_consulta, \
                percentual_coparticipacao, observacoes, status) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) RETURNING {PLANO_COLUMNS}"
        );
        let row = query(&sql)
            .bind(convenio_id)
            .bind(codigo)
            .bind(input.nome_plano.trim())
            .bind(input.tipo_plano.unwrap_or(TipoPlano::Ambulatorial).as_str())
            .bind(input.vigencia_inicio)
            .bind(input.vigencia_fim)
            .bind(input.carencia_dias)
            .bind(input.valor_consulta)
            .bind(input.percentual_coparticipacao)
            .bind(&input.observacoes)
            .bind(input.status.unwrap_or(StatusPlano::Ativo).as_str())
            .fetch_one(self.pool)
            .await
            .map_err(|e| StorageError::from_constraint(e, || plano_conflict(codigo)))?;
        Plano::from_row(&row)
    }

    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_planos(&self, convenio_id: Uuid) -> StorageResult<Vec<Plano>> {
        let sql = format!(
            "SELECT {PLANO_COLUMNS} FROM planos WHERE convenio_id = $1 ORDER BY nome_plano"
        );
        let rows = query(&sql).bind(convenio_id).fetch_all(self.pool).await?;
        rows.iter().map(Plano::from_row).collect()
    }

    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_plano(&self, convenio_id: Uuid, id: Uuid) -> StorageResult<Option<Plano>> {
        let sql =
            format!("SELECT {PLANO_COLUMNS} FROM planos WHERE convenio_id = $1 AND id = $2");
        let row = query(&sql)
            .bind(convenio_id)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        row.as_ref().map(Plano::from_row).transpose()
    }

    /// # Errors
    ///
    /// Returns `Conflict` when the new plan code exists for this insurer.
    pub async fn update_plano(
        &self,
        convenio_id: Uuid,
        id: Uuid,
        input: &UpdatePlano,
    ) -> StorageResult<Option<Plano>> {
        let codigo = input.codigo_plano.as_deref().map(str::trim);
        let sql = format!(
            "UPDATE planos SET \
                codigo_plano = COALESCE($3, codigo_plano), \
                nome_plano = COALESCE($4, nome_plano), \
                tipo_plano = COALESCE($5, tipo_plano), \
                vigencia_inicio = COALESCE($6, vigencia_inicio), \
                vigencia_fim = COALESCE($7, vigencia_fim), \
                carencia_dias = COALESCE($8, carencia_dias), \
                valor_consulta = COALESCE($9, valor_consulta), \
                percentual_coparticipacao = COALESCE($10, percentual_coparticipacao), \
                observacoes = COALESCE($11, observacoes), \
                status = COALESCE($12, status), \
                atualizado_em = now() \
             WHERE convenio_id = $1 AND id = $2 RETURNING {PLANO_COLUMNS}"
        );
        let row = query(&sql)
            .bind(convenio_id)
            .bind(id)
            .bind(codigo)
            .bind(input.nome_plano.as_deref().map(str::trim))
            .bind(input.tipo_plano.map(|v| v.as_str()))
            .bind(input.vigencia_inicio)
            .bind(input.vigencia_fim)
            .bind(input.carencia_dias)
            .bind(input.valor_consulta)
            .bind(input.percentual_coparticipacao)
            .bind(&input.observacoes)
            .bind(input.status.map(|v| v.as_str()))
            .fetch_optional(self.pool)
            .await
            .map_err(|e| StorageError::from_constraint(e, || plano_conflict(codigo.unwrap_or(""))))?;
        row.as_ref().map(Plano::from_row).transpose()
    }

    /// Hard delete. Returns `false` when nothing was removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database delete fails.
    pub async fn delete_plano(&self, convenio_id: Uuid, id: Uuid) -> StorageResult<bool> {
        let result = query("DELETE FROM planos WHERE convenio_id = $1 AND id = $2")
            .bind(convenio_id)
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
    fn convenio_rules() {
        let input: CreateConvenio = serde_json::from_value(serde_json::json!({
            "nome": "Unimed",
            "cnpj": "123",
            "dia_fechamento": 40,
            "percentual_desconto": 120.0
        }))
        .unwrap();
        let mut errors = FieldErrors::new();
        input.validate(&mut errors);
        assert_eq!(
            errors.as_slice(),
            [
                "cnpj: deve conter exatamente 14 dígitos",
                "dia_fechamento: deve estar entre 1 e 31",
                "percentual_desconto: não pode ser maior que 100",
            ]
        );
    }

    #[test]
    fn plano_vigencia_must_be_ordered() {
        let input: CreatePlano = serde_json::from_value(serde_json::json!({
            "codigo_plano": "BASICO",
            "nome_plano": "Básico",
            "vigencia_inicio": "2025-02-01",
            "vigencia_fim": "2025-01-01"
        }))
        .unwrap();
        let mut errors = FieldErrors::new();
        input.validate(&mut errors);
        assert_eq!(errors.as_slice(), ["vigencia_fim: não pode ser anterior a vigencia_inicio"]);
    }

    #[test]
    fn toggle_refuses_suspended_and_blocked() {
        let err = toggle_indisponivel(StatusConvenio::Suspenso);
        assert!(matches!(
            err,
            StorageError::InvalidInput(ref msg) if msg.contains("status suspenso")
        ));
        assert!(toggle_indisponivel(StatusConvenio::Bloqueado).is_client_error());
    }

    #[test]
    fn tipo_faturamento_serializes_lowercase() {
        assert_eq!(serde_json::to_value(TipoFaturamento::Proprio).unwrap(), "proprio");
        assert_eq!("manual".parse::<TipoFaturamento>().unwrap(), TipoFaturamento::Manual);
    }
}

//! Accounts payable.
//!
//! A conta owns three child collections (cost composition, withheld taxes
//! and instalments). They are always written in the same transaction as
//! the parent and are deleted with it.

use std::sync::LazyLock;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use erplab_api::{FieldErrors, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx_core::query::query;
use sqlx_core::query_scalar::query_scalar;
use sqlx_core::row::Row;
use sqlx_postgres::{PgConnection, PgPool, PgRow};
use uuid::Uuid;

use crate::error::{StorageError, StorageResult};
use crate::row::enum_col;

text_enum! {
    pub enum CredorTipo {
        Empresa => "empresa",
        PrestadorServico => "prestador_servico",
        Fornecedor => "fornecedor",
        Profissional => "profissional",
    }
}

text_enum! {
    pub enum TipoDocumento {
        NotaFiscal => "nota_fiscal",
        FolhaPagamento => "folha_pagamento",
        Boleto => "boleto",
        Recibo => "recibo",
        Contrato => "contrato",
        Outros => "outros",
    }
}

text_enum! {
    pub enum StatusContaPagar {
        APagar => "a_pagar",
        Paga => "paga",
        Agendada => "agendada",
        ParcialmentePaga => "parcialmente_paga",
        Cancelada => "cancelada",
        Vencida => "vencida",
    }
}

text_enum! {
    pub enum TipoImposto {
        Iss => "iss",
        Irrf => "irrf",
        Csll => "csll",
        Pis => "pis",
        Cofins => "cofins",
        Ibs => "ibs",
        Cbs => "cbs",
    }
}

static COMPETENCIA_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(0[1-9]|1[0-2])/\d{4}$").expect("valid regex"));

const CODIGO_LOCK_BASE: i64 = 0x4341_5000_0000;

/// Advisory lock serializing `CAP{year}` code generation.
fn codigo_lock_key(year: i32) -> i64 {
    CODIGO_LOCK_BASE + i64::from(year)
}

const COLUMNS: &str = "id, codigo_interno, credor_tipo, credor_id, unidade_devedora_id, \
    tipo_documento, numero_documento, descricao, valor_bruto::float8 AS valor_bruto, \
    valor_liquido::float8 AS valor_liquido, competencia, data_emissao, status, observacoes, \
    criado_em, atualizado_em";

#[derive(Debug, Clone, Serialize)]
pub struct ContaPagar {
    pub id: Uuid,
    pub codigo_interno: String,
    pub credor_tipo: CredorTipo,
    pub credor_id: Uuid,
    pub unidade_devedora_id: Uuid,
    pub tipo_documento: TipoDocumento,
    pub numero_documento: Option<String>,
    pub descricao: String,
    pub valor_bruto: f64,
    pub valor_liquido: f64,
    pub competencia: String,
    pub data_emissao: NaiveDate,
    pub status: StatusContaPagar,
    pub observacoes: Option<String>,
    pub criado_em: DateTime<Utc>,
    pub atualizado_em: DateTime<Utc>,
    pub composicoes_financeiras: Vec<ComposicaoFinanceira>,
    pub impostos_retidos: Vec<ImpostoRetido>,
    pub parcelas: Vec<Parcela>,
}

impl ContaPagar {
    fn from_row(row: &PgRow) -> StorageResult<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            codigo_interno: row.try_get("codigo_interno")?,
            credor_tipo: enum_col(row, "credor_tipo")?,
            credor_id: row.try_get("credor_id")?,
            unidade_devedora_id: row.try_get("unidade_devedora_id")?,
            tipo_documento: enum_col(row, "tipo_documento")?,
            numero_documento: row.try_get("numero_documento")?,
            descricao: row.try_get("descricao")?,
            valor_bruto: row.try_get("valor_bruto")?,
            valor_liquido: row.try_get("valor_liquido")?,
            competencia: row.try_get("competencia")?,
            data_emissao: row.try_get("data_emissao")?,
            status: enum_col(row, "status")?,
            observacoes: row.try_get("observacoes")?,
            criado_em: row.try_get("criado_em")?,
            atualizado_em: row.try_get("atualizado_em")?,
            composicoes_financeiras: Vec::new(),
            impostos_retidos: Vec::new(),
            parcelas: Vec::new(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ComposicaoFinanceira {
    #[serde(default, skip_deserializing)]
    pub id: Option<Uuid>,
    pub conta_contabil_id: Uuid,
    pub centro_custo_id: Option<Uuid>,
    pub colaborador: Option<String>,
    pub valor: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImpostoRetido {
    #[serde(default, skip_deserializing)]
    pub id: Option<Uuid>,
    pub tipo: TipoImposto,
    pub percentual: f64,
    pub valor_calculado: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Parcela {
    #[serde(default, skip_deserializing)]
    pub id: Option<Uuid>,
    pub numero: i32,
    pub total_parcelas: i32,
    pub valor: f64,
    pub data_vencimento: NaiveDate,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateContaPagar {
    pub credor_tipo: CredorTipo,
    pub credor_id: Uuid,
    pub unidade_devedora_id: Uuid,
    pub tipo_documento: TipoDocumento,
    pub numero_documento: Option<String>,
    pub descricao: String,
    pub valor_bruto: f64,
    pub valor_liquido: f64,
    pub competencia: String,
    pub data_emissao: NaiveDate,
    pub status: Option<StatusContaPagar>,
    pub observacoes: Option<String>,
    #[serde(default)]
    pub composicoes_financeiras: Vec<ComposicaoFinanceira>,
    #[serde(default)]
    pub impostos_retidos: Vec<ImpostoRetido>,
    #[serde(default)]
    pub parcelas: Vec<Parcela>,
}

impl Validate for CreateContaPagar {
    fn validate(&self, errors: &mut FieldErrors) {
        errors.max_len("numero_documento", self.numero_documento.as_deref(), 100);
        errors.required("descricao", &self.descricao);
        errors.numeric("valor_bruto", Some(self.valor_bruto), 15, 2);
        errors.numeric("valor_liquido", Some(self.valor_liquido), 15, 2);
        validate_competencia(errors, Some(&self.competencia));
        validate_children(
            errors,
            &self.composicoes_financeiras,
            &self.impostos_retidos,
            &self.parcelas,
        );
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateContaPagar {
    pub credor_tipo: Option<CredorTipo>,
    pub credor_id: Option<Uuid>,
    pub unidade_devedora_id: Option<Uuid>,
    pub tipo_documento: Option<TipoDocumento>,
    pub numero_documento: Option<String>,
    pub descricao: Option<String>,
    pub valor_bruto: Option<f64>,
    pub valor_liquido: Option<f64>,
    pub competencia: Option<String>,
    pub data_emissao: Option<NaiveDate>,
    pub status: Option<StatusContaPagar>,
    pub observacoes: Option<String>,
    pub composicoes_financeiras: Option<Vec<ComposicaoFinanceira>>,
    pub impostos_retidos: Option<Vec<ImpostoRetido>>,
    pub parcelas: Option<Vec<Parcela>>,
}

impl Validate for UpdateContaPagar {
    fn validate(&self, errors: &mut FieldErrors) {
        errors.max_len("numero_documento", self.numero_documento.as_deref(), 100);
        errors.not_blank("descricao", self.descricao.as_deref());
        errors.numeric("valor_bruto", self.valor_bruto, 15, 2);
        errors.numeric("valor_liquido", self.valor_liquido, 15, 2);
        validate_competencia(errors, self.competencia.as_deref());
        validate_children(
            errors,
            self.composicoes_financeiras.as_deref().unwrap_or_default(),
            self.impostos_retidos.as_deref().unwrap_or_default(),
            self.parcelas.as_deref().unwrap_or_default(),
        );
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateStatusContaPagar {
    pub status: StatusContaPagar,
}

impl Validate for UpdateStatusContaPagar {
    fn validate(&self, _errors: &mut FieldErrors) {}
}

fn validate_competencia(errors: &mut FieldErrors, competencia: Option<&str>) {
    errors.matches(
        "competencia",
        competencia,
        &COMPETENCIA_RE,
        "deve estar no formato MM/YYYY",
    );
}

fn validate_children(
    errors: &mut FieldErrors,
    composicoes: &[ComposicaoFinanceira],
    impostos: &[ImpostoRetido],
    parcelas: &[Parcela],
) {
    for (i, c) in composicoes.iter().enumerate() {
        errors.max_len(&format!("composicoes_financeiras[{i}].colaborador"), c.colaborador.as_deref(), 255);
        errors.numeric(&format!("composicoes_financeiras[{i}].valor"), Some(c.valor), 15, 2);
    }
    for (i, imposto) in impostos.iter().enumerate() {
        errors.numeric(&format!("impostos_retidos[{i}].percentual"), Some(imposto.percentual), 5, 2);
        errors.numeric(
            &format!("impostos_retidos[{i}].valor_calculado"),
            Some(imposto.valor_calculado),
            15,
            2,
        );
    }
    for (i, p) in parcelas.iter().enumerate() {
        if p.numero < 1 {
            errors.push(&format!("parcelas[{i}].numero"), "deve ser maior que zero");
        }
        if p.total_parcelas < p.numero {
            errors.push(
                &format!("parcelas[{i}].total_parcelas"),
                "não pode ser menor que o número da parcela",
            );
        }
        errors.numeric(&format!("parcelas[{i}].valor"), Some(p.valor), 15, 2);
    }
}

/// `CAP{year}{NNNN}` from the highest sequence already used in `year`.
pub fn gerar_codigo_interno(year: i32, ultimo_sequencial: Option<i32>) -> String {
    format!("CAP{year}{:04}", ultimo_sequencial.unwrap_or(0) + 1)
}

async fn next_codigo(conn: &mut PgConnection, year: i32) -> StorageResult<String> {
    query("SELECT pg_advisory_xact_lock($1)")
        .bind(codigo_lock_key(year))
        .execute(&mut *conn)
        .await?;
    let prefix = format!("CAP{year}");
    let ultimo: Option<i32> = query_scalar(
        "SELECT MAX(SUBSTRING(codigo_interno FROM 8)::int) FROM contas_pagar \
         WHERE codigo_interno LIKE $1 AND SUBSTRING(codigo_interno FROM 8) ~ '^[0-9]+$'",
    )
    .bind(format!("{prefix}%"))
    .fetch_one(&mut *conn)
    .await?;
    Ok(gerar_codigo_interno(year, ultimo))
}

async fn insert_children(
    conn: &mut PgConnection,
    conta_id: Uuid,
    composicoes: &[ComposicaoFinanceira],
    impostos: &[ImpostoRetido],
    parcelas: &[Parcela],
) -> StorageResult<()> {
    for c in composicoes {
        query(
            "INSERT INTO contas_pagar_composicoes \
                (conta_pagar_id, conta_contabil_id, centro_custo_id, colaborador, valor) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(conta_id)
        .bind(c.conta_contabil_id)
        .bind(c.centro_custo_id)
        .bind(&c.colaborador)
        .bind(c.valor)
        .execute(&mut *conn)
        .await
        .map_err(|e| StorageError::from_constraint(e, || "Composição financeira duplicada".to_string()))?;
    }
    for i in impostos {
        query(
            "INSERT INTO contas_pagar_impostos \
                (conta_pagar_id, tipo_imposto, percentual, valor_calculado) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(conta_id)
        .bind(i.tipo.as_str())
        .bind(i.percentual)
        .bind(i.valor_calculado)
        .execute(&mut *conn)
        .await?;
    }
    for p in parcelas {
        query(
            "INSERT INTO contas_pagar_parcelas \
                (conta_pagar_id, numero_parcela, total_parcelas, valor, data_vencimento) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(conta_id)
        .bind(p.numero)
        .bind(p.total_parcelas)
        .bind(p.valor)
        .bind(p.data_vencimento)
        .execute(&mut *conn)
        .await
        .map_err(|e| {
            StorageError::from_constraint(e, || {
                format!("Parcela {} informada mais de uma vez", p.numero)
            })
        })?;
    }
    Ok(())
}

pub struct ContaPagarStorage<'a> {
    pool: &'a PgPool,
}

impl<'a> ContaPagarStorage<'a> {
    #[must_use]
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Inserts the conta with a freshly generated code and all its children.
    ///
    /// # Errors
    ///
    /// Returns an error if any insert fails; nothing is persisted in that case.
    pub async fn create(&self, input: &CreateContaPagar) -> StorageResult<ContaPagar> {
        let mut tx = self.pool.begin().await?;
        let codigo = next_codigo(&mut tx, Utc::now().year()).await?;

        let sql = format!(
            "INSERT INTO contas_pagar (codigo_interno, credor_tipo, credor_id, unidade_devedora_id, \
                tipo_documento, numero_documento, descricao, valor_bruto, valor_liquido, \
                competencia, data_emissao, status, observacoes) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) RETURNING {COLUMNS}"
        );
        let row = query(&sql)
            .bind(&codigo)
            .bind(input.credor_tipo.as_str())
            .bind(input.credor_id)
            .bind(input.unidade_devedora_id)
            .bind(input.tipo_documento.as_str())
            .bind(&input.numero_documento)
            .bind(input.descricao.trim())
            .bind(input.valor_bruto)
            .bind(input.valor_liquido)
            .bind(&input.competencia)
            .bind(input.data_emissao)
            .bind(input.status.unwrap_or(StatusContaPagar::APagar).as_str())
            .bind(&input.observacoes)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                StorageError::from_constraint(e, || {
                    format!("Já existe uma conta a pagar com o código {codigo}")
                })
            })?;
        let conta = ContaPagar::from_row(&row)?;

        insert_children(
            &mut tx,
            conta.id,
            &input.composicoes_financeiras,
            &input.impostos_retidos,
            &input.parcelas,
        )
        .await?;
        tx.commit().await?;

        tracing::debug!(codigo = %conta.codigo_interno, "conta a pagar criada");
        self.require(conta.id).await
    }

    async fn require(&self, id: Uuid) -> StorageResult<ContaPagar> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| StorageError::not_found(format!("Conta a pagar com ID {id} não encontrada")))
    }

    async fn load(&self, where_clause: &str, arg: Option<BindArg<'_>>) -> StorageResult<Vec<ContaPagar>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM contas_pagar {where_clause} ORDER BY criado_em DESC, id"
        );
        let q = query(&sql);
        let q = match arg {
            Some(BindArg::Uuid(v)) => q.bind(v),
            Some(BindArg::Text(v)) => q.bind(v),
            None => q,
        };
        let rows = q.fetch_all(self.pool).await?;
        let mut contas = rows
            .iter()
            .map(ContaPagar::from_row)
            .collect::<StorageResult<Vec<_>>>()?;
        self.attach_children(&mut contas).await?;
        Ok(contas)
    }

    async fn attach_children(&self, contas: &mut [ContaPagar]) -> StorageResult<()> {
        if contas.is_empty() {
            return Ok(());
        }
        let ids: Vec<Uuid> = contas.iter().map(|c| c.id).collect();

        let rows = query(
            "SELECT id, conta_pagar_id, conta_contabil_id, centro_custo_id, colaborador, \
                valor::float8 AS valor \
             FROM contas_pagar_composicoes WHERE conta_pagar_id = ANY($1) ORDER BY id",
        )
        .bind(&ids)
        .fetch_all(self.pool)
        .await?;
        for row in &rows {
            let conta_id: Uuid = row.try_get("conta_pagar_id")?;
            let item = ComposicaoFinanceira {
                id: Some(row.try_get("id")?),
                conta_contabil_id: row.try_get("conta_contabil_id")?,
                centro_custo_id: row.try_get("centro_custo_id")?,
                colaborador: row.try_get("colaborador")?,
                valor: row.try_get("valor")?,
            };
            if let Some(conta) = contas.iter_mut().find(|c| c.id == conta_id) {
                conta.composicoes_financeiras.push(item);
            }
        }

        let rows = query(
            "SELECT id, conta_pagar_id, tipo_imposto, percentual::float8 AS percentual, \
                valor_calculado::float8 AS valor_calculado \
             FROM contas_pagar_impostos WHERE conta_pagar_id = ANY($1) ORDER BY tipo_imposto, id",
        )
        .bind(&ids)
        .fetch_all(self.pool)
        .await?;
        for row in &rows {
            let conta_id: Uuid = row.try_get("conta_pagar_id")?;
            let item = ImpostoRetido {
                id: Some(row.try_get("id")?),
                tipo: enum_col(row, "tipo_imposto")?,
                percentual: row.try_get("percentual")?,
                valor_calculado: row.try_get("valor_calculado")?,
            };
            if let Some(conta) = contas.iter_mut().find(|c| c.id == conta_id) {
                conta.impostos_retidos.push(item);
            }
        }

        let rows = query(
            "SELECT id, conta_pagar_id, numero_parcela, total_parcelas, valor::float8 AS valor, \
                data_vencimento \
             FROM contas_pagar_parcelas WHERE conta_pagar_id = ANY($1) ORDER BY numero_parcela",
        )
        .bind(&ids)
        .fetch_all(self.pool)
        .await?;
        for row in &rows {
            let conta_id: Uuid = row.try_get("conta_pagar_id")?;
            let item = Parcela {
                id: Some(row.try_get("id")?),
                numero: row.try_get("numero_parcela")?,
                total_parcelas: row.try_get("total_parcelas")?,
                valor: row.try_get("valor")?,
                data_vencimento: row.try_get("data_vencimento")?,
            };
            if let Some(conta) = contas.iter_mut().find(|c| c.id == conta_id) {
                conta.parcelas.push(item);
            }
        }
        Ok(())
    }

    /// Newest first, children included.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_all(&self) -> StorageResult<Vec<ContaPagar>> {
        self.load("", None).await
    }

    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_status(&self, status: StatusContaPagar) -> StorageResult<Vec<ContaPagar>> {
        self.load("WHERE status = $1", Some(BindArg::Text(status.as_str())))
            .await
    }

    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_credor(&self, credor_id: Uuid) -> StorageResult<Vec<ContaPagar>> {
        self.load("WHERE credor_id = $1", Some(BindArg::Uuid(credor_id)))
            .await
    }

    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_id(&self, id: Uuid) -> StorageResult<Option<ContaPagar>> {
        Ok(self
            .load("WHERE id = $1", Some(BindArg::Uuid(id)))
            .await?
            .into_iter()
            .next())
    }

    /// Updates scalar columns. Child collections present in `input` replace
    /// the stored ones; absent collections are left untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if any statement fails; the update is rolled back.
    pub async fn update(
        &self,
        id: Uuid,
        input: &UpdateContaPagar,
    ) -> StorageResult<Option<ContaPagar>> {
        let mut tx = self.pool.begin().await?;
        let result = query(
            "UPDATE contas_pagar SET \
                credor_tipo = COALESCE($2, credor_tipo), \
                credor_id = COALESCE($3, credor_id), \
                unidade_devedora_id = COALESCE($4, unidade_devedora_id), \
                tipo_documento = COALESCE($5, tipo_documento), \
                numero_documento = COALESCE($6, numero_documento), \
                descricao = COALESCE($7, descricao), \
                valor_bruto = COALESCE($8, valor_bruto), \
                valor_liquido = COALESCE($9, valor_liquido), \
                competencia = COALESCE($10, competencia), \
                data_emissao = COALESCE($11, data_emissao), \
                status = COALESCE($12, status), \
                observacoes = COALESCE($13, observacoes), \
                atualizado_em = now() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(input.credor_tipo.map(|v| v.as_str()))
        .bind(input.credor_id)
        .bind(input.unidade_devedora_id)
        .bind(input.tipo_documento.map(|v| v.as_str()))
        .bind(&input.numero_documento)
        .bind(input.descricao.as_deref().map(str::trim))
        .bind(input.valor_bruto)
        .bind(input.valor_liquido)
        .bind(&input.competencia)
        .bind(input.data_emissao)
        .bind(input.status.map(|v| v.as_str()))
        .bind(&input.observacoes)
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            return Ok(None);
        }

        if let Some(composicoes) = &input.composicoes_financeiras {
            query("DELETE FROM contas_pagar_composicoes WHERE conta_pagar_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            insert_children(&mut tx, id, composicoes, &[], &[]).await?;
        }
        if let Some(impostos) = &input.impostos_retidos {
            query("DELETE FROM contas_pagar_impostos WHERE conta_pagar_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            insert_children(&mut tx, id, &[], impostos, &[]).await?;
        }
        if let Some(parcelas) = &input.parcelas {
            query("DELETE FROM contas_pagar_parcelas WHERE conta_pagar_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            insert_children(&mut tx, id, &[], &[], parcelas).await?;
        }
        tx.commit().await?;

        self.find_by_id(id).await
    }

    /// # Errors
    ///
    /// Returns an error if the database update fails.
    pub async fn set_status(
        &self,
        id: Uuid,
        status: StatusContaPagar,
    ) -> StorageResult<Option<ContaPagar>> {
        let result = query(
            "UPDATE contas_pagar SET status = $2, atualizado_em = now() WHERE id = $1",
        )
        .bind(id)
        .bind(status.as_str())
        .execute(self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.find_by_id(id).await
    }

    /// Hard delete; children go with the parent.
    ///
    /// # Errors
    ///
    /// Returns an error if the database delete fails.
    pub async fn delete(&self, id: Uuid) -> StorageResult<bool> {
        let result = query("DELETE FROM contas_pagar WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

enum BindArg<'a> {
    Uuid(Uuid),
    Text(&'a str),
}

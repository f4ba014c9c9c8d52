//! Patient records.
//!
//! A patient is unique per `(cpf, empresa_id)`. Removal is a soft delete that
//! moves the status to `inativo`. Every read carries the display fields
//! (`cpf_formatado`, `idade`, `nome_completo`, ...) computed from the row.

use std::sync::LazyLock;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use erplab_api::{FieldErrors, Page, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx_core::query::query;
use sqlx_core::query_builder::QueryBuilder;
use sqlx_core::row::Row;
use sqlx_postgres::{PgPool, PgRow, Postgres};
use uuid::Uuid;

use crate::error::{StorageError, StorageResult};
use crate::row::{contains_pattern, enum_col, opt_enum_col};

static UF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z]{2}$").expect("Invalid UF regex"));

text_enum! {
    pub enum Sexo {
        Masculino => "M",
        Feminino => "F",
        Outro => "O",
    }
}

text_enum! {
    pub enum UsarNomeSocial {
        NaoSeAplica => "nao_se_aplica",
        Sim => "sim",
        Nao => "nao",
    }
}

text_enum! {
    pub enum EstadoCivil {
        Solteiro => "solteiro",
        Casado => "casado",
        Divorciado => "divorciado",
        Viuvo => "viuvo",
        UniaoEstavel => "uniao_estavel",
    }
}

text_enum! {
    pub enum StatusPaciente {
        Ativo => "ativo",
        Inativo => "inativo",
        Bloqueado => "bloqueado",
    }
}

const COLUMNS: &str = "id, codigo_interno, nome, nome_social, usar_nome_social, sexo, \
    data_nascimento, nome_mae, prontuario, rg, cpf, estado_civil, email, contatos, whatsapp, \
    profissao, observacao, convenio_id, plano, validade, matricula, nome_titular, cartao_sus, \
    cep, rua, numero, bairro, complemento, cidade, estado, foto_url, status, empresa_id, \
    criado_por, atualizado_por, criado_em, atualizado_em";

#[derive(Debug, Clone, Serialize)]
pub struct Paciente {
    pub id: Uuid,
    pub codigo_interno: String,
    pub nome: String,
    pub nome_social: Option<String>,
    pub usar_nome_social: UsarNomeSocial,
    pub sexo: Sexo,
    pub data_nascimento: NaiveDate,
    pub nome_mae: Option<String>,
    pub prontuario: Option<String>,
    pub rg: Option<String>,
    pub cpf: String,
    pub estado_civil: Option<EstadoCivil>,
    pub email: Option<String>,
    pub contatos: Option<String>,
    pub whatsapp: Option<String>,
    pub profissao: Option<String>,
    pub observacao: Option<String>,
    pub convenio_id: Option<Uuid>,
    pub plano: Option<String>,
    pub validade: Option<NaiveDate>,
    pub matricula: Option<String>,
    pub nome_titular: Option<String>,
    pub cartao_sus: Option<String>,
    pub cep: Option<String>,
    pub rua: Option<String>,
    pub numero: Option<String>,
    pub bairro: Option<String>,
    pub complemento: Option<String>,
    pub cidade: Option<String>,
    pub estado: Option<String>,
    pub foto_url: Option<String>,
    pub status: StatusPaciente,
    pub empresa_id: Option<Uuid>,
    pub criado_por: Option<Uuid>,
    pub atualizado_por: Option<Uuid>,
    pub criado_em: DateTime<Utc>,
    pub atualizado_em: DateTime<Utc>,

    pub cpf_formatado: String,
    pub idade: i32,
    pub nome_completo: String,
    pub endereco_completo: String,
    pub cep_formatado: Option<String>,
    pub whatsapp_formatado: Option<String>,
}

impl Paciente {
    fn from_row(row: &PgRow) -> StorageResult<Self> {
        let mut paciente = Self {
            id: row.try_get("id")?,
            codigo_interno: row.try_get("codigo_interno")?,
            nome: row.try_get("nome")?,
            nome_social: row.try_get("nome_social")?,
            usar_nome_social: enum_col(row, "usar_nome_social")?,
            sexo: enum_col(row, "sexo")?,
            data_nascimento: row.try_get("data_nascimento")?,
            nome_mae: row.try_get("nome_mae")?,
            prontuario: row.try_get("prontuario")?,
            rg: row.try_get("rg")?,
            cpf: row.try_get("cpf")?,
            estado_civil: opt_enum_col(row, "estado_civil")?,
            email: row.try_get("email")?,
            contatos: row.try_get("contatos")?,
            whatsapp: row.try_get("whatsapp")?,
            profissao: row.try_get("profissao")?,
            observacao: row.try_get("observacao")?,
            convenio_id: row.try_get("convenio_id")?,
            plano: row.try_get("plano")?,
            validade: row.try_get("validade")?,
            matricula: row.try_get("matricula")?,
            nome_titular: row.try_get("nome_titular")?,
            cartao_sus: row.try_get("cartao_sus")?,
            cep: row.try_get("cep")?,
            rua: row.try_get("rua")?,
            numero: row.try_get("numero")?,
            bairro: row.try_get("bairro")?,
            complemento: row.try_get("complemento")?,
            cidade: row.try_get("cidade")?,
            estado: row.try_get("estado")?,
            foto_url: row.try_get("foto_url")?,
            status: enum_col(row, "status")?,
            empresa_id: row.try_get("empresa_id")?,
            criado_por: row.try_get("criado_por")?,
            atualizado_por: row.try_get("atualizado_por")?,
            criado_em: row.try_get("criado_em")?,
            atualizado_em: row.try_get("atualizado_em")?,
            cpf_formatado: String::new(),
            idade: 0,
            nome_completo: String::new(),
            endereco_completo: String::new(),
            cep_formatado: None,
            whatsapp_formatado: None,
        };
        paciente.fill_derived(Utc::now().date_naive());
        Ok(paciente)
    }

    fn fill_derived(&mut self, hoje: NaiveDate) {
        self.cpf_formatado = formatar_cpf(&self.cpf);
        self.idade = calcular_idade(self.data_nascimento, hoje);
        self.nome_completo = match (self.usar_nome_social, self.nome_social.as_deref()) {
            (UsarNomeSocial::Sim, Some(social)) if !social.trim().is_empty() => social.to_string(),
            _ => self.nome.clone(),
        };
        self.endereco_completo = [
            &self.rua,
            &self.numero,
            &self.complemento,
            &self.bairro,
            &self.cidade,
            &self.estado,
        ]
        .into_iter()
        .filter_map(|parte| parte.as_deref().map(str::trim).filter(|p| !p.is_empty()))
        .collect::<Vec<_>>()
        .join(", ");
        self.cep_formatado = self.cep.as_deref().map(formatar_cep);
        self.whatsapp_formatado = self.whatsapp.as_deref().map(formatar_telefone);
    }
}

/// `00000000000` → `000.000.000-00`. Anything that is not 11 digits is returned as is.
pub fn formatar_cpf(cpf: &str) -> String {
    if cpf.len() != 11 || !cpf.bytes().all(|b| b.is_ascii_digit()) {
        return cpf.to_string();
    }
    format!("{}.{}.{}-{}", &cpf[0..3], &cpf[3..6], &cpf[6..9], &cpf[9..11])
}

pub fn formatar_cep(cep: &str) -> String {
    if cep.len() != 8 || !cep.bytes().all(|b| b.is_ascii_digit()) {
        return cep.to_string();
    }
    format!("{}-{}", &cep[0..5], &cep[5..8])
}

/// Formats 10 or 11 digit phone numbers as `(00) 0000-0000` / `(00) 00000-0000`.
pub fn formatar_telefone(telefone: &str) -> String {
    let digits: String = telefone.chars().filter(char::is_ascii_digit).collect();
    match digits.len() {
        11 => format!("({}) {}-{}", &digits[0..2], &digits[2..7], &digits[7..11]),
        10 => format!("({}) {}-{}", &digits[0..2], &digits[2..6], &digits[6..10]),
        _ => telefone.to_string(),
    }
}

/// Age in completed years at `hoje`.
pub fn calcular_idade(nascimento: NaiveDate, hoje: NaiveDate) -> i32 {
    let mut idade = hoje.year() - nascimento.year();
    if (hoje.month(), hoje.day()) < (nascimento.month(), nascimento.day()) {
        idade -= 1;
    }
    idade.max(0)
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreatePaciente {
    pub codigo_interno: Option<String>,
    pub nome: String,
    pub nome_social: Option<String>,
    pub usar_nome_social: Option<UsarNomeSocial>,
    pub sexo: Sexo,
    pub data_nascimento: NaiveDate,
    pub nome_mae: Option<String>,
    pub prontuario: Option<String>,
    pub rg: Option<String>,
    pub cpf: String,
    pub estado_civil: Option<EstadoCivil>,
    pub email: Option<String>,
    pub contatos: Option<String>,
    pub whatsapp: Option<String>,
    pub profissao: Option<String>,
    pub observacao: Option<String>,
    pub convenio_id: Option<Uuid>,
    pub plano: Option<String>,
    pub validade: Option<NaiveDate>,
    pub matricula: Option<String>,
    pub nome_titular: Option<String>,
    pub cartao_sus: Option<String>,
    pub cep: Option<String>,
    pub rua: Option<String>,
    pub numero: Option<String>,
    pub bairro: Option<String>,
    pub complemento: Option<String>,
    pub cidade: Option<String>,
    pub estado: Option<String>,
    pub foto_url: Option<String>,
    pub status: Option<StatusPaciente>,
    pub empresa_id: Option<Uuid>,
}

impl Validate for CreatePaciente {
    fn validate(&self, errors: &mut FieldErrors) {
        errors.required("nome", &self.nome);
        errors.max_len("nome", Some(&self.nome), 255);
        errors.digits("cpf", Some(&self.cpf), 11);
        if self.data_nascimento > Utc::now().date_naive() {
            errors.push("data_nascimento", "não pode ser uma data futura");
        }
        validate_optional_fields(
            errors,
            &PacienteOptionalRef {
                codigo_interno: self.codigo_interno.as_deref(),
                nome_social: self.nome_social.as_deref(),
                nome_mae: self.nome_mae.as_deref(),
                email: self.email.as_deref(),
                contatos: self.contatos.as_deref(),
                whatsapp: self.whatsapp.as_deref(),
                cartao_sus: self.cartao_sus.as_deref(),
                cep: self.cep.as_deref(),
                estado: self.estado.as_deref(),
                rg: self.rg.as_deref(),
            },
        );
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdatePaciente {
    pub nome: Option<String>,
    pub nome_social: Option<String>,
    pub usar_nome_social: Option<UsarNomeSocial>,
    pub sexo: Option<Sexo>,
    pub data_nascimento: Option<NaiveDate>,
    pub nome_mae: Option<String>,
    pub prontuario: Option<String>,
    pub rg: Option<String>,
    pub cpf: Option<String>,
    pub estado_civil: Option<EstadoCivil>,
    pub email: Option<String>,
    pub contatos: Option<String>,
    pub whatsapp: Option<String>,
    pub profissao: Option<String>,
    pub observacao: Option<String>,
    pub convenio_id: Option<Uuid>,
    pub plano: Option<String>,
    pub validade: Option<NaiveDate>,
    pub matricula: Option<String>,
    pub nome_titular: Option<String>,
    pub cartao_sus: Option<String>,
    pub cep: Option<String>,
    pub rua: Option<String>,
    pub numero: Option<String>,
    pub bairro: Option<String>,
    pub complemento: Option<String>,
    pub cidade: Option<String>,
    pub estado: Option<String>,
    pub foto_url: Option<String>,
    pub status: Option<StatusPaciente>,
}

impl Validate for UpdatePaciente {
    fn validate(&self, errors: &mut FieldErrors) {
        errors.not_blank("nome", self.nome.as_deref());
        errors.max_len("nome", self.nome.as_deref(), 255);
        errors.digits("cpf", self.cpf.as_deref(), 11);
        validate_optional_fields(
            errors,
            &PacienteOptionalRef {
                codigo_interno: None,
                nome_social: self.nome_social.as_deref(),
                nome_mae: self.nome_mae.as_deref(),
                email: self.email.as_deref(),
                contatos: self.contatos.as_deref(),
                whatsapp: self.whatsapp.as_deref(),
                cartao_sus: self.cartao_sus.as_deref(),
                cep: self.cep.as_deref(),
                estado: self.estado.as_deref(),
                rg: self.rg.as_deref(),
            },
        );
    }
}

struct PacienteOptionalRef<'a> {
    codigo_interno: Option<&'a str>,
    nome_social: Option<&'a str>,
    nome_mae: Option<&'a str>,
    email: Option<&'a str>,
    contatos: Option<&'a str>,
    whatsapp: Option<&'a str>,
    cartao_sus: Option<&'a str>,
    cep: Option<&'a str>,
    estado: Option<&'a str>,
    rg: Option<&'a str>,
}

fn validate_optional_fields(errors: &mut FieldErrors, p: &PacienteOptionalRef<'_>) {
    errors.max_len("codigo_interno", p.codigo_interno, 50);
    errors.max_len("nome_social", p.nome_social, 255);
    errors.max_len("nome_mae", p.nome_mae, 255);
    errors.email("email", p.email);
    errors.max_len("contatos", p.contatos, 20);
    errors.max_len("whatsapp", p.whatsapp, 20);
    errors.max_len("cartao_sus", p.cartao_sus, 15);
    errors.max_len("rg", p.rg, 20);
    errors.digits("cep", p.cep, 8);
    errors.matches("estado", p.estado, &UF_RE, "deve ser a sigla de uma UF");
}

/// Filters of the paginated listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PacienteFiltros {
    pub nome: Option<String>,
    pub cpf: Option<String>,
    pub email: Option<String>,
    pub status: Option<StatusPaciente>,
    pub empresa_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PacienteStatusCount {
    pub ativo: i64,
    pub inativo: i64,
    pub bloqueado: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PacienteConvenioCount {
    pub com_convenio: i64,
    pub sem_convenio: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PacienteStats {
    pub total: i64,
    pub status: PacienteStatusCount,
    pub convenio: PacienteConvenioCount,
}

/// `PAC` followed by the current unix time in milliseconds.
pub fn gerar_codigo_interno(agora: DateTime<Utc>) -> String {
    format!("PAC{}", agora.timestamp_millis())
}

pub struct PacienteStorage<'a> {
    pool: &'a PgPool,
}

impl<'a> PacienteStorage<'a> {
    #[must_use]
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    async fn cpf_em_uso(
        &self,
        cpf: &str,
        empresa_id: Option<Uuid>,
        exceto: Option<Uuid>,
    ) -> StorageResult<bool> {
        let row = query(
            "SELECT 1 AS hit FROM pacientes \
             WHERE cpf = $1 AND empresa_id IS NOT DISTINCT FROM $2 \
               AND ($3::uuid IS NULL OR id <> $3) LIMIT 1",
        )
        .bind(cpf)
        .bind(empresa_id)
        .bind(exceto)
        .fetch_optional(self.pool)
        .await?;
        Ok(row.is_some())
    }

    /// # Errors
    ///
    /// Returns `Conflict` if the CPF already exists in the same company.
    pub async fn create(
        &self,
        input: &CreatePaciente,
        criado_por: Option<Uuid>,
    ) -> StorageResult<Paciente> {
        if self.cpf_em_uso(&input.cpf, input.empresa_id, None).await? {
            return Err(cpf_conflict());
        }

        let codigo_interno = input
            .codigo_interno
            .clone()
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| gerar_codigo_interno(Utc::now()));

        let sql = format!(
            "INSERT INTO pacientes (codigo_interno, nome, nome_social, usar_nome_social, sexo, \
                data_nascimento, nome_mae, prontuario, rg, cpf, estado_civil, email, contatos, \
                whatsapp, profissao, observacao, convenio_id, plano, validade, matricula, \
                nome_titular, cartao_sus, cep, rua, numero, bairro, complemento, cidade, estado, \
                foto_url, status, empresa_id, criado_por, atualizado_por) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, \
                $18, $19, $20, $21, $22, $23, $24, $25, $26, $27, $28, upper($29), $30, $31, $32, \
                $33, $33) \
             RETURNING {COLUMNS}"
        );
        let row = query(&sql)
            .bind(&codigo_interno)
            .bind(input.nome.trim())
            .bind(&input.nome_social)
            .bind(input.usar_nome_social.unwrap_or(UsarNomeSocial::NaoSeAplica).as_str())
            .bind(input.sexo.as_str())
            .bind(input.data_nascimento)
            .bind(&input.nome_mae)
            .bind(&input.prontuario)
            .bind(&input.rg)
            .bind(&input.cpf)
            .bind(input.estado_civil.map(|e| e.as_str()))
            .bind(&input.email)
            .bind(&input.contatos)
            .bind(&input.whatsapp)
            .bind(&input.profissao)
            .bind(&input.observacao)
            .bind(input.convenio_id)
            .bind(&input.plano)
            .bind(input.validade)
            .bind(&input.matricula)
            .bind(&input.nome_titular)
            .bind(&input.cartao_sus)
            .bind(&input.cep)
            .bind(&input.rua)
            .bind(&input.numero)
            .bind(&input.bairro)
            .bind(&input.complemento)
            .bind(&input.cidade)
            .bind(&input.estado)
            .bind(&input.foto_url)
            .bind(input.status.unwrap_or(StatusPaciente::Ativo).as_str())
            .bind(input.empresa_id)
            .bind(criado_por)
            .fetch_one(self.pool)
            .await
            .map_err(|e| {
                StorageError::from_unique_constraint(e, |c| mensagem_conflito(c, &codigo_interno))
            })?;
        Paciente::from_row(&row)
    }

    /// Paginated listing ordered by creation date, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_all(
        &self,
        filtros: &PacienteFiltros,
        page: Page,
    ) -> StorageResult<(Vec<Paciente>, i64)> {
        let mut count_qb: QueryBuilder<'_, Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM pacientes WHERE 1 = 1");
        push_filtros(&mut count_qb, filtros);
        let total: i64 = count_qb.build_query_scalar().fetch_one(self.pool).await?;

        let mut qb: QueryBuilder<'_, Postgres> =
            QueryBuilder::new(format!("SELECT {COLUMNS} FROM pacientes WHERE 1 = 1"));
        push_filtros(&mut qb, filtros);
        qb.push(" ORDER BY criado_em DESC, id LIMIT ")
            .push_bind(page.limit_i64())
            .push(" OFFSET ")
            .push_bind(page.offset());
        let rows = qb.build().fetch_all(self.pool).await?;

        let data = rows.iter().map(Paciente::from_row).collect::<StorageResult<_>>()?;
        Ok((data, total))
    }

    /// Active patients whose name contains `nome`, ordered by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn search_by_nome(&self, nome: &str, limit: i64) -> StorageResult<Vec<Paciente>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM pacientes \
             WHERE status = 'ativo' AND nome ILIKE $1 ORDER BY nome LIMIT $2"
        );
        let rows = query(&sql)
            .bind(contains_pattern(nome))
            .bind(limit)
            .fetch_all(self.pool)
            .await?;
        rows.iter().map(Paciente::from_row).collect()
    }

    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn stats(&self, empresa_id: Option<Uuid>) -> StorageResult<PacienteStats> {
        let row = query(
            "SELECT COUNT(*) AS total, \
                COUNT(*) FILTER (WHERE status = 'ativo') AS ativo, \
                COUNT(*) FILTER (WHERE status = 'inativo') AS inativo, \
                COUNT(*) FILTER (WHERE status = 'bloqueado') AS bloqueado, \
                COUNT(convenio_id) AS com_convenio \
             FROM pacientes WHERE ($1::uuid IS NULL OR empresa_id = $1)",
        )
        .bind(empresa_id)
        .fetch_one(self.pool)
        .await?;

        let total: i64 = row.try_get("total")?;
        let com_convenio: i64 = row.try_get("com_convenio")?;
        Ok(PacienteStats {
            total,
            status: PacienteStatusCount {
                ativo: row.try_get("ativo")?,
                inativo: row.try_get("inativo")?,
                bloqueado: row.try_get("bloqueado")?,
            },
            convenio: PacienteConvenioCount {
                com_convenio,
                sem_convenio: total - com_convenio,
            },
        })
    }

    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_cpf(
        &self,
        cpf: &str,
        empresa_id: Option<Uuid>,
    ) -> StorageResult<Option<Paciente>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM pacientes \
             WHERE cpf = $1 AND ($2::uuid IS NULL OR empresa_id = $2) \
             ORDER BY criado_em LIMIT 1"
        );
        let row = query(&sql)
            .bind(cpf)
            .bind(empresa_id)
            .fetch_optional(self.pool)
            .await?;
        row.as_ref().map(Paciente::from_row).transpose()
    }

    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_id(&self, id: Uuid) -> StorageResult<Option<Paciente>> {
        let sql = format!("SELECT {COLUMNS} FROM pacientes WHERE id = $1");
        let row = query(&sql).bind(id).fetch_optional(self.pool).await?;
        row.as_ref().map(Paciente::from_row).transpose()
    }

    /// Applies the fields present in `input`. Returns `None` if the patient does not exist.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` if the new CPF belongs to another patient of the same company.
    pub async fn update(
        &self,
        id: Uuid,
        input: &UpdatePaciente,
        atualizado_por: Option<Uuid>,
    ) -> StorageResult<Option<Paciente>> {
        let Some(atual) = self.find_by_id(id).await? else {
            return Ok(None);
        };
        if let Some(cpf) = input.cpf.as_deref()
            && cpf != atual.cpf
            && self.cpf_em_uso(cpf, atual.empresa_id, Some(id)).await?
        {
            return Err(cpf_conflict());
        }

        let sql = format!(
            "UPDATE pacientes SET \
                nome = COALESCE($2, nome), \
                nome_social = COALESCE($3, nome_social), \
                usar_nome_social = COALESCE($4, usar_nome_social), \
                sexo = COALESCE($5, sexo), \
                data_nascimento = COALESCE($6, data_nascimento), \
                nome_mae = COALESCE($7, nome_mae), \
                prontuario = COALESCE($8, prontuario), \
                rg = COALESCE($9, rg), \
                cpf = COALESCE($10, cpf), \
                estado_civil = COALESCE($11, estado_civil), \
                email = COALESCE($12, email), \
                contatos = COALESCE($13, contatos), \
                whatsapp = COALESCE($14, whatsapp), \
                profissao = COALESCE($15, profissao), \
                observacao = COALESCE($16, observacao), \
                convenio_id = COALESCE($17, convenio_id), \
                plano = COALESCE($18, plano), \
                validade = COALESCE($19, validade), \
                matricula = COALESCE($20, matricula), \
                nome_titular = COALESCE($21, nome_titular), \
                cartao_sus = COALESCE($22, cartao_sus), \
                cep = COALESCE($23, cep), \
                rua = COALESCE($24, rua), \
                numero = COALESCE($25, numero), \
                bairro = COALESCE($26, bairro), \
                complemento = COALESCE($27, complemento), \
                cidade = COALESCE($28, cidade), \
                estado = COALESCE(upper($29), estado), \
                foto_url = COALESCE($30, foto_url), \
                status = COALESCE($31, status), \
                atualizado_por = COALESCE($32, atualizado_por), \
                atualizado_em = now() \
             WHERE id = $1 RETURNING {COLUMNS}"
        );
        let row = query(&sql)
            .bind(id)
            .bind(input.nome.as_deref().map(str::trim))
            .bind(&input.nome_social)
            .bind(input.usar_nome_social.map(|v| v.as_str()))
            .bind(input.sexo.map(|v| v.as_str()))
            .bind(input.data_nascimento)
            .bind(&input.nome_mae)
            .bind(&input.prontuario)
            .bind(&input.rg)
            .bind(&input.cpf)
            .bind(input.estado_civil.map(|v| v.as_str()))
            .bind(&input.email)
            .bind(&input.contatos)
            .bind(&input.whatsapp)
            .bind(&input.profissao)
            .bind(&input.observacao)
            .bind(input.convenio_id)
            .bind(&input.plano)
            .bind(input.validade)
            .bind(&input.matricula)
            .bind(&input.nome_titular)
            .bind(&input.cartao_sus)
            .bind(&input.cep)
            .bind(&input.rua)
            .bind(&input.numero)
            .bind(&input.bairro)
            .bind(&input.complemento)
            .bind(&input.cidade)
            .bind(&input.estado)
            .bind(&input.foto_url)
            .bind(input.status.map(|v| v.as_str()))
            .bind(atualizado_por)
            .fetch_optional(self.pool)
            .await
            .map_err(|e| {
                StorageError::from_unique_constraint(e, |c| {
                    mensagem_conflito(c, &atual.codigo_interno)
                })
            })?;
        row.as_ref().map(Paciente::from_row).transpose()
    }

    /// Sets the status. Soft delete is `set_status(id, Inativo)`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database update fails.
    pub async fn set_status(
        &self,
        id: Uuid,
        status: StatusPaciente,
        atualizado_por: Option<Uuid>,
    ) -> StorageResult<Option<Paciente>> {
        let sql = format!(
            "UPDATE pacientes SET status = $2, atualizado_por = COALESCE($3, atualizado_por), \
                atualizado_em = now() \
             WHERE id = $1 RETURNING {COLUMNS}"
        );
        let row = query(&sql)
            .bind(id)
            .bind(status.as_str())
            .bind(atualizado_por)
            .fetch_optional(self.pool)
            .await?;
        row.as_ref().map(Paciente::from_row).transpose()
    }
}

const CPF_EM_USO: &str = "Já existe um paciente cadastrado com este CPF nesta empresa";

fn cpf_conflict() -> StorageError {
    StorageError::conflict(CPF_EM_USO)
}

/// Conflict message for a unique violation on `pacientes`.
fn mensagem_conflito(constraint: Option<&str>, codigo_interno: &str) -> String {
    match constraint {
        Some("uq_pacientes_codigo_interno") => {
            format!("Já existe um paciente com o código interno {codigo_interno}")
        }
        _ => CPF_EM_USO.to_string(),
    }
}

fn push_filtros(qb: &mut QueryBuilder<'_, Postgres>, filtros: &PacienteFiltros) {
    if let Some(nome) = filtros.nome.as_deref().filter(|n| !n.trim().is_empty()) {
        qb.push(" AND nome ILIKE ").push_bind(contains_pattern(nome));
    }
    if let Some(cpf) = filtros.cpf.as_deref().filter(|c| !c.is_empty()) {
        qb.push(" AND cpf = ").push_bind(cpf.to_string());
    }
    if let Some(email) = filtros.email.as_deref().filter(|e| !e.trim().is_empty()) {
        qb.push(" AND email ILIKE ").push_bind(contains_pattern(email));
    }
    if let Some(status) = filtros.status {
        qb.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(empresa_id) = filtros.empresa_id {
        qb.push(" AND empresa_id = ").push_bind(empresa_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn cpf_is_formatted_only_when_complete() {
        assert_eq!(formatar_cpf("12345678901"), "123.456.789-01");
        assert_eq!(formatar_cpf("1234"), "1234");
    }

    #[test]
    fn cep_and_phone_formatting() {
        assert_eq!(formatar_cep("01310100"), "01310-100");
        assert_eq!(formatar_telefone("11987654321"), "(11) 98765-4321");
        assert_eq!(formatar_telefone("1133334444"), "(11) 3333-4444");
        assert_eq!(formatar_telefone("123"), "123");
    }

    #[test]
    fn age_counts_completed_years() {
        let nascimento = date(1990, 6, 15);
        assert_eq!(calcular_idade(nascimento, date(2025, 6, 14)), 34);
        assert_eq!(calcular_idade(nascimento, date(2025, 6, 15)), 35);
        assert_eq!(calcular_idade(date(2030, 1, 1), date(2025, 1, 1)), 0);
    }

    #[test]
    fn codigo_interno_uses_millis() {
        let agora = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(gerar_codigo_interno(agora), "PAC1735689600000");
    }

    #[test]
    fn unique_violation_message_names_the_violated_key() {
        assert_eq!(
            mensagem_conflito(Some("uq_pacientes_codigo_interno"), "PAC-1"),
            "Já existe um paciente com o código interno PAC-1"
        );
        assert_eq!(
            mensagem_conflito(Some("uq_pacientes_cpf_empresa"), "PAC-1"),
            CPF_EM_USO
        );
        assert_eq!(mensagem_conflito(None, "PAC-1"), CPF_EM_USO);
    }

    #[test]
    fn enums_round_trip_through_text() {
        for sexo in Sexo::ALL {
            assert_eq!(sexo.as_str().parse::<Sexo>().unwrap(), *sexo);
        }
        assert!("X".parse::<Sexo>().is_err());
        assert_eq!(
            serde_json::to_value(UsarNomeSocial::NaoSeAplica).unwrap(),
            "nao_se_aplica"
        );
    }

    #[test]
    fn create_payload_rules() {
        let payload: CreatePaciente = serde_json::from_value(serde_json::json!({
            "nome": "",
            "sexo": "F",
            "data_nascimento": "1990-01-01",
            "cpf": "123",
            "email": "invalido",
            "cep": "0131010",
            "estado": "SPX"
        }))
        .unwrap();
        let err = erplab_api::validate(&payload).unwrap_err();
        let erplab_api::ApiError::Validation(erros) = err else {
            panic!("expected validation error");
        };
        assert!(erros.contains(&"nome: não pode estar vazio".to_string()));
        assert!(erros.contains(&"cpf: deve conter exatamente 11 dígitos".to_string()));
        assert!(erros.contains(&"email: deve ser um e-mail válido".to_string()));
        assert!(erros.contains(&"cep: deve conter exatamente 8 dígitos".to_string()));
        assert!(erros.iter().any(|e| e.starts_with("estado:")));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let result: Result<CreatePaciente, _> = serde_json::from_value(serde_json::json!({
            "nome": "Ana",
            "sexo": "F",
            "data_nascimento": "1990-01-01",
            "cpf": "12345678901",
            "senha": "x"
        }));
        assert!(result.unwrap_err().to_string().contains("unknown field `senha`"));
    }
}

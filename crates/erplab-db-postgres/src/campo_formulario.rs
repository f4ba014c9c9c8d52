//! Configurable form fields (sample type, methodology, ...) and their options.

use chrono::{DateTime, Utc};
use erplab_api::{FieldErrors, Page, Validate};
use serde::{Deserialize, Serialize};
use sqlx_core::query::query;
use sqlx_core::query_builder::QueryBuilder;
use sqlx_core::row::Row;
use sqlx_postgres::{PgPool, PgRow, Postgres};
use uuid::Uuid;

use crate::error::{StorageError, StorageResult};
use crate::row::enum_col;

text_enum! {
    pub enum NomeCampoFormulario {
        Amostra => "AMOSTRA",
        EnvioFaturamento => "ENVIO_FATURAMENTO",
        Especialidade => "ESPECIALIDADE",
        Estabilidade => "ESTABILIDADE",
        FormatoLaudo => "FORMATO_LAUDO",
        FormaLiquidacao => "FORMA_LIQUIDACAO",
        Grupo => "GRUPO",
        Metodologia => "METODOLOGIA",
        RegiaoColeta => "REGIAO_COLETA",
        Setor => "SETOR",
        Subgrupo => "SUBGRUPO",
        TabelaBase => "TABELA_BASE",
        TabelaMaterial => "TABELA_MATERIAL",
        TabelaServico => "TABELA_SERVICO",
        TipoConvenio => "TIPO_CONVENIO",
        TipoExames => "TIPO_EXAMES",
        TipoRecipiente => "TIPO_RECIPIENTE",
        UnidadeMedida => "UNIDADE_MEDIDA",
        VolumeMinimo => "VOLUME_MINIMO",
    }
}

const COLUMNS: &str =
    "id, nome_campo, descricao, ativo, created_by, updated_by, created_at, updated_at";

const ALT_COLUMNS: &str = "id, campo_formulario_id, texto_alternativa, ordem, ativo, \
    created_by, updated_by, created_at, updated_at";

#[derive(Debug, Clone, Serialize)]
pub struct CampoFormulario {
    pub id: Uuid,
    pub nome_campo: NomeCampoFormulario,
    pub descricao: Option<String>,
    pub ativo: bool,
    pub created_by: Option<Uuid>,
    pub updated_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub alternativas: Vec<AlternativaCampoFormulario>,
}

impl CampoFormulario {
    fn from_row(row: &PgRow) -> StorageResult<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            nome_campo: enum_col(row, "nome_campo")?,
            descricao: row.try_get("descricao")?,
            ativo: row.try_get("ativo")?,
            created_by: row.try_get("created_by")?,
            updated_by: row.try_get("updated_by")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            alternativas: Vec::new(),
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AlternativaCampoFormulario {
    pub id: Uuid,
    pub campo_formulario_id: Uuid,
    pub texto_alternativa: String,
    pub ordem: i32,
    pub ativo: bool,
    pub created_by: Option<Uuid>,
    pub updated_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AlternativaCampoFormulario {
    fn from_row(row: &PgRow) -> StorageResult<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            campo_formulario_id: row.try_get("campo_formulario_id")?,
            texto_alternativa: row.try_get("texto_alternativa")?,
            ordem: row.try_get("ordem")?,
            ativo: row.try_get("ativo")?,
            created_by: row.try_get("created_by")?,
            updated_by: row.try_get("updated_by")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateCampoFormulario {
    pub nome_campo: NomeCampoFormulario,
    pub descricao: Option<String>,
    pub ativo: Option<bool>,
}

impl Validate for CreateCampoFormulario {
    fn validate(&self, errors: &mut FieldErrors) {
        errors.max_len("descricao", self.descricao.as_deref(), 255);
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateCampoFormulario {
    pub nome_campo: Option<NomeCampoFormulario>,
    pub descricao: Option<String>,
    pub ativo: Option<bool>,
}

impl Validate for UpdateCampoFormulario {
    fn validate(&self, errors: &mut FieldErrors) {
        errors.max_len("descricao", self.descricao.as_deref(), 255);
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateAlternativa {
    pub texto_alternativa: String,
    pub ordem: Option<i32>,
    pub ativo: Option<bool>,
}

impl Validate for CreateAlternativa {
    fn validate(&self, errors: &mut FieldErrors) {
        errors.required("texto_alternativa", &self.texto_alternativa);
        errors.max_len("texto_alternativa", Some(&self.texto_alternativa), 255);
        errors.range("ordem", self.ordem.map(i64::from), 0, i64::from(i32::MAX));
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateAlternativa {
    pub texto_alternativa: Option<String>,
    pub ordem: Option<i32>,
    pub ativo: Option<bool>,
}

impl Validate for UpdateAlternativa {
    fn validate(&self, errors: &mut FieldErrors) {
        errors.not_blank("texto_alternativa", self.texto_alternativa.as_deref());
        errors.max_len("texto_alternativa", self.texto_alternativa.as_deref(), 255);
        errors.range("ordem", self.ordem.map(i64::from), 0, i64::from(i32::MAX));
    }
}

/// Filters of the paginated search. `termo` matches name or description.
#[derive(Debug, Clone, Default)]
pub struct CampoFormularioBusca {
    pub termo: Option<String>,
    pub nome_campo: Option<NomeCampoFormulario>,
    pub ativo: Option<bool>,
}

fn nome_conflict(nome: NomeCampoFormulario) -> String {
    format!("Campo {nome} já está cadastrado")
}

pub struct CampoFormularioStorage<'a> {
    pool: &'a PgPool,
}

impl<'a> CampoFormularioStorage<'a> {
    #[must_use]
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `Conflict` when a field with the same name exists.
    pub async fn create(
        &self,
        input: &CreateCampoFormulario,
        usuario_id: Option<Uuid>,
    ) -> StorageResult<CampoFormulario> {
        if self.find_by_nome(input.nome_campo).await?.is_some() {
            return Err(StorageError::conflict(nome_conflict(input.nome_campo)));
        }
        let sql = format!(
            "INSERT INTO campos_formulario (nome_campo, descricao, ativo, created_by, updated_by) \
             VALUES ($1, $2, $3, $4, $4) RETURNING {COLUMNS}"
        );
        let row = query(&sql)
            .bind(input.nome_campo.as_str())
            .bind(&input.descricao)
            .bind(input.ativo.unwrap_or(true))
            .bind(usuario_id)
            .fetch_one(self.pool)
            .await
            .map_err(|e| StorageError::from_constraint(e, || nome_conflict(input.nome_campo)))?;
        CampoFormulario::from_row(&row)
    }

    /// Loads alternatives for every field in `campos`, keeping `ordem` order.
    async fn attach_alternativas(
        &self,
        campos: &mut [CampoFormulario],
        somente_ativas: bool,
    ) -> StorageResult<()> {
        if campos.is_empty() {
            return Ok(());
        }
        let ids: Vec<Uuid> = campos.iter().map(|c| c.id).collect();
        let sql = format!(
            "SELECT {ALT_COLUMNS} FROM alternativas_campo_formulario \
             WHERE campo_formulario_id = ANY($1) AND ($2 = FALSE OR ativo) \
             ORDER BY ordem, texto_alternativa"
        );
        let rows = query(&sql)
            .bind(ids)
            .bind(somente_ativas)
            .fetch_all(self.pool)
            .await?;
        for row in &rows {
            let alternativa = AlternativaCampoFormulario::from_row(row)?;
            if let Some(campo) = campos
                .iter_mut()
                .find(|c| c.id == alternativa.campo_formulario_id)
            {
                campo.alternativas.push(alternativa);
            }
        }
        Ok(())
    }

    async fn with_alternativas(&self, row: Option<PgRow>) -> StorageResult<Option<CampoFormulario>> {
        let Some(row) = row else {
            return Ok(None);
        };
        let mut campos = [CampoFormulario::from_row(&row)?];
        self.attach_alternativas(&mut campos, false).await?;
        let [campo] = campos;
        Ok(Some(campo))
    }

    /// Every field with its alternatives, ordered by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_all(&self) -> StorageResult<Vec<CampoFormulario>> {
        self.list(false).await
    }

    /// Active fields with only their active alternatives.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_ativos(&self) -> StorageResult<Vec<CampoFormulario>> {
        self.list(true).await
    }

    async fn list(&self, somente_ativos: bool) -> StorageResult<Vec<CampoFormulario>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM campos_formulario WHERE ($1 = FALSE OR ativo) ORDER BY nome_campo"
        );
        let rows = query(&sql)
            .bind(somente_ativos)
            .fetch_all(self.pool)
            .await?;
        let mut campos = rows
            .iter()
            .map(CampoFormulario::from_row)
            .collect::<StorageResult<Vec<_>>>()?;
        self.attach_alternativas(&mut campos, somente_ativos).await?;
        Ok(campos)
    }

    /// Paginated search.
    ///
    /// Selects the page of ids first, counts with the same filters, then
    /// loads the full rows for those ids in the original order.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the queries fails.
    pub async fn search(
        &self,
        busca: &CampoFormularioBusca,
        page: Page,
    ) -> StorageResult<(Vec<CampoFormulario>, i64)> {
        let mut ids_qb: QueryBuilder<'_, Postgres> =
            QueryBuilder::new("SELECT id FROM campos_formulario WHERE 1 = 1");
        push_busca(&mut ids_qb, busca);
        ids_qb
            .push(" ORDER BY nome_campo, id LIMIT ")
            .push_bind(page.limit_i64())
            .push(" OFFSET ")
            .push_bind(page.offset());
        let ids: Vec<Uuid> = ids_qb
            .build_query_scalar()
            .fetch_all(self.pool)
            .await?;

        let mut count_qb: QueryBuilder<'_, Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM campos_formulario WHERE 1 = 1");
        push_busca(&mut count_qb, busca);
        let total: i64 = count_qb.build_query_scalar().fetch_one(self.pool).await?;

        if ids.is_empty() {
            return Ok((Vec::new(), total));
        }

        let sql = format!("SELECT {COLUMNS} FROM campos_formulario WHERE id = ANY($1)");
        let rows = query(&sql).bind(&ids).fetch_all(self.pool).await?;
        let mut campos = rows
            .iter()
            .map(CampoFormulario::from_row)
            .collect::<StorageResult<Vec<_>>>()?;
        campos.sort_by_key(|c| ids.iter().position(|id| *id == c.id));
        self.attach_alternativas(&mut campos, false).await?;
        Ok((campos, total))
    }

    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_id(&self, id: Uuid) -> StorageResult<Option<CampoFormulario>> {
        let sql = format!("SELECT {COLUMNS} FROM campos_formulario WHERE id = $1");
        let row = query(&sql).bind(id).fetch_optional(self.pool).await?;
        self.with_alternativas(row).await
    }

    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_nome(
        &self,
        nome: NomeCampoFormulario,
    ) -> StorageResult<Option<CampoFormulario>> {
        let sql = format!("SELECT {COLUMNS} FROM campos_formulario WHERE nome_campo = $1");
        let row = query(&sql)
            .bind(nome.as_str())
            .fetch_optional(self.pool)
            .await?;
        self.with_alternativas(row).await
    }

    /// # Errors
    ///
    /// Returns `Conflict` when renaming onto another field's name.
    pub async fn update(
        &self,
        id: Uuid,
        input: &UpdateCampoFormulario,
        usuario_id: Option<Uuid>,
    ) -> StorageResult<Option<CampoFormulario>> {
        if let Some(nome) = input.nome_campo
            && let Some(existente) = self.find_by_nome(nome).await?
            && existente.id != id
        {
            return Err(StorageError::conflict(nome_conflict(nome)));
        }
        let sql = format!(
            "UPDATE campos_formulario SET \
                nome_campo = COALESCE($2, nome_campo), \
                descricao = COALESCE($3, descricao), \
                ativo = COALESCE($4, ativo), \
                updated_by = COALESCE($5, updated_by), \
                updated_at = now() \
             WHERE id = $1 RETURNING {COLUMNS}"
        );
        let row = query(&sql)
            .bind(id)
            .bind(input.nome_campo.map(|n| n.as_str()))
            .bind(&input.descricao)
            .bind(input.ativo)
            .bind(usuario_id)
            .fetch_optional(self.pool)
            .await
            .map_err(|e| {
                StorageError::from_constraint(e, || {
                    input
                        .nome_campo
                        .map(nome_conflict)
                        .unwrap_or_else(|| "Campo já está cadastrado".to_string())
                })
            })?;
        self.with_alternativas(row).await
    }

    /// # Errors
    ///
    /// Returns an error if the database update fails.
    pub async fn toggle_status(
        &self,
        id: Uuid,
        usuario_id: Option<Uuid>,
    ) -> StorageResult<Option<CampoFormulario>> {
        self.set_ativo_expr(id, "NOT ativo", usuario_id).await
    }

    /// Soft delete.
    ///
    /// # Errors
    ///
    /// Returns an error if the database update fails.
    pub async fn deactivate(
        &self,
        id: Uuid,
        usuario_id: Option<Uuid>,
    ) -> StorageResult<Option<CampoFormulario>> {
        self.set_ativo_expr(id, "FALSE", usuario_id).await
    }

    async fn set_ativo_expr(
        &self,
        id: Uuid,
        expr: &str,
        usuario_id: Option<Uuid>,
    ) -> StorageResult<Option<CampoFormulario>> {
        let sql = format!(
            "UPDATE campos_formulario SET ativo = {expr}, \
                updated_by = COALESCE($2, updated_by), updated_at = now() \
             WHERE id = $1 RETURNING {COLUMNS}"
        );
        let row = query(&sql)
            .bind(id)
            .bind(usuario_id)
            .fetch_optional(self.pool)
            .await?;
        self.with_alternativas(row).await
    }

    // -------------------------------------------------------------------------
    // Alternativas
    // -------------------------------------------------------------------------

    /// Adds an alternative. Without `ordem` it goes after the current last one.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if the field does not exist.
    pub async fn create_alternativa(
        &self,
        campo_id: Uuid,
        input: &CreateAlternativa,
        usuario_id: Option<Uuid>,
    ) -> StorageResult<AlternativaCampoFormulario> {
        let sql = format!(
            "INSERT INTO alternativas_campo_formulario \
                (campo_formulario_id, texto_alternativa, ordem, ativo, created_by, updated_by) \
             VALUES ($1, $2, COALESCE($3, (SELECT COALESCE(MAX(ordem), 0) + 1 \
                FROM alternativas_campo_formulario WHERE campo_formulario_id = $1)), $4, $5, $5) \
             RETURNING {ALT_COLUMNS}"
        );
        let row = query(&sql)
            .bind(campo_id)
            .bind(input.texto_alternativa.trim())
            .bind(input.ordem)
            .bind(input.ativo.unwrap_or(true))
            .bind(usuario_id)
            .fetch_one(self.pool)
            .await
            .map_err(|e| {
                StorageError::from_constraint(e, || {
                    format!("Campo de formulário com ID {campo_id} não encontrado")
                })
            })?;
        AlternativaCampoFormulario::from_row(&row)
    }

    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_alternativas(
        &self,
        campo_id: Uuid,
        somente_ativas: bool,
    ) -> StorageResult<Vec<AlternativaCampoFormulario>> {
        let sql = format!(
            "SELECT {ALT_COLUMNS} FROM alternativas_campo_formulario \
             WHERE campo_formulario_id = $1 AND ($2 = FALSE OR ativo) \
             ORDER BY ordem, texto_alternativa"
        );
        let rows = query(&sql)
            .bind(campo_id)
            .bind(somente_ativas)
            .fetch_all(self.pool)
            .await?;
        rows.iter().map(AlternativaCampoFormulario::from_row).collect()
    }

    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_alternativa(
        &self,
        campo_id: Uuid,
        id: Uuid,
    ) -> StorageResult<Option<AlternativaCampoFormulario>> {
        let sql = format!(
            "SELECT {ALT_COLUMNS} FROM alternativas_campo_formulario \
             WHERE campo_formulario_id = $1 AND id = $2"
        );
        let row = query(&sql)
            .bind(campo_id)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        row.as_ref().map(AlternativaCampoFormulario::from_row).transpose()
    }

    /// Case-sensitive lookup by text, used by the incremental seed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_alternativa_by_texto(
        &self,
        campo_id: Uuid,
        texto: &str,
    ) -> StorageResult<Option<AlternativaCampoFormulario>> {
        let sql = format!(
            "SELECT {ALT_COLUMNS} FROM alternativas_campo_formulario \
             WHERE campo_formulario_id = $1 AND texto_alternativa = $2 LIMIT 1"
        );
        let row = query(&sql)
            .bind(campo_id)
            .bind(texto)
            .fetch_optional(self.pool)
            .await?;
        row.as_ref().map(AlternativaCampoFormulario::from_row).transpose()
    }

    /// # Errors
    ///
    /// Returns an error if the database update fails.
    pub async fn update_alternativa(
        &self,
        campo_id: Uuid,
        id: Uuid,
        input: &UpdateAlternativa,
        usuario_id: Option<Uuid>,
    ) -> StorageResult<Option<AlternativaCampoFormulario>> {
        let sql = format!(
            "UPDATE alternativas_campo_formulario SET \
                texto_alternativa = COALESCE($3, texto_alternativa), \
                ordem = COALESCE($4, ordem), \
                ativo = COALESCE($5, ativo), \
                updated_by = COALESCE($6, updated_by), \
                updated_at = now() \
             WHERE campo_formulario_id = $1 AND id = $2 RETURNING {ALT_COLUMNS}"
        );
        let row = query(&sql)
            .bind(campo_id)
            .bind(id)
            .bind(input.texto_alternativa.as_deref().map(str::trim))
            .bind(input.ordem)
            .bind(input.ativo)
            .bind(usuario_id)
            .fetch_optional(self.pool)
            .await?;
        row.as_ref().map(AlternativaCampoFormulario::from_row).transpose()
    }

    /// # Errors
    ///
    /// Returns an error if the database update fails.
    pub async fn toggle_alternativa(
        &self,
        campo_id: Uuid,
        id: Uuid,
        usuario_id: Option<Uuid>,
    ) -> StorageResult<Option<AlternativaCampoFormulario>> {
        let sql = format!(
            "UPDATE alternativas_campo_formulario SET ativo = NOT ativo, \
                updated_by = COALESCE($3, updated_by), updated_at = now() \
             WHERE campo_formulario_id = $1 AND id = $2 RETURNING {ALT_COLUMNS}"
        );
        let row = query(&sql)
            .bind(campo_id)
            .bind(id)
            .bind(usuario_id)
            .fetch_optional(self.pool)
            .await?;
        row.as_ref().map(AlternativaCampoFormulario::from_row).transpose()
    }

    /// Hard delete.
    ///
    /// # Errors
    ///
    /// Returns an error if the database delete fails.
    pub async fn delete_alternativa(&self, campo_id: Uuid, id: Uuid) -> StorageResult<bool> {
        let result = query(
            "DELETE FROM alternativas_campo_formulario WHERE campo_formulario_id = $1 AND id = $2",
        )
        .bind(campo_id)
        .bind(id)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

fn push_busca(qb: &mut QueryBuilder<'_, Postgres>, busca: &CampoFormularioBusca) {
    if let Some(termo) = busca.termo.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        let pattern = crate::row::contains_pattern(&termo.to_lowercase());
        qb.push(" AND (LOWER(COALESCE(descricao, '')) LIKE ")
            .push_bind(pattern.clone())
            .push(" OR LOWER(nome_campo) LIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(nome) = busca.nome_campo {
        qb.push(" AND nome_campo = ").push_bind(nome.as_str());
    }
    if let Some(ativo) = busca.ativo {
        qb.push(" AND ativo = ").push_bind(ativo);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nome_campo_uses_screaming_snake_case() {
        let json = serde_json::to_string(&NomeCampoFormulario::TipoRecipiente).unwrap();
        assert_eq!(json, "\"TIPO_RECIPIENTE\"");
        assert_eq!(
            "VOLUME_MINIMO".parse::<NomeCampoFormulario>().unwrap(),
            NomeCampoFormulario::VolumeMinimo
        );
        assert!("volume_minimo".parse::<NomeCampoFormulario>().is_err());
        assert_eq!(NomeCampoFormulario::ALL.len(), 19);
    }

    #[test]
    fn conflict_message_names_the_field() {
        assert_eq!(
            nome_conflict(NomeCampoFormulario::Amostra),
            "Campo AMOSTRA já está cadastrado"
        );
    }

    #[test]
    fn alternativa_requires_text() {
        let input = CreateAlternativa {
            texto_alternativa: "  ".into(),
            ordem: Some(-1),
            ativo: None,
        };
        let mut errors = FieldErrors::new();
        input.validate(&mut errors);
        assert_eq!(
            errors.as_slice(),
            [
                "texto_alternativa: não pode estar vazio",
                "ordem: deve estar entre 0 e 2147483647",
            ]
        );
    }
}

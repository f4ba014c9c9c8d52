//! Pricing tables and their per-exam items.
//!
//! An exam appears at most once per table. Removing a table removes its
//! items through the `ON DELETE CASCADE` foreign key.

use chrono::{DateTime, Utc};
use erplab_api::{FieldErrors, Page, Validate};
use serde::{Deserialize, Serialize};
use sqlx_core::query::query;
use sqlx_core::query_builder::QueryBuilder;
use sqlx_core::query_scalar::query_scalar;
use sqlx_core::row::Row;
use sqlx_postgres::{PgConnection, PgPool, PgRow, Postgres};
use uuid::Uuid;

use crate::error::{StorageError, StorageResult};
use crate::row::{contains_pattern, enum_col};

text_enum! {
    pub enum TipoTabela {
        Servico => "servico",
        Material => "material",
        Medicamento => "medicamento",
        Taxa => "taxa",
        Tuss => "tuss",
        Cbhpm => "cbhpm",
        Amb => "amb",
        Brasindice => "brasindice",
        Simpro => "simpro",
        Propria => "propria",
    }
}

const COLUMNS: &str =
    "id, codigo_interno, nome, tipo_tabela, observacoes, ativo, empresa_id, created_at, updated_at";

const ITEM_COLUMNS: &str = "id, tabela_preco_id, exame_id, codigo_convenio, \
    valor::float8 AS valor, moeda, quantidade_filme::float8 AS quantidade_filme, filme_separado, \
    porte::float8 AS porte, custo_operacional::float8 AS custo_operacional, ativo, \
    created_at, updated_at";

const EXAME_DUPLICADO: &str = "Este exame já está cadastrado nesta tabela de preços";

#[derive(Debug, Clone, Serialize)]
pub struct TabelaPreco {
    pub id: Uuid,
    pub codigo_interno: String,
    pub nome: String,
    pub tipo_tabela: TipoTabela,
    pub observacoes: Option<String>,
    pub ativo: bool,
    pub empresa_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub itens: Vec<TabelaPrecoItem>,
}

impl TabelaPreco {
    fn from_row(row: &PgRow) -> StorageResult<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            codigo_interno: row.try_get("codigo_interno")?,
            nome: row.try_get("nome")?,
            tipo_tabela: enum_col(row, "tipo_tabela")?,
            observacoes: row.try_get("observacoes")?,
            ativo: row.try_get("ativo")?,
            empresa_id: row.try_get("empresa_id")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            itens: Vec::new(),
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TabelaPrecoItem {
    pub id: Uuid,
    pub tabela_preco_id: Uuid,
    pub exame_id: Uuid,
    pub codigo_convenio: Option<String>,
    pub valor: f64,
    pub moeda: String,
    pub quantidade_filme: f64,
    pub filme_separado: bool,
    pub porte: f64,
    pub custo_operacional: Option<f64>,
    pub ativo: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TabelaPrecoItem {
    fn from_row(row: &PgRow) -> StorageResult<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            tabela_preco_id: row.try_get("tabela_preco_id")?,
            exame_id: row.try_get("exame_id")?,
            codigo_convenio: row.try_get("codigo_convenio")?,
            valor: row.try_get("valor")?,
            moeda: row.try_get("moeda")?,
            quantidade_filme: row.try_get("quantidade_filme")?,
            filme_separado: row.try_get("filme_separado")?,
            porte: row.try_get("porte")?,
            custo_operacional: row.try_get("custo_operacional")?,
            ativo: row.try_get("ativo")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateTabelaPrecoItem {
    pub exame_id: Uuid,
    pub valor: f64,
    pub codigo_convenio: Option<String>,
    pub moeda: Option<String>,
    pub quantidade_filme: Option<f64>,
    pub filme_separado: Option<bool>,
    pub porte: Option<f64>,
    pub custo_operacional: Option<f64>,
    pub ativo: Option<bool>,
}

impl Validate for CreateTabelaPrecoItem {
    fn validate(&self, errors: &mut FieldErrors) {
        errors.numeric("valor", Some(self.valor), 10, 2);
        validate_item_optionals(
            errors,
            self.codigo_convenio.as_deref(),
            self.moeda.as_deref(),
            self.quantidade_filme,
            self.porte,
            self.custo_operacional,
        );
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateTabelaPrecoItem {
    pub exame_id: Option<Uuid>,
    pub valor: Option<f64>,
    pub codigo_convenio: Option<String>,
    pub moeda: Option<String>,
    pub quantidade_filme: Option<f64>,
    pub filme_separado: Option<bool>,
    pub porte: Option<f64>,
    pub custo_operacional: Option<f64>,
    pub ativo: Option<bool>,
}

impl Validate for UpdateTabelaPrecoItem {
    fn validate(&self, errors: &mut FieldErrors) {
        errors.numeric("valor", self.valor, 10, 2);
        validate_item_optionals(
            errors,
            self.codigo_convenio.as_deref(),
            self.moeda.as_deref(),
            self.quantidade_filme,
            self.porte,
            self.custo_operacional,
        );
    }
}

fn validate_item_optionals(
    errors: &mut FieldErrors,
    codigo_convenio: Option<&str>,
    moeda: Option<&str>,
    quantidade_filme: Option<f64>,
    porte: Option<f64>,
    custo_operacional: Option<f64>,
) {
    errors.max_len("codigo_convenio", codigo_convenio, 50);
    errors.max_len("moeda", moeda, 10);
    errors.numeric("quantidade_filme", quantidade_filme, 10, 4);
    errors.numeric("porte", porte, 10, 4);
    errors.numeric("custo_operacional", custo_operacional, 10, 2);
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateTabelaPreco {
    pub codigo_interno: String,
    pub nome: String,
    pub tipo_tabela: TipoTabela,
    pub observacoes: Option<String>,
    pub ativo: Option<bool>,
    pub empresa_id: Option<Uuid>,
    #[serde(default)]
    pub itens: Vec<CreateTabelaPrecoItem>,
}

impl Validate for CreateTabelaPreco {
    fn validate(&self, errors: &mut FieldErrors) {
        errors.required("codigo_interno", &self.codigo_interno);
        errors.max_len("codigo_interno", Some(&self.codigo_interno), 50);
        errors.required("nome", &self.nome);
        errors.max_len("nome", Some(&self.nome), 255);
        for (i, item) in self.itens.iter().enumerate() {
            let mut item_errors = FieldErrors::new();
            item.validate(&mut item_errors);
            for erro in item_errors.as_slice() {
                errors.push_raw(format!("itens[{i}].{erro}"));
            }
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateTabelaPreco {
    pub codigo_interno: Option<String>,
    pub nome: Option<String>,
    pub tipo_tabela: Option<TipoTabela>,
    pub observacoes: Option<String>,
    pub ativo: Option<bool>,
    pub empresa_id: Option<Uuid>,
}

impl Validate for UpdateTabelaPreco {
    fn validate(&self, errors: &mut FieldErrors) {
        errors.not_blank("codigo_interno", self.codigo_interno.as_deref());
        errors.max_len("codigo_interno", self.codigo_interno.as_deref(), 50);
        errors.not_blank("nome", self.nome.as_deref());
        errors.max_len("nome", self.nome.as_deref(), 255);
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TabelaPrecoFiltros {
    pub ativo: Option<bool>,
    pub tipo_tabela: Option<TipoTabela>,
    pub search: Option<String>,
}

fn codigo_conflict(codigo: &str) -> String {
    format!("Já existe uma tabela de preços com o código {codigo}")
}

async fn insert_item(
    conn: &mut PgConnection,
    tabela_id: Uuid,
    item: &CreateTabelaPrecoItem,
) -> StorageResult<TabelaPrecoItem> {
    let sql = format!(
        "INSERT INTO tabelas_preco_itens (tabela_preco_id, exame_id, codigo_convenio, valor, \
            moeda, quantidade_filme, filme_separado, porte, custo_operacional, ativo) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING {ITEM_COLUMNS}"
    );
    let row = query(&sql)
        .bind(tabela_id)
        .bind(item.exame_id)
        .bind(&item.codigo_convenio)
        .bind(item.valor)
        .bind(item.moeda.as_deref().unwrap_or("BRL"))
        .bind(item.quantidade_filme.unwrap_or(0.0))
        .bind(item.filme_separado.unwrap_or(false))
        .bind(item.porte.unwrap_or(0.0))
        .bind(item.custo_operacional)
        .bind(item.ativo.unwrap_or(true))
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| StorageError::from_constraint(e, || EXAME_DUPLICADO.to_string()))?;
    TabelaPrecoItem::from_row(&row)
}

pub struct TabelaPrecoStorage<'a> {
    pool: &'a PgPool,
}

impl<'a> TabelaPrecoStorage<'a> {
    #[must_use]
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Creates the table and its items atomically.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` when the code is taken or an exam repeats in `itens`.
    pub async fn create(&self, input: &CreateTabelaPreco) -> StorageResult<TabelaPreco> {
        let codigo = input.codigo_interno.trim();
        if self.find_by_codigo(codigo).await?.is_some() {
            return Err(StorageError::conflict(codigo_conflict(codigo)));
        }

        let mut tx = self.pool.begin().await?;
        let sql = format!(
            "INSERT INTO tabelas_preco (codigo_interno, nome, tipo_tabela, observacoes, ativo, empresa_id) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {COLUMNS}"
        );
        let row = query(&sql)
            .bind(codigo)
            .bind(input.nome.trim())
            .bind(input.tipo_tabela.as_str())
            .bind(&input.observacoes)
            .bind(input.ativo.unwrap_or(true))
            .bind(input.empresa_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| StorageError::from_constraint(e, || codigo_conflict(codigo)))?;
        let mut tabela = TabelaPreco::from_row(&row)?;

        for item in &input.itens {
            tabela.itens.push(insert_item(&mut tx, tabela.id, item).await?);
        }
        tx.commit().await?;

        Ok(tabela)
    }

    async fn attach_itens(&self, tabelas: &mut [TabelaPreco]) -> StorageResult<()> {
        if tabelas.is_empty() {
            return Ok(());
        }
        let ids: Vec<Uuid> = tabelas.iter().map(|t| t.id).collect();
        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM tabelas_preco_itens \
             WHERE tabela_preco_id = ANY($1) ORDER BY created_at, id"
        );
        let rows = query(&sql).bind(ids).fetch_all(self.pool).await?;
        for row in &rows {
            let item = TabelaPrecoItem::from_row(row)?;
            if let Some(tabela) = tabelas.iter_mut().find(|t| t.id == item.tabela_preco_id) {
                tabela.itens.push(item);
            }
        }
        Ok(())
    }

    /// Lists tables ordered by name, each with its items.
    ///
    /// With `page` the result is limited to that page; the total always
    /// reflects every row matching the filters.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_all(
        &self,
        filtros: &TabelaPrecoFiltros,
        page: Option<Page>,
    ) -> StorageResult<(Vec<TabelaPreco>, i64)> {
        let mut count_qb: QueryBuilder<'_, Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM tabelas_preco WHERE 1 = 1");
        push_filtros(&mut count_qb, filtros);
        let total: i64 = count_qb.build_query_scalar().fetch_one(self.pool).await?;

        let mut qb: QueryBuilder<'_, Postgres> =
            QueryBuilder::new(format!("SELECT {COLUMNS} FROM tabelas_preco WHERE 1 = 1"));
        push_filtros(&mut qb, filtros);
        qb.push(" ORDER BY nome, id");
        if let Some(page) = page {
            qb.push(" LIMIT ")
                .push_bind(page.limit_i64())
                .push(" OFFSET ")
                .push_bind(page.offset());
        }
        let rows = qb.build().fetch_all(self.pool).await?;
        let mut tabelas = rows
            .iter()
            .map(TabelaPreco::from_row)
            .collect::<StorageResult<Vec<_>>>()?;
        self.attach_itens(&mut tabelas).await?;
        Ok((tabelas, total))
    }

    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_id(&self, id: Uuid) -> StorageResult<Option<TabelaPreco>> {
        let sql = format!("SELECT {COLUMNS} FROM tabelas_preco WHERE id = $1");
        let row = query(&sql).bind(id).fetch_optional(self.pool).await?;
        self.with_itens(row).await
    }

    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_codigo(&self, codigo: &str) -> StorageResult<Option<TabelaPreco>> {
        let sql = format!("SELECT {COLUMNS} FROM tabelas_preco WHERE codigo_interno = $1");
        let row = query(&sql).bind(codigo).fetch_optional(self.pool).await?;
        self.with_itens(row).await
    }

    async fn with_itens(&self, row: Option<PgRow>) -> StorageResult<Option<TabelaPreco>> {
        let Some(row) = row else {
            return Ok(None);
        };
        let mut tabelas = [TabelaPreco::from_row(&row)?];
        self.attach_itens(&mut tabelas).await?;
        let [tabela] = tabelas;
        Ok(Some(tabela))
    }

    /// # Errors
    ///
    /// Returns `Conflict` when the new code belongs to another table.
    pub async fn update(
        &self,
        id: Uuid,
        input: &UpdateTabelaPreco,
    ) -> StorageResult<Option<TabelaPreco>> {
        let codigo = input.codigo_interno.as_deref().map(str::trim);
        if let Some(codigo) = codigo
            && let Some(existente) = self.find_by_codigo(codigo).await?
            && existente.id != id
        {
            return Err(StorageError::conflict(codigo_conflict(codigo)));
        }
        let sql = format!(
            "UPDATE tabelas_preco SET \
                codigo_interno = COALESCE($2, codigo_interno), \
                nome = COALESCE($3, nome), \
                tipo_tabela = COALESCE($4, tipo_tabela), \
                observacoes = COALESCE($5, observacoes), \
                ativo = COALESCE($6, ativo), \
                empresa_id = COALESCE($7, empresa_id), \
                updated_at = now() \
             WHERE id = $1 RETURNING {COLUMNS}"
        );
        let row = query(&sql)
            .bind(id)
            .bind(codigo)
            .bind(input.nome.as_deref().map(str::trim))
            .bind(input.tipo_tabela.map(|t| t.as_str()))
            .bind(&input.observacoes)
            .bind(input.ativo)
            .bind(input.empresa_id)
            .fetch_optional(self.pool)
            .await
            .map_err(|e| StorageError::from_constraint(e, || codigo_conflict(codigo.unwrap_or(""))))?;
        self.with_itens(row).await
    }

    /// # Errors
    ///
    /// Returns an error if the database update fails.
    pub async fn toggle_status(&self, id: Uuid) -> StorageResult<Option<TabelaPreco>> {
        let sql = format!(
            "UPDATE tabelas_preco SET ativo = NOT ativo, updated_at = now() \
             WHERE id = $1 RETURNING {COLUMNS}"
        );
        let row = query(&sql).bind(id).fetch_optional(self.pool).await?;
        self.with_itens(row).await
    }

    /// Hard delete, items included. Returns `false` when the table does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database delete fails.
    pub async fn delete(&self, id: Uuid) -> StorageResult<bool> {
        let result = query("DELETE FROM tabelas_preco WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // -------------------------------------------------------------------------
    // Itens
    // -------------------------------------------------------------------------

    /// # Errors
    ///
    /// Returns `Conflict` when the exam is already priced in this table.
    pub async fn create_item(
        &self,
        tabela_id: Uuid,
        input: &CreateTabelaPrecoItem,
    ) -> StorageResult<TabelaPrecoItem> {
        if self.find_item_by_exame(tabela_id, input.exame_id, false).await?.is_some() {
            return Err(StorageError::conflict(EXAME_DUPLICADO));
        }
        let mut conn = self.pool.acquire().await?;
        insert_item(&mut conn, tabela_id, input).await
    }

    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_itens(&self, tabela_id: Uuid) -> StorageResult<Vec<TabelaPrecoItem>> {
        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM tabelas_preco_itens \
             WHERE tabela_preco_id = $1 ORDER BY created_at, id"
        );
        let rows = query(&sql).bind(tabela_id).fetch_all(self.pool).await?;
        rows.iter().map(TabelaPrecoItem::from_row).collect()
    }

    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_item(
        &self,
        tabela_id: Uuid,
        item_id: Uuid,
    ) -> StorageResult<Option<TabelaPrecoItem>> {
        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM tabelas_preco_itens \
             WHERE tabela_preco_id = $1 AND id = $2"
        );
        let row = query(&sql)
            .bind(tabela_id)
            .bind(item_id)
            .fetch_optional(self.pool)
            .await?;
        row.as_ref().map(TabelaPrecoItem::from_row).transpose()
    }

    /// The item pricing `exame_id` in this table. With `somente_ativo` inactive items are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_item_by_exame(
        &self,
        tabela_id: Uuid,
        exame_id: Uuid,
        somente_ativo: bool,
    ) -> StorageResult<Option<TabelaPrecoItem>> {
        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM tabelas_preco_itens \
             WHERE tabela_preco_id = $1 AND exame_id = $2 AND ($3 = FALSE OR ativo)"
        );
        let row = query(&sql)
            .bind(tabela_id)
            .bind(exame_id)
            .bind(somente_ativo)
            .fetch_optional(self.pool)
            .await?;
        row.as_ref().map(TabelaPrecoItem::from_row).transpose()
    }

    /// # Errors
    ///
    /// Returns `Conflict` when moving the item onto an exam already priced here.
    pub async fn update_item(
        &self,
        tabela_id: Uuid,
        item_id: Uuid,
        input: &UpdateTabelaPrecoItem,
    ) -> StorageResult<Option<TabelaPrecoItem>> {
        if let Some(exame_id) = input.exame_id
            && let Some(existente) = self.find_item_by_exame(tabela_id, exame_id, false).await?
            && existente.id != item_id
        {
            return Err(StorageError::conflict(EXAME_DUPLICADO));
        }
        let sql = format!(
            "UPDATE tabelas_preco_itens SET \
                exame_id = COALESCE($3, exame_id), \
                valor = COALESCE($4, valor), \
                codigo_convenio = COALESCE($5, codigo_convenio), \
                moeda = COALESCE($6, moeda), \
                quantidade_filme = COALESCE($7, quantidade_filme), \
                filme_separado = COALESCE($8, filme_separado), \
                porte = COALESCE($9, porte), \
                custo_operacional = COALESCE($10, custo_operacional), \
                ativo = COALESCE($11, ativo), \
                updated_at = now() \
             WHERE tabela_preco_id = $1 AND id = $2 RETURNING {ITEM_COLUMNS}"
        );
        let row = query(&sql)
            .bind(tabela_id)
            .bind(item_id)
            .bind(input.exame_id)
            .bind(input.valor)
            .bind(&input.codigo_convenio)
            .bind(&input.moeda)
            .bind(input.quantidade_filme)
            .bind(input.filme_separado)
            .bind(input.porte)
            .bind(input.custo_operacional)
            .bind(input.ativo)
            .fetch_optional(self.pool)
            .await
            .map_err(|e| StorageError::from_constraint(e, || EXAME_DUPLICADO.to_string()))?;
        row.as_ref().map(TabelaPrecoItem::from_row).transpose()
    }

    /// # Errors
    ///
    /// Returns an error if the database update fails.
    pub async fn toggle_item(
        &self,
        tabela_id: Uuid,
        item_id: Uuid,
    ) -> StorageResult<Option<TabelaPrecoItem>> {
        let sql = format!(
            "UPDATE tabelas_preco_itens SET ativo = NOT ativo, updated_at = now() \
             WHERE tabela_preco_id = $1 AND id = $2 RETURNING {ITEM_COLUMNS}"
        );
        let row = query(&sql)
            .bind(tabela_id)
            .bind(item_id)
            .fetch_optional(self.pool)
            .await?;
        row.as_ref().map(TabelaPrecoItem::from_row).transpose()
    }

    /// # Errors
    ///
    /// Returns an error if the database delete fails.
    pub async fn delete_item(&self, tabela_id: Uuid, item_id: Uuid) -> StorageResult<bool> {
        let result = query("DELETE FROM tabelas_preco_itens WHERE tabela_preco_id = $1 AND id = $2")
            .bind(tabela_id)
            .bind(item_id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn count_itens(&self, tabela_id: Uuid) -> StorageResult<i64> {
        Ok(
            query_scalar("SELECT COUNT(*) FROM tabelas_preco_itens WHERE tabela_preco_id = $1")
                .bind(tabela_id)
                .fetch_one(self.pool)
                .await?,
        )
    }
}

fn push_filtros(qb: &mut QueryBuilder<'_, Postgres>, filtros: &TabelaPrecoFiltros) {
    if let Some(ativo) = filtros.ativo {
        qb.push(" AND ativo = ").push_bind(ativo);
    }
    if let Some(tipo) = filtros.tipo_tabela {
        qb.push(" AND tipo_tabela = ").push_bind(tipo.as_str());
    }
    if let Some(search) = filtros.search.as_deref().filter(|s| !s.trim().is_empty()) {
        let pattern = contains_pattern(search);
        qb.push(" AND (nome ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR codigo_interno ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_errors_are_indexed() {
        let input: CreateTabelaPreco = serde_json::from_value(serde_json::json!({
            "codigo_interno": "AMB92",
            "nome": "AMB 92",
            "tipo_tabela": "amb",
            "itens": [
                {"exame_id": "7f1a3c1e-4b5d-4a2b-9c1d-2e3f4a5b6c7d", "valor": 10.0},
                {"exame_id": "8f1a3c1e-4b5d-4a2b-9c1d-2e3f4a5b6c7d", "valor": -1.0, "porte": -2.0}
            ]
        }))
        .unwrap();
        let mut errors = FieldErrors::new();
        input.validate(&mut errors);
        assert_eq!(
            errors.as_slice(),
            [
                "itens[1].valor: não pode ser negativo",
                "itens[1].porte: não pode ser negativo",
            ]
        );
    }

    #[test]
    fn itens_default_to_empty() {
        let input: CreateTabelaPreco = serde_json::from_value(serde_json::json!({
            "codigo_interno": "PROPRIA",
            "nome": "Tabela própria",
            "tipo_tabela": "propria"
        }))
        .unwrap();
        assert!(input.itens.is_empty());
        assert!(erplab_api::validate(&input).is_ok());
    }

    #[test]
    fn unknown_tipo_tabela_is_rejected() {
        let result: Result<CreateTabelaPreco, _> = serde_json::from_value(serde_json::json!({
            "codigo_interno": "X",
            "nome": "X",
            "tipo_tabela": "inexistente"
        }));
        assert!(result.unwrap_err().to_string().contains("unknown variant"));
    }
}

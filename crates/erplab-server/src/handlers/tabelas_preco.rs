use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch},
};
use erplab_api::{ApiError, ApiQuery, MetaPage, PageMeta, PageParams, ValidJson, parse_uuid};
use erplab_db_postgres::{
    CreateTabelaPreco, CreateTabelaPrecoItem, TabelaPreco, TabelaPrecoFiltros, TabelaPrecoItem,
    TabelaPrecoStorage, TipoTabela, UpdateTabelaPreco, UpdateTabelaPrecoItem,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use super::{ApiResult, found};
use crate::server::AppState;

fn tabela_nao_encontrada(id: Uuid) -> String {
    format!("Tabela de preços com ID {id} não encontrada")
}

fn item_nao_encontrado(item_id: Uuid, tabela_id: Uuid) -> String {
    format!("Item com ID {item_id} não encontrado na tabela {tabela_id}")
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    ativo: Option<bool>,
    tipo_tabela: Option<TipoTabela>,
    search: Option<String>,
    page: Option<u32>,
    limit: Option<u32>,
}

/// A plain array, or `{data, meta}` when the caller asked for a page.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum TabelaListResponse {
    Lista(Vec<TabelaPreco>),
    Pagina(MetaPage<TabelaPreco>),
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/ativos", get(list_ativos))
        .route("/tipo/{tipo}", get(list_by_tipo))
        .route("/codigo/{codigo}", get(find_by_codigo))
        .route("/{id}", get(find_one).patch(update).delete(remove))
        .route("/{id}/toggle-status", patch(toggle_status))
        .route("/{id}/itens", get(list_itens).post(create_item))
        .route(
            "/{id}/itens/{item_id}",
            get(find_item).patch(update_item).delete(remove_item),
        )
        .route("/{id}/itens/{item_id}/toggle-status", patch(toggle_item))
        .route("/{id}/exame/{exame_id}/preco", get(preco_exame))
        .route("/{id}/count-itens", get(count_itens))
}

async fn create(
    State(state): State<AppState>,
    ValidJson(input): ValidJson<CreateTabelaPreco>,
) -> ApiResult<(StatusCode, Json<TabelaPreco>)> {
    let tabela = TabelaPrecoStorage::new(&state.pool).create(&input).await?;
    tracing::info!(tabela_id = %tabela.id, itens = tabela.itens.len(), "Price table created");
    Ok((StatusCode::CREATED, Json(tabela)))
}

async fn list(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> ApiResult<Json<TabelaListResponse>> {
    let params = PageParams {
        page: query.page,
        limit: query.limit,
    };
    let has_search = query.search.as_deref().is_some_and(|s| !s.trim().is_empty());
    let filtros = TabelaPrecoFiltros {
        ativo: query.ativo,
        tipo_tabela: query.tipo_tabela,
        search: query.search,
    };
    let storage = TabelaPrecoStorage::new(&state.pool);

    if !has_search && params.is_explicit() {
        let page = state.page(params);
        let (data, total) = storage.find_all(&filtros, Some(page)).await?;
        return Ok(Json(TabelaListResponse::Pagina(MetaPage {
            data,
            meta: PageMeta::new(total, page),
        })));
    }

    let (data, _) = storage.find_all(&filtros, None).await?;
    Ok(Json(TabelaListResponse::Lista(data)))
}

async fn list_ativos(State(state): State<AppState>) -> ApiResult<Json<Vec<TabelaPreco>>> {
    let filtros = TabelaPrecoFiltros {
        ativo: Some(true),
        ..TabelaPrecoFiltros::default()
    };
    let (data, _) = TabelaPrecoStorage::new(&state.pool)
        .find_all(&filtros, None)
        .await?;
    Ok(Json(data))
}

async fn list_by_tipo(
    State(state): State<AppState>,
    Path(tipo): Path<String>,
) -> ApiResult<Json<Vec<TabelaPreco>>> {
    let filtros = TabelaPrecoFiltros {
        tipo_tabela: Some(tipo.parse::<TipoTabela>()?),
        ..TabelaPrecoFiltros::default()
    };
    let (data, _) = TabelaPrecoStorage::new(&state.pool)
        .find_all(&filtros, None)
        .await?;
    Ok(Json(data))
}

async fn find_by_codigo(
    State(state): State<AppState>,
    Path(codigo): Path<String>,
) -> ApiResult<Json<TabelaPreco>> {
    let tabela = TabelaPrecoStorage::new(&state.pool)
        .find_by_codigo(&codigo)
        .await?;
    found(tabela, || {
        format!("Tabela de preços com código {codigo} não encontrada")
    })
    .map(Json)
}

async fn find_one(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<TabelaPreco>> {
    let id = parse_uuid(&id)?;
    let tabela = TabelaPrecoStorage::new(&state.pool).find_by_id(id).await?;
    found(tabela, || tabela_nao_encontrada(id)).map(Json)
}

async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ValidJson(input): ValidJson<UpdateTabelaPreco>,
) -> ApiResult<Json<TabelaPreco>> {
    let id = parse_uuid(&id)?;
    let tabela = TabelaPrecoStorage::new(&state.pool).update(id, &input).await?;
    found(tabela, || tabela_nao_encontrada(id)).map(Json)
}

async fn toggle_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<TabelaPreco>> {
    let id = parse_uuid(&id)?;
    let tabela = TabelaPrecoStorage::new(&state.pool).toggle_status(id).await?;
    found(tabela, || tabela_nao_encontrada(id)).map(Json)
}

/// Hard delete; items go with the table.
async fn remove(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<StatusCode> {
    let id = parse_uuid(&id)?;
    if !TabelaPrecoStorage::new(&state.pool).delete(id).await? {
        return Err(ApiError::not_found(tabela_nao_encontrada(id)));
    }
    Ok(StatusCode::NO_CONTENT)
}

// -----------------------------------------------------------------------------
// Itens
// -----------------------------------------------------------------------------

async fn tabela_existente(storage: &TabelaPrecoStorage<'_>, raw: &str) -> ApiResult<Uuid> {
    let id = parse_uuid(raw)?;
    found(storage.find_by_id(id).await?, || tabela_nao_encontrada(id))?;
    Ok(id)
}

async fn create_item(
    State(state): State<AppState>,
    Path(tabela_id): Path<String>,
    ValidJson(input): ValidJson<CreateTabelaPrecoItem>,
) -> ApiResult<(StatusCode, Json<TabelaPrecoItem>)> {
    let storage = TabelaPrecoStorage::new(&state.pool);
    let tabela_id = tabela_existente(&storage, &tabela_id).await?;
    let item = storage.create_item(tabela_id, &input).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

async fn list_itens(
    State(state): State<AppState>,
    Path(tabela_id): Path<String>,
) -> ApiResult<Json<Vec<TabelaPrecoItem>>> {
    let storage = TabelaPrecoStorage::new(&state.pool);
    let tabela_id = tabela_existente(&storage, &tabela_id).await?;
    Ok(Json(storage.list_itens(tabela_id).await?))
}

async fn find_item(
    State(state): State<AppState>,
    Path((tabela_id, item_id)): Path<(String, String)>,
) -> ApiResult<Json<TabelaPrecoItem>> {
    let (tabela_id, item_id) = (parse_uuid(&tabela_id)?, parse_uuid(&item_id)?);
    let item = TabelaPrecoStorage::new(&state.pool)
        .find_item(tabela_id, item_id)
        .await?;
    found(item, || item_nao_encontrado(item_id, tabela_id)).map(Json)
}

async fn update_item(
    State(state): State<AppState>,
    Path((tabela_id, item_id)): Path<(String, String)>,
    ValidJson(input): ValidJson<UpdateTabelaPrecoItem>,
) -> ApiResult<Json<TabelaPrecoItem>> {
    let (tabela_id, item_id) = (parse_uuid(&tabela_id)?, parse_uuid(&item_id)?);
    let item = TabelaPrecoStorage::new(&state.pool)
        .update_item(tabela_id, item_id, &input)
        .await?;
    found(item, || item_nao_encontrado(item_id, tabela_id)).map(Json)
}

async fn toggle_item(
    State(state): State<AppState>,
    Path((tabela_id, item_id)): Path<(String, String)>,
) -> ApiResult<Json<TabelaPrecoItem>> {
    let (tabela_id, item_id) = (parse_uuid(&tabela_id)?, parse_uuid(&item_id)?);
    let item = TabelaPrecoStorage::new(&state.pool)
        .toggle_item(tabela_id, item_id)
        .await?;
    found(item, || item_nao_encontrado(item_id, tabela_id)).map(Json)
}

async fn remove_item(
    State(state): State<AppState>,
    Path((tabela_id, item_id)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    let (tabela_id, item_id) = (parse_uuid(&tabela_id)?, parse_uuid(&item_id)?);
    if !TabelaPrecoStorage::new(&state.pool)
        .delete_item(tabela_id, item_id)
        .await?
    {
        return Err(ApiError::not_found(item_nao_encontrado(item_id, tabela_id)));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// The active item for the exam, or `null`.
async fn preco_exame(
    State(state): State<AppState>,
    Path((tabela_id, exame_id)): Path<(String, String)>,
) -> ApiResult<Json<Option<TabelaPrecoItem>>> {
    let (tabela_id, exame_id) = (parse_uuid(&tabela_id)?, parse_uuid(&exame_id)?);
    let item = TabelaPrecoStorage::new(&state.pool)
        .find_item_by_exame(tabela_id, exame_id, true)
        .await?;
    Ok(Json(item))
}

async fn count_itens(
    State(state): State<AppState>,
    Path(tabela_id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let tabela_id = parse_uuid(&tabela_id)?;
    let count = TabelaPrecoStorage::new(&state.pool)
        .count_itens(tabela_id)
        .await?;
    Ok(Json(json!({ "count": count })))
}

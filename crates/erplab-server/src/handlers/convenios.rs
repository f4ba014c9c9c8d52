use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch},
};
use erplab_api::{ApiError, ApiQuery, ValidJson, parse_uuid};
use erplab_db_postgres::{
    Convenio, ConvenioFiltros, ConvenioStorage, CreateConvenio, CreatePlano, Plano,
    StatusConvenio, UpdateConvenio, UpdatePlano,
};
use uuid::Uuid;

use super::{ApiResult, found};
use crate::server::AppState;

fn convenio_nao_encontrado(id: Uuid) -> String {
    format!("Convênio com ID {id} não encontrado")
}

fn plano_nao_encontrado(id: Uuid) -> String {
    format!("Plano com ID {id} não encontrado")
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/ativos", get(list_ativos))
        .route("/{id}", get(find_one).patch(update).delete(remove))
        .route("/{id}/toggle-status", patch(toggle_status))
        .route("/{id}/planos", get(list_planos).post(create_plano))
        .route(
            "/{id}/planos/{plano_id}",
            get(find_plano).patch(update_plano).delete(remove_plano),
        )
}

async fn create(
    State(state): State<AppState>,
    ValidJson(input): ValidJson<CreateConvenio>,
) -> ApiResult<(StatusCode, Json<Convenio>)> {
    let convenio = ConvenioStorage::new(&state.pool).create(&input).await?;
    tracing::info!(convenio_id = %convenio.id, "Insurer created");
    Ok((StatusCode::CREATED, Json(convenio)))
}

async fn list(
    State(state): State<AppState>,
    ApiQuery(filtros): ApiQuery<ConvenioFiltros>,
) -> ApiResult<Json<Vec<Convenio>>> {
    Ok(Json(ConvenioStorage::new(&state.pool).find_all(&filtros).await?))
}

async fn list_ativos(State(state): State<AppState>) -> ApiResult<Json<Vec<Convenio>>> {
    let filtros = ConvenioFiltros {
        search: None,
        status: Some(StatusConvenio::Ativo),
    };
    Ok(Json(ConvenioStorage::new(&state.pool).find_all(&filtros).await?))
}

async fn find_one(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Convenio>> {
    let id = parse_uuid(&id)?;
    let convenio = ConvenioStorage::new(&state.pool).find_by_id(id).await?;
    found(convenio, || convenio_nao_encontrado(id)).map(Json)
}

async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ValidJson(input): ValidJson<UpdateConvenio>,
) -> ApiResult<Json<Convenio>> {
    let id = parse_uuid(&id)?;
    let convenio = ConvenioStorage::new(&state.pool).update(id, &input).await?;
    found(convenio, || convenio_nao_encontrado(id)).map(Json)
}

async fn toggle_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Convenio>> {
    let id = parse_uuid(&id)?;
    let convenio = ConvenioStorage::new(&state.pool).toggle_status(id).await?;
    found(convenio, || convenio_nao_encontrado(id)).map(Json)
}

async fn remove(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<StatusCode> {
    let id = parse_uuid(&id)?;
    let convenio = ConvenioStorage::new(&state.pool).deactivate(id).await?;
    found(convenio, || convenio_nao_encontrado(id))?;
    Ok(StatusCode::NO_CONTENT)
}

// -----------------------------------------------------------------------------
// Planos
// -----------------------------------------------------------------------------

/// Resolves the parent insurer, answering 404 when it does not exist.
async fn convenio_existente(storage: &ConvenioStorage<'_>, raw: &str) -> ApiResult<Uuid> {
    let id = parse_uuid(raw)?;
    found(storage.find_by_id(id).await?, || convenio_nao_encontrado(id))?;
    Ok(id)
}

async fn create_plano(
    State(state): State<AppState>,
    Path(convenio_id): Path<String>,
    ValidJson(input): ValidJson<CreatePlano>,
) -> ApiResult<(StatusCode, Json<Plano>)> {
    let storage = ConvenioStorage::new(&state.pool);
    let convenio_id = convenio_existente(&storage, &convenio_id).await?;
    let plano = storage.create_plano(convenio_id, &input).await?;
    Ok((StatusCode::CREATED, Json(plano)))
}

async fn list_planos(
    State(state): State<AppState>,
    Path(convenio_id): Path<String>,
) -> ApiResult<Json<Vec<Plano>>> {
    let storage = ConvenioStorage::new(&state.pool);
    let convenio_id = convenio_existente(&storage, &convenio_id).await?;
    Ok(Json(storage.list_planos(convenio_id).await?))
}

async fn find_plano(
    State(state): State<AppState>,
    Path((convenio_id, id)): Path<(String, String)>,
) -> ApiResult<Json<Plano>> {
    let storage = ConvenioStorage::new(&state.pool);
    let convenio_id = convenio_existente(&storage, &convenio_id).await?;
    let id = parse_uuid(&id)?;
    found(storage.find_plano(convenio_id, id).await?, || {
        plano_nao_encontrado(id)
    })
    .map(Json)
}

async fn update_plano(
    State(state): State<AppState>,
    Path((convenio_id, id)): Path<(String, String)>,
    ValidJson(input): ValidJson<UpdatePlano>,
) -> ApiResult<Json<Plano>> {
    let storage = ConvenioStorage::new(&state.pool);
    let convenio_id = convenio_existente(&storage, &convenio_id).await?;
    let id = parse_uuid(&id)?;
    let plano = storage.update_plano(convenio_id, id, &input).await?;
    found(plano, || plano_nao_encontrado(id)).map(Json)
}

async fn remove_plano(
    State(state): State<AppState>,
    Path((convenio_id, id)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    let storage = ConvenioStorage::new(&state.pool);
    let convenio_id = convenio_existente(&storage, &convenio_id).await?;
    let id = parse_uuid(&id)?;
    if !storage.delete_plano(convenio_id, id).await? {
        return Err(ApiError::not_found(plano_nao_encontrado(id)));
    }
    Ok(StatusCode::NO_CONTENT)
}

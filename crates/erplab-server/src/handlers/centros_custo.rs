use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch},
};
use erplab_api::{ValidJson, parse_uuid};
use erplab_db_postgres::{CentroCusto, CentroCustoStorage, CreateCentroCusto, UpdateCentroCusto};

use super::{ApiResult, found};
use crate::server::AppState;

fn nao_encontrado(id: impl std::fmt::Display) -> String {
    format!("Centro de custo com ID {id} não encontrado")
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/ativos", get(list_ativos))
        .route("/codigo/{codigo}", get(find_by_codigo))
        .route("/{id}", get(find_one).patch(update).delete(remove))
        .route("/{id}/toggle-status", patch(toggle_status))
}

async fn create(
    State(state): State<AppState>,
    ValidJson(input): ValidJson<CreateCentroCusto>,
) -> ApiResult<(StatusCode, Json<CentroCusto>)> {
    let centro = CentroCustoStorage::new(&state.pool).create(&input).await?;
    Ok((StatusCode::CREATED, Json(centro)))
}

async fn list(State(state): State<AppState>) -> ApiResult<Json<Vec<CentroCusto>>> {
    Ok(Json(CentroCustoStorage::new(&state.pool).find_all(false).await?))
}

async fn list_ativos(State(state): State<AppState>) -> ApiResult<Json<Vec<CentroCusto>>> {
    Ok(Json(CentroCustoStorage::new(&state.pool).find_all(true).await?))
}

async fn find_by_codigo(
    State(state): State<AppState>,
    Path(codigo): Path<String>,
) -> ApiResult<Json<CentroCusto>> {
    let centro = CentroCustoStorage::new(&state.pool)
        .find_by_codigo(&codigo)
        .await?;
    found(centro, || {
        format!("Centro de custo com código {codigo} não encontrado")
    })
    .map(Json)
}

async fn find_one(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<CentroCusto>> {
    let id = parse_uuid(&id)?;
    let centro = CentroCustoStorage::new(&state.pool).find_by_id(id).await?;
    found(centro, || nao_encontrado(id)).map(Json)
}

async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ValidJson(input): ValidJson<UpdateCentroCusto>,
) -> ApiResult<Json<CentroCusto>> {
    let id = parse_uuid(&id)?;
    let centro = CentroCustoStorage::new(&state.pool).update(id, &input).await?;
    found(centro, || nao_encontrado(id)).map(Json)
}

async fn toggle_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<CentroCusto>> {
    let id = parse_uuid(&id)?;
    let centro = CentroCustoStorage::new(&state.pool).toggle_ativo(id).await?;
    found(centro, || nao_encontrado(id)).map(Json)
}

/// Soft delete (`ativo = false`).
async fn remove(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<StatusCode> {
    let id = parse_uuid(&id)?;
    let centro = CentroCustoStorage::new(&state.pool).deactivate(id).await?;
    found(centro, || nao_encontrado(id))?;
    Ok(StatusCode::NO_CONTENT)
}

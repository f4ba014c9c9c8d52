use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch},
};
use erplab_api::{ApiError, ValidJson, parse_uuid};
use erplab_db_postgres::{
    ContaPagar, ContaPagarStorage, CreateContaPagar, StatusContaPagar, UpdateContaPagar,
    UpdateStatusContaPagar,
};
use uuid::Uuid;

use super::{ApiResult, found};
use crate::server::AppState;

fn nao_encontrada(id: Uuid) -> String {
    format!("Conta a pagar com ID {id} não encontrada")
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/status/{status}", get(list_by_status))
        .route("/credor/{credor_id}", get(list_by_credor))
        .route("/{id}", get(find_one).patch(update).delete(remove))
        .route("/{id}/status", patch(update_status))
}

async fn create(
    State(state): State<AppState>,
    ValidJson(input): ValidJson<CreateContaPagar>,
) -> ApiResult<(StatusCode, Json<ContaPagar>)> {
    let conta = ContaPagarStorage::new(&state.pool).create(&input).await?;
    tracing::info!(
        conta_id = %conta.id,
        codigo_interno = %conta.codigo_interno,
        "Account payable created"
    );
    Ok((StatusCode::CREATED, Json(conta)))
}

async fn list(State(state): State<AppState>) -> ApiResult<Json<Vec<ContaPagar>>> {
    Ok(Json(ContaPagarStorage::new(&state.pool).find_all().await?))
}

async fn list_by_status(
    State(state): State<AppState>,
    Path(status): Path<String>,
) -> ApiResult<Json<Vec<ContaPagar>>> {
    let status = status.parse::<StatusContaPagar>()?;
    Ok(Json(
        ContaPagarStorage::new(&state.pool)
            .find_by_status(status)
            .await?,
    ))
}

async fn list_by_credor(
    State(state): State<AppState>,
    Path(credor_id): Path<String>,
) -> ApiResult<Json<Vec<ContaPagar>>> {
    let credor_id = parse_uuid(&credor_id)?;
    Ok(Json(
        ContaPagarStorage::new(&state.pool)
            .find_by_credor(credor_id)
            .await?,
    ))
}

async fn find_one(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ContaPagar>> {
    let id = parse_uuid(&id)?;
    let conta = ContaPagarStorage::new(&state.pool).find_by_id(id).await?;
    found(conta, || nao_encontrada(id)).map(Json)
}

async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ValidJson(input): ValidJson<UpdateContaPagar>,
) -> ApiResult<Json<ContaPagar>> {
    let id = parse_uuid(&id)?;
    let conta = ContaPagarStorage::new(&state.pool).update(id, &input).await?;
    found(conta, || nao_encontrada(id)).map(Json)
}

async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ValidJson(input): ValidJson<UpdateStatusContaPagar>,
) -> ApiResult<Json<ContaPagar>> {
    let id = parse_uuid(&id)?;
    let conta = ContaPagarStorage::new(&state.pool)
        .set_status(id, input.status)
        .await?;
    found(conta, || nao_encontrada(id)).map(Json)
}

async fn remove(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<StatusCode> {
    let id = parse_uuid(&id)?;
    if !ContaPagarStorage::new(&state.pool).delete(id).await? {
        return Err(ApiError::not_found(nao_encontrada(id)));
    }
    Ok(StatusCode::NO_CONTENT)
}

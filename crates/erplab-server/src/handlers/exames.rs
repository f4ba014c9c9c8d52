use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::get,
};
use erplab_api::{ValidJson, parse_uuid};
use erplab_db_postgres::{CreateExame, Exame, ExameStorage};

use super::{ApiResult, found};
use crate::server::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/{id}", get(find_one))
}

async fn create(
    State(state): State<AppState>,
    ValidJson(input): ValidJson<CreateExame>,
) -> ApiResult<(StatusCode, Json<Exame>)> {
    let exame = ExameStorage::new(&state.pool).create(&input).await?;
    Ok((StatusCode::CREATED, Json(exame)))
}

async fn list(State(state): State<AppState>) -> ApiResult<Json<Vec<Exame>>> {
    Ok(Json(ExameStorage::new(&state.pool).find_all().await?))
}

async fn find_one(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Exame>> {
    let id = parse_uuid(&id)?;
    let exame = ExameStorage::new(&state.pool).find_by_id(id).await?;
    found(exame, || format!("Exame com ID {id} não encontrado")).map(Json)
}

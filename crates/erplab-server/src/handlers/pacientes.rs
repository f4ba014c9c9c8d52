use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch},
};
use erplab_api::{ApiQuery, PageParams, Paginated, ValidJson, WithMessage, parse_uuid};
use erplab_db_postgres::{
    CreatePaciente, Paciente, PacienteFiltros, PacienteStats, PacienteStorage, StatusPaciente,
    UpdatePaciente,
};
use serde::Deserialize;
use uuid::Uuid;

use super::{ApiResult, found};
use crate::auth::AuthUser;
use crate::server::AppState;

const SEARCH_LIMIT: u32 = 10;
const NAO_ENCONTRADO: &str = "Paciente não encontrado";

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    page: Option<u32>,
    limit: Option<u32>,
    nome: Option<String>,
    cpf: Option<String>,
    email: Option<String>,
    status: Option<StatusPaciente>,
    empresa_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    nome: String,
    limit: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct EmpresaQuery {
    empresa_id: Option<Uuid>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/search", get(search))
        .route("/stats", get(stats))
        .route("/cpf/{cpf}", get(find_by_cpf))
        .route("/{id}", get(find_one).patch(update).delete(remove))
        .route("/{id}/activate", patch(activate))
        .route("/{id}/block", patch(block))
}

async fn create(
    State(state): State<AppState>,
    user: AuthUser,
    ValidJson(input): ValidJson<CreatePaciente>,
) -> ApiResult<(StatusCode, Json<WithMessage<Paciente>>)> {
    let paciente = PacienteStorage::new(&state.pool)
        .create(&input, Some(user.id))
        .await?;
    tracing::info!(paciente_id = %paciente.id, "Patient created");
    Ok((
        StatusCode::CREATED,
        Json(WithMessage::new("Paciente criado com sucesso", paciente)),
    ))
}

async fn list(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> ApiResult<Json<Paginated<Paciente>>> {
    let page = state.page(PageParams {
        page: query.page,
        limit: query.limit,
    });
    let filtros = PacienteFiltros {
        nome: query.nome,
        cpf: query.cpf,
        email: query.email,
        status: query.status,
        empresa_id: query.empresa_id,
    };
    let (data, total) = PacienteStorage::new(&state.pool)
        .find_all(&filtros, page)
        .await?;
    Ok(Json(Paginated::new(data, total, page)))
}

async fn search(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<SearchQuery>,
) -> ApiResult<Json<Vec<Paciente>>> {
    let limit = query
        .limit
        .unwrap_or(SEARCH_LIMIT)
        .clamp(1, state.config.pagination.max_limit);
    let pacientes = PacienteStorage::new(&state.pool)
        .search_by_nome(query.nome.trim(), i64::from(limit))
        .await?;
    Ok(Json(pacientes))
}

async fn stats(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<EmpresaQuery>,
) -> ApiResult<Json<PacienteStats>> {
    Ok(Json(
        PacienteStorage::new(&state.pool).stats(query.empresa_id).await?,
    ))
}

async fn find_by_cpf(
    State(state): State<AppState>,
    Path(cpf): Path<String>,
    ApiQuery(query): ApiQuery<EmpresaQuery>,
) -> ApiResult<Json<Paciente>> {
    let paciente = PacienteStorage::new(&state.pool)
        .find_by_cpf(&cpf, query.empresa_id)
        .await?;
    found(paciente, || NAO_ENCONTRADO.to_string()).map(Json)
}

async fn find_one(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Paciente>> {
    let id = parse_uuid(&id)?;
    let paciente = PacienteStorage::new(&state.pool).find_by_id(id).await?;
    found(paciente, || NAO_ENCONTRADO.to_string()).map(Json)
}

async fn update(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    ValidJson(input): ValidJson<UpdatePaciente>,
) -> ApiResult<Json<WithMessage<Paciente>>> {
    let id = parse_uuid(&id)?;
    let paciente = PacienteStorage::new(&state.pool)
        .update(id, &input, Some(user.id))
        .await?;
    let paciente = found(paciente, || NAO_ENCONTRADO.to_string())?;
    Ok(Json(WithMessage::new("Paciente atualizado com sucesso", paciente)))
}

async fn set_status(
    state: &AppState,
    user: &AuthUser,
    id: &str,
    status: StatusPaciente,
) -> ApiResult<Paciente> {
    let id = parse_uuid(id)?;
    let paciente = PacienteStorage::new(&state.pool)
        .set_status(id, status, Some(user.id))
        .await?;
    found(paciente, || NAO_ENCONTRADO.to_string())
}

/// Soft delete: the row stays with `status = inativo`.
async fn remove(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<WithMessage<()>>> {
    set_status(&state, &user, &id, StatusPaciente::Inativo).await?;
    Ok(Json(WithMessage::message_only("Paciente removido com sucesso")))
}

async fn activate(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<WithMessage<Paciente>>> {
    let paciente = set_status(&state, &user, &id, StatusPaciente::Ativo).await?;
    Ok(Json(WithMessage::new("Paciente ativado com sucesso", paciente)))
}

async fn block(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<WithMessage<Paciente>>> {
    let paciente = set_status(&state, &user, &id, StatusPaciente::Bloqueado).await?;
    Ok(Json(WithMessage::new("Paciente bloqueado com sucesso", paciente)))
}

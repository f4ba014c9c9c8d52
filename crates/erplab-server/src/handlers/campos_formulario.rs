use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch},
};
use erplab_api::{ApiError, ApiQuery, MetaPage, PageMeta, PageParams, ValidJson, parse_uuid};
use erplab_db_postgres::{
    AlternativaCampoFormulario, CampoFormulario, CampoFormularioBusca, CampoFormularioStorage,
    CreateAlternativa, CreateCampoFormulario, NomeCampoFormulario, UpdateAlternativa,
    UpdateCampoFormulario,
};
use serde::Deserialize;
use uuid::Uuid;

use super::{ApiResult, found};
use crate::auth::AuthUser;
use crate::server::AppState;

fn campo_nao_encontrado(id: Uuid) -> String {
    format!("Campo de formulário com ID {id} não encontrado")
}

fn alternativa_nao_encontrada(id: Uuid) -> String {
    format!("Alternativa com ID {id} não encontrada")
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    termo: Option<String>,
    nome_campo: Option<NomeCampoFormulario>,
    ativo: Option<bool>,
    page: Option<u32>,
    limit: Option<u32>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/ativos", get(list_ativos))
        .route("/search", get(search))
        .route("/nome/{nome_campo}", get(find_by_nome))
        .route("/{id}", get(find_one).patch(update).delete(remove))
        .route("/{id}/toggle-status", patch(toggle_status))
        .route(
            "/{id}/alternativas",
            get(list_alternativas).post(create_alternativa),
        )
        .route("/{id}/alternativas/ativas", get(list_alternativas_ativas))
        .route(
            "/{id}/alternativas/{alternativa_id}",
            get(find_alternativa)
                .patch(update_alternativa)
                .delete(remove_alternativa),
        )
        .route(
            "/{id}/alternativas/{alternativa_id}/toggle-status",
            patch(toggle_alternativa),
        )
}

async fn create(
    State(state): State<AppState>,
    user: AuthUser,
    ValidJson(input): ValidJson<CreateCampoFormulario>,
) -> ApiResult<(StatusCode, Json<CampoFormulario>)> {
    let campo = CampoFormularioStorage::new(&state.pool)
        .create(&input, Some(user.id))
        .await?;
    Ok((StatusCode::CREATED, Json(campo)))
}

async fn list(State(state): State<AppState>) -> ApiResult<Json<Vec<CampoFormulario>>> {
    Ok(Json(CampoFormularioStorage::new(&state.pool).find_all().await?))
}

async fn list_ativos(State(state): State<AppState>) -> ApiResult<Json<Vec<CampoFormulario>>> {
    Ok(Json(
        CampoFormularioStorage::new(&state.pool).find_ativos().await?,
    ))
}

async fn search(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<SearchQuery>,
) -> ApiResult<Json<MetaPage<CampoFormulario>>> {
    let page = state.page(PageParams {
        page: query.page,
        limit: query.limit,
    });
    let busca = CampoFormularioBusca {
        termo: query.termo.filter(|t| !t.trim().is_empty()),
        nome_campo: query.nome_campo,
        ativo: query.ativo,
    };
    let (data, total) = CampoFormularioStorage::new(&state.pool)
        .search(&busca, page)
        .await?;
    Ok(Json(MetaPage {
        data,
        meta: PageMeta::new(total, page).with_navigation(),
    }))
}

async fn find_by_nome(
    State(state): State<AppState>,
    Path(nome_campo): Path<String>,
) -> ApiResult<Json<CampoFormulario>> {
    let nome = nome_campo.parse::<NomeCampoFormulario>()?;
    let campo = CampoFormularioStorage::new(&state.pool)
        .find_by_nome(nome)
        .await?;
    found(campo, || format!("Campo {nome} não encontrado")).map(Json)
}

async fn find_one(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<CampoFormulario>> {
    let id = parse_uuid(&id)?;
    let campo = CampoFormularioStorage::new(&state.pool).find_by_id(id).await?;
    found(campo, || campo_nao_encontrado(id)).map(Json)
}

async fn update(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    ValidJson(input): ValidJson<UpdateCampoFormulario>,
) -> ApiResult<Json<CampoFormulario>> {
    let id = parse_uuid(&id)?;
    let campo = CampoFormularioStorage::new(&state.pool)
        .update(id, &input, Some(user.id))
        .await?;
    found(campo, || campo_nao_encontrado(id)).map(Json)
}

async fn toggle_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<CampoFormulario>> {
    let id = parse_uuid(&id)?;
    let campo = CampoFormularioStorage::new(&state.pool)
        .toggle_status(id, Some(user.id))
        .await?;
    found(campo, || campo_nao_encontrado(id)).map(Json)
}

/// Soft delete (`ativo = false`).
async fn remove(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let id = parse_uuid(&id)?;
    let campo = CampoFormularioStorage::new(&state.pool)
        .deactivate(id, Some(user.id))
        .await?;
    found(campo, || campo_nao_encontrado(id))?;
    Ok(StatusCode::NO_CONTENT)
}

// -----------------------------------------------------------------------------
// Alternativas
// -----------------------------------------------------------------------------

async fn campo_existente(storage: &CampoFormularioStorage<'_>, raw: &str) -> ApiResult<Uuid> {
    let id = parse_uuid(raw)?;
    found(storage.find_by_id(id).await?, || campo_nao_encontrado(id))?;
    Ok(id)
}

async fn create_alternativa(
    State(state): State<AppState>,
    user: AuthUser,
    Path(campo_id): Path<String>,
    ValidJson(input): ValidJson<CreateAlternativa>,
) -> ApiResult<(StatusCode, Json<AlternativaCampoFormulario>)> {
    let storage = CampoFormularioStorage::new(&state.pool);
    let campo_id = campo_existente(&storage, &campo_id).await?;
    let alternativa = storage
        .create_alternativa(campo_id, &input, Some(user.id))
        .await?;
    Ok((StatusCode::CREATED, Json(alternativa)))
}

async fn alternativas(
    state: &AppState,
    campo_id: &str,
    somente_ativas: bool,
) -> ApiResult<Vec<AlternativaCampoFormulario>> {
    let storage = CampoFormularioStorage::new(&state.pool);
    let campo_id = campo_existente(&storage, campo_id).await?;
    Ok(storage.list_alternativas(campo_id, somente_ativas).await?)
}

async fn list_alternativas(
    State(state): State<AppState>,
    Path(campo_id): Path<String>,
) -> ApiResult<Json<Vec<AlternativaCampoFormulario>>> {
    alternativas(&state, &campo_id, false).await.map(Json)
}

async fn list_alternativas_ativas(
    State(state): State<AppState>,
    Path(campo_id): Path<String>,
) -> ApiResult<Json<Vec<AlternativaCampoFormulario>>> {
    alternativas(&state, &campo_id, true).await.map(Json)
}

async fn find_alternativa(
    State(state): State<AppState>,
    Path((campo_id, id)): Path<(String, String)>,
) -> ApiResult<Json<AlternativaCampoFormulario>> {
    let (campo_id, id) = (parse_uuid(&campo_id)?, parse_uuid(&id)?);
    let alternativa = CampoFormularioStorage::new(&state.pool)
        .find_alternativa(campo_id, id)
        .await?;
    found(alternativa, || alternativa_nao_encontrada(id)).map(Json)
}

async fn update_alternativa(
    State(state): State<AppState>,
    user: AuthUser,
    Path((campo_id, id)): Path<(String, String)>,
    ValidJson(input): ValidJson<UpdateAlternativa>,
) -> ApiResult<Json<AlternativaCampoFormulario>> {
    let (campo_id, id) = (parse_uuid(&campo_id)?, parse_uuid(&id)?);
    let alternativa = CampoFormularioStorage::new(&state.pool)
        .update_alternativa(campo_id, id, &input, Some(user.id))
        .await?;
    found(alternativa, || alternativa_nao_encontrada(id)).map(Json)
}

async fn toggle_alternativa(
    State(state): State<AppState>,
    user: AuthUser,
    Path((campo_id, id)): Path<(String, String)>,
) -> ApiResult<Json<AlternativaCampoFormulario>> {
    let (campo_id, id) = (parse_uuid(&campo_id)?, parse_uuid(&id)?);
    let alternativa = CampoFormularioStorage::new(&state.pool)
        .toggle_alternativa(campo_id, id, Some(user.id))
        .await?;
    found(alternativa, || alternativa_nao_encontrada(id)).map(Json)
}

async fn remove_alternativa(
    State(state): State<AppState>,
    Path((campo_id, id)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    let (campo_id, id) = (parse_uuid(&campo_id)?, parse_uuid(&id)?);
    if !CampoFormularioStorage::new(&state.pool)
        .delete_alternativa(campo_id, id)
        .await?
    {
        return Err(ApiError::not_found(alternativa_nao_encontrada(id)));
    }
    Ok(StatusCode::NO_CONTENT)
}

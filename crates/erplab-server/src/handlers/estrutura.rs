//! Sectors, rooms and equipment of a unit.
//!
//! All three resources share the same surface: CRUD keyed by id, a unique
//! code lookup, an `/estatisticas` summary and a `toggle-ativo` switch.
//! Deletes are hard.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch},
};
use erplab_api::{ApiError, ApiQuery, PageParams, Paginated, ValidJson, parse_uuid};
use erplab_db_postgres::{
    CreateEquipamento, CreateSala, CreateSetor, Equipamento, EquipamentoFiltros,
    EquipamentoStorage, Estatisticas, Sala, SalaFiltros, SalaStorage, SituacaoEquipamento, Setor,
    SetorStorage, TipoSetor, UpdateEquipamento, UpdateSala, UpdateSetor,
};
use serde::Deserialize;
use uuid::Uuid;

use super::{ApiResult, found};
use crate::auth::AuthUser;
use crate::server::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/setores", setores())
        .nest("/salas", salas())
        .nest("/equipamentos", equipamentos())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

// -----------------------------------------------------------------------------
// Setores
// -----------------------------------------------------------------------------

fn setor_nao_encontrado(id: Uuid) -> String {
    format!("Setor com ID {id} não encontrado")
}

fn setores() -> Router<AppState> {
    Router::new()
        .route("/", get(list_setores).post(create_setor))
        .route("/ativos", get(list_setores_ativos))
        .route("/estatisticas", get(estatisticas_setores))
        .route("/tipo/{tipo}", get(list_setores_by_tipo))
        .route("/unidade/{unidade_id}", get(list_setores_by_unidade))
        .route("/codigo/{codigo}", get(find_setor_by_codigo))
        .route(
            "/{id}",
            get(find_setor).patch(update_setor).delete(remove_setor),
        )
        .route("/{id}/toggle-ativo", patch(toggle_setor))
}

async fn create_setor(
    State(state): State<AppState>,
    user: AuthUser,
    ValidJson(input): ValidJson<CreateSetor>,
) -> ApiResult<(StatusCode, Json<Setor>)> {
    let setor = SetorStorage::new(&state.pool)
        .create(&input, Some(user.id))
        .await?;
    Ok((StatusCode::CREATED, Json(setor)))
}

async fn list_setores(State(state): State<AppState>) -> ApiResult<Json<Vec<Setor>>> {
    Ok(Json(SetorStorage::new(&state.pool).find_all().await?))
}

async fn list_setores_ativos(State(state): State<AppState>) -> ApiResult<Json<Vec<Setor>>> {
    Ok(Json(SetorStorage::new(&state.pool).find_ativos().await?))
}

async fn estatisticas_setores(State(state): State<AppState>) -> ApiResult<Json<Estatisticas>> {
    Ok(Json(SetorStorage::new(&state.pool).estatisticas().await?))
}

async fn list_setores_by_tipo(
    State(state): State<AppState>,
    Path(tipo): Path<String>,
) -> ApiResult<Json<Vec<Setor>>> {
    let tipo = tipo.parse::<TipoSetor>()?;
    Ok(Json(SetorStorage::new(&state.pool).find_by_tipo(tipo).await?))
}

async fn list_setores_by_unidade(
    State(state): State<AppState>,
    Path(unidade_id): Path<String>,
) -> ApiResult<Json<Vec<Setor>>> {
    let unidade_id = parse_uuid(&unidade_id)?;
    Ok(Json(
        SetorStorage::new(&state.pool)
            .find_by_unidade(unidade_id)
            .await?,
    ))
}

async fn find_setor_by_codigo(
    State(state): State<AppState>,
    Path(codigo): Path<String>,
) -> ApiResult<Json<Setor>> {
    let setor = SetorStorage::new(&state.pool).find_by_codigo(&codigo).await?;
    found(setor, || format!("Setor com código {codigo} não encontrado")).map(Json)
}

async fn find_setor(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Setor>> {
    let id = parse_uuid(&id)?;
    let setor = SetorStorage::new(&state.pool).find_by_id(id).await?;
    found(setor, || setor_nao_encontrado(id)).map(Json)
}

async fn update_setor(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    ValidJson(input): ValidJson<UpdateSetor>,
) -> ApiResult<Json<Setor>> {
    let id = parse_uuid(&id)?;
    let setor = SetorStorage::new(&state.pool)
        .update(id, &input, Some(user.id))
        .await?;
    found(setor, || setor_nao_encontrado(id)).map(Json)
}

async fn toggle_setor(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Setor>> {
    let id = parse_uuid(&id)?;
    let setor = SetorStorage::new(&state.pool)
        .toggle_ativo(id, Some(user.id))
        .await?;
    found(setor, || setor_nao_encontrado(id)).map(Json)
}

async fn remove_setor(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let id = parse_uuid(&id)?;
    if !SetorStorage::new(&state.pool).delete(id).await? {
        return Err(ApiError::not_found(setor_nao_encontrado(id)));
    }
    Ok(StatusCode::NO_CONTENT)
}

// -----------------------------------------------------------------------------
// Salas
// -----------------------------------------------------------------------------

fn sala_nao_encontrada(id: Uuid) -> String {
    format!("Sala com ID {id} não encontrada")
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalaQuery {
    page: Option<u32>,
    limit: Option<u32>,
    search: Option<String>,
    unidade_id: Option<Uuid>,
    setor_id: Option<Uuid>,
}

fn salas() -> Router<AppState> {
    Router::new()
        .route("/", get(list_salas).post(create_sala))
        .route("/ativas", get(list_salas_ativas))
        .route("/estatisticas", get(estatisticas_salas))
        .route("/unidade/{unidade_id}", get(list_salas_by_unidade))
        .route("/setor/{setor_id}", get(list_salas_by_setor))
        .route("/codigo/{codigo}", get(find_sala_by_codigo))
        .route("/{id}", get(find_sala).patch(update_sala).delete(remove_sala))
        .route("/{id}/toggle-ativo", patch(toggle_sala))
}

async fn create_sala(
    State(state): State<AppState>,
    user: AuthUser,
    ValidJson(input): ValidJson<CreateSala>,
) -> ApiResult<(StatusCode, Json<Sala>)> {
    let sala = SalaStorage::new(&state.pool)
        .create(&input, Some(user.id))
        .await?;
    Ok((StatusCode::CREATED, Json(sala)))
}

async fn list_salas(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<SalaQuery>,
) -> ApiResult<Json<Paginated<Sala>>> {
    let page = state.page(PageParams {
        page: query.page,
        limit: query.limit,
    });
    let filtros = SalaFiltros {
        search: non_blank(query.search),
        unidade_id: query.unidade_id,
        setor_id: query.setor_id,
    };
    let (data, total) = SalaStorage::new(&state.pool)
        .find_all(&filtros, page)
        .await?;
    Ok(Json(Paginated::new(data, total, page)))
}

async fn list_salas_ativas(State(state): State<AppState>) -> ApiResult<Json<Vec<Sala>>> {
    Ok(Json(SalaStorage::new(&state.pool).find_ativas().await?))
}

async fn estatisticas_salas(State(state): State<AppState>) -> ApiResult<Json<Estatisticas>> {
    Ok(Json(SalaStorage::new(&state.pool).estatisticas().await?))
}

async fn list_salas_by_unidade(
    State(state): State<AppState>,
    Path(unidade_id): Path<String>,
) -> ApiResult<Json<Vec<Sala>>> {
    let unidade_id = parse_uuid(&unidade_id)?;
    Ok(Json(
        SalaStorage::new(&state.pool)
            .find_by_unidade(unidade_id)
            .await?,
    ))
}

async fn list_salas_by_setor(
    State(state): State<AppState>,
    Path(setor_id): Path<String>,
) -> ApiResult<Json<Vec<Sala>>> {
    let setor_id = parse_uuid(&setor_id)?;
    Ok(Json(SalaStorage::new(&state.pool).find_by_setor(setor_id).await?))
}

async fn find_sala_by_codigo(
    State(state): State<AppState>,
    Path(codigo): Path<String>,
) -> ApiResult<Json<Sala>> {
    let sala = SalaStorage::new(&state.pool).find_by_codigo(&codigo).await?;
    found(sala, || format!("Sala com código {codigo} não encontrada")).map(Json)
}

async fn find_sala(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Sala>> {
    let id = parse_uuid(&id)?;
    let sala = SalaStorage::new(&state.pool).find_by_id(id).await?;
    found(sala, || sala_nao_encontrada(id)).map(Json)
}

async fn update_sala(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    ValidJson(input): ValidJson<UpdateSala>,
) -> ApiResult<Json<Sala>> {
    let id = parse_uuid(&id)?;
    let sala = SalaStorage::new(&state.pool)
        .update(id, &input, Some(user.id))
        .await?;
    found(sala, || sala_nao_encontrada(id)).map(Json)
}

async fn toggle_sala(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Sala>> {
    let id = parse_uuid(&id)?;
    let sala = SalaStorage::new(&state.pool)
        .toggle_ativo(id, Some(user.id))
        .await?;
    found(sala, || sala_nao_encontrada(id)).map(Json)
}

async fn remove_sala(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<StatusCode> {
    let id = parse_uuid(&id)?;
    if !SalaStorage::new(&state.pool).delete(id).await? {
        return Err(ApiError::not_found(sala_nao_encontrada(id)));
    }
    Ok(StatusCode::NO_CONTENT)
}

// -----------------------------------------------------------------------------
// Equipamentos
// -----------------------------------------------------------------------------

fn equipamento_nao_encontrado(id: Uuid) -> String {
    format!("Equipamento com ID {id} não encontrado")
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EquipamentoQuery {
    page: Option<u32>,
    limit: Option<u32>,
    search: Option<String>,
    unidade_id: Option<Uuid>,
    sala_id: Option<Uuid>,
    situacao: Option<SituacaoEquipamento>,
}

fn equipamentos() -> Router<AppState> {
    Router::new()
        .route("/", get(list_equipamentos).post(create_equipamento))
        .route("/ativos", get(list_equipamentos_ativos))
        .route("/estatisticas", get(estatisticas_equipamentos))
        .route("/unidade/{unidade_id}", get(list_equipamentos_by_unidade))
        .route("/sala/{sala_id}", get(list_equipamentos_by_sala))
        .route("/codigo/{codigo}", get(find_equipamento_by_codigo))
        .route(
            "/{id}",
            get(find_equipamento)
                .patch(update_equipamento)
                .delete(remove_equipamento),
        )
        .route("/{id}/toggle-ativo", patch(toggle_equipamento))
}

async fn create_equipamento(
    State(state): State<AppState>,
    user: AuthUser,
    ValidJson(input): ValidJson<CreateEquipamento>,
) -> ApiResult<(StatusCode, Json<Equipamento>)> {
    let equipamento = EquipamentoStorage::new(&state.pool)
        .create(&input, Some(user.id))
        .await?;
    Ok((StatusCode::CREATED, Json(equipamento)))
}

async fn list_equipamentos(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<EquipamentoQuery>,
) -> ApiResult<Json<Paginated<Equipamento>>> {
    let page = state.page(PageParams {
        page: query.page,
        limit: query.limit,
    });
    let filtros = EquipamentoFiltros {
        search: non_blank(query.search),
        unidade_id: query.unidade_id,
        sala_id: query.sala_id,
        situacao: query.situacao,
    };
    let (data, total) = EquipamentoStorage::new(&state.pool)
        .find_all(&filtros, page)
        .await?;
    Ok(Json(Paginated::new(data, total, page)))
}

async fn list_equipamentos_ativos(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<Equipamento>>> {
    Ok(Json(EquipamentoStorage::new(&state.pool).find_ativos().await?))
}

async fn estatisticas_equipamentos(
    State(state): State<AppState>,
) -> ApiResult<Json<Estatisticas>> {
    Ok(Json(EquipamentoStorage::new(&state.pool).estatisticas().await?))
}

async fn list_equipamentos_by_unidade(
    State(state): State<AppState>,
    Path(unidade_id): Path<String>,
) -> ApiResult<Json<Vec<Equipamento>>> {
    let unidade_id = parse_uuid(&unidade_id)?;
    Ok(Json(
        EquipamentoStorage::new(&state.pool)
            .find_by_unidade(unidade_id)
            .await?,
    ))
}

async fn list_equipamentos_by_sala(
    State(state): State<AppState>,
    Path(sala_id): Path<String>,
) -> ApiResult<Json<Vec<Equipamento>>> {
    let sala_id = parse_uuid(&sala_id)?;
    Ok(Json(
        EquipamentoStorage::new(&state.pool)
            .find_by_sala(sala_id)
            .await?,
    ))
}

async fn find_equipamento_by_codigo(
    State(state): State<AppState>,
    Path(codigo): Path<String>,
) -> ApiResult<Json<Equipamento>> {
    let equipamento = EquipamentoStorage::new(&state.pool)
        .find_by_codigo(&codigo)
        .await?;
    found(equipamento, || {
        format!("Equipamento com código {codigo} não encontrado")
    })
    .map(Json)
}

async fn find_equipamento(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Equipamento>> {
    let id = parse_uuid(&id)?;
    let equipamento = EquipamentoStorage::new(&state.pool).find_by_id(id).await?;
    found(equipamento, || equipamento_nao_encontrado(id)).map(Json)
}

async fn update_equipamento(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    ValidJson(input): ValidJson<UpdateEquipamento>,
) -> ApiResult<Json<Equipamento>> {
    let id = parse_uuid(&id)?;
    let equipamento = EquipamentoStorage::new(&state.pool)
        .update(id, &input, Some(user.id))
        .await?;
    found(equipamento, || equipamento_nao_encontrado(id)).map(Json)
}

async fn toggle_equipamento(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Equipamento>> {
    let id = parse_uuid(&id)?;
    let equipamento = EquipamentoStorage::new(&state.pool)
        .toggle_ativo(id, Some(user.id))
        .await?;
    found(equipamento, || equipamento_nao_encontrado(id)).map(Json)
}

async fn remove_equipamento(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let id = parse_uuid(&id)?;
    if !EquipamentoStorage::new(&state.pool).delete(id).await? {
        return Err(ApiError::not_found(equipamento_nao_encontrado(id)));
    }
    Ok(StatusCode::NO_CONTENT)
}

//! Public reference data: CEP lookup, localities, CNAE and banks.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};
use erplab_api::{ApiError, ApiQuery, PageParams, Paginated, parse_uuid};
use erplab_db_postgres::{
    Banco, BancoStorage, Cidade, Cnae, CnaeFiltros, CnaeStorage, Estado, LocalidadeStorage,
    ibge::{IbgeError, IbgeEstado},
};
use serde::{Deserialize, Serialize};

use super::{ApiResult, found};
use crate::cep::Endereco;
use crate::server::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/cep/{cep}", get(buscar_cep))
        .route("/localidades/estados", get(list_estados))
        .route("/localidades/estados/{uf}/cidades", get(list_cidades))
        .route("/cnae", get(list_cnaes))
        .route("/cnae/search", get(search_cnaes))
        .route("/cnae/codigo", get(find_cnae_by_codigo))
        .route("/cnae/secao/{secao}", get(list_cnaes_by_secao))
        .route("/cnae/divisao/{divisao}", get(list_cnaes_by_divisao))
        .route("/cnae/{id}", get(find_cnae))
        .route("/bancos", get(list_bancos))
        .route("/bancos/{id}", get(find_banco))
}

async fn buscar_cep(
    State(state): State<AppState>,
    Path(cep): Path<String>,
) -> ApiResult<Json<Endereco>> {
    Ok(Json(state.cep.buscar(&cep).await?))
}

// -----------------------------------------------------------------------------
// Localidades
// -----------------------------------------------------------------------------

/// State as listed to clients; `id` is the IBGE code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EstadoResumo {
    pub id: i32,
    pub sigla: String,
    pub nome: String,
}

impl From<Estado> for EstadoResumo {
    fn from(estado: Estado) -> Self {
        Self {
            id: estado.codigo_ibge,
            sigla: estado.sigla,
            nome: estado.nome,
        }
    }
}

impl From<IbgeEstado> for EstadoResumo {
    fn from(estado: IbgeEstado) -> Self {
        Self {
            id: estado.id,
            sigla: estado.sigla,
            nome: estado.nome,
        }
    }
}

fn ibge_error(err: IbgeError) -> ApiError {
    tracing::error!(error = %err, "IBGE request failed");
    ApiError::bad_gateway("Erro ao consultar o IBGE")
}

/// Upper-cased two-letter UF, or 400.
fn normalizar_uf(raw: &str) -> ApiResult<String> {
    let uf = raw.trim();
    if uf.len() == 2 && uf.chars().all(|c| c.is_ascii_alphabetic()) {
        Ok(uf.to_ascii_uppercase())
    } else {
        Err(ApiError::bad_request(
            "UF inválida. Informe a sigla com 2 letras.",
        ))
    }
}

async fn list_estados(State(state): State<AppState>) -> ApiResult<Json<Vec<EstadoResumo>>> {
    let estados = LocalidadeStorage::new(&state.pool).list_estados().await?;
    if !estados.is_empty() {
        return Ok(Json(estados.into_iter().map(EstadoResumo::from).collect()));
    }

    tracing::debug!("estados table is empty; falling back to IBGE");
    let estados = state.ibge.estados().await.map_err(ibge_error)?;
    Ok(Json(estados.into_iter().map(EstadoResumo::from).collect()))
}

async fn list_cidades(
    State(state): State<AppState>,
    Path(uf): Path<String>,
) -> ApiResult<Json<Vec<Cidade>>> {
    let uf = normalizar_uf(&uf)?;
    let cidades = LocalidadeStorage::new(&state.pool).list_cidades(&uf).await?;
    if !cidades.is_empty() {
        return Ok(Json(cidades));
    }

    tracing::debug!(%uf, "No cities stored; falling back to IBGE");
    let municipios = state.ibge.municipios(&uf).await.map_err(ibge_error)?;
    Ok(Json(
        municipios
            .into_iter()
            .map(|m| Cidade {
                codigo_ibge: m.id,
                nome: m.nome,
                uf: uf.clone(),
            })
            .collect(),
    ))
}

// -----------------------------------------------------------------------------
// CNAE
// -----------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct CnaeQuery {
    search: Option<String>,
    secao: Option<String>,
    divisao: Option<String>,
    page: Option<u32>,
    limit: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TermoQuery {
    q: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CodigoQuery {
    codigo: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

async fn list_cnaes(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<CnaeQuery>,
) -> ApiResult<Json<Paginated<Cnae>>> {
    let page = state.page(PageParams {
        page: query.page,
        limit: query.limit,
    });
    let filtros = CnaeFiltros {
        search: non_blank(query.search),
        secao: non_blank(query.secao),
        divisao: non_blank(query.divisao),
    };
    let (data, total) = CnaeStorage::new(&state.pool)
        .find_all(&filtros, page)
        .await?;
    Ok(Json(Paginated::new(data, total, page)))
}

async fn search_cnaes(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<TermoQuery>,
) -> ApiResult<Json<Vec<Cnae>>> {
    let Some(termo) = non_blank(query.q) else {
        return Ok(Json(Vec::new()));
    };
    Ok(Json(CnaeStorage::new(&state.pool).search(&termo).await?))
}

async fn find_cnae_by_codigo(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<CodigoQuery>,
) -> ApiResult<Json<Cnae>> {
    let codigo = non_blank(query.codigo)
        .ok_or_else(|| ApiError::bad_request("O parâmetro codigo é obrigatório"))?;
    let cnae = CnaeStorage::new(&state.pool).find_by_codigo(&codigo).await?;
    found(cnae, || format!("CNAE com código {codigo} não encontrado")).map(Json)
}

async fn list_cnaes_by_secao(
    State(state): State<AppState>,
    Path(secao): Path<String>,
) -> ApiResult<Json<Vec<Cnae>>> {
    Ok(Json(CnaeStorage::new(&state.pool).find_by_secao(&secao).await?))
}

async fn list_cnaes_by_divisao(
    State(state): State<AppState>,
    Path(divisao): Path<String>,
) -> ApiResult<Json<Vec<Cnae>>> {
    Ok(Json(
        CnaeStorage::new(&state.pool)
            .find_by_divisao(&divisao)
            .await?,
    ))
}

async fn find_cnae(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Cnae>> {
    let id = parse_uuid(&id)?;
    let cnae = CnaeStorage::new(&state.pool).find_by_id(id).await?;
    found(cnae, || format!("CNAE com ID {id} não encontrado")).map(Json)
}

// -----------------------------------------------------------------------------
// Bancos
// -----------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct BancoQuery {
    search: Option<String>,
}

async fn list_bancos(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<BancoQuery>,
) -> ApiResult<Json<Vec<Banco>>> {
    let search = non_blank(query.search);
    Ok(Json(
        BancoStorage::new(&state.pool)
            .find_all(search.as_deref())
            .await?,
    ))
}

async fn find_banco(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Banco>> {
    let id = parse_uuid(&id)?;
    let banco = BancoStorage::new(&state.pool).find_by_id(id).await?;
    found(banco, || format!("Banco com ID {id} não encontrado")).map(Json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uf_is_upper_cased() {
        assert_eq!(normalizar_uf("sp").unwrap(), "SP");
        assert_eq!(normalizar_uf(" rj ").unwrap(), "RJ");
    }

    #[test]
    fn uf_must_have_two_letters() {
        for raw in ["", "S", "SPX", "3P", "S-"] {
            let err = normalizar_uf(raw).unwrap_err();
            assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST, "{raw}");
        }
    }

    #[test]
    fn estado_resumo_uses_ibge_code_as_id() {
        let resumo = EstadoResumo::from(IbgeEstado {
            id: 35,
            sigla: "SP".into(),
            nome: "São Paulo".into(),
        });
        assert_eq!(resumo.id, 35);
        assert_eq!(resumo.sigla, "SP");
    }
}

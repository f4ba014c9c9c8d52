//! HTTP handlers grouped by resource. Each module exposes `routes()`,
//! mounted under the API prefix by [`api_routes`].

use axum::Router;
use erplab_api::ApiError;

use crate::server::AppState;

pub mod auth;
pub mod campos_formulario;
pub mod centros_custo;
pub mod contas_pagar;
pub mod convenios;
pub mod estrutura;
pub mod exames;
pub mod health;
pub mod pacientes;
pub mod referencia;
pub mod tabelas_preco;

pub type ApiResult<T> = Result<T, ApiError>;

/// Every route served below the API prefix.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/health", health::routes())
        .nest("/auth", auth::routes())
        .nest("/pacientes", pacientes::routes())
        .nest("/centros-custo", centros_custo::routes())
        .nest("/exames", exames::routes())
        .nest("/relacionamento/convenios", convenios::routes())
        .nest("/relacionamento/tabelas-preco", tabelas_preco::routes())
        .nest(
            "/infraestrutura/campos-formulario",
            campos_formulario::routes(),
        )
        .nest("/financeiro/contas-pagar", contas_pagar::routes())
        .nest("/configuracoes/estrutura", estrutura::routes())
        .merge(referencia::routes())
}

/// Maps `Ok(None)` from a storage lookup to a 404 with `mensagem`.
pub(crate) fn found<T>(value: Option<T>, mensagem: impl FnOnce() -> String) -> ApiResult<T> {
    value.ok_or_else(|| ApiError::not_found(mensagem()))
}

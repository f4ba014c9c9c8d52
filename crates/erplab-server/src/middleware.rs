use std::net::SocketAddr;
use std::time::Instant;

use axum::extract::{ConnectInfo, State};
use axum::response::IntoResponse;
use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, Method, Request, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use erplab_api::ApiError;
use erplab_db_postgres::UsuarioStorage;
use uuid::Uuid;

use crate::auth::{AuthError, AuthUser, TokenType};
use crate::metrics::{RequestRecord, record_http_request};
use crate::server::AppState;

/// Request id stored in request extensions by [`request_id`].
#[derive(Debug, Clone)]
pub struct RequestId(pub HeaderValue);

// =============================================================================
// Authentication Middleware
// =============================================================================

/// Validates the Bearer token of every non-public request and stores the
/// [`AuthUser`] in request extensions.
///
/// Missing or malformed headers, bad signatures, expired tokens, refresh
/// tokens and inactive users all answer 401 with `WWW-Authenticate: Bearer`.
pub async fn authentication_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    if is_public(req.method(), req.uri().path(), state.config.api_prefix()) {
        return next.run(req).await;
    }

    let auth_header = match req.headers().get(AUTHORIZATION).and_then(|h| h.to_str().ok()) {
        Some(header) => header,
        None => {
            tracing::debug!(path = %req.uri().path(), "No Authorization header");
            return ApiError::unauthorized("Token de acesso não informado").into_response();
        }
    };

    let token = match auth_header.strip_prefix("Bearer ") {
        Some(t) if !t.trim().is_empty() => t.trim(),
        _ => {
            return ApiError::unauthorized("Formato do cabeçalho Authorization inválido")
                .into_response();
        }
    };

    let claims = match state.jwt.decode(token, TokenType::Access) {
        Ok(claims) => claims,
        Err(e) => {
            tracing::debug!(error = %e, "Token validation failed");
            let message = match e {
                AuthError::Expired => "Token expirado",
                _ => "Token inválido",
            };
            return ApiError::unauthorized(message).into_response();
        }
    };

    match UsuarioStorage::new(&state.pool).find_by_id(claims.sub).await {
        Ok(Some(usuario)) if usuario.ativo => {}
        Ok(Some(_)) => return ApiError::unauthorized("Usuário inativo").into_response(),
        Ok(None) => return ApiError::unauthorized("Usuário não encontrado").into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to load authenticated user");
            return ApiError::service_unavailable("Não foi possível validar o usuário")
                .into_response();
        }
    }

    let user = AuthUser::from(&claims);
    tracing::debug!(user_id = %user.id, "Token validated successfully");
    req.extensions_mut().insert(user);
    next.run(req).await
}

/// Routes reachable without a token.
///
/// Outside the prefix: `/`, `/healthz`, `/readyz`, `/metrics`. Under the
/// prefix: health (except the metrics reset), login/refresh and the
/// reference-data lookups.
pub fn is_public(method: &Method, path: &str, prefix: &str) -> bool {
    if matches!(path, "/" | "/healthz" | "/readyz" | "/metrics") {
        return true;
    }

    let Some(rest) = path.strip_prefix(prefix) else {
        return false;
    };
    let rest = if rest.len() > 1 { rest.trim_end_matches('/') } else { rest };

    if rest == "/health/metrics/reset" {
        return method != Method::POST;
    }
    if matches!(rest, "/auth/login" | "/auth/refresh") {
        return true;
    }

    let public_roots = ["/health", "/cep", "/localidades", "/cnae", "/bancos"];
    public_roots.iter().any(|root| {
        rest == *root
            || rest
                .strip_prefix(root)
                .is_some_and(|tail| tail.starts_with('/'))
    })
}

// =============================================================================
// Other Middleware
// =============================================================================

// Ensures each request has an X-Request-Id and mirrors it on the response
pub async fn request_id(mut req: Request<Body>, next: Next) -> Response {
    let header_name = HeaderName::from_static("x-request-id");

    let req_id_value = req
        .headers()
        .get(&header_name)
        .cloned()
        .or_else(|| HeaderValue::from_str(&Uuid::new_v4().to_string()).ok());

    let Some(req_id_value) = req_id_value else {
        return next.run(req).await;
    };

    req.headers_mut().insert(header_name.clone(), req_id_value.clone());
    req.extensions_mut().insert(RequestId(req_id_value.clone()));

    let mut res = next.run(req).await;
    res.headers_mut().insert(header_name, req_id_value);
    res
}

/// Records every request in the ring buffer and in Prometheus.
pub async fn track_metrics(State(state): State<AppState>, req: Request<Body>, next: Next) -> Response {
    let started = Instant::now();
    let method = req.method().to_string();
    let url = req.uri().path().to_string();
    let ip = client_ip(&req);

    let res = next.run(req).await;

    let elapsed = started.elapsed();
    let duration = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
    let status = res.status().as_u16();
    let slow = state.metrics.is_slow(duration);

    record_http_request(&method, &url, status, elapsed, slow);
    state.metrics.record(RequestRecord {
        method,
        url,
        duration,
        status_code: status,
        ip,
        timestamp: Utc::now(),
    });
    res
}

/// First `x-forwarded-for` hop, else the peer address.
fn client_ip(req: &Request<Body>) -> String {
    if let Some(forwarded) = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return forwarded.to_string();
    }
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map_or_else(|| "unknown".to_string(), |ConnectInfo(addr)| addr.ip().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const P: &str = "/api/v1";

    #[test]
    fn root_probes_are_public() {
        for path in ["/", "/healthz", "/readyz", "/metrics"] {
            assert!(is_public(&Method::GET, path, P), "{path}");
        }
    }

    #[test]
    fn reference_lookups_are_public() {
        for path in [
            "/api/v1/health",
            "/api/v1/health/metrics/slow-requests",
            "/api/v1/auth/login",
            "/api/v1/auth/refresh",
            "/api/v1/cep/01001000",
            "/api/v1/localidades/estados",
            "/api/v1/localidades/estados/SP/cidades",
            "/api/v1/cnae",
            "/api/v1/cnae/search",
            "/api/v1/bancos/",
        ] {
            assert!(is_public(&Method::GET, path, P), "{path}");
        }
        assert!(is_public(&Method::POST, "/api/v1/auth/login", P));
    }

    #[test]
    fn domain_routes_are_protected() {
        for path in [
            "/api/v1/pacientes",
            "/api/v1/auth/me",
            "/api/v1/cnaes",
            "/api/v1/bancosx",
            "/api/v1/healthcheck",
            "/pacientes",
            "/health",
        ] {
            assert!(!is_public(&Method::GET, path, P), "{path}");
        }
    }

    #[test]
    fn metrics_reset_requires_a_token() {
        assert!(!is_public(&Method::POST, "/api/v1/health/metrics/reset", P));
        assert!(is_public(&Method::GET, "/api/v1/health/metrics", P));
    }

    #[test]
    fn client_ip_prefers_forwarded_header() {
        let req = Request::builder()
            .header("x-forwarded-for", "10.0.0.7, 172.16.0.1")
            .body(Body::empty())
            .unwrap();
        assert_eq!(client_ip(&req), "10.0.0.7");

        let mut req = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(client_ip(&req), "unknown");
        req.extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([192, 168, 0, 9], 5000))));
        assert_eq!(client_ip(&req), "192.168.0.9");
    }
}

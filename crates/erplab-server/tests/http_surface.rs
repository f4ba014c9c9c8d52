//! Routing, authentication and probes that never need a live database.

mod common;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use common::{offline_app, send, test_config};
use erplab_server::{AuthUser, JwtService, TokenType};
use serde_json::json;
use tower::ServiceExt;
use uuid::Uuid;

fn token(typ: TokenType) -> String {
    let cfg = test_config();
    let jwt = JwtService::from_config(&cfg.auth);
    let user = AuthUser {
        id: Uuid::new_v4(),
        email: "user@erplab.test".into(),
        nome: "Usuário".into(),
    };
    jwt.issue(&user, typ).expect("issue token")
}

#[tokio::test]
async fn probes_answer_without_database() {
    let app = offline_app(test_config());

    let (status, body) = send(&app, Method::GET, "/healthz", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = send(&app, Method::GET, "/readyz", None, None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "unavailable");

    let (status, body) = send(&app, Method::GET, "/", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["service"], "ERP Laboratório Backend");
}

#[tokio::test]
async fn health_reports_disconnected_database() {
    let app = offline_app(test_config());

    let (status, body) = send(&app, Method::GET, "/api/v1/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], "disconnected");
    assert_eq!(body["message"], "ERP Laboratório Backend está funcionando!");
    assert_eq!(body["port"], 10016);
}

#[tokio::test]
async fn protected_route_requires_bearer_token() {
    let app = offline_app(test_config());

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/v1/pacientes")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(response.headers()[header::WWW_AUTHENTICATE], "Bearer");

    let (_, body) = send(&app, Method::GET, "/api/v1/pacientes", None, None).await;
    assert_eq!(body["statusCode"], 401);
    assert_eq!(body["mensagem"], "Token de acesso não informado");
}

#[tokio::test]
async fn malformed_and_invalid_tokens_are_rejected() {
    let app = offline_app(test_config());

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/v1/exames")
                .header(header::AUTHORIZATION, "Basic abc")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let (status, body) =
        send(&app, Method::GET, "/api/v1/exames", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["mensagem"], "Token inválido");
}

#[tokio::test]
async fn refresh_token_is_not_an_access_token() {
    let app = offline_app(test_config());
    let refresh = token(TokenType::Refresh);

    let (status, body) = send(&app, Method::GET, "/api/v1/auth/me", Some(&refresh), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["mensagem"], "Token inválido");
}

#[tokio::test]
async fn token_signed_with_other_secret_is_rejected() {
    let mut other = test_config();
    other.auth.jwt_secret = "another-secret".into();
    let app = offline_app(other);

    let (status, _) = send(
        &app,
        Method::GET,
        "/api/v1/relacionamento/convenios",
        Some(&token(TokenType::Access)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn metrics_reset_is_protected_but_reads_are_public() {
    let app = offline_app(test_config());

    let (status, _) = send(&app, Method::POST, "/api/v1/health/metrics/reset", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(&app, Method::GET, "/api/v1/health/metrics", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["requests"]["total"].is_number());
}

#[tokio::test]
async fn login_validates_body_before_touching_the_database() {
    let app = offline_app(test_config());

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/auth/login",
        None,
        Some(json!({ "email": "admin@erplab.test" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let erros = body["erros"].as_array().expect("erros");
    assert!(erros.iter().any(|e| e.as_str().unwrap_or_default().contains("password")));

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/auth/login",
        None,
        Some(json!({ "email": "não-é-email", "password": "x" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["erros"].to_string().contains("email"));
}

#[tokio::test]
async fn invalid_cep_fails_without_outbound_call() {
    let mut cfg = test_config();
    cfg.integrations.viacep_base_url = "http://127.0.0.1:1".into();
    let app = offline_app(cfg);

    let (status, body) = send(&app, Method::GET, "/api/v1/cep/123", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["mensagem"], "CEP inválido. O CEP deve conter 8 dígitos.");
}

#[tokio::test]
async fn invalid_uf_is_a_bad_request() {
    let app = offline_app(test_config());

    let (status, _) = send(
        &app,
        Method::GET,
        "/api/v1/localidades/estados/SPX/cidades",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn request_id_is_echoed() {
    let app = offline_app(test_config());

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/healthz")
                .header("x-request-id", "abc-123")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.headers()["x-request-id"], "abc-123");

    let response = app
        .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let app = offline_app(test_config());
    let (status, _) = send(
        &app,
        Method::GET,
        "/api/v1/health/nao-existe",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

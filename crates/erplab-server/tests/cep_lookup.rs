//! ViaCEP client and the public `/cep/{cep}` route against a mock server.

mod common;

use std::time::Duration;

use axum::http::{Method, StatusCode};
use common::{offline_app, send, test_config};
use erplab_server::{CepClient, CepError};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn se_body() -> serde_json::Value {
    json!({
        "cep": "01001-000",
        "logradouro": "Praça da Sé",
        "complemento": "lado ímpar",
        "bairro": "Sé",
        "localidade": "São Paulo",
        "uf": "SP",
        "ibge": "3550308",
        "gia": "1004",
        "ddd": "11",
        "siafi": "7107"
    })
}

#[tokio::test]
async fn buscar_maps_viacep_fields() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/01001000/json/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(se_body()))
        .expect(1)
        .mount(&server)
        .await;

    let client = CepClient::new(server.uri(), Duration::from_secs(2)).unwrap();
    let endereco = client.buscar("01001-000").await.unwrap();

    assert_eq!(endereco.cep, "01001000");
    assert_eq!(endereco.rua, "Praça da Sé");
    assert_eq!(endereco.logradouro, "Praça da Sé");
    assert_eq!(endereco.cidade, "São Paulo");
    assert_eq!(endereco.estado, "SP");
    assert_eq!(endereco.ibge, "3550308");
}

#[tokio::test]
async fn erro_flag_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/99999999/json/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "erro": true })))
        .mount(&server)
        .await;

    let client = CepClient::new(server.uri(), Duration::from_secs(2)).unwrap();
    assert!(matches!(client.buscar("99999999").await, Err(CepError::NotFound)));
}

#[tokio::test]
async fn upstream_failure_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let client = CepClient::new(server.uri(), Duration::from_secs(2)).unwrap();
    assert!(matches!(client.buscar("01001000").await, Err(CepError::Upstream(_))));
}

#[tokio::test]
async fn invalid_cep_never_reaches_viacep() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(se_body()))
        .expect(0)
        .mount(&server)
        .await;

    let client = CepClient::new(server.uri(), Duration::from_secs(2)).unwrap();
    assert!(matches!(client.buscar("0100-100").await, Err(CepError::Invalid)));
}

#[tokio::test]
async fn cep_route_is_public() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/01001000/json/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(se_body()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/99999999/json/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "erro": "true" })))
        .mount(&server)
        .await;

    let mut cfg = test_config();
    cfg.integrations.viacep_base_url = server.uri();
    let app = offline_app(cfg);

    let (status, body) = send(&app, Method::GET, "/api/v1/cep/01001-000", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cep"], "01001000");
    assert_eq!(body["bairro"], "Sé");
    assert_eq!(body["ddd"], "11");

    let (status, body) = send(&app, Method::GET, "/api/v1/cep/99999999", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["mensagem"], "CEP não encontrado.");
}

pub mod extract;
pub mod pagination;
pub mod validation;

use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

pub use extract::{ApiQuery, ValidJson};
pub use pagination::{MetaPage, Page, PageMeta, PageParams, Paginated, total_pages};
pub use validation::{FieldErrors, Validate, validate};

/// Message used for every payload-shape failure.
pub const VALIDATION_MESSAGE: &str = "Erro de validação";

/// Error body returned by every endpoint.
///
/// `erros` is only present for validation failures.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub status_code: u16,
    pub mensagem: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub erros: Option<Vec<String>>,
    pub timestamp: String,
}

/// High-level API errors mapped to HTTP responses.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Bad gateway: {0}")]
    BadGateway(String),
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }
    pub fn validation(erros: Vec<String>) -> Self {
        Self::Validation(erros)
    }
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }
    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }
    pub fn bad_gateway(msg: impl Into<String>) -> Self {
        Self::BadGateway(msg.into())
    }
    pub fn service_unavailable(msg: impl Into<String>) -> Self {
        Self::ServiceUnavailable(msg.into())
    }
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Human readable message placed in `mensagem`.
    pub fn mensagem(&self) -> &str {
        match self {
            ApiError::Validation(_) => VALIDATION_MESSAGE,
            ApiError::BadRequest(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::NotFound(msg)
            | ApiError::Conflict(msg)
            | ApiError::BadGateway(msg)
            | ApiError::ServiceUnavailable(msg)
            | ApiError::Internal(msg) => msg,
        }
    }

    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            status_code: self.status_code().as_u16(),
            mensagem: self.mensagem().to_string(),
            erros: match self {
                ApiError::Validation(erros) => Some(erros.clone()),
                _ => None,
            },
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = serde_json::to_vec(&self.to_body()).unwrap_or_else(|_| {
            format!(r#"{{"statusCode":{},"mensagem":"Erro interno"}}"#, status.as_u16())
                .into_bytes()
        });

        let mut builder = axum::http::Response::builder().status(status).header(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        if status == StatusCode::UNAUTHORIZED {
            builder = builder.header(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }

        builder
            .body(axum::body::Body::from(body))
            .unwrap_or_else(|_| {
                let mut fallback = Response::new(axum::body::Body::from("{}"));
                *fallback.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
                fallback
            })
    }
}

/// Parses a path identifier, rejecting malformed UUIDs with 400.
pub fn parse_uuid(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::bad_request("ID inválido: deve ser um UUID válido"))
}

/// `{message, data}` envelope used by create/update endpoints that confirm the action.
#[derive(Debug, Clone, Serialize)]
pub struct WithMessage<T> {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> WithMessage<T> {
    pub fn new(message: impl Into<String>, data: T) -> Self {
        Self {
            message: message.into(),
            data: Some(data),
        }
    }
}

impl WithMessage<()> {
    pub fn message_only(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            data: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn into_response_sets_status_and_content_type() {
        let resp = ApiError::bad_request("Parâmetro inválido").into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            resp.headers().get(header::CONTENT_TYPE).unwrap(),
            &HeaderValue::from_static("application/json")
        );
    }

    #[test]
    fn unauthorized_carries_bearer_challenge() {
        let resp = ApiError::unauthorized("Token ausente").into_response();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            resp.headers().get(header::WWW_AUTHENTICATE).unwrap(),
            &HeaderValue::from_static("Bearer")
        );
    }

    #[test]
    fn validation_body_lists_fields() {
        let err = ApiError::validation(vec!["nome: não pode estar vazio".into()]);
        let body = err.to_body();
        assert_eq!(body.status_code, 400);
        assert_eq!(body.mensagem, VALIDATION_MESSAGE);
        assert_eq!(body.erros.as_deref(), Some(&["nome: não pode estar vazio".to_string()][..]));

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["statusCode"], 400);
        assert!(json["timestamp"].as_str().unwrap().ends_with('Z'));
    }

    #[test]
    fn non_validation_body_omits_erros() {
        let json = serde_json::to_value(ApiError::not_found("Paciente não encontrado").to_body())
            .unwrap();
        assert_eq!(json["mensagem"], "Paciente não encontrado");
        assert!(json.get("erros").is_none());
    }

    #[test]
    fn api_error_variants_map_to_status() {
        let cases: Vec<(ApiError, StatusCode)> = vec![
            (ApiError::bad_request("x"), StatusCode::BAD_REQUEST),
            (ApiError::validation(vec![]), StatusCode::BAD_REQUEST),
            (ApiError::unauthorized("x"), StatusCode::UNAUTHORIZED),
            (ApiError::forbidden("x"), StatusCode::FORBIDDEN),
            (ApiError::not_found("x"), StatusCode::NOT_FOUND),
            (ApiError::conflict("x"), StatusCode::CONFLICT),
            (ApiError::bad_gateway("x"), StatusCode::BAD_GATEWAY),
            (ApiError::service_unavailable("x"), StatusCode::SERVICE_UNAVAILABLE),
            (ApiError::internal("x"), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(err.status_code(), status);
            assert_eq!(err.to_body().status_code, status.as_u16());
        }
    }

    #[test]
    fn parse_uuid_rejects_garbage() {
        let err = parse_uuid("not-a-uuid").unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(parse_uuid("7f1a3c1e-4b5d-4a2b-9c1d-2e3f4a5b6c7d").is_ok());
    }

    #[test]
    fn with_message_skips_empty_data() {
        let json = serde_json::to_value(WithMessage::message_only("ok")).unwrap();
        assert_eq!(json, serde_json::json!({"message": "ok"}));
    }
}

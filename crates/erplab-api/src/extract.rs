//! JSON body extractor that reports shape errors as field validation errors.

use std::sync::LazyLock;

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts, Query, Request};
use axum::http::request::Parts;
use regex::Regex;
use serde::de::DeserializeOwned;

use crate::ApiError;
use crate::validation::{FieldErrors, Validate};

static MISSING_FIELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:(?P<path>[\w.\[\]]+): )?missing field `(?P<field>[^`]+)`")
        .expect("Invalid missing-field regex")
});
static UNKNOWN_FIELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"unknown field `(?P<field>[^`]+)`").expect("Invalid unknown-field regex")
});
static UNKNOWN_VARIANT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?:(?P<path>[\w.\[\]]+): )?unknown variant `[^`]*`, expected (?:one of )?(?P<expected>.+?)(?: at line \d+ column \d+)?$",
    )
    .expect("Invalid unknown-variant regex")
});
static INVALID_TYPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?:(?P<path>[\w.\[\]]+): )?invalid (?:type|value): .*?, expected (?P<expected>.+?)(?: at line \d+ column \d+)?$",
    )
    .expect("Invalid invalid-type regex")
});
static LOCATED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?P<path>[\w.\[\]]+): (?P<rest>.+?)(?: at line \d+ column \d+)?$")
        .expect("Invalid located-error regex")
});

/// `Json<T>` that also runs [`Validate`] and answers with the pt-BR 400 body.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        let mut errors = FieldErrors::new();
        value.validate(&mut errors);
        errors.into_result()?;
        Ok(Self(value))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            JsonRejection::JsonDataError(err) => {
                ApiError::validation(vec![translate_serde_error(&err.body_text())])
            }
            JsonRejection::JsonSyntaxError(_) => {
                ApiError::bad_request("Corpo da requisição não é um JSON válido")
            }
            JsonRejection::MissingJsonContentType(_) => {
                ApiError::bad_request("Content-Type deve ser application/json")
            }
            other => ApiError::bad_request(other.body_text()),
        }
    }
}

/// `Query<T>` whose rejection is the pt-BR 400 body.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiQuery<T>(pub T);

impl<T, S> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state).await?;
        Ok(Self(value))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        let detail = rejection.body_text();
        let detail = detail
            .split_once("Failed to deserialize query string: ")
            .map_or(detail.as_str(), |(_, inner)| inner);
        ApiError::validation(vec![format!("Parâmetro de consulta inválido: {detail}")])
    }
}

/// Translates a serde/json deserialization message into a pt-BR field message.
pub fn translate_serde_error(message: &str) -> String {
    let message = message
        .split_once("target type: ")
        .map_or(message, |(_, inner)| inner);
    if let Some(caps) = MISSING_FIELD.captures(message) {
        let field = qualified(caps.name("path").map(|m| m.as_str()), &caps["field"]);
        return format!("{field}: não pode estar vazio");
    }
    if let Some(caps) = UNKNOWN_FIELD.captures(message) {
        return format!("O campo '{}' não é permitido", &caps["field"]);
    }
    if let Some(caps) = UNKNOWN_VARIANT.captures(message) {
        let valores = caps["expected"].replace('`', "");
        return match caps.name("path") {
            Some(path) => format!("{}: deve ser um dos seguintes valores: {valores}", path.as_str()),
            None => format!("deve ser um dos seguintes valores: {valores}"),
        };
    }
    if let Some(caps) = INVALID_TYPE.captures(message) {
        let regra = expected_to_rule(&caps["expected"]);
        return match caps.name("path") {
            Some(path) => format!("{}: {regra}", path.as_str()),
            None => regra.to_string(),
        };
    }
    if let Some(caps) = LOCATED.captures(message) {
        let path = &caps["path"];
        let rest = &caps["rest"];
        if rest.contains("UUID") || rest.contains("invalid character") || rest.contains("invalid length") {
            return format!("{path}: deve ser um UUID válido");
        }
        if rest.contains("input") || rest.contains("premature end") {
            return format!("{path}: deve ser uma data válida");
        }
        return format!("{path}: valor inválido");
    }
    "Corpo da requisição inválido".to_string()
}

fn qualified(path: Option<&str>, field: &str) -> String {
    match path {
        Some(p) if p != "." => format!("{p}.{field}"),
        _ => field.to_string(),
    }
}

fn expected_to_rule(expected: &str) -> &'static str {
    let expected = expected.to_ascii_lowercase();
    if expected.contains("string") {
        "deve ser um texto"
    } else if expected.contains("bool") {
        "deve ser verdadeiro ou falso"
    } else if expected.contains("sequence") {
        "deve ser uma lista"
    } else if expected.contains("map") || expected.contains("struct") {
        "deve ser um objeto"
    } else if expected.contains("uuid") {
        "deve ser um UUID válido"
    } else if expected.contains("date") {
        "deve ser uma data válida"
    } else if expected.contains("integer")
        || expected.contains("float")
        || expected.contains("number")
        || expected.contains("f64")
        || expected.contains("i32")
        || expected.contains("i64")
        || expected.contains("u32")
    {
        "deve ser um número"
    } else {
        "valor inválido"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{StatusCode, header};
    use serde::Deserialize;

    const PREFIX: &str = "Failed to deserialize the JSON body into the target type: ";

    #[test]
    fn missing_field_names_the_field() {
        let msg = format!("{PREFIX}missing field `nome` at line 1 column 2");
        assert_eq!(translate_serde_error(&msg), "nome: não pode estar vazio");
    }

    #[test]
    fn missing_nested_field_is_qualified() {
        let msg = format!("{PREFIX}itens[0]: missing field `valor` at line 1 column 40");
        assert_eq!(translate_serde_error(&msg), "itens[0].valor: não pode estar vazio");
    }

    #[test]
    fn unknown_field_is_not_allowed() {
        let msg = format!(
            "{PREFIX}unknown field `senha`, expected one of `nome`, `cpf` at line 1 column 9"
        );
        assert_eq!(translate_serde_error(&msg), "O campo 'senha' não é permitido");
    }

    #[test]
    fn unknown_variant_lists_allowed_values() {
        let msg = format!(
            "{PREFIX}sexo: unknown variant `X`, expected one of `M`, `F`, `O` at line 1 column 12"
        );
        assert_eq!(
            translate_serde_error(&msg),
            "sexo: deve ser um dos seguintes valores: M, F, O"
        );
    }

    #[test]
    fn invalid_type_maps_to_rule() {
        let msg = format!("{PREFIX}nome: invalid type: integer `5`, expected a string at line 1 column 9");
        assert_eq!(translate_serde_error(&msg), "nome: deve ser um texto");

        let msg = format!("{PREFIX}ativo: invalid type: string \"x\", expected a boolean at line 1 column 9");
        assert_eq!(translate_serde_error(&msg), "ativo: deve ser verdadeiro ou falso");

        let msg = format!("{PREFIX}valor: invalid type: string \"x\", expected f64 at line 1 column 9");
        assert_eq!(translate_serde_error(&msg), "valor: deve ser um número");
    }

    #[derive(Debug, Deserialize)]
    #[serde(deny_unknown_fields)]
    struct Body1 {
        nome: String,
    }

    impl Validate for Body1 {
        fn validate(&self, errors: &mut FieldErrors) {
            errors.required("nome", &self.nome);
        }
    }

    async fn extract(body: &'static str) -> Result<ValidJson<Body1>, ApiError> {
        let req = Request::builder()
            .method("POST")
            .uri("/")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap();
        ValidJson::<Body1>::from_request(req, &()).await
    }

    #[tokio::test]
    async fn extractor_reports_missing_field() {
        let err = extract("{}").await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        match err {
            ApiError::Validation(erros) => assert_eq!(erros, vec!["nome: não pode estar vazio"]),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn extractor_runs_validate_after_parsing() {
        let err = extract(r#"{"nome": "  "}"#).await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
        assert!(extract(r#"{"nome": "Sala 1"}"#).await.is_ok());
    }

    #[derive(Debug, Deserialize)]
    struct Filtro {
        page: Option<u32>,
    }

    #[tokio::test]
    async fn query_rejection_is_a_validation_error() {
        let (mut parts, _) = Request::builder()
            .uri("/?page=abc")
            .body(Body::empty())
            .unwrap()
            .into_parts();
        let err = ApiQuery::<Filtro>::from_request_parts(&mut parts, &()).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

        let (mut parts, _) = Request::builder()
            .uri("/?page=2")
            .body(Body::empty())
            .unwrap()
            .into_parts();
        let ApiQuery(filtro) = ApiQuery::<Filtro>::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        assert_eq!(filtro.page, Some(2));
    }

    #[tokio::test]
    async fn extractor_rejects_malformed_json() {
        let err = extract("{nome").await.unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }
}

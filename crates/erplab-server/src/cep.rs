//! Address lookup by CEP through ViaCEP.

use std::time::Duration;

use erplab_api::ApiError;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum CepError {
    #[error("CEP inválido. O CEP deve conter 8 dígitos.")]
    Invalid,

    #[error("CEP não encontrado.")]
    NotFound,

    #[error("Erro ao buscar informações do CEP.")]
    Upstream(String),
}

impl From<CepError> for ApiError {
    fn from(err: CepError) -> Self {
        match err {
            CepError::Invalid => ApiError::bad_request(err.to_string()),
            CepError::NotFound => ApiError::not_found(err.to_string()),
            CepError::Upstream(ref cause) => {
                tracing::error!(error = %cause, "ViaCEP request failed");
                ApiError::internal(err.to_string())
            }
        }
    }
}

/// Address in the shape returned to clients. `rua` mirrors `logradouro`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Endereco {
    pub cep: String,
    pub rua: String,
    pub logradouro: String,
    pub complemento: String,
    pub bairro: String,
    pub cidade: String,
    pub estado: String,
    pub ibge: String,
    pub gia: String,
    pub ddd: String,
    pub siafi: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ViaCepResponse {
    logradouro: String,
    complemento: String,
    bairro: String,
    localidade: String,
    uf: String,
    ibge: String,
    gia: String,
    ddd: String,
    siafi: String,
    /// `true` (or `"true"`) when the CEP does not exist.
    erro: Option<serde_json::Value>,
}

impl ViaCepResponse {
    fn is_erro(&self) -> bool {
        match &self.erro {
            Some(serde_json::Value::Bool(b)) => *b,
            Some(serde_json::Value::String(s)) => s == "true",
            _ => false,
        }
    }
}

/// Keeps the digits of `raw` and requires exactly eight of them.
///
/// # Errors
///
/// Returns `Invalid` for any other digit count.
pub fn normalizar_cep(raw: &str) -> Result<String, CepError> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if digits.len() == 8 {
        Ok(digits)
    } else {
        Err(CepError::Invalid)
    }
}

#[derive(Debug, Clone)]
pub struct CepClient {
    http: reqwest::Client,
    base_url: String,
}

impl CepClient {
    /// # Errors
    ///
    /// Returns `Upstream` if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, CepError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CepError::Upstream(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Validates the CEP locally, then asks `{base}/{cep}/json/`.
    ///
    /// # Errors
    ///
    /// `Invalid` without any request, `NotFound` when ViaCEP flags the CEP,
    /// `Upstream` on transport failure, non-2xx status or malformed JSON.
    pub async fn buscar(&self, raw: &str) -> Result<Endereco, CepError> {
        let cep = normalizar_cep(raw)?;
        let url = format!("{}/{cep}/json/", self.base_url);
        tracing::debug!(%url, "ViaCEP request");

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| CepError::Upstream(e.to_string()))?;
        if !response.status().is_success() {
            return Err(CepError::Upstream(format!("status {}", response.status())));
        }
        let body: ViaCepResponse = response
            .json()
            .await
            .map_err(|e| CepError::Upstream(e.to_string()))?;
        if body.is_erro() {
            return Err(CepError::NotFound);
        }

        Ok(Endereco {
            cep,
            rua: body.logradouro.clone(),
            logradouro: body.logradouro,
            complemento: body.complemento,
            bairro: body.bairro,
            cidade: body.localidade,
            estado: body.uf,
            ibge: body.ibge,
            gia: body.gia,
            ddd: body.ddd,
            siafi: body.siafi,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn normalizar_strips_mask() {
        assert_eq!(normalizar_cep("01310-100").unwrap(), "01310100");
        assert_eq!(normalizar_cep(" 01.310-100 ").unwrap(), "01310100");
        assert!(matches!(normalizar_cep("1234567"), Err(CepError::Invalid)));
        assert!(matches!(normalizar_cep("013101000"), Err(CepError::Invalid)));
        assert!(matches!(normalizar_cep("abc"), Err(CepError::Invalid)));
    }

    #[test]
    fn erro_flag_accepts_bool_and_string() {
        let r: ViaCepResponse = serde_json::from_str(r#"{"erro": true}"#).unwrap();
        assert!(r.is_erro());
        let r: ViaCepResponse = serde_json::from_str(r#"{"erro": "true"}"#).unwrap();
        assert!(r.is_erro());
        let r: ViaCepResponse = serde_json::from_str(r#"{"cep": "01310-100"}"#).unwrap();
        assert!(!r.is_erro());
    }

    #[test]
    fn errors_map_to_status() {
        assert_eq!(ApiError::from(CepError::Invalid).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::from(CepError::NotFound).status_code(), StatusCode::NOT_FOUND);
        let err = ApiError::from(CepError::Upstream("timeout".into()));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.mensagem(), "Erro ao buscar informações do CEP.");
    }
}

//! Client for the IBGE localities API (`servicodados.ibge.gov.br/api/v1/localidades`).

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_BASE_URL: &str = "https://servicodados.ibge.gov.br/api/v1/localidades";

#[derive(Debug, thiserror::Error)]
pub enum IbgeError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP error: status {0}")]
    Status(u16),

    #[error("Failed to parse IBGE response: {0}")]
    Parse(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IbgeEstado {
    pub id: i32,
    pub sigla: String,
    pub nome: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IbgeMunicipio {
    pub id: i32,
    pub nome: String,
}

#[derive(Debug, Clone)]
pub struct IbgeClient {
    http: reqwest::Client,
    base_url: String,
}

impl IbgeClient {
    /// # Errors
    ///
    /// Returns `Network` if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, IbgeError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| IbgeError::Network(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// All states ordered by name.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, non-2xx status or malformed JSON.
    pub async fn estados(&self) -> Result<Vec<IbgeEstado>, IbgeError> {
        self.get_json(&format!("{}/estados?orderBy=nome", self.base_url))
            .await
    }

    /// Municipalities of `uf` (two-letter code).
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, non-2xx status or malformed JSON.
    pub async fn municipios(&self, uf: &str) -> Result<Vec<IbgeMunicipio>, IbgeError> {
        self.get_json(&format!(
            "{}/estados/{}/municipios",
            self.base_url,
            uf.to_uppercase()
        ))
        .await
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, url: &str) -> Result<T, IbgeError> {
        tracing::debug!(url, "IBGE request");
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| IbgeError::Network(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(IbgeError::Status(status.as_u16()));
        }
        response
            .json()
            .await
            .map_err(|e| IbgeError::Parse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> IbgeClient {
        IbgeClient::new(format!("{}/", server.uri()), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn fetches_estados_ordered_by_nome() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/estados"))
            .and(query_param("orderBy", "nome"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"id": 12, "sigla": "AC", "nome": "Acre", "regiao": {"id": 1, "sigla": "N", "nome": "Norte"}},
                {"id": 27, "sigla": "AL", "nome": "Alagoas", "regiao": {"id": 2, "sigla": "NE", "nome": "Nordeste"}}
            ])))
            .mount(&server)
            .await;

        let estados = client(&server).estados().await.unwrap();
        assert_eq!(estados.len(), 2);
        assert_eq!(estados[0].sigla, "AC");
    }

    #[tokio::test]
    async fn municipios_uppercases_uf() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/estados/SP/municipios"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"id": 3550308, "nome": "São Paulo"}
            ])))
            .mount(&server)
            .await;

        let municipios = client(&server).municipios("sp").await.unwrap();
        assert_eq!(municipios, vec![IbgeMunicipio { id: 3550308, nome: "São Paulo".into() }]);
    }

    #[tokio::test]
    async fn non_success_status_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = client(&server).estados().await.unwrap_err();
        assert!(matches!(err, IbgeError::Status(503)));
    }
}

//! Bearer tokens and password hashing.
//!
//! Tokens are HS256 JWTs signed with `auth.jwt_secret`. Access and refresh
//! tokens share the claim set and differ only in `typ`, so a refresh token
//! can never be replayed as an access token.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use chrono::Utc;
use erplab_api::ApiError;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

use crate::config::AuthConfig;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Token expirado")]
    Expired,

    #[error("Token inválido: {0}")]
    Invalid(String),

    #[error("Tipo de token inválido")]
    WrongType,

    #[error("Falha ao gerar token: {0}")]
    Encoding(String),
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;
        match err.kind() {
            ErrorKind::ExpiredSignature => Self::Expired,
            _ => Self::Invalid(err.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub nome: String,
    pub typ: TokenType,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
}

/// The authenticated caller, placed in request extensions by the
/// authentication middleware.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    pub nome: String,
}

impl From<&Claims> for AuthUser {
    fn from(claims: &Claims) -> Self {
        Self {
            id: claims.sub,
            email: claims.email.clone(),
            nome: claims.nome.clone(),
        }
    }
}

impl<S: Send + Sync> FromRequestParts<S> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Token de acesso não informado"))
    }
}

/// Issues and validates HS256 tokens.
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    access_ttl_secs: i64,
    refresh_ttl_secs: i64,
}

impl std::fmt::Debug for JwtService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtService")
            .field("issuer", &self.issuer)
            .field("access_ttl_secs", &self.access_ttl_secs)
            .field("refresh_ttl_secs", &self.refresh_ttl_secs)
            .finish_non_exhaustive()
    }
}

impl JwtService {
    #[must_use]
    pub fn new(secret: &str, issuer: impl Into<String>, access_ttl_secs: u64, refresh_ttl_secs: u64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            issuer: issuer.into(),
            access_ttl_secs: i64::try_from(access_ttl_secs).unwrap_or(i64::MAX),
            refresh_ttl_secs: i64::try_from(refresh_ttl_secs).unwrap_or(i64::MAX),
        }
    }

    #[must_use]
    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(
            &config.jwt_secret,
            config.issuer.clone(),
            config.access_token_ttl_secs,
            config.refresh_token_ttl_secs,
        )
    }

    pub fn access_ttl_secs(&self) -> i64 {
        self.access_ttl_secs
    }

    /// # Errors
    ///
    /// Returns `Encoding` if signing fails.
    pub fn issue(&self, user: &AuthUser, typ: TokenType) -> Result<String, AuthError> {
        let ttl = match typ {
            TokenType::Access => self.access_ttl_secs,
            TokenType::Refresh => self.refresh_ttl_secs,
        };
        let now = Utc::now().timestamp();
        self.encode(&Claims {
            sub: user.id,
            email: user.email.clone(),
            nome: user.nome.clone(),
            typ,
            iat: now,
            exp: now.saturating_add(ttl),
            iss: self.issuer.clone(),
        })
    }

    /// # Errors
    ///
    /// Returns `Encoding` if signing fails.
    pub fn encode(&self, claims: &Claims) -> Result<String, AuthError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| AuthError::Encoding(e.to_string()))
    }

    /// Validates signature, issuer and expiry, then checks the token type.
    ///
    /// # Errors
    ///
    /// Returns `Expired`, `Invalid` or `WrongType`.
    pub fn decode(&self, token: &str, expected: TokenType) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.validate_exp = true;
        validation.leeway = 0;

        let claims = decode::<Claims>(token, &self.decoding_key, &validation)?.claims;
        if claims.typ != expected {
            return Err(AuthError::WrongType);
        }
        Ok(claims)
    }
}

/// Hashes a password with Argon2id into a PHC string.
///
/// # Errors
///
/// Returns `argon2::password_hash::Error` if hashing fails (rare).
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// `Ok(false)` on mismatch; `Err` only when the stored hash is malformed.
///
/// # Errors
///
/// Returns `argon2::password_hash::Error` if `hash` is not a PHC string.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, argon2::password_hash::Error> {
    let parsed_hash = PasswordHash::new(hash)?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> JwtService {
        JwtService::new("segredo-de-teste", "erplab", 3600, 7200)
    }

    fn user() -> AuthUser {
        AuthUser {
            id: Uuid::new_v4(),
            email: "admin@lab.com.br".into(),
            nome: "Admin".into(),
        }
    }

    #[test]
    fn access_token_round_trip() {
        let jwt = service();
        let user = user();
        let token = jwt.issue(&user, TokenType::Access).unwrap();
        let claims = jwt.decode(&token, TokenType::Access).unwrap();
        assert_eq!(AuthUser::from(&claims), user);
        assert_eq!(claims.exp - claims.iat, 3600);
        assert_eq!(claims.iss, "erplab");
    }

    #[test]
    fn refresh_token_is_not_an_access_token() {
        let jwt = service();
        let token = jwt.issue(&user(), TokenType::Refresh).unwrap();
        assert!(matches!(
            jwt.decode(&token, TokenType::Access),
            Err(AuthError::WrongType)
        ));
        assert!(jwt.decode(&token, TokenType::Refresh).is_ok());
    }

    #[test]
    fn expired_token_is_rejected() {
        let jwt = service();
        let user = user();
        let now = Utc::now().timestamp();
        let token = jwt
            .encode(&Claims {
                sub: user.id,
                email: user.email,
                nome: user.nome,
                typ: TokenType::Access,
                iat: now - 120,
                exp: now - 60,
                iss: "erplab".into(),
            })
            .unwrap();
        assert!(matches!(
            jwt.decode(&token, TokenType::Access),
            Err(AuthError::Expired)
        ));
    }

    #[test]
    fn other_secret_or_issuer_is_rejected() {
        let token = service().issue(&user(), TokenType::Access).unwrap();
        let other = JwtService::new("outro-segredo", "erplab", 3600, 7200);
        assert!(matches!(
            other.decode(&token, TokenType::Access),
            Err(AuthError::Invalid(_))
        ));
        let other = JwtService::new("segredo-de-teste", "outro", 3600, 7200);
        assert!(other.decode(&token, TokenType::Access).is_err());
        assert!(service().decode("nao.e.jwt", TokenType::Access).is_err());
    }

    #[test]
    fn password_hash_verifies() {
        let hash = hash_password("s3nh@Forte").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("s3nh@Forte", &hash).unwrap());
        assert!(!verify_password("errada", &hash).unwrap());
        assert!(verify_password("x", "nao-e-phc").is_err());
    }
}

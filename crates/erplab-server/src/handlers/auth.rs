use axum::{Json, Router, extract::State, routing::{get, post}};
use erplab_api::{ApiError, FieldErrors, ValidJson, Validate};
use erplab_db_postgres::{Usuario, UsuarioStorage};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ApiResult;
use crate::auth::{AuthError, AuthUser, TokenType, verify_password};
use crate::server::AppState;

const CREDENCIAIS_INVALIDAS: &str = "Credenciais inválidas";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl Validate for LoginRequest {
    fn validate(&self, errors: &mut FieldErrors) {
        errors.required("email", &self.email);
        errors.email("email", Some(&self.email));
        errors.required("password", &self.password);
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

impl Validate for RefreshRequest {
    fn validate(&self, errors: &mut FieldErrors) {
        errors.required("refresh_token", &self.refresh_token);
    }
}

#[derive(Debug, Serialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub nome: String,
    pub email: String,
}

impl From<&Usuario> for UserSummary {
    fn from(usuario: &Usuario) -> Self {
        Self {
            id: usuario.id,
            nome: usuario.nome.clone(),
            email: usuario.email.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    pub user: UserSummary,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/refresh", post(refresh))
        .route("/me", get(me))
}

fn token_error(err: AuthError) -> ApiError {
    tracing::error!(error = %err, "Token issuance failed");
    ApiError::internal("Erro ao gerar token de acesso")
}

async fn login(
    State(state): State<AppState>,
    ValidJson(input): ValidJson<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let storage = UsuarioStorage::new(&state.pool);
    let Some(usuario) = storage.find_by_email(input.email.trim()).await? else {
        tracing::debug!("Login attempt for unknown e-mail");
        return Err(ApiError::unauthorized(CREDENCIAIS_INVALIDAS));
    };

    let senha_ok = verify_password(&input.password, &usuario.senha_hash).unwrap_or_else(|e| {
        tracing::error!(user_id = %usuario.id, error = %e, "Stored password hash is malformed");
        false
    });
    if !senha_ok {
        return Err(ApiError::unauthorized(CREDENCIAIS_INVALIDAS));
    }
    if !usuario.ativo {
        return Err(ApiError::unauthorized("Usuário inativo"));
    }

    let user = AuthUser {
        id: usuario.id,
        email: usuario.email.clone(),
        nome: usuario.nome.clone(),
    };
    let access_token = state.jwt.issue(&user, TokenType::Access).map_err(token_error)?;
    let refresh_token = state.jwt.issue(&user, TokenType::Refresh).map_err(token_error)?;
    storage.register_login(usuario.id).await?;

    tracing::info!(user_id = %usuario.id, "User logged in");
    Ok(Json(LoginResponse {
        access_token,
        refresh_token,
        token_type: "Bearer",
        expires_in: state.jwt.access_ttl_secs(),
        user: UserSummary::from(&usuario),
    }))
}

async fn refresh(
    State(state): State<AppState>,
    ValidJson(input): ValidJson<RefreshRequest>,
) -> ApiResult<Json<RefreshResponse>> {
    let invalid = || ApiError::unauthorized("Refresh token inválido ou expirado");

    let claims = state
        .jwt
        .decode(&input.refresh_token, TokenType::Refresh)
        .map_err(|e| {
            tracing::debug!(error = %e, "Refresh token rejected");
            invalid()
        })?;

    let usuario = UsuarioStorage::new(&state.pool)
        .find_by_id(claims.sub)
        .await?
        .filter(|u| u.ativo)
        .ok_or_else(invalid)?;

    let user = AuthUser {
        id: usuario.id,
        email: usuario.email,
        nome: usuario.nome,
    };
    let access_token = state.jwt.issue(&user, TokenType::Access).map_err(token_error)?;
    Ok(Json(RefreshResponse {
        access_token,
        token_type: "Bearer",
        expires_in: state.jwt.access_ttl_secs(),
    }))
}

async fn me(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<Usuario>> {
    UsuarioStorage::new(&state.pool)
        .find_by_id(user.id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Usuário não encontrado"))
}

//! Error types for the PostgreSQL storage backend.

use erplab_api::ApiError;
use sqlx_core::error::Error as SqlxError;

/// PostgreSQL error code for unique violations (23505).
pub const PG_UNIQUE_VIOLATION: &str = "23505";

/// PostgreSQL error code for foreign key violations (23503).
pub const PG_FOREIGN_KEY_VIOLATION: &str = "23503";

/// PostgreSQL error code for a value that does not fit its numeric column (22003).
pub const PG_NUMERIC_OUT_OF_RANGE: &str = "22003";

/// Checks if a sqlx error has a specific PostgreSQL error code.
pub fn has_pg_error_code(err: &SqlxError, code: &str) -> bool {
    if let SqlxError::Database(db_err) = err {
        db_err.code().as_deref() == Some(code)
    } else {
        false
    }
}

/// Errors raised while connecting to or migrating the database.
#[derive(Debug, thiserror::Error)]
pub enum PostgresError {
    /// Database connection error.
    #[error("Database connection error: {0}")]
    Connection(#[from] sqlx_core::error::Error),

    /// Migration error.
    #[error("Migration error: {0}")]
    Migration(String),

    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl PostgresError {
    /// Creates a new configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

/// Result type alias for connection and migration operations.
pub type Result<T> = std::result::Result<T, PostgresError>;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx_core::Error),

    /// Requested row was not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Row already exists (conflict).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid input data.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl StorageError {
    /// Create a `NotFound` error.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Create a `Conflict` error.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    /// Create an `InvalidInput` error.
    #[must_use]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Returns `true` if this is a `NotFound` error.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Returns `true` if this is a `Conflict` error.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    /// Returns `true` if this is a client error (4xx equivalent).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_) | Self::Conflict(_) | Self::InvalidInput(_)
        )
    }

    /// Translates constraint violations into domain errors.
    ///
    /// Unique violations become `Conflict(conflict_message)`, foreign key
    /// violations become `InvalidInput` naming the constraint.
    pub fn from_constraint(err: SqlxError, conflict_message: impl FnOnce() -> String) -> Self {
        Self::from_unique_constraint(err, |_| conflict_message())
    }

    /// Same as [`from_constraint`](Self::from_constraint), with the conflict
    /// message chosen from the name of the violated unique constraint.
    pub fn from_unique_constraint(
        err: SqlxError,
        conflict_message: impl FnOnce(Option<&str>) -> String,
    ) -> Self {
        if let SqlxError::Database(ref db_err) = err {
            if db_err.is_unique_violation() {
                return Self::conflict(conflict_message(db_err.constraint()));
            }
            if db_err.is_foreign_key_violation() {
                let constraint = db_err.constraint().unwrap_or("chave estrangeira");
                return Self::invalid_input(format!("Referência inexistente ({constraint})"));
            }
        }
        Self::from(err)
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// HTTP mapping of storage failures. Database and serialization details are
/// logged here and never reach the response body.
impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(msg) => ApiError::not_found(msg),
            StorageError::Conflict(msg) => ApiError::conflict(msg),
            StorageError::InvalidInput(msg) => ApiError::bad_request(msg),
            StorageError::Database(e) if has_pg_error_code(&e, PG_NUMERIC_OUT_OF_RANGE) => {
                tracing::warn!(error = %e, "Numeric value out of range");
                ApiError::bad_request("Valor numérico fora do intervalo permitido")
            }
            StorageError::Database(e) => {
                tracing::error!(error = %e, "Database operation failed");
                ApiError::internal("Erro interno do servidor")
            }
            StorageError::Serialization(e) => {
                tracing::error!(error = %e, "Row serialization failed");
                ApiError::internal("Erro interno do servidor")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PostgresError::config("invalid URL");
        assert!(err.to_string().contains("Configuration error"));

        let err = PostgresError::Migration("boom".into());
        assert!(err.to_string().contains("Migration error"));
    }

    #[test]
    fn storage_error_predicates() {
        assert!(StorageError::not_found("x").is_not_found());
        assert!(StorageError::conflict("x").is_conflict());
        assert!(StorageError::invalid_input("x").is_client_error());
        assert!(!StorageError::from(SqlxError::RowNotFound).is_client_error());
    }

    #[test]
    fn storage_errors_map_to_http_status() {
        let status = |err: StorageError| ApiError::from(err).status_code().as_u16();
        assert_eq!(status(StorageError::not_found("x")), 404);
        assert_eq!(status(StorageError::conflict("x")), 409);
        assert_eq!(status(StorageError::invalid_input("x")), 400);

        let err = ApiError::from(StorageError::from(SqlxError::PoolTimedOut));
        assert_eq!(err.status_code().as_u16(), 500);
        assert_eq!(err.mensagem(), "Erro interno do servidor");
    }

    #[test]
    fn non_database_errors_pass_through_constraint_mapping() {
        let err = StorageError::from_constraint(SqlxError::RowNotFound, || "dup".into());
        assert!(matches!(err, StorageError::Database(_)));
        let err = StorageError::from_unique_constraint(SqlxError::PoolClosed, |_| "dup".into());
        assert!(matches!(err, StorageError::Database(_)));
        assert!(!has_pg_error_code(&SqlxError::PoolClosed, PG_NUMERIC_OUT_OF_RANGE));
        assert!(!has_pg_error_code(&SqlxError::RowNotFound, PG_UNIQUE_VIOLATION));
    }
}

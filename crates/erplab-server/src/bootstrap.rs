//! First-run administrator.
//!
//! When `auth.bootstrap_admin` is configured and the `usuarios` table is
//! empty, the configured account is created so the API can be logged into.
//! Later startups find at least one user and leave the table alone.

use erplab_db_postgres::{NovoUsuario, PgPool, UsuarioStorage};
use tracing::{info, warn};

use crate::auth::hash_password;
use crate::config::BootstrapAdminConfig;

/// Creates the configured administrator on an empty `usuarios` table.
///
/// Returns `true` when a user was inserted.
///
/// # Errors
///
/// Returns an error if counting or inserting fails, or if hashing the password fails.
pub async fn bootstrap_admin(pool: &PgPool, admin: &BootstrapAdminConfig) -> anyhow::Result<bool> {
    let storage = UsuarioStorage::new(pool);
    let existentes = storage.count().await?;
    if existentes > 0 {
        info!(usuarios = existentes, "Users already present, skipping admin bootstrap");
        return Ok(false);
    }

    let senha_hash =
        hash_password(&admin.password).map_err(|e| anyhow::anyhow!("password hashing failed: {e}"))?;
    let usuario = storage
        .create(&NovoUsuario {
            nome: admin.nome.clone(),
            email: admin.email.trim().to_lowercase(),
            senha_hash,
        })
        .await?;

    warn!(
        user_id = %usuario.id,
        email = %usuario.email,
        "Bootstrap administrator created; change its password after the first login"
    );
    Ok(true)
}

//! Database migration management.
//!
//! Migrations are embedded in the binary and applied through the sqlx
//! migrator, which records them in `_sqlx_migrations`.

use sqlx_core::migrate::{Migration, MigrationType};
use sqlx_postgres::PgPool;
use std::borrow::Cow;
use tracing::{info, instrument};

use crate::error::{PostgresError, Result};

/// Embedded migrations in chronological order.
///
/// Each entry is a tuple of (version, description, sql).
macro_rules! embedded_migrations {
    () => {
        &[
            (
                20250101000001i64,
                "usuarios",
                include_str!("../../migrations/20250101000001_usuarios.sql"),
            ),
            (
                20250101000002i64,
                "cadastros",
                include_str!("../../migrations/20250101000002_cadastros.sql"),
            ),
            (
                20250101000003i64,
                "tabelas_preco",
                include_str!("../../migrations/20250101000003_tabelas_preco.sql"),
            ),
            (
                20250101000004i64,
                "campos_formulario",
                include_str!("../../migrations/20250101000004_campos_formulario.sql"),
            ),
            (
                20250101000005i64,
                "contas_pagar",
                include_str!("../../migrations/20250101000005_contas_pagar.sql"),
            ),
            (
                20250101000006i64,
                "estrutura",
                include_str!("../../migrations/20250101000006_estrutura.sql"),
            ),
            (
                20250101000007i64,
                "referencia",
                include_str!("../../migrations/20250101000007_referencia.sql"),
            ),
        ]
    };
}

fn build_migrations() -> Vec<Migration> {
    embedded_migrations!()
        .iter()
        .map(|(version, description, sql)| Migration {
            version: *version,
            description: Cow::Borrowed(description),
            migration_type: MigrationType::Simple,
            sql: Cow::Borrowed(sql),
            checksum: Cow::Borrowed(&[]),
            no_tx: false,
        })
        .collect()
}

/// Versions of every embedded migration, in apply order.
pub fn versions() -> Vec<i64> {
    embedded_migrations!().iter().map(|(v, _, _)| *v).collect()
}

/// Runs all pending database migrations.
///
/// To add a migration, create the SQL file in `migrations/` and append an
/// entry to `embedded_migrations!`.
///
/// # Errors
///
/// Returns an error if a migration fails to execute.
#[instrument(skip(pool))]
pub async fn run(pool: &PgPool) -> Result<()> {
    let migrations = build_migrations();
    info!(count = migrations.len(), "Running database migrations (embedded)");

    let migrator = sqlx_core::migrate::Migrator {
        migrations: Cow::Owned(migrations),
        ignore_missing: false,
        locking: true,
        no_tx: false,
    };

    migrator
        .run(pool)
        .await
        .map_err(|e| PostgresError::Migration(format!("Migration failed: {e}")))?;

    info!("Database migrations completed successfully");

    Ok(())
}

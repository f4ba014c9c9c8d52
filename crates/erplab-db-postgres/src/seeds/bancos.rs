use sqlx_postgres::PgPool;
use tracing::info;

use super::{SeedReport, SeedResult};
use crate::banco::{BancoStorage, NovoBanco};

const BANCOS_JSON: &str = include_str!("../../seed-data/bancos.json");

/// Loads the Banco Central participant list when `bancos` is empty.
///
/// # Errors
///
/// Returns an error if the embedded list is malformed or the insert fails.
pub async fn seed_bancos(pool: &PgPool) -> SeedResult<SeedReport> {
    let storage = BancoStorage::new(pool);
    let existentes = storage.count().await?;
    if existentes > 0 {
        info!(existentes, "bancos já cadastrados, seed ignorado");
        return Ok(SeedReport::skipped("bancos", existentes));
    }

    let bancos: Vec<NovoBanco> = serde_json::from_str(BANCOS_JSON)?;
    let inseridos = storage.insert_many(&bancos).await?;
    info!(inseridos, "bancos importados");

    Ok(SeedReport {
        seed: "bancos",
        inseridos,
        ignorados: bancos.len() as u64 - inseridos,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn embedded_list_has_unique_codes() {
        let bancos: Vec<NovoBanco> = serde_json::from_str(BANCOS_JSON).unwrap();
        assert!(bancos.len() > 200);
        let codigos: HashSet<_> = bancos.iter().map(|b| b.codigo.as_str()).collect();
        let internos: HashSet<_> = bancos.iter().map(|b| b.codigo_interno.as_str()).collect();
        assert_eq!(codigos.len(), bancos.len());
        assert_eq!(internos.len(), bancos.len());
        assert!(bancos.iter().any(|b| b.codigo == "001" && b.codigo_interno == "BB"));
    }
}

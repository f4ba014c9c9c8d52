//! Idempotent reference-data seeds.
//!
//! Every seed checks what is already stored and only inserts what is
//! missing, so running one twice leaves the row counts unchanged.

mod bancos;
mod campos_formulario;
mod cnae;
mod localidades;

use std::fmt;

pub use bancos::seed_bancos;
pub use campos_formulario::seed_campos_formulario;
pub use cnae::{parse_cnae_subclasses, seed_cnae, seed_cnae_subclasses};
pub use localidades::{ESTADOS, seed_cidades, seed_estados};

use crate::error::StorageError;
use crate::ibge::IbgeError;

#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("IBGE request failed: {0}")]
    Ibge(#[from] IbgeError),
}

pub type SeedResult<T> = std::result::Result<T, SeedError>;

/// Outcome of a single seed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedReport {
    pub seed: &'static str,
    pub inseridos: u64,
    pub ignorados: u64,
}

impl SeedReport {
    #[must_use]
    pub fn new(seed: &'static str) -> Self {
        Self {
            seed,
            inseridos: 0,
            ignorados: 0,
        }
    }

    /// A run that found the data already present.
    #[must_use]
    pub fn skipped(seed: &'static str, existentes: i64) -> Self {
        Self {
            seed,
            inseridos: 0,
            ignorados: u64::try_from(existentes).unwrap_or(0),
        }
    }
}

impl fmt::Display for SeedReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} inseridos, {} já existentes",
            self.seed, self.inseridos, self.ignorados
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_display() {
        let report = SeedReport {
            seed: "bancos",
            inseridos: 3,
            ignorados: 1,
        };
        assert_eq!(report.to_string(), "bancos: 3 inseridos, 1 já existentes");
        assert_eq!(SeedReport::skipped("cnae", -1).ignorados, 0);
    }
}

use sqlx_postgres::PgPool;
use tracing::{info, warn};

use super::{SeedReport, SeedResult};
use crate::ibge::IbgeClient;
use crate::localidade::{LocalidadeStorage, NovaCidade, NovoEstado};

macro_rules! uf {
    ($codigo:literal, $sigla:literal, $nome:literal, $regiao:literal) => {
        NovoEstado {
            codigo_ibge: $codigo,
            sigla: $sigla,
            nome: $nome,
            regiao: $regiao,
        }
    };
}

/// The 26 states plus the Federal District.
pub const ESTADOS: [NovoEstado; 27] = [
    uf!(11, "RO", "Rondônia", "Norte"),
    uf!(12, "AC", "Acre", "Norte"),
    uf!(13, "AM", "Amazonas", "Norte"),
    uf!(14, "RR", "Roraima", "Norte"),
    uf!(15, "PA", "Pará", "Norte"),
    uf!(16, "AP", "Amapá", "Norte"),
    uf!(17, "TO", "Tocantins", "Norte"),
    uf!(21, "MA", "Maranhão", "Nordeste"),
    uf!(22, "PI", "Piauí", "Nordeste"),
    uf!(23, "CE", "Ceará", "Nordeste"),
    uf!(24, "RN", "Rio Grande do Norte", "Nordeste"),
    uf!(25, "PB", "Paraíba", "Nordeste"),
    uf!(26, "PE", "Pernambuco", "Nordeste"),
    uf!(27, "AL", "Alagoas", "Nordeste"),
    uf!(28, "SE", "Sergipe", "Nordeste"),
    uf!(29, "BA", "Bahia", "Nordeste"),
    uf!(31, "MG", "Minas Gerais", "Sudeste"),
    uf!(32, "ES", "Espírito Santo", "Sudeste"),
    uf!(33, "RJ", "Rio de Janeiro", "Sudeste"),
    uf!(35, "SP", "São Paulo", "Sudeste"),
    uf!(41, "PR", "Paraná", "Sul"),
    uf!(42, "SC", "Santa Catarina", "Sul"),
    uf!(43, "RS", "Rio Grande do Sul", "Sul"),
    uf!(50, "MS", "Mato Grosso do Sul", "Centro-Oeste"),
    uf!(51, "MT", "Mato Grosso", "Centro-Oeste"),
    uf!(52, "GO", "Goiás", "Centro-Oeste"),
    uf!(53, "DF", "Distrito Federal", "Centro-Oeste"),
];

/// Inserts the federative units when `estados` is empty.
///
/// # Errors
///
/// Returns an error if a query fails.
pub async fn seed_estados(pool: &PgPool) -> SeedResult<SeedReport> {
    let storage = LocalidadeStorage::new(pool);
    let existentes = storage.count_estados().await?;
    if existentes > 0 {
        info!(existentes, "estados já cadastrados, seed ignorado");
        return Ok(SeedReport::skipped("estados", existentes));
    }
    let inseridos = storage.insert_estados(&ESTADOS).await?;
    info!(inseridos, "estados importados");
    Ok(SeedReport {
        seed: "estados",
        inseridos,
        ignorados: ESTADOS.len() as u64 - inseridos,
    })
}

/// Fetches municipalities from IBGE for every state that has none stored.
///
/// States that already have cities are not requested again, so an
/// interrupted run resumes where it stopped.
///
/// # Errors
///
/// Returns an error if an IBGE request or an insert fails.
pub async fn seed_cidades(pool: &PgPool, ibge: &IbgeClient) -> SeedResult<SeedReport> {
    let storage = LocalidadeStorage::new(pool);
    let pendentes = storage.estados_sem_cidades().await?;
    let mut report = SeedReport::new("cidades");
    if pendentes.is_empty() {
        info!("todos os estados já possuem cidades, seed ignorado");
        return Ok(report);
    }
    if pendentes.len() < ESTADOS.len() {
        report.ignorados = (ESTADOS.len() - pendentes.len()) as u64;
    }

    for estado in &pendentes {
        let municipios = ibge.municipios(&estado.sigla).await.inspect_err(|e| {
            warn!(uf = %estado.sigla, error = %e, "falha ao consultar municípios no IBGE");
        })?;
        let cidades: Vec<NovaCidade> = municipios
            .into_iter()
            .map(|m| NovaCidade {
                codigo_ibge: m.id,
                nome: m.nome,
            })
            .collect();
        let inseridos = storage.insert_cidades(estado.id, &cidades).await?;
        info!(uf = %estado.sigla, inseridos, "cidades importadas");
        report.inseridos += inseridos;
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn estados_are_unique_and_complete() {
        let siglas: HashSet<_> = ESTADOS.iter().map(|e| e.sigla).collect();
        let codigos: HashSet<_> = ESTADOS.iter().map(|e| e.codigo_ibge).collect();
        assert_eq!(siglas.len(), 27);
        assert_eq!(codigos.len(), 27);
        let regioes: HashSet<_> = ESTADOS.iter().map(|e| e.regiao).collect();
        assert_eq!(regioes.len(), 5);
    }
}

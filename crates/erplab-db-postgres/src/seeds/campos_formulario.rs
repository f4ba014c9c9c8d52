use serde::Deserialize;
use sqlx_postgres::PgPool;
use tracing::{debug, info};

use super::{SeedReport, SeedResult};
use crate::campo_formulario::{
    CampoFormularioStorage, CreateAlternativa, CreateCampoFormulario, NomeCampoFormulario,
};

const CAMPOS_JSON: &str = include_str!("../../seed-data/campos_formulario.json");

#[derive(Debug, Deserialize)]
struct CampoSeed {
    nome_campo: NomeCampoFormulario,
    descricao: String,
    alternativas: Vec<AlternativaSeed>,
}

#[derive(Debug, Deserialize)]
struct AlternativaSeed {
    texto: String,
    ordem: i32,
}

/// Creates missing fields, then adds missing alternatives by text.
///
/// Existing rows are never modified, so alternatives edited or
/// deactivated by users keep their state.
///
/// # Errors
///
/// Returns an error if the embedded data is malformed or a query fails.
pub async fn seed_campos_formulario(pool: &PgPool) -> SeedResult<SeedReport> {
    let campos: Vec<CampoSeed> = serde_json::from_str(CAMPOS_JSON)?;
    let storage = CampoFormularioStorage::new(pool);
    let mut report = SeedReport::new("campos-formulario");

    for seed in &campos {
        let campo = match storage.find_by_nome(seed.nome_campo).await? {
            Some(existente) => {
                report.ignorados += 1;
                existente
            }
            None => {
                let input = CreateCampoFormulario {
                    nome_campo: seed.nome_campo,
                    descricao: Some(seed.descricao.clone()).filter(|d| !d.is_empty()),
                    ativo: Some(true),
                };
                report.inseridos += 1;
                debug!(campo = %seed.nome_campo, "campo de formulário criado");
                storage.create(&input, None).await?
            }
        };

        for alternativa in &seed.alternativas {
            if storage
                .find_alternativa_by_texto(campo.id, &alternativa.texto)
                .await?
                .is_some()
            {
                report.ignorados += 1;
                continue;
            }
            let input = CreateAlternativa {
                texto_alternativa: alternativa.texto.clone(),
                ordem: Some(alternativa.ordem),
                ativo: Some(true),
            };
            storage.create_alternativa(campo.id, &input, None).await?;
            report.inseridos += 1;
        }
    }

    info!(
        inseridos = report.inseridos,
        ignorados = report.ignorados,
        "campos de formulário sincronizados"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_campos_cover_every_nome() {
        let campos: Vec<CampoSeed> = serde_json::from_str(CAMPOS_JSON).unwrap();
        assert_eq!(campos.len(), NomeCampoFormulario::ALL.len());
        for nome in NomeCampoFormulario::ALL {
            assert!(campos.iter().any(|c| c.nome_campo == *nome), "{nome} ausente");
        }
        assert!(campos.iter().all(|c| !c.alternativas.is_empty()));
    }
}

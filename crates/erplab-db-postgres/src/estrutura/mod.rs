//! Physical structure of a unit: sectors, rooms and equipment.

mod equipamento;
mod sala;
mod setor;

pub use equipamento::{
    CreateEquipamento, Equipamento, EquipamentoFiltros, EquipamentoStorage, SituacaoEquipamento,
    UpdateEquipamento,
};
pub use sala::{CreateSala, Sala, SalaFiltros, SalaStorage, TipoSala, UpdateSala};
pub use setor::{CreateSetor, Setor, SetorStorage, TipoSetor, UpdateSetor};

use serde::Serialize;
use sqlx_core::query::query;
use sqlx_core::row::Row;
use sqlx_postgres::PgPool;

use crate::error::StorageResult;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuantidadePorTipo {
    pub tipo: String,
    pub quantidade: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Estatisticas {
    pub total: i64,
    pub ativos: i64,
    pub inativos: i64,
    pub por_tipo: Vec<QuantidadePorTipo>,
}

/// Totals for `table`, grouped by `tipo_col`. Both names are compile-time constants.
async fn estatisticas(
    pool: &PgPool,
    table: &'static str,
    tipo_col: &'static str,
) -> StorageResult<Estatisticas> {
    let sql = format!(
        "SELECT COUNT(*) AS total, COUNT(*) FILTER (WHERE ativo) AS ativos FROM {table}"
    );
    let row = query(&sql).fetch_one(pool).await?;
    let total: i64 = row.try_get("total")?;
    let ativos: i64 = row.try_get("ativos")?;

    let sql = format!(
        "SELECT {tipo_col} AS tipo, COUNT(*) AS quantidade FROM {table} \
         GROUP BY {tipo_col} ORDER BY quantidade DESC, tipo"
    );
    let rows = query(&sql).fetch_all(pool).await?;
    let por_tipo = rows
        .iter()
        .map(|row| {
            Ok(QuantidadePorTipo {
                tipo: row.try_get("tipo")?,
                quantidade: row.try_get("quantidade")?,
            })
        })
        .collect::<StorageResult<Vec<_>>>()?;

    Ok(Estatisticas {
        total,
        ativos,
        inativos: total - ativos,
        por_tipo,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estatisticas_serialize_por_tipo_in_camel_case() {
        let stats = Estatisticas {
            total: 3,
            ativos: 2,
            inativos: 1,
            por_tipo: vec![QuantidadePorTipo {
                tipo: "coleta".into(),
                quantidade: 3,
            }],
        };
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["porTipo"][0]["quantidade"], 3);
        assert!(json.get("por_tipo").is_none());
    }
}

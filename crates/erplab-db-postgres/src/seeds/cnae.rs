use std::io::Read;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use sqlx_postgres::PgPool;
use tracing::{info, warn};

use super::{SeedReport, SeedResult};
use crate::cnae::{CnaeStorage, NovoCnae};

const CNAES_SAUDE_JSON: &str = include_str!("../../seed-data/cnaes_saude.json");

const CHUNK_SIZE: usize = 500;

const NAO_ESPECIFICADO: &str = "NÃO ESPECIFICADO";

static SECAO_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-U]$").expect("valid regex"));
static DIVISAO_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{2}$").expect("valid regex"));
static GRUPO_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{2}\.\d$").expect("valid regex"));
static CLASSE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{2}\.\d{2}-\d$").expect("valid regex"));
static SUBCLASSE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d/\d{2}$").expect("valid regex"));

/// One entry of the IBGE `/cnae/subclasses` export.
#[derive(Debug, Deserialize)]
struct IbgeSubclasse {
    id: String,
    descricao: String,
    grupo: Option<IbgeGrupo>,
    #[serde(default)]
    observacoes: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct IbgeGrupo {
    id: String,
    descricao: String,
    divisao: Option<IbgeDivisao>,
}

#[derive(Debug, Deserialize)]
struct IbgeDivisao {
    id: String,
    descricao: String,
    secao: Option<IbgeSecao>,
}

#[derive(Debug, Deserialize)]
struct IbgeSecao {
    id: String,
    descricao: String,
}

impl From<IbgeSubclasse> for NovoCnae {
    fn from(s: IbgeSubclasse) -> Self {
        let grupo = s.grupo.as_ref();
        let divisao = grupo.and_then(|g| g.divisao.as_ref());
        let secao = divisao.and_then(|d| d.secao.as_ref());
        let classe = s.id.chars().take(4).collect::<String>();
        let observacoes = (!s.observacoes.is_empty()).then(|| s.observacoes.join("\n\n"));
        NovoCnae {
            codigo: s.id.clone(),
            descricao: s.descricao.clone(),
            secao: secao.map_or("A", |x| x.id.as_str()).to_string(),
            descricao_secao: secao.map_or(NAO_ESPECIFICADO, |x| x.descricao.as_str()).to_string(),
            divisao: divisao.map_or("01", |x| x.id.as_str()).to_string(),
            descricao_divisao: divisao
                .map_or(NAO_ESPECIFICADO, |x| x.descricao.as_str())
                .to_string(),
            grupo: grupo.map_or("011", |x| x.id.as_str()).to_string(),
            descricao_grupo: grupo.map_or(NAO_ESPECIFICADO, |x| x.descricao.as_str()).to_string(),
            classe: if classe.is_empty() { "0111".to_string() } else { classe },
            descricao_classe: s.descricao.clone(),
            subclasse: s.id,
            descricao_subclasse: s.descricao,
            observacoes,
            ativo: true,
        }
    }
}

/// Loads CNAEs when the table is empty.
///
/// With `json_path` pointing at an IBGE subclass export the whole file is
/// imported in batches; otherwise the embedded health-sector list is used.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, or an insert fails.
pub async fn seed_cnae(pool: &PgPool, json_path: Option<&Path>) -> SeedResult<SeedReport> {
    let storage = CnaeStorage::new(pool);
    let existentes = storage.count().await?;
    if existentes > 0 {
        info!(existentes, "CNAEs já cadastrados, seed ignorado");
        return Ok(SeedReport::skipped("cnae", existentes));
    }

    let cnaes: Vec<NovoCnae> = match json_path.filter(|p| p.exists()) {
        Some(path) => {
            info!(path = %path.display(), "importando CNAEs do arquivo IBGE");
            let raw = std::fs::read_to_string(path)?;
            let subclasses: Vec<IbgeSubclasse> = serde_json::from_str(&raw)?;
            subclasses.into_iter().map(NovoCnae::from).collect()
        }
        None => {
            info!("arquivo de CNAEs não informado, importando CNAEs de saúde");
            serde_json::from_str(CNAES_SAUDE_JSON)?
        }
    };

    let mut report = SeedReport::new("cnae");
    for chunk in cnaes.chunks(CHUNK_SIZE) {
        let inseridos = storage.insert_many(chunk).await?;
        report.inseridos += inseridos;
        report.ignorados += chunk.len() as u64 - inseridos;
    }
    info!(inseridos = report.inseridos, "CNAEs importados");
    Ok(report)
}

/// Parses the hierarchical IBGE subclass CSV.
///
/// Section, division, group and class rows only update the current
/// hierarchy; each subclass row yields one CNAE with a 7-digit code and
/// upper-cased descriptions. Rows with fewer than six columns are ignored.
///
/// # Errors
///
/// Returns an error if the CSV itself is malformed.
pub fn parse_cnae_subclasses<R: Read>(reader: R) -> Result<Vec<NovoCnae>, csv::Error> {
    let mut csv = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut secao = (String::new(), String::new());
    let mut divisao = (String::new(), String::new());
    let mut grupo = (String::new(), String::new());
    let mut classe = (String::new(), String::new());
    let mut cnaes = Vec::new();

    for record in csv.records() {
        let record = record?;
        if record.len() < 6 {
            continue;
        }
        let denominacao = record[5].to_uppercase();

        if SECAO_RE.is_match(&record[0]) {
            secao = (record[0].to_string(), denominacao);
        } else if DIVISAO_RE.is_match(&record[1]) {
            divisao = (record[1].to_string(), denominacao);
        } else if GRUPO_RE.is_match(&record[2]) {
            grupo = (record[2].replace('.', ""), denominacao);
        } else if CLASSE_RE.is_match(&record[3]) {
            let raw = &record[3];
            classe = (format!("{}{}", &raw[0..2], &raw[3..5]), denominacao);
        } else if SUBCLASSE_RE.is_match(&record[4]) {
            let codigo = record[4].replace(['-', '/'], "");
            cnaes.push(NovoCnae {
                codigo: codigo.clone(),
                descricao: denominacao.clone(),
                secao: secao.0.clone(),
                descricao_secao: secao.1.clone(),
                divisao: divisao.0.clone(),
                descricao_divisao: divisao.1.clone(),
                grupo: grupo.0.clone(),
                descricao_grupo: grupo.1.clone(),
                classe: classe.0.clone(),
                descricao_classe: classe.1.clone(),
                subclasse: codigo,
                descricao_subclasse: denominacao,
                observacoes: None,
                ativo: true,
            });
        }
    }
    Ok(cnaes)
}

/// Imports the subclass CSV, skipping codes already stored.
/// A missing file is logged and treated as nothing to do.
///
/// # Errors
///
/// Returns an error if the file is malformed or an insert fails.
pub async fn seed_cnae_subclasses(pool: &PgPool, csv_path: &Path) -> SeedResult<SeedReport> {
    if !csv_path.exists() {
        warn!(path = %csv_path.display(), "arquivo de subclasses CNAE não encontrado, importação ignorada");
        return Ok(SeedReport::new("cnae-subclasses"));
    }

    let file = std::fs::File::open(csv_path)?;
    let cnaes = parse_cnae_subclasses(file)?;
    info!(subclasses = cnaes.len(), "subclasses CNAE lidas do CSV");

    let storage = CnaeStorage::new(pool);
    let mut report = SeedReport::new("cnae-subclasses");
    for chunk in cnaes.chunks(CHUNK_SIZE) {
        let inseridos = storage.insert_many(chunk).await?;
        report.inseridos += inseridos;
        report.ignorados += chunk.len() as u64 - inseridos;
        info!(inseridos = report.inseridos, "subclasses CNAE inseridas");
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "\
Seção,Divisão,Grupo,Classe,Subclasse,Denominação
Q,,,,,Saúde humana e serviços sociais
,86,,,,Atividades de atenção à saúde humana
,,86.4,,,\"Atividades de serviços de complementação diagnóstica e terapêutica\"
,,,86.40-2,,Atividades de serviços de complementação diagnóstica e terapêutica
,,,,8640-2/02,\"Laboratórios clínicos\"
,,,,8640-2/03,Serviços de diálise e nefrologia
linha,curta
";

    #[test]
    fn csv_hierarchy_is_carried_into_subclasses() {
        let cnaes = parse_cnae_subclasses(CSV.as_bytes()).unwrap();
        assert_eq!(cnaes.len(), 2);

        let lab = &cnaes[0];
        assert_eq!(lab.codigo, "8640202");
        assert_eq!(lab.subclasse, "8640202");
        assert_eq!(lab.descricao, "LABORATÓRIOS CLÍNICOS");
        assert_eq!(lab.secao, "Q");
        assert_eq!(lab.descricao_secao, "SAÚDE HUMANA E SERVIÇOS SOCIAIS");
        assert_eq!(lab.divisao, "86");
        assert_eq!(lab.grupo, "864");
        assert_eq!(lab.classe, "8640");
        assert!(lab.ativo);

        assert_eq!(cnaes[1].codigo, "8640203");
    }

    #[test]
    fn ibge_subclass_maps_hierarchy_and_observacoes() {
        let raw = serde_json::json!([{
            "id": "8640202",
            "descricao": "LABORATÓRIOS CLÍNICOS",
            "grupo": {
                "id": "864",
                "descricao": "ATIVIDADES DE SERVIÇOS DE COMPLEMENTAÇÃO DIAGNÓSTICA E TERAPÊUTICA",
                "divisao": {
                    "id": "86",
                    "descricao": "ATIVIDADES DE ATENÇÃO À SAÚDE HUMANA",
                    "secao": {"id": "Q", "descricao": "SAÚDE HUMANA E SERVIÇOS SOCIAIS"}
                }
            },
            "observacoes": ["Esta subclasse compreende:", "- análises clínicas"]
        }]);
        let subclasses: Vec<IbgeSubclasse> = serde_json::from_value(raw).unwrap();
        let cnae = NovoCnae::from(subclasses.into_iter().next().unwrap());
        assert_eq!(cnae.secao, "Q");
        assert_eq!(cnae.grupo, "864");
        assert_eq!(cnae.classe, "8640");
        assert_eq!(
            cnae.observacoes.as_deref(),
            Some("Esta subclasse compreende:\n\n- análises clínicas")
        );
    }

    #[test]
    fn missing_hierarchy_falls_back_to_placeholders() {
        let subclasse = IbgeSubclasse {
            id: "0111301".into(),
            descricao: "CULTIVO DE ARROZ".into(),
            grupo: None,
            observacoes: Vec::new(),
        };
        let cnae = NovoCnae::from(subclasse);
        assert_eq!(cnae.secao, "A");
        assert_eq!(cnae.descricao_divisao, NAO_ESPECIFICADO);
        assert!(cnae.observacoes.is_none());
    }
}

//! Seeds must be idempotent: a second run inserts nothing.

mod common;

use std::time::Duration;

use erplab_db_postgres::ibge::IbgeClient;
use erplab_db_postgres::{BancoStorage, CnaeStorage, LocalidadeStorage, seeds};
use wiremock::matchers::{method, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_reference_seeds_are_idempotent() {
    let db = common::start().await;

    let estados = seeds::seed_estados(&db.pool).await.unwrap();
    assert_eq!(estados.inseridos, 27);
    let bancos = seeds::seed_bancos(&db.pool).await.unwrap();
    assert!(bancos.inseridos > 200);
    let cnae = seeds::seed_cnae(&db.pool, None).await.unwrap();
    assert_eq!(cnae.inseridos, 12);
    let campos = seeds::seed_campos_formulario(&db.pool).await.unwrap();
    assert!(campos.inseridos > 19);

    let total_bancos = BancoStorage::new(&db.pool).count().await.unwrap();
    let total_cnaes = CnaeStorage::new(&db.pool).count().await.unwrap();

    assert_eq!(seeds::seed_estados(&db.pool).await.unwrap().inseridos, 0);
    assert_eq!(seeds::seed_bancos(&db.pool).await.unwrap().inseridos, 0);
    assert_eq!(seeds::seed_cnae(&db.pool, None).await.unwrap().inseridos, 0);
    assert_eq!(
        seeds::seed_campos_formulario(&db.pool).await.unwrap().inseridos,
        0
    );

    assert_eq!(BancoStorage::new(&db.pool).count().await.unwrap(), total_bancos);
    assert_eq!(CnaeStorage::new(&db.pool).count().await.unwrap(), total_cnaes);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_cnae_subclasses_csv_skips_existing_codes() {
    let db = common::start().await;
    let dir = tempfile::tempdir().unwrap();
    let csv = dir.path().join("cnae_subclasses.csv");
    std::fs::write(
        &csv,
        "Q,,,,,Saúde humana e serviços sociais\n\
         ,86,,,,Atividades de atenção à saúde humana\n\
         ,,86.4,,,Complementação diagnóstica\n\
         ,,,86.40-2,,Complementação diagnóstica\n\
         ,,,,8640-2/02,Laboratórios clínicos\n",
    )
    .unwrap();

    let primeira = seeds::seed_cnae_subclasses(&db.pool, &csv).await.unwrap();
    let segunda = seeds::seed_cnae_subclasses(&db.pool, &csv).await.unwrap();
    assert_eq!(primeira.inseridos, 1);
    assert_eq!(segunda.inseridos, 0);
    assert_eq!(segunda.ignorados, 1);

    let cnae = CnaeStorage::new(&db.pool)
        .find_by_codigo("8640202")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(cnae.descricao, "LABORATÓRIOS CLÍNICOS");

    let ausente = seeds::seed_cnae_subclasses(&db.pool, &dir.path().join("nao-existe.csv"))
        .await
        .unwrap();
    assert_eq!(ausente.inseridos, 0);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_cidades_seed_only_requests_states_without_cities() {
    let db = common::start().await;
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/estados/[A-Z]{2}/municipios$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/estados/AC/municipios$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {"id": 1200401, "nome": "Rio Branco"},
            {"id": 1200203, "nome": "Cruzeiro do Sul"}
        ])))
        .with_priority(1)
        .mount(&server)
        .await;

    seeds::seed_estados(&db.pool).await.unwrap();
    let ibge = IbgeClient::new(server.uri(), Duration::from_secs(5)).unwrap();

    let primeira = seeds::seed_cidades(&db.pool, &ibge).await.unwrap();
    assert_eq!(primeira.inseridos, 2);

    let cidades = LocalidadeStorage::new(&db.pool).list_cidades("ac").await.unwrap();
    assert_eq!(cidades[0].nome, "Cruzeiro do Sul");
    assert_eq!(cidades[0].uf, "AC");

    let segunda = seeds::seed_cidades(&db.pool, &ibge).await.unwrap();
    assert_eq!(segunda.inseridos, 0);
    assert_eq!(LocalidadeStorage::new(&db.pool).count_cidades().await.unwrap(), 2);
}

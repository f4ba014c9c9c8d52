//! Storage behaviour against a real PostgreSQL.

mod common;

use erplab_api::Page;
use erplab_db_postgres::{
    CampoFormularioBusca, CampoFormularioStorage, ContaPagarStorage, CreateCampoFormulario,
    CreateContaPagar, CreateExame, CreatePaciente, CreateTabelaPreco, CreateTabelaPrecoItem,
    ExameStorage, NomeCampoFormulario, PacienteStorage, SalaFiltros, SalaStorage,
    StatusContaPagar, StorageError, TabelaPrecoStorage, UpdateContaPagar,
};
use serde_json::json;
use uuid::Uuid;

fn paciente(cpf: &str, empresa_id: Option<Uuid>) -> CreatePaciente {
    serde_json::from_value(json!({
        "nome": "Maria da Silva",
        "sexo": "F",
        "data_nascimento": "1990-05-20",
        "cpf": cpf,
        "codigo_interno": format!("PAC-{}", Uuid::new_v4().simple()),
        "empresa_id": empresa_id,
    }))
    .unwrap()
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_paciente_cpf_is_unique_per_empresa() {
    let db = common::start().await;
    let storage = PacienteStorage::new(&db.pool);
    let empresa = Uuid::new_v4();

    let criado = storage
        .create(&paciente("12345678901", Some(empresa)), None)
        .await
        .unwrap();
    assert!(criado.codigo_interno.starts_with("PAC-"));

    let err = storage
        .create(&paciente("12345678901", Some(empresa)), None)
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Conflict(_)));

    // Same CPF in another company is fine.
    storage
        .create(&paciente("12345678901", Some(Uuid::new_v4())), None)
        .await
        .unwrap();

    // Without a company the CPF is still unique.
    storage.create(&paciente("98765432100", None), None).await.unwrap();
    let err = storage
        .create(&paciente("98765432100", None), None)
        .await
        .unwrap_err();
    assert!(err.is_conflict());
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_paciente_duplicate_codigo_interno_reports_the_code() {
    let db = common::start().await;
    let storage = PacienteStorage::new(&db.pool);

    let mut primeiro = paciente("11122233344", None);
    primeiro.codigo_interno = Some("PAC-DUP".into());
    storage.create(&primeiro, None).await.unwrap();

    let mut segundo = paciente("55566677788", None);
    segundo.codigo_interno = Some("PAC-DUP".into());
    let err = storage.create(&segundo, None).await.unwrap_err();
    match err {
        StorageError::Conflict(msg) => {
            assert_eq!(msg, "Já existe um paciente com o código interno PAC-DUP");
        }
        other => panic!("expected conflict, got {other:?}"),
    }
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_tabela_preco_duplicate_exam_rolls_back_the_table() {
    let db = common::start().await;
    let exame = ExameStorage::new(&db.pool)
        .create(&CreateExame {
            codigo: "GLI".into(),
            nome: "Glicose".into(),
            ativo: None,
        })
        .await
        .unwrap();

    let item = |valor: f64| -> CreateTabelaPrecoItem {
        serde_json::from_value(json!({"exame_id": exame.id, "valor": valor})).unwrap()
    };
    let input: CreateTabelaPreco = serde_json::from_value(json!({
        "codigo_interno": "AMB92",
        "nome": "AMB 92",
        "tipo_tabela": "amb",
    }))
    .unwrap();
    let duplicada = CreateTabelaPreco {
        itens: vec![item(10.0), item(12.0)],
        ..input.clone()
    };

    let storage = TabelaPrecoStorage::new(&db.pool);
    let err = storage.create(&duplicada).await.unwrap_err();
    assert!(err.is_conflict());
    assert!(storage.find_by_codigo("AMB92").await.unwrap().is_none());

    let tabela = storage
        .create(&CreateTabelaPreco {
            itens: vec![item(10.0)],
            ..input
        })
        .await
        .unwrap();
    assert_eq!(tabela.itens.len(), 1);
    assert_eq!(storage.count_itens(tabela.id).await.unwrap(), 1);

    let preco = storage
        .find_item_by_exame(tabela.id, exame.id, true)
        .await
        .unwrap()
        .unwrap();
    assert!((preco.valor - 10.0).abs() < f64::EPSILON);

    assert!(storage.delete(tabela.id).await.unwrap());
    assert_eq!(storage.count_itens(tabela.id).await.unwrap(), 0);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_campo_formulario_search_paginates_and_toggles() {
    let db = common::start().await;
    let storage = CampoFormularioStorage::new(&db.pool);

    for nome in [
        NomeCampoFormulario::Amostra,
        NomeCampoFormulario::Metodologia,
        NomeCampoFormulario::TipoRecipiente,
    ] {
        storage
            .create(
                &CreateCampoFormulario {
                    nome_campo: nome,
                    descricao: Some(format!("Campo {nome}")),
                    ativo: None,
                },
                None,
            )
            .await
            .unwrap();
    }

    let (data, total) = storage
        .search(&CampoFormularioBusca::default(), Page { page: 2, limit: 2 })
        .await
        .unwrap();
    assert_eq!(total, 3);
    assert_eq!(data.len(), 1);
    assert_eq!(data[0].nome_campo, NomeCampoFormulario::TipoRecipiente);

    let busca = CampoFormularioBusca {
        termo: Some("metod".into()),
        ..Default::default()
    };
    let (data, total) = storage.search(&busca, Page { page: 1, limit: 10 }).await.unwrap();
    assert_eq!(total, 1);
    assert_eq!(data[0].nome_campo, NomeCampoFormulario::Metodologia);

    let id = data[0].id;
    let uma = storage.toggle_status(id, None).await.unwrap().unwrap();
    let duas = storage.toggle_status(id, None).await.unwrap().unwrap();
    assert!(!uma.ativo);
    assert!(duas.ativo);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_conta_pagar_codes_and_child_replacement() {
    let db = common::start().await;
    let storage = ContaPagarStorage::new(&db.pool);
    let input: CreateContaPagar = serde_json::from_value(json!({
        "credor_tipo": "fornecedor",
        "credor_id": Uuid::new_v4(),
        "unidade_devedora_id": Uuid::new_v4(),
        "tipo_documento": "boleto",
        "descricao": "Manutenção do analisador",
        "valor_bruto": 800.0,
        "valor_liquido": 800.0,
        "competencia": "01/2025",
        "data_emissao": "2025-01-15",
        "parcelas": [
            {"numero": 1, "total_parcelas": 2, "valor": 400.0, "data_vencimento": "2025-02-15"},
            {"numero": 2, "total_parcelas": 2, "valor": 400.0, "data_vencimento": "2025-03-15"}
        ]
    }))
    .unwrap();

    let primeira = storage.create(&input).await.unwrap();
    let segunda = storage.create(&input).await.unwrap();
    assert_eq!(primeira.status, StatusContaPagar::APagar);
    assert_eq!(primeira.parcelas.len(), 2);
    let seq = |c: &str| c[7..].parse::<u32>().unwrap();
    assert_eq!(seq(&segunda.codigo_interno), seq(&primeira.codigo_interno) + 1);

    let update: UpdateContaPagar = serde_json::from_value(json!({
        "parcelas": [
            {"numero": 1, "total_parcelas": 1, "valor": 800.0, "data_vencimento": "2025-02-15"}
        ]
    }))
    .unwrap();
    let atualizada = storage.update(primeira.id, &update).await.unwrap().unwrap();
    assert_eq!(atualizada.parcelas.len(), 1);
    assert_eq!(atualizada.descricao, "Manutenção do analisador");

    let paga = storage
        .set_status(primeira.id, StatusContaPagar::Paga)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(paga.status, StatusContaPagar::Paga);
    assert_eq!(
        storage.find_by_status(StatusContaPagar::Paga).await.unwrap().len(),
        1
    );

    assert!(storage.delete(primeira.id).await.unwrap());
    assert!(storage.find_by_id(primeira.id).await.unwrap().is_none());
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_sala_listing_is_paginated_and_searchable() {
    let db = common::start().await;
    let storage = SalaStorage::new(&db.pool);
    let unidade = Uuid::new_v4();

    for (codigo, nome) in [("COL-01", "Coleta 1"), ("COL-02", "Coleta 2"), ("ANA-01", "Bioquímica")] {
        let input = serde_json::from_value(json!({
            "codigo_sala": codigo,
            "nome": nome,
            "tipo_sala": if codigo.starts_with("COL") { "coleta" } else { "analise" },
            "unidade_id": unidade,
        }))
        .unwrap();
        storage.create(&input, None).await.unwrap();
    }

    let filtros = SalaFiltros {
        search: Some("col".into()),
        ..Default::default()
    };
    let (salas, total) = storage.find_all(&filtros, Page { page: 1, limit: 1 }).await.unwrap();
    assert_eq!(total, 2);
    assert_eq!(salas.len(), 1);
    assert_eq!(salas[0].codigo_sala, "COL-01");

    let stats = storage.estatisticas().await.unwrap();
    assert_eq!(stats.total, 3);
    assert_eq!(stats.por_tipo[0].tipo, "coleta");
    assert_eq!(stats.por_tipo[0].quantidade, 2);
}

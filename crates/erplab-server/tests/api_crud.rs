//! End-to-end REST behaviour against a containerised PostgreSQL.

mod common;

use std::collections::HashSet;

use axum::http::{Method, StatusCode};
use common::{ADMIN_EMAIL, ADMIN_PASSWORD, send, start_app};
use serde_json::{Value, json};
use uuid::Uuid;

fn paciente(nome: &str, cpf: &str) -> Value {
    json!({
        "nome": nome,
        "sexo": "F",
        "data_nascimento": "1990-05-20",
        "cpf": cpf,
        "email": "maria@example.com",
    })
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_auth_login_refresh_and_me() {
    let app = start_app().await;

    let (status, body) = send(
        &app.router,
        Method::POST,
        "/api/v1/auth/login",
        None,
        Some(json!({ "email": ADMIN_EMAIL, "password": "wrong" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["mensagem"], "Credenciais inválidas");

    let (status, login) = send(
        &app.router,
        Method::POST,
        "/api/v1/auth/login",
        None,
        Some(json!({ "email": ADMIN_EMAIL, "password": ADMIN_PASSWORD })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(login["token_type"], "Bearer");
    assert_eq!(login["user"]["email"], ADMIN_EMAIL);

    let (status, refreshed) = send(
        &app.router,
        Method::POST,
        "/api/v1/auth/refresh",
        None,
        Some(json!({ "refresh_token": login["refresh_token"] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let access = refreshed["access_token"].as_str().unwrap();

    let (status, me) = send(&app.router, Method::GET, "/api/v1/auth/me", Some(access), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["email"], ADMIN_EMAIL);
    assert!(me.get("senha_hash").is_none());

    // An access token is not a refresh token
    let (status, _) = send(
        &app.router,
        Method::POST,
        "/api/v1/auth/refresh",
        None,
        Some(json!({ "refresh_token": access })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_paciente_lifecycle() {
    let app = start_app().await;

    let (status, created) = app
        .post("/api/v1/pacientes", paciente("Maria da Silva", "12345678901"))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{created}");
    assert_eq!(created["message"], "Paciente criado com sucesso");
    let id = created["data"]["id"].as_str().unwrap().to_string();

    let (status, fetched) = app.get(&format!("/api/v1/pacientes/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["nome"], "Maria da Silva");
    assert_eq!(fetched["cpf"], "12345678901");

    let (status, dup) = app
        .post("/api/v1/pacientes", paciente("Outra Maria", "12345678901"))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(dup["statusCode"], 409);

    let mut mesmo_codigo = paciente("Joana Souza", "98765432100");
    mesmo_codigo["codigo_interno"] = created["data"]["codigo_interno"].clone();
    let (status, dup) = app.post("/api/v1/pacientes", mesmo_codigo).await;
    assert_eq!(status, StatusCode::CONFLICT);
    let codigo = created["data"]["codigo_interno"].as_str().unwrap();
    assert_eq!(
        dup["mensagem"],
        format!("Já existe um paciente com o código interno {codigo}")
    );

    let (status, found) = app.get("/api/v1/pacientes/cpf/12345678901").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(found["id"], id.as_str());

    let (status, blocked) = app
        .patch(&format!("/api/v1/pacientes/{id}/block"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(blocked["data"]["status"], "bloqueado");

    let (status, removed) = app.delete(&format!("/api/v1/pacientes/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(removed["message"], "Paciente removido com sucesso");

    // Soft delete keeps the row
    let (status, inativo) = app.get(&format!("/api/v1/pacientes/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(inativo["status"], "inativo");

    let (status, missing) = app
        .get(&format!("/api/v1/pacientes/{}", Uuid::new_v4()))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(missing["mensagem"], "Paciente não encontrado");
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_validation_and_malformed_ids() {
    let app = start_app().await;

    let (status, body) = app
        .post(
            "/api/v1/pacientes",
            json!({ "sexo": "F", "data_nascimento": "1990-05-20", "cpf": "12345678901" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["erros"].to_string().contains("nome"), "{body}");

    let (status, body) = app.get("/api/v1/pacientes/nao-e-uuid").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["mensagem"], "ID inválido: deve ser um UUID válido");

    let (status, _) = app.get(&format!("/api/v1/exames/{}", Uuid::new_v4())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_centro_custo_toggle_is_an_involution() {
    let app = start_app().await;

    let (status, centro) = app
        .post(
            "/api/v1/centros-custo",
            json!({ "codigo": "CC-01", "nome": "Laboratório" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = centro["id"].as_str().unwrap().to_string();
    let original = centro["ativo"].as_bool().unwrap();

    let (_, once) = app
        .patch(&format!("/api/v1/centros-custo/{id}/toggle-status"), None)
        .await;
    assert_eq!(once["ativo"].as_bool().unwrap(), !original);
    let (_, twice) = app
        .patch(&format!("/api/v1/centros-custo/{id}/toggle-status"), None)
        .await;
    assert_eq!(twice["ativo"].as_bool().unwrap(), original);

    let (status, _) = app
        .post(
            "/api/v1/centros-custo",
            json!({ "codigo": "CC-01", "nome": "Duplicado" }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app.delete(&format!("/api/v1/centros-custo/{id}")).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, ativos) = app.get("/api/v1/centros-custo/ativos").await;
    assert!(ativos.as_array().unwrap().is_empty());
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_convenio_and_planos() {
    let app = start_app().await;

    let (status, convenio) = app
        .post(
            "/api/v1/relacionamento/convenios",
            json!({ "nome": "Saúde Total", "tipo_faturamento": "tiss" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{convenio}");
    let id = convenio["id"].as_str().unwrap().to_string();

    let (status, plano) = app
        .post(
            &format!("/api/v1/relacionamento/convenios/{id}/planos"),
            json!({
                "codigo_plano": "BASICO",
                "nome_plano": "Básico",
                "vigencia_inicio": "2025-01-01"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{plano}");

    let (status, planos) = app
        .get(&format!("/api/v1/relacionamento/convenios/{id}/planos"))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(planos.as_array().unwrap().len(), 1);

    let (status, body) = app
        .get(&format!(
            "/api/v1/relacionamento/convenios/{}/planos",
            Uuid::new_v4()
        ))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["mensagem"].as_str().unwrap().starts_with("Convênio com ID"));
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_convenio_toggle_restores_the_starting_status() {
    let app = start_app().await;

    let (status, convenio) = app
        .post(
            "/api/v1/relacionamento/convenios",
            json!({ "nome": "Plano Sul", "status": "suspenso" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{convenio}");
    let id = convenio["id"].as_str().unwrap().to_string();
    let toggle = format!("/api/v1/relacionamento/convenios/{id}/toggle-status");

    let (status, body) = app.patch(&toggle, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    let (_, atual) = app
        .get(&format!("/api/v1/relacionamento/convenios/{id}"))
        .await;
    assert_eq!(atual["status"], "suspenso");

    let (status, _) = app
        .patch(
            &format!("/api/v1/relacionamento/convenios/{id}"),
            Some(json!({ "status": "inativo" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, primeiro) = app.patch(&toggle, None).await;
    assert_eq!(primeiro["status"], "ativo");
    let (_, segundo) = app.patch(&toggle, None).await;
    assert_eq!(segundo["status"], "inativo");
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_tabela_preco_with_items() {
    let app = start_app().await;

    let (_, exame) = app
        .post("/api/v1/exames", json!({ "codigo": "HEM", "nome": "Hemograma" }))
        .await;
    let exame_id = exame["id"].as_str().unwrap().to_string();

    let (status, tabela) = app
        .post(
            "/api/v1/relacionamento/tabelas-preco",
            json!({
                "codigo_interno": "TAB-01",
                "nome": "Tabela Particular",
                "tipo_tabela": "servico",
                "itens": [{ "exame_id": exame_id, "valor": 25.5 }]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{tabela}");
    let id = tabela["id"].as_str().unwrap().to_string();
    assert_eq!(tabela["itens"].as_array().unwrap().len(), 1);

    let (_, count) = app
        .get(&format!("/api/v1/relacionamento/tabelas-preco/{id}/count-itens"))
        .await;
    assert_eq!(count["count"], 1);

    let (status, body) = app
        .post(
            &format!("/api/v1/relacionamento/tabelas-preco/{id}/itens"),
            json!({ "exame_id": Uuid::new_v4(), "valor": 1e9 }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["erros"][0], "valor: deve ser no máximo 99999999.99");

    let (status, preco) = app
        .get(&format!(
            "/api/v1/relacionamento/tabelas-preco/{id}/exame/{exame_id}/preco"
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(preco["valor"], 25.5);

    let (_, pagina) = app
        .get("/api/v1/relacionamento/tabelas-preco?page=1&limit=5")
        .await;
    assert_eq!(pagina["meta"]["total"], 1);
    let (_, lista) = app.get("/api/v1/relacionamento/tabelas-preco").await;
    assert!(lista.is_array());

    let (status, _) = app
        .delete(&format!("/api/v1/relacionamento/tabelas-preco/{id}"))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app
        .get(&format!("/api/v1/relacionamento/tabelas-preco/{id}"))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_campo_formulario_search_and_alternativas() {
    let app = start_app().await;

    let (status, campo) = app
        .post(
            "/api/v1/infraestrutura/campos-formulario",
            json!({ "nome_campo": "METODOLOGIA", "descricao": "Metodologia do exame" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{campo}");
    let id = campo["id"].as_str().unwrap().to_string();

    let (status, dup) = app
        .post(
            "/api/v1/infraestrutura/campos-formulario",
            json!({ "nome_campo": "METODOLOGIA" }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(dup["mensagem"], "Campo METODOLOGIA já está cadastrado");

    for texto in ["Colorimétrico", "Enzimático"] {
        let (status, _) = app
            .post(
                &format!("/api/v1/infraestrutura/campos-formulario/{id}/alternativas"),
                json!({ "texto_alternativa": texto }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }
    let (_, alternativas) = app
        .get(&format!("/api/v1/infraestrutura/campos-formulario/{id}/alternativas"))
        .await;
    let ordens: Vec<i64> = alternativas
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["ordem"].as_i64().unwrap())
        .collect();
    assert_eq!(ordens, vec![1, 2]);

    let (status, page) = app
        .get("/api/v1/infraestrutura/campos-formulario/search?termo=metodo&page=1&limit=10")
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["meta"]["total"], 1);
    assert_eq!(page["meta"]["hasNextPage"], false);
    assert_eq!(page["data"][0]["alternativas"].as_array().unwrap().len(), 2);

    let (status, _) = app
        .get("/api/v1/infraestrutura/campos-formulario/nome/INEXISTENTE")
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_conta_pagar_codes_and_children() {
    let app = start_app().await;

    let body = json!({
        "credor_tipo": "fornecedor",
        "credor_id": Uuid::new_v4(),
        "unidade_devedora_id": Uuid::new_v4(),
        "tipo_documento": "boleto",
        "descricao": "Reagentes",
        "valor_bruto": 1000.0,
        "valor_liquido": 950.0,
        "competencia": "03/2025",
        "data_emissao": "2025-03-10",
        "impostos_retidos": [{ "tipo": "iss", "percentual": 5.0, "valor_calculado": 50.0 }],
        "parcelas": [
            { "numero": 1, "total_parcelas": 2, "valor": 475.0, "data_vencimento": "2025-04-10" },
            { "numero": 2, "total_parcelas": 2, "valor": 475.0, "data_vencimento": "2025-05-10" }
        ]
    });

    let (status, first) = app.post("/api/v1/financeiro/contas-pagar", body.clone()).await;
    assert_eq!(status, StatusCode::CREATED, "{first}");
    let (_, second) = app.post("/api/v1/financeiro/contas-pagar", body).await;

    let a = first["codigo_interno"].as_str().unwrap();
    let b = second["codigo_interno"].as_str().unwrap();
    assert!(a.starts_with("CAP"));
    assert_ne!(a, b);
    assert_eq!(first["parcelas"].as_array().unwrap().len(), 2);
    assert_eq!(first["status"], "a_pagar");

    let id = first["id"].as_str().unwrap();
    let (status, paga) = app
        .patch(
            &format!("/api/v1/financeiro/contas-pagar/{id}/status"),
            Some(json!({ "status": "paga" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(paga["status"], "paga");

    let (_, pagas) = app.get("/api/v1/financeiro/contas-pagar/status/paga").await;
    assert_eq!(pagas.as_array().unwrap().len(), 1);

    let (status, _) = app.get("/api/v1/financeiro/contas-pagar/status/desconhecido").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_salas_pages_are_disjoint() {
    let app = start_app().await;
    let unidade_id = Uuid::new_v4();

    for i in 0..5 {
        let (status, _) = app
            .post(
                "/api/v1/configuracoes/estrutura/salas",
                json!({
                    "codigo_sala": format!("S-{i:02}"),
                    "nome": format!("Sala {i}"),
                    "tipo_sala": "coleta",
                    "unidade_id": unidade_id
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (_, p1) = app
        .get("/api/v1/configuracoes/estrutura/salas?page=1&limit=2")
        .await;
    let (_, p2) = app
        .get("/api/v1/configuracoes/estrutura/salas?page=2&limit=2")
        .await;
    assert_eq!(p1["total"], 5);
    assert_eq!(p1["totalPages"], 3);

    let ids = |page: &Value| -> HashSet<String> {
        page["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|s| s["id"].as_str().unwrap().to_string())
            .collect()
    };
    assert!(ids(&p1).is_disjoint(&ids(&p2)));

    let (_, stats) = app
        .get("/api/v1/configuracoes/estrutura/salas/estatisticas")
        .await;
    assert_eq!(stats["total"], 5);
    assert_eq!(stats["porTipo"][0]["tipo"], "coleta");

    let (status, _) = app
        .post(
            "/api/v1/configuracoes/estrutura/salas",
            json!({
                "codigo_sala": "S-00",
                "nome": "Repetida",
                "tipo_sala": "coleta",
                "unidade_id": unidade_id
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_reference_data_after_seeding() {
    let app = start_app().await;
    erplab_db_postgres::seeds::seed_estados(&app.pool).await.unwrap();
    erplab_db_postgres::seeds::seed_bancos(&app.pool).await.unwrap();
    erplab_db_postgres::seeds::seed_cnae(&app.pool, None).await.unwrap();

    let (status, estados) = send(&app.router, Method::GET, "/api/v1/localidades/estados", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let estados = estados.as_array().unwrap();
    assert_eq!(estados.len(), 27);
    assert_eq!(estados[0]["nome"], "Acre");

    let (_, cnaes) = send(&app.router, Method::GET, "/api/v1/cnae/search?q=laborat", None, None).await;
    assert!(!cnaes.as_array().unwrap().is_empty());

    let (status, _) = send(
        &app.router,
        Method::GET,
        "/api/v1/cnae/codigo?codigo=0000000",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, bancos) = send(&app.router, Method::GET, "/api/v1/bancos?search=brasil", None, None).await;
    assert!(!bancos.as_array().unwrap().is_empty());
}

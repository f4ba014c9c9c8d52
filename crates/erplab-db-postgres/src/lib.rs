//! PostgreSQL storage for the ERP Laboratório backend.
//!
//! Each entity has a borrowed storage type (`PacienteStorage<'a>`,
//! `ConvenioStorage<'a>`, ...) built over a shared [`PgPool`]. Storages
//! return `Ok(None)` for missing rows and leave the HTTP wording of "not
//! found" to the handlers; uniqueness conflicts carry their final message.
//!
//! ```ignore
//! use erplab_db_postgres::{PostgresConfig, create_pool, migrations, PacienteStorage};
//!
//! let pool = create_pool(&PostgresConfig::new("postgres://localhost/erplab")).await?;
//! migrations::run(&pool).await?;
//! let total = PacienteStorage::new(&pool).stats(None).await?.total;
//! ```
//!
//! - [`config`]: pool configuration
//! - [`migrations`]: embedded schema migrations
//! - [`seeds`]: idempotent reference-data loaders
//! - [`ibge`]: IBGE localities client used by seeds and lookups

#[macro_use]
mod macros;

mod banco;
mod campo_formulario;
mod centro_custo;
mod cnae;
mod config;
mod conta_pagar;
mod convenio;
mod error;
mod estrutura;
mod exame;
mod localidade;
mod paciente;
mod pool;
mod row;
mod tabela_preco;
mod usuario;

pub mod ibge;
pub mod migrations;
pub mod seeds;

pub use config::PostgresConfig;
pub use error::{
    PG_FOREIGN_KEY_VIOLATION, PG_NUMERIC_OUT_OF_RANGE, PG_UNIQUE_VIOLATION, PostgresError, Result,
    StorageError, StorageResult, has_pg_error_code,
};
pub use pool::{create_lazy_pool, create_pool, mask_password, test_connection};

pub use banco::{Banco, BancoStorage, NovoBanco};
pub use campo_formulario::{
    AlternativaCampoFormulario, CampoFormulario, CampoFormularioBusca, CampoFormularioStorage,
    CreateAlternativa, CreateCampoFormulario, NomeCampoFormulario, UpdateAlternativa,
    UpdateCampoFormulario,
};
pub use centro_custo::{CentroCusto, CentroCustoStorage, CreateCentroCusto, UpdateCentroCusto};
pub use cnae::{Cnae, CnaeFiltros, CnaeStorage, NovoCnae, SEARCH_LIMIT as CNAE_SEARCH_LIMIT};
pub use conta_pagar::{
    ComposicaoFinanceira, ContaPagar, ContaPagarStorage, CreateContaPagar, CredorTipo,
    ImpostoRetido, Parcela, StatusContaPagar, TipoDocumento, TipoImposto, UpdateContaPagar,
    UpdateStatusContaPagar,
};
pub use convenio::{
    Convenio, ConvenioFiltros, ConvenioStorage, CreateConvenio, CreatePlano, Plano,
    StatusConvenio, StatusPlano, TipoFaturamento, TipoPlano, UpdateConvenio, UpdatePlano,
};
pub use estrutura::{
    CreateEquipamento, CreateSala, CreateSetor, Equipamento, EquipamentoFiltros,
    EquipamentoStorage, Estatisticas, QuantidadePorTipo, Sala, SalaFiltros, SalaStorage,
    SituacaoEquipamento, Setor, SetorStorage, TipoSala, TipoSetor, UpdateEquipamento, UpdateSala,
    UpdateSetor,
};
pub use exame::{CreateExame, Exame, ExameStorage};
pub use localidade::{Cidade, Estado, LocalidadeStorage, NovaCidade, NovoEstado};
pub use paciente::{
    CreatePaciente, EstadoCivil, Paciente, PacienteConvenioCount, PacienteFiltros, PacienteStats,
    PacienteStatusCount, PacienteStorage, Sexo, StatusPaciente, UpdatePaciente, UsarNomeSocial,
    calcular_idade, formatar_cep, formatar_cpf, formatar_telefone,
};
pub use tabela_preco::{
    CreateTabelaPreco, CreateTabelaPrecoItem, TabelaPreco, TabelaPrecoFiltros, TabelaPrecoItem,
    TabelaPrecoStorage, TipoTabela, UpdateTabelaPreco, UpdateTabelaPrecoItem,
};
pub use usuario::{NovoUsuario, Usuario, UsuarioStorage};

pub use sqlx_postgres::PgPool;

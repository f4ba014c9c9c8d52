//! `erplab-seed`: loads reference data into the configured database.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use erplab_db_postgres::ibge::IbgeClient;
use erplab_db_postgres::{PgPool, create_pool, mask_password, migrations, seeds};
use erplab_server::config::loader::{DEFAULT_CONFIG_FILE, load_config};

#[derive(Parser)]
#[command(name = "erplab-seed")]
#[command(about = "Load reference data into the ERP Laboratório database")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file
    #[arg(short, long, global = true, env = "ERPLAB_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    config: String,

    /// IBGE `/cnae/subclasses` JSON dump used by the `cnae` seed
    #[arg(long, global = true, env = "ERPLAB_CNAE_JSON")]
    cnae_json: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every seed: estados, bancos, cnae, campos-formulario
    All {
        /// Also fetch municipalities from IBGE (network)
        #[arg(long)]
        with_cidades: bool,
    },
    /// Brazilian banks
    Bancos,
    /// CNAE subclasses from the JSON dump or the embedded health list
    Cnae,
    /// Hierarchical CNAE CSV import
    CnaeSubclasses {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Form fields and their options
    CamposFormulario,
    /// The 27 federative units
    Estados,
    /// Municipalities of every state without cities (network)
    Cidades,
}

#[tokio::main]
async fn main() {
    if let Err(e) = dotenvy::dotenv() {
        if !matches!(e, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
        {
            eprintln!("Warning: Failed to load .env file: {e}");
        }
    }
    erplab_server::observability::init_tracing();

    if let Err(e) = run(Cli::parse()).await {
        tracing::error!(error = %format!("{e:#}"), "Seed failed");
        eprintln!("Seed failed: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let cfg = load_config(Some(&cli.config)).map_err(|e| anyhow::anyhow!(e))?;
    erplab_server::observability::apply_logging_level(&cfg.logging.level);

    let pg_config = cfg
        .postgres()
        .context("storage.postgres config is required")?;
    tracing::info!(url = %mask_password(&pg_config.url), "Connecting to PostgreSQL");
    let pool = create_pool(&pg_config).await?;
    migrations::run(&pool).await?;

    let ibge = || {
        IbgeClient::new(
            cfg.integrations.ibge_base_url.clone(),
            cfg.integrations.http_timeout(),
        )
    };
    let cnae_json = cli.cnae_json.as_deref();

    match cli.command {
        Commands::All { with_cidades } => {
            seed_all(&pool, cnae_json).await?;
            if with_cidades {
                report(seeds::seed_cidades(&pool, &ibge()?).await?);
            }
        }
        Commands::Bancos => report(seeds::seed_bancos(&pool).await?),
        Commands::Cnae => report(seeds::seed_cnae(&pool, cnae_json).await?),
        Commands::CnaeSubclasses { csv } => {
            report(seeds::seed_cnae_subclasses(&pool, &csv).await?);
        }
        Commands::CamposFormulario => report(seeds::seed_campos_formulario(&pool).await?),
        Commands::Estados => report(seeds::seed_estados(&pool).await?),
        Commands::Cidades => report(seeds::seed_cidades(&pool, &ibge()?).await?),
    }

    pool.close().await;
    Ok(())
}

async fn seed_all(pool: &PgPool, cnae_json: Option<&std::path::Path>) -> anyhow::Result<()> {
    report(seeds::seed_estados(pool).await?);
    report(seeds::seed_bancos(pool).await?);
    report(seeds::seed_cnae(pool, cnae_json).await?);
    report(seeds::seed_campos_formulario(pool).await?);
    Ok(())
}

fn report(result: seeds::SeedReport) {
    println!("{result}");
}

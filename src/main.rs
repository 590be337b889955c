use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use scan_intake::app::RegistrationUseCase;
use scan_intake::categories;
use scan_intake::client::{read_codes_file, ScanClient};
use scan_intake::config::Config;
use scan_intake::storage::{RegistryStore, SqliteStore};
use scan_intake::{logging, metrics, server};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "scan-intake")]
#[command(about = "Barcode registration service for scanned item labels")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP registration server
    Serve {
        /// Port to listen on (overrides config and PORT)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Load category reference rows from a TOML file into the store
    ImportCategories {
        /// TOML file with [[category]] entries
        file: PathBuf,
    },
    /// Register a single code directly against the store
    Register {
        code: String,
        /// Workflow stage (defaults to the configured stage)
        #[arg(long)]
        stage: Option<String>,
    },
    /// Send codes to a running server
    Scan {
        /// Codes to submit
        codes: Vec<String>,
        /// File with one code per line
        #[arg(long)]
        file: Option<PathBuf>,
        /// Workflow stage sent with every code
        #[arg(long)]
        stage: Option<String>,
        /// Base URL of the registration server
        #[arg(long, default_value = "http://localhost:3000")]
        url: String,
    },
}

fn open_store(config: &Config) -> Result<Arc<SqliteStore>> {
    let store = SqliteStore::open(&config.database.path, config.database.busy_timeout())
        .with_context(|| format!("opening store at {}", config.database.path.display()))?;
    Ok(Arc::new(store))
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;
    let _log_guard = logging::init_logging(&config.logging.dir);

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { port } => {
            if config.metrics.enabled {
                metrics::init_metrics();
            }
            let store: Arc<dyn RegistryStore> = open_store(&config)?;
            let use_case = Arc::new(RegistrationUseCase::new(
                store,
                config.registration.default_stage.clone(),
            ));
            server::start_server(use_case, port.unwrap_or(config.server.port)).await?;
        }
        Commands::ImportCategories { file } => {
            let store = open_store(&config)?;
            let rows = categories::load_categories(&file)
                .with_context(|| format!("reading categories from {}", file.display()))?;
            let count = categories::import_categories(store.as_ref(), &rows)?;
            println!("Imported {} categories into {}", count, store.path().display());
        }
        Commands::Register { code, stage } => {
            let store: Arc<dyn RegistryStore> = open_store(&config)?;
            let use_case = RegistrationUseCase::new(store, config.registration.default_stage.clone());
            let outcome = use_case.register(&code, stage.as_deref()).await;
            println!("{}", serde_json::to_string(&outcome)?);
        }
        Commands::Scan {
            mut codes,
            file,
            stage,
            url,
        } => {
            if let Some(path) = file {
                codes.extend(read_codes_file(&path)?);
            }
            if codes.is_empty() {
                bail!("no codes given; pass codes as arguments or with --file");
            }

            let client = ScanClient::new(&url);
            info!("Submitting {} codes to {}", codes.len(), client.endpoint());

            let mut failures = 0usize;
            for code in &codes {
                let reply = client.submit(code, stage.as_deref()).await?;
                if !reply.is_success() {
                    failures += 1;
                    warn!(code = %code, status = reply.http_status, "Scan rejected");
                }
                println!("{}", serde_json::to_string(&reply)?);
            }
            info!("Submitted {} codes, {} rejected", codes.len(), failures);
        }
    }
    Ok(())
}

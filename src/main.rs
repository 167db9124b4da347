use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dbscope::config::Config;
use dbscope::database::analytical::AnalyticalStoreSession;
use dbscope::database::models::VectorEndpoint;
use dbscope::database::registry::BackendRegistry;
use dbscope::database::vector::VectorStoreSession;
use dbscope::service::Service;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dbscope")]
#[command(about = "Inspect LanceDB vector stores and SQLite database files")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve JSON-lines requests on stdio
    Serve,
    /// Write the default configuration file, or show the current one
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// List the tables of a database file
    Tables {
        /// Path to the database file
        file: PathBuf,
    },
    /// Run a guarded SQL statement against a database file
    Query {
        /// Path to the database file
        file: PathBuf,
        /// SQL text to execute
        sql: String,
    },
    /// List the collections of a vector store
    Collections {
        /// Server host; defaults to the configured host
        #[arg(long, conflicts_with = "path")]
        host: Option<String>,
        /// Server port; defaults to the configured port
        #[arg(long, conflicts_with = "path")]
        port: Option<u32>,
        /// Local dataset directory instead of a server
        #[arg(long)]
        path: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load_default()?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.server.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Serve => {
            let registry = BackendRegistry::new(config)?;
            Service::new(Arc::new(registry)).serve_stdio().await?;
        }
        Commands::Config { show } => {
            if show {
                println!("# {}", config.config_file_path().display());
                print!("{}", config.to_toml()?);
            } else if config.config_file_path().exists() {
                println!(
                    "Configuration already exists at {}",
                    config.config_file_path().display()
                );
            } else {
                config.save()?;
                println!(
                    "Wrote default configuration to {}",
                    config.config_file_path().display()
                );
            }
        }
        Commands::Tables { file } => {
            let (session, _) = AnalyticalStoreSession::open(&file, &config.analytical).await?;
            let tables = session.list_tables().await;
            session.close().await;
            for table in tables? {
                println!("{}", table);
            }
        }
        Commands::Query { file, sql } => {
            let (session, _) = AnalyticalStoreSession::open(&file, &config.analytical).await?;
            let result = session.execute(&sql).await;
            session.close().await;
            let output = serde_json::to_string_pretty(&result?)
                .context("Failed to serialize query result")?;
            println!("{}", output);
        }
        Commands::Collections { host, port, path } => {
            let endpoint = match path {
                Some(path) => VectorEndpoint::local(path),
                None => VectorEndpoint::remote(
                    host.as_deref().unwrap_or(&config.vector.host),
                    port.unwrap_or(u32::from(config.vector.port)),
                )?,
            };
            let (session, _) = VectorStoreSession::connect(endpoint, &config.vector).await?;
            let collections = session.list_collections().await;
            session.disconnect().await;
            for collection in collections? {
                println!("{}", collection);
            }
        }
    }

    Ok(())
}

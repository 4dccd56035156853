use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use linelog::storage::SqliteRecordStore;
use linelog::Config;
use std::path::PathBuf;

/// LINE webhook receiver with a SQLite record log.
#[derive(Parser, Debug)]
#[command(name = "linelog", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the webhook gateway (default)
    Serve {
        #[command(flatten)]
        common: CommonArgs,
        /// Listen host (overrides config)
        #[arg(long)]
        host: Option<String>,
        /// Listen port (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Create the images directory and the records table, then exit
    Init {
        #[command(flatten)]
        common: CommonArgs,
    },
    /// Print every stored record, newest first
    History {
        #[command(flatten)]
        common: CommonArgs,
    },
}

#[derive(Args, Debug, Default)]
struct CommonArgs {
    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    linelog::logging::init_tracing()?;

    match cli.command.unwrap_or(Commands::Serve {
        common: CommonArgs::default(),
        host: None,
        port: None,
    }) {
        Commands::Serve { common, host, port } => {
            let mut config = Config::load(common.config.as_deref())?;
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            tracing::debug!(?config, "configuration resolved");
            linelog::gateway::run_gateway(config).await
        }
        Commands::Init { common } => {
            let config = Config::resolve(common.config.as_deref())?;
            linelog::gateway::prepare_storage(&config).await?;
            println!(
                "✅ Initialized {} and {}",
                config.database_path.display(),
                config.images_dir().display()
            );
            Ok(())
        }
        Commands::History { common } => {
            let config = Config::resolve(common.config.as_deref())?;
            let store = SqliteRecordStore::new(&config.database_path);
            let records = tokio::task::spawn_blocking(move || store.list_all()).await??;
            if records.is_empty() {
                println!("No records yet.");
            }
            for record in records {
                println!(
                    "#{} [{}] {}{}",
                    record.id,
                    record.timestamp,
                    record.text.as_deref().unwrap_or("(no text)"),
                    record
                        .image_path
                        .map(|p| format!(" 🖼  {p}"))
                        .unwrap_or_default()
                );
            }
            Ok(())
        }
    }
}

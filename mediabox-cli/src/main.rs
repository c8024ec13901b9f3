mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use mediabox_core::Settings;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "mediabox")]
#[command(about = "Operator tool for the mediabox upload store", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Verify that the configured storage backend is reachable
    Check,

    /// Print the gallery listing, newest first
    List {
        /// Print entries as JSON
        #[arg(long)]
        json: bool,
    },

    /// Upload files through the same checks as the web form
    Upload {
        /// Files or directories to upload
        #[arg(required = true)]
        paths: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mediabox_cli=info,mediabox_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let settings = Settings::from_env()?;

    match cli.command {
        Commands::Check => {
            commands::check::execute(&settings).await?;
        }
        Commands::List { json } => {
            commands::list::execute(&settings, json).await?;
        }
        Commands::Upload { paths } => {
            commands::upload::execute(paths, &settings).await?;
        }
    }

    Ok(())
}

use clap::{Parser, Subcommand};
use docbase::Result;
use docbase::commands::{run_cleanup, serve, show_config, show_config_location, show_status};

#[derive(Parser)]
#[command(name = "docbase")]
#[command(about = "Document ingestion and semantic retrieval server with grounded answer generation")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Bind host, overriding the configuration file
        #[arg(long)]
        host: Option<String>,
        /// Bind port, overriding the configuration file
        #[arg(long)]
        port: Option<u16>,
    },
    /// Show the active configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Show index and storage health
    Status,
    /// Delete uploaded files older than the retention window
    Cleanup,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { host, port } => {
            serve(host, port).await?;
        }
        Commands::Config { show } => {
            if show {
                show_config()?;
            } else {
                show_config_location()?;
            }
        }
        Commands::Status => {
            show_status().await?;
        }
        Commands::Cleanup => {
            run_cleanup().await?;
        }
    }

    Ok(())
}

//! CLI entry point for folio

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "folio")]
#[command(version)]
#[command(about = "Personal site server with a blog, contact form and push webhook", long_about = None)]
struct Cli {
    /// Set the base directory (defaults to current directory)
    #[arg(short, long, global = true)]
    cwd: Option<PathBuf>,

    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the site server
    #[command(alias = "s")]
    Serve {
        /// Port to listen on (defaults to PORT or the configured port)
        #[arg(short, long)]
        port: Option<u16>,

        /// IP address to bind to
        #[arg(short, long, default_value = "0.0.0.0")]
        ip: String,
    },

    /// List site information
    List {
        /// What to list (posts, errors)
        #[arg(default_value = "posts")]
        r#type: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.debug {
        "folio=debug,tower_http=debug,info"
    } else {
        "folio=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine base directory
    let base_dir = match cli.cwd {
        Some(dir) => dir,
        None => std::env::current_dir().context("cannot determine current directory")?,
    };
    let site = folio::Site::new(&base_dir)?;
    tracing::debug!("Loaded configuration: {:?}", site.config);

    match cli.command.unwrap_or(Commands::Serve {
        port: None,
        ip: "0.0.0.0".to_string(),
    }) {
        Commands::Serve { port, ip } => {
            let port = port.unwrap_or(site.config.port);
            tracing::info!("Serving {:?} on {}:{}", site.base_dir, ip, port);
            folio::server::start(&site, &ip, port).await?;
        }

        Commands::List { r#type } => {
            folio::commands::list::run(&site, &r#type)?;
        }
    }

    Ok(())
}

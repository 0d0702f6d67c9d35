//! docsync CLI
//!
//! Command-line tools for inspecting a document mirror offline, against a
//! schema file and an NDJSON dataset export.
//!
//! # Commands
//!
//! - `schema` - Print the rewritten host schema
//! - `import` - Build the mirror from an export and report what it holds
//! - `webhook` - Apply a webhook body on top of an imported export
//! - `resolve` - Print a node with its references resolved

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// docsync command-line mirror tools.
#[derive(Parser)]
#[command(name = "docsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a JSON mirror configuration
    #[arg(global = true, short, long)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Inputs shared by commands that build a mirror.
#[derive(clap::Args)]
struct MirrorArgs {
    /// Deployed GraphQL schema (SDL)
    #[arg(short, long)]
    schema: PathBuf,

    /// Dataset export (NDJSON)
    #[arg(short, long)]
    export: PathBuf,

    /// Let drafts replace their published documents
    #[arg(long)]
    overlay_drafts: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the rewritten host schema
    Schema {
        /// Deployed GraphQL schema (SDL)
        #[arg(short, long)]
        schema: PathBuf,

        /// Output format (sdl, json)
        #[arg(short, long, default_value = "sdl")]
        format: String,
    },

    /// Build the mirror from an export and report what it holds
    Import {
        #[command(flatten)]
        mirror: MirrorArgs,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Apply a webhook body on top of an imported export
    Webhook {
        #[command(flatten)]
        mirror: MirrorArgs,

        /// File holding the webhook body
        #[arg(short, long)]
        payload: PathBuf,
    },

    /// Print a node with its references resolved
    Resolve {
        #[command(flatten)]
        mirror: MirrorArgs,

        /// Published id of the document
        #[arg(short, long)]
        id: String,

        /// Depth bound for resolution
        #[arg(short = 'd', long)]
        max_depth: Option<usize>,
    },

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = cli.config.as_deref();
    match cli.command {
        Commands::Schema { schema, format } => {
            commands::schema::run(config, &schema, &format)?;
        }
        Commands::Import { mirror, format } => {
            let options = mirror.options(config)?;
            commands::import::run(options, &format).await?;
        }
        Commands::Webhook { mirror, payload } => {
            let options = mirror.options(config)?;
            commands::webhook::run(options, &payload).await?;
        }
        Commands::Resolve {
            mirror,
            id,
            max_depth,
        } => {
            let options = mirror.options(config)?;
            commands::resolve::run(options, &id, max_depth).await?;
        }
        Commands::Version => {
            println!("docsync CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}

impl MirrorArgs {
    fn options(
        self,
        config: Option<&std::path::Path>,
    ) -> Result<commands::MirrorOptions, Box<dyn std::error::Error>> {
        let mut config = commands::load_config(config, &self.export)?;
        if self.overlay_drafts {
            config.overlay_drafts = true;
        }
        Ok(commands::MirrorOptions {
            config,
            schema: self.schema,
            export: self.export,
        })
    }
}

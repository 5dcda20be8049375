mod commands;
mod config;
mod context;
mod export;
mod output;
mod traits;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use commands::{CommandOptions, DiscoverCommand, ExportCommand, ExportOptions, TypesCommand};
use context::Context;
use export::Layout;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter
const LOG_ENV: &str = "IACPORT_LOG";

#[derive(Parser)]
#[command(name = "iacport")]
#[command(about = "Export a live Cribl configuration as Terraform with import blocks", long_about = None)]
#[command(version)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GlobalArgs {
    /// Config file (defaults to ~/.iacport/config.yaml when present)
    #[arg(long, global = true, env = "IACPORT_CONFIG")]
    config: Option<PathBuf>,

    /// Management API base URL
    #[arg(long, global = true, env = "CRIBL_BASE_URL")]
    base_url: Option<String>,

    /// Answer API calls from a recorded snapshot file instead of the network
    #[arg(long, global = true)]
    snapshot: Option<PathBuf>,

    /// Products whose groups are exported (repeatable)
    #[arg(long = "product", global = true)]
    products: Vec<String>,

    /// Only these groups, by id or name (repeatable)
    #[arg(short, long = "group", global = true)]
    groups: Vec<String>,

    /// Only these resource types (repeatable)
    #[arg(short, long = "type", global = true)]
    types: Vec<String>,
}

impl From<GlobalArgs> for CommandOptions {
    fn from(args: GlobalArgs) -> Self {
        Self {
            config: args.config,
            base_url: args.base_url,
            snapshot: args.snapshot,
            products: args.products,
            groups: args.groups,
            types: args.types,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List the resource types that can be exported
    Types,

    /// Count existing resources per type and group
    Discover,

    /// Export resources as Terraform modules with import blocks
    Export {
        /// Output directory
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Module layout: flat or per-scope
        #[arg(long)]
        layout: Option<Layout>,

        /// Maximum concurrent conversions per type
        #[arg(short = 'j', long)]
        parallelism: Option<usize>,

        /// Remove previously generated .tf files first
        #[arg(long)]
        clean: bool,
    },
}

fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging();

    let ctx = Context::new();
    let options = CommandOptions::from(cli.global);

    match cli.command {
        Commands::Types => {
            TypesCommand::execute(&ctx, &options)?;
        }
        Commands::Discover => {
            DiscoverCommand::execute(&ctx, &options)?;
        }
        Commands::Export {
            output,
            layout,
            parallelism,
            clean,
        } => {
            let export = ExportOptions {
                output,
                layout,
                parallelism,
                clean,
            };
            ExportCommand::execute(&ctx, &options, &export)?;
        }
    }

    Ok(())
}

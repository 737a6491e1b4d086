//! crossnode CLI - Operator tooling for cross-border authentication nodes
//!
//! This CLI enables operators to:
//! - Validate a node's environment before deployment
//! - Preview how published assurance levels read to legacy and current peers
//! - Check a set of requested attributes against the node's attribute policy
//! - Fetch and verify a peer's trust metadata against a pinned digest

use clap::{Parser, Subcommand};

mod commands;
mod error;
mod logging;

use error::CliResult;

/// crossnode CLI - Protocol validation tooling
#[derive(Parser)]
#[command(name = "crossnode")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Log filter directive, overridden by RUST_LOG
    #[arg(long, global = true, env = "CROSSNODE_LOG", default_value = "warn")]
    log_level: String,

    /// Emit logs as JSON on stderr
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load and validate the engine configuration from the environment
    CheckConfig(commands::check_config::CheckConfigArgs),

    /// Negotiate a level of assurance against a published list
    Negotiate(commands::negotiate::NegotiateArgs),

    /// Check requested attributes against the attribute policy
    CheckAttributes(commands::attributes::CheckAttributesArgs),

    /// Fetch and verify a peer's trust metadata
    Resolve(commands::resolve::ResolveArgs),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init_logging(&cli.log_level, cli.json_logs);

    let result = run(cli).await;

    match result {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            e.print();
            std::process::exit(e.exit_code());
        }
    }
}

async fn run(cli: Cli) -> CliResult<()> {
    match cli.command {
        Commands::CheckConfig(args) => commands::check_config::execute(args),
        Commands::Negotiate(args) => commands::negotiate::execute(args),
        Commands::CheckAttributes(args) => commands::attributes::execute(args),
        Commands::Resolve(args) => commands::resolve::execute(args).await,
    }
}

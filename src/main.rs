use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use xchange::core::log::init_logging;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Display supported currencies
    List,
    /// Convert an amount of the selected currency into every other currency
    Rates {
        /// Currency to convert from; remembered for later runs
        code: Option<String>,

        /// Amount to convert
        #[arg(short, long, default_value_t = 1.0)]
        amount: f64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => xchange::cli::setup::setup(),
        Some(Commands::List) => {
            xchange::run_command(xchange::AppCommand::List, cli.config_path.as_deref()).await
        }
        Some(Commands::Rates { code, amount }) => {
            xchange::run_command(
                xchange::AppCommand::Rates { code, amount },
                cli.config_path.as_deref(),
            )
            .await
        }
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}

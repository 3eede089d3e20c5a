use clap::{Parser, Subcommand};
use cropledger::cli::history::RecordKind;
use cropledger::config::resolve_config_path;
use cropledger::ledger::Identity;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "cropledger")]
#[command(about = "Append-only agricultural traceability ledger", long_about = None)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a YAML script of ledger commands
    Apply {
        script: PathBuf,
        /// Caller for steps that name none
        #[arg(long)]
        caller: Option<String>,
        #[arg(long)]
        stop_on_error: bool,
        /// Print emitted events after the step results
        #[arg(long)]
        events: bool,
    },
    /// Print the revision history of a record
    History {
        #[arg(value_enum)]
        kind: RecordKind,
        key: String,
    },
    /// Print a stored record as JSON
    Show {
        #[arg(value_enum)]
        kind: RecordKind,
        key: String,
    },
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    Init {
        #[arg(long)]
        stdout: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cropledger=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config_path = resolve_config_path(cli.config.as_deref());

    match cli.command {
        Commands::Apply {
            script,
            caller,
            stop_on_error,
            events,
        } => {
            cropledger::cli::apply::apply(
                config_path.as_deref(),
                &script,
                caller.map(Identity::new),
                stop_on_error,
                events,
            )
            .await?;
        }
        Commands::History { kind, key } => {
            cropledger::cli::history::history(config_path.as_deref(), kind, &key).await?;
        }
        Commands::Show { kind, key } => {
            cropledger::cli::history::show(config_path.as_deref(), kind, &key).await?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Init { stdout } => {
                cropledger::cli::config::init(stdout)?;
            }
        },
    }

    Ok(())
}

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use pollmux::cli;
use std::io;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "pollmux")]
#[command(author, version, about = "Shared polling scheduler for dashboard data feeds")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll all configured feeds and log deliveries until interrupted
    Watch {
        /// Path to a config file (default: the user config directory)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Fetch one feed type once and print the JSON payload
    Fetch {
        /// Feed type to fetch (e.g. jobs, dashboard-stats)
        feed_type: String,

        /// Pretty-print the payload
        #[arg(long)]
        pretty: bool,

        /// Path to a config file (default: the user config directory)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Watch { config } => {
            init_logging();
            cli::watch::run(config.as_deref()).await
        }
        Commands::Fetch {
            feed_type,
            pretty,
            config,
        } => {
            init_logging();
            cli::fetch::run(&feed_type, pretty, config.as_deref()).await
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            generate(shell, &mut cmd, name, &mut io::stdout());
            Ok(())
        }
    }
}

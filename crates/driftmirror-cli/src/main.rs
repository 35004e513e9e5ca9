use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use driftmirror_core::Config;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "driftmirror-cli", version, about = "DriftMirror CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Goal management
    Goal {
        #[command(subcommand)]
        action: commands::goal::GoalAction,
    },
    /// Record and list check-ins
    Checkin {
        #[command(subcommand)]
        action: commands::checkin::CheckinAction,
    },
    /// Plan versions
    Plan {
        #[command(subcommand)]
        action: commands::plan::PlanAction,
    },
    /// Drift dashboard for a goal
    Status {
        /// Goal ID
        goal_id: i64,
    },
    /// Plan suggestions
    Suggest {
        #[command(subcommand)]
        action: commands::suggest::SuggestAction,
    },
    /// Mirror reports
    Report {
        #[command(subcommand)]
        action: commands::report::ReportAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Print shell completions
    Completions {
        shell: Shell,
    },
}

/// Logs go to stderr so stdout stays JSON. `DRIFTMIRROR_LOG` wins over the
/// configured level.
fn init_tracing() {
    let filter = EnvFilter::try_from_env("DRIFTMIRROR_LOG")
        .unwrap_or_else(|_| EnvFilter::new(Config::load_or_default().log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing();

    let result = match cli.command {
        Commands::Goal { action } => commands::goal::run(action),
        Commands::Checkin { action } => commands::checkin::run(action),
        Commands::Plan { action } => commands::plan::run(action),
        Commands::Status { goal_id } => commands::status::run(goal_id),
        Commands::Suggest { action } => commands::suggest::run(action),
        Commands::Report { action } => commands::report::run(action),
        Commands::Config { action } => commands::config::run(action),
        Commands::Completions { shell } => {
            clap_complete::generate(
                shell,
                &mut Cli::command(),
                "driftmirror-cli",
                &mut std::io::stdout(),
            );
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(
    name = "meeting-reminder",
    version,
    about = "Blink and buzz before your next meeting"
)]
struct Cli {
    /// Verbose logging (RUST_LOG overrides)
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch the calendar and fire reminders
    Run(commands::run::RunArgs),
    /// Show the next event the reminder would fire for
    Next(commands::next::NextArgs),
    /// Authentication management
    Auth {
        #[command(subcommand)]
        action: commands::auth::AuthAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Alert device checks
    Device {
        #[command(subcommand)]
        action: commands::device::DeviceAction,
    },
}

fn init_tracing(debug: bool) {
    let default = if debug {
        "meeting_reminder=debug,meeting_reminder_core=debug,info"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .with_target(debug)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let result = match cli.command {
        Commands::Run(args) => commands::run::run(args).await,
        Commands::Next(args) => commands::next::run(args).await,
        Commands::Auth { action } => commands::auth::run(action).await,
        Commands::Config { action } => commands::config::run(action),
        Commands::Device { action } => commands::device::run(action).await,
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

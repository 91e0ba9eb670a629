//! bep-driver - runs a build tool and aggregates its build event stream.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use bep_driver::config::DriverConfig;
use bep_driver::display::{print_summary, ConsoleSink};
use bep_driver::exec::{BazelCommandBuilder, BuildCommand};
use bep_driver::invocation::Invocation;

#[derive(Parser)]
#[command(
    name = "bep-driver",
    about = "Runs a build tool and aggregates its build event stream",
    version
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Config file path (defaults to the platform config directory).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Disable colored output.
    #[arg(long)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the given targets.
    Build {
        /// Target labels.
        #[arg(required = true)]
        targets: Vec<String>,
        /// Extra command flags passed through to the build tool.
        #[arg(long = "flag")]
        flags: Vec<String>,
    },
    /// Build and run tests for the given targets.
    Test {
        #[arg(required = true)]
        targets: Vec<String>,
        #[arg(long = "flag")]
        flags: Vec<String>,
    },
    /// Build and run a single target.
    Run {
        target: String,
        #[arg(long = "flag")]
        flags: Vec<String>,
    },
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}

fn build_command(config: &DriverConfig, command: Commands) -> BazelCommandBuilder {
    let (verb, targets, flags) = match command {
        Commands::Build { targets, flags } => (BuildCommand::Build, targets, flags),
        Commands::Test { targets, flags } => (BuildCommand::Test, targets, flags),
        Commands::Run { target, flags } => (BuildCommand::Run, vec![target], flags),
    };
    let mut builder = BazelCommandBuilder::new(&config.binary, verb);
    for flag in &config.startup_flags {
        builder = builder.startup_flag(flag.clone());
    }
    builder
        .flags(config.build_flags.iter().cloned())
        .flags(flags)
        .targets(targets)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match DriverConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Failed to load configuration");
            return ExitCode::FAILURE;
        }
    };

    let color = !cli.no_color;
    let sink = Arc::new(ConsoleSink::new(color));
    let invocation = Invocation::start(build_command(&config, cli.command), sink, &config);

    let cancel = invocation.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received; cancelling build");
            cancel.cancel();
        }
    });

    let outcome = invocation.await_result().await;
    print_summary(&outcome, color);

    match outcome {
        Ok(result) => u8::try_from(result.exit_code)
            .map(ExitCode::from)
            .unwrap_or(ExitCode::FAILURE),
        Err(_) => ExitCode::FAILURE,
    }
}

use crate::{
    commands::Commands,
    error::CliError,
    shutdown::{ExitCode, ShutdownCoordinator},
};
use clap::Parser;
use connectors::simulated::{
    SimulatedCompanySource, SimulatedEmailSink, SimulatedOrderEnricher,
};
use engine_config::settings::{error::SettingsError, validator::SettingsValidator};
use engine_processing::error::PipelineError;
use engine_runtime::execution::PipelineExecutor;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod bench;
mod commands;
mod error;
mod output;
mod shutdown;

#[derive(Parser)]
#[command(
    name = "batchflow",
    version = "0.1.0",
    about = "Paginated fetch, enrich and batched delivery with backpressure"
)]
struct Cli {
    #[arg(
        long,
        global = true,
        default_value = "info",
        help = "Log level used when RUST_LOG is not set"
    )]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let shutdown = ShutdownCoordinator::new(CancellationToken::new());
    shutdown.register_handlers();

    let code = match execute(cli.command, &shutdown).await {
        Ok(()) => ExitCode::Success,
        Err(err) if err.is_cancelled() || shutdown.is_shutdown_requested() => {
            warn!("Run cancelled before completion");
            ExitCode::ShutdownRequested
        }
        Err(CliError::Settings(SettingsError::ValidationFailed(violations)))
        | Err(CliError::Pipeline(PipelineError::Config(SettingsError::ValidationFailed(
            violations,
        )))) => {
            output::print_violations(&violations);
            ExitCode::InvalidSettings
        }
        Err(err) => {
            error!(error = %err, "batchflow failed");
            eprintln!("{err}");
            ExitCode::GeneralError
        }
    };

    std::process::exit(code.as_i32());
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn execute(command: Commands, shutdown: &ShutdownCoordinator) -> Result<(), CliError> {
    match command {
        Commands::Run {
            settings,
            records,
            fail_every,
            json,
            output,
        } => {
            let settings = settings.resolve().await?;
            info!(
                records,
                policy = %settings.policy,
                "Running pipeline over simulated collaborators"
            );

            let summary = PipelineExecutor::new(
                settings,
                Arc::new(SimulatedCompanySource::new(records)),
                Arc::new(SimulatedOrderEnricher::new().with_failures_every(fail_every)),
                Arc::new(SimulatedEmailSink::new()),
            )
            .with_cancellation(shutdown.cancel_token())
            .run()
            .await?;

            match output {
                Some(path) => output::write_summary(&summary, &path).await?,
                None => output::print_summary(&summary, json)?,
            }
        }
        Commands::Validate { settings, json } => {
            let settings = settings.resolve().await?;
            let validated = SettingsValidator::new().validate(&settings)?;
            output::print_validated(&validated, json)?;
        }
        Commands::Bench {
            settings,
            records,
            repetitions,
            json,
        } => {
            let settings = settings.resolve().await?;
            let report =
                bench::run(settings, records, repetitions, shutdown.cancel_token()).await?;
            output::print_bench(&report, json)?;
        }
    }

    Ok(())
}

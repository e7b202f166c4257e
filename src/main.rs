use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use clipcast_lib::bootstrap::tracing::init_tracing_subscriber;
use clipcast_lib::bootstrap::{report_fatal, resolve_config, run_client, run_server};
use clipcast_lib::{Cli, Commands};
use tokio_util::sync::CancellationToken;
use tracing::info;

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_tracing_subscriber(cli.log_file) {
        eprintln!("Failed to initialize tracing: {e}");
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report_fatal(&e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = resolve_config(cli.config.as_deref())?;
    cli.apply_overrides(&mut config);
    config.validate().context("invalid configuration")?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build the tokio runtime")?;

    let result = runtime.block_on(async {
        let cancel = CancellationToken::new();
        let interrupt = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupt received, shutting down");
                interrupt.cancel();
            }
        });

        match cli.command {
            Commands::Serve { .. } => run_server(&config, cancel).await,
            Commands::Subscribe { .. } => run_client(&config, cancel).await,
        }
    });

    // A pending stdin read would otherwise hold the runtime open.
    runtime.shutdown_timeout(Duration::from_millis(500));
    result
}

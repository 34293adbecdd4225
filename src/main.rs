use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use sessionquery_core::config::{Config, Settings};
use sessionquery_core::{HostBackend, Query, QueryController, QueryError, ResultFormatter};

/// Exit code for bad arguments or configuration
const EXIT_INVALID_ARGUMENT: u8 = 3;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Parse CLI arguments; clap's own exit code would collide with ours
    let cli = match Config::try_parse_args() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::from(EXIT_INVALID_ARGUMENT),
            };
        }
    };

    // Setup logging
    setup_logging(cli.debug);

    match run(&cli).await {
        Ok(output) => {
            println!("{}", output);
            ExitCode::SUCCESS
        }
        Err(e) => {
            report(&e);
            ExitCode::from(exit_code(&e))
        }
    }
}

async fn run(cli: &Config) -> Result<String> {
    // Load settings
    let mut settings = Settings::load(cli.config.as_ref())?;
    settings.merge_cli(cli);
    settings.validate();
    tracing::debug!("Settings: {:?}", settings);

    let query = Query::from_args(cli.name.clone(), cli.lines.as_deref())?;

    // The host handle lives for this query only and is dropped before exit
    let host = HostBackend::from_settings(&settings);
    let outcome = QueryController::new(&host, settings.query_options())
        .run(query)
        .await?;

    ResultFormatter::new(settings.format)
        .render(&outcome)
        .context("Failed to render output")
}

/// Host errors carry their own code; everything else is a usage problem
fn exit_code(err: &anyhow::Error) -> u8 {
    err.downcast_ref::<QueryError>()
        .map_or(EXIT_INVALID_ARGUMENT, QueryError::exit_code)
}

fn report(err: &anyhow::Error) {
    eprintln!("error: {:#}", err);
    if let Some(query_err) = err.downcast_ref::<QueryError>() {
        eprintln!("hint: {}", query_err.remediation());
    }
}

fn setup_logging(debug: bool) {
    let filter = if debug {
        EnvFilter::new("sessionquery=debug,sessionquery_core=debug")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("sessionquery=warn,sessionquery_core=warn"))
    };

    // stdout carries the query output
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

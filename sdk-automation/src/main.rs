use clap::Parser;
use sdk_automation::cli::{run, Cli};
use std::process::ExitCode;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    // Logs go to stderr; stdout carries subprocess output and the report.
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sdk_automation=info,sdk_automation_core=info".into()),
        )
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
    tracing::info!("CLI application startup: tracing initialised, environment loaded");

    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => {
            tracing::info!(code, "CLI completed");
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
        Err(e) => {
            tracing::error!(error = ?e, "CLI exited with error");
            ExitCode::FAILURE
        }
    }
}

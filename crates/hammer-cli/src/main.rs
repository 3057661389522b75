//! Hammer CLI - seed tools, plate engraving and firmware signing

use std::io;
use std::process::ExitCode;

use clap::Parser;
use hammer_cli::{exit_code, run, Cli};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> ExitCode {
    // Logs go to stderr; stdout carries command output.
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "hammer=info".into()))
        .with(fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();
    let mut stdin = io::stdin().lock();
    let mut stdout = io::stdout().lock();
    match run(cli, &mut stdin, &mut stdout).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("hammer: {e:#}");
            ExitCode::from(exit_code(&e))
        }
    }
}

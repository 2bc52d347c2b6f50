use clap::Parser;
use redact_core::cancel::CancelToken;
use redact_core::logging;

mod cli;

use crate::cli::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Log to the state dir when possible, stderr otherwise.
    if let Err(err) = logging::init_logging(cli.verbose) {
        logging::init_logging_stderr(cli.verbose);
        tracing::warn!("could not open log file, logging to stderr: {:#}", err);
    }

    let cancel = CancelToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("interrupted, stopping after running requests...");
            on_signal.cancel();
        }
    });

    let result = match tokio::task::spawn_blocking(move || cli.run(cancel)).await {
        Ok(result) => result,
        Err(join_err) => Err(anyhow::anyhow!("command panicked: {}", join_err)),
    };
    if let Err(err) = result {
        eprintln!("redact error: {:#}", err);
        std::process::exit(1);
    }
}

//! This file defines the usagestat binary entry point.

use usagestat::app;
use usagestat::cli;
use usagestat::dataset::Dataset;
use usagestat::error::{log_error, UsageError};
use usagestat::metrics;
use usagestat::server;
use usagestat::tracing;

use std::process::ExitCode;

/// Load the dataset and serve it until shutdown.
async fn run(args: &cli::CommandLineArgs) -> Result<(), UsageError> {
    metrics::register_metrics()?;
    // A dataset that fails to load aborts startup rather than serving partial data.
    let dataset = Dataset::load(&args.data_path)?;
    metrics::record_dataset_size(dataset.len());
    let service = app::service(args, dataset);
    server::serve(args, service).await
}

/// Application entry point
#[tokio::main]
async fn main() -> ExitCode {
    let args = cli::parse();
    tracing::init_tracing(&args);
    ::tracing::debug!("{:?}", args);
    match run(&args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log_error(&err);
            ExitCode::FAILURE
        }
    }
}

use crate::cli::CommandLineArgs;
use crate::dataset::Dataset;

use std::sync::Arc;

/// Shared application state passed to each request handler.
pub struct AppState {
    /// Command line arguments.
    pub args: CommandLineArgs,

    /// The dataset, loaded once and never modified.
    pub dataset: Dataset,
}

impl AppState {
    /// Create and return an [AppState].
    pub fn new(args: &CommandLineArgs, dataset: Dataset) -> Self {
        Self {
            args: args.clone(),
            dataset,
        }
    }
}

/// AppState wrapped in an Atomic Reference Count (Arc) to allow multiple references.
pub type SharedAppState = Arc<AppState>;

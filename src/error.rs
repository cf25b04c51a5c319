//! Error handling.

use axum::{
    extract::rejection::QueryRejection,
    http::header,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::error::Error;
use thiserror::Error;
use tracing::{event, Level};

/// Usage statistics server error type
///
/// Covers both startup failures (loading the dataset, binding the server) and the small set of
/// request failures. Each variant may result in a different API error response.
#[derive(Debug, Error)]
pub enum UsageError {
    /// Error opening or reading the dataset file
    #[error("failed to read dataset {path}")]
    DatasetIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Error parsing the dataset as CSV
    #[error("failed to parse dataset")]
    Csv(#[from] csv::Error),

    /// A column the aggregations depend on is absent from the header row
    #[error("dataset is missing required column {column}")]
    MissingColumn { column: &'static str },

    /// A date cell that could not be parsed
    #[error("invalid date {value:?} in data row {row}")]
    InvalidDate { row: usize, value: String },

    /// A region cell that is empty
    #[error("empty region in data row {row}")]
    EmptyRegion { row: usize },

    /// A usage_cpu cell that is empty, not numeric or not finite
    #[error("invalid usage_cpu {value:?} in data row {row}")]
    InvalidUsage { row: usize, value: String },

    /// Error deserialising query parameters
    #[error("request query is not valid")]
    QueryRejection(#[from] QueryRejection),

    /// Error validating query parameters
    #[error("request query is not valid")]
    QueryValidation(#[from] validator::ValidationErrors),

    /// Request for a path with no route
    #[error("no route for {path}")]
    NotFound { path: String },

    /// Error serialising a response body
    #[error("failed to serialise response")]
    Serialise(#[from] serde_json::Error),

    /// Error encoding metrics
    #[error("failed to encode metrics")]
    Metrics(#[from] prometheus::Error),

    /// Encoded metrics were not valid UTF-8
    #[error("failed to encode metrics")]
    MetricsUtf8(#[from] std::string::FromUtf8Error),

    /// Invalid listen address
    #[error("invalid host name, IP address or port number {address}")]
    ListenAddress {
        address: String,
        #[source]
        source: std::net::AddrParseError,
    },

    /// Error locating or loading TLS certificate files
    #[error("failed to load TLS file {path}")]
    Tls {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Error running the HTTP server
    #[error("server error")]
    Server(#[source] std::io::Error),
}

impl IntoResponse for UsageError {
    /// Convert from a `UsageError` into an [axum::response::Response].
    fn into_response(self) -> Response {
        ErrorResponse::from(self).into_response()
    }
}

/// Body of error response
///
/// Implements serde (de)serialise.
#[derive(Deserialize, Serialize)]
struct ErrorBody {
    /// Main error message
    message: String,

    /// Optional list of causes
    #[serde(skip_serializing_if = "Option::is_none")]
    caused_by: Option<Vec<String>>,
}

impl ErrorBody {
    /// Return a new ErrorBody
    ///
    /// # Arguments
    ///
    /// * `error`: The error that occurred
    fn new<E>(error: &E) -> Self
    where
        E: std::error::Error + Send + Sync,
    {
        let message = error.to_string();
        let mut causes = cause_chain(error);
        causes.dedup();
        let caused_by = if causes.is_empty() {
            None
        } else {
            Some(causes)
        };
        ErrorBody { message, caused_by }
    }
}

/// Returns the messages of every source in an error's chain, outermost first.
pub fn cause_chain(error: &dyn Error) -> Vec<String> {
    let mut causes = Vec::new();
    let mut current = error.source();
    while let Some(source) = current {
        causes.push(source.to_string());
        current = source.source();
    }
    causes
}

/// Log an error and its cause chain at error level.
pub fn log_error(error: &dyn Error) {
    event!(Level::ERROR, "{}", error);
    for cause in cause_chain(error) {
        event!(Level::ERROR, "Caused by: {}", cause);
    }
}

/// A response to send in error cases
///
/// Implements serde (de)serialise.
#[derive(Deserialize, Serialize)]
struct ErrorResponse {
    /// HTTP status of the response
    #[serde(skip)]
    status: StatusCode,

    /// Response body
    error: ErrorBody,
}

impl ErrorResponse {
    /// Return a new ErrorResponse
    ///
    /// # Arguments
    ///
    /// * `status`: HTTP status of the response
    /// * `error`: The error that occurred. This will be formatted into a suitable `ErrorBody`
    fn new<E>(status: StatusCode, error: &E) -> Self
    where
        E: std::error::Error + Send + Sync,
    {
        ErrorResponse {
            status,
            error: ErrorBody::new(error),
        }
    }

    /// Return a 400 bad request ErrorResponse
    fn bad_request<E>(error: &E) -> Self
    where
        E: std::error::Error + Send + Sync,
    {
        Self::new(StatusCode::BAD_REQUEST, error)
    }

    /// Return a 404 not found ErrorResponse
    fn not_found<E>(error: &E) -> Self
    where
        E: std::error::Error + Send + Sync,
    {
        Self::new(StatusCode::NOT_FOUND, error)
    }

    /// Return a 500 internal server error ErrorResponse
    fn internal_server_error<E>(error: &E) -> Self
    where
        E: std::error::Error + Send + Sync,
    {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, error)
    }
}

impl From<UsageError> for ErrorResponse {
    /// Convert from a `UsageError` into an `ErrorResponse`.
    fn from(error: UsageError) -> Self {
        let response = match &error {
            // Bad request
            UsageError::QueryRejection(_) | UsageError::QueryValidation(_) => {
                Self::bad_request(&error)
            }

            // Not found
            UsageError::NotFound { path: _ } => Self::not_found(&error),

            // Internal server error. Dataset and server errors only occur at startup, but map
            // them anyway.
            UsageError::DatasetIo { .. }
            | UsageError::Csv(_)
            | UsageError::MissingColumn { .. }
            | UsageError::InvalidDate { .. }
            | UsageError::EmptyRegion { .. }
            | UsageError::InvalidUsage { .. }
            | UsageError::Serialise(_)
            | UsageError::Metrics(_)
            | UsageError::MetricsUtf8(_)
            | UsageError::ListenAddress { .. }
            | UsageError::Tls { .. }
            | UsageError::Server(_) => Self::internal_server_error(&error),
        };

        // Log server errors.
        if response.status.is_server_error() {
            log_error(&error);
        }

        response
    }
}

impl IntoResponse for ErrorResponse {
    /// Convert from an `ErrorResponse` into an `axum::response::Response`.
    ///
    /// Renders the response as JSON.
    fn into_response(self) -> Response {
        let json_body = serde_json::to_string_pretty(&self);
        match json_body {
            Err(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to serialise error response: {}", err),
            )
                .into_response(),
            Ok(json_body) => (
                self.status,
                [(&header::CONTENT_TYPE, mime::APPLICATION_JSON.to_string())],
                json_body,
            )
                .into_response(),
        }
    }
}

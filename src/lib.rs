//! This crate provides a small read-only HTTP API over a static table of CPU usage samples.
//!
//! A CSV file of per-date, per-region usage samples is loaded once at startup. Clients can fetch
//! the raw table, the mean usage of each (date, region) pair, or the regions with the largest
//! total usage. Every aggregate is recomputed from the in-memory table on each request.
//!
//! The server is built on top of a number of open source components.
//!
//! * [Tokio](tokio), the most popular asynchronous Rust runtime.
//! * [Axum](axum) web framework, built by the Tokio team, on top of the [hyper] HTTP library.
//! * [Serde](serde) performs serialisation of JSON response data.
//! * [csv] parses the dataset, and [chrono] its dates.
//! * [Prometheus](prometheus) exposes request and aggregation metrics.

pub mod aggregate;
pub mod app;
pub mod app_state;
pub mod cli;
pub mod dataset;
pub mod error;
pub mod metrics;
pub mod models;
pub mod server;
#[cfg(test)]
pub mod test_utils;
pub mod tracing;
pub mod types;
pub mod validated_query;

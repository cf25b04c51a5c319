//! Request and response types of the API

use crate::types::{deserialize_date, serialize_date};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// Status reported by the health endpoint
pub const HEALTH_STATUS: &str = "healthy";
/// Message reported by the health endpoint
pub const HEALTH_MESSAGE: &str = "Azure Demand Forecasting API is running";
/// Message returned from the root path
pub const WELCOME_MESSAGE: &str = "Welcome to the Azure Demand Forecasting API!";

/// Upper bound on the number of regions a client may ask for
pub const MAX_TOP_REGIONS: usize = 1000;

/// Mean CPU usage of one (date, region) pair
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct UsageTrend {
    #[serde(serialize_with = "serialize_date", deserialize_with = "deserialize_date")]
    pub date: NaiveDate,
    pub region: String,
    /// Arithmetic mean of `usage_cpu` over the pair's records
    pub usage_cpu: f64,
}

/// Summed CPU usage of one region
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct RegionTotal {
    pub region: String,
    pub total_cpu_usage: f64,
}

/// Health check response
#[derive(Debug, Deserialize, PartialEq, Serialize)]
pub struct Health {
    pub status: String,
    pub message: String,
    /// Number of records loaded
    pub data_loaded: usize,
    /// Column names of the dataset, in file order
    pub columns: Vec<String>,
}

/// Root path response
#[derive(Debug, Deserialize, PartialEq, Serialize)]
pub struct Welcome {
    pub message: String,
}

/// Query parameters for the top regions endpoint
#[derive(Debug, Default, Deserialize, PartialEq, Validate)]
pub struct TopRegionsQuery {
    /// Number of regions to return
    #[validate(range(
        min = 1,
        max = "MAX_TOP_REGIONS",
        message = "limit must be between 1 and 1000"
    ))]
    pub limit: Option<usize>,
}

/// Query parameters for the usage trends endpoint
#[derive(Debug, Default, Deserialize, PartialEq, Validate)]
pub struct UsageTrendsQuery {
    /// Comma-separated list of regions to restrict the trends to
    #[validate(custom = "validate_regions")]
    pub regions: Option<String>,
}

impl UsageTrendsQuery {
    /// Returns the requested regions, or `None` if all regions are wanted.
    pub fn region_filter(&self) -> Option<Vec<String>> {
        self.regions.as_deref().map(split_regions)
    }
}

/// Split a comma-separated region list, dropping blank entries.
fn split_regions(regions: &str) -> Vec<String> {
    regions
        .split(',')
        .map(str::trim)
        .filter(|region| !region.is_empty())
        .map(str::to_string)
        .collect()
}

/// Validate a region list
fn validate_regions(regions: &str) -> Result<(), ValidationError> {
    if split_regions(regions).is_empty() {
        return Err(ValidationError::new("regions must name at least one region"));
    }
    Ok(())
}

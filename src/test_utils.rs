use crate::dataset::{Dataset, UsageRecord};
use crate::types::Value;

use chrono::NaiveDate;

/// A small CSV dataset with one duplicated (date, region) pair and two extra columns.
pub(crate) const SAMPLE_CSV: &str = "\
date,region,usage_cpu,usage_storage,holiday
2024-01-01,eastus,10,1200,0
2024-01-01,eastus,20,1300,0
2024-01-02,westus,5,800,1
";

/// Shorthand for a calendar date.
pub(crate) fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

/// Create a UsageRecord with only the required columns.
pub(crate) fn record(date: NaiveDate, region: &str, usage_cpu: f64) -> UsageRecord {
    UsageRecord {
        date,
        region: region.to_string(),
        usage_cpu,
        cells: vec![
            Value::Date(date),
            Value::Text(region.to_string()),
            Value::Float(usage_cpu),
        ],
    }
}

/// Create a Dataset with only the required columns from (date, region, usage) tuples.
pub(crate) fn dataset(rows: &[(NaiveDate, &str, f64)]) -> Dataset {
    Dataset::from_records(
        vec![
            "date".to_string(),
            "region".to_string(),
            "usage_cpu".to_string(),
        ],
        rows.iter()
            .map(|(date, region, usage)| record(*date, region, *usage))
            .collect(),
    )
}

/// The dataset parsed from [SAMPLE_CSV].
pub(crate) fn sample_dataset() -> Dataset {
    Dataset::from_reader(SAMPLE_CSV.as_bytes()).unwrap()
}

//! Loading of the usage dataset.
//!
//! The dataset is a CSV file with a header row. It must contain `date`, `region` and `usage_cpu`
//! columns; any other columns are carried through untouched for raw output. The whole file is
//! read once at startup into an immutable [Dataset].

use crate::error::UsageError;
use crate::types::{parse_date, ColumnType, Value};

use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use serde::ser::{Serialize, SerializeMap, Serializer};
use tracing::{event, Level};

/// Name of the column holding the sample date.
pub const DATE_COLUMN: &str = "date";
/// Name of the column holding the region label.
pub const REGION_COLUMN: &str = "region";
/// Name of the column holding the CPU usage value.
pub const USAGE_COLUMN: &str = "usage_cpu";

/// One row of the dataset.
#[derive(Clone, Debug, PartialEq)]
pub struct UsageRecord {
    /// Sample date
    pub date: NaiveDate,
    /// Region label
    pub region: String,
    /// CPU usage
    pub usage_cpu: f64,
    /// Every cell of the row, aligned with [Dataset::columns]
    pub cells: Vec<Value>,
}

/// The in-memory table of usage records, in load order.
#[derive(Clone, Debug, Default)]
pub struct Dataset {
    columns: Vec<String>,
    records: Vec<UsageRecord>,
}

/// Positions of the required columns within a header row.
struct RequiredColumns {
    date: usize,
    region: usize,
    usage: usize,
}

impl Dataset {
    /// Load a dataset from a CSV file.
    ///
    /// # Arguments
    ///
    /// * `path`: Path to the CSV file
    pub fn load(path: &Path) -> Result<Self, UsageError> {
        let file = File::open(path).map_err(|source| UsageError::DatasetIo {
            path: path.display().to_string(),
            source,
        })?;
        let dataset = Self::from_reader(file)?;
        event!(
            Level::INFO,
            "loaded {} records with {} columns from {}",
            dataset.len(),
            dataset.columns.len(),
            path.display()
        );
        Ok(dataset)
    }

    /// Read a dataset from any source of CSV text.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, UsageError> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let columns = dedup_columns(reader.headers()?.iter());
        let required = RequiredColumns {
            date: column_index(&columns, DATE_COLUMN)?,
            region: column_index(&columns, REGION_COLUMN)?,
            usage: column_index(&columns, USAGE_COLUMN)?,
        };

        let rows = reader
            .records()
            .collect::<Result<Vec<csv::StringRecord>, csv::Error>>()?;

        let column_types = (0..columns.len())
            .map(|index| match index {
                index if index == required.date => ColumnType::Date,
                index if index == required.region => ColumnType::Text,
                index if index == required.usage => ColumnType::Float,
                index => ColumnType::infer(rows.iter().map(|row| row.get(index).unwrap_or(""))),
            })
            .collect::<Vec<_>>();

        let records = rows
            .iter()
            .enumerate()
            .map(|(index, row)| build_record(index + 1, row, &required, &column_types))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { columns, records })
    }

    /// Build a dataset from records already in memory.
    pub fn from_records(columns: Vec<String>, records: Vec<UsageRecord>) -> Self {
        Self { columns, records }
    }

    /// Column names, in file order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// All records, in load order.
    pub fn records(&self) -> &[UsageRecord] {
        &self.records
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the dataset has no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Every record as a serialisable row keyed by column name, in load order.
    pub fn raw_rows(&self) -> Vec<RawRow<'_>> {
        self.records
            .iter()
            .map(|record| RawRow {
                columns: &self.columns,
                cells: &record.cells,
            })
            .collect()
    }
}

/// Build one record from a CSV row.
///
/// # Arguments
///
/// * `row_number`: 1-based data row number, for error reporting
/// * `row`: The CSV row
/// * `required`: Positions of the required columns
/// * `column_types`: Type of every column
fn build_record(
    row_number: usize,
    row: &csv::StringRecord,
    required: &RequiredColumns,
    column_types: &[ColumnType],
) -> Result<UsageRecord, UsageError> {
    let cell = |index: usize| row.get(index).unwrap_or("");

    let date = parse_date(cell(required.date)).ok_or_else(|| UsageError::InvalidDate {
        row: row_number,
        value: cell(required.date).to_string(),
    })?;
    let region = cell(required.region);
    if region.is_empty() {
        return Err(UsageError::EmptyRegion { row: row_number });
    }
    let usage_cpu = cell(required.usage)
        .parse::<f64>()
        .ok()
        .filter(|usage| usage.is_finite())
        .ok_or_else(|| UsageError::InvalidUsage {
            row: row_number,
            value: cell(required.usage).to_string(),
        })?;

    let cells = column_types
        .iter()
        .enumerate()
        .map(|(index, column_type)| {
            let raw = cell(index);
            column_type
                .parse(raw)
                .unwrap_or_else(|| Value::Text(raw.to_string()))
        })
        .collect();

    Ok(UsageRecord {
        date,
        region: region.to_string(),
        usage_cpu,
        cells,
    })
}

/// Find a required column, by exact name.
fn column_index(columns: &[String], name: &'static str) -> Result<usize, UsageError> {
    columns
        .iter()
        .position(|column| column == name)
        .ok_or(UsageError::MissingColumn { column: name })
}

/// Make header names unique by suffixing repeats with `.1`, `.2`, ...
fn dedup_columns<'a, I>(headers: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut columns: Vec<String> = Vec::new();
    for header in headers {
        let mut name = header.to_string();
        let mut suffix = 1;
        while columns.contains(&name) {
            name = format!("{}.{}", header, suffix);
            suffix += 1;
        }
        columns.push(name);
    }
    columns
}

/// A borrowed view of one record that serialises as a map from column name to cell.
#[derive(Debug)]
pub struct RawRow<'a> {
    columns: &'a [String],
    cells: &'a [Value],
}

impl Serialize for RawRow<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (column, cell) in self.columns.iter().zip(self.cells) {
            map.serialize_entry(column, cell)?;
        }
        map.end()
    }
}

//! Cell values of a loaded table and per-column type inference.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

/// Date formats accepted in date columns.
const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

/// Date-time formats accepted in date columns. The time of day is discarded.
const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

/// Layout of dates in responses: midnight of the day, without an offset.
pub const DATE_OUTPUT_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// A single cell of the table, typed according to its column.
///
/// Serialises untagged, so a row renders as plain JSON scalars.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    /// Empty cell
    Null,
    /// Cell of an integer column
    Int(i64),
    /// Cell of a float column
    Float(f64),
    /// Cell of a text column
    Text(String),
    /// Cell of a date column
    Date(#[serde(serialize_with = "serialize_date")] NaiveDate),
}

/// The type of a column, inferred from all of its cells.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ColumnType {
    Int,
    Float,
    Text,
    Date,
}

impl ColumnType {
    /// Infer a column type from its raw cells.
    ///
    /// Empty cells are ignored. A column is [ColumnType::Int] if every remaining cell parses as an
    /// integer, [ColumnType::Float] if every one parses as a float, and [ColumnType::Text]
    /// otherwise. A column with no non-empty cells is a float column.
    pub fn infer<'a, I>(cells: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut column_type = None;
        for cell in cells.into_iter().filter(|cell| !cell.is_empty()) {
            if column_type.unwrap_or(ColumnType::Int) == ColumnType::Int
                && cell.parse::<i64>().is_ok()
            {
                column_type = Some(ColumnType::Int);
            } else if cell.parse::<f64>().is_ok() {
                column_type = Some(ColumnType::Float);
            } else {
                return ColumnType::Text;
            }
        }
        column_type.unwrap_or(ColumnType::Float)
    }

    /// Convert a raw cell into a [Value] of this column type.
    ///
    /// Returns `None` if the cell does not conform to the type. Empty cells are always
    /// [Value::Null].
    pub fn parse(self, cell: &str) -> Option<Value> {
        if cell.is_empty() {
            return Some(Value::Null);
        }
        match self {
            Self::Int => cell.parse().ok().map(Value::Int),
            Self::Float => cell.parse().ok().map(Value::Float),
            Self::Text => Some(Value::Text(cell.to_string())),
            Self::Date => parse_date(cell).map(Value::Date),
        }
    }
}

/// Parse a calendar date, accepting a handful of common date and date-time layouts.
pub fn parse_date(cell: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(cell, format).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|format| NaiveDateTime::parse_from_str(cell, format).ok())
                .map(|datetime| datetime.date())
        })
}

/// Serialise a date as local midnight, e.g. `2024-01-01T00:00:00`.
///
/// A bare `YYYY-MM-DD` is read by browsers as UTC midnight, which shifts the day west of UTC.
pub fn serialize_date<S: Serializer>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(&date.and_time(NaiveTime::MIN).format(DATE_OUTPUT_FORMAT))
}

/// Deserialise a date written by [serialize_date], or any layout accepted by [parse_date].
pub fn deserialize_date<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
    let text = String::deserialize(deserializer)?;
    parse_date(&text).ok_or_else(|| de::Error::custom(format!("invalid date \"{text}\"")))
}

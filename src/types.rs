pub mod value;

// Re-export types for convenience.
pub use crate::types::value::{
    deserialize_date, parse_date, serialize_date, ColumnType, Value, DATE_OUTPUT_FORMAT,
};

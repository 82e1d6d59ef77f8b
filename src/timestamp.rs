//! Encoding of transaction timestamps for JSON and for the database.
//!
//! Timestamps are local date-times without a UTC offset, e.g.
//! "2025-06-01T12:30:00" or "2025-06-01T12:30:00.25".

use rusqlite::{
    ToSql,
    types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef},
};
use time::{PrimitiveDateTime, format_description::BorrowedFormatItem, macros::format_description};

/// Serde (de)serializer for ISO-8601 date-times.
///
/// Use with `#[serde(with = "crate::timestamp::iso_timestamp")]`.
pub mod iso_timestamp {
    use serde::{Deserialize, Deserializer, Serializer};
    use time::{
        PrimitiveDateTime, format_description::BorrowedFormatItem, macros::format_description,
    };

    const INPUT_FORMAT: &[BorrowedFormatItem] = format_description!(
        "[year]-[month]-[day]T[hour]:[minute][optional [:[second][optional [.[subsecond]]]]]"
    );

    const OUTPUT_FORMAT: &[BorrowedFormatItem] =
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond]");

    /// Write `timestamp` as an ISO-8601 string.
    pub fn serialize<S>(timestamp: &PrimitiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let text = timestamp
            .format(OUTPUT_FORMAT)
            .map_err(serde::ser::Error::custom)?;

        serializer.serialize_str(&text)
    }

    /// Read an ISO-8601 string, the seconds and subsecond parts are optional.
    ///
    /// Years before 0000 are rejected since their stored text does not sort
    /// in date order.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<PrimitiveDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        let timestamp =
            PrimitiveDateTime::parse(&text, INPUT_FORMAT).map_err(serde::de::Error::custom)?;

        if timestamp.year() < 0 {
            return Err(serde::de::Error::custom(format!(
                "the year in \"{text}\" is before 0000"
            )));
        }

        Ok(timestamp)
    }
}

/// The format used to store timestamps as text in SQLite.
///
/// Every field has a fixed width so comparing the stored strings gives the
/// same order as comparing the date-times, as long as the year is not
/// negative.
const STORAGE_FORMAT: &[BorrowedFormatItem] = format_description!(
    "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:9]"
);

/// Wrapper for passing a [PrimitiveDateTime] to and from SQLite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SqlTimestamp(pub PrimitiveDateTime);

impl ToSql for SqlTimestamp {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        let text = self
            .0
            .format(STORAGE_FORMAT)
            .map_err(|error| rusqlite::Error::ToSqlConversionFailure(Box::new(error)))?;

        Ok(ToSqlOutput::from(text))
    }
}

impl FromSql for SqlTimestamp {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let text = value.as_str()?;

        PrimitiveDateTime::parse(text, STORAGE_FORMAT)
            .map(SqlTimestamp)
            .map_err(|error| FromSqlError::Other(Box::new(error)))
    }
}

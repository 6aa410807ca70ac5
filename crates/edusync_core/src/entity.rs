//! Entity schema trait and row access.

use crate::error::{CoreError, CoreResult};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// A record type that can be synchronized.
///
/// Every implementor declares its schema explicitly: a type name, an
/// ordered list of column names, and total encode/decode functions. The
/// same schema drives the local flat-file header and the remote table
/// columns.
///
/// # Invariants
///
/// - `COLUMNS[0]` is `"id"` and holds [`Entity::id`]
/// - `to_row` returns exactly `COLUMNS.len()` values, in column order
/// - `from_row(to_row(x)) == x`
///
/// # Example
///
/// ```rust
/// use edusync_core::{CoreResult, Entity, Row};
/// use uuid::Uuid;
///
/// #[derive(Debug, Clone, PartialEq)]
/// struct Room {
///     id: Uuid,
///     name: String,
/// }
///
/// impl Entity for Room {
///     const TYPE_NAME: &'static str = "Room";
///     const COLUMNS: &'static [&'static str] = &["id", "name"];
///
///     fn id(&self) -> Uuid {
///         self.id
///     }
///
///     fn to_row(&self) -> Vec<String> {
///         vec![self.id.to_string(), self.name.clone()]
///     }
///
///     fn from_row(row: &Row<'_>) -> CoreResult<Self> {
///         Ok(Room {
///             id: row.uuid("id")?,
///             name: row.text("name")?.to_string(),
///         })
///     }
/// }
/// ```
pub trait Entity: Clone + PartialEq + fmt::Debug + Send + Sync + 'static {
    /// The entity type name, e.g. `"Task"`.
    const TYPE_NAME: &'static str;

    /// Ordered column names. The first column must be `"id"`.
    const COLUMNS: &'static [&'static str];

    /// Returns the stable record identifier.
    fn id(&self) -> Uuid;

    /// Returns when the record was last modified, if tracked.
    fn updated_at(&self) -> Option<DateTime<Utc>> {
        None
    }

    /// Encodes the record as one value per column.
    fn to_row(&self) -> Vec<String>;

    /// Decodes a record from a row.
    fn from_row(row: &Row<'_>) -> CoreResult<Self>;

    /// Returns the columns of `COLUMNS` missing from `header`.
    fn missing_columns<S: AsRef<str>>(header: &[S]) -> Vec<&'static str> {
        Self::COLUMNS
            .iter()
            .copied()
            .filter(|column| !header.iter().any(|h| h.as_ref() == *column))
            .collect()
    }
}

/// A named view over one record's raw field values.
///
/// Columns are looked up by name, so the physical column order of the
/// source (file header or query result) does not matter.
#[derive(Debug, Clone)]
pub struct Row<'a> {
    fields: Vec<(&'a str, &'a str)>,
}

impl<'a> Row<'a> {
    /// Builds a row from a header and the values in header order.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::FieldCount`] if the lengths differ.
    pub fn new<C, V>(columns: &'a [C], values: &'a [V]) -> CoreResult<Self>
    where
        C: AsRef<str>,
        V: AsRef<str>,
    {
        if columns.len() != values.len() {
            return Err(CoreError::FieldCount {
                expected: columns.len(),
                actual: values.len(),
            });
        }
        Ok(Self {
            fields: columns
                .iter()
                .map(AsRef::as_ref)
                .zip(values.iter().map(AsRef::as_ref))
                .collect(),
        })
    }

    /// Returns the raw value of a column.
    pub fn text(&self, column: &str) -> CoreResult<&'a str> {
        self.fields
            .iter()
            .find(|(name, _)| *name == column)
            .map(|(_, value)| *value)
            .ok_or_else(|| CoreError::missing_column(column))
    }

    /// Returns the raw value of a column, or `None` if it is empty.
    pub fn optional_text(&self, column: &str) -> CoreResult<Option<&'a str>> {
        let value = self.text(column)?;
        Ok((!value.is_empty()).then_some(value))
    }

    /// Parses a column with [`FromStr`].
    pub fn parse<T>(&self, column: &str) -> CoreResult<T>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        let value = self.text(column)?;
        value
            .trim()
            .parse()
            .map_err(|e| CoreError::invalid_field(column, value, e))
    }

    /// Parses a column as a UUID.
    pub fn uuid(&self, column: &str) -> CoreResult<Uuid> {
        self.parse(column)
    }

    /// Parses an optional UUID column.
    pub fn optional_uuid(&self, column: &str) -> CoreResult<Option<Uuid>> {
        match self.optional_text(column)? {
            Some(value) => Uuid::parse_str(value.trim())
                .map(Some)
                .map_err(|e| CoreError::invalid_field(column, value, e)),
            None => Ok(None),
        }
    }

    /// Parses an RFC 3339 timestamp column.
    pub fn timestamp(&self, column: &str) -> CoreResult<DateTime<Utc>> {
        let value = self.text(column)?;
        parse_timestamp(column, value)
    }

    /// Parses an optional `YYYY-MM-DD` date column.
    pub fn optional_date(&self, column: &str) -> CoreResult<Option<NaiveDate>> {
        match self.optional_text(column)? {
            Some(value) => NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
                .map(Some)
                .map_err(|e| CoreError::invalid_field(column, value, e)),
            None => Ok(None),
        }
    }
}

fn parse_timestamp(column: &str, value: &str) -> CoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| CoreError::invalid_field(column, value, e))
}

/// Encodes a timestamp the way [`Row::timestamp`] decodes it.
pub(crate) fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Encodes an optional date the way [`Row::optional_date`] decodes it.
pub(crate) fn format_optional_date(date: Option<NaiveDate>) -> String {
    date.map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

//! Error types for EduSync core.

use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised while encoding, decoding or registering entities.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A required column is missing from a row or header.
    #[error("missing column: {column}")]
    MissingColumn {
        /// Name of the column.
        column: String,
    },

    /// A field could not be decoded.
    #[error("invalid value {value:?} for column {column}: {reason}")]
    InvalidField {
        /// Name of the column.
        column: String,
        /// The raw value.
        value: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A row has a different number of fields than its header.
    #[error("row has {actual} fields, header has {expected}")]
    FieldCount {
        /// Number of header columns.
        expected: usize,
        /// Number of fields in the row.
        actual: usize,
    },

    /// The entity type is already registered.
    #[error("entity type already registered: {type_name}")]
    DuplicateEntity {
        /// The entity type name.
        type_name: String,
    },

    /// Two entity types were bound to the same resource.
    #[error("{resource} is already bound to entity type {owner}")]
    ResourceInUse {
        /// The file path or table name.
        resource: String,
        /// The type already bound to it.
        owner: String,
    },

    /// The entity type is not registered.
    #[error("unknown entity type: {type_name}")]
    UnknownEntity {
        /// The entity type name.
        type_name: String,
    },

    /// Unknown conflict policy name.
    #[error("unknown conflict policy: {0}")]
    UnknownPolicy(String),
}

impl CoreError {
    /// Creates an invalid-field error.
    pub fn invalid_field(
        column: impl Into<String>,
        value: impl Into<String>,
        reason: impl ToString,
    ) -> Self {
        Self::InvalidField {
            column: column.into(),
            value: value.into(),
            reason: reason.to_string(),
        }
    }

    /// Creates a missing-column error.
    pub fn missing_column(column: impl Into<String>) -> Self {
        Self::MissingColumn {
            column: column.into(),
        }
    }

    /// Returns true if the error concerns a single record rather than a
    /// whole file or registry.
    pub fn is_row_error(&self) -> bool {
        matches!(
            self,
            CoreError::InvalidField { .. } | CoreError::FieldCount { .. }
        )
    }
}

//! Error types for conversion planning.

use thiserror::Error;

/// Every failure the planner can report. All of them are deterministic
/// functions of the schemas, the registry and the request.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed request or input (unknown type reference, bad document shape)
    #[error("Configuration error: {0}")]
    Config(String),

    /// A requested record type is not present in the loaded schemas
    #[error("record type {0} not found in the loaded schemas")]
    UnknownRecord(String),

    /// Nothing left to convert after filtering by tag key
    #[error("record {record} has no fields tagged `{tag}`")]
    NoTaggedFields { record: String, tag: String },

    /// No strategy in the decision table matched a field pair
    #[error("no conversion from {from} to {to} for field {field}")]
    NoStrategy {
        from: String,
        to: String,
        field: String,
    },

    /// Skip tag on a field whose type is not a known record (strict mode)
    #[error("field {field} is tagged skip but {ty} is not a record")]
    SkipNonRecord { field: String, ty: String },

    /// Skip-tagged records that (transitively) contain themselves
    #[error("skip expansion of {field} recurses into {record} again")]
    SkipCycle { field: String, record: String },

    /// Destination field without a source counterpart (strict mode)
    #[error("destination field {field} has no source field tagged `{tag}`")]
    UnmatchedField { field: String, tag: String },

    /// Two source fields share one tag value (strict mode)
    #[error("tag `{tag}` appears on both {first} and {second}")]
    DuplicateTag {
        tag: String,
        first: String,
        second: String,
    },

    /// Skip-tagged nested record with nothing tagged inside (strict mode)
    #[error("skip-tagged field {field} has no fields tagged `{tag}`")]
    NestedWithoutFields { field: String, tag: String },

    /// Invalid function catalog entry (unknown type parameter, bad class)
    #[error("Catalog error: {0}")]
    Catalog(String),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Document decode error with the JSON path of the offending node
    #[error("Decode error in {source_name}: {message}")]
    Decode {
        source_name: String,
        message: String,
    },
}

impl Error {
    /// Create a NoStrategy error
    pub fn no_strategy(
        from: impl Into<String>,
        to: impl Into<String>,
        field: impl Into<String>,
    ) -> Self {
        Error::NoStrategy {
            from: from.into(),
            to: to.into(),
            field: field.into(),
        }
    }

    /// Create a Decode error
    pub fn decode(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Decode {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    /// True for errors caused by the request or inputs rather than by a
    /// particular field pair.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::Config(_)
                | Error::UnknownRecord(_)
                | Error::NoTaggedFields { .. }
                | Error::Io(_)
                | Error::Decode { .. }
                | Error::Catalog(_)
        )
    }
}

/// Result type alias for planner operations.
pub type Result<T> = std::result::Result<T, Error>;

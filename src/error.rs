use thiserror::Error;

/// Errors raised by the analysis functions.
///
/// Every variant is a contract violation detected before (or instead of)
/// producing a result; sparse rows are never reported here.
#[derive(Debug, Error, PartialEq)]
pub enum AnalysisError {
    /// An option value outside the supported set.
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("table '{table}' is missing required column '{column}'")]
    MissingColumn { table: String, column: String },

    #[error("table '{table}' has duplicate index value '{key}'")]
    DuplicateIndex { table: String, key: String },

    #[error("table '{table}' has no entry for '{key}'")]
    MissingKey { table: String, key: String },

    #[error("table '{table}', column '{column}', row {row}: {reason}")]
    InvalidValue {
        table: String,
        column: String,
        row: usize,
        reason: String,
    },

    #[error("table '{0}' is empty")]
    EmptyTable(String),

    #[error("table '{table}': {reason}")]
    ShapeMismatch { table: String, reason: String },

    #[error("invalid FASTA header '{header}'. {reason}")]
    InvalidFastaHeader { header: String, reason: String },
}

pub type Result<T> = std::result::Result<T, AnalysisError>;

impl AnalysisError {
    pub(crate) fn invalid_parameter(name: &'static str, reason: impl Into<String>) -> Self {
        AnalysisError::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }

    pub(crate) fn missing_column(table: &str, column: &str) -> Self {
        AnalysisError::MissingColumn {
            table: table.to_string(),
            column: column.to_string(),
        }
    }
}

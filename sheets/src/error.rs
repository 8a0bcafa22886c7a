//! Error types for the spreadsheet pipeline.
//!
//! Errors are layered the same way the pipeline is:
//!
//! - [`WorkbookError`] - reading raw bytes into a workbook
//! - [`SchemaError`] - malformed transformation/validation schemas
//! - [`TransformError`] - flatten/transform failures
//! - [`OutputError`] - serializing partitions to CSV/XLSX buffers
//! - [`RegistryError`] - template registry errors
//! - [`PipelineError`] - top-level orchestration errors
//!
//! Validation problems found in the data are never errors; they are
//! reported through [`crate::validation::ValidationReport`].

use thiserror::Error;

// =============================================================================
// Workbook Errors
// =============================================================================

/// Errors while turning a media file into a [`crate::workbook::Workbook`].
#[derive(Debug, Error)]
pub enum WorkbookError {
    /// Spreadsheet container could not be read.
    #[error("Failed to read spreadsheet: {0}")]
    Spreadsheet(#[from] calamine::Error),

    /// Delimited text could not be parsed.
    #[error("Invalid CSV format: {0}")]
    Csv(#[from] csv::Error),

    /// Neither the extension nor the mime type is a supported format.
    #[error("Unsupported file '{file_name}' ({mime_type})")]
    UnsupportedFormat { file_name: String, mime_type: String },
}

// =============================================================================
// Schema Errors
// =============================================================================

/// A transformation or validation schema is malformed.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// The schema string is not valid JSON.
    #[error("Schema is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// A section the engine needs is absent.
    #[error("Schema is missing required section '{0}'")]
    MissingSection(String),

    /// A section is present but structurally wrong.
    #[error("Schema section '{section}' is invalid: {message}")]
    InvalidSection { section: String, message: String },

    /// A known rule kind carries unusable parameters.
    #[error("Rule '{rule}' is invalid: {message}")]
    InvalidRule { rule: String, message: String },
}

// =============================================================================
// Transformation Errors
// =============================================================================

/// Errors during flatten/transform.
#[derive(Debug, Error)]
pub enum TransformError {
    /// Schema problem surfaced while transforming.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Group forking produced more row groups than allowed.
    #[error("Flattening exceeded the limit of {limit} row groups")]
    FanOutLimitExceeded { limit: usize },
}

// =============================================================================
// Output Errors
// =============================================================================

/// Errors serializing output partitions.
#[derive(Debug, Error)]
pub enum OutputError {
    /// CSV writer failure.
    #[error("CSV write error: {0}")]
    Csv(#[from] csv::Error),

    /// XLSX writer failure.
    #[error("XLSX write error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    /// Buffer flush failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Registry Errors
// =============================================================================

/// Errors from the template registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Template not found.
    #[error("Template not found: {0}")]
    NotFound(String),

    /// Invalid template data.
    #[error("Invalid template: {0}")]
    InvalidTemplate(String),

    /// IO error.
    #[error("Registry IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON error.
    #[error("Registry JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level errors returned by [`crate::transform::pipeline`] entry points.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Workbook error: {0}")]
    Workbook(#[from] WorkbookError),

    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Transform error: {0}")]
    Transform(#[from] TransformError),

    #[error("Output error: {0}")]
    Output(#[from] OutputError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),
}

impl PipelineError {
    /// Stable message code for callers that map errors onto responses.
    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::Workbook(_) => "FAILED_TO_PARSE_MEDIA",
            PipelineError::Schema(_) => "SCHEMA_MALFORMED",
            PipelineError::Transform(TransformError::Schema(_)) => "SCHEMA_MALFORMED",
            PipelineError::Transform(TransformError::FanOutLimitExceeded { .. }) => {
                "FAN_OUT_LIMIT_EXCEEDED"
            }
            PipelineError::Output(_) => "FAILED_TO_SERIALIZE_OUTPUT",
            PipelineError::Registry(RegistryError::NotFound(_)) => "TEMPLATE_NOT_FOUND",
            PipelineError::Registry(_) => "TEMPLATE_REGISTRY_ERROR",
        }
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for workbook reading.
pub type WorkbookResult<T> = Result<T, WorkbookError>;

/// Result type for schema parsing.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Result type for transformation.
pub type TransformResult<T> = Result<T, TransformError>;

/// Result type for output serialization.
pub type OutputResult<T> = Result<T, OutputError>;

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        // SchemaError -> TransformError -> PipelineError
        let schema_err = SchemaError::MissingSection("flatten".into());
        let transform_err: TransformError = schema_err.into();
        let pipeline_err: PipelineError = transform_err.into();
        assert!(pipeline_err.to_string().contains("flatten"));
        assert_eq!(pipeline_err.code(), "SCHEMA_MALFORMED");
    }

    #[test]
    fn test_invalid_json_code() {
        let json_err = serde_json::from_str::<serde_json::Value>("{ nope").unwrap_err();
        let pipeline_err: PipelineError = SchemaError::from(json_err).into();
        assert_eq!(pipeline_err.code(), "SCHEMA_MALFORMED");
        assert!(pipeline_err.to_string().contains("not valid JSON"));
    }

    #[test]
    fn test_fan_out_code() {
        let err: PipelineError = TransformError::FanOutLimitExceeded { limit: 10 }.into();
        assert_eq!(err.code(), "FAN_OUT_LIMIT_EXCEEDED");
        assert!(err.to_string().contains("10"));
    }
}

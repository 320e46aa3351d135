//! Error types for configuration, workbook I/O and the pipeline entry points.
//!
//! Recoverable per-test conditions (a client missing a baseline, a zero
//! baseline that cannot anchor a ratio) are not errors. They are counted on
//! [`crate::model::ProjectionStats`] and reported through logging instead.

use std::io;

use thiserror::Error;

/// Fatal configuration problems. Any of these aborts the run before output
/// is written.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    #[error("required field `{0}` is missing or empty")]
    MissingField(&'static str),

    #[error("test `{0}` appears more than once in `{1}`")]
    DuplicateTest(String, &'static str),

    #[error("test `{test}` referenced by `{field}` is not listed in `{within}`")]
    UnknownTest {
        test: String,
        field: &'static str,
        within: &'static str,
    },

    #[error("test `{0}` must be listed in exactly one of `higher_is_better` or `lower_is_better`")]
    AmbiguousDirection(String),

    #[error("no `{field}` entry for test `{test}`")]
    MissingEntry { field: &'static str, test: String },

    #[error("invalid {kind} for `{test}` ({value}): {reason}")]
    InvalidParameter {
        kind: &'static str,
        test: String,
        value: f64,
        reason: &'static str,
    },

    #[error("invalid correlation {value} between `{a}` and `{b}`: must lie in [-1, 1]")]
    InvalidCorrelation { a: String, b: String, value: f64 },

    #[error(
        "correlation matrix is not positive definite at any diagonal inflation up to {max_epsilon}"
    )]
    CholeskyFailed { max_epsilon: f64 },

    #[error("`n_sim` must be at least 1")]
    ZeroSimulations,
}

/// Failures reading or writing an OOXML workbook.
#[derive(Debug, Error)]
pub enum WorkbookError {
    #[error("malformed workbook: required part `{part}` is missing")]
    MalformedWorkbook { part: String },

    #[error("malformed workbook: sheet `{sheet}` has no relationship `{rel_id}`")]
    MissingRelationship { sheet: String, rel_id: String },

    #[error("malformed workbook: sheet `{sheet}` points at missing part `{part}`")]
    MissingSheetPart { sheet: String, part: String },

    #[error("malformed workbook: part `{part}` decompresses past {limit} bytes")]
    PartTooLarge { part: String, limit: u64 },

    #[error("invalid XML in `{part}`: {message}")]
    Xml { part: String, message: String },

    #[error("zip archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Umbrella error for the pipeline entry points.
#[derive(Debug, Error)]
pub enum ForecastError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Workbook(#[from] WorkbookError),
}

pub type Result<T> = std::result::Result<T, ForecastError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_messages_name_the_test() {
        let err = ConfigError::MissingEntry {
            field: "measurement_cv",
            test: "VO2 max".into(),
        };
        assert_eq!(err.to_string(), "no `measurement_cv` entry for test `VO2 max`");

        let err: ForecastError = ConfigError::ZeroSimulations.into();
        assert!(err.to_string().starts_with("configuration error:"));
    }

    #[test]
    fn test_workbook_error_is_transparent_in_forecast_error() {
        let err: ForecastError = WorkbookError::MalformedWorkbook {
            part: "xl/workbook.xml".into(),
        }
        .into();
        assert_eq!(
            err.to_string(),
            "malformed workbook: required part `xl/workbook.xml` is missing"
        );
    }
}

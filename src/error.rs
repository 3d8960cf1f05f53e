// ⚠️ Error types for the extraction pipeline and its configuration
//
// Extraction itself never fails: a missing pattern is a `None` field.
// These errors cover the structural cases only.

use thiserror::Error;

/// Raised before a listing enters the pipeline
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// Title is empty or whitespace-only; the record is skipped
    #[error("Invalid input for listing {source_id}: {reason}")]
    InvalidInput { source_id: String, reason: String },
}

/// Raised while loading term lists, rules or pipeline configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed JSON in {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// A dictionary or rule pattern failed to compile
    #[error("Invalid pattern for {id}: {source}")]
    Pattern {
        id: String,
        #[source]
        source: regex::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

pub(crate) fn read_json<T: serde::de::DeserializeOwned>(
    path: &std::path::Path,
) -> ConfigResult<T> {
    let display = path.display().to_string();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: display.clone(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| ConfigError::Json {
        path: display,
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_input_message() {
        let err = PipelineError::InvalidInput {
            source_id: "ebay-1".to_string(),
            reason: "title is empty".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid input for listing ebay-1: title is empty"
        );
    }

    #[test]
    fn test_read_json_missing_file() {
        let result: ConfigResult<Vec<String>> =
            read_json(std::path::Path::new("/definitely/not/here.json"));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }
}

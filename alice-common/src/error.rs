//! Error types shared by the Alice crates.
//!
//! Everything here happens before a session exists: locating, reading,
//! parsing and validating configuration.

use std::path::PathBuf;

use thiserror::Error;

use crate::validation::ValidationError;

pub type Result<T> = std::result::Result<T, Error>;

/// Configuration and setup failures.
#[derive(Error, Debug)]
pub enum Error {
    #[error("cannot read config file {}: {source}", path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config file {} is not valid JSON: {source}", path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Loaded fine but failed validation.
    #[error("invalid configuration: {0}")]
    Invalid(#[from] ValidationError),
}

impl Error {
    /// Whether the configuration itself is wrong (as opposed to unreadable).
    pub fn is_invalid_config(&self) -> bool {
        matches!(self, Self::Invalid(_) | Self::ConfigParse { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_failure_is_invalid_config() {
        let err = Error::from(ValidationError::MissingField {
            field: "client.language".into(),
        });
        assert!(err.is_invalid_config());
        assert_eq!(
            err.to_string(),
            "invalid configuration: Missing required field: client.language"
        );
    }

    #[test]
    fn test_unreadable_file_is_not_invalid_config() {
        let err = Error::ConfigRead {
            path: PathBuf::from("/nope/config.json"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        };
        assert!(!err.is_invalid_config());
        assert!(err.to_string().contains("/nope/config.json"));
    }
}

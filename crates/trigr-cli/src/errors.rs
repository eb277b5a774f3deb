//! Error types for the trigr command line

use std::path::PathBuf;
use thiserror::Error;

/// Failures that happen before or around compilation
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Source directory '{0}' does not exist")]
    MissingSource(PathBuf),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_error_display() {
        let err = CliError::MissingSource(PathBuf::from("functions"));
        assert_eq!(err.to_string(), "Source directory 'functions' does not exist");
    }
}

// src/error.rs
//! Error types for the decoder
//!
//! Per-sentence failures are `protocol::DecodeError`; this type covers the
//! listener and config file.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, XexunError>;

#[derive(Debug, Error)]
pub enum XexunError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Config error: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_display() {
        let err: XexunError = std::io::Error::new(std::io::ErrorKind::NotFound, "missing").into();
        assert_eq!(err.to_string(), "IO error: missing");
    }

    #[test]
    fn test_config_error_display() {
        let err = XexunError::Config("HOME environment variable not set".to_string());
        assert_eq!(err.to_string(), "Config error: HOME environment variable not set");
    }
}

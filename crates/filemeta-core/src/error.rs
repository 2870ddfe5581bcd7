//! Error types for filemeta.

use thiserror::Error;

/// Result type alias using filemeta's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for filemeta operations.
///
/// None of these escape the public extraction entry points; they are
/// logged at the boundary and degrade to an empty result for the affected
/// source or section.
#[derive(Error, Debug)]
pub enum Error {
    /// A binary tag block (EXIF, ICC, IPTC, XMP) could not be decoded
    #[error("{format} decode error: {message}")]
    Decode {
        format: &'static str,
        message: String,
    },

    /// The image container itself could not be read
    #[error("Image error: {0}")]
    Image(String),

    /// External media probe failed or produced malformed output
    #[error("Probe error: {0}")]
    Probe(String),

    /// Perceptual hash generation failed
    #[error("Hash error: {0}")]
    Hash(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Shorthand for a decode failure in the named tag format.
    pub fn decode(format: &'static str, message: impl Into<String>) -> Self {
        Error::Decode {
            format,
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_decode() {
        let err = Error::decode("IPTC", "no datasets");
        assert_eq!(err.to_string(), "IPTC decode error: no datasets");
    }

    #[test]
    fn test_error_display_probe() {
        let err = Error::Probe("exit status 1".to_string());
        assert_eq!(err.to_string(), "Probe error: exit status 1");
    }

    #[test]
    fn test_error_display_hash() {
        let err = Error::Hash("empty buffer".to_string());
        assert_eq!(err.to_string(), "Hash error: empty buffer");
    }

    #[test]
    fn test_error_display_request() {
        let err = Error::Request("network unreachable".to_string());
        assert_eq!(err.to_string(), "Request error: network unreachable");
    }

    #[test]
    fn test_error_display_config() {
        let err = Error::Config("empty allow list".to_string());
        assert_eq!(err.to_string(), "Configuration error: empty allow list");
    }

    #[test]
    fn test_error_display_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = Error::Io(io_err);
        assert!(err.to_string().contains("I/O error:"));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<i32>("not a number").unwrap_err();
        let err: Error = json_err.into();
        match err {
            Error::Serialization(msg) => assert!(!msg.is_empty()),
            _ => panic!("Expected Serialization error"),
        }
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }
}

// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

/// Error type for repository sessions, target resolution and annotation.
///
/// Errors raised by the remote repository are never swallowed: every variant
/// propagates to the caller, and the command line tool exits with it.
#[derive(Debug)]
pub enum Error {
    /// An I/O error occurred during file operations.
    IoError(std::io::Error),
    /// Configuration parsing or loading error.
    ConfigError(::config::ConfigError),
    /// JSON serialization or deserialization error.
    JsonError(serde_json::Error),
    /// HTTP request error from the reqwest client.
    HttpError(reqwest::Error),
    /// URL parsing error.
    UrlParseError(url::ParseError),
    /// Integer parsing error.
    ParseIntError(std::num::ParseIntError),
    /// RPC error with error code and message from the gateway.
    RpcError(i32, String),
    /// Gateway returned an invalid or unexpected response.
    InvalidResponse,
    /// Invalid parameters provided to an operation.
    InvalidParameters(String),
    /// Login rejected for the named principal.
    AuthenticationFailed(String),
    /// Session is not allowed to perform the requested operation.
    Unauthorized,
    /// Gateway returned an empty session key.
    EmptySession,
    /// Session key is unknown or already closed.
    InvalidSession,
    /// No experimenter group with the given name.
    GroupNotFound(String),
    /// Referenced object or annotation does not exist.
    NotFound(String),
    /// Credentials could not be obtained from the provider.
    CredentialError(String),
    /// Annotation could not be written.
    WriteFailure(String),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::IoError(err)
    }
}

impl From<::config::ConfigError> for Error {
    fn from(err: ::config::ConfigError) -> Self {
        Error::ConfigError(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::JsonError(err)
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::HttpError(err)
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::UrlParseError(err)
    }
}

impl From<std::num::ParseIntError> for Error {
    fn from(err: std::num::ParseIntError) -> Self {
        Error::ParseIntError(err)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::IoError(e) => write!(f, "I/O error: {}", e),
            Error::ConfigError(e) => write!(f, "Configuration error: {}", e),
            Error::JsonError(e) => write!(f, "JSON error: {}", e),
            Error::HttpError(e) => write!(f, "HTTP error: {}", e),
            Error::UrlParseError(e) => write!(f, "URL parse error: {}", e),
            Error::ParseIntError(e) => write!(f, "Integer parse error: {}", e),
            Error::RpcError(code, msg) => write!(f, "RPC error {}: {}", code, msg),
            Error::InvalidResponse => write!(f, "Invalid server response"),
            Error::InvalidParameters(s) => write!(f, "Invalid parameters: {}", s),
            Error::AuthenticationFailed(user) => {
                write!(f, "Authentication failed for user {}", user)
            }
            Error::Unauthorized => write!(f, "Unauthorized access"),
            Error::EmptySession => write!(f, "Session key is empty"),
            Error::InvalidSession => write!(f, "Invalid or closed session"),
            Error::GroupNotFound(s) => write!(f, "Group not found: {}", s),
            Error::NotFound(s) => write!(f, "Not found: {}", s),
            Error::CredentialError(s) => write!(f, "Credential error: {}", s),
            Error::WriteFailure(s) => write!(f, "Write failure: {}", s),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::IoError(e) => Some(e),
            Error::ConfigError(e) => Some(e),
            Error::JsonError(e) => Some(e),
            Error::HttpError(e) => Some(e),
            Error::UrlParseError(e) => Some(e),
            Error::ParseIntError(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::RpcError(-32000, "permission denied".to_string());
        assert_eq!(err.to_string(), "RPC error -32000: permission denied");

        let err = Error::GroupNotFound("KOMP_eye".to_string());
        assert!(err.to_string().contains("KOMP_eye"));

        let err = Error::AuthenticationFailed("mpk".to_string());
        assert!(err.to_string().contains("mpk"));
    }

    #[test]
    fn test_error_source() {
        let err: Error = "x".parse::<u64>().unwrap_err().into();
        assert!(std::error::Error::source(&err).is_some());
        assert!(std::error::Error::source(&Error::InvalidSession).is_none());
    }
}

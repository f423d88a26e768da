//! Error types for the Places API client.
//!
//! # Design
//! Every failure surfaces as one `ApiError` value; nothing is retried or
//! swallowed. Non-2xx/3xx responses land in `HttpError` with the raw status
//! code and raw body text, so callers can decide on remediation themselves.
//! `DecodeError` is the API-level failure of a caller that asked for JSON and
//! got something else; it keeps the original body verbatim.

use thiserror::Error;

/// Errors returned by `PlacesClient` build/parse methods and by `Places`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// A precondition failed before any request was built.
    #[error("validation failed: {0}")]
    ValidationError(String),

    /// The caller asked for something the record lifecycle forbids, such as
    /// creating a record that already carries a server handle.
    #[error("contract violation: {0}")]
    ContractError(String),

    /// The endpoint table could not produce a URL.
    #[error(transparent)]
    EndpointError(#[from] EndpointError),

    /// The server answered with a status outside the 2xx/3xx classes.
    #[error("HTTP {status}: {body}")]
    HttpError { status: u16, body: String },

    /// A body that should have been JSON (or a specific JSON shape) was not.
    #[error("decoding failed ({reason}): {body}")]
    DecodeError {
        status: Option<u16>,
        body: String,
        reason: String,
    },

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    SerializationError(String),

    /// The request never produced a status (connection refused, timeout...).
    #[error("transport failed: {0}")]
    TransportError(String),

    /// A configuration file could not be read or parsed.
    #[error("invalid configuration: {0}")]
    ConfigError(String),
}

impl ApiError {
    /// HTTP status attached to the error, if it came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::HttpError { status, .. } => Some(*status),
            ApiError::DecodeError { status, .. } => *status,
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// `true` for errors raised on behalf of the server, i.e. `HttpError`
    /// and `DecodeError`.
    pub fn is_api_error(&self) -> bool {
        matches!(self, ApiError::HttpError { .. } | ApiError::DecodeError { .. })
    }

    pub(crate) fn decode(status: Option<u16>, body: impl Into<String>, reason: impl Into<String>) -> Self {
        ApiError::DecodeError {
            status,
            body: body.into(),
            reason: reason.into(),
        }
    }
}

/// Failures of the endpoint resolver.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EndpointError {
    #[error("unknown endpoint: {0}")]
    Unknown(String),

    #[error("endpoint {endpoint} requires argument {argument}")]
    MissingArgument { endpoint: String, argument: String },

    #[error("endpoint {endpoint} has a malformed template: {template}")]
    Malformed { endpoint: String, template: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_error_display_carries_raw_body() {
        let err = ApiError::HttpError {
            status: 500,
            body: r#"{"message":"x"}"#.to_string(),
        };
        assert_eq!(err.to_string(), r#"HTTP 500: {"message":"x"}"#);
        assert_eq!(err.status(), Some(500));
        assert!(err.is_api_error());
    }

    #[test]
    fn decode_error_is_an_api_error() {
        let err = ApiError::decode(Some(200), "<html>", "expected value");
        assert!(err.is_api_error());
        assert_eq!(err.status(), Some(200));
        assert!(!err.is_not_found());
    }

    #[test]
    fn endpoint_error_converts() {
        let err: ApiError = EndpointError::Unknown("nope".to_string()).into();
        assert_eq!(err.to_string(), "unknown endpoint: nope");
        assert_eq!(err.status(), None);
    }
}

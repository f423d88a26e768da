//! Server-assigned record handles.
//!
//! A handle is `SG_` followed by 22 alphanumerics, optionally followed by the
//! record's coordinates (`_<lat>_<lon>`) and a revision (`@<n>`), e.g.
//! `SG_4CsrE4oNy1gl8hCLdwu0F0_47.046962_-122.937467@1290636830`.

use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Human-readable form of the handle grammar, used in error messages.
pub const HANDLE_PATTERN: &str =
    r"SG_[A-Za-z0-9]{22}(?:_-?[0-9]{1,3}(?:\.[0-9]+)?_-?[0-9]{1,3}(?:\.[0-9]+)?)?(?:@[0-9]+)?";

lazy_static! {
    static ref HANDLE_REGEX: Regex = Regex::new(&format!("^{HANDLE_PATTERN}$")).unwrap();
}

/// Returns `true` if `s` is a well-formed handle. Never fails.
pub fn is_valid_handle(s: &str) -> bool {
    HANDLE_REGEX.is_match(s)
}

/// A validated server-assigned handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Handle(String);

impl Handle {
    pub fn parse(s: &str) -> Result<Self, ApiError> {
        if is_valid_handle(s) {
            Ok(Handle(s.to_string()))
        } else {
            Err(ApiError::ValidationError(format!(
                "handle {s:?} does not match the pattern {HANDLE_PATTERN}"
            )))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Handle {
    type Error = ApiError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Handle::parse(&s)
    }
}

impl From<Handle> for String {
    fn from(h: Handle) -> Self {
        h.0
    }
}

impl AsRef<str> for Handle {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_handle_is_valid() {
        assert!(is_valid_handle("SG_abcdefghijklmnopqrstuv"));
        assert!(is_valid_handle("SG_4CsrE4oNy1gl8hCLdwu0F0"));
    }

    #[test]
    fn handle_with_suffixes_is_valid() {
        assert!(is_valid_handle("SG_4CsrE4oNy1gl8hCLdwu0F0_47.046962_-122.937467"));
        assert!(is_valid_handle("SG_4CsrE4oNy1gl8hCLdwu0F0@1290636830"));
        assert!(is_valid_handle(
            "SG_4CsrE4oNy1gl8hCLdwu0F0_47.046962_-122.937467@1290636830"
        ));
        assert!(is_valid_handle("SG_4CsrE4oNy1gl8hCLdwu0F0_47_-122"));
    }

    #[test]
    fn malformed_handles_are_rejected() {
        assert!(!is_valid_handle("not_a_handle"));
        assert!(!is_valid_handle(""));
        assert!(!is_valid_handle("SG_short"));
        assert!(!is_valid_handle("SG_abcdefghijklmnopqrstuvw")); // 23 chars
        assert!(!is_valid_handle("sg_abcdefghijklmnopqrstuv")); // prefix is case-sensitive
        assert!(!is_valid_handle("SG_abcdefghijklmnopqrstu-")); // non-alphanumeric
        assert!(!is_valid_handle("SG_abcdefghijklmnopqrstuv@")); // empty revision
        assert!(!is_valid_handle("SG_abcdefghijklmnopqrstuv_1234.0_1.0")); // 4 integer digits
        assert!(!is_valid_handle("SG_abcdefghijklmnopqrstuv@1_1.0_2.0")); // suffix order
        assert!(!is_valid_handle(" SG_abcdefghijklmnopqrstuv"));
    }

    #[test]
    fn parse_error_lists_pattern() {
        let err = Handle::parse("nope").unwrap_err();
        match err {
            ApiError::ValidationError(msg) => {
                assert!(msg.contains("\"nope\""));
                assert!(msg.contains(HANDLE_PATTERN));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn handle_serde_validates() {
        let h: Handle = serde_json::from_str(r#""SG_abcdefghijklmnopqrstuv""#).unwrap();
        assert_eq!(h.as_str(), "SG_abcdefghijklmnopqrstuv");
        assert_eq!(serde_json::to_string(&h).unwrap(), r#""SG_abcdefghijklmnopqrstuv""#);
        assert!(serde_json::from_str::<Handle>(r#""bogus""#).is_err());
    }
}

//! Operation inputs and tagged outcomes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ApiError;
use crate::handle::Handle;
use crate::http::HttpResponse;

/// Optional filters shared by the search operations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchOptions {
    /// Search radius in kilometers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub radius: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl SearchOptions {
    pub fn radius(mut self, km: f64) -> Self {
        self.radius = Some(km);
        self
    }

    pub fn query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub(crate) fn validate(&self) -> Result<(), ApiError> {
        match self.radius {
            Some(r) if !r.is_finite() || r <= 0.0 => Err(ApiError::ValidationError(format!(
                "radius must be a positive number of kilometers, got {r}"
            ))),
            _ => Ok(()),
        }
    }
}

/// What `add_record` produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Created {
    /// The server assigned this handle.
    Handle(Handle),
    /// The record was stored under the caller's own layer and id.
    Stored { layer: String, id: String },
}

impl Created {
    pub fn handle(&self) -> Option<&Handle> {
        match self {
            Created::Handle(h) => Some(h),
            Created::Stored { .. } => None,
        }
    }
}

/// A successful response body that callers consume as-is.
///
/// `Json` when the server declared a JSON content type, `Raw` otherwise.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Json(Value),
    Raw(Vec<u8>),
}

impl Reply {
    /// Tag the body of a successful response. A body declared as JSON that
    /// does not parse is a `DecodeError`.
    pub fn from_response(response: HttpResponse) -> Result<Self, ApiError> {
        if !response.is_json() || response.body.is_empty() {
            return Ok(Reply::Raw(response.body));
        }
        serde_json::from_slice(&response.body)
            .map(Reply::Json)
            .map_err(|e| ApiError::decode(Some(response.status), response.text(), e.to_string()))
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Reply::Json(v) => Some(v),
            Reply::Raw(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_options_builder() {
        let opts = SearchOptions::default().radius(1.5).query("coffee").category("Food");
        assert_eq!(opts.radius, Some(1.5));
        assert_eq!(opts.query.as_deref(), Some("coffee"));
        assert_eq!(opts.category.as_deref(), Some("Food"));
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn non_positive_radius_is_rejected() {
        for r in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let err = SearchOptions::default().radius(r).validate().unwrap_err();
            assert!(matches!(err, ApiError::ValidationError(_)));
        }
    }

    #[test]
    fn reply_tags_by_content_type() {
        let json = HttpResponse::new(200, r#"{"status":"ok"}"#).with_header("Content-Type", "application/json");
        assert_eq!(
            Reply::from_response(json).unwrap(),
            Reply::Json(serde_json::json!({"status": "ok"}))
        );

        let raw = HttpResponse::new(200, r#"{"status":"ok"}"#).with_header("Content-Type", "text/plain");
        assert_eq!(Reply::from_response(raw).unwrap(), Reply::Raw(br#"{"status":"ok"}"#.to_vec()));

        let empty = HttpResponse::new(204, "").with_header("Content-Type", "application/json");
        assert_eq!(Reply::from_response(empty).unwrap(), Reply::Raw(Vec::new()));
    }

    #[test]
    fn reply_declared_json_must_parse() {
        let bad = HttpResponse::new(200, "<html>").with_header("content-type", "application/json");
        match Reply::from_response(bad).unwrap_err() {
            ApiError::DecodeError { status, body, .. } => {
                assert_eq!(status, Some(200));
                assert_eq!(body, "<html>");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn created_handle_accessor() {
        let h = Handle::parse("SG_abcdefghijklmnopqrstuv").unwrap();
        assert_eq!(Created::Handle(h.clone()).handle(), Some(&h));
        let stored = Created::Stored {
            layer: "l".to_string(),
            id: "1".to_string(),
        };
        assert!(stored.handle().is_none());
    }
}

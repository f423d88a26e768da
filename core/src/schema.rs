//! Wire-schema descriptors.
//!
//! # Design
//! The API changed shape between versions: 0.x keyed records by a layer and a
//! client-chosen id, 1.0 lets the server assign handles. Instead of one client
//! per version, a `Schema` value describes the endpoint table and the create
//! flow, and a single engine (`EndpointResolver` + `PlacesClient`) serves any
//! of them. Schemas are plain serde data so a config file can carry a custom
//! one.
//!
//! Envelope field names (`type`, `id`, `created`, `geometry`, `properties`) are
//! the same in every version, so they are fixed in the record codec and not
//! described here.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ApiError;

pub const PLACES_VERSION: &str = "1.0";

/// How `add_record` talks to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "style", rename_all = "snake_case")]
pub enum CreateStyle {
    /// POST the feature; the server answers `expected_status` and
    /// `{"id": <handle>}`.
    ServerHandle {
        endpoint: String,
        #[serde(default = "default_accepted")]
        expected_status: u16,
    },
    /// PUT the feature to a URL built from its layer and client id.
    ClientId { endpoint: String },
}

fn default_accepted() -> u16 {
    202
}

/// An optional query parameter: `param` is the name callers pass to the
/// resolver, `wire` the name sent to the server (defaults to `param`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryParam {
    pub param: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wire: Option<String>,
}

impl QueryParam {
    pub fn new(param: &str) -> Self {
        Self {
            param: param.to_string(),
            wire: None,
        }
    }

    pub fn renamed(param: &str, wire: &str) -> Self {
        Self {
            param: param.to_string(),
            wire: Some(wire.to_string()),
        }
    }

    pub fn wire_name(&self) -> &str {
        self.wire.as_deref().unwrap_or(&self.param)
    }
}

/// A relative path with `{name}` placeholders plus the optional query
/// parameters, in emission order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointTemplate {
    pub path: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub query: Vec<QueryParam>,
}

impl EndpointTemplate {
    pub fn path(path: &str) -> Self {
        Self {
            path: path.to_string(),
            query: Vec::new(),
        }
    }

    pub fn with_query(mut self, query: Vec<QueryParam>) -> Self {
        self.query = query;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    pub version: String,
    pub create: CreateStyle,
    pub endpoints: BTreeMap<String, EndpointTemplate>,
}

impl Schema {
    /// The handle-based Places API (version 1.0).
    pub fn places_v1() -> Self {
        let search_query = || {
            vec![
                QueryParam::new("radius"),
                QueryParam::renamed("query", "q"),
                QueryParam::new("category"),
            ]
        };
        let mut address_query = vec![QueryParam::new("address")];
        address_query.extend(search_query());

        let endpoints = BTreeMap::from([
            ("endpoints".to_string(), EndpointTemplate::path("endpoints.json")),
            ("create".to_string(), EndpointTemplate::path("places")),
            ("feature".to_string(), EndpointTemplate::path("features/{handle}.json")),
            (
                "search".to_string(),
                EndpointTemplate::path("places/{lat},{lon}.json").with_query(search_query()),
            ),
            (
                "search_by_ip".to_string(),
                EndpointTemplate::path("places/{ipaddr}.json").with_query(search_query()),
            ),
            (
                "search_by_my_ip".to_string(),
                EndpointTemplate::path("places/ip.json").with_query(search_query()),
            ),
            (
                "search_by_address".to_string(),
                EndpointTemplate::path("places/address.json").with_query(address_query),
            ),
        ]);

        Self {
            version: PLACES_VERSION.to_string(),
            create: CreateStyle::ServerHandle {
                endpoint: "create".to_string(),
                expected_status: default_accepted(),
            },
            endpoints,
        }
    }

    /// The layer/record API of the 0.x versions.
    pub fn layers_v0(version: &str) -> Self {
        let endpoints = BTreeMap::from([
            ("endpoints".to_string(), EndpointTemplate::path("endpoints.json")),
            ("record".to_string(), EndpointTemplate::path("records/{layer}/{id}.json")),
            ("records".to_string(), EndpointTemplate::path("records/{layer}.json")),
        ]);

        Self {
            version: version.to_string(),
            create: CreateStyle::ClientId {
                endpoint: "record".to_string(),
            },
            endpoints,
        }
    }

    /// The built-in schema for an API version string.
    pub fn for_version(version: &str) -> Result<Self, ApiError> {
        match version {
            PLACES_VERSION => Ok(Self::places_v1()),
            "0.1" | "0.2" => Ok(Self::layers_v0(version)),
            other => Err(ApiError::ValidationError(format!(
                "no built-in schema for API version {other:?}; supply one in the configuration"
            ))),
        }
    }

    pub fn endpoint(&self, name: &str) -> Option<&EndpointTemplate> {
        self.endpoints.get(name)
    }
}

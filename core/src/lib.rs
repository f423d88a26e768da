//! Synchronous client for the Places geospatial API.
//!
//! # Overview
//! Builds OAuth1-signed `HttpRequest` values and parses `HttpResponse`
//! values (host-does-IO pattern); `Places` runs the pair over a transport,
//! `ureq` by default.
//!
//! # Design
//! - `PlacesClient` holds only immutable state: credentials, base URL and
//!   the wire `Schema` of the API version it talks to.
//! - Each operation is split into `build_*` (produces a signed request) and
//!   `parse_*` (consumes a response), so the I/O boundary is explicit.
//! - Responses are classified by status class only; JSON is decoded by the
//!   operations that expect it, never by the transport.
//! - The record codec and the handle grammar are usable on their own.

pub mod client;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod handle;
pub mod http;
pub mod oauth;
pub mod record;
pub mod schema;
pub mod transport;
pub mod types;

pub use client::{Places, PlacesClient};
pub use config::ClientConfig;
pub use endpoint::{EndpointResolver, Params};
pub use error::{ApiError, EndpointError};
pub use handle::{is_valid_handle, Handle, HANDLE_PATTERN};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use oauth::{FixedNonce, NonceSource, OAuthSigner, SystemNonce};
pub use record::{records_from_collection, records_from_collection_with, records_to_collection, IdKind, Record};
pub use schema::{CreateStyle, EndpointTemplate, QueryParam, Schema};
pub use transport::{classify, execute, HttpSend, UreqTransport};
pub use types::{Created, Reply, SearchOptions};

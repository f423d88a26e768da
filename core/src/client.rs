//! Request builder and response parser for the Places API, plus a driver
//! that runs them over a transport.
//!
//! # Design
//! `PlacesClient` holds only immutable state: the endpoint resolver (base URL
//! and schema) and the OAuth signer. Each operation is split into a `build_*`
//! method that produces a signed `HttpRequest` and a `parse_*` method that
//! consumes an `HttpResponse`, so the core stays free of I/O. `Places` glues
//! the two halves together around an `HttpSend` transport.

use std::net::IpAddr;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::config::ClientConfig;
use crate::endpoint::{EndpointResolver, Params};
use crate::error::ApiError;
use crate::handle::{is_valid_handle, Handle};
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::oauth::{NonceSource, OAuthSigner};
use crate::record::{records_from_collection_with, records_to_collection, IdKind, Record};
use crate::schema::{CreateStyle, Schema};
use crate::transport::{execute, HttpSend, UreqTransport};
use crate::types::{Created, Reply, SearchOptions};

/// Synchronous, stateless client for the Places API.
///
/// Builds signed `HttpRequest` values and parses `HttpResponse` values
/// without touching the network.
#[derive(Debug, Clone)]
pub struct PlacesClient {
    resolver: EndpointResolver,
    signer: OAuthSigner,
}

impl PlacesClient {
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        config.validate()?;
        let schema = config.resolve_schema()?;
        Ok(Self {
            resolver: EndpointResolver::new(&config.host, config.port, schema),
            signer: OAuthSigner::new(&config.key, &config.secret),
        })
    }

    /// Replace the nonce/timestamp source used when signing.
    pub fn with_nonce_source(mut self, source: Arc<dyn NonceSource>) -> Self {
        self.signer = self.signer.with_nonce_source(source);
        self
    }

    pub fn schema(&self) -> &Schema {
        self.resolver.schema()
    }

    pub fn base_url(&self) -> &str {
        self.resolver.base_url()
    }

    /// Resolve an endpoint of the active schema.
    pub fn endpoint(&self, name: &str, params: &Params) -> Result<String, ApiError> {
        Ok(self.resolver.resolve(name, params)?)
    }

    // -----------------------------------------------------------------------
    // Build
    // -----------------------------------------------------------------------

    pub fn build_get_endpoints(&self) -> Result<HttpRequest, ApiError> {
        let url = self.endpoint("endpoints", &Params::new())?;
        Ok(self.signed(HttpMethod::Get, url, None))
    }

    /// Create request for `record`, following the schema's create style.
    pub fn build_add_record(&self, record: &Record) -> Result<HttpRequest, ApiError> {
        match &self.schema().create {
            CreateStyle::ServerHandle { endpoint, .. } => {
                let body = record.to_json(true)?;
                let url = self.endpoint(endpoint, &Params::new())?;
                Ok(self.signed(HttpMethod::Post, url, Some(body)))
            }
            CreateStyle::ClientId { endpoint } => {
                let (layer, id) = layer_key(record)?;
                let body = record.to_json(true)?;
                let url = self.endpoint(endpoint, &layer_params(layer, id)?)?;
                Ok(self.signed(HttpMethod::Put, url, Some(body)))
            }
        }
    }

    pub fn build_add_records(&self, layer: &str, records: &[Record]) -> Result<HttpRequest, ApiError> {
        if layer.is_empty() {
            return Err(ApiError::ValidationError("layer must not be empty".to_string()));
        }
        let collection = records_to_collection(records)?;
        let body = serde_json::to_string(&collection).map_err(|e| ApiError::SerializationError(e.to_string()))?;
        let url = self.endpoint("records", &Params::new().with("layer", layer))?;
        Ok(self.signed(HttpMethod::Post, url, Some(body)))
    }

    pub fn build_get_record(&self, handle: &str) -> Result<HttpRequest, ApiError> {
        let url = self.feature_url(handle)?;
        Ok(self.signed(HttpMethod::Get, url, None))
    }

    pub fn build_get_layer_record(&self, layer: &str, id: &str) -> Result<HttpRequest, ApiError> {
        let url = self.endpoint("record", &layer_params(layer, id)?)?;
        Ok(self.signed(HttpMethod::Get, url, None))
    }

    /// Update request for a record that already carries its handle.
    pub fn build_update_record(&self, record: &Record) -> Result<HttpRequest, ApiError> {
        let handle = record.handle().ok_or_else(|| {
            ApiError::ValidationError("only records with a handle can be updated; add the record first".to_string())
        })?;
        let url = self.feature_url(handle.as_str())?;
        let body = record.to_json(false)?;
        Ok(self.signed(HttpMethod::Post, url, Some(body)))
    }

    pub fn build_delete_record(&self, handle: &str) -> Result<HttpRequest, ApiError> {
        let url = self.feature_url(handle)?;
        Ok(self.signed(HttpMethod::Delete, url, None))
    }

    pub fn build_delete_layer_record(&self, layer: &str, id: &str) -> Result<HttpRequest, ApiError> {
        let url = self.endpoint("record", &layer_params(layer, id)?)?;
        Ok(self.signed(HttpMethod::Delete, url, None))
    }

    pub fn build_search(&self, lat: f64, lon: f64, options: &SearchOptions) -> Result<HttpRequest, ApiError> {
        validate_coordinates(lat, lon)?;
        let params = search_params(options)?.with("lat", lat).with("lon", lon);
        let url = self.endpoint("search", &params)?;
        Ok(self.signed(HttpMethod::Get, url, None))
    }

    pub fn build_search_by_ip(&self, ipaddr: &str, options: &SearchOptions) -> Result<HttpRequest, ApiError> {
        let ip: IpAddr = ipaddr
            .parse()
            .map_err(|_| ApiError::ValidationError(format!("{ipaddr:?} is not an IP address")))?;
        let url = self.endpoint("search_by_ip", &search_params(options)?.with("ipaddr", ip))?;
        Ok(self.signed(HttpMethod::Get, url, None))
    }

    pub fn build_search_by_my_ip(&self, options: &SearchOptions) -> Result<HttpRequest, ApiError> {
        let url = self.endpoint("search_by_my_ip", &search_params(options)?)?;
        Ok(self.signed(HttpMethod::Get, url, None))
    }

    pub fn build_search_by_address(&self, address: &str, options: &SearchOptions) -> Result<HttpRequest, ApiError> {
        if address.trim().is_empty() {
            return Err(ApiError::ValidationError("address must not be empty".to_string()));
        }
        let url = self.endpoint("search_by_address", &search_params(options)?.with("address", address))?;
        Ok(self.signed(HttpMethod::Get, url, None))
    }

    // -----------------------------------------------------------------------
    // Parse
    // -----------------------------------------------------------------------

    pub fn parse_get_endpoints(&self, response: HttpResponse) -> Result<Value, ApiError> {
        ensure_success(&response)?;
        decode_json(&response)
    }

    /// Interpret the create response. `record` is the record that was sent.
    pub fn parse_add_record(&self, record: &Record, response: HttpResponse) -> Result<Created, ApiError> {
        ensure_success(&response)?;
        match &self.schema().create {
            CreateStyle::ServerHandle { expected_status, .. } => {
                if response.status != *expected_status {
                    return Err(http_error(&response));
                }
                let doc = decode_json(&response)?;
                let id = match doc.get("id") {
                    Some(Value::String(id)) => id,
                    _ => return Err(http_error(&response)),
                };
                if !is_valid_handle(id) {
                    return Err(ApiError::decode(
                        Some(response.status),
                        response.text(),
                        format!("server returned {id:?}, which is not a handle"),
                    ));
                }
                let handle = Handle::parse(id)?;
                debug!(%handle, "record created");
                Ok(Created::Handle(handle))
            }
            CreateStyle::ClientId { .. } => {
                let (layer, id) = layer_key(record)?;
                Ok(Created::Stored {
                    layer: layer.to_string(),
                    id: id.to_string(),
                })
            }
        }
    }

    pub fn parse_add_records(&self, response: HttpResponse) -> Result<Reply, ApiError> {
        ensure_success(&response)?;
        Reply::from_response(response)
    }

    pub fn parse_get_record(&self, response: HttpResponse) -> Result<Record, ApiError> {
        ensure_success(&response)?;
        let doc = decode_json(&response)?;
        Record::from_document_with(&doc, self.id_kind()).map_err(|e| with_status(e, response.status))
    }

    pub fn parse_get_layer_record(&self, response: HttpResponse) -> Result<Record, ApiError> {
        self.parse_get_record(response)
    }

    pub fn parse_update_record(&self, response: HttpResponse) -> Result<Reply, ApiError> {
        ensure_success(&response)?;
        Reply::from_response(response)
    }

    pub fn parse_delete_record(&self, response: HttpResponse) -> Result<Reply, ApiError> {
        ensure_success(&response)?;
        Reply::from_response(response)
    }

    pub fn parse_delete_layer_record(&self, response: HttpResponse) -> Result<Reply, ApiError> {
        self.parse_delete_record(response)
    }

    /// Parse a FeatureCollection answer of any search endpoint.
    pub fn parse_search(&self, response: HttpResponse) -> Result<Vec<Record>, ApiError> {
        ensure_success(&response)?;
        let doc = decode_json(&response)?;
        records_from_collection_with(&doc, self.id_kind()).map_err(|e| with_status(e, response.status))
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    /// Layer schemas have no handles, so their `id` is always the client id.
    fn id_kind(&self) -> IdKind {
        match self.schema().create {
            CreateStyle::ServerHandle { .. } => IdKind::HandleOrClientId,
            CreateStyle::ClientId { .. } => IdKind::ClientId,
        }
    }

    fn feature_url(&self, handle: &str) -> Result<String, ApiError> {
        let handle = Handle::parse(handle)?;
        self.endpoint("feature", &Params::new().with("handle", handle))
    }

    fn signed(&self, method: HttpMethod, url: String, body: Option<String>) -> HttpRequest {
        let mut headers = Vec::new();
        if body.is_some() {
            headers.push(("content-type".to_string(), "application/json".to_string()));
        }
        headers.extend(self.signer.sign(&method, &url, body.as_deref().map(str::as_bytes)));
        HttpRequest {
            method,
            url,
            headers,
            body,
        }
    }
}

fn layer_key(record: &Record) -> Result<(&str, &str), ApiError> {
    match (record.layer(), record.id.as_deref()) {
        (Some(layer), Some(id)) if !layer.is_empty() && !id.is_empty() => Ok((layer, id)),
        _ => Err(ApiError::ValidationError(
            "records of a layer schema need a layer property and a client id".to_string(),
        )),
    }
}

fn layer_params(layer: &str, id: &str) -> Result<Params, ApiError> {
    if layer.is_empty() || id.is_empty() {
        return Err(ApiError::ValidationError(format!(
            "layer and id must not be empty (layer {layer:?}, id {id:?})"
        )));
    }
    Ok(Params::new().with("layer", layer).with("id", id))
}

fn validate_coordinates(lat: f64, lon: f64) -> Result<(), ApiError> {
    if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
        return Err(ApiError::ValidationError(format!("latitude {lat} is outside [-90, 90]")));
    }
    if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
        return Err(ApiError::ValidationError(format!("longitude {lon} is outside [-180, 180]")));
    }
    Ok(())
}

fn search_params(options: &SearchOptions) -> Result<Params, ApiError> {
    options.validate()?;
    Ok(Params::new()
        .with_opt("radius", options.radius)
        .with_opt("query", options.query.as_deref())
        .with_opt("category", options.category.as_deref()))
}

// `execute` already classifies, but `parse_*` is also called directly by
// hosts that do their own I/O, so the check is repeated here.
fn ensure_success(response: &HttpResponse) -> Result<(), ApiError> {
    match response.status / 100 {
        2 | 3 => Ok(()),
        _ => Err(http_error(response)),
    }
}

fn http_error(response: &HttpResponse) -> ApiError {
    ApiError::HttpError {
        status: response.status,
        body: response.text().into_owned(),
    }
}

fn decode_json(response: &HttpResponse) -> Result<Value, ApiError> {
    serde_json::from_slice(&response.body)
        .map_err(|e| ApiError::decode(Some(response.status), response.text(), e.to_string()))
}

fn with_status(err: ApiError, status: u16) -> ApiError {
    match err {
        ApiError::DecodeError { status: None, body, reason } => ApiError::DecodeError {
            status: Some(status),
            body,
            reason,
        },
        other => other,
    }
}

/// Runs `PlacesClient` operations over a transport.
#[derive(Debug, Clone)]
pub struct Places<T: HttpSend = UreqTransport> {
    client: PlacesClient,
    transport: T,
}

impl Places<UreqTransport> {
    /// A client talking to the configured server over `ureq`.
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        Ok(Self::with_transport(PlacesClient::new(config)?, UreqTransport::new()))
    }
}

impl<T: HttpSend> Places<T> {
    pub fn with_transport(client: PlacesClient, transport: T) -> Self {
        Self { client, transport }
    }

    pub fn client(&self) -> &PlacesClient {
        &self.client
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn run(&self, request: Result<HttpRequest, ApiError>) -> Result<HttpResponse, ApiError> {
        execute(&self.transport, &request?)
    }

    pub fn get_endpoints(&self) -> Result<Value, ApiError> {
        let response = self.run(self.client.build_get_endpoints())?;
        self.client.parse_get_endpoints(response)
    }

    pub fn add_record(&self, record: &Record) -> Result<Created, ApiError> {
        let response = self.run(self.client.build_add_record(record))?;
        self.client.parse_add_record(record, response)
    }

    pub fn add_records(&self, layer: &str, records: &[Record]) -> Result<Reply, ApiError> {
        let response = self.run(self.client.build_add_records(layer, records))?;
        self.client.parse_add_records(response)
    }

    pub fn get_record(&self, handle: &str) -> Result<Record, ApiError> {
        let response = self.run(self.client.build_get_record(handle))?;
        self.client.parse_get_record(response)
    }

    pub fn get_layer_record(&self, layer: &str, id: &str) -> Result<Record, ApiError> {
        let response = self.run(self.client.build_get_layer_record(layer, id))?;
        self.client.parse_get_layer_record(response)
    }

    pub fn update_record(&self, record: &Record) -> Result<Reply, ApiError> {
        let response = self.run(self.client.build_update_record(record))?;
        self.client.parse_update_record(response)
    }

    pub fn delete_record(&self, handle: &str) -> Result<Reply, ApiError> {
        let response = self.run(self.client.build_delete_record(handle))?;
        self.client.parse_delete_record(response)
    }

    pub fn delete_layer_record(&self, layer: &str, id: &str) -> Result<Reply, ApiError> {
        let response = self.run(self.client.build_delete_layer_record(layer, id))?;
        self.client.parse_delete_layer_record(response)
    }

    pub fn search(&self, lat: f64, lon: f64, options: &SearchOptions) -> Result<Vec<Record>, ApiError> {
        let response = self.run(self.client.build_search(lat, lon, options))?;
        self.client.parse_search(response)
    }

    pub fn search_by_ip(&self, ipaddr: &str, options: &SearchOptions) -> Result<Vec<Record>, ApiError> {
        let response = self.run(self.client.build_search_by_ip(ipaddr, options))?;
        self.client.parse_search(response)
    }

    pub fn search_by_my_ip(&self, options: &SearchOptions) -> Result<Vec<Record>, ApiError> {
        let response = self.run(self.client.build_search_by_my_ip(options))?;
        self.client.parse_search(response)
    }

    pub fn search_by_address(&self, address: &str, options: &SearchOptions) -> Result<Vec<Record>, ApiError> {
        let response = self.run(self.client.build_search_by_address(address, options))?;
        self.client.parse_search(response)
    }
}

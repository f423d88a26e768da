//! The place record and its GeoJSON Feature codec.
//!
//! # Design
//! `Record` keeps coordinates in `lat, lon` order while the wire document
//! stores them as GeoJSON `[lon, lat]`. The server handle and the creation
//! time are private: the first is attached at most once, the second is fixed
//! at construction. The type tag and a string `type` property are one value:
//! setting the property sets `record_type`, and the property map never holds
//! a string under `type`. A non-string `type` stays an ordinary property and
//! is sent as-is. The document shape is:
//!
//! ```text
//! {"type":"Feature","id":..,"created":..,
//!  "geometry":{"type":"Point","coordinates":[lon,lat]},
//!  "properties":{..,"type":"object"}}
//! ```

use chrono::Utc;
use serde_json::{json, Map, Value};

use crate::error::ApiError;
use crate::handle::{is_valid_handle, Handle};

pub const DEFAULT_RECORD_TYPE: &str = "object";

/// A single place.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub lat: f64,
    pub lon: f64,
    handle: Option<Handle>,
    /// Client-chosen identifier. Used for idempotent creation and, in the
    /// layer schema, as the record key.
    pub id: Option<String>,
    pub record_type: String,
    created: i64,
    properties: Map<String, Value>,
}

/// How a document's `id` field is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdKind {
    /// A string matching the handle grammar is the handle, any other string
    /// is the client id.
    #[default]
    HandleOrClientId,
    /// Always the client id. Layer records have no handles.
    ClientId,
}

impl Record {
    /// A fresh record with no handle, created now.
    pub fn new(lat: f64, lon: f64) -> Self {
        Self::with_created(lat, lon, Utc::now().timestamp())
    }

    pub fn with_created(lat: f64, lon: f64, created: i64) -> Self {
        Self {
            lat,
            lon,
            handle: None,
            id: None,
            record_type: DEFAULT_RECORD_TYPE.to_string(),
            created,
            properties: Map::new(),
        }
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn record_type(mut self, record_type: impl Into<String>) -> Self {
        self.record_type = record_type.into();
        self
    }

    pub fn property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set_property(key, value);
        self
    }

    pub fn with_properties(mut self, properties: Map<String, Value>) -> Self {
        for (key, value) in properties {
            self.set_property(key, value);
        }
        self
    }

    /// Named properties, without the type tag.
    pub fn properties(&self) -> &Map<String, Value> {
        &self.properties
    }

    pub fn get_property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    /// Set a property. A string `type` sets the type tag instead.
    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        match (key.into(), value.into()) {
            (key, Value::String(tag)) if key == "type" => self.record_type = tag,
            (key, value) => {
                self.properties.insert(key, value);
            }
        }
    }

    pub fn remove_property(&mut self, key: &str) -> Option<Value> {
        self.properties.remove(key)
    }

    pub fn handle(&self) -> Option<&Handle> {
        self.handle.as_ref()
    }

    pub fn created(&self) -> i64 {
        self.created
    }

    /// The `layer` property, which keys records in the layer schema.
    pub fn layer(&self) -> Option<&str> {
        self.properties.get("layer").and_then(Value::as_str)
    }

    /// Attach the handle the server assigned on creation.
    pub fn attach_handle(&mut self, handle: Handle) -> Result<(), ApiError> {
        if let Some(existing) = &self.handle {
            return Err(ApiError::ContractError(format!(
                "record already has handle {existing}, refusing to replace it with {handle}"
            )));
        }
        self.handle = Some(handle);
        Ok(())
    }

    /// Encode as a Feature document.
    ///
    /// With `for_creation` the `id` field carries the client-chosen id and a
    /// record that already has a handle is rejected; otherwise `id` carries
    /// the handle.
    pub fn to_document(&self, for_creation: bool) -> Result<Value, ApiError> {
        let id = if for_creation {
            if let Some(handle) = &self.handle {
                return Err(ApiError::ContractError(format!(
                    "a record cannot be added when it already has a handle: {handle}"
                )));
            }
            self.id.clone().map(Value::String).unwrap_or(Value::Null)
        } else {
            self.handle
                .as_ref()
                .map(|h| Value::String(h.to_string()))
                .unwrap_or(Value::Null)
        };

        let mut properties = self.properties.clone();
        properties
            .entry("type")
            .or_insert_with(|| Value::String(self.record_type.clone()));

        Ok(json!({
            "type": "Feature",
            "id": id,
            "created": self.created,
            "geometry": {
                "type": "Point",
                "coordinates": [self.lon, self.lat],
            },
            "properties": properties,
        }))
    }

    pub fn to_json(&self, for_creation: bool) -> Result<String, ApiError> {
        let doc = self.to_document(for_creation)?;
        serde_json::to_string(&doc).map_err(|e| ApiError::SerializationError(e.to_string()))
    }

    /// Decode a Feature document. A missing `created` defaults to now.
    pub fn from_document(doc: &Value) -> Result<Self, ApiError> {
        Self::from_document_with(doc, IdKind::HandleOrClientId)
    }

    /// Like `from_document`, reading `id` as `kind` says.
    pub fn from_document_with(doc: &Value, kind: IdKind) -> Result<Self, ApiError> {
        Self::decode(doc, Utc::now().timestamp(), kind)
    }

    /// Decode a Feature document from JSON text.
    pub fn from_json(text: &str) -> Result<Self, ApiError> {
        let doc: Value = serde_json::from_str(text).map_err(|e| ApiError::decode(None, text, e.to_string()))?;
        Self::from_document(&doc)
    }

    fn decode(doc: &Value, now: i64, kind: IdKind) -> Result<Self, ApiError> {
        let fail = |reason: &str| ApiError::decode(None, doc.to_string(), reason);

        let coordinates = doc
            .get("geometry")
            .and_then(|g| g.get("coordinates"))
            .and_then(Value::as_array)
            .ok_or_else(|| fail("missing geometry.coordinates"))?;
        if coordinates.len() < 2 {
            return Err(fail("geometry.coordinates needs [lon, lat]"));
        }
        let lon = coordinates[0]
            .as_f64()
            .ok_or_else(|| fail("longitude is not a number"))?;
        let lat = coordinates[1]
            .as_f64()
            .ok_or_else(|| fail("latitude is not a number"))?;

        let mut properties = doc
            .get("properties")
            .and_then(Value::as_object)
            .cloned()
            .ok_or_else(|| fail("missing properties"))?;

        let created = match doc.get("created") {
            None | Some(Value::Null) => now,
            Some(v) => v
                .as_i64()
                .or_else(|| v.as_f64().map(|f| f as i64))
                .ok_or_else(|| fail("created is not a number"))?,
        };

        let (handle, id) = match doc.get("id") {
            None | Some(Value::Null) => (None, None),
            Some(Value::String(s)) if kind == IdKind::HandleOrClientId && is_valid_handle(s) => {
                (Some(Handle::parse(s)?), None)
            }
            Some(Value::String(s)) => (None, Some(s.clone())),
            Some(_) => return Err(fail("id is not a string")),
        };

        // only a string is the type tag; anything else stays a property
        let record_type = match properties.remove("type") {
            Some(Value::String(t)) => t,
            Some(other) => {
                properties.insert("type".to_string(), other);
                DEFAULT_RECORD_TYPE.to_string()
            }
            None => DEFAULT_RECORD_TYPE.to_string(),
        };

        Ok(Self {
            lat,
            lon,
            handle,
            id,
            record_type,
            created,
            properties,
        })
    }
}

/// Wrap creation documents of `records` in a FeatureCollection.
pub fn records_to_collection(records: &[Record]) -> Result<Value, ApiError> {
    let features = records
        .iter()
        .map(|r| r.to_document(true))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(json!({
        "type": "FeatureCollection",
        "features": features,
    }))
}

/// Decode every feature of a FeatureCollection document.
pub fn records_from_collection(doc: &Value) -> Result<Vec<Record>, ApiError> {
    records_from_collection_with(doc, IdKind::HandleOrClientId)
}

pub fn records_from_collection_with(doc: &Value, kind: IdKind) -> Result<Vec<Record>, ApiError> {
    let features = doc
        .get("features")
        .and_then(Value::as_array)
        .ok_or_else(|| ApiError::decode(None, doc.to_string(), "missing features"))?;
    features.iter().map(|f| Record::from_document_with(f, kind)).collect()
}

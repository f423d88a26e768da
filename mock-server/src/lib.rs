use std::{collections::HashMap, net::IpAddr, sync::Arc};

use axum::{
    extract::{Path, Query, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

#[derive(Default)]
pub struct Store {
    /// Places features keyed by handle.
    pub features: HashMap<String, Value>,
    /// Layer records keyed by (layer, id).
    pub records: HashMap<(String, String), Value>,
}

pub type Db = Arc<RwLock<Store>>;

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub category: Option<String>,
    pub radius: Option<f64>,
    pub address: Option<String>,
}

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(Store::default()));
    Router::new()
        .route("/{version}/endpoints.json", get(list_endpoints))
        .route("/{version}/places", post(create_place))
        .route("/{version}/places/{target}", get(search_places))
        .route(
            "/{version}/features/{file}",
            get(get_feature).post(update_feature).delete(delete_feature),
        )
        .route("/{version}/records/{file}", post(add_records))
        .route(
            "/{version}/records/{layer}/{file}",
            get(get_record).put(put_record).delete(delete_record),
        )
        .layer(middleware::from_fn(require_oauth))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

/// A fresh `SG_` handle with 22 alphanumerics.
pub fn new_handle() -> String {
    let token = Uuid::new_v4().simple().to_string();
    format!("SG_{}", &token[..22])
}

/// Great-circle distance in kilometers.
pub fn distance_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (p1, p2) = (lat1.to_radians(), lat2.to_radians());
    let dp = (lat2 - lat1).to_radians();
    let dl = (lon2 - lon1).to_radians();
    let a = (dp / 2.0).sin().powi(2) + p1.cos() * p2.cos() * (dl / 2.0).sin().powi(2);
    6371.0 * 2.0 * a.sqrt().asin()
}

/// What a `places/{target}` segment asks for.
#[derive(Debug, PartialEq)]
pub enum SearchTarget {
    Point(f64, f64),
    Ip(IpAddr),
    MyIp,
    Address,
}

pub fn parse_target(segment: &str) -> Option<SearchTarget> {
    let target = segment.strip_suffix(".json")?;
    match target {
        "ip" => Some(SearchTarget::MyIp),
        "address" => Some(SearchTarget::Address),
        _ => {
            if let Some((lat, lon)) = target.split_once(',') {
                return Some(SearchTarget::Point(lat.parse().ok()?, lon.parse().ok()?));
            }
            target.parse().ok().map(SearchTarget::Ip)
        }
    }
}

async fn require_oauth(req: Request, next: Next) -> Response {
    let signed = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("OAuth ") && v.contains("oauth_consumer_key=") && v.contains("oauth_signature="))
        .unwrap_or(false);
    if !signed {
        tracing::warn!(uri = %req.uri(), "rejecting unsigned request");
        return (StatusCode::UNAUTHORIZED, "missing OAuth credentials").into_response();
    }
    next.run(req).await
}

fn bad_request(msg: impl Into<String>) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({"message": msg.into()}))).into_response()
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, Json(json!({"message": "not found"}))).into_response()
}

fn parse_body(body: &str) -> Result<Value, Response> {
    serde_json::from_str(body).map_err(|e| bad_request(format!("invalid JSON: {e}")))
}

fn coordinates(feature: &Value) -> Option<(f64, f64)> {
    let c = feature.get("geometry")?.get("coordinates")?.as_array()?;
    Some((c.get(1)?.as_f64()?, c.first()?.as_f64()?))
}

async fn list_endpoints(Path(version): Path<String>) -> Json<Value> {
    Json(json!([
        format!("POST /{version}/places"),
        format!("GET /{version}/features/{{handle}}.json"),
        format!("POST /{version}/features/{{handle}}.json"),
        format!("DELETE /{version}/features/{{handle}}.json"),
        format!("GET /{version}/places/{{lat}},{{lon}}.json"),
        format!("GET /{version}/places/{{ipaddr}}.json"),
        format!("GET /{version}/places/ip.json"),
        format!("GET /{version}/places/address.json"),
    ]))
}

async fn create_place(State(db): State<Db>, body: String) -> Response {
    let mut feature = match parse_body(&body) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    if feature.get("id").and_then(Value::as_str).is_some_and(|id| id.starts_with("SG_")) {
        return bad_request("a new feature must not carry a handle");
    }
    if coordinates(&feature).is_none() {
        return bad_request("geometry.coordinates is required");
    }
    let handle = new_handle();
    feature["id"] = Value::String(handle.clone());
    db.write().await.features.insert(handle.clone(), feature);
    tracing::info!(%handle, "feature created");
    (StatusCode::ACCEPTED, Json(json!({"id": handle}))).into_response()
}

async fn get_feature(State(db): State<Db>, Path((_, file)): Path<(String, String)>) -> Response {
    let Some(handle) = file.strip_suffix(".json") else {
        return not_found();
    };
    match db.read().await.features.get(handle) {
        Some(feature) => Json(feature.clone()).into_response(),
        None => not_found(),
    }
}

async fn update_feature(
    State(db): State<Db>,
    Path((_, file)): Path<(String, String)>,
    body: String,
) -> Response {
    let Some(handle) = file.strip_suffix(".json") else {
        return not_found();
    };
    let mut feature = match parse_body(&body) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let mut store = db.write().await;
    let Some(existing) = store.features.get_mut(handle) else {
        return not_found();
    };
    feature["id"] = Value::String(handle.to_string());
    if let Some(created) = existing.get("created") {
        feature["created"] = created.clone();
    }
    *existing = feature;
    Json(json!({"id": handle, "status": "updated"})).into_response()
}

async fn delete_feature(State(db): State<Db>, Path((_, file)): Path<(String, String)>) -> Response {
    let Some(handle) = file.strip_suffix(".json") else {
        return not_found();
    };
    match db.write().await.features.remove(handle) {
        Some(_) => StatusCode::NO_CONTENT.into_response(),
        None => not_found(),
    }
}

async fn search_places(
    State(db): State<Db>,
    Path((_, target)): Path<(String, String)>,
    Query(query): Query<SearchQuery>,
) -> Response {
    let Some(target) = parse_target(&target) else {
        return not_found();
    };
    let origin = match target {
        SearchTarget::Point(lat, lon) => Some((lat, lon)),
        SearchTarget::Address if query.address.as_deref().unwrap_or("").is_empty() => {
            return bad_request("address is required");
        }
        _ => None,
    };

    let store = db.read().await;
    let mut hits: Vec<(&String, &Value)> = store
        .features
        .iter()
        .filter(|(_, f)| matches(f, &query, origin))
        .collect();
    hits.sort_by(|a, b| a.0.cmp(b.0));
    let features: Vec<Value> = hits.into_iter().map(|(_, f)| f.clone()).collect();

    Json(json!({"type": "FeatureCollection", "features": features})).into_response()
}

fn matches(feature: &Value, query: &SearchQuery, origin: Option<(f64, f64)>) -> bool {
    let props = &feature["properties"];
    if let Some(q) = query.q.as_deref().filter(|q| !q.is_empty()) {
        let name = props["name"].as_str().unwrap_or("").to_lowercase();
        if !name.contains(&q.to_lowercase()) {
            return false;
        }
    }
    if let Some(category) = query.category.as_deref().filter(|c| !c.is_empty()) {
        if props["category"].as_str() != Some(category) {
            return false;
        }
    }
    if let (Some(radius), Some((lat, lon))) = (query.radius, origin) {
        match coordinates(feature) {
            Some((flat, flon)) if distance_km(lat, lon, flat, flon) <= radius => {}
            _ => return false,
        }
    }
    true
}

async fn put_record(
    State(db): State<Db>,
    Path((_, layer, file)): Path<(String, String, String)>,
    body: String,
) -> Response {
    let Some(id) = file.strip_suffix(".json") else {
        return not_found();
    };
    let feature = match parse_body(&body) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    db.write().await.records.insert((layer, id.to_string()), feature);
    Json(json!({"id": id})).into_response()
}

async fn add_records(State(db): State<Db>, Path((_, file)): Path<(String, String)>, body: String) -> Response {
    let Some(layer) = file.strip_suffix(".json") else {
        return not_found();
    };
    let collection = match parse_body(&body) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Some(features) = collection["features"].as_array() else {
        return bad_request("features is required");
    };
    let mut keyed = Vec::with_capacity(features.len());
    for feature in features {
        let Some(id) = feature["id"].as_str() else {
            return bad_request("every feature needs an id");
        };
        keyed.push(((layer.to_string(), id.to_string()), feature.clone()));
    }
    let count = keyed.len();
    db.write().await.records.extend(keyed);
    Json(json!({"count": count})).into_response()
}

async fn get_record(State(db): State<Db>, Path((_, layer, file)): Path<(String, String, String)>) -> Response {
    let Some(id) = file.strip_suffix(".json") else {
        return not_found();
    };
    match db.read().await.records.get(&(layer, id.to_string())) {
        Some(feature) => Json(feature.clone()).into_response(),
        None => not_found(),
    }
}

async fn delete_record(State(db): State<Db>, Path((_, layer, file)): Path<(String, String, String)>) -> Response {
    let Some(id) = file.strip_suffix(".json") else {
        return not_found();
    };
    match db.write().await.records.remove(&(layer, id.to_string())) {
        Some(_) => StatusCode::NO_CONTENT.into_response(),
        None => not_found(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_handle_has_expected_shape() {
        let handle = new_handle();
        assert!(handle.starts_with("SG_"));
        assert_eq!(handle.len(), 25);
        assert!(handle[3..].chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(handle, new_handle());
    }

    #[test]
    fn parse_target_variants() {
        assert_eq!(parse_target("11.03,10.04.json"), Some(SearchTarget::Point(11.03, 10.04)));
        assert_eq!(parse_target("ip.json"), Some(SearchTarget::MyIp));
        assert_eq!(parse_target("address.json"), Some(SearchTarget::Address));
        assert_eq!(
            parse_target("192.0.2.1.json"),
            Some(SearchTarget::Ip("192.0.2.1".parse().unwrap()))
        );
        assert_eq!(parse_target("11.03,10.04"), None);
        assert_eq!(parse_target("nowhere.json"), None);
        assert_eq!(parse_target("a,b.json"), None);
    }

    #[test]
    fn distance_is_great_circle() {
        assert!(distance_km(0.0, 0.0, 0.0, 0.0).abs() < 1e-9);
        // one degree of latitude is roughly 111 km
        let d = distance_km(0.0, 0.0, 1.0, 0.0);
        assert!((d - 111.19).abs() < 0.1, "{d}");
    }

    #[test]
    fn search_filters() {
        let feature = json!({
            "geometry": {"type": "Point", "coordinates": [-122.4, 37.7]},
            "properties": {"name": "Blue Bottle Coffee", "category": "Food"},
        });
        let query = |q: Option<&str>, category: Option<&str>, radius: Option<f64>| SearchQuery {
            q: q.map(str::to_string),
            category: category.map(str::to_string),
            radius,
            address: None,
        };
        assert!(matches(&feature, &query(Some("coffee"), None, None), None));
        assert!(!matches(&feature, &query(Some("tea"), None, None), None));
        assert!(matches(&feature, &query(None, Some("Food"), None), None));
        assert!(!matches(&feature, &query(None, Some("Retail"), None), None));
        assert!(matches(&feature, &query(None, None, Some(5.0)), Some((37.7, -122.4))));
        assert!(!matches(&feature, &query(None, None, Some(5.0)), Some((40.7, -74.0))));
        // radius without an origin is ignored
        assert!(matches(&feature, &query(None, None, Some(5.0)), None));
    }
}

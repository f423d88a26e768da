//! Full record lifecycle against the live mock server.
//!
//! # Design
//! Starts the mock server on a random port, then drives every client
//! operation over real HTTP through the default `ureq` transport. Each test
//! gets its own server so the in-memory stores never interleave.

use std::net::SocketAddr;

use places_core::{
    ApiError, ClientConfig, Created, HttpMethod, HttpRequest, HttpSend, Places, Record, Reply, SearchOptions,
    UreqTransport,
};

fn start_server() -> SocketAddr {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener).await
        })
        .unwrap();
    });

    addr
}

fn config(addr: SocketAddr) -> ClientConfig {
    ClientConfig::new("MY_OAUTH_KEY", "MY_SECRET_KEY")
        .host(&addr.ip().to_string())
        .port(addr.port())
}

#[test]
fn places_lifecycle() {
    let addr = start_server();
    let places = Places::new(&config(addr)).unwrap();

    // Step 1: the endpoint listing mentions the create route.
    let endpoints = places.get_endpoints().unwrap();
    assert!(endpoints
        .as_array()
        .unwrap()
        .iter()
        .any(|e| e == "POST /1.0/places"));

    // Step 2: add a record and attach the handle the server assigned.
    let mut record = Record::new(37.7749, -122.4194)
        .record_type("place")
        .property("name", "Blue Bottle Coffee")
        .property("category", "Food");
    let created = places.add_record(&record).unwrap();
    let handle = created.handle().cloned().expect("server handle");
    record.attach_handle(handle.clone()).unwrap();

    // Step 3: a record with a handle cannot be added again.
    let err = places.add_record(&record).unwrap_err();
    assert!(matches!(err, ApiError::ContractError(_)));

    // Step 4: get it back.
    let fetched = places.get_record(handle.as_str()).unwrap();
    assert_eq!(fetched.handle(), Some(&handle));
    assert_eq!(fetched.lat, 37.7749);
    assert_eq!(fetched.lon, -122.4194);
    assert_eq!(fetched.record_type, "place");
    assert_eq!(fetched.properties()["name"], "Blue Bottle Coffee");
    assert_eq!(fetched.created(), record.created());

    // Step 5: update a property.
    record.set_property("name", "Blue Bottle");
    let reply = places.update_record(&record).unwrap();
    assert_eq!(reply.as_json().unwrap()["status"], "updated");
    let fetched = places.get_record(handle.as_str()).unwrap();
    assert_eq!(fetched.properties()["name"], "Blue Bottle");

    // Step 6: search near the record with every filter.
    let options = SearchOptions::default().radius(5.0).query("bottle").category("Food");
    let hits = places.search(37.77, -122.42, &options).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].handle(), Some(&handle));

    // Step 7: a far away search finds nothing.
    let hits = places.search(40.7128, -74.006, &SearchOptions::default().radius(5.0)).unwrap();
    assert!(hits.is_empty());

    // Step 8: the other search flavors reach the server.
    let hits = places.search_by_ip("192.0.2.1", &SearchOptions::default().query("bottle")).unwrap();
    assert_eq!(hits.len(), 1);
    let hits = places.search_by_my_ip(&SearchOptions::default().category("Retail")).unwrap();
    assert!(hits.is_empty());
    let hits = places
        .search_by_address("1 Ferry Building, San Francisco", &SearchOptions::default())
        .unwrap();
    assert_eq!(hits.len(), 1);

    // Step 9: delete answers with an empty body.
    let reply = places.delete_record(handle.as_str()).unwrap();
    assert_eq!(reply, Reply::Raw(Vec::new()));

    // Step 10: get after delete is a 404.
    let err = places.get_record(handle.as_str()).unwrap_err();
    assert!(err.is_not_found(), "{err}");
    assert_eq!(err.status(), Some(404));

    // Step 11: delete again is a 404 as well.
    let err = places.delete_record(handle.as_str()).unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn layer_records_lifecycle() {
    let addr = start_server();
    let places = Places::new(&config(addr).api_version("0.1")).unwrap();

    let record = Record::new(10.0, 20.0)
        .id("1")
        .property("layer", "TESTING_LAYER")
        .property("name", "first");
    let created = places.add_record(&record).unwrap();
    assert_eq!(
        created,
        Created::Stored {
            layer: "TESTING_LAYER".to_string(),
            id: "1".to_string()
        }
    );

    let batch = vec![
        Record::new(1.0, 2.0).id("2").property("layer", "TESTING_LAYER"),
        Record::new(3.0, 4.0).id("3").property("layer", "TESTING_LAYER"),
    ];
    let reply = places.add_records("TESTING_LAYER", &batch).unwrap();
    assert_eq!(reply.as_json().unwrap()["count"], 2);

    let fetched = places.get_layer_record("TESTING_LAYER", "1").unwrap();
    assert_eq!(fetched.id.as_deref(), Some("1"));
    assert!(fetched.handle().is_none());
    assert_eq!(fetched.lat, 10.0);
    assert_eq!(fetched.lon, 20.0);

    let fetched = places.get_layer_record("TESTING_LAYER", "3").unwrap();
    assert_eq!(fetched.lat, 3.0);

    places.delete_layer_record("TESTING_LAYER", "3").unwrap();
    let err = places.get_layer_record("TESTING_LAYER", "3").unwrap_err();
    assert!(err.is_not_found());

    // the layer schema has no places search
    let err = places.search(1.0, 2.0, &SearchOptions::default()).unwrap_err();
    assert!(matches!(err, ApiError::EndpointError(_)));
}

#[test]
fn unsigned_request_is_rejected() {
    let addr = start_server();
    let request = HttpRequest {
        method: HttpMethod::Get,
        url: format!("http://{addr}/1.0/endpoints.json"),
        headers: Vec::new(),
        body: None,
    };
    let response = UreqTransport::new().send(&request).unwrap();
    assert_eq!(response.status, 401);
}

#[test]
fn invalid_input_never_reaches_the_server() {
    // nothing listens on this port; validation must fail first
    let places = Places::new(&ClientConfig::new("k", "s").host("127.0.0.1").port(9)).unwrap();

    let err = places.get_record("not-a-handle").unwrap_err();
    assert!(matches!(err, ApiError::ValidationError(_)));

    let err = places.search(91.0, 0.0, &SearchOptions::default()).unwrap_err();
    assert!(matches!(err, ApiError::ValidationError(_)));

    let err = places.search_by_ip("nowhere", &SearchOptions::default()).unwrap_err();
    assert!(matches!(err, ApiError::ValidationError(_)));

    let err = places.search_by_address("  ", &SearchOptions::default()).unwrap_err();
    assert!(matches!(err, ApiError::ValidationError(_)));

    let err = places.update_record(&Record::new(1.0, 2.0)).unwrap_err();
    assert!(matches!(err, ApiError::ValidationError(_)));
}

#[test]
fn unreachable_server_is_a_transport_error() {
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let places = Places::new(&config(addr)).unwrap();
    let err = places.get_endpoints().unwrap_err();
    assert!(matches!(err, ApiError::TransportError(_)), "{err}");
}

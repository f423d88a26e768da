//! Timed request phases against a live Places server.
//!
//! # Design
//! Each phase runs one operation `n` times. Only the client call itself is
//! timed; setup such as fetching the record to update is not. Handles created
//! by the add phase feed the get and update phases. A failing request is
//! logged and counted, never fatal.

use std::fmt;
use std::time::Instant;

use places_core::{ApiError, Handle, HttpSend, Places, Record, SearchOptions};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Add,
    Get,
    Update,
    Search,
}

impl Operation {
    pub const ALL: [Operation; 4] = [Operation::Add, Operation::Get, Operation::Update, Operation::Search];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Add => "add_record",
            Operation::Get => "get_record",
            Operation::Update => "update_record",
            Operation::Search => "search",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one phase.
#[derive(Debug, Clone, PartialEq)]
pub struct Phase {
    pub operation: Operation,
    pub completed: usize,
    pub failed: usize,
    /// Elapsed seconds of each completed request.
    pub times: Vec<f64>,
}

pub struct Bench<T: HttpSend> {
    places: Places<T>,
    rng: StdRng,
    handles: Vec<Handle>,
}

impl<T: HttpSend> Bench<T> {
    pub fn new(places: Places<T>, rng: StdRng) -> Self {
        Self {
            places,
            rng,
            handles: Vec::new(),
        }
    }

    /// Handles collected by add phases so far.
    pub fn handles(&self) -> &[Handle] {
        &self.handles
    }

    pub fn run_phase(&mut self, operation: Operation, requests: usize) -> Phase {
        let mut phase = Phase {
            operation,
            completed: 0,
            failed: 0,
            times: Vec::with_capacity(requests),
        };
        for i in 0..requests {
            match self.timed(operation) {
                Ok(elapsed) => {
                    debug!(%operation, request = i, elapsed, "request completed");
                    phase.completed += 1;
                    phase.times.push(elapsed);
                }
                Err(e) => {
                    warn!(%operation, request = i, error = %e, "request failed");
                    phase.failed += 1;
                }
            }
        }
        phase
    }

    fn timed(&mut self, operation: Operation) -> Result<f64, ApiError> {
        match operation {
            Operation::Add => {
                let record = self.random_record();
                let start = Instant::now();
                let created = self.places.add_record(&record)?;
                let elapsed = start.elapsed().as_secs_f64();
                if let Some(handle) = created.handle() {
                    self.handles.push(handle.clone());
                }
                Ok(elapsed)
            }
            Operation::Get => {
                let handle = self.random_handle()?;
                let start = Instant::now();
                self.places.get_record(handle.as_str())?;
                Ok(start.elapsed().as_secs_f64())
            }
            Operation::Update => {
                let handle = self.random_handle()?;
                let mut record = self.places.get_record(handle.as_str())?;
                // move the place so the update changes something
                (record.lat, record.lon) = self.random_us_lat_lon();
                let start = Instant::now();
                self.places.update_record(&record)?;
                Ok(start.elapsed().as_secs_f64())
            }
            Operation::Search => {
                let (lat, lon) = self.random_us_lat_lon();
                let options = SearchOptions::default().category("restaurant");
                let start = Instant::now();
                self.places.search(lat, lon, &options)?;
                Ok(start.elapsed().as_secs_f64())
            }
        }
    }

    fn random_record(&mut self) -> Record {
        let (lat, lon) = self.random_us_lat_lon();
        Record::new(lat, lon).property("name", format!("name_{lat}_{lon}"))
    }

    /// A point in the continental US.
    fn random_us_lat_lon(&mut self) -> (f64, f64) {
        (self.rng.gen_range(25.0..50.0), self.rng.gen_range(-125.0..-65.0))
    }

    fn random_handle(&mut self) -> Result<Handle, ApiError> {
        self.handles
            .choose(&mut self.rng)
            .cloned()
            .ok_or_else(|| ApiError::ValidationError("no handles left; run the add phase first".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use places_core::{ClientConfig, HttpMethod, HttpRequest, HttpResponse, PlacesClient};
    use rand::SeedableRng;

    const HANDLE: &str = "SG_abcdefghijklmnopqrstuv";

    /// Answers like a healthy server.
    struct Healthy;

    impl HttpSend for Healthy {
        fn send(&self, request: &HttpRequest) -> Result<HttpResponse, ApiError> {
            let feature = format!(
                r#"{{"type":"Feature","id":"{HANDLE}","created":1,"geometry":{{"type":"Point","coordinates":[-100.0,40.0]}},"properties":{{}}}}"#
            );
            let response = match (&request.method, request.url.contains("/features/")) {
                (HttpMethod::Post, false) => HttpResponse::new(202, format!(r#"{{"id":"{HANDLE}"}}"#)),
                (HttpMethod::Get, true) => HttpResponse::new(200, feature),
                (HttpMethod::Post, true) => HttpResponse::new(200, r#"{"status":"updated"}"#),
                _ => HttpResponse::new(200, r#"{"type":"FeatureCollection","features":[]}"#),
            };
            Ok(response.with_header("Content-Type", "application/json"))
        }
    }

    struct Broken;

    impl HttpSend for Broken {
        fn send(&self, _request: &HttpRequest) -> Result<HttpResponse, ApiError> {
            Ok(HttpResponse::new(500, "down"))
        }
    }

    fn bench<T: HttpSend>(transport: T) -> Bench<T> {
        let client = PlacesClient::new(&ClientConfig::new("k", "s")).unwrap();
        Bench::new(Places::with_transport(client, transport), StdRng::seed_from_u64(7))
    }

    #[test]
    fn every_phase_completes_against_a_healthy_server() {
        let mut bench = bench(Healthy);
        for operation in Operation::ALL {
            let phase = bench.run_phase(operation, 3);
            assert_eq!(phase.completed, 3, "{operation}");
            assert_eq!(phase.failed, 0, "{operation}");
            assert_eq!(phase.times.len(), 3);
            assert!(phase.times.iter().all(|t| *t >= 0.0));
        }
        assert_eq!(bench.handles().len(), 3);
    }

    #[test]
    fn failures_are_counted_not_fatal() {
        let mut bench = bench(Broken);
        let phase = bench.run_phase(Operation::Add, 2);
        assert_eq!(phase.completed, 0);
        assert_eq!(phase.failed, 2);
        assert!(phase.times.is_empty());
    }

    #[test]
    fn get_without_handles_fails() {
        let mut bench = bench(Healthy);
        let phase = bench.run_phase(Operation::Get, 1);
        assert_eq!(phase.failed, 1);
    }

    #[test]
    fn random_points_stay_in_the_continental_us() {
        let mut bench = bench(Healthy);
        for _ in 0..100 {
            let (lat, lon) = bench.random_us_lat_lon();
            assert!((25.0..50.0).contains(&lat));
            assert!((-125.0..-65.0).contains(&lon));
        }
    }
}

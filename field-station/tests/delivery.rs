//! Result delivery over HTTP with the on-disk fallback cache.

use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use field_station::{
    DeliveryError, ResultSink, RetryReport, Station, StationSettings, ThrowLog,
};
use shared::{ConfigStorage, ResultCache, ResultPayload, ResultsError};
use tempfile::TempDir;

/// Answer `count` HTTP requests with `status_line`, returning the bodies.
fn serve(status_line: &'static str, count: usize) -> (u16, thread::JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let handle = thread::spawn(move || {
        let mut bodies = Vec::new();
        for _ in 0..count {
            let (mut stream, _) = listener.accept().unwrap();
            stream
                .set_read_timeout(Some(Duration::from_millis(500)))
                .unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            let body = loop {
                match stream.read(&mut buf) {
                    Ok(0) | Err(_) => break String::new(),
                    Ok(n) => {
                        request.extend_from_slice(&buf[..n]);
                        let text = String::from_utf8_lossy(&request).into_owned();
                        if let Some(head_end) = text.find("\r\n\r\n") {
                            let length = text[..head_end]
                                .lines()
                                .find_map(|l| {
                                    l.to_ascii_lowercase()
                                        .strip_prefix("content-length:")
                                        .map(|v| v.trim().parse::<usize>().unwrap_or(0))
                                })
                                .unwrap_or(0);
                            if request.len() >= head_end + 4 + length {
                                break text[head_end + 4..].to_string();
                            }
                        }
                    }
                }
            };
            let response = format!(
                "{status_line}\r\nContent-Type: application/json\r\nContent-Length: 2\r\nConnection: close\r\n\r\n{{}}"
            );
            stream.write_all(response.as_bytes()).unwrap();
            bodies.push(body);
        }
        bodies
    });
    (port, handle)
}

fn unused_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

fn payload(bib: &str) -> ResultPayload {
    ResultPayload::new("ev-shot", bib).with_attempt("14.52", "m", None, true)
}

#[test]
fn test_unreachable_server_caches_to_disk() {
    let dir = TempDir::new().unwrap();
    let storage = ConfigStorage::with_path(dir.path().to_path_buf());
    let station = Station::open(&storage, StationSettings::default());

    let server = format!("127.0.0.1:{}", unused_port());
    let err = station.post_result(&server, &payload("101")).unwrap_err();
    assert!(matches!(err, DeliveryError::CachedAfterNetworkError(_)));
    assert!(err.to_string().starts_with("Network error, result cached"));

    let on_disk = ResultCache::load(&storage.result_cache_path());
    assert_eq!(on_disk.entries(), &[payload("101")]);
}

#[test]
fn test_cache_survives_restart_and_flushes() {
    let dir = TempDir::new().unwrap();
    let storage = ConfigStorage::with_path(dir.path().to_path_buf());
    {
        let station = Station::open(&storage, StationSettings::default());
        let (port, server) = serve("HTTP/1.1 500 Internal Server Error", 1);
        let err = station
            .post_result(&format!("127.0.0.1:{port}"), &payload("7"))
            .unwrap_err();
        assert!(matches!(err, DeliveryError::CachedAfterServerError(500)));
        server.join().unwrap();
    }

    let station = Station::open(&storage, StationSettings::default());
    assert_eq!(station.cached_results().len(), 1);

    let (port, server) = serve("HTTP/1.1 200 OK", 1);
    station.set_server_address("127.0.0.1", port);
    let report = station.retry_cached_now();
    assert_eq!(
        report,
        RetryReport {
            attempted: 1,
            delivered: 1,
            remaining: 0
        }
    );
    let bodies = server.join().unwrap();
    let sent: ResultPayload = serde_json::from_str(&bodies[0]).unwrap();
    assert_eq!(sent.event_id, "ev-shot");
    assert_eq!(sent.athlete_bib, "7");
    assert!(ResultCache::load(&storage.result_cache_path()).is_empty());
}

/// Fails every submission until switched on, then records deliveries.
#[derive(Default)]
struct Gate {
    open: Mutex<bool>,
    delivered: Mutex<Vec<String>>,
}

impl ResultSink for Gate {
    fn submit(&self, _server: &str, payload: &ResultPayload) -> Result<(), ResultsError> {
        if *self.open.lock().unwrap() {
            self.delivered.lock().unwrap().push(payload.athlete_bib.clone());
            Ok(())
        } else {
            Err(ResultsError::Http("connection refused".to_string()))
        }
    }
}

#[test]
fn test_background_retry_loop_delivers_in_order() {
    let dir = TempDir::new().unwrap();
    let cache_path = dir.path().join("result_cache.json");
    let gate = Arc::new(Gate::default());
    let station = Station::with_parts(
        StationSettings {
            retry_interval_secs: 1,
            ..StationSettings::default()
        },
        ResultCache::load(&cache_path),
        ThrowLog::in_memory(),
        gate.clone(),
    );
    for bib in ["1", "2", "3"] {
        let _ = station.post_result("results:8080", &payload(bib));
    }
    station.set_server_address("results", 8080);
    station.start().unwrap();

    *gate.open.lock().unwrap() = true;
    let mut waited = Duration::ZERO;
    while !station.cached_results().is_empty() && waited < Duration::from_secs(5) {
        thread::sleep(Duration::from_millis(50));
        waited += Duration::from_millis(50);
    }
    station.shutdown();

    assert!(station.cached_results().is_empty());
    assert_eq!(*gate.delivered.lock().unwrap(), vec!["1", "2", "3"]);
    assert!(ResultCache::load(&cache_path).is_empty());
}

#[test]
fn test_shutdown_stops_retry_loop_promptly() {
    let station = Station::new(StationSettings::default());
    station.start().unwrap();
    assert_eq!(station.background_tasks(), 1);
    station.shutdown();
    assert_eq!(station.background_tasks(), 0);
}

//! Delivery of results to the results server, with a durable fallback.
//!
//! A failed post is appended to the [`ResultCache`](shared::ResultCache)
//! and the caller is told the result was cached. A background loop, and
//! [`Station::retry_cached_now`], re-post cached entries in order and keep
//! only the ones that fail again.

use std::sync::{Arc, PoisonError};

use shared::{ResultPayload, ResultsClient, ResultsError};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::error::{StationError, StationResult};
use crate::station::{Inner, Station};

/// Destination for result payloads.
pub trait ResultSink: Send + Sync {
    fn submit(&self, server_address: &str, payload: &ResultPayload) -> Result<(), ResultsError>;
}

/// Posts over HTTP with [`ResultsClient`].
#[derive(Debug, Default, Clone, Copy)]
pub struct HttpResultSink;

impl ResultSink for HttpResultSink {
    fn submit(&self, server_address: &str, payload: &ResultPayload) -> Result<(), ResultsError> {
        ResultsClient::new(server_address).post_result(payload)
    }
}

/// A result that could not be delivered. It has been cached for retry.
#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("Network error, result cached: {0}")]
    CachedAfterNetworkError(String),

    #[error("Server error ({0}), result cached")]
    CachedAfterServerError(u16),
}

/// Outcome of one pass over the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RetryReport {
    pub attempted: usize,
    pub delivered: usize,
    pub remaining: usize,
}

impl Station {
    /// Server used by the background retry loop, as `host:port`.
    pub fn set_server_address(&self, host: &str, port: u16) {
        let address = hardware::link::join_host_port(host, port);
        info!("Results server set to {address}");
        self.state().server_address = Some(address);
    }

    pub fn server_address(&self) -> Option<String> {
        self.state().server_address.clone()
    }

    /// Post `payload`, caching it on any failure.
    pub fn post_result(
        &self,
        server_address: &str,
        payload: &ResultPayload,
    ) -> Result<(), DeliveryError> {
        let failure = match self.inner.sink.submit(server_address, payload) {
            Ok(()) => {
                info!("Result for bib {} delivered", payload.athlete_bib);
                return Ok(());
            }
            Err(ResultsError::Status(code)) => DeliveryError::CachedAfterServerError(code),
            Err(e) => DeliveryError::CachedAfterNetworkError(e.to_string()),
        };

        warn!("Caching result for bib {}: {failure}", payload.athlete_bib);
        if let Err(e) = self.state().cache.push(payload.clone()) {
            error!("Failed to persist result cache: {e}");
        }
        Err(failure)
    }

    /// Snapshot of results waiting for delivery, oldest first.
    pub fn cached_results(&self) -> Vec<ResultPayload> {
        self.state().cache.entries().to_vec()
    }

    /// Run one delivery pass over the cache immediately.
    pub fn retry_cached_now(&self) -> RetryReport {
        retry_pass(&self.inner)
    }

    pub(crate) fn start_retry_loop(&self) -> StationResult<()> {
        let weak = Arc::downgrade(&self.inner);
        let token = self.inner.supervisor.shutdown_token();
        let interval = self.inner.settings.retry_interval();
        self.inner
            .supervisor
            .spawn("result-retry", move || {
                while !token.wait_timeout(interval) {
                    let Some(inner) = weak.upgrade() else {
                        break;
                    };
                    retry_pass(&inner);
                }
                debug!("Result retry loop stopped");
            })
            .map_err(|source| StationError::Spawn {
                task: "result retry loop".to_string(),
                source,
            })
    }
}

/// Post every cached entry once. Entries that fail stay cached, in order,
/// ahead of anything cached while the pass ran.
pub(crate) fn retry_pass(inner: &Inner) -> RetryReport {
    let _pass = inner
        .retry_guard
        .lock()
        .unwrap_or_else(PoisonError::into_inner);

    let (server, pending) = {
        let state = inner.lock_state();
        match &state.server_address {
            Some(server) if !state.cache.is_empty() => {
                (server.clone(), state.cache.entries().to_vec())
            }
            _ => {
                return RetryReport {
                    remaining: state.cache.len(),
                    ..RetryReport::default()
                }
            }
        }
    };

    info!("Attempting to send {} cached result(s)", pending.len());
    let attempted = pending.len();
    let mut failed = Vec::new();
    for payload in pending {
        match inner.sink.submit(&server, &payload) {
            Ok(()) => info!("Sent cached result for bib {}", payload.athlete_bib),
            Err(e) => {
                debug!("Cached result for bib {} still failing: {e}", payload.athlete_bib);
                failed.push(payload);
            }
        }
    }
    let delivered = attempted - failed.len();

    let mut state = inner.lock_state();
    if let Err(e) = state.cache.replace_front(attempted, failed) {
        error!("Failed to persist result cache: {e}");
    }
    RetryReport {
        attempted,
        delivered,
        remaining: state.cache.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::StationSettings;
    use crate::throw_log::ThrowLog;
    use shared::ResultCache;
    use std::collections::HashSet;
    use std::sync::Mutex;

    /// Rejects the listed bibs, accepts the rest.
    #[derive(Default)]
    struct Picky {
        reject: Mutex<HashSet<String>>,
        seen: Mutex<Vec<String>>,
    }

    impl Picky {
        fn reject(&self, bibs: &[&str]) {
            *self.reject.lock().unwrap() = bibs.iter().map(|s| s.to_string()).collect();
        }
    }

    impl ResultSink for Picky {
        fn submit(&self, _server: &str, payload: &ResultPayload) -> Result<(), ResultsError> {
            self.seen.lock().unwrap().push(payload.athlete_bib.clone());
            if self.reject.lock().unwrap().contains(&payload.athlete_bib) {
                Err(ResultsError::Status(503))
            } else {
                Ok(())
            }
        }
    }

    fn station(reject: &[&str]) -> (Station, Arc<Picky>) {
        let sink = Arc::new(Picky::default());
        sink.reject(reject);
        let station = Station::with_parts(
            StationSettings::default(),
            ResultCache::in_memory(),
            ThrowLog::in_memory(),
            sink.clone(),
        );
        (station, sink)
    }

    fn bibs(station: &Station) -> Vec<String> {
        station
            .cached_results()
            .into_iter()
            .map(|p| p.athlete_bib)
            .collect()
    }

    #[test]
    fn test_post_success_not_cached() {
        let (station, _) = station(&[]);
        let payload = ResultPayload::new("ev", "1").with_attempt("10.00", "m", None, true);
        station.post_result("host:1", &payload).unwrap();
        assert!(station.cached_results().is_empty());
    }

    #[test]
    fn test_post_failure_cached() {
        let (station, _) = station(&["1"]);
        let payload = ResultPayload::new("ev", "1");
        let err = station.post_result("host:1", &payload).unwrap_err();
        assert!(matches!(err, DeliveryError::CachedAfterServerError(503)));
        assert_eq!(err.to_string(), "Server error (503), result cached");
        assert_eq!(station.cached_results(), vec![payload]);
    }

    #[test]
    fn test_retry_without_server_does_nothing() {
        let (station, sink) = station(&["1"]);
        let _ = station.post_result("host:1", &ResultPayload::new("ev", "1"));
        sink.seen.lock().unwrap().clear();
        let report = station.retry_cached_now();
        assert_eq!(report.attempted, 0);
        assert_eq!(report.remaining, 1);
        assert!(sink.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_retry_keeps_failures_in_order() {
        let (station, sink) = station(&["a", "b", "c", "d"]);
        for bib in ["a", "b", "c", "d"] {
            let _ = station.post_result("host:1", &ResultPayload::new("ev", bib));
        }
        station.set_server_address("results.local", 8080);
        assert_eq!(station.server_address().as_deref(), Some("results.local:8080"));

        sink.reject(&["a", "c"]);
        let report = station.retry_cached_now();
        assert_eq!(
            report,
            RetryReport {
                attempted: 4,
                delivered: 2,
                remaining: 2
            }
        );
        assert_eq!(bibs(&station), vec!["a", "c"]);

        sink.reject(&[]);
        let report = station.retry_cached_now();
        assert_eq!(report.delivered, 2);
        assert!(station.cached_results().is_empty());
    }
}

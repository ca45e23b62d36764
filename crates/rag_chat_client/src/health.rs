//! Periodic liveness monitor for the answering service.
//!
//! Probes are fired on a fixed schedule and may overlap in flight. Each one
//! carries an issue sequence number and the epoch of the run that issued it;
//! a result is published only if its run is still current and nothing newer
//! has been published. `stop()` bumps the epoch under the same lock that
//! guards publishing, so a probe that settles late can never overwrite the
//! status once `stop()` has returned.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;

use crate::client::{round_ms, Client};
use crate::config::Endpoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// No probe has settled yet.
    Unknown,
    Healthy,
    Unhealthy,
}

/// Latest published probe outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    /// Round-trip time of the probe; only set when healthy.
    pub rtt_ms: Option<u64>,
}

impl HealthReport {
    pub const UNKNOWN: HealthReport = HealthReport {
        status: HealthStatus::Unknown,
        rtt_ms: None,
    };

    pub fn healthy(rtt_ms: u64) -> Self {
        Self {
            status: HealthStatus::Healthy,
            rtt_ms: Some(rtt_ms),
        }
    }

    pub fn unhealthy() -> Self {
        Self {
            status: HealthStatus::Unhealthy,
            rtt_ms: None,
        }
    }
}

impl Default for HealthReport {
    fn default() -> Self {
        Self::UNKNOWN
    }
}

#[derive(Debug, Default)]
struct Gate {
    epoch: u64,
    latest_seq: u64,
}

#[derive(Debug)]
struct Shared {
    gate: Mutex<Gate>,
    tx: watch::Sender<HealthReport>,
}

impl Shared {
    fn new() -> Self {
        let (tx, _rx) = watch::channel(HealthReport::UNKNOWN);
        Self {
            gate: Mutex::new(Gate::default()),
            tx,
        }
    }

    fn epoch(&self) -> u64 {
        self.gate.lock().unwrap_or_else(PoisonError::into_inner).epoch
    }

    /// Invalidate every probe issued so far.
    fn next_epoch(&self) {
        let mut gate = self.gate.lock().unwrap_or_else(PoisonError::into_inner);
        gate.epoch += 1;
        gate.latest_seq = 0;
    }

    fn publish(&self, epoch: u64, seq: u64, report: HealthReport) -> bool {
        let mut gate = self.gate.lock().unwrap_or_else(PoisonError::into_inner);
        if gate.epoch != epoch {
            tracing::debug!(epoch, seq, "dropping probe result from stopped run");
            return false;
        }
        if seq <= gate.latest_seq {
            tracing::debug!(seq, latest = gate.latest_seq, "dropping out-of-order probe result");
            return false;
        }
        gate.latest_seq = seq;
        self.tx.send_replace(report);
        true
    }
}

/// Polls `GET {base}/healthz` every `period` while started.
///
/// Must be started from within a Tokio runtime. Dropping the monitor stops it.
#[derive(Debug)]
pub struct HealthMonitor {
    http: reqwest::Client,
    period: Duration,
    shared: Arc<Shared>,
    task: Option<JoinHandle<()>>,
    endpoint: Option<Endpoint>,
}

impl HealthMonitor {
    pub fn new(http: reqwest::Client, period: Duration) -> Self {
        Self {
            http,
            period: period.max(Duration::from_millis(1)),
            shared: Arc::new(Shared::new()),
            task: None,
            endpoint: None,
        }
    }

    /// Begin polling `endpoint`: one probe now, then one per period.
    /// A loop that is already running is stopped first.
    pub fn start(&mut self, endpoint: Endpoint) {
        self.stop();
        let epoch = self.shared.epoch();
        tracing::info!(base = %endpoint, period_ms = self.period.as_millis() as u64, "health monitor started");
        let client = Client::new(self.http.clone(), endpoint.clone());
        self.task = Some(tokio::spawn(poll_loop(
            client,
            self.period,
            Arc::clone(&self.shared),
            epoch,
        )));
        self.endpoint = Some(endpoint);
    }

    /// Cancel the schedule. Probes still in flight are aborted, and any that
    /// settle regardless are discarded.
    pub fn stop(&mut self) {
        self.shared.next_epoch();
        if let Some(task) = self.task.take() {
            task.abort();
            tracing::info!("health monitor stopped");
        }
        self.endpoint = None;
    }

    pub fn is_running(&self) -> bool {
        self.task.is_some()
    }

    pub fn endpoint(&self) -> Option<&Endpoint> {
        self.endpoint.as_ref()
    }

    pub fn current(&self) -> HealthReport {
        *self.shared.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<HealthReport> {
        self.shared.tx.subscribe()
    }
}

impl Drop for HealthMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn poll_loop(client: Client, period: Duration, shared: Arc<Shared>, epoch: u64) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // Dropping the set (when this task is aborted) aborts the probes in it.
    let mut in_flight = JoinSet::new();
    let mut seq = 0u64;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                seq += 1;
                let client = client.clone();
                let shared = Arc::clone(&shared);
                in_flight.spawn(async move {
                    let report = probe_once(&client).await;
                    shared.publish(epoch, seq, report);
                });
            }
            Some(_) = in_flight.join_next(), if !in_flight.is_empty() => {}
        }
    }
}

async fn probe_once(client: &Client) -> HealthReport {
    match client.probe().await {
        Ok(rtt) => HealthReport::healthy(round_ms(rtt)),
        Err(e) => {
            tracing::debug!(base = %client.endpoint(), error = %e, "liveness probe failed");
            HealthReport::unhealthy()
        }
    }
}

//! Byte-level relay between a radio's CAT server and one client tool,
//! observing the radio's frequency reports on the way through.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{error, info};

use crate::config::RelayConfig;
use crate::error::Result;
use crate::stats::{RelayStats, StatsSnapshot};

pub mod cat;
mod downlink;
pub mod slot;
mod uplink;

use downlink::Downlink;
use slot::PeerSlot;
use uplink::Uplink;

const CHUNK_SIZE: usize = 4096;

/// Process-wide stop request, observed by both loops between blocking calls.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal(Arc<AtomicBool>);

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signal(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Sleep for `total`, in slices of at most `step`, returning early once
    /// the signal is set. Returns whether it was set.
    pub fn wait(&self, total: Duration, step: Duration) -> bool {
        let deadline = Instant::now() + total;
        while !self.is_set() {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            thread::sleep(step.min(deadline - now));
        }
        true
    }
}

/// Last frequency seen in the radio's traffic. Written only by the uplink.
#[derive(Debug, Clone, Default)]
pub struct FrequencyObservation(Arc<AtomicU64>);

impl FrequencyObservation {
    pub fn latest(&self) -> Option<u64> {
        match self.0.load(Ordering::Acquire) {
            0 => None,
            hz => Some(hz),
        }
    }

    /// Store `hz`; true when it differs from the previous value. A zero
    /// report is ignored.
    fn publish(&self, hz: u64) -> bool {
        hz != 0 && self.0.swap(hz, Ordering::AcqRel) != hz
    }
}

pub struct Bridge {
    shutdown: ShutdownSignal,
    observed: FrequencyObservation,
    uplink: Arc<PeerSlot>,
    downlink: Arc<PeerSlot>,
    stats: Arc<RelayStats>,
    local_addr: SocketAddr,
    workers: Vec<JoinHandle<()>>,
}

impl Bridge {
    /// Bind the client socket and start both loops. A bind failure is
    /// returned before anything is spawned. Every new radio frequency is
    /// also sent on `updates`, if given.
    pub fn start(cfg: RelayConfig, updates: Option<Sender<u64>>) -> Result<Self> {
        let cfg = cfg.validate()?;
        let listener = downlink::bind(cfg.listen)?;
        let local_addr = listener.local_addr()?;

        let shutdown = ShutdownSignal::new();
        let observed = FrequencyObservation::default();
        let uplink_slot = Arc::new(PeerSlot::new("uplink"));
        let downlink_slot = Arc::new(PeerSlot::new("downlink"));
        let stats = Arc::new(RelayStats::new());

        let mut bridge = Self {
            shutdown: shutdown.clone(),
            observed: observed.clone(),
            uplink: Arc::clone(&uplink_slot),
            downlink: Arc::clone(&downlink_slot),
            stats: Arc::clone(&stats),
            local_addr,
            workers: Vec::with_capacity(2),
        };

        let down = Downlink {
            listener,
            cfg: cfg.clone(),
            shutdown: shutdown.clone(),
            own: Arc::clone(&downlink_slot),
            uplink: Arc::clone(&uplink_slot),
            stats: Arc::clone(&stats),
        };
        bridge
            .workers
            .push(thread::Builder::new().name("downlink".into()).spawn(move || down.run())?);

        let up = Uplink {
            cfg,
            shutdown,
            own: uplink_slot,
            downlink: downlink_slot,
            observed,
            updates,
            stats,
        };
        // on error the bridge drops here and joins the downlink
        bridge
            .workers
            .push(thread::Builder::new().name("uplink".into()).spawn(move || up.run())?);

        info!(component = "relay", listen = %local_addr, "relay started");
        Ok(bridge)
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Non-blocking read of the last observed radio frequency.
    pub fn latest_observed_frequency(&self) -> Option<u64> {
        self.observed.latest()
    }

    pub fn uplink_connected(&self) -> bool {
        self.uplink.is_connected()
    }

    pub fn downlink_connected(&self) -> bool {
        self.downlink.is_connected()
    }

    pub fn client_addr(&self) -> Option<SocketAddr> {
        self.downlink.peer_addr()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Signal both loops, close their sockets and join them.
    pub fn stop(&mut self) {
        if self.workers.is_empty() {
            return;
        }
        self.shutdown.signal();
        self.uplink.close();
        self.downlink.close();
        for w in self.workers.drain(..) {
            let name = w.thread().name().unwrap_or("relay").to_string();
            if w.join().is_err() {
                error!(component = "relay", worker = %name, "worker panicked");
            }
        }
        self.stats.log_summary();
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        self.stop();
    }
}

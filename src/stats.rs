use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use tracing::info;

/// Counters shared by the uplink and downlink loops.
#[derive(Debug)]
pub struct RelayStats {
    bytes_up: AtomicU64,
    bytes_down: AtomicU64,
    dropped: AtomicU64,
    freq_reports: AtomicU64,
    reconnects: AtomicU64,
    clients: AtomicU64,
    t0: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    /// Client to radio.
    pub bytes_up: u64,
    /// Radio to client.
    pub bytes_down: u64,
    pub dropped: u64,
    pub freq_reports: u64,
    pub reconnects: u64,
    pub clients: u64,
}

impl RelayStats {
    pub fn new() -> Self {
        Self {
            bytes_up: AtomicU64::new(0),
            bytes_down: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            freq_reports: AtomicU64::new(0),
            reconnects: AtomicU64::new(0),
            clients: AtomicU64::new(0),
            t0: Instant::now(),
        }
    }
    pub fn add_up(&self, n: usize) {
        self.bytes_up.fetch_add(n as u64, Ordering::Relaxed);
    }
    pub fn add_down(&self, n: usize) {
        self.bytes_down.fetch_add(n as u64, Ordering::Relaxed);
    }
    pub fn inc_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }
    pub fn inc_freq_report(&self) {
        self.freq_reports.fetch_add(1, Ordering::Relaxed);
    }
    pub fn inc_reconnect(&self) {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
    }
    pub fn inc_client(&self) {
        self.clients.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            bytes_up: self.bytes_up.load(Ordering::Relaxed),
            bytes_down: self.bytes_down.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            freq_reports: self.freq_reports.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
            clients: self.clients.load(Ordering::Relaxed),
        }
    }

    pub fn log_summary(&self) {
        let s = self.snapshot();
        info!(
            component = "relay",
            up = s.bytes_up,
            down = s.bytes_down,
            dropped = s.dropped,
            freq_reports = s.freq_reports,
            reconnects = s.reconnects,
            clients = s.clients,
            secs = self.t0.elapsed().as_secs(),
            "relay stopped"
        );
    }
}

impl Default for RelayStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let s = RelayStats::new();
        s.add_up(10);
        s.add_up(5);
        s.add_down(3);
        s.inc_dropped();
        s.inc_client();
        let snap = s.snapshot();
        assert_eq!(snap.bytes_up, 15);
        assert_eq!(snap.bytes_down, 3);
        assert_eq!(snap.dropped, 1);
        assert_eq!(snap.clients, 1);
        assert_eq!(snap.reconnects, 0);
    }
}

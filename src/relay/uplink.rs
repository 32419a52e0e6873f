use std::io::{self, Read};
use std::net::{Shutdown, TcpStream};
use std::sync::Arc;
use std::sync::mpsc::Sender;
use std::time::{Duration, Instant};

use tracing::{debug, info, trace, warn};

use super::cat::FrequencyScanner;
use super::slot::PeerSlot;
use super::{FrequencyObservation, ShutdownSignal, CHUNK_SIZE};
use crate::config::RelayConfig;
use crate::error::Error;
use crate::stats::RelayStats;

/// Keep calling `attempt` with slices of at most `step` until it connects,
/// `total` runs out, or shutdown is set (`Ok(None)`). Only timeouts are
/// retried.
fn connect_in_slices<T>(
    shutdown: &ShutdownSignal,
    total: Duration,
    step: Duration,
    mut attempt: impl FnMut(Duration) -> io::Result<T>,
) -> io::Result<Option<T>> {
    let deadline = Instant::now() + total;
    loop {
        if shutdown.is_set() {
            return Ok(None);
        }
        let left = deadline.saturating_duration_since(Instant::now());
        if left.is_zero() {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "connect timed out"));
        }
        match attempt(step.min(left)) {
            Ok(s) => return Ok(Some(s)),
            Err(e) if e.kind() == io::ErrorKind::TimedOut => {}
            Err(e) => return Err(e),
        }
    }
}

/// Client side of the relay: keeps a connection to the radio's CAT port,
/// snoops frequency reports and passes everything on to the downlink.
pub(super) struct Uplink {
    pub cfg: RelayConfig,
    pub shutdown: ShutdownSignal,
    pub own: Arc<PeerSlot>,
    pub downlink: Arc<PeerSlot>,
    pub observed: FrequencyObservation,
    pub updates: Option<Sender<u64>>,
    pub stats: Arc<RelayStats>,
}

impl Uplink {
    pub fn run(self) {
        info!(component = "uplink", radio = %self.cfg.radio, "uplink started");
        let mut first = true;
        while !self.shutdown.is_set() {
            if !first {
                self.stats.inc_reconnect();
            }
            first = false;

            match self.connect() {
                Ok(Some(stream)) => self.serve(stream),
                Ok(None) => break,
                Err(e) => warn!(component = "uplink", radio = %self.cfg.radio, error = %e, "connect failed"),
            }
            self.shutdown.wait(self.cfg.reconnect_delay, self.cfg.poll_interval);
        }
        self.own.close();
        info!(component = "uplink", "uplink stopped");
    }

    /// `None` when shutdown was requested while connecting.
    fn connect(&self) -> crate::error::Result<Option<TcpStream>> {
        let addr = self.cfg.radio_addr()?;
        let attempt = connect_in_slices(
            &self.shutdown,
            self.cfg.connect_timeout,
            self.cfg.poll_interval,
            |slice| TcpStream::connect_timeout(&addr, slice),
        );
        let stream = match attempt {
            Ok(Some(s)) => s,
            Ok(None) => return Ok(None),
            Err(e) => {
                return Err(Error::LinkUnavailable {
                    target: self.cfg.radio.clone(),
                    source: e,
                });
            }
        };
        stream.set_read_timeout(Some(self.cfg.poll_interval))?;
        stream.set_write_timeout(Some(self.cfg.connect_timeout))?;
        stream.set_nodelay(true)?;
        Ok(Some(stream))
    }

    fn serve(&self, mut stream: TcpStream) {
        let writer = match stream.try_clone() {
            Ok(w) => w,
            Err(e) => {
                warn!(component = "uplink", error = %e, "cannot clone radio socket");
                return;
            }
        };
        self.own.install(writer);
        info!(component = "uplink", radio = %self.cfg.radio, "connected to radio");

        let mut scanner = FrequencyScanner::new();
        let mut buf = [0u8; CHUNK_SIZE];
        while !self.shutdown.is_set() {
            match stream.read(&mut buf) {
                Ok(0) => {
                    info!(component = "uplink", "radio closed the connection");
                    break;
                }
                Ok(n) => self.handle_chunk(&mut scanner, &buf[..n]),
                Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted) => {}
                Err(e) => {
                    warn!(component = "uplink", error = %e, "radio read failed");
                    break;
                }
            }
        }

        self.own.clear();
        let _ = stream.shutdown(Shutdown::Both);
    }

    fn handle_chunk(&self, scanner: &mut FrequencyScanner, chunk: &[u8]) {
        trace!(component = "uplink", len = chunk.len(), "from radio");
        self.stats.add_down(chunk.len());

        if let Some(hz) = scanner.feed(chunk) {
            self.stats.inc_freq_report();
            if self.observed.publish(hz) {
                info!(component = "uplink", frequency_hz = hz, "radio frequency changed");
                if let Some(tx) = &self.updates
                    && tx.send(hz).is_err()
                {
                    debug!(component = "uplink", "frequency listener gone");
                }
            }
        }

        match self.downlink.forward(chunk) {
            Ok(()) => {}
            Err(e @ Error::PeerUnavailable(_)) => {
                self.stats.inc_dropped();
                debug!(component = "uplink", len = chunk.len(), reason = %e, "chunk dropped");
            }
            Err(e) => {
                self.stats.inc_dropped();
                debug!(component = "uplink", len = chunk.len(), error = %e, "chunk dropped, client closed");
            }
        }
    }
}

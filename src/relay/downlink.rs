use std::io::{self, Read};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{debug, info, trace, warn};

use super::slot::PeerSlot;
use super::{ShutdownSignal, CHUNK_SIZE};
use crate::config::RelayConfig;
use crate::error::{Error, Result};
use crate::stats::RelayStats;

const ACCEPT_POLL: Duration = Duration::from_millis(50);

/// Bind the client-facing socket. Failure here aborts start-up.
pub(super) fn bind(addr: SocketAddr) -> Result<TcpListener> {
    let listener = TcpListener::bind(addr).map_err(|e| Error::LinkUnavailable {
        target: addr.to_string(),
        source: e,
    })?;
    // accept must not block past a shutdown
    listener.set_nonblocking(true)?;
    Ok(listener)
}

/// Server side of the relay: serves one client tool at a time and passes
/// its bytes up to the radio.
pub(super) struct Downlink {
    pub listener: TcpListener,
    pub cfg: RelayConfig,
    pub shutdown: ShutdownSignal,
    pub own: Arc<PeerSlot>,
    pub uplink: Arc<PeerSlot>,
    pub stats: Arc<RelayStats>,
}

impl Downlink {
    pub fn run(self) {
        let local = self.listener.local_addr().ok();
        info!(component = "downlink", addr = ?local, "listening for clients");
        let idle = self.cfg.poll_interval.min(ACCEPT_POLL);

        while !self.shutdown.is_set() {
            match self.listener.accept() {
                Ok((stream, addr)) => self.serve(stream, addr),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => thread::sleep(idle),
                Err(e) => {
                    warn!(component = "downlink", error = %e, "accept failed");
                    thread::sleep(idle);
                }
            }
        }
        self.own.close();
        info!(component = "downlink", "downlink stopped");
    }

    fn configure(&self, stream: &TcpStream) -> io::Result<TcpStream> {
        stream.set_nonblocking(false)?;
        stream.set_read_timeout(Some(self.cfg.poll_interval))?;
        stream.set_write_timeout(Some(self.cfg.connect_timeout))?;
        stream.set_nodelay(true)?;
        stream.try_clone()
    }

    fn serve(&self, mut stream: TcpStream, addr: SocketAddr) {
        let writer = match self.configure(&stream) {
            Ok(w) => w,
            Err(e) => {
                warn!(component = "downlink", %addr, error = %e, "cannot set up client socket");
                let _ = stream.shutdown(Shutdown::Both);
                return;
            }
        };
        self.own.install(writer);
        self.stats.inc_client();
        info!(component = "downlink", %addr, "client connected");

        let mut buf = [0u8; CHUNK_SIZE];
        while !self.shutdown.is_set() {
            match stream.read(&mut buf) {
                Ok(0) => {
                    info!(component = "downlink", %addr, "client disconnected");
                    break;
                }
                Ok(n) => self.handle_chunk(&buf[..n]),
                Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted) => {}
                Err(e) => {
                    warn!(component = "downlink", %addr, error = %e, "client read failed");
                    break;
                }
            }
        }

        self.own.clear();
        let _ = stream.shutdown(Shutdown::Both);
    }

    fn handle_chunk(&self, chunk: &[u8]) {
        trace!(component = "downlink", len = chunk.len(), "from client");
        self.stats.add_up(chunk.len());
        match self.uplink.forward(chunk) {
            Ok(()) => {}
            Err(e @ Error::PeerUnavailable(_)) => {
                self.stats.inc_dropped();
                debug!(component = "downlink", len = chunk.len(), reason = %e, "chunk dropped");
            }
            Err(e) => {
                self.stats.inc_dropped();
                debug!(component = "downlink", len = chunk.len(), error = %e, "chunk dropped, radio closed");
            }
        }
    }
}

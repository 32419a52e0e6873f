use std::io::Write;
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use crate::error::{Error, Result};

#[derive(Clone)]
struct Peer {
    stream: Arc<TcpStream>,
    addr: Option<SocketAddr>,
}

/// Single-slot handle to the live connection on one side of the relay.
/// The owning loop installs and clears it; the other loop writes through
/// it. An empty slot is a normal state.
///
/// The lock only guards the handle. Writes happen outside it, so `close`
/// never waits behind a peer that stopped reading.
pub struct PeerSlot {
    name: &'static str,
    peer: Mutex<Option<Peer>>,
}

impl PeerSlot {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            peer: Mutex::new(None),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Peer>> {
        self.peer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Install the write half of a new connection, replacing any previous
    /// one.
    pub fn install(&self, stream: TcpStream) {
        let addr = stream.peer_addr().ok();
        *self.lock() = Some(Peer {
            stream: Arc::new(stream),
            addr,
        });
    }

    pub fn clear(&self) {
        self.lock().take();
    }

    pub fn is_connected(&self) -> bool {
        self.lock().is_some()
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.lock().as_ref().and_then(|p| p.addr)
    }

    /// Write the whole chunk to the connected peer. A failed write may have
    /// left part of the chunk on the wire, so that connection is closed
    /// rather than fed any further.
    pub fn forward(&self, chunk: &[u8]) -> Result<()> {
        let peer = self.lock().clone().ok_or(Error::PeerUnavailable(self.name))?;
        if let Err(e) = (&*peer.stream).write_all(chunk) {
            warn!(component = self.name, addr = ?peer.addr, error = %e, "write failed, closing connection");
            self.evict(&peer);
            return Err(e.into());
        }
        Ok(())
    }

    /// Drop `peer` from the slot unless a newer connection replaced it.
    fn evict(&self, peer: &Peer) {
        {
            let mut guard = self.lock();
            if guard.as_ref().is_some_and(|p| Arc::ptr_eq(&p.stream, &peer.stream)) {
                guard.take();
            }
        }
        let _ = peer.stream.shutdown(Shutdown::Both);
    }

    /// Close both directions of the connection, waking its reader and any
    /// writer blocked on it.
    pub fn close(&self) {
        let taken = self.lock().take();
        if let Some(p) = taken {
            debug!(component = self.name, addr = ?p.addr, "closing connection");
            let _ = p.stream.shutdown(Shutdown::Both);
        }
    }
}

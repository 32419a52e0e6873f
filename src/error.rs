use std::io;

use thiserror::Error;

use crate::frame::Direction;

#[derive(Debug, Error)]
pub enum Error {
    /// Serial port or socket could not be opened.
    #[error("link unavailable: {target}: {source}")]
    LinkUnavailable {
        target: String,
        #[source]
        source: io::Error,
    },

    /// Fewer bytes than a full frame arrived before the read timed out.
    #[error("short frame: expected {expected} bytes, got {got}")]
    ShortFrame { expected: usize, got: usize },

    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// Verified retry budget exhausted for a mutating command.
    #[error("{what} not confirmed after {attempts} attempts")]
    SetFailed { what: &'static str, attempts: u32 },

    /// Motors still busy when the polling budget ran out. The device may
    /// still be moving.
    #[error("{operation} still in progress after {polls} polls")]
    MotorTimeout { operation: &'static str, polls: u32 },

    #[error("no {0} connection to forward to")]
    PeerUnavailable(&'static str),

    #[error("direction {0:?} is not supported")]
    UnsupportedDirection(Direction),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_short_frame() {
        let e = Error::ShortFrame {
            expected: 11,
            got: 4,
        };
        assert_eq!(e.to_string(), "short frame: expected 11 bytes, got 4");
    }

    #[test]
    fn display_set_failed() {
        let e = Error::SetFailed {
            what: "frequency",
            attempts: 3,
        };
        assert_eq!(e.to_string(), "frequency not confirmed after 3 attempts");
    }

    #[test]
    fn link_unavailable_keeps_source() {
        use std::error::Error as _;
        let e = Error::LinkUnavailable {
            target: "/dev/ttyUSB0".into(),
            source: io::Error::new(io::ErrorKind::NotFound, "no such device"),
        };
        assert!(e.to_string().contains("/dev/ttyUSB0"));
        assert!(e.source().is_some());
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Error>();
    }
}

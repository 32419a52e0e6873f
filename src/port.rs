use std::io::{self, Read, Write};
use std::time::Duration;

use serialport::SerialPort;
use tracing::trace;

use crate::config::SerialLinkConfig;
use crate::error::{Error, Result};

/// One open exchange with the controller. Dropping it closes the link.
pub trait Link: Read + Write + Send {}

impl<T: Read + Write + Send + ?Sized> Link for T {}

/// Opens a fresh link per transaction. The controller only tolerates one
/// client, so nothing holds a port between calls.
pub trait Connector: Send + Sync {
    fn open(&self) -> Result<Box<dyn Link>>;
}

pub struct SerialConnector {
    config: SerialLinkConfig,
}

impl SerialConnector {
    pub fn new(config: SerialLinkConfig) -> Result<Self> {
        Ok(Self {
            config: config.validate()?,
        })
    }
}

impl Connector for SerialConnector {
    fn open(&self) -> Result<Box<dyn Link>> {
        let c = &self.config;
        let port = serialport::new(&c.port, c.baud_rate)
            .timeout(c.read_timeout)
            .data_bits(c.data_bits())
            .parity(c.parity.into())
            .stop_bits(c.stop_bits.into())
            .flow_control(c.flow())
            .open()
            .map_err(|e| Error::LinkUnavailable {
                target: c.port.clone(),
                source: e.into(),
            })?;
        trace!(component = "driver", port = %c.port, baud = c.baud_rate, "serial link opened");
        Ok(Box::new(SerialLink {
            port,
            read_timeout: c.read_timeout,
            write_timeout: c.write_timeout,
        }))
    }
}

/// serialport keeps a single timeout; swap it for the direction in use.
struct SerialLink {
    port: Box<dyn SerialPort>,
    read_timeout: Duration,
    write_timeout: Duration,
}

impl SerialLink {
    fn use_timeout(&mut self, t: Duration) -> io::Result<()> {
        if self.port.timeout() != t {
            self.port.set_timeout(t).map_err(io::Error::from)?;
        }
        Ok(())
    }
}

impl Read for SerialLink {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.use_timeout(self.read_timeout)?;
        self.port.read(buf)
    }
}

impl Write for SerialLink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.use_timeout(self.write_timeout)?;
        self.port.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.port.flush()
    }
}

/// Read exactly `buf.len()` bytes, or fail with `ShortFrame` on timeout or
/// end of stream. Other I/O errors pass through.
pub fn read_frame(link: &mut dyn Link, buf: &mut [u8]) -> Result<()> {
    let mut got = 0;
    while got < buf.len() {
        match link.read(&mut buf[got..]) {
            Ok(0) => break,
            Ok(n) => got += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) => {
                break;
            }
            Err(e) => return Err(e.into()),
        }
    }
    if got < buf.len() {
        return Err(Error::ShortFrame {
            expected: buf.len(),
            got,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    struct Chunked {
        chunks: Vec<Vec<u8>>,
    }

    impl Read for Chunked {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.chunks.is_empty() {
                return Err(io::Error::new(io::ErrorKind::TimedOut, "timed out"));
            }
            let c = self.chunks.remove(0);
            buf[..c.len()].copy_from_slice(&c);
            Ok(c.len())
        }
    }

    impl Write for Chunked {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn read_frame_assembles_chunks() {
        let mut link = Chunked {
            chunks: vec![vec![1, 2, 3], vec![4, 5]],
        };
        let mut buf = [0u8; 5];
        read_frame(&mut link, &mut buf).unwrap();
        assert_eq!(buf, [1, 2, 3, 4, 5]);
    }

    #[test]
    fn read_frame_timeout_is_short_frame() {
        let mut link = Chunked {
            chunks: vec![vec![1, 2, 3]],
        };
        let mut buf = [0u8; 11];
        let err = read_frame(&mut link, &mut buf).unwrap_err();
        assert!(matches!(err, Error::ShortFrame { expected: 11, got: 3 }));
    }

    #[test]
    fn read_frame_eof_is_short_frame() {
        let mut link = Cursor::new(vec![9u8; 4]);
        let mut buf = [0u8; 11];
        assert!(matches!(
            read_frame(&mut link, &mut buf),
            Err(Error::ShortFrame { got: 4, .. })
        ));
    }

    #[test]
    fn serial_connector_rejects_invalid_config() {
        let cfg = SerialLinkConfig {
            baud_rate: 0,
            ..Default::default()
        };
        assert!(SerialConnector::new(cfg).is_err());
    }

    #[test]
    fn missing_device_is_link_unavailable() {
        let cfg = SerialLinkConfig {
            port: "/dev/does-not-exist-steppir".into(),
            ..Default::default()
        };
        let conn = SerialConnector::new(cfg).unwrap();
        assert!(matches!(conn.open(), Err(Error::LinkUnavailable { .. })));
    }
}

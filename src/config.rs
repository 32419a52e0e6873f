use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;

use clap::ValueEnum;

use crate::error::{Error, Result};

/// The controller accepts 1200 to 19200 baud; anything higher is
/// silently treated as 19200 by the device.
pub const MIN_BAUD: u32 = 1200;
pub const MAX_BAUD: u32 = 19_200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Parity {
    None,
    Odd,
    Even,
}

impl From<Parity> for serialport::Parity {
    fn from(p: Parity) -> Self {
        match p {
            Parity::None => serialport::Parity::None,
            Parity::Odd => serialport::Parity::Odd,
            Parity::Even => serialport::Parity::Even,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StopBits {
    #[value(name = "1")]
    One,
    #[value(name = "2")]
    Two,
}

impl From<StopBits> for serialport::StopBits {
    fn from(s: StopBits) -> Self {
        match s {
            StopBits::One => serialport::StopBits::One,
            StopBits::Two => serialport::StopBits::Two,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlowControlFlags {
    pub xonxoff: bool,
    pub rtscts: bool,
}

/// Immutable line settings for the controller's serial port. Validated once,
/// then reused for every per-transaction open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialLinkConfig {
    pub port: String,
    pub baud_rate: u32,
    pub byte_size: u8,
    pub parity: Parity,
    pub stop_bits: StopBits,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
    pub flow_control: FlowControlFlags,
}

impl Default for SerialLinkConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".into(),
            baud_rate: MIN_BAUD,
            byte_size: 8,
            parity: Parity::None,
            stop_bits: StopBits::One,
            read_timeout: Duration::from_secs(2),
            write_timeout: Duration::from_secs(2),
            flow_control: FlowControlFlags::default(),
        }
    }
}

impl SerialLinkConfig {
    pub fn validate(self) -> Result<Self> {
        if self.port.is_empty() {
            return Err(Error::InvalidConfig("serial port path is empty".into()));
        }
        if !(MIN_BAUD..=MAX_BAUD).contains(&self.baud_rate) {
            return Err(Error::InvalidConfig(format!(
                "baud rate {} outside {}..={}",
                self.baud_rate, MIN_BAUD, MAX_BAUD
            )));
        }
        if !(5..=8).contains(&self.byte_size) {
            return Err(Error::InvalidConfig(format!(
                "byte size {} outside 5..=8",
                self.byte_size
            )));
        }
        if self.read_timeout.is_zero() || self.write_timeout.is_zero() {
            return Err(Error::InvalidConfig("serial timeouts must be non-zero".into()));
        }
        if self.flow_control.xonxoff && self.flow_control.rtscts {
            return Err(Error::InvalidConfig(
                "xon/xoff and rts/cts flow control are mutually exclusive".into(),
            ));
        }
        Ok(self)
    }

    pub fn data_bits(&self) -> serialport::DataBits {
        match self.byte_size {
            5 => serialport::DataBits::Five,
            6 => serialport::DataBits::Six,
            7 => serialport::DataBits::Seven,
            _ => serialport::DataBits::Eight,
        }
    }

    pub fn flow(&self) -> serialport::FlowControl {
        if self.flow_control.rtscts {
            serialport::FlowControl::Hardware
        } else if self.flow_control.xonxoff {
            serialport::FlowControl::Software
        } else {
            serialport::FlowControl::None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    /// Radio's CAT server, `host:port`.
    pub radio: String,
    /// Where client tools connect.
    pub listen: SocketAddr,
    /// Upper bound on a blocking read or accept wait; also bounds how long
    /// shutdown takes to be noticed.
    pub poll_interval: Duration,
    pub reconnect_delay: Duration,
    pub connect_timeout: Duration,
}

impl RelayConfig {
    pub fn new(radio: impl Into<String>, listen: SocketAddr) -> Self {
        Self {
            radio: radio.into(),
            listen,
            poll_interval: Duration::from_millis(500),
            reconnect_delay: Duration::from_secs(2),
            connect_timeout: Duration::from_secs(3),
        }
    }

    pub fn validate(self) -> Result<Self> {
        if self.poll_interval.is_zero()
            || self.reconnect_delay.is_zero()
            || self.connect_timeout.is_zero()
        {
            return Err(Error::InvalidConfig("relay intervals must be non-zero".into()));
        }
        self.radio_addr()?;
        Ok(self)
    }

    /// Must resolve when the bridge starts. Resolved again on each connect
    /// attempt, so a changed DNS entry is picked up on reconnect.
    pub fn radio_addr(&self) -> Result<SocketAddr> {
        self.radio
            .to_socket_addrs()
            .map_err(|e| Error::InvalidConfig(format!("radio address {:?}: {}", self.radio, e)))?
            .next()
            .ok_or_else(|| Error::InvalidConfig(format!("radio address {:?} did not resolve", self.radio)))
    }
}

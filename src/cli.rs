use std::net::SocketAddr;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::Level;

use crate::config::{FlowControlFlags, Parity, RelayConfig, SerialLinkConfig, StopBits};
use crate::frame::Direction;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "steppir-relay",
    about = "SteppIR antenna controller driver and CAT relay"
)]
pub struct Cli {
    #[command(flatten)]
    pub ser: SerialOpts,
    /// More logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
    /// Only log warnings and errors
    #[arg(short, long, default_value_t = false)]
    pub quiet: bool,
    #[command(subcommand)]
    pub cmd: Cmd,
}

impl Cli {
    pub fn log_level(&self) -> Level {
        if self.quiet {
            return Level::WARN;
        }
        match self.verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Cmd {
    /// Show frequency, direction, motor activity and interface version
    Status,
    /// Read the frequency, or tune to HZ
    Freq { hz: Option<u32> },
    /// Tune by a signed offset in Hz (e.g. 10000, -100000)
    Step {
        #[arg(allow_negative_numbers = true)]
        delta_hz: i64,
    },
    /// Jump to the bottom of the next band up or down
    Band { way: BandStep },
    /// Set the antenna direction
    Dir { direction: DirArg },
    /// Turn serial frequency tracking on or off
    Autotrack { state: Toggle },
    /// Retract the elements into their hubs
    Retract,
    /// Calibrate the antenna to the controller
    Calibrate,
    /// Relay the radio's CAT port to one client tool
    Relay(RelayOpts),
}

#[derive(Args, Debug, Clone)]
pub struct SerialOpts {
    /// Controller serial device path
    #[arg(long, default_value = "/dev/ttyUSB0")]
    pub dev: String,
    /// Baud rate (controller supports 1200..=19200)
    #[arg(long, default_value_t = 1200)]
    pub baud: u32,
    #[arg(long, default_value_t = 8)]
    pub data_bits: u8,
    #[arg(long, value_enum, default_value = "none")]
    pub parity: Parity,
    #[arg(long, value_enum, default_value = "1")]
    pub stop_bits: StopBits,
    #[arg(long, default_value_t = 2000)]
    pub read_timeout_ms: u64,
    #[arg(long, default_value_t = 2000)]
    pub write_timeout_ms: u64,
    /// Enable XON/XOFF
    #[arg(long, default_value_t = false)]
    pub xonxoff: bool,
    /// Enable RTS/CTS
    #[arg(long, default_value_t = false)]
    pub rtscts: bool,
}

impl SerialOpts {
    pub fn to_config(&self) -> SerialLinkConfig {
        SerialLinkConfig {
            port: self.dev.clone(),
            baud_rate: self.baud,
            byte_size: self.data_bits,
            parity: self.parity,
            stop_bits: self.stop_bits,
            read_timeout: Duration::from_millis(self.read_timeout_ms),
            write_timeout: Duration::from_millis(self.write_timeout_ms),
            flow_control: FlowControlFlags {
                xonxoff: self.xonxoff,
                rtscts: self.rtscts,
            },
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct RelayOpts {
    /// Radio CAT server, host:port
    #[arg(long)]
    pub radio: String,
    /// Address client tools connect to
    #[arg(long, default_value = "127.0.0.1:4533")]
    pub listen: SocketAddr,
    /// Tune the antenna to every new radio frequency
    #[arg(long, default_value_t = false)]
    pub sync: bool,
    /// Stop after this many seconds instead of on Enter / end of stdin
    #[arg(long)]
    pub duration_secs: Option<u64>,
    /// Read poll interval; bounds how long shutdown takes
    #[arg(long, default_value_t = 500)]
    pub poll_ms: u64,
    #[arg(long, default_value_t = 2000)]
    pub reconnect_ms: u64,
    #[arg(long, default_value_t = 3000)]
    pub connect_timeout_ms: u64,
}

impl RelayOpts {
    pub fn to_config(&self) -> RelayConfig {
        RelayConfig {
            poll_interval: Duration::from_millis(self.poll_ms),
            reconnect_delay: Duration::from_millis(self.reconnect_ms),
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            ..RelayConfig::new(self.radio.clone(), self.listen)
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum BandStep {
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Toggle {
    On,
    Off,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum DirArg {
    Normal,
    #[value(alias = "180")]
    Reverse,
    #[value(alias = "bi")]
    Bidirectional,
    #[value(name = "three-quarter", alias = "3/4")]
    ThreeQuarter,
}

impl From<DirArg> for Direction {
    fn from(d: DirArg) -> Self {
        match d {
            DirArg::Normal => Direction::Normal,
            DirArg::Reverse => Direction::Reverse180,
            DirArg::Bidirectional => Direction::Bidirectional,
            DirArg::ThreeQuarter => Direction::ThreeQuarterWave,
        }
    }
}

pub fn mhz(hz: u64) -> String {
    format!("{:.3} MHz", hz as f64 / 1_000_000.0)
}

//! Wire frames for the antenna controller's transceiver interface.
//!
//! Status query: `?A\r`. Status reply: 11 raw bytes. Command: `@A`, a
//! big-endian frequency in tens of hertz, a reserved byte, direction,
//! opcode, a trailing zero and CR.

use crate::error::{Error, Result};

pub const STATUS_QUERY: &[u8; 3] = b"?A\r";
pub const STATUS_LEN: usize = 11;
pub const COMMAND_LEN: usize = 11;

const COMMAND_TAG: &[u8; 2] = b"@A";
const DIRECTION_MASK: u8 = 0xE0;

/// On-wire frequency unit is 10 Hz.
const FREQ_SCALE: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Normal,
    Reverse180,
    Bidirectional,
    /// Vertical antennas only.
    ThreeQuarterWave,
    /// `0xC0`. Decoded so it is not mistaken for Normal, but cannot be
    /// commanded: the companion pattern index byte is unverified.
    PatternSelect,
}

impl Direction {
    pub fn from_status_byte(b: u8) -> Self {
        match b & DIRECTION_MASK {
            0x80 => Direction::Bidirectional,
            0x40 => Direction::Reverse180,
            0x20 => Direction::ThreeQuarterWave,
            0xC0 => Direction::PatternSelect,
            _ => Direction::Normal,
        }
    }

    pub fn to_byte(self) -> u8 {
        match self {
            Direction::Normal => 0x00,
            Direction::ThreeQuarterWave => 0x20,
            Direction::Reverse180 => 0x40,
            Direction::Bidirectional => 0x80,
            Direction::PatternSelect => 0xC0,
        }
    }

    pub fn is_supported(self) -> bool {
        !matches!(self, Direction::PatternSelect)
    }

    pub fn label(self) -> &'static str {
        match self {
            Direction::Normal => "Normal",
            Direction::Reverse180 => "180 degrees",
            Direction::Bidirectional => "Bidirectional",
            Direction::ThreeQuarterWave => "3/4 Wave",
            Direction::PatternSelect => "Pattern select",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    SetFrequencyAndDirection,
    AutotrackOn,
    AutotrackOff,
    Retract,
    Calibrate,
}

impl Command {
    pub fn opcode(self) -> u8 {
        match self {
            Command::SetFrequencyAndDirection => b'1',
            Command::AutotrackOn => b'R',
            Command::AutotrackOff => b'U',
            Command::Retract => b'S',
            Command::Calibrate => b'V',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerStatus {
    pub frequency_hz: u32,
    /// Opaque busy signal: only zero versus non-zero is meaningful.
    pub active_motors: u8,
    pub direction: Direction,
    pub interface_version: [u8; 2],
}

impl ControllerStatus {
    pub fn motors_idle(&self) -> bool {
        self.active_motors == 0
    }

    pub fn version(&self) -> String {
        String::from_utf8_lossy(&self.interface_version).into_owned()
    }
}

pub fn encode_status_query() -> [u8; 3] {
    *STATUS_QUERY
}

/// Build a command frame. The terminating CR is part of the frame so it
/// goes out in the same write.
pub fn encode_command(frequency_hz: u32, direction: Direction, command: Command) -> [u8; COMMAND_LEN] {
    // u32::MAX / 10 always fits in an i32
    let tens = (frequency_hz / FREQ_SCALE) as i32;
    let f = tens.to_be_bytes();
    [
        COMMAND_TAG[0],
        COMMAND_TAG[1],
        f[0],
        f[1],
        f[2],
        f[3],
        0x00,
        direction.to_byte(),
        command.opcode(),
        0x00,
        b'\r',
    ]
}

pub fn decode_status(buf: &[u8]) -> Result<ControllerStatus> {
    if buf.len() < STATUS_LEN {
        return Err(Error::ShortFrame {
            expected: STATUS_LEN,
            got: buf.len(),
        });
    }
    if buf.len() > STATUS_LEN {
        return Err(Error::MalformedFrame(format!(
            "status frame is {} bytes, expected {}",
            buf.len(),
            STATUS_LEN
        )));
    }

    let tens = i32::from_be_bytes([buf[2], buf[3], buf[4], buf[5]]);
    let frequency_hz = u32::try_from(tens)
        .ok()
        .and_then(|t| t.checked_mul(FREQ_SCALE))
        .ok_or_else(|| Error::MalformedFrame(format!("frequency field out of range: {tens}")))?;

    Ok(ControllerStatus {
        frequency_hz,
        active_motors: buf[6],
        direction: Direction::from_status_byte(buf[7]),
        interface_version: [buf[8], buf[9]],
    })
}

#[cfg(test)]
pub(crate) fn status_frame(frequency_hz: u32, active_motors: u8, direction: Direction) -> [u8; STATUS_LEN] {
    let f = ((frequency_hz / FREQ_SCALE) as i32).to_be_bytes();
    [
        0x00,
        0x00,
        f[0],
        f[1],
        f[2],
        f[3],
        active_motors,
        direction.to_byte(),
        b'1',
        b'6',
        b'\r',
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_query_bytes() {
        assert_eq!(&encode_status_query(), b"?A\r");
    }

    #[test]
    fn command_layout() {
        let f = encode_command(14_000_000, Direction::Reverse180, Command::SetFrequencyAndDirection);
        assert_eq!(f.len(), 11);
        assert_eq!(&f[..2], b"@A");
        assert_eq!(i32::from_be_bytes([f[2], f[3], f[4], f[5]]), 1_400_000);
        assert_eq!(f[6], 0x00);
        assert_eq!(f[7], 0x40);
        assert_eq!(f[8], b'1');
        assert_eq!(f[9], 0x00);
        assert_eq!(f[10], b'\r');
    }

    #[test]
    fn frequency_divided_by_ten_on_encode() {
        let f = encode_command(1_400_000, Direction::Normal, Command::AutotrackOn);
        assert_eq!(i32::from_be_bytes([f[2], f[3], f[4], f[5]]), 140_000);
        assert_eq!(f[8], b'R');
    }

    #[test]
    fn encode_truncates_sub_resolution_hertz() {
        let f = encode_command(14_074_009, Direction::Normal, Command::SetFrequencyAndDirection);
        assert_eq!(i32::from_be_bytes([f[2], f[3], f[4], f[5]]), 1_407_400);
    }

    #[test]
    fn frequency_multiplied_by_ten_on_decode() {
        let mut buf = [0u8; 11];
        buf[2..6].copy_from_slice(&140_000i32.to_be_bytes());
        let s = decode_status(&buf).unwrap();
        assert_eq!(s.frequency_hz, 1_400_000);

        buf[2..6].copy_from_slice(&1_400_000i32.to_be_bytes());
        assert_eq!(decode_status(&buf).unwrap().frequency_hz, 14_000_000);
    }

    #[test]
    fn direction_decode_table() {
        let cases = [
            (0x80, Direction::Bidirectional),
            (0x40, Direction::Reverse180),
            (0x20, Direction::ThreeQuarterWave),
            (0x00, Direction::Normal),
            (0x1F, Direction::Normal),
        ];
        for (byte, want) in cases {
            assert_eq!(Direction::from_status_byte(byte), want, "byte {byte:#04x}");
        }
    }

    #[test]
    fn direction_low_bits_ignored() {
        assert_eq!(Direction::from_status_byte(0x9F), Direction::Bidirectional);
        assert_eq!(Direction::from_status_byte(0x41), Direction::Reverse180);
    }

    #[test]
    fn pattern_select_is_not_normal() {
        let d = Direction::from_status_byte(0xC0);
        assert_eq!(d, Direction::PatternSelect);
        assert!(!d.is_supported());
    }

    #[test]
    fn command_frame_decodes_as_status() {
        for dir in [
            Direction::Normal,
            Direction::Reverse180,
            Direction::Bidirectional,
            Direction::ThreeQuarterWave,
        ] {
            for hz in [1_800_000, 7_074_000, 28_500_010, 53_999_990] {
                let frame = encode_command(hz, dir, Command::SetFrequencyAndDirection);
                let s = decode_status(&frame).unwrap();
                assert_eq!(s.frequency_hz, hz);
                assert_eq!(s.direction, dir);
            }
        }
    }

    #[test]
    fn decode_full_status() {
        let s = decode_status(&status_frame(21_250_000, 0x05, Direction::Bidirectional)).unwrap();
        assert_eq!(s.frequency_hz, 21_250_000);
        assert_eq!(s.active_motors, 5);
        assert!(!s.motors_idle());
        assert_eq!(s.direction, Direction::Bidirectional);
        assert_eq!(s.version(), "16");
    }

    #[test]
    fn short_buffer_is_rejected() {
        let err = decode_status(&[0u8; 7]).unwrap_err();
        assert!(matches!(err, Error::ShortFrame { expected: 11, got: 7 }));
    }

    #[test]
    fn negative_frequency_is_malformed() {
        let mut buf = [0u8; 11];
        buf[2..6].copy_from_slice(&(-5i32).to_be_bytes());
        assert!(matches!(decode_status(&buf), Err(Error::MalformedFrame(_))));
    }

    #[test]
    fn oversized_buffer_is_malformed() {
        assert!(matches!(decode_status(&[0u8; 12]), Err(Error::MalformedFrame(_))));
    }

    #[test]
    fn opcodes() {
        let ops: Vec<u8> = [
            Command::SetFrequencyAndDirection,
            Command::AutotrackOn,
            Command::AutotrackOff,
            Command::Retract,
            Command::Calibrate,
        ]
        .iter()
        .map(|c| c.opcode())
        .collect();
        assert_eq!(ops, b"1RUSV");
    }
}

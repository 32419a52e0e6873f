//! Command/status driver for the antenna controller.
//!
//! Every mutating command is fired and then confirmed with an independent
//! status read; the link has no acknowledgment of its own. All retry and
//! poll loops are bounded.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, trace, warn};

use crate::error::{Error, Result};
use crate::frame::{self, Command, ControllerStatus, Direction, STATUS_LEN};
use crate::port::{self, Connector};

pub const FREQUENCY_READ_ATTEMPTS: u32 = 3;
pub const SET_ATTEMPTS: u32 = 3;
pub const RETRACT_POLLS: u32 = 60;
pub const CALIBRATE_POLLS: u32 = 120;

/// Device resolution; read-back frequencies are always multiples of this.
pub const FREQUENCY_STEP_HZ: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// Minimum gap after a command before the next transaction.
    pub command_spacing: Duration,
    /// Between frequency read attempts that returned zero.
    pub read_retry_delay: Duration,
    /// Time the controller needs to apply a set and reflect it in status.
    pub settle: Duration,
    /// Between busy-motor polls during retract and calibrate.
    pub motor_poll: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            command_spacing: Duration::from_millis(100),
            read_retry_delay: Duration::from_millis(100),
            settle: Duration::from_millis(800),
            motor_poll: Duration::from_millis(750),
        }
    }
}

#[derive(Debug, Default)]
struct LinkState {
    earliest_next_send: Option<Instant>,
}

pub struct Controller {
    connector: Box<dyn Connector>,
    timing: Timing,
    // Serializes access to the half-duplex, single-client link.
    link: Mutex<LinkState>,
}

impl Controller {
    pub fn new(connector: Box<dyn Connector>, timing: Timing) -> Self {
        Self {
            connector,
            timing,
            link: Mutex::new(LinkState::default()),
        }
    }

    fn lock_link(&self) -> MutexGuard<'_, LinkState> {
        self.link.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run one exchange on a freshly opened link. The link is closed when
    /// `f` returns, on success or error.
    fn transact<T>(&self, is_command: bool, f: impl FnOnce(&mut dyn port::Link) -> Result<T>) -> Result<T> {
        let mut state = self.lock_link();
        if let Some(at) = state.earliest_next_send {
            let now = Instant::now();
            if at > now {
                trace!(component = "driver", wait_ms = (at - now).as_millis() as u64, "command spacing");
                thread::sleep(at - now);
            }
        }

        let result = {
            let mut link = self.connector.open()?;
            f(&mut *link)
        };

        if is_command {
            state.earliest_next_send = Some(Instant::now() + self.timing.command_spacing);
        }
        result
    }

    /// Single status exchange. No retry at this level.
    pub fn get_status(&self) -> Result<ControllerStatus> {
        self.transact(false, |link| {
            link.write_all(&frame::encode_status_query())?;
            link.flush()?;
            let mut buf = [0u8; STATUS_LEN];
            port::read_frame(link, &mut buf)?;
            trace!(component = "driver", frame = ?buf, "status frame");
            let status = frame::decode_status(&buf)?;
            if status.direction == Direction::PatternSelect {
                warn!(component = "driver", "controller reports pattern-select direction, which is not supported");
            }
            Ok(status)
        })
    }

    pub fn set_parameters(&self, frequency_hz: u32, direction: Direction, command: Command) -> Result<()> {
        let out = frame::encode_command(frequency_hz, direction, command);
        self.transact(true, |link| {
            link.write_all(&out)?;
            link.flush()?;
            Ok(())
        })?;
        debug!(component = "driver", frequency_hz, ?direction, ?command, "command sent");
        Ok(())
    }

    /// The controller transiently reports 0 during mode changes, so a zero
    /// reading is retried. After the last attempt the last reading is
    /// returned even if it is zero.
    pub fn get_frequency(&self) -> Result<u32> {
        let mut last_seen = None;
        let mut last_err = None;
        for attempt in 1..=FREQUENCY_READ_ATTEMPTS {
            if attempt > 1 {
                thread::sleep(self.timing.read_retry_delay);
            }
            match self.get_status() {
                Ok(s) if s.frequency_hz != 0 => return Ok(s.frequency_hz),
                Ok(_) => {
                    debug!(component = "driver", attempt, "controller reported zero frequency");
                    last_seen = Some(0);
                }
                Err(e) => {
                    debug!(component = "driver", attempt, error = %e, "status read failed");
                    last_err = Some(e);
                }
            }
        }
        match (last_seen, last_err) {
            (Some(f), _) => Ok(f),
            (None, Some(e)) => Err(e),
            (None, None) => Ok(0),
        }
    }

    /// Tune to `target_hz`, keeping the current direction. The target is
    /// rounded down to the controller's 10 Hz resolution.
    pub fn set_frequency(&self, target_hz: u32) -> Result<ControllerStatus> {
        let target = target_hz - target_hz % FREQUENCY_STEP_HZ;
        let current = self.get_status()?;
        self.set_and_verify("frequency", target, current.direction, |s| s.frequency_hz == target)
    }

    pub fn set_direction(&self, direction: Direction) -> Result<ControllerStatus> {
        if !direction.is_supported() {
            return Err(Error::UnsupportedDirection(direction));
        }
        let current = self.get_status()?;
        self.set_and_verify("direction", current.frequency_hz, direction, |s| s.direction == direction)
    }

    fn set_and_verify(
        &self,
        what: &'static str,
        frequency_hz: u32,
        direction: Direction,
        accept: impl Fn(&ControllerStatus) -> bool,
    ) -> Result<ControllerStatus> {
        for attempt in 1..=SET_ATTEMPTS {
            self.set_parameters(frequency_hz, direction, Command::SetFrequencyAndDirection)?;
            thread::sleep(self.timing.settle);
            match self.get_status() {
                Ok(s) if accept(&s) => {
                    info!(component = "driver", what, attempt, frequency_hz = s.frequency_hz, direction = s.direction.label(), "set confirmed");
                    return Ok(s);
                }
                Ok(s) => debug!(
                    component = "driver",
                    what,
                    attempt,
                    want_hz = frequency_hz,
                    got_hz = s.frequency_hz,
                    want_dir = ?direction,
                    got_dir = ?s.direction,
                    "read-back mismatch"
                ),
                Err(e) => debug!(component = "driver", what, attempt, error = %e, "read-back failed"),
            }
        }
        warn!(component = "driver", what, attempts = SET_ATTEMPTS, "set not confirmed");
        Err(Error::SetFailed {
            what,
            attempts: SET_ATTEMPTS,
        })
    }

    /// Re-enables serial frequency tracking; needed after a retract.
    pub fn autotrack_on(&self) -> Result<()> {
        self.fire(Command::AutotrackOn)
    }

    pub fn autotrack_off(&self) -> Result<()> {
        self.fire(Command::AutotrackOff)
    }

    /// Status does not reliably reflect the autotrack toggle, so there is
    /// nothing to verify.
    fn fire(&self, command: Command) -> Result<()> {
        let s = self.get_status()?;
        self.set_parameters(s.frequency_hz, s.direction, command)
    }

    /// Retract the elements into their hubs and wait for the motors to
    /// stop. Returns the number of polls taken.
    pub fn retract(&self) -> Result<u32> {
        self.fire(Command::Retract)?;
        self.wait_for_motors("retract", RETRACT_POLLS)
    }

    pub fn calibrate(&self) -> Result<u32> {
        self.fire(Command::Calibrate)?;
        self.wait_for_motors("calibrate", CALIBRATE_POLLS)
    }

    /// Giving up only ends the wait; the controller keeps moving.
    fn wait_for_motors(&self, operation: &'static str, cap: u32) -> Result<u32> {
        for poll in 1..=cap {
            thread::sleep(self.timing.motor_poll);
            match self.get_status() {
                Ok(s) if s.motors_idle() => {
                    info!(component = "driver", operation, polls = poll, "motors idle");
                    return Ok(poll);
                }
                Ok(s) => trace!(component = "driver", operation, poll, mask = s.active_motors, "motors busy"),
                Err(e) => debug!(component = "driver", operation, poll, error = %e, "busy poll failed"),
            }
        }
        warn!(component = "driver", operation, polls = cap, "motors still busy");
        Err(Error::MotorTimeout { operation, polls: cap })
    }
}

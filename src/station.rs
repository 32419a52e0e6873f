//! What a front-end talks to: the antenna controller plus, once started,
//! the CAT relay. Driver calls run on the caller's thread.

use std::sync::mpsc::{self, Receiver};

use tracing::{debug, info, warn};

use crate::band;
use crate::config::RelayConfig;
use crate::driver::{Controller, FREQUENCY_STEP_HZ};
use crate::error::Result;
use crate::frame::{ControllerStatus, Direction};
use crate::relay::Bridge;

pub struct Station {
    controller: Controller,
    bridge: Option<Bridge>,
}

impl Station {
    pub fn new(controller: Controller) -> Self {
        Self {
            controller,
            bridge: None,
        }
    }

    pub fn status(&self) -> Result<ControllerStatus> {
        self.controller.get_status()
    }

    pub fn get_frequency(&self) -> Result<u32> {
        self.controller.get_frequency()
    }

    pub fn set_frequency(&self, hz: u32) -> Result<ControllerStatus> {
        self.controller.set_frequency(hz)
    }

    pub fn set_direction(&self, direction: Direction) -> Result<ControllerStatus> {
        self.controller.set_direction(direction)
    }

    pub fn autotrack_on(&self) -> Result<()> {
        self.controller.autotrack_on()
    }

    pub fn autotrack_off(&self) -> Result<()> {
        self.controller.autotrack_off()
    }

    pub fn retract(&self) -> Result<u32> {
        self.controller.retract()
    }

    pub fn calibrate(&self) -> Result<u32> {
        self.controller.calibrate()
    }

    /// Move by a signed offset from the current frequency, not going below
    /// zero.
    pub fn step_frequency(&self, delta_hz: i64) -> Result<ControllerStatus> {
        let current = self.controller.get_frequency()?;
        let target = (i64::from(current) + delta_hz).clamp(0, i64::from(u32::MAX)) as u32;
        debug!(component = "station", current, target, "step");
        self.controller.set_frequency(target)
    }

    pub fn band_up(&self) -> Result<ControllerStatus> {
        let current = self.controller.get_frequency()?;
        self.controller.set_frequency(band::band_up(current))
    }

    pub fn band_down(&self) -> Result<ControllerStatus> {
        let current = self.controller.get_frequency()?;
        self.controller.set_frequency(band::band_down(current))
    }

    /// Start the relay. The receiver yields each new radio frequency.
    pub fn start_relay(&mut self, cfg: RelayConfig) -> Result<Receiver<u64>> {
        self.stop_relay();
        let (tx, rx) = mpsc::channel();
        self.bridge = Some(Bridge::start(cfg, Some(tx))?);
        Ok(rx)
    }

    pub fn stop_relay(&mut self) {
        if let Some(mut b) = self.bridge.take() {
            b.stop();
        }
    }

    pub fn relay(&self) -> Option<&Bridge> {
        self.bridge.as_ref()
    }

    /// Non-blocking; `None` until the relay has seen a frequency report.
    pub fn latest_observed_frequency(&self) -> Option<u64> {
        self.bridge.as_ref().and_then(Bridge::latest_observed_frequency)
    }

    /// Tune the antenna to a frequency observed on the radio. Skipped when
    /// the antenna is already there or the value does not fit the
    /// controller's range.
    pub fn sync_from_relay(&self, hz: u64) -> Result<Option<ControllerStatus>> {
        let Ok(hz) = u32::try_from(hz) else {
            warn!(component = "station", frequency_hz = hz, "radio frequency out of controller range");
            return Ok(None);
        };
        let target = hz - hz % FREQUENCY_STEP_HZ;
        let current = self.controller.get_status()?;
        if current.frequency_hz == target {
            debug!(component = "station", frequency_hz = target, "antenna already in sync");
            return Ok(None);
        }
        info!(component = "station", from = current.frequency_hz, to = target, "syncing antenna to radio");
        self.controller.set_frequency(target).map(Some)
    }
}

impl Drop for Station {
    fn drop(&mut self) {
        self.stop_relay();
    }
}

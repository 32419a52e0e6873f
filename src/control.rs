use anyhow::{Context, Result};

use crate::band;
use crate::cli::{mhz, BandStep, Cmd, Toggle};
use crate::frame::{ControllerStatus, Direction};
use crate::station::Station;

fn print_status(s: &ControllerStatus) {
    println!(
        "{} ({})  direction={}  motors={:#04x}  interface={}",
        mhz(s.frequency_hz.into()),
        band::band_of(s.frequency_hz).map_or("out of band", |b| b.name),
        s.direction.label(),
        s.active_motors,
        s.version()
    );
}

/// Run one controller subcommand. The relay has its own runner.
pub fn run(station: &Station, cmd: Cmd) -> Result<()> {
    match cmd {
        Cmd::Status => {
            let s = station.status().context("reading controller status")?;
            print_status(&s);
        }
        Cmd::Freq { hz: None } => {
            let hz = station.get_frequency().context("reading frequency")?;
            // zero means the elements are homed
            println!("{}", mhz(hz.into()));
        }
        Cmd::Freq { hz: Some(hz) } => {
            let s = station
                .set_frequency(hz)
                .with_context(|| format!("tuning to {}", mhz(hz.into())))?;
            print_status(&s);
        }
        Cmd::Step { delta_hz } => {
            let s = station
                .step_frequency(delta_hz)
                .with_context(|| format!("stepping by {delta_hz} Hz"))?;
            print_status(&s);
        }
        Cmd::Band { way } => {
            let s = match way {
                BandStep::Up => station.band_up(),
                BandStep::Down => station.band_down(),
            }
            .context("changing band")?;
            print_status(&s);
        }
        Cmd::Dir { direction } => {
            let d = Direction::from(direction);
            let s = station
                .set_direction(d)
                .with_context(|| format!("setting direction {}", d.label()))?;
            print_status(&s);
        }
        Cmd::Autotrack { state } => {
            match state {
                Toggle::On => station.autotrack_on(),
                Toggle::Off => station.autotrack_off(),
            }
            .context("switching autotrack")?;
            println!("autotrack {:?}", state);
        }
        Cmd::Retract => {
            let polls = station.retract().context("retracting elements")?;
            println!("retracted ({polls} polls)");
        }
        Cmd::Calibrate => {
            let polls = station.calibrate().context("calibrating")?;
            println!("calibrated ({polls} polls)");
        }
        Cmd::Relay(_) => anyhow::bail!("relay is not a controller command"),
    }
    Ok(())
}

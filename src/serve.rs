use std::io::{self, BufRead};
use std::sync::mpsc::RecvTimeoutError;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::warn;

use crate::cli::{mhz, RelayOpts};
use crate::relay::{Bridge, ShutdownSignal};
use crate::station::Station;

const TICK: Duration = Duration::from_millis(250);

pub fn run(mut station: Station, opts: RelayOpts) -> Result<()> {
    let cfg = opts.to_config();
    let updates = station
        .start_relay(cfg)
        .with_context(|| format!("starting relay on {}", opts.listen))?;
    if let Some(b) = station.relay() {
        println!("relaying {} <-> {}", opts.radio, b.local_addr());
    }

    let stop = ShutdownSignal::new();
    let deadline = opts.duration_secs.map(|s| Instant::now() + Duration::from_secs(s));
    if deadline.is_none() {
        println!("press Enter to stop");
        let stop = stop.clone();
        // detached: a blocked stdin read cannot be joined
        thread::Builder::new()
            .name("stdin".into())
            .spawn(move || {
                let mut line = String::new();
                let _ = io::stdin().lock().read_line(&mut line);
                stop.signal();
            })
            .context("spawning stdin watcher")?;
    }

    let mut links = (false, false);
    loop {
        if stop.is_set() || deadline.is_some_and(|d| Instant::now() >= d) {
            break;
        }
        if let Some(b) = station.relay() {
            links = report_links(b, links);
        }
        let hz = match updates.recv_timeout(TICK) {
            Ok(hz) => hz,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };
        // only the newest matters if several queued up while tuning
        let hz = updates.try_iter().last().unwrap_or(hz);
        println!("radio {}", mhz(hz));

        if opts.sync {
            match station.sync_from_relay(hz) {
                Ok(Some(s)) => println!("antenna {}", mhz(s.frequency_hz.into())),
                Ok(None) => {}
                Err(e) => warn!(component = "station", error = %e, "antenna sync failed"),
            }
        }
    }

    if let Some(b) = station.relay() {
        let s = b.stats();
        println!(
            "relayed {} bytes up, {} down, {} chunks dropped, {} clients, {} radio reconnects, {} frequency reports",
            s.bytes_up, s.bytes_down, s.dropped, s.clients, s.reconnects, s.freq_reports
        );
    }
    if let Some(hz) = station.latest_observed_frequency() {
        println!("last radio frequency {}", mhz(hz));
    }
    station.stop_relay();
    Ok(())
}

/// Print radio/client connection changes; returns the new state.
fn report_links(bridge: &Bridge, (radio, client): (bool, bool)) -> (bool, bool) {
    let now = (bridge.uplink_connected(), bridge.downlink_connected());
    if now.0 != radio {
        println!("radio {}", if now.0 { "connected" } else { "disconnected" });
    }
    if now.1 != client {
        match bridge.client_addr() {
            Some(addr) if now.1 => println!("client {addr} connected"),
            _ => println!("client {}", if now.1 { "connected" } else { "disconnected" }),
        }
    }
    now
}

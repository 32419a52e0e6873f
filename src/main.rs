use anyhow::Result;
use clap::Parser;

mod band;
mod cli;
mod config;
mod control;
mod driver;
mod error;
mod frame;
mod port;
mod relay;
mod serve;
#[cfg(test)]
mod sim;
mod station;
mod stats;

use driver::{Controller, Timing};
use port::SerialConnector;
use station::Station;

fn main() -> Result<()> {
    let args = cli::Cli::parse();
    tracing_subscriber::fmt()
        .with_max_level(args.log_level())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let connector = SerialConnector::new(args.ser.to_config())?;
    let station = Station::new(Controller::new(Box::new(connector), Timing::default()));

    match args.cmd {
        cli::Cmd::Relay(opts) => serve::run(station, opts),
        cmd => control::run(&station, cmd),
    }
}

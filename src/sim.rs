//! In-memory antenna controller for driver tests.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex};

use crate::error::{Error, Result};
use crate::frame::{self, Command, ControllerStatus, Direction, COMMAND_LEN, STATUS_QUERY};
use crate::port::{Connector, Link};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Open,
    Query,
    Command([u8; COMMAND_LEN]),
}

struct SimState {
    current: ControllerStatus,
    /// Replies served before falling back to `current`.
    script: VecDeque<ControllerStatus>,
    /// Set commands update `current`, like a real controller.
    follow: bool,
    short_replies: usize,
    unavailable: bool,
    log: Vec<Event>,
}

#[derive(Clone)]
pub struct SimController {
    state: Arc<Mutex<SimState>>,
}

impl SimController {
    pub fn new(frequency_hz: u32, direction: Direction) -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState {
                current: ControllerStatus {
                    frequency_hz,
                    active_motors: 0,
                    direction,
                    interface_version: *b"16",
                },
                script: VecDeque::new(),
                follow: false,
                short_replies: 0,
                unavailable: false,
                log: Vec::new(),
            })),
        }
    }

    pub fn following(self) -> Self {
        self.state.lock().unwrap().follow = true;
        self
    }

    pub fn script(&self, frequency_hz: u32, active_motors: u8, direction: Direction) {
        self.state.lock().unwrap().script.push_back(ControllerStatus {
            frequency_hz,
            active_motors,
            direction,
            interface_version: *b"16",
        });
    }

    pub fn short_replies(&self, n: usize) {
        self.state.lock().unwrap().short_replies = n;
    }

    pub fn unavailable(&self) {
        self.state.lock().unwrap().unavailable = true;
    }

    pub fn events(&self) -> Vec<Event> {
        self.state.lock().unwrap().log.clone()
    }

    pub fn commands(&self) -> Vec<[u8; COMMAND_LEN]> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Command(c) => Some(c),
                _ => None,
            })
            .collect()
    }

    pub fn count_commands(&self, cmd: Command) -> usize {
        self.commands()
            .iter()
            .filter(|c| c[8] == cmd.opcode())
            .count()
    }

    /// Status queries issued after the most recent command.
    pub fn queries_since_last_command(&self) -> usize {
        self.events()
            .iter()
            .rev()
            .take_while(|e| !matches!(e, Event::Command(_)))
            .filter(|e| matches!(e, Event::Query))
            .count()
    }

    pub fn opens(&self) -> usize {
        self.events().iter().filter(|e| matches!(e, Event::Open)).count()
    }
}

impl Connector for SimController {
    fn open(&self) -> Result<Box<dyn Link>> {
        let mut st = self.state.lock().unwrap();
        if st.unavailable {
            return Err(Error::LinkUnavailable {
                target: "sim".into(),
                source: io::Error::new(io::ErrorKind::NotFound, "simulated port missing"),
            });
        }
        st.log.push(Event::Open);
        Ok(Box::new(SimLink {
            state: Arc::clone(&self.state),
            input: Vec::new(),
            output: VecDeque::new(),
        }))
    }
}

struct SimLink {
    state: Arc<Mutex<SimState>>,
    input: Vec<u8>,
    output: VecDeque<u8>,
}

impl SimLink {
    fn process(&mut self) {
        let mut st = self.state.lock().unwrap();
        loop {
            if self.input.starts_with(STATUS_QUERY) {
                self.input.drain(..STATUS_QUERY.len());
                st.log.push(Event::Query);
                let s = match st.script.pop_front() {
                    Some(s) => s,
                    None => st.current,
                };
                let reply = frame::status_frame(s.frequency_hz, s.active_motors, s.direction);
                let len = if st.short_replies > 0 {
                    st.short_replies -= 1;
                    5
                } else {
                    reply.len()
                };
                self.output.extend(&reply[..len]);
            } else if self.input.len() >= COMMAND_LEN && self.input.starts_with(b"@A") {
                let mut cmd = [0u8; COMMAND_LEN];
                cmd.copy_from_slice(&self.input[..COMMAND_LEN]);
                self.input.drain(..COMMAND_LEN);
                st.log.push(Event::Command(cmd));
                if st.follow && cmd[8] == Command::SetFrequencyAndDirection.opcode() {
                    let decoded = frame::decode_status(&cmd).unwrap();
                    st.current.frequency_hz = decoded.frequency_hz;
                    st.current.direction = decoded.direction;
                }
            } else {
                break;
            }
        }
    }
}

impl Read for SimLink {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.output.is_empty() {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "sim read timed out"));
        }
        let n = buf.len().min(self.output.len());
        for (dst, src) in buf.iter_mut().zip(self.output.drain(..n)) {
            *dst = src;
        }
        Ok(n)
    }
}

impl Write for SimLink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.input.extend_from_slice(buf);
        self.process();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

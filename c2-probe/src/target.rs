//! An emulated C2 target.
//!
//! [`TargetEmulator`] is the far end of the wire in simulations. It runs on
//! the same sampling clock as the interface and only ever sees the clock
//! level and the resolved data line. Host bits are sampled on rising clock
//! edges; the target changes its own drive only after falling edges, so the
//! host always finds a settled level while the clock is high.

use crate::config::TargetConfig;
use crate::frame::TransactionKind;
use crate::wire::Tristate;

/// Where the target is inside a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetPhase {
    /// Waiting for a start bit.
    Idle,
    Command { bits: u8, count: u8 },
    Length { kind: TransactionKind, count: u8 },
    /// Receiving the address or data byte.
    Payload { kind: TransactionKind, bits: u8, count: u8 },
    Wait { kind: TransactionKind, periods: u32 },
    /// Driving the data line high until the host samples it.
    Ready { kind: TransactionKind },
    Reply { value: u8, index: u8 },
    Stop,
}

#[derive(Debug, Clone)]
pub struct TargetEmulator {
    config: TargetConfig,
    sfr: [u8; 256],
    address: u8,
    phase: TargetPhase,
    drive: Tristate,

    last_clock: bool,
    low_ticks: u32,
    high_ticks: u32,

    resets: u32,
    frames: u32,
}

impl TargetEmulator {
    pub fn new(config: TargetConfig) -> Self {
        let mut sfr = [0; 256];
        for (register, value) in sfr.iter_mut().zip(&config.sfr) {
            *register = *value;
        }

        Self {
            config,
            sfr,
            address: 0,
            phase: TargetPhase::Idle,
            drive: Tristate::RELEASED,
            last_clock: true,
            low_ticks: 0,
            high_ticks: 0,
            resets: 0,
            frames: 0,
        }
    }

    pub fn config(&self) -> &TargetConfig {
        &self.config
    }

    pub fn set_ready_latency(&mut self, periods: u32) {
        self.config.ready_latency = periods;
    }

    pub fn set_unresponsive(&mut self, unresponsive: bool) {
        self.config.unresponsive = unresponsive;
    }

    /// The target's side of the data line.
    pub fn drive(&self) -> Tristate {
        self.drive
    }

    pub fn phase(&self) -> TargetPhase {
        self.phase
    }

    /// The address register.
    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn sfr(&self, address: u8) -> u8 {
        self.sfr[usize::from(address)]
    }

    pub fn write_sfr(&mut self, address: u8, value: u8) {
        self.sfr[usize::from(address)] = value;
    }

    /// Copies `data` into the SFR space starting at `start`, wrapping at the end.
    pub fn load_sfr(&mut self, start: u8, data: &[u8]) {
        for (offset, value) in data.iter().enumerate() {
            self.write_sfr(start.wrapping_add(offset as u8), *value);
        }
    }

    /// How many times a long clock-low pulse reset the target.
    pub fn resets(&self) -> u32 {
        self.resets
    }

    /// Frames completed through their stop bit.
    pub fn frames(&self) -> u32 {
        self.frames
    }

    /// Advances the target by one sampling tick.
    pub fn tick(&mut self, clock: bool, data: bool) {
        let rising = clock && !self.last_clock;
        let falling = !clock && self.last_clock;
        self.last_clock = clock;

        if clock {
            self.low_ticks = 0;
            self.high_ticks = self.high_ticks.saturating_add(1);

            // Inside a frame the clock is never high for two ticks in a row.
            if self.high_ticks == 2 && self.phase != TargetPhase::Idle {
                tracing::debug!("Target abandons frame in {:?}", self.phase);
                self.phase = TargetPhase::Idle;
                self.drive = Tristate::RELEASED;
            }
        } else {
            self.high_ticks = 0;
            self.low_ticks = self.low_ticks.saturating_add(1);

            if self.low_ticks == self.config.reset_threshold {
                self.reset();
            }
        }

        if rising {
            self.on_rising(data);
        } else if falling {
            self.on_falling();
        }
    }

    fn reset(&mut self) {
        tracing::debug!("Target reset");
        self.phase = TargetPhase::Idle;
        self.drive = Tristate::RELEASED;
        self.address = 0;
        self.resets += 1;
    }

    fn decode(bits: u8) -> TransactionKind {
        match bits & 0b11 {
            0b00 => TransactionKind::DataRead,
            0b01 => TransactionKind::DataWrite,
            0b10 => TransactionKind::AddressRead,
            _ => TransactionKind::AddressWrite,
        }
    }

    fn on_rising(&mut self, data: bool) {
        self.phase = match self.phase {
            TargetPhase::Idle if data => TargetPhase::Command { bits: 0, count: 0 },
            TargetPhase::Idle => TargetPhase::Idle,
            TargetPhase::Command { bits, count } => {
                let bits = bits | (u8::from(data) << count);
                if count + 1 < 2 {
                    TargetPhase::Command {
                        bits,
                        count: count + 1,
                    }
                } else {
                    let kind = Self::decode(bits);
                    tracing::debug!("Target decoded {}", kind);
                    match kind {
                        TransactionKind::AddressRead => TargetPhase::Reply {
                            value: self.address,
                            index: 0,
                        },
                        TransactionKind::AddressWrite => TargetPhase::Payload {
                            kind,
                            bits: 0,
                            count: 0,
                        },
                        kind => TargetPhase::Length { kind, count: 0 },
                    }
                }
            }
            TargetPhase::Length { kind, count } => {
                if count + 1 < 2 {
                    TargetPhase::Length {
                        kind,
                        count: count + 1,
                    }
                } else if kind == TransactionKind::DataWrite {
                    TargetPhase::Payload {
                        kind,
                        bits: 0,
                        count: 0,
                    }
                } else {
                    TargetPhase::Wait { kind, periods: 0 }
                }
            }
            TargetPhase::Payload { kind, bits, count } => {
                let bits = bits | (u8::from(data) << count);
                if count + 1 < 8 {
                    TargetPhase::Payload {
                        kind,
                        bits,
                        count: count + 1,
                    }
                } else if kind == TransactionKind::DataWrite {
                    tracing::debug!("Target SFR {:#04x} <- {:#04x}", self.address, bits);
                    self.write_sfr(self.address, bits);
                    TargetPhase::Wait { kind, periods: 0 }
                } else {
                    tracing::debug!("Target address <- {:#04x}", bits);
                    self.address = bits;
                    TargetPhase::Stop
                }
            }
            phase @ TargetPhase::Wait { .. } => phase,
            TargetPhase::Ready { kind } => match kind {
                TransactionKind::DataRead => TargetPhase::Reply {
                    value: self.sfr(self.address),
                    index: 0,
                },
                _ => TargetPhase::Stop,
            },
            TargetPhase::Reply { value, index } => {
                if index + 1 < 8 {
                    TargetPhase::Reply {
                        value,
                        index: index + 1,
                    }
                } else {
                    TargetPhase::Stop
                }
            }
            TargetPhase::Stop => {
                self.frames += 1;
                TargetPhase::Idle
            }
        };
    }

    fn on_falling(&mut self) {
        match self.phase {
            TargetPhase::Wait { kind, periods } => {
                let periods = periods + 1;
                if !self.config.unresponsive && periods > self.config.ready_latency {
                    self.drive = Tristate::driven(true);
                    self.phase = TargetPhase::Ready { kind };
                } else {
                    self.phase = TargetPhase::Wait { kind, periods };
                }
            }
            TargetPhase::Reply { value, index } => {
                self.drive = Tristate::driven((value >> index) & 1 != 0);
            }
            TargetPhase::Idle | TargetPhase::Stop => {
                self.drive = Tristate::RELEASED;
            }
            _ => {}
        }
    }
}

//! Signal-level view of the two C2 lines and the power gate.
//!
//! The data line is shared: the host drives it while transmitting a frame and
//! releases it whenever the target may answer. Which side owns it follows
//! from the engine state alone.

use serde::{Deserialize, Serialize};

/// One side's drive of a tri-statable line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tristate {
    pub level: bool,
    pub enabled: bool,
}

impl Tristate {
    pub const RELEASED: Tristate = Tristate {
        level: false,
        enabled: false,
    };

    pub fn driven(level: bool) -> Self {
        Self {
            level,
            enabled: true,
        }
    }
}

/// Level an undriven data line settles to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pull {
    #[default]
    Down,
    Up,
}

impl Pull {
    pub fn level(self) -> bool {
        self == Pull::Up
    }
}

/// Host and target drove the data line during the same cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Host ({host}) and target ({target}) both drive the data line")]
pub struct BusContention {
    pub host: bool,
    pub target: bool,
}

/// The level seen on the data line for the given drivers.
pub fn resolve(host: Tristate, target: Tristate, pull: Pull) -> Result<bool, BusContention> {
    match (host.enabled, target.enabled) {
        (true, true) => Err(BusContention {
            host: host.level,
            target: target.level,
        }),
        (true, false) => Ok(host.level),
        (false, true) => Ok(target.level),
        (false, false) => Ok(pull.level()),
    }
}

/// The host's outputs: the clock, its side of the data line and the power gate.
///
/// These are registered values; they change only when the owning state
/// machine commits a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineDriver {
    clock: bool,
    data: Tristate,
    data_in: bool,
    power_gate: bool,
}

impl Default for LineDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl LineDriver {
    /// Clock high, data released, power gate asserted.
    pub fn new() -> Self {
        Self {
            clock: true,
            data: Tristate::RELEASED,
            data_in: false,
            power_gate: true,
        }
    }

    pub fn set_clock(&mut self, level: bool) {
        self.clock = level;
    }

    pub fn drive_data(&mut self, level: bool) {
        self.data = Tristate::driven(level);
    }

    /// Stops driving the data line. The output register keeps its level.
    pub fn release_data(&mut self) {
        self.data.enabled = false;
    }

    pub fn set_power_gate(&mut self, level: bool) {
        self.power_gate = level;
    }

    /// Latches the level sampled on the data line this cycle.
    pub(crate) fn latch_input(&mut self, level: bool) {
        self.data_in = level;
    }

    pub fn sample_data(&self) -> bool {
        self.data_in
    }

    pub fn clock(&self) -> bool {
        self.clock
    }

    pub fn data(&self) -> Tristate {
        self.data
    }

    pub fn power_gate(&self) -> bool {
        self.power_gate
    }
}

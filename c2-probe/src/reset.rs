//! The reset pulse: the clock line held low, then high, for fixed durations.

use serde::{Deserialize, Serialize};

/// Durations of the two phases of the reset pulse, in sampling cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResetTiming {
    pub low_cycles: u16,
    pub high_cycles: u16,
}

impl Default for ResetTiming {
    fn default() -> Self {
        Self {
            low_cycles: 960,
            high_cycles: 96,
        }
    }
}

impl ResetTiming {
    /// Total length of the pulse in sampling cycles.
    pub fn total_cycles(&self) -> u32 {
        u32::from(self.low_cycles) + u32::from(self.high_cycles)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ResetStep {
    /// Stay in the current phase with `remaining` cycles left.
    Hold { remaining: u16 },
    /// The current phase is over.
    Elapsed,
}

/// Advances a phase by one cycle. `remaining` counts the current cycle.
pub(crate) fn step(remaining: u16) -> ResetStep {
    if remaining > 1 {
        ResetStep::Hold {
            remaining: remaining - 1,
        }
    } else {
        ResetStep::Elapsed
    }
}

//! Power-rail glitch injector.
//!
//! Runs beside the protocol engine on the same sampling clock without knowing
//! anything about it. Arming starts a countdown of `offset` cycles, after
//! which the power gate drops for `length` cycles and then returns to its
//! asserted state until the next arm.

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum GlitchPhase {
    #[default]
    Idle,
    Waiting,
    Pulsing,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GlitchInjector {
    phase: GlitchPhase,
    countdown: u32,
}

impl GlitchInjector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> GlitchPhase {
        self.phase
    }

    pub fn countdown(&self) -> u32 {
        self.countdown
    }

    /// Level of the power gate. Deasserted only while pulsing.
    pub fn gate(&self) -> bool {
        self.phase != GlitchPhase::Pulsing
    }

    /// The injector's state after one tick.
    ///
    /// With `arm` seen on tick 0, the gate is deasserted on ticks
    /// `offset + 1 ..= offset + length`.
    pub fn next(&self, arm: bool, offset: u32, length: u8) -> Self {
        if arm {
            tracing::debug!("Glitch armed: offset {} cycles, length {} cycles", offset, length);
            return Self {
                phase: GlitchPhase::Waiting,
                countdown: offset,
            };
        }

        match self.phase {
            GlitchPhase::Idle => *self,
            GlitchPhase::Waiting if self.countdown == 0 => {
                if length == 0 {
                    tracing::debug!("Glitch length is zero, not pulsing");
                    Self::default()
                } else {
                    tracing::debug!("Glitch firing");
                    Self {
                        phase: GlitchPhase::Pulsing,
                        countdown: u32::from(length),
                    }
                }
            }
            GlitchPhase::Pulsing if self.countdown <= 1 => Self::default(),
            GlitchPhase::Waiting | GlitchPhase::Pulsing => Self {
                phase: self.phase,
                countdown: self.countdown - 1,
            },
        }
    }
}

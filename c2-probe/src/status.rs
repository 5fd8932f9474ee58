//! Layouts of the STATUS and POWER_CONTROL registers.

use bitfield::bitfield;

use crate::engine::EngineState;

bitfield! {
    /// The STATUS register.
    ///
    /// At most one of the IDLE, TX, RX and WAIT bits is set at a time. RESET,
    /// RESET2 and STOP report none of them. REPLY_READY and READ_ERROR are
    /// sticky.
    #[derive(Copy, Clone, Default, Eq, PartialEq)]
    pub struct Status(u8);
    impl Debug;

    bool;
    pub idle, set_idle: 0;
    pub tx, set_tx: 1;
    pub rx, set_rx: 2;
    pub wait, set_wait: 3;
    /// A reply byte is waiting in RX_DATA. Cleared by reading RX_DATA.
    pub reply_ready, set_reply_ready: 6;
    /// The target never signalled readiness. Cleared by the next dispatch.
    pub read_error, set_read_error: 7;
}

impl Status {
    pub fn new(state: EngineState, reply_ready: bool, read_error: bool) -> Self {
        let mut status = Status(0);
        status.set_idle(state == EngineState::Idle);
        status.set_tx(state == EngineState::Tx);
        status.set_rx(state == EngineState::Rx);
        status.set_wait(state == EngineState::Wait);
        status.set_reply_ready(reply_ready);
        status.set_read_error(read_error);
        status
    }

    pub fn bits(self) -> u8 {
        self.0
    }
}

impl From<Status> for u8 {
    fn from(status: Status) -> u8 {
        status.0
    }
}

bitfield! {
    /// The POWER_CONTROL register.
    #[derive(Copy, Clone, Default, Eq, PartialEq)]
    pub struct PowerControl(u8);
    impl Debug;

    bool;
    /// Holds the power gate asserted, masking glitch pulses.
    pub power_on, set_power_on: 0;
    /// One-shot, cleared by the interface on the tick that observes it.
    pub arm_glitch, set_arm_glitch: 1;
}

impl PowerControl {
    pub const POWER_ON: u8 = 1 << 0;
    pub const ARM_GLITCH: u8 = 1 << 1;

    pub fn bits(self) -> u8 {
        self.0
    }
}

impl From<u8> for PowerControl {
    fn from(value: u8) -> Self {
        PowerControl(value)
    }
}

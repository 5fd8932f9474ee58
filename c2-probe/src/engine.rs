//! The protocol state machine.
//!
//! The engine advances exactly one step per sampling tick. While a frame is in
//! flight it toggles the clock on every tick, so the bit clock runs at half the
//! sampling rate and each bit spans one low and one high tick:
//!
//! ```text
//!           TX                 WAIT            RX              STOP
//! clock  ‾‾\__/‾‾\__/‾‾ .. \__/‾‾\__ .. /‾‾\__/‾‾\__ .. /‾‾\__/‾‾‾‾
//! data   <start><cmd>..     released        released        released
//! ```
//!
//! The host changes its data bit while the clock is low and the target samples
//! it on the rising edge. WAIT, RX and STOP must be entered with the clock low;
//! every transition into them drops the clock.
//!
//! A wait budget of `n` cycles keeps the engine in WAIT for `n + 1` ticks,
//! rounded up to end on a clock-high tick.

use crate::frame::{Dispatch, FrameTable, TransactionKind};
use crate::reset::{self, ResetStep};
use crate::shift::{ShiftRegister, TxShifter};
use crate::status::Status;
use crate::wire::LineDriver;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineState {
    Idle,
    /// Clock held low for the first phase of the reset pulse.
    Reset,
    /// Clock held high for the second phase of the reset pulse.
    Reset2,
    Tx,
    /// Waiting for the target to raise the data line.
    Wait,
    Rx,
    Stop,
}

/// The engine's registers. Everything the next tick depends on lives here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineRegisters {
    pub state: EngineState,
    pub tx_buf: TxShifter,
    pub tx_len: u8,
    pub rx_buf: ShiftRegister,
    pub rx_len: u8,
    pub wait_len: u8,
    pub reset_remaining: u16,
    /// Length of the high phase, latched when the pulse starts.
    pub reset_high: u16,
    pub reply_ready: bool,
    pub read_error: bool,
}

impl Default for EngineRegisters {
    fn default() -> Self {
        Self {
            state: EngineState::Idle,
            tx_buf: TxShifter::default(),
            tx_len: 0,
            rx_buf: ShiftRegister::default(),
            rx_len: 0,
            wait_len: 0,
            reset_remaining: 0,
            reset_high: 0,
            reply_ready: false,
            read_error: false,
        }
    }
}

/// Result of evaluating one tick, not yet committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct EngineStep {
    pub registers: EngineRegisters,
    pub pins: LineDriver,
    /// The COMMAND register was picked up and must be cleared.
    pub consumed: bool,
}

#[derive(Debug, Clone)]
pub struct Engine {
    table: FrameTable,
    regs: EngineRegisters,
}

impl Engine {
    pub fn new(table: FrameTable) -> Self {
        Self {
            table,
            regs: EngineRegisters::default(),
        }
    }

    pub fn table(&self) -> &FrameTable {
        &self.table
    }

    pub fn registers(&self) -> &EngineRegisters {
        &self.regs
    }

    pub fn state(&self) -> EngineState {
        self.regs.state
    }

    pub fn is_idle(&self) -> bool {
        self.regs.state == EngineState::Idle
    }

    pub fn status(&self) -> Status {
        Status::new(self.regs.state, self.regs.reply_ready, self.regs.read_error)
    }

    pub fn rx_data(&self) -> u8 {
        self.regs.rx_buf.value()
    }

    pub(crate) fn clear_reply_ready(&mut self) {
        self.regs.reply_ready = false;
    }

    /// Computes the next registers and pin levels from the current ones.
    ///
    /// `command` and `payload` are the current COMMAND and ADDRESS registers,
    /// `pins` holds the current outputs and the level sampled on the data line.
    pub(crate) fn next(&self, pins: &LineDriver, command: u8, payload: u8) -> EngineStep {
        let cur = &self.regs;
        let mut regs = *cur;
        let mut out = *pins;
        let mut consumed = false;

        let clock = pins.clock();
        let data_in = pins.sample_data();

        match cur.state {
            EngineState::Idle => {
                out.set_clock(true);

                if command != 0 {
                    consumed = true;
                    self.dispatch(command, payload, &mut regs, &mut out);
                }
            }
            EngineState::Reset => match reset::step(cur.reset_remaining) {
                ResetStep::Hold { remaining } => {
                    regs.reset_remaining = remaining;
                    out.set_clock(false);
                }
                ResetStep::Elapsed => {
                    regs.reset_remaining = cur.reset_high;
                    regs.state = EngineState::Reset2;
                    out.set_clock(true);
                }
            },
            EngineState::Reset2 => match reset::step(cur.reset_remaining) {
                ResetStep::Hold { remaining } => regs.reset_remaining = remaining,
                ResetStep::Elapsed => {
                    tracing::debug!("Reset pulse complete");
                    regs.state = EngineState::Idle;
                }
            },
            EngineState::Tx => {
                if cur.tx_len == 0 {
                    regs.state = if cur.wait_len != 0 {
                        EngineState::Wait
                    } else if cur.rx_len != 0 {
                        EngineState::Rx
                    } else {
                        EngineState::Stop
                    };
                    out.set_clock(false);
                } else {
                    if clock {
                        // Clock is high, the next bit goes out as it falls.
                        let bit = regs.tx_buf.shift_out();
                        out.drive_data(bit);
                    } else {
                        // Clock is low, the target samples the bit as it rises.
                        regs.tx_len = cur.tx_len - 1;
                    }
                    out.set_clock(!clock);
                }
            }
            EngineState::Wait => {
                if clock && data_in {
                    regs.state = if cur.rx_len != 0 {
                        EngineState::Rx
                    } else {
                        EngineState::Stop
                    };
                    out.set_clock(false);
                } else if cur.wait_len == 0 && clock {
                    // High tick only, after the target's last falling edge.
                    tracing::warn!("Target did not signal readiness");
                    regs.read_error = true;
                    regs.state = EngineState::Idle;
                } else {
                    regs.wait_len = cur.wait_len.saturating_sub(1);
                    out.set_clock(!clock);
                }
            }
            EngineState::Rx => {
                if clock {
                    regs.rx_buf.shift_in_lsb_first(data_in);
                    if cur.rx_len <= 1 {
                        regs.reply_ready = true;
                        regs.state = EngineState::Stop;
                    }
                    regs.rx_len = cur.rx_len.saturating_sub(1);
                    out.set_clock(false);
                } else {
                    out.set_clock(true);
                }
            }
            EngineState::Stop => {
                if clock {
                    regs.state = EngineState::Idle;
                } else {
                    out.set_clock(true);
                }
            }
        }

        // Only TX owns the data line.
        if regs.state == EngineState::Tx {
            out.drive_data(out.data().level);
        } else {
            out.release_data();
        }

        EngineStep {
            registers: regs,
            pins: out,
            consumed,
        }
    }

    pub(crate) fn commit(&mut self, regs: EngineRegisters) {
        if regs.state != self.regs.state {
            tracing::trace!("{:?} -> {:?}", self.regs.state, regs.state);
        }
        if regs.reply_ready && !self.regs.reply_ready {
            tracing::debug!("Received {:#04x}", regs.rx_buf.value());
        }
        self.regs = regs;
    }

    fn dispatch(&self, command: u8, payload: u8, regs: &mut EngineRegisters, out: &mut LineDriver) {
        let Some(kind) = TransactionKind::from_code(command) else {
            tracing::warn!("Dropping unknown command {:#04x}", command);
            return;
        };

        match self.table.dispatch(kind) {
            Some(Dispatch::Frame(frame)) => {
                tracing::debug!("Starting {} ({} bits out, {} in)", kind, frame.tx_bits, frame.rx_bits);
                regs.tx_buf = TxShifter::new(frame.encode(payload));
                regs.tx_len = frame.tx_bits;
                regs.rx_len = frame.rx_bits;
                regs.wait_len = frame.wait_cycles;
                regs.read_error = false;
                regs.state = EngineState::Tx;
            }
            Some(Dispatch::Reset(timing)) => {
                tracing::debug!("Starting reset pulse");
                regs.reset_remaining = timing.low_cycles;
                regs.reset_high = timing.high_cycles;
                regs.read_error = false;
                regs.state = EngineState::Reset;
                out.set_clock(false);
            }
            None => {
                tracing::warn!("Dropping {}, the frame table has no entry for it", kind);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Frame;
    use crate::reset::ResetTiming;
    use pretty_assertions::assert_eq;

    /// Runs the engine on its own, feeding `data_in` every tick, and returns
    /// the (state, clock) pair seen at the start of each tick.
    fn run(engine: &mut Engine, command: u8, payload: u8, data_in: bool, ticks: usize) -> Vec<(EngineState, bool)> {
        let mut pins = LineDriver::new();
        let mut command = command;
        let mut seen = Vec::with_capacity(ticks);

        for _ in 0..ticks {
            seen.push((engine.state(), pins.clock()));
            pins.latch_input(data_in);
            let step = engine.next(&pins, command, payload);
            engine.commit(step.registers);
            pins = step.pins;
            if step.consumed {
                command = 0;
            }
        }

        seen
    }

    #[test]
    fn idle_holds_clock_high_and_releases_data() {
        let engine = Engine::new(FrameTable::full());
        let mut pins = LineDriver::new();
        pins.set_clock(false);

        let step = engine.next(&pins, 0, 0);

        assert_eq!(step.registers.state, EngineState::Idle);
        assert!(step.pins.clock());
        assert!(!step.pins.data().enabled);
        assert!(!step.consumed);
    }

    #[test]
    fn dispatch_loads_frame() {
        let engine = Engine::new(FrameTable::full());

        let step = engine.next(&LineDriver::new(), TransactionKind::AddressWrite.code(), 0xAB);

        assert!(step.consumed);
        assert_eq!(step.registers.state, EngineState::Tx);
        assert_eq!(step.registers.tx_len, 11);
        assert_eq!(step.registers.rx_len, 0);
        assert_eq!(step.registers.wait_len, 0);
        assert_eq!(step.registers.tx_buf.value(), Frame::ADDRESS_WRITE.encode(0xAB));
        assert!(step.pins.data().enabled);
    }

    #[test]
    fn unsupported_command_is_consumed() {
        let engine = Engine::new(FrameTable::minimal());

        let step = engine.next(&LineDriver::new(), TransactionKind::DataWrite.code(), 0);

        assert!(step.consumed);
        assert_eq!(step.registers.state, EngineState::Idle);
    }

    #[test]
    fn tx_runs_two_ticks_per_bit() {
        let mut engine = Engine::new(FrameTable::full());

        let seen = run(&mut engine, TransactionKind::AddressRead.code(), 0, false, 12);

        let tx: Vec<bool> = seen
            .iter()
            .filter(|(state, _)| *state == EngineState::Tx)
            .map(|(_, clock)| *clock)
            .collect();

        // Three bits, plus the tick that drops the clock on the way out.
        assert_eq!(tx, vec![true, false, true, false, true, false, true]);
    }

    #[test]
    fn wait_times_out_without_target() {
        let mut engine = Engine::new(FrameTable::full());

        let seen = run(&mut engine, TransactionKind::DataRead.code(), 0, false, 200);

        let waiting = seen.iter().filter(|(state, _)| *state == EngineState::Wait).count();
        assert_eq!(waiting, 128);
        assert_eq!(engine.state(), EngineState::Idle);
        assert!(engine.status().read_error());
        assert!(!engine.status().reply_ready());
    }

    #[test]
    fn even_wait_budget_times_out_with_clock_high() {
        let mut engine = Engine::new(FrameTable::full().with_wait_cycles(40));

        let seen = run(&mut engine, TransactionKind::DataRead.code(), 0, false, 100);

        let waiting: Vec<bool> = seen
            .iter()
            .filter(|(state, _)| *state == EngineState::Wait)
            .map(|(_, clock)| *clock)
            .collect();
        assert_eq!(waiting.len(), 42);
        assert_eq!(waiting.last(), Some(&true));
        assert!(engine.status().read_error());
        assert_eq!(engine.state(), EngineState::Idle);
    }

    #[test]
    fn reset_latches_high_phase_length() {
        let timing = ResetTiming {
            low_cycles: 5,
            high_cycles: 3,
        };
        let mut engine = Engine::new(FrameTable::full().with_reset(Some(timing)));

        let seen = run(&mut engine, TransactionKind::Reset.code(), 0, false, 12);

        let states: Vec<EngineState> = seen.iter().map(|(state, _)| *state).collect();
        assert_eq!(
            states,
            vec![
                EngineState::Idle,
                EngineState::Reset,
                EngineState::Reset,
                EngineState::Reset,
                EngineState::Reset,
                EngineState::Reset,
                EngineState::Reset2,
                EngineState::Reset2,
                EngineState::Reset2,
                EngineState::Idle,
                EngineState::Idle,
                EngineState::Idle,
            ]
        );
    }

    #[test]
    fn address_read_with_data_high_reads_ff() {
        let mut engine = Engine::new(FrameTable::full());

        run(&mut engine, TransactionKind::AddressRead.code(), 0, true, 30);

        assert_eq!(engine.state(), EngineState::Idle);
        assert!(engine.status().reply_ready());
        assert_eq!(engine.rx_data(), 0xFF);
    }

    #[test]
    fn reset_pulse_shape() {
        let mut engine = Engine::new(FrameTable::full());

        let seen = run(&mut engine, TransactionKind::Reset.code(), 0, false, 1100);

        let low = seen
            .iter()
            .filter(|(state, clock)| *state == EngineState::Reset && !*clock)
            .count();
        let high = seen
            .iter()
            .filter(|(state, clock)| *state == EngineState::Reset2 && *clock)
            .count();
        let other = seen
            .iter()
            .filter(|(state, _)| matches!(state, EngineState::Reset | EngineState::Reset2))
            .count();

        assert_eq!(low, 960);
        assert_eq!(high, 96);
        assert_eq!(other, 960 + 96);
        assert_eq!(engine.state(), EngineState::Idle);
    }
}

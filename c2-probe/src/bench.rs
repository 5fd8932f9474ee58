//! A simulated wire between a [`C2Interface`] and a [`TargetEmulator`].
//!
//! Each [`Bench::tick`] resolves the data line from both drivers, hands the
//! level to the interface and then lets the target see the interface's
//! outputs. Both sides therefore react to the registered outputs of the other
//! side from the previous tick, as they would on real hardware.

use bitvec::prelude::*;

use crate::config::{InterfaceConfig, TargetConfig};
use crate::engine::EngineState;
use crate::interface::C2Interface;
use crate::target::TargetEmulator;
use crate::wire::{resolve, Pull, Tristate};
use crate::Error;

/// The lines as seen during one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineSample {
    pub tick: u64,
    /// Engine state at the start of the tick.
    pub state: EngineState,
    pub clock: bool,
    /// Resolved level of the data line.
    pub data: bool,
    pub host: Tristate,
    pub target: Tristate,
    pub power_gate: bool,
}

#[derive(Debug)]
pub struct Bench {
    interface: C2Interface,
    target: TargetEmulator,
    pull: Pull,
    trace: Option<Vec<LineSample>>,
    contentions: u64,
}

impl Bench {
    pub fn new(interface: C2Interface, target: TargetEmulator) -> Self {
        let pull = target.config().pull;
        Self {
            interface,
            target,
            pull,
            trace: None,
            contentions: 0,
        }
    }

    pub fn from_config(interface: &InterfaceConfig, target: TargetConfig) -> Result<Self, Error> {
        Ok(Self::new(
            C2Interface::new(interface)?,
            TargetEmulator::new(target),
        ))
    }

    pub fn interface(&self) -> &C2Interface {
        &self.interface
    }

    pub fn interface_mut(&mut self) -> &mut C2Interface {
        &mut self.interface
    }

    pub fn target(&self) -> &TargetEmulator {
        &self.target
    }

    pub fn target_mut(&mut self) -> &mut TargetEmulator {
        &mut self.target
    }

    /// Starts recording a [`LineSample`] per tick, dropping anything recorded so far.
    pub fn record(&mut self) {
        self.trace = Some(Vec::new());
    }

    pub fn trace(&self) -> &[LineSample] {
        self.trace.as_deref().unwrap_or(&[])
    }

    /// Returns the samples recorded so far. Recording continues if it was on.
    pub fn take_trace(&mut self) -> Vec<LineSample> {
        self.trace.as_mut().map(std::mem::take).unwrap_or_default()
    }

    /// Ticks on which both sides drove the data line.
    pub fn contentions(&self) -> u64 {
        self.contentions
    }

    pub fn tick(&mut self) {
        let host = self.interface.data();
        let target = self.target.drive();

        let data = match resolve(host, target, self.pull) {
            Ok(level) => level,
            Err(contention) => {
                tracing::error!(
                    "{} on tick {} in {:?}",
                    contention,
                    self.interface.ticks(),
                    self.interface.state()
                );
                self.contentions += 1;
                contention.host && contention.target
            }
        };

        let clock = self.interface.clock();
        if let Some(trace) = self.trace.as_mut() {
            trace.push(LineSample {
                tick: self.interface.ticks(),
                state: self.interface.state(),
                clock,
                data,
                host,
                target,
                power_gate: self.interface.power_gate(),
            });
        }

        self.interface.tick(data);
        self.target.tick(clock, data);
    }

    pub fn run(&mut self, ticks: u64) {
        for _ in 0..ticks {
            self.tick();
        }
    }

    /// Ticks until the engine is idle with no command pending.
    ///
    /// Returns the number of ticks it took.
    pub fn run_until_idle(&mut self, limit: u64) -> Result<u64, Error> {
        for ticks in 0..limit {
            if !self.interface.is_busy() {
                return Ok(ticks);
            }
            self.tick();
        }

        if self.interface.is_busy() {
            Err(Error::Stalled(limit))
        } else {
            Ok(limit)
        }
    }
}

/// Bits the host put on the wire, in the order the target sampled them.
pub fn transmitted_bits(trace: &[LineSample]) -> BitVec<u16, Lsb0> {
    trace
        .windows(2)
        .filter(|pair| !pair[0].clock && pair[1].clock && pair[1].host.enabled)
        .map(|pair| pair[1].data)
        .collect()
}

/// Bits the host sampled while receiving a reply.
pub fn received_bits(trace: &[LineSample]) -> BitVec<u8, Lsb0> {
    trace
        .iter()
        .filter(|sample| sample.state == EngineState::Rx && sample.clock)
        .map(|sample| sample.data)
        .collect()
}

/// Packs transmitted bits into a frame word, first bit in bit 0.
pub fn frame_word(bits: &BitSlice<u16, Lsb0>) -> Option<u16> {
    (1..=16)
        .contains(&bits.len())
        .then(|| bits.load_le::<u16>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Transaction;
    use pretty_assertions::assert_eq;

    fn bench() -> Bench {
        Bench::from_config(&InterfaceConfig::full(), TargetConfig::default()).unwrap()
    }

    #[test]
    fn address_write_reaches_target() {
        let mut bench = bench();
        bench.record();
        bench
            .interface_mut()
            .submit(Transaction::address_write(0x5A))
            .unwrap();

        bench.run_until_idle(100).unwrap();

        assert_eq!(bench.target().address(), 0x5A);
        assert_eq!(bench.contentions(), 0);

        let bits = transmitted_bits(bench.trace());
        assert_eq!(bits.len(), 11);
        assert_eq!(frame_word(&bits), Some((0x5A << 3) | 0b111));
    }

    #[test]
    fn data_read_reply_is_sampled() {
        let mut bench = bench();
        bench.target_mut().write_sfr(0, 0xC3);
        bench.record();
        bench.interface_mut().submit(Transaction::data_read()).unwrap();

        bench.run_until_idle(500).unwrap();

        let status = bench.interface().status();
        assert!(status.reply_ready());
        assert!(!status.read_error());
        assert_eq!(bench.interface().peek_rx_data(), 0xC3);
        assert!(bench.interface().status().reply_ready());
        assert_eq!(bench.interface_mut().read_rx_data(), 0xC3);

        let reply = received_bits(bench.trace());
        assert_eq!(reply.len(), 8);
        assert_eq!(reply.load_le::<u8>(), 0xC3);
    }

    #[test]
    fn idle_interface_is_done_immediately() {
        let mut bench = bench();

        assert_eq!(bench.run_until_idle(10).unwrap(), 0);
    }

    #[test]
    fn stalled_engine_is_reported() {
        let mut bench = bench();
        bench.interface_mut().submit(Transaction::reset()).unwrap();

        assert!(matches!(bench.run_until_idle(100), Err(Error::Stalled(100))));
        assert_eq!(bench.interface().state(), EngineState::Reset);
    }

    #[test]
    fn take_trace_keeps_recording() {
        let mut bench = bench();
        bench.record();
        bench.run(3);

        assert_eq!(bench.take_trace().len(), 3);
        bench.run(2);
        assert_eq!(bench.trace().len(), 2);
        assert_eq!(bench.trace()[0].tick, 3);
    }

    #[test]
    fn empty_frame_word() {
        let bits = BitVec::<u16, Lsb0>::new();

        assert_eq!(frame_word(&bits), None);
    }
}

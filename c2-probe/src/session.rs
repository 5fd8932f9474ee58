//! Host-side operations on a simulated target.
//!
//! [`Session`] drives a [`Bench`] through the register interface only, the way
//! firmware talking to the interface would: write ADDRESS and COMMAND, then
//! poll STATUS until the transaction is done.

use crate::bench::Bench;
use crate::frame::{Transaction, TransactionKind};
use crate::status::PowerControl;
use crate::Error;

/// Ticks a single operation may take before it is reported as stalled.
///
/// The longest transaction is the reset pulse at a little over a thousand ticks.
pub const DEFAULT_POLL_BUDGET: u64 = 4096;

/// Bytes per line in [`format_dump`].
const DUMP_LINE_BYTES: usize = 16;

#[derive(Debug)]
pub struct Session {
    bench: Bench,
    poll_budget: u64,
}

impl Session {
    pub fn new(bench: Bench) -> Self {
        Self {
            bench,
            poll_budget: DEFAULT_POLL_BUDGET,
        }
    }

    pub fn with_poll_budget(mut self, ticks: u64) -> Self {
        self.poll_budget = ticks;
        self
    }

    pub fn bench(&self) -> &Bench {
        &self.bench
    }

    pub fn bench_mut(&mut self) -> &mut Bench {
        &mut self.bench
    }

    pub fn into_bench(self) -> Bench {
        self.bench
    }

    /// Ticks until the engine has picked up the pending command.
    fn wait_for_pickup(&mut self) -> Result<(), Error> {
        for _ in 0..self.poll_budget {
            if self.bench.interface().command() == 0 {
                return Ok(());
            }
            self.bench.tick();
        }

        Err(Error::Stalled(self.poll_budget))
    }

    /// Runs `transaction` to completion.
    ///
    /// Returns the reply byte for transactions that receive one.
    pub fn execute(&mut self, transaction: Transaction) -> Result<Option<u8>, Error> {
        tracing::trace!("Executing {:?}", transaction);

        self.wait_for_pickup()?;
        let interface = self.bench.interface_mut();
        let expects_reply = interface
            .engine()
            .table()
            .frame(transaction.kind)
            .is_some_and(|frame| frame.rx_bits > 0);
        interface.submit(transaction)?;

        self.bench.run_until_idle(self.poll_budget)?;

        let interface = self.bench.interface_mut();
        let status = interface.status();
        if status.read_error() {
            return Err(Error::TargetTimeout(transaction.kind));
        }

        if !expects_reply {
            return Ok(None);
        }
        if !status.reply_ready() {
            return Err(Error::MissingReply(transaction.kind));
        }

        Ok(Some(interface.read_rx_data()))
    }

    fn read(&mut self, transaction: Transaction) -> Result<u8, Error> {
        self.execute(transaction)?
            .ok_or(Error::MissingReply(transaction.kind))
    }

    /// Resets the target with a long clock-low pulse.
    pub fn reset(&mut self) -> Result<(), Error> {
        tracing::debug!("Resetting target");
        self.execute(Transaction::reset()).map(drop)
    }

    pub fn write_address(&mut self, address: u8) -> Result<(), Error> {
        self.execute(Transaction::address_write(address)).map(drop)
    }

    pub fn read_address(&mut self) -> Result<u8, Error> {
        self.read(Transaction::address_read())
    }

    /// Reads the register the target's address register points at.
    pub fn read_data(&mut self) -> Result<u8, Error> {
        self.read(Transaction::data_read())
    }

    pub fn write_data(&mut self, data: u8) -> Result<(), Error> {
        self.execute(Transaction::data_write(data)).map(drop)
    }

    pub fn read_sfr(&mut self, address: u8) -> Result<u8, Error> {
        self.write_address(address)
            .and_then(|()| self.read_data())
            .map_err(|error| Error::sfr(address, error))
    }

    pub fn write_sfr(&mut self, address: u8, value: u8) -> Result<(), Error> {
        self.write_address(address)
            .and_then(|()| self.write_data(value))
            .map_err(|error| Error::sfr(address, error))
    }

    /// Reads `len` consecutive SFRs starting at `start`, wrapping at 0xFF.
    ///
    /// The address write for the next register is queued while the current
    /// read is still running, so the engine never waits on the host between
    /// frames.
    pub fn dump(&mut self, start: u8, len: usize) -> Result<Vec<u8>, Error> {
        let mut data = Vec::with_capacity(len);
        if len == 0 {
            return Ok(data);
        }

        self.wait_for_pickup()?;
        self.bench
            .interface_mut()
            .submit(Transaction::address_write(start))?;

        for offset in 0..len {
            let address = start.wrapping_add(offset as u8);

            self.wait_for_pickup()?;
            self.bench.interface_mut().submit(Transaction::data_read())?;

            self.wait_for_pickup()?;
            if offset + 1 < len {
                self.bench
                    .interface_mut()
                    .submit(Transaction::address_write(address.wrapping_add(1)))?;
            }

            let value = self
                .poll_reply()
                .map_err(|error| Error::sfr(address, error))?;
            data.push(value);
        }

        self.bench.run_until_idle(self.poll_budget)?;
        Ok(data)
    }

    /// Polls STATUS until the running DataRead has a reply or timed out.
    fn poll_reply(&mut self) -> Result<u8, Error> {
        for _ in 0..self.poll_budget {
            let status = self.bench.interface().status();
            if status.reply_ready() {
                return Ok(self.bench.interface_mut().read_rx_data());
            }
            if status.read_error() {
                return Err(Error::TargetTimeout(TransactionKind::DataRead));
            }
            self.bench.tick();
        }

        Err(Error::Stalled(self.poll_budget))
    }

    /// Forces the power gate asserted, or hands it back to the glitch injector.
    pub fn set_power_on(&mut self, on: bool) {
        let interface = self.bench.interface_mut();
        let mut control = interface.power_control();
        control.set_power_on(on);
        interface.write_power_control(control.bits());
    }

    /// Programs and arms the glitch injector.
    ///
    /// The next tick sees the arm bit. Counting from that tick, the gate is
    /// dropped on ticks `offset + 1 ..= offset + length`.
    pub fn arm_glitch(&mut self, offset: u32, length: u8) -> Result<(), Error> {
        let interface = self.bench.interface_mut();
        if !interface.has_glitch() {
            return Err(Error::GlitchUnavailable);
        }

        interface.write_glitch_offset(offset);
        interface.write_glitch_length(length);
        let control = interface.power_control().bits() & PowerControl::POWER_ON;
        interface.write_power_control(control | PowerControl::ARM_GLITCH);
        Ok(())
    }
}

/// Formats a dump as hex lines of 16 bytes, each prefixed with its address.
pub fn format_dump(start: u8, data: &[u8]) -> Vec<String> {
    data.chunks(DUMP_LINE_BYTES)
        .enumerate()
        .map(|(line, bytes)| {
            let address = start.wrapping_add((line * DUMP_LINE_BYTES) as u8);
            let bytes = bytes
                .iter()
                .map(|byte| format!("{byte:02x}"))
                .collect::<Vec<_>>()
                .join(" ");
            format!("{address:02x}: {bytes}")
        })
        .collect()
}

//! The register-level view of the C2 interface.
//!
//! [`C2Interface`] combines the protocol engine, the optional glitch injector
//! and the host-visible registers. The host accesses the registers between
//! ticks; [`C2Interface::tick`] evaluates every state machine from the values
//! of the previous tick and then commits them together.

use crate::config::InterfaceConfig;
use crate::engine::{Engine, EngineState};
use crate::frame::{FrameTable, Transaction};
#[cfg(feature = "glitch")]
use crate::glitch::GlitchInjector;
use crate::status::{PowerControl, Status};
use crate::wire::{LineDriver, Tristate};
use crate::Error;

/// Host-visible registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Csr {
    /// Write-only in practice; reads return the pending command.
    Command,
    Status,
    /// Reading clears the reply-ready flag.
    RxData,
    /// Payload of AddressWrite and DataWrite.
    Address,
    PowerControl,
    GlitchOffset,
    GlitchLength,
    // Debug registers.
    TxLen,
    TxBuf,
    RxLen,
    WaitLen,
}

#[derive(Debug, Clone)]
pub struct C2Interface {
    engine: Engine,
    pins: LineDriver,
    #[cfg(feature = "glitch")]
    glitch: Option<GlitchInjector>,

    command: u8,
    address: u8,
    power_control: PowerControl,
    glitch_offset: u32,
    glitch_length: u8,

    ticks: u64,
}

impl C2Interface {
    pub fn new(config: &InterfaceConfig) -> Result<Self, Error> {
        let table = config.frame_table()?;
        Ok(Self::with_table(table, config.glitch))
    }

    /// An interface built around an already validated frame table.
    pub fn with_table(table: FrameTable, glitch: bool) -> Self {
        #[cfg(not(feature = "glitch"))]
        if glitch {
            tracing::warn!("Glitch injector requested, but support was not compiled in");
        }

        Self {
            engine: Engine::new(table),
            pins: LineDriver::new(),
            #[cfg(feature = "glitch")]
            glitch: glitch.then(GlitchInjector::new),
            command: 0,
            address: 0,
            power_control: PowerControl::default(),
            glitch_offset: 0,
            glitch_length: 0,
            ticks: 0,
        }
    }

    /// Advances every state machine by one sampling tick.
    ///
    /// `data_in` is the level on the data line during this tick.
    pub fn tick(&mut self, data_in: bool) {
        let mut pins = self.pins;
        pins.latch_input(data_in);

        let step = self.engine.next(&pins, self.command, self.address);

        #[cfg(feature = "glitch")]
        let glitch = self.glitch.map(|g| {
            g.next(
                self.power_control.arm_glitch(),
                self.glitch_offset,
                self.glitch_length,
            )
        });

        // Commit.
        self.engine.commit(step.registers);
        self.pins = step.pins;
        if step.consumed {
            self.command = 0;
        }

        #[cfg(feature = "glitch")]
        {
            self.glitch = glitch;
        }
        self.power_control.set_arm_glitch(false);
        self.pins.set_power_gate(self.gate_level());

        self.ticks += 1;
    }

    fn gate_level(&self) -> bool {
        #[cfg(feature = "glitch")]
        let injector = self.glitch.map_or(true, |g| g.gate());
        #[cfg(not(feature = "glitch"))]
        let injector = true;

        self.power_control.power_on() || injector
    }

    /// Writes the COMMAND register.
    ///
    /// Like the hardware register this is a one-deep mailbox: a command that
    /// has not been picked up yet is overwritten. Returns `true` if that
    /// happened.
    pub fn write_command(&mut self, code: u8) -> bool {
        let overwritten = self.command != 0 && code != self.command;
        if overwritten {
            tracing::warn!(
                "Command {:#04x} overwritten by {:#04x} before it was picked up",
                self.command,
                code
            );
        }
        self.command = code;
        overwritten
    }

    /// Queues `transaction`, refusing to overwrite a pending command.
    ///
    /// The engine does not need to be idle: the command waits in the
    /// register until the current frame has finished.
    pub fn submit(&mut self, transaction: Transaction) -> Result<(), Error> {
        if self.command != 0 {
            return Err(Error::Busy {
                pending: self.command,
            });
        }
        if !self.engine.table().supports(transaction.kind) {
            return Err(Error::UnsupportedTransaction(transaction.kind));
        }

        if transaction.kind.carries_payload() {
            self.address = transaction.payload;
        }
        self.command = transaction.kind.code();
        Ok(())
    }

    /// The pending command, zero once the engine has picked it up.
    pub fn command(&self) -> u8 {
        self.command
    }

    pub fn status(&self) -> Status {
        self.engine.status()
    }

    /// Reads RX_DATA, clearing the reply-ready flag.
    pub fn read_rx_data(&mut self) -> u8 {
        self.engine.clear_reply_ready();
        self.engine.rx_data()
    }

    /// Reads RX_DATA without side effects.
    pub fn peek_rx_data(&self) -> u8 {
        self.engine.rx_data()
    }

    pub fn write_address(&mut self, address: u8) {
        self.address = address;
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn write_power_control(&mut self, value: u8) {
        self.power_control = PowerControl::from(value);
        // Seen right away, so the gate does not wait for the next tick.
        self.pins.set_power_gate(self.gate_level());
    }

    pub fn power_control(&self) -> PowerControl {
        self.power_control
    }

    pub fn write_glitch_offset(&mut self, offset: u32) {
        self.glitch_offset = offset;
    }

    pub fn write_glitch_length(&mut self, length: u8) {
        self.glitch_length = length;
    }

    pub fn read(&mut self, csr: Csr) -> u32 {
        let regs = *self.engine.registers();
        match csr {
            Csr::Command => u32::from(self.command),
            Csr::Status => u32::from(self.status().bits()),
            Csr::RxData => u32::from(self.read_rx_data()),
            Csr::Address => u32::from(self.address),
            Csr::PowerControl => u32::from(self.power_control.bits()),
            Csr::GlitchOffset => self.glitch_offset,
            Csr::GlitchLength => u32::from(self.glitch_length),
            Csr::TxLen => u32::from(regs.tx_len),
            Csr::TxBuf => u32::from(regs.tx_buf.value()),
            Csr::RxLen => u32::from(regs.rx_len),
            Csr::WaitLen => u32::from(regs.wait_len),
        }
    }

    /// Writes a register, truncating `value` to its width. Writes to
    /// read-only registers are ignored.
    pub fn write(&mut self, csr: Csr, value: u32) {
        match csr {
            Csr::Command => {
                if value > 0xFF {
                    tracing::warn!(
                        "Command {:#x} does not fit COMMAND, keeping {:#04x}",
                        value,
                        value as u8
                    );
                }
                self.write_command(value as u8);
            }
            Csr::Address => self.write_address(value as u8),
            Csr::PowerControl => self.write_power_control(value as u8),
            Csr::GlitchOffset => self.write_glitch_offset(value),
            Csr::GlitchLength => self.write_glitch_length(value as u8),
            read_only => {
                tracing::warn!("Ignoring write of {:#x} to read-only {:?}", value, read_only);
            }
        }
    }

    pub fn state(&self) -> EngineState {
        self.engine.state()
    }

    pub fn is_idle(&self) -> bool {
        self.engine.is_idle()
    }

    /// A frame is in flight or a command is waiting to be picked up.
    pub fn is_busy(&self) -> bool {
        !self.is_idle() || self.command != 0
    }

    #[cfg(feature = "glitch")]
    pub fn has_glitch(&self) -> bool {
        self.glitch.is_some()
    }

    #[cfg(not(feature = "glitch"))]
    pub fn has_glitch(&self) -> bool {
        false
    }

    #[cfg(feature = "glitch")]
    pub fn glitch(&self) -> Option<&GlitchInjector> {
        self.glitch.as_ref()
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn pins(&self) -> &LineDriver {
        &self.pins
    }

    pub fn clock(&self) -> bool {
        self.pins.clock()
    }

    pub fn data(&self) -> Tristate {
        self.pins.data()
    }

    pub fn power_gate(&self) -> bool {
        self.pins.power_gate()
    }

    /// Ticks since the interface was created.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}

//! The frame table.
//!
//! Every bit-framed transaction kind is described by a [`Frame`]: the framing
//! bits that precede the payload, where the payload byte goes, how many bits
//! are clocked out, how long the target may take to become ready and how many
//! reply bits follow. Frames are shifted out least significant bit first, so
//! the start bit is bit 0 of the frame word.
//!
//! The reset pulse is not bit-framed; the table only records whether it is
//! available and how long its two phases last.

use crate::reset::ResetTiming;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Width of the transmit shift register.
pub const MAX_TX_BITS: u8 = 16;

/// Width of the receive shift register.
pub const MAX_RX_BITS: u8 = 8;

/// Number of wait cycles a DataRead or DataWrite grants the target by default.
pub const DEFAULT_WAIT_CYCLES: u8 = 127;

/// The closed set of exchanges the interface can perform.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum TransactionKind {
    DataRead,
    AddressWrite,
    AddressRead,
    DataWrite,
    Reset,
}

impl TransactionKind {
    pub const ALL: [TransactionKind; 5] = [
        TransactionKind::DataRead,
        TransactionKind::AddressWrite,
        TransactionKind::AddressRead,
        TransactionKind::DataWrite,
        TransactionKind::Reset,
    ];

    /// The value the host writes into the COMMAND register.
    pub fn code(self) -> u8 {
        match self {
            TransactionKind::DataRead => 1,
            TransactionKind::AddressWrite => 2,
            TransactionKind::AddressRead => 3,
            TransactionKind::DataWrite => 4,
            TransactionKind::Reset => 5,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.code() == code)
    }

    /// Whether the ADDRESS register is shifted out as part of the frame.
    pub fn carries_payload(self) -> bool {
        matches!(
            self,
            TransactionKind::AddressWrite | TransactionKind::DataWrite
        )
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransactionKind::DataRead => "data read",
            TransactionKind::AddressWrite => "address write",
            TransactionKind::AddressRead => "address read",
            TransactionKind::DataWrite => "data write",
            TransactionKind::Reset => "reset",
        };
        f.write_str(name)
    }
}

/// A request for one protocol exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transaction {
    pub kind: TransactionKind,
    /// Address or data byte for the kinds that carry one, ignored otherwise.
    pub payload: u8,
}

impl Transaction {
    pub fn new(kind: TransactionKind, payload: u8) -> Self {
        Self { kind, payload }
    }

    pub fn data_read() -> Self {
        Self::new(TransactionKind::DataRead, 0)
    }

    pub fn address_write(address: u8) -> Self {
        Self::new(TransactionKind::AddressWrite, address)
    }

    pub fn address_read() -> Self {
        Self::new(TransactionKind::AddressRead, 0)
    }

    pub fn data_write(data: u8) -> Self {
        Self::new(TransactionKind::DataWrite, data)
    }

    pub fn reset() -> Self {
        Self::new(TransactionKind::Reset, 0)
    }
}

/// Layout of one bit-framed transaction kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    pub kind: TransactionKind,
    /// Start, command and length bits.
    pub header: u16,
    /// Bit position of the payload byte, for kinds that carry one.
    #[serde(default)]
    pub payload_offset: Option<u8>,
    pub tx_bits: u8,
    /// Wait cycles granted to the target after the last transmitted bit.
    /// Zero skips the wait phase.
    #[serde(default)]
    pub wait_cycles: u8,
    #[serde(default)]
    pub rx_bits: u8,
}

impl Frame {
    /// start=1, cmd=00, len=00
    pub const DATA_READ: Frame = Frame {
        kind: TransactionKind::DataRead,
        header: 0b0_0001,
        payload_offset: None,
        tx_bits: 5,
        wait_cycles: DEFAULT_WAIT_CYCLES,
        rx_bits: 8,
    };

    /// start=1, cmd=11, addr[7:0]
    pub const ADDRESS_WRITE: Frame = Frame {
        kind: TransactionKind::AddressWrite,
        header: 0b111,
        payload_offset: Some(3),
        tx_bits: 11,
        wait_cycles: 0,
        rx_bits: 0,
    };

    /// start=1, cmd=01
    pub const ADDRESS_READ: Frame = Frame {
        kind: TransactionKind::AddressRead,
        header: 0b101,
        payload_offset: None,
        tx_bits: 3,
        wait_cycles: 0,
        rx_bits: 8,
    };

    /// start=1, cmd=10, len=00, data[7:0]
    pub const DATA_WRITE: Frame = Frame {
        kind: TransactionKind::DataWrite,
        header: 0b0_0011,
        payload_offset: Some(5),
        tx_bits: 13,
        wait_cycles: DEFAULT_WAIT_CYCLES,
        rx_bits: 0,
    };

    /// The frame word for `payload`, least significant bit first on the wire.
    pub fn encode(&self, payload: u8) -> u16 {
        match self.payload_offset {
            Some(offset) => self.header | (u16::from(payload) << offset),
            None => self.header,
        }
    }

    pub fn validate(&self) -> Result<(), FrameTableError> {
        let kind = self.kind;

        if kind == TransactionKind::Reset {
            return Err(FrameTableError::ResetIsNotFramed);
        }
        if self.tx_bits == 0 || self.tx_bits > MAX_TX_BITS {
            return Err(FrameTableError::TxBitCount {
                kind,
                tx_bits: self.tx_bits,
            });
        }
        if u32::from(self.header) >> self.tx_bits != 0 {
            return Err(FrameTableError::PatternTooWide {
                kind,
                tx_bits: self.tx_bits,
            });
        }
        if self.rx_bits > MAX_RX_BITS {
            return Err(FrameTableError::ReplyTooLong {
                kind,
                rx_bits: self.rx_bits,
            });
        }

        match (kind.carries_payload(), self.payload_offset) {
            (true, None) => Err(FrameTableError::MissingPayload(kind)),
            (false, Some(_)) => Err(FrameTableError::UnexpectedPayload(kind)),
            (true, Some(offset)) => {
                // The payload occupies the topmost eight bits of the frame.
                if u32::from(offset) + 8 != u32::from(self.tx_bits) {
                    return Err(FrameTableError::PayloadMisaligned {
                        kind,
                        offset,
                        tx_bits: self.tx_bits,
                    });
                }
                if u32::from(self.header) >> offset != 0 {
                    return Err(FrameTableError::PatternTooWide {
                        kind,
                        tx_bits: offset,
                    });
                }
                Ok(())
            }
            (false, None) => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameTableError {
    #[error("The pattern of {kind} does not fit in {tx_bits} bits")]
    PatternTooWide { kind: TransactionKind, tx_bits: u8 },
    #[error("{kind} sends {tx_bits} bits, the transmit register holds 1 to 16")]
    TxBitCount { kind: TransactionKind, tx_bits: u8 },
    #[error("{kind} expects {rx_bits} reply bits, the receive register holds 8")]
    ReplyTooLong { kind: TransactionKind, rx_bits: u8 },
    #[error("The payload of {kind} starts at bit {offset} but the frame is {tx_bits} bits long")]
    PayloadMisaligned {
        kind: TransactionKind,
        offset: u8,
        tx_bits: u8,
    },
    #[error("{0} carries a payload but the frame has no room for it")]
    MissingPayload(TransactionKind),
    #[error("{0} does not carry a payload")]
    UnexpectedPayload(TransactionKind),
    #[error("{0} is listed more than once")]
    Duplicate(TransactionKind),
    #[error("The reset pulse is not bit-framed")]
    ResetIsNotFramed,
    #[error("Both phases of the reset pulse must last at least one cycle")]
    EmptyResetPulse,
}

/// What the engine does when it picks up a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Frame(Frame),
    Reset(ResetTiming),
}

/// The set of transaction kinds an interface is built with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameTable {
    frames: Vec<Frame>,
    #[serde(default)]
    reset: Option<ResetTiming>,
}

impl FrameTable {
    pub fn new(frames: Vec<Frame>, reset: Option<ResetTiming>) -> Result<Self, FrameTableError> {
        let table = Self { frames, reset };
        table.validate()?;
        Ok(table)
    }

    /// DataRead and AddressWrite only.
    pub fn minimal() -> Self {
        Self {
            frames: vec![Frame::DATA_READ, Frame::ADDRESS_WRITE],
            reset: None,
        }
    }

    /// All five transaction kinds.
    pub fn full() -> Self {
        Self {
            frames: vec![
                Frame::DATA_READ,
                Frame::ADDRESS_WRITE,
                Frame::ADDRESS_READ,
                Frame::DATA_WRITE,
            ],
            reset: Some(ResetTiming::default()),
        }
    }

    pub fn validate(&self) -> Result<(), FrameTableError> {
        for (i, frame) in self.frames.iter().enumerate() {
            frame.validate()?;

            if self.frames[..i].iter().any(|f| f.kind == frame.kind) {
                return Err(FrameTableError::Duplicate(frame.kind));
            }
        }

        if let Some(reset) = self.reset {
            if reset.low_cycles == 0 || reset.high_cycles == 0 {
                return Err(FrameTableError::EmptyResetPulse);
            }
        }

        Ok(())
    }

    /// Replaces the wait budget of every frame that has a wait phase.
    pub fn with_wait_cycles(mut self, wait_cycles: u8) -> Self {
        for frame in self.frames.iter_mut().filter(|f| f.wait_cycles != 0) {
            frame.wait_cycles = wait_cycles;
        }
        self
    }

    pub fn with_reset(mut self, reset: Option<ResetTiming>) -> Self {
        self.reset = reset;
        self
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn frame(&self, kind: TransactionKind) -> Option<&Frame> {
        self.frames.iter().find(|f| f.kind == kind)
    }

    pub fn reset(&self) -> Option<ResetTiming> {
        self.reset
    }

    pub fn dispatch(&self, kind: TransactionKind) -> Option<Dispatch> {
        match kind {
            TransactionKind::Reset => self.reset.map(Dispatch::Reset),
            kind => self.frame(kind).copied().map(Dispatch::Frame),
        }
    }

    pub fn supports(&self, kind: TransactionKind) -> bool {
        self.dispatch(kind).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test_case(Frame::DATA_READ; "data read")]
    #[test_case(Frame::ADDRESS_WRITE; "address write")]
    #[test_case(Frame::ADDRESS_READ; "address read")]
    #[test_case(Frame::DATA_WRITE; "data write")]
    fn builtin_frames_are_valid(frame: Frame) {
        assert_eq!(frame.validate(), Ok(()));
    }

    #[test]
    fn builtin_tables_are_valid() {
        assert_eq!(FrameTable::minimal().validate(), Ok(()));
        assert_eq!(FrameTable::full().validate(), Ok(()));
    }

    #[test_case(TransactionKind::DataRead, 1)]
    #[test_case(TransactionKind::AddressWrite, 2)]
    #[test_case(TransactionKind::AddressRead, 3)]
    #[test_case(TransactionKind::DataWrite, 4)]
    #[test_case(TransactionKind::Reset, 5)]
    fn command_codes(kind: TransactionKind, code: u8) {
        assert_eq!(kind.code(), code);
        assert_eq!(TransactionKind::from_code(code), Some(kind));
    }

    #[test]
    fn unknown_command_codes() {
        assert_eq!(TransactionKind::from_code(0), None);
        assert_eq!(TransactionKind::from_code(6), None);
        assert_eq!(TransactionKind::from_code(0xFF), None);
    }

    #[test]
    fn address_write_places_address_after_header() {
        assert_eq!(Frame::ADDRESS_WRITE.encode(0xAB), (0xAB << 3) | 0b111);
        assert_eq!(Frame::DATA_WRITE.encode(0x5A), (0x5A << 5) | 0b11);
        assert_eq!(Frame::DATA_READ.encode(0xFF), 0b1);
    }

    #[test]
    fn pattern_wider_than_bit_count() {
        let frame = Frame {
            tx_bits: 2,
            ..Frame::ADDRESS_READ
        };

        assert_eq!(
            frame.validate(),
            Err(FrameTableError::PatternTooWide {
                kind: TransactionKind::AddressRead,
                tx_bits: 2
            })
        );
    }

    #[test]
    fn payload_must_end_at_bit_count() {
        let frame = Frame {
            tx_bits: 12,
            ..Frame::ADDRESS_WRITE
        };

        assert_eq!(
            frame.validate(),
            Err(FrameTableError::PayloadMisaligned {
                kind: TransactionKind::AddressWrite,
                offset: 3,
                tx_bits: 12
            })
        );
    }

    #[test]
    fn header_overlapping_payload() {
        let frame = Frame {
            header: 0b1111,
            ..Frame::ADDRESS_WRITE
        };

        assert!(matches!(
            frame.validate(),
            Err(FrameTableError::PatternTooWide { .. })
        ));
    }

    #[test]
    fn payload_presence_follows_kind() {
        let frame = Frame {
            payload_offset: None,
            tx_bits: 3,
            ..Frame::ADDRESS_WRITE
        };
        assert_eq!(
            frame.validate(),
            Err(FrameTableError::MissingPayload(TransactionKind::AddressWrite))
        );

        let frame = Frame {
            payload_offset: Some(0),
            ..Frame::DATA_READ
        };
        assert_eq!(
            frame.validate(),
            Err(FrameTableError::UnexpectedPayload(TransactionKind::DataRead))
        );
    }

    #[test]
    fn duplicate_and_reset_entries() {
        assert_eq!(
            FrameTable::new(vec![Frame::DATA_READ, Frame::DATA_READ], None),
            Err(FrameTableError::Duplicate(TransactionKind::DataRead))
        );

        let reset = Frame {
            kind: TransactionKind::Reset,
            ..Frame::ADDRESS_READ
        };
        assert_eq!(
            FrameTable::new(vec![reset], None),
            Err(FrameTableError::ResetIsNotFramed)
        );

        let empty = ResetTiming {
            low_cycles: 0,
            high_cycles: 96,
        };
        assert_eq!(
            FrameTable::new(vec![], Some(empty)),
            Err(FrameTableError::EmptyResetPulse)
        );
    }

    #[test]
    fn minimal_table_dispatch() {
        let table = FrameTable::minimal();

        assert!(table.supports(TransactionKind::DataRead));
        assert!(table.supports(TransactionKind::AddressWrite));
        assert!(!table.supports(TransactionKind::AddressRead));
        assert!(!table.supports(TransactionKind::DataWrite));
        assert!(!table.supports(TransactionKind::Reset));
    }

    #[test]
    fn wait_budget_override_skips_frames_without_wait() {
        let table = FrameTable::full().with_wait_cycles(40);

        assert_eq!(table.frame(TransactionKind::DataRead).map(|f| f.wait_cycles), Some(40));
        assert_eq!(table.frame(TransactionKind::DataWrite).map(|f| f.wait_cycles), Some(40));
        assert_eq!(table.frame(TransactionKind::AddressWrite).map(|f| f.wait_cycles), Some(0));
        assert_eq!(table.frame(TransactionKind::AddressRead).map(|f| f.wait_cycles), Some(0));
    }

    #[test]
    fn full_table_dispatches_reset_pulse() {
        assert_eq!(
            FrameTable::full().dispatch(TransactionKind::Reset),
            Some(Dispatch::Reset(ResetTiming::default()))
        );
    }
}

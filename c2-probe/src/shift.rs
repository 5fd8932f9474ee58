//! Shift registers for the transmit and receive sides of a frame.

/// Outgoing frame bits, shifted out least significant bit first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TxShifter(u16);

impl TxShifter {
    pub fn new(frame: u16) -> Self {
        Self(frame)
    }

    /// Removes and returns the next bit to put on the wire.
    pub fn shift_out(&mut self) -> bool {
        let bit = self.0 & 1 != 0;
        self.0 >>= 1;
        bit
    }

    /// The bits that have not been sent yet.
    pub fn value(self) -> u16 {
        self.0
    }
}

/// Incoming reply bits.
///
/// Each new bit enters at the top and the register shifts right, so after
/// eight bits the first one received sits in bit 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShiftRegister(u8);

impl ShiftRegister {
    pub fn shift_in_lsb_first(&mut self, bit: bool) {
        self.0 = (self.0 >> 1) | (u8::from(bit) << 7);
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

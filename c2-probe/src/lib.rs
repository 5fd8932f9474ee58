//! # Host engine for the two-wire C2 debug interface
//!
//! A cycle-accurate model of the host side of C2: a clock line, a shared
//! bidirectional data line, and an optional power gate for fault injection.
//! Every state machine advances once per sampling tick, and the host talks to
//! it through a small register file.
//!
//! # Examples
//!
//! ## Reading a special function register
//!
//! ```
//! # use c2_probe::Error;
//! use c2_probe::{Bench, InterfaceConfig, Session, TargetConfig};
//!
//! // Wire an interface to an emulated target.
//! let bench = Bench::from_config(&InterfaceConfig::full(), TargetConfig::default())?;
//! let mut session = Session::new(bench);
//!
//! session.bench_mut().target_mut().write_sfr(0x80, 0x42);
//!
//! assert_eq!(session.read_sfr(0x80)?, 0x42);
//! # Ok::<(), Error>(())
//! ```
//!
//! ## Driving the registers directly
//!
//! ```
//! # use c2_probe::Error;
//! use c2_probe::{C2Interface, InterfaceConfig, Transaction};
//!
//! let mut interface = C2Interface::new(&InterfaceConfig::minimal())?;
//! interface.submit(Transaction::address_write(0xB4))?;
//!
//! // An address write needs no answer, so it completes without a target.
//! while interface.is_busy() {
//!     interface.tick(false);
//! }
//! # Ok::<(), Error>(())
//! ```
//!
//! The crate is built around the [`C2Interface`] register file, the
//! [`TargetEmulator`] on the other end of the wire, and the [`Bench`] and
//! [`Session`] that connect them.

pub mod bench;
pub mod config;
pub mod engine;
mod error;
pub mod frame;
#[cfg(feature = "glitch")]
pub mod glitch;
pub mod interface;
pub mod reset;
pub mod session;
pub mod shift;
pub mod status;
pub mod target;
pub mod wire;

pub use crate::bench::{Bench, LineSample};
pub use crate::config::{InterfaceConfig, Profile, TargetConfig};
pub use crate::engine::EngineState;
pub use crate::error::Error;
pub use crate::frame::{Frame, FrameTable, FrameTableError, Transaction, TransactionKind};
pub use crate::interface::{C2Interface, Csr};
pub use crate::reset::ResetTiming;
pub use crate::session::Session;
pub use crate::status::{PowerControl, Status};
pub use crate::target::TargetEmulator;
pub use crate::wire::{Pull, Tristate};

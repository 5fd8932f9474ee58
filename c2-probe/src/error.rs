use crate::frame::{FrameTableError, TransactionKind};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("The interface is busy, command {pending:#04x} has not been picked up yet")]
    Busy { pending: u8 },
    #[error("The active profile has no frame for {0}")]
    UnsupportedTransaction(TransactionKind),
    #[error("The target did not signal readiness during {0}")]
    TargetTimeout(TransactionKind),
    #[error("The target completed {0} without a reply")]
    MissingReply(TransactionKind),
    #[error("Accessing SFR {address:#04x} failed")]
    Sfr {
        address: u8,
        #[source]
        source: Box<Error>,
    },
    #[error("The engine did not return to idle within {0} ticks")]
    Stalled(u64),
    #[error("The glitch injector is not part of this interface")]
    GlitchUnavailable,
    #[error("Invalid frame table")]
    FrameTable(#[from] FrameTableError),
    #[error("Unable to read the configuration")]
    Io(#[from] std::io::Error),
    #[error("Unable to parse the configuration")]
    Yaml(#[from] serde_yaml::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub(crate) fn sfr(address: u8, source: Error) -> Self {
        Self::Sfr {
            address,
            source: Box::new(source),
        }
    }
}

use thiserror::Error;

use crate::bus::{BusError, SubscriptionClosed};

pub type Result<T> = std::result::Result<T, Error>;

/// Crate-wide error.
///
/// Three variants are control-flow conditions rather than failures and are part
/// of the contract of the operations that return them:
/// [`Error::SubscriptionClosed`] ends a receive cleanly, [`Error::SessionExit`]
/// unwinds the session loop to its top level, and [`Error::Interrupted`] is
/// returned by [`crate::interrupt::run_until_interrupt`] when the remote side
/// interrupted the work.
///
/// Command, tokenizer and config failures are reported to the user through the
/// stream where they happen and never surface here.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Bus(#[from] BusError),
    #[error("Subscription closed")]
    SubscriptionClosed,
    #[error("Session exit requested")]
    SessionExit,
    #[error("Interrupted")]
    Interrupted,
    #[error("Engine error: {0}")]
    Engine(String),
}

impl From<SubscriptionClosed> for Error {
    fn from(_: SubscriptionClosed) -> Self {
        Error::SubscriptionClosed
    }
}

pub mod cli;
pub mod commands;
pub mod error;
pub mod terminal;

pub use switchboard_core::{bus, config, session, stream, utils};

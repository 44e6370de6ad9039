//! In-process event bus with request/response correlation, and the
//! interactive session built on top of it.

pub mod bus;
pub mod commands;
pub mod config;
pub mod engine;
pub mod error;
pub mod interrupt;
pub mod session;
pub mod stream;
pub mod test_utils;
pub mod tokenizer;
pub mod utils;

pub use error::{Error, Result};

//! Core types shared by every layer

mod error;
mod output;

pub use error::{BridgeError, BridgeResult};
pub use output::OutputChunk;

//! Chat turn runtime plumbing
//!
//! Chat turns run as separate tokio tasks and communicate with the HTTP
//! response through the output channel defined here.

pub mod channels;

pub use channels::{create_output_channel, OutputReceiver, OutputSender};

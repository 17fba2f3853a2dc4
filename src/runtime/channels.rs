//! Channel type definitions for chat output
//!
//! A chat turn runs in its own task and writes `OutputChunk`s into a bounded
//! mpsc channel. The HTTP layer drains the receiver into the response body, so
//! a slow client slows the producer down instead of growing a buffer.

use tokio::sync::mpsc;

use crate::core::OutputChunk;

/// Default buffer size for the output channel
pub const OUTPUT_CHANNEL_SIZE: usize = 256;

/// Sender half of the output channel (used by the chat turn)
pub type OutputSender = mpsc::Sender<OutputChunk>;

/// Receiver half of the output channel (used by the response body)
pub type OutputReceiver = mpsc::Receiver<OutputChunk>;

/// Create a new output channel pair
pub fn create_output_channel() -> (OutputSender, OutputReceiver) {
    mpsc::channel(OUTPUT_CHANNEL_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_output_multiple_messages() {
        let (tx, mut rx) = create_output_channel();

        tx.send(OutputChunk::TextDelta("One".into())).await.unwrap();
        tx.send(OutputChunk::TextDelta("Two".into())).await.unwrap();
        tx.send(OutputChunk::FollowUpFailed).await.unwrap();

        let c1 = rx.recv().await.unwrap();
        let c2 = rx.recv().await.unwrap();
        let c3 = rx.recv().await.unwrap();

        assert!(matches!(c1, OutputChunk::TextDelta(s) if s == "One"));
        assert!(matches!(c2, OutputChunk::TextDelta(s) if s == "Two"));
        assert!(matches!(c3, OutputChunk::FollowUpFailed));
    }

    #[tokio::test]
    async fn test_output_channel_close() {
        let (tx, mut rx) = create_output_channel();

        // Dropping the sender ends the response body
        drop(tx);

        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_send_after_receiver_dropped() {
        let (tx, rx) = create_output_channel();
        drop(rx);

        // A disconnected client shows up as a send error
        let result = tx.send(OutputChunk::TextDelta("Nobody listening".into())).await;
        assert!(result.is_err());
    }
}

//! Async progress event delivery
//!
//! Pipelines post progress through the synchronous single-slot listener in
//! `audiokit-core`. This module bridges that slot to an async channel so
//! callers in async code can consume progress as a stream. Subscribing
//! installs a new listener into the slot, replacing any previous one;
//! dropping the receiver makes subsequent posts no-ops.

use audiokit_core::{ProgressSlot, ProgressUpdate};
use tokio::sync::mpsc;
use tracing::debug;

/// Install a channel-backed listener on `slot` and return its receiver.
pub fn subscribe(slot: &ProgressSlot) -> mpsc::UnboundedReceiver<ProgressUpdate> {
    let (tx, rx) = mpsc::unbounded_channel();
    slot.attach(move |update: ProgressUpdate| {
        // Receiver may already be gone; the slot stays attached but posts
        // are dropped, matching detached behavior.
        let _ = tx.send(update);
    });
    debug!("progress subscriber attached");
    rx
}

#[cfg(test)]
mod tests {
    use super::*;
    use audiokit_core::Operation;

    #[tokio::test]
    async fn test_posts_arrive_in_order() {
        let slot = ProgressSlot::new();
        let mut rx = subscribe(&slot);

        slot.post(Operation::Convert, 0.25);
        slot.post(Operation::Convert, 0.5);
        slot.complete(Operation::Convert);

        assert_eq!(rx.recv().await.unwrap().progress, 0.25);
        assert_eq!(rx.recv().await.unwrap().progress, 0.5);
        assert_eq!(rx.recv().await.unwrap().progress, 1.0);
    }

    #[tokio::test]
    async fn test_new_subscription_replaces_previous() {
        let slot = ProgressSlot::new();
        let mut first = subscribe(&slot);
        let mut second = subscribe(&slot);

        slot.post(Operation::Extract, 0.75);

        assert_eq!(second.recv().await.unwrap().progress, 0.75);
        assert!(first.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_dropped_receiver_does_not_break_posting() {
        let slot = ProgressSlot::new();
        let rx = subscribe(&slot);
        drop(rx);
        // Must not panic or error.
        slot.post(Operation::Trim, 0.5);
    }
}

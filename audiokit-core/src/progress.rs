//! Progress reporting for long-running operations
//!
//! Progress is a fire-and-forget side channel: pipelines post fractional
//! values into a single shared listener slot. Only the most recently attached
//! listener receives updates; posting with no listener attached is a silent
//! no-op. There is no queue, no back-pressure, and no replay for late
//! listeners - the channel is deliberately lossy.

use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use tracing::trace;

/// Which operation a progress value belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// Full-file conversion
    Convert,
    /// Time-window trim (either mode)
    Trim,
    /// Waveform extraction
    Extract,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Operation::Convert => "convert",
            Operation::Trim => "trim",
            Operation::Extract => "extract",
        };
        f.write_str(name)
    }
}

/// A single progress report.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProgressUpdate {
    /// Operation the value belongs to
    pub operation: Operation,
    /// Fraction complete in [0.0, 1.0]
    pub progress: f64,
}

/// Callback invoked for each posted update.
pub type ProgressListener = Box<dyn Fn(ProgressUpdate) + Send + Sync>;

/// Single-slot progress channel with last-listener-wins semantics.
///
/// Cloning shares the slot: a pipeline holds one clone and posts into it
/// while the caller-facing surface attaches or detaches the listener.
#[derive(Clone, Default)]
pub struct ProgressSlot {
    listener: Arc<RwLock<Option<ProgressListener>>>,
}

impl ProgressSlot {
    /// Create an empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a listener, replacing any previously attached one.
    pub fn attach<F>(&self, listener: F)
    where
        F: Fn(ProgressUpdate) + Send + Sync + 'static,
    {
        *self.listener.write() = Some(Box::new(listener));
    }

    /// Detach the current listener. Subsequent posts become no-ops.
    pub fn detach(&self) {
        *self.listener.write() = None;
    }

    /// Whether a listener is currently attached.
    pub fn is_attached(&self) -> bool {
        self.listener.read().is_some()
    }

    /// Post a progress value, clamped to [0.0, 1.0].
    ///
    /// Silent no-op when no listener is attached.
    pub fn post(&self, operation: Operation, progress: f64) {
        let progress = progress.clamp(0.0, 1.0);
        trace!(%operation, progress, "progress update");
        if let Some(listener) = self.listener.read().as_ref() {
            listener(ProgressUpdate {
                operation,
                progress,
            });
        }
    }

    /// Post the terminal value for a successfully completed operation.
    ///
    /// Exactly 1.0 is always emitted once at successful completion, even when
    /// no intermediate progress was observed.
    pub fn complete(&self, operation: Operation) {
        self.post(operation, 1.0);
    }
}

impl std::fmt::Debug for ProgressSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressSlot")
            .field("attached", &self.is_attached())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn recording_slot() -> (ProgressSlot, Arc<Mutex<Vec<ProgressUpdate>>>) {
        let slot = ProgressSlot::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        slot.attach(move |update| sink.lock().push(update));
        (slot, seen)
    }

    #[test]
    fn test_post_reaches_listener_clamped() {
        let (slot, seen) = recording_slot();
        slot.post(Operation::Convert, 0.5);
        slot.post(Operation::Convert, 1.7);
        slot.post(Operation::Convert, -0.2);

        let seen = seen.lock();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0].progress, 0.5);
        assert_eq!(seen[1].progress, 1.0);
        assert_eq!(seen[2].progress, 0.0);
    }

    #[test]
    fn test_post_without_listener_is_noop() {
        let slot = ProgressSlot::new();
        // Must not panic or block.
        slot.post(Operation::Extract, 0.3);
        assert!(!slot.is_attached());
    }

    #[test]
    fn test_last_listener_wins() {
        let slot = ProgressSlot::new();
        let first = Arc::new(Mutex::new(0usize));
        let second = Arc::new(Mutex::new(0usize));

        let sink = Arc::clone(&first);
        slot.attach(move |_| *sink.lock() += 1);
        let sink = Arc::clone(&second);
        slot.attach(move |_| *sink.lock() += 1);

        slot.post(Operation::Trim, 0.1);
        assert_eq!(*first.lock(), 0);
        assert_eq!(*second.lock(), 1);
    }

    #[test]
    fn test_detach_clears_slot() {
        let (slot, seen) = recording_slot();
        slot.detach();
        slot.post(Operation::Trim, 0.9);
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn test_complete_posts_exactly_one() {
        let (slot, seen) = recording_slot();
        slot.complete(Operation::Extract);
        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].progress, 1.0);
        assert_eq!(seen[0].operation, Operation::Extract);
    }

    #[test]
    fn test_operation_serializes_lowercase() {
        let update = ProgressUpdate {
            operation: Operation::Convert,
            progress: 0.25,
        };
        let json = serde_json::to_string(&update).unwrap();
        assert_eq!(json, r#"{"operation":"convert","progress":0.25}"#);
    }
}

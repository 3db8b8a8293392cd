//! # audiokit-core
//!
//! Shared building blocks for the audiokit workspace: the error taxonomy used
//! by every operation, and the single-slot progress reporting channel that the
//! pipelines post to while they run.

#![warn(clippy::all)]

pub mod error;
pub mod progress;

pub use error::{AudioKitError, AudioKitResult, ErrorCategory, PipelineStage};
pub use progress::{Operation, ProgressListener, ProgressSlot, ProgressUpdate};

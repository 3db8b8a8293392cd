//! Decoder and encoder stage contracts
//!
//! Both codec stages follow the same queue discipline: feed input samples in,
//! poll output samples out, with an explicit end-of-stream marker fed through
//! the stage rather than inferred. A dequeue attempt that has nothing ready
//! reports [`DequeueOutput::TryAgain`]; the caller returns to the top of its
//! loop instead of blocking. Every dequeue is bounded by the caller's poll
//! timeout - backends must not block past it.

use crate::sample::{Sample, TrackFormat};
use audiokit_core::AudioKitResult;
use std::time::Duration;

/// Result of one bounded dequeue attempt against a codec stage.
#[derive(Debug)]
pub enum DequeueOutput {
    /// A ready output sample. When its end-of-stream flag is set the stage
    /// has flushed completely and will produce nothing further.
    Sample(Sample),
    /// The stage's final output format is known. Emitted exactly once, before
    /// the first output sample, by stages that negotiate their format.
    FormatReady(TrackFormat),
    /// Nothing ready within the poll timeout; not an error.
    TryAgain,
}

/// Common feed/drain contract shared by decoders and encoders.
pub trait CodecStage: Send {
    /// Whether the stage can accept another input sample right now.
    fn has_input_slot(&self) -> bool;

    /// Queue one input sample. Ownership of the payload transfers to the
    /// stage. Must only be called when [`CodecStage::has_input_slot`] is true.
    fn queue_input(&mut self, sample: Sample) -> AudioKitResult<()>;

    /// Signal that no further input will arrive. The stage flushes any
    /// buffered data and eventually emits an end-of-stream output sample.
    fn signal_end_of_stream(&mut self) -> AudioKitResult<()>;

    /// Attempt to dequeue one output, waiting at most `timeout`.
    fn dequeue_output(&mut self, timeout: Duration) -> AudioKitResult<DequeueOutput>;
}

/// A stage that consumes encoded samples and produces raw s16le PCM.
pub trait AudioDecoder: CodecStage {
    /// PCM format the decoder normalizes to (native sample rate/channels).
    fn output_format(&self) -> TrackFormat;
}

/// A stage that consumes raw s16le PCM and produces encoded samples.
pub trait AudioEncoder: CodecStage {
    /// Largest input payload the encoder accepts per queue call, in bytes.
    fn input_capacity(&self) -> usize {
        usize::MAX
    }
}

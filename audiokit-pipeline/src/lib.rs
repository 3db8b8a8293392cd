//! # audiokit-pipeline
//!
//! The toolkit's processing pipelines: the pull-based transcode loop, the two
//! trim modes (re-encode and lossless copy), and waveform extraction. Each
//! pipeline owns boxed stage implementations from `audiokit-media` and posts
//! progress through the single-slot channel in `audiokit-core`.

#![warn(clippy::all)]

pub mod state;
pub mod transcode;
pub mod trim;
pub mod waveform;

pub use state::{PipelineStats, StageState};
pub use transcode::{TimeWindow, TranscodePipeline, DEFAULT_POLL_TIMEOUT};
pub use trim::{trim_lossless, trim_transcoding, TrimRange};
pub use waveform::{Waveform, WaveformExtractor};

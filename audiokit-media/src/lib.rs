//! # audiokit-media
//!
//! Media layer for the audiokit workspace: container demuxing and probing,
//! audio decoding to interleaved s16le PCM, encoding to AAC/MP3/PCM, and
//! sinks that mux encoded samples into output files.
//!
//! The decode path is built on symphonia and works for every input format the
//! toolkit accepts. Encoders for compressed outputs are feature gated (`aac`,
//! `mp3`, both on by default); the PCM encoder and WAV sink are always
//! available.

#![warn(clippy::all)]

pub mod codec;
pub mod decode;
pub mod encode;
pub mod format;
pub mod probe;
pub mod sample;
pub mod sink;
pub mod source;

pub use codec::{AudioDecoder, AudioEncoder, CodecStage, DequeueOutput};
pub use decode::{SymphoniaDecoder, RAW_PCM_MIME};
pub use encode::PcmEncoder;
#[cfg(feature = "aac")]
pub use encode::{AacEncoder, AacTransport};
#[cfg(feature = "mp3")]
pub use encode::LameEncoder;
pub use format::{
    extension_supported, format_diagnostics, supported_for_lossless_trimming,
    supported_for_trimming, OutputFormat,
};
pub use probe::{inspect, is_format_supported, AudioInfo};
pub use sample::{Sample, SampleFlags, TrackFormat};
pub use sink::{ensure_parent_dir, MediaSink, Mp4Sink, StreamSink, WavSink};
pub use source::{MediaSource, SymphoniaSource, TrackInfo};

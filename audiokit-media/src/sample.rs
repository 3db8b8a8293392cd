//! Sample and track format types
//!
//! A [`Sample`] is the unit of exchange between pipeline stages: an owned
//! byte payload (encoded or raw PCM) with a presentation timestamp and a
//! small flag set. Ownership transfers whole on every hand-off; stages never
//! alias each other's buffers.

use serde::Serialize;

/// Flags carried by a sample through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SampleFlags {
    /// No further data follows this sample
    pub end_of_stream: bool,
    /// Decoding may begin at this sample without prior context
    pub sync: bool,
}

impl SampleFlags {
    /// Flags for an ordinary mid-stream sample.
    pub fn none() -> Self {
        Self::default()
    }

    /// Flags for a sync point / key frame.
    pub fn sync() -> Self {
        Self {
            end_of_stream: false,
            sync: true,
        }
    }

    /// Flags for an end-of-stream marker.
    pub fn end_of_stream() -> Self {
        Self {
            end_of_stream: true,
            sync: false,
        }
    }
}

/// One encoded or raw audio sample with its presentation timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    /// Payload bytes. May be empty for a pure end-of-stream marker.
    pub data: Vec<u8>,
    /// Presentation timestamp in microseconds, non-decreasing within a track.
    pub pts_us: u64,
    /// Stream flags
    pub flags: SampleFlags,
}

impl Sample {
    /// Create a mid-stream sample.
    pub fn new(data: Vec<u8>, pts_us: u64) -> Self {
        Self {
            data,
            pts_us,
            flags: SampleFlags::none(),
        }
    }

    /// Create a sample marked as a sync point.
    pub fn sync(data: Vec<u8>, pts_us: u64) -> Self {
        Self {
            data,
            pts_us,
            flags: SampleFlags::sync(),
        }
    }

    /// Create an empty end-of-stream marker.
    pub fn end_of_stream(pts_us: u64) -> Self {
        Self {
            data: Vec::new(),
            pts_us,
            flags: SampleFlags::end_of_stream(),
        }
    }

    /// Whether this sample carries the end-of-stream flag.
    pub fn is_end_of_stream(&self) -> bool {
        self.flags.end_of_stream
    }

    /// Payload size in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Rebase the timestamp against an origin, saturating at zero.
    pub fn rebased(mut self, origin_us: u64) -> Self {
        self.pts_us = self.pts_us.saturating_sub(origin_us);
        self
    }
}

/// Immutable descriptor of one audio track.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackFormat {
    /// MIME / codec identifier, e.g. `audio/mpeg`
    pub mime: String,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Bit rate in bits per second; estimated from file size and duration
    /// when the container does not declare one
    pub bit_rate: u32,
    /// Track duration in microseconds (0 when unknown)
    pub duration_us: u64,
}

impl TrackFormat {
    /// Track duration in whole milliseconds.
    pub fn duration_ms(&self) -> u64 {
        self.duration_us / 1_000
    }

    /// Estimate the bit rate from the file size when the container did not
    /// declare one: `(file_size * 8) / duration_seconds`.
    pub fn estimate_bit_rate(file_size: u64, duration_us: u64) -> u32 {
        if duration_us == 0 {
            return 0;
        }
        let duration_secs = duration_us as f64 / 1_000_000.0;
        ((file_size * 8) as f64 / duration_secs) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_end_of_stream_marker_is_empty() {
        let eos = Sample::end_of_stream(42);
        assert!(eos.is_end_of_stream());
        assert!(eos.is_empty());
        assert_eq!(eos.pts_us, 42);
    }

    #[test]
    fn test_rebase_saturates_at_zero() {
        let sample = Sample::new(vec![1, 2, 3], 1_000);
        assert_eq!(sample.clone().rebased(400).pts_us, 600);
        assert_eq!(sample.rebased(2_000).pts_us, 0);
    }

    #[test]
    fn test_bit_rate_estimation() {
        // 10 seconds at 160 kbps -> 200_000 bytes.
        let estimated = TrackFormat::estimate_bit_rate(200_000, 10_000_000);
        assert_eq!(estimated, 160_000);
        assert_eq!(TrackFormat::estimate_bit_rate(200_000, 0), 0);
    }
}

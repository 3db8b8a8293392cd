//! Trimming: cut `[start, end)` out of a file either by re-encoding through
//! the transcode loop or by copying encoded samples without touching them.
//!
//! The two modes cut differently on purpose. The transcoding path decodes and
//! so can start exactly at the requested timestamp. The lossless path can only
//! start at a sync sample, so it seeks to the nearest sync point at or before
//! the requested start and rebases timestamps against the timestamp actually
//! landed on; the output may begin slightly before the requested cut but every
//! copied sample stays decodable.

use crate::state::PipelineStats;
use crate::transcode::{TimeWindow, TranscodePipeline};
use audiokit_core::{AudioKitError, AudioKitResult, Operation, ProgressSlot};
use audiokit_media::{
    supported_for_lossless_trimming, AudioDecoder, AudioEncoder, MediaSink, MediaSource,
};
use std::time::Duration;
use tracing::{debug, info};

/// Validated trim range in milliseconds.
#[derive(Debug, Clone, Copy)]
pub struct TrimRange {
    start_ms: u64,
    end_ms: u64,
}

impl TrimRange {
    /// Build a range, rejecting `end <= start`.
    pub fn new(start_ms: u64, end_ms: u64) -> AudioKitResult<Self> {
        if end_ms <= start_ms {
            return Err(AudioKitError::InvalidRange { start_ms, end_ms });
        }
        Ok(Self { start_ms, end_ms })
    }

    pub fn start_ms(&self) -> u64 {
        self.start_ms
    }

    pub fn end_ms(&self) -> u64 {
        self.end_ms
    }

    /// Range length in milliseconds.
    pub fn duration_ms(&self) -> u64 {
        self.end_ms - self.start_ms
    }

    /// The equivalent microsecond window.
    pub fn window(&self) -> TimeWindow {
        TimeWindow {
            start_us: self.start_ms * 1_000,
            end_us: self.end_ms * 1_000,
        }
    }
}

/// Trim by decoding and re-encoding. The output timeline starts at zero and
/// the cut lands exactly on the requested start.
#[allow(clippy::too_many_arguments)]
pub fn trim_transcoding(
    source: Box<dyn MediaSource>,
    decoder: Box<dyn AudioDecoder>,
    encoder: Box<dyn AudioEncoder>,
    sink: Box<dyn MediaSink>,
    range: TrimRange,
    progress: ProgressSlot,
    poll_timeout: Duration,
) -> AudioKitResult<PipelineStats> {
    debug!(
        start_ms = range.start_ms,
        end_ms = range.end_ms,
        "trimming via re-encode"
    );
    TranscodePipeline::new(source, decoder, encoder, sink, Operation::Trim, progress)
        .with_poll_timeout(poll_timeout)
        .with_window(range.window())
        .run()
}

/// Trim by copying encoded samples, without decoding.
///
/// Only container formats whose samples can be cut at sync boundaries are
/// accepted; everything else (notably MP3) must take the transcoding path.
pub fn trim_lossless(
    mut source: Box<dyn MediaSource>,
    mut sink: Box<dyn MediaSink>,
    range: TrimRange,
    progress: ProgressSlot,
) -> AudioKitResult<PipelineStats> {
    let format = source.track_format().clone();
    if !supported_for_lossless_trimming(&format.mime) {
        return Err(AudioKitError::LosslessUnsupported { mime: format.mime });
    }

    let window = range.window();
    // The sync sample landed on becomes the output's time origin. It may sit
    // before the requested start; copying from anywhere later would leave the
    // first samples undecodable.
    let origin_us = source.seek_to_sync(window.start_us)?;
    debug!(
        requested_us = window.start_us,
        origin_us, "seeked to sync sample"
    );

    sink.add_track(&format)?;
    sink.start()?;

    let mut stats = PipelineStats::default();
    let result = (|| -> AudioKitResult<()> {
        while let Some(sample) = source.next_sample()? {
            if sample.pts_us >= window.end_us {
                break;
            }
            stats.source_samples += 1;
            progress.post(Operation::Trim, window.fraction_at(sample.pts_us));
            let rebased = sample.rebased(origin_us);
            stats.muxed_bytes += rebased.data.len() as u64;
            stats.last_pts_us = rebased.pts_us;
            sink.write_sample(0, &rebased)?;
            stats.muxed_samples += 1;
        }
        Ok(())
    })();

    match result {
        Ok(()) => {
            sink.finalize()?;
            progress.complete(Operation::Trim);
            info!(
                muxed_samples = stats.muxed_samples,
                muxed_bytes = stats.muxed_bytes,
                "lossless trim completed"
            );
            Ok(stats)
        }
        Err(e) => {
            let _ = sink.finalize();
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use audiokit_media::{Sample, TrackFormat, TrackInfo};
    use std::sync::{Arc, Mutex};

    /// In-memory source yielding a fixed sample script. Seeks land on the
    /// last sync sample at or before the target, like a real demuxer.
    struct ScriptedSource {
        tracks: Vec<TrackInfo>,
        format: TrackFormat,
        samples: Vec<Sample>,
        cursor: usize,
    }

    impl ScriptedSource {
        fn new(mime: &str, samples: Vec<Sample>) -> Self {
            Self {
                tracks: vec![TrackInfo {
                    index: 0,
                    mime: mime.to_string(),
                }],
                format: TrackFormat {
                    mime: mime.to_string(),
                    sample_rate: 44_100,
                    channels: 2,
                    bit_rate: 128_000,
                    duration_us: 0,
                },
                samples,
                cursor: 0,
            }
        }
    }

    impl MediaSource for ScriptedSource {
        fn tracks(&self) -> &[TrackInfo] {
            &self.tracks
        }

        fn audio_track_index(&self) -> usize {
            0
        }

        fn track_format(&self) -> &TrackFormat {
            &self.format
        }

        fn next_sample(&mut self) -> AudioKitResult<Option<Sample>> {
            let sample = self.samples.get(self.cursor).cloned();
            if sample.is_some() {
                self.cursor += 1;
            }
            Ok(sample)
        }

        fn seek_to_sync(&mut self, target_us: u64) -> AudioKitResult<u64> {
            let mut landed = 0;
            for (i, sample) in self.samples.iter().enumerate() {
                if sample.flags.sync && sample.pts_us <= target_us {
                    landed = i;
                }
            }
            self.cursor = landed;
            Ok(self.samples[landed].pts_us)
        }
    }

    /// Sink that records every written sample for later inspection.
    struct RecordingSink {
        written: Arc<Mutex<Vec<Sample>>>,
        started: bool,
    }

    impl MediaSink for RecordingSink {
        fn add_track(&mut self, _format: &TrackFormat) -> AudioKitResult<usize> {
            Ok(0)
        }

        fn start(&mut self) -> AudioKitResult<()> {
            self.started = true;
            Ok(())
        }

        fn is_started(&self) -> bool {
            self.started
        }

        fn write_sample(&mut self, _track: usize, sample: &Sample) -> AudioKitResult<()> {
            self.written.lock().unwrap().push(sample.clone());
            Ok(())
        }

        fn finalize(&mut self) -> AudioKitResult<()> {
            Ok(())
        }
    }

    #[test]
    fn test_lossless_copy_starts_at_sync_origin_with_zero_pts() {
        // Sync samples every 250ms; the 300..800ms cut must land on the
        // 250ms sync point and rebase the copied timeline against it.
        let samples = (0..5)
            .map(|i| Sample::sync(vec![0u8; 4], i * 250_000))
            .collect();
        let source = ScriptedSource::new("audio/mp4a-latm", samples);
        let written = Arc::new(Mutex::new(Vec::new()));
        let sink = RecordingSink {
            written: written.clone(),
            started: false,
        };
        let range = TrimRange::new(300, 800).unwrap();

        let stats = trim_lossless(
            Box::new(source),
            Box::new(sink),
            range,
            ProgressSlot::new(),
        )
        .unwrap();

        let written = written.lock().unwrap();
        // Copied: 250ms, 500ms, 750ms; the 1000ms sample is past the cut.
        assert_eq!(written.len(), 3);
        assert_eq!(stats.muxed_samples, 3);
        assert_eq!(written[0].pts_us, 0);
        assert_eq!(written[1].pts_us, 250_000);
        assert_eq!(written[2].pts_us, 500_000);
        assert!(written.iter().all(|s| s.flags.sync));
    }

    #[test]
    fn test_lossless_copy_rejects_non_aac_input() {
        let source = ScriptedSource::new("audio/mpeg", vec![Sample::sync(vec![0u8; 4], 0)]);
        let sink = RecordingSink {
            written: Arc::new(Mutex::new(Vec::new())),
            started: false,
        };
        let range = TrimRange::new(0, 500).unwrap();
        let err = trim_lossless(
            Box::new(source),
            Box::new(sink),
            range,
            ProgressSlot::new(),
        )
        .unwrap_err();
        assert_eq!(err.code(), "LOSSLESS_UNSUPPORTED");
    }

    #[test]
    fn test_range_rejects_inverted_and_empty() {
        assert!(TrimRange::new(1_000, 1_000).is_err());
        assert!(TrimRange::new(2_000, 1_000).is_err());
        let range = TrimRange::new(500, 2_500).unwrap();
        assert_eq!(range.duration_ms(), 2_000);
        assert_eq!(range.window().start_us, 500_000);
        assert_eq!(range.window().end_us, 2_500_000);
    }

    #[test]
    fn test_invalid_range_error_code() {
        let err = TrimRange::new(10, 5).unwrap_err();
        assert_eq!(err.code(), "INVALID_RANGE");
    }
}

//! Waveform extraction: decode to PCM and reduce to peak amplitudes.
//!
//! PCM frames are grouped into fixed-size buckets of
//! `max(1, sample_rate / samples_per_second)` frames. Each bucket yields one
//! normalized amplitude: the largest `abs(sample) / 32768` seen across all
//! channels in the bucket. A partial bucket at end of stream is flushed, so
//! short files still produce at least one amplitude.

use crate::state::StageState;
use audiokit_core::{AudioKitError, AudioKitResult, Operation, PipelineStage, ProgressSlot};
use audiokit_media::{AudioDecoder, DequeueOutput, MediaSource};
use std::time::Duration;
use tracing::{debug, info};

/// Iterations with no stage movement tolerated before extraction gives up.
const STALL_LIMIT: u32 = 10_000;

/// Extracted amplitude envelope plus the PCM properties it was computed from.
#[derive(Debug, Clone)]
pub struct Waveform {
    /// Peak amplitudes in `[0, 1]`, one per bucket.
    pub amplitudes: Vec<f64>,
    /// Sample rate of the decoded PCM.
    pub sample_rate: u32,
    /// Channel count of the decoded PCM.
    pub channels: u16,
    /// Source duration in milliseconds.
    pub duration_ms: u64,
}

/// Accumulates interleaved s16le PCM into per-bucket peak amplitudes.
struct BucketAccumulator {
    frames_per_bucket: u32,
    channels: usize,
    frames_in_bucket: u32,
    peak: f64,
    carry: Vec<u8>,
    amplitudes: Vec<f64>,
}

impl BucketAccumulator {
    fn new(sample_rate: u32, channels: u16, samples_per_second: u32) -> Self {
        Self {
            frames_per_bucket: (sample_rate / samples_per_second.max(1)).max(1),
            channels: channels.max(1) as usize,
            frames_in_bucket: 0,
            peak: 0.0,
            carry: Vec::new(),
            amplitudes: Vec::new(),
        }
    }

    fn push(&mut self, data: &[u8]) {
        // Frames can straddle buffer boundaries; carry the remainder.
        if self.carry.is_empty() {
            self.consume(data);
        } else {
            let mut buf = std::mem::take(&mut self.carry);
            buf.extend_from_slice(data);
            self.consume(&buf);
        }
    }

    fn consume(&mut self, data: &[u8]) {
        let frame_bytes = self.channels * 2;
        let whole = data.len() / frame_bytes * frame_bytes;
        for frame in data[..whole].chunks_exact(frame_bytes) {
            for pair in frame.chunks_exact(2) {
                let value = i16::from_le_bytes([pair[0], pair[1]]);
                let amplitude = (value as i32).unsigned_abs() as f64 / 32_768.0;
                if amplitude > self.peak {
                    self.peak = amplitude;
                }
            }
            self.frames_in_bucket += 1;
            if self.frames_in_bucket >= self.frames_per_bucket {
                self.amplitudes.push(self.peak);
                self.peak = 0.0;
                self.frames_in_bucket = 0;
            }
        }
        if whole < data.len() {
            self.carry = data[whole..].to_vec();
        }
    }

    fn finish(mut self) -> Vec<f64> {
        if self.frames_in_bucket > 0 {
            self.amplitudes.push(self.peak);
        }
        self.amplitudes
    }
}

/// One source-to-amplitudes extraction run.
pub struct WaveformExtractor {
    source: Box<dyn MediaSource>,
    decoder: Box<dyn AudioDecoder>,
    progress: ProgressSlot,
    poll_timeout: Duration,
    samples_per_second: u32,
}

impl WaveformExtractor {
    pub fn new(
        source: Box<dyn MediaSource>,
        decoder: Box<dyn AudioDecoder>,
        samples_per_second: u32,
        progress: ProgressSlot,
        poll_timeout: Duration,
    ) -> Self {
        Self {
            source,
            decoder,
            progress,
            poll_timeout,
            samples_per_second,
        }
    }

    pub fn run(mut self) -> AudioKitResult<Waveform> {
        let source_format = self.source.track_format().clone();
        let pcm = self.decoder.output_format();
        let mut buckets =
            BucketAccumulator::new(pcm.sample_rate, pcm.channels, self.samples_per_second);
        debug!(
            sample_rate = pcm.sample_rate,
            channels = pcm.channels,
            frames_per_bucket = buckets.frames_per_bucket,
            "extracting waveform"
        );

        let mut feed = StageState::Feeding;
        let mut decode = StageState::Feeding;
        let mut idle_iterations: u32 = 0;

        while decode.may_produce() {
            let mut moved = false;

            if feed.accepts_input() && self.decoder.has_input_slot() {
                match self.source.next_sample()? {
                    Some(sample) => {
                        if source_format.duration_us > 0 {
                            self.progress.post(
                                Operation::Extract,
                                sample.pts_us as f64 / source_format.duration_us as f64,
                            );
                        }
                        self.decoder.queue_input(sample)?;
                    }
                    None => {
                        self.decoder.signal_end_of_stream()?;
                        feed.finish_feeding();
                    }
                }
                moved = true;
            }

            match self.decoder.dequeue_output(self.poll_timeout)? {
                DequeueOutput::Sample(sample) if sample.is_end_of_stream() => {
                    if !sample.data.is_empty() {
                        buckets.push(&sample.data);
                    }
                    decode.finish();
                    moved = true;
                }
                DequeueOutput::Sample(sample) => {
                    buckets.push(&sample.data);
                    moved = true;
                }
                DequeueOutput::FormatReady(_) => {
                    moved = true;
                }
                DequeueOutput::TryAgain => {}
            }

            if moved {
                idle_iterations = 0;
            } else {
                idle_iterations += 1;
                if idle_iterations > STALL_LIMIT {
                    return Err(AudioKitError::pipeline(
                        PipelineStage::Decode,
                        "waveform extraction stalled",
                    ));
                }
            }
        }

        let amplitudes = buckets.finish();
        self.progress.complete(Operation::Extract);
        info!(
            amplitudes = amplitudes.len(),
            duration_ms = source_format.duration_ms(),
            "waveform extraction completed"
        );
        Ok(Waveform {
            amplitudes,
            sample_rate: pcm.sample_rate,
            channels: pcm.channels,
            duration_ms: source_format.duration_ms(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pcm_bytes(samples: &[i16]) -> Vec<u8> {
        let mut out = Vec::with_capacity(samples.len() * 2);
        for s in samples {
            out.extend_from_slice(&s.to_le_bytes());
        }
        out
    }

    #[test]
    fn test_bucket_peak_and_tail_flush() {
        // 2 frames per bucket, mono. Five frames: two full buckets plus a
        // partial tail that must still be flushed.
        let mut acc = BucketAccumulator::new(200, 1, 100);
        assert_eq!(acc.frames_per_bucket, 2);
        acc.push(&pcm_bytes(&[0, 16_384, -32_768, 8_192, 100]));
        let amplitudes = acc.finish();
        assert_eq!(amplitudes.len(), 3);
        assert!((amplitudes[0] - 0.5).abs() < 1e-9);
        assert!((amplitudes[1] - 1.0).abs() < 1e-9);
        assert!(amplitudes[2] > 0.0 && amplitudes[2] < 0.01);
    }

    #[test]
    fn test_bucket_carries_partial_frames_across_buffers() {
        let mut acc = BucketAccumulator::new(100, 2, 100);
        assert_eq!(acc.frames_per_bucket, 1);
        let bytes = pcm_bytes(&[1_000, -20_000]);
        // Split one stereo frame across two pushes.
        acc.push(&bytes[..3]);
        acc.push(&bytes[3..]);
        let amplitudes = acc.finish();
        assert_eq!(amplitudes.len(), 1);
        assert!((amplitudes[0] - 20_000.0 / 32_768.0).abs() < 1e-9);
    }

    #[test]
    fn test_low_rate_never_yields_zero_bucket() {
        let acc = BucketAccumulator::new(50, 1, 100);
        assert_eq!(acc.frames_per_bucket, 1);
    }
}

//! The pull-based transcode loop: source -> decoder -> encoder -> sink.
//!
//! Each iteration performs up to three bounded steps: feed one source sample
//! to the decoder, move one decoded PCM buffer to the encoder, and move one
//! encoded sample to the sink. End of stream travels through the stages as an
//! explicit marker sample, so each stage flushes fully before the next one
//! shuts down. The loop exits when the encoder's end-of-stream marker reaches
//! the sink.

use crate::state::{PipelineStats, StageState};
use audiokit_core::{AudioKitError, AudioKitResult, Operation, PipelineStage, ProgressSlot};
use audiokit_media::{AudioDecoder, AudioEncoder, DequeueOutput, MediaSink, MediaSource, Sample};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default bounded-poll timeout for codec dequeues.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_millis(10);

/// Iterations with no stage movement tolerated before the pipeline gives up.
const STALL_LIMIT: u32 = 10_000;

/// Half-open presentation-time window, in microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    /// First timestamp kept.
    pub start_us: u64,
    /// First timestamp excluded.
    pub end_us: u64,
}

impl TimeWindow {
    /// Window length in microseconds.
    pub fn len_us(&self) -> u64 {
        self.end_us.saturating_sub(self.start_us)
    }

    /// Fraction of the window covered at `pts_us`, clamped to `[0, 1]`.
    pub fn fraction_at(&self, pts_us: u64) -> f64 {
        let len = self.len_us();
        if len == 0 {
            return 1.0;
        }
        (pts_us.saturating_sub(self.start_us) as f64 / len as f64).clamp(0.0, 1.0)
    }
}

/// One source-to-sink transcode run over boxed stage implementations.
pub struct TranscodePipeline {
    source: Box<dyn MediaSource>,
    decoder: Box<dyn AudioDecoder>,
    encoder: Box<dyn AudioEncoder>,
    sink: Box<dyn MediaSink>,
    operation: Operation,
    progress: ProgressSlot,
    poll_timeout: Duration,
    window: Option<TimeWindow>,
}

impl TranscodePipeline {
    pub fn new(
        source: Box<dyn MediaSource>,
        decoder: Box<dyn AudioDecoder>,
        encoder: Box<dyn AudioEncoder>,
        sink: Box<dyn MediaSink>,
        operation: Operation,
        progress: ProgressSlot,
    ) -> Self {
        Self {
            source,
            decoder,
            encoder,
            sink,
            operation,
            progress,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            window: None,
        }
    }

    /// Override the bounded-poll timeout used for codec dequeues.
    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    /// Keep only samples inside `window`; source samples at or past its end
    /// terminate feeding early.
    pub fn with_window(mut self, window: TimeWindow) -> Self {
        self.window = Some(window);
        self
    }

    /// Run to completion. The sink is finalized on success; on failure a
    /// best-effort finalize runs so partial output files are closed, and the
    /// original error is returned.
    pub fn run(mut self) -> AudioKitResult<PipelineStats> {
        let result = self.run_inner();
        match result {
            Ok(stats) => {
                self.sink.finalize()?;
                self.progress.complete(self.operation);
                info!(
                    source_samples = stats.source_samples,
                    muxed_samples = stats.muxed_samples,
                    muxed_bytes = stats.muxed_bytes,
                    last_pts_us = stats.last_pts_us,
                    "pipeline completed"
                );
                Ok(stats)
            }
            Err(e) => {
                if let Err(fin) = self.sink.finalize() {
                    warn!(error = %fin, "sink finalize failed after pipeline error");
                }
                Err(e)
            }
        }
    }

    fn run_inner(&mut self) -> AudioKitResult<PipelineStats> {
        let duration_us = self.source.track_format().duration_us;
        let mut stats = PipelineStats::default();
        let mut feed = StageState::Feeding;
        let mut decode = StageState::Feeding;
        let mut encode = StageState::Feeding;
        let mut idle_iterations: u32 = 0;

        while encode.may_produce() {
            let mut moved = false;

            if feed.accepts_input() && self.decoder.has_input_slot() {
                moved |= self.feed_step(&mut feed, duration_us, &mut stats)?;
            }

            if decode.may_produce() {
                match self.decoder.dequeue_output(self.poll_timeout)? {
                    DequeueOutput::Sample(sample) if sample.is_end_of_stream() => {
                        if !sample.data.is_empty() {
                            self.feed_encoder(&sample)?;
                        }
                        self.encoder.signal_end_of_stream()?;
                        decode.finish();
                        moved = true;
                    }
                    DequeueOutput::Sample(sample) => {
                        stats.decoded_buffers += 1;
                        self.feed_encoder(&sample)?;
                        moved = true;
                    }
                    DequeueOutput::FormatReady(_) => {
                        moved = true;
                    }
                    DequeueOutput::TryAgain => {}
                }
            }

            match self.encoder.dequeue_output(self.poll_timeout)? {
                DequeueOutput::FormatReady(format) => {
                    if self.sink.is_started() {
                        return Err(AudioKitError::pipeline(
                            PipelineStage::Mux,
                            "encoder renegotiated format after sink start",
                        ));
                    }
                    debug!(mime = %format.mime, sample_rate = format.sample_rate, "output format ready");
                    self.sink.add_track(&format)?;
                    self.sink.start()?;
                    moved = true;
                }
                DequeueOutput::Sample(sample) if sample.is_end_of_stream() => {
                    if !sample.data.is_empty() {
                        self.write_sample(&sample, &mut stats)?;
                    }
                    encode.finish();
                    moved = true;
                }
                DequeueOutput::Sample(sample) => {
                    self.write_sample(&sample, &mut stats)?;
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
                        PipelineStage::Encode,
                        "pipeline stalled with no stage making progress",
                    ));
                }
            }
        }

        Ok(stats)
    }

    /// Pull one sample from the source and route it: queue it, drop it when
    /// before the window, or end feeding when the source is exhausted or the
    /// window is past. Returns whether anything moved.
    fn feed_step(
        &mut self,
        feed: &mut StageState,
        duration_us: u64,
        stats: &mut PipelineStats,
    ) -> AudioKitResult<bool> {
        let sample = match self.source.next_sample()? {
            Some(sample) => sample,
            None => {
                self.decoder.signal_end_of_stream()?;
                feed.finish_feeding();
                return Ok(true);
            }
        };
        stats.source_samples += 1;

        match self.window {
            Some(window) => {
                if sample.pts_us >= window.end_us {
                    self.decoder.signal_end_of_stream()?;
                    feed.finish_feeding();
                } else if sample.pts_us < window.start_us {
                    // Consumed but not decoded; still before the cut.
                } else {
                    self.progress
                        .post(self.operation, window.fraction_at(sample.pts_us));
                    self.decoder.queue_input(sample)?;
                }
            }
            None => {
                if duration_us > 0 {
                    self.progress
                        .post(self.operation, sample.pts_us as f64 / duration_us as f64);
                }
                self.decoder.queue_input(sample)?;
            }
        }
        Ok(true)
    }

    /// Queue PCM into the encoder, split to its per-call input capacity.
    fn feed_encoder(&mut self, sample: &Sample) -> AudioKitResult<()> {
        let capacity = self.encoder.input_capacity().max(2) & !1;
        let mut offset = 0;
        while offset < sample.data.len() {
            let end = (offset + capacity).min(sample.data.len());
            self.encoder
                .queue_input(Sample::new(sample.data[offset..end].to_vec(), sample.pts_us))?;
            offset = end;
        }
        Ok(())
    }

    fn write_sample(&mut self, sample: &Sample, stats: &mut PipelineStats) -> AudioKitResult<()> {
        if !self.sink.is_started() {
            return Err(AudioKitError::pipeline(
                PipelineStage::Mux,
                "encoder produced a sample before announcing its format",
            ));
        }
        self.sink.write_sample(0, sample)?;
        stats.muxed_samples += 1;
        stats.muxed_bytes += sample.data.len() as u64;
        stats.last_pts_us = sample.pts_us;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_fraction() {
        let window = TimeWindow {
            start_us: 1_000_000,
            end_us: 3_000_000,
        };
        assert_eq!(window.len_us(), 2_000_000);
        assert_eq!(window.fraction_at(0), 0.0);
        assert_eq!(window.fraction_at(1_000_000), 0.0);
        assert_eq!(window.fraction_at(2_000_000), 0.5);
        assert_eq!(window.fraction_at(5_000_000), 1.0);
    }

    #[test]
    fn test_empty_window_reports_done() {
        let window = TimeWindow {
            start_us: 500,
            end_us: 500,
        };
        assert_eq!(window.fraction_at(500), 1.0);
    }
}

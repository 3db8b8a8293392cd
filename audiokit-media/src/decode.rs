//! symphonia-backed decoder stage
//!
//! Adapts symphonia's synchronous packet-in/buffer-out decoder to the
//! queue-oriented [`CodecStage`] contract. Output is normalized to
//! interleaved little-endian signed 16-bit PCM regardless of the source
//! codec's native sample format.

use crate::codec::{AudioDecoder, CodecStage, DequeueOutput};
use crate::sample::{Sample, SampleFlags, TrackFormat};
use audiokit_core::{AudioKitError, AudioKitResult, PipelineStage};
use std::collections::VecDeque;
use std::time::Duration;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CodecParameters, Decoder, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::Packet;
use tracing::{debug, warn};

/// MIME reported for the decoder's normalized PCM output.
pub const RAW_PCM_MIME: &str = "audio/raw";

/// Bound on queued-but-undecoded input samples.
const INPUT_QUEUE_LIMIT: usize = 4;

/// symphonia-backed [`AudioDecoder`].
pub struct SymphoniaDecoder {
    decoder: Box<dyn Decoder>,
    sample_rate: u32,
    channels: u16,
    input: VecDeque<Sample>,
    eos_queued: bool,
    eos_emitted: bool,
    last_pts_us: u64,
}

impl SymphoniaDecoder {
    /// Build a decoder for the given track parameters.
    pub fn new(params: &CodecParameters) -> AudioKitResult<Self> {
        let decoder = symphonia::default::get_codecs()
            .make(params, &DecoderOptions::default())
            .map_err(|e| AudioKitError::CodecInitialization {
                codec: "symphonia".to_string(),
                reason: e.to_string(),
            })?;
        let sample_rate = params.sample_rate.unwrap_or(44_100);
        let channels = params.channels.map(|c| c.count() as u16).unwrap_or(2);
        debug!(sample_rate, channels, "created symphonia decoder");
        Ok(Self {
            decoder,
            sample_rate,
            channels,
            input: VecDeque::new(),
            eos_queued: false,
            eos_emitted: false,
            last_pts_us: 0,
        })
    }

    fn decode_front(&mut self) -> AudioKitResult<Option<Sample>> {
        let Some(sample) = self.input.pop_front() else {
            return Ok(None);
        };
        let pts_us = sample.pts_us;
        self.last_pts_us = pts_us;

        // Reconstruct a packet in track timebase units; decoders only use
        // the timestamp for gapless trimming.
        let ts = (pts_us as u128 * self.sample_rate as u128 / 1_000_000) as u64;
        let packet = Packet::new_from_boxed_slice(0, ts, 0, sample.data.into_boxed_slice());

        match self.decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                let mut buf = SampleBuffer::<i16>::new(decoded.capacity() as u64, spec);
                buf.copy_interleaved_ref(decoded);
                let mut data = Vec::with_capacity(buf.samples().len() * 2);
                for s in buf.samples() {
                    data.extend_from_slice(&s.to_le_bytes());
                }
                Ok(Some(Sample {
                    data,
                    pts_us,
                    flags: SampleFlags::none(),
                }))
            }
            Err(SymphoniaError::DecodeError(e)) => {
                // Malformed packet; skip it and keep the stream going.
                warn!(error = %e, "skipping undecodable packet");
                Ok(None)
            }
            Err(e) => Err(AudioKitError::pipeline(
                PipelineStage::Decode,
                e.to_string(),
            )),
        }
    }
}

impl CodecStage for SymphoniaDecoder {
    fn has_input_slot(&self) -> bool {
        !self.eos_queued && self.input.len() < INPUT_QUEUE_LIMIT
    }

    fn queue_input(&mut self, sample: Sample) -> AudioKitResult<()> {
        debug_assert!(self.has_input_slot());
        if sample.is_end_of_stream() {
            self.eos_queued = true;
        } else {
            self.input.push_back(sample);
        }
        Ok(())
    }

    fn signal_end_of_stream(&mut self) -> AudioKitResult<()> {
        self.eos_queued = true;
        Ok(())
    }

    fn dequeue_output(&mut self, _timeout: Duration) -> AudioKitResult<DequeueOutput> {
        // Synchronous backend: a queued packet decodes immediately, so the
        // poll timeout never has to be slept on.
        while !self.input.is_empty() {
            if let Some(out) = self.decode_front()? {
                return Ok(DequeueOutput::Sample(out));
            }
        }
        if self.eos_queued && !self.eos_emitted {
            self.eos_emitted = true;
            return Ok(DequeueOutput::Sample(Sample::end_of_stream(self.last_pts_us)));
        }
        Ok(DequeueOutput::TryAgain)
    }
}

impl AudioDecoder for SymphoniaDecoder {
    fn output_format(&self) -> TrackFormat {
        TrackFormat {
            mime: RAW_PCM_MIME.to_string(),
            sample_rate: self.sample_rate,
            channels: self.channels,
            bit_rate: self.sample_rate * self.channels as u32 * 16,
            duration_us: 0,
        }
    }
}

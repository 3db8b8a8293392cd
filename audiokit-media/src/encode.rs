//! Encoder stages
//!
//! All encoders share the same shape: interleaved s16le PCM is appended to an
//! internal FIFO, codec-sized frames are popped off the front and encoded,
//! and the tail is flushed (zero-padded where the codec requires whole
//! frames) when end-of-stream is signalled. Output timestamps are stamped
//! from the running count of PCM frames represented by emitted packets, so
//! the encoded timeline always starts at zero and stays monotone.
//!
//! The AAC and MP3 backends bind real codec libraries and are feature-gated;
//! the PCM pass-through is always available and backs the WAV output path.

use crate::codec::{AudioEncoder, CodecStage, DequeueOutput};
use crate::sample::{Sample, SampleFlags, TrackFormat};
use audiokit_core::AudioKitResult;
#[cfg(any(feature = "aac", feature = "mp3"))]
use audiokit_core::{AudioKitError, PipelineStage};
use std::collections::VecDeque;
use std::time::Duration;
#[cfg(any(feature = "aac", feature = "mp3"))]
use tracing::debug;

/// Largest PCM payload accepted per queue call, in bytes.
const ENCODER_INPUT_CAPACITY: usize = 64 * 1024;

fn bytes_to_i16(data: &[u8]) -> Vec<i16> {
    data.chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

/// Shared FIFO and bookkeeping used by every encoder backend.
struct EncoderState {
    sample_rate: u32,
    channels: u16,
    fifo: VecDeque<i16>,
    output: VecDeque<Sample>,
    /// PCM frames covered by packets emitted so far; drives output pts.
    frames_emitted: u64,
    eos_queued: bool,
    eos_emitted: bool,
    format_announced: bool,
}

impl EncoderState {
    fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
            fifo: VecDeque::new(),
            output: VecDeque::new(),
            frames_emitted: 0,
            eos_queued: false,
            eos_emitted: false,
            format_announced: false,
        }
    }

    fn push_pcm(&mut self, data: &[u8]) {
        self.fifo.extend(bytes_to_i16(data));
    }

    fn next_pts_us(&self) -> u64 {
        self.frames_emitted * 1_000_000 / self.sample_rate as u64
    }

    fn emit(&mut self, data: Vec<u8>, frames: u64) {
        let pts_us = self.next_pts_us();
        self.frames_emitted += frames;
        self.output.push_back(Sample {
            data,
            pts_us,
            flags: SampleFlags::sync(),
        });
    }

    /// Pop `count` samples from the FIFO, zero-padding when `pad` is set.
    fn take(&mut self, count: usize, pad: bool) -> Vec<i16> {
        let mut chunk = Vec::with_capacity(count);
        while chunk.len() < count {
            match self.fifo.pop_front() {
                Some(s) => chunk.push(s),
                None if pad => chunk.push(0),
                None => break,
            }
        }
        chunk
    }

    fn drained(&self) -> bool {
        self.fifo.is_empty()
    }
}

/// Pass-through encoder for raw PCM output (WAV).
///
/// No codec work happens here; payloads flow through unchanged while the
/// timestamps are re-derived from the running frame counter so trimmed input
/// still produces a zero-based output timeline.
pub struct PcmEncoder {
    state: EncoderState,
    mime: &'static str,
}

impl PcmEncoder {
    /// Create a pass-through encoder for the given PCM layout.
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            state: EncoderState::new(sample_rate, channels),
            mime: "audio/wav",
        }
    }

    fn format(&self) -> TrackFormat {
        TrackFormat {
            mime: self.mime.to_string(),
            sample_rate: self.state.sample_rate,
            channels: self.state.channels,
            bit_rate: self.state.sample_rate * self.state.channels as u32 * 16,
            duration_us: 0,
        }
    }
}

impl CodecStage for PcmEncoder {
    fn has_input_slot(&self) -> bool {
        !self.state.eos_queued
    }

    fn queue_input(&mut self, sample: Sample) -> AudioKitResult<()> {
        if sample.is_end_of_stream() {
            self.state.eos_queued = true;
        }
        self.state.push_pcm(&sample.data);
        Ok(())
    }

    fn signal_end_of_stream(&mut self) -> AudioKitResult<()> {
        self.state.eos_queued = true;
        Ok(())
    }

    fn dequeue_output(&mut self, _timeout: Duration) -> AudioKitResult<DequeueOutput> {
        if !self.state.format_announced {
            self.state.format_announced = true;
            return Ok(DequeueOutput::FormatReady(self.format()));
        }
        if !self.state.drained() {
            let samples: Vec<i16> = self.state.fifo.drain(..).collect();
            let frames = samples.len() as u64 / self.state.channels.max(1) as u64;
            let mut data = Vec::with_capacity(samples.len() * 2);
            for s in &samples {
                data.extend_from_slice(&s.to_le_bytes());
            }
            self.state.emit(data, frames);
        }
        if let Some(sample) = self.state.output.pop_front() {
            return Ok(DequeueOutput::Sample(sample));
        }
        if self.state.eos_queued && !self.state.eos_emitted {
            self.state.eos_emitted = true;
            return Ok(DequeueOutput::Sample(Sample::end_of_stream(
                self.state.next_pts_us(),
            )));
        }
        Ok(DequeueOutput::TryAgain)
    }
}

impl AudioEncoder for PcmEncoder {
    fn input_capacity(&self) -> usize {
        ENCODER_INPUT_CAPACITY
    }
}

/// Transport wrapping for AAC output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AacTransport {
    /// Self-framing ADTS stream (`.aac`)
    Adts,
    /// Raw access units for muxing into MP4 (`.m4a`)
    Raw,
}

/// AAC-LC encoder backed by libfdk-aac.
#[cfg(feature = "aac")]
pub struct AacEncoder {
    encoder: fdk_aac::enc::Encoder,
    state: EncoderState,
    transport: AacTransport,
    bit_rate: u32,
    /// Samples (all channels) per AAC frame.
    frame_samples: usize,
}

#[cfg(feature = "aac")]
impl AacEncoder {
    /// AAC-LC frame length in PCM frames per channel.
    const FRAME_LEN: usize = 1024;

    /// Create an AAC-LC encoder.
    pub fn new(
        sample_rate: u32,
        channels: u16,
        bit_rate: u32,
        transport: AacTransport,
    ) -> AudioKitResult<Self> {
        use fdk_aac::enc::{BitRate, ChannelMode, Encoder, EncoderParams, Transport};

        let channel_mode = match channels {
            1 => ChannelMode::Mono,
            _ => ChannelMode::Stereo,
        };
        let params = EncoderParams {
            bit_rate: BitRate::Cbr(bit_rate),
            sample_rate,
            transport: match transport {
                AacTransport::Adts => Transport::Adts,
                AacTransport::Raw => Transport::Raw,
            },
            channels: channel_mode,
        };
        let encoder = Encoder::new(params).map_err(|e| AudioKitError::CodecInitialization {
            codec: "fdk-aac".to_string(),
            reason: format!("{:?}", e),
        })?;
        let channels = channels.min(2).max(1);
        debug!(sample_rate, channels, bit_rate, ?transport, "created AAC encoder");
        Ok(Self {
            encoder,
            state: EncoderState::new(sample_rate, channels),
            transport,
            bit_rate,
            frame_samples: Self::FRAME_LEN * channels as usize,
        })
    }

    fn format(&self) -> TrackFormat {
        TrackFormat {
            mime: match self.transport {
                AacTransport::Adts => "audio/aac".to_string(),
                AacTransport::Raw => "audio/mp4a-latm".to_string(),
            },
            sample_rate: self.state.sample_rate,
            channels: self.state.channels,
            bit_rate: self.bit_rate,
            duration_us: 0,
        }
    }

    /// Encode FIFO content one frame at a time; pads the tail when flushing.
    fn pump(&mut self, flushing: bool) -> AudioKitResult<()> {
        while self.state.fifo.len() >= self.frame_samples
            || (flushing && !self.state.drained())
        {
            let chunk = self.state.take(self.frame_samples, true);
            let mut out = vec![0u8; 2048 * self.state.channels as usize];
            let mut consumed = 0usize;
            while consumed < chunk.len() {
                let info = self
                    .encoder
                    .encode(&chunk[consumed..], &mut out)
                    .map_err(|e| {
                        AudioKitError::pipeline(PipelineStage::Encode, format!("{:?}", e))
                    })?;
                if info.input_consumed == 0 && info.output_size == 0 {
                    break;
                }
                consumed += info.input_consumed;
                if info.output_size > 0 {
                    let frames = Self::FRAME_LEN as u64;
                    self.state.emit(out[..info.output_size].to_vec(), frames);
                }
            }
        }
        Ok(())
    }
}

#[cfg(feature = "aac")]
impl CodecStage for AacEncoder {
    fn has_input_slot(&self) -> bool {
        !self.state.eos_queued
    }

    fn queue_input(&mut self, sample: Sample) -> AudioKitResult<()> {
        if sample.is_end_of_stream() {
            self.state.eos_queued = true;
        }
        self.state.push_pcm(&sample.data);
        Ok(())
    }

    fn signal_end_of_stream(&mut self) -> AudioKitResult<()> {
        self.state.eos_queued = true;
        Ok(())
    }

    fn dequeue_output(&mut self, _timeout: Duration) -> AudioKitResult<DequeueOutput> {
        if !self.state.format_announced {
            self.state.format_announced = true;
            return Ok(DequeueOutput::FormatReady(self.format()));
        }
        self.pump(self.state.eos_queued)?;
        if let Some(sample) = self.state.output.pop_front() {
            return Ok(DequeueOutput::Sample(sample));
        }
        if self.state.eos_queued && !self.state.eos_emitted {
            self.state.eos_emitted = true;
            return Ok(DequeueOutput::Sample(Sample::end_of_stream(
                self.state.next_pts_us(),
            )));
        }
        Ok(DequeueOutput::TryAgain)
    }
}

#[cfg(feature = "aac")]
impl AudioEncoder for AacEncoder {
    fn input_capacity(&self) -> usize {
        ENCODER_INPUT_CAPACITY
    }
}

/// MP3 encoder backed by LAME.
#[cfg(feature = "mp3")]
pub struct LameEncoder {
    encoder: mp3lame_encoder::Encoder,
    state: EncoderState,
    bit_rate: u32,
}

#[cfg(feature = "mp3")]
impl LameEncoder {
    /// MPEG-1 layer III frame length in PCM frames per channel.
    const FRAME_LEN: usize = 1152;

    /// Create an MP3 encoder.
    pub fn new(sample_rate: u32, channels: u16, bit_rate: u32) -> AudioKitResult<Self> {
        use mp3lame_encoder::{Builder, Quality};

        let init_err = |reason: String| AudioKitError::CodecInitialization {
            codec: "mp3lame".to_string(),
            reason,
        };

        let mut builder = Builder::new().ok_or_else(|| init_err("allocation failed".into()))?;
        builder
            .set_num_channels(channels.min(2).max(1) as u8)
            .map_err(|e| init_err(format!("{:?}", e)))?;
        builder
            .set_sample_rate(sample_rate)
            .map_err(|e| init_err(format!("{:?}", e)))?;
        builder
            .set_brate(nearest_lame_bitrate(bit_rate))
            .map_err(|e| init_err(format!("{:?}", e)))?;
        builder
            .set_quality(Quality::Good)
            .map_err(|e| init_err(format!("{:?}", e)))?;
        let encoder = builder.build().map_err(|e| init_err(format!("{:?}", e)))?;

        debug!(sample_rate, channels, bit_rate, "created MP3 encoder");
        Ok(Self {
            encoder,
            state: EncoderState::new(sample_rate, channels.min(2).max(1)),
            bit_rate,
        })
    }

    fn format(&self) -> TrackFormat {
        TrackFormat {
            mime: "audio/mpeg".to_string(),
            sample_rate: self.state.sample_rate,
            channels: self.state.channels,
            bit_rate: self.bit_rate,
            duration_us: 0,
        }
    }

    fn encode_chunk(&mut self, chunk: &[i16]) -> AudioKitResult<Vec<u8>> {
        use mp3lame_encoder::{InterleavedPcm, MonoPcm};

        let mut out: Vec<u8> =
            Vec::with_capacity(mp3lame_encoder::max_required_buffer_size(chunk.len()));
        let written = if self.state.channels == 1 {
            self.encoder
                .encode(MonoPcm(chunk), out.spare_capacity_mut())
        } else {
            self.encoder
                .encode(InterleavedPcm(chunk), out.spare_capacity_mut())
        }
        .map_err(|e| AudioKitError::pipeline(PipelineStage::Encode, format!("{:?}", e)))?;
        // Safety: `encode` initialized exactly `written` bytes of the spare
        // capacity that was handed to it.
        unsafe { out.set_len(written) };
        Ok(out)
    }

    fn pump(&mut self, flushing: bool) -> AudioKitResult<()> {
        let frame_samples = Self::FRAME_LEN * self.state.channels as usize;
        while self.state.fifo.len() >= frame_samples || (flushing && !self.state.drained()) {
            let chunk = self.state.take(frame_samples, false);
            let frames = chunk.len() as u64 / self.state.channels as u64;
            let encoded = self.encode_chunk(&chunk)?;
            if !encoded.is_empty() {
                self.state.emit(encoded, frames);
            } else {
                // LAME buffered the input; account for the frames anyway so
                // pts stays aligned with consumed PCM.
                self.state.frames_emitted += frames;
            }
        }
        if flushing && self.state.drained() && !self.state.eos_emitted {
            use mp3lame_encoder::FlushNoGap;
            let mut out: Vec<u8> = Vec::with_capacity(8192);
            let written = self
                .encoder
                .flush::<FlushNoGap>(out.spare_capacity_mut())
                .map_err(|e| AudioKitError::pipeline(PipelineStage::Encode, format!("{:?}", e)))?;
            // Safety: `flush` initialized exactly `written` bytes.
            unsafe { out.set_len(written) };
            if !out.is_empty() {
                self.state.emit(out, 0);
            }
        }
        Ok(())
    }
}

#[cfg(feature = "mp3")]
impl CodecStage for LameEncoder {
    fn has_input_slot(&self) -> bool {
        !self.state.eos_queued
    }

    fn queue_input(&mut self, sample: Sample) -> AudioKitResult<()> {
        if sample.is_end_of_stream() {
            self.state.eos_queued = true;
        }
        self.state.push_pcm(&sample.data);
        Ok(())
    }

    fn signal_end_of_stream(&mut self) -> AudioKitResult<()> {
        self.state.eos_queued = true;
        Ok(())
    }

    fn dequeue_output(&mut self, _timeout: Duration) -> AudioKitResult<DequeueOutput> {
        if !self.state.format_announced {
            self.state.format_announced = true;
            return Ok(DequeueOutput::FormatReady(self.format()));
        }
        let flushing = self.state.eos_queued;
        self.pump(flushing)?;
        if let Some(sample) = self.state.output.pop_front() {
            return Ok(DequeueOutput::Sample(sample));
        }
        if self.state.eos_queued && !self.state.eos_emitted {
            self.state.eos_emitted = true;
            return Ok(DequeueOutput::Sample(Sample::end_of_stream(
                self.state.next_pts_us(),
            )));
        }
        Ok(DequeueOutput::TryAgain)
    }
}

#[cfg(feature = "mp3")]
impl AudioEncoder for LameEncoder {
    fn input_capacity(&self) -> usize {
        ENCODER_INPUT_CAPACITY
    }
}

/// Map a requested bit rate to the nearest rate LAME supports.
#[cfg(feature = "mp3")]
fn nearest_lame_bitrate(bit_rate: u32) -> mp3lame_encoder::Bitrate {
    use mp3lame_encoder::Bitrate;
    let kbps = bit_rate / 1000;
    match kbps {
        0..=47 => Bitrate::Kbps32,
        48..=79 => Bitrate::Kbps64,
        80..=111 => Bitrate::Kbps96,
        112..=143 => Bitrate::Kbps128,
        144..=175 => Bitrate::Kbps160,
        176..=223 => Bitrate::Kbps192,
        224..=287 => Bitrate::Kbps256,
        _ => Bitrate::Kbps320,
    }
}

//! Media sinks: muxing encoded samples into output containers
//!
//! A [`MediaSink`] must learn the final encoder output format through
//! [`MediaSink::add_track`] and then be started exactly once before the first
//! sample is written; finalizing flushes container indexes and headers.
//! Samples must arrive in non-decreasing timestamp order - the sink does not
//! reorder.

use crate::sample::{Sample, TrackFormat};
use audiokit_core::{AudioKitError, AudioKitResult, PipelineStage};
use bytes::Bytes;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// AAC-LC access unit length in PCM frames.
const AAC_FRAME_LEN: u64 = 1024;

fn mux_err(e: impl std::fmt::Display) -> AudioKitError {
    AudioKitError::pipeline(PipelineStage::Mux, e.to_string())
}

/// Muxer abstraction over one output file.
pub trait MediaSink: Send {
    /// Register the track that samples will be written for. Must be called
    /// before [`MediaSink::start`].
    fn add_track(&mut self, format: &TrackFormat) -> AudioKitResult<usize>;

    /// Start the sink. Must be called exactly once, after `add_track` and
    /// before the first `write_sample`.
    fn start(&mut self) -> AudioKitResult<()>;

    /// Whether the sink has been started.
    fn is_started(&self) -> bool;

    /// Write one encoded sample, preserving its timestamp and flags.
    fn write_sample(&mut self, track: usize, sample: &Sample) -> AudioKitResult<()>;

    /// Flush indexes/headers and close the output.
    fn finalize(&mut self) -> AudioKitResult<()>;
}

/// Create the output's parent directory if it does not exist yet.
pub fn ensure_parent_dir(path: &Path) -> AudioKitResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Sink for self-framing streams (ADTS `.aac`, `.mp3`): plain concatenation.
pub struct StreamSink {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    track_added: bool,
    started: bool,
}

impl StreamSink {
    /// Create a sink writing to `path`.
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            writer: None,
            track_added: false,
            started: false,
        }
    }
}

impl MediaSink for StreamSink {
    fn add_track(&mut self, _format: &TrackFormat) -> AudioKitResult<usize> {
        self.track_added = true;
        Ok(0)
    }

    fn start(&mut self) -> AudioKitResult<()> {
        if !self.track_added {
            return Err(mux_err("start called before add_track"));
        }
        if self.started {
            return Err(mux_err("sink already started"));
        }
        ensure_parent_dir(&self.path)?;
        self.writer = Some(BufWriter::new(File::create(&self.path)?));
        self.started = true;
        Ok(())
    }

    fn is_started(&self) -> bool {
        self.started
    }

    fn write_sample(&mut self, _track: usize, sample: &Sample) -> AudioKitResult<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| mux_err("write before start"))?;
        writer.write_all(&sample.data)?;
        Ok(())
    }

    fn finalize(&mut self) -> AudioKitResult<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
        }
        debug!(path = %self.path.display(), "stream sink finalized");
        Ok(())
    }
}

/// RIFF/WAVE sink for raw s16le PCM samples.
pub struct WavSink {
    path: PathBuf,
    writer: Option<hound::WavWriter<BufWriter<File>>>,
    format: Option<TrackFormat>,
    started: bool,
}

impl WavSink {
    /// Create a sink writing to `path`.
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            writer: None,
            format: None,
            started: false,
        }
    }
}

impl MediaSink for WavSink {
    fn add_track(&mut self, format: &TrackFormat) -> AudioKitResult<usize> {
        self.format = Some(format.clone());
        Ok(0)
    }

    fn start(&mut self) -> AudioKitResult<()> {
        let format = self
            .format
            .as_ref()
            .ok_or_else(|| mux_err("start called before add_track"))?;
        if self.started {
            return Err(mux_err("sink already started"));
        }
        ensure_parent_dir(&self.path)?;
        let spec = hound::WavSpec {
            channels: format.channels,
            sample_rate: format.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        self.writer = Some(hound::WavWriter::create(&self.path, spec).map_err(mux_err)?);
        self.started = true;
        Ok(())
    }

    fn is_started(&self) -> bool {
        self.started
    }

    fn write_sample(&mut self, _track: usize, sample: &Sample) -> AudioKitResult<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| mux_err("write before start"))?;
        for pair in sample.data.chunks_exact(2) {
            let value = i16::from_le_bytes([pair[0], pair[1]]);
            writer.write_sample(value).map_err(mux_err)?;
        }
        Ok(())
    }

    fn finalize(&mut self) -> AudioKitResult<()> {
        if let Some(writer) = self.writer.take() {
            writer.finalize().map_err(mux_err)?;
        }
        debug!(path = %self.path.display(), "wav sink finalized");
        Ok(())
    }
}

/// MP4/M4A sink for AAC access units.
pub struct Mp4Sink {
    path: PathBuf,
    writer: Option<mp4::Mp4Writer<File>>,
    format: Option<TrackFormat>,
    started: bool,
}

impl Mp4Sink {
    /// Create a sink writing to `path`.
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            writer: None,
            format: None,
            started: false,
        }
    }

    fn freq_index(sample_rate: u32) -> mp4::SampleFreqIndex {
        use mp4::SampleFreqIndex::*;
        match sample_rate {
            96_000 => Freq96000,
            88_200 => Freq88200,
            64_000 => Freq64000,
            48_000 => Freq48000,
            44_100 => Freq44100,
            32_000 => Freq32000,
            24_000 => Freq24000,
            22_050 => Freq22050,
            16_000 => Freq16000,
            12_000 => Freq12000,
            11_025 => Freq11025,
            8_000 => Freq8000,
            // AAC has no notion of other rates; closest standard rate.
            _ => Freq44100,
        }
    }
}

impl MediaSink for Mp4Sink {
    fn add_track(&mut self, format: &TrackFormat) -> AudioKitResult<usize> {
        self.format = Some(format.clone());
        Ok(0)
    }

    fn start(&mut self) -> AudioKitResult<()> {
        let format = self
            .format
            .as_ref()
            .ok_or_else(|| mux_err("start called before add_track"))?;
        if self.started {
            return Err(mux_err("sink already started"));
        }
        ensure_parent_dir(&self.path)?;

        let brand = |name: &str| name.parse::<mp4::FourCC>().map_err(mux_err);
        let config = mp4::Mp4Config {
            major_brand: brand("M4A ")?,
            minor_version: 512,
            compatible_brands: vec![brand("M4A ")?, brand("isom")?, brand("mp42")?],
            timescale: 1000,
        };
        let file = File::create(&self.path)?;
        let mut writer = mp4::Mp4Writer::write_start(file, &config).map_err(mux_err)?;

        let track = mp4::TrackConfig {
            track_type: mp4::TrackType::Audio,
            timescale: format.sample_rate,
            language: "und".to_string(),
            media_conf: mp4::MediaConfig::AacConfig(mp4::AacConfig {
                bitrate: format.bit_rate,
                profile: mp4::AudioObjectType::AacLowComplexity,
                freq_index: Self::freq_index(format.sample_rate),
                chan_conf: if format.channels == 1 {
                    mp4::ChannelConfig::Mono
                } else {
                    mp4::ChannelConfig::Stereo
                },
            }),
        };
        writer.add_track(&track).map_err(mux_err)?;

        self.writer = Some(writer);
        self.started = true;
        Ok(())
    }

    fn is_started(&self) -> bool {
        self.started
    }

    fn write_sample(&mut self, _track: usize, sample: &Sample) -> AudioKitResult<()> {
        let format = self
            .format
            .as_ref()
            .ok_or_else(|| mux_err("write before add_track"))?;
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| mux_err("write before start"))?;
        let timescale = format.sample_rate as u64;
        let start_time = sample.pts_us as u128 * timescale as u128 / 1_000_000;
        let mp4_sample = mp4::Mp4Sample {
            start_time: start_time as u64,
            duration: AAC_FRAME_LEN as u32,
            rendering_offset: 0,
            is_sync: sample.flags.sync,
            bytes: Bytes::copy_from_slice(&sample.data),
        };
        writer.write_sample(1, &mp4_sample).map_err(mux_err)?;
        Ok(())
    }

    fn finalize(&mut self) -> AudioKitResult<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.write_end().map_err(mux_err)?;
        }
        debug!(path = %self.path.display(), "mp4 sink finalized");
        Ok(())
    }
}

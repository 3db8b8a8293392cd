//! Media sources: demuxing and sample extraction
//!
//! A [`MediaSource`] opens an input container, selects its audio track, and
//! yields encoded samples in presentation order. Seeking lands on the nearest
//! sync point at or before the target time and reports where it actually
//! landed, which the lossless trim path uses as its rebase origin.

use crate::sample::{Sample, TrackFormat};
use audiokit_core::{AudioKitError, AudioKitResult, PipelineStage};
use std::fs::File;
use std::path::Path;
use symphonia::core::codecs::{
    CodecParameters, CODEC_TYPE_AAC, CODEC_TYPE_FLAC, CODEC_TYPE_MP3, CODEC_TYPE_NULL,
    CODEC_TYPE_OPUS, CODEC_TYPE_VORBIS,
};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::units::{Time, TimeBase};
use tracing::{debug, warn};

/// One track discovered in the input container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackInfo {
    /// Zero-based track index
    pub index: usize,
    /// Track MIME type
    pub mime: String,
}

/// Demuxer abstraction over an opened input file.
pub trait MediaSource: Send {
    /// All tracks found in the container, audio or not.
    fn tracks(&self) -> &[TrackInfo];

    /// Index of the selected audio track.
    fn audio_track_index(&self) -> usize;

    /// Format of the selected audio track.
    fn track_format(&self) -> &TrackFormat;

    /// Next encoded sample from the audio track, or `None` when exhausted.
    fn next_sample(&mut self) -> AudioKitResult<Option<Sample>>;

    /// Seek to the nearest sync point at or before `target_us`.
    ///
    /// Returns the presentation timestamp actually landed on, which may be
    /// earlier than requested.
    fn seek_to_sync(&mut self, target_us: u64) -> AudioKitResult<u64>;
}

/// Map a symphonia codec identifier to the MIME string callers see.
fn mime_for_params(params: &CodecParameters) -> &'static str {
    let codec = params.codec;
    if codec == CODEC_TYPE_MP3 {
        "audio/mpeg"
    } else if codec == CODEC_TYPE_AAC {
        "audio/mp4a-latm"
    } else if codec == CODEC_TYPE_VORBIS {
        "audio/vorbis"
    } else if codec == CODEC_TYPE_FLAC {
        "audio/flac"
    } else if codec == CODEC_TYPE_OPUS {
        "audio/opus"
    } else if codec == CODEC_TYPE_NULL {
        "unknown"
    } else {
        // The PCM family covers the remaining codecs symphonia enables here.
        "audio/wav"
    }
}

/// symphonia-backed [`MediaSource`].
pub struct SymphoniaSource {
    reader: Box<dyn FormatReader>,
    track_id: u32,
    track_index: usize,
    tracks: Vec<TrackInfo>,
    format: TrackFormat,
    time_base: Option<TimeBase>,
    codec_params: CodecParameters,
    exhausted: bool,
}

impl SymphoniaSource {
    /// Open `path`, probe the container, and select its first audio track.
    pub fn open(path: &Path) -> AudioKitResult<Self> {
        let display_path = path.display().to_string();
        let file = File::open(path).map_err(|e| AudioKitError::FileNotReadable {
            path: display_path.clone(),
            reason: e.to_string(),
        })?;
        let file_size = file
            .metadata()
            .map(|m| m.len())
            .unwrap_or_default();

        let mss = MediaSourceStream::new(Box::new(file), Default::default());
        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| AudioKitError::UnreadableContainer {
                path: display_path.clone(),
                reason: e.to_string(),
            })?;
        let reader = probed.format;

        if reader.tracks().is_empty() {
            return Err(AudioKitError::NoTracks { path: display_path });
        }

        let tracks: Vec<TrackInfo> = reader
            .tracks()
            .iter()
            .enumerate()
            .map(|(index, t)| TrackInfo {
                index,
                mime: mime_for_params(&t.codec_params).to_string(),
            })
            .collect();

        let (track_index, track) = reader
            .tracks()
            .iter()
            .enumerate()
            .find(|(_, t)| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| AudioKitError::NoAudioTrack {
                path: display_path.clone(),
                found_tracks: tracks
                    .iter()
                    .map(|t| t.mime.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            })?;

        let params = track.codec_params.clone();
        let track_id = track.id;
        let time_base = params.time_base;
        let sample_rate = params.sample_rate.unwrap_or(44_100);
        let channels = params.channels.map(|c| c.count() as u16).unwrap_or(2);

        let duration_us = match (params.n_frames, time_base) {
            (Some(frames), Some(tb)) => time_to_us(tb.calc_time(frames)),
            (Some(frames), None) => {
                (frames as f64 / sample_rate as f64 * 1_000_000.0) as u64
            }
            _ => 0,
        };

        let bit_rate = TrackFormat::estimate_bit_rate(file_size, duration_us);
        let format = TrackFormat {
            mime: mime_for_params(&params).to_string(),
            sample_rate,
            channels,
            bit_rate,
            duration_us,
        };

        debug!(
            path = %display_path,
            track = track_index,
            mime = %format.mime,
            duration_ms = format.duration_ms(),
            "opened media source"
        );

        Ok(Self {
            reader,
            track_id,
            track_index,
            tracks,
            format,
            time_base,
            codec_params: params,
            exhausted: false,
        })
    }

    /// Codec parameters of the selected track, for building a decoder or a
    /// stream-copy sink from the same backend.
    pub fn codec_params(&self) -> &CodecParameters {
        &self.codec_params
    }

    fn ts_to_us(&self, ts: u64) -> u64 {
        match self.time_base {
            Some(tb) => time_to_us(tb.calc_time(ts)),
            None => {
                (ts as f64 / self.format.sample_rate as f64 * 1_000_000.0) as u64
            }
        }
    }
}

fn time_to_us(time: Time) -> u64 {
    time.seconds * 1_000_000 + (time.frac * 1_000_000.0) as u64
}

impl MediaSource for SymphoniaSource {
    fn tracks(&self) -> &[TrackInfo] {
        &self.tracks
    }

    fn audio_track_index(&self) -> usize {
        self.track_index
    }

    fn track_format(&self) -> &TrackFormat {
        &self.format
    }

    fn next_sample(&mut self) -> AudioKitResult<Option<Sample>> {
        if self.exhausted {
            return Ok(None);
        }
        loop {
            let packet = match self.reader.next_packet() {
                Ok(p) => p,
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    self.exhausted = true;
                    return Ok(None);
                }
                Err(SymphoniaError::ResetRequired) => {
                    warn!("source requested reset mid-stream, treating as end of track");
                    self.exhausted = true;
                    return Ok(None);
                }
                Err(e) => {
                    return Err(AudioKitError::pipeline(
                        PipelineStage::Source,
                        e.to_string(),
                    ))
                }
            };
            if packet.track_id() != self.track_id {
                continue;
            }
            let pts_us = self.ts_to_us(packet.ts());
            // Audio packets decode without prior context; every one is a
            // sync point.
            return Ok(Some(Sample::sync(packet.data.into_vec(), pts_us)));
        }
    }

    fn seek_to_sync(&mut self, target_us: u64) -> AudioKitResult<u64> {
        let seconds = target_us / 1_000_000;
        let frac = (target_us % 1_000_000) as f64 / 1_000_000.0;
        let seeked = self
            .reader
            .seek(
                SeekMode::Coarse,
                SeekTo::Time {
                    time: Time::new(seconds, frac),
                    track_id: Some(self.track_id),
                },
            )
            .map_err(|e| AudioKitError::pipeline(PipelineStage::Source, e.to_string()))?;
        self.exhausted = false;
        let actual_us = self.ts_to_us(seeked.actual_ts);
        debug!(target_us, actual_us, "seeked to sync point");
        Ok(actual_us)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_wav(path: &Path, seconds: u32, sample_rate: u32) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for n in 0..(sample_rate * seconds) {
            writer
                .write_sample(((n as f32 * 0.1).sin() * 9_000.0) as i16)
                .unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_open_reports_track_properties() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        write_wav(&path, 2, 8_000);

        let source = SymphoniaSource::open(&path).unwrap();
        let format = source.track_format();
        assert_eq!(format.sample_rate, 8_000);
        assert_eq!(format.channels, 1);
        assert_eq!(format.mime, "audio/wav");
        assert!(format.duration_ms() >= 1_900 && format.duration_ms() <= 2_100);
        assert!(format.bit_rate > 0);
        assert_eq!(source.tracks().len(), 1);
        assert_eq!(source.audio_track_index(), 0);
    }

    #[test]
    fn test_samples_arrive_in_presentation_order_until_exhausted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        write_wav(&path, 1, 8_000);

        let mut source = SymphoniaSource::open(&path).unwrap();
        let mut last_pts = 0;
        let mut count = 0;
        while let Some(sample) = source.next_sample().unwrap() {
            assert!(sample.pts_us >= last_pts);
            assert!(!sample.data.is_empty());
            last_pts = sample.pts_us;
            count += 1;
        }
        assert!(count > 0);
        // Exhaustion is sticky.
        assert!(source.next_sample().unwrap().is_none());
    }

    #[test]
    fn test_seek_lands_at_or_before_target() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        write_wav(&path, 3, 8_000);

        let mut source = SymphoniaSource::open(&path).unwrap();
        let origin = source.seek_to_sync(1_500_000).unwrap();
        assert!(origin <= 1_500_000);

        let first = source.next_sample().unwrap().unwrap();
        // The first sample after the seek starts at or near the landing spot.
        assert!(first.pts_us + 200_000 >= origin);
    }

    #[test]
    fn test_open_rejects_unparseable_input() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("noise.bin");
        std::fs::write(&path, [0u8; 64]).unwrap();
        let err = SymphoniaSource::open(&path).err().unwrap();
        assert_eq!(err.code(), "UNREADABLE_FILE");
    }

    #[test]
    fn test_open_missing_file_is_not_readable() {
        let err = SymphoniaSource::open(Path::new("/no/such/file.wav")).err().unwrap();
        assert_eq!(err.code(), "FILE_NOT_READABLE");
    }
}

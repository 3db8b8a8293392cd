//! Synchronous operation implementations behind the [`AudioToolkit`] facade.
//!
//! Every operation validates its arguments before opening any file, builds
//! the stage chain for the requested output, and runs the matching pipeline.
//! The async facade methods wrap these on the blocking thread pool.
//!
//! [`AudioToolkit`]: crate::AudioToolkit

use crate::config::ToolkitConfig;
use audiokit_core::{AudioKitError, AudioKitResult, Operation, PipelineStage, ProgressSlot};
use audiokit_media::{
    AudioEncoder, MediaSink, MediaSource, OutputFormat, PcmEncoder, StreamSink, SymphoniaDecoder,
    SymphoniaSource, TrackFormat, WavSink,
};
#[cfg(feature = "aac")]
use audiokit_media::{AacEncoder, AacTransport, Mp4Sink};
use audiokit_pipeline::{
    trim_lossless, trim_transcoding, TranscodePipeline, TrimRange, WaveformExtractor,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Outcome of a conversion or trim.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionResult {
    /// Where the output was written.
    pub output_path: String,
    /// Output duration in milliseconds.
    pub duration_ms: u64,
    /// Bit rate the output was encoded at, in bits per second.
    pub bit_rate: u32,
    /// Sample rate of the output, in Hz.
    pub sample_rate: u32,
}

/// Outcome of waveform extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaveformData {
    /// Peak amplitudes in `[0, 1]`.
    pub amplitudes: Vec<f64>,
    /// Sample rate of the decoded audio, in Hz.
    pub sample_rate: u32,
    /// Source duration in milliseconds.
    pub duration_ms: u64,
    /// Channel count of the decoded audio.
    pub channels: u16,
}

fn require(name: &str, value: &str) -> AudioKitResult<()> {
    if value.trim().is_empty() {
        return Err(AudioKitError::MissingArgument {
            name: name.to_string(),
        });
    }
    Ok(())
}

fn require_input_file(path: &Path) -> AudioKitResult<()> {
    if !path.exists() {
        return Err(AudioKitError::FileNotFound {
            path: path.display().to_string(),
        });
    }
    if std::fs::metadata(path)?.len() == 0 {
        return Err(AudioKitError::EmptyFile {
            path: path.display().to_string(),
        });
    }
    Ok(())
}

/// Open the source and a decoder for its audio track.
fn open_stages(input: &Path) -> AudioKitResult<(SymphoniaSource, SymphoniaDecoder)> {
    let source = SymphoniaSource::open(input)?;
    let decoder = SymphoniaDecoder::new(source.codec_params())?;
    Ok((source, decoder))
}

/// Sample rate/channels the encoder runs at. No resampling happens anywhere;
/// the configured rate only fills in when the source does not declare one.
fn pcm_params(format: &TrackFormat, config: &ToolkitConfig) -> (u32, u16) {
    let rate = if format.sample_rate > 0 {
        format.sample_rate
    } else {
        config.sample_rate
    };
    let channels = format.channels.max(1);
    (rate, channels)
}

/// Build the encoder/sink pair for `format`, or fail with the typed
/// unsupported-format error when the backend is not compiled in.
fn build_output_stages(
    format: OutputFormat,
    sample_rate: u32,
    channels: u16,
    bit_rate: u32,
    output: &Path,
) -> AudioKitResult<(Box<dyn AudioEncoder>, Box<dyn MediaSink>)> {
    match format {
        OutputFormat::Wav => Ok((
            Box::new(PcmEncoder::new(sample_rate, channels)),
            Box::new(WavSink::new(output)),
        )),
        #[cfg(feature = "aac")]
        OutputFormat::Aac => Ok((
            Box::new(AacEncoder::new(
                sample_rate,
                channels,
                bit_rate,
                AacTransport::Adts,
            )?),
            Box::new(StreamSink::new(output)),
        )),
        #[cfg(feature = "aac")]
        OutputFormat::M4a => Ok((
            Box::new(AacEncoder::new(
                sample_rate,
                channels,
                bit_rate,
                AacTransport::Raw,
            )?),
            Box::new(Mp4Sink::new(output)),
        )),
        #[cfg(feature = "mp3")]
        OutputFormat::Mp3 => {
            let encoder = audiokit_media::LameEncoder::new(sample_rate, channels, bit_rate)?;
            Ok((Box::new(encoder), Box::new(StreamSink::new(output))))
        }
        other => Err(AudioKitError::UnsupportedOutputFormat {
            format: other.to_string(),
        }),
    }
}

/// Confirm the pipeline actually produced a usable file.
fn verify_output(path: &Path) -> AudioKitResult<()> {
    let size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
    if size == 0 {
        return Err(AudioKitError::pipeline(
            PipelineStage::Mux,
            format!("output file missing or empty: {}", path.display()),
        ));
    }
    Ok(())
}

pub fn convert_sync(
    config: &ToolkitConfig,
    progress: &ProgressSlot,
    input: &str,
    output: &str,
    format_name: &str,
) -> AudioKitResult<ConversionResult> {
    require("inputPath", input)?;
    require("outputPath", output)?;
    require("format", format_name)?;
    let format = OutputFormat::parse(format_name)?;
    if format == OutputFormat::Copy {
        return Err(AudioKitError::UnsupportedOutputFormat {
            format: "copy (trim only)".to_string(),
        });
    }

    let input_path = Path::new(input);
    let output_path = Path::new(output);
    require_input_file(input_path)?;

    let (source, decoder) = open_stages(input_path)?;
    let source_format = source.track_format().clone();
    let (sample_rate, channels) = pcm_params(&source_format, config);
    let (encoder, sink) =
        build_output_stages(format, sample_rate, channels, config.bit_rate, output_path)?;

    info!(input, output, %format, "converting audio");
    let stats = TranscodePipeline::new(
        Box::new(source),
        Box::new(decoder),
        encoder,
        sink,
        Operation::Convert,
        progress.clone(),
    )
    .with_poll_timeout(config.poll_timeout)
    .run()?;

    verify_output(output_path)?;
    let duration_ms = if source_format.duration_us > 0 {
        source_format.duration_ms()
    } else {
        stats.last_pts_us / 1_000
    };
    Ok(ConversionResult {
        output_path: output.to_string(),
        duration_ms,
        bit_rate: config.bit_rate,
        sample_rate,
    })
}

pub fn trim_sync(
    config: &ToolkitConfig,
    progress: &ProgressSlot,
    input: &str,
    output: &str,
    start_ms: u64,
    end_ms: u64,
    format_name: &str,
) -> AudioKitResult<ConversionResult> {
    require("inputPath", input)?;
    require("outputPath", output)?;
    require("format", format_name)?;
    let format = OutputFormat::parse(format_name)?;
    let range = TrimRange::new(start_ms, end_ms)?;

    let input_path = Path::new(input);
    let output_path = Path::new(output);
    require_input_file(input_path)?;

    if format == OutputFormat::Copy {
        return trim_copy(config, progress, input_path, output, range);
    }

    let (source, decoder) = open_stages(input_path)?;
    let source_format = source.track_format().clone();
    let (sample_rate, channels) = pcm_params(&source_format, config);
    let (encoder, sink) =
        build_output_stages(format, sample_rate, channels, config.bit_rate, output_path)?;

    info!(input, output, start_ms, end_ms, %format, "trimming audio");
    trim_transcoding(
        Box::new(source),
        Box::new(decoder),
        encoder,
        sink,
        range,
        progress.clone(),
        config.poll_timeout,
    )?;

    verify_output(output_path)?;
    Ok(ConversionResult {
        output_path: output.to_string(),
        // The result reports the requested window length, not the timestamp
        // of the last packet, which lands short of the window end.
        duration_ms: range.duration_ms(),
        bit_rate: config.bit_rate,
        sample_rate,
    })
}

/// Lossless trim. Copied samples keep their codec, so the output container
/// is always M4A; the input must be an AAC family format.
#[cfg(feature = "aac")]
fn trim_copy(
    config: &ToolkitConfig,
    progress: &ProgressSlot,
    input_path: &Path,
    output: &str,
    range: TrimRange,
) -> AudioKitResult<ConversionResult> {
    let source = SymphoniaSource::open(input_path)?;
    let source_format = source.track_format().clone();
    let sink = Mp4Sink::new(Path::new(output));

    info!(
        input = %input_path.display(),
        output,
        start_ms = range.start_ms(),
        end_ms = range.end_ms(),
        "trimming audio without re-encode"
    );
    trim_lossless(Box::new(source), Box::new(sink), range, progress.clone())?;

    verify_output(Path::new(output))?;
    // Stream copy keeps the source's encoding parameters.
    Ok(ConversionResult {
        output_path: output.to_string(),
        duration_ms: range.duration_ms(),
        bit_rate: source_format.bit_rate,
        sample_rate: pcm_params(&source_format, config).0,
    })
}

#[cfg(not(feature = "aac"))]
fn trim_copy(
    _config: &ToolkitConfig,
    _progress: &ProgressSlot,
    input_path: &Path,
    _output: &str,
    _range: TrimRange,
) -> AudioKitResult<ConversionResult> {
    let source = SymphoniaSource::open(input_path)?;
    Err(AudioKitError::LosslessUnsupported {
        mime: source.track_format().mime.clone(),
    })
}

pub fn extract_waveform_sync(
    config: &ToolkitConfig,
    progress: &ProgressSlot,
    input: &str,
    samples_per_second: Option<u32>,
) -> AudioKitResult<WaveformData> {
    require("inputPath", input)?;
    let input_path = Path::new(input);
    require_input_file(input_path)?;

    let (source, decoder) = open_stages(input_path)?;
    let waveform = WaveformExtractor::new(
        Box::new(source),
        Box::new(decoder),
        samples_per_second.unwrap_or(config.samples_per_second),
        progress.clone(),
        config.poll_timeout,
    )
    .run()?;

    Ok(WaveformData {
        amplitudes: waveform.amplitudes,
        sample_rate: waveform.sample_rate,
        duration_ms: waveform.duration_ms,
        channels: waveform.channels,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_wav(path: &Path, seconds: u32) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 8_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for n in 0..(8_000 * seconds) {
            writer
                .write_sample(((n as f32 * 0.3).sin() * 10_000.0) as i16)
                .unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_result_records_serialize_camel_case() {
        let result = ConversionResult {
            output_path: "out.m4a".into(),
            duration_ms: 1_200,
            bit_rate: 128_000,
            sample_rate: 44_100,
        };
        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("\"outputPath\":\"out.m4a\""));
        assert!(json.contains("\"durationMs\":1200"));

        let data = WaveformData {
            amplitudes: vec![0.5],
            sample_rate: 44_100,
            duration_ms: 10,
            channels: 2,
        };
        let json = serde_json::to_string(&data).unwrap();
        assert!(json.contains("\"sampleRate\":44100"));
    }

    #[test]
    fn test_convert_rejects_blank_arguments() {
        let config = ToolkitConfig::default();
        let progress = ProgressSlot::new();
        let err = convert_sync(&config, &progress, "", "out.wav", "wav").unwrap_err();
        assert_eq!(err.code(), "INVALID_ARGUMENTS");
        let err = convert_sync(&config, &progress, "in.wav", "  ", "wav").unwrap_err();
        assert_eq!(err.code(), "INVALID_ARGUMENTS");
    }

    #[test]
    fn test_convert_rejects_copy_format() {
        let config = ToolkitConfig::default();
        let progress = ProgressSlot::new();
        let err = convert_sync(&config, &progress, "in.wav", "out.wav", "copy").unwrap_err();
        assert_eq!(err.code(), "UNSUPPORTED_FORMAT");
    }

    #[test]
    fn test_convert_missing_input_is_typed() {
        let config = ToolkitConfig::default();
        let progress = ProgressSlot::new();
        let err =
            convert_sync(&config, &progress, "/nope/in.wav", "/tmp/out.wav", "wav").unwrap_err();
        assert_eq!(err.code(), "FILE_NOT_FOUND");
    }

    #[test]
    fn test_convert_empty_input_is_typed() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("empty.wav");
        std::fs::File::create(&input).unwrap();

        let config = ToolkitConfig::default();
        let progress = ProgressSlot::new();
        let err = convert_sync(
            &config,
            &progress,
            input.to_str().unwrap(),
            dir.path().join("out.wav").to_str().unwrap(),
            "wav",
        )
        .unwrap_err();
        assert_eq!(err.code(), "EMPTY_FILE");
    }

    #[test]
    fn test_convert_wav_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.wav");
        write_wav(&input, 1);
        let output = dir.path().join("nested/out.wav");

        let config = ToolkitConfig::default();
        let progress = ProgressSlot::new();
        let result = convert_sync(
            &config,
            &progress,
            input.to_str().unwrap(),
            output.to_str().unwrap(),
            "wav",
        )
        .unwrap();

        assert!(output.exists());
        assert_eq!(result.sample_rate, 8_000);
        assert_eq!(result.bit_rate, 128_000);
        assert!((900..=1_100).contains(&result.duration_ms));
    }

    #[test]
    fn test_trim_validates_range_before_files() {
        let config = ToolkitConfig::default();
        let progress = ProgressSlot::new();
        // Range check fires even though the input does not exist.
        let err = trim_sync(&config, &progress, "in.wav", "out.wav", 500, 500, "wav").unwrap_err();
        assert_eq!(err.code(), "INVALID_RANGE");
    }

    #[test]
    fn test_lossless_trim_rejects_wav_input() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.wav");
        write_wav(&input, 1);
        let output = dir.path().join("out.m4a");

        let config = ToolkitConfig::default();
        let progress = ProgressSlot::new();
        let err = trim_sync(
            &config,
            &progress,
            input.to_str().unwrap(),
            output.to_str().unwrap(),
            0,
            500,
            "copy",
        )
        .unwrap_err();
        assert_eq!(err.code(), "LOSSLESS_UNSUPPORTED");
    }

    #[test]
    fn test_waveform_defaults_to_config_resolution() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.wav");
        write_wav(&input, 1);

        let config = ToolkitConfig::default();
        let progress = ProgressSlot::new();
        let data =
            extract_waveform_sync(&config, &progress, input.to_str().unwrap(), None).unwrap();
        assert_eq!(data.sample_rate, 8_000);
        assert_eq!(data.channels, 1);
        // One second at the default 100 amplitudes per second.
        assert!((99..=101).contains(&data.amplitudes.len()));
    }
}

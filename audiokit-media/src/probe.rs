//! File inspection: open a file, find its audio track, and report everything
//! callers need to decide what operations apply to it.
//!
//! Inspection never fails with an error. Unreadable or unsuitable files are
//! reported as `is_valid: false` records carrying a human-readable diagnostic,
//! so callers can surface the reason without a separate error channel.

use crate::format::{
    extension_supported, format_diagnostics, supported_for_lossless_trimming,
    supported_for_trimming,
};
use crate::sample::TrackFormat;
use crate::source::{MediaSource, SymphoniaSource};
use audiokit_core::AudioKitError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Everything known about an audio file after probing it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioInfo {
    /// Whether the file holds a usable audio track.
    pub is_valid: bool,
    /// Track duration in milliseconds (0 when unknown).
    pub duration_ms: u64,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Channel count.
    pub channels: u16,
    /// Bit rate in bits per second (estimated from file size when the
    /// container does not declare one).
    pub bit_rate: u32,
    /// MIME type of the audio track, or "unknown".
    pub mime: String,
    /// Zero-based index of the audio track within the container.
    pub track_index: Option<usize>,
    /// File size in bytes.
    pub file_size: u64,
    /// MIME types of every track found in the container.
    pub found_tracks: Vec<String>,
    /// Whether the transcoding trim path accepts this format.
    pub supported_for_trimming: bool,
    /// Whether the convert operation accepts this format as input.
    pub supported_for_conversion: bool,
    /// Whether waveform extraction accepts this format.
    pub supported_for_waveform: bool,
    /// Whether the copy-without-re-encode trim path accepts this format.
    pub supported_for_lossless_trimming: bool,
    /// Human-readable note about the format's capabilities.
    pub format_diagnostics: String,
    /// Why the file is not usable, when `is_valid` is false.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Additional failure detail, when available.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl AudioInfo {
    fn invalid(file_size: u64, error: &str, details: Option<String>) -> Self {
        Self {
            is_valid: false,
            duration_ms: 0,
            sample_rate: 0,
            channels: 0,
            bit_rate: 0,
            mime: "unknown".to_string(),
            track_index: None,
            file_size,
            found_tracks: Vec::new(),
            supported_for_trimming: false,
            supported_for_conversion: false,
            supported_for_waveform: false,
            supported_for_lossless_trimming: false,
            format_diagnostics: String::new(),
            error: Some(error.to_string()),
            details,
        }
    }

    fn valid(format: &TrackFormat, track_index: usize, file_size: u64, found: Vec<String>) -> Self {
        let trimmable = supported_for_trimming(&format.mime);
        Self {
            is_valid: true,
            duration_ms: format.duration_ms(),
            sample_rate: format.sample_rate,
            channels: format.channels,
            bit_rate: format.bit_rate,
            mime: format.mime.clone(),
            track_index: Some(track_index),
            file_size,
            found_tracks: found,
            supported_for_trimming: trimmable,
            supported_for_conversion: trimmable,
            supported_for_waveform: trimmable,
            supported_for_lossless_trimming: supported_for_lossless_trimming(&format.mime),
            format_diagnostics: format_diagnostics(&format.mime),
            error: None,
            details: None,
        }
    }
}

/// Probe `path` and report what it contains. Never returns an error; failures
/// become `is_valid: false` records with a diagnostic message.
pub fn inspect(path: &Path) -> AudioInfo {
    if !path.exists() {
        return AudioInfo::invalid(0, "File does not exist", None);
    }
    let metadata = match std::fs::metadata(path) {
        Ok(m) => m,
        Err(e) => return AudioInfo::invalid(0, "File is not readable", Some(e.to_string())),
    };
    if metadata.len() == 0 {
        return AudioInfo::invalid(0, "File is empty", None);
    }

    let source = match SymphoniaSource::open(path) {
        Ok(source) => source,
        Err(e) => {
            let (message, details) = open_failure(&e);
            return AudioInfo::invalid(metadata.len(), message, details);
        }
    };

    let found = source.tracks().iter().map(|t| t.mime.clone()).collect();
    let info = AudioInfo::valid(
        source.track_format(),
        source.audio_track_index(),
        metadata.len(),
        found,
    );
    debug!(
        path = %path.display(),
        mime = %info.mime,
        duration_ms = info.duration_ms,
        "probed audio file"
    );
    info
}

/// Map an open failure to the diagnostic message and detail text reported
/// in the invalid-file record.
fn open_failure(e: &AudioKitError) -> (&'static str, Option<String>) {
    match e {
        AudioKitError::FileNotReadable { reason, .. } => {
            ("File is not readable", Some(reason.clone()))
        }
        AudioKitError::NoTracks { .. } => ("No tracks found", None),
        AudioKitError::NoAudioTrack { found_tracks, .. } => {
            // The error already carries the comma-joined track list.
            ("No audio track found", Some(found_tracks.clone()))
        }
        other => ("Cannot read audio file", Some(other.to_string())),
    }
}

/// Quick format check by file extension, without opening the file.
pub fn is_format_supported(path: &str) -> bool {
    extension_supported(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_wav(path: &Path, seconds: u32) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 8_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for n in 0..(8_000 * seconds) {
            let value = ((n as f32 * 0.05).sin() * 8_000.0) as i16;
            writer.write_sample(value).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_no_audio_track_details_carry_found_tracks() {
        let err = AudioKitError::NoAudioTrack {
            path: "clip.mp4".to_string(),
            found_tracks: "video/avc, application/x-subrip".to_string(),
        };
        let (message, details) = open_failure(&err);
        assert_eq!(message, "No audio track found");
        assert_eq!(details.as_deref(), Some("video/avc, application/x-subrip"));
    }

    #[test]
    fn test_inspect_missing_file() {
        let info = inspect(Path::new("/nonexistent/audio.wav"));
        assert!(!info.is_valid);
        assert_eq!(info.error.as_deref(), Some("File does not exist"));
    }

    #[test]
    fn test_inspect_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.wav");
        std::fs::File::create(&path).unwrap();
        let info = inspect(&path);
        assert!(!info.is_valid);
        assert_eq!(info.error.as_deref(), Some("File is empty"));
    }

    #[test]
    fn test_inspect_garbage_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.bin");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(&[0xDE, 0xAD, 0xBE, 0xEF, 0x00, 0x01, 0x02, 0x03])
            .unwrap();
        let info = inspect(&path);
        assert!(!info.is_valid);
        assert!(info.error.is_some());
    }

    #[test]
    fn test_inspect_valid_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        write_wav(&path, 2);

        let info = inspect(&path);
        assert!(info.is_valid, "error: {:?}", info.error);
        assert_eq!(info.sample_rate, 8_000);
        assert_eq!(info.channels, 1);
        assert_eq!(info.track_index, Some(0));
        assert!(info.duration_ms >= 1_900 && info.duration_ms <= 2_100);
        assert!(info.file_size > 0);
        assert!(info.supported_for_conversion);
        assert!(!info.supported_for_lossless_trimming);
        assert!(!info.found_tracks.is_empty());
    }

    #[test]
    fn test_serialized_keys_are_camel_case() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        write_wav(&path, 1);
        let info = inspect(&path);
        let json = serde_json::to_string(&info).unwrap();
        assert!(json.contains("\"isValid\":true"));
        assert!(json.contains("\"durationMs\""));
        assert!(json.contains("\"supportedForLosslessTrimming\""));
    }

    #[test]
    fn test_extension_check() {
        assert!(is_format_supported("a.mp3"));
        assert!(is_format_supported("a.M4A"));
        assert!(!is_format_supported("a.txt"));
        assert!(!is_format_supported("noext"));
    }
}

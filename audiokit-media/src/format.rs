//! Output format selection and input format classification
//!
//! The classification tables are static: which input MIME types can be
//! trimmed by transcoding and which can be trimmed by direct stream copy is
//! a property of the codec/container pair, not something learned at runtime.

use audiokit_core::{AudioKitError, AudioKitResult};
use std::path::Path;

/// Requested output format for conversion and trimming.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// AAC-LC in an ADTS stream (`.aac`)
    Aac,
    /// AAC-LC in an MP4 container (`.m4a`)
    M4a,
    /// MPEG layer III stream (`.mp3`)
    Mp3,
    /// PCM in a RIFF/WAVE container (`.wav`)
    Wav,
    /// Lossless stream copy - trim only, keeps the input codec
    Copy,
}

impl OutputFormat {
    /// Parse a caller-supplied format name.
    pub fn parse(name: &str) -> AudioKitResult<Self> {
        match name.to_ascii_lowercase().as_str() {
            "aac" => Ok(OutputFormat::Aac),
            "m4a" | "mp4" => Ok(OutputFormat::M4a),
            "mp3" => Ok(OutputFormat::Mp3),
            "wav" | "wave" => Ok(OutputFormat::Wav),
            "copy" => Ok(OutputFormat::Copy),
            other => Err(AudioKitError::UnsupportedOutputFormat {
                format: other.to_string(),
            }),
        }
    }

    /// MIME type produced by this format.
    pub fn mime(&self) -> &'static str {
        match self {
            OutputFormat::Aac => "audio/aac",
            OutputFormat::M4a => "audio/mp4",
            OutputFormat::Mp3 => "audio/mpeg",
            OutputFormat::Wav => "audio/wav",
            OutputFormat::Copy => "application/octet-stream",
        }
    }

    /// Whether the encoder backend for this format is compiled in.
    ///
    /// Copy needs no encoder and WAV output is always available; AAC and MP3
    /// depend on the `aac` / `mp3` cargo features.
    pub fn encoder_available(&self) -> bool {
        match self {
            OutputFormat::Wav | OutputFormat::Copy => true,
            OutputFormat::Aac | OutputFormat::M4a => cfg!(feature = "aac"),
            OutputFormat::Mp3 => cfg!(feature = "mp3"),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            OutputFormat::Aac => "aac",
            OutputFormat::M4a => "m4a",
            OutputFormat::Mp3 => "mp3",
            OutputFormat::Wav => "wav",
            OutputFormat::Copy => "copy",
        };
        f.write_str(name)
    }
}

/// Whether an input MIME type can be trimmed at all (by transcoding).
pub fn supported_for_trimming(mime: &str) -> bool {
    let mime = mime.to_ascii_lowercase();
    mime.contains("mpeg")
        || mime.contains("mp3")
        || mime.contains("aac")
        || mime.contains("mp4")
        || mime.contains("m4a")
        || mime.contains("wav")
        || mime.contains("wave")
        || mime.contains("ogg")
        || mime.contains("vorbis")
        || mime.contains("flac")
}

/// Whether an input MIME type supports lossless trimming (direct stream
/// copy into an MP4 container).
///
/// Only AAC-family streams are independently extractable into the target
/// container; MP3, WAV and OGG packets cannot be carried verbatim and must
/// go through the transcoding path.
pub fn supported_for_lossless_trimming(mime: &str) -> bool {
    let mime = mime.to_ascii_lowercase();
    mime.contains("mp4") || mime.contains("m4a") || mime.contains("aac")
}

/// Human-readable diagnostic about what the detected format supports.
pub fn format_diagnostics(mime: &str) -> String {
    if supported_for_lossless_trimming(mime) {
        format!("{mime} detected - Supports lossless trimming")
    } else if supported_for_trimming(mime) {
        format!("{mime} detected - Requires conversion for trimming")
    } else {
        format!("Unknown/unsupported format: {mime} - May require conversion")
    }
}

/// Extension-based support heuristic for `is_format_supported`.
///
/// Deliberately shallow - it answers "does the file name look like something
/// we handle" without opening the file.
pub fn extension_supported(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();
    Path::new(&lower)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| matches!(ext, "mp3" | "wav" | "m4a" | "aac" | "mp4" | "ogg" | "flac"))
        .unwrap_or(false)
}

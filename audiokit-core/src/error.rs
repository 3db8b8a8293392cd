//! Error types for audiokit operations
//!
//! Every failure surfaces as a typed [`AudioKitError`] with a stable machine
//! code and free-text detail. Errors are never downgraded to a partial
//! success: a pipeline fault aborts the operation after cleanup has run.

use thiserror::Error;

/// The pipeline stage that a mid-loop fault originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    /// Demuxing / sample extraction from the input container
    Source,
    /// Decoding encoded samples into PCM
    Decode,
    /// Encoding PCM into the target codec
    Encode,
    /// Writing encoded samples into the output container
    Mux,
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PipelineStage::Source => "source",
            PipelineStage::Decode => "decode",
            PipelineStage::Encode => "encode",
            PipelineStage::Mux => "mux",
        };
        f.write_str(name)
    }
}

/// Main error type for audiokit operations
#[derive(Error, Debug)]
pub enum AudioKitError {
    /// A required argument was missing or empty
    #[error("Missing required argument: {name}")]
    MissingArgument {
        /// Argument name
        name: String,
    },

    /// Trim window start is at or beyond the window end
    #[error("Start time must be less than end time ({start_ms}ms >= {end_ms}ms)")]
    InvalidRange {
        /// Requested window start in milliseconds
        start_ms: u64,
        /// Requested window end in milliseconds
        end_ms: u64,
    },

    /// The requested output format is not supported
    #[error("Unsupported output format: {format}")]
    UnsupportedOutputFormat {
        /// Requested format name
        format: String,
    },

    /// Input file does not exist
    #[error("File does not exist: {path}")]
    FileNotFound {
        /// Input path
        path: String,
    },

    /// Input file exists but cannot be read
    #[error("File is not readable: {path} ({reason})")]
    FileNotReadable {
        /// Input path
        path: String,
        /// Underlying reason
        reason: String,
    },

    /// Input file has no content
    #[error("File is empty: {path}")]
    EmptyFile {
        /// Input path
        path: String,
    },

    /// The container holds no tracks at all
    #[error("No tracks found in {path}")]
    NoTracks {
        /// Input path
        path: String,
    },

    /// Tracks are present but none of them carries audio
    #[error("No audio track found in {path} (found: {found_tracks})")]
    NoAudioTrack {
        /// Input path
        path: String,
        /// Comma-joined MIME list of the tracks that were found
        found_tracks: String,
    },

    /// The container could not be parsed
    #[error("Cannot read audio file: {path} ({reason})")]
    UnreadableContainer {
        /// Input path
        path: String,
        /// Parser diagnostic
        reason: String,
    },

    /// Lossless stream copy was requested for a format that cannot carry it
    #[error(
        "Lossless trimming not supported for {mime}: frames are not \
         independently extractable, use a transcoding format instead"
    )]
    LosslessUnsupported {
        /// Input codec MIME
        mime: String,
    },

    /// A mid-loop decode/encode/mux fault
    #[error("Pipeline fault in {stage} stage: {reason}")]
    Pipeline {
        /// The stage the fault originated from
        stage: PipelineStage,
        /// Backend diagnostic
        reason: String,
    },

    /// Codec backend could not be created or configured
    #[error("Codec initialization failed: {codec} - {reason}")]
    CodecInitialization {
        /// Codec name
        codec: String,
        /// Failure reason
        reason: String,
    },

    /// I/O operation failed
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

/// Result type alias for audiokit operations
pub type AudioKitResult<T> = Result<T, AudioKitError>;

/// Error categories for classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Bad or missing arguments, rejected before any resource is opened
    Validation,
    /// Problems opening or inspecting the input
    Resource,
    /// Faults inside the drive loop
    Pipeline,
    /// System-level I/O failures
    System,
}

impl AudioKitError {
    /// Stable machine-readable code for the caller-facing boundary.
    pub fn code(&self) -> &'static str {
        match self {
            AudioKitError::MissingArgument { .. } => "INVALID_ARGUMENTS",
            AudioKitError::InvalidRange { .. } => "INVALID_RANGE",
            AudioKitError::UnsupportedOutputFormat { .. } => "UNSUPPORTED_FORMAT",
            AudioKitError::FileNotFound { .. } => "FILE_NOT_FOUND",
            AudioKitError::FileNotReadable { .. } => "FILE_NOT_READABLE",
            AudioKitError::EmptyFile { .. } => "EMPTY_FILE",
            AudioKitError::NoTracks { .. } => "NO_TRACKS",
            AudioKitError::NoAudioTrack { .. } => "NO_AUDIO_TRACK",
            AudioKitError::UnreadableContainer { .. } => "UNREADABLE_FILE",
            AudioKitError::LosslessUnsupported { .. } => "LOSSLESS_UNSUPPORTED",
            AudioKitError::Pipeline { stage, .. } => match stage {
                PipelineStage::Source => "SOURCE_ERROR",
                PipelineStage::Decode => "DECODE_ERROR",
                PipelineStage::Encode => "ENCODE_ERROR",
                PipelineStage::Mux => "MUX_ERROR",
            },
            AudioKitError::CodecInitialization { .. } => "CODEC_INIT_ERROR",
            AudioKitError::Io { .. } => "IO_ERROR",
        }
    }

    /// Get error category
    pub fn category(&self) -> ErrorCategory {
        match self {
            AudioKitError::MissingArgument { .. }
            | AudioKitError::InvalidRange { .. }
            | AudioKitError::UnsupportedOutputFormat { .. } => ErrorCategory::Validation,
            AudioKitError::FileNotFound { .. }
            | AudioKitError::FileNotReadable { .. }
            | AudioKitError::EmptyFile { .. }
            | AudioKitError::NoTracks { .. }
            | AudioKitError::NoAudioTrack { .. }
            | AudioKitError::UnreadableContainer { .. }
            | AudioKitError::LosslessUnsupported { .. } => ErrorCategory::Resource,
            AudioKitError::Pipeline { .. } | AudioKitError::CodecInitialization { .. } => {
                ErrorCategory::Pipeline
            }
            AudioKitError::Io { .. } => ErrorCategory::System,
        }
    }

    /// Whether the error was detected before any resource was opened.
    pub fn is_validation(&self) -> bool {
        self.category() == ErrorCategory::Validation
    }

    /// Convenience constructor for pipeline faults.
    pub fn pipeline(stage: PipelineStage, reason: impl Into<String>) -> Self {
        AudioKitError::Pipeline {
            stage,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_stable() {
        let err = AudioKitError::InvalidRange {
            start_ms: 5000,
            end_ms: 2000,
        };
        assert_eq!(err.code(), "INVALID_RANGE");
        assert_eq!(err.category(), ErrorCategory::Validation);
        assert!(err.is_validation());

        let err = AudioKitError::FileNotFound {
            path: "/tmp/missing.mp3".into(),
        };
        assert_eq!(err.code(), "FILE_NOT_FOUND");
        assert_eq!(err.category(), ErrorCategory::Resource);
    }

    #[test]
    fn test_pipeline_stage_in_message() {
        let err = AudioKitError::pipeline(PipelineStage::Encode, "buffer rejected");
        assert_eq!(err.code(), "ENCODE_ERROR");
        assert!(err.to_string().contains("encode stage"));
    }

    #[test]
    fn test_error_from_io() {
        let io_error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err = AudioKitError::from(io_error);
        match err {
            AudioKitError::Io { .. } => (),
            _ => panic!("Expected Io error variant"),
        }
    }
}

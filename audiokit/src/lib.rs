//! # AudioKit - Audio Conversion, Trimming, and Waveform Toolkit
//!
//! AudioKit converts audio files between formats (AAC/M4A, MP3, WAV), trims
//! a time range out of a file either by re-encoding or by lossless stream
//! copy, extracts normalized waveform amplitudes for display, and probes
//! files for their audio properties.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use audiokit::AudioToolkit;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let toolkit = AudioToolkit::new();
//!
//!     // Watch progress while operations run
//!     let mut events = toolkit.progress_events();
//!     tokio::spawn(async move {
//!         while let Some(update) = events.recv().await {
//!             println!("{:?}: {:.0}%", update.operation, update.progress * 100.0);
//!         }
//!     });
//!
//!     // Convert to M4A, then cut out the first ten seconds
//!     let converted = toolkit.convert("talk.mp3", "talk.m4a", "m4a").await?;
//!     println!("wrote {} ({} ms)", converted.output_path, converted.duration_ms);
//!     toolkit.trim("talk.m4a", "intro.m4a", 0, 10_000, "copy").await?;
//!
//!     // Amplitudes for a waveform view
//!     let waveform = toolkit.extract_waveform("talk.m4a", None).await?;
//!     println!("{} amplitudes", waveform.amplitudes.len());
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]

pub mod config;
pub mod event;
pub mod ops;

// Re-export the layered crates' public surface.
pub use audiokit_core::{
    AudioKitError, AudioKitResult, ErrorCategory, Operation, PipelineStage, ProgressSlot,
    ProgressUpdate,
};
pub use audiokit_media::{inspect, AudioInfo, OutputFormat};
pub use audiokit_pipeline::{PipelineStats, TimeWindow, TrimRange, Waveform};

pub use config::ToolkitConfig;
pub use ops::{ConversionResult, WaveformData};

use std::path::Path;
use tokio::sync::mpsc;

fn join_error(e: tokio::task::JoinError) -> AudioKitError {
    AudioKitError::Io {
        source: std::io::Error::other(format!("worker task failed: {e}")),
    }
}

/// Entry point for every toolkit operation.
///
/// Holds the configured defaults and the single progress listener slot shared
/// by all operations started through this instance. Cloning is cheap and the
/// clones share the progress slot.
#[derive(Debug, Clone, Default)]
pub struct AudioToolkit {
    config: ToolkitConfig,
    progress: ProgressSlot,
}

impl AudioToolkit {
    /// Create a toolkit with default configuration.
    pub fn new() -> Self {
        Self::with_config(ToolkitConfig::default())
    }

    /// Create a toolkit with custom configuration.
    pub fn with_config(config: ToolkitConfig) -> Self {
        Self {
            config,
            progress: ProgressSlot::new(),
        }
    }

    /// Current configuration.
    pub fn config(&self) -> &ToolkitConfig {
        &self.config
    }

    /// Install a progress listener, replacing any previous one.
    pub fn on_progress<F>(&self, listener: F)
    where
        F: Fn(ProgressUpdate) + Send + Sync + 'static,
    {
        self.progress.attach(listener);
    }

    /// Remove the installed progress listener, if any.
    pub fn clear_progress(&self) {
        self.progress.detach();
    }

    /// Receive progress as an async stream. Replaces any listener installed
    /// through [`AudioToolkit::on_progress`].
    pub fn progress_events(&self) -> mpsc::UnboundedReceiver<ProgressUpdate> {
        event::subscribe(&self.progress)
    }

    /// Convert `input` to `format` ("aac", "m4a", "mp3", or "wav"), writing
    /// the result to `output`.
    pub async fn convert(
        &self,
        input: &str,
        output: &str,
        format: &str,
    ) -> AudioKitResult<ConversionResult> {
        let config = self.config.clone();
        let progress = self.progress.clone();
        let (input, output, format) = (input.to_string(), output.to_string(), format.to_string());
        tokio::task::spawn_blocking(move || {
            ops::convert_sync(&config, &progress, &input, &output, &format)
        })
        .await
        .map_err(join_error)?
    }

    /// Cut `[start_ms, end_ms)` out of `input` into `output`. Pass "copy" as
    /// `format` for lossless stream copy (AAC family inputs only), or an
    /// encoder format name to trim by re-encoding.
    pub async fn trim(
        &self,
        input: &str,
        output: &str,
        start_ms: u64,
        end_ms: u64,
        format: &str,
    ) -> AudioKitResult<ConversionResult> {
        let config = self.config.clone();
        let progress = self.progress.clone();
        let (input, output, format) = (input.to_string(), output.to_string(), format.to_string());
        tokio::task::spawn_blocking(move || {
            ops::trim_sync(
                &config, &progress, &input, &output, start_ms, end_ms, &format,
            )
        })
        .await
        .map_err(join_error)?
    }

    /// Extract peak amplitudes from `input`. `samples_per_second` overrides
    /// the configured waveform resolution.
    pub async fn extract_waveform(
        &self,
        input: &str,
        samples_per_second: Option<u32>,
    ) -> AudioKitResult<WaveformData> {
        let config = self.config.clone();
        let progress = self.progress.clone();
        let input = input.to_string();
        tokio::task::spawn_blocking(move || {
            ops::extract_waveform_sync(&config, &progress, &input, samples_per_second)
        })
        .await
        .map_err(join_error)?
    }

    /// Probe `input` and report its audio properties. Unreadable files come
    /// back as records with `is_valid: false` rather than errors.
    pub async fn audio_info(&self, input: &str) -> AudioKitResult<AudioInfo> {
        let input = input.to_string();
        tokio::task::spawn_blocking(move || audiokit_media::inspect(Path::new(&input)))
            .await
            .map_err(join_error)
    }

    /// Quick extension-based check for whether `path` names a supported
    /// audio format. Does not open the file.
    pub fn is_format_supported(&self, path: &str) -> bool {
        audiokit_media::is_format_supported(path)
    }
}

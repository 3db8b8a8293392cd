//! Facade-level integration tests over the always-available WAV path.

use audiokit::{AudioToolkit, Operation, ToolkitConfig};
use std::path::{Path, PathBuf};

fn sine_fixture(dir: &Path, name: &str, seconds: u32) -> PathBuf {
    let path = dir.join(name);
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 8_000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&path, spec).unwrap();
    for n in 0..(8_000 * seconds) {
        let t = n as f32 / 8_000.0;
        let value = ((t * 330.0 * 2.0 * std::f32::consts::PI).sin() * 14_000.0) as i16;
        writer.write_sample(value).unwrap();
    }
    writer.finalize().unwrap();
    path
}

#[tokio::test]
async fn test_convert_reports_metadata_and_writes_file() {
    let dir = tempfile::tempdir().unwrap();
    let input = sine_fixture(dir.path(), "in.wav", 2);
    let output = dir.path().join("out.wav");

    let toolkit = AudioToolkit::new();
    let result = toolkit
        .convert(input.to_str().unwrap(), output.to_str().unwrap(), "wav")
        .await
        .unwrap();

    assert!(output.exists());
    assert_eq!(result.sample_rate, 8_000);
    assert!((1_900..=2_100).contains(&result.duration_ms));
}

#[tokio::test]
async fn test_convert_streams_progress_to_completion() {
    let dir = tempfile::tempdir().unwrap();
    let input = sine_fixture(dir.path(), "in.wav", 1);
    let output = dir.path().join("out.wav");

    let toolkit = AudioToolkit::new();
    let mut events = toolkit.progress_events();

    toolkit
        .convert(input.to_str().unwrap(), output.to_str().unwrap(), "wav")
        .await
        .unwrap();

    let mut last = None;
    while let Ok(update) = events.try_recv() {
        assert_eq!(update.operation, Operation::Convert);
        assert!((0.0..=1.0).contains(&update.progress));
        last = Some(update.progress);
    }
    assert_eq!(last, Some(1.0));
}

#[tokio::test]
async fn test_trim_produces_shorter_output() {
    let dir = tempfile::tempdir().unwrap();
    let input = sine_fixture(dir.path(), "in.wav", 3);
    let output = dir.path().join("cut.wav");

    let toolkit = AudioToolkit::new();
    let result = toolkit
        .trim(
            input.to_str().unwrap(),
            output.to_str().unwrap(),
            1_000,
            2_000,
            "wav",
        )
        .await
        .unwrap();

    assert!(output.exists());
    // The reported duration is the requested window length.
    assert_eq!(result.duration_ms, 1_000);
}

#[cfg(feature = "aac")]
#[tokio::test]
async fn test_trim_copy_round_trip_over_m4a() {
    let dir = tempfile::tempdir().unwrap();
    let input = sine_fixture(dir.path(), "in.wav", 3);
    let encoded = dir.path().join("full.m4a");
    let trimmed = dir.path().join("cut.m4a");

    let toolkit = AudioToolkit::new();
    toolkit
        .convert(input.to_str().unwrap(), encoded.to_str().unwrap(), "m4a")
        .await
        .unwrap();

    let result = toolkit
        .trim(
            encoded.to_str().unwrap(),
            trimmed.to_str().unwrap(),
            500,
            1_500,
            "copy",
        )
        .await
        .unwrap();

    assert!(trimmed.exists());
    assert_eq!(result.duration_ms, 1_000);

    let info = toolkit.audio_info(trimmed.to_str().unwrap()).await.unwrap();
    assert!(info.is_valid, "trimmed file failed inspection: {:?}", info.error);
    assert_eq!(info.sample_rate, 8_000);
}

#[tokio::test]
async fn test_trim_rejects_unknown_format() {
    let toolkit = AudioToolkit::new();
    let err = toolkit
        .trim("in.wav", "out.xyz", 0, 1_000, "xyz")
        .await
        .unwrap_err();
    assert_eq!(err.code(), "UNSUPPORTED_FORMAT");
}

#[tokio::test]
async fn test_waveform_resolution_override() {
    let dir = tempfile::tempdir().unwrap();
    let input = sine_fixture(dir.path(), "in.wav", 2);

    let toolkit = AudioToolkit::with_config(ToolkitConfig::default());
    let data = toolkit
        .extract_waveform(input.to_str().unwrap(), Some(10))
        .await
        .unwrap();

    // 2 seconds at 10 amplitudes per second.
    assert!((19..=21).contains(&data.amplitudes.len()));
    assert!(data.amplitudes.iter().all(|a| (0.0..=1.0).contains(a)));
}

#[tokio::test]
async fn test_audio_info_valid_and_invalid() {
    let dir = tempfile::tempdir().unwrap();
    let input = sine_fixture(dir.path(), "in.wav", 1);

    let toolkit = AudioToolkit::new();
    let info = toolkit.audio_info(input.to_str().unwrap()).await.unwrap();
    assert!(info.is_valid);
    assert_eq!(info.sample_rate, 8_000);

    let missing = toolkit.audio_info("/does/not/exist.wav").await.unwrap();
    assert!(!missing.is_valid);
    assert_eq!(missing.error.as_deref(), Some("File does not exist"));
}

#[tokio::test]
async fn test_format_support_by_extension() {
    let toolkit = AudioToolkit::new();
    assert!(toolkit.is_format_supported("song.mp3"));
    assert!(toolkit.is_format_supported("SONG.M4A"));
    assert!(!toolkit.is_format_supported("notes.txt"));
}

//! Waveform extraction demo
//!
//! Prints a crude terminal rendering of a file's amplitude envelope.
//!
//! Usage: waveform_demo <input> [samples_per_second]

use audiokit::AudioToolkit;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        eprintln!("usage: waveform_demo <input> [samples_per_second]");
        std::process::exit(2);
    }
    let input = &args[1];
    let samples_per_second = args.get(2).map(|s| s.parse()).transpose()?;

    let toolkit = AudioToolkit::new();
    let waveform = toolkit.extract_waveform(input, samples_per_second).await?;

    println!(
        "{} amplitudes over {} ms ({} Hz, {} ch)",
        waveform.amplitudes.len(),
        waveform.duration_ms,
        waveform.sample_rate,
        waveform.channels
    );

    const BARS: [&str; 8] = [" ", "▁", "▂", "▃", "▄", "▅", "▆", "▇"];
    let line: String = waveform
        .amplitudes
        .iter()
        .map(|a| BARS[((a * 7.0).round() as usize).min(7)])
        .collect();
    println!("{line}");

    Ok(())
}

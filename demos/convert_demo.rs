//! Convert and trim demo
//!
//! Converts an input file to the requested format while printing progress,
//! then cuts a range out of the result.
//!
//! Usage: convert_demo <input> <output> <format> [start_ms end_ms]

use audiokit::AudioToolkit;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 4 {
        eprintln!("usage: convert_demo <input> <output> <format> [start_ms end_ms]");
        std::process::exit(2);
    }
    let (input, output, format) = (&args[1], &args[2], &args[3]);

    let toolkit = AudioToolkit::new();

    let info = toolkit.audio_info(input).await?;
    if !info.is_valid {
        eprintln!(
            "cannot process {input}: {}",
            info.error.unwrap_or_else(|| "unknown error".into())
        );
        std::process::exit(1);
    }
    println!(
        "input: {} | {} Hz, {} ch, {} ms",
        info.mime, info.sample_rate, info.channels, info.duration_ms
    );

    let mut events = toolkit.progress_events();
    tokio::spawn(async move {
        while let Some(update) = events.recv().await {
            print!("\r{:?}: {:>3.0}%", update.operation, update.progress * 100.0);
        }
    });

    let result = toolkit.convert(input, output, format).await?;
    println!(
        "\nwrote {} ({} ms at {} bps)",
        result.output_path, result.duration_ms, result.bit_rate
    );

    if args.len() >= 6 {
        let start_ms: u64 = args[4].parse()?;
        let end_ms: u64 = args[5].parse()?;
        let trimmed_path = format!("{output}.trimmed.{format}");
        let trimmed = toolkit
            .trim(output, &trimmed_path, start_ms, end_ms, format)
            .await?;
        println!(
            "trimmed [{start_ms}, {end_ms}) ms into {} ({} ms)",
            trimmed.output_path, trimmed.duration_ms
        );
    }

    Ok(())
}

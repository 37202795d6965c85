//! # Spectral - headless instrument tuner
//!
//! Captures the default microphone, turns each ~16 ms tick into a byte
//! magnitude spectrum and runs it through the analysis pipeline.
//!
//! ## Architecture
//! - **Audio Thread**: CPAL callback forwarding sample blocks
//! - **Main Thread**: tick loop owning the spectrum source and the pipeline
//! - **Communication**: bounded crossbeam channel; blocks are dropped, never queued

mod audio;

use anyhow::{Context, Result, bail};
use clap::Parser;
use cpal::traits::StreamTrait;
use serde::Serialize;
use spectral_core::{
    AnalyserSource, AnalyzerConfig, Pipeline, SessionSummary, TickOutcome, TuningResult,
    tuning::MovingAverage,
};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Samples per block forwarded from the audio callback.
const CAPTURE_BLOCK_SIZE: usize = 256;
/// Interval between pipeline ticks (~60 Hz).
const TICK_INTERVAL: Duration = Duration::from_millis(16);
/// Live readings are logged every this many ticks.
const REPORT_EVERY: usize = 15;

#[derive(Parser, Debug)]
#[command(name = "spectral", version, about = "Real-time pitch and tuning analysis from the microphone")]
struct Args {
    /// JSON configuration file; defaults are used when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Length of the recording session in seconds
    #[arg(short, long, default_value_t = 5.0)]
    seconds: f32,

    /// Write the default configuration to this path and exit
    #[arg(long, value_name = "PATH")]
    write_config: Option<PathBuf>,

    /// Print the session report as JSON
    #[arg(long)]
    json: bool,
}

/// What gets printed when a session ends.
#[derive(Debug, Serialize)]
struct SessionReport<'a> {
    summary: &'a SessionSummary,
    tuning: Option<TuningResult>,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "spectral_cli=info,spectral_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    if let Some(path) = &args.write_config {
        AnalyzerConfig::default().save(path)?;
        info!(path = %path.display(), "default configuration written");
        return Ok(());
    }

    let mut config = match &args.config {
        Some(path) => AnalyzerConfig::load(path)?,
        None => AnalyzerConfig::default(),
    };

    let (block_tx, block_rx) = crossbeam_channel::bounded::<Vec<f32>>(16);
    let (stream, sample_rate) =
        audio::start_audio_capture(block_tx, config.sample_rate, CAPTURE_BLOCK_SIZE)
            .context("starting audio capture")?;

    if sample_rate != config.sample_rate {
        warn!(
            requested = config.sample_rate,
            actual = sample_rate,
            "device does not support the configured sample rate"
        );
        config.sample_rate = sample_rate;
    }

    let mut display_average =
        (config.display_average_window > 0).then(|| MovingAverage::new(config.display_average_window));
    let mut source = AnalyserSource::new(config.sample_rate, config.fft_size);
    let mut pipeline = Pipeline::new(config).context("creating analysis pipeline")?;

    let session_length =
        Duration::try_from_secs_f32(args.seconds).context("invalid session length")?;
    if session_length.is_zero() {
        bail!("session length must be greater than zero");
    }
    let ticker = crossbeam_channel::tick(TICK_INTERVAL);
    let started = Instant::now();
    info!(seconds = args.seconds, "recording; play a single sustained note");

    let mut tick_count = 0usize;
    loop {
        ticker.recv().context("tick channel closed")?;
        tick_count += 1;

        while let Ok(block) = block_rx.try_recv() {
            source.push_samples(&block);
        }
        source.set_recording(started.elapsed() < session_length);

        match pipeline.tick_source(&mut source)? {
            TickOutcome::Live(frequency) => {
                let shown = match display_average.as_mut() {
                    Some(average) => average.push(frequency),
                    None => frequency,
                };
                if tick_count % REPORT_EVERY == 0 {
                    match pipeline.tuning_for(shown) {
                        Some(t) => info!(
                            "{:8.2} Hz  {:<4} {:+7.2} cents  {}",
                            shown, t.closest_note.name, t.cents_offset, t.state
                        ),
                        None => info!("{:8.2} Hz", shown),
                    }
                }
            }
            TickOutcome::Skipped(_) | TickOutcome::Idle => {
                if tick_count % REPORT_EVERY == 0 && pipeline.live_frequency().is_none() {
                    info!("detecting...");
                }
            }
            TickOutcome::Finalized(summary) => {
                print_report(
                    &summary,
                    pipeline.final_tuning(),
                    pipeline.config().bin_width_hz(),
                    args.json,
                )?;
                break;
            }
        }
    }

    if let Err(e) = stream.pause() {
        warn!("error pausing stream: {}", e);
    }
    Ok(())
}

fn print_report(
    summary: &SessionSummary,
    tuning: Option<TuningResult>,
    bin_width_hz: f32,
    json: bool,
) -> Result<()> {
    if json {
        let report = SessionReport { summary, tuning };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("frames analysed: {}", summary.frame_count);
    match (summary.frequency, tuning) {
        (Some(frequency), Some(t)) => {
            println!("final frequency: {frequency:.0} Hz");
            println!(
                "closest note:    {} ({:.2} Hz), {:+.2} cents, {}",
                t.closest_note.name, t.closest_note.frequency, t.cents_offset, t.state
            );
        }
        _ => println!("final frequency: unknown (no stable pitch detected)"),
    }

    if let Some((bin, magnitude)) = summary
        .spectrum
        .iter()
        .enumerate()
        .skip(1)
        .max_by(|a, b| a.1.total_cmp(b.1))
    {
        println!(
            "strongest averaged bin: {bin} (~{:.0} Hz, magnitude {magnitude:.1})",
            bin as f32 * bin_width_hz
        );
    }
    Ok(())
}

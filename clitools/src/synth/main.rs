//! Write a synthetic breathing (and optionally pulse) recording as a mono 16-bit WAV file

use std::path::PathBuf;

use anyhow::{ensure, Context, Result};
use clap::Parser;

use rate_dsp::generation::{SyntheticSource, Tone};

#[derive(Parser)]
#[command(name = "synth", about = "Generate a synthetic recording for the rate estimator")]
struct Cli {
    /// Output WAV file
    output: PathBuf,

    #[arg(long, default_value_t = 64)]
    sample_rate: u32,

    #[arg(long, default_value_t = 120)]
    seconds: u32,

    /// Breaths per minute
    #[arg(long, default_value_t = 15.0)]
    breath: f32,

    /// Beats per minute; no pulse when omitted
    #[arg(long)]
    heart: Option<f32>,

    /// Amplitude of the uniform noise added to every sample
    #[arg(long, default_value_t = 0.0)]
    noise: f32,

    #[arg(long, default_value_t = 0)]
    seed: u64,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    ensure!(cli.sample_rate > 0, "sample rate must be positive");

    let fs = cli.sample_rate as f32;
    let mut source = SyntheticSource::breathing(fs, cli.breath, cli.seed).with_noise(cli.noise);
    if let Some(heart) = cli.heart {
        source = source.with_tone(Tone::new(heart, 150.0));
    }

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: cli.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&cli.output, spec)
        .with_context(|| format!("creating {}", cli.output.display()))?;
    let total = cli.sample_rate as usize * cli.seconds as usize;
    for sample in source.take(total) {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    log::info!("wrote {} samples to {}", total, cli.output.display());
    Ok(())
}

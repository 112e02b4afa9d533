//! Stream a recording through the rate estimator and print one line per analysed window
//!
//! Input is a mono 16-bit WAV file, or a text file with one integer sample per line (first
//! comma-separated column) when `--sample-rate` is given.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};

use rate_dsp::config::{round_up_even, DATA_WINDOW, FIXED_POINT, MAX_PEAK_COUNT};
use rate_dsp::crossing::zero_crossing;
use rate_dsp::cwt::{CwtParams, Kernels, OverlapAdd};
use rate_dsp::fft::fftimpl::RustFft;
use rate_dsp::find_peaks::{find_peaks, FindPeaksParams, PeakSet};
use rate_dsp::fixed::{fixed_to_float, float_to_fixed, Fixed};
use rate_dsp::pipeline::estimate;
use rate_dsp::sos::{sosfilt, FilterState};
use rate_dsp::stats::znorm;
use rate_dsp::terma::terma;
use rate_dsp::{ChannelParams, JointChannels, RateEstimate, SingleChannel, Sqi, StreamConfig};

/// FFT size of the overlap-add CWT; fits kernels of up to 1024 samples
const OA_SIZE: usize = 2048;

/// Streaming window lengths compiled in, each `DATA_WINDOW` seconds at a common sample rate
const WINDOWS: [usize; 7] = [1280, 2000, 2560, 5000, 5120, 10000, 10920];

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Breathing rate through the filter/SRMAC front end
    Breath,
    /// Heart rate through the filter/SRMAC front end
    Heart,
    /// Heart and breathing rate from the same input
    Joint,
    /// Breathing rate through the CWT front end
    Cwt,
    /// Breathing rate from prominence-filtered local maxima of the band-passed trace
    Peaks,
    /// Breathing rate through the TERMA detector
    Terma,
}

#[derive(Parser)]
#[command(name = "process", about = "Estimate breathing and heart rate from a recording")]
struct Cli {
    /// WAV or text recording
    input: PathBuf,

    #[arg(long, value_enum, default_value = "breath")]
    mode: Mode,

    /// Samples per second; required for text input, overrides the WAV header otherwise
    #[arg(long)]
    sample_rate: Option<u32>,

    /// Samples between two estimates (defaults to one second)
    #[arg(long)]
    increment: Option<usize>,
}

fn read_wav(path: &Path) -> Result<(Vec<i16>, u32)> {
    let mut reader =
        hound::WavReader::open(path).with_context(|| format!("opening {}", path.display()))?;
    let spec = reader.spec();
    if spec.channels != 1 || spec.bits_per_sample != 16 {
        bail!(
            "expected mono 16-bit audio, got {} channels of {} bits",
            spec.channels,
            spec.bits_per_sample
        );
    }
    let samples = reader.samples::<i16>().collect::<Result<Vec<_>, _>>()?;
    Ok((samples, spec.sample_rate))
}

fn read_text(path: &Path) -> Result<Vec<i16>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut samples = Vec::new();
    for (n, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        let field = line.split(',').next().unwrap_or("").trim();
        if field.is_empty() {
            continue;
        }
        let value: i16 = field
            .parse()
            .with_context(|| format!("line {}: not a 16-bit sample: {:?}", n + 1, field))?;
        samples.push(value);
    }
    Ok(samples)
}

fn format_estimate(est: &RateEstimate) -> String {
    let sqi = match est.sqi {
        Sqi::Score(v) => format!("{:.3}", fixed_to_float(v)),
        Sqi::NoPeaks => "-".to_string(),
        Sqi::Degenerate => "degenerate".to_string(),
    };
    format!("{:6.2} /min  sqi {:>10}  peaks {:3}", fixed_to_float(est.rate), sqi, est.peaks)
}

/// Shortest compiled-in window covering `DATA_WINDOW` seconds at `sample_rate`
fn stream_window(sample_rate: u32) -> Result<usize> {
    let wanted = round_up_even(sample_rate as usize * DATA_WINDOW);
    let Some(&window) = WINDOWS.iter().find(|&&w| w >= wanted) else {
        bail!("no analysis window for {} Hz", sample_rate);
    };
    log::info!(
        "analysis window {} samples ({:.1}s)",
        window,
        window as f32 / sample_rate as f32
    );
    Ok(window)
}

macro_rules! with_window {
    ($window:expr, $run:ident($($arg:expr),*)) => {
        match $window {
            1280 => $run::<1280>($($arg),*),
            2000 => $run::<2000>($($arg),*),
            2560 => $run::<2560>($($arg),*),
            5000 => $run::<5000>($($arg),*),
            5120 => $run::<5120>($($arg),*),
            10000 => $run::<10000>($($arg),*),
            10920 => $run::<10920>($($arg),*),
            w => bail!("unsupported window length {}", w),
        }
    };
}

fn run_single<const WINDOW: usize>(
    samples: &[i16],
    config: StreamConfig,
    params: &ChannelParams,
) -> Result<()> {
    let mut est = Box::new(SingleChannel::<WINDOW>::new(config)?);
    for &s in samples {
        if let Some(r) = est.push(s, params)?.ready() {
            println!("{:5}s  {}", r.time, format_estimate(&r.estimate));
        }
    }
    Ok(())
}

fn run_joint<const WINDOW: usize>(samples: &[i16], config: StreamConfig) -> Result<()> {
    let fs = config.sample_rate as f32;
    let heart = ChannelParams::heart(fs)?;
    let breath = ChannelParams::respiration(fs)?;
    let mut est = Box::new(JointChannels::<WINDOW>::new(config)?);
    for &s in samples {
        if let Some(r) = est.push(s, &heart, &breath)?.ready() {
            println!(
                "{:5}s  heart {}  breath {}",
                r.time,
                format_estimate(&r.heart),
                format_estimate(&r.breath)
            );
        }
    }
    Ok(())
}

/// Whole-recording mean removed, saturating at the fixed point bounds
fn centre(samples: &[i16]) -> Vec<Fixed> {
    let mean = samples.iter().map(|&s| s as i64).sum::<i64>() / samples.len().max(1) as i64;
    samples
        .iter()
        .map(|&s| {
            ((s as i64 - mean) << FIXED_POINT).clamp(Fixed::MIN as i64, Fixed::MAX as i64) as Fixed
        })
        .collect()
}

/// Centre and band-pass the whole recording with the respiration preset
fn breath_band(samples: &[i16], sample_rate: u32) -> Result<Vec<Fixed>> {
    let mut data = centre(samples);
    if data.is_empty() {
        return Ok(data);
    }
    let params: ChannelParams = ChannelParams::respiration(sample_rate as f32)?;
    sosfilt(&mut data, &params.highpass, &mut FilterState::new())?;
    sosfilt(&mut data, &params.lowpass, &mut FilterState::new())?;
    Ok(data)
}

/// Offline analysis over sliding windows of `trace`. `detect` turns each window copy into a
/// detector trace and fills in its peaks.
fn run_windows<F>(trace: &[Fixed], config: StreamConfig, mut detect: F) -> Result<()>
where
    F: FnMut(&mut [Fixed], &mut PeakSet<MAX_PEAK_COUNT>) -> Result<()>,
{
    let fs = config.sample_rate;
    let window = fs as usize * DATA_WINDOW;
    let mut data: Vec<Fixed> = vec![0; window];
    let mut pattern: Vec<Fixed> = vec![0; window];
    let mut peaks = PeakSet::<MAX_PEAK_COUNT>::new();

    let mut end = window;
    while end <= trace.len() {
        data.copy_from_slice(&trace[end - window..end]);
        detect(&mut data, &mut peaks)?;
        let est = estimate(&data, &peaks, fs, &mut pattern)?;
        println!("{:5}s  {}", (end - window) / fs as usize, format_estimate(&est));
        end += config.increment;
    }
    Ok(())
}

fn run_cwt(samples: &[i16], config: StreamConfig) -> Result<()> {
    let fs = config.sample_rate;
    let params = CwtParams::respiration(fs as f32);
    let mut fft = RustFft::new(OA_SIZE);
    let kernels: Box<Kernels<OA_SIZE>> = Box::new(Kernels::new(&params, &mut fft)?);
    let mut oa: Box<OverlapAdd<OA_SIZE>> = Box::new(OverlapAdd::new());

    run_windows(&centre(samples), config, |data, peaks| {
        oa.process_precomputed(data, &kernels, &mut fft)?;
        zero_crossing(data, peaks, fs as usize / 2, 0)?;
        Ok(())
    })
}

fn run_peaks(samples: &[i16], config: StreamConfig) -> Result<()> {
    let fs = config.sample_rate as f32;
    let params = FindPeaksParams {
        prominence: float_to_fixed(0.6),
        heval: float_to_fixed(0.8),
        width: float_to_fixed(0.3 * fs),
        proximity: fs as usize,
    };
    run_windows(&breath_band(samples, config.sample_rate)?, config, |data, peaks| {
        znorm(data)?;
        find_peaks(data, peaks, &params)?;
        Ok(())
    })
}

fn run_terma<const EVENT: usize, const CYCLE: usize>(
    samples: &[i16],
    config: StreamConfig,
) -> Result<()> {
    let width = config.sample_rate as usize * 7 / 10;
    run_windows(&breath_band(samples, config.sample_rate)?, config, |data, peaks| {
        terma::<EVENT, CYCLE>(data, float_to_fixed(0.5))?;
        zero_crossing(data, peaks, width, 0)?;
        Ok(())
    })
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let is_wav = cli.input.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("wav"));
    let (samples, sample_rate) = if is_wav {
        let (samples, header_rate) = read_wav(&cli.input)?;
        (samples, cli.sample_rate.unwrap_or(header_rate))
    } else {
        let Some(rate) = cli.sample_rate else {
            bail!("--sample-rate is required for text input");
        };
        (read_text(&cli.input)?, rate)
    };
    log::info!("{} samples at {} Hz", samples.len(), sample_rate);

    let increment = cli.increment.unwrap_or(sample_rate as usize);
    let config = StreamConfig::new(sample_rate, increment);
    let fs = sample_rate as f32;
    match cli.mode {
        Mode::Breath => {
            let params = ChannelParams::respiration(fs)?;
            with_window!(stream_window(sample_rate)?, run_single(&samples, config, &params))
        }
        Mode::Heart => {
            let params = ChannelParams::heart(fs)?;
            with_window!(stream_window(sample_rate)?, run_single(&samples, config, &params))
        }
        Mode::Joint => with_window!(stream_window(sample_rate)?, run_joint(&samples, config)),
        Mode::Cwt => run_cwt(&samples, config),
        Mode::Peaks => run_peaks(&samples, config),
        // event window of one second, cycle window of three
        Mode::Terma => match sample_rate {
            32 => run_terma::<32, 96>(&samples, config),
            64 => run_terma::<64, 192>(&samples, config),
            128 => run_terma::<128, 384>(&samples, config),
            256 => run_terma::<256, 768>(&samples, config),
            fs => bail!("terma mode supports 32, 64, 128 or 256 Hz, not {}", fs),
        },
    }
}

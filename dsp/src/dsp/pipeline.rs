//! Per-channel analysis: band-pass, SRMAC, zero-crossing, then rate and SQI over the window

use crate::buffer::SlidingBuffer;
use crate::config::{FIXED_POINT, MAX_PEAK_COUNT, MAX_SAMPLE_RATE, MIN_RATE_BPM, SOS_SECTIONS};
use crate::crossing::zero_crossing;
use crate::error::{Error, Result};
use crate::find_peaks::{PeakIndex, PeakSet};
use crate::fixed::{clamp_positive, Fixed};
use crate::sos::{sosfilt, FilterState, Sos};
use crate::sqi::sqi_full;
use crate::srmac::{srmac, SrmacParams, SrmacState};

/// Signal quality attached to a rate estimate
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Sqi {
    Score(Fixed),
    /// Fewer than two peaks in the window
    NoPeaks,
    /// No peak window had any variance
    Degenerate,
}

impl Sqi {
    /// The score as a fixed point value; `NoPeaks` reads as 0 and `Degenerate` has none
    pub fn score(self) -> Option<Fixed> {
        match self {
            Sqi::Score(v) => Some(v),
            Sqi::NoPeaks => Some(0),
            Sqi::Degenerate => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateEstimate {
    /// Events per minute, fixed point
    pub rate: Fixed,
    pub sqi: Sqi,
    /// Number of peaks the estimate was derived from
    pub peaks: usize,
}

/// Events per minute from the average spacing of `peaks`
///
/// With three or more peaks the first one is skipped, since it is the one most likely to have been
/// cut by the start of the window. Returns 0 for fewer than two peaks. The result fits for sample
/// rates up to [`MAX_SAMPLE_RATE`]; above that it saturates at `Fixed::MAX`.
pub fn rate_from_peaks(peaks: &[PeakIndex], sample_rate: u32) -> Fixed {
    let (first, intervals) = match peaks.len() {
        0 | 1 => return 0,
        2 => (peaks[0], 1),
        n => (peaks[1], n - 2),
    };
    let span = peaks[peaks.len() - 1].saturating_sub(first) as i64;
    let interval = (span << FIXED_POINT) / intervals as i64;
    if interval == 0 {
        return 0;
    }
    let per_minute = (60 * sample_rate as i64) << (2 * FIXED_POINT);
    clamp_positive(per_minute / interval)
}

/// Rate and SQI for a window whose peaks are already known
///
/// `pattern` is the scratch space [`sqi_full`] builds its averaged pattern in.
pub fn estimate(
    data: &[Fixed],
    peaks: &[PeakIndex],
    sample_rate: u32,
    pattern: &mut [Fixed],
) -> Result<RateEstimate> {
    if sample_rate == 0 || sample_rate > MAX_SAMPLE_RATE {
        return Err(Error::InvalidArgument("sample rate out of range"));
    }
    if peaks.len() < 2 {
        return Ok(RateEstimate { rate: 0, sqi: Sqi::NoPeaks, peaks: peaks.len() });
    }
    let sqi = match sqi_full(data, peaks, pattern) {
        Ok(v) => Sqi::Score(v),
        Err(Error::NumericDegeneracy) => Sqi::Degenerate,
        Err(e) => return Err(e),
    };
    Ok(RateEstimate { rate: rate_from_peaks(peaks, sample_rate), sqi, peaks: peaks.len() })
}

/// Runtime parameters of one tracked channel
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChannelParams<const SECTIONS: usize = SOS_SECTIONS> {
    pub highpass: Sos<SECTIONS>,
    pub lowpass: Sos<SECTIONS>,
    pub srmac: SrmacParams,
    /// Minimum run length, in samples, for a zero-crossing peak
    pub width: usize,
    pub threshold: Fixed,
}

impl<const SECTIONS: usize> ChannelParams<SECTIONS> {
    /// Band-pass from [`MIN_RATE_BPM`] up to 0.7 Hz (42 breaths per minute)
    pub fn respiration(sample_rate: f32) -> Result<Self> {
        Ok(Self {
            highpass: Sos::butterworth_highpass(sample_rate, MIN_RATE_BPM as f32 / 60.0)?,
            lowpass: Sos::butterworth_lowpass(sample_rate, 0.7)?,
            srmac: SrmacParams::default(),
            width: (sample_rate * 0.5) as usize,
            threshold: 0,
        })
    }

    /// Band-pass from 0.7 Hz to 3.5 Hz (42 to 210 beats per minute)
    pub fn heart(sample_rate: f32) -> Result<Self> {
        Ok(Self {
            highpass: Sos::butterworth_highpass(sample_rate, 0.7)?,
            lowpass: Sos::butterworth_lowpass(sample_rate, 3.5)?,
            srmac: SrmacParams::default(),
            width: (sample_rate * 0.1) as usize,
            threshold: 0,
        })
    }
}

/// Sliding window and filter state for one tracked channel
pub struct Channel<
    const WINDOW: usize,
    const SECTIONS: usize = SOS_SECTIONS,
    const PEAKS: usize = MAX_PEAK_COUNT,
> {
    window: SlidingBuffer<WINDOW>,
    peaks: PeakSet<PEAKS>,
    highpass: FilterState<SECTIONS>,
    lowpass: FilterState<SECTIONS>,
    srmac: SrmacState,
    pattern: [Fixed; WINDOW],
}

impl<const WINDOW: usize, const SECTIONS: usize, const PEAKS: usize>
    Channel<WINDOW, SECTIONS, PEAKS>
{
    pub fn new(increment: usize) -> Result<Self> {
        Ok(Self {
            window: SlidingBuffer::new(increment)?,
            peaks: PeakSet::new(),
            highpass: FilterState::new(),
            lowpass: FilterState::new(),
            srmac: SrmacState::new(),
            pattern: [0; WINDOW],
        })
    }

    pub fn reset(&mut self) {
        self.window.clear();
        self.peaks.clear();
        self.highpass.reset();
        self.lowpass.reset();
        self.srmac.reset();
    }

    pub fn write(&mut self, offset: usize, sample: Fixed) -> Result<()> {
        self.window.write(offset, sample)
    }

    /// The detector trace currently held in the window
    pub fn window(&self) -> &[Fixed] {
        self.window.as_slice()
    }

    /// Peaks found by the last analysis, as indices into the window at that time
    pub fn peaks(&self) -> &[PeakIndex] {
        &self.peaks
    }

    /// Filter the newest increment, find the peaks over the whole window, estimate, then shift
    pub fn analyze(
        &mut self,
        params: &ChannelParams<SECTIONS>,
        sample_rate: u32,
    ) -> Result<RateEstimate> {
        let tail = self.window.tail_mut();
        sosfilt(tail, &params.highpass, &mut self.highpass)?;
        sosfilt(tail, &params.lowpass, &mut self.lowpass)?;
        srmac(tail, &params.srmac, &mut self.srmac)?;

        let data = self.window.as_slice();
        zero_crossing(data, &mut self.peaks, params.width, params.threshold)?;
        let result = estimate(data, &self.peaks, sample_rate, &mut self.pattern)?;

        self.window.shift();
        Ok(result)
    }
}

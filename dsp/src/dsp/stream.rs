//! Sample-by-sample rate estimation
//!
//! Every incoming sample has a running mean removed, is converted to fixed point and appended to
//! the tracked channel windows. Once `increment` samples have arrived since the last analysis,
//! each channel is analysed (see [`Channel::analyze`]) and a result is returned; in between,
//! [`Status::Accumulating`] is returned.

use crate::config::{
    DATA_WINDOW, DELTA_SAMPLES, FIXED_POINT, MAIN_BUF_SIZE, MAX_PEAK_COUNT, SAMPLE_RATE,
    SOS_SECTIONS,
};
pub use crate::config::MAX_SAMPLE_RATE;
use crate::error::{Error, Result};
use crate::find_peaks::MAX_SIGNAL_LEN;
use crate::fixed::Fixed;
use crate::pipeline::{Channel, ChannelParams, RateEstimate};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StreamConfig {
    /// Samples per second
    pub sample_rate: u32,
    /// Samples between two analyses
    pub increment: usize,
    /// Number of samples after which the running mean uses a fixed divisor
    pub mean_horizon: u32,
}

impl StreamConfig {
    /// Running mean horizon of three analysis windows
    pub const fn new(sample_rate: u32, increment: usize) -> Self {
        Self { sample_rate, increment, mean_horizon: sample_rate * DATA_WINDOW as u32 * 3 }
    }

    fn validate(&self, window: usize) -> Result<()> {
        if window > MAX_SIGNAL_LEN {
            return Err(Error::InvalidArgument("window longer than the peak index range"));
        }
        if self.sample_rate == 0 || self.sample_rate > MAX_SAMPLE_RATE {
            return Err(Error::InvalidArgument("sample rate out of range"));
        }
        if self.increment == 0 || self.increment > window {
            return Err(Error::InvalidArgument("increment must be within 1..=window"));
        }
        if self.mean_horizon == 0 {
            return Err(Error::InvalidArgument("running mean horizon must be positive"));
        }
        Ok(())
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self::new(SAMPLE_RATE, DELTA_SAMPLES)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status<T> {
    Accumulating,
    Ready(T),
}

impl<T> Status<T> {
    pub fn is_ready(&self) -> bool {
        matches!(self, Status::Ready(_))
    }

    pub fn ready(self) -> Option<T> {
        match self {
            Status::Ready(v) => Some(v),
            Status::Accumulating => None,
        }
    }
}

/// DC estimate whose divisor grows with the sample count until it reaches the horizon
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunningMean {
    sum: i64,
    mean: i64,
    count: u32,
}

impl RunningMean {
    pub const fn new() -> Self {
        Self { sum: 0, mean: 0, count: 0 }
    }

    /// Fold in `sample` and return the updated mean
    pub fn update(&mut self, sample: i16, horizon: u32) -> i64 {
        if self.count < horizon {
            self.count += 1;
            self.sum += sample as i64;
            self.mean = self.sum / self.count as i64;
        } else {
            self.sum += sample as i64 - self.mean;
            self.mean = self.sum / horizon as i64;
        }
        self.mean
    }

    pub fn mean(&self) -> i64 {
        self.mean
    }
}

/// Sample intake shared by every tracked channel: DC removal and the increment counter
#[derive(Clone, Copy, Debug)]
struct Intake {
    config: StreamConfig,
    mean: RunningMean,
    delta: usize,
    total: u64,
}

impl Intake {
    fn new(config: StreamConfig) -> Self {
        Self { config, mean: RunningMean::new(), delta: 0, total: 0 }
    }

    /// Returns the offset to write at and the centred fixed point sample. A swing of more than
    /// the `i16` range saturates at the fixed point bounds.
    fn accept(&mut self, sample: i16) -> (usize, Fixed) {
        let mean = self.mean.update(sample, self.config.mean_horizon);
        let centred = ((sample as i64 - mean) << FIXED_POINT)
            .clamp(Fixed::MIN as i64, Fixed::MAX as i64) as Fixed;
        let offset = self.delta;
        self.delta += 1;
        self.total += 1;
        (offset, centred)
    }

    /// If the increment just completed, restart it and return the time marker in seconds
    fn boundary(&mut self) -> Option<u32> {
        if self.delta < self.config.increment {
            return None;
        }
        self.delta = 0;
        let elapsed = self.total - self.config.increment as u64;
        Some((elapsed / self.config.sample_rate as u64) as u32)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SingleEstimate {
    pub estimate: RateEstimate,
    /// Seconds from the start of the stream to the start of the newest increment
    pub time: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct JointEstimate {
    pub heart: RateEstimate,
    pub breath: RateEstimate,
    pub time: u32,
}

/// Rate estimation on a single channel
pub struct SingleChannel<
    const WINDOW: usize = MAIN_BUF_SIZE,
    const SECTIONS: usize = SOS_SECTIONS,
    const PEAKS: usize = MAX_PEAK_COUNT,
> {
    intake: Intake,
    channel: Channel<WINDOW, SECTIONS, PEAKS>,
}

impl<const WINDOW: usize, const SECTIONS: usize, const PEAKS: usize>
    SingleChannel<WINDOW, SECTIONS, PEAKS>
{
    pub fn new(config: StreamConfig) -> Result<Self> {
        config.validate(WINDOW)?;
        Ok(Self { intake: Intake::new(config), channel: Channel::new(config.increment)? })
    }

    pub fn config(&self) -> &StreamConfig {
        &self.intake.config
    }

    pub fn channel(&self) -> &Channel<WINDOW, SECTIONS, PEAKS> {
        &self.channel
    }

    pub fn reset(&mut self) {
        self.intake = Intake::new(self.intake.config);
        self.channel.reset();
    }

    pub fn push(
        &mut self,
        sample: i16,
        params: &ChannelParams<SECTIONS>,
    ) -> Result<Status<SingleEstimate>> {
        let (offset, value) = self.intake.accept(sample);
        self.channel.write(offset, value)?;

        let Some(time) = self.intake.boundary() else {
            return Ok(Status::Accumulating);
        };
        let estimate = self.channel.analyze(params, self.intake.config.sample_rate)?;
        log::debug!(
            "t={}s: {} peaks, rate {:#x}, sqi {:?}",
            time,
            estimate.peaks,
            estimate.rate,
            estimate.sqi
        );
        Ok(Status::Ready(SingleEstimate { estimate, time }))
    }
}

/// Heart and breathing rate estimation from the same input, sharing the running mean and the
/// increment counter
pub struct JointChannels<
    const WINDOW: usize = MAIN_BUF_SIZE,
    const SECTIONS: usize = SOS_SECTIONS,
    const PEAKS: usize = MAX_PEAK_COUNT,
> {
    intake: Intake,
    heart: Channel<WINDOW, SECTIONS, PEAKS>,
    breath: Channel<WINDOW, SECTIONS, PEAKS>,
}

impl<const WINDOW: usize, const SECTIONS: usize, const PEAKS: usize>
    JointChannels<WINDOW, SECTIONS, PEAKS>
{
    pub fn new(config: StreamConfig) -> Result<Self> {
        config.validate(WINDOW)?;
        Ok(Self {
            intake: Intake::new(config),
            heart: Channel::new(config.increment)?,
            breath: Channel::new(config.increment)?,
        })
    }

    pub fn config(&self) -> &StreamConfig {
        &self.intake.config
    }

    pub fn heart(&self) -> &Channel<WINDOW, SECTIONS, PEAKS> {
        &self.heart
    }

    pub fn breath(&self) -> &Channel<WINDOW, SECTIONS, PEAKS> {
        &self.breath
    }

    pub fn reset(&mut self) {
        self.intake = Intake::new(self.intake.config);
        self.heart.reset();
        self.breath.reset();
    }

    pub fn push(
        &mut self,
        sample: i16,
        heart: &ChannelParams<SECTIONS>,
        breath: &ChannelParams<SECTIONS>,
    ) -> Result<Status<JointEstimate>> {
        let (offset, value) = self.intake.accept(sample);
        self.heart.write(offset, value)?;
        self.breath.write(offset, value)?;

        let Some(time) = self.intake.boundary() else {
            return Ok(Status::Accumulating);
        };
        let sample_rate = self.intake.config.sample_rate;
        let heart = self.heart.analyze(heart, sample_rate)?;
        let breath = self.breath.analyze(breath, sample_rate)?;
        log::debug!(
            "t={}s: heart {} peaks rate {:#x}, breath {} peaks rate {:#x}",
            time,
            heart.peaks,
            heart.rate,
            breath.peaks,
            breath.rate
        );
        Ok(Status::Ready(JointEstimate { heart, breath, time }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn running_mean_grows_then_fixes_divisor() {
        let mut mean = RunningMean::new();
        // first sample must not divide by zero
        assert_eq!(mean.update(10, 4), 10);
        assert_eq!(mean.update(20, 4), 15);
        assert_eq!(mean.update(30, 4), 20);
        assert_eq!(mean.update(40, 4), 25);
        // horizon reached: sum = 100 - 25 + 65
        assert_eq!(mean.update(65, 4), 35);
        assert_eq!(mean.mean(), 35);
    }

    #[test]
    fn config_validation() {
        assert!(SingleChannel::<16, 2, 8>::new(StreamConfig::new(8, 4)).is_ok());
        assert!(SingleChannel::<16, 2, 8>::new(StreamConfig::new(8, 0)).is_err());
        assert!(SingleChannel::<16, 2, 8>::new(StreamConfig::new(8, 17)).is_err());
        assert!(SingleChannel::<16, 2, 8>::new(StreamConfig::new(0, 4)).is_err());
        assert!(SingleChannel::<16, 2, 8>::new(StreamConfig::new(8000, 4)).is_err());
        let config = StreamConfig { mean_horizon: 0, ..StreamConfig::new(8, 4) };
        assert!(JointChannels::<16, 2, 8>::new(config).is_err());
    }

    #[test]
    fn window_must_fit_peak_indices() {
        let config = StreamConfig::new(8, 4);
        assert!(config.validate(MAX_SIGNAL_LEN).is_ok());
        assert!(config.validate(MAX_SIGNAL_LEN + 1).is_err());
    }

    #[test]
    fn large_swings_saturate() {
        let params = ChannelParams::<2>::respiration(8.0).unwrap();
        let mut est = SingleChannel::<32, 2, 8>::new(StreamConfig::new(8, 16)).unwrap();
        for _ in 0..14 {
            est.push(-20000, &params).unwrap();
        }
        // mean is now -17333, so the step is 37333 above it
        assert!(!est.push(20000, &params).unwrap().is_ready());
        assert_eq!(est.channel().window()[30], Fixed::MAX);

        let mut est = SingleChannel::<32, 2, 8>::new(StreamConfig::new(8, 16)).unwrap();
        for _ in 0..14 {
            est.push(20000, &params).unwrap();
        }
        est.push(-20000, &params).unwrap();
        assert_eq!(est.channel().window()[30], Fixed::MIN);

        // within range the centred value is exact
        let mut est = SingleChannel::<32, 2, 8>::new(StreamConfig::new(8, 16)).unwrap();
        est.push(-100, &params).unwrap();
        est.push(100, &params).unwrap();
        assert_eq!(est.channel().window()[17], 100 << FIXED_POINT);
    }

    #[test]
    fn default_config() {
        let config = StreamConfig::default();
        assert_eq!(config.sample_rate, 64);
        assert_eq!(config.increment, 64);
        assert_eq!(config.mean_horizon, crate::config::RUNNING_MEAN_N);
    }

    #[test]
    fn ready_at_every_increment() {
        let params = ChannelParams::<2>::respiration(8.0).unwrap();
        let mut est = SingleChannel::<32, 2, 8>::new(StreamConfig::new(8, 4)).unwrap();
        for i in 0..64u32 {
            let sample = ((i * 37) % 11) as i16 - 5;
            let status = est.push(sample, &params).unwrap();
            assert_eq!(status.is_ready(), (i + 1) % 4 == 0, "sample {i}");
            if let Some(result) = status.ready() {
                assert_eq!(result.time, (i + 1 - 4) / 8);
            }
        }
    }

    #[test]
    fn joint_shares_the_counter() {
        let heart = ChannelParams::<2>::heart(32.0).unwrap();
        let breath = ChannelParams::<2>::respiration(32.0).unwrap();
        let mut est = JointChannels::<64, 2, 16>::new(StreamConfig::new(32, 16)).unwrap();
        let mut ready = 0;
        for i in 0..160 {
            if est.push((i % 7) as i16, &heart, &breath).unwrap().is_ready() {
                ready += 1;
            }
        }
        assert_eq!(ready, 10);
    }

    #[test]
    fn reset_restarts_the_increment() {
        let params = ChannelParams::<2>::respiration(8.0).unwrap();
        let mut est = SingleChannel::<32, 2, 8>::new(StreamConfig::new(8, 4)).unwrap();
        for _ in 0..3 {
            est.push(1, &params).unwrap();
        }
        est.reset();
        for _ in 0..3 {
            assert!(!est.push(1, &params).unwrap().is_ready());
        }
        assert!(est.push(1, &params).unwrap().is_ready());
        assert!(est.channel().window().len() == 32);
    }
}

//! Slope-sum / moving-average crossover detector
//!
//! Two one-pole EMAs with different time constants follow the input. Their difference, smoothed by
//! a third EMA, is an oscillator that goes positive once per event, which is what the
//! zero-crossing extractor looks for.

use crate::config::FIXED_POINT;
use crate::error::{Error, Result};
use crate::fixed::{float_to_fixed, Fixed, ONE};

/// EMA coefficients, as fixed point values in (0, 1]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SrmacParams {
    pub fast: Fixed,
    pub slow: Fixed,
    pub cross: Fixed,
}

impl SrmacParams {
    pub const fn new(fast: Fixed, slow: Fixed, cross: Fixed) -> Self {
        Self { fast, slow, cross }
    }

    pub fn from_float(fast: f32, slow: f32, cross: f32) -> Self {
        Self {
            fast: float_to_fixed(fast),
            slow: float_to_fixed(slow),
            cross: float_to_fixed(cross),
        }
    }

    /// Convert coefficients tuned at `from_rate` to the equivalent ones at `to_rate`, so that the
    /// EMA time constants stay the same in seconds.
    pub fn rescaled(&self, from_rate: f32, to_rate: f32) -> Self {
        let ratio = from_rate / to_rate;
        let convert = |c: Fixed| {
            let a = crate::fixed::fixed_to_float(c);
            float_to_fixed(1.0 - libm::powf(1.0 - a, ratio))
        };
        Self { fast: convert(self.fast), slow: convert(self.slow), cross: convert(self.cross) }
    }
}

impl Default for SrmacParams {
    fn default() -> Self {
        Self::from_float(0.9, 0.3, 0.2)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SrmacState {
    fast: i64,
    slow: i64,
    cross: i64,
}

impl SrmacState {
    pub const fn new() -> Self {
        Self { fast: 0, slow: 0, cross: 0 }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

/// Replace `data` with the crossover oscillator, in place
///
/// The smoothed crossover is clamped at `i32::MAX`; nothing bounds it from below.
pub fn srmac(data: &mut [Fixed], params: &SrmacParams, state: &mut SrmacState) -> Result<()> {
    if data.is_empty() {
        return Err(Error::InvalidArgument("srmac on empty data"));
    }

    let fast_b = (ONE - params.fast) as i64;
    let slow_b = (ONE - params.slow) as i64;
    let cross_b = (ONE - params.cross) as i64;
    let (cf, cs, cc) = (params.fast as i64, params.slow as i64, params.cross as i64);

    for sample in data.iter_mut() {
        let x = *sample as i64;
        state.fast = ((x * cf) >> FIXED_POINT) + ((state.fast * fast_b) >> FIXED_POINT);
        state.slow = ((x * cs) >> FIXED_POINT) + ((state.slow * slow_b) >> FIXED_POINT);
        let cross = (((state.fast - state.slow) * cc) >> FIXED_POINT)
            + ((state.cross * cross_b) >> FIXED_POINT);
        state.cross = cross.min(i32::MAX as i64);
        *sample = state.cross as Fixed;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed::to_fixed;

    #[test]
    fn rejects_empty() {
        assert!(srmac(&mut [], &SrmacParams::default(), &mut SrmacState::new()).is_err());
    }

    #[test]
    fn constant_input_settles_to_zero() {
        let mut data = [to_fixed(50); 400];
        srmac(&mut data, &SrmacParams::default(), &mut SrmacState::new()).unwrap();
        assert!(data[399].abs() < to_fixed(1) / 100);
    }

    #[test]
    fn rising_edge_goes_positive() {
        let mut data = [0; 64];
        for d in data[16..].iter_mut() {
            *d = to_fixed(100);
        }
        srmac(&mut data, &SrmacParams::default(), &mut SrmacState::new()).unwrap();
        assert!(data[..16].iter().all(|&d| d == 0));
        assert!(data[17..22].iter().all(|&d| d > 0));
    }

    #[test]
    fn state_carries_across_calls() {
        let input: [Fixed; 128] = core::array::from_fn(|i| to_fixed((i as i32 % 17) * 3 - 20));
        let params = SrmacParams::default();

        let mut whole = input;
        srmac(&mut whole, &params, &mut SrmacState::new()).unwrap();

        let mut split = input;
        let mut state = SrmacState::new();
        let (a, b) = split.split_at_mut(50);
        srmac(a, &params, &mut state).unwrap();
        srmac(b, &params, &mut state).unwrap();
        assert_eq!(whole, split);
    }

    #[test]
    fn clamps_positive_side_only() {
        // slow coefficient of zero keeps the seeded slow state untouched
        let params = SrmacParams::new(ONE, 0, ONE);
        let mut state = SrmacState { fast: 0, slow: -(1i64 << 40), cross: 0 };
        let mut data = [0];
        srmac(&mut data, &params, &mut state).unwrap();
        assert_eq!(data[0], i32::MAX);

        let mut state = SrmacState { fast: 0, slow: 1i64 << 40, cross: 0 };
        let mut data = [0];
        srmac(&mut data, &params, &mut state).unwrap();
        assert!(state.cross < i32::MIN as i64);
    }

    #[test]
    fn rescale_keeps_time_constant() {
        let params = SrmacParams::from_float(0.5, 0.5, 0.5);
        // twice the sample rate needs 1 - sqrt(0.5)
        let doubled = params.rescaled(64.0, 128.0);
        let expected = float_to_fixed(1.0 - core::f32::consts::FRAC_1_SQRT_2);
        assert!((doubled.fast - expected).abs() <= 2);
        assert_eq!(params.rescaled(64.0, 64.0), params);
    }
}

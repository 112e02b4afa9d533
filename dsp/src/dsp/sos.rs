//! Cascaded second-order-section IIR filtering in fixed point
//!
//! Each section is a direct-form-I biquad with coefficients `[b0, b1, b2, a0, a1, a2]` (a0 is
//! normalised to one and ignored). The delay lines live in a separate [`FilterState`] so that a
//! single set of coefficients can drive any number of independent channels, and so that the
//! state survives from one call to the next.

use biquad::{Coefficients, ToHertz, Type, Q_BUTTERWORTH_F32};

use crate::config::FIXED_POINT;
use crate::error::{Error, Result};
use crate::fixed::{clamp_positive, float_to_fixed, Fixed, ONE};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Sos<const SECTIONS: usize> {
    pub sections: [[Fixed; 6]; SECTIONS],
}

impl<const SECTIONS: usize> Sos<SECTIONS> {
    pub const fn new(sections: [[Fixed; 6]; SECTIONS]) -> Self {
        Self { sections }
    }

    /// Pass-through filter
    pub const fn identity() -> Self {
        Self { sections: [[ONE, 0, 0, ONE, 0, 0]; SECTIONS] }
    }

    /// Quantize a float biquad design into one fixed point section row
    pub fn section_from_biquad(coeffs: &Coefficients<f32>) -> [Fixed; 6] {
        [
            float_to_fixed(coeffs.b0),
            float_to_fixed(coeffs.b1),
            float_to_fixed(coeffs.b2),
            ONE,
            float_to_fixed(coeffs.a1),
            float_to_fixed(coeffs.a2),
        ]
    }

    /// Cascade of identical sections built from one float biquad design
    pub fn from_biquad(coeffs: &Coefficients<f32>) -> Self {
        Self { sections: [Self::section_from_biquad(coeffs); SECTIONS] }
    }

    pub fn butterworth_lowpass(sample_rate: f32, cutoff: f32) -> Result<Self> {
        Self::design(Type::LowPass, sample_rate, cutoff)
    }

    pub fn butterworth_highpass(sample_rate: f32, cutoff: f32) -> Result<Self> {
        Self::design(Type::HighPass, sample_rate, cutoff)
    }

    fn design(kind: Type<f32>, sample_rate: f32, cutoff: f32) -> Result<Self> {
        if !(cutoff > 0.0) {
            return Err(Error::InvalidArgument("filter cutoff must be positive"));
        }
        let coeffs =
            Coefficients::<f32>::from_params(kind, sample_rate.hz(), cutoff.hz(), Q_BUTTERWORTH_F32)
                .map_err(|_| Error::InvalidArgument("filter cutoff must be below Nyquist"))?;
        Ok(Self::from_biquad(&coeffs))
    }
}

/// Input and output delay lines for a [`Sos`] cascade
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FilterState<const SECTIONS: usize> {
    x: [[Fixed; 3]; SECTIONS],
    y: [[Fixed; 3]; SECTIONS],
}

impl<const SECTIONS: usize> FilterState<SECTIONS> {
    pub const fn new() -> Self {
        Self { x: [[0; 3]; SECTIONS], y: [[0; 3]; SECTIONS] }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl<const SECTIONS: usize> Default for FilterState<SECTIONS> {
    fn default() -> Self {
        Self::new()
    }
}

/// Run `data` through every section of the cascade in order, in place
///
/// Section outputs are clamped at `i32::MAX` only; a negative overflow is truncated to 32 bits.
pub fn sosfilt<const SECTIONS: usize>(
    data: &mut [Fixed],
    sos: &Sos<SECTIONS>,
    state: &mut FilterState<SECTIONS>,
) -> Result<()> {
    if data.is_empty() {
        return Err(Error::InvalidArgument("sosfilt on empty data"));
    }
    if SECTIONS == 0 {
        return Err(Error::InvalidArgument("sosfilt needs at least one section"));
    }

    for (sec, coeffs) in sos.sections.iter().enumerate() {
        let [b0, b1, b2, _, a1, a2] = coeffs.map(|c| c as i64);
        let x = &mut state.x[sec];
        let y = &mut state.y[sec];
        for sample in data.iter_mut() {
            x[0] = *sample;
            let acc = (b0 * x[0] as i64)
                .wrapping_add(b1 * x[1] as i64)
                .wrapping_add(b2 * x[2] as i64)
                .wrapping_sub(a1 * y[1] as i64)
                .wrapping_sub(a2 * y[2] as i64);
            y[0] = clamp_positive(acc >> FIXED_POINT);
            *sample = y[0];

            x[2] = x[1];
            x[1] = x[0];
            y[2] = y[1];
            y[1] = y[0];
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed::{fixed_to_float, to_fixed};
    use biquad::{Biquad, DirectForm1};

    #[test]
    fn identity_passes_through() {
        let input: [Fixed; 8] = [0, 1, -1, ONE, -ONE, i32::MAX, i32::MIN, 12345];
        let mut data = input;
        let mut state = FilterState::<3>::new();
        sosfilt(&mut data, &Sos::<3>::identity(), &mut state).unwrap();
        assert_eq!(data, input);
    }

    #[test]
    fn rejects_empty() {
        let mut state = FilterState::<2>::new();
        assert!(sosfilt(&mut [], &Sos::<2>::identity(), &mut state).is_err());
        let mut state = FilterState::<0>::new();
        assert!(sosfilt(&mut [1, 2], &Sos::<0>::new([]), &mut state).is_err());
    }

    #[test]
    fn state_carries_across_calls() {
        let sos = Sos::<2>::butterworth_lowpass(64.0, 2.0).unwrap();
        let input: [Fixed; 96] = core::array::from_fn(|i| to_fixed(((i as i32 * 7) % 23) - 11));

        let mut whole = input;
        let mut state = FilterState::new();
        sosfilt(&mut whole, &sos, &mut state).unwrap();

        let mut split = input;
        let mut state = FilterState::new();
        let (a, b) = split.split_at_mut(40);
        sosfilt(a, &sos, &mut state).unwrap();
        sosfilt(b, &sos, &mut state).unwrap();

        assert_eq!(whole, split);
    }

    #[test]
    fn matches_float_reference() {
        let coeffs = Coefficients::<f32>::from_params(
            Type::LowPass,
            64.0f32.hz(),
            3.0f32.hz(),
            Q_BUTTERWORTH_F32,
        )
        .unwrap();
        let sos = Sos::<1>::from_biquad(&coeffs);
        let mut reference = DirectForm1::<f32>::new(coeffs);
        let mut state = FilterState::new();

        let mut data = [0; 200];
        for (i, d) in data.iter_mut().enumerate() {
            *d = to_fixed(if (i / 25) % 2 == 0 { 100 } else { -100 });
        }
        let input = data;
        sosfilt(&mut data, &sos, &mut state).unwrap();

        for (x, y) in input.iter().zip(data.iter()) {
            let expected = reference.run(fixed_to_float(*x));
            assert!((fixed_to_float(*y) - expected).abs() < 0.5, "{} vs {}", fixed_to_float(*y), expected);
        }
    }

    #[test]
    fn clamps_positive_overflow_only() {
        let double = Sos::<1>::new([[2 * ONE, 0, 0, ONE, 0, 0]]);

        let mut data = [i32::MAX];
        sosfilt(&mut data, &double, &mut FilterState::new()).unwrap();
        assert_eq!(data, [i32::MAX]);

        // -2^32 truncates to zero instead of clamping
        let mut data = [i32::MIN];
        sosfilt(&mut data, &double, &mut FilterState::new()).unwrap();
        assert_eq!(data, [0]);
    }

    #[test]
    fn design_limits() {
        assert!(Sos::<2>::butterworth_highpass(64.0, 40.0).is_err());
        assert!(Sos::<2>::butterworth_highpass(64.0, 0.0).is_err());
        assert!(Sos::<2>::butterworth_highpass(64.0, 0.5).is_ok());
    }
}

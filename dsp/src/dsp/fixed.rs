//! Q-format fixed point arithmetic
//!
//! A [`Fixed`] is a signed 32-bit integer scaled by `2^FIXED_POINT`. Multiplication and division
//! go through 64-bit intermediates. Results that do not fit in 32 bits are truncated, not
//! saturated; callers that need a clamp do it themselves (see [`clamp_positive`]).

use crate::config::FIXED_POINT;

pub type Fixed = i32;

pub const ONE: Fixed = 1 << FIXED_POINT;

const SCALE: f64 = (1u64 << FIXED_POINT) as f64;

#[inline]
pub const fn to_fixed(a: i32) -> Fixed {
    a << FIXED_POINT
}

#[inline]
pub const fn fixed_to_int(a: Fixed) -> i32 {
    a >> FIXED_POINT
}

#[inline]
pub fn fixed_to_float(a: Fixed) -> f32 {
    a as f32 / SCALE as f32
}

/// Round half away from zero. Values outside the representable range saturate.
#[inline]
pub fn float_to_fixed(a: f32) -> Fixed {
    let scaled = a as f64 * SCALE;
    let rounded = if scaled >= 0.0 { scaled + 0.5 } else { scaled - 0.5 };
    rounded as Fixed
}

#[inline]
pub(crate) fn f64_to_fixed(a: f64) -> Fixed {
    let scaled = a * SCALE;
    let rounded = if scaled >= 0.0 { scaled + 0.5 } else { scaled - 0.5 };
    rounded as Fixed
}

/// Fixed point product; the low 32 bits of the shifted 64-bit product are kept
#[inline]
pub const fn mul(a: Fixed, b: Fixed) -> Fixed {
    ((a as i64 * b as i64) >> FIXED_POINT) as Fixed
}

/// Fixed point quotient. Division by zero yields 0.
#[inline]
pub const fn div(a: Fixed, b: Fixed) -> Fixed {
    if b == 0 {
        return 0;
    }
    (((a as i64) << FIXED_POINT) / b as i64) as Fixed
}

/// Clamp a 64-bit accumulator to the positive 32-bit bound. Negative values are truncated
/// without clamping.
#[inline]
pub const fn clamp_positive(a: i64) -> Fixed {
    if a > i32::MAX as i64 {
        i32::MAX
    } else {
        a as Fixed
    }
}

/// Integer square root by bit trial, floor of the true root
pub fn isqrt32(a: u32) -> u32 {
    let a = a as u64;
    let mut res: u64 = 0;
    let mut base: u64 = 1 << 15;
    for _ in 0..16 {
        res += base;
        if res * res > a {
            res -= base;
        }
        base >>= 1;
    }
    res as u32
}

pub fn isqrt64(a: u64) -> u32 {
    let mut res: u64 = 0;
    let mut base: u64 = 1 << 31;
    for _ in 0..32 {
        res += base;
        if res * res > a {
            res -= base;
        }
        base >>= 1;
    }
    res as u32
}

/// Square root of a fixed point value held in 64 bits, computed in double precision.
///
/// Negative inputs yield 0.
pub fn sqrt_fixed(a: i64) -> Fixed {
    if a <= 0 {
        return 0;
    }
    f64_to_fixed(libm::sqrt(a as f64 / SCALE))
}

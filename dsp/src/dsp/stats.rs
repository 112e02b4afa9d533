use crate::config::FIXED_POINT;
use crate::error::{Error, Result};
use crate::fixed::{self, Fixed};

/// Mean and sample standard deviation (ddof = 1) of a fixed point sequence
///
/// The mean is an integer division of the 64-bit sum (truncating toward zero). Squared deviations
/// are scaled down by the fixed point shift as they are accumulated, and the square root is
/// taken in double precision.
pub fn mean_and_sdev(data: &[Fixed]) -> Result<(Fixed, Fixed)> {
    if data.len() <= 1 {
        return Err(Error::InvalidArgument("mean_and_sdev needs at least two samples"));
    }
    let n = data.len() as i64;
    let mean = (data.iter().map(|&d| d as i64).sum::<i64>() / n) as Fixed;

    let mut sumsq: i64 = 0;
    for &d in data {
        let dev = (d as i64 - mean as i64) as i128;
        sumsq = sumsq.saturating_add(((dev * dev) >> FIXED_POINT) as i64);
    }
    let var = sumsq / (n - 1);
    Ok((mean, fixed::sqrt_fixed(var)))
}

/// Single precision variant of [`mean_and_sdev`]
///
/// Each scaled squared deviation is converted to `f32` before it is accumulated, so the result
/// can differ from the integer path in the last few bits.
pub fn mean_and_sdev_float(data: &[Fixed]) -> Result<(Fixed, Fixed)> {
    if data.len() <= 1 {
        return Err(Error::InvalidArgument("mean_and_sdev needs at least two samples"));
    }
    let n = data.len() as i64;
    let mean = (data.iter().map(|&d| d as i64).sum::<i64>() / n) as Fixed;

    let scale = (1u64 << FIXED_POINT) as f32;
    let mut sumsq = 0.0f32;
    for &d in data {
        let dev = (d as i64 - mean as i64) as i128;
        sumsq += ((dev * dev) >> FIXED_POINT) as f32 / scale;
    }
    let var = sumsq / (n - 1) as f32;
    Ok((mean, fixed::float_to_fixed(libm::sqrtf(var))))
}

/// Resolve an inclusive `[left, right]` range the way the range queries do: `right` is clamped
/// to the last index, and an inverted range selects the whole array.
fn resolve_range(len: usize, left: usize, right: usize) -> (usize, usize) {
    let right = right.min(len - 1);
    if left > right {
        (0, len - 1)
    } else {
        (left, right)
    }
}

/// Minimum over the inclusive index range `[left, right]`. Returns 0 for empty input.
pub fn range_min(data: &[Fixed], left: usize, right: usize) -> Fixed {
    if data.is_empty() {
        return 0;
    }
    let (l, r) = resolve_range(data.len(), left, right);
    data[l..=r].iter().copied().min().unwrap_or(0)
}

/// Maximum over the inclusive index range `[left, right]`. Returns 0 for empty input.
pub fn range_max(data: &[Fixed], left: usize, right: usize) -> Fixed {
    if data.is_empty() {
        return 0;
    }
    let (l, r) = resolve_range(data.len(), left, right);
    data[l..=r].iter().copied().max().unwrap_or(0)
}

/// Normalise in place to zero mean and unit standard deviation.
///
/// A constant sequence is only centred.
pub fn znorm(data: &mut [Fixed]) -> Result<()> {
    let (mean, sdev) = mean_and_sdev(data)?;
    for d in data.iter_mut() {
        let centred = d.wrapping_sub(mean);
        *d = if sdev == 0 { centred } else { fixed::div(centred, sdev) };
    }
    Ok(())
}

//! Signal quality index estimators
//!
//! Both estimators cut a window of one representative inter-peak distance around each peak and
//! score the periodicity of the trace with Pearson correlation coefficients. The result is a
//! fixed point value nominally in `[-1, 1]`.

use crate::config::FIXED_POINT;
use crate::error::{require_len, require_nonempty, Error, Result};
use crate::find_peaks::PeakIndex;
use crate::fixed::Fixed;

/// Average peak spacing, rounded up to an even number of samples
fn representative_distance(peaks: &[PeakIndex]) -> usize {
    let first = peaks[0] as usize;
    let last = peaks[peaks.len() - 1] as usize;
    let dist = last.saturating_sub(first) / (peaks.len() - 1);
    dist + (dist & 1)
}

fn check_inputs(data: &[Fixed], peaks: &[PeakIndex]) -> Result<()> {
    require_nonempty(data, "sqi on empty data")?;
    if peaks.iter().any(|&p| p as usize >= data.len()) {
        return Err(Error::InvalidArgument("peak index outside the trace"));
    }
    Ok(())
}

/// Pearson coefficient of two equally long sequences given their sums of squares and products
/// (ddof = 1). Returns `None` when either side has no variance.
fn pearson(cov: i128, varx: i128, vary: i128, n: usize) -> Option<i64> {
    let ddof = (n - 1) as i128;
    let (cov, varx, vary) = (cov / ddof, varx / ddof, vary / ddof);
    if varx == 0 || vary == 0 {
        return None;
    }
    let prod = libm::sqrt(varx as f64 * vary as f64);
    let prod = (prod + 0.5) as i128;
    if prod == 0 {
        return None;
    }
    Some(((cov << FIXED_POINT) / prod) as i64)
}

/// Correlate every peak window with the averaged pattern of all peak windows
///
/// Windows that run past either end of `data` are zero-padded. `pattern` is scratch space and
/// must hold at least one representative distance. Returns 0 when there are fewer than two peaks,
/// and [`Error::NumericDegeneracy`] when no window produced a coefficient.
pub fn sqi_full(data: &[Fixed], peaks: &[PeakIndex], pattern: &mut [Fixed]) -> Result<Fixed> {
    check_inputs(data, peaks)?;
    if peaks.len() < 2 {
        return Ok(0);
    }

    let dist = representative_distance(peaks);
    if dist < 2 {
        return Err(Error::NumericDegeneracy);
    }
    require_len(dist, pattern.len())?;
    let half = dist / 2;
    let pattern = &mut pattern[..dist];

    let sample = |peak: PeakIndex, k: usize| -> i64 {
        let idx = peak as usize + k;
        if idx < half {
            return 0;
        }
        data.get(idx - half).map_or(0, |&d| d as i64)
    };

    for (k, slot) in pattern.iter_mut().enumerate() {
        let sum: i64 = peaks.iter().map(|&p| sample(p, k)).sum();
        *slot = (sum / peaks.len() as i64) as Fixed;
    }
    let mean_y = pattern.iter().map(|&v| v as i64).sum::<i64>() / dist as i64;

    let mut coefs: i64 = 0;
    let mut valid: i64 = 0;
    for &peak in peaks {
        let mean_x = (0..dist).map(|k| sample(peak, k)).sum::<i64>() / dist as i64;
        let (mut cov, mut varx, mut vary) = (0i128, 0i128, 0i128);
        for (k, &y) in pattern.iter().enumerate() {
            let dx = (sample(peak, k) - mean_x) as i128;
            let dy = (y as i64 - mean_y) as i128;
            cov += dx * dy;
            varx += dx * dx;
            vary += dy * dy;
        }
        if let Some(coef) = pearson(cov, varx, vary, dist) {
            coefs += coef;
            valid += 1;
        }
    }

    if valid == 0 {
        return Err(Error::NumericDegeneracy);
    }
    Ok((coefs / valid) as Fixed)
}

/// Correlate the windows of each pair of neighbouring peaks
///
/// A pair is skipped when its window would run off either end of `data`, or when the half window
/// is shorter than `min_half_window` samples. Returns 0 when every pair was skipped and
/// [`Error::NumericDegeneracy`] when none of the remaining pairs produced a coefficient.
pub fn sqi_lite(data: &[Fixed], peaks: &[PeakIndex], min_half_window: usize) -> Result<Fixed> {
    check_inputs(data, peaks)?;
    if peaks.len() < 2 {
        return Ok(0);
    }

    let dist = representative_distance(peaks);
    let half = dist / 2;
    let pairs = peaks.len() - 1;

    let mut coefs: i64 = 0;
    let mut valid: i64 = 0;
    let mut skipped = 0;
    for pair in peaks.windows(2) {
        let (a, b) = (pair[0] as usize, pair[1] as usize);
        if half == 0 || a < half || data.len() - b < half || half < min_half_window {
            skipped += 1;
            continue;
        }
        let x = &data[a - half..a + half];
        let y = &data[b - half..b + half];
        let mean_x = x.iter().map(|&v| v as i64).sum::<i64>() / dist as i64;
        let mean_y = y.iter().map(|&v| v as i64).sum::<i64>() / dist as i64;

        let (mut cov, mut varx, mut vary) = (0i128, 0i128, 0i128);
        for (&xv, &yv) in x.iter().zip(y.iter()) {
            let dx = (xv as i64 - mean_x) as i128;
            let dy = (yv as i64 - mean_y) as i128;
            cov += dx * dy;
            varx += dx * dx;
            vary += dy * dy;
        }
        if let Some(coef) = pearson(cov, varx, vary, dist) {
            coefs += coef;
            valid += 1;
        }
    }

    if skipped >= pairs {
        return Ok(0);
    }
    if valid == 0 {
        return Err(Error::NumericDegeneracy);
    }
    Ok((coefs / valid) as Fixed)
}

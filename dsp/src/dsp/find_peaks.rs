//! Local maxima detection filtered by prominence, width and proximity
//!
//! Each stage works on a [`PeakSet`] in place. Stages that remove peaks mark them in a tombstone
//! array first and compact the set once at the end, so the neighbour searches always see the full
//! list of candidates found by [`local_maxima`].

use heapless::Vec;

use crate::config::{FIXED_POINT, MAX_PEAK_COUNT};
use crate::error::{require_nonempty, Error, Result};
use crate::fixed::{mul, Fixed};
use crate::stats::range_min;

pub type PeakIndex = u16;

/// Longest trace whose indices fit in a [`PeakIndex`]
pub const MAX_SIGNAL_LEN: usize = PeakIndex::MAX as usize + 1;

/// Ordered set of sample indices
pub type PeakSet<const N: usize = MAX_PEAK_COUNT> = Vec<PeakIndex, N>;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FindPeaksParams {
    /// Minimum prominence on both sides, in data units
    pub prominence: Fixed,
    /// Fraction of the prominence below the peak at which the width is measured
    pub heval: Fixed,
    /// Minimum width in samples, as a fixed point value
    pub width: Fixed,
    /// Minimum distance in samples between two surviving peaks
    pub proximity: usize,
}

fn check_trace(data: &[Fixed]) -> Result<()> {
    require_nonempty(data, "peak search on empty data")?;
    if data.len() > MAX_SIGNAL_LEN {
        return Err(Error::InvalidArgument("trace longer than the peak index range"));
    }
    Ok(())
}

fn check_peaks(peaks: &[PeakIndex], data: &[Fixed]) -> Result<()> {
    if peaks.iter().any(|&p| p as usize >= data.len()) {
        return Err(Error::InvalidArgument("peak index outside the trace"));
    }
    Ok(())
}

/// Drop every peak whose tombstone is set, keeping order
fn compact<const N: usize>(peaks: &mut PeakSet<N>, removed: &[bool; N]) -> usize {
    let mut kept = 0;
    for i in 0..peaks.len() {
        if !removed[i] {
            peaks[kept] = peaks[i];
            kept += 1;
        }
    }
    peaks.truncate(kept);
    kept
}

/// Collect interior samples that are at least as high as both neighbours and not flat on both
/// sides
///
/// Such a sample is either a strict maximum, the start of a plateau or the end of one. A plateau
/// with a lower sample on both sides yields both ends, so only its first index is kept. A shoulder
/// (a plateau that continues upward) or a plateau running into the end of the trace yields one.
pub fn local_maxima<const N: usize>(data: &[Fixed], peaks: &mut PeakSet<N>) -> Result<usize> {
    check_trace(data)?;
    peaks.clear();

    let mut plateau_start = 0;
    for i in 1..data.len().saturating_sub(1) {
        let (prev, here, next) = (data[i - 1], data[i], data[i + 1]);
        if prev != here {
            plateau_start = i;
        }
        if prev > here || next > here || (prev == here && next == here) {
            continue;
        }
        if prev == here && peaks.last().is_some_and(|&p| p as usize == plateau_start) {
            continue;
        }
        if peaks.push(i as PeakIndex).is_err() {
            log::warn!("local maxima buffer full at sample {}", i);
            break;
        }
    }
    Ok(peaks.len())
}

/// Remove peaks whose prominence or width falls below the thresholds
///
/// The prominence on each side is measured down to the lowest sample between the peak and the
/// nearest taller candidate on that side, or the end of the trace when there is none. A peak
/// survives only if both sides reach `prominence`. Its width is then measured at
/// `height - min_prominence * heval` by walking outward until the trace drops to that level, and
/// compared against `width` (samples, fixed point).
pub fn remove_by_prominence<const N: usize>(
    peaks: &mut PeakSet<N>,
    data: &[Fixed],
    prominence: Fixed,
    heval: Fixed,
    width: Fixed,
) -> Result<usize> {
    check_trace(data)?;
    check_peaks(peaks, data)?;

    let n = peaks.len();
    let last = data.len() - 1;
    let mut removed = [false; N];

    for i in 0..n {
        let peak = peaks[i] as usize;
        let height = data[peak];

        let left_base = peaks[..i]
            .iter()
            .rev()
            .map(|&q| q as usize)
            .find(|&q| data[q] > height)
            .unwrap_or(0);
        let left = height.wrapping_sub(range_min(data, left_base, peak));
        if left < prominence {
            removed[i] = true;
            continue;
        }

        let right_base = peaks[i + 1..n]
            .iter()
            .map(|&q| q as usize)
            .find(|&q| data[q] > height)
            .unwrap_or(last);
        let right = height.wrapping_sub(range_min(data, peak, right_base));
        if right < prominence {
            removed[i] = true;
            continue;
        }

        let eval_height = height.wrapping_sub(mul(left.min(right), heval));
        let mut extent = 0usize;
        if let Some(j) = (0..=peak).rev().find(|&j| data[j] <= eval_height) {
            extent += peak - j;
        }
        if let Some(j) = (peak..data.len()).find(|&j| data[j] <= eval_height) {
            extent += j - peak;
        }
        if ((extent as i64) << FIXED_POINT) < width as i64 {
            removed[i] = true;
        }
    }

    let kept = compact(peaks, &removed);
    log::trace!("prominence filter kept {} of {}", kept, n);
    Ok(kept)
}

/// Within every pair of peaks closer than `distance` samples drop the lower one (the later one
/// on ties)
pub fn remove_close_peaks<const N: usize>(
    peaks: &mut PeakSet<N>,
    data: &[Fixed],
    distance: usize,
) -> Result<usize> {
    check_trace(data)?;
    check_peaks(peaks, data)?;

    let n = peaks.len();
    let mut removed = [false; N];
    for i in 0..n {
        if removed[i] {
            continue;
        }
        for j in i + 1..n {
            if removed[j] {
                continue;
            }
            if peaks[j].saturating_sub(peaks[i]) as usize >= distance {
                break;
            }
            if data[peaks[i] as usize] >= data[peaks[j] as usize] {
                removed[j] = true;
            } else {
                removed[i] = true;
                break;
            }
        }
    }

    let kept = compact(peaks, &removed);
    log::trace!("proximity filter kept {} of {}", kept, n);
    Ok(kept)
}

/// Local maxima, then the prominence/width filter, then the proximity filter
pub fn find_peaks<const N: usize>(
    data: &[Fixed],
    peaks: &mut PeakSet<N>,
    params: &FindPeaksParams,
) -> Result<usize> {
    local_maxima(data, peaks)?;
    remove_by_prominence(peaks, data, params.prominence, params.heval, params.width)?;
    remove_close_peaks(peaks, data, params.proximity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed::{to_fixed, ONE};

    const SINE: [Fixed; 16] = [
        0, 406, 743, 951, 994, 866, 587, 207, -207, -587, -866, -994, -951, -743, -406, 0,
    ];

    fn prom(p: Fixed) -> FindPeaksParams {
        FindPeaksParams { prominence: p, ..Default::default() }
    }

    fn set(indices: &[PeakIndex]) -> PeakSet<16> {
        PeakSet::from_slice(indices).unwrap()
    }

    #[test]
    fn zeros_have_no_peaks() {
        let mut peaks = PeakSet::<2>::new();
        assert_eq!(find_peaks(&[0; 16], &mut peaks, &prom(1)).unwrap(), 0);
        assert_eq!(find_peaks(&[0; 16], &mut peaks, &prom(0)).unwrap(), 0);
        assert_eq!(find_peaks(&[0; 16], &mut peaks, &prom(-5)).unwrap(), 0);
    }

    #[test]
    fn single_sample() {
        let mut peaks = PeakSet::<2>::new();
        assert_eq!(find_peaks(&[1], &mut peaks, &prom(1)).unwrap(), 0);
    }

    #[test]
    fn empty_is_an_error() {
        let mut peaks = PeakSet::<2>::new();
        assert!(find_peaks(&[], &mut peaks, &prom(1)).is_err());
        assert!(remove_close_peaks(&mut peaks, &[], 3).is_err());
    }

    #[test]
    fn impulse() {
        let mut data = [0; 16];
        data[5] = 1;
        let mut peaks = PeakSet::<2>::new();
        assert_eq!(find_peaks(&data, &mut peaks, &prom(1)).unwrap(), 1);
        assert_eq!(peaks[0], 5);
    }

    #[test]
    fn sine() {
        let mut peaks = PeakSet::<2>::new();
        assert_eq!(find_peaks(&SINE, &mut peaks, &prom(1)).unwrap(), 1);
        assert_eq!(peaks[0], 4);
    }

    #[test]
    fn plateaus_collapse_to_first_index() {
        let mut peaks = PeakSet::<4>::new();
        assert_eq!(local_maxima(&[0, 2, 2, 2, 0], &mut peaks).unwrap(), 1);
        assert_eq!(&peaks[..], &[1]);
        // two separate plateaus of the same height stay separate
        assert_eq!(local_maxima(&[0, 2, 2, 0, 2, 2, 0], &mut peaks).unwrap(), 2);
        assert_eq!(&peaks[..], &[1, 4]);
    }

    #[test]
    fn shoulders_are_candidates() {
        let mut peaks = PeakSet::<4>::new();
        assert_eq!(local_maxima(&[0, 2, 2, 3, 0], &mut peaks).unwrap(), 2);
        assert_eq!(&peaks[..], &[1, 3]);
        assert_eq!(local_maxima(&[0, 1, 1, 3], &mut peaks).unwrap(), 1);
        assert_eq!(&peaks[..], &[1]);
    }

    #[test]
    fn plateau_at_the_edges() {
        let mut peaks = PeakSet::<4>::new();
        assert_eq!(local_maxima(&[0, 1, 4, 4], &mut peaks).unwrap(), 1);
        assert_eq!(&peaks[..], &[2]);
        assert_eq!(local_maxima(&[4, 4, 1, 0], &mut peaks).unwrap(), 1);
        assert_eq!(&peaks[..], &[1]);
        assert_eq!(local_maxima(&[3, 3, 3], &mut peaks).unwrap(), 0);
    }

    #[test]
    fn prominence_uses_taller_neighbours() {
        //          0  1  2  3  4  5  6  7  8  9 10
        let data = [0, 9, 4, 6, 5, 8, 1, 3, 2, 0, 0];
        let mut peaks = PeakSet::<8>::new();
        local_maxima(&data, &mut peaks).unwrap();
        assert_eq!(&peaks[..], &[1, 3, 5, 7]);

        // 3 sits between 1 and 5, both taller: left prominence 6-4, right 6-5
        let mut p = peaks.clone();
        assert_eq!(remove_by_prominence(&mut p, &data, 2, 0, 0).unwrap(), 3);
        assert_eq!(&p[..], &[1, 5, 7]);

        // 7 only rises 2 above the trough back towards 5
        let mut p = peaks.clone();
        assert_eq!(remove_by_prominence(&mut p, &data, 3, 0, 0).unwrap(), 2);
        assert_eq!(&p[..], &[1, 5]);
    }

    #[test]
    fn width_filter() {
        let data = [0, 5, 6, 8, 6, 5, 0, 8, 0, 0].map(to_fixed);
        let mut peaks = set(&[3, 7]);
        // at half prominence the first peak is 6 samples wide, the second 2
        let kept = remove_by_prominence(&mut peaks, &data, 1, ONE / 2, to_fixed(3)).unwrap();
        assert_eq!(kept, 1);
        assert_eq!(peaks[0], 3);
    }

    #[test]
    fn proximity_drops_lower_then_later() {
        let data = [0, 5, 0, 7, 0, 7, 0, 0, 0, 2, 0];
        let mut peaks = set(&[1, 3, 5, 9]);
        assert_eq!(remove_close_peaks(&mut peaks, &data, 3).unwrap(), 2);
        assert_eq!(&peaks[..], &[3, 9]);
    }

    #[test]
    fn out_of_range_peaks_are_rejected() {
        let mut peaks = set(&[3, 40]);
        assert!(remove_close_peaks(&mut peaks, &[0; 8], 2).is_err());
    }
}

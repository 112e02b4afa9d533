use crate::error::{Error, Result};
use crate::fixed::Fixed;
use crate::find_peaks::{PeakIndex, PeakSet, MAX_SIGNAL_LEN};

/// Find one peak per run of samples above `threshold`
///
/// A run only counts when it lasts at least `width` samples (a width below one is treated as
/// one). The recorded peak is the index of the run maximum, the earliest one on ties. A run that
/// is still open at the end of the trace is not recorded. Returns the number of peaks found.
pub fn zero_crossing<const N: usize>(
    data: &[Fixed],
    peaks: &mut PeakSet<N>,
    width: usize,
    threshold: Fixed,
) -> Result<usize> {
    scan(data, data, peaks, width, threshold)
}

/// As [`zero_crossing`], gating runs on `data` but taking each run maximum from `raw`
pub fn zero_crossing_raw<const N: usize>(
    data: &[Fixed],
    raw: &[Fixed],
    peaks: &mut PeakSet<N>,
    width: usize,
    threshold: Fixed,
) -> Result<usize> {
    if raw.len() != data.len() {
        return Err(Error::InvalidArgument("raw trace length differs from data"));
    }
    scan(data, raw, peaks, width, threshold)
}

fn scan<const N: usize>(
    gate: &[Fixed],
    source: &[Fixed],
    peaks: &mut PeakSet<N>,
    width: usize,
    threshold: Fixed,
) -> Result<usize> {
    if gate.is_empty() {
        return Err(Error::InvalidArgument("zero_crossing on empty data"));
    }
    if gate.len() > MAX_SIGNAL_LEN {
        return Err(Error::InvalidArgument("trace longer than the peak index range"));
    }
    let width = width.max(1);
    peaks.clear();

    let mut run = 0usize;
    let mut best: Option<(Fixed, usize)> = None;
    let mut dropped = 0usize;

    for (i, (&g, &s)) in gate.iter().zip(source.iter()).enumerate() {
        if g > threshold {
            run += 1;
            match best {
                Some((max, _)) if s <= max => {}
                _ => best = Some((s, i)),
            }
        } else {
            if run >= width {
                if let Some((_, idx)) = best {
                    if peaks.push(idx as PeakIndex).is_err() {
                        dropped += 1;
                    }
                }
            }
            run = 0;
            best = None;
        }
    }

    if dropped > 0 {
        log::warn!("peak buffer full, dropped {} peaks", dropped);
    }
    Ok(peaks.len())
}

#![cfg(all(feature = "cwt", feature = "std"))]

use rate_dsp::config::{CWT_BUF_SIZE, CWT_OA_SIZE, CWT_SCALES, MAIN_BUF_SIZE, SAMPLE_RATE};
use rate_dsp::crossing::zero_crossing;
use rate_dsp::cwt::{cwt_direct, CwtParams, Kernels, OverlapAdd, WholeBuffer};
use rate_dsp::fft::fftimpl::RustFft;
use rate_dsp::find_peaks::PeakSet;
use rate_dsp::fixed::{fixed_to_float, to_fixed, Fixed, ONE};
use rate_dsp::generation::{SyntheticSource, Tone};
use rate_dsp::pipeline::estimate;

const FS: f32 = SAMPLE_RATE as f32;

fn window() -> Vec<Fixed> {
    SyntheticSource::new(FS, 0)
        .with_tone(Tone::new(15.0, 1000.0).with_harmonic(0.2))
        .take(MAIN_BUF_SIZE)
        .map(|s| to_fixed(s as i32))
        .collect()
}

fn rate_of(data: &[Fixed]) -> f32 {
    let mut peaks = PeakSet::<32>::new();
    zero_crossing(data, &mut peaks, SAMPLE_RATE as usize / 2, 0).unwrap();
    let mut pattern = vec![0; data.len()];
    let est = estimate(data, &peaks, SAMPLE_RATE, &mut pattern).unwrap();
    fixed_to_float(est.rate)
}

#[test]
fn cwt_front_end_finds_breathing_rate() {
    let params = CwtParams::default();
    let input = window();

    let mut direct = vec![0; input.len()];
    cwt_direct(&input, &mut direct, &params).unwrap();
    assert!((rate_of(&direct) - 15.0).abs() < 1.0);

    let mut whole = input.clone();
    let mut fft = RustFft::new(CWT_BUF_SIZE);
    WholeBuffer::<CWT_BUF_SIZE>::new().process(&mut whole, &params, &mut fft).unwrap();

    let mut oa = input.clone();
    let mut fft = RustFft::new(CWT_OA_SIZE);
    let kernels = Kernels::<CWT_OA_SIZE, CWT_SCALES>::new(&params, &mut fft).unwrap();
    OverlapAdd::<CWT_OA_SIZE>::new().process_precomputed(&mut oa, &kernels, &mut fft).unwrap();

    for i in 0..input.len() {
        assert!((whole[i] - direct[i]).abs() < ONE / 4, "whole buffer at {i}");
        assert!((oa[i] - direct[i]).abs() < ONE / 4, "overlap-add at {i}");
    }
    assert!((rate_of(&whole) - 15.0).abs() < 1.0);
    assert!((rate_of(&oa) - 15.0).abs() < 1.0);
}

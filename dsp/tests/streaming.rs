#![cfg(feature = "std")]

use rate_dsp::config::{DELTA_SAMPLES, SAMPLE_RATE};
use rate_dsp::fixed::{fixed_to_float, ONE};
use rate_dsp::generation::SyntheticSource;
use rate_dsp::stream::{JointEstimate, SingleEstimate};
use rate_dsp::{ChannelParams, JointChannels, SingleChannel, Sqi, Status, StreamConfig};

const FS: f32 = SAMPLE_RATE as f32;

fn run_single(source: SyntheticSource, seconds: usize) -> Vec<SingleEstimate> {
    let params = ChannelParams::respiration(FS).unwrap();
    let mut est: SingleChannel = SingleChannel::new(StreamConfig::default()).unwrap();
    let mut results = Vec::new();
    for (i, sample) in source.take(seconds * SAMPLE_RATE as usize).enumerate() {
        match est.push(sample, &params).unwrap() {
            Status::Ready(r) => {
                assert_eq!((i + 1) % DELTA_SAMPLES, 0);
                results.push(r);
            }
            Status::Accumulating => assert_ne!((i + 1) % DELTA_SAMPLES, 0),
        }
    }
    results
}

fn assert_rate(rate: rate_dsp::Fixed, expected: f32, tolerance: f32) {
    let rate = fixed_to_float(rate);
    assert!((rate - expected).abs() <= tolerance, "rate {rate}, expected {expected}");
}

fn assert_good_sqi(sqi: Sqi) {
    match sqi {
        Sqi::Score(v) => assert!(v > ONE * 9 / 10, "sqi {}", fixed_to_float(v)),
        other => panic!("unexpected sqi {other:?}"),
    }
}

#[test]
fn breathing_rate_settles() {
    let results = run_single(SyntheticSource::breathing(FS, 15.0, 1), 90);
    assert_eq!(results.len(), 90);
    for (i, r) in results.iter().enumerate() {
        assert_eq!(r.time, i as u32);
    }
    // the window needs filling and the filters need to settle first
    for r in &results[40..] {
        assert_rate(r.estimate.rate, 15.0, 1.0);
        assert_good_sqi(r.estimate.sqi);
        assert!(r.estimate.peaks >= 4);
    }
}

#[test]
fn silence_has_no_peaks() {
    let source = SyntheticSource::new(FS, 1).with_offset(1500.0);
    for r in run_single(source, 30) {
        assert_eq!(r.estimate.rate, 0);
        assert_eq!(r.estimate.sqi, Sqi::NoPeaks);
    }
}

#[test]
fn joint_heart_and_breath() {
    let heart_params = ChannelParams::heart(FS).unwrap();
    let breath_params = ChannelParams::respiration(FS).unwrap();
    let mut est: JointChannels = JointChannels::new(StreamConfig::default()).unwrap();

    let source = SyntheticSource::breathing_and_pulse(FS, 15.0, 72.0, 3);
    let results: Vec<JointEstimate> = source
        .take(70 * SAMPLE_RATE as usize)
        .filter_map(|s| est.push(s, &heart_params, &breath_params).unwrap().ready())
        .collect();

    assert_eq!(results.len(), 70);
    for r in &results[30..] {
        assert_rate(r.heart.rate, 72.0, 2.0);
        assert_rate(r.breath.rate, 15.0, 1.0);
        assert_good_sqi(r.heart.sqi);
        assert_good_sqi(r.breath.sqi);
    }
}

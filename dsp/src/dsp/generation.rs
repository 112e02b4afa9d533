use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// One periodic component of a synthetic recording
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Tone {
    /// Events per minute
    pub rate: f32,
    pub amplitude: f32,
    /// Amplitude of the second harmonic relative to the fundamental
    pub harmonic: f32,
}

impl Tone {
    pub fn new(rate: f32, amplitude: f32) -> Self {
        Self { rate, amplitude, harmonic: 0.0 }
    }

    pub fn with_harmonic(mut self, harmonic: f32) -> Self {
        self.harmonic = harmonic;
        self
    }

    fn value(&self, t: f32) -> f32 {
        let phase = 2.0 * core::f32::consts::PI * self.rate / 60.0 * t;
        self.amplitude * (phase.sin() + self.harmonic * (2.0 * phase).sin())
    }
}

/// Endless source of `i16` samples: a sum of tones plus a DC offset and uniform noise
///
/// The noise comes from a seeded generator, so two sources built with the same settings produce
/// the same samples.
pub struct SyntheticSource {
    sample_rate: f32,
    tones: Vec<Tone>,
    offset: f32,
    noise: f32,
    rng: StdRng,
    n: u64,
}

impl SyntheticSource {
    pub fn new(sample_rate: f32, seed: u64) -> Self {
        if sample_rate <= 0.0 {
            panic!("Cannot create a SyntheticSource with a non-positive sample rate");
        }
        Self {
            sample_rate,
            tones: Vec::new(),
            offset: 0.0,
            noise: 0.0,
            rng: StdRng::seed_from_u64(seed),
            n: 0,
        }
    }

    /// Breathing at `bpm` breaths per minute riding on a DC offset
    pub fn breathing(sample_rate: f32, bpm: f32, seed: u64) -> Self {
        Self::new(sample_rate, seed)
            .with_tone(Tone::new(bpm, 1000.0).with_harmonic(0.2))
            .with_offset(2000.0)
    }

    /// Breathing as above with a weaker pulse at `heart_bpm` on top
    pub fn breathing_and_pulse(
        sample_rate: f32,
        breath_bpm: f32,
        heart_bpm: f32,
        seed: u64,
    ) -> Self {
        Self::breathing(sample_rate, breath_bpm, seed).with_tone(Tone::new(heart_bpm, 150.0))
    }

    pub fn with_tone(mut self, tone: Tone) -> Self {
        self.tones.push(tone);
        self
    }

    pub fn with_offset(mut self, offset: f32) -> Self {
        self.offset = offset;
        self
    }

    /// Uniform noise in `(-amplitude, amplitude)`
    pub fn with_noise(mut self, amplitude: f32) -> Self {
        self.noise = amplitude;
        self
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Samples produced so far
    pub fn position(&self) -> u64 {
        self.n
    }
}

impl Iterator for SyntheticSource {
    type Item = i16;

    fn next(&mut self) -> Option<i16> {
        let t = self.n as f32 / self.sample_rate;
        self.n += 1;
        let mut value = self.offset + self.tones.iter().map(|tone| tone.value(t)).sum::<f32>();
        if self.noise > 0.0 {
            // uniform over (-1, 1)
            let r: f32 = self.rng.gen::<f32>() * 2.0 - 1.0;
            value += r * self.noise;
        }
        Some(value.round().clamp(i16::MIN as f32, i16::MAX as f32) as i16)
    }
}

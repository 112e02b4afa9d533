use num_complex::Complex;

/// In-place forward complex FFT, unnormalised
///
/// The CWT routines only ever run the forward transform; the inverse is obtained by conjugating
/// the spectrum before a second forward pass.
pub trait FftProcessor {
    fn len(&self) -> usize;
    fn process(&mut self, buf: &mut [Complex<f32>]);
}

/// Direct O(N^2) DFT with a precomputed twiddle table
///
/// Slow, but needs no allocation, so it can stand in for a hardware FFT on targets without one
/// and serves as the reference the faster implementations are tested against.
pub struct NaiveDft<const N: usize> {
    twiddles: [Complex<f32>; N],
    scratch: [Complex<f32>; N],
}

impl<const N: usize> NaiveDft<N> {
    pub fn new() -> Self {
        let mut twiddles = [Complex::new(0.0, 0.0); N];
        for (k, t) in twiddles.iter_mut().enumerate() {
            let phase = -2.0 * core::f64::consts::PI * k as f64 / N as f64;
            *t = Complex::new(libm::cos(phase) as f32, libm::sin(phase) as f32);
        }
        Self { twiddles, scratch: [Complex::new(0.0, 0.0); N] }
    }
}

impl<const N: usize> Default for NaiveDft<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> FftProcessor for NaiveDft<N> {
    fn len(&self) -> usize {
        N
    }

    fn process(&mut self, buf: &mut [Complex<f32>]) {
        let n = buf.len().min(N);
        for k in 0..n {
            let (mut re, mut im) = (0f64, 0f64);
            for (j, x) in buf[..n].iter().enumerate() {
                let t = self.twiddles[(j * k) % N];
                re += x.re as f64 * t.re as f64 - x.im as f64 * t.im as f64;
                im += x.re as f64 * t.im as f64 + x.im as f64 * t.re as f64;
            }
            self.scratch[k] = Complex::new(re as f32, im as f32);
        }
        buf[..n].copy_from_slice(&self.scratch[..n]);
    }
}

#[cfg(feature = "std")]
pub mod fftimpl {
    use rustfft::FftPlanner;
    use std::sync::Arc;

    use super::{Complex, FftProcessor};

    /// FFT backed by rustfft. The plan is kept, so build one per transform size and reuse it.
    pub struct RustFft {
        fft: Arc<dyn rustfft::Fft<f32>>,
    }

    impl RustFft {
        pub fn new(size: usize) -> Self {
            let mut planner = FftPlanner::<f32>::new();
            Self { fft: planner.plan_fft_forward(size) }
        }
    }

    impl FftProcessor for RustFft {
        fn len(&self) -> usize {
            self.fft.len()
        }

        fn process(&mut self, buf: &mut [Complex<f32>]) {
            self.fft.process(buf);
        }
    }
}

//! Continuous wavelet transform front end
//!
//! The trace is convolved with a small ladder of scaled wavelets and the per-scale outputs are
//! averaged, which leaves a smoothed trace with one lobe per breath that the peak detectors can
//! work on. Output sample `i` is centred on input sample `i`.
//!
//! Three interchangeable implementations are provided, all of which write the result back over
//! the input:
//! - [`cwt_direct`]: time domain, no FFT
//! - [`WholeBuffer`]: one FFT over the entire (zero padded) trace
//! - [`OverlapAdd`]: kernel sized hops, so the FFT size only depends on the kernel

use num_complex::Complex;

use crate::config::{CWT_SCALES, KERNEL_SIZE, SAMPLE_RATE};
use crate::error::{require_nonempty, Error, Result};
use crate::fft::FftProcessor;
use crate::fixed::{fixed_to_float, float_to_fixed, Fixed};

const ZERO: Complex<f32> = Complex { re: 0.0, im: 0.0 };

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Wavelet {
    MexicanHat,
    /// Second derivative of a gaussian, narrower than the Mexican hat
    Gaus2,
}

impl Wavelet {
    pub fn eval(self, t: f32) -> f32 {
        let t2 = t * t;
        match self {
            Wavelet::MexicanHat => 0.867 * libm::powf(2.72, -t2 / 2.0) * (1.0 - t2),
            Wavelet::Gaus2 => 1.031 * libm::powf(2.72, -t2) * (1.0 - 2.0 * t2),
        }
    }

    /// `eval(t / scale) / sqrt(scale)`, or 0 for a zero scale
    pub fn scaled(self, t: f32, scale: f32) -> f32 {
        if scale == 0.0 {
            return 0.0;
        }
        self.eval(t / scale) / libm::sqrtf(scale)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CwtParams {
    pub sample_rate: f32,
    /// Wavelet kernel length in samples
    pub kernel_size: usize,
    /// Number of scales in the ladder
    pub scales: usize,
    pub min_freq: f32,
    pub max_freq: f32,
    pub wavelet: Wavelet,
}

impl CwtParams {
    /// Breathing band, 0.02 Hz to 0.73 Hz, with a three second kernel
    pub fn respiration(sample_rate: f32) -> Self {
        Self {
            sample_rate,
            kernel_size: (sample_rate * 3.0) as usize,
            scales: CWT_SCALES,
            min_freq: 0.02,
            max_freq: 0.73,
            wavelet: Wavelet::Gaus2,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.sample_rate > 0.0) {
            return Err(Error::InvalidArgument("sample rate must be positive"));
        }
        if self.kernel_size == 0 || self.scales == 0 {
            return Err(Error::InvalidArgument("kernel size and scale count must be positive"));
        }
        if !(self.min_freq > 0.0 && self.max_freq > self.min_freq) {
            return Err(Error::InvalidArgument("need 0 < min_freq < max_freq"));
        }
        Ok(())
    }

    /// Scale number `k` of the ladder. The ladder starts at `min_freq` and stops one step short
    /// of `max_freq`.
    pub fn scale(&self, k: usize) -> f32 {
        let step = (self.max_freq - self.min_freq) / self.scales as f32;
        let freq = self.min_freq + k as f32 * step;
        0.25 / (freq / self.sample_rate)
    }

    /// Sample `i` of the kernel for scale `k`, centred on `kernel_size / 2`
    pub fn kernel(&self, k: usize, i: usize) -> f32 {
        let t = i as f32 - (self.kernel_size / 2) as f32;
        self.wavelet.scaled(t, self.scale(k))
    }
}

impl Default for CwtParams {
    fn default() -> Self {
        Self { kernel_size: KERNEL_SIZE, ..Self::respiration(SAMPLE_RATE as f32) }
    }
}

/// One scale's share of the averaged output. Scaling before accumulation keeps the running sum
/// within the fixed point range.
fn share(value: f32, scales: usize) -> Fixed {
    float_to_fixed(value / scales as f32)
}

/// Reference implementation: plain time domain convolution
pub fn cwt_direct(input: &[Fixed], output: &mut [Fixed], params: &CwtParams) -> Result<()> {
    require_nonempty(input, "cwt on empty data")?;
    params.validate()?;
    if output.len() != input.len() {
        return Err(Error::InvalidArgument("output length differs from input"));
    }
    let k_size = params.kernel_size;
    let half = k_size / 2;

    output.fill(0);
    for k in 0..params.scales {
        for (i, out) in output.iter_mut().enumerate() {
            let mut acc = 0f64;
            for n in 0..k_size {
                // kernel sample n lines up with input sample i + K/2 - n
                let Some(j) = (i + half).checked_sub(n) else { continue };
                if let Some(&x) = input.get(j) {
                    acc += fixed_to_float(x) as f64 * params.kernel(k, n) as f64;
                }
            }
            *out = out.saturating_add(share(acc as f32, params.scales));
        }
    }
    Ok(())
}

/// Fill `buf` with the zero padded kernel for scale `k` and transform it
fn kernel_spectrum<F: FftProcessor>(
    buf: &mut [Complex<f32>],
    params: &CwtParams,
    k: usize,
    fft: &mut F,
) {
    buf.fill(ZERO);
    for (i, v) in buf[..params.kernel_size].iter_mut().enumerate() {
        v.re = params.kernel(k, i);
    }
    fft.process(buf);
}

/// Circular convolution of two spectra, left in `out` as real values scaled back by `1/N`
fn convolve<F: FftProcessor>(
    out: &mut [Complex<f32>],
    a: &[Complex<f32>],
    b: &[Complex<f32>],
    fft: &mut F,
) {
    for ((o, x), y) in out.iter_mut().zip(a.iter()).zip(b.iter()) {
        *o = (x * y).conj();
    }
    fft.process(out);
    let n = out.len() as f32;
    for o in out.iter_mut() {
        o.re /= n;
    }
}

fn check_fft<F: FftProcessor>(fft: &F, n: usize) -> Result<()> {
    if fft.len() != n {
        return Err(Error::InvalidArgument("FFT size differs from the transform buffer"));
    }
    Ok(())
}

/// CWT with a single FFT of size `N` spanning the whole trace
///
/// `N` must be at least `len + kernel_size - 1` so the convolution does not wrap around.
pub struct WholeBuffer<const N: usize> {
    signal: [Complex<f32>; N],
    kernel: [Complex<f32>; N],
    result: [Complex<f32>; N],
}

impl<const N: usize> WholeBuffer<N> {
    pub fn new() -> Self {
        Self { signal: [ZERO; N], kernel: [ZERO; N], result: [ZERO; N] }
    }

    pub fn process<F: FftProcessor>(
        &mut self,
        data: &mut [Fixed],
        params: &CwtParams,
        fft: &mut F,
    ) -> Result<()> {
        require_nonempty(data, "cwt on empty data")?;
        params.validate()?;
        check_fft(fft, N)?;
        let needed = data.len() + params.kernel_size - 1;
        if needed > N {
            return Err(Error::BufferTooSmall { needed, available: N });
        }
        let half = params.kernel_size / 2;

        self.signal.fill(ZERO);
        for (s, &d) in self.signal.iter_mut().zip(data.iter()) {
            s.re = fixed_to_float(d);
        }
        fft.process(&mut self.signal);

        data.fill(0);
        for k in 0..params.scales {
            kernel_spectrum(&mut self.kernel, params, k, fft);
            convolve(&mut self.result, &self.signal, &self.kernel, fft);
            for (i, d) in data.iter_mut().enumerate() {
                *d = d.saturating_add(share(self.result[i + half].re, params.scales));
            }
        }
        Ok(())
    }
}

impl<const N: usize> Default for WholeBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Kernel spectra for every scale of a parameter set, computed once
pub struct Kernels<const N: usize, const SCALES: usize = CWT_SCALES> {
    spectra: [[Complex<f32>; N]; SCALES],
    params: CwtParams,
}

impl<const N: usize, const SCALES: usize> Kernels<N, SCALES> {
    pub fn new<F: FftProcessor>(params: &CwtParams, fft: &mut F) -> Result<Self> {
        params.validate()?;
        check_fft(fft, N)?;
        if params.scales > SCALES {
            return Err(Error::BufferTooSmall { needed: params.scales, available: SCALES });
        }
        check_hop(params.kernel_size, N)?;
        let mut spectra = [[ZERO; N]; SCALES];
        for (k, spectrum) in spectra.iter_mut().take(params.scales).enumerate() {
            kernel_spectrum(spectrum, params, k, fft);
        }
        Ok(Self { spectra, params: *params })
    }

    pub fn params(&self) -> &CwtParams {
        &self.params
    }
}

fn check_hop(kernel_size: usize, n: usize) -> Result<()> {
    let needed = 2 * kernel_size - 1;
    if needed > n {
        return Err(Error::BufferTooSmall { needed, available: n });
    }
    Ok(())
}

/// CWT by overlap-add with hops of one kernel length
///
/// Each hop of `kernel_size` input samples is convolved with every kernel using an FFT of size
/// `N >= 2 * kernel_size - 1`; the `kernel_size - 1` samples spilling past the hop are carried
/// over to the next one and flushed into the output after the last hop.
pub struct OverlapAdd<const N: usize> {
    block: [Complex<f32>; N],
    kernel: [Complex<f32>; N],
    sum: [Complex<f32>; N],
    tail: [f32; N],
}

impl<const N: usize> OverlapAdd<N> {
    pub fn new() -> Self {
        Self { block: [ZERO; N], kernel: [ZERO; N], sum: [ZERO; N], tail: [0.0; N] }
    }

    /// Overlap-add with the kernel spectra recomputed on every hop
    pub fn process<F: FftProcessor>(
        &mut self,
        data: &mut [Fixed],
        params: &CwtParams,
        fft: &mut F,
    ) -> Result<()> {
        require_nonempty(data, "cwt on empty data")?;
        params.validate()?;
        check_fft(fft, N)?;
        check_hop(params.kernel_size, N)?;

        let Self { block, kernel, sum, tail } = self;
        run(data, params, block, sum, tail, fft, KernelSource::Recompute(kernel))
    }

    /// Overlap-add reusing precomputed kernel spectra
    pub fn process_precomputed<F: FftProcessor, const SCALES: usize>(
        &mut self,
        data: &mut [Fixed],
        kernels: &Kernels<N, SCALES>,
        fft: &mut F,
    ) -> Result<()> {
        require_nonempty(data, "cwt on empty data")?;
        check_fft(fft, N)?;

        let Self { block, sum, tail, .. } = self;
        let source: KernelSource<'_, N> = KernelSource::Precomputed(&kernels.spectra);
        run(data, &kernels.params, block, sum, tail, fft, source)
    }
}

impl<const N: usize> Default for OverlapAdd<N> {
    fn default() -> Self {
        Self::new()
    }
}

enum KernelSource<'a, const N: usize> {
    /// Scratch buffer each kernel spectrum is rebuilt in
    Recompute(&'a mut [Complex<f32>; N]),
    Precomputed(&'a [[Complex<f32>; N]]),
}

/// Shared overlap-add loop
///
/// Convolution is linear, so the per-scale products are summed in the frequency domain and a
/// single inverse transform is run per hop.
fn run<F: FftProcessor, const N: usize>(
    data: &mut [Fixed],
    params: &CwtParams,
    block: &mut [Complex<f32>; N],
    sum: &mut [Complex<f32>; N],
    tail: &mut [f32; N],
    fft: &mut F,
    mut kernels: KernelSource<'_, N>,
) -> Result<()> {
    let hop = params.kernel_size;
    let half = hop / 2;
    let len = data.len();
    tail.fill(0.0);

    let emit = |data: &mut [Fixed], pos: usize, value: f32| {
        // convolution sample `pos` is output sample `pos - K/2`
        if let Some(i) = pos.checked_sub(half) {
            if i < len {
                data[i] = share(value, params.scales);
            }
        }
    };

    let mut start = 0;
    while start < len {
        let end = (start + hop).min(len);
        block.fill(ZERO);
        for (b, &d) in block.iter_mut().zip(data[start..end].iter()) {
            b.re = fixed_to_float(d);
        }
        fft.process(&mut block[..]);

        sum.fill(ZERO);
        for k in 0..params.scales {
            let spectrum: &[Complex<f32>] = match &mut kernels {
                KernelSource::Recompute(buf) => {
                    kernel_spectrum(&mut buf[..], params, k, fft);
                    &buf[..]
                }
                KernelSource::Precomputed(spectra) => &spectra[k],
            };
            for ((s, b), h) in sum.iter_mut().zip(block.iter()).zip(spectrum.iter()) {
                *s += b * h;
            }
        }
        for s in sum.iter_mut() {
            *s = s.conj();
        }
        fft.process(&mut sum[..]);
        let n = sum.len() as f32;

        for m in 0..hop {
            emit(data, start + m, tail[m] + sum[m].re / n);
        }
        for m in 0..hop - 1 {
            tail[m] = sum[hop + m].re / n;
        }
        tail[hop - 1] = 0.0;
        start += hop;
    }
    // flush the overlap of the last hop
    for m in 0..hop - 1 {
        emit(data, start + m, tail[m]);
    }
    Ok(())
}

//! Compile-time tunables
//!
//! These are the defaults used for the const generic storage sizes throughout the crate. The
//! runtime parameters (sample rate, increment, filter coefficients...) live in
//! [`crate::stream::StreamConfig`] and [`crate::pipeline::ChannelParams`].

/// Number of fractional bits in a [`crate::fixed::Fixed`] value
pub const FIXED_POINT: u32 = 16;

/// Nominal input sample rate, in Hz
pub const SAMPLE_RATE: u32 = 64;

/// Highest sample rate whose per-minute scale still fits the fixed point range
pub const MAX_SAMPLE_RATE: u32 = 546;

/// Length of the analysis window, in seconds
pub const DATA_WINDOW: usize = 20;

/// Number of new samples between two analyses
pub const DELTA_SAMPLES: usize = SAMPLE_RATE as usize;

/// Length of the sliding analysis buffer, always even
pub const MAIN_BUF_SIZE: usize = round_up_even(SAMPLE_RATE as usize * DATA_WINDOW);

/// Capacity of a peak set
pub const MAX_PEAK_COUNT: usize = 256;

/// Number of biquad sections in each band-pass stage
pub const SOS_SECTIONS: usize = 2;

/// Number of samples after which the running mean stops growing its divisor
pub const RUNNING_MEAN_N: u32 = (DATA_WINDOW as u32) * SAMPLE_RATE * 3;

/// Slowest rate, in events per minute, the respiration preset is tuned to pass
pub const MIN_RATE_BPM: u32 = 3;

/// Number of samples in a wavelet kernel
pub const KERNEL_SIZE: usize = SAMPLE_RATE as usize * 3;

/// Number of wavelet scales
pub const CWT_SCALES: usize = 5;

/// FFT length for whole-buffer CWT convolution
pub const CWT_BUF_SIZE: usize = next_power_of_two(MAIN_BUF_SIZE + KERNEL_SIZE - 1);

/// FFT length for overlap-add CWT convolution
pub const CWT_OA_SIZE: usize = next_power_of_two(2 * KERNEL_SIZE - 1);

pub const fn round_up_even(n: usize) -> usize {
    n + (n & 1)
}

pub const fn next_power_of_two(n: usize) -> usize {
    let mut p = 1;
    while p < n {
        p <<= 1;
    }
    p
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_sizes() {
        assert_eq!(MAIN_BUF_SIZE, 1280);
        assert_eq!(MAIN_BUF_SIZE % 2, 0);
        assert_eq!(round_up_even(1281), 1282);
        assert_eq!(CWT_BUF_SIZE, 2048);
        assert_eq!(CWT_OA_SIZE, 512);
        assert_eq!(next_power_of_two(1), 1);
        assert_eq!(next_power_of_two(512), 512);
    }
}

//! FFT resampling to the analysis rate
//!
//! Band-limited resampling in the frequency domain: the spectrum of the input
//! is truncated (downsampling) or zero extended (upsampling) to the target
//! length and transformed back.
//!
//! ```text
//!   x[n] ──► FFT(n) ──► keep bins 0 .. min(n, m)/2 ──► Hermitian extend ──► IFFT(m) ──► · 1/n
//! ```
//!
//! For an even `min(n, m)` the Nyquist bin is doubled when downsampling (its
//! negative-frequency twin is folded in) and halved when upsampling (it is
//! split between both halves). The output is periodic-extension exact, so a
//! signal that is not periodic in its length shows edge ringing.

use rustfft::{num_complex::Complex64, FftPlanner};

use crate::types::{MbstoiError, MbstoiResult, Sample, StereoSignal};

/// Output length when converting `len` samples from `fs_from` to `fs_to`.
///
/// `floor(len · fs_to / fs_from + 1)`.
pub fn resampled_len(len: usize, fs_from: f64, fs_to: f64) -> usize {
    (len as f64 * (fs_to / fs_from) + 1.0).floor() as usize
}

/// Resample `x` to exactly `num` samples.
pub fn resample(x: &[Sample], num: usize) -> Vec<Sample> {
    let n = x.len();
    if n == 0 || num == 0 {
        return vec![0.0; num];
    }

    let mut planner = FftPlanner::<f64>::new();
    let mut spectrum: Vec<Complex64> = x.iter().map(|&s| Complex64::new(s, 0.0)).collect();
    planner.plan_fft_forward(n).process(&mut spectrum);

    let shared = n.min(num);
    let keep = shared / 2 + 1;

    // single-sided target spectrum, bins 0 ..= num/2
    let mut half = vec![Complex64::new(0.0, 0.0); num / 2 + 1];
    half[..keep.min(num / 2 + 1)].copy_from_slice(&spectrum[..keep.min(num / 2 + 1)]);
    if shared % 2 == 0 {
        let nyq = shared / 2;
        if num < n {
            half[nyq] *= 2.0;
        } else if num > n {
            half[nyq] *= 0.5;
        }
    }

    let mut full = vec![Complex64::new(0.0, 0.0); num];
    full[0] = half[0];
    for k in 1..=(num - 1) / 2 {
        full[k] = half[k];
        full[num - k] = half[k].conj();
    }
    if num % 2 == 0 {
        full[num / 2] = half[num / 2];
    }
    planner.plan_fft_inverse(num).process(&mut full);

    let scale = 1.0 / n as f64;
    full.iter().map(|c| c.re * scale).collect()
}

/// Resample both channels of `signal` from `fs_from` to `fs_to`.
pub fn resample_stereo(
    signal: &StereoSignal,
    fs_from: f64,
    fs_to: f64,
) -> MbstoiResult<StereoSignal> {
    if !(fs_from > 0.0) || !(fs_to > 0.0) {
        return Err(MbstoiError::InvalidParameter(format!(
            "sample rates must be positive (got {} -> {})",
            fs_from, fs_to
        )));
    }
    let num = resampled_len(signal.len(), fs_from, fs_to);
    Ok(signal.map_channels(|x| resample(x, num)))
}

//! Short-time Fourier transform
//!
//! Frames a real signal into half-overlapping Hann-windowed blocks and
//! transforms each block with a zero-padded FFT:
//!
//! ```text
//!   frame i covers x[i·N/2 .. i·N/2 + N]
//!   num_frames = floor((len - N) / (N/2))
//!
//!   x ──► [ window N ] ──► [ zero pad to K ] ──► FFT(K) ──► X_i[0..K]
//! ```
//!
//! No normalisation is applied. MBSTOI only needs the single-sided half of
//! each spectrum, which [`Spectrogram`] keeps in frame-major order.

use rustfft::{num_complex::Complex64, Fft, FftPlanner};
use std::fmt;
use std::sync::Arc;

use crate::types::{MbstoiError, MbstoiResult, Sample};

/// Symmetric Hann window without its zero endpoints.
///
/// `w[i] = 0.5 · (1 - cos(2π(i+1)/(n+1)))`, the interior of an `n + 2` point
/// symmetric Hann window.
pub fn hann_window(n: usize) -> Vec<f64> {
    let denom = (n + 1) as f64;
    (0..n)
        .map(|i| 0.5 * (1.0 - (2.0 * std::f64::consts::PI * (i + 1) as f64 / denom).cos()))
        .collect()
}

/// Number of STFT frames for a signal of `len` samples.
pub fn num_frames(len: usize, frame_len: usize) -> usize {
    let hop = frame_len / 2;
    if hop == 0 || len <= frame_len {
        return 0;
    }
    (len - frame_len) / hop
}

/// Single-sided complex spectrogram, frame-major.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrogram {
    frames: usize,
    bins: usize,
    data: Vec<Complex64>,
}

impl Spectrogram {
    pub fn zeros(frames: usize, bins: usize) -> Self {
        Self {
            frames,
            bins,
            data: vec![Complex64::new(0.0, 0.0); frames * bins],
        }
    }

    /// Build from frame-major data, `data.len()` must equal `frames · bins`.
    pub fn from_vec(frames: usize, bins: usize, data: Vec<Complex64>) -> MbstoiResult<Self> {
        if data.len() != frames * bins {
            return Err(MbstoiError::LengthMismatch {
                context: "spectrogram data",
                expected: frames * bins,
                actual: data.len(),
            });
        }
        Ok(Self { frames, bins, data })
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn bins(&self) -> usize {
        self.bins
    }

    /// Spectrum of one frame
    pub fn frame(&self, frame: usize) -> &[Complex64] {
        &self.data[frame * self.bins..(frame + 1) * self.bins]
    }

    pub fn frame_mut(&mut self, frame: usize) -> &mut [Complex64] {
        &mut self.data[frame * self.bins..(frame + 1) * self.bins]
    }

    #[inline]
    pub fn get(&self, bin: usize, frame: usize) -> Complex64 {
        self.data[frame * self.bins + bin]
    }

    /// Squared magnitude spectrum of one frame
    pub fn power(&self, frame: usize) -> Vec<f64> {
        self.frame(frame).iter().map(|c| c.norm_sqr()).collect()
    }
}

/// STFT engine holding the FFT plan, window and scratch space.
pub struct StftProcessor {
    frame_len: usize,
    fft_size: usize,
    window: Vec<f64>,
    fft: Arc<dyn Fft<f64>>,
    buffer: Vec<Complex64>,
    scratch: Vec<Complex64>,
}

impl fmt::Debug for StftProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StftProcessor")
            .field("frame_len", &self.frame_len)
            .field("fft_size", &self.fft_size)
            .finish()
    }
}

impl StftProcessor {
    /// Create a processor for `frame_len`-sample frames and `fft_size`-point FFTs.
    pub fn new(frame_len: usize, fft_size: usize) -> MbstoiResult<Self> {
        if frame_len < 2 || fft_size < frame_len {
            return Err(MbstoiError::InvalidParameter(format!(
                "STFT needs 2 <= frame_len <= fft_size (got {} and {})",
                frame_len, fft_size
            )));
        }
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);
        let scratch = vec![Complex64::new(0.0, 0.0); fft.get_inplace_scratch_len()];

        Ok(Self {
            frame_len,
            fft_size,
            window: hann_window(frame_len),
            fft,
            buffer: vec![Complex64::new(0.0, 0.0); fft_size],
            scratch,
        })
    }

    pub fn frame_len(&self) -> usize {
        self.frame_len
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    pub fn hop(&self) -> usize {
        self.frame_len / 2
    }

    /// Full `fft_size`-point spectra, one `Vec` per frame.
    pub fn stft(&mut self, x: &[Sample]) -> Vec<Vec<Complex64>> {
        let frames = num_frames(x.len(), self.frame_len);
        (0..frames)
            .map(|i| {
                self.transform_frame(x, i);
                self.buffer.clone()
            })
            .collect()
    }

    /// Single-sided spectra (`fft_size / 2 + 1` bins per frame).
    pub fn single_sided(&mut self, x: &[Sample]) -> Spectrogram {
        let frames = num_frames(x.len(), self.frame_len);
        let bins = self.fft_size / 2 + 1;
        let mut spec = Spectrogram::zeros(frames, bins);
        for i in 0..frames {
            self.transform_frame(x, i);
            spec.frame_mut(i).copy_from_slice(&self.buffer[..bins]);
        }
        spec
    }

    fn transform_frame(&mut self, x: &[Sample], index: usize) {
        let start = index * self.hop();
        let segment = &x[start..start + self.frame_len];

        for (dst, (&s, &w)) in self.buffer.iter_mut().zip(segment.iter().zip(&self.window)) {
            *dst = Complex64::new(s * w, 0.0);
        }
        for dst in self.buffer[self.frame_len..].iter_mut() {
            *dst = Complex64::new(0.0, 0.0);
        }

        self.fft.process_with_scratch(&mut self.buffer, &mut self.scratch);
    }
}

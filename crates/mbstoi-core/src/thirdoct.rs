//! Third-octave band bank
//!
//! Maps the bins of a single-sided FFT spectrum onto `J` third-octave bands
//! with geometrically spaced centre frequencies:
//!
//! ```text
//!   cf(k)   = f_min · 2^(k/3)
//!   f_lo(k) = f_min · 2^((2k - 1)/6)
//!   f_hi(k) = f_min · 2^((2k + 1)/6)          k = 0 .. J-1
//! ```
//!
//! Each theoretical edge is snapped to the nearest FFT bin frequency
//! `f[b] = b · fs / nfft`. Band `k` covers bins `lo(k) .. hi(k)` (high edge
//! exclusive); the edge table stores `[lo + 1, hi]`, i.e. 1-based inclusive
//! indices, and the weighting matrix has ones on exactly those bins.

use std::ops::Range;

use crate::types::{MbstoiError, MbstoiResult};

/// Third-octave band matrix with its band edges and centre frequencies.
#[derive(Debug, Clone, PartialEq)]
pub struct ThirdOctaveBands {
    num_bands: usize,
    num_bins: usize,
    /// Row-major `num_bands × num_bins` 0/1 weighting matrix
    matrix: Vec<f64>,
    /// 1-based `[low, high]` bin edges per band
    fids: Vec<[usize; 2]>,
    /// Centre frequencies in Hz
    cf: Vec<f64>,
    /// Snapped low edge frequencies in Hz
    freq_low: Vec<f64>,
    /// Snapped high edge frequencies in Hz
    freq_high: Vec<f64>,
}

impl ThirdOctaveBands {
    /// Build the band matrix for `(fs, nfft, num_bands, min_freq)`.
    pub fn new(fs: f64, nfft: usize, num_bands: usize, min_freq: f64) -> MbstoiResult<Self> {
        if !(fs > 0.0) || nfft < 2 || num_bands == 0 || !(min_freq > 0.0) {
            return Err(MbstoiError::InvalidParameter(format!(
                "third-octave bank needs fs > 0, nfft >= 2, bands > 0, min_freq > 0 \
                 (got fs={}, nfft={}, bands={}, min_freq={})",
                fs, nfft, num_bands, min_freq
            )));
        }

        let num_bins = nfft / 2 + 1;
        let freqs: Vec<f64> = (0..num_bins).map(|b| b as f64 * fs / nfft as f64).collect();

        let mut matrix = vec![0.0; num_bands * num_bins];
        let mut fids = Vec::with_capacity(num_bands);
        let mut cf = Vec::with_capacity(num_bands);
        let mut freq_low = Vec::with_capacity(num_bands);
        let mut freq_high = Vec::with_capacity(num_bands);

        for k in 0..num_bands {
            let kf = k as f64;
            cf.push(min_freq * 2f64.powf(kf / 3.0));

            let lo = nearest_bin(&freqs, min_freq * 2f64.powf((2.0 * kf - 1.0) / 6.0));
            let hi = nearest_bin(&freqs, min_freq * 2f64.powf((2.0 * kf + 1.0) / 6.0));
            freq_low.push(freqs[lo]);
            freq_high.push(freqs[hi]);

            matrix[k * num_bins + lo..k * num_bins + hi.max(lo)].fill(1.0);
            fids.push([lo + 1, hi]);
        }

        Ok(Self {
            num_bands,
            num_bins,
            matrix,
            fids,
            cf,
            freq_low,
            freq_high,
        })
    }

    pub fn num_bands(&self) -> usize {
        self.num_bands
    }

    pub fn num_bins(&self) -> usize {
        self.num_bins
    }

    /// Weight of `bin` in `band` (0 or 1)
    pub fn weight(&self, band: usize, bin: usize) -> f64 {
        self.matrix[band * self.num_bins + bin]
    }

    /// Weighting row of one band
    pub fn band_row(&self, band: usize) -> &[f64] {
        &self.matrix[band * self.num_bins..(band + 1) * self.num_bins]
    }

    /// 1-based inclusive `[low, high]` edge table
    pub fn fids(&self) -> &[[usize; 2]] {
        &self.fids
    }

    /// Zero-based, high-exclusive bin range of a band
    pub fn bin_range(&self, band: usize) -> Range<usize> {
        let [lo, hi] = self.fids[band];
        (lo - 1)..hi.max(lo - 1)
    }

    /// Centre frequencies in Hz
    pub fn center_frequencies(&self) -> &[f64] {
        &self.cf
    }

    /// Centre frequencies in radians per second
    pub fn angular_center_frequencies(&self) -> Vec<f64> {
        self.cf.iter().map(|f| 2.0 * std::f64::consts::PI * f).collect()
    }

    pub fn freq_low(&self) -> &[f64] {
        &self.freq_low
    }

    pub fn freq_high(&self) -> &[f64] {
        &self.freq_high
    }

    /// Band energies `Σ_b H[j, b] · |X[b]|²` of one single-sided power spectrum.
    pub fn band_energies(&self, power: &[f64], out: &mut [f64]) {
        debug_assert_eq!(power.len(), self.num_bins);
        for (band, energy) in out.iter_mut().enumerate().take(self.num_bands) {
            *energy = self
                .band_row(band)
                .iter()
                .zip(power)
                .map(|(w, p)| w * p)
                .sum();
        }
    }
}

/// Index of the bin frequency nearest to `target` (first one on exact ties).
fn nearest_bin(freqs: &[f64], target: f64) -> usize {
    let mut best = 0;
    let mut best_dist = f64::INFINITY;
    for (i, f) in freqs.iter().enumerate() {
        let dist = (f - target) * (f - target);
        if dist < best_dist {
            best_dist = dist;
            best = i;
        }
    }
    best
}

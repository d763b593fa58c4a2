//! MBSTOI Parameters and the EC Search Grid
//!
//! This module defines the analysis constants of the Modified Binaural
//! Short-Time Objective Intelligibility measure and the interaural search grid
//! used by the equalization-cancellation (EC) stage.
//!
//! ## Analysis Constants
//!
//! | Parameter            | Default   | Meaning                                   |
//! |----------------------|-----------|-------------------------------------------|
//! | `sample_rate`        | 10 000 Hz | internal analysis rate                    |
//! | `frame_len`          | 256       | STFT window support (samples)             |
//! | `fft_size`           | 512       | FFT length (zero padded)                  |
//! | `num_bands`          | 15        | third-octave bands                        |
//! | `min_freq`           | 150 Hz    | centre frequency of the first band        |
//! | `window_frames`      | 30        | frames per intermediate analysis window   |
//! | `dynamic_range_db`   | 40 dB     | silent-frame threshold below the maximum  |
//!
//! ## EC Grid
//!
//! The EC stage tries every pair (τ, γ) of an interaural delay and an
//! interaural level compensation:
//!
//! ```text
//!   τ ∈ linspace(-1 ms, +1 ms, ceil(100 / c))
//!   γ ∈ linspace(-20 dB, +20 dB, ceil(40 / c))      c = grid coarseness
//! ```
//!
//! Each grid value carries a jitter standard deviation (Andersen et al. 2018,
//! eqs. 5 and 6):
//!
//! ```text
//!   σ_ε(γ) = √2 · σ_ε0 · (1 + (|γ| / α0)^p) / 20
//!   σ_δ(τ) = √2 · σ_δ0 · (1 + |τ| / τ0)
//! ```

use serde::{Deserialize, Serialize};

use crate::types::{MbstoiError, MbstoiResult};

/// Psychoacoustic jitter constants of the EC stage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JitterConstants {
    /// ITD compensation standard deviation in seconds
    pub sigma_delta_0: f64,
    /// ILD compensation standard deviation in dB
    pub sigma_epsilon_0: f64,
    /// Level shift deviation constant in dB
    pub alpha_0_db: f64,
    /// Time shift deviation constant in seconds
    pub tau_0: f64,
    /// Exponent of the level-dependent jitter growth
    pub p: f64,
}

impl Default for JitterConstants {
    fn default() -> Self {
        Self {
            sigma_delta_0: 65e-6,
            sigma_epsilon_0: 1.5,
            alpha_0_db: 13.0,
            tau_0: 1.6e-3,
            p: 1.6,
        }
    }
}

/// Complete parameter set for one MBSTOI evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MbstoiParams {
    /// Internal analysis sample rate in Hz
    pub sample_rate: f64,
    /// Frame length in samples (window support)
    pub frame_len: usize,
    /// FFT size in samples
    pub fft_size: usize,
    /// Number of third-octave bands
    pub num_bands: usize,
    /// Centre frequency of the lowest band in Hz
    pub min_freq: f64,
    /// Frames per intermediate intelligibility window
    pub window_frames: usize,
    /// Speech dynamic range in dB used for silent-frame removal
    pub dynamic_range_db: f64,
    /// Minimum interaural delay compensation in seconds
    pub tau_min: f64,
    /// Maximum interaural delay compensation in seconds
    pub tau_max: f64,
    /// Delay grid size before coarsening
    pub base_ntaus: usize,
    /// Minimum interaural level compensation in dB
    pub gamma_min_db: f64,
    /// Maximum interaural level compensation in dB
    pub gamma_max_db: f64,
    /// Level grid size before coarsening
    pub base_ngammas: usize,
    /// Divides both grid sizes (ceiling rounded)
    pub grid_coarseness: usize,
    pub jitter: JitterConstants,
    /// Add the internal (threshold) noise to the degraded signal
    pub internal_noise: bool,
    /// Seed for the internal noise generator
    pub noise_seed: u64,
    /// Search bands on the rayon pool (needs the `parallel` feature)
    pub parallel: bool,
}

impl Default for MbstoiParams {
    fn default() -> Self {
        Self {
            sample_rate: 10_000.0,
            frame_len: 256,
            fft_size: 512,
            num_bands: 15,
            min_freq: 150.0,
            window_frames: 30,
            dynamic_range_db: 40.0,
            tau_min: -0.001,
            tau_max: 0.001,
            base_ntaus: 100,
            gamma_min_db: -20.0,
            gamma_max_db: 20.0,
            base_ngammas: 40,
            grid_coarseness: 1,
            jitter: JitterConstants::default(),
            internal_noise: false,
            noise_seed: 0,
            parallel: false,
        }
    }
}

impl MbstoiParams {
    /// Create a builder starting from the default parameters
    pub fn builder() -> MbstoiParamsBuilder {
        MbstoiParamsBuilder::new()
    }

    /// STFT hop in samples (half overlap)
    pub fn hop(&self) -> usize {
        self.frame_len / 2
    }

    /// Number of single-sided spectrum bins, `fft_size / 2 + 1`
    pub fn num_bins(&self) -> usize {
        self.fft_size / 2 + 1
    }

    /// Number of delay values after coarsening
    pub fn ntaus(&self) -> usize {
        self.base_ntaus.div_ceil(self.grid_coarseness.max(1))
    }

    /// Number of level values after coarsening
    pub fn ngammas(&self) -> usize {
        self.base_ngammas.div_ceil(self.grid_coarseness.max(1))
    }

    /// Build the EC search grid for these parameters
    pub fn ec_grid(&self) -> EcGrid {
        EcGrid::new(
            (self.tau_min, self.tau_max, self.ntaus()),
            (self.gamma_min_db, self.gamma_max_db, self.ngammas()),
            &self.jitter,
        )
    }

    /// Check the parameters for values the pipeline cannot work with.
    pub fn validate(&self) -> MbstoiResult<()> {
        let invalid = |msg: &str| Err(MbstoiError::InvalidParameter(msg.to_string()));

        if !(self.sample_rate > 0.0) {
            return invalid("sample_rate must be positive");
        }
        if self.frame_len < 2 || self.frame_len % 2 != 0 {
            return invalid("frame_len must be even and at least 2");
        }
        if self.fft_size < self.frame_len {
            return invalid("fft_size must be >= frame_len");
        }
        if self.num_bands == 0 {
            return invalid("num_bands must be > 0");
        }
        if !(self.min_freq > 0.0) {
            return invalid("min_freq must be positive");
        }
        if self.window_frames == 0 {
            return invalid("window_frames must be > 0");
        }
        if self.grid_coarseness == 0 {
            return invalid("grid_coarseness must be >= 1");
        }
        if self.base_ntaus == 0 || self.base_ngammas == 0 {
            return invalid("EC grid sizes must be > 0");
        }
        if self.tau_min > self.tau_max {
            return invalid("tau_min must not exceed tau_max");
        }
        if self.gamma_min_db > self.gamma_max_db {
            return invalid("gamma_min_db must not exceed gamma_max_db");
        }
        Ok(())
    }
}

/// Builder for [`MbstoiParams`]
#[derive(Debug, Clone, Default)]
pub struct MbstoiParamsBuilder {
    params: MbstoiParams,
}

impl MbstoiParamsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sample_rate(mut self, hz: f64) -> Self {
        self.params.sample_rate = hz;
        self
    }

    pub fn frame_len(mut self, samples: usize) -> Self {
        self.params.frame_len = samples;
        self
    }

    pub fn fft_size(mut self, samples: usize) -> Self {
        self.params.fft_size = samples;
        self
    }

    pub fn num_bands(mut self, bands: usize) -> Self {
        self.params.num_bands = bands;
        self
    }

    pub fn min_freq(mut self, hz: f64) -> Self {
        self.params.min_freq = hz;
        self
    }

    pub fn window_frames(mut self, frames: usize) -> Self {
        self.params.window_frames = frames;
        self
    }

    pub fn dynamic_range_db(mut self, db: f64) -> Self {
        self.params.dynamic_range_db = db;
        self
    }

    pub fn tau_range(mut self, min: f64, max: f64) -> Self {
        self.params.tau_min = min;
        self.params.tau_max = max;
        self
    }

    pub fn gamma_range_db(mut self, min: f64, max: f64) -> Self {
        self.params.gamma_min_db = min;
        self.params.gamma_max_db = max;
        self
    }

    pub fn grid_coarseness(mut self, coarseness: usize) -> Self {
        self.params.grid_coarseness = coarseness;
        self
    }

    pub fn jitter(mut self, jitter: JitterConstants) -> Self {
        self.params.jitter = jitter;
        self
    }

    /// Enable internal noise with the given generator seed
    pub fn internal_noise(mut self, seed: u64) -> Self {
        self.params.internal_noise = true;
        self.params.noise_seed = seed;
        self
    }

    pub fn parallel(mut self, enabled: bool) -> Self {
        self.params.parallel = enabled;
        self
    }

    pub fn build(self) -> MbstoiParams {
        self.params
    }
}

/// Interaural delay/level grid with per-point jitter deviations.
///
/// `gammas` are stored in the scaled form used by the EC closed forms
/// (dB / 20), so `10^γ` is the amplitude gain of the level compensation.
#[derive(Debug, Clone, PartialEq)]
pub struct EcGrid {
    /// Candidate interaural delays in seconds
    pub taus: Vec<f64>,
    /// Candidate interaural level compensations, dB / 20
    pub gammas: Vec<f64>,
    /// Delay jitter standard deviation per tau, seconds
    pub sigma_delta: Vec<f64>,
    /// Level jitter standard deviation per gamma, dB / 20
    pub sigma_epsilon: Vec<f64>,
}

impl EcGrid {
    /// Build the grid from `(min, max, count)` ranges for τ (s) and γ (dB).
    pub fn new(
        taus: (f64, f64, usize),
        gammas_db: (f64, f64, usize),
        jitter: &JitterConstants,
    ) -> Self {
        let taus = linspace(taus.0, taus.1, taus.2);
        let gammas_db = linspace(gammas_db.0, gammas_db.1, gammas_db.2);

        let sigma_epsilon = gammas_db
            .iter()
            .map(|g| {
                std::f64::consts::SQRT_2
                    * jitter.sigma_epsilon_0
                    * (1.0 + (g.abs() / jitter.alpha_0_db).powf(jitter.p))
                    / 20.0
            })
            .collect();
        let sigma_delta = taus
            .iter()
            .map(|t| {
                std::f64::consts::SQRT_2 * jitter.sigma_delta_0 * (1.0 + t.abs() / jitter.tau_0)
            })
            .collect();
        let gammas = gammas_db.iter().map(|g| g / 20.0).collect();

        Self {
            taus,
            gammas,
            sigma_delta,
            sigma_epsilon,
        }
    }

    pub fn ntaus(&self) -> usize {
        self.taus.len()
    }

    pub fn ngammas(&self) -> usize {
        self.gammas.len()
    }

    /// Total number of grid points
    pub fn len(&self) -> usize {
        self.ntaus() * self.ngammas()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// `count` evenly spaced values from `start` to `stop` inclusive.
///
/// A single value is `start`, matching the usual linspace convention.
pub fn linspace(start: f64, stop: f64, count: usize) -> Vec<f64> {
    match count {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (count - 1) as f64;
            (0..count)
                .map(|i| if i == count - 1 { stop } else { start + step * i as f64 })
                .collect()
        }
    }
}

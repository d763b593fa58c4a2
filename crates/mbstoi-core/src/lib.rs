//! # MBSTOI Core Library
//!
//! This crate implements the Modified Binaural Short-Time Objective
//! Intelligibility (MBSTOI) measure: an objective predictor of how intelligible
//! a degraded binaural (two-ear) speech signal is, given the clean binaural
//! reference.
//!
//! ## Overview
//!
//! MBSTOI extends the monaural STOI measure with an equalization-cancellation
//! (EC) stage that models binaural unmasking. The measure is computed as:
//!
//! - **Resampling**: both pairs are brought to the 10 kHz analysis rate
//! - **Silence Removal**: frames more than 40 dB below the loudest clean frame are dropped
//! - **STFT**: Hann-windowed, half-overlapped, zero-padded short-time spectra
//! - **EC Search**: per band and window, the best interaural delay and level compensation
//! - **Better Ear**: a monaural fallback per ear, used where it beats the EC stage
//! - **Aggregation**: the mean correlation over bands and windows
//!
//! ## Signal Flow
//!
//! ```text
//!   clean (xl, xr)    ─┐                                 ┌─► EC search ───┐
//!                      ├─► resample ─► silence ─► STFT ──┤                ├─► select ─► mean
//!   degraded (yl, yr) ─┘              removal     ×4     └─► better ear ──┘
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use mbstoi_core::{Mbstoi, MbstoiParams, StereoSignal};
//!
//! // Coarser EC grid for a faster estimate
//! let params = MbstoiParams::builder()
//!     .grid_coarseness(2)
//!     .build();
//! let evaluator = Mbstoi::new(params).unwrap();
//!
//! // 2 s of a 500 Hz tone at 20 kHz in both ears
//! let tone: Vec<f64> = (0..40_000)
//!     .map(|i| (2.0 * std::f64::consts::PI * 500.0 * i as f64 / 20_000.0).sin())
//!     .collect();
//! let clean = StereoSignal::new(tone.clone(), tone).unwrap();
//! let degraded = clean.clone();
//! let report = evaluator.evaluate(&clean, &degraded, 20_000.0).unwrap();
//! println!("MBSTOI = {:.3}", report.score);
//! ```

pub mod alignment;
pub mod better_ear;
pub mod config;
pub mod ec;
pub mod internal_noise;
pub mod metric;
pub mod observe;
pub mod params;
pub mod resample;
pub mod silence;
pub mod stft;
pub mod thirdoct;
pub mod types;

#[cfg(feature = "parallel")]
pub mod parallel;

// Re-exports for convenience
pub use alignment::{align_for_scoring, find_delay_impulse, EarDelays};
pub use better_ear::{better_ear, BetterEar};
pub use config::{ConfigError, MbstoiConfig};
pub use ec::{ec_search, BinauralSpectra, EcSearch};
pub use internal_noise::InternalNoise;
pub use metric::{mbstoi, Mbstoi, MbstoiReport};
pub use observe::{init_logging, LogConfig, LogFormat, LogLevel};
pub use params::{EcGrid, JitterConstants, MbstoiParams, MbstoiParamsBuilder};
pub use resample::{resample, resample_stereo};
pub use silence::{remove_silent_frames, TrimmedSignals};
pub use stft::{Spectrogram, StftProcessor};
pub use thirdoct::ThirdOctaveBands;
pub use types::{BandGrid, MbstoiError, MbstoiResult, Sample, StereoSignal};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::metric::{mbstoi, Mbstoi, MbstoiReport};
    pub use crate::params::{JitterConstants, MbstoiParams};
    pub use crate::types::{MbstoiError, MbstoiResult, StereoSignal};
}

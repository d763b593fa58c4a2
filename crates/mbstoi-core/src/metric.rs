//! MBSTOI evaluation
//!
//! Combines the EC and better-ear stages into the final intelligibility
//! score and drives the complete pipeline:
//!
//! ```text
//!   clean, degraded (fs)
//!        │
//!        ├─► resample to 10 kHz                (when fs differs)
//!        ├─► remove silent frames              (clean energy mask)
//!        ├─► internal noise                    (optional, degraded only)
//!        ├─► STFT ×4 ──► single-sided spectra
//!        │         ├─► EC search ──────────► d, p_ec_max
//!        │         └─► better-ear ─────────► d_be, p_be
//!        └─► select: d_be where p_be > p_ec_max
//!            score = mean of valid cells
//! ```
//!
//! A cell the EC search marked degenerate and the better-ear stage did not
//! replace carries no information and is left out of the mean. If no cell is
//! valid the score is 0.

use crate::better_ear::{better_ear, BetterEar};
use crate::ec::{num_windows, BinauralSpectra, EcSearch, DEGENERATE};
use crate::internal_noise::InternalNoise;
use crate::params::{EcGrid, MbstoiParams};
use crate::resample::resample_stereo;
use crate::silence::remove_silent_frames;
use crate::stft::StftProcessor;
use crate::thirdoct::ThirdOctaveBands;
use crate::types::{BandGrid, MbstoiError, MbstoiResult, Sample, StereoSignal};

/// Level ratio (in decades) above which clean and degraded are suspicious.
pub const LEVEL_RATIO_LIMIT: f64 = 5.0;

/// Per-cell selection between the EC and better-ear correlations.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    /// Selected intermediate correlations, `bands × windows`
    pub correlation: BandGrid,
    /// Cells that enter the mean
    pub valid: Vec<bool>,
    /// Cells taken from the better-ear stage
    pub better_ear_cells: usize,
}

impl Selection {
    pub fn valid_cells(&self) -> usize {
        self.valid.iter().filter(|&&v| v).count()
    }

    /// Mean over valid cells, `None` when there are none.
    pub fn mean(&self) -> Option<f64> {
        let (sum, count) = self
            .correlation
            .as_slice()
            .iter()
            .zip(&self.valid)
            .filter(|(_, &valid)| valid)
            .fold((0.0, 0usize), |(s, c), (&d, _)| (s + d, c + 1));
        (count > 0).then(|| sum / count as f64)
    }
}

/// Pick, per cell, the better-ear correlation when its selectivity exceeds
/// the EC selectivity.
///
/// EC cells holding the degeneracy sentinel (`d = -1`, `p_ec_max = 0`) are
/// valid only when replaced.
pub fn select_correlations(
    d: &BandGrid,
    p_ec_max: &BandGrid,
    be: &BetterEar,
) -> MbstoiResult<Selection> {
    let (bands, windows) = d.shape();
    p_ec_max.check_shape(bands, windows)?;
    be.correlation.check_shape(bands, windows)?;
    be.selectivity.check_shape(bands, windows)?;

    let mut correlation = d.clone();
    let mut valid = vec![true; bands * windows];
    let mut better_ear_cells = 0;

    let cells = correlation
        .as_mut_slice()
        .iter_mut()
        .zip(p_ec_max.as_slice())
        .zip(be.correlation.as_slice().iter().zip(be.selectivity.as_slice()))
        .zip(valid.iter_mut());
    for (((d, &p_ec), (&d_be, &p_be)), valid) in cells {
        if p_be > p_ec {
            *d = d_be;
            better_ear_cells += 1;
        } else if *d == DEGENERATE && p_ec == 0.0 {
            *valid = false;
        }
    }

    Ok(Selection {
        correlation,
        valid,
        better_ear_cells,
    })
}

/// Outcome of one MBSTOI evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct MbstoiReport {
    /// Mean intermediate correlation, roughly in [0, 1]
    pub score: f64,
    pub bands: usize,
    pub windows: usize,
    pub valid_cells: usize,
    /// Cells flagged by the EC search and not replaced
    pub degenerate_cells: usize,
    pub better_ear_cells: usize,
    /// Frames kept by silent-frame removal
    pub kept_frames: usize,
    /// Frames inspected by silent-frame removal
    pub total_frames: usize,
    /// Selected intermediate correlations
    pub intermediate: BandGrid,
}

/// MBSTOI evaluator holding the band bank and EC grid for one parameter set.
#[derive(Debug, Clone)]
pub struct Mbstoi {
    params: MbstoiParams,
    bands: ThirdOctaveBands,
    omegas: Vec<f64>,
    grid: EcGrid,
}

impl Mbstoi {
    pub fn new(params: MbstoiParams) -> MbstoiResult<Self> {
        params.validate()?;
        let bands = ThirdOctaveBands::new(
            params.sample_rate,
            params.fft_size,
            params.num_bands,
            params.min_freq,
        )?;
        let omegas = bands.angular_center_frequencies();
        let grid = params.ec_grid();
        tracing::debug!(
            ntaus = grid.ntaus(),
            ngammas = grid.ngammas(),
            bands = bands.num_bands(),
            "prepared MBSTOI evaluator"
        );
        Ok(Self {
            params,
            bands,
            omegas,
            grid,
        })
    }

    pub fn params(&self) -> &MbstoiParams {
        &self.params
    }

    pub fn bands(&self) -> &ThirdOctaveBands {
        &self.bands
    }

    pub fn grid(&self) -> &EcGrid {
        &self.grid
    }

    /// Score only.
    pub fn score(
        &self,
        clean: &StereoSignal,
        degraded: &StereoSignal,
        fs_signal: f64,
    ) -> MbstoiResult<f64> {
        self.evaluate(clean, degraded, fs_signal).map(|r| r.score)
    }

    /// Run the full pipeline on signals sampled at `fs_signal`.
    pub fn evaluate(
        &self,
        clean: &StereoSignal,
        degraded: &StereoSignal,
        fs_signal: f64,
    ) -> MbstoiResult<MbstoiReport> {
        let p = &self.params;
        if clean.len() != degraded.len() {
            return Err(MbstoiError::LengthMismatch {
                context: "clean vs degraded signal",
                expected: clean.len(),
                actual: degraded.len(),
            });
        }
        if !(fs_signal > 0.0) {
            return Err(MbstoiError::InvalidParameter(format!(
                "signal sample rate must be positive (got {})",
                fs_signal
            )));
        }

        let (clean, degraded) = if fs_signal != p.sample_rate {
            tracing::debug!(from = fs_signal, to = p.sample_rate, "resampling signals");
            (
                resample_stereo(clean, fs_signal, p.sample_rate)?,
                resample_stereo(degraded, fs_signal, p.sample_rate)?,
            )
        } else {
            (clean.clone(), degraded.clone())
        };

        let trimmed =
            remove_silent_frames(&clean, &degraded, p.dynamic_range_db, p.frame_len, p.hop())?;
        check_levels(&trimmed.clean, &trimmed.degraded);

        let clean = trimmed.clean;
        let mut degraded = trimmed.degraded;
        if p.internal_noise {
            InternalNoise::new(p.noise_seed).add_to(&mut degraded);
        }

        let mut stft = StftProcessor::new(p.frame_len, p.fft_size)?;
        let xl = stft.single_sided(clean.left());
        let xr = stft.single_sided(clean.right());
        let yl = stft.single_sided(degraded.left());
        let yr = stft.single_sided(degraded.right());
        tracing::debug!(frames = xl.frames(), bins = xl.bins(), "computed spectra");

        if xl.frames() < p.window_frames {
            return Err(MbstoiError::NotEnoughFrames {
                frames: xl.frames(),
                required: p.window_frames,
            });
        }

        let spectra = BinauralSpectra::new(&xl, &xr, &yl, &yr)?;
        let windows = num_windows(spectra.frames(), p.window_frames);
        let mut d = BandGrid::zeros(self.bands.num_bands(), windows);
        let mut p_ec_max = BandGrid::zeros(self.bands.num_bands(), windows);

        let search =
            EcSearch::from_bands(spectra, &self.bands, &self.omegas, p.window_frames, &self.grid)?;
        self.run_search(&search, &mut d, &mut p_ec_max)?;

        let be = better_ear(&xl, &xr, &yl, &yr, &self.bands, p.window_frames)?;
        let selection = select_correlations(&d, &p_ec_max, &be)?;

        let valid_cells = selection.valid_cells();
        let score = selection.mean().unwrap_or_else(|| {
            tracing::warn!("no valid band/window cells, score set to 0");
            0.0
        });
        tracing::info!(
            score,
            valid = valid_cells,
            better_ear = selection.better_ear_cells,
            "MBSTOI evaluation complete"
        );

        Ok(MbstoiReport {
            score,
            bands: self.bands.num_bands(),
            windows,
            valid_cells,
            degenerate_cells: selection.valid.len() - valid_cells,
            better_ear_cells: selection.better_ear_cells,
            kept_frames: trimmed.kept_frames,
            total_frames: trimmed.total_frames,
            intermediate: selection.correlation,
        })
    }

    #[cfg(feature = "parallel")]
    fn run_search(
        &self,
        search: &EcSearch<'_>,
        d: &mut BandGrid,
        p_ec_max: &mut BandGrid,
    ) -> MbstoiResult<()> {
        if self.params.parallel {
            crate::parallel::par_ec_search(search, d, p_ec_max)
        } else {
            search.run(d, p_ec_max)
        }
    }

    #[cfg(not(feature = "parallel"))]
    fn run_search(
        &self,
        search: &EcSearch<'_>,
        d: &mut BandGrid,
        p_ec_max: &mut BandGrid,
    ) -> MbstoiResult<()> {
        if self.params.parallel {
            tracing::debug!("built without the parallel feature, searching sequentially");
        }
        search.run(d, p_ec_max)
    }
}

/// Warn when clean and degraded levels differ by more than five decades.
fn check_levels(clean: &StereoSignal, degraded: &StereoSignal) {
    let (xl, xr) = clean.norms();
    let (yl, yr) = degraded.norms();
    for (ear, x, y) in [("left", xl, yl), ("right", xr, yr)] {
        let ratio = (x / y).log10().abs();
        if ratio > LEVEL_RATIO_LIMIT {
            tracing::warn!(ear, ratio, "clean and degraded levels differ by more than 5 decades");
        }
    }
}

/// MBSTOI score of four channels sampled at `fs` with default parameters.
pub fn mbstoi(
    xl: &[Sample],
    xr: &[Sample],
    yl: &[Sample],
    yr: &[Sample],
    fs: f64,
) -> MbstoiResult<f64> {
    let clean = StereoSignal::new(xl.to_vec(), xr.to_vec())?;
    let degraded = StereoSignal::new(yl.to_vec(), yr.to_vec())?;
    Mbstoi::new(MbstoiParams::default())?.score(&clean, &degraded, fs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::{rngs::StdRng, SeedableRng};
    use rand_distr::{Distribution, Normal};
    use std::f64::consts::PI;

    /// Speech-like test signal: noise under a slow syllabic envelope
    fn modulated_noise(len: usize, seed: u64) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        let normal = Normal::new(0.0, 1.0).unwrap();
        (0..len)
            .map(|i| {
                let env = 1.2 + (2.0 * PI * 4.0 * i as f64 / 10_000.0).sin();
                normal.sample(&mut rng) * env
            })
            .collect()
    }

    fn white_noise(len: usize, seed: u64) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        let normal = Normal::new(0.0, 1.0).unwrap();
        (0..len).map(|_| normal.sample(&mut rng)).collect()
    }

    fn binaural(len: usize, seed: u64) -> StereoSignal {
        let left = modulated_noise(len, seed);
        // right ear: attenuated, 3-sample delayed copy
        let right = (0..len).map(|i| if i >= 3 { 0.6 * left[i - 3] } else { 0.0 }).collect();
        StereoSignal::new(left, right).unwrap()
    }

    fn evaluator(coarseness: usize) -> Mbstoi {
        Mbstoi::new(MbstoiParams::builder().grid_coarseness(coarseness).build()).unwrap()
    }

    fn cells(d: &[f64]) -> BandGrid {
        let mut g = BandGrid::zeros(1, d.len());
        g.as_mut_slice().copy_from_slice(d);
        g
    }

    #[test]
    fn test_identity_scores_one() {
        let x = binaural(9000, 1);
        let report = evaluator(2).evaluate(&x, &x, 10_000.0).unwrap();
        assert_relative_eq!(report.score, 1.0, epsilon = 1e-9);
        assert_eq!(report.degenerate_cells, 0);
        assert_eq!(report.valid_cells, report.bands * report.windows);
        assert!(report
            .intermediate
            .as_slice()
            .iter()
            .all(|&d| (d - 1.0).abs() < 1e-9));
    }

    #[test]
    fn test_uncorrelated_noise_scores_near_zero() {
        let x = binaural(10_000, 2);
        let y = StereoSignal::new(white_noise(10_000, 3), white_noise(10_000, 4)).unwrap();
        let score = evaluator(2).score(&x, &y, 10_000.0).unwrap();
        assert!(score.is_finite());
        assert!(score.abs() < 0.2, "score {}", score);
    }

    #[test]
    fn test_additive_noise_lowers_score() {
        let x = binaural(10_000, 5);
        let noise =
            StereoSignal::new(modulated_noise(10_000, 6), modulated_noise(10_000, 7)).unwrap();
        let mild = StereoSignal::new(
            x.left().iter().zip(noise.left()).map(|(s, n)| s + 0.3 * n).collect(),
            x.right().iter().zip(noise.right()).map(|(s, n)| s + 0.3 * n).collect(),
        )
        .unwrap();
        let eval = evaluator(4);
        let clean_score = eval.score(&x, &x, 10_000.0).unwrap();
        let noisy_score = eval.score(&x, &mild, 10_000.0).unwrap();
        assert!(noisy_score < clean_score);
        assert!(noisy_score > 0.2);
    }

    #[test]
    fn test_coarseness_two_close_to_full_grid() {
        let x = binaural(9000, 8);
        let noise = modulated_noise(9000, 9);
        let y = StereoSignal::new(
            x.left().iter().zip(&noise).map(|(s, n)| s + 0.5 * n).collect(),
            x.right().to_vec(),
        )
        .unwrap();
        let fine = evaluator(1).score(&x, &y, 10_000.0).unwrap();
        let coarse = evaluator(2).score(&x, &y, 10_000.0).unwrap();
        assert!((fine - coarse).abs() < 0.1, "fine {} coarse {}", fine, coarse);
    }

    #[test]
    fn test_resampled_input_identity() {
        let x = binaural(16_000, 10);
        let report = evaluator(4).evaluate(&x, &x, 16_000.0).unwrap();
        assert_relative_eq!(report.score, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_silent_degraded_has_no_nan() {
        let x = binaural(9000, 11);
        let y = StereoSignal::zeros(9000);
        let report = evaluator(4).evaluate(&x, &y, 10_000.0).unwrap();
        assert!(report.score.is_finite());
        assert!(report.degenerate_cells > 0 || report.better_ear_cells > 0);
    }

    #[test]
    fn test_internal_noise_is_seeded() {
        let x = binaural(9000, 12);
        let params = MbstoiParams::builder()
            .grid_coarseness(4)
            .internal_noise(1)
            .build();
        let eval = Mbstoi::new(params).unwrap();
        let a = eval.score(&x, &x, 10_000.0).unwrap();
        let b = eval.score(&x, &x, 10_000.0).unwrap();
        assert_eq!(a, b);
        assert!(a > 0.5 && a <= 1.0 + 1e-9);
    }

    #[test]
    fn test_too_short_is_error() {
        let x = binaural(2000, 13);
        assert!(matches!(
            evaluator(4).evaluate(&x, &x, 10_000.0),
            Err(MbstoiError::NotEnoughFrames { .. })
        ));
    }

    #[test]
    fn test_length_mismatch() {
        let x = StereoSignal::zeros(100);
        let y = StereoSignal::zeros(101);
        assert!(matches!(
            evaluator(4).evaluate(&x, &y, 10_000.0),
            Err(MbstoiError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn test_select_prefers_more_selective_stage() {
        let d = cells(&[0.2, 0.4, DEGENERATE, DEGENERATE]);
        let p_ec = cells(&[2.0, 2.0, 0.0, 0.0]);
        let be = BetterEar {
            correlation: cells(&[0.9, 0.9, 0.7, 0.0]),
            selectivity: cells(&[3.0, 1.0, 1.0, f64::NAN]),
        };
        let sel = select_correlations(&d, &p_ec, &be).unwrap();
        assert_eq!(sel.correlation.as_slice(), &[0.9, 0.4, 0.7, DEGENERATE]);
        assert_eq!(sel.valid, vec![true, true, true, false]);
        assert_eq!(sel.better_ear_cells, 2);
        assert_relative_eq!(sel.mean().unwrap(), 2.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_all_degenerate_mean_is_none() {
        let d = cells(&[DEGENERATE, DEGENERATE]);
        let p_ec = cells(&[0.0, 0.0]);
        let be = BetterEar {
            correlation: cells(&[0.0, 0.0]),
            selectivity: cells(&[f64::NAN, f64::NAN]),
        };
        let sel = select_correlations(&d, &p_ec, &be).unwrap();
        assert_eq!(sel.mean(), None);
        assert_eq!(sel.valid_cells(), 0);
    }

    #[test]
    fn test_convenience_function() {
        let x = binaural(9000, 14);
        let score = mbstoi(x.left(), x.right(), x.left(), x.right(), 10_000.0).unwrap();
        assert_relative_eq!(score, 1.0, epsilon = 1e-9);
    }
}

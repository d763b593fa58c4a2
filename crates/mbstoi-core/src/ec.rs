//! Equalization-Cancellation (EC) search
//!
//! Models binaural unmasking: for every third-octave band and every N-frame
//! analysis window the left and right ear signals are level-adjusted by γ and
//! time-shifted by τ relative to one another and subtracted. The search looks
//! for the (τ, γ) pair that maximises the selectivity `exx / eyy` and reports
//! the normalised correlation between the clean and degraded EC outputs at
//! that point.
//!
//! ## Closed Forms
//!
//! Per band, each frame `f` is reduced to three quantities per signal, all
//! de-meaned over the window:
//!
//! ```text
//!   L(f)   = Σ_b |X_l(b,f)|²         left power
//!   R(f)   = Σ_b |X_r(b,f)|²         right power
//!   ρ(f)   = Σ_b X_r(b,f)* X_l(b,f)  interaural cross spectrum
//! ```
//!
//! For two signals u, v the expected product of their EC output power
//! envelopes, averaged over Gaussian level jitter σ_ε and delay jitter σ_δ, is
//!
//! ```text
//!   E(τ,γ) = (10^{2γ} ΣLuLv + 10^{-2γ} ΣRuRv) · e^{2 ln²10 σ_ε²}
//!          + ΣLuRv + ΣRuLv
//!          - 2 Re(e^{-iωτ} Σ(Luρv + Lvρu)) · 10^{γ}  · e^{(ln²10 σ_ε² - ω² σ_δ²)/2}
//!          - 2 Re(e^{-iωτ} Σ(Ruρv + Rvρu)) · 10^{-γ} · e^{(ln²10 σ_ε² - ω² σ_δ²)/2}
//!          + 2 (Re Σ ρu ρv* + e^{-2ω²σ_δ²} Re(e^{-2iωτ} Σ ρu ρv))
//! ```
//!
//! with ω the band centre angular frequency. `exy = E(x, y)`, `exx = E(x, x)`
//! and `eyy = E(y, y)` (Andersen et al. 2018, eqs. 7 and 8).
//!
//! ## Selection
//!
//! ```text
//!   p = exx / eyy
//!   for each γ: t*(γ) = first argmax_τ p(τ, γ)
//!   g* = first argmax_γ p(t*(γ), γ)
//!   p_ec_max = p(t*, g*)        d = exy / sqrt(exx · eyy)  at (t*, g*)
//! ```
//!
//! Cells where `min |exx · eyy|` over the grid falls below `1e-40` are
//! degenerate: `d = -1` and `p_ec_max` stays 0.

use num_complex::Complex64;
use std::f64::consts::LN_10;

use crate::params::EcGrid;
use crate::stft::Spectrogram;
use crate::thirdoct::ThirdOctaveBands;
use crate::types::{BandGrid, MbstoiError, MbstoiResult};

/// Threshold on `min |exx · eyy|` below which a cell is degenerate
pub const DEGENERACY_THRESHOLD: f64 = 1e-40;

/// Sentinel written to `d` for degenerate cells
pub const DEGENERATE: f64 = -1.0;

/// Single-sided spectra of the four channels, all `bins × frames` alike.
#[derive(Debug, Clone, Copy)]
pub struct BinauralSpectra<'a> {
    pub xl: &'a Spectrogram,
    pub xr: &'a Spectrogram,
    pub yl: &'a Spectrogram,
    pub yr: &'a Spectrogram,
}

impl<'a> BinauralSpectra<'a> {
    pub fn new(
        xl: &'a Spectrogram,
        xr: &'a Spectrogram,
        yl: &'a Spectrogram,
        yr: &'a Spectrogram,
    ) -> MbstoiResult<Self> {
        for other in [xr, yl, yr] {
            if other.frames() != xl.frames() {
                return Err(MbstoiError::LengthMismatch {
                    context: "spectrogram frames",
                    expected: xl.frames(),
                    actual: other.frames(),
                });
            }
            if other.bins() != xl.bins() {
                return Err(MbstoiError::LengthMismatch {
                    context: "spectrogram bins",
                    expected: xl.bins(),
                    actual: other.bins(),
                });
            }
        }
        Ok(Self { xl, xr, yl, yr })
    }

    pub fn frames(&self) -> usize {
        self.xl.frames()
    }

    pub fn bins(&self) -> usize {
        self.xl.bins()
    }
}

/// Number of N-frame analysis windows over `frames` spectra.
pub fn num_windows(frames: usize, window_frames: usize) -> usize {
    (frames + 1).saturating_sub(window_frames)
}

/// Per-frame band powers and cross spectrum of one binaural signal.
#[derive(Debug, Clone, Default)]
struct BandEnvelopes {
    left: Vec<f64>,
    right: Vec<f64>,
    cross: Vec<Complex64>,
}

impl BandEnvelopes {
    fn compute(left: &Spectrogram, right: &Spectrogram, bins: std::ops::Range<usize>) -> Self {
        let frames = left.frames();
        let mut env = Self {
            left: Vec::with_capacity(frames),
            right: Vec::with_capacity(frames),
            cross: Vec::with_capacity(frames),
        };
        for f in 0..frames {
            let l = &left.frame(f)[bins.clone()];
            let r = &right.frame(f)[bins.clone()];
            env.left.push(l.iter().map(|c| c.norm_sqr()).sum());
            env.right.push(r.iter().map(|c| c.norm_sqr()).sum());
            env.cross.push(l.iter().zip(r).map(|(cl, cr)| cr.conj() * cl).sum());
        }
        env
    }

    /// Copy frames `start .. start + n` into `out`, de-meaned.
    fn window_into(&self, start: usize, n: usize, out: &mut BandEnvelopes) {
        demean_into(&self.left[start..start + n], &mut out.left);
        demean_into(&self.right[start..start + n], &mut out.right);

        let cross = &self.cross[start..start + n];
        let mean = cross.iter().sum::<Complex64>() / n as f64;
        out.cross.clear();
        out.cross.extend(cross.iter().map(|c| c - mean));
    }
}

fn demean_into(src: &[f64], dst: &mut Vec<f64>) {
    let mean = src.iter().sum::<f64>() / src.len() as f64;
    dst.clear();
    dst.extend(src.iter().map(|v| v - mean));
}

/// Window sums entering the closed form of `E(u, v)`.
#[derive(Debug, Clone, Copy, PartialEq)]
struct CrossSums {
    ll: f64,
    rr: f64,
    lr: f64,
    rl: f64,
    /// Σ(Lu ρv + Lv ρu)
    l_rho: Complex64,
    /// Σ(Ru ρv + Rv ρu)
    r_rho: Complex64,
    /// Σ ρu ρv*
    rho_conj: Complex64,
    /// Σ ρu ρv
    rho_rho: Complex64,
}

impl CrossSums {
    fn new(u: &BandEnvelopes, v: &BandEnvelopes) -> Self {
        let dot = |a: &[f64], b: &[f64]| a.iter().zip(b).map(|(x, y)| x * y).sum::<f64>();
        let weighted = |w: &[f64], rho: &[Complex64]| {
            rho.iter().zip(w).map(|(r, w)| r * w).sum::<Complex64>()
        };

        Self {
            ll: dot(&u.left, &v.left),
            rr: dot(&u.right, &v.right),
            lr: dot(&u.left, &v.right),
            rl: dot(&u.right, &v.left),
            l_rho: weighted(&u.left, &v.cross) + weighted(&v.left, &u.cross),
            r_rho: weighted(&u.right, &v.cross) + weighted(&v.right, &u.cross),
            rho_conj: u.cross.iter().zip(&v.cross).map(|(a, b)| a * b.conj()).sum(),
            rho_rho: u.cross.iter().zip(&v.cross).map(|(a, b)| a * b).sum(),
        }
    }
}

/// Band-independent level terms of the grid.
#[derive(Debug, Clone)]
struct LevelTerms {
    /// 10^γ
    gain: Vec<f64>,
    /// 10^-γ
    gain_inv: Vec<f64>,
    /// 10^2γ
    gain_sq: Vec<f64>,
    /// 10^-2γ
    gain_sq_inv: Vec<f64>,
    /// e^{2 ln²10 σ_ε²}
    eps_exp: Vec<f64>,
}

impl LevelTerms {
    fn new(grid: &EcGrid) -> Self {
        let pow10 = |scale: f64| {
            grid.gammas
                .iter()
                .map(|g| 10f64.powf(scale * g))
                .collect::<Vec<_>>()
        };
        Self {
            gain: pow10(1.0),
            gain_inv: pow10(-1.0),
            gain_sq: pow10(2.0),
            gain_sq_inv: pow10(-2.0),
            eps_exp: grid
                .sigma_epsilon
                .iter()
                .map(|s| (2.0 * LN_10 * LN_10 * s * s).exp())
                .collect(),
        }
    }
}

/// Delay terms of the grid for one band centre frequency.
#[derive(Debug, Clone)]
struct DelayTerms {
    /// e^{-iωτ}
    tau_exp: Vec<Complex64>,
    /// e^{-2iωτ}
    tau_exp2: Vec<Complex64>,
    /// e^{-2ω²σ_δ²}
    delta_exp: Vec<f64>,
    /// e^{(ln²10 σ_ε² - ω²σ_δ²)/2}, `ntaus × ngammas`
    eps_delta_exp: Vec<f64>,
}

impl DelayTerms {
    fn new(grid: &EcGrid, omega: f64) -> Self {
        let ngammas = grid.ngammas();
        let mut eps_delta_exp = Vec::with_capacity(grid.len());
        for sd in &grid.sigma_delta {
            for se in &grid.sigma_epsilon {
                eps_delta_exp
                    .push((0.5 * (LN_10 * LN_10 * se * se - omega * omega * sd * sd)).exp());
            }
        }
        debug_assert_eq!(eps_delta_exp.len(), grid.ntaus() * ngammas);

        Self {
            tau_exp: grid.taus.iter().map(|t| Complex64::from_polar(1.0, -omega * t)).collect(),
            tau_exp2: grid
                .taus
                .iter()
                .map(|t| Complex64::from_polar(1.0, -2.0 * omega * t))
                .collect(),
            delta_exp: grid
                .sigma_delta
                .iter()
                .map(|sd| (-2.0 * omega * omega * sd * sd).exp())
                .collect(),
            eps_delta_exp,
        }
    }
}

/// Evaluate `E(τ, γ)` over the whole grid into `out` (`ntaus × ngammas`).
fn expected_power(sums: &CrossSums, levels: &LevelTerms, delays: &DelayTerms, out: &mut [f64]) {
    let ngammas = levels.gain.len();
    let cross_level = sums.lr + sums.rl;

    for (t, row) in out.chunks_mut(ngammas).enumerate() {
        let te = delays.tau_exp[t];
        let l_term = 2.0 * (te * sums.l_rho).re;
        let r_term = 2.0 * (te * sums.r_rho).re;
        let rho_term =
            2.0 * (sums.rho_conj.re + delays.delta_exp[t] * (delays.tau_exp2[t] * sums.rho_rho).re);
        let ed = &delays.eps_delta_exp[t * ngammas..(t + 1) * ngammas];

        for (g, e) in row.iter_mut().enumerate() {
            *e = (levels.gain_sq[g] * sums.ll + levels.gain_sq_inv[g] * sums.rr) * levels.eps_exp[g]
                + cross_level
                - l_term * levels.gain[g] * ed[g]
                - r_term * levels.gain_inv[g] * ed[g]
                + rho_term;
        }
    }
}

/// Pick the grid point of maximal `p` (`ntaus × ngammas`, row-major).
///
/// For every level column the first delay row attaining the column maximum
/// is taken, then the first column whose maximum is largest. Returns
/// `(tau_index, gamma_index)`.
pub fn select_grid_point(p: &[f64], ntaus: usize, ngammas: usize) -> (usize, usize) {
    let mut best = (0, 0);
    let mut best_val = f64::NEG_INFINITY;
    for g in 0..ngammas {
        let mut col_t = 0;
        let mut col_val = p[g];
        for t in 1..ntaus {
            let v = p[t * ngammas + g];
            if v > col_val {
                col_val = v;
                col_t = t;
            }
        }
        if g == 0 || col_val > best_val {
            best_val = col_val;
            best = (col_t, g);
        }
    }
    best
}

/// Outcome of the search in one (band, window) cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CellResult {
    /// Best grid point with its correlation and selectivity
    Valid {
        tau_index: usize,
        gamma_index: usize,
        correlation: f64,
        selectivity: f64,
    },
    /// Near-silent or ill-conditioned segment
    Degenerate,
}

/// EC search over a set of binaural spectra.
#[derive(Debug)]
pub struct EcSearch<'a> {
    spectra: BinauralSpectra<'a>,
    fids: &'a [[usize; 2]],
    omegas: &'a [f64],
    window_frames: usize,
    grid: &'a EcGrid,
    levels: LevelTerms,
}

impl<'a> EcSearch<'a> {
    /// Prepare a search.
    ///
    /// `fids` holds 1-based `[low, high]` bin edges per band and `omegas` the
    /// band centre angular frequencies (rad/s).
    pub fn new(
        spectra: BinauralSpectra<'a>,
        fids: &'a [[usize; 2]],
        omegas: &'a [f64],
        window_frames: usize,
        grid: &'a EcGrid,
    ) -> MbstoiResult<Self> {
        if fids.len() != omegas.len() {
            return Err(MbstoiError::LengthMismatch {
                context: "band edges vs centre frequencies",
                expected: fids.len(),
                actual: omegas.len(),
            });
        }
        if window_frames == 0 {
            return Err(MbstoiError::InvalidParameter("window_frames must be > 0".to_string()));
        }
        if spectra.frames() < window_frames {
            return Err(MbstoiError::NotEnoughFrames {
                frames: spectra.frames(),
                required: window_frames,
            });
        }
        if grid.is_empty() {
            return Err(MbstoiError::InvalidParameter("EC grid is empty".to_string()));
        }
        for (band, &[low, high]) in fids.iter().enumerate() {
            if low == 0 || high > spectra.bins() || low > high + 1 {
                return Err(MbstoiError::BandEdgeOutOfRange {
                    band,
                    low,
                    high,
                    bins: spectra.bins(),
                });
            }
        }

        Ok(Self {
            spectra,
            fids,
            omegas,
            window_frames,
            grid,
            levels: LevelTerms::new(grid),
        })
    }

    /// Convenience constructor taking edges and frequencies from a band bank.
    pub fn from_bands(
        spectra: BinauralSpectra<'a>,
        bands: &'a ThirdOctaveBands,
        omegas: &'a [f64],
        window_frames: usize,
        grid: &'a EcGrid,
    ) -> MbstoiResult<Self> {
        Self::new(spectra, bands.fids(), omegas, window_frames, grid)
    }

    pub fn num_bands(&self) -> usize {
        self.fids.len()
    }

    pub fn num_windows(&self) -> usize {
        num_windows(self.spectra.frames(), self.window_frames)
    }

    /// Search every cell, writing into `d` and `p_ec_max`.
    pub fn run(&self, d: &mut BandGrid, p_ec_max: &mut BandGrid) -> MbstoiResult<()> {
        d.check_shape(self.num_bands(), self.num_windows())?;
        p_ec_max.check_shape(self.num_bands(), self.num_windows())?;

        for (band, (d_row, p_row)) in d.rows_mut().zip(p_ec_max.rows_mut()).enumerate() {
            self.search_band(band, d_row, p_row);
        }
        Ok(())
    }

    /// Search all windows of one band into its rows of `d` and `p_ec_max`.
    pub(crate) fn search_band(&self, band: usize, d_row: &mut [f64], p_row: &mut [f64]) {
        let [low, high] = self.fids[band];
        let bins = (low - 1)..high;
        let n = self.window_frames;

        let x = BandEnvelopes::compute(self.spectra.xl, self.spectra.xr, bins.clone());
        let y = BandEnvelopes::compute(self.spectra.yl, self.spectra.yr, bins);
        let delays = DelayTerms::new(self.grid, self.omegas[band]);

        let mut xw = BandEnvelopes::default();
        let mut yw = BandEnvelopes::default();
        let mut scratch = GridScratch::new(self.grid.len());

        for (window, (d_cell, p_cell)) in d_row.iter_mut().zip(p_row.iter_mut()).enumerate() {
            x.window_into(window, n, &mut xw);
            y.window_into(window, n, &mut yw);

            match self.evaluate_cell(&xw, &yw, &delays, &mut scratch) {
                CellResult::Valid {
                    correlation,
                    selectivity,
                    ..
                } => {
                    *d_cell = correlation;
                    *p_cell = selectivity;
                }
                CellResult::Degenerate => {
                    tracing::trace!(band, window, "degenerate EC cell");
                    *d_cell = DEGENERATE;
                }
            }
        }
    }

    fn evaluate_cell(
        &self,
        x: &BandEnvelopes,
        y: &BandEnvelopes,
        delays: &DelayTerms,
        scratch: &mut GridScratch,
    ) -> CellResult {
        expected_power(&CrossSums::new(x, y), &self.levels, delays, &mut scratch.exy);
        expected_power(&CrossSums::new(x, x), &self.levels, delays, &mut scratch.exx);
        expected_power(&CrossSums::new(y, y), &self.levels, delays, &mut scratch.eyy);

        let min_product = scratch
            .exx
            .iter()
            .zip(&scratch.eyy)
            .map(|(a, b)| (a * b).abs())
            .fold(f64::INFINITY, f64::min);
        if !(min_product >= DEGENERACY_THRESHOLD) {
            return CellResult::Degenerate;
        }

        for ((p, a), b) in scratch.p.iter_mut().zip(&scratch.exx).zip(&scratch.eyy) {
            *p = a / b;
        }
        let (t, g) = select_grid_point(&scratch.p, self.grid.ntaus(), self.grid.ngammas());
        let idx = t * self.grid.ngammas() + g;

        let norm = (scratch.exx[idx] * scratch.eyy[idx]).sqrt();
        if !(norm > 0.0) || !norm.is_finite() {
            return CellResult::Degenerate;
        }

        CellResult::Valid {
            tau_index: t,
            gamma_index: g,
            correlation: scratch.exy[idx] / norm,
            selectivity: scratch.p[idx],
        }
    }
}

/// Reusable per-band buffers for the three quadratic forms and their ratio.
struct GridScratch {
    exy: Vec<f64>,
    exx: Vec<f64>,
    eyy: Vec<f64>,
    p: Vec<f64>,
}

impl GridScratch {
    fn new(len: usize) -> Self {
        Self {
            exy: vec![0.0; len],
            exx: vec![0.0; len],
            eyy: vec![0.0; len],
            p: vec![0.0; len],
        }
    }
}

/// Run the EC search, filling the pre-zeroed `d` and `p_ec_max` grids.
///
/// Both grids must have shape `bands × (frames - window_frames + 1)`.
pub fn ec_search(
    spectra: BinauralSpectra<'_>,
    fids: &[[usize; 2]],
    omegas: &[f64],
    window_frames: usize,
    grid: &EcGrid,
    d: &mut BandGrid,
    p_ec_max: &mut BandGrid,
) -> MbstoiResult<()> {
    EcSearch::new(spectra, fids, omegas, window_frames, grid)?.run(d, p_ec_max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{JitterConstants, MbstoiParams};
    use crate::stft::StftProcessor;
    use approx::assert_relative_eq;
    use rand::{rngs::StdRng, SeedableRng};
    use rand_distr::{Distribution, Normal};

    fn noise(len: usize, seed: u64) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        let normal = Normal::new(0.0, 1.0).unwrap();
        (0..len).map(|_| normal.sample(&mut rng)).collect()
    }

    /// Amplitude-modulated noise so that band envelopes vary over frames.
    fn modulated_noise(len: usize, seed: u64) -> Vec<f64> {
        noise(len, seed)
            .into_iter()
            .enumerate()
            .map(|(i, v)| {
                v * (1.2 + (2.0 * std::f64::consts::PI * 4.0 * i as f64 / 10_000.0).sin())
            })
            .collect()
    }

    fn spectra_of(signals: [&[f64]; 4]) -> Vec<Spectrogram> {
        let mut proc = StftProcessor::new(256, 512).unwrap();
        signals.iter().map(|s| proc.single_sided(s)).collect()
    }

    fn small_grid() -> EcGrid {
        MbstoiParams::builder().grid_coarseness(4).build().ec_grid()
    }

    fn run_search(specs: &[Spectrogram], grid: &EcGrid) -> (BandGrid, BandGrid) {
        let bands = ThirdOctaveBands::new(10_000.0, 512, 15, 150.0).unwrap();
        let omegas = bands.angular_center_frequencies();
        let spectra = BinauralSpectra::new(&specs[0], &specs[1], &specs[2], &specs[3]).unwrap();
        let windows = num_windows(spectra.frames(), 30);
        let mut d = BandGrid::zeros(15, windows);
        let mut p = BandGrid::zeros(15, windows);
        ec_search(spectra, bands.fids(), &omegas, 30, grid, &mut d, &mut p).unwrap();
        (d, p)
    }

    #[test]
    fn test_num_windows() {
        assert_eq!(num_windows(45, 30), 16);
        assert_eq!(num_windows(30, 30), 1);
        assert_eq!(num_windows(29, 30), 0);
    }

    #[test]
    fn test_identical_signals_correlate_perfectly() {
        let xl = modulated_noise(6000, 1);
        let xr: Vec<f64> = xl.iter().map(|v| 0.5 * v).collect();
        let specs = spectra_of([&xl, &xr, &xl, &xr]);
        let (d, p) = run_search(&specs, &small_grid());

        for band in 0..d.bands() {
            for w in 0..d.windows() {
                let v = d.get(band, w);
                assert!(v != DEGENERATE, "band {} window {} degenerate", band, w);
                assert_relative_eq!(v, 1.0, epsilon = 1e-9);
                assert_relative_eq!(p.get(band, w), 1.0, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_silent_band_is_degenerate() {
        let zeros = vec![0.0; 6000];
        let specs = spectra_of([&zeros, &zeros, &zeros, &zeros]);
        let (d, p) = run_search(&specs, &small_grid());
        assert!(d.as_slice().iter().all(|&v| v == DEGENERATE));
        assert!(p.as_slice().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_uncorrelated_degraded_scores_low() {
        let xl = modulated_noise(8000, 2);
        let xr = modulated_noise(8000, 3);
        let yl = noise(8000, 4);
        let yr = noise(8000, 5);
        let specs = spectra_of([&xl, &xr, &yl, &yr]);
        let (d, _) = run_search(&specs, &small_grid());
        let mean = d.mean().unwrap();
        assert!(mean.abs() < 0.3, "mean correlation {}", mean);
        assert!(d.as_slice().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_expected_power_is_symmetric() {
        let xl = modulated_noise(5000, 6);
        let xr = modulated_noise(5000, 7);
        let yl = noise(5000, 8);
        let yr = noise(5000, 9);
        let specs = spectra_of([&xl, &xr, &yl, &yr]);
        let x = BandEnvelopes::compute(&specs[0], &specs[1], 20..30);
        let y = BandEnvelopes::compute(&specs[2], &specs[3], 20..30);
        let mut xw = BandEnvelopes::default();
        let mut yw = BandEnvelopes::default();
        x.window_into(0, 30, &mut xw);
        y.window_into(0, 30, &mut yw);

        let grid = small_grid();
        let levels = LevelTerms::new(&grid);
        let delays = DelayTerms::new(&grid, 2.0 * std::f64::consts::PI * 500.0);
        let mut a = vec![0.0; grid.len()];
        let mut b = vec![0.0; grid.len()];
        expected_power(&CrossSums::new(&xw, &yw), &levels, &delays, &mut a);
        expected_power(&CrossSums::new(&yw, &xw), &levels, &delays, &mut b);
        for (u, v) in a.iter().zip(&b) {
            assert_relative_eq!(u, v, max_relative = 1e-10);
        }
    }

    #[test]
    fn test_expected_power_without_jitter_is_envelope_energy() {
        // without jitter and at τ = γ = 0, E(x, x) is the energy of the
        // de-meaned EC output power envelope
        let xl = modulated_noise(5000, 10);
        let xr = modulated_noise(5000, 11);
        let specs = spectra_of([&xl, &xr, &xl, &xr]);
        let x = BandEnvelopes::compute(&specs[0], &specs[1], 30..40);
        let mut xw = BandEnvelopes::default();
        x.window_into(0, 30, &mut xw);

        let jitter = JitterConstants {
            sigma_delta_0: 0.0,
            sigma_epsilon_0: 0.0,
            ..JitterConstants::default()
        };
        let grid = EcGrid::new((0.0, 0.0, 1), (0.0, 0.0, 1), &jitter);
        let levels = LevelTerms::new(&grid);
        let delays = DelayTerms::new(&grid, 1000.0);
        let mut e = vec![0.0; 1];
        expected_power(&CrossSums::new(&xw, &xw), &levels, &delays, &mut e);

        // EC output power per frame: L + R - 2 Re(ρ), de-meaned, squared
        let direct: f64 = (0..30)
            .map(|f| xw.left[f] + xw.right[f] - 2.0 * xw.cross[f].re)
            .map(|p| p * p)
            .sum();
        assert_relative_eq!(e[0], direct, max_relative = 1e-9);
    }

    #[test]
    fn test_select_grid_point_tie_break() {
        // 3 taus × 2 gammas, every value tied
        let p = vec![1.0; 6];
        assert_eq!(select_grid_point(&p, 3, 2), (0, 0));

        // global maximum tied between (2, 0) and (1, 1): the first level column wins
        let p = vec![
            0.0, 0.0, //
            0.0, 5.0, //
            5.0, 0.0,
        ];
        assert_eq!(select_grid_point(&p, 3, 2), (2, 0));

        // within a column the first delay row wins
        let p = vec![
            0.0, 3.0, //
            0.0, 3.0, //
            0.0, 1.0,
        ];
        assert_eq!(select_grid_point(&p, 3, 2), (0, 1));
    }

    #[test]
    fn test_band_edges_out_of_range() {
        let x = vec![0.0; 6000];
        let specs = spectra_of([&x, &x, &x, &x]);
        let spectra = BinauralSpectra::new(&specs[0], &specs[1], &specs[2], &specs[3]).unwrap();
        let grid = small_grid();
        let fids = [[1, 300]];
        let omegas = [1000.0];
        let err = EcSearch::new(spectra, &fids, &omegas, 30, &grid).unwrap_err();
        assert_eq!(
            err,
            MbstoiError::BandEdgeOutOfRange {
                band: 0,
                low: 1,
                high: 300,
                bins: 257
            }
        );
    }

    #[test]
    fn test_grid_shape_checked() {
        let x = vec![0.0; 6000];
        let specs = spectra_of([&x, &x, &x, &x]);
        let spectra = BinauralSpectra::new(&specs[0], &specs[1], &specs[2], &specs[3]).unwrap();
        let grid = small_grid();
        let fids = [[8, 9]];
        let omegas = [1000.0];
        let mut d = BandGrid::zeros(1, 1);
        let mut p = BandGrid::zeros(1, 1);
        let err = ec_search(spectra, &fids, &omegas, 30, &grid, &mut d, &mut p).unwrap_err();
        assert!(matches!(err, MbstoiError::GridShapeMismatch { .. }));
    }

    #[test]
    fn test_not_enough_frames() {
        let x = vec![0.0; 1000];
        let specs = spectra_of([&x, &x, &x, &x]);
        let spectra = BinauralSpectra::new(&specs[0], &specs[1], &specs[2], &specs[3]).unwrap();
        let grid = small_grid();
        let fids = [[8, 9]];
        let omegas = [1000.0];
        assert!(matches!(
            EcSearch::new(spectra, &fids, &omegas, 30, &grid),
            Err(MbstoiError::NotEnoughFrames { frames: 5, required: 30 })
        ));
    }

    #[test]
    fn test_mismatched_spectra() {
        let a = Spectrogram::zeros(40, 257);
        let b = Spectrogram::zeros(41, 257);
        assert!(BinauralSpectra::new(&a, &a, &a, &b).is_err());
    }
}

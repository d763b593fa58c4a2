//! Better-ear correlations
//!
//! The monaural alternative to the EC stage. Each ear is scored on its own:
//! third-octave band envelopes `X(j, m) = Σ_b H[j, b] · |X(b, m)|²` of the
//! clean and degraded spectra are correlated per N-frame window.
//!
//! ```text
//!   x̃, ỹ   = de-meaned clean / degraded envelopes of one band and window
//!   p      = Σ x̃² / Σ ỹ²                 selectivity
//!   d      = Σ x̃ỹ / (‖x̃‖ · ‖ỹ‖)          correlation (0 when not finite)
//!
//!   p_be = max(p_l, p_r)       d_be = p_l > p_r ? d_l : d_r
//! ```
//!
//! A NaN selectivity propagates through the maximum, so a cell whose
//! envelopes are flat never wins against the EC result.

use crate::stft::Spectrogram;
use crate::thirdoct::ThirdOctaveBands;
use crate::types::{BandGrid, MbstoiError, MbstoiResult};

/// Better-ear correlation and selectivity grids, `bands × windows`.
#[derive(Debug, Clone, PartialEq)]
pub struct BetterEar {
    pub correlation: BandGrid,
    pub selectivity: BandGrid,
}

/// Third-octave band energy envelopes of a spectrogram, `bands × frames`.
pub fn band_envelopes(spec: &Spectrogram, bands: &ThirdOctaveBands) -> MbstoiResult<BandGrid> {
    if spec.bins() != bands.num_bins() {
        return Err(MbstoiError::LengthMismatch {
            context: "spectrogram bins vs band matrix",
            expected: bands.num_bins(),
            actual: spec.bins(),
        });
    }

    let mut env = BandGrid::zeros(bands.num_bands(), spec.frames());
    let mut energies = vec![0.0; bands.num_bands()];
    for frame in 0..spec.frames() {
        bands.band_energies(&spec.power(frame), &mut energies);
        for (band, &e) in energies.iter().enumerate() {
            env.set(band, frame, e);
        }
    }
    Ok(env)
}

/// Correlation and selectivity of one clean/degraded envelope window.
///
/// Returns `(d, p)`; `d` is zeroed when not finite, `p` is left as computed.
pub fn ear_correlation(clean: &[f64], degraded: &[f64]) -> (f64, f64) {
    let n = clean.len() as f64;
    let mx = clean.iter().sum::<f64>() / n;
    let my = degraded.iter().sum::<f64>() / n;

    let (mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0);
    for (x, y) in clean.iter().zip(degraded) {
        let (x, y) = (x - mx, y - my);
        sxx += x * x;
        syy += y * y;
        sxy += x * y;
    }

    let d = sxy / (sxx.sqrt() * syy.sqrt());
    (if d.is_finite() { d } else { 0.0 }, sxx / syy)
}

/// Maximum that returns NaN when either operand is NaN.
fn nan_max(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        f64::NAN
    } else {
        a.max(b)
    }
}

/// Compute better-ear grids over every N-frame window.
pub fn better_ear(
    xl: &Spectrogram,
    xr: &Spectrogram,
    yl: &Spectrogram,
    yr: &Spectrogram,
    bands: &ThirdOctaveBands,
    window_frames: usize,
) -> MbstoiResult<BetterEar> {
    let frames = xl.frames();
    for other in [xr, yl, yr] {
        if other.frames() != frames {
            return Err(MbstoiError::LengthMismatch {
                context: "spectrogram frames",
                expected: frames,
                actual: other.frames(),
            });
        }
    }
    if window_frames == 0 || frames < window_frames {
        return Err(MbstoiError::NotEnoughFrames {
            frames,
            required: window_frames.max(1),
        });
    }

    let env_xl = band_envelopes(xl, bands)?;
    let env_xr = band_envelopes(xr, bands)?;
    let env_yl = band_envelopes(yl, bands)?;
    let env_yr = band_envelopes(yr, bands)?;

    let windows = frames + 1 - window_frames;
    let mut correlation = BandGrid::zeros(bands.num_bands(), windows);
    let mut selectivity = BandGrid::zeros(bands.num_bands(), windows);

    for band in 0..bands.num_bands() {
        let (xl, xr) = (env_xl.row(band), env_xr.row(band));
        let (yl, yr) = (env_yl.row(band), env_yr.row(band));

        for w in 0..windows {
            let span = w..w + window_frames;
            let (dl, pl) = ear_correlation(&xl[span.clone()], &yl[span.clone()]);
            let (dr, pr) = ear_correlation(&xr[span.clone()], &yr[span]);

            selectivity.set(band, w, nan_max(pl, pr));
            correlation.set(band, w, if pl > pr { dl } else { dr });
        }
    }

    Ok(BetterEar {
        correlation,
        selectivity,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stft::StftProcessor;
    use approx::assert_relative_eq;

    fn bank() -> ThirdOctaveBands {
        ThirdOctaveBands::new(10_000.0, 512, 15, 150.0).unwrap()
    }

    #[test]
    fn test_ear_correlation_identity() {
        let x = [1.0, 3.0, 2.0, 5.0, 4.0];
        let (d, p) = ear_correlation(&x, &x);
        assert_relative_eq!(d, 1.0, epsilon = 1e-12);
        assert_relative_eq!(p, 1.0);
    }

    #[test]
    fn test_ear_correlation_scaled_and_offset() {
        let x = [1.0, 3.0, 2.0, 5.0, 4.0];
        let y: Vec<f64> = x.iter().map(|v| 10.0 + 0.5 * v).collect();
        let (d, p) = ear_correlation(&x, &y);
        assert_relative_eq!(d, 1.0, epsilon = 1e-12);
        assert_relative_eq!(p, 4.0, epsilon = 1e-12);
    }

    #[test]
    fn test_flat_envelope_zeroes_correlation() {
        let x = [2.0; 6];
        let y = [1.0, 2.0, 3.0, 1.0, 2.0, 3.0];
        let (d, p) = ear_correlation(&x, &y);
        assert_eq!(d, 0.0);
        assert_eq!(p, 0.0);

        // both flat: 0/0 correlation and selectivity
        let (d, p) = ear_correlation(&x, &x);
        assert_eq!(d, 0.0);
        assert!(p.is_nan());
    }

    #[test]
    fn test_nan_max_propagates() {
        assert!(nan_max(f64::NAN, 1.0).is_nan());
        assert!(nan_max(1.0, f64::NAN).is_nan());
        assert_eq!(nan_max(1.0, 2.0), 2.0);
    }

    #[test]
    fn test_better_ear_picks_more_selective_ear() {
        let n = 6000;
        let x: Vec<f64> = (0..n)
            .map(|i| {
                let t = i as f64 / 10_000.0;
                (2.0 * std::f64::consts::PI * 1000.0 * t).sin()
                    * (1.5 + (2.0 * std::f64::consts::PI * 3.0 * t).sin())
            })
            .collect();
        let quiet: Vec<f64> = x.iter().map(|v| 0.1 * v).collect();
        // right ear degraded is a louder copy, so the left ear is more selective
        let loud: Vec<f64> = x.iter().map(|v| 3.0 * v).collect();

        let mut proc = StftProcessor::new(256, 512).unwrap();
        let xl = proc.single_sided(&x);
        let xr = proc.single_sided(&x);
        let yl = proc.single_sided(&quiet);
        let yr = proc.single_sided(&loud);

        let be = better_ear(&xl, &xr, &yl, &yr, &bank(), 30).unwrap();
        assert_eq!(be.correlation.shape(), (15, xl.frames() - 29));

        // 1 kHz falls in band 8 (bins 43..55); envelopes scale with the
        // squared gain, so the left selectivity is 1e4 against 1/81 on the right
        let p = be.selectivity.get(8, 0);
        assert_relative_eq!(p, 1e4, max_relative = 1e-6);
        assert_relative_eq!(be.correlation.get(8, 0), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_silent_band_never_selects() {
        let zeros = vec![0.0; 6000];
        let mut proc = StftProcessor::new(256, 512).unwrap();
        let s = proc.single_sided(&zeros);
        let be = better_ear(&s, &s, &s, &s, &bank(), 30).unwrap();
        assert!(be.selectivity.as_slice().iter().all(|p| p.is_nan()));
        assert!(be.correlation.as_slice().iter().all(|&d| d == 0.0));
    }

    #[test]
    fn test_not_enough_frames() {
        let s = Spectrogram::zeros(10, 257);
        assert!(matches!(
            better_ear(&s, &s, &s, &s, &bank(), 30),
            Err(MbstoiError::NotEnoughFrames { frames: 10, required: 30 })
        ));
    }

    #[test]
    fn test_band_envelopes_shape_check() {
        let s = Spectrogram::zeros(5, 100);
        assert!(band_envelopes(&s, &bank()).is_err());
    }
}

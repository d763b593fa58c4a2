//! Silent frame removal
//!
//! Frames whose clean-signal energy lies more than `dynamic_range` dB below the
//! loudest clean frame carry no speech information and are dropped from all
//! four channels before analysis.
//!
//! ```text
//!   clean L ─┐ frame + Hann ─► energy dB ─► e > max - range ─┐
//!            │                                               OR ─► mask
//!   clean R ─┘ frame + Hann ─► energy dB ─► e > max - range ─┘      │
//!                                                                   ▼
//!   xl, xr, yl, yr ──► frame + Hann ──► keep masked frames ──► overlap-add
//! ```
//!
//! Frame starts are `0, hop, 2·hop, …` strictly below `len - frame_len`.
//! The surviving frames are overlap-added into signals of
//! `(kept - 1) · hop + frame_len` samples.

use crate::stft::hann_window;
use crate::types::{MbstoiError, MbstoiResult, Sample, StereoSignal};

/// Clean and degraded stereo pairs after silent-frame removal.
#[derive(Debug, Clone, PartialEq)]
pub struct TrimmedSignals {
    pub clean: StereoSignal,
    pub degraded: StereoSignal,
    /// Frames that survived the energy mask
    pub kept_frames: usize,
    /// Frames inspected
    pub total_frames: usize,
}

/// Frame start offsets used for energy analysis.
fn frame_starts(len: usize, frame_len: usize, hop: usize) -> impl Iterator<Item = usize> {
    (0..len.saturating_sub(frame_len)).step_by(hop.max(1))
}

/// Per-frame energy in dB of the Hann-windowed frames of `x`.
pub fn frame_energies_db(x: &[Sample], window: &[f64], hop: usize) -> Vec<f64> {
    let frame_len = window.len();
    frame_starts(x.len(), frame_len, hop)
        .map(|start| {
            let norm = x[start..start + frame_len]
                .iter()
                .zip(window)
                .map(|(s, w)| (s * w) * (s * w))
                .sum::<f64>()
                .sqrt();
            20.0 * (norm + f64::EPSILON).log10()
        })
        .collect()
}

/// Frames whose energy is within `dynamic_range` dB of the loudest frame.
pub fn active_frame_mask(energies_db: &[f64], dynamic_range: f64) -> Vec<bool> {
    let max = energies_db.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    energies_db
        .iter()
        .map(|&e| max - dynamic_range - e < 0.0)
        .collect()
}

/// Remove frames that are silent in the clean signal from all four channels.
///
/// A frame is kept when it is active in either clean ear. If no frame
/// survives (a signal shorter than one frame) the outputs are
/// `frame_len - hop` zeros.
pub fn remove_silent_frames(
    clean: &StereoSignal,
    degraded: &StereoSignal,
    dynamic_range: f64,
    frame_len: usize,
    hop: usize,
) -> MbstoiResult<TrimmedSignals> {
    if clean.len() != degraded.len() {
        return Err(MbstoiError::LengthMismatch {
            context: "clean vs degraded signal",
            expected: clean.len(),
            actual: degraded.len(),
        });
    }
    if frame_len == 0 || hop == 0 {
        return Err(MbstoiError::InvalidParameter(
            "silence removal needs frame_len > 0 and hop > 0".to_string(),
        ));
    }

    let window = hann_window(frame_len);
    let mask_left =
        active_frame_mask(&frame_energies_db(clean.left(), &window, hop), dynamic_range);
    let mask_right =
        active_frame_mask(&frame_energies_db(clean.right(), &window, hop), dynamic_range);

    let kept: Vec<usize> = frame_starts(clean.len(), frame_len, hop)
        .zip(mask_left.iter().zip(&mask_right))
        .filter(|(_, (&l, &r))| l || r)
        .map(|(start, _)| start)
        .collect();
    let total_frames = mask_left.len();

    let out_len = (kept.len() * hop + frame_len).saturating_sub(hop);
    let rebuild = |x: &[Sample]| overlap_add(x, &kept, &window, hop, out_len);

    tracing::debug!(
        kept = kept.len(),
        total = total_frames,
        samples = out_len,
        "removed silent frames"
    );

    Ok(TrimmedSignals {
        clean: clean.map_channels(rebuild),
        degraded: degraded.map_channels(rebuild),
        kept_frames: kept.len(),
        total_frames,
    })
}

/// Window the frames starting at `starts` and overlap-add them back to back.
fn overlap_add(
    x: &[Sample],
    starts: &[usize],
    window: &[f64],
    hop: usize,
    out_len: usize,
) -> Vec<Sample> {
    let mut out = vec![0.0; out_len];
    for (i, &start) in starts.iter().enumerate() {
        let dst = &mut out[i * hop..i * hop + window.len()];
        for ((d, s), w) in dst.iter_mut().zip(&x[start..start + window.len()]).zip(window) {
            *d += s * w;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn stereo(left: Vec<f64>, right: Vec<f64>) -> StereoSignal {
        StereoSignal::new(left, right).unwrap()
    }

    #[test]
    fn test_constant_input_keeps_all_frames() {
        let x = stereo(vec![0.5; 2048], vec![0.5; 2048]);
        let out = remove_silent_frames(&x, &x, 40.0, 256, 128).unwrap();
        // starts 0, 128, ..., 1664
        assert_eq!(out.total_frames, 14);
        assert_eq!(out.kept_frames, 14);
        assert_eq!(out.clean.len(), 13 * 128 + 256);
        assert_eq!(out.degraded.len(), out.clean.len());
    }

    #[test]
    fn test_constant_input_interior_is_window_sum() {
        let x = stereo(vec![1.0; 2048], vec![1.0; 2048]);
        let out = remove_silent_frames(&x, &x, 40.0, 256, 128).unwrap();
        let w = hann_window(256);
        // interior samples see two overlapping windows
        let expected = w[10] + w[128 + 10];
        assert_relative_eq!(out.clean.left()[256 + 10], expected, epsilon = 1e-12);
    }

    #[test]
    fn test_silent_middle_is_removed() {
        let n = 4096;
        let mut left = vec![0.0; n];
        for (i, v) in left.iter_mut().enumerate() {
            if !(1024..3072).contains(&i) {
                *v = ((i as f64) * 0.3).sin();
            }
        }
        let x = stereo(left.clone(), left);
        let out = remove_silent_frames(&x, &x, 40.0, 256, 128).unwrap();
        assert!(out.kept_frames < out.total_frames);
        assert_eq!(out.clean.len(), (out.kept_frames - 1) * 128 + 256);
    }

    #[test]
    fn test_either_ear_keeps_frame() {
        let n = 2048;
        let active: Vec<f64> = (0..n).map(|i| ((i as f64) * 0.2).sin()).collect();
        // left ear silent in the second half, right ear silent in the first half
        let left: Vec<f64> = active
            .iter()
            .enumerate()
            .map(|(i, v)| if i < n / 2 { *v } else { 0.0 })
            .collect();
        let right: Vec<f64> = active
            .iter()
            .enumerate()
            .map(|(i, v)| if i >= n / 2 { *v } else { 0.0 })
            .collect();
        let x = stereo(left, right);
        let out = remove_silent_frames(&x, &x, 40.0, 256, 128).unwrap();
        assert_eq!(out.kept_frames, out.total_frames);
    }

    #[test]
    fn test_mask_comes_from_clean_only() {
        let n = 4096;
        let mut clean = vec![0.0; n];
        for (i, v) in clean.iter_mut().enumerate().take(2048) {
            *v = ((i as f64) * 0.3).sin();
        }
        let noisy: Vec<f64> = (0..n).map(|i| ((i as f64) * 0.7).cos()).collect();
        let x = stereo(clean.clone(), clean);
        let y = stereo(noisy.clone(), noisy);
        let out = remove_silent_frames(&x, &y, 40.0, 256, 128).unwrap();
        assert!(out.kept_frames < out.total_frames);
        assert_eq!(out.degraded.len(), out.clean.len());
    }

    #[test]
    fn test_too_short_degenerates() {
        let x = stereo(vec![1.0; 200], vec![1.0; 200]);
        let out = remove_silent_frames(&x, &x, 40.0, 256, 128).unwrap();
        assert_eq!(out.kept_frames, 0);
        assert_eq!(out.clean.len(), 256 - 128);
        assert!(out.clean.left().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_length_mismatch() {
        let x = stereo(vec![0.0; 10], vec![0.0; 10]);
        let y = stereo(vec![0.0; 11], vec![0.0; 11]);
        assert!(matches!(
            remove_silent_frames(&x, &y, 40.0, 4, 2),
            Err(MbstoiError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn test_active_frame_mask_threshold() {
        let mask = active_frame_mask(&[0.0, -39.0, -40.0, -41.0], 40.0);
        assert_eq!(mask, vec![true, true, false, false]);
    }
}

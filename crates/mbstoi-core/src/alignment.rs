//! Time alignment of processed signals
//!
//! A processing chain (hearing-loss simulation, hearing aid) delays its output
//! by a few milliseconds, differently in each ear. Passing a unit impulse
//! placed at a known sample through the same chain reveals that delay, and the
//! clean reference is shifted to match before scoring:
//!
//! ```text
//!   clean      |■■■■■■■■■■■■|
//!   processed  |··■■■■■■■■■■■■··|
//!
//!   aligned clean      |··■■■■■■■■■■■■|        per-ear delay, zero lead-in
//!   aligned processed  |··■■■■■■■■■■■■|        zero padded to the same length
//! ```

use crate::types::{MbstoiError, MbstoiResult, Sample, StereoSignal};

/// Delays above this many samples are suspicious for an impulse response.
pub const MAX_PLAUSIBLE_DELAY: usize = 2000;

/// Per-ear delay in samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EarDelays {
    pub left: isize,
    pub right: isize,
}

impl EarDelays {
    pub fn max(&self) -> isize {
        self.left.max(self.right)
    }
}

/// True when `x` has a peak: a sample, or a flat run of equal samples,
/// strictly above both of its neighbours.
fn has_local_maximum(x: &[Sample]) -> bool {
    let mut i = 1;
    while i + 1 < x.len() {
        if x[i] > x[i - 1] {
            let mut end = i;
            while end + 1 < x.len() && x[end + 1] == x[i] {
                end += 1;
            }
            if end + 1 < x.len() && x[end + 1] < x[i] {
                return true;
            }
            i = end + 1;
        } else {
            i += 1;
        }
    }
    false
}

fn first_argmax(x: &[Sample]) -> usize {
    let mut best = 0;
    for (i, &v) in x.iter().enumerate() {
        if v > x[best] {
            best = i;
        }
    }
    best
}

fn channel_delay(x: &[Sample], initial_value: usize, ear: &str) -> isize {
    if !has_local_maximum(x) {
        tracing::error!(ear, "no peak found in impulse response");
        return 0;
    }
    first_argmax(x) as isize - initial_value as isize
}

/// Locate the delay of a processed unit impulse originally at `initial_value`.
///
/// Each ear's delay is the position of its largest sample minus
/// `initial_value`. A channel without any local maximum yields 0.
pub fn find_delay_impulse(ddf: &StereoSignal, initial_value: usize) -> EarDelays {
    let delays = EarDelays {
        left: channel_delay(ddf.left(), initial_value, "left"),
        right: channel_delay(ddf.right(), initial_value, "right"),
    };
    if delays.left != delays.right {
        tracing::info!(difference = delays.left - delays.right, "interaural delay difference");
    }
    delays
}

/// Shift the clean pair by `delays` and pad both pairs to a common length.
///
/// Output length is `clean.len() + max(delays)`. Returns
/// `(aligned_clean, aligned_processed)`.
pub fn align_for_scoring(
    clean: &StereoSignal,
    processed: &StereoSignal,
    delays: EarDelays,
) -> MbstoiResult<(StereoSignal, StereoSignal)> {
    if delays.left < 0 || delays.right < 0 {
        return Err(MbstoiError::InvalidParameter(format!(
            "alignment delays must be non-negative (got {} / {})",
            delays.left, delays.right
        )));
    }
    let max_delay = delays.max() as usize;
    if max_delay > MAX_PLAUSIBLE_DELAY {
        tracing::warn!(max_delay, "implausible delay for signal time-alignment");
    }

    let len = clean.len() + max_delay;
    if processed.len() > len {
        return Err(MbstoiError::LengthMismatch {
            context: "processed signal vs aligned length",
            expected: len,
            actual: processed.len(),
        });
    }

    let shift = |x: &[Sample], delay: usize| {
        let mut out = vec![0.0; len];
        out[delay..delay + x.len()].copy_from_slice(x);
        out
    };
    let aligned_clean = StereoSignal::new(
        shift(clean.left(), delays.left as usize),
        shift(clean.right(), delays.right as usize),
    )?;
    let aligned_processed = processed.map_channels(|x| shift(x, 0));

    Ok((aligned_clean, aligned_processed))
}

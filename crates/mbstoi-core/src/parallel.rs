//! Parallel Processing Module
//!
//! Rayon-backed versions of the expensive MBSTOI stages. Enable with the
//! `parallel` feature flag.
//!
//! ## Usage
//!
//! ```toml
//! [dependencies]
//! mbstoi-core = { version = "0.1", features = ["parallel"] }
//! ```
//!
//! ## Work Partitioning
//!
//! The EC search is independent across bands. Each rayon task owns exactly
//! one band row of `d` and `p_ec_max` (`par_chunks_mut`), so no cell is ever
//! written by two tasks and no locking is needed. Results are identical to
//! the sequential search.

use rayon::prelude::*;

use crate::ec::EcSearch;
use crate::metric::Mbstoi;
use crate::types::{BandGrid, MbstoiResult, StereoSignal};

/// Run the EC search with one rayon task per band.
pub fn par_ec_search(
    search: &EcSearch<'_>,
    d: &mut BandGrid,
    p_ec_max: &mut BandGrid,
) -> MbstoiResult<()> {
    let windows = search.num_windows();
    d.check_shape(search.num_bands(), windows)?;
    p_ec_max.check_shape(search.num_bands(), windows)?;

    d.as_mut_slice()
        .par_chunks_mut(windows.max(1))
        .zip(p_ec_max.as_mut_slice().par_chunks_mut(windows.max(1)))
        .enumerate()
        .for_each(|(band, (d_row, p_row))| search.search_band(band, d_row, p_row));
    Ok(())
}

/// Score many (clean, degraded) pairs in parallel.
///
/// Every pair is evaluated independently at `fs_signal`; results keep the
/// input order.
pub fn evaluate_batch(
    evaluator: &Mbstoi,
    pairs: &[(StereoSignal, StereoSignal)],
    fs_signal: f64,
) -> Vec<MbstoiResult<f64>> {
    pairs
        .par_iter()
        .map(|(clean, degraded)| evaluator.score(clean, degraded, fs_signal))
        .collect()
}

//! Core types for binaural intelligibility analysis
//!
//! This module defines the fundamental containers shared by every stage of the
//! MBSTOI pipeline:
//!
//! - [`StereoSignal`]: a left/right pair of equal-length real sample sequences
//! - [`BandGrid`]: a dense `bands × windows` matrix of per-cell results
//! - [`MbstoiError`]: the crate error type
//!
//! ## Grid Layout
//!
//! Both the intermediate correlation grid `d` and the selectivity grid
//! `p_ec_max` are stored row-major, one row per third-octave band:
//!
//! ```text
//!              window 0   window 1   ...   window M-1
//!   band 0   [  d(0,0)     d(0,1)    ...    d(0,M-1) ]
//!   band 1   [  d(1,0)     d(1,1)    ...    d(1,M-1) ]
//!    ...
//!   band J-1 [  ...                                   ]
//! ```
//!
//! A row is a contiguous slice, so a band can be handed to exactly one worker
//! with `chunks_mut(windows)` and no two workers ever alias the same cell.

/// A real-valued audio sample
pub type Sample = f64;

/// Result type for MBSTOI operations
pub type MbstoiResult<T> = Result<T, MbstoiError>;

/// Errors that can occur while computing MBSTOI
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MbstoiError {
    #[error("Length mismatch in {context}: expected {expected}, got {actual}")]
    LengthMismatch {
        context: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error(
        "Not enough STFT frames after removing silent frames: got {frames}, need at least {required}"
    )]
    NotEnoughFrames { frames: usize, required: usize },

    #[error("Band {band} edges [{low}, {high}] fall outside the {bins}-bin spectrum")]
    BandEdgeOutOfRange {
        band: usize,
        low: usize,
        high: usize,
        bins: usize,
    },

    #[error("Grid shape mismatch: expected {expected:?}, got {actual:?}")]
    GridShapeMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

/// A binaural signal: two equal-length channels at a common sample rate.
#[derive(Debug, Clone, PartialEq)]
pub struct StereoSignal {
    left: Vec<Sample>,
    right: Vec<Sample>,
}

impl StereoSignal {
    /// Create a stereo signal, rejecting channels of different lengths.
    pub fn new(left: Vec<Sample>, right: Vec<Sample>) -> MbstoiResult<Self> {
        if left.len() != right.len() {
            return Err(MbstoiError::LengthMismatch {
                context: "stereo channels",
                expected: left.len(),
                actual: right.len(),
            });
        }
        Ok(Self { left, right })
    }

    /// Create a silent stereo signal of `len` samples per channel.
    pub fn zeros(len: usize) -> Self {
        Self {
            left: vec![0.0; len],
            right: vec![0.0; len],
        }
    }

    pub fn left(&self) -> &[Sample] {
        &self.left
    }

    pub fn right(&self) -> &[Sample] {
        &self.right
    }

    /// Samples per channel.
    pub fn len(&self) -> usize {
        self.left.len()
    }

    pub fn is_empty(&self) -> bool {
        self.left.is_empty()
    }

    /// Mutable access to both channels at once.
    pub fn channels_mut(&mut self) -> (&mut [Sample], &mut [Sample]) {
        (&mut self.left, &mut self.right)
    }

    /// Apply the same transform to both channels.
    pub fn map_channels<F>(&self, mut f: F) -> Self
    where
        F: FnMut(&[Sample]) -> Vec<Sample>,
    {
        Self {
            left: f(&self.left),
            right: f(&self.right),
        }
    }

    /// Euclidean norm of each channel, `(‖left‖, ‖right‖)`.
    pub fn norms(&self) -> (f64, f64) {
        let norm = |x: &[Sample]| x.iter().map(|v| v * v).sum::<f64>().sqrt();
        (norm(&self.left), norm(&self.right))
    }
}

/// Dense `bands × windows` matrix indexed by (band, window).
#[derive(Debug, Clone, PartialEq)]
pub struct BandGrid {
    bands: usize,
    windows: usize,
    data: Vec<f64>,
}

impl BandGrid {
    /// Allocate a zero-filled grid.
    pub fn zeros(bands: usize, windows: usize) -> Self {
        Self::filled(bands, windows, 0.0)
    }

    /// Allocate a grid with every cell set to `value`.
    pub fn filled(bands: usize, windows: usize, value: f64) -> Self {
        Self {
            bands,
            windows,
            data: vec![value; bands * windows],
        }
    }

    pub fn bands(&self) -> usize {
        self.bands
    }

    pub fn windows(&self) -> usize {
        self.windows
    }

    /// `(bands, windows)`
    pub fn shape(&self) -> (usize, usize) {
        (self.bands, self.windows)
    }

    #[inline]
    pub fn get(&self, band: usize, window: usize) -> f64 {
        self.data[band * self.windows + window]
    }

    #[inline]
    pub fn set(&mut self, band: usize, window: usize, value: f64) {
        self.data[band * self.windows + window] = value;
    }

    pub fn row(&self, band: usize) -> &[f64] {
        let start = band * self.windows;
        &self.data[start..start + self.windows]
    }

    pub fn row_mut(&mut self, band: usize) -> &mut [f64] {
        let start = band * self.windows;
        &mut self.data[start..start + self.windows]
    }

    /// Iterate over disjoint mutable band rows.
    pub fn rows_mut(&mut self) -> impl Iterator<Item = &mut [f64]> {
        // chunks_mut(0) panics; an empty grid has no rows anyway
        self.data.chunks_mut(self.windows.max(1))
    }

    /// Raw row-major storage.
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.data
    }

    /// Arithmetic mean of all cells, `None` for an empty grid.
    pub fn mean(&self) -> Option<f64> {
        if self.data.is_empty() {
            return None;
        }
        Some(self.data.iter().sum::<f64>() / self.data.len() as f64)
    }

    pub(crate) fn check_shape(&self, bands: usize, windows: usize) -> MbstoiResult<()> {
        if self.shape() != (bands, windows) {
            return Err(MbstoiError::GridShapeMismatch {
                expected: (bands, windows),
                actual: self.shape(),
            });
        }
        Ok(())
    }
}

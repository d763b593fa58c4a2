//! # Observability
//!
//! The library only emits `tracing` events; installing a subscriber is left to
//! the application. [`init_logging`] wires up `tracing-subscriber` from a
//! [`LogConfig`], which is also part of the YAML configuration file.
//!
//! ## Events
//!
//! | Level   | Emitted for                                                   |
//! |---------|---------------------------------------------------------------|
//! | `info`  | final score with valid / better-ear cell counts               |
//! | `warn`  | clean/degraded level ratio above 5 decades, no valid cells    |
//! | `debug` | resampling, silent-frame removal, spectra, grid sizes         |
//! | `trace` | every degenerate EC cell (band, window)                       |
//!
//! ```rust,ignore
//! use mbstoi_core::observe::{init_logging, LogConfig};
//!
//! init_logging(&LogConfig::development());
//! let score = mbstoi_core::mbstoi(&xl, &xr, &yl, &yr, 44_100.0)?;
//! ```

pub mod logging;

pub use logging::{init_logging, LogConfig, LogFormat, LogLevel};

//! Display-adaptive tone mapping math.
//!
//! This crate provides the pure computational components of a
//! display-adaptive tone mapper:
//! - Conditional density of local contrast given background luminance
//! - Display models (gamma-gain-offset, measured tables) and viewing geometry
//! - Tone curve optimization against the display's dynamic range
//! - Tone curve application with color correction
//! - Temporal filtering of tone curves for video
//!
//! This crate spawns **no threads**. For background jobs with progress events,
//! use the `datmo` crate.
//!
//! # Cooperative Cancellation
//!
//! Long-running operations accept an `impl Progress` parameter, which extends
//! `enough::Stop` with progress reporting. Pass a [`ProgressToken`] to observe
//! progress and cancel from another thread, or `Unstoppable` when neither is
//! needed.
//!
//! # Example
//!
//! ```ignore
//! use datmo_core::{
//!     apply_tone_curve, compute_tone_curve, estimate_conditional_density,
//!     ColorCorrection, DisplayFunction, DisplayPreset, DisplaySize, RgbPlanes,
//!     WhiteAnchor,
//! };
//! use enough::Unstoppable;
//!
//! let lum = hdr.luminance()?;
//! let density = estimate_conditional_density(&lum, &Unstoppable)?;
//!
//! let display = DisplayFunction::preset(DisplayPreset::Lcd);
//! let curve = compute_tone_curve(
//!     &density, &display, &DisplaySize::default(), 1.0, WhiteAnchor::None, &Unstoppable,
//! )?;
//!
//! let mut out = RgbPlanes::new(hdr.width, hdr.height)?;
//! apply_tone_curve(
//!     &mut out, &hdr, &lum, &curve, &display, 1.0, ColorCorrection::Luminance, &Unstoppable,
//! )?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod apply;
pub mod csf;
pub mod curve;
pub mod density;
pub mod display;
pub mod progress;
mod types;

// Re-export core types
pub use types::{luminance, Error, LuminanceMap, Result, RgbPlanes};

// Re-export enough for convenience
pub use enough::{Stop, StopReason, Unstoppable};

pub use apply::{apply_tone_curve, apply_tone_curve_in_place, ColorCorrection};
pub use curve::{
    compute_tone_curve, compute_tone_curve_into, CurveStorage, KnotGrid, TemporalFilter,
    ToneCurve, WhiteAnchor, TAP_SIZE,
};
pub use density::{estimate_conditional_density, ConditionalDensity};
pub use display::{DisplayFunction, DisplayPreset, DisplaySize, GogDisplay, LookupDisplay};
pub use progress::{Progress, ProgressBand, ProgressToken};

/// Safety limits for allocation.
pub mod limits {
    /// Maximum image dimension (width or height).
    pub const MAX_IMAGE_DIMENSION: u32 = 65535;

    /// Maximum total pixels (width * height).
    pub const MAX_TOTAL_PIXELS: u64 = 500_000_000; // 500 megapixels
}

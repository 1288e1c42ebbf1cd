//! Cancellable display-adaptive tone mapping jobs.
//!
//! This crate wraps the computations of [`datmo_core`] into jobs that run on
//! a worker thread, report progress, can be cancelled at any time and deliver
//! exactly one result or one error.
//!
//! # Crate Structure
//!
//! - [`datmo_core`] - Density, tone curve, applicator and display models (no threads)
//! - `datmo` (this crate) - Options, working-frame preparation, operators, jobs
//!
//! # Example
//!
//! ```ignore
//! use datmo::{JobEvent, JobRegistry, TonemapJob, TonemapOptions};
//!
//! let registry = JobRegistry::new();
//! let options = TonemapOptions { xsize: Some(800), ..Default::default() };
//!
//! let handle = TonemapJob::display_adaptive(frame, frame_width, options)
//!     .with_registry(&registry)
//!     .spawn()?;
//!
//! for event in handle.events() {
//!     match event {
//!         JobEvent::Progress(p) => println!("{}%", p),
//!         JobEvent::ImageComputed(image, _) => show(image.to_rgba8()),
//!         JobEvent::Error(message) => eprintln!("{}", message),
//!         _ => {}
//!     }
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// Re-export core types at crate root
pub use datmo_core::{
    limits, luminance, ColorCorrection, ConditionalDensity, DisplayFunction, DisplayPreset,
    DisplaySize, Error, LuminanceMap, ProgressToken, Result, RgbPlanes, Stop, StopReason,
    ToneCurve, Unstoppable, WhiteAnchor,
};

pub mod frame;
pub mod job;
pub mod operator;
pub mod options;

pub use frame::{DisplayImage, HdrFrame};
pub use job::{JobEvent, JobHandle, JobRegistry, TonemapJob};
pub use operator::{DisplayAdaptiveOperator, ToneMapOperator};
pub use options::{DisplayAdaptiveOptions, DisplaySelection, TonemapOptions};

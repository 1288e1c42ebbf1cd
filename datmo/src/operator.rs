//! Tone mapping operators runnable by a job.

use std::sync::{Mutex, PoisonError};

use datmo_core::{
    apply_tone_curve_in_place, compute_tone_curve, estimate_conditional_density, ProgressBand,
    ProgressToken, Result, TemporalFilter,
};
use log::debug;

use crate::frame::{DisplayImage, HdrFrame};
use crate::options::DisplayAdaptiveOptions;

/// A tone mapping operator: scene-referred frame in, display codes out.
///
/// Implementations poll `progress` for cancellation and return
/// `Error::Stopped` when asked to terminate.
pub trait ToneMapOperator: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Tone-map `frame`, reporting progress in `0..=progress.maximum()`.
    fn tonemap(&self, frame: &HdrFrame, progress: &ProgressToken) -> Result<DisplayImage>;
}

/// Curves of the frames tone-mapped so far by one operator.
#[derive(Debug, Default)]
struct Sequence {
    filter: TemporalFilter,
    next_frame: u64,
}

/// Display-adaptive tone mapping: density, curve, application.
///
/// With `options.temporal` set, the operator treats successive calls as
/// frames of one sequence and smooths each curve with a [`TemporalFilter`]
/// before applying it. Share one operator (behind `Arc`) across the jobs of
/// a sequence.
#[derive(Debug, Default)]
pub struct DisplayAdaptiveOperator {
    options: DisplayAdaptiveOptions,
    sequence: Mutex<Sequence>,
}

impl DisplayAdaptiveOperator {
    /// Operator with the given options.
    pub fn new(options: DisplayAdaptiveOptions) -> Self {
        Self {
            options,
            sequence: Mutex::default(),
        }
    }

    /// Current options.
    pub fn options(&self) -> &DisplayAdaptiveOptions {
        &self.options
    }

    /// Forget previous frames, e.g. at a scene cut.
    pub fn reset_sequence(&self) {
        let mut seq = self.sequence.lock().unwrap_or_else(PoisonError::into_inner);
        seq.filter.reset();
    }

    /// Number of frames currently in the smoothing window.
    pub fn smoothed_frames(&self) -> usize {
        self.sequence
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .filter
            .len()
    }
}

impl ToneMapOperator for DisplayAdaptiveOperator {
    fn name(&self) -> &str {
        "display-adaptive"
    }

    fn tonemap(&self, frame: &HdrFrame, progress: &ProgressToken) -> Result<DisplayImage> {
        let opts = &self.options;
        opts.validate()?;
        let display = opts.display.display_function();

        let lum = frame.luminance()?;
        let max = progress.maximum();

        let density =
            estimate_conditional_density(&lum, &ProgressBand::new(progress, 0, max * 60 / 100))?;

        let curve = compute_tone_curve(
            &density,
            &display,
            &opts.display_size,
            opts.enhancement,
            opts.white_anchor,
            &ProgressBand::new(progress, max * 60 / 100, max * 20 / 100),
        )?;
        let curve = if opts.temporal {
            let mut seq = self.sequence.lock().unwrap_or_else(PoisonError::into_inner);
            let frame_index = seq.next_frame;
            seq.next_frame += 1;
            seq.filter.smooth(frame_index, &curve)?
        } else {
            curve
        };
        debug!(
            "{}: {} luminance bins, {} bands, curve {:?}",
            self.name(),
            density.luminance_bins(),
            density.bands(),
            curve.value_range()
        );

        let mut planes = frame.clone();
        apply_tone_curve_in_place(
            &mut planes,
            &lum,
            &curve,
            &display,
            opts.saturation,
            opts.color_correction,
            &ProgressBand::new(progress, max * 80 / 100, max - max * 80 / 100),
        )?;

        Ok(DisplayImage::from_planes(planes))
    }
}

//! Temporal smoothing of per-frame tone curves for video.

use std::collections::VecDeque;
use std::f64::consts::PI;

use log::trace;

use crate::types::{Error, Result};

use super::ToneCurve;

/// Number of frames in the smoothing window.
pub const TAP_SIZE: usize = 26;

/// Sliding-window low-pass filter over tone curves.
///
/// Each call to [`smooth`](Self::smooth) appends a frame's curve and returns
/// the weighted average of the window. The taps are the decaying half of a
/// Hann window indexed by frame age, so the frame being tone-mapped weighs
/// most and the output is not delayed. Until the window is full the first
/// `n` taps are renormalized over the `n` frames present, so the first
/// output equals the first input.
#[derive(Debug)]
pub struct TemporalFilter {
    window: VecDeque<(u64, ToneCurve<'static>)>,
    taps: [f64; TAP_SIZE],
}

impl TemporalFilter {
    /// Empty filter.
    pub fn new() -> Self {
        let mut taps = [0.0; TAP_SIZE];
        for (k, t) in taps.iter_mut().enumerate() {
            *t = 0.5 + 0.5 * (PI * (k + 1) as f64 / (TAP_SIZE + 1) as f64).cos();
        }
        Self {
            window: VecDeque::with_capacity(TAP_SIZE),
            taps,
        }
    }

    /// Add the curve for `frame_index` and return the smoothed curve.
    ///
    /// Frame indices must strictly increase. Older curves are re-sampled onto
    /// the newest curve's knot grid when the grids differ.
    pub fn smooth(
        &mut self,
        frame_index: u64,
        curve: &ToneCurve<'_>,
    ) -> Result<ToneCurve<'static>> {
        if let Some(last) = self.last_frame_index() {
            if frame_index <= last {
                return Err(Error::InvalidParameter(format!(
                    "frame index {} does not follow {}",
                    frame_index, last
                )));
            }
        }

        if self.window.len() == TAP_SIZE {
            self.window.pop_front();
        }
        self.window.push_back((frame_index, curve.to_owned_curve()));

        let grid = *curve.grid();
        let n = self.window.len();
        let taps = &self.taps[..n];
        let norm: f64 = taps.iter().sum();

        let mut acc = vec![0.0f64; grid.len()];
        for ((_, c), &tap) in self.window.iter().rev().zip(taps) {
            let w = tap / norm;
            if *c.grid() == grid {
                for (a, &y) in acc.iter_mut().zip(c.values()) {
                    *a += w * y;
                }
            } else {
                for (i, a) in acc.iter_mut().enumerate() {
                    *a += w * c.evaluate(grid.x(i));
                }
            }
        }

        trace!("temporal filter: frame {}, {} curves in window", frame_index, n);
        ToneCurve::new(grid, acc)
    }

    /// Drop all buffered curves.
    pub fn reset(&mut self) {
        self.window.clear();
    }

    /// Number of buffered curves.
    pub fn len(&self) -> usize {
        self.window.len()
    }

    /// True if no curve has been added since creation or the last reset.
    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    /// True once the window holds [`TAP_SIZE`] curves.
    pub fn is_full(&self) -> bool {
        self.window.len() == TAP_SIZE
    }

    /// Index of the most recent frame.
    pub fn last_frame_index(&self) -> Option<u64> {
        self.window.back().map(|(i, _)| *i)
    }

    /// Filter taps by frame age, newest first.
    pub fn taps(&self) -> &[f64; TAP_SIZE] {
        &self.taps
    }
}

impl Default for TemporalFilter {
    fn default() -> Self {
        Self::new()
    }
}

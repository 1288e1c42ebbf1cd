//! Display-adaptive tone curve optimization.
//!
//! The curve is chosen so that contrast, weighted by how often it occurs in
//! the image and how visible it is on the target display, is distorted as
//! little as possible while the whole curve fits the display's dynamic range.
//!
//! With segment slopes `s_i` and visibility weights `w_i` the problem is
//!
//! ```text
//! minimize   Σ w_i (s_i − e)²
//! subject to s_i ≥ 0,  Σ s_i · Δ ≤ R
//! ```
//!
//! whose solution is `s_i = max(0, e − μ / w_i)` for a single budget
//! multiplier `μ ≥ 0`. The multiplier is found by active-set iteration.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::csf::band_weights;
use crate::density::{ConditionalDensity, DELTA};
use crate::display::{DisplayFunction, DisplaySize};
use crate::progress::{post_fraction, Progress};
use crate::types::{Error, Result};

use super::{KnotGrid, ToneCurve};

/// Contrast detection threshold (log10 units) at peak sensitivity.
pub const DETECTION_THRESHOLD: f64 = 0.01;

/// Which scene luminance, if any, is pinned to the display's peak.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WhiteAnchor {
    /// Centre the curve in the display range (recommended for HDR input).
    #[default]
    None,
    /// Map this scene luminance to the display's maximum luminance.
    Luminance(f64),
}

impl WhiteAnchor {
    fn validate(self) -> Result<()> {
        match self {
            Self::None => Ok(()),
            Self::Luminance(w) if w.is_finite() && w > 0.0 => Ok(()),
            Self::Luminance(w) => Err(Error::InvalidParameter(format!(
                "white anchor luminance must be positive, got {}",
                w
            ))),
        }
    }
}

/// Compute the tone curve for an image's statistics and a target display.
///
/// `enhancement` is the target slope: 1 preserves contrast where the display
/// range allows it, larger values boost it.
pub fn compute_tone_curve(
    density: &ConditionalDensity,
    display: &DisplayFunction,
    size: &DisplaySize,
    enhancement: f64,
    white_anchor: WhiteAnchor,
    progress: &impl Progress,
) -> Result<ToneCurve<'static>> {
    let (grid, y) = solve(density, display, size, enhancement, white_anchor, progress)?;
    ToneCurve::new(grid, y)
}

/// Like [`compute_tone_curve`], writing into an existing curve.
///
/// On error `curve` is left unchanged. A curve with borrowed storage must
/// already have `density.luminance_bins() + 1` knots.
pub fn compute_tone_curve_into(
    curve: &mut ToneCurve<'_>,
    density: &ConditionalDensity,
    display: &DisplayFunction,
    size: &DisplaySize,
    enhancement: f64,
    white_anchor: WhiteAnchor,
    progress: &impl Progress,
) -> Result<()> {
    let (grid, y) = solve(density, display, size, enhancement, white_anchor, progress)?;
    curve.commit(grid, y)
}

fn solve(
    density: &ConditionalDensity,
    display: &DisplayFunction,
    size: &DisplaySize,
    enhancement: f64,
    white_anchor: WhiteAnchor,
    progress: &impl Progress,
) -> Result<(KnotGrid, Vec<f64>)> {
    progress.check()?;

    if !enhancement.is_finite() || enhancement < 0.0 {
        return Err(Error::InvalidParameter(format!(
            "contrast enhancement must be a non-negative number, got {}",
            enhancement
        )));
    }
    white_anchor.validate()?;
    display.validate()?;
    size.validate()?;

    let (y_lo, y_hi) = display.log_range();
    let range = y_hi - y_lo;
    if !range.is_finite() || range <= 0.0 {
        return Err(Error::Degenerate(format!(
            "display range [{}, {}] cd/m² is empty",
            display.black_level(),
            display.max_luminance()
        )));
    }

    let bins = density.luminance_bins();
    let grid = KnotGrid::new(density.l_min(), DELTA, bins + 1)?;

    let weights = segment_weights(density, size.pixels_per_degree());
    if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
        return Err(Error::Degenerate("non-finite segment weights".into()));
    }

    let slopes = solve_slopes(&weights, enhancement, range / DELTA, progress)?;

    let mut y = Vec::with_capacity(bins + 1);
    let mut acc = 0.0;
    y.push(acc);
    for s in &slopes {
        acc += s * DELTA;
        y.push(acc);
    }
    let rise = acc;

    let offset = match white_anchor {
        WhiteAnchor::None => y_lo + (range - rise).max(0.0) / 2.0,
        WhiteAnchor::Luminance(w) => {
            let pos = ((w.log10() - grid.start()) / DELTA).round();
            let j = (pos.max(0.0) as usize).min(bins);
            y_hi - y[j]
        }
    };
    for v in &mut y {
        *v = (*v + offset).clamp(y_lo, y_hi);
    }

    progress.post(100);
    debug!(
        "tone curve: {} knots from {:.2}, rise {:.3} of {:.3} log units, enhancement {}",
        grid.len(),
        grid.start(),
        rise,
        range,
        enhancement
    );

    Ok((grid, y))
}

/// Visibility-weighted occurrence of contrast in each luminance segment.
fn segment_weights(density: &ConditionalDensity, pixels_per_degree: f64) -> Vec<f64> {
    let sensitivity = band_weights(density.bands(), pixels_per_degree);

    (0..density.luminance_bins())
        .map(|x| {
            sensitivity
                .iter()
                .enumerate()
                .map(|(f, &csf)| {
                    let occupancy = density.occupancy(f, x);
                    if occupancy == 0.0 {
                        return 0.0;
                    }
                    let threshold = DETECTION_THRESHOLD / csf;
                    let visible: f64 = density
                        .contrast_histogram(f, x)
                        .iter()
                        .enumerate()
                        .map(|(g, &p)| {
                            let c = ConditionalDensity::contrast_of_bin(g);
                            p * c * c / (c + threshold)
                        })
                        .sum();
                    csf * occupancy * visible
                })
                .sum()
        })
        .collect()
}

/// Slopes minimizing `Σ w_i (s_i − e)²` under the range budget `Σ s_i ≤ budget`.
fn solve_slopes(
    weights: &[f64],
    enhancement: f64,
    budget: f64,
    progress: &impl Progress,
) -> Result<Vec<f64>> {
    let n = weights.len();
    let mut active: Vec<bool> = weights.iter().map(|&w| w > 0.0).collect();
    let mut count = active.iter().filter(|&&a| a).count();

    let unconstrained = count as f64 * enhancement;
    if count == 0 || enhancement == 0.0 || unconstrained <= budget {
        return Ok(weights
            .iter()
            .map(|&w| if w > 0.0 { enhancement } else { 0.0 })
            .collect());
    }

    for iteration in 0..=n {
        progress.check()?;
        post_fraction(progress, iteration, n + 1);

        let inv_sum: f64 = weights
            .iter()
            .zip(&active)
            .filter(|(_, &a)| a)
            .map(|(&w, _)| 1.0 / w)
            .sum();
        let mu = (count as f64 * enhancement - budget) / inv_sum;
        if !mu.is_finite() {
            return Err(Error::Degenerate("budget multiplier diverged".into()));
        }

        let mut dropped = false;
        for (a, &w) in active.iter_mut().zip(weights) {
            if *a && enhancement - mu / w <= 0.0 {
                *a = false;
                count -= 1;
                dropped = true;
            }
        }

        if !dropped {
            return Ok(weights
                .iter()
                .zip(&active)
                .map(|(&w, &a)| if a { (enhancement - mu / w).max(0.0) } else { 0.0 })
                .collect());
        }
        if count == 0 {
            return Ok(vec![0.0; n]);
        }
    }

    Err(Error::Degenerate(
        "active-set iteration did not converge".into(),
    ))
}

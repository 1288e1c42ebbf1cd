//! Tone curve application with color correction.
//!
//! Luminance is mapped through the tone curve; color is reconstructed from
//! each channel's ratio to the input luminance and finally encoded to display
//! codes with the inverse display model.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::curve::ToneCurve;
use crate::density::MIN_LUMINANCE;
use crate::display::DisplayFunction;
use crate::progress::{post_fraction, Progress};
use crate::types::{Error, LuminanceMap, Result, RgbPlanes};

/// Scanlines processed between cancellation checks.
const ROW_BLOCK: usize = 16;

/// Saturation-correction constants of the luminance-preserving model.
const CC_K1: f64 = 1.48;
const CC_K2: f64 = 0.82;

/// How color is carried through the luminance tone curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorCorrection {
    /// `C_out = L_d · (C / L)^s`.
    ///
    /// Simple, but saturation shifts with the amount of compression.
    Ratio,
    /// `C_out = ((C / L − 1) · s' + 1) · L_d`, with `s'` derived from the
    /// local curve slope so that compressed regions keep their apparent
    /// colorfulness (Mantiuk et al. 2009).
    #[default]
    Luminance,
}

/// Per-pixel mapping shared by both entry points.
struct PixelMap<'a, 'c> {
    curve: &'a ToneCurve<'c>,
    display: &'a DisplayFunction,
    saturation: f64,
    strategy: ColorCorrection,
}

impl PixelMap<'_, '_> {
    #[inline]
    fn map(&self, rgb: [f32; 3], lum: f32) -> [f32; 3] {
        let l_in = (lum as f64).max(MIN_LUMINANCE as f64);
        let x = l_in.log10();
        let l_out = 10f64.powf(self.curve.evaluate(x));

        let encode = |c: f64| self.display.to_code(c.max(0.0)) as f32;
        let ratio = |c: f32| (c as f64).max(0.0) / l_in;

        match self.strategy {
            ColorCorrection::Ratio => {
                rgb.map(|c| encode(l_out * ratio(c).powf(self.saturation)))
            }
            ColorCorrection::Luminance => {
                let slope = self.curve.slope_at(x).max(0.0);
                let t = slope.powf(CC_K2);
                let s = self.saturation * (1.0 + CC_K1) * t / (1.0 + CC_K1 * t);
                rgb.map(|c| encode(((ratio(c) - 1.0) * s + 1.0) * l_out))
            }
        }
    }
}

fn check_saturation(saturation: f64) -> Result<()> {
    if !saturation.is_finite() || saturation < 0.0 {
        return Err(Error::InvalidParameter(format!(
            "saturation must be a non-negative number, got {}",
            saturation
        )));
    }
    Ok(())
}

/// Tone-map `input` into `out` as display codes in `[0, 1]`.
///
/// `lum` must be the luminance of `input`; `out` must have the same size.
/// Cancellation is checked every 16 scanlines. When stopped, `out` holds a
/// partially written image.
#[allow(clippy::too_many_arguments)]
pub fn apply_tone_curve(
    out: &mut RgbPlanes,
    input: &RgbPlanes,
    lum: &LuminanceMap,
    curve: &ToneCurve<'_>,
    display: &DisplayFunction,
    saturation: f64,
    strategy: ColorCorrection,
    progress: &impl Progress,
) -> Result<()> {
    check_saturation(saturation)?;
    input.validate()?;
    out.validate()?;
    input.ensure_size(lum.width(), lum.height())?;
    out.ensure_size(lum.width(), lum.height())?;

    let mapper = PixelMap {
        curve,
        display,
        saturation,
        strategy,
    };
    let width = lum.width() as usize;
    let height = lum.height() as usize;
    let l = lum.data();

    for y0 in (0..height).step_by(ROW_BLOCK) {
        progress.check()?;

        let y1 = (y0 + ROW_BLOCK).min(height);
        for i in y0 * width..y1 * width {
            let [r, g, b] = mapper.map([input.r[i], input.g[i], input.b[i]], l[i]);
            out.r[i] = r;
            out.g[i] = g;
            out.b[i] = b;
        }
        post_fraction(progress, y1, height);
    }

    debug!(
        "applied tone curve to {}x{} ({:?}, saturation {})",
        width, height, strategy, saturation
    );
    Ok(())
}

/// Tone-map `planes` in place.
///
/// Same contract as [`apply_tone_curve`] with the output aliasing the input.
pub fn apply_tone_curve_in_place(
    planes: &mut RgbPlanes,
    lum: &LuminanceMap,
    curve: &ToneCurve<'_>,
    display: &DisplayFunction,
    saturation: f64,
    strategy: ColorCorrection,
    progress: &impl Progress,
) -> Result<()> {
    check_saturation(saturation)?;
    planes.validate()?;
    planes.ensure_size(lum.width(), lum.height())?;

    let mapper = PixelMap {
        curve,
        display,
        saturation,
        strategy,
    };
    let width = lum.width() as usize;
    let height = lum.height() as usize;
    let l = lum.data();

    for y0 in (0..height).step_by(ROW_BLOCK) {
        progress.check()?;

        let y1 = (y0 + ROW_BLOCK).min(height);
        for i in y0 * width..y1 * width {
            let [r, g, b] = mapper.map([planes.r[i], planes.g[i], planes.b[i]], l[i]);
            planes.r[i] = r;
            planes.g[i] = g;
            planes.b[i] = b;
        }
        post_fraction(progress, y1, height);
    }

    Ok(())
}

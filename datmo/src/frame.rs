//! Working-frame preparation and display-referred output images.

use datmo_core::{Error, Result, RgbPlanes};
use log::debug;

use crate::options::TonemapOptions;

/// Scene-referred linear RGB frame handed to a tone mapping job.
pub type HdrFrame = RgbPlanes;

/// Tone-mapped image holding display codes in `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayImage {
    planes: RgbPlanes,
}

impl DisplayImage {
    /// Wrap planes that already hold display codes.
    pub fn from_planes(planes: RgbPlanes) -> Self {
        Self { planes }
    }

    /// Image width in pixels.
    pub fn width(&self) -> u32 {
        self.planes.width
    }

    /// Image height in pixels.
    pub fn height(&self) -> u32 {
        self.planes.height
    }

    /// Code planes.
    pub fn planes(&self) -> &RgbPlanes {
        &self.planes
    }

    /// Unwrap into the code planes.
    pub fn into_planes(self) -> RgbPlanes {
        self.planes
    }

    /// Interleaved 8-bit RGBA with opaque alpha, for hosts that blit pixels.
    pub fn to_rgba8(&self) -> Vec<u8> {
        let quantize = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        let p = &self.planes;
        let mut out = Vec::with_capacity(p.len() * 4);
        for i in 0..p.len() {
            out.extend_from_slice(&[quantize(p.r[i]), quantize(p.g[i]), quantize(p.b[i]), 255]);
        }
        out
    }
}

/// Raise every channel to `1 / pregamma`. Negative samples become zero.
pub fn apply_pregamma(frame: &mut HdrFrame, pregamma: f64) -> Result<()> {
    if !pregamma.is_finite() || pregamma <= 0.0 {
        return Err(Error::InvalidParameter(format!(
            "pregamma must be positive, got {}",
            pregamma
        )));
    }
    let exponent = (1.0 / pregamma) as f32;
    for c in frame
        .r
        .iter_mut()
        .chain(frame.g.iter_mut())
        .chain(frame.b.iter_mut())
    {
        *c = c.max(0.0).powf(exponent);
    }
    Ok(())
}

/// Resample to `new_width` pixels wide, preserving the aspect ratio.
///
/// Uses bilinear interpolation.
pub fn resize_frame(frame: &HdrFrame, new_width: u32) -> Result<HdrFrame> {
    frame.validate()?;
    let new_height = ((frame.height as f64 * new_width as f64 / frame.width as f64).round()
        as u32)
        .max(1);
    let mut output = RgbPlanes::new(new_width, new_height)?;

    let x_ratio = frame.width as f32 / new_width as f32;
    let y_ratio = frame.height as f32 / new_height as f32;

    for y in 0..new_height {
        for x in 0..new_width {
            let src_x = x as f32 * x_ratio;
            let src_y = y as f32 * y_ratio;

            let x0 = (src_x.floor() as u32).min(frame.width - 1);
            let y0 = (src_y.floor() as u32).min(frame.height - 1);
            let x1 = (x0 + 1).min(frame.width - 1);
            let y1 = (y0 + 1).min(frame.height - 1);

            let fx = src_x - src_x.floor();
            let fy = src_y - src_y.floor();

            let i00 = (y0 * frame.width + x0) as usize;
            let i10 = (y0 * frame.width + x1) as usize;
            let i01 = (y1 * frame.width + x0) as usize;
            let i11 = (y1 * frame.width + x1) as usize;
            let o = (y * new_width + x) as usize;

            for (src, dst) in [
                (&frame.r, &mut output.r),
                (&frame.g, &mut output.g),
                (&frame.b, &mut output.b),
            ] {
                dst[o] = bilinear(src[i00], src[i10], src[i01], src[i11], fx, fy);
            }
        }
    }

    Ok(output)
}

#[inline]
fn bilinear(v00: f32, v10: f32, v01: f32, v11: f32, fx: f32, fy: f32) -> f32 {
    let top = v00 * (1.0 - fx) + v10 * fx;
    let bottom = v01 * (1.0 - fx) + v11 * fx;
    top * (1.0 - fy) + bottom * fy
}

/// Turn the caller's frame into the job's private working frame.
///
/// Pre-gamma is applied when it differs from 1, and the frame is resampled to
/// `options.xsize` when that differs from `original_width`.
pub fn prepare_working_frame(
    mut frame: HdrFrame,
    original_width: u32,
    options: &TonemapOptions,
) -> Result<HdrFrame> {
    frame.validate()?;

    if options.pregamma != 1.0 {
        apply_pregamma(&mut frame, options.pregamma)?;
    }

    match options.xsize {
        Some(xsize) if xsize != original_width => {
            let resized = resize_frame(&frame, xsize)?;
            debug!(
                "working frame resized {}x{} -> {}x{}",
                frame.width, frame.height, resized.width, resized.height
            );
            Ok(resized)
        }
        _ => Ok(frame),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(width: u32, height: u32) -> HdrFrame {
        let n = (width * height) as usize;
        let ramp: Vec<f32> = (0..n).map(|i| i as f32).collect();
        RgbPlanes::from_planes(width, height, ramp.clone(), ramp.clone(), ramp).unwrap()
    }

    #[test]
    fn test_pregamma() {
        let mut f = RgbPlanes::from_planes(2, 1, vec![4.0, -1.0], vec![9.0, 1.0], vec![0.0, 16.0])
            .unwrap();
        apply_pregamma(&mut f, 2.0).unwrap();
        let expected = [2.0, 0.0, 3.0, 1.0, 0.0, 4.0];
        let got = f.r.iter().chain(&f.g).chain(&f.b);
        for (g, e) in got.zip(expected) {
            assert!((g - e).abs() < 1e-6, "{} vs {}", g, e);
        }

        assert!(apply_pregamma(&mut f, 0.0).is_err());
    }

    #[test]
    fn test_resize_preserves_aspect() {
        let out = resize_frame(&frame(40, 20), 10).unwrap();
        assert_eq!((out.width, out.height), (10, 5));
        assert_eq!(out.len(), 50);
        assert_eq!(out.r[0], 0.0);
    }

    #[test]
    fn test_resize_never_zero_height() {
        let out = resize_frame(&frame(100, 1), 3).unwrap();
        assert_eq!((out.width, out.height), (3, 1));
    }

    #[test]
    fn test_resize_constant_stays_constant() {
        let f = RgbPlanes::from_planes(7, 5, vec![3.0; 35], vec![1.0; 35], vec![2.0; 35]).unwrap();
        let out = resize_frame(&f, 13).unwrap();
        assert!(out.r.iter().all(|&v| (v - 3.0).abs() < 1e-6));
        assert!(out.b.iter().all(|&v| (v - 2.0).abs() < 1e-6));
    }

    #[test]
    fn test_prepare_skips_when_unchanged() {
        let f = frame(8, 4);
        let options = TonemapOptions {
            xsize: Some(8),
            ..Default::default()
        };
        let out = prepare_working_frame(f.clone(), 8, &options).unwrap();
        assert_eq!(out, f);
    }

    #[test]
    fn test_prepare_resizes_against_original_width() {
        let options = TonemapOptions {
            xsize: Some(4),
            ..Default::default()
        };
        let out = prepare_working_frame(frame(8, 4), 16, &options).unwrap();
        assert_eq!((out.width, out.height), (4, 2));
    }

    #[test]
    fn test_rgba8() {
        let planes =
            RgbPlanes::from_planes(2, 1, vec![0.0, 1.0], vec![0.5, 2.0], vec![-1.0, 1.0]).unwrap();
        let img = DisplayImage::from_planes(planes);
        assert_eq!(img.to_rgba8(), vec![0, 128, 0, 255, 255, 255, 255, 255]);
    }
}

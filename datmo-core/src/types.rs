//! Core types: errors, luminance maps and planar RGB images.

use enough::StopReason;
use thiserror::Error;

use crate::limits;

/// Errors that can occur during tone curve computation and application.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Operation was stopped via cooperative cancellation.
    #[error("operation stopped: {0}")]
    Stopped(StopReason),

    /// Image dimensions are invalid (zero or too large).
    #[error("invalid image dimensions: {0}x{1}")]
    InvalidDimensions(u32, u32),

    /// Two buffers that must describe the same image have different sizes.
    #[error("dimension mismatch: expected {expected_w}x{expected_h}, got {actual_w}x{actual_h}")]
    DimensionMismatch {
        /// Expected width.
        expected_w: u32,
        /// Expected height.
        expected_h: u32,
        /// Actual width.
        actual_w: u32,
        /// Actual height.
        actual_h: u32,
    },

    /// Pixel data is invalid (wrong length, negative or non-finite samples).
    #[error("invalid pixel data: {0}")]
    InvalidPixelData(String),

    /// A tuning parameter is out of its valid range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Display model parameters are invalid.
    #[error("invalid display: {0}")]
    InvalidDisplay(String),

    /// The optimization problem is numerically degenerate.
    #[error("degenerate tone curve problem: {0}")]
    Degenerate(String),

    /// Input exceeds safety limits.
    #[error("input exceeds safety limit: {0}")]
    LimitExceeded(String),
}

/// Result type for tone mapping operations.
pub type Result<T> = core::result::Result<T, Error>;

impl From<StopReason> for Error {
    fn from(reason: StopReason) -> Self {
        Error::Stopped(reason)
    }
}

impl Error {
    /// Returns true if this error represents cooperative cancellation
    /// rather than a failure.
    pub fn is_stopped(&self) -> bool {
        matches!(self, Error::Stopped(_))
    }
}

/// Luminance weights for linear RGB (Rec. 709 primaries).
pub mod luminance {
    /// Red weight.
    pub const R: f32 = 0.212656;
    /// Green weight.
    pub const G: f32 = 0.715158;
    /// Blue weight.
    pub const B: f32 = 0.072186;

    /// Luminance of a linear RGB triple.
    #[inline]
    pub fn from_rgb(r: f32, g: f32, b: f32) -> f32 {
        R * r + G * g + B * b
    }
}

/// Validate dimensions against safety limits.
pub(crate) fn validate_dimensions(width: u32, height: u32) -> Result<usize> {
    if width == 0 || height == 0 {
        return Err(Error::InvalidDimensions(width, height));
    }

    if width > limits::MAX_IMAGE_DIMENSION || height > limits::MAX_IMAGE_DIMENSION {
        return Err(Error::LimitExceeded(format!(
            "dimension {} exceeds maximum {}",
            width.max(height),
            limits::MAX_IMAGE_DIMENSION
        )));
    }

    let total_pixels = width as u64 * height as u64;
    if total_pixels > limits::MAX_TOTAL_PIXELS {
        return Err(Error::LimitExceeded(format!(
            "total pixels {} exceeds maximum {}",
            total_pixels,
            limits::MAX_TOTAL_PIXELS
        )));
    }

    Ok(total_pixels as usize)
}

fn check_len(name: &str, len: usize, expected: usize) -> Result<()> {
    if len != expected {
        return Err(Error::InvalidPixelData(format!(
            "{} has {} samples, expected {}",
            name, len, expected
        )));
    }
    Ok(())
}

/// A dense map of absolute scene luminance.
///
/// Samples are non-negative and finite. The map is immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct LuminanceMap {
    width: u32,
    height: u32,
    data: Vec<f32>,
}

impl LuminanceMap {
    /// Wrap an existing luminance buffer (row-major, `width * height` samples).
    pub fn from_data(width: u32, height: u32, data: Vec<f32>) -> Result<Self> {
        let expected = validate_dimensions(width, height)?;
        check_len("luminance", data.len(), expected)?;

        if let Some(i) = data.iter().position(|v| !v.is_finite() || *v < 0.0) {
            return Err(Error::InvalidPixelData(format!(
                "luminance sample {} is {} (must be finite and non-negative)",
                i, data[i]
            )));
        }

        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Image width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Image height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Row-major samples.
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Sample at `(x, y)`.
    #[inline]
    pub fn get(&self, x: u32, y: u32) -> f32 {
        self.data[(y * self.width + x) as usize]
    }
}

/// Planar linear RGB image with `f32` samples.
///
/// Used both for scene-referred input (absolute or relative luminance) and
/// for display-coded output from the applicator.
#[derive(Debug, Clone, PartialEq)]
pub struct RgbPlanes {
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
    /// Red channel, row-major.
    pub r: Vec<f32>,
    /// Green channel, row-major.
    pub g: Vec<f32>,
    /// Blue channel, row-major.
    pub b: Vec<f32>,
}

impl RgbPlanes {
    /// Create a black image.
    pub fn new(width: u32, height: u32) -> Result<Self> {
        let n = validate_dimensions(width, height)?;
        Ok(Self {
            width,
            height,
            r: vec![0.0; n],
            g: vec![0.0; n],
            b: vec![0.0; n],
        })
    }

    /// Create from existing channel buffers.
    pub fn from_planes(
        width: u32,
        height: u32,
        r: Vec<f32>,
        g: Vec<f32>,
        b: Vec<f32>,
    ) -> Result<Self> {
        let n = validate_dimensions(width, height)?;
        check_len("red channel", r.len(), n)?;
        check_len("green channel", g.len(), n)?;
        check_len("blue channel", b.len(), n)?;
        Ok(Self {
            width,
            height,
            r,
            g,
            b,
        })
    }

    /// Create from interleaved RGB samples.
    pub fn from_interleaved(width: u32, height: u32, rgb: &[f32]) -> Result<Self> {
        let n = validate_dimensions(width, height)?;
        check_len("interleaved RGB", rgb.len(), n * 3)?;

        let mut img = Self::new(width, height)?;
        for (i, px) in rgb.chunks_exact(3).enumerate() {
            img.r[i] = px[0];
            img.g[i] = px[1];
            img.b[i] = px[2];
        }
        Ok(img)
    }

    /// Number of pixels.
    pub fn len(&self) -> usize {
        self.r.len()
    }

    /// True if the image holds no pixels (never the case for a validated image).
    pub fn is_empty(&self) -> bool {
        self.r.is_empty()
    }

    /// Check that this image has the given size.
    pub fn ensure_size(&self, width: u32, height: u32) -> Result<()> {
        if self.width != width || self.height != height {
            return Err(Error::DimensionMismatch {
                expected_w: width,
                expected_h: height,
                actual_w: self.width,
                actual_h: self.height,
            });
        }
        Ok(())
    }

    /// Check that all three channels hold exactly `width * height` samples.
    ///
    /// The fields are public, so images assembled by hand can drift out of
    /// shape; every consumer in this crate calls this first.
    pub fn validate(&self) -> Result<()> {
        let n = validate_dimensions(self.width, self.height)?;
        check_len("red channel", self.r.len(), n)?;
        check_len("green channel", self.g.len(), n)?;
        check_len("blue channel", self.b.len(), n)
    }

    /// Derive the luminance map with the fixed Rec. 709 weights.
    ///
    /// Negative channel values are treated as zero.
    pub fn luminance(&self) -> Result<LuminanceMap> {
        let data = self
            .r
            .iter()
            .zip(&self.g)
            .zip(&self.b)
            .map(|((&r, &g), &b)| luminance::from_rgb(r.max(0.0), g.max(0.0), b.max(0.0)))
            .collect();
        LuminanceMap::from_data(self.width, self.height, data)
    }
}

//! Physical display geometry and viewing distance.

use serde::{Deserialize, Serialize};

use crate::types::{Error, Result};

/// Screen geometry used to convert image frequencies to visual angle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DisplaySize {
    /// Vertical resolution in pixels.
    pub vres: u32,
    /// Viewing distance in metres.
    pub view_distance: f64,
    /// Visible screen height in metres.
    pub screen_height: f64,
}

impl DisplaySize {
    /// Geometry from physical measurements.
    pub fn new(vres: u32, view_distance: f64, screen_height: f64) -> Result<Self> {
        let ds = Self {
            vres,
            view_distance,
            screen_height,
        };
        ds.validate()?;
        Ok(ds)
    }

    /// Geometry with the viewing distance expressed in screen heights.
    pub fn from_screen_heights(vres: u32, distance_in_heights: f64) -> Result<Self> {
        Self::new(vres, distance_in_heights, 1.0)
    }

    /// Check that all parameters are positive and finite.
    pub fn validate(&self) -> Result<()> {
        if self.vres == 0 {
            return Err(Error::InvalidDisplay("vertical resolution must be non-zero".into()));
        }
        if !(self.view_distance.is_finite() && self.view_distance > 0.0) {
            return Err(Error::InvalidDisplay(
                "viewing distance must be positive and finite".into(),
            ));
        }
        if !(self.screen_height.is_finite() && self.screen_height > 0.0) {
            return Err(Error::InvalidDisplay(
                "screen height must be positive and finite".into(),
            ));
        }
        Ok(())
    }

    /// Vertical visual angle subtended by the screen, in degrees.
    pub fn visual_angle(&self) -> f64 {
        2.0 * (0.5 * self.screen_height / self.view_distance).atan().to_degrees()
    }

    /// Number of pixels per degree of visual angle.
    pub fn pixels_per_degree(&self) -> f64 {
        self.vres as f64 / self.visual_angle()
    }
}

impl Default for DisplaySize {
    /// A 1080-line screen 30 cm tall viewed from 90 cm (three screen heights).
    fn default() -> Self {
        Self {
            vres: 1080,
            view_distance: 0.9,
            screen_height: 0.3,
        }
    }
}

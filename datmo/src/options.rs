//! Serializable tone mapping options.

use datmo_core::{
    ColorCorrection, DisplayFunction, DisplayPreset, DisplaySize, Error, Result, WhiteAnchor,
};
use serde::{Deserialize, Serialize};

/// Which display model to target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplaySelection {
    /// One of the standard presets.
    Preset(DisplayPreset),
    /// A fully specified display model.
    Function(DisplayFunction),
}

impl DisplaySelection {
    /// The display model this selection stands for.
    pub fn display_function(&self) -> DisplayFunction {
        match self {
            Self::Preset(preset) => DisplayFunction::preset(*preset),
            Self::Function(df) => df.clone(),
        }
    }
}

impl Default for DisplaySelection {
    fn default() -> Self {
        Self::Preset(DisplayPreset::default())
    }
}

/// Options of the display-adaptive operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayAdaptiveOptions {
    /// Target display model.
    pub display: DisplaySelection,
    /// Viewing geometry.
    pub display_size: DisplaySize,
    /// Contrast enhancement factor (1 = preserve contrast).
    pub enhancement: f64,
    /// Scene luminance pinned to the display peak, if any.
    pub white_anchor: WhiteAnchor,
    /// Color saturation factor (1 = preserve colors).
    pub saturation: f64,
    /// How color is carried through the tone curve.
    pub color_correction: ColorCorrection,
    /// Smooth curves across successive frames tone-mapped by one operator.
    pub temporal: bool,
}

impl Default for DisplayAdaptiveOptions {
    fn default() -> Self {
        Self {
            display: DisplaySelection::default(),
            display_size: DisplaySize::default(),
            enhancement: 1.0,
            white_anchor: WhiteAnchor::None,
            saturation: 1.0,
            color_correction: ColorCorrection::default(),
            temporal: false,
        }
    }
}

impl DisplayAdaptiveOptions {
    /// Check parameter ranges.
    pub fn validate(&self) -> Result<()> {
        self.display.display_function().validate()?;
        self.display_size.validate()?;
        if !self.enhancement.is_finite() || self.enhancement < 0.0 {
            return Err(Error::InvalidParameter(format!(
                "enhancement must be non-negative, got {}",
                self.enhancement
            )));
        }
        if !self.saturation.is_finite() || self.saturation < 0.0 {
            return Err(Error::InvalidParameter(format!(
                "saturation must be non-negative, got {}",
                self.saturation
            )));
        }
        if let WhiteAnchor::Luminance(w) = self.white_anchor {
            if !w.is_finite() || w <= 0.0 {
                return Err(Error::InvalidParameter(format!(
                    "white anchor must be positive, got {}",
                    w
                )));
            }
        }
        Ok(())
    }
}

/// Options for one tone mapping job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TonemapOptions {
    /// Gamma applied to the input before tone mapping (`C' = C^(1/pregamma)`).
    pub pregamma: f64,
    /// Working width in pixels; `None` keeps the frame's width.
    pub xsize: Option<u32>,
    /// Operator parameters.
    pub operator: DisplayAdaptiveOptions,
}

impl Default for TonemapOptions {
    fn default() -> Self {
        Self {
            pregamma: 1.0,
            xsize: None,
            operator: DisplayAdaptiveOptions::default(),
        }
    }
}

impl TonemapOptions {
    /// Check parameter ranges.
    pub fn validate(&self) -> Result<()> {
        if !self.pregamma.is_finite() || self.pregamma <= 0.0 {
            return Err(Error::InvalidParameter(format!(
                "pregamma must be positive, got {}",
                self.pregamma
            )));
        }
        if self.xsize == Some(0) {
            return Err(Error::InvalidParameter("xsize must be non-zero".into()));
        }
        self.operator.validate()
    }
}

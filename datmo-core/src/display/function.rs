//! Display transfer functions: pixel code ↔ emitted luminance.
//!
//! A display function describes what a target display physically emits for a
//! normalized pixel code in `[0, 1]`, including light reflected from the
//! screen. Its black level and peak luminance bound every tone curve computed
//! for it.
//!
//! Reference models:
//! - Gamma-gain-offset (GOG) model for CRT and LCD panels, with an ambient
//!   reflection term
//! - Measured response tables

use core::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::types::{Error, Result};

// ============================================================================
// Gamma-Gain-Offset Model
// ============================================================================

/// Gamma-gain-offset display model.
///
/// `L(V) = (L_max - L_black) * V^gamma + L_black + L_refl`, where
/// `L_refl = k / pi * E_amb` is the luminance of ambient light reflected from
/// the panel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GogDisplay {
    /// Display gamma (typically 2.2 to 2.6).
    pub gamma: f64,
    /// Peak luminance in cd/m².
    pub l_max: f64,
    /// Black level of the panel in a dark room, in cd/m².
    pub l_black: f64,
    /// Ambient illuminance in lux.
    pub e_amb: f64,
    /// Panel reflectivity (typically 0.01 for LCD, 0.02 for CRT).
    pub reflectivity: f64,
}

impl GogDisplay {
    /// Luminance of reflected ambient light.
    #[inline]
    pub fn reflected(&self) -> f64 {
        self.reflectivity / PI * self.e_amb
    }

    fn validate(&self) -> Result<()> {
        let fields = [
            ("gamma", self.gamma),
            ("l_max", self.l_max),
            ("l_black", self.l_black),
            ("e_amb", self.e_amb),
            ("reflectivity", self.reflectivity),
        ];
        for (name, value) in fields {
            if !value.is_finite() {
                return Err(Error::InvalidDisplay(format!("{} must be finite", name)));
            }
        }
        if self.gamma <= 0.0 {
            return Err(Error::InvalidDisplay("gamma must be positive".into()));
        }
        if self.l_black < 0.0 || self.e_amb < 0.0 || self.reflectivity < 0.0 {
            return Err(Error::InvalidDisplay(
                "l_black, e_amb and reflectivity must be non-negative".into(),
            ));
        }
        if self.l_max <= self.l_black {
            return Err(Error::InvalidDisplay(format!(
                "l_max ({}) must exceed l_black ({})",
                self.l_max, self.l_black
            )));
        }
        if self.l_black + self.reflected() <= 0.0 {
            return Err(Error::InvalidDisplay(
                "black level must be positive (set l_black or ambient light)".into(),
            ));
        }
        Ok(())
    }

    #[inline]
    fn to_luminance(&self, code: f64) -> f64 {
        let v = code.clamp(0.0, 1.0);
        (self.l_max - self.l_black) * v.powf(self.gamma) + self.l_black + self.reflected()
    }

    #[inline]
    fn to_code(&self, luminance: f64) -> f64 {
        let rel = (luminance - self.l_black - self.reflected()) / (self.l_max - self.l_black);
        if rel <= 0.0 {
            return 0.0;
        }
        rel.min(1.0).powf(1.0 / self.gamma)
    }
}

// ============================================================================
// Measured Response Table
// ============================================================================

/// Tabulated display response.
///
/// Entries are `(code, luminance)` pairs with both columns strictly
/// increasing, starting at code 0 and ending at code 1. Between entries the
/// response is linear in code and log-luminance, which makes the forward and
/// inverse mappings exact inverses of each other.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<[f64; 2]>", into = "Vec<[f64; 2]>")]
pub struct LookupDisplay {
    codes: Vec<f64>,
    log_lum: Vec<f64>,
}

impl LookupDisplay {
    /// Build from `(code, luminance)` pairs.
    pub fn new(entries: &[[f64; 2]]) -> Result<Self> {
        if entries.len() < 2 {
            return Err(Error::InvalidDisplay(
                "lookup table needs at least two entries".into(),
            ));
        }

        for pair in entries.windows(2) {
            if !(pair[1][0] > pair[0][0] && pair[1][1] > pair[0][1]) {
                return Err(Error::InvalidDisplay(format!(
                    "lookup table must be strictly increasing (at code {})",
                    pair[1][0]
                )));
            }
        }

        let first = entries[0];
        let last = entries[entries.len() - 1];
        if first[0] != 0.0 || last[0] != 1.0 {
            return Err(Error::InvalidDisplay(
                "lookup table must span codes 0 to 1".into(),
            ));
        }
        if entries.iter().any(|e| !e[1].is_finite() || e[1] <= 0.0) {
            return Err(Error::InvalidDisplay(
                "lookup table luminance must be positive and finite".into(),
            ));
        }

        Ok(Self {
            codes: entries.iter().map(|e| e[0]).collect(),
            log_lum: entries.iter().map(|e| e[1].log10()).collect(),
        })
    }

    /// Number of table entries.
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    /// Always false for a validated table.
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    fn to_luminance(&self, code: f64) -> f64 {
        let v = code.clamp(0.0, 1.0);
        let i = segment(&self.codes, v);
        let t = (v - self.codes[i]) / (self.codes[i + 1] - self.codes[i]);
        let l = self.log_lum[i] + t * (self.log_lum[i + 1] - self.log_lum[i]);
        10f64.powf(l)
    }

    fn to_code(&self, luminance: f64) -> f64 {
        if luminance <= 0.0 {
            return 0.0;
        }
        let last = self.log_lum.len() - 1;
        let l = luminance.log10().clamp(self.log_lum[0], self.log_lum[last]);
        let i = segment(&self.log_lum, l);
        let t = (l - self.log_lum[i]) / (self.log_lum[i + 1] - self.log_lum[i]);
        self.codes[i] + t * (self.codes[i + 1] - self.codes[i])
    }
}

impl TryFrom<Vec<[f64; 2]>> for LookupDisplay {
    type Error = Error;

    fn try_from(entries: Vec<[f64; 2]>) -> Result<Self> {
        Self::new(&entries)
    }
}

impl From<LookupDisplay> for Vec<[f64; 2]> {
    fn from(lut: LookupDisplay) -> Self {
        lut.codes
            .iter()
            .zip(&lut.log_lum)
            .map(|(&c, &l)| [c, 10f64.powf(l)])
            .collect()
    }
}

/// Index `i` of the segment `[v[i], v[i+1]]` containing `x` (clamped).
#[inline]
fn segment(v: &[f64], x: f64) -> usize {
    let upper = v.partition_point(|&e| e <= x);
    upper.clamp(1, v.len() - 1) - 1
}

// ============================================================================
// Presets
// ============================================================================

/// Standard display/viewing-condition presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayPreset {
    /// Typical LCD in a dim room (200 cd/m², 60 lux).
    #[default]
    Lcd,
    /// LCD in a bright office (100 cd/m², 400 lux).
    LcdOffice,
    /// Bright LCD in a dark room (500 cd/m², 10 lux).
    LcdBright,
    /// CRT monitor (80 cd/m², 60 lux).
    Crt,
}

impl DisplayPreset {
    /// The gamma-gain-offset parameters of this preset.
    pub fn model(self) -> GogDisplay {
        let (gamma, l_max, l_black, e_amb, reflectivity) = match self {
            Self::Lcd => (2.2, 200.0, 0.8, 60.0, 0.01),
            Self::LcdOffice => (2.2, 100.0, 0.8, 400.0, 0.01),
            Self::LcdBright => (2.6, 500.0, 0.5, 10.0, 0.01),
            Self::Crt => (2.2, 80.0, 1.0, 60.0, 0.02),
        };
        GogDisplay {
            gamma,
            l_max,
            l_black,
            e_amb,
            reflectivity,
        }
    }
}

// ============================================================================
// Generic Display Function Interface
// ============================================================================

/// Mapping between normalized pixel codes and emitted luminance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "params", rename_all = "snake_case")]
pub enum DisplayFunction {
    /// Gamma/CRT-like or power-law LCD-like display.
    GammaGainOffset(GogDisplay),
    /// Custom measured response.
    Lookup(LookupDisplay),
}

impl DisplayFunction {
    /// Gamma-gain-offset display, validated.
    pub fn gamma_gain_offset(
        gamma: f64,
        l_max: f64,
        l_black: f64,
        e_amb: f64,
        reflectivity: f64,
    ) -> Result<Self> {
        let df = Self::GammaGainOffset(GogDisplay {
            gamma,
            l_max,
            l_black,
            e_amb,
            reflectivity,
        });
        df.validate()?;
        Ok(df)
    }

    /// Pure power-law display without ambient reflection.
    pub fn power_law(gamma: f64, l_max: f64, l_black: f64) -> Result<Self> {
        Self::gamma_gain_offset(gamma, l_max, l_black, 0.0, 0.0)
    }

    /// Tabulated display response.
    pub fn lookup(entries: &[[f64; 2]]) -> Result<Self> {
        Ok(Self::Lookup(LookupDisplay::new(entries)?))
    }

    /// Display for one of the standard presets.
    pub fn preset(preset: DisplayPreset) -> Self {
        Self::GammaGainOffset(preset.model())
    }

    /// Check parameters. Lookup tables are validated on construction.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::GammaGainOffset(gog) => gog.validate(),
            Self::Lookup(_) => Ok(()),
        }
    }

    /// Emitted luminance (cd/m²) for a pixel code in `[0, 1]`.
    #[inline]
    pub fn to_luminance(&self, code: f64) -> f64 {
        match self {
            Self::GammaGainOffset(gog) => gog.to_luminance(code),
            Self::Lookup(lut) => lut.to_luminance(code),
        }
    }

    /// Pixel code in `[0, 1]` that emits `luminance`.
    ///
    /// Luminance below the black level maps to 0, above the peak to 1.
    #[inline]
    pub fn to_code(&self, luminance: f64) -> f64 {
        match self {
            Self::GammaGainOffset(gog) => gog.to_code(luminance),
            Self::Lookup(lut) => lut.to_code(luminance),
        }
    }

    /// Lowest emitted luminance (code 0).
    pub fn black_level(&self) -> f64 {
        self.to_luminance(0.0)
    }

    /// Highest emitted luminance (code 1).
    pub fn max_luminance(&self) -> f64 {
        self.to_luminance(1.0)
    }

    /// Displayable range as `(log10(black), log10(max))`.
    pub fn log_range(&self) -> (f64, f64) {
        (self.black_level().log10(), self.max_luminance().log10())
    }
}

impl Default for DisplayFunction {
    fn default() -> Self {
        Self::preset(DisplayPreset::default())
    }
}

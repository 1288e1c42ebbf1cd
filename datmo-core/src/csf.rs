//! Contrast sensitivity of the human visual system.
//!
//! The optimizer weights each spatial-frequency band of the conditional
//! density by how visible contrast at that band is on the target display.
//! The band frequency in cycles per degree follows from the display's pixels
//! per degree, so viewing geometry changes where compression is spent.

/// Sensitivity never drops below this, so no band is ignored outright.
const MIN_SENSITIVITY: f64 = 1e-3;

/// Mannos–Sakrison contrast sensitivity at `rho` cycles per degree.
///
/// Band-pass, peaking at about 0.98 near 8 cycles/degree.
#[inline]
pub fn contrast_sensitivity(rho: f64) -> f64 {
    let rho = rho.max(0.0);
    let s = 2.6 * (0.0192 + 0.114 * rho) * (-(0.114 * rho).powf(1.1)).exp();
    s.max(MIN_SENSITIVITY)
}

/// Centre frequency (cycles/degree) of pyramid band `band` (0 = finest).
#[inline]
pub fn band_frequency(band: usize, pixels_per_degree: f64) -> f64 {
    pixels_per_degree / f64::powi(2.0, band as i32 + 1)
}

/// Sensitivity weight for each of `bands` pyramid bands.
pub fn band_weights(bands: usize, pixels_per_degree: f64) -> Vec<f64> {
    (0..bands)
        .map(|f| contrast_sensitivity(band_frequency(f, pixels_per_degree)))
        .collect()
}

//! Conditional density of local contrast given background luminance.
//!
//! This is the expensive statistics pass. Its result depends only on the
//! image, so it can be computed once and reused for any number of tone curve
//! computations while tuning display or enhancement parameters.
//!
//! The log-luminance image is decomposed into a Gaussian pyramid. In every
//! band, contrast samples (difference of the band and its blur, plus
//! right/down neighbour differences) are histogrammed by magnitude,
//! conditioned on the blurred background luminance of the pixel.

use log::debug;

use crate::progress::{post_fraction, Progress};
use crate::types::{LuminanceMap, Result};

/// Width of one luminance bin and one contrast bin, in log10 units.
pub const DELTA: f64 = 0.1;

/// Largest distinguished contrast magnitude, in log10 units.
pub const G_MAX: f64 = 0.7;

/// Number of contrast bins, centred at `0, DELTA, ..., G_MAX`.
pub const G_BINS: usize = 8;

/// Maximum number of pyramid bands.
pub const MAX_BANDS: usize = 8;

/// Luminance floor applied before taking the logarithm.
pub const MIN_LUMINANCE: f32 = 1e-8;

/// Luminance ceiling applied before taking the logarithm.
pub const MAX_LUMINANCE: f32 = 1e8;

/// Contrast below this magnitude (log10 units) counts as none.
const MIN_CONTRAST: f32 = 1e-3;

/// Rows processed between cancellation checks.
const ROW_BLOCK: usize = 64;

/// Binomial 5-tap low-pass kernel.
const KERNEL: [f32; 5] = [0.0625, 0.25, 0.375, 0.25, 0.0625];

/// Image statistics consumed by the tone curve optimizer.
///
/// For each pyramid band `f` and luminance bin `x` it stores the fraction of
/// the band's contrast samples that fall in `x` (occupancy) and the
/// normalized histogram of their contrast magnitudes. Immutable once built;
/// share it behind an `Arc` to run several optimizations concurrently.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionalDensity {
    l_min: f64,
    x_bins: usize,
    bands: usize,
    /// `p(g | f, x)`, layout `[band][x][g]`.
    conditional: Vec<f64>,
    /// `p(x | f)`, layout `[band][x]`.
    occupancy: Vec<f64>,
}

impl ConditionalDensity {
    /// Lower edge of the first luminance bin (log10).
    pub fn l_min(&self) -> f64 {
        self.l_min
    }

    /// Upper edge of the last luminance bin (log10).
    pub fn l_max(&self) -> f64 {
        self.l_min + self.x_bins as f64 * DELTA
    }

    /// Number of luminance bins.
    pub fn luminance_bins(&self) -> usize {
        self.x_bins
    }

    /// Number of pyramid bands.
    pub fn bands(&self) -> usize {
        self.bands
    }

    /// Number of contrast bins.
    pub fn contrast_bins(&self) -> usize {
        G_BINS
    }

    /// Contrast magnitude (log10) represented by bin `g`.
    #[inline]
    pub fn contrast_of_bin(g: usize) -> f64 {
        g as f64 * DELTA
    }

    /// Fraction of band `band`'s contrast samples whose background falls in
    /// luminance bin `x`.
    #[inline]
    pub fn occupancy(&self, band: usize, x: usize) -> f64 {
        self.occupancy[band * self.x_bins + x]
    }

    /// Normalized contrast histogram for band `band`, luminance bin `x`.
    ///
    /// Sums to 1 when the bin is occupied, otherwise all zeros.
    #[inline]
    pub fn contrast_histogram(&self, band: usize, x: usize) -> &[f64] {
        let base = (band * self.x_bins + x) * G_BINS;
        &self.conditional[base..base + G_BINS]
    }

    /// `p(g | band, x)`.
    #[inline]
    pub fn probability(&self, band: usize, x: usize, g: usize) -> f64 {
        self.contrast_histogram(band, x)[g]
    }

    /// Expected contrast magnitude in a bin.
    pub fn mean_contrast(&self, band: usize, x: usize) -> f64 {
        self.contrast_histogram(band, x)
            .iter()
            .enumerate()
            .map(|(g, p)| p * Self::contrast_of_bin(g))
            .sum()
    }
}

/// Compute the conditional density of an image.
///
/// This is the most time-consuming stage. Cancellation is polled before every
/// band and every block of 64 rows; when it is requested the partial
/// statistics are dropped and `Error::Stopped` is returned.
pub fn estimate_conditional_density(
    lum: &LuminanceMap,
    progress: &impl Progress,
) -> Result<ConditionalDensity> {
    let width = lum.width() as usize;
    let height = lum.height() as usize;

    progress.check()?;

    let mut level: Vec<f32> = lum
        .data()
        .iter()
        .map(|&l| l.clamp(MIN_LUMINANCE, MAX_LUMINANCE).log10())
        .collect();

    let (lo, hi) = level
        .iter()
        .fold((f32::MAX, f32::MIN), |(lo, hi), &l| (lo.min(l), hi.max(l)));

    let l_min = (lo as f64 / DELTA).floor() * DELTA;
    let x_bins = (((hi as f64 - l_min) / DELTA).ceil() as usize).max(1);

    let band_dims = pyramid_dims(width, height);
    let bands = band_dims.len();
    let total_rows: usize = band_dims.iter().map(|&(_, h)| h).sum();

    let mut hist = vec![0.0f64; bands * x_bins * G_BINS];
    let mut samples = vec![0.0f64; bands * x_bins];
    let mut rows_done = 0;

    for (f, &(w, h)) in band_dims.iter().enumerate() {
        progress.check()?;

        let blurred = blur(&level, w, h);

        for y0 in (0..h).step_by(ROW_BLOCK) {
            progress.check()?;

            for y in y0..(y0 + ROW_BLOCK).min(h) {
                for x in 0..w {
                    let i = y * w + x;
                    let xb = luminance_bin(blurred[i], l_min, x_bins);
                    let cell = f * x_bins + xb;
                    let bins = &mut hist[cell * G_BINS..(cell + 1) * G_BINS];

                    add_contrast(bins, level[i] - blurred[i]);
                    let mut n = 1.0;
                    if x + 1 < w {
                        add_contrast(bins, level[i + 1] - level[i]);
                        n += 1.0;
                    }
                    if y + 1 < h {
                        add_contrast(bins, level[i + w] - level[i]);
                        n += 1.0;
                    }
                    samples[cell] += n;
                }
            }

            rows_done += (y0 + ROW_BLOCK).min(h) - y0;
            post_fraction(progress, rows_done, total_rows);
        }

        if f + 1 < bands {
            level = decimate(&blurred, w, h);
        }
    }

    let mut occupancy = vec![0.0f64; bands * x_bins];
    for f in 0..bands {
        let cells = f * x_bins..(f + 1) * x_bins;
        let band_total: f64 = samples[cells.clone()].iter().sum();
        for cell in cells {
            let n = samples[cell];
            if n > 0.0 {
                for p in &mut hist[cell * G_BINS..(cell + 1) * G_BINS] {
                    *p /= n;
                }
                occupancy[cell] = n / band_total;
            }
        }
    }

    debug!(
        "conditional density: {}x{}, {} bands, {} luminance bins over [{:.2}, {:.2}]",
        width,
        height,
        bands,
        x_bins,
        l_min,
        l_min + x_bins as f64 * DELTA
    );

    Ok(ConditionalDensity {
        l_min,
        x_bins,
        bands,
        conditional: hist,
        occupancy,
    })
}

/// Dimensions of each pyramid level, finest first.
fn pyramid_dims(width: usize, height: usize) -> Vec<(usize, usize)> {
    let mut dims = vec![(width, height)];
    let (mut w, mut h) = (width, height);
    while dims.len() < MAX_BANDS && w.div_ceil(2) >= 2 && h.div_ceil(2) >= 2 {
        w = w.div_ceil(2);
        h = h.div_ceil(2);
        dims.push((w, h));
    }
    dims
}

#[inline]
fn luminance_bin(l: f32, l_min: f64, x_bins: usize) -> usize {
    let pos = ((l as f64 - l_min) / DELTA).floor();
    (pos.max(0.0) as usize).min(x_bins - 1)
}

/// Split one contrast sample linearly between its two nearest bins.
#[inline]
fn add_contrast(bins: &mut [f64], g: f32) {
    let g = g.abs();
    if g < MIN_CONTRAST {
        bins[0] += 1.0;
        return;
    }
    let pos = (g as f64 / DELTA).min((G_BINS - 1) as f64);
    let k = pos.floor() as usize;
    let t = pos - k as f64;
    if k + 1 < G_BINS {
        bins[k] += 1.0 - t;
        bins[k + 1] += t;
    } else {
        bins[k] += 1.0;
    }
}

/// Separable binomial blur with clamped edges.
fn blur(src: &[f32], w: usize, h: usize) -> Vec<f32> {
    let mut tmp = vec![0.0f32; w * h];
    for y in 0..h {
        let row = &src[y * w..(y + 1) * w];
        for x in 0..w {
            let mut acc = 0.0f32;
            for (k, c) in KERNEL.iter().enumerate() {
                let sx = (x + k).saturating_sub(2).min(w - 1);
                acc += c * row[sx];
            }
            tmp[y * w + x] = acc;
        }
    }

    let mut out = vec![0.0f32; w * h];
    for y in 0..h {
        for x in 0..w {
            let mut acc = 0.0f32;
            for (k, c) in KERNEL.iter().enumerate() {
                let sy = (y + k).saturating_sub(2).min(h - 1);
                acc += c * tmp[sy * w + x];
            }
            out[y * w + x] = acc;
        }
    }
    out
}

/// Keep every second sample of an already low-passed image.
fn decimate(src: &[f32], w: usize, h: usize) -> Vec<f32> {
    let nw = w.div_ceil(2);
    let nh = h.div_ceil(2);
    let mut out = Vec::with_capacity(nw * nh);
    for y in 0..nh {
        for x in 0..nw {
            out.push(src[(2 * y) * w + 2 * x]);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use enough::Unstoppable;

    fn flat(width: u32, height: u32, value: f32) -> LuminanceMap {
        LuminanceMap::from_data(width, height, vec![value; (width * height) as usize]).unwrap()
    }

    fn ramp(width: u32, height: u32, lo: f32, hi: f32) -> LuminanceMap {
        let mut data = Vec::with_capacity((width * height) as usize);
        for _y in 0..height {
            for x in 0..width {
                let t = x as f32 / (width - 1).max(1) as f32;
                // Geometric ramp: linear in log luminance.
                data.push(lo * (hi / lo).powf(t));
            }
        }
        LuminanceMap::from_data(width, height, data).unwrap()
    }

    #[test]
    fn test_pyramid_dims() {
        assert_eq!(pyramid_dims(2, 2), vec![(2, 2)]);
        assert_eq!(pyramid_dims(1, 100).len(), 1);
        assert_eq!(pyramid_dims(64, 64).len(), 6);
        assert_eq!(pyramid_dims(5000, 5000).len(), MAX_BANDS);
        assert_eq!(pyramid_dims(5, 3), vec![(5, 3), (3, 2)]);
    }

    #[test]
    fn test_flat_image_has_no_contrast() {
        let cd = estimate_conditional_density(&flat(8, 8, 3.7), &Unstoppable).unwrap();
        for f in 0..cd.bands() {
            for x in 0..cd.luminance_bins() {
                assert_eq!(cd.mean_contrast(f, x), 0.0);
            }
        }
    }

    #[test]
    fn test_unit_luminance_single_bin() {
        let cd = estimate_conditional_density(&flat(2, 2, 1.0), &Unstoppable).unwrap();
        assert_eq!(cd.bands(), 1);
        assert_eq!(cd.luminance_bins(), 1);
        assert_eq!(cd.l_min(), 0.0);
        assert!((cd.occupancy(0, 0) - 1.0).abs() < 1e-12);
        assert!((cd.probability(0, 0, 0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_ramp_has_contrast_everywhere() {
        let cd = estimate_conditional_density(&ramp(64, 16, 0.01, 1000.0), &Unstoppable).unwrap();
        assert!(cd.l_min() <= -2.0 && cd.l_max() >= 3.0);

        let occupied: Vec<usize> = (0..cd.luminance_bins())
            .filter(|&x| cd.occupancy(0, x) > 0.0)
            .collect();
        assert!(!occupied.is_empty());
        for x in occupied {
            assert!(cd.mean_contrast(0, x) > 0.0, "no contrast in bin {}", x);
        }
    }

    #[test]
    fn test_histograms_normalized() {
        let cd = estimate_conditional_density(&ramp(33, 17, 0.1, 5000.0), &Unstoppable).unwrap();
        for f in 0..cd.bands() {
            let occ: f64 = (0..cd.luminance_bins()).map(|x| cd.occupancy(f, x)).sum();
            assert!((occ - 1.0).abs() < 1e-9, "band {} occupancy {}", f, occ);
            for x in 0..cd.luminance_bins() {
                let sum: f64 = cd.contrast_histogram(f, x).iter().sum();
                if cd.occupancy(f, x) > 0.0 {
                    assert!((sum - 1.0).abs() < 1e-9);
                } else {
                    assert_eq!(sum, 0.0);
                }
            }
        }
    }

    #[test]
    fn test_add_contrast_linear_split() {
        let mut bins = [0.0f64; G_BINS];
        add_contrast(&mut bins, -0.25);
        assert!((bins[2] - 0.5).abs() < 1e-6);
        assert!((bins[3] - 0.5).abs() < 1e-6);

        let mut bins = [0.0f64; G_BINS];
        add_contrast(&mut bins, 3.0);
        assert_eq!(bins[G_BINS - 1], 1.0);
    }

    #[test]
    fn test_blur_preserves_constant() {
        let src = vec![0.0f32; 12];
        assert_eq!(blur(&src, 4, 3), src);
    }

    #[test]
    fn test_deterministic() {
        let lum = ramp(40, 30, 0.05, 2000.0);
        let a = estimate_conditional_density(&lum, &Unstoppable).unwrap();
        let b = estimate_conditional_density(&lum, &Unstoppable).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_cancelled_before_start() {
        struct ImmediateCancel;

        impl enough::Stop for ImmediateCancel {
            fn check(&self) -> std::result::Result<(), enough::StopReason> {
                Err(enough::StopReason::Cancelled)
            }
        }

        impl Progress for ImmediateCancel {}

        let result = estimate_conditional_density(&flat(4, 4, 1.0), &ImmediateCancel);
        assert!(matches!(
            result,
            Err(crate::Error::Stopped(enough::StopReason::Cancelled))
        ));
    }
}

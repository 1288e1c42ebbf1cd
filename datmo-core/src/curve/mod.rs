//! Tone curves: monotonic maps from log scene luminance to log display
//! luminance, sampled on a uniform knot grid.

mod optimize;
mod temporal;

pub use optimize::*;
pub use temporal::*;

use crate::types::{Error, Result};

/// Uniform grid of knot positions in log10 scene luminance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KnotGrid {
    x0: f64,
    step: f64,
    len: usize,
}

impl KnotGrid {
    /// Grid of `len` knots starting at `x0`, spaced `step` apart.
    pub fn new(x0: f64, step: f64, len: usize) -> Result<Self> {
        if len < 2 {
            return Err(Error::InvalidParameter(format!(
                "tone curve needs at least 2 knots, got {}",
                len
            )));
        }
        if !x0.is_finite() || !step.is_finite() || step <= 0.0 {
            return Err(Error::InvalidParameter(format!(
                "invalid knot grid: start {}, step {}",
                x0, step
            )));
        }
        Ok(Self { x0, step, len })
    }

    /// Position of the first knot.
    #[inline]
    pub fn start(&self) -> f64 {
        self.x0
    }

    /// Position of the last knot.
    #[inline]
    pub fn end(&self) -> f64 {
        self.x(self.len - 1)
    }

    /// Knot spacing.
    #[inline]
    pub fn step(&self) -> f64 {
        self.step
    }

    /// Number of knots.
    #[inline]
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Position of knot `i`.
    #[inline]
    pub fn x(&self, i: usize) -> f64 {
        self.x0 + i as f64 * self.step
    }

    /// Segment index and interpolation weight for `x`, clamped to the grid.
    #[inline]
    fn locate(&self, x: f64) -> (usize, f64) {
        let pos = (x - self.x0) / self.step;
        let last = (self.len - 1) as f64;
        if pos.is_nan() || pos <= 0.0 {
            (0, 0.0)
        } else if pos >= last {
            (self.len - 2, 1.0)
        } else {
            let i = pos.floor() as usize;
            (i, pos - i as f64)
        }
    }
}

/// Storage for knot values, either owned or borrowed from the caller.
#[derive(Debug)]
pub enum CurveStorage<'a> {
    /// Values owned by the curve.
    Owned(Vec<f64>),
    /// Values living in caller-provided storage.
    Borrowed(&'a mut [f64]),
}

impl CurveStorage<'_> {
    fn as_slice(&self) -> &[f64] {
        match self {
            Self::Owned(v) => v,
            Self::Borrowed(s) => s,
        }
    }
}

/// A monotonic tone curve.
///
/// Knot `i` maps log10 scene luminance `grid.x(i)` to log10 display luminance
/// `y[i]`. Curves produced by this crate have non-decreasing `y` bounded by
/// the display range; curves built by hand are only checked for length and
/// finiteness.
#[derive(Debug)]
pub struct ToneCurve<'a> {
    grid: KnotGrid,
    y: CurveStorage<'a>,
}

impl ToneCurve<'static> {
    /// Curve owning its knot values.
    pub fn new(grid: KnotGrid, y: Vec<f64>) -> Result<Self> {
        check_values(&grid, &y)?;
        Ok(Self {
            grid,
            y: CurveStorage::Owned(y),
        })
    }

    /// Curve mapping every knot to the same value.
    pub fn constant(grid: KnotGrid, value: f64) -> Result<Self> {
        Self::new(grid, vec![value; grid.len()])
    }
}

impl<'a> ToneCurve<'a> {
    /// Curve whose knot values live in `y`.
    ///
    /// Computing into a borrowed curve writes into `y` and requires the knot
    /// count to match.
    pub fn borrowed(grid: KnotGrid, y: &'a mut [f64]) -> Result<Self> {
        check_values(&grid, y)?;
        Ok(Self {
            grid,
            y: CurveStorage::Borrowed(y),
        })
    }

    /// Knot grid.
    #[inline]
    pub fn grid(&self) -> &KnotGrid {
        &self.grid
    }

    /// Number of knots.
    #[inline]
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.grid.len()
    }

    /// Knot values (log10 display luminance).
    #[inline]
    pub fn values(&self) -> &[f64] {
        self.y.as_slice()
    }

    /// Whether the knot values are owned by the curve.
    pub fn is_owned(&self) -> bool {
        matches!(self.y, CurveStorage::Owned(_))
    }

    /// `(x, y)` knot pairs.
    pub fn knots(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.values()
            .iter()
            .enumerate()
            .map(move |(i, &y)| (self.grid.x(i), y))
    }

    /// Value at `x` by linear interpolation, clamped to the end knots.
    #[inline]
    pub fn evaluate(&self, x: f64) -> f64 {
        let y = self.values();
        let (i, t) = self.grid.locate(x);
        y[i] + (y[i + 1] - y[i]) * t
    }

    /// Slope of the segment containing `x` (clamped to the grid).
    #[inline]
    pub fn slope_at(&self, x: f64) -> f64 {
        let y = self.values();
        let (i, _) = self.grid.locate(x);
        (y[i + 1] - y[i]) / self.grid.step
    }

    /// Re-sample onto another knot grid.
    pub fn resample(&self, grid: &KnotGrid) -> ToneCurve<'static> {
        let y = if *grid == self.grid {
            self.values().to_vec()
        } else {
            (0..grid.len()).map(|i| self.evaluate(grid.x(i))).collect()
        };
        ToneCurve {
            grid: *grid,
            y: CurveStorage::Owned(y),
        }
    }

    /// True if knot values never decrease.
    pub fn is_monotonic(&self) -> bool {
        self.values().windows(2).all(|w| w[1] >= w[0])
    }

    /// Smallest and largest knot value.
    pub fn value_range(&self) -> (f64, f64) {
        self.values()
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &y| {
                (lo.min(y), hi.max(y))
            })
    }

    /// Copy into an owned curve.
    pub fn to_owned_curve(&self) -> ToneCurve<'static> {
        ToneCurve {
            grid: self.grid,
            y: CurveStorage::Owned(self.values().to_vec()),
        }
    }

    /// Replace grid and values in one step.
    ///
    /// Borrowed storage cannot change length; the curve is left untouched
    /// when the lengths differ.
    pub(crate) fn commit(&mut self, grid: KnotGrid, y: Vec<f64>) -> Result<()> {
        match &mut self.y {
            CurveStorage::Owned(v) => *v = y,
            CurveStorage::Borrowed(s) => {
                if s.len() != y.len() {
                    return Err(Error::InvalidParameter(format!(
                        "borrowed curve storage holds {} knots, result has {}",
                        s.len(),
                        y.len()
                    )));
                }
                s.copy_from_slice(&y);
            }
        }
        self.grid = grid;
        Ok(())
    }
}

impl PartialEq for ToneCurve<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.grid == other.grid && self.values() == other.values()
    }
}

impl Clone for ToneCurve<'static> {
    fn clone(&self) -> Self {
        self.to_owned_curve()
    }
}

fn check_values(grid: &KnotGrid, y: &[f64]) -> Result<()> {
    if y.len() != grid.len() {
        return Err(Error::InvalidParameter(format!(
            "curve has {} values for {} knots",
            y.len(),
            grid.len()
        )));
    }
    if y.iter().any(|v| !v.is_finite()) {
        return Err(Error::InvalidParameter(
            "curve values must be finite".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear() -> ToneCurve<'static> {
        let grid = KnotGrid::new(-1.0, 0.5, 5).unwrap();
        ToneCurve::new(grid, vec![0.0, 0.25, 0.5, 1.0, 2.0]).unwrap()
    }

    #[test]
    fn test_grid_validation() {
        assert!(KnotGrid::new(0.0, 0.1, 1).is_err());
        assert!(KnotGrid::new(0.0, 0.0, 4).is_err());
        assert!(KnotGrid::new(f64::NAN, 0.1, 4).is_err());
        let g = KnotGrid::new(-2.0, 0.1, 11).unwrap();
        assert!((g.end() - -1.0).abs() < 1e-12);
    }

    #[test]
    fn test_evaluate_at_knots() {
        let c = linear();
        for (x, y) in c.knots() {
            assert!((c.evaluate(x) - y).abs() < 1e-12, "x = {}", x);
        }
    }

    #[test]
    fn test_evaluate_interpolates_and_clamps() {
        let c = linear();
        assert!((c.evaluate(-0.75) - 0.125).abs() < 1e-12);
        assert_eq!(c.evaluate(-10.0), 0.0);
        assert_eq!(c.evaluate(10.0), 2.0);
        assert_eq!(c.evaluate(f64::NAN), 0.0);
    }

    #[test]
    fn test_slope() {
        let c = linear();
        assert!((c.slope_at(-0.9) - 0.5).abs() < 1e-12);
        assert!((c.slope_at(0.75) - 2.0).abs() < 1e-12);
        // Clamped to the end segments.
        assert!((c.slope_at(100.0) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_resample_same_grid_is_exact() {
        let c = linear();
        assert_eq!(c.resample(c.grid()), c);
    }

    #[test]
    fn test_resample_onto_finer_grid() {
        let c = linear();
        let fine = KnotGrid::new(-1.0, 0.25, 9).unwrap();
        let r = c.resample(&fine);
        assert_eq!(r.len(), 9);
        assert!(r.is_monotonic());
        assert!((r.values()[1] - 0.125).abs() < 1e-12);
    }

    #[test]
    fn test_borrowed_storage() {
        let grid = KnotGrid::new(0.0, 1.0, 3).unwrap();
        let mut buf = [0.0, 1.0, 2.0];
        {
            let mut c = ToneCurve::borrowed(grid, &mut buf).unwrap();
            assert!(!c.is_owned());
            c.commit(grid, vec![1.0, 1.0, 1.0]).unwrap();
            assert!(c.commit(grid, vec![0.0; 4]).is_err());
            assert_eq!(c.values(), &[1.0, 1.0, 1.0]);
        }
        assert_eq!(buf, [1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_monotonic_check() {
        assert!(linear().is_monotonic());
        let grid = KnotGrid::new(0.0, 1.0, 3).unwrap();
        let c = ToneCurve::new(grid, vec![0.0, 2.0, 1.0]).unwrap();
        assert!(!c.is_monotonic());
        assert_eq!(c.value_range(), (0.0, 2.0));
    }

    #[test]
    fn test_rejects_bad_values() {
        let grid = KnotGrid::new(0.0, 1.0, 3).unwrap();
        assert!(ToneCurve::new(grid, vec![0.0, 1.0]).is_err());
        assert!(ToneCurve::new(grid, vec![0.0, f64::NAN, 1.0]).is_err());
    }
}

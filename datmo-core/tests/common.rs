//! Common test utilities for synthetic HDR image generation.
//!
//! These helpers create test images programmatically, avoiding the need
//! to include binary HDR files in the repository.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};

use datmo_core::{Progress, RgbPlanes, Stop, StopReason};

/// Grey horizontal gradient, geometric from `lo` to `hi` (linear in log).
pub fn create_log_gradient(width: u32, height: u32, lo: f32, hi: f32) -> RgbPlanes {
    let mut img = RgbPlanes::new(width, height).unwrap();
    for y in 0..height {
        for x in 0..width {
            let t = x as f32 / (width - 1).max(1) as f32;
            let v = lo * (hi / lo).powf(t);
            let i = (y * width + x) as usize;
            img.r[i] = v;
            img.g[i] = v;
            img.b[i] = v;
        }
    }
    img
}

/// Solid-color image.
pub fn create_solid(width: u32, height: u32, r: f32, g: f32, b: f32) -> RgbPlanes {
    let n = (width * height) as usize;
    RgbPlanes::from_planes(width, height, vec![r; n], vec![g; n], vec![b; n]).unwrap()
}

/// A bright window in a dim room: dark textured background with a
/// saturated, very bright rectangle in the upper right.
pub fn create_window_scene(width: u32, height: u32) -> RgbPlanes {
    let mut img = RgbPlanes::new(width, height).unwrap();
    let mut seed = 0x2545_f491u32;
    for y in 0..height {
        for x in 0..width {
            // xorshift noise for texture
            seed ^= seed << 13;
            seed ^= seed >> 17;
            seed ^= seed << 5;
            let noise = (seed % 1000) as f32 / 1000.0;

            let i = (y * width + x) as usize;
            let in_window = x > width / 2 && y < height / 2;
            if in_window {
                img.r[i] = 2000.0 + 500.0 * noise;
                img.g[i] = 1800.0 + 400.0 * noise;
                img.b[i] = 900.0;
            } else {
                let base = 0.05 + 0.5 * noise;
                img.r[i] = base * 1.2;
                img.g[i] = base;
                img.b[i] = base * 0.8;
            }
        }
    }
    img
}

/// Cancels after a fixed number of successful checks.
pub struct CancelAfter {
    remaining: AtomicUsize,
    checks: AtomicUsize,
}

impl CancelAfter {
    pub fn new(checks: usize) -> Self {
        Self {
            remaining: AtomicUsize::new(checks),
            checks: AtomicUsize::new(0),
        }
    }

    /// Total number of checks observed, including the failing ones.
    pub fn checks(&self) -> usize {
        self.checks.load(Ordering::Relaxed)
    }
}

impl Stop for CancelAfter {
    fn check(&self) -> Result<(), StopReason> {
        self.checks.fetch_add(1, Ordering::Relaxed);
        let left = self.remaining.load(Ordering::Relaxed);
        if left == 0 {
            return Err(StopReason::Cancelled);
        }
        self.remaining.store(left - 1, Ordering::Relaxed);
        Ok(())
    }
}

impl Progress for CancelAfter {}

//! Common test utilities for synthetic frames and test operators.
//!
//! These helpers create test frames programmatically, avoiding the need
//! to include HDR files in the repository.

#![allow(dead_code)]

use std::sync::mpsc::Sender;
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use datmo::{DisplayImage, HdrFrame, ProgressToken, Result, RgbPlanes, Stop, ToneMapOperator};

/// Create an HDR frame with a dim textured background and a bright patch.
pub fn create_hdr_scene(width: u32, height: u32) -> HdrFrame {
    let mut frame = RgbPlanes::new(width, height).unwrap();
    for y in 0..height {
        for x in 0..width {
            let i = (y * width + x) as usize;
            let texture = 0.05 + 0.04 * ((x * 7 + y * 13) % 11) as f32;
            let (r, g, b) = if x >= width / 2 && y < height / 2 {
                (900.0, 1000.0, 700.0)
            } else {
                (texture * 1.3, texture, texture * 0.6)
            };
            frame.r[i] = r;
            frame.g[i] = g;
            frame.b[i] = b;
        }
    }
    frame
}

/// Operator that spins until it is cancelled.
///
/// Signals `started` once it begins, so tests can cancel it mid-run.
pub struct WaitForCancel {
    started: Mutex<Option<Sender<()>>>,
}

impl WaitForCancel {
    pub fn new(started: Sender<()>) -> Self {
        Self {
            started: Mutex::new(Some(started)),
        }
    }
}

impl ToneMapOperator for WaitForCancel {
    fn name(&self) -> &str {
        "wait-for-cancel"
    }

    fn tonemap(&self, frame: &HdrFrame, progress: &ProgressToken) -> Result<DisplayImage> {
        if let Some(tx) = self.started.lock().unwrap().take() {
            tx.send(()).unwrap();
        }
        for i in 0..10_000u32 {
            progress.check()?;
            progress.post_progress(i % 100);
            thread::sleep(Duration::from_millis(1));
        }
        Ok(DisplayImage::from_planes(frame.clone()))
    }
}

/// Operator that always panics.
pub struct Panicking;

impl ToneMapOperator for Panicking {
    fn name(&self) -> &str {
        "panicking"
    }

    fn tonemap(&self, _frame: &HdrFrame, _progress: &ProgressToken) -> Result<DisplayImage> {
        panic!("operator bug");
    }
}

use anyhow::{Context, Result};
use image::GrayImage;
use rustface::{Detector, ImageData};
use std::io::Cursor;
use std::path::Path;

use super::{FaceBox, FaceDetector, FaceScanner};

/// Smallest face the SeetaFace cascade can look for.
const SEETA_MIN_FACE_SIZE: u32 = 20;
const SCORE_THRESHOLD: f64 = 2.0;
const PYRAMID_SCALE_FACTOR: f32 = 0.8;
const WINDOW_STEP: u32 = 4;

/// Frontal face detector backed by a SeetaFace funnel-structured cascade
/// (`seeta_fd_frontal_v1.0.bin`).
///
/// The cascade keeps scratch state while scanning, so every request builds
/// its own detector from the model bytes.
pub struct SeetaDetector {
    model: Vec<u8>,
}

impl SeetaDetector {
    pub fn from_file(path: &Path) -> Result<Self> {
        let model = std::fs::read(path)
            .with_context(|| format!("Failed to read face model {}", path.display()))?;
        let detector = Self { model };
        // Parse once up front so a bad model file is reported at startup.
        detector.build(SEETA_MIN_FACE_SIZE)?;
        log::info!("Face detector loaded from {}", path.display());
        Ok(detector)
    }

    fn build(&self, min_size: u32) -> Result<Box<dyn Detector>> {
        let model = rustface::read_model(Cursor::new(self.model.as_slice()))
            .context("Invalid face model")?;
        let mut detector = rustface::create_detector_with_model(model);
        detector.set_min_face_size(min_size.max(SEETA_MIN_FACE_SIZE));
        detector.set_score_thresh(SCORE_THRESHOLD);
        detector.set_pyramid_scale_factor(PYRAMID_SCALE_FACTOR);
        detector.set_slide_window_step(WINDOW_STEP, WINDOW_STEP);
        Ok(detector)
    }
}

impl FaceDetector for SeetaDetector {
    fn scanner(&self, min_size: u32) -> Result<Box<dyn FaceScanner + '_>> {
        Ok(Box::new(SeetaScanner {
            detector: self.build(min_size)?,
            min_size,
        }))
    }
}

struct SeetaScanner {
    detector: Box<dyn Detector>,
    min_size: u32,
}

impl FaceScanner for SeetaScanner {
    fn scan(&mut self, gray: &GrayImage) -> Vec<FaceBox> {
        let (width, height) = gray.dimensions();
        let mut image = ImageData::new(gray.as_raw(), width, height);
        self.detector
            .detect(&mut image)
            .into_iter()
            .filter_map(|info| to_face_box(info.bbox(), self.min_size))
            .collect()
    }
}

/// Boxes may start left of or above the image; those edges are clipped.
fn to_face_box(bbox: &rustface::Rectangle, min_size: u32) -> Option<FaceBox> {
    let (x, y) = (bbox.x(), bbox.y());
    let width = bbox.width().saturating_sub(x.min(0).unsigned_abs());
    let height = bbox.height().saturating_sub(y.min(0).unsigned_abs());
    if width < min_size || height < min_size || width == 0 || height == 0 {
        return None;
    }
    Some(FaceBox {
        x: x.max(0) as u32,
        y: y.max(0) as u32,
        width,
        height,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustface::Rectangle;

    #[test]
    fn negative_origin_is_clipped() {
        let face = to_face_box(&Rectangle::new(-10, 5, 80, 80), 0).unwrap();
        assert_eq!(
            face,
            FaceBox {
                x: 0,
                y: 5,
                width: 70,
                height: 80
            }
        );
    }

    #[test]
    fn small_faces_are_dropped() {
        assert!(to_face_box(&Rectangle::new(0, 0, 59, 120), 60).is_none());
        assert!(to_face_box(&Rectangle::new(0, 0, 60, 60), 60).is_some());
    }
}

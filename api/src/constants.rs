//! Application constants

/// Maximum upload size for /predict (200 MB)
pub const MAX_UPLOAD_SIZE: usize = 200 * 1024 * 1024;

/// Average fake probability at or above which media is labelled `Fake`
pub const FAKE_THRESHOLD: f32 = 0.5;

/// Side of the square face crop fed to the deepfake model
pub const FACE_INPUT_SIZE: u32 = 299;

/// Faces smaller than this (pixels per side) are ignored in video frames
pub const VIDEO_MIN_FACE_SIZE: u32 = 60;

/// Frame rate assumed when a video does not report one
pub const DEFAULT_FPS: f64 = 30.0;

/// Face crops scored per forward pass
pub const SCORE_BATCH_SIZE: usize = 16;

/// Token limit of the text classifier
pub const TEXT_MAX_TOKENS: usize = 512;

pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov"];
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

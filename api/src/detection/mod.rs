//! Face extraction and deepfake scoring for uploaded media.
//!
//! Three pluggable stages, each behind a trait: a [`FrameSampler`] turns a
//! video into frames, a [`FaceDetector`] finds faces in a frame and a
//! [`DeepfakeScorer`] rates each face crop. [`MediaAnalyzer`] wires them.
//!
//! Frames are streamed: each one is scanned and cropped while it is the only
//! decoded frame alive, and only the small face crops are kept for scoring.

use anyhow::Result;
use image::{GrayImage, RgbImage, imageops};
use std::io::Write;
use std::path::Path;

use crate::constants::{
    FACE_INPUT_SIZE, IMAGE_EXTENSIONS, SCORE_BATCH_SIZE, VIDEO_EXTENSIONS, VIDEO_MIN_FACE_SIZE,
};

mod sampling;
mod seeta;
mod summary;
mod xception;

pub use sampling::FfmpegSampler;
pub use seeta::SeetaDetector;
pub use summary::summarize;
pub use xception::XceptionScorer;

/// Decoded frame plus its position in the source video.
///
/// Still images have no position.
pub struct Frame {
    pub image: RgbImage,
    pub frame_number: Option<u64>,
    pub timestamp: Option<f64>,
}

/// Face rectangle in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaceBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// A face crop scaled to the scorer's input size (RGB, row-major).
pub struct FaceCrop {
    pub rgb: Vec<u8>,
    pub frame_number: Option<u64>,
    pub timestamp: Option<f64>,
}

/// Fake probability (0-1) of one face.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceScore {
    pub probability: f32,
    pub frame_number: Option<u64>,
    pub timestamp: Option<f64>,
}

/// Pluggable video decoder.
pub trait FrameSampler: Send + Sync {
    /// Hands the frames analyzed for a video to `visit` in order, one per
    /// second of footage. Each frame is dropped before the next is decoded.
    ///
    /// Errors from `visit` stop sampling and are returned as is.
    fn sample(&self, path: &Path, visit: &mut dyn FnMut(&Frame) -> Result<()>) -> Result<()>;
}

/// Pluggable face detection backend.
pub trait FaceDetector: Send + Sync {
    /// A scanner for one request, skipping faces narrower or shorter than
    /// `min_size` pixels when it is non-zero.
    fn scanner(&self, min_size: u32) -> Result<Box<dyn FaceScanner + '_>>;
}

/// Per-request detector state.
pub trait FaceScanner {
    fn scan(&mut self, frame: &GrayImage) -> Vec<FaceBox>;
}

/// Pluggable deepfake model.
pub trait DeepfakeScorer: Send + Sync {
    /// Probability that each crop is fake. Crops are
    /// `FACE_INPUT_SIZE x FACE_INPUT_SIZE` RGB.
    fn score(&self, crops: &[Vec<u8>]) -> Result<Vec<f32>>;
}

/// Kind of upload, decided by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn from_file_name(name: &str) -> Option<Self> {
        let ext = Path::new(name).extension()?.to_str()?.to_lowercase();
        if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            Some(MediaKind::Video)
        } else if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            Some(MediaKind::Image)
        } else {
            None
        }
    }

    fn min_face_size(self) -> u32 {
        match self {
            MediaKind::Image => 0,
            MediaKind::Video => VIDEO_MIN_FACE_SIZE,
        }
    }
}

pub struct MediaAnalyzer {
    sampler: Box<dyn FrameSampler>,
    detector: Box<dyn FaceDetector>,
    scorer: Box<dyn DeepfakeScorer>,
}

impl MediaAnalyzer {
    pub fn new(
        sampler: Box<dyn FrameSampler>,
        detector: Box<dyn FaceDetector>,
        scorer: Box<dyn DeepfakeScorer>,
    ) -> Self {
        Self {
            sampler,
            detector,
            scorer,
        }
    }

    /// Scores every face found in an uploaded file. An empty result means no
    /// face was found (or the media could not be decoded).
    ///
    /// Videos are spilled to a temporary file for the decoder; it is removed
    /// when this returns.
    pub fn analyze(
        &self,
        kind: MediaKind,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<Vec<FaceScore>> {
        let mut scanner = self.detector.scanner(kind.min_face_size())?;
        let mut crops = Vec::new();
        let mut frames = 0usize;
        let mut visit = |frame: &Frame| -> Result<()> {
            frames += 1;
            crops.extend(extract_faces(scanner.as_mut(), frame));
            Ok(())
        };

        match kind {
            MediaKind::Image => match image::load_from_memory(bytes) {
                Ok(img) => visit(&Frame {
                    image: img.to_rgb8(),
                    frame_number: None,
                    timestamp: None,
                })?,
                Err(e) => log::warn!("Failed to decode image {file_name}: {e}"),
            },
            MediaKind::Video => {
                let suffix = Path::new(file_name)
                    .extension()
                    .and_then(|e| e.to_str())
                    .map(|e| format!(".{e}"))
                    .unwrap_or_default();
                let mut upload = tempfile::Builder::new()
                    .prefix("deepscan-upload-")
                    .suffix(&suffix)
                    .tempfile()?;
                upload.write_all(bytes)?;
                upload.flush()?;
                self.sampler.sample(upload.path(), &mut visit)?;
            }
        }

        log::info!("{file_name}: {} face(s) in {frames} frame(s)", crops.len());
        self.score(crops)
    }

    fn score(&self, crops: Vec<FaceCrop>) -> Result<Vec<FaceScore>> {
        let mut scores = Vec::with_capacity(crops.len());
        for chunk in crops.chunks(SCORE_BATCH_SIZE) {
            let batch: Vec<Vec<u8>> = chunk.iter().map(|c| c.rgb.clone()).collect();
            let probabilities = self.scorer.score(&batch)?;
            if probabilities.len() != chunk.len() {
                anyhow::bail!(
                    "scorer returned {} scores for {} faces",
                    probabilities.len(),
                    chunk.len()
                );
            }
            let scored = chunk.iter().zip(probabilities);
            scores.extend(scored.map(|(crop, probability)| FaceScore {
                probability,
                frame_number: crop.frame_number,
                timestamp: crop.timestamp,
            }));
        }
        Ok(scores)
    }
}

/// Face crops of one frame, tagged with its position.
fn extract_faces(scanner: &mut dyn FaceScanner, frame: &Frame) -> Vec<FaceCrop> {
    let gray = imageops::grayscale(&frame.image);
    scanner
        .scan(&gray)
        .into_iter()
        .filter_map(|face| crop_face(&frame.image, face))
        .map(|rgb| FaceCrop {
            rgb,
            frame_number: frame.frame_number,
            timestamp: frame.timestamp,
        })
        .collect()
}

/// Crops `face` out of `image` (clamped to the image) and resizes it to the
/// scorer's input size. Degenerate boxes yield `None`.
fn crop_face(image: &RgbImage, face: FaceBox) -> Option<Vec<u8>> {
    let x = face.x.min(image.width());
    let y = face.y.min(image.height());
    let width = face.width.min(image.width() - x);
    let height = face.height.min(image.height() - y);
    if width == 0 || height == 0 {
        return None;
    }

    let crop = imageops::crop_imm(image, x, y, width, height).to_image();
    let resized = imageops::resize(
        &crop,
        FACE_INPUT_SIZE,
        FACE_INPUT_SIZE,
        imageops::FilterType::Triangle,
    );
    Some(resized.into_raw())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::Rgb;
    use std::sync::{Arc, Mutex};

    /// Hands out the queued frames for every video.
    pub(crate) struct FakeSampler(pub Mutex<Vec<Frame>>);

    impl FrameSampler for FakeSampler {
        fn sample(&self, path: &Path, visit: &mut dyn FnMut(&Frame) -> Result<()>) -> Result<()> {
            assert!(path.exists(), "video must be on disk while sampled");
            let frames = std::mem::take(&mut *self.0.lock().unwrap());
            for frame in frames {
                visit(&frame)?;
            }
            Ok(())
        }
    }

    /// Fails like a decoder that could not be started.
    pub(crate) struct BrokenSampler;

    impl FrameSampler for BrokenSampler {
        fn sample(&self, _: &Path, _: &mut dyn FnMut(&Frame) -> Result<()>) -> Result<()> {
            anyhow::bail!("failed to run ffmpeg")
        }
    }

    /// Reports `faces_per_frame[i]` fixed boxes for the i-th scanned frame.
    pub(crate) struct FakeDetector {
        pub faces_per_frame: Vec<usize>,
    }

    impl FakeDetector {
        pub fn new(faces_per_frame: Vec<usize>) -> Self {
            Self { faces_per_frame }
        }
    }

    struct FakeScanner<'a> {
        faces_per_frame: &'a [usize],
        next: usize,
    }

    impl FaceScanner for FakeScanner<'_> {
        fn scan(&mut self, _: &GrayImage) -> Vec<FaceBox> {
            let n = self.faces_per_frame.get(self.next).copied().unwrap_or(0);
            self.next += 1;
            let face = FaceBox {
                x: 1,
                y: 1,
                width: 4,
                height: 4,
            };
            vec![face; n]
        }
    }

    impl FaceDetector for FakeDetector {
        fn scanner(&self, _: u32) -> Result<Box<dyn FaceScanner + '_>> {
            Ok(Box::new(FakeScanner {
                faces_per_frame: &self.faces_per_frame,
                next: 0,
            }))
        }
    }

    /// Scores crops in order from a fixed list.
    pub(crate) struct FakeScorer {
        pub probabilities: Vec<f32>,
        pub next: Mutex<usize>,
    }

    impl FakeScorer {
        pub fn new(probabilities: Vec<f32>) -> Self {
            Self {
                probabilities,
                next: Mutex::new(0),
            }
        }
    }

    impl DeepfakeScorer for FakeScorer {
        fn score(&self, crops: &[Vec<u8>]) -> Result<Vec<f32>> {
            let expected = (FACE_INPUT_SIZE * FACE_INPUT_SIZE * 3) as usize;
            assert!(crops.iter().all(|c| c.len() == expected));
            let mut next = self.next.lock().unwrap();
            let out = self.probabilities[*next..*next + crops.len()].to_vec();
            *next += crops.len();
            Ok(out)
        }
    }

    pub(crate) fn frame(n: Option<u64>, t: Option<f64>) -> Frame {
        Frame {
            image: RgbImage::from_pixel(8, 8, Rgb([120, 80, 40])),
            frame_number: n,
            timestamp: t,
        }
    }

    pub(crate) fn png_bytes() -> Vec<u8> {
        let img = RgbImage::from_pixel(8, 8, Rgb([10, 20, 30]));
        let mut out = std::io::Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn media_kind_by_extension() {
        assert_eq!(MediaKind::from_file_name("clip.MP4"), Some(MediaKind::Video));
        assert_eq!(MediaKind::from_file_name("a.b.mov"), Some(MediaKind::Video));
        assert_eq!(MediaKind::from_file_name("x.avi"), Some(MediaKind::Video));
        assert_eq!(MediaKind::from_file_name("face.JPEG"), Some(MediaKind::Image));
        assert_eq!(MediaKind::from_file_name("face.png"), Some(MediaKind::Image));
        assert_eq!(MediaKind::from_file_name("doc.gif"), None);
        assert_eq!(MediaKind::from_file_name("noext"), None);

        assert_eq!(MediaKind::Image.min_face_size(), 0);
        assert_eq!(MediaKind::Video.min_face_size(), VIDEO_MIN_FACE_SIZE);
    }

    type Events = Arc<Mutex<Vec<String>>>;

    /// Decodes `count` frames one at a time, counting how many are alive.
    struct CountingSampler {
        count: u64,
        events: Events,
    }

    impl FrameSampler for CountingSampler {
        fn sample(&self, _: &Path, visit: &mut dyn FnMut(&Frame) -> Result<()>) -> Result<()> {
            for n in 0..self.count {
                let decoded = frame(Some(n * 30), Some(n as f64));
                self.events.lock().unwrap().push(format!("decode {n}"));
                visit(&decoded)?;
                drop(decoded);
                self.events.lock().unwrap().push(format!("drop {n}"));
            }
            Ok(())
        }
    }

    /// Logs each scan and how many frames were alive at that moment.
    struct CountingDetector {
        events: Events,
    }

    struct CountingScanner {
        events: Events,
    }

    impl FaceScanner for CountingScanner {
        fn scan(&mut self, _: &GrayImage) -> Vec<FaceBox> {
            let mut events = self.events.lock().unwrap();
            let decoded = events.iter().filter(|e| e.starts_with("decode")).count();
            let dropped = events.iter().filter(|e| e.starts_with("drop")).count();
            events.push(format!("scan with {} alive", decoded - dropped));
            vec![FaceBox {
                x: 0,
                y: 0,
                width: 8,
                height: 8,
            }]
        }
    }

    impl FaceDetector for CountingDetector {
        fn scanner(&self, _: u32) -> Result<Box<dyn FaceScanner + '_>> {
            Ok(Box::new(CountingScanner {
                events: self.events.clone(),
            }))
        }
    }

    #[test]
    fn video_frames_are_scanned_one_at_a_time() {
        let events = Events::default();
        let analyzer = MediaAnalyzer::new(
            Box::new(CountingSampler {
                count: 3,
                events: events.clone(),
            }),
            Box::new(CountingDetector {
                events: events.clone(),
            }),
            Box::new(FakeScorer::new(vec![0.1, 0.2, 0.3])),
        );

        let scores = analyzer
            .analyze(MediaKind::Video, "long.mp4", b"long video")
            .unwrap();
        assert_eq!(scores.len(), 3);

        let events = events.lock().unwrap();
        assert_eq!(
            *events,
            [
                "decode 0",
                "scan with 1 alive",
                "drop 0",
                "decode 1",
                "scan with 1 alive",
                "drop 1",
                "decode 2",
                "scan with 1 alive",
                "drop 2",
            ]
        );
    }

    #[test]
    fn sampler_errors_are_returned() {
        let analyzer = MediaAnalyzer::new(
            Box::new(BrokenSampler),
            Box::new(FakeDetector::new(vec![1])),
            Box::new(FakeScorer::new(vec![])),
        );
        let err = analyzer
            .analyze(MediaKind::Video, "clip.mp4", b"video")
            .unwrap_err();
        assert!(err.to_string().contains("ffmpeg"));
    }

    #[test]
    fn video_faces_keep_frame_positions_in_order() {
        let sampler = FakeSampler(Mutex::new(vec![
            frame(Some(0), Some(0.0)),
            frame(Some(30), Some(1.0)),
            frame(Some(60), Some(2.0)),
        ]));
        let detector = FakeDetector::new(vec![1, 0, 2]);
        let analyzer = MediaAnalyzer::new(
            Box::new(sampler),
            Box::new(detector),
            Box::new(FakeScorer::new(vec![0.9, 0.2, 0.4])),
        );

        let scores = analyzer
            .analyze(MediaKind::Video, "clip.mp4", b"not really a video")
            .unwrap();

        let positions: Vec<_> = scores
            .iter()
            .map(|s| (s.frame_number, s.probability))
            .collect();
        assert_eq!(
            positions,
            [(Some(0), 0.9), (Some(60), 0.2), (Some(60), 0.4)]
        );
    }

    #[test]
    fn images_have_no_position_and_no_min_size() {
        let analyzer = MediaAnalyzer::new(
            Box::new(FakeSampler(Mutex::new(vec![]))),
            Box::new(FakeDetector::new(vec![1])),
            Box::new(FakeScorer::new(vec![0.3])),
        );

        let scores = analyzer
            .analyze(MediaKind::Image, "face.png", &png_bytes())
            .unwrap();
        assert_eq!(
            scores,
            [FaceScore {
                probability: 0.3,
                frame_number: None,
                timestamp: None
            }]
        );
    }

    #[test]
    fn undecodable_image_yields_no_faces() {
        let analyzer = MediaAnalyzer::new(
            Box::new(FakeSampler(Mutex::new(vec![]))),
            Box::new(FakeDetector::new(vec![1])),
            Box::new(FakeScorer::new(vec![])),
        );
        let scores = analyzer
            .analyze(MediaKind::Image, "face.jpg", b"garbage")
            .unwrap();
        assert!(scores.is_empty());
    }

    #[test]
    fn crop_is_clamped_and_resized() {
        let image = RgbImage::from_pixel(10, 10, Rgb([1, 2, 3]));
        let rgb = crop_face(
            &image,
            FaceBox {
                x: 6,
                y: 6,
                width: 20,
                height: 20,
            },
        )
        .unwrap();
        assert_eq!(rgb.len(), (FACE_INPUT_SIZE * FACE_INPUT_SIZE * 3) as usize);
        assert_eq!(&rgb[..3], &[1, 2, 3]);

        let outside = FaceBox {
            x: 10,
            y: 0,
            width: 5,
            height: 5,
        };
        assert!(crop_face(&image, outside).is_none());
    }
}

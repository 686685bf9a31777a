//! Video frame sampling through the ffmpeg CLI.

use anyhow::{Context, Result, bail};
use std::env;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use super::summary::round2;
use super::{Frame, FrameSampler};
use crate::constants::DEFAULT_FPS;

const DEFAULT_FFMPEG_THREADS: usize = 1;

/// Keeps one frame per whole second of footage: frame `n` is kept when
/// `n % trunc(fps) == 0`.
///
/// A video ffmpeg rejects yields no frames. Failing to run ffmpeg at all (not
/// installed, killed by a signal) is an error.
#[derive(Debug, Clone)]
pub struct FfmpegSampler {
    ffprobe: PathBuf,
    ffmpeg: PathBuf,
    threads: usize,
}

impl FfmpegSampler {
    /// Programs come from `FFPROBE_PATH` and `FFMPEG_PATH`, else `PATH`.
    pub fn new() -> Self {
        Self::with_programs(
            env::var_os("FFPROBE_PATH").unwrap_or_else(|| "ffprobe".into()),
            env::var_os("FFMPEG_PATH").unwrap_or_else(|| "ffmpeg".into()),
        )
    }

    pub fn with_programs(ffprobe: impl Into<PathBuf>, ffmpeg: impl Into<PathBuf>) -> Self {
        Self {
            ffprobe: ffprobe.into(),
            ffmpeg: ffmpeg.into(),
            threads: ffmpeg_threads(),
        }
    }

    fn probe_fps(&self, input: &Path) -> Option<f64> {
        let output = Command::new(&self.ffprobe)
            .args(["-v", "error"])
            .args(["-select_streams", "v:0"])
            .args(["-show_entries", "stream=avg_frame_rate,r_frame_rate"])
            .args(["-of", "default=noprint_wrappers=1:nokey=1"])
            .arg(input)
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .output()
            .ok()?;

        // r_frame_rate is listed before avg_frame_rate; prefer the average.
        let stdout = String::from_utf8_lossy(&output.stdout);
        let rates: Vec<f64> = stdout.lines().filter_map(parse_frame_rate).collect();
        rates.last().copied()
    }

    /// Writes the sampled frames to `out_dir` and lists them in order.
    /// `None` when ffmpeg ran but rejected the input.
    fn extract(&self, input: &Path, out_dir: &Path, interval: u64) -> Result<Option<Vec<PathBuf>>> {
        let vf = format!("select='not(mod(n\\,{interval}))'");
        let output = Command::new(&self.ffmpeg)
            .args(["-hide_banner", "-loglevel", "error", "-nostdin"])
            .args(["-threads", &self.threads.to_string()])
            .arg("-i")
            .arg(input)
            .args(["-an", "-sn"])
            .args(["-vf", &vf])
            .args(["-vsync", "vfr"])
            .arg("-y")
            .arg(out_dir.join("frame_%06d.png"))
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .with_context(|| format!("failed to run {}", self.ffmpeg.display()))?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        match output.status.code() {
            Some(0) => {}
            Some(code) => {
                log::warn!(
                    "Could not sample {} (ffmpeg exit {code}): {}",
                    input.display(),
                    stderr.trim()
                );
                return Ok(None);
            }
            None => bail!("ffmpeg was terminated: {}", stderr.trim()),
        }

        let mut frames: Vec<PathBuf> = std::fs::read_dir(out_dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension().is_some_and(|e| e == "png")
                    && path
                        .file_name()
                        .is_some_and(|n| n.to_string_lossy().starts_with("frame_"))
            })
            .collect();
        frames.sort();
        Ok(Some(frames))
    }
}

impl Default for FfmpegSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSampler for FfmpegSampler {
    fn sample(&self, path: &Path, visit: &mut dyn FnMut(&Frame) -> Result<()>) -> Result<()> {
        let fps = self
            .probe_fps(path)
            .filter(|fps| *fps > 0.0)
            .unwrap_or(DEFAULT_FPS);
        let interval = sample_interval(fps);

        let out_dir = tempfile::Builder::new()
            .prefix("deepscan-frames-")
            .tempdir()?;
        let Some(files) = self.extract(path, out_dir.path(), interval)? else {
            return Ok(());
        };

        let mut decoded = 0usize;
        for (i, file) in files.iter().enumerate() {
            // One frame in memory at a time.
            let image = match image::open(file) {
                Ok(img) => img.to_rgb8(),
                Err(e) => {
                    log::warn!("Failed to decode frame {i}: {e}");
                    continue;
                }
            };
            let (frame_number, timestamp) = frame_position(i as u64, interval, fps);
            visit(&Frame {
                image,
                frame_number: Some(frame_number),
                timestamp: Some(timestamp),
            })?;
            decoded += 1;
        }
        log::debug!(
            "Sampled {decoded} frame(s) from {} at {fps:.3} fps",
            path.display()
        );
        Ok(())
    }
}

/// Parses ffprobe rates such as `30000/1001` or `25`. `0/0` is `None`.
pub fn parse_frame_rate(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    let rate = match raw.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => raw.parse().ok()?,
    };
    (rate.is_finite() && rate > 0.0).then_some(rate)
}

/// Frames between samples: the integer part of the rate, at least 1.
pub fn sample_interval(fps: f64) -> u64 {
    (fps.trunc() as u64).max(1)
}

/// Source frame number and timestamp (seconds, 2 decimals) of the `index`-th
/// sampled frame.
pub fn frame_position(index: u64, interval: u64, fps: f64) -> (u64, f64) {
    let frame_number = index * interval;
    (frame_number, round2(frame_number as f64 / fps))
}

fn ffmpeg_threads() -> usize {
    env::var("FFMPEG_THREADS")
        .ok()
        .and_then(|s| s.parse().ok())
        .filter(|v| *v > 0)
        .unwrap_or(DEFAULT_FFMPEG_THREADS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ffprobe_rates() {
        assert_eq!(parse_frame_rate("25"), Some(25.0));
        assert_eq!(parse_frame_rate("30/1\n"), Some(30.0));
        let ntsc = parse_frame_rate("30000/1001").unwrap();
        assert!((ntsc - 29.97).abs() < 0.01);
        assert_eq!(parse_frame_rate("0/0"), None);
        assert_eq!(parse_frame_rate("N/A"), None);
        assert_eq!(parse_frame_rate(""), None);
    }

    #[test]
    fn interval_truncates_rate() {
        assert_eq!(sample_interval(30.0), 30);
        assert_eq!(sample_interval(29.97), 29);
        assert_eq!(sample_interval(0.5), 1);
    }

    #[test]
    fn positions_of_sampled_frames() {
        assert_eq!(frame_position(0, 30, 30.0), (0, 0.0));
        assert_eq!(frame_position(2, 30, 30.0), (60, 2.0));
        assert_eq!(frame_position(1, 29, 29.97), (29, 0.97));
        assert_eq!(frame_position(3, 25, 25.0), (75, 3.0));
    }

    fn broken_video() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.mp4");
        std::fs::write(&path, b"definitely not a video").unwrap();
        (dir, path)
    }

    #[test]
    fn rejected_video_yields_no_frames() {
        let (_dir, path) = broken_video();
        // `false` runs and exits non-zero, like ffmpeg on a file it cannot decode.
        let sampler = FfmpegSampler::with_programs("false", "false");

        let mut seen = 0;
        sampler
            .sample(&path, &mut |_| {
                seen += 1;
                Ok(())
            })
            .unwrap();
        assert_eq!(seen, 0);
    }

    #[test]
    fn missing_ffmpeg_is_an_error() {
        let (_dir, path) = broken_video();
        let sampler = FfmpegSampler::with_programs(
            "/nonexistent/deepscan/ffprobe",
            "/nonexistent/deepscan/ffmpeg",
        );

        let err = sampler.sample(&path, &mut |_| Ok(())).unwrap_err();
        assert!(err.to_string().contains("failed to run"));
        let io = err.downcast_ref::<std::io::Error>().unwrap();
        assert_eq!(io.kind(), std::io::ErrorKind::NotFound);
    }
}

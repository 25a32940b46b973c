//! Keyframe extraction with ffmpeg.
//!
//! The video is written into a scratch directory, its duration read with ffprobe,
//! and one still decoded at each fixed relative position. Scratch files are
//! removed when the extraction returns.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::process::Command;
use tracing::{debug, warn};

use dejavu_core::defaults::{FFMPEG_TIMEOUT_SECS, KEYFRAME_POSITIONS};
use dejavu_core::{Error, Keyframe, KeyframeExtractor, Result};

/// Extracts keyframes by shelling out to `ffprobe` and `ffmpeg`.
pub struct FfmpegKeyframeExtractor {
    positions: Vec<f64>,
    timeout: Duration,
}

impl Default for FfmpegKeyframeExtractor {
    fn default() -> Self {
        Self {
            positions: KEYFRAME_POSITIONS.to_vec(),
            timeout: Duration::from_secs(FFMPEG_TIMEOUT_SECS),
        }
    }
}

impl FfmpegKeyframeExtractor {
    pub fn new(positions: Vec<f64>, timeout: Duration) -> Self {
        Self { positions, timeout }
    }

    /// | Variable | Default |
    /// |----------|---------|
    /// | `FFMPEG_TIMEOUT_SECS` | `60` |
    pub fn from_env() -> Self {
        let mut extractor = Self::default();
        if let Some(secs) = std::env::var("FFMPEG_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
        {
            extractor.timeout = Duration::from_secs(secs);
        }
        extractor
    }

    /// Check if ffmpeg and ffprobe are on the PATH.
    pub async fn health_check() -> bool {
        let ffmpeg = Command::new("ffmpeg").arg("-version").output().await;
        let ffprobe = Command::new("ffprobe").arg("-version").output().await;
        matches!((ffmpeg, ffprobe), (Ok(a), Ok(b)) if a.status.success() && b.status.success())
    }

    async fn run(&self, cmd: &mut Command) -> Result<std::process::Output> {
        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| {
                Error::Decode(format!(
                    "External command timed out after {}s",
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| Error::Decode(format!("Failed to execute command: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Decode(format!(
                "Command failed (exit {}): {}",
                output.status,
                stderr.trim()
            )));
        }
        Ok(output)
    }

    async fn duration_secs(&self, video_path: &Path) -> Result<f64> {
        let output = self
            .run(
                Command::new("ffprobe")
                    .args([
                        "-v",
                        "error",
                        "-show_entries",
                        "format=duration",
                        "-of",
                        "default=noprint_wrappers=1:nokey=1",
                    ])
                    .arg(video_path),
            )
            .await?;
        parse_duration(&String::from_utf8_lossy(&output.stdout))
    }

    async fn frame_at(&self, video_path: &Path, out: &Path, timestamp_secs: f64) -> Result<Vec<u8>> {
        self.run(
            Command::new("ffmpeg")
                .arg("-ss")
                .arg(format!("{:.3}", timestamp_secs))
                .arg("-i")
                .arg(video_path)
                .args(["-frames:v", "1", "-q:v", "2", "-y"])
                .arg(out),
        )
        .await?;
        let bytes = tokio::fs::read(out).await?;
        if bytes.is_empty() {
            return Err(Error::Decode("ffmpeg produced an empty frame".to_string()));
        }
        Ok(bytes)
    }
}

/// Parse ffprobe's duration output.
pub fn parse_duration(raw: &str) -> Result<f64> {
    let duration = raw
        .trim()
        .parse::<f64>()
        .map_err(|e| Error::Decode(format!("Failed to parse duration {:?}: {}", raw.trim(), e)))?;
    if !duration.is_finite() || duration <= 0.0 {
        return Err(Error::Decode(format!("Unusable video duration {}", duration)));
    }
    Ok(duration)
}

/// Timestamps for the relative positions over a given duration.
pub fn keyframe_timestamps(positions: &[f64], duration_secs: f64) -> Vec<f64> {
    positions.iter().map(|p| p * duration_secs).collect()
}

#[async_trait]
impl KeyframeExtractor for FfmpegKeyframeExtractor {
    async fn extract_keyframes(&self, video: &[u8]) -> Result<Vec<Keyframe>> {
        if video.is_empty() {
            return Err(Error::Decode("Empty video".to_string()));
        }

        let work_dir = TempDir::new()?;
        let video_path = work_dir.path().join("input.video");
        tokio::fs::write(&video_path, video).await?;

        let duration = self.duration_secs(&video_path).await?;
        let timestamps = keyframe_timestamps(&self.positions, duration);

        let mut frames = Vec::with_capacity(timestamps.len());
        for (index, timestamp_secs) in timestamps.into_iter().enumerate() {
            let out = work_dir.path().join(format!("frame_{:02}.jpg", index));
            match self.frame_at(&video_path, &out, timestamp_secs).await {
                Ok(bytes) => frames.push(Keyframe {
                    frame_index: index as i32,
                    timestamp_secs,
                    bytes,
                }),
                Err(e) => {
                    warn!(
                        subsystem = "inference",
                        component = "keyframes",
                        frame_index = index,
                        timestamp_secs,
                        error = %e,
                        "Keyframe failed to decode, skipping"
                    );
                }
            }
        }

        debug!(
            subsystem = "inference",
            component = "keyframes",
            duration_secs = duration,
            result_count = frames.len(),
            "Keyframes extracted"
        );
        Ok(frames)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyframe_timestamps_at_fixed_positions() {
        let ts = keyframe_timestamps(&KEYFRAME_POSITIONS, 20.0);
        assert_eq!(ts, vec![2.0, 6.0, 10.0, 14.0]);
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("12.480000\n").unwrap(), 12.48);
        assert!(parse_duration("N/A").is_err());
        assert!(parse_duration("0").is_err());
        assert!(parse_duration("-4").is_err());
    }

    #[test]
    fn test_default_uses_configured_positions() {
        let extractor = FfmpegKeyframeExtractor::default();
        assert_eq!(extractor.positions, KEYFRAME_POSITIONS.to_vec());
        assert_eq!(extractor.timeout, Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_empty_video_is_decode_error() {
        let err = FfmpegKeyframeExtractor::default()
            .extract_keyframes(&[])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[tokio::test]
    async fn test_garbage_video_never_panics() {
        // Either ffmpeg is missing or it rejects the data; both surface as errors.
        let result = FfmpegKeyframeExtractor::default()
            .extract_keyframes(b"definitely not a video")
            .await;
        match result {
            Ok(frames) => assert!(frames.is_empty()),
            Err(e) => assert!(!e.is_fatal()),
        }
    }
}

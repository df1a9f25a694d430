use crate::ports::transcoder::{TranscodeError, Transcoder};
use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command;
use tracing::debug;

/// FFmpeg-backed transcoder producing the segmented DASH layout the rest
/// of the system relies on: `manifest.mpd`, `init-<rep>.m4s`,
/// `chunk-<rep>-<NNNNN>.m4s`, and `thumbnail.jpg`.
#[derive(Clone)]
pub struct FfmpegTranscoder {
    binary: String,
}

impl FfmpegTranscoder {
    pub fn new() -> Self {
        Self {
            binary: "ffmpeg".to_string(),
        }
    }

    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    async fn run(mut command: Command) -> Result<(), TranscodeError> {
        let output = command.output().await.map_err(TranscodeError::Spawn)?;
        if !output.status.success() {
            return Err(TranscodeError::Failed {
                code: output.status.code(),
                output: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        Ok(())
    }
}

impl Default for FfmpegTranscoder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn transcode(&self, input: &Path, workdir: &Path) -> Result<(), TranscodeError> {
        let manifest = workdir.join("manifest.mpd");
        debug!(input = %input.display(), workdir = %workdir.display(), "starting dash transcode");

        let mut command = Command::new(&self.binary);
        command
            .arg("-i")
            .arg(input)
            .args(["-c:v", "libx264"])
            .args(["-preset", "veryfast"])
            .args(["-profile:v", "baseline"])
            .args(["-c:a", "aac"])
            .args(["-bf", "1"])
            .args(["-keyint_min", "120"])
            .args(["-g", "120"])
            .args(["-sc_threshold", "0"])
            .args(["-b:v", "2500k"])
            .args(["-maxrate", "2500k"])
            .args(["-bufsize", "5000k"])
            .args(["-b:a", "128k"])
            .args(["-f", "dash"])
            .args(["-use_timeline", "1"])
            .args(["-use_template", "1"])
            .args(["-init_seg_name", "init-$RepresentationID$.m4s"])
            .args(["-media_seg_name", "chunk-$RepresentationID$-$Number%05d$.m4s"])
            .args(["-seg_duration", "4"])
            .args(["-threads", "0"])
            .arg(&manifest)
            .current_dir(workdir);

        Self::run(command).await
    }

    async fn thumbnail(&self, input: &Path, workdir: &Path) -> Result<(), TranscodeError> {
        let thumbnail = workdir.join("thumbnail.jpg");

        let mut command = Command::new(&self.binary);
        command
            .arg("-i")
            .arg(input)
            .args(["-vframes", "1"])
            // Two seconds in, past any black intro frames.
            .args(["-ss", "00:00:02"])
            .args(["-vf", "scale=640:-1"])
            .args(["-q:v", "2"])
            .arg(&thumbnail)
            .current_dir(workdir);

        Self::run(command).await
    }
}

use std::ffi::OsString;
use std::path::Path;
use std::process::{ExitStatus, Stdio};

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

use crate::modules::video::model::{tail_chars, Preset, MAX_DIAGNOSTIC_CHARS};

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{descriptor} exited with {status}: {diagnostic}")]
    Exit {
        descriptor: String,
        status: ExitStatus,
        diagnostic: String,
    },
}

/// Runs the external media tool. Implementations judge success by exit code
/// only and never touch the stores.
#[async_trait]
pub trait Transcoder: Send + Sync {
    async fn transcode(&self, input: &Path, output: &Path, preset: Preset) -> Result<(), ToolError>;

    async fn generate_sample(&self, output: &Path, duration_secs: u32) -> Result<(), ToolError>;
}

/// `(scale filter, x264 preset, crf)` for each quality preset.
fn preset_params(preset: Preset) -> (&'static str, &'static str, &'static str) {
    match preset {
        Preset::P360 => ("scale=-2:360", "slow", "28"),
        Preset::P480 => ("scale=-2:480", "slow", "26"),
        Preset::P720 => ("scale=-2:720", "slower", "24"),
        Preset::P1080 => ("scale=-2:1080", "veryslow", "23"),
    }
}

pub fn transcode_args(input: &Path, output: &Path, preset: Preset) -> Vec<OsString> {
    let (scale, speed, crf) = preset_params(preset);
    let mut args: Vec<OsString> = vec!["-y".into(), "-i".into(), input.into()];
    args.extend(
        ["-vf", scale, "-c:v", "libx264", "-preset", speed, "-crf", crf, "-c:a", "aac"]
            .into_iter()
            .map(OsString::from),
    );
    args.push(output.into());
    args
}

pub fn sample_args(output: &Path, duration_secs: u32) -> Vec<OsString> {
    let duration = duration_secs.to_string();
    let mut args: Vec<OsString> = [
        "-y",
        "-f",
        "lavfi",
        "-i",
        "testsrc=size=1280x720:rate=30",
        "-t",
        duration.as_str(),
        "-c:v",
        "libx264",
        "-pix_fmt",
        "yuv420p",
    ]
    .into_iter()
    .map(OsString::from)
    .collect();
    args.push(output.into());
    args
}

/// ffmpeg invoked as a child process.
#[derive(Clone, Debug)]
pub struct FfmpegRunner {
    binary: String,
}

impl FfmpegRunner {
    pub fn new(binary: impl Into<String>) -> Self {
        Self { binary: binary.into() }
    }

    async fn run(&self, descriptor: &str, args: Vec<OsString>) -> Result<(), ToolError> {
        debug!(program = %self.binary, ?args, "running {}", descriptor);

        let output = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| ToolError::Spawn {
                program: self.binary.clone(),
                source,
            })?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if output.status.success() {
            debug!(stderr = %tail_chars(&stderr, MAX_DIAGNOSTIC_CHARS), "{} finished", descriptor);
            return Ok(());
        }

        Err(ToolError::Exit {
            descriptor: descriptor.to_string(),
            status: output.status,
            diagnostic: tail_chars(stderr.trim(), MAX_DIAGNOSTIC_CHARS).to_string(),
        })
    }
}

#[async_trait]
impl Transcoder for FfmpegRunner {
    async fn transcode(&self, input: &Path, output: &Path, preset: Preset) -> Result<(), ToolError> {
        info!(%preset, input = %input.display(), "🎞️ transcoding");
        self.run("ffmpeg transcode", transcode_args(input, output, preset))
            .await
    }

    async fn generate_sample(&self, output: &Path, duration_secs: u32) -> Result<(), ToolError> {
        info!(duration_secs, "🎞️ generating sample video");
        self.run("ffmpeg sample", sample_args(output, duration_secs))
            .await
    }
}

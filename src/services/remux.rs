//! Fast-start remuxing: moves the MP4 index (`moov`) to the front of the
//! file with a stream copy, so playback can begin before the download ends.

use crate::services::tool::{ToolCommand, ToolError};
use async_trait::async_trait;
use std::{
    ffi::OsString,
    path::{Path, PathBuf},
    time::Duration,
};
use thiserror::Error;

/// Appended to the input path to name the remuxed output.
pub const PROCESSED_SUFFIX: &str = ".processing";

#[derive(Debug, Error)]
pub enum RemuxError {
    #[error("fast-start remux failed: {0}")]
    Tool(#[from] ToolError),
}

/// Where the remuxed copy of `input` is written.
pub fn processed_path(input: &Path) -> PathBuf {
    let mut name = OsString::from(input.as_os_str());
    name.push(PROCESSED_SUFFIX);
    PathBuf::from(name)
}

/// Produces a streaming-optimized copy of a local MP4.
///
/// Implementations write to [`processed_path`] of the input and leave the
/// input in place. Deleting the output is the caller's job, including when
/// `remux` fails after partially writing it.
#[async_trait]
pub trait Remuxer: Send + Sync {
    async fn remux(&self, input: &Path) -> Result<PathBuf, RemuxError>;
}

/// [`Remuxer`] backed by the `ffmpeg` CLI.
#[derive(Debug, Clone)]
pub struct FfmpegRemuxer {
    ffmpeg_path: PathBuf,
    timeout: Duration,
}

impl FfmpegRemuxer {
    pub fn new(ffmpeg_path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            timeout,
        }
    }

    fn command(&self, input: &Path, output: &Path) -> ToolCommand {
        let mut cmd = ToolCommand::new(self.ffmpeg_path.clone(), self.timeout);
        cmd.args(["-v", "error", "-y", "-i"])
            .path_arg(input)
            .args(["-c", "copy", "-movflags", "faststart", "-f", "mp4"])
            .path_arg(output);
        cmd
    }
}

#[async_trait]
impl Remuxer for FfmpegRemuxer {
    async fn remux(&self, input: &Path) -> Result<PathBuf, RemuxError> {
        let output = processed_path(input);
        let run = self.command(input, &output).execute().await?;
        tracing::debug!(
            input = %input.display(),
            output = %output.display(),
            stderr = %run.stderr,
            "fast-start remux complete"
        );
        Ok(output)
    }
}

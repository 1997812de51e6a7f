//! Media inspection: stream geometry and orientation classification.

use crate::services::tool::{ToolCommand, ToolError};
use async_trait::async_trait;
use serde::Deserialize;
use std::{
    fmt,
    path::{Path, PathBuf},
    time::Duration,
};
use thiserror::Error;

/// Allowed absolute deviation from an exact 16:9 or 9:16 ratio.
const RATIO_TOLERANCE: f64 = 0.1;
const LANDSCAPE_RATIO: f64 = 16.0 / 9.0;
const PORTRAIT_RATIO: f64 = 9.0 / 16.0;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("media inspection failed: {0}")]
    Tool(#[from] ToolError),
    #[error("unparseable inspection output: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("inspection reported no media streams")]
    NoStreams,
    #[error("first stream has no width/height")]
    MissingDimensions,
}

/// Width and height of the first reported stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub width: u32,
    pub height: u32,
}

impl Geometry {
    pub fn orientation(&self) -> Orientation {
        Orientation::classify(self.width, self.height)
    }
}

/// Closed set of labels a video's aspect ratio is bucketed into. The label
/// becomes the first segment of the video's storage key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Orientation {
    Landscape,
    Portrait,
    Other,
}

impl Orientation {
    pub const ALL: [Orientation; 3] = [Self::Landscape, Self::Portrait, Self::Other];

    /// Classify by `width / height`. The landscape window is tested first.
    pub fn classify(width: u32, height: u32) -> Self {
        if height == 0 {
            return Self::Other;
        }
        let ratio = f64::from(width) / f64::from(height);
        if (ratio - LANDSCAPE_RATIO).abs() <= RATIO_TOLERANCE {
            Self::Landscape
        } else if (ratio - PORTRAIT_RATIO).abs() <= RATIO_TOLERANCE {
            Self::Portrait
        } else {
            Self::Other
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Landscape => "landscape",
            Self::Portrait => "portrait",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reads stream geometry from a local media file.
#[async_trait]
pub trait MediaProber: Send + Sync {
    async fn probe(&self, path: &Path) -> Result<Geometry, ProbeError>;
}

/// [`MediaProber`] backed by the `ffprobe` CLI.
#[derive(Debug, Clone)]
pub struct FfprobeProber {
    ffprobe_path: PathBuf,
    timeout: Duration,
}

impl FfprobeProber {
    pub fn new(ffprobe_path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            ffprobe_path: ffprobe_path.into(),
            timeout,
        }
    }
}

#[async_trait]
impl MediaProber for FfprobeProber {
    async fn probe(&self, path: &Path) -> Result<Geometry, ProbeError> {
        let mut cmd = ToolCommand::new(self.ffprobe_path.clone(), self.timeout);
        cmd.args(["-v", "error", "-print_format", "json", "-show_streams"])
            .path_arg(path);

        let output = cmd.execute().await?;
        if !output.stderr.is_empty() {
            tracing::debug!(path = %path.display(), stderr = %output.stderr, "ffprobe diagnostics");
        }
        parse_geometry(&output.stdout)
    }
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    width: Option<u32>,
    height: Option<u32>,
}

/// Pull the first stream's geometry out of `ffprobe -print_format json` output.
pub fn parse_geometry(stdout: &[u8]) -> Result<Geometry, ProbeError> {
    let out: FfprobeOutput = serde_json::from_slice(stdout)?;
    let first = out.streams.first().ok_or(ProbeError::NoStreams)?;
    match (first.width, first.height) {
        (Some(width), Some(height)) => Ok(Geometry { width, height }),
        _ => Err(ProbeError::MissingDimensions),
    }
}

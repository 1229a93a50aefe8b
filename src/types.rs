use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Output format for the run report
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// JSON format for programmatic consumption
    Json,
    /// Human-readable single line
    #[default]
    Simple,
}

/// Browser window dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewportSize {
    /// Window width in pixels
    pub width: u32,
    /// Window height in pixels
    pub height: u32,
}

impl ViewportSize {
    /// Window size every session starts with
    pub const DEFAULT: ViewportSize = ViewportSize {
        width: 1600,
        height: 900,
    };
}

impl Default for ViewportSize {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for ViewportSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Kind of screenshot written to the output directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ArtifactKind {
    /// Visible viewport
    Viewport,
    /// Window resized to the content dimensions
    Full,
    /// Bounding region of one element
    Element { selector: String },
}

/// One image file written by a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    #[serde(flatten)]
    pub kind: ArtifactKind,
    pub path: PathBuf,
    /// Size of the PNG in bytes
    pub bytes: usize,
}

/// Result of a successful capture run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureReport {
    /// Timestamped directory holding the artifacts
    pub out_dir: PathBuf,
    /// Artifacts in capture order
    pub artifacts: Vec<Artifact>,
}

#[cfg(test)]
#[path = "types_test.rs"]
mod types_test;

//! Temporary per-line audio clips.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tempfile::NamedTempFile;
use tracing::debug;

/// One synthesized clip on disk.
///
/// The file is removed when the artifact is dropped, so every exit path of a
/// pipeline run cleans up after itself.
#[derive(Debug)]
pub struct AudioArtifact {
    file: NamedTempFile,
    /// Position of the source line in the parsed script.
    pub line_index: usize,
}

impl AudioArtifact {
    /// Persist `bytes` to a uniquely named temporary file in `dir`.
    pub fn persist(dir: &Path, line_index: usize, extension: &str, bytes: &[u8]) -> Result<Self> {
        let mut file = tempfile::Builder::new()
            .prefix("voice_dialogue_line_")
            .suffix(&format!(".{}", extension))
            .tempfile_in(dir)
            .with_context(|| format!("Failed to create temporary artifact in {}", dir.display()))?;

        file.write_all(bytes).context("Failed to write temporary artifact")?;
        file.flush().context("Failed to flush temporary artifact")?;

        debug!("Wrote line {} clip to {} ({} bytes)", line_index + 1, file.path().display(), bytes.len());
        Ok(Self { file, line_index })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn to_path_buf(&self) -> PathBuf {
        self.file.path().to_path_buf()
    }
}

//! End-to-end dialogue synthesis: script → lines → clips → one output file.

mod error;

use std::path::{Path, PathBuf};

use serde::Serialize;
use time::OffsetDateTime;
use time::macros::format_description;
use tracing::{debug, info, warn};

pub use error::{ErrorDescriptor, PipelineError};

use crate::audio::{CombineMode, combine};
use crate::config::AppConfig;
use crate::script::{DialogueLine, parse_script};
use crate::tts::{AudioSettings, BackendChain, Dispatcher, SkippedLine, SpeakerRoster};

/// Prefix of every combined output file.
const OUTPUT_PREFIX: &str = "voice_dialogue";

/// Settings a run needs besides the backends.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub output_dir: PathBuf,
    /// Where per-line clips live until combined.
    pub temp_dir: PathBuf,
    pub audio: AudioSettings,
    pub style_a: Option<i64>,
    pub style_b: Option<i64>,
}

impl PipelineSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            output_dir: config.output_dir.clone(),
            temp_dir: config.temp_dir.clone().unwrap_or_else(std::env::temp_dir),
            audio: config.audio_settings(),
            style_a: config.style_a,
            style_b: config.style_b,
        }
    }
}

/// Summary of a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub file_name: String,
    pub file_path: PathBuf,
    pub lines_total: usize,
    pub lines_synthesized: usize,
    pub lines_skipped: Vec<SkippedLine>,
    pub warnings: Vec<String>,
    #[serde(skip)]
    pub combine_mode: CombineMode,
}

/// Owns the active backend chain and the roster fetched at startup.
pub struct Pipeline {
    chain: BackendChain,
    roster: SpeakerRoster,
    settings: PipelineSettings,
}

impl Pipeline {
    pub fn new(chain: BackendChain, roster: SpeakerRoster, settings: PipelineSettings) -> Self {
        Self { chain, roster, settings }
    }

    pub fn roster(&self) -> &SpeakerRoster {
        &self.roster
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Read and parse a script file.
    ///
    /// # Errors
    /// `ScriptNotFound` or `ScriptUnreadable` when the file cannot be read.
    pub async fn load_script(path: &Path) -> Result<Vec<DialogueLine>, PipelineError> {
        let content = tokio::fs::read_to_string(path).await.map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                PipelineError::ScriptNotFound(path.to_path_buf())
            } else {
                PipelineError::ScriptUnreadable { path: path.to_path_buf(), source }
            }
        })?;

        let lines = parse_script(&content);
        info!("📜 Loaded {} dialogue line(s) from {}", lines.len(), path.display());
        Ok(lines)
    }

    /// Load `path` and synthesize it.
    pub async fn run_script_file(&self, path: &Path) -> Result<PipelineReport, PipelineError> {
        let lines = Self::load_script(path).await?;
        self.run(&lines).await
    }

    /// Synthesize `lines` into one combined file in the output directory.
    ///
    /// # Errors
    /// Fails without calling any backend when there are no lines, no reachable
    /// backend, or no speakers. Fails with `NoAudioGenerated` when every line failed.
    pub async fn run(&self, lines: &[DialogueLine]) -> Result<PipelineReport, PipelineError> {
        if lines.is_empty() {
            return Err(PipelineError::NoDialogue);
        }

        self.chain.ensure_reachable().await?;

        if self.roster.is_empty() {
            return Err(PipelineError::NoSpeakers);
        }

        for dir in [&self.settings.output_dir, &self.settings.temp_dir] {
            tokio::fs::create_dir_all(dir).await.map_err(|e| PipelineError::Io(format!("failed to create {}: {}", dir.display(), e)))?;
        }

        let dispatcher = Dispatcher::new(&self.chain, &self.roster, self.settings.audio, self.settings.temp_dir.clone()).with_styles(self.settings.style_a, self.settings.style_b);
        let outcome = dispatcher.dispatch(lines).await;

        if outcome.artifacts.is_empty() {
            warn!("No audio generated for {} line(s)", lines.len());
            return Err(PipelineError::NoAudioGenerated { skipped: outcome.skipped.len() });
        }

        let file_path = unique_output_path(&self.settings.output_dir, self.settings.audio.extension());
        let lines_synthesized = outcome.artifacts.len();
        let artifacts = outcome.artifacts;
        let target = file_path.clone();

        // Clips are dropped, and so deleted, when the blocking task ends
        let combine_mode = tokio::task::spawn_blocking(move || combine(&artifacts, &target))
            .await
            .map_err(|e| PipelineError::Combination(e.to_string()))?
            .map_err(|e| PipelineError::Combination(format!("{:#}", e)))?;

        let file_name = file_path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
        info!("✅ Wrote {} ({} of {} line(s))", file_path.display(), lines_synthesized, lines.len());

        Ok(PipelineReport {
            file_name,
            file_path,
            lines_total: lines.len(),
            lines_synthesized,
            lines_skipped: outcome.skipped,
            warnings: outcome.warnings,
            combine_mode,
        })
    }
}

/// Timestamp used in output names, in local time when the offset is known.
fn timestamp() -> String {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    now.format(format_description!("[year][month][day]_[hour][minute][second]")).unwrap_or_else(|_| now.unix_timestamp().to_string())
}

/// `voice_dialogue_<timestamp>.<ext>`, suffixed with `_<n>` if that name is taken.
fn unique_output_path(dir: &Path, extension: &str) -> PathBuf {
    let stem = format!("{}_{}", OUTPUT_PREFIX, timestamp());
    let mut path = dir.join(format!("{}.{}", stem, extension));
    let mut n = 1;
    while path.exists() {
        path = dir.join(format!("{}_{}.{}", stem, n, extension));
        n += 1;
    }
    debug!("Output file: {}", path.display());
    path
}

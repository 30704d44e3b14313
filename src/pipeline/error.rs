//! Pipeline-level failures and their user-facing descriptors.

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::tts::BackendError;

/// A failure that stops a whole pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("script not found: {}", .0.display())]
    ScriptNotFound(PathBuf),

    #[error("failed to read script {}: {source}", .path.display())]
    ScriptUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no dialogue lines found in script")]
    NoDialogue,

    #[error("no synthesis backend is reachable: {0}")]
    BackendUnreachable(#[from] BackendError),

    #[error("no speakers available")]
    NoSpeakers,

    #[error("no audio generated ({skipped} line(s) failed)")]
    NoAudioGenerated { skipped: usize },

    #[error("failed to combine audio: {0}")]
    Combination(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl PipelineError {
    /// HTTP status separating client-caused from server-caused conditions.
    pub fn status_code(&self) -> u16 {
        match self {
            PipelineError::ScriptNotFound(_) => 404,
            PipelineError::ScriptUnreadable { .. } | PipelineError::NoDialogue => 400,
            PipelineError::BackendUnreachable(_) | PipelineError::NoSpeakers => 503,
            PipelineError::NoAudioGenerated { .. } => 502,
            PipelineError::Combination(_) | PipelineError::Io(_) => 500,
        }
    }

    /// Stable taxonomy tag.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::ScriptNotFound(_) => "script_not_found",
            PipelineError::ScriptUnreadable { .. } => "script_unreadable",
            PipelineError::NoDialogue => "no_dialogue",
            PipelineError::BackendUnreachable(_) => "backend_unreachable",
            PipelineError::NoSpeakers => "no_speakers",
            PipelineError::NoAudioGenerated { .. } => "no_audio_generated",
            PipelineError::Combination(_) => "combination_failed",
            PipelineError::Io(_) => "io_error",
        }
    }

    pub fn descriptor(&self) -> ErrorDescriptor {
        ErrorDescriptor { error: self.to_string(), kind: self.kind() }
    }
}

/// Error body returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorDescriptor {
    pub error: String,
    pub kind: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_and_server_statuses() {
        assert_eq!(PipelineError::ScriptNotFound(PathBuf::from("x.txt")).status_code(), 404);
        assert_eq!(PipelineError::NoDialogue.status_code(), 400);
        assert_eq!(PipelineError::BackendUnreachable(BackendError::Unreachable("down".into())).status_code(), 503);
        assert_eq!(PipelineError::NoAudioGenerated { skipped: 2 }.status_code(), 502);
        assert_eq!(PipelineError::Io("disk full".into()).status_code(), 500);
    }

    #[test]
    fn test_descriptor_serializes_kind() {
        let json = serde_json::to_value(PipelineError::NoDialogue.descriptor()).unwrap();
        assert_eq!(json["kind"], "no_dialogue");
        assert_eq!(json["error"], "no dialogue lines found in script");
    }
}

//! Synthesis backend abstraction and the ordered fallback chain.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::request::SynthesisRequest;
use super::speaker::{SpeakerProfile, SpeakerRoster};

/// Failure of a single backend operation.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("backend unreachable: {0}")]
    Unreachable(String),

    #[error("synthesis failed with status {status}: {detail}")]
    Status { status: u16, detail: String },

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[cfg(feature = "kokoro")]
    #[error("engine error: {0}")]
    Engine(String),
}

pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// A speech synthesis backend.
#[async_trait]
pub trait SpeechBackend: Send + Sync {
    /// Short name used in logs and configuration.
    fn name(&self) -> &str;

    /// Lightweight reachability check.
    async fn probe(&self) -> BackendResult<()>;

    /// Enumerate the speakers this backend offers.
    async fn speakers(&self) -> BackendResult<Vec<SpeakerProfile>>;

    /// Synthesize one request into encoded audio bytes.
    async fn synthesize(&self, request: &SynthesisRequest) -> BackendResult<Vec<u8>>;
}

/// Ordered list of backends; the first success wins.
pub struct BackendChain {
    backends: Vec<Arc<dyn SpeechBackend>>,
    call_timeout: Duration,
}

impl BackendChain {
    /// Create a chain from backends in priority order.
    pub fn new(backends: Vec<Arc<dyn SpeechBackend>>, call_timeout: Duration) -> Self {
        Self { backends, call_timeout }
    }

    /// Names of the backends in priority order.
    pub fn names(&self) -> Vec<&str> {
        self.backends.iter().map(|b| b.name()).collect()
    }

    /// Probe every backend, drop the unreachable ones, and fetch the speaker roster.
    ///
    /// The roster comes from the first reachable backend that declares at least one speaker.
    ///
    /// # Errors
    /// Returns `BackendError::Unreachable` if no configured backend answers.
    pub async fn initialize(&mut self) -> BackendResult<SpeakerRoster> {
        let mut reachable: Vec<Arc<dyn SpeechBackend>> = Vec::new();
        let mut failures = Vec::new();

        for backend in &self.backends {
            match backend.probe().await {
                Ok(()) => {
                    info!("✅ Backend '{}' is reachable", backend.name());
                    reachable.push(backend.clone());
                }
                Err(e) => {
                    warn!("Backend '{}' is not reachable: {}", backend.name(), e);
                    failures.push(format!("{}: {}", backend.name(), e));
                }
            }
        }

        if reachable.is_empty() {
            return Err(BackendError::Unreachable(if failures.is_empty() { "no backend configured".to_string() } else { failures.join("; ") }));
        }

        self.backends = reachable;

        for backend in &self.backends {
            match backend.speakers().await {
                Ok(speakers) if !speakers.is_empty() => {
                    info!("Using {} speaker(s) from backend '{}'", speakers.len(), backend.name());
                    return Ok(SpeakerRoster::new(speakers));
                }
                Ok(_) => warn!("Backend '{}' declares no speakers", backend.name()),
                Err(e) => warn!("Failed to list speakers from '{}': {}", backend.name(), e),
            }
        }

        Ok(SpeakerRoster::default())
    }

    /// Re-probe before a run; succeeds if any backend answers.
    pub async fn ensure_reachable(&self) -> BackendResult<()> {
        let mut failures = Vec::new();
        for backend in &self.backends {
            match backend.probe().await {
                Ok(()) => return Ok(()),
                Err(e) => failures.push(format!("{}: {}", backend.name(), e)),
            }
        }
        Err(BackendError::Unreachable(if failures.is_empty() { "no backend configured".to_string() } else { failures.join("; ") }))
    }

    /// Synthesize with fallback: each backend gets one bounded attempt in order.
    ///
    /// # Errors
    /// Returns the last backend's error when every backend fails.
    pub async fn synthesize(&self, request: &SynthesisRequest) -> BackendResult<Vec<u8>> {
        let mut last_error = BackendError::Unreachable("no backend configured".to_string());

        for backend in &self.backends {
            debug!("Trying backend '{}'", backend.name());
            let result = match tokio::time::timeout(self.call_timeout, backend.synthesize(request)).await {
                Ok(result) => result,
                Err(_) => Err(BackendError::Timeout(self.call_timeout)),
            };

            match result {
                Ok(audio) if audio.is_empty() => {
                    warn!("Backend '{}' returned no audio", backend.name());
                    last_error = BackendError::InvalidResponse(format!("{} returned an empty body", backend.name()));
                }
                Ok(audio) => return Ok(audio),
                Err(e) => {
                    warn!("Backend '{}' failed: {}", backend.name(), e);
                    last_error = e;
                }
            }
        }

        Err(last_error)
    }
}

#[cfg(test)]
pub(crate) mod mock {
    //! Scripted in-memory backend for pipeline tests.

    use std::sync::atomic::{AtomicUsize, Ordering};

    use parking_lot::Mutex;

    use super::*;
    use crate::script::SpeakerKey;

    /// Backend whose behaviour is decided per request text.
    pub struct MockBackend {
        pub name: String,
        pub reachable: bool,
        pub speakers: Vec<SpeakerProfile>,
        /// Requests whose text contains this marker fail.
        pub fail_marker: Option<String>,
        pub delay: Option<Duration>,
        /// Returns the audio bytes for a successful request.
        pub render: fn(&SynthesisRequest) -> Vec<u8>,
        pub calls: AtomicUsize,
        pub seen: Mutex<Vec<String>>,
    }

    impl MockBackend {
        pub fn new(name: &str) -> Self {
            Self {
                name: name.to_string(),
                reachable: true,
                speakers: vec![SpeakerProfile::for_voice(SpeakerKey::A, "mock-a"), SpeakerProfile::for_voice(SpeakerKey::B, "mock-b")],
                fail_marker: None,
                delay: None,
                render: |request| request.text.as_bytes().to_vec(),
                calls: AtomicUsize::new(0),
                seen: Mutex::new(Vec::new()),
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SpeechBackend for MockBackend {
        fn name(&self) -> &str {
            &self.name
        }

        async fn probe(&self) -> BackendResult<()> {
            if self.reachable { Ok(()) } else { Err(BackendError::Unreachable(format!("{} is down", self.name))) }
        }

        async fn speakers(&self) -> BackendResult<Vec<SpeakerProfile>> {
            Ok(self.speakers.clone())
        }

        async fn synthesize(&self, request: &SynthesisRequest) -> BackendResult<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().push(request.text.clone());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if !self.reachable {
                return Err(BackendError::Unreachable(format!("{} is down", self.name)));
            }
            if self.fail_marker.as_deref().is_some_and(|m| request.text.contains(m)) {
                return Err(BackendError::Status { status: 500, detail: "scripted failure".to_string() });
            }
            Ok((self.render)(request))
        }
    }
}

//! Application configuration and CLI argument parsing.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::voices;
use crate::tts::{AudioSettings, CloudVoices, GOOGLE_TTS_URL};

/// Synthesis backend variants, tried in the order given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Local COEIROINK-compatible engine over HTTP
    Engine,
    /// Google Cloud Text-to-Speech
    Cloud,
    /// Offline Kokoro model (requires the `kokoro` feature)
    Kokoro,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Engine => write!(f, "engine"),
            BackendKind::Cloud => write!(f, "cloud"),
            BackendKind::Kokoro => write!(f, "kokoro"),
        }
    }
}

/// Hardware acceleration provider for the offline ONNX model.
/// Auto-detected based on platform if not specified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// CPU inference (default fallback, always available)
    #[default]
    Cpu,
    /// NVIDIA CUDA acceleration (Linux only, requires CUDA toolkit)
    Cuda,
    /// Apple CoreML acceleration (macOS only, uses Neural Engine)
    #[value(name = "coreml")]
    CoreMl,
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_sherpa_provider())
    }
}

impl Provider {
    /// Convert to sherpa-rs provider string.
    pub fn as_sherpa_provider(&self) -> &'static str {
        match self {
            Provider::Cpu => "cpu",
            Provider::Cuda => "cuda",
            Provider::CoreMl => "coreml",
        }
    }
}

/// Voice dialogue application configuration.
#[derive(Parser, Debug, Clone, Serialize, Deserialize)]
#[command(name = "voice-dialogue")]
#[command(author, version, about = "Synthesize a two-speaker dialogue script into one audio file", long_about = None)]
pub struct AppConfig {
    /// List the speakers of the active backend and exit
    #[arg(long)]
    pub list_speakers: bool,

    /// List the offline Kokoro voices and exit
    #[arg(long)]
    pub list_voices: bool,

    /// Show detailed information about a specific Kokoro voice and exit
    #[arg(long)]
    pub voice_info: Option<String>,

    /// Dialogue script to synthesize
    #[arg(long, short = 's', env = "SCRIPT_PATH", default_value = "text.txt")]
    pub script: PathBuf,

    /// Directory receiving the combined audio files (created on demand)
    #[arg(long, short = 'o', env = "AUDIO_OUTPUT_DIR", default_value = "audio_output")]
    pub output_dir: PathBuf,

    /// Directory for per-line temporary clips (defaults to the system temp dir)
    #[arg(long, env = "AUDIO_TEMP_DIR")]
    pub temp_dir: Option<PathBuf>,

    /// Backends to use, in fallback order (comma separated)
    #[arg(long, short = 'b', value_enum, value_delimiter = ',', default_value = "engine")]
    pub backends: Vec<BackendKind>,

    /// Base URL of the local synthesis engine
    #[arg(long, short = 'u', env = "COEIROINK_BASE_URL", default_value = "http://localhost:50032")]
    pub engine_url: String,

    /// Engine executable to start and supervise (optional)
    #[arg(long, env = "COEIROINK_EXECUTABLE")]
    pub engine_executable: Option<PathBuf>,

    /// Seconds to wait for a supervised engine to answer
    #[arg(long, default_value = "15")]
    pub engine_startup_timeout: u64,

    /// Per-line synthesis timeout in seconds
    #[arg(long, short = 't', env = "COEIROINK_TIMEOUT", default_value = "30")]
    pub synthesis_timeout: u64,

    /// Reachability probe timeout in seconds
    #[arg(long, default_value = "5")]
    pub probe_timeout: u64,

    /// Output sample rate requested from the backends
    #[arg(long, default_value = "44100")]
    pub sample_rate: u32,

    /// Style id requested for [男性] lines (defaults to the speaker's first style)
    #[arg(long)]
    pub style_a: Option<i64>,

    /// Style id requested for [女性] lines (defaults to the speaker's first style)
    #[arg(long)]
    pub style_b: Option<i64>,

    /// Google Cloud Text-to-Speech API key
    #[arg(long, env = "GOOGLE_TTS_API_KEY", hide_env_values = true)]
    pub cloud_api_key: Option<String>,

    /// Cloud API base URL
    #[arg(long, default_value = GOOGLE_TTS_URL)]
    pub cloud_url: String,

    /// Cloud voice language code
    #[arg(long, default_value = "ja-JP")]
    pub cloud_language: String,

    /// Cloud voice for [男性] lines
    #[arg(long, default_value = "ja-JP-Wavenet-C")]
    pub cloud_voice_a: String,

    /// Cloud voice for [女性] lines
    #[arg(long, default_value = "ja-JP-Wavenet-A")]
    pub cloud_voice_b: String,

    /// Directory containing the offline Kokoro model files
    #[arg(long, short = 'd', env = "MODEL_DIR", default_value_os_t = default_model_dir())]
    pub model_dir: PathBuf,

    /// Kokoro voice for [男性] lines
    #[arg(long, default_value = "jm_kumo")]
    pub kokoro_voice_a: String,

    /// Kokoro voice for [女性] lines
    #[arg(long, default_value = "jf_alpha")]
    pub kokoro_voice_b: String,

    /// Hardware acceleration provider for Kokoro (auto-detected if not specified)
    #[arg(long, value_enum)]
    pub tts_provider: Option<Provider>,

    /// Kokoro threads (0 = auto-detect based on CPU cores)
    #[arg(long, default_value = "0")]
    pub tts_threads: usize,

    /// Serve the HTTP interface instead of running once
    #[arg(long)]
    pub serve: bool,

    /// Address the HTTP interface listens on
    #[arg(long, default_value = "0.0.0.0:8001")]
    pub listen: String,

    /// Enable verbose logging
    #[arg(long, short = 'v')]
    pub verbose: bool,
}

impl AppConfig {
    /// Parse configuration from command line arguments.
    pub fn from_args() -> Self {
        let mut config = Self::parse();

        // Handle voice listing commands
        if config.list_voices {
            voices::print_voices();
            std::process::exit(0);
        }

        if let Some(ref voice_name) = config.voice_info {
            match voices::print_voice_info(voice_name) {
                Ok(_) => std::process::exit(0),
                Err(e) => {
                    eprintln!("Error: {}", e);
                    std::process::exit(1);
                }
            }
        }

        config.normalize_thread_counts();
        config
    }

    /// Auto-detect the Kokoro thread count.
    ///
    /// With CUDA a single thread is used because the GPU handles parallelism;
    /// on CPU, cores/3 leaves headroom for the HTTP server and audio work.
    fn normalize_thread_counts(&mut self) {
        if self.tts_threads == 0 {
            self.tts_threads = if self.effective_tts_provider() == Provider::Cuda { 1 } else { (num_cpus::get() / 3).max(1) };
        }
    }

    /// Get the effective Kokoro provider.
    pub fn effective_tts_provider(&self) -> Provider {
        self.tts_provider.unwrap_or_else(detect_provider)
    }

    pub fn uses_backend(&self, kind: BackendKind) -> bool {
        self.backends.contains(&kind)
    }

    pub fn synthesis_timeout(&self) -> Duration {
        Duration::from_secs(self.synthesis_timeout)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout)
    }

    pub fn engine_startup_timeout(&self) -> Duration {
        Duration::from_secs(self.engine_startup_timeout)
    }

    /// Fixed audio-output settings sent with every request.
    pub fn audio_settings(&self) -> AudioSettings {
        AudioSettings { sample_rate: self.sample_rate, ..AudioSettings::default() }
    }

    /// Cloud voice selection.
    pub fn cloud_voices(&self) -> CloudVoices {
        CloudVoices { language_code: self.cloud_language.clone(), speaker_a: self.cloud_voice_a.clone(), speaker_b: self.cloud_voice_b.clone() }
    }

    /// Port of the engine URL, used when starting a supervised engine.
    pub fn engine_port(&self) -> Option<u16> {
        reqwest::Url::parse(&self.engine_url).ok()?.port_or_known_default()
    }

    /// Get the Kokoro model directory.
    #[cfg(feature = "kokoro")]
    pub fn kokoro_dir(&self) -> PathBuf {
        self.model_dir.join("tts").join("kokoro-multi-lang-v1_0")
    }

    /// Get the path to the Kokoro TTS model.
    #[cfg(feature = "kokoro")]
    pub fn tts_model_path(&self) -> PathBuf {
        self.kokoro_dir().join("model.onnx")
    }

    /// Get the path to the Kokoro voices.bin file.
    #[cfg(feature = "kokoro")]
    pub fn tts_voices_path(&self) -> PathBuf {
        self.kokoro_dir().join("voices.bin")
    }

    /// Get the path to the TTS tokens file.
    #[cfg(feature = "kokoro")]
    pub fn tts_tokens_path(&self) -> PathBuf {
        self.kokoro_dir().join("tokens.txt")
    }

    /// Get the path to the espeak-ng data directory.
    #[cfg(feature = "kokoro")]
    pub fn tts_data_dir(&self) -> PathBuf {
        self.kokoro_dir().join("espeak-ng-data")
    }

    /// Get the path to the TTS dict directory (for Chinese segmentation).
    #[cfg(feature = "kokoro")]
    pub fn tts_dict_dir(&self) -> PathBuf {
        self.kokoro_dir().join("dict")
    }

    /// Lexicon files for the [男性] voice's language; empty for languages driven by espeak-ng.
    #[cfg(feature = "kokoro")]
    pub fn tts_lexicon(&self) -> String {
        let dir = self.kokoro_dir();
        match voices::get_voice(&self.kokoro_voice_a).map(|v| v.espeak_code) {
            Some("en-us") => dir.join("lexicon-us-en.txt").to_string_lossy().to_string(),
            Some("en-gb") => dir.join("lexicon-gb-en.txt").to_string_lossy().to_string(),
            Some("cmn") => format!("{},{}", dir.join("lexicon-us-en.txt").to_string_lossy(), dir.join("lexicon-zh.txt").to_string_lossy()),
            _ => String::new(),
        }
    }

    /// espeak-ng language for voices without a lexicon.
    #[cfg(feature = "kokoro")]
    pub fn tts_language(&self) -> &'static str {
        match voices::get_voice(&self.kokoro_voice_a).map(|v| v.espeak_code) {
            Some("en-us") | Some("en-gb") | Some("cmn") | None => "",
            Some(code) => code,
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.backends.is_empty() {
            anyhow::bail!("At least one backend must be configured");
        }

        if self.synthesis_timeout == 0 || self.probe_timeout == 0 {
            anyhow::bail!("Timeouts must be positive");
        }

        if self.sample_rate == 0 {
            anyhow::bail!("Sample rate must be positive");
        }

        if self.uses_backend(BackendKind::Engine) && !self.engine_url.starts_with("http") {
            anyhow::bail!("Engine URL must be an http(s) URL: {}", self.engine_url);
        }

        if self.uses_backend(BackendKind::Cloud) && self.cloud_api_key.as_deref().is_none_or(|k| k.trim().is_empty()) {
            anyhow::bail!("The cloud backend requires --cloud-api-key or GOOGLE_TTS_API_KEY");
        }

        if self.uses_backend(BackendKind::Kokoro) {
            for name in [&self.kokoro_voice_a, &self.kokoro_voice_b] {
                if voices::get_voice(name).is_none() {
                    anyhow::bail!("Unknown Kokoro voice '{}'. Run with --list-voices to see available voices", name);
                }
            }
        }

        Ok(())
    }

    /// Log the current configuration.
    pub fn log_config(&self) {
        info!("Configuration:");
        info!("  Script: {}", self.script.display());
        info!("  Output directory: {}", self.output_dir.display());
        info!("  Backends: {}", self.backends.iter().map(|b| b.to_string()).collect::<Vec<_>>().join(" -> "));
        if self.uses_backend(BackendKind::Engine) {
            info!("  Engine URL: {}", self.engine_url);
        }
        if self.uses_backend(BackendKind::Cloud) {
            info!("  Cloud voices: {} / {} ({})", self.cloud_voice_a, self.cloud_voice_b, self.cloud_language);
        }
        if self.uses_backend(BackendKind::Kokoro) {
            info!("  Kokoro voices: {} / {} ({} provider, {} threads)", self.kokoro_voice_a, self.kokoro_voice_b, self.effective_tts_provider(), self.tts_threads);
        }
        info!("  Synthesis timeout: {}s", self.synthesis_timeout);
        info!("  Sample rate: {} Hz", self.sample_rate);
    }
}

/// Get the default model directory (~/.voice-dialogue/models).
fn default_model_dir() -> PathBuf {
    if let Some(home_dir) = dirs::home_dir() { home_dir.join(".voice-dialogue").join("models") } else { PathBuf::from("models") }
}

/// Auto-detect the best hardware acceleration provider.
fn detect_provider() -> Provider {
    #[cfg(target_os = "macos")]
    {
        Provider::CoreMl
    }

    #[cfg(target_os = "linux")]
    {
        if has_nvidia_gpu() { Provider::Cuda } else { Provider::Cpu }
    }

    #[cfg(not(any(target_os = "macos", target_os = "linux")))]
    {
        Provider::Cpu
    }
}

/// Check if an NVIDIA GPU is available (Linux only).
#[cfg(target_os = "linux")]
fn has_nvidia_gpu() -> bool {
    use std::path::Path;

    ["/dev/nvidia0", "/dev/nvidiactl", "/dev/nvhost-ctrl", "/etc/nv_tegra_release"].iter().any(|p| Path::new(p).exists())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> AppConfig {
        let mut argv = vec!["voice-dialogue"];
        argv.extend_from_slice(args);
        AppConfig::parse_from(argv)
    }

    #[test]
    fn test_defaults() {
        let config = parse(&[]);
        assert_eq!(config.backends, vec![BackendKind::Engine]);
        assert_eq!(config.synthesis_timeout(), Duration::from_secs(30));
        assert_eq!(config.audio_settings().sample_rate, 44100);
        assert_eq!(config.engine_port(), Some(50032));
    }

    #[test]
    fn test_backend_fallback_order() {
        let config = parse(&["--backends", "engine,cloud,kokoro"]);
        assert_eq!(config.backends, vec![BackendKind::Engine, BackendKind::Cloud, BackendKind::Kokoro]);
    }

    #[test]
    fn test_cloud_requires_api_key() {
        let config = parse(&["--backends", "cloud", "--cloud-api-key", " "]);
        assert!(config.validate().is_err());
        let config = parse(&["--backends", "cloud", "--cloud-api-key", "abc"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_kokoro_voice_is_rejected() {
        let config = parse(&["--backends", "kokoro", "--kokoro-voice-a", "nobody"]);
        assert!(config.validate().is_err());
    }

    #[cfg(feature = "kokoro")]
    #[test]
    fn test_kokoro_language_from_voice() {
        let config = parse(&["--kokoro-voice-a", "jm_kumo"]);
        assert_eq!(config.tts_language(), "ja");
        assert_eq!(config.tts_lexicon(), "");
        let config = parse(&["--kokoro-voice-a", "am_adam"]);
        assert_eq!(config.tts_language(), "");
        assert!(config.tts_lexicon().ends_with("lexicon-us-en.txt"));
    }

    #[test]
    fn test_engine_port_parsing() {
        let config = parse(&["--engine-url", "http://127.0.0.1:9000/"]);
        assert_eq!(config.engine_port(), Some(9000));
        let config = parse(&["--engine-url", "http://engine.local"]);
        assert_eq!(config.engine_port(), Some(80));
        let config = parse(&["--engine-url", "http://user:pw@engine.local:50100"]);
        assert_eq!(config.engine_port(), Some(50100));
        let config = parse(&["--engine-url", "not a url"]);
        assert_eq!(config.engine_port(), None);
    }
}

//! Configuration for reflecta.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (REFLECTA_HOME, REFLECTA_BACKEND_URL)
//! 2. Config file (.reflecta/config.yaml)
//! 3. Defaults (~/.reflecta)
//!
//! Config file discovery:
//! - Searches current directory and parents for .reflecta/config.yaml
//! - Paths in config file are relative to the config file's parent directory
//!
//! API keys are never read from the config file; they come from the
//! environment (REFLECTA_API_KEY, REFLECTA_BACKEND_KEY) at client build time.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<std::result::Result<ResolvedConfig, String>> = OnceLock::new();

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub models: Option<ModelsConfig>,
    #[serde(default)]
    pub backend: Option<BackendConfig>,
    #[serde(default)]
    pub timeouts: Option<TimeoutsConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// State directory (relative to config file)
    pub home: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelsConfig {
    pub api_base: Option<String>,
    pub primary: Option<String>,
    pub fallback: Option<String>,
    /// Fine-tuned methodology model; the primary tier uses it when set
    pub methodology: Option<String>,
    pub vision: Option<String>,
    pub speech: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    pub base_url: Option<String>,
    pub probe_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimeoutsConfig {
    pub transcription_seconds: Option<u64>,
    pub vision_seconds: Option<u64>,
    pub coaching_seconds: Option<u64>,
    pub persistence_seconds: Option<u64>,
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Absolute path to reflecta home (queue and local state)
    pub home: PathBuf,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
    pub models: ModelSettings,
    pub backend: BackendSettings,
    pub timeouts: StageTimeouts,
}

#[derive(Debug, Clone)]
pub struct ModelSettings {
    pub api_base: String,
    pub primary: String,
    pub fallback: String,
    pub methodology: Option<String>,
    pub vision: String,
    pub speech: String,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            api_base: "https://api.openai.com/v1".to_string(),
            primary: "gpt-4o".to_string(),
            fallback: "gpt-4o-mini".to_string(),
            methodology: None,
            vision: "gpt-4o".to_string(),
            speech: "whisper-1".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BackendSettings {
    pub base_url: String,
    pub probe_url: String,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api".to_string(),
            probe_url: "http://localhost:8080/api/health".to_string(),
        }
    }
}

/// One bounded timeout per external stage; expiry is handled as a transient
/// network failure by the pipeline
#[derive(Debug, Clone, Copy)]
pub struct StageTimeouts {
    pub transcription_seconds: u64,
    pub vision_seconds: u64,
    pub coaching_seconds: u64,
    pub persistence_seconds: u64,
}

impl Default for StageTimeouts {
    fn default() -> Self {
        Self {
            transcription_seconds: 60,
            vision_seconds: 30,
            coaching_seconds: 30,
            persistence_seconds: 30,
        }
    }
}

impl StageTimeouts {
    pub fn transcription(&self) -> Duration {
        Duration::from_secs(self.transcription_seconds)
    }

    pub fn vision(&self) -> Duration {
        Duration::from_secs(self.vision_seconds)
    }

    pub fn coaching(&self) -> Duration {
        Duration::from_secs(self.coaching_seconds)
    }

    pub fn persistence(&self) -> Duration {
        Duration::from_secs(self.persistence_seconds)
    }
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".reflecta").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the config file's parent
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

fn resolve_models(file: Option<&ModelsConfig>) -> ModelSettings {
    let defaults = ModelSettings::default();
    match file {
        Some(m) => ModelSettings {
            api_base: m.api_base.clone().unwrap_or(defaults.api_base),
            primary: m.primary.clone().unwrap_or(defaults.primary),
            fallback: m.fallback.clone().unwrap_or(defaults.fallback),
            methodology: m.methodology.clone(),
            vision: m.vision.clone().unwrap_or(defaults.vision),
            speech: m.speech.clone().unwrap_or(defaults.speech),
        },
        None => defaults,
    }
}

fn resolve_backend(file: Option<&BackendConfig>) -> BackendSettings {
    let defaults = BackendSettings::default();
    let base_url = std::env::var("REFLECTA_BACKEND_URL")
        .ok()
        .or_else(|| file.and_then(|b| b.base_url.clone()))
        .unwrap_or(defaults.base_url);

    let probe_url = file
        .and_then(|b| b.probe_url.clone())
        .unwrap_or_else(|| format!("{}/health", base_url.trim_end_matches('/')));

    BackendSettings {
        base_url,
        probe_url,
    }
}

fn resolve_timeouts(file: Option<&TimeoutsConfig>) -> StageTimeouts {
    let defaults = StageTimeouts::default();
    match file {
        Some(t) => StageTimeouts {
            transcription_seconds: t
                .transcription_seconds
                .unwrap_or(defaults.transcription_seconds),
            vision_seconds: t.vision_seconds.unwrap_or(defaults.vision_seconds),
            coaching_seconds: t.coaching_seconds.unwrap_or(defaults.coaching_seconds),
            persistence_seconds: t
                .persistence_seconds
                .unwrap_or(defaults.persistence_seconds),
        },
        None => defaults,
    }
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(".reflecta");

    let config_file = find_config_file();

    let (home, models, backend, timeouts) = if let Some(ref config_path) = config_file {
        let config = load_config_file(config_path)?;

        let home = if let Ok(env_home) = std::env::var("REFLECTA_HOME") {
            PathBuf::from(env_home)
        } else if let Some(ref home_path) = config.paths.home {
            // home is relative to the .reflecta/ directory
            let reflecta_dir = config_path.parent().unwrap_or(Path::new("."));
            resolve_path(reflecta_dir, home_path)
        } else {
            default_home.clone()
        };

        (
            home,
            resolve_models(config.models.as_ref()),
            resolve_backend(config.backend.as_ref()),
            resolve_timeouts(config.timeouts.as_ref()),
        )
    } else {
        let home = std::env::var("REFLECTA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_home.clone());

        (
            home,
            resolve_models(None),
            resolve_backend(None),
            resolve_timeouts(None),
        )
    };

    Ok(ResolvedConfig {
        home,
        config_file,
        models,
        backend,
        timeouts,
    })
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| e.to_string()));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

/// Force reload configuration (useful for testing)
pub fn reload_config() -> Result<ResolvedConfig> {
    load_config()
}

/// Get the reflecta home directory (queue and local state)
pub fn reflecta_home() -> Result<PathBuf> {
    Ok(config()?.home.clone())
}

/// Get the pending-action queue path ($REFLECTA_HOME/pending_actions.jsonl)
pub fn queue_path() -> Result<PathBuf> {
    Ok(config()?.home.join("pending_actions.jsonl"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_config_file_parsing() {
        let temp = TempDir::new().unwrap();
        let reflecta_dir = temp.path().join(".reflecta");
        std::fs::create_dir_all(&reflecta_dir).unwrap();

        let config_path = reflecta_dir.join("config.yaml");
        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(
            file,
            r#"
version: "1.0"
paths:
  home: ./
models:
  primary: gpt-4o
  methodology: ft:reflection-coach-v2
backend:
  base_url: https://backend.example.com/api
timeouts:
  coaching_seconds: 15
"#
        )
        .unwrap();

        let config = load_config_file(&config_path).unwrap();
        assert_eq!(config.version, "1.0");
        assert_eq!(config.paths.home, Some("./".to_string()));

        let models = resolve_models(config.models.as_ref());
        assert_eq!(models.primary, "gpt-4o");
        assert_eq!(
            models.methodology,
            Some("ft:reflection-coach-v2".to_string())
        );
        // Unset fields fall back to defaults
        assert_eq!(models.speech, "whisper-1");

        let timeouts = resolve_timeouts(config.timeouts.as_ref());
        assert_eq!(timeouts.coaching_seconds, 15);
        assert_eq!(timeouts.transcription_seconds, 60);
    }

    #[test]
    fn test_probe_url_derived_from_base() {
        let backend = BackendConfig {
            base_url: Some("https://backend.example.com/api/".to_string()),
            probe_url: None,
        };
        // Only meaningful when REFLECTA_BACKEND_URL is unset in the test env
        if std::env::var("REFLECTA_BACKEND_URL").is_err() {
            let resolved = resolve_backend(Some(&backend));
            assert_eq!(
                resolved.probe_url,
                "https://backend.example.com/api/health"
            );
        }
    }

    #[test]
    fn test_default_timeouts() {
        let t = StageTimeouts::default();
        assert_eq!(t.transcription(), Duration::from_secs(60));
        assert_eq!(t.coaching(), Duration::from_secs(30));
    }

    #[test]
    fn test_resolve_relative_path() {
        let base = PathBuf::from("/home/user/project");

        assert_eq!(
            resolve_path(&base, "/absolute/path"),
            PathBuf::from("/absolute/path")
        );
        assert_eq!(
            resolve_path(&base, "../sibling"),
            PathBuf::from("/home/user/project/../sibling")
        );
    }
}

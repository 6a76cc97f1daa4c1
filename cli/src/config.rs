use crate::api::DEFAULT_API_BASE;
use crate::types::DEFAULT_LANGUAGE;
use anyhow::{anyhow, Context, Result};
use directories::ProjectDirs;
use serde::Deserialize;
use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

const CONFIG_FILE_NAME: &str = "config.toml";
const ENV_CONFIG_PATH: &str = "SONGSMITH_CONFIG_PATH";
const ENV_API_KEY: &str = "OPENAI_API_KEY";
const ENV_API_BASE: &str = "OPENAI_BASE_URL";
const ENV_MODEL: &str = "SONGSMITH_MODEL";
const ENV_OPENAI_MODEL: &str = "OPENAI_MODEL";
const ENV_OUTPUT_DIR: &str = "SONGSMITH_OUTPUT_DIR";
const ENV_TIMEOUT: &str = "SONGSMITH_TIMEOUT_SECONDS";

pub const DEFAULT_MODEL: &str = "gpt-5-mini";
pub const DEFAULT_TEMPO_BPM: u32 = 120;

#[derive(Debug, Clone)]
pub struct AppConfig {
    api_key: Option<String>,
    api_base: String,
    model: String,
    output_dir: PathBuf,
    request_timeout_seconds: u64,
    beats_per_chord: u32,
    default_tempo_bpm: u32,
    language: String,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        let path = match config_file_override() {
            Some(path) => Some(path),
            None => Self::default_config_path().ok(),
        };
        if let Some(path) = path.filter(|path| path.exists()) {
            let partial = read_partial(&path)?;
            config.apply_partial(partial);
        }

        config.apply_env()?;
        Ok(config)
    }

    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    pub fn beats_per_chord(&self) -> u32 {
        self.beats_per_chord
    }

    pub fn default_tempo_bpm(&self) -> u32 {
        self.default_tempo_bpm
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("com", "Songsmith", "songsmith")
            .ok_or_else(|| anyhow!("unable to determine config directory"))
    }

    pub fn default_config_path() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.config_dir().join(CONFIG_FILE_NAME))
    }

    fn apply_partial(&mut self, partial: PartialConfig) {
        if let Some(base) = partial.api_base {
            self.api_base = base;
        }
        if let Some(model) = partial.model {
            self.model = model;
        }
        if let Some(dir) = partial.output_dir {
            self.output_dir = dir;
        }
        if let Some(timeout) = partial.request_timeout_seconds {
            self.request_timeout_seconds = timeout;
        }
        if let Some(beats) = partial.beats_per_chord.filter(|beats| *beats > 0) {
            self.beats_per_chord = beats;
        }
        if let Some(tempo) = partial.default_tempo_bpm.filter(|bpm| *bpm > 0) {
            self.default_tempo_bpm = tempo;
        }
        if let Some(language) = partial.language {
            self.language = language;
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(key) = env_value(ENV_API_KEY) {
            self.api_key = Some(key);
        }
        if let Some(base) = env_value(ENV_API_BASE) {
            self.api_base = base;
        }
        if let Some(model) = env_value(ENV_MODEL).or_else(|| env_value(ENV_OPENAI_MODEL)) {
            self.model = model;
        }
        if let Some(dir) = env_value(ENV_OUTPUT_DIR) {
            self.output_dir = PathBuf::from(dir);
        }
        if let Some(value) = env_value(ENV_TIMEOUT) {
            self.request_timeout_seconds = value
                .parse::<u64>()
                .context("SONGSMITH_TIMEOUT_SECONDS must be a whole number of seconds")?;
        }
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: DEFAULT_API_BASE.into(),
            model: DEFAULT_MODEL.into(),
            output_dir: PathBuf::from("songs"),
            request_timeout_seconds: 120,
            beats_per_chord: 2,
            default_tempo_bpm: DEFAULT_TEMPO_BPM,
            language: DEFAULT_LANGUAGE.into(),
        }
    }
}

fn env_value(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn config_file_override() -> Option<PathBuf> {
    let value = env::var_os(ENV_CONFIG_PATH).filter(|value| !value.is_empty())?;
    let path = PathBuf::from(value);
    if path.is_dir() {
        return Some(path.join(CONFIG_FILE_NAME));
    }
    Some(path)
}

fn read_partial(path: &Path) -> Result<PartialConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    let partial: PartialConfig =
        toml::from_str(&contents).with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(partial)
}

#[derive(Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
struct PartialConfig {
    api_base: Option<String>,
    model: Option<String>,
    output_dir: Option<PathBuf>,
    request_timeout_seconds: Option<u64>,
    beats_per_chord: Option<u32>,
    default_tempo_bpm: Option<u32>,
    language: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_values_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(
            &path,
            r#"
model = "gpt-4.1-mini"
output_dir = "/tmp/lyrics"
beats_per_chord = 4
default_tempo_bpm = 0
"#,
        )
        .unwrap();

        let mut config = AppConfig::default();
        config.apply_partial(read_partial(&path).unwrap());

        assert_eq!(config.model(), "gpt-4.1-mini");
        assert_eq!(config.output_dir(), Path::new("/tmp/lyrics"));
        assert_eq!(config.beats_per_chord(), 4);
        assert_eq!(config.default_tempo_bpm(), DEFAULT_TEMPO_BPM);
        assert_eq!(config.api_base(), DEFAULT_API_BASE);
        assert_eq!(config.request_timeout(), Duration::from_secs(120));
    }

    #[test]
    fn unknown_keys_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "api_key = \"sk-should-not-live-here\"\n").unwrap();
        assert!(read_partial(&path).is_err());
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = AppConfig::default();
        assert_eq!(config.model(), DEFAULT_MODEL);
        assert_eq!(config.output_dir(), Path::new("songs"));
        assert_eq!(config.language(), "English");
        assert!(config.api_key().is_none());
    }
}

use anyhow::{anyhow, Context, Result};
use directories::ProjectDirs;
use serde::Deserialize;
use std::{
    env, fs,
    path::{Path, PathBuf},
};

const CONFIG_FILE_NAME: &str = "config.toml";
const ENV_CONFIG_PATH: &str = "PROMPTMIDI_CONFIG_PATH";
const ENV_API_BASE: &str = "PROMPTMIDI_API_BASE";
const ENV_API_KEY: &str = "OPENAI_API_KEY";
const ENV_MODEL: &str = "PROMPTMIDI_MODEL";
const ENV_MIDI_DIR: &str = "PROMPTMIDI_MIDI_DIR";
const ENV_DATABASE: &str = "PROMPTMIDI_DATABASE";

pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1/";
pub const DEFAULT_MODEL: &str = "gpt-4o";
const DEFAULT_MIDI_DIR: &str = "./midi";
const DEFAULT_DATABASE: &str = "piano_compositions.db";

#[derive(Debug, Clone)]
pub struct AppConfig {
    api_base: String,
    api_key: Option<String>,
    model: String,
    midi_dir: PathBuf,
    database_path: PathBuf,
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

        config.apply_env();
        Ok(config)
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn midi_dir(&self) -> &Path {
        &self.midi_dir
    }

    pub fn database_path(&self) -> &Path {
        &self.database_path
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("com", "Promptmidi", "Promptmidi")
            .ok_or_else(|| anyhow!("unable to determine config directory"))?;
        Ok(dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    fn apply_partial(&mut self, partial: PartialConfig) {
        if let Some(base) = partial.api_base {
            self.api_base = base;
        }
        if let Some(key) = partial.api_key {
            self.api_key = Some(key);
        }
        if let Some(model) = partial.model {
            self.model = model;
        }
        if let Some(dir) = partial.midi_dir {
            self.midi_dir = dir;
        }
        if let Some(path) = partial.database_path {
            self.database_path = path;
        }
    }

    fn apply_env(&mut self) {
        self.apply_vars(|name| env::var(name).ok());
    }

    fn apply_vars(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |name| lookup(name).filter(|value: &String| !value.trim().is_empty());
        if let Some(value) = non_empty(ENV_API_BASE) {
            self.api_base = value;
        }
        if let Some(value) = non_empty(ENV_API_KEY) {
            self.api_key = Some(value);
        }
        if let Some(value) = non_empty(ENV_MODEL) {
            self.model = value;
        }
        if let Some(value) = non_empty(ENV_MIDI_DIR) {
            self.midi_dir = PathBuf::from(value);
        }
        if let Some(value) = non_empty(ENV_DATABASE) {
            self.database_path = PathBuf::from(value);
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.into(),
            api_key: None,
            model: DEFAULT_MODEL.into(),
            midi_dir: PathBuf::from(DEFAULT_MIDI_DIR),
            database_path: PathBuf::from(DEFAULT_DATABASE),
        }
    }
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
    parse_partial(&contents).with_context(|| format!("failed to parse {}", path.display()))
}

fn parse_partial(contents: &str) -> Result<PartialConfig> {
    Ok(toml::from_str(contents)?)
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct PartialConfig {
    api_base: Option<String>,
    api_key: Option<String>,
    model: Option<String>,
    midi_dir: Option<PathBuf>,
    database_path: Option<PathBuf>,
}

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context};
use serde::Deserialize;
use url::Url;

use crate::profiles::PROFILE_TABLE;

pub const DEFAULT_SETTINGS_FILE: &str = "profile_sync.toml";
const SESSION_FILE_NAME: &str = "session.json";
const DATA_DIR_NAME: &str = "profile_sync";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub profile_table: String,
    pub data_dir: Option<PathBuf>,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            supabase_url: "http://127.0.0.1:54321".into(),
            supabase_anon_key: String::new(),
            profile_table: PROFILE_TABLE.into(),
            data_dir: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    supabase_url: Option<String>,
    supabase_anon_key: Option<String>,
    profile_table: Option<String>,
    data_dir: Option<PathBuf>,
}

impl ClientSettings {
    /// Base URL without a trailing slash, after checking it parses.
    pub fn validated_url(&self) -> anyhow::Result<String> {
        let url = Url::parse(self.supabase_url.trim())
            .with_context(|| format!("invalid supabase url '{}'", self.supabase_url))?;
        if !matches!(url.scheme(), "http" | "https") {
            bail!("supabase url must be http(s), got '{}'", url.scheme());
        }
        Ok(url.as_str().trim_end_matches('/').to_string())
    }

    pub fn resolve_data_dir(&self) -> anyhow::Result<PathBuf> {
        if let Some(dir) = &self.data_dir {
            return Ok(dir.clone());
        }
        if let Some(dir) = dirs::data_dir() {
            return Ok(dir.join(DATA_DIR_NAME));
        }
        match std::env::var("HOME") {
            Ok(home) if !home.trim().is_empty() => {
                Ok(PathBuf::from(home).join(format!(".{DATA_DIR_NAME}")))
            }
            _ => bail!("no per-user data directory available; set APP__DATA_DIR"),
        }
    }

    pub fn session_file(&self) -> anyhow::Result<PathBuf> {
        Ok(self.resolve_data_dir()?.join(SESSION_FILE_NAME))
    }
}

/// Defaults, then `profile_sync.toml` in the working directory if there is
/// one, then the environment.
pub fn load_settings() -> anyhow::Result<ClientSettings> {
    load_settings_at(Path::new(DEFAULT_SETTINGS_FILE), false)
}

/// Like [`load_settings`] with an explicitly named file, which has to exist.
pub fn load_settings_from(path: &Path) -> anyhow::Result<ClientSettings> {
    load_settings_at(path, true)
}

fn load_settings_at(path: &Path, required: bool) -> anyhow::Result<ClientSettings> {
    let mut settings = ClientSettings::default();

    match fs::read_to_string(path) {
        Ok(raw) => {
            let file_cfg = toml::from_str::<FileSettings>(&raw)
                .with_context(|| format!("invalid settings file {}", path.display()))?;
            apply_file_settings(&mut settings, file_cfg);
        }
        Err(err) if !required && err.kind() == io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "no settings file; using defaults");
        }
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to read settings file {}", path.display()));
        }
    }

    apply_env_overrides(&mut settings, |name| std::env::var(name).ok());
    Ok(settings)
}

fn apply_file_settings(settings: &mut ClientSettings, file_cfg: FileSettings) {
    if let Some(v) = file_cfg.supabase_url {
        settings.supabase_url = v;
    }
    if let Some(v) = file_cfg.supabase_anon_key {
        settings.supabase_anon_key = v;
    }
    if let Some(v) = file_cfg.profile_table {
        settings.profile_table = v;
    }
    if let Some(v) = file_cfg.data_dir {
        settings.data_dir = Some(v);
    }
}

fn apply_env_overrides(settings: &mut ClientSettings, var: impl Fn(&str) -> Option<String>) {
    if let Some(v) = var("SUPABASE_URL") {
        settings.supabase_url = v;
    }
    if let Some(v) = var("APP__SUPABASE_URL") {
        settings.supabase_url = v;
    }

    if let Some(v) = var("SUPABASE_ANON_KEY") {
        settings.supabase_anon_key = v;
    }
    if let Some(v) = var("APP__SUPABASE_ANON_KEY") {
        settings.supabase_anon_key = v;
    }

    if let Some(v) = var("APP__PROFILE_TABLE") {
        settings.profile_table = v;
    }

    if let Some(v) = var("APP__DATA_DIR") {
        if !v.trim().is_empty() {
            settings.data_dir = Some(PathBuf::from(v));
        }
    }
}

use super::EngineConfig;
use crate::error::{ConfigError, Result};
use anyhow::Context;
use directories::UserDirs;
use std::fs;
use std::path::{Path, PathBuf};

/// Points at an explicit config file; a leading `~` is expanded.
pub const CONFIG_ENV_VAR: &str = "REWOO_ENGINE_CONFIG";

impl EngineConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(ConfigError::from)?;
        let mut config: EngineConfig = toml::from_str(&contents).map_err(|error| {
            ConfigError::Load(format!("{}: {}", path.display(), error.message()))
        })?;
        config.config_path = Some(path.to_path_buf());
        config.validate()?;
        Ok(config)
    }

    /// `$REWOO_ENGINE_CONFIG`, then `~/.rewoo-engine/config.toml`, then
    /// built-in defaults. Environment overrides apply on top.
    pub fn load_or_default() -> Result<Self> {
        let mut config = match Self::resolve_config_path() {
            Some(path) if path.exists() => Self::load(&path)?,
            _ => Self::default(),
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(ConfigError::from)?;
        }
        let toml_str = self.to_toml()?;
        fs::write(path, toml_str).map_err(ConfigError::from)?;
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .context("Failed to serialize config")
            .map_err(Into::into)
    }

    fn resolve_config_path() -> Option<PathBuf> {
        if let Ok(raw) = std::env::var(CONFIG_ENV_VAR)
            && !raw.trim().is_empty()
        {
            let expanded = shellexpand::tilde(raw.trim());
            return Some(PathBuf::from(expanded.as_ref()));
        }

        UserDirs::new().map(|dirs| dirs.home_dir().join(".rewoo-engine").join("config.toml"))
    }
}

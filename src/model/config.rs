use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::model::mode::ShellMode;

const DEFAULTS: &str = include_str!("../../config/default.toml");

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub general: GeneralConfig,
    pub catalog: CatalogConfig,
    pub runtime: RuntimeConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneralConfig {
    pub base_dir: String,
    pub plugin_dir: String,
    pub log_dir: String,
    pub dependencies_dir: String,
    pub window_title: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogConfig {
    pub url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RuntimeConfig {
    /// Program used for `.py` plugins.
    pub python: String,
    /// Program used for `.ps1` plugins.
    pub shell: String,
    #[serde(default)]
    pub shell_mode: ShellMode,
}

/// Directories resolved once at startup and handed to the core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    pub base_dir: PathBuf,
    pub plugin_dir: PathBuf,
    pub log_dir: PathBuf,
    pub dependencies_dir: PathBuf,
}

impl AppPaths {
    pub fn all(&self) -> [&Path; 4] {
        [
            &self.base_dir,
            &self.plugin_dir,
            &self.log_dir,
            &self.dependencies_dir,
        ]
    }
}

impl AppConfig {
    /// Load configuration with layering: defaults → user config.
    ///
    /// `explicit` must exist when given; the platform config file is optional.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let user_path = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => default_config_path().filter(|path| path.exists()),
        };

        let user = match user_path {
            Some(path) => Some(
                fs::read_to_string(&path)
                    .with_context(|| format!("reading config {}", path.display()))?,
            ),
            None => None,
        };

        Self::from_layers(user.as_deref())
    }

    pub fn from_layers(user: Option<&str>) -> Result<Self> {
        let mut merged: toml::Value = toml::from_str(DEFAULTS).context("parsing built-in defaults")?;

        if let Some(user) = user {
            let overlay: toml::Value = toml::from_str(user).context("parsing user config")?;
            merge(&mut merged, overlay);
        }

        let config: AppConfig = merged.try_into().context("invalid configuration")?;
        Ok(config)
    }

    pub fn paths(&self) -> Result<AppPaths> {
        let base_dir = if self.general.base_dir.trim().is_empty() {
            default_base_dir()?
        } else {
            expand_tilde(&self.general.base_dir)?
        };

        let under_base = |value: &str| -> Result<PathBuf> {
            let path = expand_tilde(value)?;
            Ok(if path.is_absolute() {
                path
            } else {
                base_dir.join(path)
            })
        };

        Ok(AppPaths {
            plugin_dir: under_base(&self.general.plugin_dir)?,
            log_dir: under_base(&self.general.log_dir)?,
            dependencies_dir: under_base(&self.general.dependencies_dir)?,
            base_dir,
        })
    }
}

/// Overlay `overlay` onto `base`, recursing into tables.
fn merge(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base), toml::Value::Table(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "plughost")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

fn default_base_dir() -> Result<PathBuf> {
    directories::ProjectDirs::from("", "", "plughost")
        .map(|dirs| dirs.data_local_dir().to_path_buf())
        .ok_or_else(|| anyhow!("cannot determine local data directory"))
}

fn expand_tilde(value: &str) -> Result<PathBuf> {
    if !value.starts_with('~') {
        return Ok(PathBuf::from(value));
    }

    let home = directories::BaseDirs::new()
        .map(|dirs| dirs.home_dir().to_path_buf())
        .ok_or_else(|| anyhow!("cannot determine home directory"))?;
    Ok(PathBuf::from(value.replacen('~', &home.to_string_lossy(), 1)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_parse() {
        let config = AppConfig::from_layers(None).unwrap();
        assert_eq!(config.general.plugin_dir, "plugins");
        assert_eq!(config.catalog.timeout_secs, 10);
        assert_eq!(config.runtime.python, "python");
        assert_eq!(config.runtime.shell, "powershell");
        assert_eq!(config.runtime.shell_mode, ShellMode::Captured);
    }

    #[test]
    fn user_layer_overrides_single_keys() {
        let config = AppConfig::from_layers(Some(
            "[runtime]\npython = \"python3\"\nshell_mode = \"interactive\"\n",
        ))
        .unwrap();
        assert_eq!(config.runtime.python, "python3");
        assert_eq!(config.runtime.shell, "powershell");
        assert_eq!(config.runtime.shell_mode, ShellMode::Interactive);
        assert_eq!(config.catalog.timeout_secs, 10);
    }

    #[test]
    fn bad_user_layer_is_an_error() {
        assert!(AppConfig::from_layers(Some("[catalog]\ntimeout_secs = \"ten\"\n")).is_err());
        assert!(AppConfig::from_layers(Some("not = [valid")).is_err());
    }

    #[test]
    fn relative_dirs_resolve_under_base() {
        let base = tempfile::tempdir().unwrap();
        let user = format!(
            "[general]\nbase_dir = {:?}\nlog_dir = {:?}\n",
            base.path().display().to_string(),
            base.path().join("elsewhere").display().to_string()
        );
        let paths = AppConfig::from_layers(Some(&user)).unwrap().paths().unwrap();

        assert_eq!(paths.base_dir, base.path());
        assert_eq!(paths.plugin_dir, base.path().join("plugins"));
        assert_eq!(paths.dependencies_dir, base.path().join("dependencies"));
        assert_eq!(paths.log_dir, base.path().join("elsewhere"));
    }

    #[test]
    fn explicit_config_file_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        assert!(AppConfig::load(Some(&dir.path().join("missing.toml"))).is_err());

        let path = dir.path().join("config.toml");
        fs::write(&path, "[catalog]\nurl = \"http://localhost/lib.json\"\n").unwrap();
        let config = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(config.catalog.url, "http://localhost/lib.json");
    }
}

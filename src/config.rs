use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::constants::{DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_ROOT};
use crate::error::{Error, Result};

/// Explicit settings passed into every entry point of the core.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Settings {
    /// Root of the declarative tree (`providers/`, `catalog/` live below it).
    #[serde(default = "default_root")]
    pub root: PathBuf,
    /// Allows the best-effort heuristics: provider guessing and prefix
    /// matching of config files. Off means exact lookups only.
    #[serde(default)]
    pub dev_mode: bool,
    /// Directories holding the live server configuration files.
    #[serde(default)]
    pub conf_dirs: Vec<PathBuf>,
    /// Forces exact config-file lookup even in dev mode.
    #[serde(default)]
    pub strict_file_match: bool,
    #[serde(default)]
    pub remote: RemoteSettings,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RemoteSettings {
    pub user: Option<String>,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub sudo: bool,
}

fn default_root() -> PathBuf {
    PathBuf::from(DEFAULT_ROOT)
}

fn default_timeout() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_SECS
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            user: None,
            timeout_secs: default_timeout(),
            sudo: false,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            root: default_root(),
            dev_mode: false,
            conf_dirs: Vec::new(),
            strict_file_match: false,
            remote: RemoteSettings::default(),
        }
    }
}

impl Settings {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    /// Reads a settings file. A missing file yields the defaults; relative
    /// paths inside the file are taken relative to the file's directory.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).map_err(|e| Error::io("settings", "read", path, e))?;
        let mut settings: Settings = serde_yaml::from_str(&content).map_err(|source| Error::Document {
            path: path.to_path_buf(),
            source,
        })?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        settings.root = anchor(base, &settings.root);
        settings.conf_dirs = settings.conf_dirs.iter().map(|d| anchor(base, d)).collect();
        Ok(settings)
    }

    /// Whether config files may be matched by prefix when no exact name exists.
    pub fn allows_fuzzy_file_match(&self) -> bool {
        self.dev_mode && !self.strict_file_match
    }
}

fn anchor(base: &Path, p: &Path) -> PathBuf {
    if p.is_absolute() { p.to_path_buf() } else { base.join(p) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let settings = Settings::load("/nonexistent/vhostctl.yml").unwrap();
        assert_eq!(settings, Settings::default());
        assert!(!settings.allows_fuzzy_file_match());
    }

    #[test]
    fn test_relative_paths_anchor_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vhostctl.yml");
        fs::write(
            &path,
            "root: state\ndev_mode: true\nconf_dirs: [sites-enabled, /etc/nginx/conf.d]\nremote:\n  user: deploy\n",
        )
        .unwrap();

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.root, dir.path().join("state"));
        assert_eq!(
            settings.conf_dirs,
            vec![dir.path().join("sites-enabled"), PathBuf::from("/etc/nginx/conf.d")]
        );
        assert_eq!(settings.remote.user.as_deref(), Some("deploy"));
        assert_eq!(settings.remote.timeout_secs, DEFAULT_CONNECT_TIMEOUT_SECS);
        assert!(settings.allows_fuzzy_file_match());
    }

    #[test]
    fn test_malformed_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vhostctl.yml");
        fs::write(&path, "dev_mode: [").unwrap();
        assert!(matches!(Settings::load(&path), Err(Error::Document { .. })));
    }
}

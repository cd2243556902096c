//! Configuration file resolution with global fallback.
//!
//! Resolves the configuration location using a deterministic priority order:
//!
//! 1. `--config` flag (explicit path or `http(s)` URL)
//! 2. `{project}/.sops-check.yaml`, `.sops-check.yml` or `.sops-check.toml`
//! 3. `~/.sops-check/config.yaml` (global fallback)
//! 4. No config found

use sops_check_core::is_url;
use std::path::{Path, PathBuf};

/// Where the configuration was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Explicitly specified via `--config` flag.
    Explicit(PathBuf),
    /// Explicitly specified via `--config` flag as a URL.
    Remote(String),
    /// Found in the checked directory.
    Project(PathBuf),
    /// Loaded from the global config directory (`~/.sops-check/`).
    Global(PathBuf),
    /// No config found.
    Default,
}

impl ConfigSource {
    /// Returns the resolved local path, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Explicit(p) | Self::Project(p) | Self::Global(p) => Some(p),
            Self::Remote(_) | Self::Default => None,
        }
    }

    /// Returns `true` if the config was loaded from the global directory.
    #[must_use]
    pub fn is_global(&self) -> bool {
        matches!(self, Self::Global(_))
    }
}

/// Project-level config file names, checked in order.
pub const PROJECT_CONFIG_NAMES: &[&str] = &[".sops-check.yaml", ".sops-check.yml", ".sops-check.toml"];

/// Config file name within the global config directory.
const GLOBAL_CONFIG_NAME: &str = "config.yaml";

/// Resolves the configuration location.
///
/// See module-level docs for resolution order.
#[must_use]
pub fn resolve(project_dir: &Path, explicit: Option<&str>) -> ConfigSource {
    resolve_inner(project_dir, explicit, global_config_dir())
}

/// Testable core: accepts `global_dir` as parameter to avoid env var races.
fn resolve_inner(
    project_dir: &Path,
    explicit: Option<&str>,
    global_dir: Option<PathBuf>,
) -> ConfigSource {
    if let Some(location) = explicit {
        if is_url(location) {
            return ConfigSource::Remote(location.to_string());
        }
        return ConfigSource::Explicit(PathBuf::from(location));
    }

    for name in PROJECT_CONFIG_NAMES {
        let candidate = project_dir.join(name);
        if candidate.exists() {
            tracing::debug!("Found project config: {}", candidate.display());
            return ConfigSource::Project(candidate);
        }
    }

    if let Some(dir) = global_dir {
        let candidate = dir.join(GLOBAL_CONFIG_NAME);
        if candidate.exists() {
            tracing::debug!("Found global config: {}", candidate.display());
            return ConfigSource::Global(candidate);
        }
    }

    ConfigSource::Default
}

/// Returns the global config directory path.
///
/// Resolution: `$SOPS_CHECK_CONFIG_DIR` > `~/.sops-check/`
#[must_use]
pub fn global_config_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var("SOPS_CHECK_CONFIG_DIR") {
        return Some(PathBuf::from(dir));
    }
    home::home_dir().map(|h| h.join(".sops-check"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn explicit_takes_priority_over_project() {
        let tmp = TempDir::new().unwrap();
        let explicit = tmp.path().join("policy.yaml");
        fs::write(&explicit, "").unwrap();
        fs::write(tmp.path().join(".sops-check.yaml"), "").unwrap();

        let result = resolve_inner(tmp.path(), explicit.to_str(), None);
        assert_eq!(result, ConfigSource::Explicit(explicit));
    }

    #[test]
    fn explicit_does_not_check_existence() {
        let result = resolve_inner(Path::new("/tmp"), Some("/nonexistent.yaml"), None);
        assert_eq!(
            result,
            ConfigSource::Explicit(PathBuf::from("/nonexistent.yaml"))
        );
    }

    #[test]
    fn explicit_url_is_remote() {
        let url = "https://config.example.com/sops-check.yaml";
        let result = resolve_inner(Path::new("/tmp"), Some(url), None);
        assert_eq!(result, ConfigSource::Remote(url.to_string()));
        assert!(result.path().is_none());
    }

    #[test]
    fn project_configs_found_in_order() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(".sops-check.toml"), "").unwrap();
        assert_eq!(
            resolve_inner(tmp.path(), None, None),
            ConfigSource::Project(tmp.path().join(".sops-check.toml"))
        );

        fs::write(tmp.path().join(".sops-check.yml"), "").unwrap();
        assert_eq!(
            resolve_inner(tmp.path(), None, None),
            ConfigSource::Project(tmp.path().join(".sops-check.yml"))
        );

        fs::write(tmp.path().join(".sops-check.yaml"), "").unwrap();
        assert_eq!(
            resolve_inner(tmp.path(), None, None),
            ConfigSource::Project(tmp.path().join(".sops-check.yaml"))
        );
    }

    #[test]
    fn global_fallback_when_no_project_config() {
        let project = TempDir::new().unwrap();
        let global = TempDir::new().unwrap();
        fs::write(global.path().join("config.yaml"), "").unwrap();

        let result = resolve_inner(project.path(), None, Some(global.path().to_path_buf()));
        assert_eq!(
            result,
            ConfigSource::Global(global.path().join("config.yaml"))
        );
        assert!(result.is_global());
    }

    #[test]
    fn global_skipped_when_project_config_exists() {
        let project = TempDir::new().unwrap();
        fs::write(project.path().join(".sops-check.yaml"), "").unwrap();

        let global = TempDir::new().unwrap();
        fs::write(global.path().join("config.yaml"), "").unwrap();

        let result = resolve_inner(project.path(), None, Some(global.path().to_path_buf()));
        assert!(matches!(result, ConfigSource::Project(_)));
    }

    #[test]
    fn no_config_anywhere_returns_default() {
        let project = TempDir::new().unwrap();
        let global = TempDir::new().unwrap();

        let result = resolve_inner(project.path(), None, Some(global.path().to_path_buf()));
        assert_eq!(result, ConfigSource::Default);
        assert!(result.path().is_none());
    }
}

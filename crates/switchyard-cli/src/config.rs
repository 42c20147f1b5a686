//! Dispatch settings – reads/writes `~/.switchyard/config.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use switchyard_dispatch::{DEFAULT_MAX_DEPTH, DEFAULT_PRIORITY};
use switchyard_types::SwitchyardError;

/// Persisted configuration stored in `~/.switchyard/config.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Priority given to chain members that do not specify one.
    #[serde(default = "default_priority")]
    pub default_priority: i32,

    /// How many chains may be nested within a single dispatch.
    #[serde(default = "default_max_depth")]
    pub max_dispatch_depth: usize,

    /// Colour terminal output.
    #[serde(default = "default_color")]
    pub color: bool,
}

fn default_priority() -> i32 {
    DEFAULT_PRIORITY
}
fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}
fn default_color() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_priority: default_priority(),
            max_dispatch_depth: default_max_depth(),
            color: default_color(),
        }
    }
}

/// Return the path to `~/.switchyard/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".switchyard").join("config.toml")
}

/// Load the config from `path`, applying `SWITCHYARD_*` environment
/// overrides.  Returns `None` if the file does not exist.
pub fn load_from(path: &Path) -> Result<Option<Config>, SwitchyardError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).map_err(|e| {
        SwitchyardError::Config(format!("failed to read {}: {e}", path.display()))
    })?;
    let mut cfg: Config = toml::from_str(&raw)
        .map_err(|e| SwitchyardError::Config(format!("failed to parse {}: {e}", path.display())))?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Load the config from `path`, or the defaults (with environment
/// overrides) when the file is absent.
pub fn load_or_default(path: &Path) -> Result<Config, SwitchyardError> {
    match load_from(path)? {
        Some(cfg) => Ok(cfg),
        None => {
            let mut cfg = Config::default();
            apply_env_overrides(&mut cfg);
            Ok(cfg)
        }
    }
}

/// Apply `SWITCHYARD_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `SWITCHYARD_DEFAULT_PRIORITY` | `default_priority` |
/// | `SWITCHYARD_MAX_DEPTH` | `max_dispatch_depth` |
/// | `SWITCHYARD_COLOR` | `color` (`true`/`false`) |
///
/// Values that fail to parse are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    apply_overrides(cfg, |key| std::env::var(key).ok());
}

pub(crate) fn apply_overrides(cfg: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("SWITCHYARD_DEFAULT_PRIORITY")
        && let Ok(priority) = v.trim().parse::<i32>()
    {
        cfg.default_priority = priority;
    }
    if let Some(v) = lookup("SWITCHYARD_MAX_DEPTH")
        && let Ok(depth) = v.trim().parse::<usize>()
    {
        cfg.max_dispatch_depth = depth;
    }
    if let Some(v) = lookup("SWITCHYARD_COLOR")
        && let Ok(color) = v.trim().parse::<bool>()
    {
        cfg.color = color;
    }
}

/// Save the config to `path`, creating the parent directory if necessary.
pub fn save_to(cfg: &Config, path: &Path) -> Result<(), SwitchyardError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            SwitchyardError::Config(format!("failed to create {}: {e}", parent.display()))
        })?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700)).map_err(|e| {
                SwitchyardError::Config(format!("failed to restrict {}: {e}", parent.display()))
            })?;
        }
    }
    let raw = toml::to_string_pretty(cfg)
        .map_err(|e| SwitchyardError::Config(format!("failed to serialize config: {e}")))?;
    fs::write(path, raw)
        .map_err(|e| SwitchyardError::Config(format!("failed to write {}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_dispatch_constants() {
        let cfg = Config::default();
        assert_eq!(cfg.default_priority, DEFAULT_PRIORITY);
        assert_eq!(cfg.max_dispatch_depth, DEFAULT_MAX_DEPTH);
        assert!(cfg.color);
    }

    #[test]
    fn config_path_points_to_switchyard_dir() {
        let p = config_path_for_home("/home/testuser");
        assert!(p.to_string_lossy().contains(".switchyard"));
        assert!(p.to_string_lossy().ends_with("config.toml"));
    }

    #[test]
    fn load_from_returns_none_when_missing() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        assert!(load_from(&path).expect("no error").is_none());
    }

    #[test]
    fn roundtrip_custom_config() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        let cfg = Config {
            default_priority: 7,
            max_dispatch_depth: 12,
            color: false,
        };
        save_to(&cfg, &path).expect("save");
        let raw = std::fs::read_to_string(&path).expect("read back");
        let loaded: Config = toml::from_str(&raw).expect("parse");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn missing_fields_take_defaults() {
        let cfg: Config = toml::from_str("default_priority = 4\n").expect("parse");
        assert_eq!(cfg.default_priority, 4);
        assert_eq!(cfg.max_dispatch_depth, DEFAULT_MAX_DEPTH);
        assert!(cfg.color);
    }

    #[test]
    fn malformed_file_is_a_config_error() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "default_priority = \"high\"").expect("write");
        assert!(matches!(load_from(&path), Err(SwitchyardError::Config(_))));
    }

    #[cfg(unix)]
    #[test]
    fn config_directory_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        save_to(&Config::default(), &path).expect("save");

        let parent = path.parent().expect("parent");
        let mode = std::fs::metadata(parent).expect("meta").permissions().mode() & 0o777;
        assert_eq!(mode, 0o700);
    }

    #[test]
    fn overrides_apply_parsed_values() {
        let mut cfg = Config::default();
        apply_overrides(
            &mut cfg,
            lookup(&[
                ("SWITCHYARD_DEFAULT_PRIORITY", "-5"),
                ("SWITCHYARD_MAX_DEPTH", "9"),
                ("SWITCHYARD_COLOR", "false"),
            ]),
        );
        assert_eq!(cfg.default_priority, -5);
        assert_eq!(cfg.max_dispatch_depth, 9);
        assert!(!cfg.color);
    }

    #[test]
    fn overrides_ignore_invalid_values() {
        let mut cfg = Config::default();
        apply_overrides(
            &mut cfg,
            lookup(&[
                ("SWITCHYARD_DEFAULT_PRIORITY", "urgent"),
                ("SWITCHYARD_MAX_DEPTH", "-1"),
                ("SWITCHYARD_COLOR", "maybe"),
            ]),
        );
        assert_eq!(cfg, Config::default());
    }
}

//! Configuration management for the live reload notifier.
//!
//! Parses `lr.toml` configuration files with serde and provides
//! auto-discovery of config files in parent directories.
//!
//! CLI settings can be applied during load via [`CliSettings`].
//!
//! ## Example
//!
//! ```toml
//! [project]
//! root = "."
//!
//! [live_reload]
//! enabled = true
//! port = 35729
//! filter_patterns = ['\.log$', '^tmp/']
//! ```
//!
//! ## Environment Variable Expansion
//!
//! `project.root` supports environment variable and home directory expansion:
//!
//! - `${VAR}` - expands to the value of VAR, errors if unset
//! - `${VAR:-default}` - expands to VAR if set, otherwise uses default
//! - `~` - expands to the current user's home directory

mod expand;

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// CLI settings that override configuration file values.
///
/// All fields are optional. Only non-None values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override project root directory.
    pub project_root: Option<PathBuf>,
    /// Override live reload enabled flag.
    pub live_reload_enabled: Option<bool>,
    /// Override live reload port.
    pub port: Option<u16>,
}

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "lr.toml";

/// Default live reload port, shared with the common browser extensions.
pub const DEFAULT_LIVE_RELOAD_PORT: u16 = 35729;

/// Application configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Project configuration (paths are relative strings from TOML).
    project: ProjectConfigRaw,
    /// Live reload configuration.
    pub live_reload: LiveReloadConfig,

    /// Resolved project configuration (set after loading).
    #[serde(skip)]
    pub project_resolved: ProjectConfig,
    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::default_with_base(Path::new("."))
    }
}

/// Raw project configuration as parsed from TOML (paths as strings).
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ProjectConfigRaw {
    root: Option<String>,
}

/// Resolved project configuration with absolute paths.
#[derive(Debug, Default)]
pub struct ProjectConfig {
    /// Directory that change paths are made relative to before filtering.
    pub root: PathBuf,
}

/// Live reload configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LiveReloadConfig {
    /// Whether live reload is enabled.
    pub enabled: bool,
    /// TCP port the notification server binds to.
    pub port: u16,
    /// Regular expressions for project-relative paths that never trigger a reload.
    pub filter_patterns: Vec<String>,
}

impl Default for LiveReloadConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: DEFAULT_LIVE_RELOAD_PORT,
            filter_patterns: Vec::new(),
        }
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
    /// Environment variable error during expansion.
    #[error("Environment variable error in {field}: {message}")]
    EnvVar {
        /// Config field path (e.g., "`project.root`").
        field: String,
        /// Error message (e.g., "${`PROJECT_DIR`} not set").
        message: String,
    },
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file.
    /// Otherwise, searches for `lr.toml` in current directory and parents.
    ///
    /// CLI settings are applied after loading and path resolution, allowing CLI
    /// arguments to take precedence over config file values.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist or parsing fails.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(discovered) = Self::discover_config() {
            Self::load_from_file(&discovered)?
        } else {
            Self::default_with_cwd()
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
            config.validate()?;
        }

        Ok(config)
    }

    /// Apply CLI settings to the configuration.
    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(root) = &settings.project_root {
            self.project_resolved.root.clone_from(root);
        }
        if let Some(enabled) = settings.live_reload_enabled {
            self.live_reload.enabled = enabled;
        }
        if let Some(port) = settings.port {
            self.live_reload.port = port;
        }
    }

    /// Search for config file in current directory and parents.
    fn discover_config() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;
        Self::discover_from(&current)
    }

    /// Search for config file starting at `start` and walking up to the root.
    fn discover_from(start: &Path) -> Option<PathBuf> {
        let mut current = start.to_path_buf();
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    /// Create default config with paths relative to current working directory.
    fn default_with_cwd() -> Self {
        let cwd = std::env::current_dir().unwrap_or_default();
        Self::default_with_base(&cwd)
    }

    /// Create default config with paths relative to given base directory.
    fn default_with_base(base: &Path) -> Self {
        Self {
            project: ProjectConfigRaw::default(),
            live_reload: LiveReloadConfig::default(),
            project_resolved: ProjectConfig {
                root: base.to_path_buf(),
            },
            config_path: None,
        }
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;

        // Expand environment variables before path resolution
        config.expand_env_vars()?;

        let config_dir = path.parent().unwrap_or(Path::new("."));
        config.resolve_paths(config_dir);
        config.config_path = Some(path.to_path_buf());

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// Called automatically after loading from file and after CLI overrides.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Port 0 asks the OS for a random port, which no browser client could find
        if self.live_reload.port == 0 {
            return Err(ConfigError::Validation(
                "live_reload.port cannot be 0".to_owned(),
            ));
        }

        if let Some(index) = self
            .live_reload
            .filter_patterns
            .iter()
            .position(|p| p.is_empty())
        {
            return Err(ConfigError::Validation(format!(
                "live_reload.filter_patterns[{index}] cannot be empty"
            )));
        }

        Ok(())
    }

    /// Expand environment variable references in configuration strings.
    fn expand_env_vars(&mut self) -> Result<(), ConfigError> {
        if let Some(ref root) = self.project.root {
            self.project.root = Some(expand::expand_env(root, "project.root")?);
        }
        Ok(())
    }

    /// Resolve relative paths to absolute paths based on config directory.
    fn resolve_paths(&mut self, config_dir: &Path) {
        let root = self
            .project
            .root
            .as_deref()
            .map_or_else(|| config_dir.to_path_buf(), |r| config_dir.join(r));

        self.project_resolved = ProjectConfig { root };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config() {
        let config = Config::default_with_base(Path::new("/test"));
        assert!(!config.live_reload.enabled);
        assert_eq!(config.live_reload.port, 35729);
        assert!(config.live_reload.filter_patterns.is_empty());
        assert_eq!(config.project_resolved.root, PathBuf::from("/test"));
        assert!(config.config_path.is_none());
    }

    #[test]
    fn test_parse_minimal_config() {
        let config: Config = toml::from_str("").unwrap();
        assert!(!config.live_reload.enabled);
        assert_eq!(config.live_reload.port, DEFAULT_LIVE_RELOAD_PORT);
    }

    #[test]
    fn test_parse_live_reload_config() {
        let toml = r#"
[live_reload]
enabled = true
port = 4200
filter_patterns = ['\.log$', "^tmp/"]
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert!(config.live_reload.enabled);
        assert_eq!(config.live_reload.port, 4200);
        assert_eq!(
            config.live_reload.filter_patterns,
            vec![r"\.log$".to_owned(), "^tmp/".to_owned()]
        );
    }

    #[test]
    fn test_resolve_paths_default_root_is_config_dir() {
        let mut config: Config = toml::from_str("").unwrap();
        config.resolve_paths(Path::new("/project"));

        assert_eq!(config.project_resolved.root, PathBuf::from("/project"));
    }

    #[test]
    fn test_resolve_paths_relative_root() {
        let toml = r#"
[project]
root = "app"
"#;
        let mut config: Config = toml::from_str(toml).unwrap();
        config.resolve_paths(Path::new("/project"));

        assert_eq!(config.project_resolved.root, PathBuf::from("/project/app"));
    }

    #[test]
    fn test_resolve_paths_absolute_root() {
        let toml = r#"
[project]
root = "/srv/site"
"#;
        let mut config: Config = toml::from_str(toml).unwrap();
        config.resolve_paths(Path::new("/project"));

        assert_eq!(config.project_resolved.root, PathBuf::from("/srv/site"));
    }

    #[test]
    fn test_apply_cli_settings_port() {
        let mut config = Config::default_with_base(Path::new("/test"));
        let overrides = CliSettings {
            port: Some(9000),
            ..Default::default()
        };

        config.apply_cli_settings(&overrides);

        assert_eq!(config.live_reload.port, 9000);
        assert!(!config.live_reload.enabled); // Unchanged
    }

    #[test]
    fn test_apply_cli_settings_live_reload() {
        let mut config = Config::default_with_base(Path::new("/test"));
        let overrides = CliSettings {
            live_reload_enabled: Some(true),
            ..Default::default()
        };

        config.apply_cli_settings(&overrides);

        assert!(config.live_reload.enabled);
    }

    #[test]
    fn test_apply_cli_settings_project_root() {
        let mut config = Config::default_with_base(Path::new("/test"));
        let overrides = CliSettings {
            project_root: Some(PathBuf::from("/custom")),
            ..Default::default()
        };

        config.apply_cli_settings(&overrides);

        assert_eq!(config.project_resolved.root, PathBuf::from("/custom"));
    }

    #[test]
    fn test_apply_cli_settings_empty() {
        let mut config = Config::default_with_base(Path::new("/test"));

        config.apply_cli_settings(&CliSettings::default());

        assert!(!config.live_reload.enabled);
        assert_eq!(config.live_reload.port, DEFAULT_LIVE_RELOAD_PORT);
        assert_eq!(config.project_resolved.root, PathBuf::from("/test"));
    }

    #[test]
    fn test_expand_env_vars_project_root() {
        // SAFETY: test runs single-threaded per test function
        unsafe {
            std::env::set_var("LR_TEST_PROJECT_ROOT", "/from/env");
        }

        let toml = r#"
[project]
root = "${LR_TEST_PROJECT_ROOT}/site"
"#;
        let mut config: Config = toml::from_str(toml).unwrap();
        config.expand_env_vars().unwrap();
        config.resolve_paths(Path::new("/project"));

        assert_eq!(
            config.project_resolved.root,
            PathBuf::from("/from/env/site")
        );

        // SAFETY: test runs single-threaded per test function
        unsafe {
            std::env::remove_var("LR_TEST_PROJECT_ROOT");
        }
    }

    #[test]
    fn test_expand_env_vars_missing_required_var() {
        let toml = r#"
[project]
root = "${LR_TEST_SURELY_UNSET_VAR}"
"#;
        let mut config: Config = toml::from_str(toml).unwrap();
        let err = config.expand_env_vars().unwrap_err();

        assert!(
            matches!(err, ConfigError::EnvVar { ref field, .. } if field == "project.root"),
            "Expected ConfigError::EnvVar, got {err:?}"
        );
        assert!(err.to_string().contains("LR_TEST_SURELY_UNSET_VAR"));
    }

    #[test]
    fn test_validate_default_config_passes() {
        let config = Config::default_with_base(Path::new("/test"));
        config.validate().unwrap();
    }

    #[test]
    fn test_validate_port_zero() {
        let mut config = Config::default_with_base(Path::new("/test"));
        config.live_reload.port = 0;

        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("live_reload.port"));
    }

    #[test]
    fn test_validate_empty_filter_pattern() {
        let mut config = Config::default_with_base(Path::new("/test"));
        config.live_reload.filter_patterns = vec![r"\.log$".to_owned(), String::new()];

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("filter_patterns[1]"));
    }

    #[test]
    fn test_load_explicit_path_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("lr.toml");

        let err = Config::load(Some(&missing), None).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(ref p) if *p == missing));
    }

    #[test]
    fn test_load_from_file_resolves_and_applies_cli() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lr.toml");
        std::fs::write(
            &path,
            r#"
[project]
root = "app"

[live_reload]
enabled = true
filter_patterns = ['\.swp$']
"#,
        )
        .unwrap();

        let overrides = CliSettings {
            port: Some(4000),
            ..Default::default()
        };
        let config = Config::load(Some(&path), Some(&overrides)).unwrap();

        assert!(config.live_reload.enabled);
        assert_eq!(config.live_reload.port, 4000);
        assert_eq!(config.project_resolved.root, dir.path().join("app"));
        assert_eq!(config.config_path, Some(path));
    }

    #[test]
    fn test_load_rejects_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lr.toml");
        std::fs::write(&path, "[live_reload\nenabled = true").unwrap();

        let err = Config::load(Some(&path), None).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_cli_port_zero_fails_validation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lr.toml");
        std::fs::write(&path, "").unwrap();

        let overrides = CliSettings {
            port: Some(0),
            ..Default::default()
        };
        let err = Config::load(Some(&path), Some(&overrides)).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_discover_from_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(dir.path().join("lr.toml"), "").unwrap();

        let found = Config::discover_from(&nested);
        assert_eq!(found, Some(dir.path().join("lr.toml")));
    }

    #[test]
    fn test_discover_prefers_nearest() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(dir.path().join("lr.toml"), "").unwrap();
        std::fs::write(nested.join("lr.toml"), "").unwrap();

        let found = Config::discover_from(&nested);
        assert_eq!(found, Some(nested.join("lr.toml")));
    }
}

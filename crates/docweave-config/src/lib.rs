//! Configuration management for docweave.
//!
//! Parses `docweave.toml` configuration files with serde and provides
//! auto-discovery of config files in parent directories.
//!
//! CLI settings can be applied during load via [`CliSettings`].
//!
//! ## Environment Variable Expansion
//!
//! `diagrams.kroki_url` supports environment variable expansion:
//!
//! - `${VAR}` - expands to the value of VAR, errors if unset
//! - `${VAR:-default}` - expands to VAR if set, otherwise uses default

mod expand;

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "docweave.toml";

/// Diagram kinds rendered when `diagrams.kinds` is not set.
pub const DEFAULT_DIAGRAM_KINDS: &[&str] = &[
    "plantuml",
    "c4plantuml",
    "mermaid",
    "graphviz",
    "ditaa",
    "blockdiag",
    "seqdiag",
    "actdiag",
    "nwdiag",
    "erd",
    "nomnoml",
    "svgbob",
    "vega",
    "vegalite",
    "wavedrom",
    "d2",
    "structurizr",
];

/// CLI settings that override configuration file values.
///
/// All fields are optional. Only non-None values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override docs source directory.
    pub source_dir: Option<PathBuf>,
    /// Override render service base URL.
    pub kroki_url: Option<String>,
    /// Override diagram cache enabled flag.
    pub cache_enabled: Option<bool>,
    /// Override default output format.
    pub default_format: Option<String>,
}

/// Application configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Documentation configuration (paths are relative strings from TOML).
    docs: DocsConfigRaw,
    /// Include resolution configuration.
    pub include: IncludeConfig,
    /// Diagram rendering configuration as parsed.
    diagrams: DiagramsConfigRaw,

    /// Resolved docs configuration (set after loading).
    #[serde(skip)]
    pub docs_resolved: DocsConfig,
    /// Resolved diagrams configuration (set after loading).
    #[serde(skip)]
    pub diagrams_resolved: DiagramsConfig,
    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::default_with_base(Path::new("."))
    }
}

/// Raw docs configuration as parsed from TOML (paths as strings).
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct DocsConfigRaw {
    source_dir: Option<String>,
}

/// Resolved documentation configuration with absolute paths.
#[derive(Debug, Default)]
pub struct DocsConfig {
    /// Root of the document store.
    pub source_dir: PathBuf,
    /// Project directory for docweave data (`.docweave/`).
    pub project_dir: PathBuf,
}

/// Include resolution configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct IncludeConfig {
    /// Maximum include nesting depth.
    pub max_depth: usize,
    /// Extension appended to include targets that have none.
    pub default_extension: String,
}

impl Default for IncludeConfig {
    fn default() -> Self {
        Self {
            max_depth: 30,
            default_extension: "adoc".to_owned(),
        }
    }
}

/// Raw diagrams configuration as parsed from TOML.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct DiagramsConfigRaw {
    kroki_url: Option<String>,
    default_format: Option<String>,
    timeout_secs: Option<u64>,
    kinds: Option<Vec<String>>,
    cache_enabled: Option<bool>,
    cache_max_items: Option<usize>,
    cache_file: Option<String>,
    allow_http: Option<bool>,
}

/// Resolved diagram rendering configuration.
#[derive(Debug)]
pub struct DiagramsConfig {
    /// Render service base URL.
    pub kroki_url: String,
    /// Output format used when a block does not set one (`svg` or `png`).
    pub default_format: String,
    /// Render request timeout.
    pub timeout: Duration,
    /// Diagram kinds that are rendered; others are left untouched.
    pub kinds: Vec<String>,
    /// Whether the diagram cache is loaded and saved.
    pub cache_enabled: bool,
    /// Maximum number of cached renders kept.
    pub cache_max_items: usize,
    /// Location of the persisted diagram cache.
    pub cache_file: PathBuf,
    /// Whether a plain `http://` render service is acceptable.
    pub allow_http: bool,
}

impl DiagramsConfig {
    fn default_with_project_dir(project_dir: &Path) -> Self {
        Self {
            kroki_url: "https://kroki.io".to_owned(),
            default_format: "svg".to_owned(),
            timeout: Duration::from_secs(30),
            kinds: DEFAULT_DIAGRAM_KINDS
                .iter()
                .map(|k| (*k).to_owned())
                .collect(),
            cache_enabled: true,
            cache_max_items: 500,
            cache_file: project_dir.join("diagram-cache.json"),
            allow_http: false,
        }
    }

    /// Check the render service URL scheme against `allow_http`.
    ///
    /// Callers must run this before sending any diagram source to the
    /// render service.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` for `http://` URLs when plain HTTP
    /// is not allowed.
    pub fn check_scheme(&self) -> Result<(), ConfigError> {
        if self.kroki_url.starts_with("http://") && !self.allow_http {
            return Err(ConfigError::Validation(
                "diagrams.kroki_url uses http:// but diagrams.allow_http is false".to_owned(),
            ));
        }
        Ok(())
    }
}

impl Default for DiagramsConfig {
    fn default() -> Self {
        Self::default_with_project_dir(Path::new(".docweave"))
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
        /// Config field path (e.g., "`diagrams.kroki_url`").
        field: String,
        /// Error message.
        message: String,
    },
}

fn require_non_empty(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

fn require_http_url(url: &str, field: &str) -> Result<(), ConfigError> {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ConfigError::Validation(format!(
            "{field} must start with http:// or https://"
        )));
    }
    Ok(())
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file.
    /// Otherwise, searches for `docweave.toml` in current directory and parents,
    /// falling back to defaults relative to the current directory.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist, parsing fails,
    /// or the resulting configuration is invalid.
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

    /// Parse configuration from TOML text, resolving paths against `base`.
    ///
    /// # Errors
    ///
    /// Returns error if parsing, env expansion or validation fails.
    pub fn from_toml_str(content: &str, base: &Path) -> Result<Self, ConfigError> {
        let mut config: Self = toml::from_str(content)?;
        config.expand_env_vars()?;
        config.resolve_paths(base);
        config.validate()?;
        Ok(config)
    }

    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(source_dir) = &settings.source_dir {
            self.docs_resolved.source_dir.clone_from(source_dir);
        }
        if let Some(kroki_url) = &settings.kroki_url {
            self.diagrams_resolved.kroki_url.clone_from(kroki_url);
        }
        if let Some(cache_enabled) = settings.cache_enabled {
            self.diagrams_resolved.cache_enabled = cache_enabled;
        }
        if let Some(format) = &settings.default_format {
            self.diagrams_resolved.default_format.clone_from(format);
        }
    }

    fn discover_config() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;
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

    fn default_with_cwd() -> Self {
        let cwd = std::env::current_dir().unwrap_or_default();
        Self::default_with_base(&cwd)
    }

    fn default_with_base(base: &Path) -> Self {
        let project_dir = base.join(".docweave");
        Self {
            docs: DocsConfigRaw::default(),
            include: IncludeConfig::default(),
            diagrams: DiagramsConfigRaw::default(),
            docs_resolved: DocsConfig {
                source_dir: base.join("docs"),
                project_dir: project_dir.clone(),
            },
            diagrams_resolved: DiagramsConfig::default_with_project_dir(&project_dir),
            config_path: None,
        }
    }

    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config_dir = path.parent().unwrap_or(Path::new("."));
        let mut config = Self::from_toml_str(&content, config_dir)?;
        config.config_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.include.max_depth == 0 {
            return Err(ConfigError::Validation(
                "include.max_depth must be greater than 0".to_owned(),
            ));
        }
        require_non_empty(&self.include.default_extension, "include.default_extension")?;
        self.validate_diagrams()
    }

    fn validate_diagrams(&self) -> Result<(), ConfigError> {
        let diagrams = &self.diagrams_resolved;

        require_non_empty(&diagrams.kroki_url, "diagrams.kroki_url")?;
        require_http_url(&diagrams.kroki_url, "diagrams.kroki_url")?;

        if !matches!(
            diagrams.default_format.to_ascii_lowercase().as_str(),
            "svg" | "png"
        ) {
            return Err(ConfigError::Validation(format!(
                "diagrams.default_format must be svg or png, got '{}'",
                diagrams.default_format
            )));
        }
        if diagrams.timeout.is_zero() {
            return Err(ConfigError::Validation(
                "diagrams.timeout_secs must be greater than 0".to_owned(),
            ));
        }
        if diagrams.cache_max_items == 0 {
            return Err(ConfigError::Validation(
                "diagrams.cache_max_items must be greater than 0".to_owned(),
            ));
        }
        Ok(())
    }

    fn expand_env_vars(&mut self) -> Result<(), ConfigError> {
        if let Some(url) = &self.diagrams.kroki_url {
            self.diagrams.kroki_url = Some(expand::expand_env(url, "diagrams.kroki_url")?);
        }
        Ok(())
    }

    /// Resolve relative paths and fill defaults for unset values.
    fn resolve_paths(&mut self, config_dir: &Path) {
        let project_dir = config_dir.join(".docweave");
        self.docs_resolved = DocsConfig {
            source_dir: config_dir.join(self.docs.source_dir.as_deref().unwrap_or("docs")),
            project_dir: project_dir.clone(),
        };

        let defaults = DiagramsConfig::default_with_project_dir(&project_dir);
        let raw = &self.diagrams;
        self.diagrams_resolved = DiagramsConfig {
            kroki_url: raw
                .kroki_url
                .clone()
                .unwrap_or(defaults.kroki_url)
                .trim_end_matches('/')
                .to_owned(),
            default_format: raw
                .default_format
                .clone()
                .unwrap_or(defaults.default_format),
            timeout: raw
                .timeout_secs
                .map_or(defaults.timeout, Duration::from_secs),
            kinds: raw
                .kinds
                .as_ref()
                .map(|kinds| kinds.iter().map(|k| k.to_ascii_lowercase()).collect())
                .unwrap_or(defaults.kinds),
            cache_enabled: raw.cache_enabled.unwrap_or(defaults.cache_enabled),
            cache_max_items: raw.cache_max_items.unwrap_or(defaults.cache_max_items),
            cache_file: raw
                .cache_file
                .as_ref()
                .map_or(defaults.cache_file, |f| config_dir.join(f)),
            allow_http: raw.allow_http.unwrap_or(defaults.allow_http),
        };
    }
}

// Application Configuration
//
// *La Configuration* (The Configuration) - Layered settings: defaults, the
// TOML file, environment variables, then command-line overrides.

use lerelais::{InferenceConfig, RelaisError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Default configuration file name, relative to the home directory
pub const DEFAULT_CONFIG_FILE: &str = ".dockerfileai.toml";

/// Application data directory, relative to the home directory
pub const DATA_DIR: &str = ".dockerfile_ai";

/// Output handling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Save the analysis text
    pub save_analysis: bool,

    /// Save the corrected Dockerfile when one was extracted
    pub save_dockerfile: bool,

    /// Output root; `~/.dockerfile_ai/output` when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,

    /// Print only the corrected Dockerfile
    pub copy_mode: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            save_analysis: true,
            save_dockerfile: true,
            output_dir: None,
            copy_mode: false,
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Console level (trace, debug, info, warn, error)
    pub level: String,

    /// Also append logs to a file
    pub file_logging: bool,

    /// Force debug level on the console
    pub verbose: bool,

    /// Log file; a dated file under `~/.dockerfile_ai` when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file_logging: false,
            verbose: false,
            log_file: None,
        }
    }
}

/// Prompt settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptConfig {
    /// File whose content replaces the built-in review template
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_file: Option<PathBuf>,
}

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Inference service connection and sampling
    pub ollama: InferenceConfig,

    /// Output handling
    pub output: OutputConfig,

    /// Logging
    pub logging: LoggingConfig,

    /// Prompt template
    pub prompt: PromptConfig,
}

/// Values supplied on the command line; `None` leaves the layered value alone
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigOverrides {
    /// Model to analyze with
    pub model: Option<String>,
    /// Copy mode
    pub copy_mode: Option<bool>,
    /// Save analysis and corrected Dockerfile
    pub save_results: Option<bool>,
    /// Verbose console logging
    pub verbose: Option<bool>,
}

/// `~/.dockerfileai.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(DEFAULT_CONFIG_FILE))
}

/// `~/.dockerfile_ai`, or a relative `.dockerfile_ai` without a home directory
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(DATA_DIR))
        .unwrap_or_else(|| PathBuf::from(DATA_DIR))
}

impl AppConfig {
    /// Load file and environment layers
    ///
    /// Reads `path`, or the default location when `None`. A missing file is
    /// not an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(path, |key| std::env::var(key).ok())
    }

    /// Load with an explicit environment lookup
    pub fn load_with_env<F>(path: Option<&Path>, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let path = path.map(Path::to_path_buf).or_else(default_config_path);
        let mut config = match path {
            Some(p) => Self::from_file(&p)?,
            None => Self::default(),
        };
        config.apply_env(env)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML file, or return defaults when it does not exist
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| {
            RelaisError::io("Failed to read config file", Some(path.to_path_buf()), e)
        })?;

        Self::from_toml(&content).map_err(|e| match e {
            RelaisError::Configuration { message, suggestion } => RelaisError::config_error(
                format!("Invalid TOML in config file {}: {}", path.display(), message),
                suggestion,
            ),
            other => other,
        })
    }

    /// Parse TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| {
            RelaisError::config_error(
                e.to_string(),
                Some("Run `dockerfile-ai config init` to write a fresh sample".to_string()),
            )
        })
    }

    /// Apply environment variables on top of the current values
    pub fn apply_env<F>(&mut self, env: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        if let Some(host) = lookup("OLLAMA_HOST") {
            self.ollama.host = host;
        }
        if let Some(port) = lookup("OLLAMA_PORT") {
            self.ollama.port = parse_env("OLLAMA_PORT", &port)?;
        }
        if let Some(model) = lookup("OLLAMA_MODEL") {
            self.ollama.model = model;
        }
        if let Some(timeout) = lookup("OLLAMA_TIMEOUT") {
            self.ollama.timeout = parse_env("OLLAMA_TIMEOUT", &timeout)?;
        }
        if let Some(temperature) = lookup("OLLAMA_TEMPERATURE") {
            self.ollama.temperature = parse_env("OLLAMA_TEMPERATURE", &temperature)?;
        }

        if let Some(save) = lookup("DOCKERFILE_AI_SAVE_ANALYSIS") {
            self.output.save_analysis = env_flag(&save);
        }
        if let Some(copy) = lookup("DOCKERFILE_AI_COPY_MODE") {
            self.output.copy_mode = env_flag(&copy);
        }
        if let Some(dir) = lookup("DOCKERFILE_AI_OUTPUT_DIR") {
            self.output.output_dir = Some(PathBuf::from(dir));
        }

        if let Some(level) = lookup("DOCKERFILE_AI_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(file) = lookup("DOCKERFILE_AI_LOG_FILE") {
            self.logging.log_file = Some(PathBuf::from(file));
            self.logging.file_logging = true;
        }

        Ok(())
    }

    /// Apply command-line overrides
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(model) = &overrides.model {
            self.ollama.model = model.clone();
        }
        if let Some(copy) = overrides.copy_mode {
            self.output.copy_mode = copy;
        }
        if let Some(save) = overrides.save_results {
            self.output.save_analysis = save;
            self.output.save_dockerfile = save;
        }
        if let Some(verbose) = overrides.verbose {
            self.logging.verbose = verbose;
        }
    }

    /// Validate every section
    pub fn validate(&self) -> Result<()> {
        self.ollama.validate()?;

        let level = self.logging.level.to_ascii_lowercase();
        if !matches!(
            level.as_str(),
            "trace" | "debug" | "info" | "warn" | "warning" | "error" | "critical"
        ) {
            return Err(RelaisError::config_error(
                format!("Unknown log level: {}", self.logging.level),
                Some("Use one of trace, debug, info, warn, error".to_string()),
            ));
        }

        Ok(())
    }

    /// Output root directory
    pub fn output_root(&self) -> PathBuf {
        self.output
            .output_dir
            .clone()
            .unwrap_or_else(|| data_dir().join("output"))
    }

    /// Write the configuration as TOML, creating parent directories
    pub fn save(&self, path: &Path) -> Result<PathBuf> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                RelaisError::io("Failed to create config directory", Some(parent.to_path_buf()), e)
            })?;
        }

        let toml_string = toml::to_string_pretty(self).map_err(|e| {
            RelaisError::config_error(format!("Failed to serialize configuration: {}", e), None)
        })?;

        fs::write(path, toml_string).map_err(|e| {
            RelaisError::io("Failed to write config file", Some(path.to_path_buf()), e)
        })?;

        Ok(path.to_path_buf())
    }
}

fn parse_env<T>(key: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e| {
        RelaisError::config_error(
            format!("Invalid value for {}: {:?} ({})", key, value, e),
            Some(format!("Unset {} or give it a numeric value", key)),
        )
    })
}

fn env_flag(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("true")
}

/// Commented sample configuration matching the defaults
pub fn sample_config() -> String {
    let defaults = AppConfig::default();
    format!(
        r#"# dockerfile-ai configuration
#
# Precedence: built-in defaults < this file < environment variables < CLI flags.

[ollama]
# Inference service address (OLLAMA_HOST, OLLAMA_PORT)
host = "{host}"
port = {port}
# Model used for analysis (OLLAMA_MODEL)
model = "{model}"
# Generate request timeout in seconds (OLLAMA_TIMEOUT)
timeout = {timeout}
# Sampling (OLLAMA_TEMPERATURE)
temperature = {temperature:?}
top_p = {top_p:?}
max_tokens = {max_tokens}

[output]
# DOCKERFILE_AI_SAVE_ANALYSIS
save_analysis = true
save_dockerfile = true
# Print only the corrected Dockerfile (DOCKERFILE_AI_COPY_MODE)
copy_mode = false
# Defaults to ~/.dockerfile_ai/output (DOCKERFILE_AI_OUTPUT_DIR)
# output_dir = "/path/to/output"

[logging]
# trace, debug, info, warn, error (DOCKERFILE_AI_LOG_LEVEL)
level = "info"
file_logging = false
verbose = false
# Defaults to ~/.dockerfile_ai/dockerfile_ai_YYYYMMDD.log (DOCKERFILE_AI_LOG_FILE)
# log_file = "/path/to/dockerfile_ai.log"

[prompt]
# Replace the built-in review instructions
# template_file = "/path/to/template.txt"
"#,
        host = defaults.ollama.host,
        port = defaults.ollama.port,
        model = defaults.ollama.model,
        timeout = defaults.ollama.timeout,
        temperature = defaults.ollama.temperature,
        top_p = defaults.ollama.top_p,
        max_tokens = defaults.ollama.max_tokens,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.ollama.base_url(), "http://localhost:11434");
        assert!(config.output.save_analysis);
        assert!(!config.output.copy_mode);
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = AppConfig::from_file(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[ollama]\nmodel = \"llama3:8b\"\n\n[output]\ncopy_mode = true\n").unwrap();

        let config = AppConfig::load_with_env(Some(&path), env_from(&[])).unwrap();
        assert_eq!(config.ollama.model, "llama3:8b");
        assert_eq!(config.ollama.port, 11434);
        assert!(config.output.copy_mode);
        assert!(config.output.save_analysis);
    }

    #[test]
    fn test_invalid_toml_is_configuration_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[ollama\nport = ").unwrap();

        let err = AppConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, RelaisError::Configuration { .. }));
        assert!(err.to_string().contains("config.toml"));
    }

    #[test]
    fn test_out_of_range_file_value_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[ollama]\ntemperature = 3.5\n").unwrap();

        let err = AppConfig::load_with_env(Some(&path), env_from(&[])).unwrap_err();
        assert!(matches!(err, RelaisError::Configuration { .. }));
    }

    #[test]
    fn test_environment_overrides_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[ollama]\nhost = \"filehost\"\nport = 1000\n").unwrap();

        let env = env_from(&[
            ("OLLAMA_HOST", "envhost"),
            ("OLLAMA_PORT", "2000"),
            ("OLLAMA_TIMEOUT", "30"),
            ("OLLAMA_TEMPERATURE", "0.2"),
            ("DOCKERFILE_AI_SAVE_ANALYSIS", "False"),
            ("DOCKERFILE_AI_COPY_MODE", "TRUE"),
            ("DOCKERFILE_AI_OUTPUT_DIR", "/tmp/out"),
            ("DOCKERFILE_AI_LOG_LEVEL", "debug"),
        ]);
        let config = AppConfig::load_with_env(Some(&path), env).unwrap();

        assert_eq!(config.ollama.host, "envhost");
        assert_eq!(config.ollama.port, 2000);
        assert_eq!(config.ollama.timeout, 30);
        assert!((config.ollama.temperature - 0.2).abs() < f64::EPSILON);
        assert!(!config.output.save_analysis);
        assert!(config.output.copy_mode);
        assert_eq!(config.output_root(), PathBuf::from("/tmp/out"));
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_unparseable_env_number_names_the_variable() {
        let mut config = AppConfig::default();
        let err = config
            .apply_env(env_from(&[("OLLAMA_PORT", "eleven")]))
            .unwrap_err();
        assert!(matches!(err, RelaisError::Configuration { .. }));
        assert!(err.to_string().contains("OLLAMA_PORT"));
    }

    #[test]
    fn test_log_file_env_enables_file_logging() {
        let mut config = AppConfig::default();
        config
            .apply_env(env_from(&[("DOCKERFILE_AI_LOG_FILE", "/tmp/d.log")]))
            .unwrap();
        assert!(config.logging.file_logging);
        assert_eq!(config.logging.log_file, Some(PathBuf::from("/tmp/d.log")));
    }

    #[test]
    fn test_overrides_win() {
        let mut config = AppConfig::default();
        config.apply_overrides(&ConfigOverrides {
            model: Some("codellama".to_string()),
            copy_mode: Some(true),
            save_results: Some(false),
            verbose: Some(true),
        });
        assert_eq!(config.ollama.model, "codellama");
        assert!(config.output.copy_mode);
        assert!(!config.output.save_analysis);
        assert!(!config.output.save_dockerfile);
        assert!(config.logging.verbose);

        let before = config.clone();
        config.apply_overrides(&ConfigOverrides::default());
        assert_eq!(config, before);
    }

    #[test]
    fn test_unknown_log_level_is_rejected() {
        let mut config = AppConfig::default();
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());

        config.logging.level = "WARNING".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = AppConfig::default();
        config.ollama.model = "llama3:8b".to_string();
        config.output.output_dir = Some(dir.path().join("out"));
        config.save(&path).unwrap();

        let loaded = AppConfig::from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_sample_config_parses_to_defaults() {
        let config = AppConfig::from_toml(&sample_config()).unwrap();
        assert_eq!(config, AppConfig::default());
    }
}

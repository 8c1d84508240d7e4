//! TOML-based configuration for reportql.
//!
//! Supports a config file (reportql.toml) with environment variable expansion
//! in paths.
//!
//! Example configuration:
//! ```toml
//! [parser]
//! max_query_length = 4096
//! max_depth = 32
//!
//! [reporting]
//! definition = "${REPORTS_DIR}/sales.toml"
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::query::ParseOptions;

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Parser resource bounds.
    pub parser: ParserSettings,

    /// Reporting definition location.
    pub reporting: ReportingSettings,
}

/// Parser resource bounds.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ParserSettings {
    /// Longest accepted query string, in bytes.
    pub max_query_length: usize,

    /// Deepest accepted nesting of expressions, predicates and sub-relations.
    pub max_depth: usize,
}

impl Default for ParserSettings {
    fn default() -> Self {
        Self {
            max_query_length: ParseOptions::DEFAULT_MAX_QUERY_LENGTH,
            max_depth: ParseOptions::DEFAULT_MAX_DEPTH,
        }
    }
}

/// Reporting configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ReportingSettings {
    /// Path to a reporting definition file (supports ${ENV_VAR} expansion).
    pub definition: Option<String>,
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate settings from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, SettingsError> {
        let settings: Settings = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from the default config file locations.
    ///
    /// Searches in order:
    /// 1. Environment variable `REPORTQL_CONFIG`
    /// 2. `./reportql.toml`
    /// 3. `~/.config/reportql/config.toml`
    pub fn load() -> Result<Self, SettingsError> {
        // Check environment variable first
        if let Ok(path) = env::var("REPORTQL_CONFIG") {
            return Self::from_file(&path);
        }

        // Check local directory
        let local_config = PathBuf::from("reportql.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        // Check user config directory
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("reportql").join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        // Return defaults if no config file found
        Ok(Settings::default())
    }

    fn validate(&self) -> Result<(), SettingsError> {
        if self.parser.max_query_length == 0 {
            return Err(SettingsError::InvalidConfig(
                "parser.max_query_length must be positive".to_string(),
            ));
        }
        if self.parser.max_depth == 0 {
            return Err(SettingsError::InvalidConfig(
                "parser.max_depth must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Parser bounds as options for [`parse_with`](crate::query::parse_with).
    pub fn parse_options(&self) -> ParseOptions {
        ParseOptions {
            max_query_length: self.parser.max_query_length,
            max_depth: self.parser.max_depth,
        }
    }

    /// The configured definition path with environment variables expanded.
    pub fn definition_path(&self) -> Result<Option<PathBuf>, SettingsError> {
        match &self.reporting.definition {
            Some(path) => Ok(Some(PathBuf::from(expand_env_vars(path)?))),
            None => Ok(None),
        }
    }
}

/// Expand environment variables in a string.
///
/// Supports `${VAR}` and `$VAR` syntax.
pub fn expand_env_vars(s: &str) -> Result<String, SettingsError> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            result.push(c);
            continue;
        }

        let var_name: String = if chars.next_if_eq(&'{').is_some() {
            let name: String = chars.by_ref().take_while(|&ch| ch != '}').collect();
            if name.is_empty() {
                return Err(SettingsError::MissingEnvVar(name));
            }
            name
        } else {
            let mut name = String::new();
            while let Some(ch) = chars.next_if(|ch| ch.is_alphanumeric() || *ch == '_') {
                name.push(ch);
            }
            if name.is_empty() {
                // Just a lone $, keep it
                result.push('$');
                continue;
            }
            name
        };

        let value =
            env::var(&var_name).map_err(|_| SettingsError::MissingEnvVar(var_name.clone()))?;
        result.push_str(&value);
    }

    Ok(result)
}

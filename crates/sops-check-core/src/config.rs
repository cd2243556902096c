//! Policy configuration for sops-check.
//!
//! The configuration is a declarative rule tree plus the `allowUnmatched`
//! toggle. It can be written in YAML (the default) or TOML and loaded from a
//! local file or an `http(s)` URL:
//!
//! ```yaml
//! allowUnmatched: false
//! rules:
//!   - description: Production secrets must be readable by the ops team
//!     anyOf:
//!       - match: age1yt3tfqlfrwdwx0z0ynwplcr6qxcxfaqycuprpmy89nr83ltx74tqdpszlw
//!       - matchRegex: ^arn:aws:kms:eu-central-1:123456789012:key/
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration for sops-check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Whether files may carry trust anchors that no rule matched.
    #[serde(default)]
    pub allow_unmatched: bool,

    /// Top-level rules. All of them must match for a file to pass.
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

/// A single declarative rule.
///
/// Exactly one of the condition fields (`match`, `matchRegex`, `not`,
/// `allOf`, `anyOf`, `oneOf`) must be populated. Empty strings and empty
/// lists count as not populated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleConfig {
    /// All of the nested rules must match.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub all_of: Vec<RuleConfig>,

    /// At least one of the nested rules must match.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub any_of: Vec<RuleConfig>,

    /// Exactly one of the nested rules must match.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub one_of: Vec<RuleConfig>,

    /// The nested rule must not match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not: Option<Box<RuleConfig>>,

    /// A trust anchor must equal this string.
    #[serde(rename = "match", default, skip_serializing_if = "Option::is_none")]
    pub r#match: Option<String>,

    /// A trust anchor must match this regular expression.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_regex: Option<String>,

    /// Description used to enrich messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Documentation link used to enrich messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl RuleConfig {
    /// Creates a `match` rule.
    #[must_use]
    pub fn literal(trust_anchor: impl Into<String>) -> Self {
        Self {
            r#match: Some(trust_anchor.into()),
            ..Self::default()
        }
    }

    /// Creates a `matchRegex` rule.
    #[must_use]
    pub fn regex(pattern: impl Into<String>) -> Self {
        Self {
            match_regex: Some(pattern.into()),
            ..Self::default()
        }
    }

    /// Creates a `not` rule.
    #[must_use]
    pub fn not(rule: RuleConfig) -> Self {
        Self {
            not: Some(Box::new(rule)),
            ..Self::default()
        }
    }

    /// Creates an `allOf` rule.
    #[must_use]
    pub fn all_of(rules: Vec<RuleConfig>) -> Self {
        Self {
            all_of: rules,
            ..Self::default()
        }
    }

    /// Creates an `anyOf` rule.
    #[must_use]
    pub fn any_of(rules: Vec<RuleConfig>) -> Self {
        Self {
            any_of: rules,
            ..Self::default()
        }
    }

    /// Creates a `oneOf` rule.
    #[must_use]
    pub fn one_of(rules: Vec<RuleConfig>) -> Self {
        Self {
            one_of: rules,
            ..Self::default()
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the documentation URL.
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Returns the `match` condition if populated.
    #[must_use]
    pub fn match_condition(&self) -> Option<&str> {
        self.r#match.as_deref().filter(|s| !s.is_empty())
    }

    /// Returns the `matchRegex` condition if populated.
    #[must_use]
    pub fn match_regex_condition(&self) -> Option<&str> {
        self.match_regex.as_deref().filter(|s| !s.is_empty())
    }

    /// Counts the populated condition fields.
    #[must_use]
    pub fn condition_count(&self) -> usize {
        [
            self.match_condition().is_some(),
            self.match_regex_condition().is_some(),
            self.not.is_some(),
            !self.all_of.is_empty(),
            !self.any_of.is_empty(),
            !self.one_of.is_empty(),
        ]
        .into_iter()
        .filter(|populated| *populated)
        .count()
    }
}

/// Serialization format of a configuration document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConfigFormat {
    /// YAML, which also covers JSON documents.
    #[default]
    Yaml,
    /// TOML.
    Toml,
}

impl ConfigFormat {
    /// Picks the format from a file extension, defaulting to YAML.
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::Toml,
            _ => Self::Yaml,
        }
    }
}

impl Config {
    /// Creates a new default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a URL or a local file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be fetched, read, parsed or
    /// validated.
    pub fn load(location: &str) -> Result<Self, ConfigError> {
        if is_url(location) {
            Self::from_url(location)
        } else {
            Self::from_file(Path::new(location))
        }
    }

    /// Loads configuration from a local file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotFound`] if the file does not exist, or another
    /// error if it cannot be read, parsed or validated.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound {
                    path: path.to_path_buf(),
                }
            } else {
                ConfigError::Io {
                    path: path.to_path_buf(),
                    source: e,
                }
            }
        })?;
        tracing::debug!("Loaded config from {}", path.display());
        Self::parse(&content, ConfigFormat::from_path(path))
    }

    /// Fetches configuration from a remote URL.
    ///
    /// The response body is parsed as YAML unless the URL path ends in
    /// `.toml`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, the server responds with an
    /// error status, or the body cannot be parsed or validated.
    pub fn from_url(url: &str) -> Result<Self, ConfigError> {
        let fetch_error = |source| ConfigError::Fetch {
            url: url.to_string(),
            source,
        };
        let content = reqwest::blocking::get(url)
            .and_then(reqwest::blocking::Response::error_for_status)
            .and_then(reqwest::blocking::Response::text)
            .map_err(fetch_error)?;
        tracing::debug!("Fetched config from {url}");
        let format = reqwest::Url::parse(url)
            .map(|u| ConfigFormat::from_path(Path::new(u.path())))
            .unwrap_or_default();
        Self::parse(&content, format)
    }

    /// Parses and validates configuration from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is malformed or fails validation.
    pub fn parse(content: &str, format: ConfigFormat) -> Result<Self, ConfigError> {
        let config: Self = match format {
            ConfigFormat::Yaml => serde_yaml::from_str(content).map_err(|e| ConfigError::Parse {
                message: e.to_string(),
            })?,
            ConfigFormat::Toml => toml::from_str(content).map_err(|e| ConfigError::Parse {
                message: e.to_string(),
            })?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validates that every rule, recursively, has exactly one condition.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] for the first offending rule.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.rules
            .iter()
            .enumerate()
            .try_for_each(|(i, rule)| validate_rule(rule, &format!("rules[{i}]")))
    }
}

fn validate_rule(rule: &RuleConfig, context: &str) -> Result<(), ConfigError> {
    let found = rule.condition_count();
    if found != 1 {
        return Err(ConfigError::Validation {
            context: context.to_string(),
            found,
        });
    }

    if let Some(inner) = &rule.not {
        validate_rule(inner, &format!("{context}.not"))?;
    }

    let nested = [
        ("allOf", &rule.all_of),
        ("anyOf", &rule.any_of),
        ("oneOf", &rule.one_of),
    ];
    for (key, rules) in nested {
        for (i, sub_rule) in rules.iter().enumerate() {
            validate_rule(sub_rule, &format!("{context}.{key}[{i}]"))?;
        }
    }

    Ok(())
}

/// Returns `true` if `location` looks like a URL rather than a file path.
#[must_use]
pub fn is_url(location: &str) -> bool {
    reqwest::Url::parse(location).is_ok_and(|u| !u.scheme().is_empty() && u.has_host())
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// IO error reading config file.
    #[error("Failed to read config file {}", .path.display())]
    Io {
        /// Path that failed to read.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },

    /// The config file does not exist.
    #[error("config file {path:?} not found")]
    NotFound {
        /// Path that was looked up.
        path: PathBuf,
    },

    /// Fetching a remote config failed.
    #[error("failed to fetch config from URL {url:?}")]
    Fetch {
        /// URL that was requested.
        url: String,
        /// Underlying HTTP error.
        source: reqwest::Error,
    },

    /// Parse error in config file.
    #[error("Failed to parse config: {message}")]
    Parse {
        /// Parse error message.
        message: String,
    },

    /// A rule does not have exactly one condition.
    #[error("{context}: rule must have exactly one match condition, got {found}")]
    Validation {
        /// Position of the rule (e.g., "rules[0].anyOf[1]").
        context: String,
        /// Number of populated conditions.
        found: usize,
    },
}

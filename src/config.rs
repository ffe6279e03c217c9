//! Store configuration (`config.toml`).
//!
//! Lives at `<store>/config.toml`. Every field has a default, and a missing
//! file means all defaults.

use std::fmt;
use std::path::{Path, PathBuf};

use protoreview_core::PatchMode;
use serde::Deserialize;

use crate::error::ReviewError;
use crate::merge::MergePolicy;

/// File name of the configuration inside the store directory.
pub const CONFIG_FILE: &str = "config.toml";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReviewConfig {
    /// Protocol defaults.
    #[serde(default)]
    pub repo: RepoConfig,

    /// Merge behaviour.
    #[serde(default)]
    pub merge: MergeConfig,

    /// Pull request listing.
    #[serde(default)]
    pub pull_requests: PullRequestConfig,
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// Protocol defaults.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RepoConfig {
    /// Branch new protocols start on (default: `"main"`).
    #[serde(default = "default_branch")]
    pub default_branch: String,
}

impl Default for RepoConfig {
    fn default() -> Self {
        Self {
            default_branch: default_branch(),
        }
    }
}

fn default_branch() -> String {
    "main".to_owned()
}

/// Merge behaviour.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MergeConfig {
    /// Refuse to merge while assigned reviewers have not approved.
    #[serde(default = "default_require_approval")]
    pub require_approval: bool,

    /// Treatment of changes whose target step is gone.
    #[serde(default)]
    pub patch_mode: PatchMode,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            require_approval: default_require_approval(),
            patch_mode: PatchMode::default(),
        }
    }
}

const fn default_require_approval() -> bool {
    true
}

impl MergeConfig {
    /// The merge policy these settings describe.
    #[must_use]
    pub const fn policy(&self) -> MergePolicy {
        MergePolicy {
            require_approval: self.require_approval,
            patch_mode: self.patch_mode,
        }
    }
}

/// Pull request listing.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PullRequestConfig {
    /// Maximum number of pull requests a listing returns.
    #[serde(default = "default_list_limit")]
    pub list_limit: usize,
}

impl Default for PullRequestConfig {
    fn default() -> Self {
        Self {
            list_limit: default_list_limit(),
        }
    }
}

const fn default_list_limit() -> usize {
    50
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Error loading a configuration file.
#[derive(Debug)]
pub struct ConfigError {
    /// The path that was being loaded (if available).
    pub path: Option<PathBuf>,
    /// Human-readable message with line-level detail when possible.
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(p) = &self.path {
            write!(f, "{}: {}", p.display(), self.message)
        } else {
            write!(f, "config error: {}", self.message)
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for ReviewError {
    fn from(e: ConfigError) -> Self {
        Self::Config {
            path: e.path.unwrap_or_else(|| PathBuf::from(CONFIG_FILE)),
            detail: e.message,
        }
    }
}

impl ReviewConfig {
    /// Load configuration from a TOML file. A missing file yields defaults.
    ///
    /// # Errors
    /// Returns `ConfigError` on I/O errors (other than not-found) or parse errors.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(ConfigError {
                    path: Some(path.to_owned()),
                    message: format!("could not read file: {e}"),
                });
            }
        };
        Self::parse(&contents).map_err(|mut e| {
            e.path = Some(path.to_owned());
            e
        })
    }

    /// Load `<store>/config.toml`.
    ///
    /// # Errors
    /// See [`ReviewConfig::load`].
    pub fn load_for_store(store_dir: &Path) -> Result<Self, ConfigError> {
        Self::load(&store_dir.join(CONFIG_FILE))
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    /// Returns `ConfigError` on invalid TOML, unknown fields or a zero
    /// listing limit.
    pub fn parse(toml_str: &str) -> Result<Self, ConfigError> {
        let cfg: Self = toml::from_str(toml_str).map_err(|e| {
            let mut message = e.message().to_owned();
            if let Some(span) = e.span() {
                let line = toml_str[..span.start]
                    .chars()
                    .filter(|&c| c == '\n')
                    .count()
                    + 1;
                message = format!("line {line}: {message}");
            }
            ConfigError {
                path: None,
                message,
            }
        })?;
        if cfg.pull_requests.list_limit == 0 {
            return Err(ConfigError {
                path: None,
                message: "pull_requests.list_limit must be at least 1".to_owned(),
            });
        }
        if cfg.repo.default_branch.trim().is_empty() {
            return Err(ConfigError {
                path: None,
                message: "repo.default_branch must not be empty".to_owned(),
            });
        }
        Ok(cfg)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Configuration loading.
//!
//! Settings come from three layers, later layers overriding earlier ones key
//! by key:
//!
//! 1. stock defaults (see [`stock_config_toml`])
//! 2. `imgcommit.toml` in the working directory, or the file given with `--config`
//! 3. command-line flags
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [repository]
//! name = ""              # owner/repo
//! branch = "main"
//! folder = ""            # destination folder, "" = repository root
//!
//! [resize]
//! width = 0              # 0 = unset
//! height = 0             # 0 = unset
//! mode = "fit"           # fit | stretch | side | pad | crop
//! no_upscale = false
//! side = "longest"       # side mode: longest | shortest | width | height
//! background = "#ffffff" # pad mode fill
//! position = "center"    # pad/crop anchor
//!
//! [output]
//! format = "webp"        # webp | jpg | png
//! quality = 80           # 0-100, ignored for png
//!
//! [commit]
//! # message = "Add photos"
//!
//! [processing]
//! max_workers = 4
//!
//! [remote]
//! api_base = "https://api.github.com"
//! timeout_secs = 60
//! token_env = "GITHUB_TOKEN"
//! ```
//!
//! Config files are sparse; unknown keys are rejected to catch typos early.
//! The access token is never read from a config file.

use crate::commit::{CommitTarget, DEFAULT_WORKERS};
use crate::imaging::{
    Anchor, Background, OutputFormat, ParamError, Quality, ResizeMode, ResizeSpec, SideOption,
    TargetBox, TransformSpec,
};
use crate::remote::Credential;
use crate::remote::github::DEFAULT_API_BASE;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Looked up in the working directory when no `--config` is given.
pub const CONFIG_FILE: &str = "imgcommit.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
    #[error("Config validation error: {0}")]
    Param(#[from] ParamError),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub repository: RepositoryConfig,
    pub resize: ResizeConfig,
    pub output: OutputConfig,
    pub commit: CommitConfig,
    pub processing: ProcessingConfig,
    pub remote: RemoteConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RepositoryConfig {
    /// `owner/repo`
    pub name: String,
    pub branch: String,
    pub folder: String,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            branch: "main".into(),
            folder: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResizeConfig {
    pub width: u32,
    pub height: u32,
    pub mode: String,
    pub no_upscale: bool,
    pub side: String,
    pub background: String,
    pub position: String,
}

impl Default for ResizeConfig {
    fn default() -> Self {
        Self {
            width: 0,
            height: 0,
            mode: "fit".into(),
            no_upscale: false,
            side: "longest".into(),
            background: "#ffffff".into(),
            position: "center".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub format: String,
    pub quality: u32,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: "webp".into(),
            quality: 80,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CommitConfig {
    /// Commit message; a timestamp is appended.
    pub message: Option<String>,
}

/// Parallel upload settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum concurrent transform + upload workers.
    /// Values larger than the core count are clamped down.
    pub max_workers: usize,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            max_workers: DEFAULT_WORKERS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RemoteConfig {
    pub api_base: String,
    pub timeout_secs: u64,
    /// Environment variable holding the access token.
    pub token_env: String,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.into(),
            timeout_secs: 60,
            token_env: "GITHUB_TOKEN".into(),
        }
    }
}

impl RemoteConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Token from the configured environment variable, if set and non-blank.
    pub fn credential_from_env(&self) -> Option<Credential> {
        std::env::var(&self.token_env)
            .ok()
            .map(Credential::new)
            .filter(|c| !c.is_empty())
    }
}

impl Config {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.output.quality > 100 {
            return Err(ConfigError::Validation(
                "output.quality must be 0-100".into(),
            ));
        }
        if self.processing.max_workers == 0 {
            return Err(ConfigError::Validation(
                "processing.max_workers must be at least 1".into(),
            ));
        }
        if self.remote.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "remote.timeout_secs must be at least 1".into(),
            ));
        }
        if self.remote.api_base.trim().is_empty() {
            return Err(ConfigError::Validation(
                "remote.api_base must not be empty".into(),
            ));
        }
        if self.remote.token_env.trim().is_empty() {
            return Err(ConfigError::Validation(
                "remote.token_env must not be empty".into(),
            ));
        }
        self.transform_spec()?;
        Ok(())
    }

    /// The resize and encode settings as typed parameters.
    pub fn transform_spec(&self) -> Result<TransformSpec, ConfigError> {
        let r = &self.resize;
        let width = (r.width > 0).then_some(r.width);
        let height = (r.height > 0).then_some(r.height);
        let target = TargetBox::new(width, height)?;
        let mode = ResizeMode::from_parts(
            &r.mode,
            r.side.parse::<SideOption>()?,
            r.background.parse::<Background>()?,
            r.position.parse::<Anchor>()?,
        )?;
        Ok(TransformSpec {
            resize: ResizeSpec {
                target,
                mode,
                no_upscale: r.no_upscale,
            },
            format: self.output.format.parse::<OutputFormat>()?,
            quality: Quality::new(self.output.quality),
        })
    }

    pub fn commit_target(&self) -> CommitTarget {
        CommitTarget {
            repo: self.repository.name.clone(),
            branch: self.repository.branch.clone(),
            folder: self.repository.folder.clone(),
        }
    }
}

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the base layer that config files and flags are merged onto.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(Config::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist, `Err` if it exists but is
/// not valid TOML.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge overlays onto a base value in order, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlays: impl IntoIterator<Item = toml::Value>,
) -> Result<Config, ConfigError> {
    let merged = overlays.into_iter().fold(base, merge_toml);
    let config: Config = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `path` (or [`CONFIG_FILE`] in the working directory)
/// with `flags` applied on top.
///
/// An explicitly given path must exist; the default file is optional.
pub fn load_config(path: Option<&Path>, flags: Option<toml::Value>) -> Result<Config, ConfigError> {
    let file = match path {
        Some(explicit) => Some(load_raw_config(explicit)?.ok_or_else(|| {
            ConfigError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("config file {} not found", explicit.display()),
            ))
        })?),
        None => load_raw_config(Path::new(CONFIG_FILE))?,
    };
    resolve_config(stock_defaults_value()?, file.into_iter().chain(flags))
}

/// Returns a fully-commented stock `imgcommit.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# imgcommit Configuration
# =======================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Every key can also be given on the command line, which wins over this file.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Target repository
# ---------------------------------------------------------------------------
[repository]
# Repository in owner/repo form.
name = ""

# Branch to commit to. Only fast-forward updates are made.
branch = "main"

# Folder uploads land in. Empty means the repository root.
folder = ""

# ---------------------------------------------------------------------------
# Resizing
# ---------------------------------------------------------------------------
[resize]
# Target box in pixels. 0 leaves that axis unset.
width = 0
height = 0

# How the image is fitted to the target box:
#   fit     - keep aspect ratio, fit inside the box
#   stretch - fill the box exactly, ignoring aspect ratio
#   side    - scale one reference side to the target (see `side`)
#   pad     - fit inside, then fill the rest of the box with `background`
#   crop    - cover the box, then crop the overflow around `position`
mode = "fit"

# Leave images that already fit the target box untouched.
no_upscale = false

# Reference side for mode = "side": longest, shortest, width or height.
side = "longest"

# Fill colour for mode = "pad" (#rgb, #rrggbb or #rrggbbaa).
background = "#ffffff"

# Anchor for pad and crop: center, top, bottom, left, right,
# top-left, top-right, bottom-left, bottom-right.
position = "center"

# ---------------------------------------------------------------------------
# Encoding
# ---------------------------------------------------------------------------
[output]
# Output format: webp, jpg or png.
format = "webp"

# Encoder quality for webp and jpg (0 = worst, 100 = best). Ignored for png.
quality = 80

# ---------------------------------------------------------------------------
# Commit
# ---------------------------------------------------------------------------
[commit]
# Commit message. A UTC timestamp is always appended.
# message = "Upload images via imgcommit"

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel transform + upload workers (clamped to CPU cores).
max_workers = 4

# ---------------------------------------------------------------------------
# Remote API
# ---------------------------------------------------------------------------
[remote]
# API root. Use https://<host>/api/v3 for GitHub Enterprise Server.
api_base = "https://api.github.com"

# Per-request timeout in seconds.
timeout_secs = 60

# Environment variable the access token is read from (or pass --token).
token_env = "GITHUB_TOKEN"
"##
}

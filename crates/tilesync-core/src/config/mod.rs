//! Engine configuration: attachment host, thumbnail path roots, and the
//! curated prefix table used for backfill guessing.
//!
//! The prefix table is hand-maintained data, not logic: it maps the first
//! eight characters of a historical thumbnail filename to the default slot
//! positions that thumbnail was shipped at. It ships as the [`Default`]
//! configuration and can be replaced wholesale from TOML so deployments can
//! correct it without a code change.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while loading or validating a [`TileConfig`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// The TOML could not be parsed.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// The parsed config violates a structural requirement.
    #[error("invalid config: {0}")]
    Validation(String),
}

/// Configuration for one reconciliation engine instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TileConfig {
    /// Origin the upstream serves tile assets from. No trailing slash; asset
    /// references are formed by direct concatenation with an attachment
    /// location.
    #[serde(default = "default_attachment_base")]
    pub attachment_base: String,

    /// Path roots (under `attachment_base`) that historical thumbnails were
    /// published beneath. Ordered; the first matching root wins.
    #[serde(default = "default_thumbnail_paths")]
    pub thumbnail_paths: Vec<String>,

    /// Thumbnail prefix to candidate default positions. More than one
    /// candidate means the thumbnail was reused across positions and a guess
    /// from it alone is ambiguous.
    #[serde(default = "default_backfill_prefixes")]
    pub backfill_prefixes: HashMap<String, Vec<usize>>,
}

impl Default for TileConfig {
    fn default() -> Self {
        Self {
            attachment_base: default_attachment_base(),
            thumbnail_paths: default_thumbnail_paths(),
            backfill_prefixes: default_backfill_prefixes(),
        }
    }
}

impl TileConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parses and validates configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validates structural requirements on the configured values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.attachment_base.is_empty() {
            return Err(ConfigError::Validation(
                "attachment_base must not be empty".to_string(),
            ));
        }
        if self.attachment_base.ends_with('/') {
            return Err(ConfigError::Validation(
                "attachment_base must not end with '/'; attachment locations start with one"
                    .to_string(),
            ));
        }
        for path in &self.thumbnail_paths {
            if !path.starts_with('/') || !path.ends_with('/') {
                return Err(ConfigError::Validation(format!(
                    "thumbnail path {path:?} must start and end with '/'"
                )));
            }
        }
        Ok(())
    }

    /// The asset reference produced by a legacy collector release that glued
    /// a missing attachment location onto the host as the literal string
    /// `undefined`. Slots carrying it are repaired in place.
    #[must_use]
    pub fn corrupt_asset_url(&self) -> String {
        format!("{}undefined", self.attachment_base)
    }
}

fn default_attachment_base() -> String {
    "https://offlintab.firefoxchina.cn".to_string()
}

fn default_thumbnail_paths() -> Vec<String> {
    vec![
        "/data/thumbnails/".to_string(),
        "/static/img/as-icons/".to_string(),
    ]
}

#[rustfmt::skip]
fn default_backfill_prefixes() -> HashMap<String, Vec<usize>> {
    let table: &[(&str, &[usize])] = &[
        ("046255d2", &[4, 3]), // as-icons
        ("05d144db", &[6]),
        ("0ef7766c", &[3]),
        ("0ff1094d", &[4]),
        ("1490769a", &[5]),
        ("1beb4001", &[4]),
        ("1e88a405", &[5]), // as-icons
        ("237d73b2", &[7]),
        ("2b616a4a", &[4]),
        ("313a1105", &[4]), // as-icons
        ("313e9486", &[2]),
        ("381d5ce9", &[4]),
        ("39975ae4", &[6]),
        ("3df5e780", &[0]),
        ("3e33a886", &[4]),
        ("3e4d4729", &[4]),
        ("440e2d7c", &[4]),
        ("468f82e6", &[3]),
        ("491725fc", &[5]), // as-icons
        ("4a112aca", &[7]), // as-icons
        ("4ca16353", &[4]),
        ("4dd1c540", &[3]),
        ("6b203324", &[6]),
        ("6fd68a18", &[4]),
        ("70199cba", &[4, 6, 7, 5]),
        ("71ecd4fd", &[1, 2]),
        ("78396aeb", &[7]),
        ("7c2b3ec9", &[3, 2]), // as-icons
        ("7eb6052d", &[5]),
        ("7ee9a10c", &[5]),
        ("83469c68", &[5]),
        ("8e094349", &[4]),
        ("903b39f8", &[3]),
        ("910f7dca", &[2]), // as-icons
        ("9355218c", &[5]),
        ("96bc9794", &[4]),
        ("9f4632fb", &[6, 7]),
        ("a9ab9324", &[4]),
        ("a4f13a05", &[6]), // as-icons
        ("adce6b03", &[1]),
        ("b18eca4f", &[4]),
        ("bc4ba8bf", &[6]),
        ("ca31f5d3", &[4]),
        ("e78f8151", &[1]), // as-icons
        ("e6f12b12", &[4]),
        ("ef925e06", &[0]),
        ("f0ff22c0", &[5, 6]),
        ("f243aa87", &[4]),
        ("f3726955", &[4]),
        ("ff2bdf2c", &[5]),
    ];

    table
        .iter()
        .map(|(prefix, positions)| ((*prefix).to_string(), positions.to_vec()))
        .collect()
}

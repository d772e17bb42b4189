use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::Result;

/// Node pool sizes per ART node kind. Pools are refilled in batches and
/// trimmed back down as they're returned to; see [`crate::index::art`].
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct ArtOptions {
    pub leaf_pool_size: usize,
    pub node4_pool_size: usize,
    pub node16_pool_size: usize,
    pub node48_pool_size: usize,
    pub node256_pool_size: usize,
}

impl Default for ArtOptions {
    fn default() -> Self {
        Self {
            leaf_pool_size: 512,
            node4_pool_size: 256,
            node16_pool_size: 128,
            node48_pool_size: 64,
            node256_pool_size: 32,
        }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Options {
    pub db_path: PathBuf,

    #[serde(with = "humantime_duration")]
    pub log_file_gc_interval: Duration,
    pub log_file_size_threshold: u64,

    pub art_opt: ArtOptions,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            db_path: PathBuf::new(),
            log_file_gc_interval: Duration::from_secs(5 * 60 * 60),
            log_file_size_threshold: 512 << 20,
            art_opt: ArtOptions::default(),
        }
    }
}

impl Options {
    /// Builds the default configuration rooted at `path`, mirroring the
    /// original's `DefaultOptions`.
    pub fn default_at(path: impl Into<PathBuf>) -> Self {
        Self { db_path: path.into(), ..Self::default() }
    }

    /// Layers a TOML config file and `PEACH_*` environment variables over
    /// the defaults. `db_path_override`, when given, takes precedence over
    /// whatever the file/environment specify.
    pub fn load(config_path: &Path, db_path_override: Option<&Path>) -> Result<Self> {
        let defaults = Self::default();
        let builder = config::Config::builder()
            .set_default("db_path", defaults.db_path.to_string_lossy().into_owned())?
            .set_default("log_file_gc_interval", humantime::format_duration(defaults.log_file_gc_interval).to_string())?
            .set_default("log_file_size_threshold", defaults.log_file_size_threshold as i64)?
            .set_default("art_opt.leaf_pool_size", defaults.art_opt.leaf_pool_size as i64)?
            .set_default("art_opt.node4_pool_size", defaults.art_opt.node4_pool_size as i64)?
            .set_default("art_opt.node16_pool_size", defaults.art_opt.node16_pool_size as i64)?
            .set_default("art_opt.node48_pool_size", defaults.art_opt.node48_pool_size as i64)?
            .set_default("art_opt.node256_pool_size", defaults.art_opt.node256_pool_size as i64)?
            .add_source(config::File::from(config_path))
            .add_source(config::Environment::with_prefix("PEACH").separator("_"));

        let mut opts: Options = builder.build()?.try_deserialize()?;
        if let Some(db_path) = db_path_override {
            opts.db_path = db_path.to_path_buf();
        }
        Ok(opts)
    }
}

/// `config`/`serde` can't deserialize `Duration` directly; store it as a
/// human-readable string (`"5h"`, `"30s"`) and parse through `humantime`.
mod humantime_duration {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_str(&humantime::format_duration(*d).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Duration, D::Error> {
        let raw = String::deserialize(d)?;
        humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}

use anyhow::{Context, Result};
use rollcall_core::{SpaceId, Threshold};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Runtime configuration: defaults, then an optional TOML file, then
/// `ROLLCALL_*` environment variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Cosine similarity threshold for a face/student assignment.
    pub similarity_threshold: Threshold,
    /// Embedding space produced by the encoder in use.
    pub space: SpaceId,
    /// Depth of the engine request queue.
    pub request_queue_depth: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            similarity_threshold: Threshold::default(),
            space: SpaceId::default(),
            request_queue_depth: 4,
        }
    }
}

impl Config {
    /// Load from `path` (or `ROLLCALL_CONFIG`), then apply environment
    /// overrides. A missing file is not an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os("ROLLCALL_CONFIG").map(PathBuf::from));

        let mut config = match path {
            Some(path) if path.exists() => Self::from_file(&path)?,
            _ => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config at {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))
    }

    /// Apply `ROLLCALL_*` overrides from `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(t) = parse_var::<f32>(&lookup, "ROLLCALL_SIMILARITY_THRESHOLD")? {
            self.similarity_threshold = Threshold::new(t)
                .context("ROLLCALL_SIMILARITY_THRESHOLD")?;
        }
        if let Some(space) = parse_var::<SpaceId>(&lookup, "ROLLCALL_SPACE")? {
            self.space = space;
        }
        if let Some(depth) = parse_var::<usize>(&lookup, "ROLLCALL_QUEUE_DEPTH")? {
            self.request_queue_depth = depth;
        }
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    lookup(key)
        .map(|raw| raw.trim().parse::<T>().with_context(|| format!("invalid {key}={raw:?}")))
        .transpose()
}

//! Run configuration.
//!
//! [`RunOptions`] is loaded from TOML (every field optional) and may be
//! overridden from the environment:
//!
//! | variable | field |
//! |---|---|
//! | `MSPEC_TIMEOUT_MS` | `specification_timeout_ms` |
//!
//! A timeout of `0`, from any source, means no timeout.
//! | `MSPEC_PARALLEL` | `max_parallel_assemblies` |

use crate::domain::{MspecError, Result};
use crate::vocabulary::Vocabulary;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const ENV_TIMEOUT_MS: &str = "MSPEC_TIMEOUT_MS";
pub const ENV_PARALLEL: &str = "MSPEC_PARALLEL";

/// Options for a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunOptions {
    /// Only contexts carrying one of these tags (own or inherited) run.
    pub include_tags: Vec<String>,

    /// Contexts carrying any of these tags are pruned.
    pub exclude_tags: Vec<String>,

    /// Full names of contexts to run; a filter also selects everything nested in it.
    pub context_filters: Vec<String>,

    /// Phase-boundary limit per specification.
    pub specification_timeout_ms: Option<u64>,

    /// Upper bound of assemblies running at once.
    pub max_parallel_assemblies: usize,

    pub vocabulary: Vocabulary,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            include_tags: Vec::new(),
            exclude_tags: Vec::new(),
            context_filters: Vec::new(),
            specification_timeout_ms: None,
            max_parallel_assemblies: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            vocabulary: Vocabulary::default(),
        }
    }
}

impl RunOptions {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let mut options: Self = toml::from_str(s)?;
        options.specification_timeout_ms = options.specification_timeout_ms.filter(|ms| *ms > 0);
        options.validate()?;
        Ok(options)
    }

    /// Load options from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// Apply `MSPEC_*` overrides from the process environment.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply `MSPEC_*` overrides through `lookup`.
    pub fn apply_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_TIMEOUT_MS) {
            let ms: u64 = raw.trim().parse().map_err(|_| {
                MspecError::Config(format!("{ENV_TIMEOUT_MS} must be an integer, got '{raw}'"))
            })?;
            self.specification_timeout_ms = (ms > 0).then_some(ms);
        }
        if let Some(raw) = lookup(ENV_PARALLEL) {
            self.max_parallel_assemblies = raw.trim().parse().map_err(|_| {
                MspecError::Config(format!("{ENV_PARALLEL} must be an integer, got '{raw}'"))
            })?;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_parallel_assemblies == 0 {
            return Err(MspecError::Config(
                "max_parallel_assemblies must be at least 1".to_string(),
            ));
        }
        self.vocabulary.compile()?;
        Ok(())
    }

    pub fn with_timeout(mut self, limit: Duration) -> Self {
        let ms = u64::try_from(limit.as_millis()).unwrap_or(u64::MAX);
        self.specification_timeout_ms = (ms > 0).then_some(ms);
        self
    }

    pub fn with_max_parallel(mut self, n: usize) -> Self {
        self.max_parallel_assemblies = n;
        self
    }

    pub fn with_include_tag(mut self, tag: &str) -> Self {
        self.include_tags.push(tag.to_string());
        self
    }

    pub fn with_exclude_tag(mut self, tag: &str) -> Self {
        self.exclude_tags.push(tag.to_string());
        self
    }

    pub fn with_context_filter(mut self, full_name: &str) -> Self {
        self.context_filters.push(full_name.to_string());
        self
    }

    pub fn with_vocabulary(mut self, vocabulary: Vocabulary) -> Self {
        self.vocabulary = vocabulary;
        self
    }

    pub fn specification_timeout(&self) -> Option<Duration> {
        self.specification_timeout_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }

    /// Whether a context with `full_name` and effective `tags` contributes
    /// specifications to the run.
    pub fn selects(&self, full_name: &str, tags: &[String]) -> bool {
        if tags.iter().any(|t| self.exclude_tags.contains(t)) {
            return false;
        }
        if !self.include_tags.is_empty() && !tags.iter().any(|t| self.include_tags.contains(t)) {
            return false;
        }
        self.context_filters.is_empty()
            || self.context_filters.iter().any(|filter| {
                full_name == filter
                    || full_name
                        .strip_prefix(filter.as_str())
                        .is_some_and(|rest| rest.starts_with("::"))
            })
    }
}

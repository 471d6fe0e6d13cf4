use std::path::Path;

use anyhow::{anyhow, Context, Result};
use livegate_core::{LivenessConfig, VerifierConfig};
use serde::Deserialize;

/// Default number of extraction requests queued for the model thread.
const DEFAULT_WORKER_QUEUE: usize = 4;
/// Default ceiling on one verification attempt.
const DEFAULT_VERIFY_TIMEOUT_SECS: u64 = 10;

/// Settings as they appear in the TOML file. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    eye_openness_threshold: Option<f32>,
    frontal_offset_ratio: Option<f32>,
    acceptance_threshold: Option<f32>,
    verify_timeout_secs: Option<u64>,
    worker_queue: Option<usize>,
}

/// CLI configuration: TOML file first, then `LIVEGATE_*` environment
/// overrides.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub liveness: LivenessConfig,
    /// Maximum descriptor distance for a match. No default: it depends on
    /// the embedding model's distance scale.
    pub acceptance_threshold: Option<f32>,
    /// Timeout in seconds for one verify attempt.
    pub verify_timeout_secs: u64,
    /// Depth of the request queue in front of the face model thread.
    pub worker_queue: usize,
}

impl Config {
    /// Load from an optional TOML file and the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read config {}", path.display()))?;
                toml::from_str(&text)
                    .with_context(|| format!("failed to parse config {}", path.display()))?
            }
            None => FileConfig::default(),
        };
        Self::resolve(file, |key| std::env::var(key).ok())
    }

    fn resolve(file: FileConfig, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = LivenessConfig::default();
        Ok(Self {
            liveness: LivenessConfig {
                eye_openness_threshold: env_parse(&env, "LIVEGATE_EYE_OPENNESS_THRESHOLD")?
                    .or(file.eye_openness_threshold)
                    .unwrap_or(defaults.eye_openness_threshold),
                frontal_offset_ratio: env_parse(&env, "LIVEGATE_FRONTAL_OFFSET_RATIO")?
                    .or(file.frontal_offset_ratio)
                    .unwrap_or(defaults.frontal_offset_ratio),
            },
            acceptance_threshold: env_parse(&env, "LIVEGATE_ACCEPTANCE_THRESHOLD")?
                .or(file.acceptance_threshold),
            verify_timeout_secs: env_parse(&env, "LIVEGATE_VERIFY_TIMEOUT_SECS")?
                .or(file.verify_timeout_secs)
                .unwrap_or(DEFAULT_VERIFY_TIMEOUT_SECS),
            worker_queue: env_parse(&env, "LIVEGATE_WORKER_QUEUE")?
                .or(file.worker_queue)
                .unwrap_or(DEFAULT_WORKER_QUEUE),
        })
    }

    /// Full pipeline configuration. `override_threshold` (from the command
    /// line) wins over file and environment.
    pub fn verifier(&self, override_threshold: Option<f32>) -> Result<VerifierConfig> {
        let threshold = override_threshold
            .or(self.acceptance_threshold)
            .ok_or_else(|| {
                anyhow!(
                    "acceptance threshold not configured; set acceptance_threshold in the \
                     config file, LIVEGATE_ACCEPTANCE_THRESHOLD, or pass --threshold"
                )
            })?;
        let config = VerifierConfig::new(threshold).with_liveness(self.liveness);
        config.validate()?;
        Ok(config)
    }
}

fn env_parse<T>(env: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env(key) {
        Some(v) => v
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| anyhow!("invalid {key}={v:?}: {e}")),
        None => Ok(None),
    }
}

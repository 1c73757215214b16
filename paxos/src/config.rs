use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{PaxosError, Result};

/// Tunables of a cluster, loadable from a JSON file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Size of the proposer identity space, the stride of proposal numbers.
    pub max_proposers: u64,
    /// Bound on a single call to one acceptor, in milliseconds.
    pub call_timeout_ms: u64,
    /// Rounds a write may run before giving up, `None` for no bound.
    pub max_attempts: Option<u32>,
    /// Overall bound on a write, in milliseconds, `None` for no bound.
    pub deadline_ms: Option<u64>,
    /// Lower bound of the random pause between rounds, in milliseconds.
    pub backoff_min_ms: u64,
    /// Upper bound of the random pause between rounds, in milliseconds.
    pub backoff_max_ms: u64,
    /// Where acceptors keep durable state. In memory when unset.
    pub data_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_proposers: 16,
            call_timeout_ms: 500,
            max_attempts: Some(32),
            deadline_ms: Some(10_000),
            backoff_min_ms: 10,
            backoff_max_ms: 200,
            data_dir: None,
        }
    }
}

impl Config {
    /// Read and validate a JSON config. Missing fields take their defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let config: Config = serde_json::from_str(&fs::read_to_string(path)?)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the protocol cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.max_proposers == 0 {
            return Err(PaxosError::Config("max_proposers must be positive".into()));
        }
        if self.call_timeout_ms == 0 {
            return Err(PaxosError::Config("call_timeout_ms must be positive".into()));
        }
        if self.backoff_min_ms > self.backoff_max_ms {
            return Err(PaxosError::Config(format!(
                "backoff_min_ms {} exceeds backoff_max_ms {}",
                self.backoff_min_ms, self.backoff_max_ms
            )));
        }
        Ok(())
    }

    /// Per-call timeout.
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    /// Overall write deadline.
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_ms.map(Duration::from_millis)
    }

    /// A random pause between two rounds, so racing proposers drift apart.
    pub fn backoff(&self) -> Duration {
        let ms = rand::thread_rng().gen_range(self.backoff_min_ms..=self.backoff_max_ms);
        Duration::from_millis(ms)
    }
}

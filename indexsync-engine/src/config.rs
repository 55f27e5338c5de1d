//! Engine configuration.
//!
//! Every section defaults, so a config file only needs the keys it changes.

use crate::error::{IndexingError, IndexingResult};
use indexsync_remote::RemoteConfig;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::time::Duration;

/// Default number of records a worker claims per API key per run.
pub const DEFAULT_BATCH_SIZE: usize = 250;

/// Job code of the attribute sync cron job.
pub const ATTRIBUTE_SYNC_JOB_CODE: &str = "indexsync_sync_attributes";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexSyncConfig {
    pub remote: RemoteConfig,
    pub worker: WorkerConfig,
    pub scheduler: SchedulerConfig,
    pub diagnostics: DiagnosticsConfig,
    pub attribute_mapping: AttributeMappingConfig,
    /// Requires-update criteria, per entity type.
    pub requires_update: Vec<CriteriaConfig>,
    pub scopes: Vec<ScopeConfig>,
}

impl IndexSyncConfig {
    /// Loads a JSON config file.
    pub fn from_file(path: impl AsRef<Path>) -> IndexingResult<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects configurations that could never run correctly.
    pub fn validate(&self) -> IndexingResult<()> {
        let mut api_keys = BTreeSet::new();
        for scope in &self.scopes {
            if !api_keys.insert(scope.js_api_key.as_str()) {
                return Err(IndexingError::Config(format!(
                    "API key {} is bound to more than one scope",
                    scope.js_api_key
                )));
            }
        }
        if self.worker.batch_size == 0 {
            return Err(IndexingError::Config(
                "worker.batch_size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Sync worker settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Records claimed per API key per run.
    pub batch_size: usize,
    /// A lock older than this is considered abandoned.
    pub lock_stale_after_secs: u64,
    /// Upper bound on a single remote call, including retries inside the client.
    pub call_timeout_secs: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            lock_stale_after_secs: 30 * 60,
            call_timeout_secs: 60,
        }
    }
}

impl WorkerConfig {
    pub fn lock_stale_after(&self) -> chrono::Duration {
        chrono::Duration::seconds(i64::try_from(self.lock_stale_after_secs).unwrap_or(i64::MAX))
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub job_code: String,
    /// How far in the future a queued run is scheduled.
    pub delay_minutes: i64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            job_code: ATTRIBUTE_SYNC_JOB_CODE.to_string(),
            delay_minutes: 5,
        }
    }
}

/// Per-scope verbose logging of determiner decisions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    pub verbose_scopes: BTreeSet<u32>,
}

impl DiagnosticsConfig {
    pub fn is_verbose(&self, scope_id: u32) -> bool {
        self.verbose_scopes.contains(&scope_id)
    }
}

/// How local attribute codes become remote attribute names.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AttributeMappingConfig {
    /// Entity type whose attributes are synchronized.
    pub entity_type: String,
    /// Prepended to non-standard attribute codes.
    pub prefix: String,
    /// Explicit local code to remote name overrides.
    pub custom_mapping: BTreeMap<String, String>,
    /// Explicit local code to remote datatype overrides.
    pub custom_types: BTreeMap<String, String>,
}

impl Default for AttributeMappingConfig {
    fn default() -> Self {
        Self {
            entity_type: "product".to_string(),
            prefix: String::new(),
            custom_mapping: BTreeMap::new(),
            custom_types: BTreeMap::new(),
        }
    }
}

/// One requires-update criteria registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriteriaConfig {
    pub target_type: String,
    pub identifier: String,
    #[serde(flatten)]
    pub comparison: CriteriaComparison,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "comparison", rename_all = "snake_case")]
pub enum CriteriaComparison {
    /// Numeric difference beyond `tolerance`.
    Numeric { tolerance: f64 },
    /// Unordered collection membership.
    Set,
    Exact,
}

/// A scope and the account credentials bound to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScopeConfig {
    pub id: u32,
    pub code: String,
    pub js_api_key: String,
    pub rest_auth_key: String,
}

//! Command-line runner for the index sync engine.
//!
//! Each subcommand opens the record, schedule and cache databases under a
//! data directory, builds an [`IndexSync`] from a JSON config file and runs one
//! job. Host data (attribute definitions, catalog entities) is read from JSON
//! files, since the CLI has no direct access to the host catalog.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use indexsync_engine::{IndexSync, IndexSyncConfig, IndexSyncStores};
use indexsync_remote::HttpIndexingApi;
use indexsync_store::{
    IndexingRecordStore, ScheduleStatus, ScheduleStore, SqliteCacheStore, SqliteRecordStore,
    SqliteScheduleStore,
};
use indexsync_types::{Action, AttributeDefinition, CatalogEntity, RecordId, RecordKind};
use serde::de::DeserializeOwned;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

pub const RECORDS_DB: &str = "records.db";
pub const SCHEDULE_DB: &str = "schedule.db";
pub const CACHE_DB: &str = "cache.db";

#[derive(Parser, Debug)]
#[command(name = "indexsync")]
#[command(about = "Keeps a remote search index in sync with a host catalog")]
pub struct Cli {
    /// Path to the JSON config file
    #[arg(short, long, default_value = "indexsync.json")]
    pub config: PathBuf,

    /// Directory holding the record, schedule and cache databases
    #[arg(short, long, default_value = ".indexsync")]
    pub data_dir: PathBuf,

    /// Enable verbose debug logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Queue a run of the attribute sync job
    Schedule,
    /// Reconcile attribute records against host attribute definitions
    DiscoverAttributes {
        /// JSON array of attribute definitions
        #[arg(short, long)]
        attributes: PathBuf,
    },
    /// Reconcile entity records against host catalog entities
    DiscoverEntities {
        /// JSON array of catalog entities
        #[arg(short, long)]
        entities: PathBuf,
    },
    /// Push pending attribute records to the remote index
    SyncAttributes {
        /// JSON array of attribute definitions
        #[arg(short, long)]
        attributes: PathBuf,
    },
    /// Record that an entity push completed
    MarkSynced {
        record_id: RecordId,
        /// add, update or delete
        action: Action,
    },
    /// List the remote attributes for an API key
    ListAttributes {
        #[arg(long)]
        api_key: String,
    },
    /// Drop cached remote attribute listings
    ClearCache {
        /// Only clear these API keys; clears everything when omitted
        #[arg(long)]
        api_key: Vec<String>,
    },
    /// Print indexing records for an API key
    Status {
        #[arg(long)]
        api_key: String,
        /// Show entity records instead of attribute records
        #[arg(long)]
        entities: bool,
        /// Defaults to the configured `attribute_mapping.entity_type`
        #[arg(long)]
        target_type: Option<String>,
    },
}

/// An engine opened against on-disk stores.
pub struct Runner {
    sync: IndexSync,
    records: Arc<SqliteRecordStore>,
    schedules: Arc<SqliteScheduleStore>,
}

impl Runner {
    /// Loads the config and opens (creating if needed) the data directory.
    pub fn open(config_path: &Path, data_dir: &Path) -> Result<Self> {
        let config = IndexSyncConfig::from_file(config_path)
            .with_context(|| format!("Failed to load config {}", config_path.display()))?;
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create data dir {}", data_dir.display()))?;

        let records = Arc::new(
            SqliteRecordStore::open(data_dir.join(RECORDS_DB))
                .context("Failed to open record store")?,
        );
        let schedules = Arc::new(
            SqliteScheduleStore::open(data_dir.join(SCHEDULE_DB))
                .context("Failed to open schedule store")?,
        );
        let api = Arc::new(
            HttpIndexingApi::new(config.remote.clone()).context("Failed to build HTTP client")?,
        );
        let cache = Arc::new(
            SqliteCacheStore::open(data_dir.join(CACHE_DB))
                .context("Failed to open cache store")?,
        );
        let stores = IndexSyncStores {
            records: records.clone(),
            schedules: schedules.clone(),
            cache,
        };
        let sync = IndexSync::new(config, stores, api).context("Invalid configuration")?;

        Ok(Self {
            sync,
            records,
            schedules,
        })
    }

    pub fn sync(&self) -> &IndexSync {
        &self.sync
    }

    /// Runs one command, writing its report to `out`.
    pub async fn run(&self, command: &Command, out: &mut impl Write) -> Result<()> {
        match command {
            Command::Schedule => {
                self.sync.scheduler().execute();
                let job_code = self.sync.scheduler().job_code();
                let pending = self
                    .schedules
                    .find_by_job(job_code)?
                    .into_iter()
                    .filter(|entry| entry.status == ScheduleStatus::Pending)
                    .count();
                writeln!(out, "{job_code}: {pending} pending")?;
            }
            Command::DiscoverAttributes { attributes } => {
                let attributes: Vec<AttributeDefinition> = read_json(attributes)?;
                let result = self.sync.attribute_discovery().execute(&attributes);
                for message in result.messages() {
                    writeln!(out, "{message}")?;
                }
                anyhow::ensure!(result.is_success(), "attribute discovery failed");
            }
            Command::DiscoverEntities { entities } => {
                let entities: Vec<CatalogEntity> = read_json(entities)?;
                let result = self.sync.entity_discovery().execute(&entities);
                for message in result.messages() {
                    writeln!(out, "{message}")?;
                }
                anyhow::ensure!(result.is_success(), "entity discovery failed");
            }
            Command::SyncAttributes { attributes } => {
                let attributes: Vec<AttributeDefinition> = read_json(attributes)?;
                let summary = self
                    .sync
                    .attribute_worker()
                    .execute(&attributes)
                    .await
                    .context("Attribute sync aborted")?;
                for (target, result) in &summary.results {
                    let status = if result.is_success() { "ok" } else { "failed" };
                    writeln!(out, "{target}: {status} ({})", result.code())?;
                    for message in result.messages() {
                        writeln!(out, "  {message}")?;
                    }
                }
                writeln!(
                    out,
                    "{} succeeded, {} failed, {} skipped",
                    summary.succeeded, summary.failed, summary.skipped
                )?;
            }
            Command::MarkSynced { record_id, action } => {
                let recorded = self
                    .sync
                    .entity_recorder()
                    .record_success(*record_id, *action, Utc::now())?;
                if recorded {
                    writeln!(out, "record {record_id}: {action} recorded")?;
                } else {
                    writeln!(out, "record {record_id}: locked, try again later")?;
                }
            }
            Command::ListAttributes { api_key } => {
                let attributes = self.sync.attributes().get(api_key).await?;
                for attribute in attributes {
                    writeln!(out, "{}\t{}", attribute.attribute_name, attribute.datatype)?;
                }
            }
            Command::ClearCache { api_key } => {
                self.sync.clear_cache().execute(api_key)?;
                info!(keys = api_key.len(), "attribute cache cleared");
            }
            Command::Status {
                api_key,
                entities,
                target_type,
            } => {
                let kind = if *entities {
                    RecordKind::Entity
                } else {
                    RecordKind::Attribute
                };
                let target_type = target_type
                    .as_deref()
                    .unwrap_or(self.sync.config().attribute_mapping.entity_type.as_str());
                for record in self.records.find_all(kind, target_type, api_key)? {
                    writeln!(
                        out,
                        "{}\t{}\tindexable={}\tnext={}\tlast={}",
                        record.id,
                        record.key,
                        record.is_indexable,
                        record.next_action,
                        record.last_action
                    )?;
                }
            }
        }
        Ok(())
    }
}

/// Reads a JSON file into `T`.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Failed to parse {}", path.display()))
}

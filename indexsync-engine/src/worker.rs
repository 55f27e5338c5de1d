//! Sync workers: claim pending records, push them, release them.

use crate::actions::{DeleteAttributeAction, UpdateAttributeAction};
use crate::config::WorkerConfig;
use crate::criteria::RequiresUpdateEvaluator;
use crate::error::{IndexingError, IndexingResult};
use crate::mapping::RemoteAttributeBuilder;
use crate::scope::{ScopeBinding, ScopeProvider};
use chrono::{DateTime, Utc};
use indexsync_store::{IndexingRecordStore, PendingQuery};
use indexsync_types::{Action, AttributeDefinition, RecordId, RecordKind, SyncResult};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Local code reported when a remote call exceeds the worker's timeout.
pub const TIMEOUT_CODE: u16 = 504;

/// Local code reported when the host attribute behind a record is gone.
pub const MISSING_DEFINITION_CODE: u16 = 404;

/// Outcome of one worker run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncSummary {
    pub succeeded: usize,
    pub failed: usize,
    /// Records locked by another worker.
    pub skipped: usize,
    /// Per record target id, the result of its remote call.
    pub results: Vec<(String, SyncResult)>,
}

impl SyncSummary {
    fn push(&mut self, target_id: &str, result: SyncResult) {
        if result.is_success() {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
        self.results.push((target_id.to_string(), result));
    }
}

/// Pushes pending attribute records for every configured scope.
///
/// The success event of each action is expected to reach an
/// [`AttributeRecordUpdater`](crate::events::AttributeRecordUpdater), which
/// advances the record. A failed push leaves `next_action` in place for the
/// next run.
pub struct AttributeSyncWorker {
    store: Arc<dyn IndexingRecordStore>,
    scopes: Arc<dyn ScopeProvider>,
    builder: RemoteAttributeBuilder,
    update: UpdateAttributeAction,
    delete: DeleteAttributeAction,
    config: WorkerConfig,
}

impl AttributeSyncWorker {
    pub fn new(
        store: Arc<dyn IndexingRecordStore>,
        scopes: Arc<dyn ScopeProvider>,
        builder: RemoteAttributeBuilder,
        update: UpdateAttributeAction,
        delete: DeleteAttributeAction,
        config: WorkerConfig,
    ) -> Self {
        Self {
            store,
            scopes,
            builder,
            update,
            delete,
            config,
        }
    }

    pub async fn execute(&self, attributes: &[AttributeDefinition]) -> IndexingResult<SyncSummary> {
        self.execute_at(attributes, Utc::now()).await
    }

    /// Processes up to `batch_size` pending records per scope.
    ///
    /// Stops at the first credential or configuration error; every claimed
    /// record is released first.
    pub async fn execute_at(
        &self,
        attributes: &[AttributeDefinition],
        now: DateTime<Utc>,
    ) -> IndexingResult<SyncSummary> {
        let definitions: HashMap<&str, &AttributeDefinition> = attributes
            .iter()
            .map(|attribute| (attribute.code.as_str(), attribute))
            .collect();
        let stale_before = now - self.config.lock_stale_after();
        let mut summary = SyncSummary::default();

        for binding in self.scopes.bindings() {
            let query = PendingQuery::new(
                RecordKind::Attribute,
                self.builder.names().entity_type(),
                binding.api_key(),
            )
            .with_limit(self.config.batch_size);

            for record in self.store.find_pending(&query)? {
                if !self.store.claim(record.id, now, stale_before)? {
                    debug!(record = %record.key, "record locked; skipping");
                    summary.skipped += 1;
                    continue;
                }

                let outcome = self.process(&binding, record.id, &definitions).await;
                let released = self.store.release(record.id);
                if let Some(result) = outcome? {
                    summary.push(record.target_id(), result);
                }
                released?;
            }
        }

        info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            skipped = summary.skipped,
            "attribute sync finished"
        );
        Ok(summary)
    }

    async fn process(
        &self,
        binding: &ScopeBinding,
        id: RecordId,
        definitions: &HashMap<&str, &AttributeDefinition>,
    ) -> IndexingResult<Option<SyncResult>> {
        // Re-read under the claim; the record may have been synced since
        // the pending query ran.
        let record = self.store.get(id)?;
        let (action, remote) = match record.next_action {
            Action::NoAction => return Ok(None),
            Action::Delete => (
                &self.delete,
                self.builder.build_for_deletion(record.target_id())?,
            ),
            Action::Add | Action::Update => match definitions.get(record.target_id()) {
                Some(definition) => (
                    &self.update,
                    self.builder
                        .build(definition, std::slice::from_ref(&binding.scope))?,
                ),
                None => {
                    warn!(record = %record.key, "attribute definition no longer exists");
                    return Ok(Some(SyncResult::failure(
                        MISSING_DEFINITION_CODE,
                        vec![format!("attribute {} no longer exists", record.target_id())],
                    )));
                }
            },
        };

        let call = action.execute(&binding.credentials, &remote, record.target_type());
        match tokio::time::timeout(self.config.call_timeout(), call).await {
            Ok(result) => result.map(Some),
            Err(_) => {
                warn!(
                    record = %record.key,
                    timeout_secs = self.config.call_timeout_secs,
                    "remote call timed out"
                );
                Ok(Some(SyncResult::failure(
                    TIMEOUT_CODE,
                    vec![format!(
                        "remote call timed out after {}s",
                        self.config.call_timeout_secs
                    )],
                )))
            }
        }
    }
}

/// Records a completed entity push: stores the criteria snapshot the remote
/// copy was built from and clears the pending action.
pub struct EntitySyncRecorder {
    store: Arc<dyn IndexingRecordStore>,
    evaluator: Arc<RequiresUpdateEvaluator>,
    lock_stale_after: chrono::Duration,
}

impl EntitySyncRecorder {
    pub fn new(
        store: Arc<dyn IndexingRecordStore>,
        evaluator: Arc<RequiresUpdateEvaluator>,
        lock_stale_after: chrono::Duration,
    ) -> Self {
        Self {
            store,
            evaluator,
            lock_stale_after,
        }
    }

    /// Returns `false` without changes if another worker holds the lock.
    pub fn record_success(
        &self,
        id: RecordId,
        action: Action,
        now: DateTime<Utc>,
    ) -> IndexingResult<bool> {
        if !action.is_pending() {
            return Err(IndexingError::Config(format!(
                "cannot record a sync with action {action}"
            )));
        }
        if !self.store.claim(id, now, now - self.lock_stale_after)? {
            return Ok(false);
        }

        let outcome = self.apply(id, action, now);
        let released = self.store.release(id);
        outcome?;
        released?;
        Ok(true)
    }

    fn apply(&self, id: RecordId, action: Action, now: DateTime<Utc>) -> IndexingResult<()> {
        let mut record = self.store.get(id)?;
        let snapshot = if action == Action::Delete {
            serde_json::Map::new()
        } else {
            self.evaluator.snapshot(record.target_type(), &record)
        };
        record.record_sync_success(action, now, snapshot);
        self.store.save(&record)?;
        debug!(record = %record.key, %action, "entity record marked as synced");
        Ok(())
    }
}

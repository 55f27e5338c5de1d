//! Discovery: decides the next action for every target in every scope.
//!
//! Discovery never talks to the remote service. It runs each target through
//! its indexability pipeline and records what the sync worker should do
//! next, together with the values the next push would be built from.
//! Existing records are only mutated under a claim.

use crate::criteria::RequiresUpdateEvaluator;
use crate::determiner::IndexableDeterminerPipeline;
use crate::events::FINGERPRINT_KEY;
use crate::mapping::{fingerprint, RemoteAttributeBuilder};
use crate::scope::{ScopeBinding, ScopeProvider};
use chrono::{DateTime, Duration, Utc};
use indexsync_store::{IndexingRecordStore, StoreError, StoreResult};
use indexsync_types::{
    Action, AttributeDefinition, CatalogEntity, DiscoveryResult, IndexingRecord,
    NewIndexingRecord, RecordKey, RecordKind,
};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Next action for an existing record.
///
/// `stale` is only consulted for records that are indexable and already in
/// the remote index.
fn decide(record: &IndexingRecord, indexable: bool, stale: &dyn Fn(&IndexingRecord) -> bool) -> (Action, bool) {
    match (indexable, record.is_indexed()) {
        (true, false) => (Action::Add, false),
        (false, true) => (Action::Delete, false),
        (false, false) => (Action::NoAction, false),
        (true, true) => {
            if record.next_action == Action::Update {
                (Action::Update, record.requires_update)
            } else if stale(record) {
                (Action::Update, true)
            } else {
                (Action::NoAction, false)
            }
        }
    }
}

fn unchanged(
    record: &IndexingRecord,
    indexable: bool,
    observed: &Map<String, Value>,
    action: Action,
    requires_update: bool,
) -> bool {
    record.is_indexable == indexable
        && record.next_action == action
        && record.requires_update == requires_update
        && record.current_values == *observed
}

/// Runs `decide` as if `observed` were already stored on the record.
fn decide_observed(
    record: &IndexingRecord,
    indexable: bool,
    observed: &Map<String, Value>,
    stale: &dyn Fn(&IndexingRecord) -> bool,
) -> (Action, bool) {
    if record.current_values == *observed {
        return decide(record, indexable, stale);
    }
    let mut candidate = record.clone();
    candidate.current_values = observed.clone();
    decide(&candidate, indexable, stale)
}

/// Stale when the definition pushed last differs from the one discovery
/// would push now. Records synced without a fingerprint are never stale.
fn definition_changed(record: &IndexingRecord) -> bool {
    match (
        record.requires_update_orig_values.get(FINGERPRINT_KEY),
        record.current_values.get(FINGERPRINT_KEY),
    ) {
        (Some(pushed), Some(current)) => pushed != current,
        _ => false,
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DiscoveryStats {
    pub created: usize,
    pub updated: usize,
    /// Records skipped because another process held their lock.
    pub locked: usize,
}

/// Applies discovery decisions for one scope.
struct Reconciler<'a> {
    store: &'a dyn IndexingRecordStore,
    now: DateTime<Utc>,
    stale_before: DateTime<Utc>,
    stats: DiscoveryStats,
}

impl<'a> Reconciler<'a> {
    fn new(store: &'a dyn IndexingRecordStore, now: DateTime<Utc>, lock_stale_after: Duration) -> Self {
        Self {
            store,
            now,
            stale_before: now - lock_stale_after,
            stats: DiscoveryStats::default(),
        }
    }

    fn reconcile(
        &mut self,
        key: RecordKey,
        indexable: bool,
        observed: Map<String, Value>,
        stale: &dyn Fn(&IndexingRecord) -> bool,
    ) -> StoreResult<()> {
        match self.store.find(&key)? {
            Some(record) => self.reconcile_existing(record, indexable, &observed, stale),
            // Targets that were never indexable need no record.
            None if !indexable => Ok(()),
            None => match self.store.insert(
                &NewIndexingRecord::new(key, true, Action::Add).with_current_values(observed),
            ) {
                Ok(_) => {
                    self.stats.created += 1;
                    Ok(())
                }
                Err(StoreError::Duplicate(key)) => {
                    debug!(record = %key, "record created concurrently; skipping");
                    self.stats.locked += 1;
                    Ok(())
                }
                Err(e) => Err(e),
            },
        }
    }

    fn reconcile_existing(
        &mut self,
        record: IndexingRecord,
        indexable: bool,
        observed: &Map<String, Value>,
        stale: &dyn Fn(&IndexingRecord) -> bool,
    ) -> StoreResult<()> {
        let (action, requires_update) = decide_observed(&record, indexable, observed, stale);
        if unchanged(&record, indexable, observed, action, requires_update) {
            return Ok(());
        }

        if !self.store.claim(record.id, self.now, self.stale_before)? {
            debug!(record = %record.key, "record locked; skipping");
            self.stats.locked += 1;
            return Ok(());
        }

        // Re-read under the claim; another worker may have synced it.
        let outcome = self.apply_claimed(record.id, indexable, observed, stale);
        let released = self.store.release(record.id);
        outcome?;
        released
    }

    fn apply_claimed(
        &mut self,
        id: indexsync_types::RecordId,
        indexable: bool,
        observed: &Map<String, Value>,
        stale: &dyn Fn(&IndexingRecord) -> bool,
    ) -> StoreResult<()> {
        let mut record = self.store.get(id)?;
        let (action, requires_update) = decide_observed(&record, indexable, observed, stale);
        if unchanged(&record, indexable, observed, action, requires_update) {
            return Ok(());
        }
        // Refreshed values alone do not count as an update.
        let state_changed = !unchanged(&record, indexable, &record.current_values, action, requires_update);
        record.current_values = observed.clone();
        record.is_indexable = indexable;
        record.next_action = action;
        record.requires_update = requires_update;
        self.store.save(&record)?;
        if state_changed {
            debug!(record = %record.key, next_action = %action, "record updated");
            self.stats.updated += 1;
        }
        Ok(())
    }
}

fn summarize(binding: &ScopeBinding, stats: DiscoveryStats) -> String {
    format!(
        "{}: {} created, {} updated, {} locked",
        binding.scope, stats.created, stats.updated, stats.locked
    )
}

fn finish(kind: &str, messages: Vec<String>, failed: bool) -> DiscoveryResult {
    if failed {
        error!(kind, messages = ?messages, "discovery finished with errors");
        DiscoveryResult::failure(messages)
    } else {
        info!(kind, messages = ?messages, "discovery finished");
        DiscoveryResult::success(messages)
    }
}

/// Discovery for attribute definitions of one entity type.
///
/// An indexed attribute whose remote definition (name, type, labels, flags)
/// changed since its last push is marked for update.
pub struct AttributeDiscovery {
    store: Arc<dyn IndexingRecordStore>,
    pipeline: Arc<IndexableDeterminerPipeline<AttributeDefinition>>,
    scopes: Arc<dyn ScopeProvider>,
    builder: RemoteAttributeBuilder,
    lock_stale_after: Duration,
}

impl AttributeDiscovery {
    pub fn new(
        store: Arc<dyn IndexingRecordStore>,
        pipeline: Arc<IndexableDeterminerPipeline<AttributeDefinition>>,
        scopes: Arc<dyn ScopeProvider>,
        builder: RemoteAttributeBuilder,
        lock_stale_after: Duration,
    ) -> Self {
        Self {
            store,
            pipeline,
            scopes,
            builder,
            lock_stale_after,
        }
    }

    fn entity_type(&self) -> &str {
        self.builder.names().entity_type()
    }

    /// Fingerprint of what the worker would push for `attribute` in this
    /// scope. Empty when the attribute cannot be mapped.
    fn observe(&self, binding: &ScopeBinding, attribute: &AttributeDefinition) -> Map<String, Value> {
        let mut observed = Map::new();
        match self
            .builder
            .build(attribute, std::slice::from_ref(&binding.scope))
        {
            Ok(remote) => {
                observed.insert(FINGERPRINT_KEY.to_string(), Value::String(fingerprint(&remote)));
            }
            Err(e) => {
                warn!(attribute = attribute.code.as_str(), error = %e, "cannot build remote attribute");
            }
        }
        observed
    }

    pub fn execute(&self, attributes: &[AttributeDefinition]) -> DiscoveryResult {
        self.execute_at(attributes, Utc::now())
    }

    /// `attributes` is the full host attribute list; records for codes not
    /// in it are treated as non-indexable.
    pub fn execute_at(&self, attributes: &[AttributeDefinition], now: DateTime<Utc>) -> DiscoveryResult {
        let mut messages = Vec::new();
        let mut failed = false;
        for binding in self.scopes.bindings() {
            match self.discover_scope(&binding, attributes, now) {
                Ok(stats) => messages.push(summarize(&binding, stats)),
                Err(e) => {
                    failed = true;
                    messages.push(format!("{}: {e}", binding.scope));
                }
            }
        }
        finish("attribute", messages, failed)
    }

    fn discover_scope(
        &self,
        binding: &ScopeBinding,
        attributes: &[AttributeDefinition],
        now: DateTime<Utc>,
    ) -> StoreResult<DiscoveryStats> {
        let mut reconciler = Reconciler::new(self.store.as_ref(), now, self.lock_stale_after);
        let stale = |record: &IndexingRecord| definition_changed(record);

        let mut known = BTreeSet::new();
        for attribute in attributes {
            known.insert(attribute.code.as_str());
            let indexable = self.pipeline.execute(attribute, &binding.scope);
            let key = RecordKey::attribute(
                self.entity_type(),
                attribute.code.as_str(),
                binding.api_key(),
            );
            reconciler.reconcile(key, indexable, self.observe(binding, attribute), &stale)?;
        }

        let existing =
            self.store
                .find_all(RecordKind::Attribute, self.entity_type(), binding.api_key())?;
        for record in existing {
            if !known.contains(record.target_id()) {
                let observed = record.current_values.clone();
                reconciler.reconcile_existing(record, false, &observed, &stale)?;
            }
        }

        Ok(reconciler.stats)
    }
}

/// Discovery for catalog entities, including requires-update detection.
pub struct EntityDiscovery {
    store: Arc<dyn IndexingRecordStore>,
    pipeline: Arc<IndexableDeterminerPipeline<CatalogEntity>>,
    evaluator: Arc<RequiresUpdateEvaluator>,
    scopes: Arc<dyn ScopeProvider>,
    lock_stale_after: Duration,
}

impl EntityDiscovery {
    /// `evaluator`'s criteria are expected to read live values from the
    /// record, as [`StoredValueSource`](crate::criteria::StoredValueSource)
    /// does.
    pub fn new(
        store: Arc<dyn IndexingRecordStore>,
        pipeline: Arc<IndexableDeterminerPipeline<CatalogEntity>>,
        evaluator: Arc<RequiresUpdateEvaluator>,
        scopes: Arc<dyn ScopeProvider>,
        lock_stale_after: Duration,
    ) -> Self {
        Self {
            store,
            pipeline,
            evaluator,
            scopes,
            lock_stale_after,
        }
    }

    pub fn execute(&self, entities: &[CatalogEntity]) -> DiscoveryResult {
        self.execute_at(entities, Utc::now())
    }

    /// `entities` may be a partial batch; records of entities not in it are
    /// left alone.
    pub fn execute_at(&self, entities: &[CatalogEntity], now: DateTime<Utc>) -> DiscoveryResult {
        let mut messages = Vec::new();
        let mut failed = false;
        for binding in self.scopes.bindings() {
            match self.discover_scope(&binding, entities, now) {
                Ok(stats) => messages.push(summarize(&binding, stats)),
                Err(e) => {
                    failed = true;
                    messages.push(format!("{}: {e}", binding.scope));
                }
            }
        }
        finish("entity", messages, failed)
    }

    fn discover_scope(
        &self,
        binding: &ScopeBinding,
        entities: &[CatalogEntity],
        now: DateTime<Utc>,
    ) -> StoreResult<DiscoveryStats> {
        let mut reconciler = Reconciler::new(self.store.as_ref(), now, self.lock_stale_after);
        let stale = |record: &IndexingRecord| self.evaluator.execute(record);

        for entity in entities {
            let indexable = self.pipeline.execute(entity, &binding.scope);
            let mut key = RecordKey::entity(
                entity.entity_type.as_str(),
                entity.id.as_str(),
                binding.api_key(),
            );
            if let Some(parent) = &entity.parent_id {
                key = key.with_parent(parent.as_str());
            }
            let observed = self
                .evaluator
                .observe(entity.entity_type.as_str(), &entity.values);
            reconciler.reconcile(key, indexable, observed, &stale)?;
        }

        Ok(reconciler.stats)
    }
}

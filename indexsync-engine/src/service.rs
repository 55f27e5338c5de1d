//! Wiring of the engine components from configuration.

use crate::actions::AttributeSyncAction;
use crate::cache::{AttributesProvider, ClearAttributesCacheAction};
use crate::config::IndexSyncConfig;
use crate::criteria::{CriteriaRegistry, RequiresUpdateEvaluator, StoredValueSource};
use crate::determiner::{attribute_pipeline, entity_pipeline};
use crate::discovery::{AttributeDiscovery, EntityDiscovery};
use crate::error::IndexingResult;
use crate::events::{AttributeRecordUpdater, BroadcastEventBus};
use crate::mapping::{AttributeMapper, AttributeTypeMapper, RemoteAttributeBuilder};
use crate::scheduler::CronScheduler;
use crate::scope::{ScopeProvider, StaticScopeRegistry};
use crate::worker::{AttributeSyncWorker, EntitySyncRecorder};
use indexsync_remote::IndexingApi;
use indexsync_store::{CacheStore, IndexingRecordStore, ScheduleStore};
use std::sync::Arc;

/// Storage backends the engine runs against.
#[derive(Clone)]
pub struct IndexSyncStores {
    pub records: Arc<dyn IndexingRecordStore>,
    pub schedules: Arc<dyn ScheduleStore>,
    pub cache: Arc<dyn CacheStore>,
}

/// Every engine component, built once at startup.
pub struct IndexSync {
    config: IndexSyncConfig,
    events: Arc<BroadcastEventBus>,
    attribute_discovery: AttributeDiscovery,
    entity_discovery: EntityDiscovery,
    attribute_worker: AttributeSyncWorker,
    entity_recorder: EntitySyncRecorder,
    attributes: AttributesProvider,
    clear_cache: ClearAttributesCacheAction,
    scheduler: CronScheduler,
}

impl IndexSync {
    pub fn new(
        config: IndexSyncConfig,
        stores: IndexSyncStores,
        api: Arc<dyn IndexingApi>,
    ) -> IndexingResult<Self> {
        config.validate()?;

        let scopes: Arc<dyn ScopeProvider> =
            Arc::new(StaticScopeRegistry::from_config(&config.scopes));
        let names = Arc::new(AttributeMapper::from_config(&config.attribute_mapping));
        let types = Arc::new(AttributeTypeMapper::new(
            &config.attribute_mapping.custom_types,
        ));
        let builder = RemoteAttributeBuilder::new(names.clone(), types);

        let registry =
            CriteriaRegistry::from_config(&config.requires_update, Arc::new(StoredValueSource));
        let evaluator = Arc::new(RequiresUpdateEvaluator::new(Arc::new(registry)));

        let events = Arc::new(BroadcastEventBus::default());
        let updater = Arc::new(AttributeRecordUpdater::new(stores.records.clone(), names.clone()));
        let update = AttributeSyncAction::update(api.clone())
            .with_handler(updater.clone())
            .with_handler(events.clone());
        let delete = AttributeSyncAction::delete(api.clone())
            .with_handler(updater)
            .with_handler(events.clone());

        let lock_stale_after = config.worker.lock_stale_after();
        let attribute_discovery = AttributeDiscovery::new(
            stores.records.clone(),
            Arc::new(attribute_pipeline(config.diagnostics.clone())),
            scopes.clone(),
            builder.clone(),
            lock_stale_after,
        );
        let entity_discovery = EntityDiscovery::new(
            stores.records.clone(),
            Arc::new(entity_pipeline(config.diagnostics.clone())),
            evaluator.clone(),
            scopes.clone(),
            lock_stale_after,
        );
        let attribute_worker = AttributeSyncWorker::new(
            stores.records.clone(),
            scopes.clone(),
            builder,
            update,
            delete,
            config.worker.clone(),
        );
        let entity_recorder =
            EntitySyncRecorder::new(stores.records.clone(), evaluator, lock_stale_after);

        Ok(Self {
            attributes: AttributesProvider::new(stores.cache.clone(), scopes, api),
            clear_cache: ClearAttributesCacheAction::new(stores.cache),
            scheduler: CronScheduler::new(stores.schedules, &config.scheduler),
            config,
            events,
            attribute_discovery,
            entity_discovery,
            attribute_worker,
            entity_recorder,
        })
    }

    pub fn config(&self) -> &IndexSyncConfig {
        &self.config
    }

    pub fn events(&self) -> &BroadcastEventBus {
        &self.events
    }

    pub fn attribute_discovery(&self) -> &AttributeDiscovery {
        &self.attribute_discovery
    }

    pub fn entity_discovery(&self) -> &EntityDiscovery {
        &self.entity_discovery
    }

    pub fn attribute_worker(&self) -> &AttributeSyncWorker {
        &self.attribute_worker
    }

    pub fn entity_recorder(&self) -> &EntitySyncRecorder {
        &self.entity_recorder
    }

    pub fn attributes(&self) -> &AttributesProvider {
        &self.attributes
    }

    pub fn clear_cache(&self) -> &ClearAttributesCacheAction {
        &self.clear_cache
    }

    pub fn scheduler(&self) -> &CronScheduler {
        &self.scheduler
    }
}

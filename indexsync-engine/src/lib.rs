//! Indexing sync engine.
//!
//! Keeps host catalog entities and attribute definitions in step with a
//! remote search index:
//!
//! - [`determiner`] decides whether a target may be indexed in a scope.
//! - [`criteria`] decides whether an indexed entity has gone stale.
//! - [`discovery`] turns those decisions into pending record actions.
//! - [`worker`] claims pending records and pushes them through [`actions`].
//! - [`cache`] keeps the remote attribute list per API key.
//! - [`scheduler`] queues the sync job without duplicates.
//!
//! [`IndexSync`] wires all of it from an [`IndexSyncConfig`].

pub mod actions;
pub mod cache;
pub mod config;
pub mod criteria;
pub mod determiner;
pub mod discovery;
pub mod error;
pub mod events;
pub mod mapping;
pub mod scheduler;
pub mod scope;
pub mod service;
pub mod worker;

pub use actions::{AttributeOperation, AttributeSyncAction, DeleteAttributeAction, UpdateAttributeAction};
pub use cache::{
    AttributesCacheKeyProvider, AttributesProvider, CacheAttributesAction,
    CachedAttributesProvider, ClearAttributesCacheAction,
};
pub use config::{
    AttributeMappingConfig, CriteriaComparison, CriteriaConfig, DiagnosticsConfig,
    IndexSyncConfig, SchedulerConfig, ScopeConfig, WorkerConfig,
};
pub use criteria::{
    CriteriaRegistry, CurrentValueSource, RequiresUpdateCriteria, RequiresUpdateEvaluator,
    StoredValueSource,
};
pub use determiner::{IndexableDeterminerPipeline, IsIndexableDeterminer};
pub use discovery::{AttributeDiscovery, DiscoveryStats, EntityDiscovery};
pub use error::{IndexingError, IndexingResult};
pub use events::{AttributeRecordUpdater, BroadcastEventBus, SyncEvent, SyncEventHandler};
pub use mapping::{AttributeMapper, AttributeTypeMapper, RemoteAttributeBuilder};
pub use scheduler::CronScheduler;
pub use scope::{ScopeBinding, ScopeProvider, StaticScopeRegistry};
pub use service::{IndexSync, IndexSyncStores};
pub use worker::{AttributeSyncWorker, EntitySyncRecorder, SyncSummary};

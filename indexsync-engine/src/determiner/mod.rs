//! Indexability decisions.
//!
//! A target is indexable in a scope only when every determiner in its
//! pipeline agrees. The pipeline stops at the first negative answer unless
//! diagnostics are enabled for the scope, in which case every determiner
//! runs and each negative decision is logged.

mod attribute;
mod entity;

pub use attribute::{
    AttributeIndexableFlagDeterminer, AttributeNotReservedDeterminer, AttributeScopeDeterminer,
    RESERVED_ATTRIBUTE_CODES,
};
pub use entity::{EntityEnabledDeterminer, EntityScopeDeterminer, EntitySearchVisibilityDeterminer};

use crate::config::DiagnosticsConfig;
use indexsync_types::{AttributeDefinition, CatalogEntity, Scope};
use tracing::debug;

/// Something a pipeline can describe in its diagnostics.
pub trait IndexingTarget {
    fn target_label(&self) -> String;
}

impl IndexingTarget for AttributeDefinition {
    fn target_label(&self) -> String {
        format!("attribute {}", self.code)
    }
}

impl IndexingTarget for CatalogEntity {
    fn target_label(&self) -> String {
        match &self.parent_id {
            Some(parent) => format!("{} {} (parent {parent})", self.entity_type, self.id),
            None => format!("{} {}", self.entity_type, self.id),
        }
    }
}

/// One rule deciding whether a target may be indexed in a scope.
pub trait IsIndexableDeterminer<T: ?Sized>: Send + Sync {
    /// Name used in diagnostics.
    fn name(&self) -> &'static str;

    fn execute(&self, target: &T, scope: &Scope) -> bool;
}

/// Ordered AND over a list of determiners.
pub struct IndexableDeterminerPipeline<T: ?Sized> {
    determiners: Vec<Box<dyn IsIndexableDeterminer<T>>>,
    diagnostics: DiagnosticsConfig,
}

impl<T: IndexingTarget + ?Sized> IndexableDeterminerPipeline<T> {
    pub fn new(diagnostics: DiagnosticsConfig) -> Self {
        Self {
            determiners: Vec::new(),
            diagnostics,
        }
    }

    /// Appends a determiner; determiners run in insertion order.
    pub fn with(mut self, determiner: impl IsIndexableDeterminer<T> + 'static) -> Self {
        self.determiners.push(Box::new(determiner));
        self
    }

    pub fn len(&self) -> usize {
        self.determiners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.determiners.is_empty()
    }

    /// Whether `target` is indexable in `scope`. An empty pipeline allows
    /// everything.
    pub fn execute(&self, target: &T, scope: &Scope) -> bool {
        let verbose = self.diagnostics.is_verbose(scope.id);
        let mut indexable = true;

        for determiner in &self.determiners {
            if determiner.execute(target, scope) {
                continue;
            }
            indexable = false;
            if !verbose {
                break;
            }
            debug!(
                target_label = %target.target_label(),
                scope = %scope,
                determiner = determiner.name(),
                "target is not indexable"
            );
        }

        indexable
    }
}

/// Default pipeline for catalog entities.
pub fn entity_pipeline(diagnostics: DiagnosticsConfig) -> IndexableDeterminerPipeline<CatalogEntity> {
    IndexableDeterminerPipeline::new(diagnostics)
        .with(EntityEnabledDeterminer)
        .with(EntitySearchVisibilityDeterminer)
        .with(EntityScopeDeterminer)
}

/// Default pipeline for attribute definitions.
pub fn attribute_pipeline(
    diagnostics: DiagnosticsConfig,
) -> IndexableDeterminerPipeline<AttributeDefinition> {
    IndexableDeterminerPipeline::new(diagnostics)
        .with(AttributeNotReservedDeterminer)
        .with(AttributeIndexableFlagDeterminer)
        .with(AttributeScopeDeterminer)
}

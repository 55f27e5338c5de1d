use super::IsIndexableDeterminer;
use indexsync_types::{CatalogEntity, Scope};

/// Disabled entities are never indexed.
#[derive(Debug, Clone, Copy, Default)]
pub struct EntityEnabledDeterminer;

impl IsIndexableDeterminer<CatalogEntity> for EntityEnabledDeterminer {
    fn name(&self) -> &'static str {
        "entity_enabled"
    }

    fn execute(&self, target: &CatalogEntity, _scope: &Scope) -> bool {
        target.enabled
    }
}

/// Entities hidden from search are never indexed.
#[derive(Debug, Clone, Copy, Default)]
pub struct EntitySearchVisibilityDeterminer;

impl IsIndexableDeterminer<CatalogEntity> for EntitySearchVisibilityDeterminer {
    fn name(&self) -> &'static str {
        "entity_search_visibility"
    }

    fn execute(&self, target: &CatalogEntity, _scope: &Scope) -> bool {
        target.visible_in_search
    }
}

/// The entity must be assigned to the scope.
#[derive(Debug, Clone, Copy, Default)]
pub struct EntityScopeDeterminer;

impl IsIndexableDeterminer<CatalogEntity> for EntityScopeDeterminer {
    fn name(&self) -> &'static str {
        "entity_scope"
    }

    fn execute(&self, target: &CatalogEntity, scope: &Scope) -> bool {
        target.scope_ids.contains(&scope.id)
    }
}

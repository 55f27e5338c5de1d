use super::IsIndexableDeterminer;
use indexsync_types::{AttributeDefinition, Scope};

/// Host-internal attribute codes that never leave the host.
pub const RESERVED_ATTRIBUTE_CODES: &[&str] = &[
    "entity_id",
    "entity_type_id",
    "attribute_set_id",
    "type_id",
    "row_id",
    "has_options",
    "required_options",
];

#[derive(Debug, Clone, Copy, Default)]
pub struct AttributeNotReservedDeterminer;

impl IsIndexableDeterminer<AttributeDefinition> for AttributeNotReservedDeterminer {
    fn name(&self) -> &'static str {
        "attribute_not_reserved"
    }

    fn execute(&self, target: &AttributeDefinition, _scope: &Scope) -> bool {
        !RESERVED_ATTRIBUTE_CODES.contains(&target.code.as_str())
    }
}

/// Honors the host's per-attribute indexing flag.
#[derive(Debug, Clone, Copy, Default)]
pub struct AttributeIndexableFlagDeterminer;

impl IsIndexableDeterminer<AttributeDefinition> for AttributeIndexableFlagDeterminer {
    fn name(&self) -> &'static str {
        "attribute_indexable_flag"
    }

    fn execute(&self, target: &AttributeDefinition, _scope: &Scope) -> bool {
        target.is_indexable
    }
}

/// The attribute must be available in the scope.
#[derive(Debug, Clone, Copy, Default)]
pub struct AttributeScopeDeterminer;

impl IsIndexableDeterminer<AttributeDefinition> for AttributeScopeDeterminer {
    fn name(&self) -> &'static str {
        "attribute_scope"
    }

    fn execute(&self, target: &AttributeDefinition, scope: &Scope) -> bool {
        target.in_scope(scope.id)
    }
}

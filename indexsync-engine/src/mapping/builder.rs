use super::{AttributeMapper, AttributeTypeMapper};
use crate::error::IndexingResult;
use indexsync_types::{AttributeDefinition, RemoteAttribute, RemoteDataType, Scope};
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// Label key used when no scope-specific label applies.
const DEFAULT_LABEL_KEY: &str = "default";

/// Builds the remote representation of a host attribute.
#[derive(Clone)]
pub struct RemoteAttributeBuilder {
    names: Arc<AttributeMapper>,
    types: Arc<AttributeTypeMapper>,
}

impl RemoteAttributeBuilder {
    pub fn new(names: Arc<AttributeMapper>, types: Arc<AttributeTypeMapper>) -> Self {
        Self { names, types }
    }

    pub fn names(&self) -> &AttributeMapper {
        &self.names
    }

    /// Remote attribute for `attribute`, labelled for each of `scopes` it
    /// is visible in.
    pub fn build(
        &self,
        attribute: &AttributeDefinition,
        scopes: &[Scope],
    ) -> IndexingResult<RemoteAttribute> {
        let mut remote =
            RemoteAttribute::new(self.names.get(attribute)?, self.types.execute(attribute));

        let label = attribute
            .label
            .clone()
            .unwrap_or_else(|| attribute.code.clone());
        for scope in scopes.iter().filter(|scope| attribute.in_scope(scope.id)) {
            remote.label.insert(scope.code.clone(), label.clone());
        }
        remote.label.insert(DEFAULT_LABEL_KEY.to_string(), label);

        remote.searchable = attribute.is_searchable;
        remote.filterable = attribute.is_filterable;
        remote.returnable = attribute.is_returnable;
        Ok(remote)
    }

    /// Minimal remote attribute addressing `code`, for deletes where the
    /// host definition may no longer exist.
    pub fn build_for_deletion(&self, code: &str) -> IndexingResult<RemoteAttribute> {
        Ok(RemoteAttribute::new(
            self.names.get_by_code(code)?,
            RemoteDataType::String,
        ))
    }
}

/// Hex sha256 over the pushed fields of `remote`. Two builds of the same
/// definition for the same scope always agree.
pub fn fingerprint(remote: &RemoteAttribute) -> String {
    let mut hasher = Sha256::new();
    hasher.update(remote.attribute_name.as_bytes());
    hasher.update([0]);
    hasher.update(remote.datatype.as_str().as_bytes());
    for (scope, label) in &remote.label {
        hasher.update([0]);
        hasher.update(scope.as_bytes());
        hasher.update([1]);
        hasher.update(label.as_bytes());
    }
    hasher.update([
        0,
        u8::from(remote.searchable),
        u8::from(remote.filterable),
        u8::from(remote.returnable),
    ]);
    hex::encode(hasher.finalize())
}

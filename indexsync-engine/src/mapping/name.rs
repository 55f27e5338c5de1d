use crate::config::AttributeMappingConfig;
use crate::error::{IndexingError, IndexingResult};
use indexsync_types::AttributeDefinition;
use std::collections::BTreeMap;

/// Remote names the service defines itself. They are never prefixed.
pub const STANDARD_ATTRIBUTE_NAMES: &[&str] = &[
    "sku",
    "name",
    "description",
    "shortDescription",
    "price",
    "salePrice",
    "url",
    "image",
    "inStock",
    "rating",
    "visibility",
    "tags",
    "categoryPath",
    "createdAt",
];

pub fn is_standard_attribute(name: &str) -> bool {
    STANDARD_ATTRIBUTE_NAMES.contains(&name)
}

/// Translates between local attribute codes and remote attribute names.
#[derive(Debug, Clone)]
pub struct AttributeMapper {
    entity_type: String,
    prefix: String,
    custom_mapping: BTreeMap<String, String>,
}

impl AttributeMapper {
    pub fn new(
        entity_type: impl Into<String>,
        prefix: impl Into<String>,
        custom_mapping: BTreeMap<String, String>,
    ) -> Self {
        Self {
            entity_type: entity_type.into(),
            prefix: prefix.into(),
            custom_mapping,
        }
    }

    pub fn from_config(config: &AttributeMappingConfig) -> Self {
        Self::new(
            config.entity_type.clone(),
            config.prefix.clone(),
            config.custom_mapping.clone(),
        )
    }

    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    pub fn get(&self, attribute: &AttributeDefinition) -> IndexingResult<String> {
        self.get_by_code(&attribute.code)
    }

    /// Remote name for a local code.
    ///
    /// Fails with [`IndexingError::AttributeMappingMissing`] when the derived
    /// name is already the explicit mapping of a different local code.
    pub fn get_by_code(&self, code: &str) -> IndexingResult<String> {
        if let Some(mapped) = self.custom_mapping.get(code) {
            return Ok(mapped.clone());
        }

        let name = if !self.prefix.is_empty() && !is_standard_attribute(code) {
            format!("{}{code}", self.prefix)
        } else {
            code.to_string()
        };

        if let Some((conflicting_code, _)) = self
            .custom_mapping
            .iter()
            .find(|(local, remote)| **remote == name && local.as_str() != code)
        {
            return Err(IndexingError::AttributeMappingMissing {
                code: code.to_string(),
                conflicting_code: conflicting_code.clone(),
                remote_name: name,
            });
        }

        Ok(name)
    }

    /// Local code for a remote name.
    pub fn reverse_for_code(&self, remote_name: &str) -> String {
        if let Some((local, _)) = self
            .custom_mapping
            .iter()
            .find(|(_, remote)| remote.as_str() == remote_name)
        {
            return local.clone();
        }

        if !self.prefix.is_empty() && !is_standard_attribute(remote_name) {
            if let Some(stripped) = remote_name.strip_prefix(self.prefix.as_str()) {
                return stripped.to_string();
            }
        }

        remote_name.to_string()
    }
}

//! Host attribute definitions and the remote service's attribute model.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// Storage type of a host attribute's values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendType {
    Static,
    Varchar,
    Text,
    Int,
    Decimal,
    Datetime,
}

impl BackendType {
    #[must_use]
    pub const fn is_numeric(&self) -> bool {
        matches!(self, BackendType::Int | BackendType::Decimal)
    }
}

/// Admin input widget of a host attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrontendInput {
    Text,
    Textarea,
    Select,
    Multiselect,
    Boolean,
    Date,
    Datetime,
    Price,
    Weight,
    #[serde(other)]
    Other,
}

/// An attribute definition as the host catalog describes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeDefinition {
    pub id: i64,
    pub code: String,
    #[serde(default)]
    pub label: Option<String>,
    pub backend_type: BackendType,
    pub frontend_input: FrontendInput,
    /// Option source for select-like inputs, e.g. `Eav\Source\Boolean`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_model: Option<String>,
    /// The host's own "push this attribute to the index" flag.
    #[serde(default)]
    pub is_indexable: bool,
    #[serde(default)]
    pub is_searchable: bool,
    #[serde(default)]
    pub is_filterable: bool,
    #[serde(default)]
    pub is_returnable: bool,
    /// Scope ids the attribute is visible in. Empty means every scope.
    #[serde(default)]
    pub scope_ids: BTreeSet<u32>,
}

impl AttributeDefinition {
    /// Creates a plain text attribute with every flag cleared.
    pub fn new(id: i64, code: impl Into<String>) -> Self {
        Self {
            id,
            code: code.into(),
            label: None,
            backend_type: BackendType::Varchar,
            frontend_input: FrontendInput::Text,
            source_model: None,
            is_indexable: false,
            is_searchable: false,
            is_filterable: false,
            is_returnable: false,
            scope_ids: BTreeSet::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_types(mut self, backend: BackendType, frontend: FrontendInput) -> Self {
        self.backend_type = backend;
        self.frontend_input = frontend;
        self
    }

    pub fn with_source_model(mut self, source_model: impl Into<String>) -> Self {
        self.source_model = Some(source_model.into());
        self
    }

    pub fn indexable(mut self, indexable: bool) -> Self {
        self.is_indexable = indexable;
        self
    }

    pub fn with_scopes(mut self, scope_ids: impl IntoIterator<Item = u32>) -> Self {
        self.scope_ids = scope_ids.into_iter().collect();
        self
    }

    /// Whether the attribute is visible in the given scope.
    #[must_use]
    pub fn in_scope(&self, scope_id: u32) -> bool {
        self.scope_ids.is_empty() || self.scope_ids.contains(&scope_id)
    }
}

/// Data type of an attribute in the remote index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RemoteDataType {
    String,
    Number,
    Multivalue,
}

impl RemoteDataType {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            RemoteDataType::String => "STRING",
            RemoteDataType::Number => "NUMBER",
            RemoteDataType::Multivalue => "MULTIVALUE",
        }
    }
}

impl fmt::Display for RemoteDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RemoteDataType {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "STRING" => Ok(RemoteDataType::String),
            "NUMBER" => Ok(RemoteDataType::Number),
            "MULTIVALUE" => Ok(RemoteDataType::Multivalue),
            _ => Err(crate::Error::InvalidDataType(s.to_string())),
        }
    }
}

/// An attribute as the remote indexing service stores it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteAttribute {
    pub attribute_name: String,
    pub datatype: RemoteDataType,
    /// Scope code (or `"default"`) to display label.
    #[serde(default)]
    pub label: BTreeMap<String, String>,
    #[serde(default)]
    pub searchable: bool,
    #[serde(default)]
    pub filterable: bool,
    #[serde(default)]
    pub returnable: bool,
    /// Remote-managed attributes cannot be changed or deleted through the API.
    #[serde(default)]
    pub immutable: bool,
}

impl RemoteAttribute {
    pub fn new(attribute_name: impl Into<String>, datatype: RemoteDataType) -> Self {
        Self {
            attribute_name: attribute_name.into(),
            datatype,
            label: BTreeMap::new(),
            searchable: false,
            filterable: false,
            returnable: false,
            immutable: false,
        }
    }
}

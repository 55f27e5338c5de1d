use indexsync_types::{AttributeDefinition, BackendType, FrontendInput, RemoteDataType};
use std::collections::BTreeMap;
use tracing::warn;

/// Classifies attributes into remote datatypes.
///
/// Order of checks: explicit override, date-like, multi-select,
/// boolean-like, int-backed select, numeric backend, then string. Boolean
/// and select checks must precede the numeric check, since both are
/// commonly int-backed.
#[derive(Debug, Clone, Default)]
pub struct AttributeTypeMapper {
    custom_types: BTreeMap<String, RemoteDataType>,
}

impl AttributeTypeMapper {
    /// Builds the mapper from raw overrides. Values that are not a
    /// supported datatype are logged and dropped.
    pub fn new(custom_types: &BTreeMap<String, String>) -> Self {
        let custom_types = custom_types
            .iter()
            .filter_map(|(code, raw)| match raw.parse::<RemoteDataType>() {
                Ok(datatype) => Some((code.clone(), datatype)),
                Err(_) => {
                    warn!(
                        attribute = code.as_str(),
                        datatype = raw.as_str(),
                        "ignoring unsupported custom attribute type"
                    );
                    None
                }
            })
            .collect();
        Self { custom_types }
    }

    pub fn execute(&self, attribute: &AttributeDefinition) -> RemoteDataType {
        if let Some(datatype) = self.custom_types.get(&attribute.code) {
            return *datatype;
        }
        if is_date_like(attribute) {
            return RemoteDataType::String;
        }
        if attribute.frontend_input == FrontendInput::Multiselect {
            return RemoteDataType::Multivalue;
        }
        if is_boolean_like(attribute) {
            return RemoteDataType::String;
        }
        if attribute.frontend_input == FrontendInput::Select {
            return RemoteDataType::String;
        }
        if attribute.backend_type.is_numeric() {
            return RemoteDataType::Number;
        }
        RemoteDataType::String
    }
}

fn is_date_like(attribute: &AttributeDefinition) -> bool {
    attribute.backend_type == BackendType::Datetime
        || matches!(
            attribute.frontend_input,
            FrontendInput::Date | FrontendInput::Datetime
        )
}

fn is_boolean_like(attribute: &AttributeDefinition) -> bool {
    if attribute.frontend_input == FrontendInput::Boolean {
        return true;
    }
    attribute
        .source_model
        .as_deref()
        .and_then(|model| model.rsplit(['\\', '/', ':', '.']).next())
        .is_some_and(|segment| segment.eq_ignore_ascii_case("boolean"))
}

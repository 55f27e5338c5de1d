//! Local attribute code to remote attribute translation.

mod builder;
mod datatype;
mod name;

pub use builder::{fingerprint, RemoteAttributeBuilder};
pub use datatype::AttributeTypeMapper;
pub use name::{is_standard_attribute, AttributeMapper, STANDARD_ATTRIBUTE_NAMES};

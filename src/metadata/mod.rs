//! `EXT_structural_metadata` support.
//!
//! - schema, class, enum and instance payloads with builders
//! - [`schema_from_json`] / [`schema_to_json`] - schema JSON shape
//! - [`merge_schemas`] - enum and class merge with name disambiguation
//! - [`reconcile`] - property table/texture/attribute migration
//! - [`SchemaResolver`] - external `schemaUri` resolution

mod model;
mod json;
mod schema_merge;
mod reconcile;
mod resolver;

pub use model::*;
pub use json::{
    schema_from_json, schema_to_json, ClassJson, ClassPropertyJson, EnumJson, EnumValueJson,
    SchemaJson,
};
pub(crate) use json::schema_from_parsed;
pub use schema_merge::{disambiguate, merge_schemas, NameMapping};
pub use reconcile::{reconcile, repair_primitive_bindings};
pub use resolver::{DirectorySchemaResolver, NoSchemaResolver, SchemaResolver};

/// Extension name declared by documents carrying structural metadata.
pub const EXTENSION_NAME: &str = "EXT_structural_metadata";

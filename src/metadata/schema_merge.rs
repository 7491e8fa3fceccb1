//! Merging of structural metadata schemas.
//!
//! Enums are merged before classes: whether a colliding class must be
//! renamed depends on whether one of the enums it references was renamed.

use std::collections::{BTreeMap, BTreeSet};

use crate::graph::{Document, PropertyId};
use crate::merge::copy_to_document;
use crate::util::{Error, IdGenerator, Result};

/// Source key → target key.
pub type NameMapping = BTreeMap<String, String>;

/// Return `base` if unused, otherwise `base_<n>` for the smallest free `n`.
///
/// The returned name is not reserved; callers insert it into `in_use`
/// before disambiguating again.
pub fn disambiguate(base: &str, in_use: &BTreeSet<String>) -> String {
    if !in_use.contains(base) {
        return base.to_string();
    }
    (0u64..)
        .map(|n| format!("{base}_{n}"))
        .find(|candidate| !in_use.contains(candidate))
        .unwrap_or_else(|| base.to_string())
}

/// Merge the enums and classes of `source_schema` into `target_schema`.
///
/// Returns the source class key → target class key mapping. The target
/// schema gets a fresh id from `ids` when its class or enum key set changed.
pub fn merge_schemas(
    target: &mut Document,
    target_schema: PropertyId,
    source: &Document,
    source_schema: PropertyId,
    ids: &mut dyn IdGenerator,
) -> Result<NameMapping> {
    let before = key_sets(target, target_schema)?;

    let enum_mapping = merge_enums(target, target_schema, source, source_schema)?;
    let class_mapping = merge_classes(target, target_schema, source, source_schema, &enum_mapping)?;

    let after = key_sets(target, target_schema)?;
    if before != after {
        let id = ids.next_id();
        tracing::debug!("schema keys changed, assigning id {}", id);
        target.as_schema_mut(target_schema)?.id = id;
    }
    Ok(class_mapping)
}

fn key_sets(doc: &Document, schema: PropertyId) -> Result<(BTreeSet<String>, BTreeSet<String>)> {
    let def = doc.as_schema(schema)?;
    Ok((def.classes.keys().cloned().collect(), def.enums.keys().cloned().collect()))
}

/// Copy a single property and return its target counterpart.
fn copy_one(target: &mut Document, source: &Document, id: PropertyId) -> Result<PropertyId> {
    let map = copy_to_document(target, source, &[id])?;
    map.get(&id)
        .copied()
        .ok_or_else(|| Error::other(format!("copy of {id} produced no mapping")))
}

fn merge_enums(
    target: &mut Document,
    target_schema: PropertyId,
    source: &Document,
    source_schema: PropertyId,
) -> Result<NameMapping> {
    let source_enums = source.as_schema(source_schema)?.enums.clone();
    let mut in_use: BTreeSet<String> = target.as_schema(target_schema)?.enums.keys().cloned().collect();
    let mut mapping = NameMapping::new();

    for (key, source_enum) in source_enums {
        let existing = target.as_schema(target_schema)?.enums.get(&key).copied();
        let target_key = match existing {
            None => key.clone(),
            Some(target_enum) if target.equals(target_enum, source, source_enum)? => {
                mapping.insert(key.clone(), key);
                continue;
            }
            Some(_) => disambiguate(&key, &in_use),
        };

        let copied = copy_one(target, source, source_enum)?;
        target.as_schema_mut(target_schema)?.enums.insert(target_key.clone(), copied);
        in_use.insert(target_key.clone());
        tracing::trace!("enum {} -> {}", key, target_key);
        mapping.insert(key, target_key);
    }
    Ok(mapping)
}

fn references_renamed_enum(
    doc: &Document,
    class: PropertyId,
    enum_mapping: &NameMapping,
) -> Result<bool> {
    for &prop in doc.as_class(class)?.properties.values() {
        if let Some(enum_type) = &doc.as_class_property(prop)?.enum_type {
            if enum_mapping.get(enum_type).is_some_and(|renamed| renamed != enum_type) {
                return Ok(true);
            }
        }
    }
    Ok(false)
}

/// Point every enum-typed property of `class` at its merged enum key.
fn rewrite_enum_types(
    doc: &mut Document,
    class: PropertyId,
    enum_mapping: &NameMapping,
    schema_enums: &BTreeSet<String>,
) -> Result<()> {
    let props: Vec<PropertyId> = doc.as_class(class)?.properties.values().copied().collect();
    for prop in props {
        let def = doc.as_class_property_mut(prop)?;
        let Some(enum_type) = def.enum_type.as_ref() else {
            continue;
        };
        if let Some(renamed) = enum_mapping.get(enum_type) {
            def.enum_type = Some(renamed.clone());
        } else if !schema_enums.contains(enum_type) {
            return Err(Error::missing(format!("enum {enum_type:?} referenced by a class property")));
        }
    }
    Ok(())
}

fn merge_classes(
    target: &mut Document,
    target_schema: PropertyId,
    source: &Document,
    source_schema: PropertyId,
    enum_mapping: &NameMapping,
) -> Result<NameMapping> {
    let source_classes = source.as_schema(source_schema)?.classes.clone();
    let target_enums: BTreeSet<String> =
        target.as_schema(target_schema)?.enums.keys().cloned().collect();
    let mut in_use: BTreeSet<String> =
        target.as_schema(target_schema)?.classes.keys().cloned().collect();
    let mut mapping = NameMapping::new();

    for (key, source_class) in source_classes {
        let existing = target.as_schema(target_schema)?.classes.get(&key).copied();
        let target_key = match existing {
            None => key.clone(),
            // A renamed enum makes the classes differ even when they looked identical
            Some(_) if references_renamed_enum(source, source_class, enum_mapping)? => {
                disambiguate(&key, &in_use)
            }
            Some(target_class) if target.equals(target_class, source, source_class)? => {
                mapping.insert(key.clone(), key);
                continue;
            }
            Some(_) => disambiguate(&key, &in_use),
        };

        let copied = copy_one(target, source, source_class)?;
        rewrite_enum_types(target, copied, enum_mapping, &target_enums)?;
        target.as_schema_mut(target_schema)?.classes.insert(target_key.clone(), copied);
        in_use.insert(target_key.clone());
        tracing::trace!("class {} -> {}", key, target_key);
        mapping.insert(key, target_key);
    }
    Ok(mapping)
}

//! Migration of property tables, textures and attributes after a schema merge.
//!
//! Property tables are appended one by one. Property textures and attributes
//! are deduplicated by structural equality, and every primitive binding is
//! then re-pointed at the canonical instance registered on the target root
//! extension, so bindings share identity with the root lists.

use crate::graph::{Document, PropertyId, PropertyKind};
use crate::merge::PropertyMap;
use crate::util::{Error, Result};

use super::schema_merge::NameMapping;

/// Move the source extension's instances into `target_metadata` and repair
/// primitive bindings.
///
/// `map` must contain the target copies of every source property table,
/// texture and attribute.
pub fn reconcile(
    target: &mut Document,
    target_metadata: PropertyId,
    source: &Document,
    source_metadata: PropertyId,
    map: &PropertyMap,
    class_mapping: &NameMapping,
) -> Result<()> {
    let source_def = source.as_structural_metadata(source_metadata)?.clone();

    for table in &source_def.property_tables {
        let copied = copied(map, *table, "property table")?;
        let def = target.as_property_table_mut(copied)?;
        def.class = renamed_class(class_mapping, &def.class)?;
        target.as_structural_metadata_mut(target_metadata)?.property_tables.push(copied);
    }

    for texture in &source_def.property_textures {
        let copied = copied(map, *texture, "property texture")?;
        let def = target.as_property_texture_mut(copied)?;
        def.class = renamed_class(class_mapping, &def.class)?;
        let existing = target.as_structural_metadata(target_metadata)?.property_textures.clone();
        if find_equal(target, &existing, copied)?.is_none() {
            target.as_structural_metadata_mut(target_metadata)?.property_textures.push(copied);
        }
    }

    for attribute in &source_def.property_attributes {
        let copied = copied(map, *attribute, "property attribute")?;
        let def = target.as_property_attribute_mut(copied)?;
        def.class = renamed_class(class_mapping, &def.class)?;
        let existing = target.as_structural_metadata(target_metadata)?.property_attributes.clone();
        if find_equal(target, &existing, copied)?.is_none() {
            target.as_structural_metadata_mut(target_metadata)?.property_attributes.push(copied);
        }
    }

    repair_primitive_bindings(target, target_metadata)
}

fn copied(map: &PropertyMap, id: PropertyId, what: &str) -> Result<PropertyId> {
    map.get(&id)
        .copied()
        .ok_or_else(|| Error::missing(format!("{what} {id} was not copied")))
}

fn renamed_class(class_mapping: &NameMapping, class: &str) -> Result<String> {
    class_mapping
        .get(class)
        .cloned()
        .ok_or_else(|| Error::missing(format!("class {class:?} not found in merged schema")))
}

/// First entry of `candidates` structurally equal to `id`.
fn find_equal(doc: &Document, candidates: &[PropertyId], id: PropertyId) -> Result<Option<PropertyId>> {
    for &candidate in candidates {
        if doc.equals(candidate, doc, id)? {
            return Ok(Some(candidate));
        }
    }
    Ok(None)
}

/// Replace every primitive-level texture/attribute reference with the
/// canonical instance from the root extension.
pub fn repair_primitive_bindings(target: &mut Document, target_metadata: PropertyId) -> Result<()> {
    let root = target.as_structural_metadata(target_metadata)?;
    let canonical_textures = root.property_textures.clone();
    let canonical_attributes = root.property_attributes.clone();

    let mut bindings = Vec::new();
    for prim in target.list(PropertyKind::Primitive) {
        if let Some(binding) = target.as_primitive(prim)?.metadata {
            bindings.push(binding);
        }
    }

    let mut repaired = 0usize;
    for binding in bindings {
        let def = target.as_primitive_metadata_mut(binding)?;
        let old_textures = std::mem::take(&mut def.property_textures);
        let old_attributes = std::mem::take(&mut def.property_attributes);

        let mut textures = Vec::with_capacity(old_textures.len());
        for old in old_textures {
            let found = find_equal(target, &canonical_textures, old)?
                .ok_or(Error::UnmatchedReference("property texture"))?;
            textures.push(found);
        }
        let mut attributes = Vec::with_capacity(old_attributes.len());
        for old in old_attributes {
            let found = find_equal(target, &canonical_attributes, old)?
                .ok_or(Error::UnmatchedReference("property attribute"))?;
            attributes.push(found);
        }

        let def = target.as_primitive_metadata_mut(binding)?;
        def.property_textures = textures;
        def.property_attributes = attributes;
        repaired += 1;
    }
    tracing::trace!("repaired {} primitive metadata bindings", repaired);
    Ok(())
}

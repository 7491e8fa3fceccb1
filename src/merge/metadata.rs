//! Whole-document merge including `EXT_structural_metadata`.

use std::collections::HashSet;

use crate::graph::{Document, PropertyId};
use crate::metadata::{merge_schemas, reconcile, schema_from_json, SchemaResolver};
use crate::util::{Error, IdGenerator, Result};

use super::copy::{collect_dependencies, merge_documents, merge_documents_filtered, PropertyResolver};

/// Merge `source` into `target`, combining both metadata extensions.
///
/// External schemas are resolved through `resolver` (one at a time) and
/// inlined only when both documents carry metadata. `source` is mutated
/// only by that inlining. A failed merge leaves `target` in an
/// unspecified state.
#[tracing::instrument(skip_all)]
pub async fn merge_documents_with_metadata<R: SchemaResolver>(
    target: &mut Document,
    source: &mut Document,
    resolver: &R,
    ids: &mut dyn IdGenerator,
) -> Result<()> {
    match (target.structural_metadata(), source.structural_metadata()) {
        (_, None) => {
            merge_documents(target, source)?;
        }
        (None, Some(source_metadata)) => {
            let map = merge_documents(target, source)?;
            let copied = map
                .get(&source_metadata)
                .copied()
                .ok_or_else(|| Error::other("structural metadata was not copied"))?;
            target.set_structural_metadata(Some(copied))?;
            tracing::debug!("adopted source structural metadata as {}", copied);
        }
        (Some(target_metadata), Some(source_metadata)) => {
            let target_schema = ensure_schema_inlined(target, target_metadata, resolver).await?;
            let source_schema = ensure_schema_inlined(source, source_metadata, resolver).await?;

            let class_mapping = merge_schemas(target, target_schema, source, source_schema, ids)?;

            // The source extension object and its schema are merged above, not copied
            let mut held_back: HashSet<PropertyId> =
                collect_dependencies(source, &[source_schema])?.into_iter().collect();
            held_back.insert(source_metadata);

            let mut property_resolver = PropertyResolver::new(target, source);
            merge_documents_filtered(target, source, &mut property_resolver, |id| {
                !held_back.contains(&id)
            })?;

            reconcile(
                target,
                target_metadata,
                source,
                source_metadata,
                property_resolver.map(),
                &class_mapping,
            )?;
        }
    }
    Ok(())
}

/// Return the inline schema of `metadata`, resolving and inlining `schemaUri` first if needed.
async fn ensure_schema_inlined<R: SchemaResolver>(
    doc: &mut Document,
    metadata: PropertyId,
    resolver: &R,
) -> Result<PropertyId> {
    let def = doc.as_structural_metadata(metadata)?;
    if let Some(schema) = def.schema {
        return Ok(schema);
    }
    let uri = def
        .schema_uri
        .clone()
        .ok_or_else(|| Error::missing("structural metadata has neither schema nor schemaUri"))?;

    tracing::debug!("resolving schema {}", uri);
    let value = resolver.resolve(&uri).await?;
    let schema = schema_from_json(doc, &value)
        .map_err(|e| Error::SchemaResolution { uri: uri.clone(), reason: e.to_string() })?;

    let def = doc.as_structural_metadata_mut(metadata)?;
    def.schema = Some(schema);
    def.schema_uri = None;
    Ok(schema)
}

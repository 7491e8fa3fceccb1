//! Structural metadata derived from legacy batch tables.
//!
//! Only JSON-array valued batch table properties are converted. Each
//! becomes a class property plus a property table column:
//!
//! | JSON values           | class property        | column                    |
//! |-----------------------|-----------------------|---------------------------|
//! | booleans              | `BOOLEAN`             | LSB-first bitstream       |
//! | integers              | `SCALAR` / `INT64`    | little-endian i64         |
//! | other numbers         | `SCALAR` / `FLOAT64`  | little-endian f64         |
//! | strings               | `STRING`              | UTF-8 + UINT32 offsets    |
//! | arrays of numbers     | variable-length array | values + UINT32 offsets   |
//!
//! Array offsets count elements, string offsets count bytes.

use std::collections::BTreeSet;

use serde_json::Value;

use super::writer::to_u32;
use crate::graph::{Document, PropertyId};
use crate::metadata::{
    add_class, add_class_property, add_property_table, add_property_table_property, create_schema,
    disambiguate, ensure_structural_metadata, ClassPropertyDef, PropertyTablePropertyDef,
};
use crate::util::{Error, Result};

/// Class key used for batch table properties.
pub const DEFAULT_CLASS_KEY: &str = "batchTable";

/// Schema id given to schemas created for batch tables.
pub const BATCH_TABLE_SCHEMA_ID: &str = "batchTableSchema";

const OFFSET_TYPE: &str = "UINT32";

/// A decoded batch table column.
#[derive(Clone, Debug, PartialEq)]
enum Column {
    Boolean(Vec<bool>),
    Int(Vec<i64>),
    Float(Vec<f64>),
    Str(Vec<String>),
    IntArray(Vec<Vec<i64>>),
    FloatArray(Vec<Vec<f64>>),
}

fn all<T>(values: &[Value], f: impl Fn(&Value) -> Option<T>) -> Option<Vec<T>> {
    values.iter().map(f).collect()
}

impl Column {
    /// Infer the column type from its JSON values; `None` for mixed columns.
    fn infer(values: &[Value]) -> Option<Self> {
        if let Some(v) = all(values, Value::as_bool) {
            return Some(Self::Boolean(v));
        }
        if let Some(v) = all(values, Value::as_i64) {
            return Some(Self::Int(v));
        }
        if let Some(v) = all(values, Value::as_f64) {
            return Some(Self::Float(v));
        }
        if let Some(v) = all(values, |v| v.as_str().map(str::to_string)) {
            return Some(Self::Str(v));
        }
        if !values.iter().all(Value::is_array) {
            return None;
        }
        if let Some(v) = all(values, |a| all(a.as_array()?, Value::as_i64)) {
            return Some(Self::IntArray(v));
        }
        all(values, |a| all(a.as_array()?, Value::as_f64)).map(Self::FloatArray)
    }

    fn class_property(&self) -> ClassPropertyDef {
        match self {
            Self::Boolean(_) => ClassPropertyDef {
                property_type: "BOOLEAN".to_string(),
                ..ClassPropertyDef::default()
            },
            Self::Int(_) => ClassPropertyDef::numeric("SCALAR", "INT64"),
            Self::Float(_) => ClassPropertyDef::numeric("SCALAR", "FLOAT64"),
            Self::Str(_) => ClassPropertyDef {
                property_type: "STRING".to_string(),
                ..ClassPropertyDef::default()
            },
            Self::IntArray(_) => ClassPropertyDef::numeric("SCALAR", "INT64").into_array(None),
            Self::FloatArray(_) => ClassPropertyDef::numeric("SCALAR", "FLOAT64").into_array(None),
        }
    }

    fn encode(&self) -> Result<PropertyTablePropertyDef> {
        let mut out = PropertyTablePropertyDef::default();
        match self {
            Self::Boolean(v) => {
                let mut bits = vec![0u8; v.len().div_ceil(8)];
                for (i, _) in v.iter().enumerate().filter(|(_, b)| **b) {
                    bits[i / 8] |= 1 << (i % 8);
                }
                out.values = bits;
            }
            Self::Int(v) => out.values = bytemuck::cast_slice(v).to_vec(),
            Self::Float(v) => out.values = bytemuck::cast_slice(v).to_vec(),
            Self::Str(v) => {
                let mut offsets = Vec::with_capacity(v.len() + 1);
                offsets.push(0u32);
                for s in v {
                    out.values.extend_from_slice(s.as_bytes());
                    offsets.push(to_u32(out.values.len())?);
                }
                out.string_offsets = Some(bytemuck::cast_slice(&offsets).to_vec());
                out.string_offset_type = Some(OFFSET_TYPE.to_string());
            }
            Self::IntArray(v) => {
                let flat: Vec<i64> = v.iter().flatten().copied().collect();
                out.values = bytemuck::cast_slice(&flat).to_vec();
                out.array_offsets = Some(array_offsets(v.iter().map(Vec::len))?);
                out.array_offset_type = Some(OFFSET_TYPE.to_string());
            }
            Self::FloatArray(v) => {
                let flat: Vec<f64> = v.iter().flatten().copied().collect();
                out.values = bytemuck::cast_slice(&flat).to_vec();
                out.array_offsets = Some(array_offsets(v.iter().map(Vec::len))?);
                out.array_offset_type = Some(OFFSET_TYPE.to_string());
            }
        }
        Ok(out)
    }
}

fn array_offsets(lengths: impl Iterator<Item = usize>) -> Result<Vec<u8>> {
    let mut offsets = vec![0u32];
    let mut total = 0usize;
    for len in lengths {
        total = total.saturating_add(len);
        offsets.push(to_u32(total)?);
    }
    Ok(bytemuck::cast_slice(&offsets).to_vec())
}

/// Add a class and a property table describing `batch_table_json` to `doc`.
///
/// The class is registered under [`DEFAULT_CLASS_KEY`] (disambiguated if
/// taken) in the document's inline schema, which is created when missing.
/// Properties stored in the batch table binary, and columns whose length
/// differs from `batch_length` or whose values are mixed, are skipped with a
/// warning. Returns the property table, or `None` if nothing was converted.
#[tracing::instrument(skip_all, fields(batch_length = batch_length))]
pub fn batch_table_to_metadata(
    doc: &mut Document,
    batch_table_json: &Value,
    batch_length: u32,
) -> Result<Option<PropertyId>> {
    let object = batch_table_json
        .as_object()
        .ok_or_else(|| Error::invalid("batch table JSON is not an object"))?;

    let mut columns = Vec::new();
    for (name, value) in object {
        if name == "extensions" || name == "extras" {
            continue;
        }
        let Some(values) = value.as_array() else {
            if value.get("byteOffset").is_some() {
                tracing::warn!("skipping binary batch table property {:?}", name);
            } else {
                tracing::warn!("skipping batch table property {:?}: not an array", name);
            }
            continue;
        };
        if values.len() != batch_length as usize {
            tracing::warn!(
                "skipping batch table property {:?}: {} values for {} features",
                name,
                values.len(),
                batch_length
            );
            continue;
        }
        match Column::infer(values) {
            Some(column) => columns.push((name.clone(), column)),
            None => tracing::warn!("skipping batch table property {:?}: mixed value types", name),
        }
    }
    if columns.is_empty() {
        return Ok(None);
    }

    let md = ensure_structural_metadata(doc)?;
    let def = doc.as_structural_metadata(md)?;
    let schema = match (def.schema, def.schema_uri.clone()) {
        (Some(schema), _) => schema,
        (None, Some(uri)) => {
            return Err(Error::Unsupported(format!(
                "batch table metadata on a document with external schema {uri:?}"
            )))
        }
        (None, None) => create_schema(doc, md, BATCH_TABLE_SCHEMA_ID)?,
    };

    let in_use: BTreeSet<String> = doc.as_schema(schema)?.classes.keys().cloned().collect();
    let class_key = disambiguate(DEFAULT_CLASS_KEY, &in_use);
    let class = add_class(doc, schema, &class_key, "")?;
    let table = add_property_table(doc, md, "", &class_key, batch_length)?;

    for (name, column) in &columns {
        add_class_property(doc, class, name, column.class_property())?;
        add_property_table_property(doc, table, name, column.encode()?)?;
    }
    tracing::debug!("converted {} batch table properties into class {}", columns.len(), class_key);
    Ok(Some(table))
}

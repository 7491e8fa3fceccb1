//! JSON shape of structural metadata schemas.
//!
//! ```text
//! { id, classes: { <key>: { name, properties: { <key>: { type, componentType?,
//!   enumType?, array?, count? } } } }, enums: { <key>: { valueType,
//!   values: [{ name, value }] } } }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::model::*;
use crate::graph::{Document, PropertyData, PropertyId};
use crate::util::Result;

fn is_false(b: &bool) -> bool {
    !*b
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaJson {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub classes: BTreeMap<String, ClassJson>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub enums: BTreeMap<String, EnumJson>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassJson {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, ClassPropertyJson>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassPropertyJson {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub property_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enum_type: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub array: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub normalized: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<Value>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no_data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnumJson {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_type: Option<String>,
    #[serde(default)]
    pub values: Vec<EnumValueJson>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnumValueJson {
    pub name: String,
    pub value: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Parse schema JSON into a new schema property of `doc`.
///
/// The schema is not attached to any extension object.
pub fn schema_from_json(doc: &mut Document, value: &Value) -> Result<PropertyId> {
    let json: SchemaJson = serde_json::from_value(value.clone())?;
    Ok(schema_from_parsed(doc, json))
}

pub(crate) fn schema_from_parsed(doc: &mut Document, json: SchemaJson) -> PropertyId {
    let mut classes = BTreeMap::new();
    for (key, class) in json.classes {
        let mut properties = BTreeMap::new();
        for (prop_key, p) in class.properties {
            let def = ClassPropertyDef {
                description: p.description,
                property_type: p.property_type,
                component_type: p.component_type,
                enum_type: p.enum_type,
                array: p.array,
                count: p.count,
                normalized: p.normalized,
                transform: ValueTransform { offset: p.offset, scale: p.scale, min: p.min, max: p.max },
                required: p.required,
                no_data: p.no_data,
                default: p.default,
                semantic: p.semantic,
            };
            let id = doc.add(p.name.unwrap_or_default(), PropertyData::ClassProperty(def));
            properties.insert(prop_key, id);
        }
        let id = doc.add(
            class.name.unwrap_or_default(),
            PropertyData::Class(ClassDef { description: class.description, properties }),
        );
        classes.insert(key, id);
    }

    let mut enums = BTreeMap::new();
    for (key, e) in json.enums {
        let values: Vec<PropertyId> = e
            .values
            .into_iter()
            .map(|v| {
                doc.add(
                    v.name,
                    PropertyData::EnumValue(EnumValueDef { description: v.description, value: v.value }),
                )
            })
            .collect();
        let id = doc.add(
            e.name.unwrap_or_default(),
            PropertyData::Enum(EnumDef {
                description: e.description,
                value_type: e.value_type.unwrap_or_else(|| DEFAULT_ENUM_VALUE_TYPE.to_string()),
                values,
            }),
        );
        enums.insert(key, id);
    }

    doc.add(
        json.name.unwrap_or_default(),
        PropertyData::Schema(SchemaDef {
            id: json.id,
            description: json.description,
            version: json.version,
            classes,
            enums,
        }),
    )
}

fn non_empty(name: &str) -> Option<String> {
    (!name.is_empty()).then(|| name.to_string())
}

/// Serialize a schema property to its JSON shape.
pub fn schema_to_json(doc: &Document, schema: PropertyId) -> Result<SchemaJson> {
    let def = doc.as_schema(schema)?;
    let mut out = SchemaJson {
        id: def.id.clone(),
        name: non_empty(doc.name(schema)?),
        description: def.description.clone(),
        version: def.version.clone(),
        ..SchemaJson::default()
    };

    for (key, &class) in &def.classes {
        let class_def = doc.as_class(class)?;
        let mut properties = BTreeMap::new();
        for (prop_key, &prop) in &class_def.properties {
            let p = doc.as_class_property(prop)?;
            properties.insert(
                prop_key.clone(),
                ClassPropertyJson {
                    name: non_empty(doc.name(prop)?),
                    description: p.description.clone(),
                    property_type: p.property_type.clone(),
                    component_type: p.component_type.clone(),
                    enum_type: p.enum_type.clone(),
                    array: p.array,
                    count: p.count,
                    normalized: p.normalized,
                    offset: p.transform.offset.clone(),
                    scale: p.transform.scale.clone(),
                    max: p.transform.max.clone(),
                    min: p.transform.min.clone(),
                    required: p.required,
                    no_data: p.no_data.clone(),
                    default: p.default.clone(),
                    semantic: p.semantic.clone(),
                },
            );
        }
        out.classes.insert(
            key.clone(),
            ClassJson {
                name: non_empty(doc.name(class)?),
                description: class_def.description.clone(),
                properties,
            },
        );
    }

    for (key, &e) in &def.enums {
        let enum_def = doc.as_enum(e)?;
        let mut values = Vec::with_capacity(enum_def.values.len());
        for &v in &enum_def.values {
            let value_def = doc.as_enum_value(v)?;
            values.push(EnumValueJson {
                name: doc.name(v)?.to_string(),
                value: value_def.value,
                description: value_def.description.clone(),
            });
        }
        out.enums.insert(
            key.clone(),
            EnumJson {
                name: non_empty(doc.name(e)?),
                description: enum_def.description.clone(),
                value_type: Some(enum_def.value_type.clone()),
                values,
            },
        );
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "id": "schema",
            "classes": {
                "building": {
                    "name": "Building",
                    "properties": {
                        "height": { "type": "SCALAR", "componentType": "FLOAT32" },
                        "kind": { "type": "ENUM", "enumType": "kind" },
                        "tags": { "type": "STRING", "array": true }
                    }
                }
            },
            "enums": {
                "kind": { "values": [ { "name": "HOUSE", "value": 0 }, { "name": "SHED", "value": 1 } ] }
            }
        })
    }

    #[test]
    fn test_schema_from_json() {
        let mut doc = Document::new();
        let schema = schema_from_json(&mut doc, &sample()).unwrap();
        let def = doc.as_schema(schema).unwrap();
        assert_eq!(def.id, "schema");

        let class = def.classes["building"];
        assert_eq!(doc.name(class).unwrap(), "Building");
        let props = &doc.as_class(class).unwrap().properties;
        let kind = doc.as_class_property(props["kind"]).unwrap();
        assert_eq!(kind.enum_type.as_deref(), Some("kind"));
        assert!(doc.as_class_property(props["tags"]).unwrap().array);

        let e = doc.as_enum(def.enums["kind"]).unwrap();
        assert_eq!(e.value_type, DEFAULT_ENUM_VALUE_TYPE);
        assert_eq!(e.values.len(), 2);
        assert_eq!(doc.name(e.values[1]).unwrap(), "SHED");
    }

    #[test]
    fn test_schema_json_roundtrip_preserves_values() {
        let mut doc = Document::new();
        let schema = schema_from_json(&mut doc, &sample()).unwrap();
        let out = serde_json::to_value(schema_to_json(&doc, schema).unwrap()).unwrap();

        assert_eq!(out["classes"]["building"]["properties"]["height"]["componentType"], "FLOAT32");
        assert_eq!(out["classes"]["building"]["properties"]["tags"]["array"], true);
        assert!(out["classes"]["building"]["properties"]["height"].get("array").is_none());
        assert_eq!(out["enums"]["kind"]["values"][1]["value"], 1);
        assert_eq!(out["enums"]["kind"]["valueType"], "UINT16");
    }

    #[test]
    fn test_invalid_schema_json() {
        let mut doc = Document::new();
        let bad = json!({ "classes": { "c": { "properties": { "p": { "componentType": "UINT8" } } } } });
        assert!(schema_from_json(&mut doc, &bad).is_err());
    }
}

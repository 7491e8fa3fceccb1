//! Structural metadata property payloads and builders.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::graph::{Document, PropertyData, PropertyId, TextureInfoDef};
use crate::util::{Error, Result};

/// Optional value transform shared by class and instance properties.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ValueTransform {
    pub offset: Option<Value>,
    pub scale: Option<Value>,
    pub min: Option<Value>,
    pub max: Option<Value>,
}

/// Root-level extension object.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StructuralMetadataDef {
    /// Inline schema.
    pub schema: Option<PropertyId>,
    /// External schema reference, cleared once the schema is inlined.
    pub schema_uri: Option<String>,
    pub property_tables: Vec<PropertyId>,
    pub property_textures: Vec<PropertyId>,
    pub property_attributes: Vec<PropertyId>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SchemaDef {
    pub id: String,
    pub description: Option<String>,
    pub version: Option<String>,
    pub classes: BTreeMap<String, PropertyId>,
    pub enums: BTreeMap<String, PropertyId>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ClassDef {
    pub description: Option<String>,
    pub properties: BTreeMap<String, PropertyId>,
}

/// Type definition of one class property.
#[derive(Clone, Debug, PartialEq)]
pub struct ClassPropertyDef {
    pub description: Option<String>,
    /// `SCALAR`, `VEC2`..`MAT4`, `STRING`, `BOOLEAN` or `ENUM`.
    pub property_type: String,
    pub component_type: Option<String>,
    /// Key of the enum within the same schema.
    pub enum_type: Option<String>,
    pub array: bool,
    pub count: Option<u32>,
    pub normalized: bool,
    pub transform: ValueTransform,
    pub required: bool,
    pub no_data: Option<Value>,
    pub default: Option<Value>,
    pub semantic: Option<String>,
}

impl Default for ClassPropertyDef {
    fn default() -> Self {
        Self {
            description: None,
            property_type: "SCALAR".to_string(),
            component_type: None,
            enum_type: None,
            array: false,
            count: None,
            normalized: false,
            transform: ValueTransform::default(),
            required: false,
            no_data: None,
            default: None,
            semantic: None,
        }
    }
}

impl ClassPropertyDef {
    /// Scalar or vector property of the given component type.
    pub fn numeric(property_type: &str, component_type: &str) -> Self {
        Self {
            property_type: property_type.to_string(),
            component_type: Some(component_type.to_string()),
            ..Self::default()
        }
    }

    /// Enum-typed property.
    pub fn enumeration(enum_type: &str) -> Self {
        Self {
            property_type: "ENUM".to_string(),
            enum_type: Some(enum_type.to_string()),
            ..Self::default()
        }
    }

    /// Variable or fixed length array of this type.
    pub fn into_array(mut self, count: Option<u32>) -> Self {
        self.array = true;
        self.count = count;
        self
    }
}

/// Default storage type of enum values.
pub const DEFAULT_ENUM_VALUE_TYPE: &str = "UINT16";

#[derive(Clone, Debug, PartialEq)]
pub struct EnumDef {
    pub description: Option<String>,
    pub value_type: String,
    pub values: Vec<PropertyId>,
}

impl Default for EnumDef {
    fn default() -> Self {
        Self {
            description: None,
            value_type: DEFAULT_ENUM_VALUE_TYPE.to_string(),
            values: Vec::new(),
        }
    }
}

/// One enum value; its name is the property name.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EnumValueDef {
    pub description: Option<String>,
    pub value: i64,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PropertyTableDef {
    /// Key of the class in the schema.
    pub class: String,
    pub count: u32,
    pub properties: BTreeMap<String, PropertyId>,
}

/// Raw column data of a property table property.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PropertyTablePropertyDef {
    pub values: Vec<u8>,
    pub array_offsets: Option<Vec<u8>>,
    pub string_offsets: Option<Vec<u8>>,
    pub array_offset_type: Option<String>,
    pub string_offset_type: Option<String>,
    pub transform: ValueTransform,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PropertyTextureDef {
    pub class: String,
    pub properties: BTreeMap<String, PropertyId>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PropertyTexturePropertyDef {
    pub texture: Option<PropertyId>,
    /// Owned texture info.
    pub texture_info: Option<PropertyId>,
    pub channels: Vec<u32>,
    pub transform: ValueTransform,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PropertyAttributeDef {
    pub class: String,
    pub properties: BTreeMap<String, PropertyId>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PropertyAttributePropertyDef {
    /// Name of the vertex attribute, e.g. `_TEMPERATURE`.
    pub attribute: String,
    pub transform: ValueTransform,
}

/// Property textures and attributes used by one mesh primitive.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PrimitiveMetadataDef {
    pub property_textures: Vec<PropertyId>,
    pub property_attributes: Vec<PropertyId>,
}

// ============================================================================
// Builders
// ============================================================================

/// Return the root extension object, creating and attaching it if missing.
pub fn ensure_structural_metadata(doc: &mut Document) -> Result<PropertyId> {
    if let Some(id) = doc.structural_metadata() {
        return Ok(id);
    }
    let id = doc.add("", PropertyData::StructuralMetadata(StructuralMetadataDef::default()));
    doc.set_structural_metadata(Some(id))?;
    Ok(id)
}

/// Create a schema and set it as the inline schema of `metadata`.
pub fn create_schema(doc: &mut Document, metadata: PropertyId, id: &str) -> Result<PropertyId> {
    let schema = doc.add(
        "",
        PropertyData::Schema(SchemaDef { id: id.to_string(), ..SchemaDef::default() }),
    );
    let def = doc.as_structural_metadata_mut(metadata)?;
    def.schema = Some(schema);
    def.schema_uri = None;
    Ok(schema)
}

/// Inline schema of a root extension object.
pub fn schema_of(doc: &Document, metadata: PropertyId) -> Result<PropertyId> {
    doc.as_structural_metadata(metadata)?
        .schema
        .ok_or_else(|| Error::missing("structural metadata has no inline schema"))
}

/// Add an empty class under `key`.
pub fn add_class(doc: &mut Document, schema: PropertyId, key: &str, name: &str) -> Result<PropertyId> {
    doc.as_schema(schema)?;
    let class = doc.add(name, PropertyData::Class(ClassDef::default()));
    doc.as_schema_mut(schema)?.classes.insert(key.to_string(), class);
    Ok(class)
}

/// Add a property definition to a class.
pub fn add_class_property(
    doc: &mut Document,
    class: PropertyId,
    key: &str,
    def: ClassPropertyDef,
) -> Result<PropertyId> {
    doc.as_class(class)?;
    let prop = doc.add("", PropertyData::ClassProperty(def));
    doc.as_class_mut(class)?.properties.insert(key.to_string(), prop);
    Ok(prop)
}

/// Add an enum with its values under `key`.
pub fn add_enum(
    doc: &mut Document,
    schema: PropertyId,
    key: &str,
    value_type: &str,
    values: &[(&str, i64)],
) -> Result<PropertyId> {
    doc.as_schema(schema)?;
    let value_ids: Vec<PropertyId> = values
        .iter()
        .map(|&(name, value)| {
            doc.add(name, PropertyData::EnumValue(EnumValueDef { description: None, value }))
        })
        .collect();
    let id = doc.add(
        "",
        PropertyData::Enum(EnumDef {
            description: None,
            value_type: value_type.to_string(),
            values: value_ids,
        }),
    );
    doc.as_schema_mut(schema)?.enums.insert(key.to_string(), id);
    Ok(id)
}

/// Add a property table for `class` and register it on `metadata`.
pub fn add_property_table(
    doc: &mut Document,
    metadata: PropertyId,
    name: &str,
    class: &str,
    count: u32,
) -> Result<PropertyId> {
    doc.as_structural_metadata(metadata)?;
    let table = doc.add(
        name,
        PropertyData::PropertyTable(PropertyTableDef {
            class: class.to_string(),
            count,
            properties: BTreeMap::new(),
        }),
    );
    doc.as_structural_metadata_mut(metadata)?.property_tables.push(table);
    Ok(table)
}

/// Add a column to a property table.
pub fn add_property_table_property(
    doc: &mut Document,
    table: PropertyId,
    key: &str,
    def: PropertyTablePropertyDef,
) -> Result<PropertyId> {
    doc.as_property_table(table)?;
    let prop = doc.add("", PropertyData::PropertyTableProperty(def));
    doc.as_property_table_mut(table)?.properties.insert(key.to_string(), prop);
    Ok(prop)
}

/// Add a property texture for `class` and register it on `metadata`.
pub fn add_property_texture(
    doc: &mut Document,
    metadata: PropertyId,
    name: &str,
    class: &str,
) -> Result<PropertyId> {
    doc.as_structural_metadata(metadata)?;
    let id = doc.add(
        name,
        PropertyData::PropertyTexture(PropertyTextureDef {
            class: class.to_string(),
            properties: BTreeMap::new(),
        }),
    );
    doc.as_structural_metadata_mut(metadata)?.property_textures.push(id);
    Ok(id)
}

/// Add a texture-backed property to a property texture, creating its texture info.
pub fn add_property_texture_property(
    doc: &mut Document,
    property_texture: PropertyId,
    key: &str,
    texture: PropertyId,
    info: TextureInfoDef,
    channels: Vec<u32>,
) -> Result<PropertyId> {
    doc.as_property_texture(property_texture)?;
    doc.as_texture(texture)?;
    let info = doc.create_texture_info(info);
    let prop = doc.add(
        "",
        PropertyData::PropertyTextureProperty(PropertyTexturePropertyDef {
            texture: Some(texture),
            texture_info: Some(info),
            channels,
            transform: ValueTransform::default(),
        }),
    );
    doc.as_property_texture_mut(property_texture)?.properties.insert(key.to_string(), prop);
    Ok(prop)
}

/// Add a property attribute for `class` and register it on `metadata`.
pub fn add_property_attribute(
    doc: &mut Document,
    metadata: PropertyId,
    name: &str,
    class: &str,
    attributes: &[(&str, &str)],
) -> Result<PropertyId> {
    doc.as_structural_metadata(metadata)?;
    let mut properties = BTreeMap::new();
    for &(key, attribute) in attributes {
        let prop = doc.add(
            "",
            PropertyData::PropertyAttributeProperty(PropertyAttributePropertyDef {
                attribute: attribute.to_string(),
                transform: ValueTransform::default(),
            }),
        );
        properties.insert(key.to_string(), prop);
    }
    let id = doc.add(
        name,
        PropertyData::PropertyAttribute(PropertyAttributeDef { class: class.to_string(), properties }),
    );
    doc.as_structural_metadata_mut(metadata)?.property_attributes.push(id);
    Ok(id)
}

/// Return the metadata binding of a primitive, creating it if missing.
pub fn ensure_primitive_metadata(doc: &mut Document, primitive: PropertyId) -> Result<PropertyId> {
    if let Some(id) = doc.as_primitive(primitive)?.metadata {
        return Ok(id);
    }
    let id = doc.add("", PropertyData::PrimitiveMetadata(PrimitiveMetadataDef::default()));
    doc.as_primitive_mut(primitive)?.metadata = Some(id);
    Ok(id)
}

/// Attach a property texture to a primitive.
pub fn bind_property_texture(doc: &mut Document, primitive: PropertyId, texture: PropertyId) -> Result<()> {
    doc.as_property_texture(texture)?;
    let binding = ensure_primitive_metadata(doc, primitive)?;
    doc.as_primitive_metadata_mut(binding)?.property_textures.push(texture);
    Ok(())
}

/// Attach a property attribute to a primitive.
pub fn bind_property_attribute(
    doc: &mut Document,
    primitive: PropertyId,
    attribute: PropertyId,
) -> Result<()> {
    doc.as_property_attribute(attribute)?;
    let binding = ensure_primitive_metadata(doc, primitive)?;
    doc.as_primitive_metadata_mut(binding)?.property_attributes.push(attribute);
    Ok(())
}

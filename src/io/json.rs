//! Serde shapes of the glTF 2.0 subset handled by [`read_document`](super::read_document)
//! and [`write_document`](super::write_document).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::metadata::SchemaJson;

fn is_false(b: &bool) -> bool {
    !*b
}

fn is_zero(n: &u32) -> bool {
    *n == 0
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GltfJson {
    pub asset: AssetJson,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extensions_used: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scene: Option<usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scenes: Vec<SceneJson>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nodes: Vec<NodeJson>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub meshes: Vec<MeshJson>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub accessors: Vec<AccessorJson>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub buffer_views: Vec<BufferViewJson>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub buffers: Vec<BufferJson>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub materials: Vec<MaterialJson>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub textures: Vec<TextureJson>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<ImageJson>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub samplers: Vec<SamplerJson>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<RootExtensionsJson>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetJson {
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copyright: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SceneJson {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nodes: Vec<usize>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NodeJson {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mesh: Option<usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translation: Option<[f32; 3]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<[f32; 4]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<[f32; 3]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matrix: Option<[f32; 16]>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MeshJson {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub primitives: Vec<PrimitiveJson>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PrimitiveJson {
    pub attributes: BTreeMap<String, usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indices: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub material: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<PrimitiveExtensionsJson>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessorJson {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buffer_view: Option<usize>,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub byte_offset: u32,
    pub component_type: u32,
    #[serde(default, skip_serializing_if = "is_false")]
    pub normalized: bool,
    pub count: usize,
    #[serde(rename = "type")]
    pub element_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<Vec<f64>>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BufferViewJson {
    pub buffer: usize,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub byte_offset: u32,
    pub byte_length: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub byte_stride: Option<u32>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BufferJson {
    pub byte_length: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterialJson {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pbr_metallic_roughness: Option<PbrJson>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alpha_mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alpha_cutoff: Option<f32>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub double_sided: bool,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PbrJson {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_color_factor: Option<[f32; 4]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_color_texture: Option<TextureInfoJson>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metallic_factor: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roughness_factor: Option<f32>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextureInfoJson {
    pub index: usize,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub tex_coord: u32,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TextureJson {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sampler: Option<usize>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageJson {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buffer_view: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SamplerJson {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mag_filter: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_filter: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wrap_s: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wrap_t: Option<u32>,
}

// ============================================================================
// EXT_structural_metadata
// ============================================================================

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RootExtensionsJson {
    #[serde(
        rename = "EXT_structural_metadata",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub structural_metadata: Option<StructuralMetadataJson>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PrimitiveExtensionsJson {
    #[serde(
        rename = "EXT_structural_metadata",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub structural_metadata: Option<PrimitiveMetadataJson>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuralMetadataJson {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<SchemaJson>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub property_tables: Vec<PropertyTableJson>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub property_textures: Vec<PropertyTextureJson>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub property_attributes: Vec<PropertyAttributeJson>,
}

/// Value transform overrides shared by instance properties.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TransformJson {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<Value>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PropertyTableJson {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub class: String,
    pub count: u32,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, PropertyTablePropertyJson>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyTablePropertyJson {
    pub values: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub array_offsets: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub string_offsets: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub array_offset_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub string_offset_type: Option<String>,
    #[serde(flatten)]
    pub transform: TransformJson,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PropertyTextureJson {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub class: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, PropertyTexturePropertyJson>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyTexturePropertyJson {
    pub index: usize,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub tex_coord: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub channels: Vec<u32>,
    #[serde(flatten)]
    pub transform: TransformJson,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PropertyAttributeJson {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub class: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, PropertyAttributePropertyJson>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PropertyAttributePropertyJson {
    pub attribute: String,
    #[serde(flatten)]
    pub transform: TransformJson,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrimitiveMetadataJson {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub property_textures: Vec<usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub property_attributes: Vec<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_minimal() {
        let gltf: GltfJson = serde_json::from_value(json!({ "asset": { "version": "2.0" } })).unwrap();
        assert_eq!(gltf.asset.version, "2.0");
        assert!(gltf.nodes.is_empty());
        assert!(gltf.extensions.is_none());

        let out = serde_json::to_value(&gltf).unwrap();
        assert_eq!(out, json!({ "asset": { "version": "2.0" } }));
    }

    #[test]
    fn test_parse_metadata_extension() {
        let gltf: GltfJson = serde_json::from_value(json!({
            "asset": { "version": "2.0" },
            "extensions": {
                "EXT_structural_metadata": {
                    "schemaUri": "schema.json",
                    "propertyTables": [{
                        "class": "c",
                        "count": 2,
                        "properties": { "h": { "values": 0, "offset": 1.5 } }
                    }]
                },
                "KHR_unknown": {}
            }
        }))
        .unwrap();

        let md = gltf.extensions.unwrap().structural_metadata.unwrap();
        assert_eq!(md.schema_uri.as_deref(), Some("schema.json"));
        let h = &md.property_tables[0].properties["h"];
        assert_eq!(h.values, 0);
        assert_eq!(h.transform.offset, Some(json!(1.5)));
    }
}

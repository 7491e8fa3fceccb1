//! glTF export of a [`Document`] as GLB 2.0.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use glam::{Quat, Vec3};

use super::json::*;
use crate::glb;
use crate::graph::{Document, PropertyId, PropertyKind, MODE_TRIANGLES};
use crate::metadata::{schema_to_json, ValueTransform};
use crate::util::{Error, Result};

/// `asset.generator` of written files.
pub fn generator() -> String {
    format!(
        "tilekit {} (built {} {})",
        env!("CARGO_PKG_VERSION"),
        option_env!("TILEKIT_BUILD_DATE").unwrap_or("unknown"),
        option_env!("TILEKIT_BUILD_TIME").unwrap_or("unknown"),
    )
}

/// Serialize a document to GLB 2.0 bytes.
///
/// Every node, mesh, accessor, material and texture in the document is
/// written. Metadata instances are written from the root extension lists;
/// primitive bindings must refer to entries of those lists.
#[tracing::instrument(skip_all)]
pub fn write_document(doc: &Document) -> Result<Vec<u8>> {
    let mut exporter = Exporter::new(doc);
    let gltf = exporter.run()?;
    let json = serde_json::to_vec(&gltf)?;
    tracing::debug!("json {} bytes, binary {} bytes", json.len(), exporter.bin.len());
    glb::encode(&json, &exporter.bin)
}

/// Serialize a document and write it to `path`.
pub fn write_document_file(path: impl AsRef<Path>, doc: &Document) -> Result<()> {
    let bytes = write_document(doc)?;
    std::fs::write(path, bytes)?;
    Ok(())
}

fn index_of(doc: &Document, kind: PropertyKind) -> (Vec<PropertyId>, HashMap<PropertyId, usize>) {
    let ids: Vec<PropertyId> = doc.list(kind).collect();
    let index = ids.iter().enumerate().map(|(i, &id)| (id, i)).collect();
    (ids, index)
}

fn lookup(index: &HashMap<PropertyId, usize>, id: PropertyId) -> Result<usize> {
    index
        .get(&id)
        .copied()
        .ok_or_else(|| Error::other(format!("{id} is not exported")))
}

fn to_u32(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| Error::other(format!("binary buffer too large: {len} bytes")))
}

fn non_empty(name: &str) -> Option<String> {
    (!name.is_empty()).then(|| name.to_string())
}

struct Exporter<'a> {
    doc: &'a Document,
    bin: Vec<u8>,
    gltf: GltfJson,
    images: HashMap<PropertyId, usize>,
    textures: HashMap<(usize, Option<usize>), usize>,
}

impl<'a> Exporter<'a> {
    fn new(doc: &'a Document) -> Self {
        Self {
            doc,
            bin: Vec::new(),
            gltf: GltfJson::default(),
            images: HashMap::new(),
            textures: HashMap::new(),
        }
    }

    /// Append bytes as a new buffer view, 4-byte aligned.
    fn push_view(&mut self, data: &[u8]) -> Result<usize> {
        let aligned = glb::padded_len(self.bin.len());
        let byte_offset = to_u32(aligned)?;
        let byte_length = to_u32(data.len())?;
        // Whole buffer length is written as u32 too
        to_u32(aligned.saturating_add(data.len()))?;
        self.bin.resize(aligned, 0);
        self.bin.extend_from_slice(data);
        self.gltf.buffer_views.push(BufferViewJson {
            buffer: 0,
            byte_offset,
            byte_length,
            byte_stride: None,
        });
        Ok(self.gltf.buffer_views.len() - 1)
    }

    /// glTF texture index for an image and a texture info.
    fn texture_index(&mut self, texture: PropertyId, info: Option<PropertyId>) -> Result<(usize, u32)> {
        let image = lookup(&self.images, texture)?;
        let (sampler, tex_coord) = match info {
            Some(info) => {
                let def = self.doc.as_texture_info(info)?;
                let sampler = SamplerJson {
                    mag_filter: def.mag_filter,
                    min_filter: def.min_filter,
                    wrap_s: def.wrap_s,
                    wrap_t: def.wrap_t,
                };
                let index = if sampler == SamplerJson::default() {
                    None
                } else if let Some(i) = self.gltf.samplers.iter().position(|s| *s == sampler) {
                    Some(i)
                } else {
                    self.gltf.samplers.push(sampler);
                    Some(self.gltf.samplers.len() - 1)
                };
                (index, def.tex_coord)
            }
            None => (None, 0),
        };

        let next = self.gltf.textures.len();
        let index = *self.textures.entry((image, sampler)).or_insert(next);
        if index == next {
            self.gltf.textures.push(TextureJson { name: None, source: Some(image), sampler });
        }
        Ok((index, tex_coord))
    }

    fn run(&mut self) -> Result<GltfJson> {
        let doc = self.doc;
        let root = doc.root_def()?;
        self.gltf.asset = AssetJson {
            version: root.version.clone(),
            generator: Some(generator()),
            copyright: root.copyright.clone(),
        };
        self.gltf.extensions_used = doc.extensions_used().iter().cloned().collect();

        let (accessors, accessor_index) = index_of(doc, PropertyKind::Accessor);
        for id in accessors {
            let a = doc.as_accessor(id)?;
            let view = self.push_view(&a.data)?;
            self.gltf.accessors.push(AccessorJson {
                name: non_empty(doc.name(id)?),
                buffer_view: Some(view),
                byte_offset: 0,
                component_type: a.component_type,
                normalized: a.normalized,
                count: a.count,
                element_type: a.element_type.clone(),
                min: a.min.clone(),
                max: a.max.clone(),
            });
        }

        let (images, image_index) = index_of(doc, PropertyKind::Texture);
        self.images = image_index;
        for id in images {
            let t = doc.as_texture(id)?;
            let view = self.push_view(&t.image)?;
            self.gltf.images.push(ImageJson {
                name: non_empty(doc.name(id)?),
                buffer_view: Some(view),
                mime_type: Some(t.mime_type.clone()),
                uri: None,
            });
        }

        let (materials, material_index) = index_of(doc, PropertyKind::Material);
        for id in materials {
            let m = doc.as_material(id)?;
            let base_color_texture = match m.base_color_texture {
                Some(texture) => {
                    let (index, tex_coord) = self.texture_index(texture, m.base_color_texture_info)?;
                    Some(TextureInfoJson { index, tex_coord })
                }
                None => None,
            };
            self.gltf.materials.push(MaterialJson {
                name: non_empty(doc.name(id)?),
                pbr_metallic_roughness: Some(PbrJson {
                    base_color_factor: Some(m.base_color_factor),
                    base_color_texture,
                    metallic_factor: Some(m.metallic_factor),
                    roughness_factor: Some(m.roughness_factor),
                }),
                alpha_mode: (m.alpha_mode != "OPAQUE").then(|| m.alpha_mode.clone()),
                alpha_cutoff: m.alpha_cutoff,
                double_sided: m.double_sided,
            });
        }

        let metadata = self.write_structural_metadata()?;

        let (meshes, mesh_index) = index_of(doc, PropertyKind::Mesh);
        for id in meshes {
            let mut primitives = Vec::new();
            for &prim in &doc.as_mesh(id)?.primitives {
                let p = doc.as_primitive(prim)?;
                let mut attributes = BTreeMap::new();
                for (semantic, &accessor) in &p.attributes {
                    attributes.insert(semantic.clone(), lookup(&accessor_index, accessor)?);
                }
                let extensions = match p.metadata {
                    Some(binding) => Some(PrimitiveExtensionsJson {
                        structural_metadata: Some(self.write_binding(binding, metadata.as_ref())?),
                    }),
                    None => None,
                };
                primitives.push(PrimitiveJson {
                    attributes,
                    indices: p.indices.map(|i| lookup(&accessor_index, i)).transpose()?,
                    material: p.material.map(|m| lookup(&material_index, m)).transpose()?,
                    mode: (p.mode != MODE_TRIANGLES).then_some(p.mode),
                    extensions,
                });
            }
            self.gltf.meshes.push(MeshJson { name: non_empty(doc.name(id)?), primitives });
        }

        let (nodes, node_index) = index_of(doc, PropertyKind::Node);
        for id in nodes {
            let n = doc.as_node(id)?;
            self.gltf.nodes.push(NodeJson {
                name: non_empty(doc.name(id)?),
                mesh: n.mesh.map(|m| lookup(&mesh_index, m)).transpose()?,
                children: n.children.iter().map(|&c| lookup(&node_index, c)).collect::<Result<_>>()?,
                translation: (n.translation != Vec3::ZERO).then(|| n.translation.to_array()),
                rotation: (n.rotation != Quat::IDENTITY).then(|| n.rotation.to_array()),
                scale: (n.scale != Vec3::ONE).then(|| n.scale.to_array()),
                matrix: None,
            });
        }

        let (scenes, scene_index) = index_of(doc, PropertyKind::Scene);
        for id in scenes {
            let nodes = doc.as_scene(id)?.nodes.iter().map(|&n| lookup(&node_index, n)).collect::<Result<_>>()?;
            self.gltf.scenes.push(SceneJson { name: non_empty(doc.name(id)?), nodes });
        }
        self.gltf.scene = root.default_scene.map(|s| lookup(&scene_index, s)).transpose()?;

        if !self.bin.is_empty() {
            self.gltf.buffers.push(BufferJson { byte_length: to_u32(self.bin.len())?, uri: None });
        }
        Ok(std::mem::take(&mut self.gltf))
    }

    /// Root extension JSON; returns the root lists for primitive binding lookups.
    fn write_structural_metadata(&mut self) -> Result<Option<(Vec<PropertyId>, Vec<PropertyId>)>> {
        let doc = self.doc;
        let Some(md) = doc.structural_metadata() else {
            return Ok(None);
        };
        let def = doc.as_structural_metadata(md)?;
        let mut json = StructuralMetadataJson {
            schema: def.schema.map(|s| schema_to_json(doc, s)).transpose()?,
            schema_uri: def.schema_uri.clone(),
            ..StructuralMetadataJson::default()
        };

        for &table in &def.property_tables {
            let t = doc.as_property_table(table)?;
            let mut properties = BTreeMap::new();
            for (key, &prop) in &t.properties {
                let p = doc.as_property_table_property(prop)?;
                let values = self.push_view(&p.values)?;
                let array_offsets = p.array_offsets.as_deref().map(|d| self.push_view(d)).transpose()?;
                let string_offsets = p.string_offsets.as_deref().map(|d| self.push_view(d)).transpose()?;
                properties.insert(
                    key.clone(),
                    PropertyTablePropertyJson {
                        values,
                        array_offsets,
                        string_offsets,
                        array_offset_type: p.array_offset_type.clone(),
                        string_offset_type: p.string_offset_type.clone(),
                        transform: transform_to_json(&p.transform),
                    },
                );
            }
            json.property_tables.push(PropertyTableJson {
                name: non_empty(doc.name(table)?),
                class: t.class.clone(),
                count: t.count,
                properties,
            });
        }

        for &texture in &def.property_textures {
            let t = doc.as_property_texture(texture)?;
            let mut properties = BTreeMap::new();
            for (key, &prop) in &t.properties {
                let p = doc.as_property_texture_property(prop)?;
                let image = p
                    .texture
                    .ok_or_else(|| Error::missing(format!("property texture property {key:?} has no texture")))?;
                let (index, tex_coord) = self.texture_index(image, p.texture_info)?;
                properties.insert(
                    key.clone(),
                    PropertyTexturePropertyJson {
                        index,
                        tex_coord,
                        channels: p.channels.clone(),
                        transform: transform_to_json(&p.transform),
                    },
                );
            }
            json.property_textures.push(PropertyTextureJson {
                name: non_empty(doc.name(texture)?),
                class: t.class.clone(),
                properties,
            });
        }

        for &attribute in &def.property_attributes {
            let a = doc.as_property_attribute(attribute)?;
            let mut properties = BTreeMap::new();
            for (key, &prop) in &a.properties {
                let p = doc.as_property_attribute_property(prop)?;
                properties.insert(
                    key.clone(),
                    PropertyAttributePropertyJson {
                        attribute: p.attribute.clone(),
                        transform: transform_to_json(&p.transform),
                    },
                );
            }
            json.property_attributes.push(PropertyAttributeJson {
                name: non_empty(doc.name(attribute)?),
                class: a.class.clone(),
                properties,
            });
        }

        self.gltf.extensions = Some(RootExtensionsJson { structural_metadata: Some(json) });
        Ok(Some((def.property_textures.clone(), def.property_attributes.clone())))
    }

    fn write_binding(
        &self,
        binding: PropertyId,
        root_lists: Option<&(Vec<PropertyId>, Vec<PropertyId>)>,
    ) -> Result<PrimitiveMetadataJson> {
        let (textures, attributes) = root_lists
            .ok_or_else(|| Error::missing("primitive metadata binding without a root extension"))?;
        let def = self.doc.as_primitive_metadata(binding)?;
        let position = |list: &[PropertyId], id: PropertyId, what: &'static str| {
            list.iter().position(|&x| x == id).ok_or(Error::UnmatchedReference(what))
        };
        Ok(PrimitiveMetadataJson {
            property_textures: def
                .property_textures
                .iter()
                .map(|&t| position(textures, t, "property texture"))
                .collect::<Result<_>>()?,
            property_attributes: def
                .property_attributes
                .iter()
                .map(|&a| position(attributes, a, "property attribute"))
                .collect::<Result<_>>()?,
        })
    }
}

fn transform_to_json(transform: &ValueTransform) -> TransformJson {
    TransformJson {
        offset: transform.offset.clone(),
        scale: transform.scale.clone(),
        min: transform.min.clone(),
        max: transform.max.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{AccessorDef, MaterialDef, TextureInfoDef};
    use crate::io::read_document;

    #[test]
    fn test_generator_string() {
        assert!(generator().starts_with("tilekit "));
    }

    #[test]
    fn test_write_read_geometry() {
        let mut doc = Document::new();
        let positions = doc.create_accessor(
            "pos",
            AccessorDef {
                element_type: "VEC3".to_string(),
                count: 1,
                data: vec![0; 12],
                ..AccessorDef::default()
            },
        );
        let tex = doc.create_texture("albedo", "image/jpeg", vec![1, 2, 3]);
        let mat = doc.create_material("m", MaterialDef { double_sided: true, ..MaterialDef::default() });
        doc.set_base_color_texture(mat, tex, TextureInfoDef { wrap_s: Some(33071), ..Default::default() })
            .unwrap();
        let prim = doc.create_primitive();
        {
            let p = doc.as_primitive_mut(prim).unwrap();
            p.attributes.insert("POSITION".to_string(), positions);
            p.material = Some(mat);
        }
        let mesh = doc.create_mesh("mesh", vec![prim]);
        let node = doc.create_node("node", Some(mesh));
        doc.as_node_mut(node).unwrap().translation = Vec3::new(0.0, 5.0, 0.0);
        doc.create_scene("scene", vec![node]).unwrap();

        let bytes = write_document(&doc).unwrap();
        let back = read_document(&bytes).unwrap();

        let meshes: Vec<_> = back.list(PropertyKind::Mesh).collect();
        assert_eq!(meshes.len(), 1);
        assert!(back.equals(meshes[0], &doc, mesh).unwrap());

        let nodes: Vec<_> = back.list(PropertyKind::Node).collect();
        assert_eq!(back.as_node(nodes[0]).unwrap().translation.y, 5.0);
        assert!(back.root_def().unwrap().default_scene.is_some());
        assert!(back.root_def().unwrap().generator.as_deref().unwrap().starts_with("tilekit"));
    }

    #[test]
    fn test_views_are_aligned() {
        let mut doc = Document::new();
        doc.create_texture("a", "image/png", vec![1; 3]);
        doc.create_texture("b", "image/png", vec![2; 5]);
        let mut exporter = Exporter::new(&doc);
        let gltf = exporter.run().unwrap();
        assert_eq!(gltf.buffer_views[1].byte_offset, 4);
        assert_eq!(gltf.buffers[0].byte_length, 9);
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn test_buffer_length_limit() {
        assert_eq!(to_u32(u32::MAX as usize).unwrap(), u32::MAX);
        assert!(matches!(to_u32(u32::MAX as usize + 1), Err(Error::Other(_))));
    }
}

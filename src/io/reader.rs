//! glTF import into a [`Document`].

use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

use glam::{Mat4, Quat, Vec3};
use memmap2::Mmap;

use super::json::*;
use super::{component_size, element_components};
use crate::glb;
use crate::graph::{
    AccessorDef, Document, MaterialDef, NodeDef, PrimitiveDef, PropertyData, PropertyId, SceneDef,
    TextureInfoDef, MODE_TRIANGLES,
};
use crate::metadata::{
    schema_from_parsed, PrimitiveMetadataDef, PropertyAttributeDef, PropertyAttributePropertyDef,
    PropertyTableDef, PropertyTablePropertyDef, PropertyTextureDef, PropertyTexturePropertyDef,
    StructuralMetadataDef, ValueTransform, EXTENSION_NAME,
};
use crate::util::{decompress_if_gzipped, Error, Result};

/// Parse a glTF document from GLB 2.0 or plain JSON bytes.
///
/// Gzipped input is inflated first. GLB 1.0 containers decode but their
/// glTF 1.0 content is rejected.
pub fn read_document(data: &[u8]) -> Result<Document> {
    let data = decompress_if_gzipped(data)?;
    if glb::is_glb(&data) {
        let parts = glb::decode(&data)?;
        if parts.version != 2 {
            return Err(Error::Unsupported(format!("glTF {}.0 content", parts.version)));
        }
        let gltf: GltfJson = serde_json::from_str(parts.json_str()?)?;
        Importer::new(&gltf, &parts.bin).run()
    } else {
        let gltf: GltfJson = serde_json::from_slice(&data)?;
        Importer::new(&gltf, &[]).run()
    }
}

/// Memory-map and parse a glTF file.
pub fn read_document_file(path: impl AsRef<Path>) -> Result<Document> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::FileNotFound(path.to_path_buf())
        } else {
            Error::Io(e)
        }
    })?;
    if file.metadata()?.len() == 0 {
        return Err(Error::eof(glb::HEADER_SIZE, 0));
    }
    // Safety: file is opened read-only and the map does not outlive this call
    let mmap = unsafe { Mmap::map(&file) }?;
    read_document(&mmap)
}

/// Largest zero-filled accessor created for accessors without a buffer view.
const MAX_UNBACKED_ACCESSOR_BYTES: usize = 1 << 28;

struct Importer<'a> {
    gltf: &'a GltfJson,
    bin: &'a [u8],
    doc: Document,
    accessors: Vec<PropertyId>,
    images: Vec<PropertyId>,
    materials: Vec<PropertyId>,
    meshes: Vec<PropertyId>,
    nodes: Vec<PropertyId>,
}

impl<'a> Importer<'a> {
    fn new(gltf: &'a GltfJson, bin: &'a [u8]) -> Self {
        Self {
            gltf,
            bin,
            doc: Document::new(),
            accessors: Vec::new(),
            images: Vec::new(),
            materials: Vec::new(),
            meshes: Vec::new(),
            nodes: Vec::new(),
        }
    }

    fn run(mut self) -> Result<Document> {
        let gltf = self.gltf;
        if !gltf.asset.version.starts_with('2') {
            return Err(Error::Unsupported(format!("glTF version {}", gltf.asset.version)));
        }
        if let Some(buffer) = gltf.buffers.iter().find(|b| b.uri.is_some()) {
            return Err(Error::Unsupported(format!(
                "external buffer {:?}",
                buffer.uri.as_deref().unwrap_or_default()
            )));
        }

        let root = self.doc.root();
        let root_def = self.doc.as_root_mut(root)?;
        root_def.version = gltf.asset.version.clone();
        root_def.generator = gltf.asset.generator.clone();
        root_def.copyright = gltf.asset.copyright.clone();
        for ext in &gltf.extensions_used {
            self.doc.declare_extension(ext.clone());
        }

        self.read_accessors()?;
        self.read_images()?;
        self.read_materials()?;
        let metadata = self.read_structural_metadata()?;
        self.read_meshes(metadata)?;
        self.read_nodes()?;
        self.read_scenes()?;

        tracing::debug!("imported {} properties", self.doc.len());
        Ok(self.doc)
    }

    /// Bytes of a buffer view.
    fn view(&self, index: usize) -> Result<&'a [u8]> {
        let view = self
            .gltf
            .buffer_views
            .get(index)
            .ok_or_else(|| Error::document(format!("buffer view {index} out of range")))?;
        if view.buffer != 0 {
            return Err(Error::Unsupported(format!("buffer {}", view.buffer)));
        }
        let start = view.byte_offset as usize;
        let end = start + view.byte_length as usize;
        self.bin.get(start..end).ok_or_else(|| {
            Error::document(format!("buffer view {index} ({start}..{end}) exceeds binary chunk"))
        })
    }

    fn lookup(ids: &[PropertyId], index: usize, what: &str) -> Result<PropertyId> {
        ids.get(index)
            .copied()
            .ok_or_else(|| Error::document(format!("{what} {index} out of range")))
    }

    fn read_accessors(&mut self) -> Result<()> {
        let gltf = self.gltf;
        for (i, a) in gltf.accessors.iter().enumerate() {
            let element = element_components(&a.element_type)
                .ok_or_else(|| Error::document(format!("accessor {i}: type {}", a.element_type)))?
                * component_size(a.component_type).ok_or_else(|| {
                    Error::document(format!("accessor {i}: component type {}", a.component_type))
                })?;
            let byte_len = element
                .checked_mul(a.count)
                .ok_or_else(|| Error::document(format!("accessor {i}: count {} overflows", a.count)))?;
            let data = match a.buffer_view {
                Some(view_index) => {
                    let stride = gltf.buffer_views.get(view_index).and_then(|v| v.byte_stride);
                    if stride.is_some_and(|s| s as usize != element) {
                        return Err(Error::Unsupported(format!("accessor {i}: interleaved data")));
                    }
                    let bytes = self.view(view_index)?;
                    let start = a.byte_offset as usize;
                    byte_len
                        .checked_add(start)
                        .and_then(|end| bytes.get(start..end))
                        .ok_or_else(|| Error::document(format!("accessor {i} exceeds its buffer view")))?
                        .to_vec()
                }
                None if byte_len > MAX_UNBACKED_ACCESSOR_BYTES => {
                    return Err(Error::document(format!(
                        "accessor {i}: {byte_len} bytes without a buffer view"
                    )))
                }
                None => vec![0; byte_len],
            };
            let id = self.doc.create_accessor(
                a.name.as_deref().unwrap_or_default(),
                AccessorDef {
                    element_type: a.element_type.clone(),
                    component_type: a.component_type,
                    normalized: a.normalized,
                    count: a.count,
                    min: a.min.clone(),
                    max: a.max.clone(),
                    data,
                },
            );
            self.accessors.push(id);
        }
        Ok(())
    }

    fn read_images(&mut self) -> Result<()> {
        let gltf = self.gltf;
        for (i, image) in gltf.images.iter().enumerate() {
            let view = image.buffer_view.ok_or_else(|| {
                Error::Unsupported(format!("image {i}: only buffer view images are supported"))
            })?;
            let bytes = self.view(view)?.to_vec();
            let id = self.doc.create_texture(
                image.name.as_deref().unwrap_or_default(),
                image.mime_type.as_deref().unwrap_or("image/png"),
                bytes,
            );
            self.images.push(id);
        }
        Ok(())
    }

    /// Texture property and texture info for a glTF texture reference.
    fn texture_ref(&mut self, index: usize, tex_coord: u32) -> Result<(PropertyId, PropertyId)> {
        let texture = self
            .gltf
            .textures
            .get(index)
            .ok_or_else(|| Error::document(format!("texture {index} out of range")))?;
        let source = texture
            .source
            .ok_or_else(|| Error::document(format!("texture {index} has no source")))?;
        let image = Self::lookup(&self.images, source, "image")?;
        let sampler = match texture.sampler {
            Some(s) => self
                .gltf
                .samplers
                .get(s)
                .cloned()
                .ok_or_else(|| Error::document(format!("sampler {s} out of range")))?,
            None => SamplerJson::default(),
        };
        let info = self.doc.create_texture_info(TextureInfoDef {
            tex_coord,
            mag_filter: sampler.mag_filter,
            min_filter: sampler.min_filter,
            wrap_s: sampler.wrap_s,
            wrap_t: sampler.wrap_t,
        });
        Ok((image, info))
    }

    fn read_materials(&mut self) -> Result<()> {
        let gltf = self.gltf;
        for m in &gltf.materials {
            let mut def = MaterialDef {
                alpha_mode: m.alpha_mode.clone().unwrap_or_else(|| "OPAQUE".to_string()),
                alpha_cutoff: m.alpha_cutoff,
                double_sided: m.double_sided,
                ..MaterialDef::default()
            };
            if let Some(pbr) = &m.pbr_metallic_roughness {
                def.base_color_factor = pbr.base_color_factor.unwrap_or([1.0; 4]);
                def.metallic_factor = pbr.metallic_factor.unwrap_or(1.0);
                def.roughness_factor = pbr.roughness_factor.unwrap_or(1.0);
                if let Some(info) = &pbr.base_color_texture {
                    let (texture, info) = self.texture_ref(info.index, info.tex_coord)?;
                    def.base_color_texture = Some(texture);
                    def.base_color_texture_info = Some(info);
                }
            }
            let id = self.doc.create_material(m.name.as_deref().unwrap_or_default(), def);
            self.materials.push(id);
        }
        Ok(())
    }

    fn read_structural_metadata(&mut self) -> Result<Option<PropertyId>> {
        let gltf = self.gltf;
        let Some(json) = gltf.extensions.as_ref().and_then(|e| e.structural_metadata.as_ref()) else {
            return Ok(None);
        };

        let schema = json.schema.clone().map(|s| schema_from_parsed(&mut self.doc, s));

        let mut property_tables = Vec::with_capacity(json.property_tables.len());
        for table in &json.property_tables {
            let mut properties = BTreeMap::new();
            for (key, p) in &table.properties {
                let def = PropertyTablePropertyDef {
                    values: self.view(p.values)?.to_vec(),
                    array_offsets: p.array_offsets.map(|v| self.view(v)).transpose()?.map(<[u8]>::to_vec),
                    string_offsets: p.string_offsets.map(|v| self.view(v)).transpose()?.map(<[u8]>::to_vec),
                    array_offset_type: p.array_offset_type.clone(),
                    string_offset_type: p.string_offset_type.clone(),
                    transform: transform_from_json(&p.transform),
                };
                properties.insert(key.clone(), self.doc.add("", PropertyData::PropertyTableProperty(def)));
            }
            property_tables.push(self.doc.add(
                table.name.as_deref().unwrap_or_default(),
                PropertyData::PropertyTable(PropertyTableDef {
                    class: table.class.clone(),
                    count: table.count,
                    properties,
                }),
            ));
        }

        let mut property_textures = Vec::with_capacity(json.property_textures.len());
        for texture in &json.property_textures {
            let mut properties = BTreeMap::new();
            for (key, p) in &texture.properties {
                let (image, info) = self.texture_ref(p.index, p.tex_coord)?;
                let def = PropertyTexturePropertyDef {
                    texture: Some(image),
                    texture_info: Some(info),
                    channels: if p.channels.is_empty() { vec![0] } else { p.channels.clone() },
                    transform: transform_from_json(&p.transform),
                };
                properties.insert(key.clone(), self.doc.add("", PropertyData::PropertyTextureProperty(def)));
            }
            property_textures.push(self.doc.add(
                texture.name.as_deref().unwrap_or_default(),
                PropertyData::PropertyTexture(PropertyTextureDef { class: texture.class.clone(), properties }),
            ));
        }

        let mut property_attributes = Vec::with_capacity(json.property_attributes.len());
        for attribute in &json.property_attributes {
            let mut properties = BTreeMap::new();
            for (key, p) in &attribute.properties {
                let def = PropertyAttributePropertyDef {
                    attribute: p.attribute.clone(),
                    transform: transform_from_json(&p.transform),
                };
                properties.insert(key.clone(), self.doc.add("", PropertyData::PropertyAttributeProperty(def)));
            }
            property_attributes.push(self.doc.add(
                attribute.name.as_deref().unwrap_or_default(),
                PropertyData::PropertyAttribute(PropertyAttributeDef {
                    class: attribute.class.clone(),
                    properties,
                }),
            ));
        }

        let id = self.doc.add(
            "",
            PropertyData::StructuralMetadata(StructuralMetadataDef {
                schema,
                schema_uri: if schema.is_some() { None } else { json.schema_uri.clone() },
                property_tables,
                property_textures,
                property_attributes,
            }),
        );
        self.doc.set_structural_metadata(Some(id))?;
        Ok(Some(id))
    }

    fn read_meshes(&mut self, metadata: Option<PropertyId>) -> Result<()> {
        let gltf = self.gltf;
        for mesh in &gltf.meshes {
            let mut primitives = Vec::with_capacity(mesh.primitives.len());
            for p in &mesh.primitives {
                let mut attributes = BTreeMap::new();
                for (semantic, &index) in &p.attributes {
                    attributes.insert(semantic.clone(), Self::lookup(&self.accessors, index, "accessor")?);
                }
                let indices = p.indices.map(|i| Self::lookup(&self.accessors, i, "accessor")).transpose()?;
                let material = p.material.map(|i| Self::lookup(&self.materials, i, "material")).transpose()?;
                let binding = match p.extensions.as_ref().and_then(|e| e.structural_metadata.as_ref()) {
                    Some(json) => Some(self.read_binding(metadata, json)?),
                    None => None,
                };
                primitives.push(self.doc.add(
                    "",
                    PropertyData::Primitive(PrimitiveDef {
                        attributes,
                        indices,
                        material,
                        mode: p.mode.unwrap_or(MODE_TRIANGLES),
                        metadata: binding,
                    }),
                ));
            }
            let id = self.doc.create_mesh(mesh.name.as_deref().unwrap_or_default(), primitives);
            self.meshes.push(id);
        }
        Ok(())
    }

    fn read_binding(&mut self, metadata: Option<PropertyId>, json: &PrimitiveMetadataJson) -> Result<PropertyId> {
        let metadata = metadata.ok_or_else(|| {
            Error::missing(format!("primitive uses {EXTENSION_NAME} without a root extension"))
        })?;
        let root = self.doc.as_structural_metadata(metadata)?;
        let property_textures = json
            .property_textures
            .iter()
            .map(|&i| Self::lookup(&root.property_textures, i, "property texture"))
            .collect::<Result<Vec<_>>>()?;
        let property_attributes = json
            .property_attributes
            .iter()
            .map(|&i| Self::lookup(&root.property_attributes, i, "property attribute"))
            .collect::<Result<Vec<_>>>()?;
        Ok(self.doc.add(
            "",
            PropertyData::PrimitiveMetadata(PrimitiveMetadataDef { property_textures, property_attributes }),
        ))
    }

    fn read_nodes(&mut self) -> Result<()> {
        let gltf = self.gltf;
        for n in &gltf.nodes {
            let mesh = n.mesh.map(|i| Self::lookup(&self.meshes, i, "mesh")).transpose()?;
            let mut def = NodeDef { mesh, ..NodeDef::default() };
            if let Some(m) = n.matrix {
                let (scale, rotation, translation) = Mat4::from_cols_array(&m).to_scale_rotation_translation();
                def.translation = translation;
                def.rotation = rotation;
                def.scale = scale;
            }
            if let Some(t) = n.translation {
                def.translation = Vec3::from_array(t);
            }
            if let Some(r) = n.rotation {
                def.rotation = Quat::from_array(r);
            }
            if let Some(s) = n.scale {
                def.scale = Vec3::from_array(s);
            }
            let id = self.doc.add(n.name.as_deref().unwrap_or_default(), PropertyData::Node(def));
            self.nodes.push(id);
        }
        // Children may point forward, so they are linked once every node exists
        for (i, n) in gltf.nodes.iter().enumerate() {
            let children = n
                .children
                .iter()
                .map(|&c| Self::lookup(&self.nodes, c, "node"))
                .collect::<Result<Vec<_>>>()?;
            let node = self.nodes[i];
            self.doc.as_node_mut(node)?.children = children;
        }
        Ok(())
    }

    fn read_scenes(&mut self) -> Result<()> {
        let gltf = self.gltf;
        let mut scenes = Vec::with_capacity(gltf.scenes.len());
        for s in &gltf.scenes {
            let nodes = s
                .nodes
                .iter()
                .map(|&n| Self::lookup(&self.nodes, n, "node"))
                .collect::<Result<Vec<_>>>()?;
            scenes.push(self.doc.add(
                s.name.as_deref().unwrap_or_default(),
                PropertyData::Scene(SceneDef { nodes }),
            ));
        }
        let default_scene = gltf.scene.map(|i| Self::lookup(&scenes, i, "scene")).transpose()?;
        let root = self.doc.root();
        self.doc.as_root_mut(root)?.default_scene = default_scene;
        Ok(())
    }
}

fn transform_from_json(json: &TransformJson) -> ValueTransform {
    ValueTransform {
        offset: json.offset.clone(),
        scale: json.scale.clone(),
        min: json.min.clone(),
        max: json.max.clone(),
    }
}

//! Property kinds and their payloads.
//!
//! Every node of a [`Document`](super::Document) is a [`Property`]: a name
//! plus one [`PropertyData`] variant. References to other properties are
//! stored as [`PropertyId`] slots which the merge engine rewrites through
//! [`PropertyData::refs_mut`].

use std::collections::BTreeMap;

use glam::{Quat, Vec3};
use smallvec::SmallVec;

use crate::metadata::{
    ClassDef, ClassPropertyDef, EnumDef, EnumValueDef, PrimitiveMetadataDef, PropertyAttributeDef,
    PropertyAttributePropertyDef, PropertyTableDef, PropertyTablePropertyDef, PropertyTextureDef,
    PropertyTexturePropertyDef, SchemaDef, StructuralMetadataDef,
};

/// Index of a property inside its owning document.
///
/// Ids are only meaningful together with the document that issued them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PropertyId(pub(crate) usize);

impl PropertyId {
    /// Placeholder used when comparing shapes with references blanked out.
    pub(crate) const BLANK: PropertyId = PropertyId(usize::MAX);

    /// Arena index of this id.
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for PropertyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Type tag of a property.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PropertyKind {
    Root,
    Scene,
    Node,
    Mesh,
    Primitive,
    Accessor,
    Material,
    Texture,
    TextureInfo,
    StructuralMetadata,
    Schema,
    Class,
    ClassProperty,
    Enum,
    EnumValue,
    PropertyTable,
    PropertyTableProperty,
    PropertyTexture,
    PropertyTextureProperty,
    PropertyAttribute,
    PropertyAttributeProperty,
    PrimitiveMetadata,
}

impl PropertyKind {
    /// Kinds that are never transferred on their own.
    ///
    /// The root is always mapped onto the target root and texture infos are
    /// recreated together with the material or extension object owning them.
    #[inline]
    pub fn is_transferable(self) -> bool {
        !matches!(self, PropertyKind::Root | PropertyKind::TextureInfo)
    }
}

/// Document root: asset information and document-level references.
#[derive(Clone, Debug, PartialEq)]
pub struct RootDef {
    pub version: String,
    pub generator: Option<String>,
    pub copyright: Option<String>,
    pub default_scene: Option<PropertyId>,
    pub structural_metadata: Option<PropertyId>,
}

impl Default for RootDef {
    fn default() -> Self {
        Self {
            version: "2.0".to_string(),
            generator: None,
            copyright: None,
            default_scene: None,
            structural_metadata: None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SceneDef {
    pub nodes: Vec<PropertyId>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct NodeDef {
    pub mesh: Option<PropertyId>,
    pub children: Vec<PropertyId>,
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for NodeDef {
    fn default() -> Self {
        Self {
            mesh: None,
            children: Vec::new(),
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshDef {
    pub primitives: Vec<PropertyId>,
}

/// Default primitive topology (triangles).
pub const MODE_TRIANGLES: u32 = 4;

#[derive(Clone, Debug, PartialEq)]
pub struct PrimitiveDef {
    pub attributes: BTreeMap<String, PropertyId>,
    pub indices: Option<PropertyId>,
    pub material: Option<PropertyId>,
    pub mode: u32,
    /// Per-primitive structural metadata binding.
    pub metadata: Option<PropertyId>,
}

impl Default for PrimitiveDef {
    fn default() -> Self {
        Self {
            attributes: BTreeMap::new(),
            indices: None,
            material: None,
            mode: MODE_TRIANGLES,
            metadata: None,
        }
    }
}

/// Accessor element layout with tightly packed data.
#[derive(Clone, Debug, PartialEq)]
pub struct AccessorDef {
    /// `SCALAR`, `VEC2`, `VEC3`, `VEC4`, `MAT2`, `MAT3` or `MAT4`.
    pub element_type: String,
    /// glTF component type code (5120..=5126).
    pub component_type: u32,
    pub normalized: bool,
    pub count: usize,
    pub min: Option<Vec<f64>>,
    pub max: Option<Vec<f64>>,
    pub data: Vec<u8>,
}

impl Default for AccessorDef {
    fn default() -> Self {
        Self {
            element_type: "SCALAR".to_string(),
            component_type: 5126,
            normalized: false,
            count: 0,
            min: None,
            max: None,
            data: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MaterialDef {
    pub base_color_factor: [f32; 4],
    pub base_color_texture: Option<PropertyId>,
    pub base_color_texture_info: Option<PropertyId>,
    pub metallic_factor: f32,
    pub roughness_factor: f32,
    pub alpha_mode: String,
    pub alpha_cutoff: Option<f32>,
    pub double_sided: bool,
}

impl Default for MaterialDef {
    fn default() -> Self {
        Self {
            base_color_factor: [1.0; 4],
            base_color_texture: None,
            base_color_texture_info: None,
            metallic_factor: 1.0,
            roughness_factor: 1.0,
            alpha_mode: "OPAQUE".to_string(),
            alpha_cutoff: None,
            double_sided: false,
        }
    }
}

/// Embedded image with its mime type.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TextureDef {
    pub mime_type: String,
    pub image: Vec<u8>,
}

/// Texture binding parameters. Owned by exactly one material or extension object.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TextureInfoDef {
    pub tex_coord: u32,
    pub mag_filter: Option<u32>,
    pub min_filter: Option<u32>,
    pub wrap_s: Option<u32>,
    pub wrap_t: Option<u32>,
}

/// Payload of a property.
#[derive(Clone, Debug, PartialEq)]
pub enum PropertyData {
    Root(RootDef),
    Scene(SceneDef),
    Node(NodeDef),
    Mesh(MeshDef),
    Primitive(PrimitiveDef),
    Accessor(AccessorDef),
    Material(MaterialDef),
    Texture(TextureDef),
    TextureInfo(TextureInfoDef),
    StructuralMetadata(StructuralMetadataDef),
    Schema(SchemaDef),
    Class(ClassDef),
    ClassProperty(ClassPropertyDef),
    Enum(EnumDef),
    EnumValue(EnumValueDef),
    PropertyTable(PropertyTableDef),
    PropertyTableProperty(PropertyTablePropertyDef),
    PropertyTexture(PropertyTextureDef),
    PropertyTextureProperty(PropertyTexturePropertyDef),
    PropertyAttribute(PropertyAttributeDef),
    PropertyAttributeProperty(PropertyAttributePropertyDef),
    PrimitiveMetadata(PrimitiveMetadataDef),
}

/// Reference list returned by [`PropertyData::refs`].
pub type Refs = SmallVec<[PropertyId; 8]>;

impl PropertyData {
    /// Type tag of this payload.
    pub fn kind(&self) -> PropertyKind {
        match self {
            Self::Root(_) => PropertyKind::Root,
            Self::Scene(_) => PropertyKind::Scene,
            Self::Node(_) => PropertyKind::Node,
            Self::Mesh(_) => PropertyKind::Mesh,
            Self::Primitive(_) => PropertyKind::Primitive,
            Self::Accessor(_) => PropertyKind::Accessor,
            Self::Material(_) => PropertyKind::Material,
            Self::Texture(_) => PropertyKind::Texture,
            Self::TextureInfo(_) => PropertyKind::TextureInfo,
            Self::StructuralMetadata(_) => PropertyKind::StructuralMetadata,
            Self::Schema(_) => PropertyKind::Schema,
            Self::Class(_) => PropertyKind::Class,
            Self::ClassProperty(_) => PropertyKind::ClassProperty,
            Self::Enum(_) => PropertyKind::Enum,
            Self::EnumValue(_) => PropertyKind::EnumValue,
            Self::PropertyTable(_) => PropertyKind::PropertyTable,
            Self::PropertyTableProperty(_) => PropertyKind::PropertyTableProperty,
            Self::PropertyTexture(_) => PropertyKind::PropertyTexture,
            Self::PropertyTextureProperty(_) => PropertyKind::PropertyTextureProperty,
            Self::PropertyAttribute(_) => PropertyKind::PropertyAttribute,
            Self::PropertyAttributeProperty(_) => PropertyKind::PropertyAttributeProperty,
            Self::PrimitiveMetadata(_) => PropertyKind::PrimitiveMetadata,
        }
    }

    /// Fresh, unpopulated payload of the given kind.
    pub fn empty(kind: PropertyKind) -> Self {
        match kind {
            PropertyKind::Root => Self::Root(RootDef::default()),
            PropertyKind::Scene => Self::Scene(SceneDef::default()),
            PropertyKind::Node => Self::Node(NodeDef::default()),
            PropertyKind::Mesh => Self::Mesh(MeshDef::default()),
            PropertyKind::Primitive => Self::Primitive(PrimitiveDef::default()),
            PropertyKind::Accessor => Self::Accessor(AccessorDef::default()),
            PropertyKind::Material => Self::Material(MaterialDef::default()),
            PropertyKind::Texture => Self::Texture(TextureDef::default()),
            PropertyKind::TextureInfo => Self::TextureInfo(TextureInfoDef::default()),
            PropertyKind::StructuralMetadata => {
                Self::StructuralMetadata(StructuralMetadataDef::default())
            }
            PropertyKind::Schema => Self::Schema(SchemaDef::default()),
            PropertyKind::Class => Self::Class(ClassDef::default()),
            PropertyKind::ClassProperty => Self::ClassProperty(ClassPropertyDef::default()),
            PropertyKind::Enum => Self::Enum(EnumDef::default()),
            PropertyKind::EnumValue => Self::EnumValue(EnumValueDef::default()),
            PropertyKind::PropertyTable => Self::PropertyTable(PropertyTableDef::default()),
            PropertyKind::PropertyTableProperty => {
                Self::PropertyTableProperty(PropertyTablePropertyDef::default())
            }
            PropertyKind::PropertyTexture => Self::PropertyTexture(PropertyTextureDef::default()),
            PropertyKind::PropertyTextureProperty => {
                Self::PropertyTextureProperty(PropertyTexturePropertyDef::default())
            }
            PropertyKind::PropertyAttribute => {
                Self::PropertyAttribute(PropertyAttributeDef::default())
            }
            PropertyKind::PropertyAttributeProperty => {
                Self::PropertyAttributeProperty(PropertyAttributePropertyDef::default())
            }
            PropertyKind::PrimitiveMetadata => {
                Self::PrimitiveMetadata(PrimitiveMetadataDef::default())
            }
        }
    }

    /// Outgoing references, in a stable order.
    pub fn refs(&self) -> Refs {
        let mut out = Refs::new();
        match self {
            Self::Root(d) => out.extend(d.default_scene.into_iter().chain(d.structural_metadata)),
            Self::Scene(d) => out.extend(d.nodes.iter().copied()),
            Self::Node(d) => {
                out.extend(d.mesh);
                out.extend(d.children.iter().copied());
            }
            Self::Mesh(d) => out.extend(d.primitives.iter().copied()),
            Self::Primitive(d) => {
                out.extend(d.attributes.values().copied());
                out.extend(d.indices.into_iter().chain(d.material).chain(d.metadata));
            }
            Self::Material(d) => {
                out.extend(d.base_color_texture.into_iter().chain(d.base_color_texture_info))
            }
            Self::StructuralMetadata(d) => {
                out.extend(d.schema);
                out.extend(d.property_tables.iter().copied());
                out.extend(d.property_textures.iter().copied());
                out.extend(d.property_attributes.iter().copied());
            }
            Self::Schema(d) => {
                out.extend(d.classes.values().copied());
                out.extend(d.enums.values().copied());
            }
            Self::Class(d) => out.extend(d.properties.values().copied()),
            Self::Enum(d) => out.extend(d.values.iter().copied()),
            Self::PropertyTable(d) => out.extend(d.properties.values().copied()),
            Self::PropertyTexture(d) => out.extend(d.properties.values().copied()),
            Self::PropertyTextureProperty(d) => {
                out.extend(d.texture.into_iter().chain(d.texture_info))
            }
            Self::PropertyAttribute(d) => out.extend(d.properties.values().copied()),
            Self::PrimitiveMetadata(d) => {
                out.extend(d.property_textures.iter().copied());
                out.extend(d.property_attributes.iter().copied());
            }
            Self::Accessor(_)
            | Self::Texture(_)
            | Self::TextureInfo(_)
            | Self::ClassProperty(_)
            | Self::EnumValue(_)
            | Self::PropertyTableProperty(_)
            | Self::PropertyAttributeProperty(_) => {}
        }
        out
    }

    /// Mutable reference slots, in the same order as [`refs`](Self::refs).
    pub fn refs_mut(&mut self) -> SmallVec<[&mut PropertyId; 8]> {
        let mut out: SmallVec<[&mut PropertyId; 8]> = SmallVec::new();
        match self {
            Self::Root(d) => {
                out.extend(d.default_scene.as_mut());
                out.extend(d.structural_metadata.as_mut());
            }
            Self::Scene(d) => out.extend(d.nodes.iter_mut()),
            Self::Node(d) => {
                out.extend(d.mesh.as_mut());
                out.extend(d.children.iter_mut());
            }
            Self::Mesh(d) => out.extend(d.primitives.iter_mut()),
            Self::Primitive(d) => {
                out.extend(d.attributes.values_mut());
                out.extend(d.indices.as_mut());
                out.extend(d.material.as_mut());
                out.extend(d.metadata.as_mut());
            }
            Self::Material(d) => {
                out.extend(d.base_color_texture.as_mut());
                out.extend(d.base_color_texture_info.as_mut());
            }
            Self::StructuralMetadata(d) => {
                out.extend(d.schema.as_mut());
                out.extend(d.property_tables.iter_mut());
                out.extend(d.property_textures.iter_mut());
                out.extend(d.property_attributes.iter_mut());
            }
            Self::Schema(d) => {
                out.extend(d.classes.values_mut());
                out.extend(d.enums.values_mut());
            }
            Self::Class(d) => out.extend(d.properties.values_mut()),
            Self::Enum(d) => out.extend(d.values.iter_mut()),
            Self::PropertyTable(d) => out.extend(d.properties.values_mut()),
            Self::PropertyTexture(d) => out.extend(d.properties.values_mut()),
            Self::PropertyTextureProperty(d) => {
                out.extend(d.texture.as_mut());
                out.extend(d.texture_info.as_mut());
            }
            Self::PropertyAttribute(d) => out.extend(d.properties.values_mut()),
            Self::PrimitiveMetadata(d) => {
                out.extend(d.property_textures.iter_mut());
                out.extend(d.property_attributes.iter_mut());
            }
            Self::Accessor(_)
            | Self::Texture(_)
            | Self::TextureInfo(_)
            | Self::ClassProperty(_)
            | Self::EnumValue(_)
            | Self::PropertyTableProperty(_)
            | Self::PropertyAttributeProperty(_) => {}
        }
        out
    }

    /// Copy of this payload with every reference replaced by a placeholder.
    ///
    /// Two payloads with equal shapes differ at most in what their
    /// references point to.
    pub(crate) fn shape(&self) -> PropertyData {
        let mut copy = self.clone();
        for slot in copy.refs_mut() {
            *slot = PropertyId::BLANK;
        }
        copy
    }
}

/// A node of the document graph.
#[derive(Clone, Debug, PartialEq)]
pub struct Property {
    /// Display name; empty when unnamed.
    pub name: String,
    pub data: PropertyData,
}

impl Property {
    pub fn new(name: impl Into<String>, data: PropertyData) -> Self {
        Self { name: name.into(), data }
    }

    #[inline]
    pub fn kind(&self) -> PropertyKind {
        self.data.kind()
    }
}

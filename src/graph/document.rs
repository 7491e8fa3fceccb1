//! Arena-backed document graph.

use std::collections::BTreeSet;

use super::equality;
use super::property::*;
use crate::metadata::{
    ClassDef, ClassPropertyDef, EnumDef, EnumValueDef, PrimitiveMetadataDef, PropertyAttributeDef,
    PropertyAttributePropertyDef, PropertyTableDef, PropertyTablePropertyDef, PropertyTextureDef,
    PropertyTexturePropertyDef, SchemaDef, StructuralMetadataDef,
};
use crate::util::{Error, Result};

/// An owned graph of properties with a distinguished root.
///
/// Properties are only ever added; merge operations never remove anything
/// from either document.
#[derive(Clone, Debug)]
pub struct Document {
    properties: Vec<Property>,
    root: PropertyId,
    extensions_used: BTreeSet<String>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create a document holding only its root.
    pub fn new() -> Self {
        Self {
            properties: vec![Property::new("", PropertyData::Root(RootDef::default()))],
            root: PropertyId(0),
            extensions_used: BTreeSet::new(),
        }
    }

    /// The root property.
    #[inline]
    pub fn root(&self) -> PropertyId {
        self.root
    }

    /// Number of properties, root included.
    #[inline]
    pub fn len(&self) -> usize {
        self.properties.len()
    }

    /// Check if the document holds only its root.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.properties.len() <= 1
    }

    /// Add a property and return its id.
    pub fn add(&mut self, name: impl Into<String>, data: PropertyData) -> PropertyId {
        let id = PropertyId(self.properties.len());
        self.properties.push(Property::new(name, data));
        id
    }

    /// Get a property by id.
    pub fn get(&self, id: PropertyId) -> Result<&Property> {
        self.properties.get(id.0).ok_or(Error::UnknownProperty(id.0))
    }

    /// Get a mutable property by id.
    pub fn get_mut(&mut self, id: PropertyId) -> Result<&mut Property> {
        self.properties.get_mut(id.0).ok_or(Error::UnknownProperty(id.0))
    }

    /// Kind of a property.
    pub fn kind(&self, id: PropertyId) -> Result<PropertyKind> {
        Ok(self.get(id)?.kind())
    }

    /// Name of a property.
    pub fn name(&self, id: PropertyId) -> Result<&str> {
        Ok(self.get(id)?.name.as_str())
    }

    /// Outgoing edges of a property.
    pub fn children(&self, id: PropertyId) -> Result<Refs> {
        Ok(self.get(id)?.data.refs())
    }

    /// Every parent→child edge in the document.
    pub fn list_edges(&self) -> Vec<(PropertyId, PropertyId)> {
        self.properties
            .iter()
            .enumerate()
            .flat_map(|(i, p)| p.data.refs().into_iter().map(move |c| (PropertyId(i), c)))
            .collect()
    }

    /// Iterate over all property ids, root first.
    pub fn ids(&self) -> impl Iterator<Item = PropertyId> + '_ {
        (0..self.properties.len()).map(PropertyId)
    }

    /// Iterate over the ids of all properties of one kind.
    pub fn list(&self, kind: PropertyKind) -> impl Iterator<Item = PropertyId> + '_ {
        self.properties
            .iter()
            .enumerate()
            .filter(move |(_, p)| p.kind() == kind)
            .map(|(i, _)| PropertyId(i))
    }

    /// Structural equality between a property of this document and one of `other`.
    pub fn equals(&self, a: PropertyId, other: &Document, b: PropertyId) -> Result<bool> {
        equality::equals(self, a, other, b)
    }

    // ========================================================================
    // Extensions
    // ========================================================================

    /// Declared extension names.
    pub fn extensions_used(&self) -> &BTreeSet<String> {
        &self.extensions_used
    }

    /// Declare an extension as used.
    pub fn declare_extension(&mut self, name: impl Into<String>) {
        self.extensions_used.insert(name.into());
    }

    /// Root-level structural metadata extension object, if any.
    pub fn structural_metadata(&self) -> Option<PropertyId> {
        self.root_def().ok().and_then(|r| r.structural_metadata)
    }

    /// Attach (or detach) the root-level structural metadata extension object.
    pub fn set_structural_metadata(&mut self, id: Option<PropertyId>) -> Result<()> {
        if let Some(id) = id {
            self.as_structural_metadata(id)?;
            self.declare_extension(crate::metadata::EXTENSION_NAME);
        }
        let root = self.root;
        self.as_root_mut(root)?.structural_metadata = id;
        Ok(())
    }

    /// Root payload.
    pub fn root_def(&self) -> Result<&RootDef> {
        self.as_root(self.root)
    }

    // ========================================================================
    // Builders
    // ========================================================================

    /// Add a scene and make it the default when none is set yet.
    pub fn create_scene(&mut self, name: &str, nodes: Vec<PropertyId>) -> Result<PropertyId> {
        let id = self.add(name, PropertyData::Scene(SceneDef { nodes }));
        let root = self.root;
        let root_def = self.as_root_mut(root)?;
        if root_def.default_scene.is_none() {
            root_def.default_scene = Some(id);
        }
        Ok(id)
    }

    /// Add a node referencing an optional mesh.
    pub fn create_node(&mut self, name: &str, mesh: Option<PropertyId>) -> PropertyId {
        self.add(name, PropertyData::Node(NodeDef { mesh, ..NodeDef::default() }))
    }

    /// Add a mesh with the given primitives.
    pub fn create_mesh(&mut self, name: &str, primitives: Vec<PropertyId>) -> PropertyId {
        self.add(name, PropertyData::Mesh(MeshDef { primitives }))
    }

    /// Add an empty triangle primitive.
    pub fn create_primitive(&mut self) -> PropertyId {
        self.add("", PropertyData::Primitive(PrimitiveDef::default()))
    }

    /// Add an accessor.
    pub fn create_accessor(&mut self, name: &str, def: AccessorDef) -> PropertyId {
        self.add(name, PropertyData::Accessor(def))
    }

    /// Add a texture holding an embedded image.
    pub fn create_texture(&mut self, name: &str, mime_type: &str, image: Vec<u8>) -> PropertyId {
        self.add(
            name,
            PropertyData::Texture(TextureDef { mime_type: mime_type.to_string(), image }),
        )
    }

    /// Add a texture info. Must be owned by exactly one material or extension object.
    pub fn create_texture_info(&mut self, def: TextureInfoDef) -> PropertyId {
        self.add("", PropertyData::TextureInfo(def))
    }

    /// Add a material.
    pub fn create_material(&mut self, name: &str, def: MaterialDef) -> PropertyId {
        self.add(name, PropertyData::Material(def))
    }

    /// Bind a base color texture to a material, creating its texture info.
    pub fn set_base_color_texture(
        &mut self,
        material: PropertyId,
        texture: PropertyId,
        info: TextureInfoDef,
    ) -> Result<()> {
        self.as_texture(texture)?;
        let info = self.create_texture_info(info);
        let def = self.as_material_mut(material)?;
        def.base_color_texture = Some(texture);
        def.base_color_texture_info = Some(info);
        Ok(())
    }
}

macro_rules! typed_accessors {
    ($($variant:ident => $def:ty, $get:ident, $get_mut:ident;)*) => {
        impl Document {
            $(
                #[doc = concat!("Borrow a `", stringify!($variant), "` payload.")]
                pub fn $get(&self, id: PropertyId) -> Result<&$def> {
                    match &self.get(id)?.data {
                        PropertyData::$variant(def) => Ok(def),
                        other => Err(Error::KindMismatch {
                            expected: PropertyKind::$variant,
                            actual: other.kind(),
                        }),
                    }
                }

                #[doc = concat!("Mutably borrow a `", stringify!($variant), "` payload.")]
                pub fn $get_mut(&mut self, id: PropertyId) -> Result<&mut $def> {
                    match &mut self.get_mut(id)?.data {
                        PropertyData::$variant(def) => Ok(def),
                        other => Err(Error::KindMismatch {
                            expected: PropertyKind::$variant,
                            actual: other.kind(),
                        }),
                    }
                }
            )*
        }
    };
}

typed_accessors! {
    Root => RootDef, as_root, as_root_mut;
    Scene => SceneDef, as_scene, as_scene_mut;
    Node => NodeDef, as_node, as_node_mut;
    Mesh => MeshDef, as_mesh, as_mesh_mut;
    Primitive => PrimitiveDef, as_primitive, as_primitive_mut;
    Accessor => AccessorDef, as_accessor, as_accessor_mut;
    Material => MaterialDef, as_material, as_material_mut;
    Texture => TextureDef, as_texture, as_texture_mut;
    TextureInfo => TextureInfoDef, as_texture_info, as_texture_info_mut;
    StructuralMetadata => StructuralMetadataDef, as_structural_metadata, as_structural_metadata_mut;
    Schema => SchemaDef, as_schema, as_schema_mut;
    Class => ClassDef, as_class, as_class_mut;
    ClassProperty => ClassPropertyDef, as_class_property, as_class_property_mut;
    Enum => EnumDef, as_enum, as_enum_mut;
    EnumValue => EnumValueDef, as_enum_value, as_enum_value_mut;
    PropertyTable => PropertyTableDef, as_property_table, as_property_table_mut;
    PropertyTableProperty => PropertyTablePropertyDef, as_property_table_property, as_property_table_property_mut;
    PropertyTexture => PropertyTextureDef, as_property_texture, as_property_texture_mut;
    PropertyTextureProperty => PropertyTexturePropertyDef, as_property_texture_property, as_property_texture_property_mut;
    PropertyAttribute => PropertyAttributeDef, as_property_attribute, as_property_attribute_mut;
    PropertyAttributeProperty => PropertyAttributePropertyDef, as_property_attribute_property, as_property_attribute_property_mut;
    PrimitiveMetadata => PrimitiveMetadataDef, as_primitive_metadata, as_primitive_metadata_mut;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_document() {
        let doc = Document::new();
        assert!(doc.is_empty());
        assert_eq!(doc.kind(doc.root()).unwrap(), PropertyKind::Root);
        assert_eq!(doc.root_def().unwrap().version, "2.0");
        assert!(doc.structural_metadata().is_none());
    }

    #[test]
    fn test_edges_and_children() {
        let mut doc = Document::new();
        let prim = doc.create_primitive();
        let mesh = doc.create_mesh("mesh", vec![prim]);
        let node = doc.create_node("node", Some(mesh));
        let scene = doc.create_scene("scene", vec![node]).unwrap();

        assert_eq!(doc.children(mesh).unwrap().as_slice(), &[prim]);
        assert_eq!(doc.root_def().unwrap().default_scene, Some(scene));

        let edges = doc.list_edges();
        assert!(edges.contains(&(doc.root(), scene)));
        assert!(edges.contains(&(scene, node)));
        assert!(edges.contains(&(node, mesh)));
        assert!(edges.contains(&(mesh, prim)));
        assert_eq!(edges.len(), 4);
    }

    #[test]
    fn test_typed_access_mismatch() {
        let mut doc = Document::new();
        let mesh = doc.create_mesh("mesh", vec![]);
        assert!(doc.as_mesh(mesh).is_ok());
        let err = doc.as_texture(mesh).unwrap_err();
        assert!(matches!(
            err,
            Error::KindMismatch { expected: PropertyKind::Texture, actual: PropertyKind::Mesh }
        ));
        assert!(matches!(doc.get(PropertyId(99)), Err(Error::UnknownProperty(99))));
    }

    #[test]
    fn test_base_color_texture_creates_info() {
        let mut doc = Document::new();
        let tex = doc.create_texture("albedo", "image/png", vec![1, 2, 3]);
        let mat = doc.create_material("mat", MaterialDef::default());
        doc.set_base_color_texture(mat, tex, TextureInfoDef { tex_coord: 1, ..Default::default() })
            .unwrap();

        let def = doc.as_material(mat).unwrap();
        assert_eq!(def.base_color_texture, Some(tex));
        let info = def.base_color_texture_info.unwrap();
        assert_eq!(doc.as_texture_info(info).unwrap().tex_coord, 1);
        assert_eq!(doc.list(PropertyKind::TextureInfo).count(), 1);
    }
}

//! Generic property transfer between documents.
//!
//! Copying runs in three phases so that cyclic and forward references are
//! handled without recursion:
//!
//! 1. collect the transitive dependencies of the requested properties with
//!    an explicit stack;
//! 2. create an empty stub in the target for every unmapped dependency and
//!    record the mapping before anything is populated;
//! 3. populate each stub: scalar fields are cloned, reference slots are
//!    resolved through the same mapping (stubbing on demand).
//!
//! The source root always maps onto the target root and is never populated.
//! Texture infos are owned by their referrer: a reference to one resolves to
//! itself and is recreated in the target while the owner is populated.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::graph::{Document, PropertyData, PropertyId, PropertyKind};
use crate::util::{Error, Result};

/// Mapping from source property ids to target property ids.
pub type PropertyMap = HashMap<PropertyId, PropertyId>;

/// Source→target resolver for one (target, source) document pair.
///
/// Reusing a resolver across several transfers keeps already copied
/// properties shared instead of copying them again.
#[derive(Debug)]
pub struct PropertyResolver {
    map: PropertyMap,
    pending: VecDeque<PropertyId>,
}

impl PropertyResolver {
    /// Create a resolver with the source root mapped onto the target root.
    pub fn new(target: &Document, source: &Document) -> Self {
        let mut map = PropertyMap::new();
        map.insert(source.root(), target.root());
        Self { map, pending: VecDeque::new() }
    }

    /// Current mapping.
    #[inline]
    pub fn map(&self) -> &PropertyMap {
        &self.map
    }

    /// Consume the resolver and return its mapping.
    pub fn into_map(self) -> PropertyMap {
        self.map
    }

    /// Target counterpart of a source property, if already mapped.
    #[inline]
    pub fn get(&self, source_id: PropertyId) -> Option<PropertyId> {
        self.map.get(&source_id).copied()
    }

    /// Copy `props` and all their dependencies from `source` into `target`.
    ///
    /// Fails with [`Error::NotTransferable`] before touching `target` when a
    /// root or texture info is requested directly.
    pub fn transfer(
        &mut self,
        target: &mut Document,
        source: &Document,
        props: &[PropertyId],
    ) -> Result<()> {
        for &id in props {
            let kind = source.kind(id)?;
            if !kind.is_transferable() {
                return Err(Error::NotTransferable(kind));
            }
        }

        let deps = collect_dependencies(source, props)?;
        tracing::trace!("transfer: {} requested, {} with dependencies", props.len(), deps.len());

        for &id in &deps {
            self.resolve(target, source, id)?;
        }
        while let Some(id) = self.pending.pop_front() {
            self.populate(target, source, id)?;
        }
        Ok(())
    }

    /// Map a source property to its target counterpart, creating a stub if needed.
    fn resolve(&mut self, target: &mut Document, source: &Document, id: PropertyId) -> Result<PropertyId> {
        let kind = source.kind(id)?;
        if kind == PropertyKind::TextureInfo {
            return Ok(id);
        }
        if let Some(&mapped) = self.map.get(&id) {
            return Ok(mapped);
        }
        let stub = target.add("", PropertyData::empty(kind));
        self.map.insert(id, stub);
        self.pending.push_back(id);
        Ok(stub)
    }

    /// Fill the stub of `id` from its source property.
    fn populate(&mut self, target: &mut Document, source: &Document, id: PropertyId) -> Result<()> {
        let stub = self
            .get(id)
            .ok_or_else(|| Error::other(format!("populate called on unmapped property {id}")))?;
        let prop = source.get(id)?;
        let mut data = prop.data.clone();

        for slot in data.refs_mut() {
            let child = *slot;
            *slot = if source.kind(child)? == PropertyKind::TextureInfo {
                let info = source.get(child)?.clone();
                target.add(info.name, info.data)
            } else {
                self.resolve(target, source, child)?
            };
        }

        let out = target.get_mut(stub)?;
        if out.kind() != data.kind() {
            return Err(Error::KindMismatch { expected: out.kind(), actual: data.kind() });
        }
        out.name = prop.name.clone();
        out.data = data;
        Ok(())
    }
}

/// Transitive closure of `props` over child edges, in discovery order.
///
/// The root and texture infos are not collected: neither is copied on its own.
pub fn collect_dependencies(source: &Document, props: &[PropertyId]) -> Result<Vec<PropertyId>> {
    let mut visited = HashSet::new();
    let mut order = Vec::new();
    let mut stack: Vec<PropertyId> = props.iter().rev().copied().collect();

    while let Some(id) = stack.pop() {
        if !source.kind(id)?.is_transferable() || !visited.insert(id) {
            continue;
        }
        order.push(id);
        let children = source.children(id)?;
        stack.extend(children.iter().rev().copied());
    }
    Ok(order)
}

/// Copy `props` and their dependencies into `target`.
pub fn copy_to_document(
    target: &mut Document,
    source: &Document,
    props: &[PropertyId],
) -> Result<PropertyMap> {
    let mut resolver = PropertyResolver::new(target, source);
    resolver.transfer(target, source, props)?;
    Ok(resolver.into_map())
}

/// Copy every non-root property of `source` into `target`.
///
/// Declared extensions are merged as well. The target root is left as is,
/// so scenes and root-level extension objects of the source arrive
/// unattached.
pub fn merge_documents(target: &mut Document, source: &Document) -> Result<PropertyMap> {
    let mut resolver = PropertyResolver::new(target, source);
    merge_documents_filtered(target, source, &mut resolver, |_| true)?;
    Ok(resolver.into_map())
}

/// [`merge_documents`] restricted to the properties accepted by `keep`.
///
/// Dependencies of kept properties are copied regardless of `keep`.
pub fn merge_documents_filtered(
    target: &mut Document,
    source: &Document,
    resolver: &mut PropertyResolver,
    keep: impl Fn(PropertyId) -> bool,
) -> Result<()> {
    for ext in source.extensions_used() {
        target.declare_extension(ext.clone());
    }

    let mut props = Vec::new();
    for id in source.ids() {
        if source.kind(id)?.is_transferable() && keep(id) {
            props.push(id);
        }
    }
    tracing::debug!("merging {} properties", props.len());
    resolver.transfer(target, source, &props)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{MaterialDef, TextureInfoDef};

    fn textured_material(doc: &mut Document) -> (PropertyId, PropertyId) {
        let tex = doc.create_texture("albedo", "image/png", vec![7; 8]);
        let mat = doc.create_material("mat", MaterialDef::default());
        doc.set_base_color_texture(mat, tex, TextureInfoDef { tex_coord: 2, ..Default::default() })
            .unwrap();
        (mat, tex)
    }

    #[test]
    fn test_copy_with_dependencies() {
        let mut source = Document::new();
        let (mat, tex) = textured_material(&mut source);
        let prim = source.create_primitive();
        source.as_primitive_mut(prim).unwrap().material = Some(mat);
        let mesh = source.create_mesh("mesh", vec![prim]);

        let mut target = Document::new();
        target.create_mesh("existing", vec![]);
        let before = target.len();

        let map = copy_to_document(&mut target, &source, &[mesh]).unwrap();
        assert_eq!(map[&source.root()], target.root());
        for id in [mesh, prim, mat, tex] {
            assert!(map.contains_key(&id));
        }

        let mesh_t = map[&mesh];
        assert_eq!(target.name(mesh_t).unwrap(), "mesh");
        assert_eq!(target.as_mesh(mesh_t).unwrap().primitives, vec![map[&prim]]);
        assert!(target.equals(mesh_t, &source, mesh).unwrap());

        // Texture info recreated in the target, not shared with the source
        let mat_t = target.as_material(map[&mat]).unwrap();
        let info_t = mat_t.base_color_texture_info.unwrap();
        assert!(info_t.index() >= before);
        assert_eq!(target.as_texture_info(info_t).unwrap().tex_coord, 2);
        assert_eq!(mat_t.base_color_texture, Some(map[&tex]));
    }

    #[test]
    fn test_copied_refs_point_into_target() {
        let mut source = Document::new();
        let (mat, _) = textured_material(&mut source);
        let prim = source.create_primitive();
        source.as_primitive_mut(prim).unwrap().material = Some(mat);
        let mesh = source.create_mesh("mesh", vec![prim]);
        let node = source.create_node("node", Some(mesh));
        source.create_scene("scene", vec![node]).unwrap();

        let mut target = Document::new();
        for _ in 0..5 {
            target.create_mesh("pad", vec![]);
        }
        let before = target.len();
        let map = merge_documents(&mut target, &source).unwrap();

        for (&src, &dst) in &map {
            if src == source.root() {
                continue;
            }
            for child in target.children(dst).unwrap() {
                assert!(child.index() >= before, "{child} still refers outside the copy");
                assert!(child.index() < target.len());
            }
        }
        // Root fields untouched: the copied scene is not the default
        assert_eq!(target.root_def().unwrap().default_scene, None);
    }

    #[test]
    fn test_cycles_terminate() {
        let mut source = Document::new();
        let a = source.create_node("a", None);
        let b = source.create_node("b", None);
        source.as_node_mut(a).unwrap().children.push(b);
        source.as_node_mut(b).unwrap().children.push(a);

        let mut target = Document::new();
        let map = copy_to_document(&mut target, &source, &[a]).unwrap();
        let (a_t, b_t) = (map[&a], map[&b]);
        assert_eq!(target.as_node(a_t).unwrap().children, vec![b_t]);
        assert_eq!(target.as_node(b_t).unwrap().children, vec![a_t]);
    }

    #[test]
    fn test_texture_info_not_transferable() {
        let mut source = Document::new();
        let (mat, _) = textured_material(&mut source);
        let info = source.as_material(mat).unwrap().base_color_texture_info.unwrap();

        let mut target = Document::new();
        let err = copy_to_document(&mut target, &source, &[mat, info]).unwrap_err();
        assert!(matches!(err, Error::NotTransferable(PropertyKind::TextureInfo)));
        // Nothing was created
        assert!(target.is_empty());

        let err = copy_to_document(&mut target, &source, &[source.root()]).unwrap_err();
        assert!(matches!(err, Error::NotTransferable(PropertyKind::Root)));
    }

    #[test]
    fn test_shared_resolver_does_not_duplicate() {
        let mut source = Document::new();
        let tex = source.create_texture("t", "image/png", vec![1]);
        let mut target = Document::new();

        let mut resolver = PropertyResolver::new(&target, &source);
        resolver.transfer(&mut target, &source, &[tex]).unwrap();
        resolver.transfer(&mut target, &source, &[tex]).unwrap();
        assert_eq!(target.list(PropertyKind::Texture).count(), 1);
        assert_eq!(resolver.get(tex), Some(PropertyId(1)));
    }

    #[test]
    fn test_merge_documents_unions_extensions() {
        let mut source = Document::new();
        source.declare_extension("KHR_materials_unlit");
        let mut target = Document::new();
        target.declare_extension("EXT_mesh_features");
        merge_documents(&mut target, &source).unwrap();
        assert!(target.extensions_used().contains("KHR_materials_unlit"));
        assert!(target.extensions_used().contains("EXT_mesh_features"));
    }

    #[test]
    fn test_collect_dependencies_order() {
        let mut doc = Document::new();
        let p1 = doc.create_primitive();
        let p2 = doc.create_primitive();
        let mesh = doc.create_mesh("m", vec![p1, p2]);
        let deps = collect_dependencies(&doc, &[mesh]).unwrap();
        assert_eq!(deps, vec![mesh, p1, p2]);
    }
}

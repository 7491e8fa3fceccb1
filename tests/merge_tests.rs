//! Metadata-aware merge scenarios driven through the public API.

use std::collections::HashSet;

use futures::executor::block_on;
use tilekit::graph::{Document, PropertyId, PropertyKind, TextureInfoDef};
use tilekit::merge::{copy_to_document, merge_documents, merge_documents_with_metadata};
use tilekit::metadata::*;
use tilekit::util::SequentialIds;
use tilekit::{Error, Result};

fn with_schema(id: &str) -> (Document, PropertyId, PropertyId) {
    let mut doc = Document::new();
    let md = ensure_structural_metadata(&mut doc).unwrap();
    let schema = create_schema(&mut doc, md, id).unwrap();
    (doc, md, schema)
}

fn merge(target: &mut Document, source: &mut Document) -> Result<()> {
    let mut ids = SequentialIds::new();
    block_on(merge_documents_with_metadata(target, source, &NoSchemaResolver, &mut ids))
}

fn schema_of_doc(doc: &Document) -> &SchemaDef {
    let md = doc.structural_metadata().unwrap();
    let schema = doc.as_structural_metadata(md).unwrap().schema.unwrap();
    doc.as_schema(schema).unwrap()
}

fn class_keys(doc: &Document) -> Vec<String> {
    schema_of_doc(doc).classes.keys().cloned().collect()
}

fn example_class(doc: &mut Document, schema: PropertyId, key: &str, component_type: &str) -> PropertyId {
    let class = add_class(doc, schema, key, "Example").unwrap();
    add_class_property(doc, class, "value", ClassPropertyDef::numeric("SCALAR", component_type))
        .unwrap();
    class
}

#[test]
fn identical_classes_merge_into_one() {
    let (mut target, _, t_schema) = with_schema("shared");
    let (mut source, _, s_schema) = with_schema("shared");
    example_class(&mut target, t_schema, "exampleClass", "UINT8");
    example_class(&mut source, s_schema, "exampleClass", "UINT8");

    merge(&mut target, &mut source).unwrap();
    assert_eq!(class_keys(&target), vec!["exampleClass"]);
    // Key sets unchanged, id kept
    assert_eq!(schema_of_doc(&target).id, "shared");
}

#[test]
fn differently_keyed_equal_classes_both_survive() {
    let (mut target, _, t_schema) = with_schema("a");
    let (mut source, _, s_schema) = with_schema("b");
    example_class(&mut target, t_schema, "exampleClass", "UINT8");
    example_class(&mut source, s_schema, "exampleClassButWithDifferentName", "UINT8");

    merge(&mut target, &mut source).unwrap();
    assert_eq!(class_keys(&target), vec!["exampleClass", "exampleClassButWithDifferentName"]);
    assert_eq!(schema_of_doc(&target).id, "SCHEMA_ID_0");
}

#[test]
fn colliding_key_with_different_structure_is_disambiguated() {
    let (mut target, _, t_schema) = with_schema("a");
    let (mut source, _, s_schema) = with_schema("b");
    example_class(&mut target, t_schema, "exampleClass", "UINT8");
    example_class(&mut source, s_schema, "exampleClass", "FLOAT32");

    merge(&mut target, &mut source).unwrap();
    assert_eq!(class_keys(&target), vec!["exampleClass", "exampleClass_0"]);

    let schema = schema_of_doc(&target);
    let renamed = target.as_class(schema.classes["exampleClass_0"]).unwrap();
    let value = target.as_class_property(renamed.properties["value"]).unwrap();
    assert_eq!(value.component_type.as_deref(), Some("FLOAT32"));
}

#[test]
fn enum_rename_cascades_to_classes() {
    let (mut target, _, t_schema) = with_schema("a");
    let (mut source, _, s_schema) = with_schema("b");
    add_enum(&mut target, t_schema, "exampleEnum", "UINT16", &[("RED", 0), ("GREEN", 1)]).unwrap();
    add_enum(&mut source, s_schema, "exampleEnum", "UINT16", &[("RED", 10), ("GREEN", 11)]).unwrap();
    for (doc, schema) in [(&mut target, t_schema), (&mut source, s_schema)] {
        let class = add_class(doc, schema, "exampleClass", "").unwrap();
        add_class_property(doc, class, "color", ClassPropertyDef::enumeration("exampleEnum"))
            .unwrap();
    }

    merge(&mut target, &mut source).unwrap();
    let schema = schema_of_doc(&target);
    assert_eq!(schema.enums.keys().collect::<Vec<_>>(), vec!["exampleEnum", "exampleEnum_0"]);
    assert_eq!(schema.classes.keys().collect::<Vec<_>>(), vec!["exampleClass", "exampleClass_0"]);

    let original = target.as_class(schema.classes["exampleClass"]).unwrap();
    let color = target.as_class_property(original.properties["color"]).unwrap();
    assert_eq!(color.enum_type.as_deref(), Some("exampleEnum"));

    let renamed = target.as_class(schema.classes["exampleClass_0"]).unwrap();
    let color = target.as_class_property(renamed.properties["color"]).unwrap();
    assert_eq!(color.enum_type.as_deref(), Some("exampleEnum_0"));

    let values = &target.as_enum(schema.enums["exampleEnum_0"]).unwrap().values;
    assert_eq!(target.as_enum_value(values[0]).unwrap().value, 10);
}

#[test]
fn property_tables_against_equal_classes() {
    let (mut target, t_md, t_schema) = with_schema("a");
    let (mut source, s_md, s_schema) = with_schema("a");
    example_class(&mut target, t_schema, "exampleClass", "UINT8");
    example_class(&mut source, s_schema, "exampleClass", "UINT8");
    add_property_table(&mut target, t_md, "first", "exampleClass", 4).unwrap();
    add_property_table(&mut source, s_md, "second", "exampleClass", 4).unwrap();

    merge(&mut target, &mut source).unwrap();
    assert_eq!(class_keys(&target), vec!["exampleClass"]);
    let tables = &target.as_structural_metadata(t_md).unwrap().property_tables;
    assert_eq!(tables.len(), 2);
    for &table in tables {
        assert_eq!(target.as_property_table(table).unwrap().class, "exampleClass");
    }
}

#[test]
fn property_tables_against_diverging_classes() {
    let (mut target, t_md, t_schema) = with_schema("a");
    let (mut source, s_md, s_schema) = with_schema("b");
    example_class(&mut target, t_schema, "exampleClass", "UINT8");
    example_class(&mut source, s_schema, "exampleClass", "INT32");
    add_property_table(&mut target, t_md, "first", "exampleClass", 2).unwrap();
    add_property_table(&mut source, s_md, "second", "exampleClass", 3).unwrap();

    merge(&mut target, &mut source).unwrap();
    assert_eq!(class_keys(&target).len(), 2);
    let tables = &target.as_structural_metadata(t_md).unwrap().property_tables;
    assert_eq!(tables.len(), 2);
    assert_eq!(target.as_property_table(tables[0]).unwrap().class, "exampleClass");
    let second = target.as_property_table(tables[1]).unwrap();
    assert_eq!(second.class, "exampleClass_0");
    assert_eq!(second.count, 3);
}

#[test]
fn equal_property_textures_are_shared() {
    fn textured(doc: &mut Document, md: PropertyId) -> PropertyId {
        let image = doc.create_texture("ids", "image/png", vec![0x89, b'P', b'N', b'G']);
        let pt = add_property_texture(doc, md, "", "exampleClass").unwrap();
        add_property_texture_property(doc, pt, "value", image, TextureInfoDef::default(), vec![0])
            .unwrap();
        let prim = doc.create_primitive();
        doc.create_mesh("mesh", vec![prim]);
        bind_property_texture(doc, prim, pt).unwrap();
        pt
    }

    let (mut target, t_md, t_schema) = with_schema("a");
    let (mut source, s_md, s_schema) = with_schema("a");
    example_class(&mut target, t_schema, "exampleClass", "UINT8");
    example_class(&mut source, s_schema, "exampleClass", "UINT8");
    let canonical = textured(&mut target, t_md);
    textured(&mut source, s_md);

    merge(&mut target, &mut source).unwrap();
    let def = target.as_structural_metadata(t_md).unwrap();
    assert_eq!(def.property_textures, vec![canonical]);

    let prims: Vec<_> = target.list(PropertyKind::Primitive).collect();
    assert_eq!(prims.len(), 2);
    for prim in prims {
        let binding = target.as_primitive(prim).unwrap().metadata.unwrap();
        assert_eq!(target.as_primitive_metadata(binding).unwrap().property_textures, vec![canonical]);
    }
}

#[test]
fn distinct_property_attributes_are_kept() {
    let (mut target, t_md, t_schema) = with_schema("a");
    let (mut source, s_md, s_schema) = with_schema("a");
    example_class(&mut target, t_schema, "exampleClass", "UINT8");
    example_class(&mut source, s_schema, "exampleClass", "UINT8");

    let shared = add_property_attribute(&mut target, t_md, "", "exampleClass", &[("value", "_VALUE")])
        .unwrap();
    add_property_attribute(&mut source, s_md, "", "exampleClass", &[("value", "_VALUE")]).unwrap();
    add_property_attribute(&mut source, s_md, "", "exampleClass", &[("value", "_OTHER")]).unwrap();
    let prim = source.create_primitive();
    let other = source.as_structural_metadata(s_md).unwrap().property_attributes[1];
    bind_property_attribute(&mut source, prim, other).unwrap();

    merge(&mut target, &mut source).unwrap();
    let attributes = &target.as_structural_metadata(t_md).unwrap().property_attributes;
    assert_eq!(attributes.len(), 2);
    assert_eq!(attributes[0], shared);

    let merged_prim = target.list(PropertyKind::Primitive).next().unwrap();
    let binding = target.as_primitive(merged_prim).unwrap().metadata.unwrap();
    let bound = &target.as_primitive_metadata(binding).unwrap().property_attributes;
    assert_eq!(bound, &vec![attributes[1]]);
}

#[test]
fn external_schema_resolved_from_directory() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("schema.json"),
        r#"{ "id": "external", "classes": { "building": { "properties": { "height": { "type": "SCALAR", "componentType": "FLOAT32" } } } } }"#,
    )
    .unwrap();

    let (mut target, _, t_schema) = with_schema("a");
    example_class(&mut target, t_schema, "exampleClass", "UINT8");
    let mut source = Document::new();
    let md = ensure_structural_metadata(&mut source).unwrap();
    source.as_structural_metadata_mut(md).unwrap().schema_uri = Some("schema.json".to_string());

    let resolver = DirectorySchemaResolver::new(dir.path());
    let mut ids = SequentialIds::new();
    block_on(merge_documents_with_metadata(&mut target, &mut source, &resolver, &mut ids)).unwrap();
    assert_eq!(class_keys(&target), vec!["building", "exampleClass"]);
}

#[test]
fn missing_external_schema_fails() {
    let dir = tempfile::tempdir().unwrap();
    let (mut target, _, _) = with_schema("a");
    let mut source = Document::new();
    let md = ensure_structural_metadata(&mut source).unwrap();
    source.as_structural_metadata_mut(md).unwrap().schema_uri = Some("absent.json".to_string());

    let resolver = DirectorySchemaResolver::new(dir.path());
    let mut ids = SequentialIds::new();
    let err = block_on(merge_documents_with_metadata(&mut target, &mut source, &resolver, &mut ids))
        .unwrap_err();
    assert!(matches!(err, Error::SchemaResolution { .. }));
}

#[test]
fn copied_references_point_into_target() {
    let mut target = Document::new();
    let existing = target.create_material("existing", Default::default());
    let before = target.len();

    let mut source = Document::new();
    let tex = source.create_texture("albedo", "image/png", vec![1, 2, 3]);
    let mat = source.create_material("mat", Default::default());
    source.set_base_color_texture(mat, tex, TextureInfoDef::default()).unwrap();
    let prim = source.create_primitive();
    source.as_primitive_mut(prim).unwrap().material = Some(mat);
    let mesh = source.create_mesh("mesh", vec![prim]);
    let node = source.create_node("node", Some(mesh));
    source.create_scene("scene", vec![node]).unwrap();

    let map = merge_documents(&mut target, &source).unwrap();
    let copied: HashSet<PropertyId> = map.values().copied().collect();
    for (&from, &to) in &map {
        assert_eq!(source.kind(from).unwrap(), target.kind(to).unwrap());
        for child in target.children(to).unwrap() {
            assert!(target.get(child).is_ok());
            let is_new = child.index() >= before;
            assert!(!is_new || copied.contains(&child) || target.kind(child).unwrap() == PropertyKind::TextureInfo);
        }
    }
    assert_eq!(target.list(PropertyKind::Material).count(), 2);
    assert_eq!(target.as_material(existing).unwrap().base_color_texture, None);
}

#[test]
fn cyclic_node_graph_terminates() {
    let mut source = Document::new();
    let a = source.create_node("a", None);
    let b = source.create_node("b", None);
    source.as_node_mut(a).unwrap().children.push(b);
    source.as_node_mut(b).unwrap().children.push(a);

    let mut target = Document::new();
    let map = copy_to_document(&mut target, &source, &[a]).unwrap();
    let (ta, tb) = (map[&a], map[&b]);
    assert_eq!(target.as_node(ta).unwrap().children, vec![tb]);
    assert_eq!(target.as_node(tb).unwrap().children, vec![ta]);
}

#[test]
fn texture_info_cannot_be_transferred_directly() {
    let mut source = Document::new();
    let info = source.create_texture_info(TextureInfoDef::default());
    let mut target = Document::new();
    let before = target.len();
    let err = copy_to_document(&mut target, &source, &[info]).unwrap_err();
    assert!(matches!(err, Error::NotTransferable(PropertyKind::TextureInfo)));
    assert_eq!(target.len(), before);
}

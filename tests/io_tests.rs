//! Document export and import with structural metadata.

use futures::executor::block_on;
use tilekit::graph::{AccessorDef, Document, PropertyId, PropertyKind, TextureInfoDef};
use tilekit::io::{read_document, read_document_file, write_document, write_document_file};
use tilekit::merge::merge_documents_with_metadata;
use tilekit::metadata::*;
use tilekit::util::{gzip, SequentialIds};

/// A mesh with one primitive carrying a property texture and attribute,
/// plus a property table against a class with an enum property.
fn annotated_document() -> (Document, PropertyId) {
    let mut doc = Document::new();
    let md = ensure_structural_metadata(&mut doc).unwrap();
    let schema = create_schema(&mut doc, md, "landuse").unwrap();
    add_enum(&mut doc, schema, "zone", "UINT8", &[("RESIDENTIAL", 0), ("COMMERCIAL", 1)]).unwrap();
    let class = add_class(&mut doc, schema, "parcel", "Parcel").unwrap();
    add_class_property(&mut doc, class, "zone", ClassPropertyDef::enumeration("zone")).unwrap();
    add_class_property(&mut doc, class, "label", ClassPropertyDef {
        property_type: "STRING".to_string(),
        ..ClassPropertyDef::default()
    })
    .unwrap();

    let table = add_property_table(&mut doc, md, "parcels", "parcel", 2).unwrap();
    add_property_table_property(&mut doc, table, "zone", PropertyTablePropertyDef {
        values: vec![0, 1],
        ..Default::default()
    })
    .unwrap();
    add_property_table_property(&mut doc, table, "label", PropertyTablePropertyDef {
        values: b"northsouth".to_vec(),
        string_offsets: Some([0u32, 5, 10].iter().flat_map(|o| o.to_le_bytes()).collect()),
        string_offset_type: Some("UINT32".to_string()),
        ..Default::default()
    })
    .unwrap();

    let image = doc.create_texture("zones", "image/png", vec![0x89, b'P', b'N', b'G', 0, 1]);
    let pt = add_property_texture(&mut doc, md, "zoneTexture", "parcel").unwrap();
    add_property_texture_property(
        &mut doc,
        pt,
        "zone",
        image,
        TextureInfoDef { tex_coord: 1, ..Default::default() },
        vec![0],
    )
    .unwrap();
    let pa = add_property_attribute(&mut doc, md, "zoneAttribute", "parcel", &[("zone", "_ZONE")])
        .unwrap();

    let zone = doc.create_accessor(
        "zone",
        AccessorDef {
            element_type: "SCALAR".to_string(),
            component_type: 5121,
            count: 4,
            data: vec![0, 1, 1, 0],
            ..AccessorDef::default()
        },
    );
    let prim = doc.create_primitive();
    doc.as_primitive_mut(prim).unwrap().attributes.insert("_ZONE".to_string(), zone);
    bind_property_texture(&mut doc, prim, pt).unwrap();
    bind_property_attribute(&mut doc, prim, pa).unwrap();
    let mesh = doc.create_mesh("parcels", vec![prim]);
    let node = doc.create_node("parcels", Some(mesh));
    doc.create_scene("scene", vec![node]).unwrap();
    (doc, md)
}

fn only(doc: &Document, kind: PropertyKind) -> PropertyId {
    let ids: Vec<_> = doc.list(kind).collect();
    assert_eq!(ids.len(), 1, "expected one {kind:?}");
    ids[0]
}

#[test]
fn metadata_survives_write_and_read() {
    let (doc, _) = annotated_document();
    let back = read_document(&write_document(&doc).unwrap()).unwrap();

    assert!(back.extensions_used().contains(EXTENSION_NAME));
    let md = back.structural_metadata().unwrap();
    let def = back.as_structural_metadata(md).unwrap();
    assert!(def.schema_uri.is_none());

    let schema = back.as_schema(def.schema.unwrap()).unwrap();
    assert_eq!(schema.id, "landuse");
    assert_eq!(schema.classes.keys().collect::<Vec<_>>(), vec!["parcel"]);
    let values = &back.as_enum(schema.enums["zone"]).unwrap().values;
    assert_eq!(values.len(), 2);
    assert_eq!(back.name(values[1]).unwrap(), "COMMERCIAL");
    assert_eq!(back.as_enum_value(values[1]).unwrap().value, 1);

    let class = back.as_class(schema.classes["parcel"]).unwrap();
    let zone = back.as_class_property(class.properties["zone"]).unwrap();
    assert_eq!(zone.enum_type.as_deref(), Some("zone"));

    assert_eq!(def.property_tables.len(), 1);
    let table = back.as_property_table(def.property_tables[0]).unwrap();
    assert_eq!((table.class.as_str(), table.count), ("parcel", 2));
    let label = back.as_property_table_property(table.properties["label"]).unwrap();
    assert_eq!(label.values, b"northsouth");
    assert_eq!(label.string_offsets.as_ref().unwrap().len(), 12);

    assert_eq!(def.property_textures.len(), 1);
    assert_eq!(def.property_attributes.len(), 1);
    let prim = only(&back, PropertyKind::Primitive);
    let binding = back.as_primitive(prim).unwrap().metadata.unwrap();
    let binding = back.as_primitive_metadata(binding).unwrap();
    assert_eq!(binding.property_textures, def.property_textures);
    assert_eq!(binding.property_attributes, def.property_attributes);

    let pt = back.as_property_texture(def.property_textures[0]).unwrap();
    let prop = back.as_property_texture_property(pt.properties["zone"]).unwrap();
    let info = back.as_texture_info(prop.texture_info.unwrap()).unwrap();
    assert_eq!(info.tex_coord, 1);
    assert_eq!(back.as_texture(prop.texture.unwrap()).unwrap().image, vec![0x89, b'P', b'N', b'G', 0, 1]);
}

#[test]
fn primitive_binding_survives_as_equal_property() {
    let (doc, _) = annotated_document();
    let back = read_document(&write_document(&doc).unwrap()).unwrap();
    let original = only(&doc, PropertyKind::PropertyAttribute);
    let read = only(&back, PropertyKind::PropertyAttribute);
    assert!(back.equals(read, &doc, original).unwrap());
}

#[test]
fn files_merge_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let a = dir.path().join("a.glb");
    let b = dir.path().join("b.glb.gz");
    let out = dir.path().join("merged.glb");

    let (doc, _) = annotated_document();
    write_document_file(&a, &doc).unwrap();
    // Gzipped inputs read transparently
    std::fs::write(&b, gzip(&write_document(&doc).unwrap(), 6).unwrap()).unwrap();

    let mut target = read_document_file(&a).unwrap();
    let mut source = read_document_file(&b).unwrap();
    let mut ids = SequentialIds::new();
    block_on(merge_documents_with_metadata(&mut target, &mut source, &NoSchemaResolver, &mut ids))
        .unwrap();
    write_document_file(&out, &target).unwrap();

    let merged = read_document_file(&out).unwrap();
    let md = merged.structural_metadata().unwrap();
    let def = merged.as_structural_metadata(md).unwrap();
    let schema = merged.as_schema(def.schema.unwrap()).unwrap();
    assert_eq!(schema.classes.len(), 1);
    assert_eq!(schema.enums.len(), 1);
    assert_eq!(def.property_tables.len(), 2);
    assert_eq!(def.property_textures.len(), 1);
    assert_eq!(def.property_attributes.len(), 1);
    assert_eq!(merged.list(PropertyKind::Mesh).count(), 2);

    for prim in merged.list(PropertyKind::Primitive) {
        let binding = merged.as_primitive(prim).unwrap().metadata.unwrap();
        let binding = merged.as_primitive_metadata(binding).unwrap();
        assert_eq!(binding.property_textures, def.property_textures);
        assert_eq!(binding.property_attributes, def.property_attributes);
    }
}

#[test]
fn missing_file_reported() {
    let dir = tempfile::tempdir().unwrap();
    let err = read_document_file(dir.path().join("nope.glb")).unwrap_err();
    assert!(matches!(err, tilekit::Error::FileNotFound(_)));
}

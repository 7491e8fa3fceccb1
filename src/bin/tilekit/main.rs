//! tilekit CLI - Tool for inspecting and merging glTF and legacy tile files.

use std::collections::BTreeMap;
use std::env;
use std::path::Path;

use rayon::prelude::*;
use tilekit::glb;
use tilekit::graph::{Document, PropertyKind};
use tilekit::io::{read_document, read_document_file, write_document_file};
use tilekit::merge::merge_documents_with_metadata;
use tilekit::metadata::{DirectorySchemaResolver, NoSchemaResolver};
use tilekit::tile::{parse_tile, read_tile_file, split_composite, tile_to_document, TileFormat};
use tilekit::util::{decompress_if_gzipped, RandomIds};
use tilekit::Result;
use tracing_subscriber::{fmt, EnvFilter};

/// Environment variable overriding the log filter.
const LOG_ENV: &str = "TILEKIT_LOG";

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(level));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).with_target(false).init();
}

fn main() {
    let args: Vec<String> = env::args().collect();

    // Parse global flags
    let mut level = "info";
    let mut filtered_args: Vec<&str> = Vec::new();
    for arg in &args[1..] {
        match arg.as_str() {
            "-v" | "--verbose" => level = "debug",
            "-vv" | "--trace" => level = "trace",
            "-q" | "--quiet" => level = "warn",
            _ => filtered_args.push(arg),
        }
    }
    init_logging(level);

    if filtered_args.is_empty() {
        print_help();
        return;
    }

    let result = match filtered_args[0] {
        // Info command - show container facts and metadata summary
        "info" | "i" => {
            if filtered_args.len() < 2 {
                usage_error("missing file argument", "tilekit info <file>");
            }
            cmd_info(filtered_args[1])
        }

        // Merge command - fold every input into the first
        "merge" | "m" => {
            let opts = parse_options(&filtered_args[1..]);
            let Some(output) = opts.output else {
                usage_error("missing -o <output>", MERGE_USAGE);
            };
            if opts.inputs.len() < 2 {
                usage_error("merge needs at least two inputs", MERGE_USAGE);
            }
            cmd_merge(&opts.inputs, output, opts.schema_dir)
        }

        // b3dm command - unwrap a b3dm or i3dm tile into GLB
        "b3dm" | "b" => {
            let opts = parse_options(&filtered_args[1..]);
            let (Some(output), [input]) = (opts.output, opts.inputs.as_slice()) else {
                usage_error("expected one input and -o <output>", "tilekit b3dm <in.b3dm> -o <out.glb>");
            };
            cmd_b3dm(input, output)
        }

        // Help
        "help" | "h" | "-h" | "--help" => {
            print_help();
            Ok(())
        }

        // Default: if file exists, show info; otherwise error
        _ => {
            if Path::new(filtered_args[0]).exists() {
                cmd_info(filtered_args[0])
            } else {
                eprintln!("Unknown command: {}", filtered_args[0]);
                eprintln!();
                print_help();
                std::process::exit(1);
            }
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

const MERGE_USAGE: &str = "tilekit merge <a.glb> <b.glb> [more...] -o <out.glb> [--schema-dir <dir>]";

fn usage_error(msg: &str, usage: &str) -> ! {
    eprintln!("Error: {}", msg);
    eprintln!("Usage: {}", usage);
    std::process::exit(1);
}

/// Positional inputs plus the per-command options.
#[derive(Default)]
struct Options<'a> {
    inputs: Vec<&'a str>,
    output: Option<&'a str>,
    schema_dir: Option<&'a str>,
}

fn parse_options<'a>(args: &[&'a str]) -> Options<'a> {
    let mut opts = Options::default();
    let mut iter = args.iter();
    while let Some(&arg) = iter.next() {
        match arg {
            "-o" | "--output" => match iter.next() {
                Some(&path) => opts.output = Some(path),
                None => usage_error("-o needs a path", "-o <path>"),
            },
            "--schema-dir" => match iter.next() {
                Some(&dir) => opts.schema_dir = Some(dir),
                None => usage_error("--schema-dir needs a directory", "--schema-dir <dir>"),
            },
            _ => opts.inputs.push(arg),
        }
    }
    opts
}

fn print_help() {
    println!("tilekit - glTF metadata and 3D Tiles toolkit");
    println!();
    println!("USAGE:");
    println!("    tilekit [OPTIONS] <COMMAND> [ARGS]");
    println!();
    println!("COMMANDS:");
    println!("    i, info  <file>                         Show container and metadata summary");
    println!("    m, merge <a> <b> [more] -o <out>        Merge inputs into one GLB");
    println!("             [--schema-dir <dir>]         Resolve external schemas from <dir>");
    println!("    b, b3dm  <in> -o <out>                  Unwrap b3dm/i3dm into GLB with metadata");
    println!("    h, help                                 Show this help");
    println!();
    println!("OPTIONS:");
    println!("    -v, --verbose    Show debug output");
    println!("    -vv, --trace     Show trace output (very verbose)");
    println!("    -q, --quiet      Only show warnings and errors");
    println!();
    println!("ENVIRONMENT:");
    println!("    {}       Log filter (overrides -v/-vv/-q), e.g. tilekit=debug", LOG_ENV);
    println!();
    println!("EXAMPLES:");
    println!("    tilekit info tile.b3dm");
    println!("    tilekit merge a.glb b.glb c.glb -o merged.glb");
    println!("    tilekit merge a.glb b.glb -o out.glb --schema-dir schemas/");
    println!("    tilekit b3dm building.b3dm -o building.glb");
    println!();
    println!("NOTES:");
    println!("    - Passing a file directly is equivalent to 'info'");
    println!("    - Gzip-compressed inputs are inflated transparently");
}

fn cmd_info(path: &str) -> Result<()> {
    tracing::info!("Opening {}", path);
    let raw = std::fs::read(path)?;
    let data = decompress_if_gzipped(&raw)?;
    if data.len() != raw.len() {
        tracing::debug!("inflated {} -> {} bytes", raw.len(), data.len());
    }

    println!("File: {}", path);
    if glb::is_glb(&data) {
        let parts = glb::decode(&data)?;
        println!("Container: GLB {}", parts.version);
        println!("  JSON: {} bytes", parts.json.len());
        println!("  BIN:  {} bytes", parts.bin.len());
        println!();
        print_document(&read_document(&data)?)?;
        return Ok(());
    }

    match TileFormat::detect(&data) {
        Some(TileFormat::Cmpt) => {
            let tiles = split_composite(&data)?;
            println!("Container: cmpt ({} inner tiles)", tiles.len());
            for (i, inner) in tiles.iter().enumerate() {
                let kind = TileFormat::detect(inner).map_or("?".to_string(), |f| f.to_string());
                println!("  [{}] {} ({} bytes)", i, kind, inner.len());
            }
        }
        Some(_) => {
            let tile = parse_tile(&data)?;
            let header = &tile.header;
            println!("Container: {} v{}", header.format, header.version);
            println!("  Byte length:          {}", header.byte_length);
            println!("  Feature table JSON:   {} bytes", header.feature_table_json_length);
            println!("  Feature table binary: {} bytes", header.feature_table_binary_length);
            println!("  Batch table JSON:     {} bytes", header.batch_table_json_length);
            println!("  Batch table binary:   {} bytes", header.batch_table_binary_length);
            if let Some(count) = tile.feature_count() {
                println!("  Features:             {}", count);
            }
            println!("  Batch length:         {}", tile.batch_length());
            println!("  Payload:              {} bytes", tile.payload.len());
            if tile.has_embedded_gltf() {
                println!();
                print_document(&tile_to_document(&tile)?)?;
            }
        }
        // Plain glTF JSON
        None => print_document(&read_document(&data)?)?,
    }
    Ok(())
}

fn print_document(doc: &Document) -> Result<()> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for id in doc.ids() {
        *counts.entry(format!("{:?}", doc.kind(id)?)).or_default() += 1;
    }
    println!("Properties: {}", doc.len());
    for kind in [
        PropertyKind::Scene,
        PropertyKind::Node,
        PropertyKind::Mesh,
        PropertyKind::Primitive,
        PropertyKind::Accessor,
        PropertyKind::Material,
        PropertyKind::Texture,
    ] {
        let name = format!("{:?}", kind);
        println!("  {:<10} {}", format!("{}s:", name), counts.get(&name).copied().unwrap_or(0));
    }
    println!();

    let Some(md) = doc.structural_metadata() else {
        println!("Structural metadata: none");
        return Ok(());
    };
    let def = doc.as_structural_metadata(md)?;
    println!("Structural metadata:");
    match (def.schema, &def.schema_uri) {
        (Some(schema), _) => {
            let schema = doc.as_schema(schema)?;
            println!("  Schema: {}", schema.id);
            for (key, &class) in &schema.classes {
                println!("    class {} ({} properties)", key, doc.as_class(class)?.properties.len());
            }
            for (key, &en) in &schema.enums {
                println!("    enum {} ({} values)", key, doc.as_enum(en)?.values.len());
            }
        }
        (None, Some(uri)) => println!("  Schema URI: {}", uri),
        (None, None) => println!("  Schema: missing"),
    }
    for &table in &def.property_tables {
        let t = doc.as_property_table(table)?;
        println!("  Property table: class {} ({} rows, {} columns)", t.class, t.count, t.properties.len());
    }
    println!("  Property textures:   {}", def.property_textures.len());
    println!("  Property attributes: {}", def.property_attributes.len());
    Ok(())
}

fn cmd_merge(inputs: &[&str], output: &str, schema_dir: Option<&str>) -> Result<()> {
    tracing::info!("Reading {} inputs", inputs.len());
    let mut docs = inputs
        .par_iter()
        .map(|path| read_document_file(path))
        .collect::<Result<Vec<_>>>()?
        .into_iter();
    let Some(mut target) = docs.next() else {
        return Ok(());
    };

    let mut ids = RandomIds;
    for (mut source, path) in docs.zip(&inputs[1..]) {
        tracing::debug!("merging {}", path);
        let merged = match schema_dir {
            Some(dir) => {
                let resolver = DirectorySchemaResolver::new(dir);
                futures::executor::block_on(merge_documents_with_metadata(
                    &mut target,
                    &mut source,
                    &resolver,
                    &mut ids,
                ))
            }
            None => futures::executor::block_on(merge_documents_with_metadata(
                &mut target,
                &mut source,
                &NoSchemaResolver,
                &mut ids,
            )),
        };
        merged?;
    }

    write_document_file(output, &target)?;
    tracing::info!("Wrote {} ({} properties)", output, target.len());
    Ok(())
}

fn cmd_b3dm(input: &str, output: &str) -> Result<()> {
    tracing::info!("Converting {}", input);
    let tile = read_tile_file(input)?;
    let doc = tile_to_document(&tile)?;
    write_document_file(output, &doc)?;
    tracing::info!("Wrote {}", output);
    Ok(())
}

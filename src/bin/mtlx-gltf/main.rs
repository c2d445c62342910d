//! mtlx-gltf CLI - Translate materials between glTF and MaterialX.

use std::env;
use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use mtlx_gltf::convert::{
    convert_gltf, load_options, mtlx_to_gltf, GltfToMtlxOptions, MtlxToGltfOptions,
};
use mtlx_gltf::gltf::{Gltf, ScenePaths};
use mtlx_gltf::mtlx::{json, Document, Library};
use mtlx_gltf::util::ConversionLog;

/// Remaining command line words with flag extraction helpers.
struct Args<'a> {
    items: Vec<&'a str>,
}

impl<'a> Args<'a> {
    /// Remove a boolean flag, reporting whether it was present.
    fn flag(&mut self, names: &[&str]) -> bool {
        let before = self.items.len();
        self.items.retain(|item| !names.contains(item));
        self.items.len() != before
    }

    /// Remove every `name value` pair, returning the values in order.
    fn values(&mut self, names: &[&str]) -> Result<Vec<&'a str>> {
        let mut values = Vec::new();
        while let Some(pos) = self.items.iter().position(|item| names.contains(item)) {
            if pos + 1 >= self.items.len() {
                bail!("missing value for {}", self.items[pos]);
            }
            values.push(self.items.remove(pos + 1));
            self.items.remove(pos);
        }
        Ok(values)
    }

    fn value(&mut self, names: &[&str]) -> Result<Option<&'a str>> {
        Ok(self.values(names)?.pop())
    }

    /// The single remaining positional argument; unknown flags are errors.
    fn input(&self, usage: &str) -> Result<&'a str> {
        if let Some(flag) = self.items.iter().find(|item| item.starts_with('-')) {
            bail!("unknown option: {flag}\nUsage: mtlx-gltf {usage}");
        }
        match self.items.as_slice() {
            [input] => Ok(*input),
            [] => bail!("missing file argument\nUsage: mtlx-gltf {usage}"),
            _ => bail!("too many arguments\nUsage: mtlx-gltf {usage}"),
        }
    }
}

fn main() {
    let args: Vec<String> = env::args().collect();

    // Parse global flags
    let mut level = "info";
    let mut verbose = false;
    let mut filtered_args: Vec<&str> = Vec::new();
    for arg in &args[1..] {
        match arg.as_str() {
            "-v" | "--verbose" => {
                level = "debug";
                verbose = true;
            }
            "-vv" | "--trace" => {
                level = "trace";
                verbose = true;
            }
            "-q" | "--quiet" => level = "warn",
            _ => filtered_args.push(arg),
        }
    }
    init_tracing(level);

    if filtered_args.is_empty() {
        print_help();
        return;
    }

    let command = filtered_args[0];
    let mut rest = Args { items: filtered_args[1..].to_vec() };
    let result = match command {
        "gltf2mtlx" | "g2m" => cmd_gltf2mtlx(&mut rest, verbose),
        "mtlx2gltf" | "m2g" => cmd_mtlx2gltf(&mut rest, verbose),
        "paths" | "p" => cmd_paths(&mut rest),
        "validate" => cmd_validate(&mut rest),
        "info" | "i" => cmd_info(&mut rest),
        "version" | "-V" | "--version" => {
            cmd_version();
            Ok(())
        }
        "help" | "h" | "-h" | "--help" => {
            print_help();
            Ok(())
        }
        _ => {
            eprintln!("Unknown command: {command}");
            eprintln!();
            print_help();
            std::process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init();
}

fn print_help() {
    println!("mtlx-gltf - glTF / MaterialX material translator");
    println!();
    println!("USAGE:");
    println!("    mtlx-gltf [OPTIONS] <COMMAND> [ARGS]");
    println!();
    println!("COMMANDS:");
    println!("    g2m, gltf2mtlx <in.gltf>      Translate glTF materials to MaterialX JSON");
    println!("    m2g, mtlx2gltf <in.json>      Translate a MaterialX JSON document to glTF");
    println!("    p, paths       <in.gltf>      List geometry paths used for material assignment");
    println!("    validate       <doc.json>     Check a MaterialX JSON document");
    println!("    i, info        <doc.json>     Summarize a MaterialX JSON document");
    println!("    version                       Show version and build date");
    println!("    h, help                       Show this help");
    println!();
    println!("OPTIONS:");
    println!("    -v, --verbose    Show debug output");
    println!("    -vv, --trace     Show trace output (very verbose)");
    println!("    -q, --quiet      Only show warnings and errors");
    println!();
    println!("TRANSLATION OPTIONS:");
    println!("    -o, --output <file>         Output file (stdout when omitted)");
    println!("    --options <file.json>       Load options; flags override it");
    println!("    --library <defs.json>       Merge extra node definitions (repeatable)");
    println!("    gltf2mtlx:");
    println!("      --all-inputs              Write every definition input on shaders");
    println!("      --no-assign               Do not create a look");
    println!("    mtlx2gltf:");
    println!("      --geometry <file.gltf>    Base geometry to bind materials to");
    println!("      --search-path <dir>       Image search directory (repeatable)");
    println!("      --write-defaults          Emit values equal to definition defaults");
    println!("      --prims-per-material      One copy of the geometry per material");
    println!("      --rows <n>                Grid rows for --prims-per-material");
    println!("      --procedurals             Serialize unmapped node graphs to KHR_procedurals");
    println!("      --keep-materials          Keep materials already in the geometry");
    println!("      --image-dir <dir>         Directory for packed images");
    println!();
    println!("EXAMPLES:");
    println!("    mtlx-gltf gltf2mtlx model.gltf -o materials.json");
    println!("    mtlx-gltf mtlx2gltf materials.json --geometry model.gltf -o out.gltf");
    println!("    mtlx-gltf paths model.gltf");
    println!("    RUST_LOG=mtlx_gltf=trace mtlx-gltf m2g materials.json");
    println!();
    println!("NOTES:");
    println!("    - RUST_LOG overrides -v / -vv / -q");
    println!("    - Relative image paths also resolve against the input document's directory");
}

fn load_library(paths: &[&str]) -> Result<Library> {
    let mut library = Library::standard();
    for path in paths {
        library
            .load_json(path)
            .with_context(|| format!("loading node definitions from {path}"))?;
        tracing::debug!(path, definitions = library.len(), "merged node definitions");
    }
    Ok(library)
}

fn write_output(output: Option<&str>, text: &str) -> Result<()> {
    match output {
        Some(path) => {
            fs::write(path, text).with_context(|| format!("writing {path}"))?;
            tracing::info!("Wrote {path}");
        }
        None => println!("{text}"),
    }
    Ok(())
}

fn report(log: &ConversionLog) {
    let warnings = log.warnings().count();
    if warnings > 0 {
        tracing::info!("Finished with {warnings} warnings");
    }
}

fn cmd_gltf2mtlx(args: &mut Args<'_>, verbose: bool) -> Result<()> {
    let mut options: GltfToMtlxOptions = match args.value(&["--options"])? {
        Some(path) => load_options(path)?,
        None => GltfToMtlxOptions::default(),
    };
    if args.flag(&["--all-inputs"]) {
        options.add_all_inputs = true;
    }
    if args.flag(&["--no-assign"]) {
        options.create_assignments = false;
    }
    options.verbose |= verbose;
    let library = load_library(&args.values(&["--library"])?)?;
    let output = args.value(&["-o", "--output"])?;
    let input = args.input("gltf2mtlx <in.gltf> [-o out.json]")?;

    tracing::info!("Reading {input}");
    let gltf = Gltf::from_file(input)?;
    let conversion = convert_gltf(&gltf, library, &options)?;
    write_output(output, &json::to_string(&conversion.output)?)?;
    report(&conversion.log);
    Ok(())
}

fn cmd_mtlx2gltf(args: &mut Args<'_>, verbose: bool) -> Result<()> {
    let mut options: MtlxToGltfOptions = match args.value(&["--options"])? {
        Some(path) => load_options(path)?,
        None => MtlxToGltfOptions::default(),
    };
    if args.flag(&["--write-defaults"]) {
        options.write_default_inputs = true;
    }
    if args.flag(&["--prims-per-material"]) {
        options.prims_per_material = true;
    }
    if args.flag(&["--procedurals"]) {
        options.create_procedural_textures = true;
    }
    if args.flag(&["--keep-materials"]) {
        options.reset_materials = false;
    }
    if let Some(rows) = args.value(&["--rows"])? {
        let rows = rows.parse().with_context(|| format!("invalid row count: {rows}"))?;
        options.row_count = Some(rows);
    }
    if let Some(dir) = args.value(&["--image-dir"])? {
        options.image_output_dir = Some(dir.into());
    }
    for dir in args.values(&["--search-path", "-s"])? {
        options.search_paths.append(dir);
    }
    options.verbose |= verbose;
    let library = load_library(&args.values(&["--library"])?)?;
    let geometry = args.value(&["--geometry", "-g"])?;
    let output = args.value(&["-o", "--output"])?;
    let input = args.input("mtlx2gltf <in.json> [-o out.gltf] [--geometry g.gltf]")?;

    tracing::info!("Reading {input}");
    let doc = json::read_file(input, library)?;
    if let Some(dir) = Path::new(input).parent().filter(|d| !d.as_os_str().is_empty()) {
        options.search_paths.append(dir);
    }
    let geometry = match geometry {
        Some(path) => {
            tracing::info!("Reading geometry {path}");
            Some(Gltf::from_file(path)?)
        }
        None => None,
    };

    let conversion = mtlx_to_gltf(&doc, geometry, &options)?;
    let bytes = conversion.output.to_vec_pretty()?;
    write_output(output, &String::from_utf8(bytes)?)?;
    report(&conversion.log);
    Ok(())
}

fn cmd_paths(args: &mut Args<'_>) -> Result<()> {
    let input = args.input("paths <in.gltf>")?;
    let gltf = Gltf::from_file(input)?;
    let paths = ScenePaths::build(&gltf);

    println!("File: {input}");
    println!("Primitives: {}", paths.len());
    println!();
    for path in paths.iter() {
        let material = match path.material {
            Some(m) => gltf
                .materials
                .get(m)
                .and_then(|mat| mat.name.clone())
                .unwrap_or_else(|| format!("#{m}")),
            None => "-".to_string(),
        };
        let color = if path.vertex_color { "  [vertex color]" } else { "" };
        println!("  {:<48} {material}{color}", path.path);
    }
    Ok(())
}

fn read_document(args: &mut Args<'_>, usage: &str) -> Result<(String, Document)> {
    let library = load_library(&args.values(&["--library"])?)?;
    let input = args.input(usage)?;
    let doc = json::read_file(input, library).with_context(|| format!("reading {input}"))?;
    Ok((input.to_string(), doc))
}

fn cmd_validate(args: &mut Args<'_>) -> Result<()> {
    let (input, doc) = read_document(args, "validate <doc.json>")?;
    let issues = doc.validate();
    if issues.is_empty() {
        println!("{input}: valid");
        return Ok(());
    }
    for issue in &issues {
        println!("  {issue}");
    }
    bail!("{input}: {} issues", issues.len())
}

fn cmd_info(args: &mut Args<'_>) -> Result<()> {
    let (input, doc) = read_document(args, "info <doc.json>")?;
    let materials = doc.material_nodes();

    println!("Document: {input}");
    println!("Version: {}", doc.version());
    println!();
    println!("Elements:");
    println!("  Nodes:      {}", doc.nodes().count());
    println!("  NodeGraphs: {}", doc.graphs().count());
    println!("  Looks:      {}", doc.looks().count());
    println!("  Materials:  {}", materials.len());
    println!();
    for material in materials {
        match doc.surface_shader(material) {
            Some(shader) => println!(
                "  {} -> {} ({})",
                doc.node(material).name,
                doc.node(shader).name,
                doc.node(shader).category
            ),
            None => println!("  {} -> (no shader)", doc.node(material).name),
        }
    }
    for look in doc.looks() {
        println!();
        println!("Look {}:", look.name);
        for assign in &look.assigns {
            println!("  {} -> {}", assign.material, assign.geom);
        }
    }
    Ok(())
}

fn cmd_version() {
    let date = option_env!("MTLX_GLTF_BUILD_DATE").unwrap_or("unknown");
    let time = option_env!("MTLX_GLTF_BUILD_TIME").unwrap_or("unknown");
    println!("mtlx-gltf {} (built {} {})", env!("CARGO_PKG_VERSION"), date, time);
}

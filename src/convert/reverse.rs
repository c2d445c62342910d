//! MaterialX to glTF.
//!
//! Shaders reached from `surfacematerial` nodes are flattened into glTF
//! materials, optionally on top of a base geometry document whose
//! primitives are then bound through the document's looks.

use std::collections::HashMap;
use std::path::Path;

use super::mapper::{FlatBuilder, Source};
use super::options::{Conversion, MtlxToGltfOptions};
use super::packer::{self, ChannelSource, PackPlan};
use crate::gltf::*;
use crate::mtlx::*;
use crate::util::{Error, Result};

/// glTF default for `iridescenceThicknessMaximum`, in nanometres.
const GLTF_THICKNESS_MAXIMUM: f32 = 400.0;

/// Generator string written into `asset`.
pub fn generator() -> String {
    format!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}

/// Translate a graph document into glTF JSON bytes.
pub fn mtlx_to_gltf_bytes(
    doc: &Document,
    geometry: Option<&[u8]>,
    options: &MtlxToGltfOptions,
) -> Result<Conversion<Vec<u8>>> {
    let geometry = geometry.map(Gltf::from_slice).transpose()?;
    let Conversion { output, log } = mtlx_to_gltf(doc, geometry, options)?;
    Ok(Conversion { output: output.to_vec_pretty()?, log })
}

fn is_translatable(doc: &Document, shader: NodeId) -> bool {
    matches!(doc.node(shader).category.as_str(), GLTF_PBR | SURFACE_UNLIT)
}

/// Translate a graph document, appending materials to `geometry` when given.
pub fn mtlx_to_gltf(
    doc: &Document,
    geometry: Option<Gltf>,
    options: &MtlxToGltfOptions,
) -> Result<Conversion<Gltf>> {
    let mut gltf = geometry.unwrap_or_default();
    gltf.asset.version = "2.0".to_string();
    gltf.asset.generator = Some(generator());
    if options.reset_materials {
        gltf.materials.clear();
        for primitive in gltf.meshes.iter_mut().flat_map(|m| m.primitives.iter_mut()) {
            primitive.material = None;
        }
    }

    let mut b = FlatBuilder::new(doc, options, gltf);

    let mut shaders = Vec::new();
    for material in doc.material_nodes() {
        match doc.surface_shader(material) {
            Some(shader) if is_translatable(doc, shader) => shaders.push((material, shader)),
            Some(shader) => b.log.warn(format!(
                "Shader '{}' of category '{}' has no glTF translation",
                doc.name_path(shader),
                doc.node(shader).category
            )),
            None => b.log.warn(format!(
                "Material '{}' has no surface shader",
                doc.name_path(material)
            )),
        }
    }
    if shaders.is_empty() {
        return Err(Error::NoMaterials);
    }

    let first_material = b.gltf.materials.len();
    let mut translated: HashMap<NodeId, usize> = HashMap::new();
    let mut material_index: HashMap<NodeId, usize> = HashMap::new();
    for (material, shader) in shaders {
        let index = match translated.get(&shader) {
            Some(&index) => index,
            None => {
                let flat = translate_shader(&mut b, shader);
                b.gltf.materials.push(flat);
                let index = b.gltf.materials.len() - 1;
                translated.insert(shader, index);
                index
            }
        };
        material_index.insert(material, index);
    }
    b.log.info(format!("Wrote {} glTF materials", translated.len()));

    bind_geometry(&mut b, first_material, &material_index);
    if options.prims_per_material {
        let added = create_prims_for_materials(&mut b.gltf, options.row_count);
        b.log.info(format!("Added {added} nodes for per-material geometry"));
    }

    let FlatBuilder { gltf, log, .. } = b;
    Ok(Conversion { output: gltf, log })
}

fn translate_shader(b: &mut FlatBuilder<'_>, shader: NodeId) -> Material {
    let doc = b.doc;
    b.current = doc.name_path(shader);
    let mut material = Material {
        name: Some(doc.node(shader).name.clone()),
        ..Default::default()
    };
    let mut ext = MaterialExtensions::default();
    let mut pbr = PbrMetallicRoughness::default();

    if doc.node(shader).category == SURFACE_UNLIT {
        ext.unlit = Some(Unlit {});
        let (texture, factor) =
            b.color_alpha_property(shader, "emission_color", "opacity", "baseColorTexture");
        pbr.base_color_texture = texture;
        pbr.base_color_factor = factor;
    } else {
        let (texture, factor) =
            b.color_alpha_property(shader, "base_color", "alpha", "baseColorTexture");
        pbr.base_color_texture = texture;
        pbr.base_color_factor = factor;
        write_orm(b, shader, &mut pbr, &mut material);
        material.normal_texture = b.normal_property(shader, "normal");
        let emissive = b.color_property(shader, "emissive", "emissiveTexture");
        // glTF's emissive factor defaults to black, so a texture needs an explicit one.
        material.emissive_factor = match (&emissive.texture, emissive.factor) {
            (Some(_), None) => Some([1.0; 3]),
            (_, factor) => factor,
        };
        material.emissive_texture = emissive.texture;
        write_alpha(b, shader, &mut material);
        write_extensions(b, shader, &mut ext);
    }

    ext.procedurals = b.take_procedural_slots();
    if !pbr.is_empty() {
        material.pbr_metallic_roughness = Some(pbr);
    }
    register_extensions(&mut b.gltf, &ext);
    if !ext.is_empty() {
        material.extensions = Some(ext);
    }
    material
}

fn write_alpha(b: &mut FlatBuilder<'_>, shader: NodeId, material: &mut Material) {
    let Some(code) = b.constant(shader, "alpha_mode").and_then(|v| v.as_integer()) else {
        return;
    };
    match AlphaMode::from_code(code) {
        Ok(mode) => {
            material.alpha_mode = Some(mode);
            if mode == AlphaMode::Mask {
                material.alpha_cutoff = float_constant(b, shader, "alpha_cutoff");
            }
        }
        Err(e) => b.warn(e),
    }
}

/// Keep an extension object only when something was written into it.
fn non_empty<T: Default + PartialEq>(value: T) -> Option<T> {
    (value != T::default()).then_some(value)
}

fn float_constant(b: &FlatBuilder<'_>, node: NodeId, input: &str) -> Option<f32> {
    b.constant(node, input).and_then(|v| v.as_float())
}

fn write_extensions(b: &mut FlatBuilder<'_>, shader: NodeId, ext: &mut MaterialExtensions) {
    ext.ior = float_constant(b, shader, "ior").map(|ior| Ior { ior: Some(ior) });

    let specular = b.float_property(shader, "specular", "specularTexture");
    let specular_color = b.color_property(shader, "specular_color", "specularColorTexture");
    ext.specular = non_empty(Specular {
        specular_factor: specular.factor,
        specular_texture: specular.texture,
        specular_color_factor: specular_color.factor,
        specular_color_texture: specular_color.texture,
    });

    let transmission = b.float_property(shader, "transmission", "transmissionTexture");
    ext.transmission = non_empty(Transmission {
        transmission_factor: transmission.factor,
        transmission_texture: transmission.texture,
    });

    let iridescence = b.float_property(shader, "iridescence", "iridescenceTexture");
    let mut iridescence = Iridescence {
        iridescence_factor: iridescence.factor,
        iridescence_texture: iridescence.texture,
        iridescence_ior: float_constant(b, shader, "iridescence_ior"),
        ..Default::default()
    };
    write_iridescence_thickness(b, shader, &mut iridescence);
    ext.iridescence = non_empty(iridescence);

    ext.emissive_strength = float_constant(b, shader, "emissive_strength")
        .map(|strength| EmissiveStrength { emissive_strength: Some(strength) });

    let thickness = b.float_property(shader, "thickness", "thicknessTexture");
    ext.volume = non_empty(Volume {
        thickness_factor: thickness.factor,
        thickness_texture: thickness.texture,
        attenuation_distance: float_constant(b, shader, "attenuation_distance"),
        attenuation_color: b
            .constant(shader, "attenuation_color")
            .and_then(|v| v.as_vec3())
            .map(|v| v.to_array()),
    });

    let clearcoat = b.float_property(shader, "clearcoat", "clearcoatTexture");
    let clearcoat_roughness =
        b.float_property(shader, "clearcoat_roughness", "clearcoatRoughnessTexture");
    ext.clearcoat = non_empty(Clearcoat {
        clearcoat_factor: clearcoat.factor,
        clearcoat_texture: clearcoat.texture,
        clearcoat_roughness_factor: clearcoat_roughness.factor,
        clearcoat_roughness_texture: clearcoat_roughness.texture,
        clearcoat_normal_texture: b.normal_property(shader, "clearcoat_normal"),
    });

    let sheen_color = b.color_property(shader, "sheen_color", "sheenColorTexture");
    let sheen_roughness = b.float_property(shader, "sheen_roughness", "sheenRoughnessTexture");
    ext.sheen = non_empty(Sheen {
        sheen_color_factor: sheen_color.factor,
        sheen_color_texture: sheen_color.texture,
        sheen_roughness_factor: sheen_roughness.factor,
        sheen_roughness_texture: sheen_roughness.texture,
    });
}

fn write_iridescence_thickness(
    b: &mut FlatBuilder<'_>,
    shader: NodeId,
    iridescence: &mut Iridescence,
) {
    match b.source(shader, "iridescence_thickness") {
        Source::Image { node, file, .. } => {
            iridescence.iridescence_thickness_texture = b.image_texture(node, &file);
            iridescence.iridescence_thickness_minimum = float_constant(b, node, "thicknessMin");
            iridescence.iridescence_thickness_maximum = float_constant(b, node, "thicknessMax");
        }
        Source::Procedural { graph, output } => {
            b.add_procedural("iridescenceThicknessTexture", graph, &output);
        }
        Source::Unmapped(reason) => b.warn(reason),
        Source::Constant(_) | Source::None | Source::Tint { .. } => {
            iridescence.iridescence_thickness_maximum = thickness_maximum(b, shader);
        }
    }
}

/// The shader thickness becomes `iridescenceThicknessMaximum`, which has its
/// own glTF default that differs from the shader input default.
fn thickness_maximum(b: &FlatBuilder<'_>, shader: NodeId) -> Option<f32> {
    if b.options.write_default_inputs {
        return float_constant(b, shader, "iridescence_thickness");
    }
    b.doc
        .input_value(shader, "iridescence_thickness")
        .and_then(|v| v.as_float())
        .filter(|v| (v - GLTF_THICKNESS_MAXIMUM).abs() > 1e-6)
}

/// Add every extension name present on a material to `extensionsUsed`.
fn register_extensions(gltf: &mut Gltf, ext: &MaterialExtensions) {
    let used = [
        (ext.unlit.is_some(), KHR_MATERIALS_UNLIT),
        (ext.ior.is_some(), KHR_MATERIALS_IOR),
        (ext.specular.is_some(), KHR_MATERIALS_SPECULAR),
        (ext.transmission.is_some(), KHR_MATERIALS_TRANSMISSION),
        (ext.iridescence.is_some(), KHR_MATERIALS_IRIDESCENCE),
        (ext.emissive_strength.is_some(), KHR_MATERIALS_EMISSIVE_STRENGTH),
        (ext.volume.is_some(), KHR_MATERIALS_VOLUME),
        (ext.clearcoat.is_some(), KHR_MATERIALS_CLEARCOAT),
        (ext.sheen.is_some(), KHR_MATERIALS_SHEEN),
        (ext.procedurals.is_some(), KHR_PROCEDURALS),
    ];
    for (present, name) in used {
        if present {
            gltf.use_extension(name);
        }
    }
}

// ============================================================================
// Metallic / roughness / occlusion
// ============================================================================

fn channel_source(b: &mut FlatBuilder<'_>, shader: NodeId, input: &str) -> ChannelSource {
    match b.source(shader, input) {
        Source::Image { node, file, channel } => {
            let factor = match b.doc.input_value(node, "factor") {
                Some(Value::Vector3(v)) => v[channel.min(2)],
                Some(Value::Float(f)) => *f,
                _ => 1.0,
            };
            let path = b.options.search_paths.find(&file);
            if path.is_none() {
                b.log.info(format!("{}: image '{file}' not found on the search path", b.current));
            }
            ChannelSource::image(node, &file, path, channel, factor)
        }
        source => {
            match source {
                Source::Procedural { .. } => {
                    b.warn(format_args!("procedural '{input}' cannot be packed"))
                }
                Source::Unmapped(reason) => b.warn(reason),
                _ => {}
            }
            let value = b
                .doc
                .effective_value(shader, input)
                .and_then(|v| v.as_float())
                .unwrap_or(1.0);
            ChannelSource::constant(value)
        }
    }
}

fn write_orm(
    b: &mut FlatBuilder<'_>,
    shader: NodeId,
    pbr: &mut PbrMetallicRoughness,
    material: &mut Material,
) {
    let metallic = channel_source(b, shader, "metallic");
    let roughness = channel_source(b, shader, "roughness");
    let occlusion = channel_source(b, shader, "occlusion");
    let write_defaults = b.options.write_default_inputs;
    let image_factor = |source: &ChannelSource| {
        Some(source.factor).filter(|f| write_defaults || (f - 1.0).abs() > 1e-6)
    };

    match packer::plan(&metallic, &roughness, &occlusion) {
        PackPlan::Constants => write_orm_constants(b, shader, pbr),
        PackPlan::OcclusionOnly => {
            write_orm_constants(b, shader, pbr);
            material.occlusion_texture = separate_occlusion(b, &occlusion);
        }
        plan @ (PackPlan::SharedAll | PackPlan::SharedMetalRough) => {
            if !packer::standard_layout(&metallic, &roughness, &occlusion) {
                b.warn("shared metallic/roughness image does not use glTF channel order");
            }
            let texture = match (metallic.node, metallic.uri.as_deref()) {
                (Some(node), Some(uri)) => b.image_texture(node, uri),
                _ => None,
            };
            pbr.metallic_factor = image_factor(&metallic);
            pbr.roughness_factor = image_factor(&roughness);
            material.occlusion_texture = if plan == PackPlan::SharedAll {
                texture.clone()
            } else {
                separate_occlusion(b, &occlusion)
            };
            pbr.metallic_roughness_texture = texture;
        }
        PackPlan::Synthesize => {
            let options = b.options;
            let dir = options.image_output_dir.as_deref();
            let output = packer::combined_path(&[&metallic, &roughness, &occlusion], dir);
            let written = match &output {
                Some(output) => packer::synthesize(&occlusion, &roughness, &metallic, output),
                None => Ok(None),
            };
            match (output, written) {
                (Some(output), Ok(Some((width, height)))) => {
                    b.log.info(format!(
                        "{}: packed metallic, roughness and occlusion into {} ({width}x{height})",
                        b.current,
                        output.display()
                    ));
                    let sources = [&metallic, &roughness, &occlusion];
                    let uri = combined_uri(&sources, &output, dir.is_some());
                    let name = format!("{}_orm", b.current);
                    let image = metallic.node.or(roughness.node);
                    let texture = match b.add_texture(&name, &uri, image) {
                        Ok(texture) => Some(texture),
                        Err(e) => {
                            b.warn(format_args!("packed texture skipped: {e}"));
                            None
                        }
                    };
                    if occlusion.has_image() {
                        material.occlusion_texture = texture.clone();
                    }
                    pbr.metallic_roughness_texture = texture;
                    if write_defaults {
                        pbr.metallic_factor = Some(1.0);
                        pbr.roughness_factor = Some(1.0);
                    }
                }
                (_, Ok(_)) => {
                    b.warn("no packed channel image could be read, writing factors only");
                    write_orm_constants(b, shader, pbr);
                    material.occlusion_texture = separate_occlusion(b, &occlusion);
                }
                (_, Err(e)) => {
                    b.warn(format_args!("channel packing failed, writing factors only: {e}"));
                    write_orm_constants(b, shader, pbr);
                    material.occlusion_texture = separate_occlusion(b, &occlusion);
                }
            }
        }
    }
}

fn write_orm_constants(b: &FlatBuilder<'_>, shader: NodeId, pbr: &mut PbrMetallicRoughness) {
    pbr.metallic_factor = float_constant(b, shader, "metallic");
    pbr.roughness_factor = float_constant(b, shader, "roughness");
}

fn separate_occlusion(b: &mut FlatBuilder<'_>, occlusion: &ChannelSource) -> Option<TextureInfo> {
    match (occlusion.node, occlusion.uri.as_deref()) {
        (Some(node), Some(uri)) => b.image_texture(node, uri),
        _ => None,
    }
}

/// Uri of a packed image: beside the first source uri, or the bare file
/// name when images go to an explicit output directory.
fn combined_uri(sources: &[&ChannelSource], output: &Path, explicit_dir: bool) -> String {
    let file_name = output
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    if explicit_dir {
        return file_name;
    }
    match sources.iter().find_map(|s| s.uri.as_deref()) {
        Some(uri) => Path::new(uri)
            .with_file_name(&file_name)
            .to_string_lossy()
            .replace('\\', "/"),
        None => file_name,
    }
}

// ============================================================================
// Geometry binding
// ============================================================================

/// Default unbound primitives to the first written material, then apply
/// look assignments by exact geometry path.
fn bind_geometry(
    b: &mut FlatBuilder<'_>,
    first_material: usize,
    material_index: &HashMap<NodeId, usize>,
) {
    if b.gltf.meshes.is_empty() {
        return;
    }
    for primitive in b.gltf.meshes.iter_mut().flat_map(|m| m.primitives.iter_mut()) {
        if primitive.material.is_none() {
            primitive.material = Some(first_material);
        }
    }

    let doc = b.doc;
    let paths = ScenePaths::build(&b.gltf);
    let mut bindings = Vec::new();
    for look in doc.looks() {
        for assign in &look.assigns {
            let translated = doc.find_node(&assign.material).and_then(|m| material_index.get(&m));
            let Some(&index) = translated else {
                b.log.warn(format!(
                    "Look '{}': material '{}' was not translated",
                    look.name, assign.material
                ));
                continue;
            };
            for token in assign.geometry_paths() {
                match paths.find(token) {
                    Some(path) => bindings.push((path.mesh, path.primitive, index)),
                    None => b.log.warn(format!(
                        "Look '{}': geometry '{token}' matches no primitive",
                        look.name
                    )),
                }
            }
        }
    }

    let bound = bindings.len();
    for (mesh, primitive, index) in bindings {
        b.gltf.meshes[mesh].primitives[primitive].material = Some(index);
    }
    if bound > 0 {
        b.log.info(format!("Bound {bound} primitives through looks"));
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;

    fn pbr_document() -> (Document, NodeId) {
        let mut doc = Document::with_standard_library();
        let shader = doc.add_node(GLTF_PBR, "shiny", SURFACESHADER_TYPE).unwrap();
        let material = doc.add_node(SURFACE_MATERIAL, "MAT_shiny", MATERIAL_TYPE).unwrap();
        doc.connect(material, "surfaceshader", Connection::node(shader)).unwrap();
        (doc, shader)
    }

    #[test]
    fn test_no_shaders() {
        let doc = Document::with_standard_library();
        let result = mtlx_to_gltf(&doc, None, &MtlxToGltfOptions::default());
        assert!(matches!(result, Err(Error::NoMaterials)));
    }

    #[test]
    fn test_constants_and_suppression() {
        let (mut doc, shader) = pbr_document();
        doc.set_input_value(shader, "base_color", Value::Color3(Vec3::new(0.2, 0.4, 0.6))).unwrap();
        doc.set_input_value(shader, "roughness", Value::Float(0.3)).unwrap();
        doc.set_input_value(shader, "metallic", Value::Float(1.0)).unwrap();
        doc.set_input_value(shader, "ior", Value::Float(1.33)).unwrap();
        doc.set_input_value(shader, "alpha_mode", Value::Integer(1)).unwrap();
        doc.set_input_value(shader, "alpha_cutoff", Value::Float(0.25)).unwrap();

        let gltf = mtlx_to_gltf(&doc, None, &MtlxToGltfOptions::default()).unwrap().output;
        let material = &gltf.materials[0];
        assert_eq!(material.name.as_deref(), Some("shiny"));
        let pbr = material.pbr().unwrap();
        assert_eq!(pbr.base_color_factor, Some([0.2, 0.4, 0.6, 1.0]));
        assert_eq!(pbr.roughness_factor, Some(0.3));
        assert_eq!(pbr.metallic_factor, None);
        assert_eq!(material.alpha_mode, Some(AlphaMode::Mask));
        assert_eq!(material.alpha_cutoff, Some(0.25));
        assert_eq!(material.ext().unwrap().ior.as_ref().unwrap().ior, Some(1.33));
        assert_eq!(gltf.extensions_used, vec![KHR_MATERIALS_IOR.to_string()]);
        assert_eq!(gltf.asset.generator, Some(generator()));
    }

    #[test]
    fn test_write_defaults() {
        let (doc, _) = pbr_document();
        let options = MtlxToGltfOptions { write_default_inputs: true, ..Default::default() };
        let gltf = mtlx_to_gltf(&doc, None, &options).unwrap().output;
        let material = &gltf.materials[0];
        assert_eq!(material.pbr().unwrap().metallic_factor, Some(1.0));
        assert_eq!(material.ext().unwrap().ior.as_ref().unwrap().ior, Some(1.5));
    }

    #[test]
    fn test_unlit_and_missing_shader() {
        let (mut doc, _) = pbr_document();
        let other = doc.add_node("surface_unlit", "flat", SURFACESHADER_TYPE).unwrap();
        let material = doc.add_node(SURFACE_MATERIAL, "MAT_flat", MATERIAL_TYPE).unwrap();
        doc.connect(material, "surfaceshader", Connection::node(other)).unwrap();
        doc.set_input_value(other, "opacity", Value::Float(0.5)).unwrap();
        doc.add_node(SURFACE_MATERIAL, "MAT_empty", MATERIAL_TYPE).unwrap();

        let conversion = mtlx_to_gltf(&doc, None, &MtlxToGltfOptions::default()).unwrap();
        let gltf = conversion.output;
        assert_eq!(gltf.materials.len(), 2);
        assert!(gltf.materials[1].is_unlit());
        assert_eq!(gltf.materials[1].pbr().unwrap().base_color_factor, Some([1.0, 1.0, 1.0, 0.5]));
        assert!(conversion.log.warnings().any(|w| w.contains("MAT_empty")));
    }

    #[test]
    fn test_geometry_defaults_and_reset() {
        let (doc, _) = pbr_document();
        let geometry = Gltf {
            meshes: vec![Mesh {
                primitives: vec![Primitive { material: Some(3), ..Default::default() }],
                ..Default::default()
            }],
            materials: vec![Material::default(); 4],
            ..Default::default()
        };

        let gltf = mtlx_to_gltf(&doc, Some(geometry.clone()), &MtlxToGltfOptions::default())
            .unwrap()
            .output;
        assert_eq!(gltf.materials.len(), 1);
        assert_eq!(gltf.meshes[0].primitives[0].material, Some(0));

        let options = MtlxToGltfOptions { reset_materials: false, ..Default::default() };
        let gltf = mtlx_to_gltf(&doc, Some(geometry), &options).unwrap().output;
        assert_eq!(gltf.materials.len(), 5);
        assert_eq!(gltf.meshes[0].primitives[0].material, Some(3));
    }

    #[test]
    fn test_combined_uri() {
        let source = ChannelSource::image(NodeId(0), "textures/metal.png", None, 0, 1.0);
        let output = Path::new("/abs/textures/metal_combined.png");
        assert_eq!(combined_uri(&[&source], output, false), "textures/metal_combined.png");
        assert_eq!(combined_uri(&[&source], output, true), "metal_combined.png");
    }
}

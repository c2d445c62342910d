//! glTF to MaterialX.
//!
//! Every glTF material becomes a shader node (`gltf_pbr`, or `surface_unlit`
//! for `KHR_materials_unlit`) wired to a `surfacematerial`. Textures become
//! image nodes connected upstream of the shader inputs; factors become
//! constants. An optional look binds materials to geometry paths.

use std::collections::BTreeSet;

use glam::{Vec3, Vec4};

use super::mapper::{rgb_factor, GraphBuilder};
use super::options::{Conversion, GltfToMtlxOptions};
use super::packer::{METALLIC_CHANNEL, OCCLUSION_CHANNEL, ROUGHNESS_CHANNEL};
use crate::gltf::*;
use crate::mtlx::*;
use crate::util::{Error, Result};

/// Name of the look created for material assignments.
pub const LOOK_NAME: &str = "look";

/// Translate glTF JSON bytes into a graph document.
pub fn gltf_to_mtlx(bytes: &[u8], options: &GltfToMtlxOptions) -> Result<Conversion<Document>> {
    let gltf = Gltf::from_slice(bytes)?;
    convert_gltf(&gltf, Library::standard(), options)
}

/// Translate a parsed glTF document against a definition library.
pub fn convert_gltf(
    gltf: &Gltf,
    library: Library,
    options: &GltfToMtlxOptions,
) -> Result<Conversion<Document>> {
    if gltf.materials.is_empty() {
        return Err(Error::NoMaterials);
    }

    let paths = ScenePaths::build(gltf);
    let vertex_color = paths.vertex_color_materials();
    let mut builder = GraphBuilder::new(gltf, library, options.verbose);
    builder
        .log
        .info(format!("Translating {} glTF materials", gltf.materials.len()));

    let mut material_nodes = Vec::with_capacity(gltf.materials.len());
    for (index, material) in gltf.materials.iter().enumerate() {
        builder.current = material.name.clone().unwrap_or_else(|| format!("material {index}"));
        let checkpoint = builder.doc.node_count();
        match translate_material(&mut builder, material, vertex_color.contains(&index), options) {
            Ok(node) => material_nodes.push(Some(node)),
            Err(e) => {
                builder.doc.truncate_nodes(checkpoint);
                builder
                    .log
                    .warn(format!("{}: material skipped: {e}", builder.current));
                material_nodes.push(None);
            }
        }
    }

    if options.create_assignments {
        assign_materials(&mut builder, &paths, &material_nodes);
    }

    let GraphBuilder { doc, log, .. } = builder;
    Ok(Conversion { output: doc, log })
}

fn translate_material<'g>(
    b: &mut GraphBuilder<'g>,
    material: &'g Material,
    vertex_color: bool,
    options: &GltfToMtlxOptions,
) -> Result<NodeId> {
    let unlit = material.is_unlit();
    let category = if unlit { SURFACE_UNLIT } else { GLTF_PBR };
    let name = material
        .name
        .as_deref()
        .filter(|n| !n.is_empty())
        .map(create_valid_name);

    let shader = b
        .doc
        .add_node(category, name.as_deref().unwrap_or("SHD_0"), SURFACESHADER_TYPE)?;
    let material_name = name.map_or_else(|| "MAT_0".to_string(), |n| format!("MAT_{n}"));
    let material_node = b.doc.add_node(SURFACE_MATERIAL, &material_name, MATERIAL_TYPE)?;
    b.doc
        .connect(material_node, "surfaceshader", Connection::node(shader))?;

    let (color_input, alpha_input) = if unlit {
        ("emission_color", "opacity")
    } else {
        ("base_color", "alpha")
    };
    let pbr = material.pbr();
    let base_texture = pbr.and_then(|p| p.base_color_texture.as_ref());
    let base_factor = pbr.and_then(|p| p.base_color_factor).map(Vec4::from);
    let image = b.read_color(
        shader,
        color_input,
        Some(alpha_input),
        base_texture,
        base_factor,
        "image_base_color",
    )?;
    if vertex_color {
        add_geometry_color(b, shader, image, color_input, alpha_input, base_factor)?;
    }

    if !unlit {
        read_pbr(b, shader, material)?;
        if let Some(ext) = material.ext() {
            read_extensions(b, shader, ext)?;
        }
    }
    if let Some(ext) = material.ext() {
        for key in ext.other.keys() {
            b.log
                .info(format!("{}: extension '{key}' not translated", b.current));
        }
    }

    if options.add_all_inputs {
        b.doc.add_inputs_from_nodedef(shader)?;
    }
    b.log.info(format!(
        "Created {category} shader '{}'",
        b.doc.node(shader).name
    ));
    Ok(material_node)
}

/// Blend vertex colors into the base color through the color image's
/// `geomcolor` input, creating a file-less image when there is no texture.
fn add_geometry_color(
    b: &mut GraphBuilder<'_>,
    shader: NodeId,
    image: Option<NodeId>,
    color_input: &str,
    alpha_input: &str,
    factor: Option<Vec4>,
) -> Result<()> {
    let image = match image {
        Some(image) => image,
        None => {
            let image = b
                .doc
                .add_node("gltf_colorimage", "image_base_color", MULTIOUTPUT_TYPE)?;
            if let Some(factor) = factor.filter(|f| *f != Vec4::ONE) {
                b.doc.set_input_value(image, "color", Value::Color4(factor))?;
            }
            b.doc
                .connect(shader, color_input, Connection::node_output(image, "outcolor"))?;
            b.doc
                .connect(shader, alpha_input, Connection::node_output(image, "outa"))?;
            image
        }
    };
    let geomcolor = b.doc.add_node("geomcolor", "geomcolor", COLOR4_TYPE)?;
    b.doc.connect(image, "geomcolor", Connection::node(geomcolor))
}

fn read_pbr<'g>(b: &mut GraphBuilder<'g>, shader: NodeId, material: &'g Material) -> Result<()> {
    let pbr = material.pbr();
    let metallic = pbr.and_then(|p| p.metallic_factor);
    let roughness = pbr.and_then(|p| p.roughness_factor);
    let mr_texture = pbr.and_then(|p| p.metallic_roughness_texture.as_ref());

    let orm = match mr_texture {
        Some(info) => {
            let image = b.add_image("image_orm", "gltf_image", VECTOR3_TYPE, info, None);
            b.texture_or_warn("metallic", image).map(|image| (image, info))
        }
        None => None,
    };
    let mut occlusion_packed = false;
    match orm {
        Some((image, info)) => {
            let factor = Vec3::new(1.0, roughness.unwrap_or(1.0), metallic.unwrap_or(1.0));
            if factor != Vec3::ONE {
                b.doc.set_input_value(image, "factor", Value::Vector3(factor))?;
            }
            b.extract(shader, "roughness", image, ROUGHNESS_CHANNEL)?;
            b.extract(shader, "metallic", image, METALLIC_CHANNEL)?;
            if material
                .occlusion_texture
                .as_ref()
                .is_some_and(|o| o.index == info.index)
            {
                b.extract(shader, "occlusion", image, OCCLUSION_CHANNEL)?;
                occlusion_packed = true;
            }
        }
        None => {
            b.set_float(shader, "metallic", metallic)?;
            b.set_float(shader, "roughness", roughness)?;
        }
    }

    b.read_normal(shader, "normal", material.normal_texture.as_ref(), "image_normal")?;
    if !occlusion_packed {
        b.read_float(
            shader,
            "occlusion",
            material.occlusion_texture.as_ref(),
            None,
            "image_occlusion",
        )?;
    }
    b.read_color(
        shader,
        "emissive",
        None,
        material.emissive_texture.as_ref(),
        rgb_factor(material.emissive_factor),
        "image_emissive",
    )?;

    if let Some(mode) = material.alpha_mode.filter(|m| *m != AlphaMode::Opaque) {
        b.doc
            .set_input_value(shader, "alpha_mode", Value::Integer(mode.code()))?;
    }
    if let Some(cutoff) = material.alpha_cutoff.filter(|c| (c - 0.5).abs() > f32::EPSILON) {
        b.doc
            .set_input_value(shader, "alpha_cutoff", Value::Float(cutoff))?;
    }
    Ok(())
}

fn read_extensions<'g>(
    b: &mut GraphBuilder<'g>,
    shader: NodeId,
    ext: &'g MaterialExtensions,
) -> Result<()> {
    if let Some(ior) = &ext.ior {
        b.set_float(shader, "ior", ior.ior)?;
    }

    if let Some(specular) = &ext.specular {
        b.read_float(
            shader,
            "specular",
            specular.specular_texture.as_ref(),
            specular.specular_factor,
            "image_specular",
        )?;
        b.read_color(
            shader,
            "specular_color",
            None,
            specular.specular_color_texture.as_ref(),
            rgb_factor(specular.specular_color_factor),
            "image_specular_color",
        )?;
    }

    if let Some(transmission) = &ext.transmission {
        b.read_float(
            shader,
            "transmission",
            transmission.transmission_texture.as_ref(),
            transmission.transmission_factor,
            "image_transmission",
        )?;
    }

    if let Some(iridescence) = &ext.iridescence {
        b.read_float(
            shader,
            "iridescence",
            iridescence.iridescence_texture.as_ref(),
            iridescence.iridescence_factor,
            "image_iridescence",
        )?;
        b.set_float(shader, "iridescence_ior", iridescence.iridescence_ior)?;
        read_iridescence_thickness(b, shader, iridescence)?;
    }

    if let Some(strength) = &ext.emissive_strength {
        b.set_float(shader, "emissive_strength", strength.emissive_strength)?;
    }

    if let Some(volume) = &ext.volume {
        b.read_float(
            shader,
            "thickness",
            volume.thickness_texture.as_ref(),
            volume.thickness_factor,
            "image_thickness",
        )?;
        b.set_float(shader, "attenuation_distance", volume.attenuation_distance)?;
        b.set_color(shader, "attenuation_color", volume.attenuation_color)?;
    }

    if let Some(clearcoat) = &ext.clearcoat {
        b.read_float(
            shader,
            "clearcoat",
            clearcoat.clearcoat_texture.as_ref(),
            clearcoat.clearcoat_factor,
            "image_clearcoat",
        )?;
        b.read_float(
            shader,
            "clearcoat_roughness",
            clearcoat.clearcoat_roughness_texture.as_ref(),
            clearcoat.clearcoat_roughness_factor,
            "image_clearcoat_roughness",
        )?;
        b.read_normal(
            shader,
            "clearcoat_normal",
            clearcoat.clearcoat_normal_texture.as_ref(),
            "image_clearcoat_normal",
        )?;
    }

    if let Some(sheen) = &ext.sheen {
        b.read_color(
            shader,
            "sheen_color",
            None,
            sheen.sheen_color_texture.as_ref(),
            rgb_factor(sheen.sheen_color_factor),
            "image_sheen_color",
        )?;
        b.read_float(
            shader,
            "sheen_roughness",
            sheen.sheen_roughness_texture.as_ref(),
            sheen.sheen_roughness_factor,
            "image_sheen_roughness",
        )?;
    }
    Ok(())
}

/// Thickness texture through `gltf_iridescence_thickness`; without one the
/// maximum thickness is the constant.
fn read_iridescence_thickness<'g>(
    b: &mut GraphBuilder<'g>,
    shader: NodeId,
    iridescence: &'g Iridescence,
) -> Result<()> {
    if let Some(info) = &iridescence.iridescence_thickness_texture {
        let image = b.add_image(
            "image_iridescence_thickness",
            "gltf_iridescence_thickness",
            FLOAT_TYPE,
            info,
            None,
        );
        if let Some(image) = b.texture_or_warn("iridescence_thickness", image) {
            if let Some(min) = iridescence.iridescence_thickness_minimum {
                b.doc.set_input_value(image, "thicknessMin", Value::Float(min))?;
            }
            if let Some(max) = iridescence.iridescence_thickness_maximum {
                b.doc.set_input_value(image, "thicknessMax", Value::Float(max))?;
            }
            return b
                .doc
                .connect(shader, "iridescence_thickness", Connection::node(image));
        }
    }
    b.set_float(
        shader,
        "iridescence_thickness",
        iridescence.iridescence_thickness_maximum,
    )
}

/// One `materialassign` per material listing every path it is used on.
fn assign_materials(
    b: &mut GraphBuilder<'_>,
    paths: &ScenePaths,
    material_nodes: &[Option<NodeId>],
) {
    let mut look = None;
    let mut assigned = BTreeSet::new();
    for (index, node) in material_nodes.iter().enumerate() {
        let Some(node) = *node else { continue };
        let geometry = paths.paths_for_material(index);
        if geometry.is_empty() {
            continue;
        }
        let look = *look.get_or_insert_with(|| b.doc.add_look(LOOK_NAME));
        let material = b.doc.node(node).name.clone();
        b.doc
            .add_material_assign(look, &format!("MA_{material}"), &material, &geometry.join(","));
        assigned.insert(index);
    }
    if !assigned.is_empty() {
        b.log.info(format!(
            "Assigned {} materials to {} geometry paths",
            assigned.len(),
            paths.len()
        ));
    }
}

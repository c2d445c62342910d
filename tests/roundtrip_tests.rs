//! Integration tests for glTF -> MaterialX -> glTF translation.

use mtlx_gltf::convert::{gltf_to_mtlx, mtlx_to_gltf, GltfToMtlxOptions, MtlxToGltfOptions};
use mtlx_gltf::gltf::*;
use mtlx_gltf::mtlx::{
    json, Connection, Document, Library, Value, COLOR3_TYPE, FLOAT_TYPE, GLTF_PBR, MATERIAL_TYPE,
    SURFACESHADER_TYPE, SURFACE_MATERIAL, VECTOR2_TYPE,
};

const EPS: f32 = 1e-5;

fn close(a: f32, b: f32) -> bool {
    (a - b).abs() < EPS
}

fn close3(a: [f32; 3], b: [f32; 3]) -> bool {
    a.iter().zip(b.iter()).all(|(x, y)| close(*x, *y))
}

/// Forward, through the JSON form, and back.
fn round_trip(gltf_json: &str, options: &MtlxToGltfOptions) -> Gltf {
    let forward =
        gltf_to_mtlx(gltf_json.as_bytes(), &GltfToMtlxOptions::default()).expect("forward failed");
    let text = json::to_string(&forward.output).expect("serialize failed");
    let doc = json::from_str(&text, Library::standard()).expect("reparse failed");
    mtlx_to_gltf(&doc, None, options).expect("reverse failed").output
}

#[test]
fn test_constant_material_round_trip() {
    let source = r#"{
        "asset": {"version": "2.0"},
        "materials": [{
            "name": "coated",
            "pbrMetallicRoughness": {
                "baseColorFactor": [0.8, 0.2, 0.1, 0.9],
                "metallicFactor": 0.3,
                "roughnessFactor": 0.7
            },
            "emissiveFactor": [0.1, 0.2, 0.3],
            "alphaMode": "MASK",
            "alphaCutoff": 0.3,
            "extensions": {
                "KHR_materials_ior": {"ior": 1.4},
                "KHR_materials_specular":
                    {"specularFactor": 0.5, "specularColorFactor": [0.9, 0.8, 0.7]},
                "KHR_materials_transmission": {"transmissionFactor": 0.25},
                "KHR_materials_clearcoat":
                    {"clearcoatFactor": 0.5, "clearcoatRoughnessFactor": 0.1},
                "KHR_materials_sheen":
                    {"sheenColorFactor": [0.2, 0.3, 0.4], "sheenRoughnessFactor": 0.6},
                "KHR_materials_iridescence": {
                    "iridescenceFactor": 0.8,
                    "iridescenceIor": 1.6,
                    "iridescenceThicknessMaximum": 300
                },
                "KHR_materials_emissive_strength": {"emissiveStrength": 2.0},
                "KHR_materials_volume": {
                    "thicknessFactor": 0.3,
                    "attenuationDistance": 5.0,
                    "attenuationColor": [0.9, 0.8, 0.7]
                }
            }
        }]
    }"#;
    let gltf = round_trip(source, &MtlxToGltfOptions::default());
    assert_eq!(gltf.materials.len(), 1);
    let material = &gltf.materials[0];
    assert_eq!(material.name.as_deref(), Some("coated"));

    let pbr = material.pbr().expect("pbr block");
    let base = pbr.base_color_factor.expect("base color");
    assert!(close3([base[0], base[1], base[2]], [0.8, 0.2, 0.1]));
    assert!(close(base[3], 0.9));
    assert!(close(pbr.metallic_factor.unwrap(), 0.3));
    assert!(close(pbr.roughness_factor.unwrap(), 0.7));
    assert!(close3(material.emissive_factor.unwrap(), [0.1, 0.2, 0.3]));
    assert_eq!(material.alpha_mode, Some(AlphaMode::Mask));
    assert!(close(material.alpha_cutoff.unwrap(), 0.3));

    let ext = material.ext().expect("extensions");
    assert!(close(ext.ior.as_ref().unwrap().ior.unwrap(), 1.4));
    let specular = ext.specular.as_ref().unwrap();
    assert!(close(specular.specular_factor.unwrap(), 0.5));
    assert!(close3(specular.specular_color_factor.unwrap(), [0.9, 0.8, 0.7]));
    assert!(close(ext.transmission.as_ref().unwrap().transmission_factor.unwrap(), 0.25));
    let clearcoat = ext.clearcoat.as_ref().unwrap();
    assert!(close(clearcoat.clearcoat_factor.unwrap(), 0.5));
    assert!(close(clearcoat.clearcoat_roughness_factor.unwrap(), 0.1));
    let sheen = ext.sheen.as_ref().unwrap();
    assert!(close3(sheen.sheen_color_factor.unwrap(), [0.2, 0.3, 0.4]));
    assert!(close(sheen.sheen_roughness_factor.unwrap(), 0.6));
    let iridescence = ext.iridescence.as_ref().unwrap();
    assert!(close(iridescence.iridescence_factor.unwrap(), 0.8));
    assert!(close(iridescence.iridescence_ior.unwrap(), 1.6));
    assert!(close(iridescence.iridescence_thickness_maximum.unwrap(), 300.0));
    assert!(close(ext.emissive_strength.as_ref().unwrap().emissive_strength.unwrap(), 2.0));
    let volume = ext.volume.as_ref().unwrap();
    assert!(close(volume.thickness_factor.unwrap(), 0.3));
    assert!(close(volume.attenuation_distance.unwrap(), 5.0));
    assert!(close3(volume.attenuation_color.unwrap(), [0.9, 0.8, 0.7]));

    for name in [KHR_MATERIALS_IOR, KHR_MATERIALS_SHEEN, KHR_MATERIALS_VOLUME] {
        assert!(gltf.extensions_used.iter().any(|e| e == name), "missing {name}");
    }
}

#[test]
fn test_default_values_are_dropped() {
    let source = r#"{"materials": [{"name": "plain",
        "pbrMetallicRoughness":
            {"baseColorFactor": [1, 1, 1, 1], "metallicFactor": 1.0, "roughnessFactor": 0.4},
        "extensions": {"KHR_materials_ior": {"ior": 1.5}}}]}"#;

    let gltf = round_trip(source, &MtlxToGltfOptions::default());
    let material = &gltf.materials[0];
    let pbr = material.pbr().unwrap();
    assert_eq!(pbr.base_color_factor, None);
    assert_eq!(pbr.metallic_factor, None);
    assert!(close(pbr.roughness_factor.unwrap(), 0.4));
    assert!(material.extensions.is_none());
    assert!(gltf.extensions_used.is_empty());

    let options = MtlxToGltfOptions { write_default_inputs: true, ..Default::default() };
    let gltf = round_trip(source, &options);
    let material = &gltf.materials[0];
    assert_eq!(material.pbr().unwrap().metallic_factor, Some(1.0));
    assert_eq!(material.ext().unwrap().ior.as_ref().unwrap().ior, Some(1.5));
}

#[test]
fn test_texture_transform_and_sampler_round_trip() {
    let source = r#"{
        "materials": [{
            "name": "textured",
            "pbrMetallicRoughness": {"baseColorTexture": {"index": 0, "texCoord": 1,
                "extensions": {"KHR_texture_transform":
                    {"offset": [0.1, 0.2], "rotation": 0.5, "scale": [2, 3]}}}},
            "emissiveTexture": {"index": 1},
            "emissiveFactor": [1, 1, 1]
        }],
        "textures": [{"source": 0, "sampler": 0}, {"source": 1, "sampler": 1}],
        "images": [{"uri": "albedo.png"}, {"uri": "glow.png"}],
        "samplers": [
            {"magFilter": 9729, "minFilter": 9729, "wrapS": 33071, "wrapT": 33648},
            {"magFilter": 9729, "minFilter": 9729, "wrapS": 33071, "wrapT": 33648}
        ],
        "extensionsUsed": ["KHR_texture_transform"]
    }"#;

    // Forward: rotation is stored in degrees with the opposite winding.
    let forward = gltf_to_mtlx(source.as_bytes(), &GltfToMtlxOptions::default()).unwrap();
    let doc = &forward.output;
    let shader = doc.find_node("textured").unwrap();
    let image = doc.connected_node(shader, "base_color").unwrap();
    let rotate = doc.input_value(image, "rotate").and_then(Value::as_float).unwrap();
    assert!((rotate + 0.5f32.to_degrees()).abs() < 1e-3);
    assert_eq!(doc.input_value(image, "uaddressmode"), Some(&Value::String("clamp".into())));
    assert_eq!(doc.input_value(image, "vaddressmode"), Some(&Value::String("mirror".into())));
    let texcoord = doc.connected_node(image, "texcoord").unwrap();
    assert_eq!(doc.input_value(texcoord, "index"), Some(&Value::Integer(1)));

    let gltf = mtlx_to_gltf(doc, None, &MtlxToGltfOptions::default()).unwrap().output;
    let material = &gltf.materials[0];
    let base = material.pbr().unwrap().base_color_texture.as_ref().unwrap();
    assert_eq!(base.tex_coord, Some(1));
    let transform = base.transform().unwrap();
    assert!(close(transform.rotation.unwrap(), 0.5));
    assert_eq!(transform.offset, Some([0.1, 0.2]));
    assert_eq!(transform.scale, Some([2.0, 3.0]));
    assert!(gltf.extensions_used.iter().any(|e| e == KHR_TEXTURE_TRANSFORM));

    // Identical sampler settings collapse into one entry.
    assert_eq!(gltf.samplers.len(), 1);
    assert_eq!(gltf.textures.len(), 2);
    assert!(gltf.textures.iter().all(|t| t.sampler == Some(0)));
    let sampler = gltf.samplers[0];
    assert_eq!(sampler.wrap_s, Some(33071));
    assert_eq!(sampler.wrap_t, Some(33648));
    assert_eq!(sampler.mag_filter, Some(9729));
    assert_eq!(sampler.min_filter, Some(9729));

    let uris: Vec<_> = gltf.images.iter().map(|i| i.uri.as_deref().unwrap()).collect();
    assert_eq!(uris, vec!["albedo.png", "glow.png"]);
    assert_eq!(material.emissive_factor, Some([1.0, 1.0, 1.0]));
}

#[test]
fn test_reverse_rotation_sign() {
    let mut doc = Document::with_standard_library();
    let shader = doc.add_node(GLTF_PBR, "spun", SURFACESHADER_TYPE).unwrap();
    let material = doc.add_node(SURFACE_MATERIAL, "MAT_spun", MATERIAL_TYPE).unwrap();
    doc.connect(material, "surfaceshader", Connection::node(shader)).unwrap();
    let image = doc.add_node("gltf_image", "image_roughness", FLOAT_TYPE).unwrap();
    doc.set_input_value(image, "file", Value::Filename("rough.png".into())).unwrap();
    doc.set_input_value(image, "rotate", Value::Float(90.0)).unwrap();
    doc.set_input_value(image, "offset", Value::Vector2(glam::Vec2::ZERO)).unwrap();
    doc.connect(shader, "transmission", Connection::node(image)).unwrap();

    let gltf = mtlx_to_gltf(&doc, None, &MtlxToGltfOptions::default()).unwrap().output;
    let ext = gltf.materials[0].ext().unwrap();
    let texture = ext.transmission.as_ref().unwrap().transmission_texture.as_ref().unwrap();
    let transform = texture.transform().unwrap();
    assert!(close(transform.rotation.unwrap(), -std::f32::consts::FRAC_PI_2));
    assert_eq!(transform.offset, None);
    assert!(gltf.samplers.is_empty());
    assert_eq!(gltf.textures[0].sampler, None);
}

#[test]
fn test_texture_precedence_in_reverse() {
    let source = r#"{"materials": [{"name": "m", "pbrMetallicRoughness":
        {"baseColorFactor": [0.5, 0.5, 0.5, 1], "baseColorTexture": {"index": 0}}}],
        "textures": [{"source": 0}], "images": [{"uri": "albedo.png"}]}"#;
    let gltf = round_trip(source, &MtlxToGltfOptions::default());
    let pbr = gltf.materials[0].pbr().unwrap();
    assert_eq!(pbr.base_color_texture.as_ref().map(|t| t.index), Some(0));
    assert_eq!(pbr.base_color_factor, Some([0.5, 0.5, 0.5, 1.0]));
}

fn procedural_document() -> Document {
    let mut doc = Document::with_standard_library();
    let graph = doc.add_node_graph("NG_checker");
    let scale = Some(Value::Vector2(glam::Vec2::splat(4.0)));
    doc.add_graph_input(graph, "scale", VECTOR2_TYPE, scale).unwrap();
    let texcoord = doc.add_graph_node(graph, "texcoord", "uv", VECTOR2_TYPE).unwrap();
    let checker = doc.add_graph_node(graph, "checkerboard", "checker", COLOR3_TYPE).unwrap();
    doc.connect(checker, "texcoord", Connection::node(texcoord)).unwrap();
    doc.connect(checker, "uvtiling", Connection::Interface("scale".into())).unwrap();
    doc.add_graph_output(graph, "out", COLOR3_TYPE).unwrap();
    doc.connect_graph_output(graph, "out", Connection::node(checker)).unwrap();

    for name in ["first", "second"] {
        let shader = doc.add_node(GLTF_PBR, name, SURFACESHADER_TYPE).unwrap();
        let material_name = format!("MAT_{name}");
        let material = doc.add_node(SURFACE_MATERIAL, &material_name, MATERIAL_TYPE).unwrap();
        doc.connect(material, "surfaceshader", Connection::node(shader)).unwrap();
        let connection = Connection::Graph { graph, output: "out".into() };
        doc.connect(shader, "base_color", connection).unwrap();
    }
    doc
}

#[test]
fn test_procedural_fallback() {
    let doc = procedural_document();
    let options = MtlxToGltfOptions { create_procedural_textures: true, ..Default::default() };
    let gltf = mtlx_to_gltf(&doc, None, &options).unwrap().output;

    let records = &gltf.extensions.as_ref().unwrap().procedurals.as_ref().unwrap().procedurals;
    // Serialized once even though two materials use it: 2 nodes, 1 input, 1 output.
    assert_eq!(records.len(), 4);
    assert_eq!(records[3].nodetype.as_deref(), Some("output"));
    assert_eq!(records[3].procedural, Some(1));

    for material in &gltf.materials {
        let slots = material.ext().unwrap().procedurals.as_ref().unwrap();
        assert_eq!(slots["baseColorTexture"], ProceduralRef { index: 3 });
    }
    assert!(gltf.extensions_used.iter().any(|e| e == KHR_PROCEDURALS));

    let bytes = gltf.to_vec_pretty().unwrap();
    let text = String::from_utf8(bytes).unwrap();
    assert!(text.contains("\"KHR_procedurals\""));
}

#[test]
fn test_unmapped_graph_without_procedurals() {
    let doc = procedural_document();
    let conversion = mtlx_to_gltf(&doc, None, &MtlxToGltfOptions::default()).unwrap();
    let gltf = conversion.output;
    assert!(gltf.extensions.is_none());
    assert!(gltf.materials.iter().all(|m| m.extensions.is_none()));
    assert!(conversion.log.warnings().any(|w| w.contains("checkerboard")));
}

#[test]
fn test_iridescence_thickness_at_shader_default() {
    // 100 is the shader default but not the glTF default for the maximum.
    let source = r#"{"materials": [{"name": "film", "extensions": {"KHR_materials_iridescence":
        {"iridescenceFactor": 1, "iridescenceThicknessMaximum": 100}}}]}"#;
    let gltf = round_trip(source, &MtlxToGltfOptions::default());
    let iridescence = gltf.materials[0].ext().unwrap().iridescence.as_ref().unwrap();
    assert!(close(iridescence.iridescence_factor.unwrap(), 1.0));
    assert!(close(iridescence.iridescence_thickness_maximum.unwrap(), 100.0));

    // The glTF default itself is left implicit.
    let source = r#"{"materials": [{"name": "film", "extensions": {"KHR_materials_iridescence":
        {"iridescenceFactor": 1, "iridescenceThicknessMaximum": 400}}}]}"#;
    let gltf = round_trip(source, &MtlxToGltfOptions::default());
    let iridescence = gltf.materials[0].ext().unwrap().iridescence.as_ref().unwrap();
    assert_eq!(iridescence.iridescence_thickness_maximum, None);
}

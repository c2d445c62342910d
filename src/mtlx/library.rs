//! Node definition library.
//!
//! A [`Library`] maps node categories and output types to [`NodeDef`]s.
//! [`Library::standard`] carries the glTF PBR definitions plus the utility
//! nodes the translators and procedural graphs need; more definitions can be
//! merged from JSON files.

use std::path::Path;

use glam::{Vec2, Vec3, Vec4};
use serde::{Deserialize, Serialize};

use super::value::*;
use crate::util::{Error, Result};

/// Input declared on a node definition.
#[derive(Clone, Debug, PartialEq)]
pub struct InputDef {
    pub name: String,
    pub type_name: String,
    pub default: Option<Value>,
}

/// Output declared on a node definition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OutputDef {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
}

/// Node definition.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeDef {
    /// Definition name, e.g. `ND_gltf_pbr_surfaceshader`.
    pub name: String,
    /// Node category, e.g. `gltf_pbr`.
    pub category: String,
    /// Node output type, `multioutput` when several outputs are declared.
    pub node_type: String,
    pub node_group: Option<String>,
    pub inputs: Vec<InputDef>,
    pub outputs: Vec<OutputDef>,
}

impl NodeDef {
    /// Single-output definition with output `out`.
    pub fn new(name: &str, category: &str, node_type: &str) -> Self {
        Self {
            name: name.to_string(),
            category: category.to_string(),
            node_type: node_type.to_string(),
            node_group: None,
            inputs: Vec::new(),
            outputs: vec![OutputDef { name: "out".into(), type_name: node_type.to_string() }],
        }
    }

    /// Definition with several named outputs.
    pub fn multioutput(name: &str, category: &str, outputs: &[(&str, &str)]) -> Self {
        Self {
            name: name.to_string(),
            category: category.to_string(),
            node_type: MULTIOUTPUT_TYPE.to_string(),
            node_group: None,
            inputs: Vec::new(),
            outputs: outputs
                .iter()
                .map(|(n, t)| OutputDef { name: n.to_string(), type_name: t.to_string() })
                .collect(),
        }
    }

    pub fn group(mut self, group: &str) -> Self {
        self.node_group = Some(group.to_string());
        self
    }

    /// Add an input with a default value.
    pub fn input(mut self, name: &str, default: Value) -> Self {
        self.inputs.push(InputDef {
            name: name.to_string(),
            type_name: default.type_name().to_string(),
            default: Some(default),
        });
        self
    }

    /// Add an input without a default value.
    pub fn input_type(mut self, name: &str, type_name: &str) -> Self {
        self.inputs.push(InputDef {
            name: name.to_string(),
            type_name: type_name.to_string(),
            default: None,
        });
        self
    }

    pub fn find_input(&self, name: &str) -> Option<&InputDef> {
        self.inputs.iter().find(|i| i.name == name)
    }

    pub fn find_output(&self, name: &str) -> Option<&OutputDef> {
        self.outputs.iter().find(|o| o.name == name)
    }

    /// Declared default of an input.
    pub fn default_value(&self, input: &str) -> Option<&Value> {
        self.find_input(input).and_then(|i| i.default.as_ref())
    }

    /// Type of the named output, or of the node itself for single-output nodes.
    pub fn output_type(&self, output: Option<&str>) -> Result<&str> {
        match output {
            Some(name) => self
                .find_output(name)
                .map(|o| o.type_name.as_str())
                .ok_or_else(|| Error::UnknownOutput {
                    nodedef: self.name.clone(),
                    output: name.to_string(),
                }),
            None if self.node_type == MULTIOUTPUT_TYPE => Err(Error::UnknownOutput {
                nodedef: self.name.clone(),
                output: String::new(),
            }),
            None => Ok(&self.node_type),
        }
    }
}

// ============================================================================
// JSON definition files
// ============================================================================

#[derive(Deserialize)]
struct InputDefRecord {
    name: String,
    #[serde(rename = "type")]
    type_name: String,
    #[serde(default)]
    value: Option<String>,
}

#[derive(Deserialize)]
struct NodeDefRecord {
    name: String,
    #[serde(rename = "node")]
    category: String,
    #[serde(rename = "type")]
    node_type: String,
    #[serde(default)]
    nodegroup: Option<String>,
    #[serde(default)]
    inputs: Vec<InputDefRecord>,
    #[serde(default)]
    outputs: Vec<OutputDef>,
}

impl TryFrom<NodeDefRecord> for NodeDef {
    type Error = Error;

    fn try_from(record: NodeDefRecord) -> Result<Self> {
        let inputs = record
            .inputs
            .into_iter()
            .map(|i| {
                let default = match &i.value {
                    Some(text) => Some(Value::parse(&i.type_name, text)?),
                    None => None,
                };
                Ok(InputDef { name: i.name, type_name: i.type_name, default })
            })
            .collect::<Result<Vec<_>>>()?;
        let outputs = if record.outputs.is_empty() {
            vec![OutputDef { name: "out".into(), type_name: record.node_type.clone() }]
        } else {
            record.outputs
        };
        Ok(NodeDef {
            name: record.name,
            category: record.category,
            node_type: record.node_type,
            node_group: record.nodegroup,
            inputs,
            outputs,
        })
    }
}

// ============================================================================
// Library
// ============================================================================

/// Collection of node definitions.
#[derive(Clone, Debug, Default)]
pub struct Library {
    defs: Vec<NodeDef>,
}

impl Library {
    pub fn new() -> Self {
        Self::default()
    }

    /// Definitions for glTF PBR and the supporting utility nodes.
    pub fn standard() -> Self {
        let mut lib = Self::new();
        for def in standard_defs() {
            lib.add(def);
        }
        lib
    }

    /// Add a definition, replacing any existing one with the same name.
    pub fn add(&mut self, def: NodeDef) {
        match self.defs.iter_mut().find(|d| d.name == def.name) {
            Some(existing) => *existing = def,
            None => self.defs.push(def),
        }
    }

    /// Merge definitions from another library.
    pub fn merge(&mut self, other: Library) {
        for def in other.defs {
            self.add(def);
        }
    }

    /// Parse definitions from a JSON array of
    /// `{name, node, type, nodegroup?, inputs: [{name, type, value?}], outputs?}`.
    pub fn from_json(text: &str) -> Result<Self> {
        let records: Vec<NodeDefRecord> = serde_json::from_str(text)?;
        let mut lib = Self::new();
        for record in records {
            lib.add(NodeDef::try_from(record)?);
        }
        Ok(lib)
    }

    /// Load a JSON definition file and merge it into this library.
    pub fn load_json(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(Error::FileNotFound(path.to_path_buf()));
        }
        let text = std::fs::read_to_string(path)?;
        self.merge(Self::from_json(&text)?);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &NodeDef> {
        self.defs.iter()
    }

    /// Find a definition by name.
    pub fn get(&self, name: &str) -> Option<&NodeDef> {
        self.defs.iter().find(|d| d.name == name)
    }

    /// Find the definition of a category producing the given type.
    pub fn find(&self, category: &str, node_type: &str) -> Option<&NodeDef> {
        self.defs
            .iter()
            .find(|d| d.category == category && d.node_type == node_type)
    }

    /// Like [`Library::find`] but reporting a missing definition as an error.
    pub fn require(&self, category: &str, node_type: &str) -> Result<&NodeDef> {
        self.find(category, node_type)
            .ok_or_else(|| Error::NodeDefNotFound(format!("{category} ({node_type})")))
    }
}

// ============================================================================
// Built-in definitions
// ============================================================================

/// Inputs shared by the glTF image nodes.
fn image_inputs(def: NodeDef) -> NodeDef {
    def.input("file", Value::Filename(String::new()))
        .input_type("texcoord", VECTOR2_TYPE)
        .input("pivot", Value::Vector2(Vec2::new(0.0, 1.0)))
        .input("scale", Value::Vector2(Vec2::ONE))
        .input("rotate", Value::Float(0.0))
        .input("offset", Value::Vector2(Vec2::ZERO))
        .input("operationorder", Value::Integer(0))
        .input("uaddressmode", Value::String("periodic".into()))
        .input("vaddressmode", Value::String("periodic".into()))
        .input("filtertype", Value::String("linear".into()))
}

fn typed_defs(
    category: &str,
    types: &[(&str, Value)],
    build: impl Fn(NodeDef, &Value) -> NodeDef,
) -> Vec<NodeDef> {
    types
        .iter()
        .map(|(type_name, zero)| {
            let def = NodeDef::new(&format!("ND_{category}_{type_name}"), category, type_name);
            build(def, zero)
        })
        .collect()
}

fn standard_defs() -> Vec<NodeDef> {
    let mut defs = vec![
        NodeDef::new("ND_gltf_pbr_surfaceshader", "gltf_pbr", SURFACESHADER_TYPE)
            .group("pbr")
            .input("base_color", Value::Color3(Vec3::ONE))
            .input("metallic", Value::Float(1.0))
            .input("roughness", Value::Float(1.0))
            .input_type("normal", VECTOR3_TYPE)
            .input_type("tangent", VECTOR3_TYPE)
            .input("occlusion", Value::Float(1.0))
            .input("transmission", Value::Float(0.0))
            .input("specular", Value::Float(1.0))
            .input("specular_color", Value::Color3(Vec3::ONE))
            .input("ior", Value::Float(1.5))
            .input("alpha", Value::Float(1.0))
            .input("alpha_mode", Value::Integer(0))
            .input("alpha_cutoff", Value::Float(0.5))
            .input("iridescence", Value::Float(0.0))
            .input("iridescence_ior", Value::Float(1.3))
            .input("iridescence_thickness", Value::Float(100.0))
            .input("sheen_color", Value::Color3(Vec3::ZERO))
            .input("sheen_roughness", Value::Float(0.0))
            .input("clearcoat", Value::Float(0.0))
            .input("clearcoat_roughness", Value::Float(0.0))
            .input_type("clearcoat_normal", VECTOR3_TYPE)
            .input("emissive", Value::Color3(Vec3::ZERO))
            .input("emissive_strength", Value::Float(1.0))
            .input("thickness", Value::Float(0.0))
            .input_type("attenuation_distance", FLOAT_TYPE)
            .input("attenuation_color", Value::Color3(Vec3::ONE)),
        NodeDef::new("ND_surface_unlit", "surface_unlit", SURFACESHADER_TYPE)
            .group("pbr")
            .input("emission", Value::Float(1.0))
            .input("emission_color", Value::Color3(Vec3::ONE))
            .input("transmission", Value::Float(0.0))
            .input("transmission_color", Value::Color3(Vec3::ONE))
            .input("opacity", Value::Float(1.0)),
        NodeDef::new("ND_surfacematerial", "surfacematerial", MATERIAL_TYPE)
            .group("material")
            .input_type("surfaceshader", SURFACESHADER_TYPE)
            .input_type("backsurfaceshader", SURFACESHADER_TYPE)
            .input_type("displacementshader", "displacementshader"),
        image_inputs(
            NodeDef::multioutput(
                "ND_gltf_colorimage",
                "gltf_colorimage",
                &[("outcolor", COLOR3_TYPE), ("outa", FLOAT_TYPE)],
            )
            .group("texture2d"),
        )
        .input("color", Value::Color4(Vec4::ONE))
        .input("geomcolor", Value::Color4(Vec4::ONE))
        .input("default", Value::Color4(Vec4::ZERO)),
        image_inputs(
            NodeDef::new("ND_gltf_normalmap_vector3", "gltf_normalmap", VECTOR3_TYPE)
                .group("texture2d"),
        )
        .input("default", Value::Vector3(Vec3::new(0.5, 0.5, 1.0))),
        image_inputs(
            NodeDef::new(
                "ND_gltf_iridescence_thickness_float",
                "gltf_iridescence_thickness",
                FLOAT_TYPE,
            )
            .group("texture2d"),
        )
        .input("thicknessMin", Value::Float(100.0))
        .input("thicknessMax", Value::Float(400.0))
        .input("default", Value::Float(1.0)),
        NodeDef::new("ND_texcoord_vector2", "texcoord", VECTOR2_TYPE)
            .group("geometric")
            .input("index", Value::Integer(0)),
        NodeDef::new("ND_geomcolor_color4", "geomcolor", COLOR4_TYPE)
            .group("geometric")
            .input("index", Value::Integer(0)),
        NodeDef::new("ND_extract_vector3", "extract", FLOAT_TYPE)
            .group("channel")
            .input("in", Value::Vector3(Vec3::ZERO))
            .input("index", Value::Integer(0)),
        NodeDef::new("ND_normalmap", "normalmap", VECTOR3_TYPE)
            .group("math")
            .input("in", Value::Vector3(Vec3::new(0.5, 0.5, 1.0)))
            .input("scale", Value::Float(1.0)),
        NodeDef::new("ND_place2d_vector2", "place2d", VECTOR2_TYPE)
            .group("math")
            .input("texcoord", Value::Vector2(Vec2::ZERO))
            .input("pivot", Value::Vector2(Vec2::ZERO))
            .input("scale", Value::Vector2(Vec2::ONE))
            .input("rotate", Value::Float(0.0))
            .input("offset", Value::Vector2(Vec2::ZERO)),
        NodeDef::new("ND_checkerboard_color3", "checkerboard", COLOR3_TYPE)
            .group("texture2d")
            .input("color1", Value::Color3(Vec3::ONE))
            .input("color2", Value::Color3(Vec3::ZERO))
            .input("uvtiling", Value::Vector2(Vec2::splat(8.0)))
            .input("uvoffset", Value::Vector2(Vec2::ZERO))
            .input_type("texcoord", VECTOR2_TYPE),
        NodeDef::new("ND_mix_color3", "mix", COLOR3_TYPE)
            .group("compositing")
            .input("fg", Value::Color3(Vec3::ZERO))
            .input("bg", Value::Color3(Vec3::ZERO))
            .input("mix", Value::Float(0.0)),
    ];

    for def in [
        ("float", Value::Float(0.0)),
        ("color3", Value::Color3(Vec3::ZERO)),
        ("color4", Value::Color4(Vec4::ZERO)),
        ("vector3", Value::Vector3(Vec3::ZERO)),
    ]
    .iter()
    .map(|(type_name, zero)| {
        let def = NodeDef::new(&format!("ND_gltf_image_{type_name}"), "gltf_image", type_name);
        image_inputs(def.group("texture2d"))
            .input("factor", match zero {
                Value::Float(_) => Value::Float(1.0),
                Value::Color3(_) => Value::Color3(Vec3::ONE),
                Value::Color4(_) => Value::Color4(Vec4::ONE),
                _ => Value::Vector3(Vec3::ONE),
            })
            .input("default", zero.clone())
    }) {
        defs.push(def);
    }

    let scalar_types = [
        ("float", Value::Float(0.0)),
        ("color3", Value::Color3(Vec3::ZERO)),
        ("vector3", Value::Vector3(Vec3::ZERO)),
    ];
    defs.extend(typed_defs("image", &scalar_types, |def, zero| {
        def.group("texture2d")
            .input("file", Value::Filename(String::new()))
            .input("default", zero.clone())
            .input_type("texcoord", VECTOR2_TYPE)
            .input("uaddressmode", Value::String("periodic".into()))
            .input("vaddressmode", Value::String("periodic".into()))
            .input("filtertype", Value::String("linear".into()))
    }));
    defs.extend(typed_defs("constant", &scalar_types, |def, zero| {
        def.group("procedural").input("value", zero.clone())
    }));
    defs.extend(typed_defs("multiply", &scalar_types, |def, zero| {
        def.group("math").input("in1", zero.clone()).input("in2", zero.clone())
    }));
    defs.extend(typed_defs("add", &scalar_types, |def, zero| {
        def.group("math").input("in1", zero.clone()).input("in2", zero.clone())
    }));

    defs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_pbr_defaults() {
        let lib = Library::standard();
        let pbr = lib.find("gltf_pbr", SURFACESHADER_TYPE).unwrap();
        assert_eq!(pbr.name, "ND_gltf_pbr_surfaceshader");
        assert_eq!(pbr.default_value("metallic"), Some(&Value::Float(1.0)));
        assert_eq!(pbr.default_value("ior"), Some(&Value::Float(1.5)));
        assert_eq!(pbr.default_value("normal"), None);
        assert!(pbr.find_input("normal").is_some());
    }

    #[test]
    fn test_multioutput_types() {
        let lib = Library::standard();
        let image = lib.get("ND_gltf_colorimage").unwrap();
        assert_eq!(image.node_type, MULTIOUTPUT_TYPE);
        assert_eq!(image.output_type(Some("outa")).unwrap(), FLOAT_TYPE);
        assert!(image.output_type(None).is_err());
        assert!(matches!(
            image.output_type(Some("out")),
            Err(Error::UnknownOutput { .. })
        ));
    }

    #[test]
    fn test_typed_variants() {
        let lib = Library::standard();
        assert!(lib.find("gltf_image", FLOAT_TYPE).is_some());
        assert!(lib.find("gltf_image", VECTOR3_TYPE).is_some());
        assert_eq!(lib.find("multiply", COLOR3_TYPE).unwrap().name, "ND_multiply_color3");
        assert!(lib.find("gltf_image", MATRIX44_TYPE).is_none());
        assert!(matches!(
            lib.require("standard_surface", SURFACESHADER_TYPE),
            Err(Error::NodeDefNotFound(_))
        ));
    }

    #[test]
    fn test_merge_json() {
        let json = r#"[
            {"name": "ND_invert_float", "node": "invert", "type": "float",
             "inputs": [{"name": "in", "type": "float", "value": "0"},
                        {"name": "amount", "type": "float", "value": "1"}]}
        ]"#;
        let mut lib = Library::standard();
        let before = lib.len();
        lib.merge(Library::from_json(json).unwrap());
        assert_eq!(lib.len(), before + 1);

        let def = lib.find("invert", FLOAT_TYPE).unwrap();
        assert_eq!(def.default_value("amount"), Some(&Value::Float(1.0)));
        assert_eq!(def.outputs[0].name, "out");
    }

    #[test]
    fn test_load_missing_file() {
        let mut lib = Library::new();
        assert!(matches!(
            lib.load_json("/nonexistent/defs.json"),
            Err(Error::FileNotFound(_))
        ));
    }
}

//! Typed glTF 2.0 document with the material extensions the translators use.
//!
//! Every optional glTF field is an `Option`; collections default to empty and
//! are skipped on output when empty. Members the translators do not interpret
//! (accessors, buffers, animations, extras, other extensions) are kept in
//! flattened `other` maps and written back unchanged.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};

use crate::util::{Error, Result};

/// Unrecognized members, written back as read.
pub type Other = Map<String, Json>;

// ============================================================================
// Document
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Gltf {
    #[serde(default)]
    pub asset: Asset,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scene: Option<usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scenes: Vec<Scene>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nodes: Vec<Node>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub meshes: Vec<Mesh>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub materials: Vec<Material>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub textures: Vec<Texture>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<Image>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub samplers: Vec<Sampler>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extensions_used: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<RootExtensions>,
    #[serde(flatten)]
    pub other: Other,
}

impl Gltf {
    /// Parse a glTF JSON document.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| Error::InvalidGltf(e.to_string()))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(Error::FileNotFound(path.to_path_buf()));
        }
        Self::from_slice(&std::fs::read(path)?)
    }

    /// Pretty-printed JSON bytes.
    pub fn to_vec_pretty(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    pub fn write_file(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_vec_pretty()?)?;
        Ok(())
    }

    /// Record an extension name in `extensionsUsed` once.
    pub fn use_extension(&mut self, name: &str) {
        if !self.extensions_used.iter().any(|e| e == name) {
            self.extensions_used.push(name.to_string());
        }
    }

    /// Index of the default scene.
    pub fn default_scene(&self) -> usize {
        self.scene.unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copyright: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_version: Option<String>,
    #[serde(flatten)]
    pub other: Other,
}

impl Default for Asset {
    fn default() -> Self {
        Self {
            version: "2.0".to_string(),
            generator: None,
            copyright: None,
            min_version: None,
            other: Other::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RootExtensions {
    #[serde(rename = "KHR_procedurals", default, skip_serializing_if = "Option::is_none")]
    pub procedurals: Option<Procedurals>,
    #[serde(flatten)]
    pub other: Other,
}

// ============================================================================
// Scene graph
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nodes: Vec<usize>,
    #[serde(flatten)]
    pub other: Other,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Node {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mesh: Option<usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translation: Option<[f32; 3]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<[f32; 4]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<[f32; 3]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matrix: Option<[f32; 16]>,
    #[serde(flatten)]
    pub other: Other,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Mesh {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub primitives: Vec<Primitive>,
    #[serde(flatten)]
    pub other: Other,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Primitive {
    #[serde(default)]
    pub attributes: BTreeMap<String, usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indices: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub material: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<u32>,
    #[serde(flatten)]
    pub other: Other,
}

impl Primitive {
    /// Whether the primitive carries a per-vertex color stream.
    pub fn has_vertex_color(&self) -> bool {
        self.attributes.keys().any(|k| k.starts_with("COLOR"))
    }
}

// ============================================================================
// Textures
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Texture {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sampler: Option<usize>,
    #[serde(flatten)]
    pub other: Other,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buffer_view: Option<usize>,
    #[serde(flatten)]
    pub other: Other,
}

/// Texture sampler. Compared by content for deduplication.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sampler {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mag_filter: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_filter: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wrap_s: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wrap_t: Option<u32>,
}

/// Reference from a material slot to a texture.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextureInfo {
    pub index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tex_coord: Option<u32>,
    /// Normal texture scale.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<f32>,
    /// Occlusion texture strength.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strength: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<TextureInfoExtensions>,
}

impl TextureInfo {
    pub fn new(index: usize) -> Self {
        Self { index, ..Default::default() }
    }

    pub fn transform(&self) -> Option<&TextureTransform> {
        self.extensions.as_ref().and_then(|e| e.texture_transform.as_ref())
    }

    /// UV set, honoring a transform's override.
    pub fn uv_set(&self) -> u32 {
        self.transform()
            .and_then(|t| t.tex_coord)
            .or(self.tex_coord)
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextureInfoExtensions {
    #[serde(rename = "KHR_texture_transform", default, skip_serializing_if = "Option::is_none")]
    pub texture_transform: Option<TextureTransform>,
    #[serde(flatten)]
    pub other: Other,
}

/// `KHR_texture_transform`. Rotation is in radians.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextureTransform {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<[f32; 2]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<[f32; 2]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tex_coord: Option<u32>,
}

// ============================================================================
// Materials
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlphaMode {
    #[default]
    Opaque,
    Mask,
    Blend,
}

impl AlphaMode {
    /// Integer code used by the `alpha_mode` shader input.
    pub fn code(self) -> i32 {
        match self {
            AlphaMode::Opaque => 0,
            AlphaMode::Mask => 1,
            AlphaMode::Blend => 2,
        }
    }

    pub fn from_code(code: i32) -> Result<Self> {
        match code {
            0 => Ok(AlphaMode::Opaque),
            1 => Ok(AlphaMode::Mask),
            2 => Ok(AlphaMode::Blend),
            _ => Err(Error::UnknownAlphaMode(code)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Material {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pbr_metallic_roughness: Option<PbrMetallicRoughness>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normal_texture: Option<TextureInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occlusion_texture: Option<TextureInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emissive_texture: Option<TextureInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emissive_factor: Option<[f32; 3]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alpha_mode: Option<AlphaMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alpha_cutoff: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub double_sided: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<MaterialExtensions>,
    #[serde(flatten)]
    pub other: Other,
}

impl Material {
    pub fn pbr(&self) -> Option<&PbrMetallicRoughness> {
        self.pbr_metallic_roughness.as_ref()
    }

    pub fn ext(&self) -> Option<&MaterialExtensions> {
        self.extensions.as_ref()
    }

    pub fn is_unlit(&self) -> bool {
        self.ext().is_some_and(|e| e.unlit.is_some())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PbrMetallicRoughness {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_color_factor: Option<[f32; 4]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_color_texture: Option<TextureInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metallic_factor: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roughness_factor: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metallic_roughness_texture: Option<TextureInfo>,
}

impl PbrMetallicRoughness {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Material extensions understood by the translators.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MaterialExtensions {
    #[serde(rename = "KHR_materials_unlit", default, skip_serializing_if = "Option::is_none")]
    pub unlit: Option<Unlit>,
    #[serde(rename = "KHR_materials_ior", default, skip_serializing_if = "Option::is_none")]
    pub ior: Option<Ior>,
    #[serde(rename = "KHR_materials_specular", default, skip_serializing_if = "Option::is_none")]
    pub specular: Option<Specular>,
    #[serde(
        rename = "KHR_materials_transmission",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub transmission: Option<Transmission>,
    #[serde(rename = "KHR_materials_iridescence", default, skip_serializing_if = "Option::is_none")]
    pub iridescence: Option<Iridescence>,
    #[serde(
        rename = "KHR_materials_emissive_strength",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub emissive_strength: Option<EmissiveStrength>,
    #[serde(rename = "KHR_materials_volume", default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<Volume>,
    #[serde(rename = "KHR_materials_clearcoat", default, skip_serializing_if = "Option::is_none")]
    pub clearcoat: Option<Clearcoat>,
    #[serde(rename = "KHR_materials_sheen", default, skip_serializing_if = "Option::is_none")]
    pub sheen: Option<Sheen>,
    /// Slot name (e.g. `baseColorTexture`) to procedural output record.
    #[serde(rename = "KHR_procedurals", default, skip_serializing_if = "Option::is_none")]
    pub procedurals: Option<BTreeMap<String, ProceduralRef>>,
    #[serde(flatten)]
    pub other: Other,
}

impl MaterialExtensions {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

pub const KHR_MATERIALS_UNLIT: &str = "KHR_materials_unlit";
pub const KHR_MATERIALS_IOR: &str = "KHR_materials_ior";
pub const KHR_MATERIALS_SPECULAR: &str = "KHR_materials_specular";
pub const KHR_MATERIALS_TRANSMISSION: &str = "KHR_materials_transmission";
pub const KHR_MATERIALS_IRIDESCENCE: &str = "KHR_materials_iridescence";
pub const KHR_MATERIALS_EMISSIVE_STRENGTH: &str = "KHR_materials_emissive_strength";
pub const KHR_MATERIALS_VOLUME: &str = "KHR_materials_volume";
pub const KHR_MATERIALS_CLEARCOAT: &str = "KHR_materials_clearcoat";
pub const KHR_MATERIALS_SHEEN: &str = "KHR_materials_sheen";
pub const KHR_TEXTURE_TRANSFORM: &str = "KHR_texture_transform";
pub const KHR_PROCEDURALS: &str = "KHR_procedurals";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Unlit {}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ior {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ior: Option<f32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Specular {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specular_factor: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specular_texture: Option<TextureInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specular_color_factor: Option<[f32; 3]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specular_color_texture: Option<TextureInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transmission {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transmission_factor: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transmission_texture: Option<TextureInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Iridescence {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iridescence_factor: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iridescence_texture: Option<TextureInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iridescence_ior: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iridescence_thickness_minimum: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iridescence_thickness_maximum: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iridescence_thickness_texture: Option<TextureInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmissiveStrength {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emissive_strength: Option<f32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Volume {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thickness_factor: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thickness_texture: Option<TextureInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attenuation_distance: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attenuation_color: Option<[f32; 3]>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Clearcoat {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clearcoat_factor: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clearcoat_texture: Option<TextureInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clearcoat_roughness_factor: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clearcoat_roughness_texture: Option<TextureInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clearcoat_normal_texture: Option<TextureInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sheen {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sheen_color_factor: Option<[f32; 3]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sheen_color_texture: Option<TextureInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sheen_roughness_factor: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sheen_roughness_texture: Option<TextureInfo>,
}

// ============================================================================
// KHR_procedurals
// ============================================================================

/// Root `KHR_procedurals` extension: the flattened node record array.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Procedurals {
    #[serde(default)]
    pub procedurals: Vec<ProceduralNodeRecord>,
}

/// Material slot reference to a procedural record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProceduralRef {
    pub index: usize,
}

/// One serialized node, graph input or graph output.
///
/// Cross references (`procedural`) are indices into the same record array.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProceduralNodeRecord {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nodetype: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub value_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Json>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub texture: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub procedural: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<ProceduralInput>,
    #[serde(flatten)]
    pub attributes: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProceduralInput {
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub value_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Json>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub texture: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub procedural: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

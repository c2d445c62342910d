//! Property mapping between glTF material fields and shader node inputs.
//!
//! [`GraphBuilder`] reads glTF properties into shader inputs and image nodes;
//! [`FlatBuilder`] writes shader inputs back as factors, texture infos,
//! samplers and procedural references. In both directions a texture wins
//! over a constant.

use std::collections::{BTreeMap, HashMap};

use glam::{Vec2, Vec3, Vec4};

use super::options::MtlxToGltfOptions;
use super::procedural::{serialize_graph, TextureSink};
use crate::gltf::*;
use crate::mtlx::*;
use crate::util::{ConversionLog, Error, Result};

// ============================================================================
// Sampler and transform tables
// ============================================================================

pub const FILTER_NEAREST: u32 = 9728;
pub const FILTER_LINEAR: u32 = 9729;
pub const FILTER_NEAREST_MIPMAP_NEAREST: u32 = 9984;
pub const FILTER_LINEAR_MIPMAP_NEAREST: u32 = 9985;
pub const FILTER_NEAREST_MIPMAP_LINEAR: u32 = 9986;
pub const FILTER_LINEAR_MIPMAP_LINEAR: u32 = 9987;

pub const WRAP_CLAMP_TO_EDGE: u32 = 33071;
pub const WRAP_MIRRORED_REPEAT: u32 = 33648;
pub const WRAP_REPEAT: u32 = 10497;

/// glTF filter code to `filtertype`.
pub fn filter_to_mtlx(field: &'static str, code: u32) -> Result<&'static str> {
    match code {
        FILTER_NEAREST | FILTER_NEAREST_MIPMAP_NEAREST => Ok("closest"),
        FILTER_LINEAR | FILTER_LINEAR_MIPMAP_NEAREST | FILTER_NEAREST_MIPMAP_LINEAR => Ok("linear"),
        FILTER_LINEAR_MIPMAP_LINEAR => Ok("cubic"),
        _ => Err(Error::UnknownSamplerCode { field, code }),
    }
}

/// `filtertype` to glTF minification filter code.
pub fn filter_to_gltf(mode: &str) -> Result<u32> {
    match mode {
        "closest" => Ok(FILTER_NEAREST),
        "linear" => Ok(FILTER_LINEAR),
        "cubic" => Ok(FILTER_LINEAR_MIPMAP_LINEAR),
        _ => Err(Error::UnknownSamplerMode { field: "filtertype", mode: mode.to_string() }),
    }
}

/// glTF wrap code to address mode.
pub fn wrap_to_mtlx(field: &'static str, code: u32) -> Result<&'static str> {
    match code {
        WRAP_CLAMP_TO_EDGE => Ok("clamp"),
        WRAP_MIRRORED_REPEAT => Ok("mirror"),
        WRAP_REPEAT => Ok("periodic"),
        _ => Err(Error::UnknownSamplerCode { field, code }),
    }
}

/// Address mode to glTF wrap code.
pub fn wrap_to_gltf(field: &'static str, mode: &str) -> Result<u32> {
    match mode {
        "clamp" => Ok(WRAP_CLAMP_TO_EDGE),
        "mirror" => Ok(WRAP_MIRRORED_REPEAT),
        "periodic" => Ok(WRAP_REPEAT),
        _ => Err(Error::UnknownSamplerMode { field, mode: mode.to_string() }),
    }
}

/// glTF rotation (radians, counter-clockwise UV) to `rotate` (degrees, clockwise).
pub fn rotation_to_degrees(radians: f32) -> f32 {
    -radians.to_degrees()
}

/// `rotate` (degrees, clockwise) to glTF rotation (radians, counter-clockwise UV).
pub fn rotation_to_radians(degrees: f32) -> f32 {
    -degrees.to_radians()
}

const EPSILON: f32 = 1e-6;

// ============================================================================
// glTF -> graph
// ============================================================================

/// Resolved texture reference, looked up before any node is created.
struct ResolvedImage<'g> {
    uri: &'g str,
    uv_set: u32,
    transform: Option<&'g TextureTransform>,
    filter: Option<&'static str>,
    uaddress: Option<&'static str>,
    vaddress: Option<&'static str>,
}

/// Builds shader inputs and image nodes from glTF material properties.
pub(crate) struct GraphBuilder<'g> {
    pub doc: Document,
    pub gltf: &'g Gltf,
    pub log: ConversionLog,
    /// Material being translated, for log context.
    pub current: String,
}

impl<'g> GraphBuilder<'g> {
    pub fn new(gltf: &'g Gltf, library: Library, verbose: bool) -> Self {
        Self {
            doc: Document::new(library),
            gltf,
            log: ConversionLog::new(verbose),
            current: String::new(),
        }
    }

    fn resolve_image(&self, info: &'g TextureInfo) -> Result<ResolvedImage<'g>> {
        let gltf = self.gltf;
        let texture_index = Error::check_index("textures", info.index, gltf.textures.len())?;
        let texture = &gltf.textures[texture_index];
        let source = texture.source.ok_or_else(|| {
            Error::InvalidGltf(format!("texture {} has no image source", info.index))
        })?;
        let image = &gltf.images[Error::check_index("images", source, gltf.images.len())?];
        let uri = image
            .uri
            .as_deref()
            .ok_or_else(|| Error::InvalidGltf(format!("image {source} has no uri")))?;

        let mut resolved = ResolvedImage {
            uri,
            uv_set: info.uv_set(),
            transform: info.transform(),
            filter: None,
            uaddress: None,
            vaddress: None,
        };
        if let Some(sampler) = texture.sampler {
            let sampler_index = Error::check_index("samplers", sampler, gltf.samplers.len())?;
            let sampler = &gltf.samplers[sampler_index];
            if let Some(code) = sampler.mag_filter {
                resolved.filter = Some(filter_to_mtlx("magFilter", code)?);
            }
            if let Some(code) = sampler.min_filter {
                resolved.filter = Some(filter_to_mtlx("minFilter", code)?);
            }
            resolved.uaddress = sampler.wrap_s.map(|c| wrap_to_mtlx("wrapS", c)).transpose()?;
            resolved.vaddress = sampler.wrap_t.map(|c| wrap_to_mtlx("wrapT", c)).transpose()?;
        }
        Ok(resolved)
    }

    /// Create an image node for a texture info, with UV set, transform and
    /// sampler settings applied.
    pub fn add_image(
        &mut self,
        name: &str,
        category: &str,
        node_type: &str,
        info: &'g TextureInfo,
        colorspace: Option<&str>,
    ) -> Result<NodeId> {
        let resolved = self.resolve_image(info)?;
        let doc = &mut self.doc;
        let image = doc.add_node(category, name, node_type)?;
        doc.set_input_value(image, "file", Value::Filename(resolved.uri.to_string()))?;
        if let Some(colorspace) = colorspace {
            doc.set_colorspace(image, "file", colorspace)?;
        }

        if resolved.uv_set != 0 {
            let texcoord_name = format!("texcoord_{}", doc.node(image).name);
            let texcoord = doc.add_node("texcoord", &texcoord_name, VECTOR2_TYPE)?;
            doc.set_input_value(texcoord, "index", Value::Integer(resolved.uv_set as i32))?;
            doc.connect(image, "texcoord", Connection::node(texcoord))?;
        }
        if let Some(transform) = resolved.transform {
            if let Some(offset) = transform.offset {
                doc.set_input_value(image, "offset", Value::Vector2(Vec2::from(offset)))?;
            }
            if let Some(rotation) = transform.rotation {
                doc.set_input_value(image, "rotate", Value::Float(rotation_to_degrees(rotation)))?;
            }
            if let Some(scale) = transform.scale {
                doc.set_input_value(image, "scale", Value::Vector2(Vec2::from(scale)))?;
            }
        }
        for (input, mode) in [
            ("filtertype", resolved.filter),
            ("uaddressmode", resolved.uaddress),
            ("vaddressmode", resolved.vaddress),
        ] {
            if let Some(mode) = mode {
                doc.set_input_value(image, input, Value::String(mode.to_string()))?;
            }
        }
        Ok(image)
    }

    /// Keep going without the texture when its reference cannot be resolved.
    pub fn texture_or_warn<T>(&mut self, input: &str, result: Result<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                self.log.warn(format!("{}: texture for '{input}' skipped: {e}", self.current));
                None
            }
        }
    }

    /// Scalar property: texture through `gltf_image`, otherwise the constant.
    pub fn read_float(
        &mut self,
        shader: NodeId,
        input: &str,
        texture: Option<&'g TextureInfo>,
        factor: Option<f32>,
        image_name: &str,
    ) -> Result<()> {
        if let Some(info) = texture {
            let image = self.add_image(image_name, "gltf_image", FLOAT_TYPE, info, None);
            if let Some(image) = self.texture_or_warn(input, image) {
                if let Some(factor) = factor.filter(|f| (f - 1.0).abs() > EPSILON) {
                    self.doc.set_input_value(image, "factor", Value::Float(factor))?;
                }
                return self.doc.connect(shader, input, Connection::node(image));
            }
        }
        if let Some(factor) = factor {
            self.doc.set_input_value(shader, input, Value::Float(factor))?;
        }
        Ok(())
    }

    /// Color property with optional alpha: texture through `gltf_colorimage`,
    /// otherwise the constants. Returns the image node when one was created.
    pub fn read_color(
        &mut self,
        shader: NodeId,
        input: &str,
        alpha_input: Option<&str>,
        texture: Option<&'g TextureInfo>,
        factor: Option<Vec4>,
        image_name: &str,
    ) -> Result<Option<NodeId>> {
        if let Some(info) = texture {
            let image = self.add_image(
                image_name,
                "gltf_colorimage",
                MULTIOUTPUT_TYPE,
                info,
                Some(SRGB_TEXTURE),
            );
            if let Some(image) = self.texture_or_warn(input, image) {
                if let Some(factor) = factor.filter(|f| !f.abs_diff_eq(Vec4::ONE, EPSILON)) {
                    self.doc.set_input_value(image, "color", Value::Color4(factor))?;
                }
                self.doc.connect(shader, input, Connection::node_output(image, "outcolor"))?;
                if let Some(alpha) = alpha_input {
                    self.doc.connect(shader, alpha, Connection::node_output(image, "outa"))?;
                }
                return Ok(Some(image));
            }
        }
        if let Some(factor) = factor {
            self.doc.set_input_value(shader, input, Value::Color3(factor.truncate()))?;
            if let Some(alpha) = alpha_input {
                self.doc.set_input_value(shader, alpha, Value::Float(factor.w))?;
            }
        }
        Ok(None)
    }

    /// Normal map texture through `gltf_normalmap`.
    pub fn read_normal(
        &mut self,
        shader: NodeId,
        input: &str,
        texture: Option<&'g TextureInfo>,
        image_name: &str,
    ) -> Result<()> {
        if let Some(info) = texture {
            let image = self.add_image(image_name, "gltf_normalmap", VECTOR3_TYPE, info, None);
            if let Some(image) = self.texture_or_warn(input, image) {
                self.doc.connect(shader, input, Connection::node(image))?;
            }
        }
        Ok(())
    }

    /// Feed `input` from one channel of a vector image.
    pub fn extract(
        &mut self,
        shader: NodeId,
        input: &str,
        image: NodeId,
        channel: usize,
    ) -> Result<()> {
        let extract = self.doc.add_node("extract", &format!("extract_{input}"), FLOAT_TYPE)?;
        self.doc.connect(extract, "in", Connection::node(image))?;
        self.doc.set_input_value(extract, "index", Value::Integer(channel as i32))?;
        self.doc.connect(shader, input, Connection::node(extract))
    }

    pub fn set_float(&mut self, shader: NodeId, input: &str, value: Option<f32>) -> Result<()> {
        match value {
            Some(v) => self.doc.set_input_value(shader, input, Value::Float(v)),
            None => Ok(()),
        }
    }

    pub fn set_color(
        &mut self,
        shader: NodeId,
        input: &str,
        value: Option<[f32; 3]>,
    ) -> Result<()> {
        match value {
            Some(v) => self.doc.set_input_value(shader, input, Value::Color3(Vec3::from(v))),
            None => Ok(()),
        }
    }
}

/// Extend an RGB factor with opaque alpha.
pub(crate) fn rgb_factor(rgb: Option<[f32; 3]>) -> Option<Vec4> {
    rgb.map(|c| Vec3::from(c).extend(1.0))
}

// ============================================================================
// graph -> glTF
// ============================================================================

/// What drives a shader input.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Source {
    /// Unset and unconnected.
    None,
    /// Constant set on the shader.
    Constant(Value),
    /// Image node with a file, read through an optional channel extract.
    Image { node: NodeId, file: String, channel: usize },
    /// Color image without a file; only its color factor applies.
    Tint { node: NodeId },
    /// Node graph output to serialize as a procedural.
    Procedural { graph: GraphId, output: String },
    /// Connected, but to something without a glTF equivalent.
    Unmapped(String),
}

/// Scalar slot on the glTF side.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct FloatProperty {
    pub texture: Option<TextureInfo>,
    pub factor: Option<f32>,
}

/// Color slot on the glTF side.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct ColorProperty {
    pub texture: Option<TextureInfo>,
    pub factor: Option<[f32; 3]>,
}

/// Writes shader inputs into a glTF document.
pub(crate) struct FlatBuilder<'d> {
    pub doc: &'d Document,
    pub options: &'d MtlxToGltfOptions,
    pub gltf: Gltf,
    pub log: ConversionLog,
    /// Material being translated, for log context.
    pub current: String,
    procedural_slots: BTreeMap<String, ProceduralRef>,
    serialized_graphs: HashMap<GraphId, HashMap<String, usize>>,
}

impl<'d> FlatBuilder<'d> {
    pub fn new(doc: &'d Document, options: &'d MtlxToGltfOptions, gltf: Gltf) -> Self {
        Self {
            doc,
            options,
            gltf,
            log: ConversionLog::new(options.verbose),
            current: String::new(),
            procedural_slots: BTreeMap::new(),
            serialized_graphs: HashMap::new(),
        }
    }

    pub fn warn(&mut self, message: impl std::fmt::Display) {
        self.log.warn(format!("{}: {message}", self.current));
    }

    /// Non-empty `file` value of an image node.
    pub fn image_file(&self, node: NodeId) -> Option<String> {
        self.doc
            .input_value(node, "file")
            .and_then(Value::as_str)
            .filter(|f| !f.is_empty())
            .map(str::to_string)
    }

    /// Classify what drives `input`, reading past channel extracts and normal maps.
    pub fn source(&self, node: NodeId, input: &str) -> Source {
        let doc = self.doc;
        let Some(connection) = doc.connection(node, input) else {
            return match doc.input_value(node, input) {
                Some(value) => Source::Constant(value.clone()),
                None => Source::None,
            };
        };
        if let Connection::Graph { graph, output } = connection {
            if self.options.create_procedural_textures {
                return Source::Procedural { graph: *graph, output: output.clone() };
            }
        }
        let Some(mut upstream) = doc.connected_node(node, input) else {
            return Source::Unmapped(format!("'{input}' is not driven by a node"));
        };

        let mut channel = 0;
        let category = doc.node(upstream).category.clone();
        if category == "extract" || category == "normalmap" {
            if category == "extract" {
                channel = doc
                    .effective_value(upstream, "index")
                    .and_then(|v| v.as_integer())
                    .unwrap_or(0)
                    .max(0) as usize;
            }
            match doc.connected_node(upstream, "in") {
                Some(inner) => upstream = inner,
                None => {
                    return Source::Unmapped(format!("'{input}' reads an unconnected {category}"));
                }
            }
        }

        match self.image_file(upstream) {
            Some(file) => Source::Image { node: upstream, file, channel },
            None if doc.node(upstream).category == "gltf_colorimage" => {
                Source::Tint { node: upstream }
            }
            None => Source::Unmapped(format!(
                "'{input}' is driven by '{}' ({}) which has no glTF mapping",
                doc.name_path(upstream),
                doc.node(upstream).category
            )),
        }
    }

    /// Constant to emit for an input, honoring default suppression.
    pub fn constant(&self, node: NodeId, input: &str) -> Option<Value> {
        let default = self.doc.default_value(node, input);
        let write_defaults = self.options.write_default_inputs;
        match self.doc.input_value(node, input) {
            Some(value) => {
                let is_default = default.is_some_and(|d| value.approx_eq(d, EPSILON));
                (write_defaults || !is_default).then(|| value.clone())
            }
            None if write_defaults && self.doc.connection(node, input).is_none() => {
                default.cloned()
            }
            None => None,
        }
    }

    /// Instance value that differs from the definition default, regardless of options.
    fn changed(&self, node: NodeId, input: &str) -> Option<Value> {
        let value = self.doc.input_value(node, input)?;
        match self.doc.default_value(node, input) {
            Some(default) if value.approx_eq(default, EPSILON) => None,
            _ => Some(value.clone()),
        }
    }

    fn sampler_for(&self, image: NodeId) -> Result<Option<Sampler>> {
        let mode = |input: &str| self.doc.input_value(image, input).and_then(Value::as_str);
        let (u, v, filter) = (mode("uaddressmode"), mode("vaddressmode"), mode("filtertype"));
        if u.is_none() && v.is_none() && filter.is_none() {
            return Ok(None);
        }
        let wrap_s = u.map(|m| wrap_to_gltf("uaddressmode", m)).transpose()?;
        let wrap_t = v.map(|m| wrap_to_gltf("vaddressmode", m)).transpose()?;
        Ok(Some(Sampler {
            mag_filter: Some(FILTER_LINEAR),
            min_filter: filter.map(filter_to_gltf).transpose()?,
            wrap_s: Some(wrap_s.unwrap_or(WRAP_REPEAT)),
            wrap_t: Some(wrap_t.unwrap_or(WRAP_REPEAT)),
        }))
    }

    fn transform_for(&self, image: NodeId) -> Option<TextureTransform> {
        let offset = self.changed(image, "offset").and_then(|v| v.as_vec2());
        let rotation = self.changed(image, "rotate").and_then(|v| v.as_float());
        let scale = self.changed(image, "scale").and_then(|v| v.as_vec2());
        if offset.is_none() && rotation.is_none() && scale.is_none() {
            return None;
        }
        Some(TextureTransform {
            offset: offset.map(|v| v.to_array()),
            rotation: rotation.map(rotation_to_radians),
            scale: scale.map(|v| v.to_array()),
            tex_coord: None,
        })
    }

    fn tex_coord_for(&self, image: NodeId) -> Option<u32> {
        let texcoord = self.doc.connected_node(image, "texcoord")?;
        if self.doc.node(texcoord).category != "texcoord" {
            return None;
        }
        self.doc
            .effective_value(texcoord, "index")
            .and_then(|v| v.as_integer())
            .filter(|index| *index > 0)
            .map(|index| index as u32)
    }

    /// Reuse an identical sampler or append a new one.
    pub fn add_sampler(&mut self, sampler: Sampler) -> usize {
        match self.gltf.samplers.iter().position(|s| *s == sampler) {
            Some(index) => index,
            None => {
                self.gltf.samplers.push(sampler);
                self.gltf.samplers.len() - 1
            }
        }
    }

    /// Append image and texture entries for a file, taking sampler, UV set
    /// and transform from the image node when there is one.
    pub fn add_texture(
        &mut self,
        name: &str,
        uri: &str,
        image: Option<NodeId>,
    ) -> Result<TextureInfo> {
        let (sampler, transform, tex_coord) = match image {
            Some(node) => (
                self.sampler_for(node)?,
                self.transform_for(node),
                self.tex_coord_for(node),
            ),
            None => (None, None, None),
        };

        self.gltf.images.push(Image {
            name: Some(name.to_string()),
            uri: Some(uri.to_string()),
            ..Default::default()
        });
        let source = self.gltf.images.len() - 1;
        let sampler = sampler.map(|s| self.add_sampler(s));
        self.gltf.textures.push(Texture {
            name: Some(name.to_string()),
            source: Some(source),
            sampler,
            ..Default::default()
        });

        let mut info = TextureInfo::new(self.gltf.textures.len() - 1);
        info.tex_coord = tex_coord;
        if let Some(transform) = transform {
            info.extensions = Some(TextureInfoExtensions {
                texture_transform: Some(transform),
                ..Default::default()
            });
            self.gltf.use_extension(KHR_TEXTURE_TRANSFORM);
        }
        Ok(info)
    }

    /// Texture for an image node, logging instead of failing.
    pub fn image_texture(&mut self, node: NodeId, file: &str) -> Option<TextureInfo> {
        let name = self.doc.name_path(node);
        match self.add_texture(&name, file, Some(node)) {
            Ok(info) => Some(info),
            Err(e) => {
                self.warn(format_args!("texture '{name}' skipped: {e}"));
                None
            }
        }
    }

    /// Scalar input as a texture or factor.
    pub fn float_property(&mut self, shader: NodeId, input: &str, slot: &str) -> FloatProperty {
        match self.source(shader, input) {
            Source::Image { node, file, .. } => FloatProperty {
                texture: self.image_texture(node, &file),
                factor: self.changed(node, "factor").and_then(|v| v.as_float()),
            },
            Source::Procedural { graph, output } => {
                self.add_procedural(slot, graph, &output);
                FloatProperty::default()
            }
            Source::Tint { .. } => FloatProperty::default(),
            Source::Unmapped(reason) => {
                self.warn(reason);
                FloatProperty::default()
            }
            Source::Constant(_) | Source::None => FloatProperty {
                texture: None,
                factor: self.constant(shader, input).and_then(|v| v.as_float()),
            },
        }
    }

    /// Color input as a texture or factor.
    pub fn color_property(&mut self, shader: NodeId, input: &str, slot: &str) -> ColorProperty {
        match self.source(shader, input) {
            Source::Image { node, file, .. } => ColorProperty {
                texture: self.image_texture(node, &file),
                factor: self
                    .changed(node, "color")
                    .and_then(|v| v.as_vec4())
                    .map(|v| v.truncate().to_array()),
            },
            Source::Procedural { graph, output } => {
                self.add_procedural(slot, graph, &output);
                ColorProperty::default()
            }
            Source::Tint { node } => ColorProperty {
                texture: None,
                factor: self
                    .changed(node, "color")
                    .and_then(|v| v.as_vec4())
                    .map(|v| v.truncate().to_array()),
            },
            Source::Unmapped(reason) => {
                self.warn(reason);
                ColorProperty::default()
            }
            Source::Constant(_) | Source::None => ColorProperty {
                texture: None,
                factor: self
                    .constant(shader, input)
                    .and_then(|v| v.as_vec3())
                    .map(|v| v.to_array()),
            },
        }
    }

    /// Color plus alpha input pair as a texture and/or RGBA factor.
    pub fn color_alpha_property(
        &mut self,
        shader: NodeId,
        input: &str,
        alpha_input: &str,
        slot: &str,
    ) -> (Option<TextureInfo>, Option<[f32; 4]>) {
        match self.source(shader, input) {
            Source::Image { node, file, .. } => {
                let texture = self.image_texture(node, &file);
                (texture, self.tint(node))
            }
            Source::Tint { node } => (None, self.tint(node)),
            source => {
                match source {
                    Source::Procedural { graph, output } => {
                        self.add_procedural(slot, graph, &output)
                    }
                    Source::Unmapped(reason) => self.warn(reason),
                    _ => {}
                }
                let color = self.constant(shader, input).and_then(|v| v.as_vec3());
                let alpha = self.constant(shader, alpha_input).and_then(|v| v.as_float());
                if color.is_none() && alpha.is_none() {
                    return (None, None);
                }
                let doc = self.doc;
                let color = color
                    .or_else(|| doc.effective_value(shader, input).and_then(|v| v.as_vec3()))
                    .unwrap_or(Vec3::ONE);
                let alpha = alpha
                    .or_else(|| doc.effective_value(shader, alpha_input).and_then(|v| v.as_float()))
                    .unwrap_or(1.0);
                (None, Some(color.extend(alpha).to_array()))
            }
        }
    }

    /// RGBA multiplier authored on a color image node.
    fn tint(&self, image: NodeId) -> Option<[f32; 4]> {
        self.changed(image, "color").and_then(|v| v.as_vec4()).map(|v| v.to_array())
    }

    /// Normal map input as a texture.
    pub fn normal_property(&mut self, shader: NodeId, input: &str) -> Option<TextureInfo> {
        match self.source(shader, input) {
            Source::Image { node, file, .. } => self.image_texture(node, &file),
            Source::Unmapped(reason) => {
                self.warn(reason);
                None
            }
            _ => None,
        }
    }

    // ---- procedurals -------------------------------------------------------

    fn procedural_records(&mut self) -> &mut Vec<ProceduralNodeRecord> {
        &mut self
            .gltf
            .extensions
            .get_or_insert_with(Default::default)
            .procedurals
            .get_or_insert_with(Default::default)
            .procedurals
    }

    /// Serialize a node graph once and bind `slot` to the record of `output`.
    pub fn add_procedural(&mut self, slot: &str, graph: GraphId, output: &str) {
        if !self.serialized_graphs.contains_key(&graph) {
            let doc = self.doc;
            let base = self.procedural_records().len();
            match serialize_graph(doc, graph, base, self) {
                Ok(serialized) => {
                    self.log.info(format!(
                        "Serialized node graph '{}' as {} procedural records",
                        doc.graph(graph).name,
                        serialized.records.len()
                    ));
                    self.procedural_records().extend(serialized.records);
                    self.serialized_graphs.insert(graph, serialized.outputs);
                    self.gltf.use_extension(KHR_PROCEDURALS);
                }
                Err(e) => {
                    let name = &doc.graph(graph).name;
                    self.warn(format_args!("node graph '{name}' not serialized: {e}"));
                    return;
                }
            }
        }
        match self.serialized_graphs.get(&graph).and_then(|outputs| outputs.get(output)) {
            Some(&index) => {
                self.procedural_slots.insert(slot.to_string(), ProceduralRef { index });
            }
            None => self.warn(format_args!("node graph output '{output}' not found")),
        }
    }

    /// Procedural slot bindings collected for the current material.
    pub fn take_procedural_slots(&mut self) -> Option<BTreeMap<String, ProceduralRef>> {
        let slots = std::mem::take(&mut self.procedural_slots);
        (!slots.is_empty()).then_some(slots)
    }
}

impl TextureSink for FlatBuilder<'_> {
    fn add_texture(&mut self, name: &str, uri: &str, image: Option<NodeId>) -> Result<usize> {
        FlatBuilder::add_texture(self, name, uri, image).map(|info| info.index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_tables_round_trip() {
        for mode in ["closest", "linear", "cubic"] {
            let code = filter_to_gltf(mode).unwrap();
            assert_eq!(filter_to_mtlx("minFilter", code).unwrap(), mode);
        }
        assert_eq!(filter_to_mtlx("minFilter", FILTER_NEAREST_MIPMAP_LINEAR).unwrap(), "linear");
        assert!(matches!(
            filter_to_mtlx("magFilter", 1234),
            Err(Error::UnknownSamplerCode { field: "magFilter", code: 1234 })
        ));
        assert!(filter_to_gltf("bilinear").is_err());
    }

    #[test]
    fn test_wrap_tables_round_trip() {
        for code in [WRAP_CLAMP_TO_EDGE, WRAP_MIRRORED_REPEAT, WRAP_REPEAT] {
            let mode = wrap_to_mtlx("wrapS", code).unwrap();
            assert_eq!(wrap_to_gltf("uaddressmode", mode).unwrap(), code);
        }
        assert!(wrap_to_mtlx("wrapT", 0).is_err());
        assert!(matches!(
            wrap_to_gltf("vaddressmode", "constant"),
            Err(Error::UnknownSamplerMode { .. })
        ));
    }

    #[test]
    fn test_rotation_sign_and_unit() {
        let degrees = rotation_to_degrees(std::f32::consts::FRAC_PI_2);
        assert!((degrees + 90.0).abs() < 1e-4);
        let radians = rotation_to_radians(-90.0);
        assert!((radians - std::f32::consts::FRAC_PI_2).abs() < 1e-6);
    }

    #[test]
    fn test_sampler_dedup() {
        let doc = Document::with_standard_library();
        let options = MtlxToGltfOptions::default();
        let mut builder = FlatBuilder::new(&doc, &options, Gltf::default());
        let sampler = Sampler { wrap_s: Some(WRAP_REPEAT), ..Default::default() };
        assert_eq!(builder.add_sampler(sampler), 0);
        assert_eq!(builder.add_sampler(Sampler::default()), 1);
        assert_eq!(builder.add_sampler(sampler), 0);
        assert_eq!(builder.gltf.samplers.len(), 2);
    }

    #[test]
    fn test_constant_suppression() {
        let mut doc = Document::with_standard_library();
        let shader = doc.add_node(GLTF_PBR, "s", SURFACESHADER_TYPE).unwrap();
        doc.set_input_value(shader, "ior", Value::Float(1.5)).unwrap();
        doc.set_input_value(shader, "metallic", Value::Float(0.2)).unwrap();

        let options = MtlxToGltfOptions::default();
        let builder = FlatBuilder::new(&doc, &options, Gltf::default());
        assert_eq!(builder.constant(shader, "ior"), None);
        assert_eq!(builder.constant(shader, "metallic"), Some(Value::Float(0.2)));
        assert_eq!(builder.constant(shader, "roughness"), None);

        let options = MtlxToGltfOptions { write_default_inputs: true, ..Default::default() };
        let builder = FlatBuilder::new(&doc, &options, Gltf::default());
        assert_eq!(builder.constant(shader, "ior"), Some(Value::Float(1.5)));
        assert_eq!(builder.constant(shader, "roughness"), Some(Value::Float(1.0)));
    }

    #[test]
    fn test_source_reads_past_extract() {
        let mut doc = Document::with_standard_library();
        let shader = doc.add_node(GLTF_PBR, "s", SURFACESHADER_TYPE).unwrap();
        let image = doc.add_node("gltf_image", "image_orm", VECTOR3_TYPE).unwrap();
        doc.set_input_value(image, "file", Value::Filename("orm.png".into())).unwrap();
        let extract = doc.add_node("extract", "extract_metallic", FLOAT_TYPE).unwrap();
        doc.connect(extract, "in", Connection::node(image)).unwrap();
        doc.set_input_value(extract, "index", Value::Integer(2)).unwrap();
        doc.connect(shader, "metallic", Connection::node(extract)).unwrap();
        let checker = doc.add_node("constant", "c", FLOAT_TYPE).unwrap();
        doc.connect(shader, "roughness", Connection::node(checker)).unwrap();

        let options = MtlxToGltfOptions::default();
        let builder = FlatBuilder::new(&doc, &options, Gltf::default());
        assert_eq!(
            builder.source(shader, "metallic"),
            Source::Image { node: image, file: "orm.png".into(), channel: 2 }
        );
        assert!(matches!(builder.source(shader, "roughness"), Source::Unmapped(_)));
        assert_eq!(builder.source(shader, "ior"), Source::None);
    }
}

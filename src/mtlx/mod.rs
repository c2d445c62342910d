//! Shading graph document model.
//!
//! ## Key Concepts
//!
//! - **Library**: Node definitions with typed inputs, defaults and outputs
//! - **Document**: Arena of nodes, node graphs and looks addressed by handles
//! - **Connection**: Input wired to a node output, a node graph output or a
//!   node graph interface input
//! - **Look**: Material to geometry-path bindings
//!
//! ## Example
//!
//! ```ignore
//! use mtlx_gltf::mtlx::{Document, Connection, Value, SURFACESHADER_TYPE, MATERIAL_TYPE};
//!
//! let mut doc = Document::with_standard_library();
//! let shader = doc.add_node("gltf_pbr", "red", SURFACESHADER_TYPE)?;
//! doc.set_input_value(shader, "metallic", Value::Float(0.0))?;
//! let material = doc.add_node("surfacematerial", "MAT_red", MATERIAL_TYPE)?;
//! doc.connect(material, "surfaceshader", Connection::node(shader))?;
//! println!("{}", mtlx_gltf::mtlx::json::to_string(&doc)?);
//! ```

mod document;
mod library;
mod value;
pub mod json;

pub use document::*;
pub use library::*;
pub use value::*;

/// glTF metallic-roughness shader category.
pub const GLTF_PBR: &str = "gltf_pbr";
/// Unlit shader category.
pub const SURFACE_UNLIT: &str = "surface_unlit";
/// Material node category.
pub const SURFACE_MATERIAL: &str = "surfacematerial";

/// Colorspace tag for color textures.
pub const SRGB_TEXTURE: &str = "srgb_texture";

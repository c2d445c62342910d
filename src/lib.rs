//! # mtlx-gltf
//!
//! Bidirectional translation between glTF 2.0 materials and MaterialX
//! shading graphs.
//!
//! glTF stores materials as property bags with a fixed extension vocabulary;
//! MaterialX stores them as graphs of typed nodes. The forward direction
//! builds `gltf_pbr` / `surface_unlit` shaders with image nodes upstream of
//! their inputs. The reverse direction flattens shaders back into factors,
//! textures and `KHR_materials_*` extensions, packs metallic, roughness and
//! occlusion into one texture, and serializes graphs without a fixed mapping
//! into `KHR_procedurals`.
//!
//! ## Modules
//!
//! - [`util`] - Errors, conversion log, search paths
//! - [`mtlx`] - Shading graph document, node definitions and values
//! - [`gltf`] - Typed glTF schema, geometry paths, per-material expansion
//! - [`convert`] - The two translators and their helpers
//!
//! ## Example
//!
//! ```ignore
//! use mtlx_gltf::convert::{gltf_to_mtlx, mtlx_to_gltf, GltfToMtlxOptions, MtlxToGltfOptions};
//!
//! let bytes = std::fs::read("model.gltf")?;
//! let graph = gltf_to_mtlx(&bytes, &GltfToMtlxOptions::default())?;
//! print!("{}", graph.log);
//!
//! let flat = mtlx_to_gltf(&graph.output, None, &MtlxToGltfOptions::default())?;
//! flat.output.write_file("materials.gltf")?;
//! ```

pub mod util;
pub mod mtlx;
pub mod gltf;
pub mod convert;

// Re-export commonly used types
pub use util::{ConversionLog, Error, Result, SearchPath};
pub use convert::{gltf_to_mtlx, mtlx_to_gltf, Conversion, GltfToMtlxOptions, MtlxToGltfOptions};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::util::{ConversionLog, Error, Result, SearchPath};
    pub use crate::mtlx::{Connection, Document, Library, NodeId, Value};
    pub use crate::gltf::{Gltf, Material, ScenePaths};
    pub use crate::convert::{
        gltf_to_mtlx, mtlx_to_gltf, mtlx_to_gltf_bytes, Conversion, GltfToMtlxOptions,
        MtlxToGltfOptions,
    };
}

//! Material translation in both directions.
//!
//! - [`gltf_to_mtlx`] - glTF materials to shader nodes, image nodes and a look
//! - [`mtlx_to_gltf`] - Shader nodes back to glTF materials, textures and
//!   extensions, with channel packing and the procedural fallback
//!
//! Each call takes its options by value and returns a [`Conversion`] holding
//! the output and the call's own [`ConversionLog`](crate::util::ConversionLog).

mod forward;
mod mapper;
mod options;
mod reverse;
pub mod packer;
pub mod procedural;

pub use forward::{convert_gltf, gltf_to_mtlx, LOOK_NAME};
pub use mapper::{
    filter_to_gltf, filter_to_mtlx, rotation_to_degrees, rotation_to_radians, wrap_to_gltf,
    wrap_to_mtlx, FILTER_LINEAR, FILTER_LINEAR_MIPMAP_LINEAR, FILTER_LINEAR_MIPMAP_NEAREST,
    FILTER_NEAREST, FILTER_NEAREST_MIPMAP_LINEAR, FILTER_NEAREST_MIPMAP_NEAREST,
    WRAP_CLAMP_TO_EDGE, WRAP_MIRRORED_REPEAT, WRAP_REPEAT,
};
pub use options::{load_options, Conversion, GltfToMtlxOptions, MtlxToGltfOptions};
pub use reverse::{generator, mtlx_to_gltf, mtlx_to_gltf_bytes};

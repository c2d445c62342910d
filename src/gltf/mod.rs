//! glTF side of the translation.
//!
//! - [`schema`] - Typed document, material extensions and `KHR_procedurals`
//! - [`paths`] - Geometry paths used as material assignment keys
//! - [`expand`] - Per-material geometry duplication

pub mod expand;
pub mod paths;
pub mod schema;

pub use expand::create_prims_for_materials;
pub use paths::{GeometryPath, ScenePaths};
pub use schema::*;

//! One primitive per material: duplicates the base geometry for every extra
//! material and lays the copies out on a grid.

use super::schema::{Gltf, Node};

/// Distance between grid cells.
pub const GRID_SPACING: f32 = 2.5;

/// Integer square root of the material count, at least 1.
pub fn default_row_count(materials: usize) -> usize {
    ((materials as f64).sqrt().floor() as usize).max(1)
}

/// Grid cell of the `index`-th material, row-major.
pub fn grid_position(index: usize, row_count: usize) -> [f32; 3] {
    let row_count = row_count.max(1);
    let column = index % row_count;
    let row = index / row_count;
    [column as f32 * GRID_SPACING, row as f32 * GRID_SPACING, 0.0]
}

/// Copy every mesh once per material beyond the first.
///
/// Copy `k` binds all its primitives to material `k` and hangs off a new
/// root node in the default scene at grid cell `k`; the originals occupy
/// cell 0. Returns the number of nodes added. Documents with fewer than two
/// materials, or without meshes, nodes or scenes, are left untouched.
pub fn create_prims_for_materials(gltf: &mut Gltf, row_count: Option<usize>) -> usize {
    let material_count = gltf.materials.len();
    let has_geometry = !gltf.meshes.is_empty() && !gltf.nodes.is_empty() && !gltf.scenes.is_empty();
    if material_count <= 1 || !has_geometry {
        return 0;
    }
    let row_count = row_count.unwrap_or_else(|| default_row_count(material_count));
    let scene = gltf.default_scene().min(gltf.scenes.len() - 1);
    let base_meshes = gltf.meshes.len();
    let mut added = 0;

    for material in 1..material_count {
        let translation = grid_position(material, row_count);
        for mesh_index in 0..base_meshes {
            let mut mesh = gltf.meshes[mesh_index].clone();
            let base_name = mesh
                .name
                .clone()
                .unwrap_or_else(|| format!("{}{mesh_index}", super::paths::MESH_PREFIX));
            let name = format!("{base_name}_material_{material}");
            mesh.name = Some(name.clone());
            for primitive in &mut mesh.primitives {
                primitive.material = Some(material);
            }
            gltf.meshes.push(mesh);

            gltf.nodes.push(Node {
                name: Some(name),
                mesh: Some(gltf.meshes.len() - 1),
                translation: Some(translation),
                ..Default::default()
            });
            gltf.scenes[scene].nodes.push(gltf.nodes.len() - 1);
            added += 1;
        }
    }

    tracing::debug!(material_count, row_count, added, "expanded geometry per material");
    added
}

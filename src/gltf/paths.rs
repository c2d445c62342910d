//! Geometry paths: stable `/node/.../mesh[/PRIMITIVE_i]` names for primitives.
//!
//! Paths are the keys that bind graph-side material assignments to flat-side
//! primitives. Unnamed nodes and meshes get `NODE_<n>` / `MESH_<n>` with a
//! running index; the primitive segment is only added when a mesh has more
//! than one primitive.

use std::collections::{BTreeSet, HashMap};

use super::schema::Gltf;
use crate::mtlx::create_valid_name;

pub const NODE_PREFIX: &str = "NODE_";
pub const MESH_PREFIX: &str = "MESH_";
pub const PRIMITIVE_PREFIX: &str = "PRIMITIVE_";

/// One primitive reached from a scene root.
#[derive(Debug, Clone, PartialEq)]
pub struct GeometryPath {
    pub path: String,
    pub mesh: usize,
    pub primitive: usize,
    /// Material index assigned on the primitive.
    pub material: Option<usize>,
    /// Primitive has a `COLOR_n` attribute.
    pub vertex_color: bool,
}

/// All primitive paths of a document with a path lookup index.
#[derive(Debug, Clone, Default)]
pub struct ScenePaths {
    paths: Vec<GeometryPath>,
    index: HashMap<String, usize>,
}

struct Walker<'a> {
    gltf: &'a Gltf,
    node_count: usize,
    mesh_count: usize,
    visiting: Vec<bool>,
    paths: Vec<GeometryPath>,
}

impl Walker<'_> {
    fn visit(&mut self, node_index: usize, parent: &str) {
        let gltf = self.gltf;
        let Some(node) = gltf.nodes.get(node_index) else {
            tracing::debug!(node_index, "skipping missing node");
            return;
        };
        if self.visiting[node_index] {
            tracing::debug!(node_index, "skipping node cycle");
            return;
        }
        self.visiting[node_index] = true;

        let name = match &node.name {
            Some(name) => create_valid_name(name),
            None => {
                let name = format!("{NODE_PREFIX}{}", self.node_count);
                self.node_count += 1;
                name
            }
        };
        let path = format!("{parent}/{name}");

        let mesh = node.mesh.and_then(|m| gltf.meshes.get(m).map(|mesh| (m, mesh)));
        if let Some((mesh_index, mesh)) = mesh {
            let mesh_name = match &mesh.name {
                Some(name) => create_valid_name(name),
                None => {
                    let name = format!("{MESH_PREFIX}{}", self.mesh_count);
                    self.mesh_count += 1;
                    name
                }
            };
            let mesh_path = format!("{path}/{mesh_name}");
            let multiple = mesh.primitives.len() > 1;
            for (i, primitive) in mesh.primitives.iter().enumerate() {
                let path = if multiple {
                    format!("{mesh_path}/{PRIMITIVE_PREFIX}{i}")
                } else {
                    mesh_path.clone()
                };
                self.paths.push(GeometryPath {
                    path,
                    mesh: mesh_index,
                    primitive: i,
                    material: primitive.material,
                    vertex_color: primitive.has_vertex_color(),
                });
            }
        }

        for &child in &node.children {
            self.visit(child, &path);
        }
        self.visiting[node_index] = false;
    }
}

impl ScenePaths {
    /// Walk every scene from its root nodes.
    pub fn build(gltf: &Gltf) -> Self {
        let mut walker = Walker {
            gltf,
            node_count: 0,
            mesh_count: 0,
            visiting: vec![false; gltf.nodes.len()],
            paths: Vec::new(),
        };
        for scene in &gltf.scenes {
            for &root in &scene.nodes {
                walker.visit(root, "");
            }
        }

        let mut index = HashMap::with_capacity(walker.paths.len());
        for (i, path) in walker.paths.iter().enumerate() {
            index.entry(path.path.clone()).or_insert(i);
        }
        Self { paths: walker.paths, index }
    }

    pub fn iter(&self) -> impl Iterator<Item = &GeometryPath> {
        self.paths.iter()
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Exact path lookup.
    pub fn find(&self, path: &str) -> Option<&GeometryPath> {
        self.index.get(path).map(|&i| &self.paths[i])
    }

    /// Paths of every primitive using a material, in traversal order.
    pub fn paths_for_material(&self, material: usize) -> Vec<&str> {
        self.paths
            .iter()
            .filter(|p| p.material == Some(material))
            .map(|p| p.path.as_str())
            .collect()
    }

    /// Materials used by at least one primitive with vertex colors.
    pub fn vertex_color_materials(&self) -> BTreeSet<usize> {
        self.paths
            .iter()
            .filter(|p| p.vertex_color)
            .filter_map(|p| p.material)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gltf::schema::*;

    fn primitive(material: Option<usize>) -> Primitive {
        Primitive { material, ..Default::default() }
    }

    fn two_primitive_scene() -> Gltf {
        Gltf {
            scenes: vec![Scene { nodes: vec![0], ..Default::default() }],
            nodes: vec![Node { name: Some("N".into()), mesh: Some(0), ..Default::default() }],
            meshes: vec![Mesh {
                name: Some("M".into()),
                primitives: vec![primitive(Some(0)), primitive(Some(1))],
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_multi_primitive_paths() {
        let paths = ScenePaths::build(&two_primitive_scene());
        let names: Vec<_> = paths.iter().map(|p| p.path.as_str()).collect();
        assert_eq!(names, vec!["/N/M/PRIMITIVE_0", "/N/M/PRIMITIVE_1"]);
        assert_eq!(paths.find("/N/M/PRIMITIVE_1").unwrap().primitive, 1);
        assert!(paths.find("/N/M").is_none());
    }

    #[test]
    fn test_single_primitive_uses_mesh_path() {
        let mut gltf = two_primitive_scene();
        gltf.meshes[0].primitives.truncate(1);
        let paths = ScenePaths::build(&gltf);
        assert_eq!(paths.iter().next().unwrap().path, "/N/M");
    }

    #[test]
    fn test_generated_names_and_children() {
        let gltf = Gltf {
            scenes: vec![Scene { nodes: vec![0, 2], ..Default::default() }],
            nodes: vec![
                Node { children: vec![1], ..Default::default() },
                Node { name: Some("leaf.001".into()), mesh: Some(0), ..Default::default() },
                Node { mesh: Some(1), ..Default::default() },
            ],
            meshes: vec![
                Mesh { primitives: vec![primitive(Some(0))], ..Default::default() },
                Mesh { primitives: vec![primitive(Some(0))], ..Default::default() },
            ],
            ..Default::default()
        };
        let paths = ScenePaths::build(&gltf);
        let names: Vec<_> = paths.iter().map(|p| p.path.as_str()).collect();
        assert_eq!(names, vec!["/NODE_0/leaf_001/MESH_0", "/NODE_1/MESH_1"]);
        assert_eq!(paths.paths_for_material(0).len(), 2);
    }

    #[test]
    fn test_cycles_and_missing_indices() {
        let gltf = Gltf {
            scenes: vec![Scene { nodes: vec![0, 7], ..Default::default() }],
            nodes: vec![
                Node { name: Some("a".into()), children: vec![1], ..Default::default() },
                Node {
                    name: Some("b".into()),
                    children: vec![0],
                    mesh: Some(3),
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        assert!(ScenePaths::build(&gltf).is_empty());
    }

    #[test]
    fn test_vertex_color_materials() {
        let mut gltf = two_primitive_scene();
        gltf.meshes[0].primitives[1].attributes.insert("COLOR_0".into(), 3);
        let paths = ScenePaths::build(&gltf);
        assert_eq!(paths.vertex_color_materials().into_iter().collect::<Vec<_>>(), vec![1]);
    }
}

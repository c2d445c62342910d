//! Node graph to `KHR_procedurals` serialization.
//!
//! A graph becomes a flat run of records appended to the document-wide
//! procedural array: one per node, then one per interface input, then one
//! per output. Connections between them are stored as absolute indices
//! into that array.

use std::collections::HashMap;

use serde_json::Value as Json;

use crate::gltf::{ProceduralInput, ProceduralNodeRecord};
use crate::mtlx::*;
use crate::util::{Error, Result};

/// Editor-only attributes that are not carried into records.
const SKIPPED_ATTRIBUTES: [&str; 3] = ["uiname", "xpos", "ypos"];

/// Receives file references found while serializing.
pub trait TextureSink {
    /// Create a texture for `uri` and return its index. `image` is the node
    /// holding the reference, when there is one.
    fn add_texture(&mut self, name: &str, uri: &str, image: Option<NodeId>) -> Result<usize>;
}

/// Records of one graph plus the absolute index of each output record.
#[derive(Debug, Clone, Default)]
pub struct SerializedGraph {
    pub records: Vec<ProceduralNodeRecord>,
    pub outputs: HashMap<String, usize>,
}

/// Constant as a JSON scalar, number array, bool or string.
pub fn value_to_json(value: &Value) -> Json {
    let text = value.to_value_string();
    let type_name = value.type_name();
    if !is_numeric_type(type_name) {
        return match value {
            Value::Boolean(b) => Json::Bool(*b),
            _ => Json::String(text),
        };
    }

    let parts: Vec<&str> = text.split(',').map(str::trim).collect();
    if parts.len() > 1 {
        return Json::Array(
            parts
                .iter()
                .filter_map(|p| p.parse::<f64>().ok())
                .map(Json::from)
                .collect(),
        );
    }
    if type_name == INTEGER_TYPE {
        if let Ok(i) = parts[0].parse::<i64>() {
            return Json::from(i);
        }
    }
    match parts[0].parse::<f64>() {
        Ok(f) => Json::from(f),
        Err(_) => Json::String(text),
    }
}

/// Serialize `graph` into records whose indices start at `base`.
pub fn serialize_graph(
    doc: &Document,
    graph: GraphId,
    base: usize,
    sink: &mut dyn TextureSink,
) -> Result<SerializedGraph> {
    let node_graph = doc.graph(graph);
    let mut records = Vec::new();
    let mut node_index: HashMap<NodeId, usize> = HashMap::new();
    let mut input_index: HashMap<&str, usize> = HashMap::new();
    let mut outputs = HashMap::new();

    for &node in &node_graph.nodes {
        node_index.insert(node, base + records.len());
        let n = doc.node(node);
        records.push(ProceduralNodeRecord {
            name: doc.name_path(node),
            nodetype: Some(n.category.clone()),
            value_type: Some(n.node_type.clone()),
            attributes: n
                .attributes
                .iter()
                .filter(|(k, _)| !SKIPPED_ATTRIBUTES.contains(&k.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            ..Default::default()
        });
    }

    for input in &node_graph.inputs {
        let name = format!("{}/{}", node_graph.name, input.name);
        let mut record = ProceduralNodeRecord {
            name: name.clone(),
            nodetype: Some("input".to_string()),
            value_type: Some(input.type_name.clone()),
            ..Default::default()
        };
        match &input.value {
            Some(Value::Filename(file)) if !file.is_empty() => {
                record.texture = Some(sink.add_texture(&name, file, None)?);
            }
            Some(Value::Filename(_)) | None => {}
            Some(value) => record.value = Some(value_to_json(value)),
        }
        input_index.insert(input.name.as_str(), base + records.len());
        records.push(record);
    }

    let resolve = |connection: &Connection| -> Result<(usize, Option<String>)> {
        match connection {
            Connection::Node { node, output } => node_index
                .get(node)
                .map(|&i| (i, output.clone()))
                .ok_or_else(|| {
                    let path = doc.name_path(*node);
                    Error::invalid(format!("'{path}' is outside the node graph"))
                }),
            Connection::Interface(name) => input_index
                .get(name.as_str())
                .map(|&i| (i, None))
                .ok_or_else(|| Error::ElementNotFound(format!("{}/{name}", node_graph.name))),
            Connection::Graph { graph, .. } => Err(Error::invalid(format!(
                "nested node graph '{}' is not supported",
                doc.graph(*graph).name
            ))),
        }
    };

    for output in &node_graph.outputs {
        let mut record = ProceduralNodeRecord {
            name: format!("{}/{}", node_graph.name, output.name),
            nodetype: Some("output".to_string()),
            value_type: Some(output.type_name.clone()),
            ..Default::default()
        };
        if let Some(connection) = &output.connection {
            let (target, out) = resolve(connection)?;
            record.procedural = Some(target);
            record.output = out;
        }
        outputs.insert(output.name.clone(), base + records.len());
        records.push(record);
    }

    for &node in &node_graph.nodes {
        let record_index = node_index[&node] - base;
        for input in &doc.node(node).inputs {
            let mut entry = ProceduralInput {
                name: input.name.clone(),
                value_type: Some(input.type_name.clone()),
                ..Default::default()
            };
            match (&input.connection, &input.value) {
                (Some(connection), _) => {
                    let (target, out) = resolve(connection)?;
                    entry.procedural = Some(target);
                    entry.output = out;
                }
                (None, Some(Value::Filename(file))) if !file.is_empty() => {
                    entry.texture = Some(sink.add_texture(&doc.name_path(node), file, Some(node))?);
                }
                (None, Some(Value::Filename(_))) | (None, None) => {}
                (None, Some(value)) => entry.value = Some(value_to_json(value)),
            }
            records[record_index].inputs.push(entry);
        }
    }

    Ok(SerializedGraph { records, outputs })
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;

    #[derive(Default)]
    struct Textures(Vec<String>);

    impl TextureSink for Textures {
        fn add_texture(&mut self, _name: &str, uri: &str, _image: Option<NodeId>) -> Result<usize> {
            self.0.push(uri.to_string());
            Ok(self.0.len() - 1)
        }
    }

    /// Five nodes, two interface inputs, one output driven by the fourth node.
    fn checker_graph(doc: &mut Document) -> GraphId {
        let graph = doc.add_node_graph("NG_checker");
        let tint = Some(Value::Color3(Vec3::new(1.0, 0.5, 0.25)));
        doc.add_graph_input(graph, "tint", COLOR3_TYPE, tint).unwrap();
        doc.add_graph_input(graph, "mask", FILENAME_TYPE, Some(Value::Filename("mask.png".into())))
            .unwrap();

        let texcoord = doc.add_graph_node(graph, "texcoord", "texcoord", VECTOR2_TYPE).unwrap();
        let checker = doc.add_graph_node(graph, "checkerboard", "checker", COLOR3_TYPE).unwrap();
        let mix = doc.add_graph_node(graph, "mix", "mix", COLOR3_TYPE).unwrap();
        let multiply = doc.add_graph_node(graph, "multiply", "tinted", COLOR3_TYPE).unwrap();
        let image = doc.add_graph_node(graph, "image", "mask_image", FLOAT_TYPE).unwrap();

        doc.connect(checker, "texcoord", Connection::node(texcoord)).unwrap();
        doc.connect(image, "file", Connection::Interface("mask".into())).unwrap();
        doc.connect(mix, "fg", Connection::node(checker)).unwrap();
        doc.connect(mix, "mix", Connection::node(image)).unwrap();
        doc.connect(multiply, "in1", Connection::node(mix)).unwrap();
        doc.connect(multiply, "in2", Connection::Interface("tint".into())).unwrap();
        doc.set_input_value(checker, "uvtiling", Value::Vector2(glam::Vec2::splat(4.0))).unwrap();
        doc.node_mut(checker).attributes.insert("xpos".into(), "3.5".into());

        doc.add_graph_output(graph, "out", COLOR3_TYPE).unwrap();
        doc.connect_graph_output(graph, "out", Connection::node(multiply)).unwrap();
        graph
    }

    #[test]
    fn test_record_layout() {
        let mut doc = Document::with_standard_library();
        let graph = checker_graph(&mut doc);
        let mut sink = Textures::default();
        let serialized = serialize_graph(&doc, graph, 0, &mut sink).unwrap();

        assert_eq!(serialized.records.len(), 8);
        let kinds: Vec<_> = serialized
            .records
            .iter()
            .map(|r| r.nodetype.as_deref().unwrap())
            .collect();
        assert_eq!(
            kinds,
            vec!["texcoord", "checkerboard", "mix", "multiply", "image", "input", "input", "output"]
        );

        let output = &serialized.records[7];
        assert_eq!(serialized.outputs["out"], 7);
        assert_eq!(output.procedural, Some(3));
        assert_eq!(serialized.records[3].name, "NG_checker/tinted");

        assert_eq!(sink.0, vec!["mask.png".to_string()]);
        assert_eq!(serialized.records[6].texture, Some(0));
        assert_eq!(serialized.records[5].value, Some(serde_json::json!([1.0, 0.5, 0.25])));
        assert!(serialized.records[1].attributes.is_empty());
    }

    #[test]
    fn test_input_links_use_absolute_indices() {
        let mut doc = Document::with_standard_library();
        let graph = checker_graph(&mut doc);
        let serialized = serialize_graph(&doc, graph, 10, &mut Textures::default()).unwrap();

        let multiply = &serialized.records[3];
        let in1 = multiply.inputs.iter().find(|i| i.name == "in1").unwrap();
        let in2 = multiply.inputs.iter().find(|i| i.name == "in2").unwrap();
        assert_eq!(in1.procedural, Some(12));
        assert_eq!(in2.procedural, Some(15));
        assert_eq!(serialized.outputs["out"], 17);
        assert_eq!(serialized.records[7].procedural, Some(13));

        let checker = &serialized.records[1];
        let tiling = checker.inputs.iter().find(|i| i.name == "uvtiling").unwrap();
        assert_eq!(tiling.value, Some(serde_json::json!([4.0, 4.0])));
    }

    #[test]
    fn test_value_to_json() {
        assert_eq!(value_to_json(&Value::Integer(3)), serde_json::json!(3));
        assert_eq!(value_to_json(&Value::Float(0.5)), serde_json::json!(0.5));
        assert_eq!(value_to_json(&Value::Boolean(true)), serde_json::json!(true));
        assert_eq!(value_to_json(&Value::String("clamp".into())), serde_json::json!("clamp"));
    }
}

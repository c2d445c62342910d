//! MaterialX JSON document form.
//!
//! ```text
//! { "materialx": {
//!     "version": "1.39",
//!     "gltf_pbr:red": { "type": "surfaceshader", "nodedef": "ND_gltf_pbr_surfaceshader",
//!                       "input:metallic": { "type": "float", "value": "0.5" } },
//!     "nodegraph:NG": { "input:tint": {...}, "multiply:m": {...}, "output:out": {...} },
//!     "look:look": { "materialassign:MAT_red": { "material": "MAT_red", "geom": "/N/M" } } } }
//! ```
//!
//! Attributes are strings; child elements are objects keyed `category:name`.

use std::path::Path;

use serde_json::{Map, Value as Json};

use super::document::*;
use super::library::Library;
use super::value::Value;
use crate::util::{Error, Result};

pub const ROOT_KEY: &str = "materialx";

// ============================================================================
// Writing
// ============================================================================

fn input_json(doc: &Document, input: &Input) -> Map<String, Json> {
    let mut obj = Map::new();
    obj.insert("type".into(), Json::String(input.type_name.clone()));
    if let Some(value) = &input.value {
        obj.insert("value".into(), Json::String(value.to_value_string()));
    }
    match &input.connection {
        Some(Connection::Node { node, output }) => {
            obj.insert("nodename".into(), Json::String(doc.node(*node).name.clone()));
            if let Some(output) = output {
                obj.insert("output".into(), Json::String(output.clone()));
            }
        }
        Some(Connection::Graph { graph, output }) => {
            obj.insert("nodegraph".into(), Json::String(doc.graph(*graph).name.clone()));
            obj.insert("output".into(), Json::String(output.clone()));
        }
        Some(Connection::Interface(name)) => {
            obj.insert("interfacename".into(), Json::String(name.clone()));
        }
        None => {}
    }
    if let Some(colorspace) = &input.colorspace {
        obj.insert("colorspace".into(), Json::String(colorspace.clone()));
    }
    obj
}

fn node_json(doc: &Document, id: NodeId) -> (String, Json) {
    let node = doc.node(id);
    let mut obj = Map::new();
    obj.insert("type".into(), Json::String(node.node_type.clone()));
    obj.insert("nodedef".into(), Json::String(node.nodedef.clone()));
    for (key, value) in &node.attributes {
        obj.insert(key.clone(), Json::String(value.clone()));
    }
    for input in &node.inputs {
        obj.insert(format!("input:{}", input.name), Json::Object(input_json(doc, input)));
    }
    (format!("{}:{}", node.category, node.name), Json::Object(obj))
}

fn graph_json(doc: &Document, id: GraphId) -> (String, Json) {
    let graph = doc.graph(id);
    let mut obj = Map::new();
    for input in &graph.inputs {
        obj.insert(format!("input:{}", input.name), Json::Object(input_json(doc, input)));
    }
    for node in &graph.nodes {
        let (key, value) = node_json(doc, *node);
        obj.insert(key, value);
    }
    for output in &graph.outputs {
        let as_input = Input {
            name: output.name.clone(),
            type_name: output.type_name.clone(),
            value: None,
            connection: output.connection.clone(),
            colorspace: None,
        };
        obj.insert(format!("output:{}", output.name), Json::Object(input_json(doc, &as_input)));
    }
    (format!("nodegraph:{}", graph.name), Json::Object(obj))
}

fn look_json(look: &Look) -> (String, Json) {
    let mut obj = Map::new();
    for assign in &look.assigns {
        let mut a = Map::new();
        a.insert("material".into(), Json::String(assign.material.clone()));
        a.insert("geom".into(), Json::String(assign.geom.clone()));
        obj.insert(format!("materialassign:{}", assign.name), Json::Object(a));
    }
    (format!("look:{}", look.name), Json::Object(obj))
}

/// Convert a document to its JSON form.
pub fn to_json(doc: &Document) -> Json {
    let mut root = Map::new();
    root.insert("version".into(), Json::String(doc.version().to_string()));
    for child in doc.children() {
        let (key, value) = match *child {
            Element::Node(id) => node_json(doc, id),
            Element::Graph(id) => graph_json(doc, id),
            Element::Look(id) => look_json(doc.look(id)),
        };
        root.insert(key, value);
    }
    let mut top = Map::new();
    top.insert(ROOT_KEY.into(), Json::Object(root));
    Json::Object(top)
}

/// Pretty-printed JSON text.
pub fn to_string(doc: &Document) -> Result<String> {
    Ok(serde_json::to_string_pretty(&to_json(doc))?)
}

pub fn write_file(doc: &Document, path: impl AsRef<Path>) -> Result<()> {
    std::fs::write(path, to_string(doc)?)?;
    Ok(())
}

// ============================================================================
// Reading
// ============================================================================

fn split_key(key: &str) -> Result<(&str, &str)> {
    key.split_once(':')
        .filter(|(category, name)| !category.is_empty() && !name.is_empty())
        .ok_or_else(|| Error::invalid(format!("element key '{key}' is not 'category:name'")))
}

fn attr<'a>(obj: &'a Map<String, Json>, key: &str) -> Option<&'a str> {
    obj.get(key).and_then(Json::as_str)
}

fn children(obj: &Map<String, Json>) -> impl Iterator<Item = (&String, &Map<String, Json>)> {
    obj.iter().filter_map(|(k, v)| v.as_object().map(|o| (k, o)))
}

fn invalid_name(name: &str) -> Error {
    Error::invalid(format!("duplicate or invalid element name '{name}'"))
}

fn parse_value(type_name: &str, obj: &Map<String, Json>) -> Result<Option<Value>> {
    attr(obj, "value").map(|text| Value::parse(type_name, text)).transpose()
}

fn create_node(
    doc: &mut Document,
    category: &str,
    name: &str,
    obj: &Map<String, Json>,
    graph: Option<GraphId>,
) -> Result<NodeId> {
    let nodedef = match attr(obj, "nodedef") {
        Some(def) => def.to_string(),
        None => {
            let node_type = attr(obj, "type")
                .ok_or_else(|| Error::invalid(format!("node '{name}' has no type")))?;
            doc.library().require(category, node_type)?.name.clone()
        }
    };
    let id = doc.add_node_with_def(&nodedef, name, graph)?;
    for (key, value) in obj {
        if let (Some(text), false) = (value.as_str(), matches!(key.as_str(), "type" | "nodedef")) {
            doc.node_mut(id).attributes.insert(key.clone(), text.to_string());
        }
    }
    Ok(id)
}

fn resolve_connection(
    doc: &Document,
    scope: Option<GraphId>,
    obj: &Map<String, Json>,
) -> Result<Option<Connection>> {
    let output = attr(obj, "output").filter(|o| !o.is_empty()).map(str::to_string);
    if let Some(name) = attr(obj, "nodename").filter(|n| !n.is_empty()) {
        let node = match scope {
            Some(graph) => doc.find_graph_node(graph, name),
            None => doc.find_node(name),
        }
        .ok_or_else(|| Error::ElementNotFound(name.to_string()))?;
        return Ok(Some(Connection::Node { node, output }));
    }
    if let Some(name) = attr(obj, "nodegraph").filter(|n| !n.is_empty()) {
        let graph = doc
            .find_graph(name)
            .ok_or_else(|| Error::ElementNotFound(name.to_string()))?;
        let output = match output {
            Some(output) => output,
            None => doc
                .graph(graph)
                .outputs
                .first()
                .map(|o| o.name.clone())
                .ok_or_else(|| Error::invalid(format!("nodegraph '{name}' has no outputs")))?,
        };
        return Ok(Some(Connection::Graph { graph, output }));
    }
    if let Some(name) = attr(obj, "interfacename").filter(|n| !n.is_empty()) {
        return Ok(Some(Connection::Interface(name.to_string())));
    }
    Ok(None)
}

fn read_node_inputs(doc: &mut Document, id: NodeId, obj: &Map<String, Json>) -> Result<()> {
    let scope = doc.node(id).graph;
    for (key, input) in children(obj) {
        let (category, name) = split_key(key)?;
        if category != "input" {
            continue;
        }
        let resolved = match resolve_connection(doc, scope, input) {
            Err(Error::ElementNotFound(target)) => {
                let path = doc.name_path(id);
                doc.record_load_issue(format!(
                    "{path}: input '{name}' references missing element '{target}'"
                ));
                continue;
            }
            other => other?,
        };
        if let Some(connection) = resolved {
            doc.connect(id, name, connection)?;
        } else {
            let type_name = match attr(input, "type") {
                Some(t) => t.to_string(),
                None => doc
                    .nodedef(id)?
                    .find_input(name)
                    .map(|i| i.type_name.clone())
                    .ok_or_else(|| Error::UnknownInput {
                        nodedef: doc.node(id).nodedef.clone(),
                        input: name.to_string(),
                    })?,
            };
            match parse_value(&type_name, input)? {
                Some(value) => doc.set_input_value(id, name, value)?,
                None => continue,
            }
        }
        if let Some(colorspace) = attr(input, "colorspace") {
            doc.set_colorspace(id, name, colorspace)?;
        }
    }
    Ok(())
}

/// Build a document from its JSON form, resolving definitions against `library`.
pub fn from_json(json: &Json, library: Library) -> Result<Document> {
    let root = json
        .get(ROOT_KEY)
        .and_then(Json::as_object)
        .ok_or_else(|| Error::invalid(format!("missing '{ROOT_KEY}' root object")))?;

    let mut doc = Document::new(library);
    if let Some(version) = attr(root, "version") {
        doc.set_version(version);
    }

    // Elements first, so connections can refer forward
    let mut nodes = Vec::new();
    let mut outputs = Vec::new();
    for (key, obj) in children(root) {
        let (category, name) = split_key(key)?;
        match category {
            "nodegraph" => {
                if doc.create_valid_child_name(name) != name {
                    return Err(invalid_name(name));
                }
                let graph = doc.add_node_graph(name);
                for (child_key, child) in children(obj) {
                    let (child_category, child_name) = split_key(child_key)?;
                    let type_name = attr(child, "type")
                        .ok_or_else(|| {
                            Error::invalid(format!("'{name}/{child_name}' has no type"))
                        })?;
                    match child_category {
                        "input" => {
                            let value = parse_value(type_name, child)?;
                            doc.add_graph_input(graph, child_name, type_name, value)?;
                            if let Some(colorspace) = attr(child, "colorspace") {
                                doc.set_graph_input_colorspace(graph, child_name, colorspace)?;
                            }
                        }
                        "output" => {
                            doc.add_graph_output(graph, child_name, type_name)?;
                            outputs.push((graph, child_name, child));
                        }
                        _ => {
                            let id = create_node(
                                &mut doc,
                                child_category,
                                child_name,
                                child,
                                Some(graph),
                            )?;
                            nodes.push((id, child));
                        }
                    }
                }
            }
            "look" => {
                if doc.create_valid_child_name(name) != name {
                    return Err(invalid_name(name));
                }
                let look = doc.add_look(name);
                for (child_key, child) in children(obj) {
                    let (child_category, child_name) = split_key(child_key)?;
                    if child_category == "materialassign" {
                        let material = attr(child, "material").unwrap_or_default();
                        let geom = attr(child, "geom").unwrap_or_default();
                        doc.add_material_assign(look, child_name, material, geom);
                    }
                }
            }
            _ => nodes.push((create_node(&mut doc, category, name, obj, None)?, obj)),
        }
    }

    for (id, obj) in nodes {
        read_node_inputs(&mut doc, id, obj)?;
    }
    for (graph, name, obj) in outputs {
        match resolve_connection(&doc, Some(graph), obj) {
            Ok(Some(connection)) => doc.connect_graph_output(graph, name, connection)?,
            Ok(None) => {}
            Err(Error::ElementNotFound(target)) => {
                let graph_name = doc.graph(graph).name.clone();
                doc.record_load_issue(format!(
                    "{graph_name}: output '{name}' references missing element '{target}'"
                ));
            }
            Err(e) => return Err(e),
        }
    }

    Ok(doc)
}

/// Parse JSON text into a document.
pub fn from_str(text: &str, library: Library) -> Result<Document> {
    let json: Json = serde_json::from_str(text)?;
    from_json(&json, library)
}

/// Read a document file.
pub fn read_file(path: impl AsRef<Path>, library: Library) -> Result<Document> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(Error::FileNotFound(path.to_path_buf()));
    }
    from_str(&std::fs::read_to_string(path)?, library)
}

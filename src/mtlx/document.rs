//! Shading graph document.
//!
//! Nodes, node graphs and looks are stored in arenas and addressed by
//! [`NodeId`] / [`GraphId`] / [`LookId`] handles. Names are resolved once
//! through per-scope indexes; connections hold handles, not names.

use std::collections::{BTreeMap, HashMap};

use super::library::{Library, NodeDef};
use super::value::*;
use crate::util::{Error, Result};

/// Handle to a node (top-level or inside a node graph).
///
/// Handles come from the document that created them:
///
/// ```compile_fail
/// let forged = mtlx_gltf::mtlx::NodeId(0);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

/// Handle to a node graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GraphId(pub(crate) usize);

/// Handle to a look.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LookId(pub(crate) usize);

/// Where an input takes its value from.
#[derive(Clone, Debug, PartialEq)]
pub enum Connection {
    /// Output of a node in the same scope; `output` names one output of a
    /// multi-output node.
    Node { node: NodeId, output: Option<String> },
    /// Output of a node graph. Top-level scope only.
    Graph { graph: GraphId, output: String },
    /// Interface input of the enclosing node graph.
    Interface(String),
}

impl Connection {
    pub fn node(node: NodeId) -> Self {
        Connection::Node { node, output: None }
    }

    pub fn node_output(node: NodeId, output: &str) -> Self {
        Connection::Node { node, output: Some(output.to_string()) }
    }
}

/// Upstream end of a connection once node graph outputs are followed.
#[derive(Clone, Debug, PartialEq)]
pub enum Upstream {
    Node { node: NodeId, output: Option<String> },
    Interface { graph: GraphId, input: String },
}

/// Node input, or node graph interface input.
#[derive(Clone, Debug, PartialEq)]
pub struct Input {
    pub name: String,
    pub type_name: String,
    pub value: Option<Value>,
    pub connection: Option<Connection>,
    pub colorspace: Option<String>,
}

impl Input {
    fn new(name: &str, type_name: &str) -> Self {
        Self {
            name: name.to_string(),
            type_name: type_name.to_string(),
            value: None,
            connection: None,
            colorspace: None,
        }
    }
}

/// Node instance.
#[derive(Clone, Debug)]
pub struct Node {
    pub name: String,
    pub category: String,
    pub node_type: String,
    /// Name of the node definition in the document's library.
    pub nodedef: String,
    /// Enclosing node graph, `None` for top-level nodes.
    pub graph: Option<GraphId>,
    pub inputs: Vec<Input>,
    /// Free-form attributes (`uiname`, `xpos`, ...) carried through I/O.
    pub attributes: BTreeMap<String, String>,
}

impl Node {
    pub fn input(&self, name: &str) -> Option<&Input> {
        self.inputs.iter().find(|i| i.name == name)
    }

    fn input_mut(&mut self, name: &str) -> Option<&mut Input> {
        self.inputs.iter_mut().find(|i| i.name == name)
    }
}

/// Node graph output.
#[derive(Clone, Debug, PartialEq)]
pub struct GraphOutput {
    pub name: String,
    pub type_name: String,
    pub connection: Option<Connection>,
}

/// Node graph: a named scope of nodes with interface inputs and outputs.
#[derive(Clone, Debug, Default)]
pub struct NodeGraph {
    pub name: String,
    pub inputs: Vec<Input>,
    pub outputs: Vec<GraphOutput>,
    pub nodes: Vec<NodeId>,
    names: HashMap<String, NodeId>,
}

impl NodeGraph {
    pub fn input(&self, name: &str) -> Option<&Input> {
        self.inputs.iter().find(|i| i.name == name)
    }

    pub fn output(&self, name: &str) -> Option<&GraphOutput> {
        self.outputs.iter().find(|o| o.name == name)
    }

    fn has_name(&self, name: &str) -> bool {
        self.names.contains_key(name)
            || self.input(name).is_some()
            || self.output(name).is_some()
    }
}

/// Binding of one material to a comma-joined list of geometry paths.
#[derive(Clone, Debug, PartialEq)]
pub struct MaterialAssign {
    pub name: String,
    pub material: String,
    pub geom: String,
}

impl MaterialAssign {
    /// Individual geometry paths of the assignment.
    pub fn geometry_paths(&self) -> impl Iterator<Item = &str> {
        self.geom.split(',').filter(|p| !p.is_empty())
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Look {
    pub name: String,
    pub assigns: Vec<MaterialAssign>,
}

/// Top-level child element, in document order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Element {
    Node(NodeId),
    Graph(GraphId),
    Look(LookId),
}

// ============================================================================
// Names
// ============================================================================

/// Replace characters that are not valid in element names with `_`.
pub fn create_valid_name(name: &str) -> String {
    let valid: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if valid.is_empty() {
        "_".to_string()
    } else {
        valid
    }
}

/// Increment the trailing integer of a name, appending `2` if there is none.
pub fn increment_name(name: &str) -> String {
    let digits = name.chars().rev().take_while(|c| c.is_ascii_digit()).count();
    let (prefix, suffix) = name.split_at(name.len() - digits);
    match suffix.parse::<u64>() {
        Ok(n) => format!("{prefix}{}", n + 1),
        Err(_) => format!("{name}2"),
    }
}

fn drop_dangling(connection: &mut Option<Connection>, len: usize) {
    if matches!(connection, Some(Connection::Node { node, .. }) if node.0 >= len) {
        *connection = None;
    }
}

// ============================================================================
// Document
// ============================================================================

/// Shading graph document.
#[derive(Clone, Debug)]
pub struct Document {
    library: Library,
    version: String,
    nodes: Vec<Node>,
    graphs: Vec<NodeGraph>,
    looks: Vec<Look>,
    children: Vec<Element>,
    names: HashMap<String, Element>,
    /// Problems found while reading, such as references to missing elements.
    load_issues: Vec<String>,
}

pub const DOCUMENT_VERSION: &str = "1.39";

impl Default for Document {
    fn default() -> Self {
        Self::with_standard_library()
    }
}

impl Document {
    /// Empty document resolving node definitions against `library`.
    pub fn new(library: Library) -> Self {
        Self {
            library,
            version: DOCUMENT_VERSION.to_string(),
            nodes: Vec::new(),
            graphs: Vec::new(),
            looks: Vec::new(),
            children: Vec::new(),
            names: HashMap::new(),
            load_issues: Vec::new(),
        }
    }

    pub fn with_standard_library() -> Self {
        Self::new(Library::standard())
    }

    pub fn library(&self) -> &Library {
        &self.library
    }

    pub fn library_mut(&mut self) -> &mut Library {
        &mut self.library
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn set_version(&mut self, version: impl Into<String>) {
        self.version = version.into();
    }

    /// Top-level elements in document order.
    pub fn children(&self) -> &[Element] {
        &self.children
    }

    /// Valid top-level name not yet used in the document.
    pub fn create_valid_child_name(&self, name: &str) -> String {
        let mut name = create_valid_name(name);
        while self.names.contains_key(&name) {
            name = increment_name(&name);
        }
        name
    }

    fn create_valid_graph_child_name(&self, graph: GraphId, name: &str) -> String {
        let mut name = create_valid_name(name);
        while self.graphs[graph.0].has_name(&name) {
            name = increment_name(&name);
        }
        name
    }

    // ---- nodes -------------------------------------------------------------

    fn insert_node(&mut self, def: NodeDef, name: String, graph: Option<GraphId>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            name: name.clone(),
            category: def.category,
            node_type: def.node_type,
            nodedef: def.name,
            graph,
            inputs: Vec::new(),
            attributes: BTreeMap::new(),
        });
        match graph {
            Some(g) => {
                let graph = &mut self.graphs[g.0];
                graph.nodes.push(id);
                graph.names.insert(name, id);
            }
            None => {
                self.children.push(Element::Node(id));
                self.names.insert(name, Element::Node(id));
            }
        }
        id
    }

    /// Add a top-level node of `category` producing `node_type`.
    ///
    /// The name is made valid and unique; read it back from [`Document::node`].
    pub fn add_node(&mut self, category: &str, name: &str, node_type: &str) -> Result<NodeId> {
        let def = self.library.require(category, node_type)?.clone();
        let name = self.create_valid_child_name(name);
        Ok(self.insert_node(def, name, None))
    }

    /// Add a node inside a node graph.
    pub fn add_graph_node(
        &mut self,
        graph: GraphId,
        category: &str,
        name: &str,
        node_type: &str,
    ) -> Result<NodeId> {
        let def = self.library.require(category, node_type)?.clone();
        let name = self.create_valid_graph_child_name(graph, name);
        Ok(self.insert_node(def, name, Some(graph)))
    }

    /// Add a node by explicit definition name. The name must be free.
    pub fn add_node_with_def(
        &mut self,
        nodedef: &str,
        name: &str,
        graph: Option<GraphId>,
    ) -> Result<NodeId> {
        let def = self
            .library
            .get(nodedef)
            .cloned()
            .ok_or_else(|| Error::NodeDefNotFound(nodedef.to_string()))?;
        let taken = match graph {
            Some(g) => self.graphs[g.0].has_name(name),
            None => self.names.contains_key(name),
        };
        if taken {
            return Err(Error::invalid(format!("duplicate element name '{name}'")));
        }
        Ok(self.insert_node(def, name.to_string(), graph))
    }

    /// Number of nodes created so far, for [`Document::truncate_nodes`].
    pub(crate) fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Drop every node created after the first `len`, with their names and
    /// any connections that reach them.
    pub(crate) fn truncate_nodes(&mut self, len: usize) {
        if len >= self.nodes.len() {
            return;
        }
        self.nodes.truncate(len);
        let kept = |element: &Element| !matches!(element, Element::Node(id) if id.0 >= len);
        self.children.retain(kept);
        self.names.retain(|_, element| kept(&*element));
        for graph in &mut self.graphs {
            graph.nodes.retain(|id| id.0 < len);
            graph.names.retain(|_, id| id.0 < len);
            for output in &mut graph.outputs {
                drop_dangling(&mut output.connection, len);
            }
        }
        for node in &mut self.nodes {
            for input in &mut node.inputs {
                drop_dangling(&mut input.connection, len);
            }
        }
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    /// Top-level nodes in document order.
    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.children.iter().filter_map(|c| match c {
            Element::Node(id) => Some(*id),
            _ => None,
        })
    }

    pub fn find_node(&self, name: &str) -> Option<NodeId> {
        match self.names.get(name) {
            Some(Element::Node(id)) => Some(*id),
            _ => None,
        }
    }

    pub fn find_graph_node(&self, graph: GraphId, name: &str) -> Option<NodeId> {
        self.graphs[graph.0].names.get(name).copied()
    }

    /// `graph/node` for nodes inside a node graph, the bare name otherwise.
    pub fn name_path(&self, id: NodeId) -> String {
        let node = self.node(id);
        match node.graph {
            Some(g) => format!("{}/{}", self.graphs[g.0].name, node.name),
            None => node.name.clone(),
        }
    }

    /// Node definition of a node.
    pub fn nodedef(&self, id: NodeId) -> Result<&NodeDef> {
        let name = &self.node(id).nodedef;
        self.library
            .get(name)
            .ok_or_else(|| Error::NodeDefNotFound(name.clone()))
    }

    fn declared_input_type(&self, id: NodeId, input: &str) -> Result<String> {
        let def = self.nodedef(id)?;
        def.find_input(input)
            .map(|i| i.type_name.clone())
            .ok_or_else(|| Error::UnknownInput {
                nodedef: def.name.clone(),
                input: input.to_string(),
            })
    }

    fn input_entry(&mut self, id: NodeId, input: &str) -> Result<&mut Input> {
        let type_name = self.declared_input_type(id, input)?;
        let node = &mut self.nodes[id.0];
        if node.input(input).is_none() {
            node.inputs.push(Input::new(input, &type_name));
        }
        node.input_mut(input)
            .ok_or_else(|| Error::ElementNotFound(input.to_string()))
    }

    /// Set a constant input value, replacing any connection.
    pub fn set_input_value(&mut self, id: NodeId, input: &str, value: Value) -> Result<()> {
        let entry = self.input_entry(id, input)?;
        if entry.type_name != value.type_name() {
            return Err(Error::type_mismatch(entry.type_name.clone(), value.type_name()));
        }
        entry.value = Some(value);
        entry.connection = None;
        Ok(())
    }

    /// Connect an input, replacing any constant value.
    pub fn connect(&mut self, id: NodeId, input: &str, connection: Connection) -> Result<()> {
        let scope = self.node(id).graph;
        let source_type = self.connection_type(scope, &connection)?;
        let entry = self.input_entry(id, input)?;
        if entry.type_name != source_type {
            return Err(Error::type_mismatch(entry.type_name.clone(), source_type));
        }
        entry.connection = Some(connection);
        entry.value = None;
        Ok(())
    }

    /// Tag an existing input with a colorspace.
    pub fn set_colorspace(&mut self, id: NodeId, input: &str, colorspace: &str) -> Result<()> {
        let path = self.name_path(id);
        let entry = self.nodes[id.0]
            .input_mut(input)
            .ok_or_else(|| Error::ElementNotFound(format!("{path}.{input}")))?;
        entry.colorspace = Some(colorspace.to_string());
        Ok(())
    }

    pub fn remove_input(&mut self, id: NodeId, input: &str) {
        self.nodes[id.0].inputs.retain(|i| i.name != input);
    }

    /// Add every definition input that has a default and is not yet present.
    pub fn add_inputs_from_nodedef(&mut self, id: NodeId) -> Result<()> {
        let def = self.nodedef(id)?.clone();
        let node = &mut self.nodes[id.0];
        for input in &def.inputs {
            if node.input(&input.name).is_some() {
                continue;
            }
            if let Some(default) = &input.default {
                let mut entry = Input::new(&input.name, &input.type_name);
                entry.value = Some(default.clone());
                node.inputs.push(entry);
            }
        }
        Ok(())
    }

    /// Constant value set on the node itself.
    pub fn input_value(&self, id: NodeId, input: &str) -> Option<&Value> {
        self.node(id).input(input).and_then(|i| i.value.as_ref())
    }

    /// Instance value, or the definition default for unset, unconnected inputs.
    pub fn effective_value(&self, id: NodeId, input: &str) -> Option<Value> {
        match self.node(id).input(input) {
            Some(i) if i.value.is_some() => i.value.clone(),
            Some(i) if i.connection.is_some() => None,
            _ => self
                .nodedef(id)
                .ok()
                .and_then(|def| def.default_value(input).cloned()),
        }
    }

    /// Definition default of an input.
    pub fn default_value(&self, id: NodeId, input: &str) -> Option<&Value> {
        self.nodedef(id).ok().and_then(|def| def.default_value(input))
    }

    pub fn connection(&self, id: NodeId, input: &str) -> Option<&Connection> {
        self.node(id).input(input).and_then(|i| i.connection.as_ref())
    }

    /// Follow an input's connection through node graph outputs.
    pub fn upstream(&self, id: NodeId, input: &str) -> Option<Upstream> {
        let connection = self.connection(id, input)?;
        self.resolve(self.node(id).graph, connection)
    }

    fn resolve(&self, scope: Option<GraphId>, connection: &Connection) -> Option<Upstream> {
        match connection {
            Connection::Node { node, output } => Some(Upstream::Node {
                node: *node,
                output: output.clone(),
            }),
            Connection::Graph { graph, output } => {
                let inner = self.graphs[graph.0].output(output)?.connection.as_ref()?;
                self.resolve(Some(*graph), inner)
            }
            Connection::Interface(name) => scope.map(|graph| Upstream::Interface {
                graph,
                input: name.clone(),
            }),
        }
    }

    /// Node feeding an input, if any.
    pub fn connected_node(&self, id: NodeId, input: &str) -> Option<NodeId> {
        match self.upstream(id, input)? {
            Upstream::Node { node, .. } => Some(node),
            Upstream::Interface { .. } => None,
        }
    }

    /// Type produced by a connection source seen from `scope`.
    fn connection_type(&self, scope: Option<GraphId>, connection: &Connection) -> Result<String> {
        match connection {
            Connection::Node { node, output } => {
                let source = self
                    .nodes
                    .get(node.0)
                    .ok_or_else(|| Error::ElementNotFound(format!("node #{}", node.0)))?;
                if source.graph != scope {
                    return Err(Error::invalid(format!(
                        "node '{}' is not in the same scope",
                        source.name
                    )));
                }
                Ok(self.nodedef(*node)?.output_type(output.as_deref())?.to_string())
            }
            Connection::Graph { graph, output } => {
                if scope.is_some() {
                    return Err(Error::invalid("node graph outputs connect at document level only"));
                }
                let graph = self
                    .graphs
                    .get(graph.0)
                    .ok_or_else(|| Error::ElementNotFound(format!("nodegraph #{}", graph.0)))?;
                graph
                    .output(output)
                    .map(|o| o.type_name.clone())
                    .ok_or_else(|| Error::ElementNotFound(format!("{}.{}", graph.name, output)))
            }
            Connection::Interface(name) => {
                let graph = scope
                    .map(|g| &self.graphs[g.0])
                    .ok_or_else(|| Error::invalid("interface connection outside a node graph"))?;
                graph
                    .input(name)
                    .map(|i| i.type_name.clone())
                    .ok_or_else(|| Error::ElementNotFound(format!("{}.{}", graph.name, name)))
            }
        }
    }

    // ---- node graphs -------------------------------------------------------

    pub fn add_node_graph(&mut self, name: &str) -> GraphId {
        let name = self.create_valid_child_name(name);
        let id = GraphId(self.graphs.len());
        self.graphs.push(NodeGraph { name: name.clone(), ..Default::default() });
        self.children.push(Element::Graph(id));
        self.names.insert(name, Element::Graph(id));
        id
    }

    pub fn graph(&self, id: GraphId) -> &NodeGraph {
        &self.graphs[id.0]
    }

    pub fn graphs(&self) -> impl Iterator<Item = GraphId> + '_ {
        (0..self.graphs.len()).map(GraphId)
    }

    pub fn find_graph(&self, name: &str) -> Option<GraphId> {
        match self.names.get(name) {
            Some(Element::Graph(id)) => Some(*id),
            _ => None,
        }
    }

    /// Add an interface input to a node graph.
    pub fn add_graph_input(
        &mut self,
        graph: GraphId,
        name: &str,
        type_name: &str,
        value: Option<Value>,
    ) -> Result<()> {
        if let Some(value) = &value {
            if value.type_name() != type_name {
                return Err(Error::type_mismatch(type_name, value.type_name()));
            }
        }
        if self.graphs[graph.0].has_name(name) {
            return Err(Error::invalid(format!("duplicate element name '{name}'")));
        }
        let mut input = Input::new(name, type_name);
        input.value = value;
        self.graphs[graph.0].inputs.push(input);
        Ok(())
    }

    /// Tag a node graph interface input with a colorspace.
    pub fn set_graph_input_colorspace(
        &mut self,
        graph: GraphId,
        name: &str,
        colorspace: &str,
    ) -> Result<()> {
        let graph = &mut self.graphs[graph.0];
        let input = graph
            .inputs
            .iter_mut()
            .find(|i| i.name == name)
            .ok_or_else(|| Error::ElementNotFound(name.to_string()))?;
        input.colorspace = Some(colorspace.to_string());
        Ok(())
    }

    pub fn add_graph_output(&mut self, graph: GraphId, name: &str, type_name: &str) -> Result<()> {
        if self.graphs[graph.0].has_name(name) {
            return Err(Error::invalid(format!("duplicate element name '{name}'")));
        }
        self.graphs[graph.0].outputs.push(GraphOutput {
            name: name.to_string(),
            type_name: type_name.to_string(),
            connection: None,
        });
        Ok(())
    }

    /// Connect a node graph output to a node or interface input inside it.
    pub fn connect_graph_output(
        &mut self,
        graph: GraphId,
        output: &str,
        connection: Connection,
    ) -> Result<()> {
        let source_type = self.connection_type(Some(graph), &connection)?;
        let entry = self.graphs[graph.0]
            .outputs
            .iter_mut()
            .find(|o| o.name == output)
            .ok_or_else(|| Error::ElementNotFound(output.to_string()))?;
        if entry.type_name != source_type {
            return Err(Error::type_mismatch(entry.type_name.clone(), source_type));
        }
        entry.connection = Some(connection);
        Ok(())
    }

    /// Follow a node graph output to its source.
    pub fn graph_output_upstream(&self, graph: GraphId, output: &str) -> Option<Upstream> {
        let connection = self.graphs[graph.0].output(output)?.connection.as_ref()?;
        self.resolve(Some(graph), connection)
    }

    // ---- looks -------------------------------------------------------------

    pub fn add_look(&mut self, name: &str) -> LookId {
        let name = self.create_valid_child_name(name);
        let id = LookId(self.looks.len());
        self.looks.push(Look { name: name.clone(), assigns: Vec::new() });
        self.children.push(Element::Look(id));
        self.names.insert(name, Element::Look(id));
        id
    }

    pub fn add_material_assign(&mut self, look: LookId, name: &str, material: &str, geom: &str) {
        self.looks[look.0].assigns.push(MaterialAssign {
            name: name.to_string(),
            material: material.to_string(),
            geom: geom.to_string(),
        });
    }

    pub fn look(&self, id: LookId) -> &Look {
        &self.looks[id.0]
    }

    pub fn looks(&self) -> impl Iterator<Item = &Look> {
        self.looks.iter()
    }

    // ---- materials ---------------------------------------------------------

    /// Top-level `surfacematerial` nodes in document order.
    pub fn material_nodes(&self) -> Vec<NodeId> {
        self.nodes()
            .filter(|id| self.node(*id).category == "surfacematerial")
            .collect()
    }

    /// Surface shader bound to a material node.
    pub fn surface_shader(&self, material: NodeId) -> Option<NodeId> {
        self.connected_node(material, "surfaceshader")
    }

    // ---- validation --------------------------------------------------------

    pub(crate) fn record_load_issue(&mut self, issue: String) {
        tracing::warn!("{}", issue);
        self.load_issues.push(issue);
    }

    /// Check structural consistency, returning one message per problem.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = self.load_issues.clone();

        for (index, node) in self.nodes.iter().enumerate() {
            let id = NodeId(index);
            let path = self.name_path(id);
            let def = match self.nodedef(id) {
                Ok(def) => def,
                Err(e) => {
                    issues.push(format!("{path}: {e}"));
                    continue;
                }
            };
            for input in &node.inputs {
                match def.find_input(&input.name) {
                    None => issues.push(format!(
                        "{path}: input '{}' is not defined on {}",
                        input.name, def.name
                    )),
                    Some(d) if d.type_name != input.type_name => issues.push(format!(
                        "{path}: input '{}' has type {}, definition declares {}",
                        input.name, input.type_name, d.type_name
                    )),
                    _ => {}
                }
                if let Some(value) = &input.value {
                    if value.type_name() != input.type_name {
                        issues.push(format!(
                            "{path}: input '{}' holds a {} value",
                            input.name,
                            value.type_name()
                        ));
                    }
                }
                if let Some(connection) = &input.connection {
                    match self.connection_type(node.graph, connection) {
                        Ok(t) if t != input.type_name => issues.push(format!(
                            "{path}: input '{}' of type {} is connected to {t}",
                            input.name, input.type_name
                        )),
                        Err(e) => issues.push(format!("{path}: input '{}': {e}", input.name)),
                        _ => {}
                    }
                }
            }
            let top_level_material = node.category == "surfacematerial" && node.graph.is_none();
            if top_level_material && self.surface_shader(id).is_none() {
                issues.push(format!("{path}: material has no surface shader"));
            }
        }

        for graph in &self.graphs {
            for output in &graph.outputs {
                if output.connection.is_none() {
                    let name = &graph.name;
                    issues.push(format!("{name}: output '{}' is not connected", output.name));
                }
            }
        }

        for look in &self.looks {
            for assign in &look.assigns {
                if self.find_node(&assign.material).is_none() {
                    issues.push(format!(
                        "{}: material assign '{}' references missing material '{}'",
                        look.name, assign.name, assign.material
                    ));
                }
            }
        }

        issues
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;

    fn shader_document() -> (Document, NodeId, NodeId) {
        let mut doc = Document::with_standard_library();
        let shader = doc.add_node("gltf_pbr", "red", SURFACESHADER_TYPE).unwrap();
        let material = doc.add_node("surfacematerial", "MAT_red", MATERIAL_TYPE).unwrap();
        doc.connect(material, "surfaceshader", Connection::node(shader)).unwrap();
        (doc, shader, material)
    }

    #[test]
    fn test_names() {
        assert_eq!(create_valid_name("Material.001"), "Material_001");
        assert_eq!(create_valid_name(""), "_");
        assert_eq!(increment_name("SHD_0"), "SHD_1");
        assert_eq!(increment_name("image_base_color"), "image_base_color2");
        assert_eq!(increment_name("node9"), "node10");
    }

    #[test]
    fn test_unique_child_names() {
        let mut doc = Document::with_standard_library();
        let a = doc.add_node("gltf_pbr", "shader", SURFACESHADER_TYPE).unwrap();
        let b = doc.add_node("gltf_pbr", "shader", SURFACESHADER_TYPE).unwrap();
        assert_eq!(doc.node(a).name, "shader");
        assert_eq!(doc.node(b).name, "shader2");
        assert_eq!(doc.find_node("shader2"), Some(b));
    }

    #[test]
    fn test_set_input_checks_definition() {
        let (mut doc, shader, _) = shader_document();
        doc.set_input_value(shader, "metallic", Value::Float(0.25)).unwrap();
        assert_eq!(doc.input_value(shader, "metallic"), Some(&Value::Float(0.25)));

        assert!(matches!(
            doc.set_input_value(shader, "not_an_input", Value::Float(0.0)),
            Err(Error::UnknownInput { .. })
        ));
        assert!(matches!(
            doc.set_input_value(shader, "metallic", Value::Color3(Vec3::ONE)),
            Err(Error::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_effective_value_falls_back_to_default() {
        let (doc, shader, _) = shader_document();
        assert_eq!(doc.input_value(shader, "ior"), None);
        assert_eq!(doc.effective_value(shader, "ior"), Some(Value::Float(1.5)));
    }

    #[test]
    fn test_connect_type_checked() {
        let (mut doc, shader, material) = shader_document();
        assert_eq!(doc.surface_shader(material), Some(shader));

        let image = doc.add_node("gltf_colorimage", "image_base_color", MULTIOUTPUT_TYPE).unwrap();
        doc.connect(shader, "base_color", Connection::node_output(image, "outcolor")).unwrap();
        doc.connect(shader, "alpha", Connection::node_output(image, "outa")).unwrap();
        assert_eq!(doc.connected_node(shader, "base_color"), Some(image));

        assert!(matches!(
            doc.connect(shader, "metallic", Connection::node_output(image, "outcolor")),
            Err(Error::TypeMismatch { .. })
        ));
        assert!(doc.connect(shader, "metallic", Connection::node(image)).is_err());
    }

    #[test]
    fn test_connect_replaces_value() {
        let (mut doc, shader, _) = shader_document();
        doc.set_input_value(shader, "roughness", Value::Float(0.4)).unwrap();
        let image = doc.add_node("gltf_image", "image_roughness", FLOAT_TYPE).unwrap();
        doc.connect(shader, "roughness", Connection::node(image)).unwrap();

        assert_eq!(doc.input_value(shader, "roughness"), None);
        assert_eq!(doc.effective_value(shader, "roughness"), None);
    }

    #[test]
    fn test_graph_output_upstream() {
        let (mut doc, shader, _) = shader_document();
        let graph = doc.add_node_graph("NG_base");
        doc.add_graph_input(graph, "tint", COLOR3_TYPE, Some(Value::Color3(Vec3::ONE))).unwrap();
        let checker = doc.add_graph_node(graph, "checkerboard", "checker", COLOR3_TYPE).unwrap();
        doc.connect(checker, "color1", Connection::Interface("tint".into())).unwrap();
        doc.add_graph_output(graph, "out", COLOR3_TYPE).unwrap();
        doc.connect_graph_output(graph, "out", Connection::node(checker)).unwrap();
        let connection = Connection::Graph { graph, output: "out".into() };
        doc.connect(shader, "base_color", connection).unwrap();

        assert_eq!(doc.connected_node(shader, "base_color"), Some(checker));
        assert_eq!(doc.name_path(checker), "NG_base/checker");
        assert_eq!(
            doc.upstream(checker, "color1"),
            Some(Upstream::Interface { graph, input: "tint".into() })
        );
        // Graph nodes cannot be wired directly from top level
        assert!(doc.connect(shader, "specular_color", Connection::node(checker)).is_err());
    }

    #[test]
    fn test_add_inputs_from_nodedef() {
        let (mut doc, shader, _) = shader_document();
        doc.set_input_value(shader, "metallic", Value::Float(0.0)).unwrap();
        doc.add_inputs_from_nodedef(shader).unwrap();

        let node = doc.node(shader);
        assert_eq!(node.input("metallic").unwrap().value, Some(Value::Float(0.0)));
        assert!(node.input("roughness").is_some());
        // No default, not added
        assert!(node.input("normal").is_none());
        assert!(node.input("attenuation_distance").is_none());
    }

    #[test]
    fn test_validate() {
        let (mut doc, _, _) = shader_document();
        assert!(doc.validate().is_empty());

        doc.add_node("surfacematerial", "MAT_empty", MATERIAL_TYPE).unwrap();
        let look = doc.add_look("look");
        doc.add_material_assign(look, "MAT_missing", "MAT_missing", "/a");
        let issues = doc.validate();
        assert_eq!(issues.len(), 2);
        assert!(issues[0].contains("MAT_empty"));
        assert!(issues[1].contains("MAT_missing"));
    }

    #[test]
    fn test_geometry_paths() {
        let assign = MaterialAssign {
            name: "MAT_a".into(),
            material: "MAT_a".into(),
            geom: "/N/M/PRIMITIVE_0,/N/M/PRIMITIVE_1".into(),
        };
        assert_eq!(
            assign.geometry_paths().collect::<Vec<_>>(),
            vec!["/N/M/PRIMITIVE_0", "/N/M/PRIMITIVE_1"]
        );
    }
}

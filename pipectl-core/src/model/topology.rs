//! Topology model.
//!
//! A topology is an immutable, reusable template of a processing graph along with the
//! parameters it declares. Live pipelines & pipeline jobs reference a topology by name.

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::model::{Node, NodeRole, ParameterDeclaration};

/// The execution kind of a topology.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub enum TopologyKind {
    /// Continuously ingests a source through live pipelines.
    Live,
    /// Processes a bounded range of input once through pipeline jobs.
    Batch,
}

impl std::fmt::Display for TopologyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Live => "Live",
                Self::Batch => "Batch",
            }
        )
    }
}

/// The service tier of a topology.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub enum Sku {
    #[serde(rename = "Live_S1")]
    LiveS1,
    #[serde(rename = "Batch_S1")]
    BatchS1,
}

impl Sku {
    /// The tier matching the given topology kind.
    pub fn for_kind(kind: TopologyKind) -> Self {
        match kind {
            TopologyKind::Live => Self::LiveS1,
            TopologyKind::Batch => Self::BatchS1,
        }
    }

    /// The topology kind this tier serves.
    pub fn kind(self) -> TopologyKind {
        match self {
            Self::LiveS1 => TopologyKind::Live,
            Self::BatchS1 => TopologyKind::Batch,
        }
    }
}

/// A processing graph template.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Topology {
    /// The name of this topology, unique within an account.
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub kind: TopologyKind,
    pub sku: Sku,
    /// The parameters declared by this topology.
    #[serde(default)]
    pub parameters: Vec<ParameterDeclaration>,
    /// All nodes of this topology; sources, processors & sinks.
    pub nodes: Vec<Node>,
}

impl Topology {
    /// Create a new empty topology of the given kind, using the tier matching the kind.
    pub fn new(name: impl Into<String>, kind: TopologyKind) -> Self {
        Self {
            name: name.into(),
            description: None,
            kind,
            sku: Sku::for_kind(kind),
            parameters: vec![],
            nodes: vec![],
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_parameter(mut self, param: ParameterDeclaration) -> Self {
        self.parameters.push(param);
        self
    }

    pub fn with_node(mut self, node: Node) -> Self {
        self.nodes.push(node);
        self
    }

    /// Get the parameter declaration of the given name.
    pub fn parameter(&self, name: &str) -> Option<&ParameterDeclaration> {
        self.parameters.iter().find(|param| param.name == name)
    }

    /// Get the node of the given name.
    pub fn node(&self, name: &str) -> Option<&Node> {
        self.nodes.iter().find(|node| node.name == name)
    }

    pub fn sources(&self) -> impl Iterator<Item = &Node> {
        self.nodes_with_role(NodeRole::Source)
    }

    pub fn processors(&self) -> impl Iterator<Item = &Node> {
        self.nodes_with_role(NodeRole::Processor)
    }

    pub fn sinks(&self) -> impl Iterator<Item = &Node> {
        self.nodes_with_role(NodeRole::Sink)
    }

    fn nodes_with_role(&self, role: NodeRole) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(move |node| node.role() == role)
    }

    /// Decode a topology from a YAML document.
    ///
    /// Unknown node or parameter types are rejected here. Structural validation is performed
    /// separately by `validate`.
    pub fn from_yaml(doc: &str) -> Result<Self> {
        serde_yaml::from_str(doc).map_err(|err| AppError::InvalidTopology(vec![format!("error decoding topology document: {}", err)]))
    }

    /// Encode this topology as a YAML document.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|err| AppError::InvalidTopology(vec![format!("error encoding topology `{}`: {}", self.name, err)]))
    }
}

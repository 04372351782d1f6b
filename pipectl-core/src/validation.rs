//! Static validation of topologies.

use std::collections::{HashMap, HashSet};

use lazy_static::lazy_static;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use regex::Regex;

use crate::error::{AppError, Result};
use crate::model::{NodeConfig, NodeRole, Sku, Topology, TopologyKind};

lazy_static! {
    /// Regular expression used to validate topology, node & parameter names.
    pub static ref RE_NAME: Regex = Regex::new(r"^[-_.a-zA-Z0-9]{1,100}$").expect("failed to compile RE_NAME regex");
    /// Regular expression used to find parameter references within node configuration values.
    static ref RE_TOKEN: Regex = Regex::new(r"\$\{([^{}]*)\}").expect("failed to compile RE_TOKEN regex");
}

/// Extract the names of all parameters referenced by the given value.
///
/// Returns an error describing the first malformed reference found. Any `${` which does not open
/// a well formed `${name}` reference is malformed.
pub fn parameter_references(value: &str) -> std::result::Result<Vec<&str>, String> {
    let mut names = vec![];
    for cap in RE_TOKEN.captures_iter(value) {
        let name = cap.get(1).map(|m| m.as_str()).unwrap_or_default();
        if !RE_NAME.is_match(name) {
            return Err(format!("parameter reference `${{{}}}` is malformed, the name must match the pattern `{}`", name, RE_NAME.as_str()));
        }
        names.push(name);
    }
    if RE_TOKEN.replace_all(value, "").contains("${") {
        return Err("unterminated parameter reference, references must follow the pattern `${name}`".into());
    }
    Ok(names)
}

impl Topology {
    /// Statically validate this topology.
    ///
    /// Every violation found is collected, so that a single pass reports all problems.
    pub fn validate(&self) -> Result<()> {
        let mut errs = vec![];
        self.validate_names(&mut errs);
        self.validate_kind(&mut errs);
        let graph = self.validate_edges(&mut errs);
        self.validate_acyclic(&graph, &mut errs);
        self.validate_references(&mut errs);
        self.validate_defaults(&mut errs);
        if errs.is_empty() {
            Ok(())
        } else {
            Err(AppError::InvalidTopology(errs))
        }
    }

    fn validate_names(&self, errs: &mut Vec<String>) {
        if !RE_NAME.is_match(&self.name) {
            errs.push(format!("topology name `{}` is invalid, must match the pattern `{}`", self.name, RE_NAME.as_str()));
        }

        let mut seen = HashSet::new();
        for node in self.nodes.iter() {
            if !RE_NAME.is_match(&node.name) {
                errs.push(format!(
                    "topology `{}` node name `{}` is invalid, must match the pattern `{}`",
                    self.name,
                    node.name,
                    RE_NAME.as_str()
                ));
            }
            if !seen.insert(node.name.as_str()) {
                errs.push(format!(
                    "topology `{}` node name `{}` is not unique for this topology, all nodes must have unique names",
                    self.name, node.name
                ));
            }
        }

        let mut seen = HashSet::new();
        for param in self.parameters.iter() {
            if !RE_NAME.is_match(&param.name) {
                errs.push(format!(
                    "topology `{}` parameter name `{}` is invalid, must match the pattern `{}`",
                    self.name,
                    param.name,
                    RE_NAME.as_str()
                ));
            }
            if !seen.insert(param.name.as_str()) {
                errs.push(format!(
                    "topology `{}` parameter `{}` is declared more than once, all parameters must have unique names",
                    self.name, param.name
                ));
            }
        }
    }

    fn validate_kind(&self, errs: &mut Vec<String>) {
        if self.sku != Sku::for_kind(self.kind) {
            errs.push(format!("topology `{}` is of kind {} but uses the {:?} sku", self.name, self.kind, self.sku));
        }
        for node in self.sources() {
            let ok = match (&node.config, self.kind) {
                (NodeConfig::RtspSource(_), TopologyKind::Live) => true,
                (NodeConfig::VideoSource(_), TopologyKind::Batch) => true,
                _ => false,
            };
            if !ok {
                errs.push(format!(
                    "topology `{}` source `{}` can not be used in a {} topology",
                    self.name, node.name, self.kind
                ));
            }
        }
    }

    /// Validate node inputs, returning the node graph built from every input found to be valid.
    ///
    /// Inputs must reference nodes declared earlier in the topology.
    fn validate_edges(&self, errs: &mut Vec<String>) -> DiGraph<&str, ()> {
        if self.sources().next().is_none() {
            errs.push(format!("topology `{}` must have at least one source", self.name));
        }
        if self.sinks().next().is_none() {
            errs.push(format!("topology `{}` must have at least one sink", self.name));
        }

        let mut graph = DiGraph::new();
        let mut index: HashMap<&str, NodeIndex> = HashMap::new();
        let mut declared_at: HashMap<&str, usize> = HashMap::new();
        for (pos, node) in self.nodes.iter().enumerate() {
            index.entry(node.name.as_str()).or_insert_with(|| graph.add_node(node.name.as_str()));
            declared_at.entry(node.name.as_str()).or_insert(pos);
        }

        let mut dedup_buf: HashSet<&str> = HashSet::new();
        for (pos, node) in self.nodes.iter().enumerate() {
            match node.role() {
                NodeRole::Source if !node.inputs.is_empty() => {
                    errs.push(format!("topology `{}` source `{}` can not have inputs", self.name, node.name));
                }
                NodeRole::Processor | NodeRole::Sink if node.inputs.is_empty() => {
                    errs.push(format!("topology `{}` {} `{}` must have at least one input", self.name, node.role(), node.name));
                }
                _ => (),
            }

            dedup_buf.clear();
            for input in node.inputs.iter() {
                if !dedup_buf.insert(input.as_str()) {
                    errs.push(format!(
                        "topology `{}` node `{}` input `{}` is a duplicate and must be removed",
                        self.name, node.name, input
                    ));
                    continue;
                }
                if input == &node.name {
                    errs.push(format!("topology `{}` node `{}` can not reference itself as an input", self.name, node.name));
                    continue;
                }
                let upstream = match self.node(input) {
                    Some(upstream) => upstream,
                    None => {
                        errs.push(format!(
                            "topology `{}` node `{}` input `{}` references a node which does not exist in this topology",
                            self.name, node.name, input
                        ));
                        continue;
                    }
                };
                if declared_at.get(input.as_str()).map_or(false, |upstream_pos| *upstream_pos >= pos) {
                    errs.push(format!(
                        "topology `{}` node `{}` input `{}` references a node declared after it, inputs must reference earlier nodes",
                        self.name, node.name, input
                    ));
                }
                if upstream.role() == NodeRole::Sink {
                    errs.push(format!(
                        "topology `{}` node `{}` input `{}` references a sink, sinks can not be used as inputs",
                        self.name, node.name, input
                    ));
                }
                if let (Some(from), Some(to)) = (index.get(input.as_str()), index.get(node.name.as_str())) {
                    graph.add_edge(*from, *to, ());
                }
            }
        }
        graph
    }

    fn validate_acyclic(&self, graph: &DiGraph<&str, ()>, errs: &mut Vec<String>) {
        if let Err(cycle) = toposort(graph, None) {
            errs.push(format!(
                "topology `{}` node graph contains a cycle through node `{}`, topologies must be acyclic",
                self.name, graph[cycle.node_id()]
            ));
        }
    }

    fn validate_references(&self, errs: &mut Vec<String>) {
        for node in self.nodes.iter() {
            for (path, value) in node.config.templated_values() {
                match parameter_references(value) {
                    Ok(names) => {
                        for name in names {
                            if self.parameter(name).is_none() {
                                errs.push(format!(
                                    "topology `{}` node `{}` field `{}` references parameter `{}` which is not declared by this topology",
                                    self.name, node.name, path, name
                                ));
                            }
                        }
                    }
                    Err(err) => errs.push(format!("topology `{}` node `{}` field `{}`: {}", self.name, node.name, path, err)),
                }
            }
        }
    }

    fn validate_defaults(&self, errs: &mut Vec<String>) {
        for param in self.parameters.iter() {
            if let Some(default) = &param.default {
                if !param.kind.accepts(default) {
                    errs.push(format!(
                        "topology `{}` parameter `{}` default does not conform to its declared type `{}`",
                        self.name, param.name, param.kind
                    ));
                }
            }
        }
    }
}

//! Parameter binding.
//!
//! Definitions given at pipeline or job creation time are checked against the parameters declared
//! by a topology, and resolved against declared defaults. Values stay opaque: substitution of
//! `${name}` references happens on the control plane.

use std::collections::HashSet;

use crate::error::{AppError, Result};
use crate::model::{ParameterDefinition, ParameterType, Topology};

/// The value used in place of sensitive values in any formatted output.
pub const REDACTED: &str = "***";

/// Where a bound value came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BindingSource {
    /// Given by the caller.
    Explicit,
    /// Taken from the declared default.
    Default,
}

/// A resolved parameter value.
#[derive(Clone, PartialEq)]
pub struct BoundParameter {
    pub name: String,
    pub value: String,
    pub kind: ParameterType,
    pub source: BindingSource,
}

impl BoundParameter {
    /// Check if this value must never be formatted.
    pub fn is_sensitive(&self) -> bool {
        self.kind.is_sensitive()
    }

    /// The value of this parameter, redacted when sensitive.
    pub fn redacted(&self) -> &str {
        if self.is_sensitive() {
            REDACTED
        } else {
            &self.value
        }
    }
}

impl std::fmt::Debug for BoundParameter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundParameter")
            .field("name", &self.name)
            .field("value", &self.redacted())
            .field("kind", &self.kind)
            .field("source", &self.source)
            .finish()
    }
}

impl std::fmt::Display for BoundParameter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={}", self.name, self.redacted())
    }
}

/// The full set of resolved parameters of a topology instantiation.
#[derive(Clone, Debug)]
pub struct BoundParameters {
    topology: String,
    values: Vec<BoundParameter>,
}

impl BoundParameters {
    /// The name of the topology these parameters were bound against.
    pub fn topology(&self) -> &str {
        &self.topology
    }

    /// Get the resolved parameter of the given name.
    pub fn get(&self, name: &str) -> Option<&BoundParameter> {
        self.values.iter().find(|param| param.name == name)
    }

    /// Iterate over all resolved parameters, in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &BoundParameter> {
        self.values.iter()
    }

    /// The explicit definitions to send to the control plane. Defaults are resolved remotely.
    pub fn definitions(&self) -> Vec<ParameterDefinition> {
        self.values
            .iter()
            .filter(|param| param.source == BindingSource::Explicit)
            .map(|param| ParameterDefinition::new(param.name.clone(), param.value.clone()))
            .collect()
    }

    /// The names of all sensitive parameters.
    pub fn sensitive(&self) -> Vec<&str> {
        self.values.iter().filter(|param| param.is_sensitive()).map(|param| param.name.as_str()).collect()
    }
}

impl std::fmt::Display for BoundParameters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let rendered: Vec<_> = self.values.iter().map(|param| param.to_string()).collect();
        write!(f, "{}", rendered.join(", "))
    }
}

/// Bind the given definitions against the parameters declared by the given topology.
///
/// Checks are performed in order: unknown names, duplicate bindings, type conformance, and
/// finally required parameters which were left unbound.
pub fn bind(topology: &Topology, definitions: &[ParameterDefinition]) -> Result<BoundParameters> {
    let unknown: Vec<String> = definitions
        .iter()
        .filter(|def| topology.parameter(&def.name).is_none())
        .map(|def| def.name.clone())
        .collect();
    if !unknown.is_empty() {
        return Err(AppError::UnknownParameter(unknown));
    }

    let mut seen = HashSet::new();
    if let Some(dup) = definitions.iter().find(|def| !seen.insert(def.name.as_str())) {
        return Err(AppError::DuplicateParameter(dup.name.clone()));
    }

    for def in definitions {
        if let Some(decl) = topology.parameter(&def.name) {
            if !decl.kind.accepts(&def.value) {
                return Err(AppError::TypeMismatch {
                    name: def.name.clone(),
                    expected: decl.kind,
                });
            }
        }
    }

    let mut values = Vec::with_capacity(topology.parameters.len());
    let mut unbound = vec![];
    for decl in topology.parameters.iter() {
        let explicit = definitions.iter().find(|def| def.name == decl.name);
        match (explicit, &decl.default) {
            (Some(def), _) => values.push(BoundParameter {
                name: decl.name.clone(),
                value: def.value.clone(),
                kind: decl.kind,
                source: BindingSource::Explicit,
            }),
            (None, Some(default)) => values.push(BoundParameter {
                name: decl.name.clone(),
                value: default.clone(),
                kind: decl.kind,
                source: BindingSource::Default,
            }),
            (None, None) => unbound.push(decl.name.clone()),
        }
    }
    if !unbound.is_empty() {
        return Err(AppError::UnboundRequired(unbound));
    }

    Ok(BoundParameters {
        topology: topology.name.clone(),
        values,
    })
}

//! Topology parameter declarations & the definitions which bind them.

use serde::{Deserialize, Serialize};

/// The declared type of a topology parameter.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq, Hash)]
pub enum ParameterType {
    #[serde(alias = "string")]
    String,
    /// A string which must never be echoed back in logs or diagnostics.
    #[serde(alias = "secretString")]
    SecretString,
    #[serde(alias = "int")]
    Int,
    #[serde(alias = "double")]
    Double,
    #[serde(alias = "bool")]
    Bool,
}

impl ParameterType {
    /// Check if values of this type must be redacted.
    pub fn is_sensitive(self) -> bool {
        matches!(self, Self::SecretString)
    }

    /// Check if the given opaque value conforms to this type.
    ///
    /// No coercion is performed, the value is always passed along as given.
    pub fn accepts(self, value: &str) -> bool {
        match self {
            Self::String | Self::SecretString => true,
            Self::Int => value.trim().parse::<i64>().is_ok(),
            Self::Double => value.trim().parse::<f64>().is_ok(),
            Self::Bool => value.trim().eq_ignore_ascii_case("true") || value.trim().eq_ignore_ascii_case("false"),
        }
    }
}

impl std::fmt::Display for ParameterType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::String => "String",
                Self::SecretString => "SecretString",
                Self::Int => "Int",
                Self::Double => "Double",
                Self::Bool => "Bool",
            }
        )
    }
}

/// A parameter declared by a topology.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ParameterDeclaration {
    /// The name of this parameter, unique per topology.
    pub name: String,
    /// The declared type of this parameter.
    #[serde(rename = "type")]
    pub kind: ParameterType,
    /// A description of this parameter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// The value used when no definition is given; parameters without a default are required.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

impl ParameterDeclaration {
    /// Create a new required parameter declaration.
    pub fn new(name: impl Into<String>, kind: ParameterType) -> Self {
        Self {
            name: name.into(),
            kind,
            description: None,
            default: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Check if a definition must be given for this parameter.
    pub fn is_required(&self) -> bool {
        self.default.is_none()
    }
}

/// A concrete value bound to a declared parameter at pipeline or job creation time.
#[derive(Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ParameterDefinition {
    /// The name of the declared parameter being bound.
    pub name: String,
    /// The opaque value of this binding.
    pub value: String,
}

impl ParameterDefinition {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

// Definitions carry no type information, so values are never formatted.
impl std::fmt::Debug for ParameterDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParameterDefinition").field("name", &self.name).finish_non_exhaustive()
    }
}

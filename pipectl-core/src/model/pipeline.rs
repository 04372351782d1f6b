//! Live pipeline model.

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::model::ParameterDefinition;

/// The minimum capacity in kbps which may be reserved for a live pipeline.
pub const MIN_BITRATE_KBPS: u32 = 500;
/// The maximum capacity in kbps which may be reserved for a live pipeline.
pub const MAX_BITRATE_KBPS: u32 = 3000;

/// A continuously running instantiation of a live topology.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LivePipeline {
    /// The name of this pipeline, unique within an account.
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// The name of the topology this pipeline instantiates.
    pub topology_name: String,
    /// The capacity in kbps reserved for this pipeline.
    ///
    /// When the source exceeds this capacity the control plane temporarily disconnects from the
    /// source and reconnects once its bitrate is back within capacity.
    pub bitrate_kbps: u32,
    /// The parameter bindings of this pipeline.
    #[serde(default)]
    pub parameters: Vec<ParameterDefinition>,
    /// The state of this pipeline as last observed from the control plane.
    #[serde(default)]
    pub state: LivePipelineState,
}

impl LivePipeline {
    /// Create a new inactive pipeline definition.
    pub fn new(name: impl Into<String>, topology_name: impl Into<String>, bitrate_kbps: u32, parameters: Vec<ParameterDefinition>) -> Self {
        Self {
            name: name.into(),
            description: None,
            topology_name: topology_name.into(),
            bitrate_kbps,
            parameters,
            state: LivePipelineState::Inactive,
        }
    }

    /// Ensure the given bitrate is within the allowed range.
    pub fn check_bitrate(bitrate_kbps: u32) -> Result<()> {
        if (MIN_BITRATE_KBPS..=MAX_BITRATE_KBPS).contains(&bitrate_kbps) {
            Ok(())
        } else {
            Err(AppError::InvalidBitrate(bitrate_kbps))
        }
    }
}

/// The state of a live pipeline.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub enum LivePipelineState {
    /// Created but not consuming its source; the only state from which deletion is allowed.
    Inactive,
    Activating,
    /// Consuming its source.
    Active,
    Deactivating,
}

impl LivePipelineState {
    /// Check if this state is in the middle of a transition.
    pub fn is_transitional(self) -> bool {
        matches!(self, Self::Activating | Self::Deactivating)
    }
}

impl Default for LivePipelineState {
    fn default() -> Self {
        Self::Inactive
    }
}

impl std::fmt::Display for LivePipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Inactive => "Inactive",
                Self::Activating => "Activating",
                Self::Active => "Active",
                Self::Deactivating => "Deactivating",
            }
        )
    }
}

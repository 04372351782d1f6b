//! Pipeline resource models.
//!
//! Topologies are the templates, while live pipelines & pipeline jobs are the
//! instantiations of those templates which are driven through their lifecycles.

mod job;
mod node;
mod parameter;
mod pipeline;
mod topology;

pub use job::{JobError, PipelineJob, PipelineJobState, TimeRange};
pub use node::{
    AacEncoder, Credentials, EncoderPreset, EncoderProcessor, Endpoint, H264Encoder, Node, NodeConfig, NodeRole, RtspSource, RtspTransport, ScaleMode,
    Tunnel, VideoCreationProperties, VideoScale, VideoSink, VideoSource,
};
pub use parameter::{ParameterDeclaration, ParameterDefinition, ParameterType};
pub use pipeline::{LivePipeline, LivePipelineState, MAX_BITRATE_KBPS, MIN_BITRATE_KBPS};
pub use topology::{Sku, Topology, TopologyKind};

/// A convenience trait built around the fact that all remote resources
/// are identified by a name within an account.
pub trait Named {
    /// The kind of this resource, as used in diagnostics.
    const KIND: &'static str;

    /// The name of this object.
    fn name(&self) -> &str;
}

impl Named for Topology {
    const KIND: &'static str = "topology";

    fn name(&self) -> &str {
        &self.name
    }
}

impl Named for LivePipeline {
    const KIND: &'static str = "live pipeline";

    fn name(&self) -> &str {
        &self.name
    }
}

impl Named for PipelineJob {
    const KIND: &'static str = "pipeline job";

    fn name(&self) -> &str {
        &self.name
    }
}

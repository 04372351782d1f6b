//! Topology nodes.
//!
//! Every node shares a `name` and a list of `inputs`, while its role-specific configuration is
//! carried by the `NodeConfig` variant. String fields of a configuration may contain `${name}`
//! parameter references which are substituted by the control plane at activation time.

use serde::{Deserialize, Serialize};

/// The role of a node within a topology graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeRole {
    Source,
    Processor,
    Sink,
}

impl std::fmt::Display for NodeRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Source => "source",
                Self::Processor => "processor",
                Self::Sink => "sink",
            }
        )
    }
}

/// A node of a topology graph.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct Node {
    /// The name of this node, unique per topology.
    pub name: String,
    /// The names of the nodes which feed this node.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<String>,
    /// The role-specific configuration of this node.
    #[serde(flatten)]
    pub config: NodeConfig,
}

impl Node {
    /// Create a new node with no inputs.
    pub fn new(name: impl Into<String>, config: NodeConfig) -> Self {
        Self {
            name: name.into(),
            inputs: vec![],
            config,
        }
    }

    /// Add an input to this node.
    pub fn with_input(mut self, input: impl Into<String>) -> Self {
        self.inputs.push(input.into());
        self
    }

    /// The role of this node.
    pub fn role(&self) -> NodeRole {
        self.config.role()
    }
}

/// Role-specific node configuration.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(tag = "type")]
pub enum NodeConfig {
    /// Ingests live video from an RTSP endpoint.
    RtspSource(RtspSource),
    /// Reads a bounded portion of a previously recorded video.
    VideoSource(VideoSource),
    /// Re-encodes its input.
    EncoderProcessor(EncoderProcessor),
    /// Records its input to a video resource.
    VideoSink(VideoSink),
}

impl NodeConfig {
    /// The role of this configuration.
    pub fn role(&self) -> NodeRole {
        match self {
            Self::RtspSource(_) | Self::VideoSource(_) => NodeRole::Source,
            Self::EncoderProcessor(_) => NodeRole::Processor,
            Self::VideoSink(_) => NodeRole::Sink,
        }
    }

    /// All string values of this configuration which may carry parameter references, paired
    /// with the path of the field which holds them.
    pub fn templated_values(&self) -> Vec<(&'static str, &str)> {
        let mut out = vec![];
        match self {
            Self::RtspSource(src) => {
                out.push(("endpoint.url", src.endpoint.url.as_str()));
                if let Some(creds) = &src.endpoint.credentials {
                    out.push(("endpoint.credentials.username", creds.username.as_str()));
                    out.push(("endpoint.credentials.password", creds.password.as_str()));
                }
                if let Some(tunnel) = &src.endpoint.tunnel {
                    out.push(("endpoint.tunnel.deviceId", tunnel.device_id.as_str()));
                    out.push(("endpoint.tunnel.iotHubName", tunnel.iot_hub_name.as_str()));
                }
            }
            Self::VideoSource(src) => {
                out.push(("videoName", src.video_name.as_str()));
                out.push(("timeSequences", src.time_sequences.as_str()));
            }
            Self::EncoderProcessor(proc) => match &proc.preset {
                EncoderPreset::System { name } => out.push(("preset.name", name.as_str())),
                EncoderPreset::Custom { video_encoder, audio_encoder } => {
                    if let Some(video) = video_encoder {
                        push_opt(&mut out, "preset.videoEncoder.bitrateKbps", &video.bitrate_kbps);
                        push_opt(&mut out, "preset.videoEncoder.frameRate", &video.frame_rate);
                        if let Some(scale) = &video.scale {
                            push_opt(&mut out, "preset.videoEncoder.scale.height", &scale.height);
                            push_opt(&mut out, "preset.videoEncoder.scale.width", &scale.width);
                        }
                    }
                    if let Some(audio) = audio_encoder {
                        push_opt(&mut out, "preset.audioEncoder.bitrateKbps", &audio.bitrate_kbps);
                    }
                }
            },
            Self::VideoSink(sink) => {
                out.push(("videoName", sink.video_name.as_str()));
                if let Some(props) = &sink.video_creation_properties {
                    push_opt(&mut out, "videoCreationProperties.title", &props.title);
                    push_opt(&mut out, "videoCreationProperties.description", &props.description);
                }
            }
        }
        out
    }
}

fn push_opt<'a>(out: &mut Vec<(&'static str, &'a str)>, path: &'static str, val: &'a Option<String>) {
    if let Some(val) = val {
        out.push((path, val.as_str()));
    }
}

/// RTSP source configuration.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RtspSource {
    /// The RTSP transport to use.
    #[serde(default)]
    pub transport: RtspTransport,
    /// The endpoint of the RTSP server.
    pub endpoint: Endpoint,
}

/// The transport used for RTSP traffic.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RtspTransport {
    Tcp,
    Http,
}

impl Default for RtspTransport {
    fn default() -> Self {
        Self::Tcp
    }
}

/// A network endpoint.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    /// The URL of the endpoint.
    pub url: String,
    /// Credentials used to authenticate with the endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<Credentials>,
    /// A tunnel used to reach endpoints which are behind a firewall.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tunnel: Option<Tunnel>,
}

/// Username & password credentials.
#[derive(Clone, Deserialize, Serialize, PartialEq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// A secure remote tunnel established through an IoT device on the camera's network.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Tunnel {
    /// The ID of the IoT device which hosts the tunnel.
    pub device_id: String,
    /// The name of the IoT hub to which the device is registered.
    pub iot_hub_name: String,
}

/// Video source configuration.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VideoSource {
    /// The name of the recorded video to read from.
    pub video_name: String,
    /// Absolute time markers of the portions of the video to read.
    pub time_sequences: String,
}

/// Encoder processor configuration.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EncoderProcessor {
    pub preset: EncoderPreset,
}

/// The encoding preset of an encoder processor.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum EncoderPreset {
    /// A named preset provided by the control plane.
    System { name: String },
    /// Custom encoder settings.
    #[serde(rename_all = "camelCase")]
    Custom {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        video_encoder: Option<H264Encoder>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        audio_encoder: Option<AacEncoder>,
    },
}

/// H.264 video encoder settings. Values may be parameter references.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct H264Encoder {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bitrate_kbps: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame_rate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<VideoScale>,
}

/// Video scaling settings.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VideoScale {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<String>,
    pub mode: ScaleMode,
}

/// The scaling mode used when resizing video.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub enum ScaleMode {
    Pad,
    PreserveAspectRatio,
    Stretch,
}

/// AAC audio encoder settings.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AacEncoder {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bitrate_kbps: Option<String>,
}

/// Video sink configuration.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VideoSink {
    /// The name of the video resource to record to.
    pub video_name: String,
    /// Properties applied when the sink creates the video resource.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_creation_properties: Option<VideoCreationProperties>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VideoCreationProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

//! Canonical topologies.
//!
//! These are the topologies driven by the operator's scenarios: ingestion of an RTSP camera into
//! a video resource, optionally through a device tunnel, and export of a recorded clip.

use crate::model::{
    AacEncoder, Credentials, EncoderPreset, EncoderProcessor, Endpoint, H264Encoder, Node, NodeConfig, ParameterDeclaration, ParameterType, RtspSource,
    RtspTransport, ScaleMode, Topology, TopologyKind, Tunnel, VideoCreationProperties, VideoScale, VideoSink, VideoSource,
};

pub const RTSP_URL_PARAMETER: &str = "rtspUrlParameter";
pub const RTSP_USERNAME_PARAMETER: &str = "rtspUserNameParameter";
pub const RTSP_PASSWORD_PARAMETER: &str = "rtspPasswordParameter";
pub const VIDEO_NAME_PARAMETER: &str = "videoNameParameter";
pub const VIDEO_SOURCE_VIDEO_NAME_PARAMETER: &str = "videoSourceVideoNameParameter";
pub const VIDEO_SOURCE_TIME_SEQUENCE_PARAMETER: &str = "videoSourceTimeSequenceParameter";
pub const VIDEO_SINK_NAME_PARAMETER: &str = "videoSinkNameParameter";

const RTSP_SOURCE_NODE: &str = "rtspSource";
const VIDEO_SOURCE_NODE: &str = "videoSource";
const ENCODER_NODE: &str = "encoderProcessor";
const VIDEO_SINK_NODE: &str = "videoSink";

/// Build a `${name}` reference to the given parameter.
pub fn param_ref(name: &str) -> String {
    format!("${{{}}}", name)
}

fn video_creation_properties() -> VideoCreationProperties {
    VideoCreationProperties {
        title: Some("Parking Lot (Camera 1)".into()),
        description: Some("Parking lot south entrance".into()),
    }
}

/// A live topology which records an RTSP camera to a video resource.
///
/// When a tunnel is given, the RTSP endpoint is reached through the tunnel's IoT device, which
/// allows for ingesting cameras behind a firewall.
pub fn live_ingest_topology(name: &str, tunnel: Option<Tunnel>) -> Topology {
    let description = match tunnel {
        Some(_) => "The pipeline topology with tunneling between rtsp source and video sink.",
        None => "The pipeline topology with rtsp source and video sink.",
    };
    let source = RtspSource {
        transport: RtspTransport::Tcp,
        endpoint: Endpoint {
            url: param_ref(RTSP_URL_PARAMETER),
            credentials: Some(Credentials {
                username: param_ref(RTSP_USERNAME_PARAMETER),
                password: param_ref(RTSP_PASSWORD_PARAMETER),
            }),
            tunnel,
        },
    };
    let sink = VideoSink {
        video_name: param_ref(VIDEO_NAME_PARAMETER),
        video_creation_properties: Some(video_creation_properties()),
    };

    Topology::new(name, TopologyKind::Live)
        .with_description(description)
        .with_parameter(ParameterDeclaration::new(RTSP_USERNAME_PARAMETER, ParameterType::SecretString).with_description("rtsp user name parameter"))
        .with_parameter(ParameterDeclaration::new(RTSP_PASSWORD_PARAMETER, ParameterType::SecretString))
        .with_parameter(ParameterDeclaration::new(RTSP_URL_PARAMETER, ParameterType::String))
        .with_parameter(ParameterDeclaration::new(VIDEO_NAME_PARAMETER, ParameterType::String))
        .with_node(Node::new(RTSP_SOURCE_NODE, NodeConfig::RtspSource(source)))
        .with_node(Node::new(VIDEO_SINK_NODE, NodeConfig::VideoSink(sink)).with_input(RTSP_SOURCE_NODE))
}

/// A batch topology which re-encodes a time range of a recorded video into a new video resource.
pub fn batch_export_topology(name: &str) -> Topology {
    let source = VideoSource {
        video_name: param_ref(VIDEO_SOURCE_VIDEO_NAME_PARAMETER),
        time_sequences: param_ref(VIDEO_SOURCE_TIME_SEQUENCE_PARAMETER),
    };
    let encoder = EncoderProcessor {
        preset: EncoderPreset::Custom {
            video_encoder: Some(H264Encoder {
                bitrate_kbps: Some("3500".into()),
                frame_rate: Some("30".into()),
                scale: Some(VideoScale {
                    height: Some("3840".into()),
                    width: Some("2160".into()),
                    mode: ScaleMode::Pad,
                }),
            }),
            audio_encoder: Some(AacEncoder {
                bitrate_kbps: Some("96".into()),
            }),
        },
    };
    let sink = VideoSink {
        video_name: param_ref(VIDEO_SINK_NAME_PARAMETER),
        video_creation_properties: Some(video_creation_properties()),
    };

    Topology::new(name, TopologyKind::Batch)
        .with_parameter(
            ParameterDeclaration::new(VIDEO_SOURCE_VIDEO_NAME_PARAMETER, ParameterType::String).with_description("video source video name parameter"),
        )
        .with_parameter(ParameterDeclaration::new(VIDEO_SOURCE_TIME_SEQUENCE_PARAMETER, ParameterType::String))
        .with_parameter(ParameterDeclaration::new(VIDEO_SINK_NAME_PARAMETER, ParameterType::String))
        .with_node(Node::new(VIDEO_SOURCE_NODE, NodeConfig::VideoSource(source)))
        .with_node(Node::new(ENCODER_NODE, NodeConfig::EncoderProcessor(encoder)).with_input(VIDEO_SOURCE_NODE))
        .with_node(Node::new(VIDEO_SINK_NODE, NodeConfig::VideoSink(sink)).with_input(ENCODER_NODE))
}

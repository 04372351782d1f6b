use anyhow::{bail, Result};

use crate::error::AppError;
use crate::model::*;
use crate::template::{batch_export_topology, live_ingest_topology, param_ref, VIDEO_NAME_PARAMETER};
use crate::validation::parameter_references;

fn encoder() -> NodeConfig {
    NodeConfig::EncoderProcessor(EncoderProcessor {
        preset: EncoderPreset::System {
            name: "SingleLayer_1080p_H264_AAC".into(),
        },
    })
}

fn sink(video_name: &str) -> NodeConfig {
    NodeConfig::VideoSink(VideoSink {
        video_name: video_name.into(),
        video_creation_properties: None,
    })
}

fn video_source() -> NodeConfig {
    NodeConfig::VideoSource(VideoSource {
        video_name: "camera-001".into(),
        time_sequences: r#"[["2021-01-01T00:00:00Z","2021-01-01T00:00:05Z"]]"#.into(),
    })
}

/// Validate the given topology, returning the violations found.
fn violations(topology: &Topology) -> Result<Vec<String>> {
    match topology.validate() {
        Ok(()) => bail!("expected topology `{}` to be rejected", topology.name),
        Err(AppError::InvalidTopology(errs)) => Ok(errs),
        Err(err) => bail!("expected InvalidTopology error, got {:?}", err),
    }
}

fn assert_violation(errs: &[String], needle: &str) {
    assert!(
        errs.iter().any(|err| err.contains(needle)),
        "expected a violation containing `{}`, got {:?}",
        needle,
        errs
    );
}

#[test]
fn canonical_topologies_pass_validation() -> Result<()> {
    live_ingest_topology("PublicIngestionTopology-1", None).validate()?;
    batch_export_topology("ExportBatchTopology-1").validate()?;
    Ok(())
}

#[test]
fn unknown_input_is_rejected() -> Result<()> {
    let mut topology = batch_export_topology("ExportBatchTopology-1");
    topology.nodes[2].inputs = vec!["nope".into()];
    let errs = violations(&topology)?;
    assert_violation(&errs, "input `nope` references a node which does not exist");
    Ok(())
}

#[test]
fn cycle_is_rejected() -> Result<()> {
    let topology = Topology::new("cyclic", TopologyKind::Batch)
        .with_node(Node::new("videoSource", video_source()))
        .with_node(Node::new("first", encoder()).with_input("videoSource").with_input("second"))
        .with_node(Node::new("second", encoder()).with_input("first"))
        .with_node(Node::new("videoSink", sink("out")).with_input("second"));
    let errs = violations(&topology)?;
    assert_eq!(errs.len(), 2, "expected the cycle & its forward reference to be reported, got {:?}", errs);
    assert_violation(&errs, "contains a cycle");
    assert_violation(&errs, "input `second` references a node declared after it");
    Ok(())
}

#[test]
fn forward_references_are_rejected() -> Result<()> {
    let mut topology = batch_export_topology("ExportBatchTopology-1");
    topology.nodes.reverse();
    let errs = violations(&topology)?;
    assert_eq!(errs.len(), 2, "expected only the forward references to be reported, got {:?}", errs);
    assert_violation(&errs, "node `videoSink` input `encoderProcessor` references a node declared after it");
    assert_violation(&errs, "node `encoderProcessor` input `videoSource` references a node declared after it");
    Ok(())
}

#[test]
fn self_reference_and_duplicate_inputs_are_rejected() -> Result<()> {
    let topology = Topology::new("selfish", TopologyKind::Batch)
        .with_node(Node::new("videoSource", video_source()))
        .with_node(Node::new("encoder", encoder()).with_input("videoSource").with_input("videoSource").with_input("encoder"))
        .with_node(Node::new("videoSink", sink("out")).with_input("encoder"));
    let errs = violations(&topology)?;
    assert_violation(&errs, "input `videoSource` is a duplicate");
    assert_violation(&errs, "can not reference itself");
    Ok(())
}

#[test]
fn role_constraints_are_enforced() -> Result<()> {
    let topology = Topology::new("roles", TopologyKind::Batch)
        .with_node(Node::new("videoSource", video_source()).with_input("videoSink"))
        .with_node(Node::new("encoder", encoder()))
        .with_node(Node::new("videoSink", sink("out")).with_input("videoSource"));
    let errs = violations(&topology)?;
    assert_violation(&errs, "source `videoSource` can not have inputs");
    assert_violation(&errs, "processor `encoder` must have at least one input");
    assert_violation(&errs, "sinks can not be used as inputs");
    Ok(())
}

#[test]
fn missing_sources_and_sinks_are_rejected() -> Result<()> {
    let topology = Topology::new("empty", TopologyKind::Live);
    let errs = violations(&topology)?;
    assert_violation(&errs, "must have at least one source");
    assert_violation(&errs, "must have at least one sink");
    Ok(())
}

#[test]
fn duplicate_and_malformed_names_are_rejected() -> Result<()> {
    let mut topology = batch_export_topology("bad name");
    topology.nodes[1].name = "videoSource".into();
    topology.nodes[2].inputs = vec!["videoSource".into()];
    topology.parameters.push(ParameterDeclaration::new(VIDEO_NAME_PARAMETER, ParameterType::String));
    topology.parameters.push(ParameterDeclaration::new(VIDEO_NAME_PARAMETER, ParameterType::String));
    let errs = violations(&topology)?;
    assert_violation(&errs, "topology name `bad name` is invalid");
    assert_violation(&errs, "node name `videoSource` is not unique");
    assert_violation(&errs, &format!("parameter `{}` is declared more than once", VIDEO_NAME_PARAMETER));
    Ok(())
}

#[test]
fn undeclared_parameter_reference_is_rejected() -> Result<()> {
    let mut topology = live_ingest_topology("PublicIngestionTopology-1", None);
    topology.parameters.retain(|param| param.name != VIDEO_NAME_PARAMETER);
    let errs = violations(&topology)?;
    assert_eq!(errs.len(), 1, "expected a single violation, got {:?}", errs);
    assert_violation(&errs, &format!("references parameter `{}` which is not declared", VIDEO_NAME_PARAMETER));
    Ok(())
}

#[test]
fn malformed_parameter_reference_is_rejected() -> Result<()> {
    let topology = Topology::new("malformed", TopologyKind::Batch)
        .with_node(Node::new("videoSource", video_source()))
        .with_node(Node::new("videoSink", sink("${videoSinkNameParameter")).with_input("videoSource"));
    let errs = violations(&topology)?;
    assert_violation(&errs, "field `videoName`: unterminated parameter reference");
    Ok(())
}

#[test]
fn parameter_references_are_extracted() {
    let value = format!("rtsp://{}/{}", param_ref("host"), param_ref("path"));
    assert_eq!(parameter_references(&value), Ok(vec!["host", "path"]));
    assert_eq!(parameter_references("no references"), Ok(vec![]));
    assert!(parameter_references("${}").is_err(), "expected empty reference to be malformed");
    assert!(parameter_references("${bad name}").is_err(), "expected reference with a space to be malformed");
    assert!(parameter_references("${ok} ${").is_err(), "expected unterminated reference to be malformed");
}

#[test]
fn parameter_default_must_conform_to_type() -> Result<()> {
    let topology = batch_export_topology("ExportBatchTopology-1").with_parameter(ParameterDeclaration::new("frameRate", ParameterType::Int).with_default("thirty"));
    let errs = violations(&topology)?;
    assert_violation(&errs, "parameter `frameRate` default does not conform to its declared type `Int`");
    Ok(())
}

#[test]
fn kind_must_match_sku_and_sources() -> Result<()> {
    let mut topology = batch_export_topology("ExportBatchTopology-1");
    topology.kind = TopologyKind::Live;
    let errs = violations(&topology)?;
    assert_violation(&errs, "is of kind Live but uses the BatchS1 sku");
    assert_violation(&errs, "source `videoSource` can not be used in a Live topology");
    Ok(())
}

#[test]
fn all_violations_are_collected() -> Result<()> {
    let mut topology = live_ingest_topology("PublicIngestionTopology-1", None);
    topology.sku = Sku::BatchS1;
    topology.nodes[1].inputs = vec!["missing".into()];
    topology.parameters.clear();
    let errs = violations(&topology)?;
    assert!(errs.len() >= 5, "expected every violation to be reported, got {:?}", errs);
    let display = AppError::InvalidTopology(errs.clone()).to_string();
    assert!(display.contains("; "), "expected violations to be joined in display output, got {}", display);
    Ok(())
}

#[test]
fn topology_documents_load_and_validate() -> Result<()> {
    let original = batch_export_topology("ExportBatchTopology-1");
    let doc = original.to_yaml()?;
    assert!(doc.contains("Batch_S1"), "expected sku to be encoded by its canonical name, got {}", doc);
    assert!(doc.contains("type: EncoderProcessor"), "expected node variants to be tagged, got {}", doc);
    let loaded = Topology::from_yaml(&doc)?;
    loaded.validate()?;
    assert_eq!(loaded, original, "expected loaded topology to match");

    let res = Topology::from_yaml("name: x\nkind: Live\nsku: Live_S1\nnodes:\n  - name: a\n    type: Teleporter\n");
    assert!(matches!(res, Err(AppError::InvalidTopology(_))), "expected unknown node type to be rejected, got {:?}", res);
    Ok(())
}

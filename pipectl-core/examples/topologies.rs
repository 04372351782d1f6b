//! A script used to write the canonical topologies as YAML documents.
//!
//! Any time a canonical topology changes, this script can be run to ensure that the documents
//! under `topologies/` are up-to-date.

use anyhow::{Context, Result};
use pipectl_core::model::Tunnel;
use pipectl_core::template::{batch_export_topology, live_ingest_topology};

fn main() -> Result<()> {
    let canon = std::fs::canonicalize("..").context("error getting canonical path of current dir")?;
    let out_path = canon.join("topologies");
    std::fs::create_dir_all(&out_path).with_context(|| format!("error creating output dir {:?}", &out_path))?;

    let tunnel = Tunnel {
        device_id: "camera-gateway-1".into(),
        iot_hub_name: "pipectl-hub".into(),
    };
    let topologies = [
        ("live-ingest.yaml", live_ingest_topology("PublicIngestionTopology-1", None)),
        ("ingest-behind-firewall.yaml", live_ingest_topology("PrivateIngestionTopology-1", Some(tunnel))),
        ("batch-export.yaml", batch_export_topology("ExportBatchTopology-1")),
    ];
    for (file, topology) in topologies {
        let yaml = topology.to_yaml().with_context(|| format!("error serializing topology {} to yaml", topology.name))?;
        std::fs::write(out_path.join(file), &yaml).with_context(|| format!("error writing topology {} to {:?}", topology.name, &out_path))?;
        println!("Topology {} written to {:?}", topology.name, out_path.join(file));
    }

    Ok(())
}

use std::error::Error;
use std::fs;
use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::network::graph::{BoundingBox, Network};
use crate::setup::init_types::NetworkFile;

/// Provides the street graph for an area. How the graph is obtained is up to
/// the implementation.
pub trait NetworkSource {
    fn load(&self, bbox: &BoundingBox) -> Result<Network, Box<dyn Error>>;
}

/// Reads a network exported to JSON (`{"nodes": [...], "links": [...]}`).
pub struct JsonNetworkSource {
    path: PathBuf,
}

impl JsonNetworkSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonNetworkSource { path: path.into() }
    }
}

impl NetworkSource for JsonNetworkSource {
    fn load(&self, bbox: &BoundingBox) -> Result<Network, Box<dyn Error>> {
        let content = fs::read_to_string(&self.path)
            .map_err(|e| format!("failed to read network file {}: {}", self.path.display(), e))?;
        let file: NetworkFile = serde_json::from_str(&content)?;
        info!(
            "Loaded network file {} ({} nodes, {} links)",
            self.path.display(),
            file.nodes.len(),
            file.links.len()
        );
        network_from_file(file, bbox)
    }
}

/// Keeps the nodes inside `bbox` and the links between kept nodes.
pub fn network_from_file(file: NetworkFile, bbox: &BoundingBox) -> Result<Network, Box<dyn Error>> {
    let mut net = Network::new();
    for record in file.nodes {
        if !bbox.contains(record.x, record.y) {
            continue;
        }
        net.add_intersection(record.id, record.x, record.y)?;
        if let Some(name) = record.name.filter(|n| !n.trim().is_empty()) {
            if let Some(node) = net.nodes.last_mut() {
                node.name = name;
            }
        }
    }

    let mut skipped = 0;
    for link in file.links {
        if net.node(link.from).is_none() || net.node(link.to).is_none() {
            skipped += 1;
            continue;
        }
        net.add_link(link.from, link.to, link.length_km, link.oneway)?;
    }
    if skipped > 0 {
        debug!("Skipped {} links leaving the bounding box", skipped);
    }
    if net.intersections().next().is_none() {
        warn!("No intersections inside bounding box {:?}", bbox);
    }

    Ok(net)
}

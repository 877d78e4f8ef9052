use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::ConfigError;
use crate::distance::{create_dm, DistanceMatrix};
use crate::domain::types::{Link, Node, NodeType};

const EARTH_RADIUS_KM: f64 = 6371.0088;

/// Geographic area requested from a network source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub longitude_west: f64,
    pub longitude_east: f64,
    pub latitude_south: f64,
    pub latitude_north: f64,
}

impl BoundingBox {
    pub fn contains(&self, x: f64, y: f64) -> bool {
        (self.longitude_west..=self.longitude_east).contains(&x)
            && (self.latitude_south..=self.latitude_north).contains(&y)
    }
}

/// Great-circle distance in km between two (lon, lat) points.
pub fn haversine_km(a: (f64, f64), b: (f64, f64)) -> f64 {
    let (lon1, lat1) = (a.0.to_radians(), a.1.to_radians());
    let (lon2, lat2) = (b.0.to_radians(), b.1.to_radians());
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

/// Street network: intersections joined by directed links, plus load points
/// and businesses attached to their closest intersection.
#[derive(Debug, Clone, Default)]
pub struct Network {
    pub nodes: Vec<Node>,
    pub links: Vec<Link>,
    by_id: HashMap<u64, usize>,
    sdm: Option<DistanceMatrix>,
}

impl Network {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(&self, id: u64) -> Option<&Node> {
        self.by_id.get(&id).map(|&ind| &self.nodes[ind])
    }

    pub fn intersections(&self) -> impl Iterator<Item = &Node> {
        self.nodes
            .iter()
            .filter(|node| node.node_type == NodeType::Intersection)
    }

    pub fn load_points(&self) -> impl Iterator<Item = &Node> {
        self.nodes
            .iter()
            .filter(|node| node.node_type == NodeType::LoadPoint)
    }

    pub fn businesses(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(|node| node.node_type.is_business())
    }

    pub fn next_free_id(&self) -> u64 {
        self.nodes.iter().map(|node| node.id + 1).max().unwrap_or(0)
    }

    pub fn add_intersection(&mut self, id: u64, x: f64, y: f64) -> Result<(), ConfigError> {
        self.push_node(Node::intersection(id, x, y))
    }

    /// Adds a link between two intersections. Two-way streets become a pair of
    /// directed links.
    pub fn add_link(&mut self, from: u64, to: u64, weight: f64, directed: bool) -> Result<(), ConfigError> {
        if !(weight.is_finite() && weight >= 0.0) {
            return Err(ConfigError::InvalidLink { from, to, weight });
        }
        for id in [from, to] {
            match self.node(id) {
                Some(node) if node.node_type == NodeType::Intersection => {}
                _ => return Err(ConfigError::UnknownNode(id)),
            }
        }

        self.links.push(Link { from, to, weight });
        if !directed {
            self.links.push(Link {
                from: to,
                to: from,
                weight,
            });
        }
        self.sdm = None;
        Ok(())
    }

    /// Attaches a load point or business and links it to its nearest intersection.
    pub fn attach(&mut self, mut node: Node) -> Result<u64, ConfigError> {
        let closest = self
            .closest_intersection(node.x, node.y)
            .ok_or(ConfigError::NoIntersections)?;
        node.closest_itsc = Some(closest);
        let id = node.id;
        self.push_node(node)?;
        Ok(id)
    }

    pub fn closest_intersection(&self, x: f64, y: f64) -> Option<u64> {
        self.intersections()
            .map(|itsc| (itsc.id, haversine_km((x, y), (itsc.x, itsc.y))))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(id, _)| id)
    }

    /// Distance in km from a node to its closest intersection.
    pub fn itsc_distance(&self, node: &Node) -> f64 {
        node.closest_itsc
            .and_then(|id| self.node(id))
            .map(|itsc| haversine_km((node.x, node.y), (itsc.x, itsc.y)))
            .unwrap_or(0.0)
    }

    /// Computes the intersection distance matrix.
    pub fn build_sdm(&mut self) -> Result<&DistanceMatrix, ConfigError> {
        let ids: Vec<u64> = self.intersections().map(|node| node.id).collect();
        let dm = create_dm(&ids, &self.links)?;
        info!(
            "Network ready: {} intersections, {} links, {} attached nodes",
            ids.len(),
            self.links.len(),
            self.nodes.len() - ids.len()
        );
        Ok(&*self.sdm.insert(dm))
    }

    pub fn sdm(&self) -> Option<&DistanceMatrix> {
        self.sdm.as_ref()
    }

    /// Regular grid of two-way streets, `spacing_km` apart. Node ids are
    /// `row * cols + col`.
    pub fn grid(rows: usize, cols: usize, spacing_km: f64) -> Result<Network, ConfigError> {
        // ~111.32 km per degree near the equator keeps coordinates plausible
        let step = spacing_km / 111.32;
        let mut net = Network::new();
        for row in 0..rows {
            for col in 0..cols {
                let id = (row * cols + col) as u64;
                net.add_intersection(id, col as f64 * step, row as f64 * step)?;
            }
        }
        for row in 0..rows {
            for col in 0..cols {
                let id = (row * cols + col) as u64;
                if col + 1 < cols {
                    net.add_link(id, id + 1, spacing_km, false)?;
                }
                if row + 1 < rows {
                    net.add_link(id, id + cols as u64, spacing_km, false)?;
                }
            }
        }
        debug!("Built {}x{} grid network", rows, cols);
        Ok(net)
    }

    fn push_node(&mut self, node: Node) -> Result<(), ConfigError> {
        if self.by_id.contains_key(&node.id) {
            return Err(ConfigError::DuplicateNode(node.id));
        }
        // attached nodes ride on their intersection, the matrix stays valid
        if node.node_type == NodeType::Intersection {
            self.sdm = None;
        }
        self.by_id.insert(node.id, self.nodes.len());
        self.nodes.push(node);
        Ok(())
    }
}

use std::error::Error;

use tracing::{info, span, warn, Level};

use crate::config::{ConfigError, NetworkSettings, SourceSettings};
use crate::distance::matrix::print_dist_matrix;
use crate::domain::types::{Node, NodeType};
use crate::network::business::{attach_businesses, read_businesses};
use crate::network::{BoundingBox, JsonNetworkSource, Network, NetworkSource};

const WHOLE_WORLD: BoundingBox = BoundingBox {
    longitude_west: -180.0,
    longitude_east: 180.0,
    latitude_south: -90.0,
    latitude_north: 90.0,
};

/// Builds the street network described by `settings`, attaches businesses and
/// the load point, and computes the distance matrix. Returns the network and
/// its load point.
pub fn setup(settings: &NetworkSettings) -> Result<(Network, Node), Box<dyn Error>> {
    let setup_span = span!(Level::INFO, "setup");
    let _guard = setup_span.enter();

    let bbox = settings.bbox.unwrap_or(WHOLE_WORLD);
    let mut net = match &settings.source {
        SourceSettings::Json { path } => JsonNetworkSource::new(path).load(&bbox)?,
        SourceSettings::Grid {
            rows,
            cols,
            spacing_km,
        } => Network::grid(*rows, *cols, *spacing_km)?,
    };

    match &settings.businesses {
        Some(path) => {
            let rows = read_businesses(path)?;
            let attached = attach_businesses(&mut net, &rows, settings.bbox.as_ref())?;
            info!("{} businesses attached to the network", attached);
        }
        None => warn!("No business table configured, the network has no delivery targets"),
    }

    let load_point = Node {
        id: net.next_free_id(),
        name: settings.load_point.name.clone(),
        x: settings.load_point.x,
        y: settings.load_point.y,
        node_type: NodeType::LoadPoint,
        closest_itsc: None,
    };
    let id = net.attach(load_point)?;
    let load_point = net.node(id).cloned().ok_or(ConfigError::MissingLoadPoint)?;

    let sdm = net.build_sdm()?;
    if sdm.size() <= 16 {
        print_dist_matrix(sdm);
    }
    Ok((net, load_point))
}

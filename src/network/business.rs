use std::error::Error;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use csv::ReaderBuilder;
use tracing::{debug, info, warn};

use crate::config::ConfigError;
use crate::domain::types::{Node, NodeType};
use crate::network::graph::{BoundingBox, Network};
use crate::setup::init_types::BusinessRow;

const LODGING: [&str; 4] = ["hotel", "hostel", "apartment", "guest_house"];
const FOOD_DINING: [&str; 6] = ["restaurant", "cafe", "fast_food", "fast-food", "bar", "nightclub"];
const CONVENIENCE: [&str; 4] = ["supermarket", "convenience", "greengrocer", "greengroser"];
const OFFICE_SERVICES: [&str; 29] = [
    "bank", "cobbler", "hairdresser", "watchmaker", "tattoo", "beauty", "copyshop", "optician",
    "trophy", "post_office", "travel_agency", "estate_agent", "kiosk", "diplomatic", "government",
    "newspaper", "association", "architect", "lawyer", "financial", "insurance",
    "employment_agency", "accountant", "company", "newsagent", "laundry", "dentist", "photo",
    "pharmacy",
];
const OTHERS: [&str; 14] = [
    "museum", "place_of_worship", "school", "university", "kindergarten", "library",
    "auction_house", "religion", "art", "educational_institution", "research", "ticket",
    "lottery", "vacant",
];

/// Maps OSM tags of a business row onto a node category. An explicit
/// `CATEGORY` column wins over tags.
pub fn categorize(row: &BusinessRow) -> Result<NodeType, ConfigError> {
    if let Some(code) = row.category.as_deref().filter(|c| !c.trim().is_empty()) {
        return code.parse();
    }

    let tags = [&row.tourism, &row.amenity, &row.shop, &row.office];
    for tag in tags.into_iter().flatten() {
        let tag = tag.trim();
        if LODGING.contains(&tag) {
            return Ok(NodeType::LodgingBusiness);
        }
        if FOOD_DINING.contains(&tag) {
            return Ok(NodeType::FoodDining);
        }
        if CONVENIENCE.contains(&tag) {
            return Ok(NodeType::ConvenienceStore);
        }
        if OFFICE_SERVICES.contains(&tag) {
            return Ok(NodeType::OfficeServices);
        }
        if OTHERS.contains(&tag) {
            return Ok(NodeType::Other);
        }
    }

    if row.shop.as_deref().is_some_and(|s| !s.trim().is_empty()) {
        Ok(NodeType::VariousShops)
    } else if row.office.as_deref().is_some_and(|s| !s.trim().is_empty()) {
        Ok(NodeType::OfficeServices)
    } else {
        Ok(NodeType::Other)
    }
}

/// Reads a business table. Tab and comma separated files are both accepted.
pub fn read_businesses(path: &Path) -> Result<Vec<BusinessRow>, Box<dyn Error>> {
    let mut header = String::new();
    BufReader::new(File::open(path)?).read_line(&mut header)?;
    let delimiter = if header.contains('\t') { b'\t' } else { b',' };

    let rows = read_businesses_from(File::open(path)?, delimiter)?;
    info!("Loaded {} businesses from {}", rows.len(), path.display());
    Ok(rows)
}

pub fn read_businesses_from<R: Read>(reader: R, delimiter: u8) -> Result<Vec<BusinessRow>, Box<dyn Error>> {
    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let mut rows = Vec::new();
    for record in reader.deserialize::<BusinessRow>() {
        let row = record?;
        if row.name.as_deref().map_or(true, |n| n.trim().is_empty()) {
            continue;
        }
        rows.push(row);
    }
    Ok(rows)
}

/// Attaches businesses inside `bbox` to the network. Returns the number attached.
pub fn attach_businesses(
    net: &mut Network,
    rows: &[BusinessRow],
    bbox: Option<&BoundingBox>,
) -> Result<usize, ConfigError> {
    let mut next_id = net.next_free_id();
    let mut attached = 0;
    for row in rows {
        if bbox.is_some_and(|b| !b.contains(row.lon, row.lat)) {
            continue;
        }
        let node_type = match categorize(row) {
            Ok(node_type) => node_type,
            Err(e) => {
                warn!("Skipping business {:?}: {}", row.name, e);
                continue;
            }
        };
        if !node_type.is_business() {
            continue;
        }

        net.attach(Node {
            id: next_id,
            name: row.name.clone().unwrap_or_default(),
            x: row.lon,
            y: row.lat,
            node_type,
            closest_itsc: None,
        })?;
        next_id += 1;
        attached += 1;
    }
    debug!("Attached {} of {} businesses", attached, rows.len());
    Ok(attached)
}

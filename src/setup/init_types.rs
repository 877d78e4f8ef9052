use serde::Deserialize;

/// Struct to match the JSON network export
#[derive(Debug, Deserialize)]
pub struct NetworkFile {
    pub nodes: Vec<NodeRecord>,
    pub links: Vec<LinkRecord>,
}

#[derive(Debug, Deserialize)]
pub struct NodeRecord {
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
    /// Longitude.
    pub x: f64,
    /// Latitude.
    pub y: f64,
}

#[derive(Debug, Deserialize)]
pub struct LinkRecord {
    pub from: u64,
    pub to: u64,
    #[serde(alias = "length")]
    pub length_km: f64,
    #[serde(default)]
    pub oneway: bool,
}

/// Row of the business table. Column names follow the OSM export, where `X`
/// holds the latitude and `Y` the longitude.
#[derive(Debug, Clone, Deserialize)]
pub struct BusinessRow {
    #[serde(rename = "NAME", default)]
    pub name: Option<String>,
    #[serde(rename = "AMENITY", default)]
    pub amenity: Option<String>,
    #[serde(rename = "SHOP", default)]
    pub shop: Option<String>,
    #[serde(rename = "TOURISM", default)]
    pub tourism: Option<String>,
    #[serde(rename = "OFFICE", default)]
    pub office: Option<String>,
    #[serde(rename = "CATEGORY", default)]
    pub category: Option<String>,
    #[serde(rename = "X")]
    pub lat: f64,
    #[serde(rename = "Y")]
    pub lon: f64,
}

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// Closed set of node categories. Serialized with the short codes used in
/// business tables and probability maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NodeType {
    #[serde(rename = "N")]
    Intersection,
    #[serde(rename = "L")]
    LoadPoint,
    #[serde(rename = "L_B")]
    LodgingBusiness,
    #[serde(rename = "F_D")]
    FoodDining,
    #[serde(rename = "C_S")]
    ConvenienceStore,
    #[serde(rename = "V_S")]
    VariousShops,
    #[serde(rename = "O_S")]
    OfficeServices,
    #[serde(rename = "O")]
    Other,
}

impl NodeType {
    pub const ALL: [NodeType; 8] = [
        NodeType::Intersection,
        NodeType::LoadPoint,
        NodeType::LodgingBusiness,
        NodeType::FoodDining,
        NodeType::ConvenienceStore,
        NodeType::VariousShops,
        NodeType::OfficeServices,
        NodeType::Other,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            NodeType::Intersection => "N",
            NodeType::LoadPoint => "L",
            NodeType::LodgingBusiness => "L_B",
            NodeType::FoodDining => "F_D",
            NodeType::ConvenienceStore => "C_S",
            NodeType::VariousShops => "V_S",
            NodeType::OfficeServices => "O_S",
            NodeType::Other => "O",
        }
    }

    /// True for categories that can receive deliveries.
    pub fn is_business(&self) -> bool {
        !matches!(self, NodeType::Intersection | NodeType::LoadPoint)
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for NodeType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // "S_O" is an alternative spelling found in some business exports
        match s.trim() {
            "N" => Ok(NodeType::Intersection),
            "L" => Ok(NodeType::LoadPoint),
            "L_B" => Ok(NodeType::LodgingBusiness),
            "F_D" => Ok(NodeType::FoodDining),
            "C_S" => Ok(NodeType::ConvenienceStore),
            "V_S" => Ok(NodeType::VariousShops),
            "O_S" | "S_O" => Ok(NodeType::OfficeServices),
            "O" => Ok(NodeType::Other),
            other => Err(ConfigError::UnknownCategory(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: u64,
    pub name: String,
    /// Longitude.
    pub x: f64,
    /// Latitude.
    pub y: f64,
    pub node_type: NodeType,
    /// Nearest intersection. Intersections point at themselves.
    pub closest_itsc: Option<u64>,
}

impl Node {
    pub fn intersection(id: u64, x: f64, y: f64) -> Self {
        Node {
            id,
            name: format!("ITSC{}", id),
            x,
            y,
            node_type: NodeType::Intersection,
            closest_itsc: Some(id),
        }
    }
}

/// Directed edge, weight in kilometers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub from: u64,
    pub to: u64,
    pub weight: f64,
}

/// One delivery job from the load point to a business.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub id: usize,
    pub origin: u64,
    pub destination: u64,
    pub destination_itsc: u64,
    /// Grams.
    pub weight: u64,
    /// Millimeters.
    pub length: u64,
    pub width: u64,
    pub height: u64,
    /// Cubic millimeters, always `length * width * height`.
    pub volume: u64,
    /// Distance between the destination and its closest intersection (km).
    pub itsc_distance: f64,
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}: {}", self.origin, self.destination, self.weight)
    }
}

/// Fuel model of a motorized vehicle class.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EmissionModel {
    /// Litres per 100 km.
    pub consumption: f64,
    /// kg CO2 per litre of fuel.
    pub emission_factor: f64,
}

impl EmissionModel {
    pub fn co2_kg(&self, distance_km: f64) -> f64 {
        distance_km * self.consumption / 100.0 * self.emission_factor
    }
}

/// Configuration record of a vehicle class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleProfile {
    pub name: String,
    /// Grams.
    pub vehicle_capacity: u64,
    /// Millimeters.
    pub cargo_length: u64,
    pub cargo_width: u64,
    pub cargo_height: u64,
    /// km/h.
    pub average_speed: f64,
    /// Maximum shift distance in km.
    #[serde(alias = "distance")]
    pub max_distance: f64,
    /// Maximum shift time in minutes.
    #[serde(alias = "time")]
    pub max_time: f64,
    /// Minutes spent at every stop.
    pub service_time: f64,
    #[serde(default)]
    pub emissions: Option<EmissionModel>,
}

impl VehicleProfile {
    pub fn cargo_volume(&self) -> u64 {
        self.cargo_length
            .saturating_mul(self.cargo_width)
            .saturating_mul(self.cargo_height)
    }

    /// Meters per minute.
    pub fn speed_m_per_min(&self) -> f64 {
        self.average_speed * 1000.0 / 60.0
    }

    pub fn co2_kg(&self, distance_km: f64) -> f64 {
        self.emissions
            .map(|model| model.co2_kg(distance_km))
            .unwrap_or(0.0)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks: [(&'static str, f64); 7] = [
            ("vehicle_capacity", self.vehicle_capacity as f64),
            ("cargo_length", self.cargo_length as f64),
            ("cargo_width", self.cargo_width as f64),
            ("cargo_height", self.cargo_height as f64),
            ("average_speed", self.average_speed),
            ("max_distance", self.max_distance),
            ("max_time", self.max_time),
        ];
        for (field, value) in checks {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::NonPositive { field, value });
            }
        }
        if !(self.service_time.is_finite() && self.service_time >= 0.0) {
            return Err(ConfigError::NonPositive {
                field: "service_time",
                value: self.service_time,
            });
        }
        if let Some(model) = &self.emissions {
            if !(model.consumption.is_finite() && model.consumption >= 0.0) {
                return Err(ConfigError::NonPositive {
                    field: "emissions.consumption",
                    value: model.consumption,
                });
            }
            if !(model.emission_factor.is_finite() && model.emission_factor >= 0.0) {
                return Err(ConfigError::NonPositive {
                    field: "emissions.emission_factor",
                    value: model.emission_factor,
                });
            }
        }
        Ok(())
    }
}

/// Vehicles of one class used during a dispatch, with the remaining shift
/// budget of the active vehicle.
#[derive(Debug, Clone)]
pub struct Fleet {
    pub profile: VehicleProfile,
    pub count: usize,
    pub distance_left: f64,
    pub time_left: f64,
}

impl Fleet {
    pub fn new(profile: VehicleProfile) -> Self {
        let distance_left = profile.max_distance;
        let time_left = profile.max_time;
        Fleet {
            profile,
            count: 1,
            distance_left,
            time_left,
        }
    }

    /// Bring in another vehicle of the same class with a full budget.
    pub fn add_vehicle(&mut self) {
        self.count += 1;
        self.distance_left = self.profile.max_distance;
        self.time_left = self.profile.max_time;
    }

    pub fn consume(&mut self, distance_km: f64, time_min: f64) {
        self.distance_left = (self.distance_left - distance_km).max(0.0);
        self.time_left = (self.time_left - time_min).max(0.0);
    }

    /// True while the active vehicle has used less than `margin` of both budgets.
    pub fn within_margin(&self, margin: f64) -> bool {
        let used_distance = 1.0 - self.distance_left / self.profile.max_distance;
        let used_time = 1.0 - self.time_left / self.profile.max_time;
        used_distance < margin && used_time < margin
    }
}

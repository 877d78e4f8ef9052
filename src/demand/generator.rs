use std::collections::BTreeMap;

use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::constant::PROBABILITY_TOLERANCE;
use crate::config::ConfigError;
use crate::demand::stochastic::Stochastic;
use crate::domain::types::{Node, NodeType, Request};
use crate::network::Network;

/// Demand model of an experiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemandConfig {
    /// Probability of each destination category; must sum to 1.
    pub probabilities: BTreeMap<NodeType, f64>,
    /// Request weight in grams.
    pub weight: Stochastic,
    /// Length, width and height in millimeters, drawn independently.
    pub dimensions: Stochastic,
    #[serde(default)]
    pub request_count: RequestCount,
}

/// How many requests a trial creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestCount {
    /// One request per eligible candidate node.
    #[default]
    PerCandidate,
    Fixed(usize),
}

impl DemandConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.weight.validate()?;
        self.dimensions.validate()?;

        let mut sum = 0.0;
        for (&category, &p) in &self.probabilities {
            if !(p.is_finite() && (0.0..=1.0).contains(&p)) {
                return Err(ConfigError::InvalidProbability { category, value: p });
            }
            sum += p;
        }
        if (sum - 1.0).abs() > PROBABILITY_TOLERANCE {
            return Err(ConfigError::ProbabilitySum(sum));
        }
        Ok(())
    }

    /// Every category present among `candidates` needs an explicit weight.
    pub fn check_coverage<'a>(&self, candidates: impl IntoIterator<Item = &'a Node>) -> Result<(), ConfigError> {
        for node in candidates {
            if !self.probabilities.contains_key(&node.node_type) {
                return Err(ConfigError::MissingCategoryWeight(node.node_type));
            }
        }
        Ok(())
    }
}

/// Businesses whose closest intersection can be reached from the sender and
/// back. Keeps network order.
pub fn eligible_candidates<'a>(net: &'a Network, sender: &Node) -> Result<Vec<&'a Node>, ConfigError> {
    let sdm = net.sdm().ok_or(ConfigError::MissingDistanceMatrix)?;
    let origin = sender.closest_itsc.ok_or(ConfigError::MissingLoadPoint)?;

    let mut unreachable = 0;
    let eligible: Vec<&Node> = net
        .businesses()
        .filter(|node| match node.closest_itsc {
            Some(itsc) if sdm.is_reachable(origin, itsc) && sdm.is_reachable(itsc, origin) => true,
            _ => {
                unreachable += 1;
                false
            }
        })
        .collect();

    if unreachable > 0 {
        warn!("{} business nodes are unreachable from the load point and were skipped", unreachable);
    }
    Ok(eligible)
}

/// Generates delivery requests from `sender` to businesses of `net`.
///
/// Each request draws a category from the configured distribution (restricted
/// to categories with eligible nodes), then a destination uniformly among the
/// eligible nodes of that category, then weight and three dimensions.
pub fn generate_requests<R: Rng + ?Sized>(
    net: &Network,
    sender: &Node,
    config: &DemandConfig,
    rng: &mut R,
) -> Result<Vec<Request>, ConfigError> {
    config.validate()?;
    let weight_sampler = config.weight.sampler()?;
    let dimension_sampler = config.dimensions.sampler()?;

    let eligible = eligible_candidates(net, sender)?;
    config.check_coverage(eligible.iter().copied())?;
    let mut by_category: BTreeMap<NodeType, Vec<&Node>> = BTreeMap::new();
    for node in &eligible {
        by_category.entry(node.node_type).or_default().push(*node);
    }

    let categories: Vec<(NodeType, f64)> = by_category
        .keys()
        .map(|category| (*category, config.probabilities[category]))
        .filter(|(_, p)| *p > 0.0)
        .collect();
    if categories.is_empty() {
        warn!("No eligible destinations with a positive probability, demand is empty");
        return Ok(Vec::new());
    }
    let category_dist = match WeightedIndex::new(categories.iter().map(|(_, p)| *p)) {
        Ok(dist) => dist,
        Err(_) => return Ok(Vec::new()),
    };

    let count = match config.request_count {
        RequestCount::PerCandidate => eligible.len(),
        RequestCount::Fixed(n) => n,
    };
    let mut requests = Vec::with_capacity(count);
    for id in 0..count {
        let category = categories[category_dist.sample(rng)].0;
        let nodes = &by_category[&category];
        let destination = nodes[rng.gen_range(0..nodes.len())];

        let weight = weight_sampler.sample(rng);
        let length = dimension_sampler.sample(rng);
        let width = dimension_sampler.sample(rng);
        let height = dimension_sampler.sample(rng);

        requests.push(Request {
            id,
            origin: sender.id,
            destination: destination.id,
            destination_itsc: destination.closest_itsc.unwrap_or(destination.id),
            weight,
            length,
            width,
            height,
            volume: length.saturating_mul(width).saturating_mul(height),
            itsc_distance: net.itsc_distance(destination),
        });
    }

    let total_weight = requests.iter().map(|r| r.weight).fold(0, u64::saturating_add);
    info!(
        "Generated {} requests over {} eligible destinations, total weight {} g",
        requests.len(),
        eligible.len(),
        total_weight
    );
    debug!("Requests: {:?}", requests.iter().map(|r| r.to_string()).collect::<Vec<_>>());

    Ok(requests)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn place(id: u64, x: f64, y: f64, node_type: NodeType) -> Node {
        Node {
            id,
            name: format!("{}{}", node_type, id),
            x,
            y,
            node_type,
            closest_itsc: None,
        }
    }

    /// 3x3 grid with a load point at the corner and one business per category.
    fn city() -> (Network, Node) {
        let mut net = Network::grid(3, 3, 0.5).unwrap();
        let step = 0.5 / 111.32;
        net.attach(place(100, 0.0, 0.0, NodeType::LoadPoint)).unwrap();
        net.attach(place(101, step, 0.0, NodeType::FoodDining)).unwrap();
        net.attach(place(102, 2.0 * step, step, NodeType::ConvenienceStore)).unwrap();
        net.attach(place(103, step, 2.0 * step, NodeType::LodgingBusiness)).unwrap();
        net.attach(place(104, 2.0 * step, 2.0 * step, NodeType::FoodDining)).unwrap();
        net.build_sdm().unwrap();
        let sender = net.node(100).unwrap().clone();
        (net, sender)
    }

    fn config() -> DemandConfig {
        let probabilities = [
            (NodeType::FoodDining, 0.3),
            (NodeType::LodgingBusiness, 0.1),
            (NodeType::ConvenienceStore, 0.4),
            (NodeType::VariousShops, 0.15),
            (NodeType::OfficeServices, 0.05),
            (NodeType::Other, 0.0),
        ]
        .into_iter()
        .collect();
        DemandConfig {
            probabilities,
            weight: Stochastic::new(0, 50.0, 150_000.0),
            dimensions: Stochastic::new(0, 10.0, 1000.0),
            request_count: RequestCount::PerCandidate,
        }
    }

    #[test]
    fn volume_is_product_of_dimensions() {
        let (net, sender) = city();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let requests = generate_requests(&net, &sender, &config(), &mut rng).unwrap();

        assert_eq!(requests.len(), 4);
        for r in &requests {
            assert_eq!(r.volume, r.length * r.width * r.height);
            assert!((50..=150_050).contains(&r.weight));
            assert!((10..=1010).contains(&r.length));
            assert_eq!(r.origin, 100);
            assert!(net.node(r.destination).unwrap().node_type.is_business());
        }
    }

    #[test]
    fn same_seed_same_demand() {
        let (net, sender) = city();
        let mut cfg = config();
        cfg.request_count = RequestCount::Fixed(25);
        let a = generate_requests(&net, &sender, &cfg, &mut ChaCha8Rng::seed_from_u64(9)).unwrap();
        let b = generate_requests(&net, &sender, &cfg, &mut ChaCha8Rng::seed_from_u64(9)).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 25);
    }

    #[test]
    fn category_without_weight_is_rejected() {
        let (net, sender) = city();
        let mut cfg = config();
        cfg.probabilities.remove(&NodeType::LodgingBusiness);
        cfg.probabilities.insert(NodeType::VariousShops, 0.25);

        let err = generate_requests(&net, &sender, &cfg, &mut ChaCha8Rng::seed_from_u64(1)).unwrap_err();
        assert_eq!(err, ConfigError::MissingCategoryWeight(NodeType::LodgingBusiness));
    }

    #[test]
    fn probabilities_must_sum_to_one() {
        let mut cfg = config();
        cfg.probabilities.insert(NodeType::Other, 0.5);
        assert!(matches!(cfg.validate(), Err(ConfigError::ProbabilitySum(_))));

        let mut cfg = config();
        cfg.probabilities.insert(NodeType::Other, -0.1);
        assert!(matches!(cfg.validate(), Err(ConfigError::InvalidProbability { .. })));
    }

    #[test]
    fn zero_probability_categories_get_no_requests() {
        let (net, sender) = city();
        let mut cfg = config();
        cfg.probabilities = [
            (NodeType::FoodDining, 1.0),
            (NodeType::LodgingBusiness, 0.0),
            (NodeType::ConvenienceStore, 0.0),
        ]
        .into_iter()
        .collect();
        cfg.request_count = RequestCount::Fixed(50);

        let requests = generate_requests(&net, &sender, &cfg, &mut ChaCha8Rng::seed_from_u64(5)).unwrap();
        assert_eq!(requests.len(), 50);
        assert!(requests.iter().all(|r| r.destination == 101 || r.destination == 104));
    }

    #[test]
    fn unreachable_businesses_are_excluded() {
        let mut net = Network::grid(1, 2, 0.5).unwrap();
        // isolated intersection far away
        net.add_intersection(50, 1.0, 1.0).unwrap();
        net.attach(place(100, 0.0, 0.0, NodeType::LoadPoint)).unwrap();
        net.attach(place(101, 0.0045, 0.0, NodeType::FoodDining)).unwrap();
        net.attach(place(102, 1.0, 1.0, NodeType::FoodDining)).unwrap();
        net.build_sdm().unwrap();
        let sender = net.node(100).unwrap().clone();

        let eligible = eligible_candidates(&net, &sender).unwrap();
        assert_eq!(eligible.iter().map(|n| n.id).collect::<Vec<_>>(), vec![101]);

        let mut cfg = config();
        cfg.request_count = RequestCount::Fixed(10);
        let requests = generate_requests(&net, &sender, &cfg, &mut ChaCha8Rng::seed_from_u64(2)).unwrap();
        assert!(requests.iter().all(|r| r.destination == 101));
    }

    #[test]
    fn unreachable_category_needs_no_weight() {
        let mut net = Network::grid(1, 2, 0.5).unwrap();
        net.add_intersection(50, 1.0, 1.0).unwrap();
        net.attach(place(100, 0.0, 0.0, NodeType::LoadPoint)).unwrap();
        net.attach(place(101, 0.0045, 0.0, NodeType::FoodDining)).unwrap();
        net.attach(place(102, 1.0, 1.0, NodeType::LodgingBusiness)).unwrap();
        net.build_sdm().unwrap();
        let sender = net.node(100).unwrap().clone();

        let mut cfg = config();
        cfg.probabilities.remove(&NodeType::LodgingBusiness);
        cfg.probabilities.insert(NodeType::VariousShops, 0.25);
        cfg.request_count = RequestCount::Fixed(5);

        let requests = generate_requests(&net, &sender, &cfg, &mut ChaCha8Rng::seed_from_u64(4)).unwrap();
        assert_eq!(requests.len(), 5);
        assert!(requests.iter().all(|r| r.destination == 101));
    }

    #[test]
    fn demand_needs_the_distance_matrix() {
        let mut net = Network::grid(1, 2, 0.5).unwrap();
        net.attach(place(100, 0.0, 0.0, NodeType::LoadPoint)).unwrap();
        let sender = net.node(100).unwrap().clone();
        assert_eq!(
            eligible_candidates(&net, &sender).unwrap_err(),
            ConfigError::MissingDistanceMatrix
        );
    }
}

use std::collections::HashMap;

use rayon::prelude::*;
use tracing::{debug, info};

use crate::config::ConfigError;
use crate::domain::types::Link;

/// Dense shortest-distance matrix (km) over a set of node ids.
///
/// Unreachable pairs hold `f64::INFINITY`.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceMatrix {
    ids: Vec<u64>,
    index: HashMap<u64, usize>,
    data: Vec<f64>,
}

impl DistanceMatrix {
    pub fn size(&self) -> usize {
        self.ids.len()
    }

    pub fn ids(&self) -> &[u64] {
        &self.ids
    }

    pub fn index_of(&self, id: u64) -> Option<usize> {
        self.index.get(&id).copied()
    }

    pub fn get(&self, from: usize, to: usize) -> f64 {
        self.data[from * self.ids.len() + to]
    }

    pub fn row(&self, from: usize) -> &[f64] {
        let n = self.ids.len();
        &self.data[from * n..(from + 1) * n]
    }

    /// Distance between two node ids, `None` if either id is not in the matrix.
    pub fn between(&self, from_id: u64, to_id: u64) -> Option<f64> {
        let from = self.index_of(from_id)?;
        let to = self.index_of(to_id)?;
        Some(self.get(from, to))
    }

    pub fn is_reachable(&self, from_id: u64, to_id: u64) -> bool {
        self.between(from_id, to_id)
            .map(|d| d.is_finite())
            .unwrap_or(false)
    }
}

/// Builds the all-pairs shortest-path matrix with Floyd-Warshall.
///
/// Parallel links keep the cheapest one. Each pivot relaxes the rows in
/// parallel; every cell sees the same operations in the same order, so the
/// result does not depend on scheduling.
pub fn create_dm(node_ids: &[u64], links: &[Link]) -> Result<DistanceMatrix, ConfigError> {
    let n = node_ids.len();
    info!("Creating distance matrix for {} nodes and {} links", n, links.len());

    let index: HashMap<u64, usize> = node_ids
        .iter()
        .enumerate()
        .map(|(ind, id)| (*id, ind))
        .collect();

    let mut data = vec![f64::INFINITY; n * n];
    for i in 0..n {
        data[i * n + i] = 0.0;
    }

    for link in links {
        if !(link.weight.is_finite() && link.weight >= 0.0) {
            return Err(ConfigError::InvalidLink {
                from: link.from,
                to: link.to,
                weight: link.weight,
            });
        }
        let from = *index.get(&link.from).ok_or(ConfigError::UnknownNode(link.from))?;
        let to = *index.get(&link.to).ok_or(ConfigError::UnknownNode(link.to))?;
        let cell = &mut data[from * n + to];
        if link.weight < *cell {
            *cell = link.weight;
        }
    }

    for k in 0..n {
        let row_k: Vec<f64> = data[k * n..(k + 1) * n].to_vec();
        data.par_chunks_mut(n.max(1)).for_each(|row| {
            let through_k = row[k];
            if through_k.is_infinite() {
                return;
            }
            for (cell, via) in row.iter_mut().zip(row_k.iter()) {
                let candidate = through_k + via;
                if candidate < *cell {
                    *cell = candidate;
                }
            }
        });
    }

    let unreachable = data.iter().filter(|d| d.is_infinite()).count();
    debug!("Distance matrix has {} unreachable pairs", unreachable);

    Ok(DistanceMatrix {
        ids: node_ids.to_vec(),
        index,
        data,
    })
}

// Print distance matrix for debugging
pub fn print_dist_matrix(dm: &DistanceMatrix) {
    debug!("Distance matrix:");
    for i in 0..dm.size() {
        debug!("{:?}", dm.row(i));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn link(from: u64, to: u64, weight: f64) -> Link {
        Link { from, to, weight }
    }

    #[test]
    fn shortest_path_goes_through_intermediate_nodes() {
        let ids = [10, 20, 30];
        let links = [link(10, 20, 1.0), link(20, 30, 2.0), link(10, 30, 5.0)];
        let dm = create_dm(&ids, &links).unwrap();

        assert_eq!(dm.between(10, 30), Some(3.0));
        assert_eq!(dm.between(10, 10), Some(0.0));
        // directed: no way back
        assert_eq!(dm.between(30, 10), Some(f64::INFINITY));
        assert!(!dm.is_reachable(30, 10));
        assert_eq!(dm.between(10, 99), None);
    }

    #[test]
    fn parallel_links_keep_the_cheapest() {
        let ids = [1, 2];
        let links = [link(1, 2, 4.0), link(1, 2, 1.5), link(2, 1, 0.5)];
        let dm = create_dm(&ids, &links).unwrap();

        assert_eq!(dm.between(1, 2), Some(1.5));
        assert_eq!(dm.between(2, 1), Some(0.5));
    }

    #[test]
    fn invalid_links_are_rejected() {
        assert!(matches!(
            create_dm(&[1, 2], &[link(1, 2, -1.0)]),
            Err(ConfigError::InvalidLink { .. })
        ));
        assert!(matches!(
            create_dm(&[1, 2], &[link(1, 3, 1.0)]),
            Err(ConfigError::UnknownNode(3))
        ));
    }

    #[test]
    fn empty_graph_is_fine() {
        let dm = create_dm(&[], &[]).unwrap();
        assert_eq!(dm.size(), 0);
    }

    fn ring_graph() -> impl Strategy<Value = (usize, Vec<(usize, usize, f64)>)> {
        (2usize..12).prop_flat_map(|n| {
            let extra = prop::collection::vec((0..n, 0..n, 0.0f64..10.0), 0..30);
            let ring = prop::collection::vec(0.01f64..10.0, n);
            (Just(n), ring, extra).prop_map(|(n, ring, extra)| {
                let mut edges: Vec<(usize, usize, f64)> = ring
                    .into_iter()
                    .enumerate()
                    .map(|(i, w)| (i, (i + 1) % n, w))
                    .collect();
                edges.extend(extra);
                (n, edges)
            })
        })
    }

    proptest! {
        #[test]
        fn connected_graphs_satisfy_triangle_inequality((n, edges) in ring_graph()) {
            let ids: Vec<u64> = (0..n as u64).collect();
            let links: Vec<Link> = edges
                .iter()
                .map(|&(a, b, w)| link(a as u64, b as u64, w))
                .collect();
            let dm = create_dm(&ids, &links).unwrap();

            for i in 0..n {
                prop_assert_eq!(dm.get(i, i), 0.0);
                for j in 0..n {
                    prop_assert!(dm.get(i, j).is_finite());
                    prop_assert!(dm.get(i, j) >= 0.0);
                    for k in 0..n {
                        prop_assert!(dm.get(i, k) <= dm.get(i, j) + dm.get(j, k) + 1e-9);
                    }
                }
            }
        }

        #[test]
        fn reruns_are_bit_identical((n, edges) in ring_graph()) {
            let ids: Vec<u64> = (0..n as u64).collect();
            let links: Vec<Link> = edges
                .iter()
                .map(|&(a, b, w)| link(a as u64, b as u64, w))
                .collect();
            let first = create_dm(&ids, &links).unwrap();
            let second = create_dm(&ids, &links).unwrap();
            for i in 0..n {
                for j in 0..n {
                    prop_assert_eq!(first.get(i, j).to_bits(), second.get(i, j).to_bits());
                }
            }
        }
    }
}

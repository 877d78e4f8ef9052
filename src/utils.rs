use rand::seq::IteratorRandom;
use rand::Rng;

pub fn temperature(runs: usize, iteration: usize, temperature_factor: i32) -> f64 {
    (((runs as f64) - (iteration as f64)) / (runs as f64)).max(0.0) * (temperature_factor as f64)
}

/// Moves `num_indices` random positions of `current` to the location the best
/// route has there. Both routes must visit the same locations.
pub fn steer_towards_best<R: Rng + ?Sized>(
    current: &mut [usize],
    best_so_far: &[usize],
    num_indices: usize,
    rng: &mut R,
) {
    if current.len() != best_so_far.len() {
        return;
    }
    let chosen_indices: Vec<usize> = (0..current.len()).choose_multiple(rng, num_indices);

    for &idx in &chosen_indices {
        let target_value = best_so_far[idx];
        if let Some(current_idx) = current.iter().position(|&x| x == target_value) {
            current.swap(idx, current_idx);
        }
    }
}

pub fn swaps_overlap(a: &(usize, usize), b: &(usize, usize)) -> bool {
    a.0 == b.0 || a.0 == b.1 || a.1 == b.0 || a.1 == b.1
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn steering_all_positions_reaches_best() {
        let best = vec![4, 2, 7, 1];
        let mut current = vec![1, 7, 2, 4];
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        steer_towards_best(&mut current, &best, 4, &mut rng);
        assert_eq!(current, best);
    }

    #[test]
    fn temperature_cools_down() {
        assert_eq!(temperature(100, 0, 1), 1.0);
        assert_eq!(temperature(100, 50, 2), 1.0);
        assert_eq!(temperature(100, 150, 1), 0.0);
    }

    #[test]
    fn overlap_checks_shared_locations() {
        assert!(swaps_overlap(&(1, 2), &(2, 3)));
        assert!(!swaps_overlap(&(1, 2), &(3, 4)));
    }
}

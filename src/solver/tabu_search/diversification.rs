use rand::seq::IteratorRandom;
use rand::Rng;

use crate::solver::tabu_search::Route;

/// Perform rollback to diversify search by returning to a past high-quality solution
pub fn perform_rollback(
    saved_solutions: &[Route],
    len_tabu_list: usize,
    next_solution: &Route,
    best_so_far: &Route,
) -> Route {
    let needed = len_tabu_list.saturating_mul(4);
    if saved_solutions.len() < needed + 1 {
        return next_solution.clone();
    }

    let start = saved_solutions.len() - needed;
    let overall_reduction: i64 = ((start + 1)..saved_solutions.len())
        .map(|ind| saved_solutions[ind - 1].fitness - saved_solutions[ind].fitness)
        .sum();

    if overall_reduction > 0 && next_solution.route != best_so_far.route {
        best_so_far.clone()
    } else {
        next_solution.clone()
    }
}

/// Reverse a random segment, then rotate three random stops
pub fn final_mutation<R: Rng + ?Sized>(route: &mut [usize], rng: &mut R) {
    let n = route.len();
    if n < 2 {
        return;
    }

    let mut pair: Vec<usize> = (0..n).choose_multiple(rng, 2);
    pair.sort_unstable();
    route[pair[0]..=pair[1]].reverse();

    if n >= 3 {
        let mut triple: Vec<usize> = (0..n).choose_multiple(rng, 3);
        triple.sort_unstable();
        let (x, y, z) = (triple[0], triple[1], triple[2]);
        route.swap(x, y);
        route.swap(y, z);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn route(stops: Vec<usize>, fitness: i64) -> Route {
        Route {
            route: stops,
            fitness,
            feasible: true,
        }
    }

    #[test]
    fn rollback_returns_best_after_progress() {
        let saved: Vec<Route> = (0..10).map(|i| route(vec![1, 2], 100 - i)).collect();
        let best = route(vec![2, 1], 50);
        let next = route(vec![1, 2], 95);

        assert_eq!(perform_rollback(&saved, 2, &next, &best), best);
        assert_eq!(perform_rollback(&saved[..5], 2, &next, &best), next);
    }

    #[test]
    fn mutation_is_a_permutation() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut stops = vec![5, 6, 7, 8, 9];
        final_mutation(&mut stops, &mut rng);
        let mut sorted = stops.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, vec![5, 6, 7, 8, 9]);
    }
}

use std::collections::VecDeque;

use crate::solver::tabu_search::neighborhood::Move;
use crate::utils::swaps_overlap;

/// Scored neighbour as produced by `find_neighbours`, with its tabu key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub fitness: i64,
    pub feasible: bool,
    pub mv: Move,
    pub key: (usize, usize),
}

/// Picks the first non-tabu candidate. A tabu candidate is still taken when it
/// beats the best fitness so far, or lands within `aspiration_threshold` of it
/// without touching the locations of the parent move.
pub fn choose_best_candidate(
    candidates: &[Candidate],
    tabu_list: &VecDeque<(usize, usize)>,
    best_fitness: i64,
    aspiration_threshold: i64,
    parent_key: &(usize, usize),
) -> Option<Candidate> {
    let first = *candidates.first()?;
    if !tabu_list.contains(&first.key) {
        return Some(first);
    }

    let aspires = (first.feasible && first.fitness < best_fitness)
        || ((best_fitness - aspiration_threshold..=best_fitness + aspiration_threshold)
            .contains(&first.fitness)
            && !swaps_overlap(&first.key, parent_key));
    if aspires {
        return Some(first);
    }

    candidates
        .iter()
        .find(|c| !tabu_list.contains(&c.key) && !swaps_overlap(&c.key, parent_key))
        .copied()
        .or(Some(first))
}

pub fn insert_and_adjust_tabu_list(
    tabu_list: &mut VecDeque<(usize, usize)>,
    key: (usize, usize),
    len_tabu_list: usize,
) {
    tabu_list.push_front(key);

    while tabu_list.len() > len_tabu_list {
        tabu_list.pop_back();
    }
}

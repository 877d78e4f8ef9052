use rayon::prelude::*;

use crate::evaluation::fitness::find_fitness;
use crate::routing::RoutingProblem;

/// Local move over route positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Move {
    Swap(usize, usize),
    /// Reverse the segment `i..=j`.
    TwoOpt(usize, usize),
    /// Take the stop at `i` and reinsert it at `j`.
    Relocate(usize, usize),
}

impl Move {
    pub fn apply(&self, route: &[usize]) -> Vec<usize> {
        let mut new_route = route.to_vec();
        match *self {
            Move::Swap(i, j) => new_route.swap(i, j),
            Move::TwoOpt(i, j) => new_route[i..=j].reverse(),
            Move::Relocate(i, j) => {
                let loc = new_route.remove(i);
                new_route.insert(j, loc);
            }
        }
        new_route
    }

    /// Tabu attribute: the pair of locations the move touches, smaller first.
    pub fn key(&self, route: &[usize]) -> (usize, usize) {
        let (i, j) = match *self {
            Move::Swap(i, j) | Move::TwoOpt(i, j) | Move::Relocate(i, j) => (i, j),
        };
        let (a, b) = (route[i], route[j]);
        if a < b {
            (a, b)
        } else {
            (b, a)
        }
    }
}

fn all_moves(n: usize) -> Vec<Move> {
    let mut moves = Vec::new();
    for i in 0..n {
        for j in (i + 1)..n {
            moves.push(Move::Swap(i, j));
            if j > i + 1 {
                moves.push(Move::TwoOpt(i, j));
            }
        }
        for j in 0..n {
            // j == i + 1 duplicates a swap of neighbours
            if j != i && j != i + 1 {
                moves.push(Move::Relocate(i, j));
            }
        }
    }
    moves
}

/// Scores every neighbour of `route`, best first. Each entry carries the
/// fitness, whether the neighbour is feasible, and the move.
pub fn find_neighbours(route: &[usize], problem: &RoutingProblem) -> Vec<(i64, bool, Move)> {
    let mut candidates: Vec<(i64, bool, Move)> = all_moves(route.len())
        .par_iter()
        .map(|mv| {
            let (fitness, feasible) = find_fitness(problem, &mv.apply(route));
            (fitness, feasible, *mv)
        })
        .collect();

    candidates.par_sort_by(|a, b| a.0.cmp(&b.0).then(a.2.cmp(&b.2)));
    candidates
}

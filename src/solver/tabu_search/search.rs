use std::cmp::max;
use std::collections::VecDeque;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, span, trace, Level};

use crate::routing::RoutingProblem;
use crate::solver::tabu_search::diversification::{final_mutation, perform_rollback};
use crate::solver::tabu_search::neighborhood::find_neighbours;
use crate::solver::tabu_search::tabu::{choose_best_candidate, insert_and_adjust_tabu_list, Candidate};
use crate::solver::tabu_search::{Route, TabuParams};
use crate::solver::Deadline;
use crate::utils::{steer_towards_best, temperature};

struct SearchState {
    current_solution: Route,
    best_so_far: Route,
    best_so_far_iteration: usize,
    saved_solutions: Vec<Route>,
    tabu_list: VecDeque<(usize, usize)>,
    len_tabu_list: usize,
    parent_key: (usize, usize),
    stagnation: usize,
    max_stagnation: usize,
    temperature_factor: i32,
    has_ended: bool,
    rng: ChaCha8Rng,
    rollbacks: usize,
    steers: usize,
    tabu_resizes: usize,
    mutations: usize,
}

impl SearchState {
    fn new(initial: Route, params: &TabuParams) -> Self {
        SearchState {
            current_solution: initial.clone(),
            best_so_far: initial,
            best_so_far_iteration: 0,
            saved_solutions: Vec::new(),
            tabu_list: VecDeque::new(),
            len_tabu_list: params.tabu_len_lower,
            parent_key: (usize::MAX, usize::MAX),
            stagnation: 0,
            max_stagnation: 0,
            temperature_factor: 1,
            has_ended: false,
            rng: ChaCha8Rng::seed_from_u64(params.seed),
            rollbacks: 0,
            steers: 0,
            tabu_resizes: 0,
            mutations: 0,
        }
    }

    /// Keeps `candidate` as the new best if it is feasible and strictly better.
    fn offer(&mut self, candidate: &Route, iteration: usize, deadline: &mut Deadline) {
        if candidate.feasible && candidate.fitness < self.best_so_far.fitness {
            self.best_so_far = candidate.clone();
            self.best_so_far_iteration = iteration;
            deadline.record_solution();
            debug!(
                "New best at iteration {}: fitness = {}",
                iteration, self.best_so_far.fitness
            );
        }
    }
}

/// Calculate maximum iterations without improvement based on route length
fn calculate_max_no_improvement(route_len: usize) -> usize {
    let scaling_factor = if route_len < 50 { 3.0 } else { 2.0 };
    max(30, (scaling_factor * (route_len as f64).powf(1.1)) as usize)
}

fn perform_iteration(
    iteration: usize,
    state: &mut SearchState,
    problem: &RoutingProblem,
    params: &TabuParams,
    max_no_improvement: usize,
    deadline: &mut Deadline,
) {
    let iter_span = span!(Level::TRACE, "iteration", iter = iteration);
    let _iter_guard = iter_span.enter();

    state.saved_solutions.push(state.current_solution.clone());
    let keep = params.tabu_len_upper * 4 + 1;
    if state.saved_solutions.len() > keep {
        let excess = state.saved_solutions.len() - keep;
        state.saved_solutions.drain(..excess);
    }

    let route = &state.current_solution.route;
    let candidates: Vec<Candidate> = find_neighbours(route, problem)
        .into_iter()
        .map(|(fitness, feasible, mv)| Candidate {
            fitness,
            feasible,
            mv,
            key: mv.key(route),
        })
        .collect();

    let Some(chosen) = choose_best_candidate(
        &candidates,
        &state.tabu_list,
        state.best_so_far.fitness,
        params.aspiration_threshold,
        &state.parent_key,
    ) else {
        state.has_ended = true;
        return;
    };
    trace!("chosen move: {} {:?}", chosen.fitness, chosen.mv);

    let mut next_solution = Route {
        route: chosen.mv.apply(route),
        fitness: chosen.fitness,
        feasible: chosen.feasible,
    };
    insert_and_adjust_tabu_list(&mut state.tabu_list, chosen.key, state.len_tabu_list);
    state.offer(&next_solution, iteration, deadline);
    state.parent_key = chosen.key;

    if apply_diversifications(iteration, state, &mut next_solution, params) {
        next_solution = Route::evaluate(problem, next_solution.route);
        state.offer(&next_solution, iteration, deadline);
    }

    if state.best_so_far_iteration != iteration {
        state.stagnation += 1;
        if state.stagnation >= max_no_improvement {
            debug!("Search stagnated at iteration {}", iteration);
            state.has_ended = true;
        } else if state.stagnation >= max_no_improvement / 2 {
            state.temperature_factor = 2;
        }
    } else {
        state.max_stagnation = max(state.stagnation, state.max_stagnation);
        state.stagnation = 0;
        state.temperature_factor = 1;
    }

    state.current_solution = next_solution;
}

/// Rollback, steering, tabu length and mutation moves. Returns true if the
/// route of `next_solution` changed.
fn apply_diversifications(
    iteration: usize,
    state: &mut SearchState,
    next_solution: &mut Route,
    params: &TabuParams,
) -> bool {
    let temp = temperature(params.max_iterations, iteration, state.temperature_factor);
    let before = next_solution.route.clone();

    if state.rng.gen::<f64>() * state.rng.gen_range(0.3..0.6) <= temp * state.rng.gen_range(0.9..1.0)
        && iteration % 50 == 0
        && state.saved_solutions.len() > state.len_tabu_list * 4
    {
        state.rollbacks += 1;
        *next_solution = perform_rollback(
            &state.saved_solutions,
            state.len_tabu_list,
            next_solution,
            &state.best_so_far,
        );
    } else if iteration % 40 == 0 {
        state.steers += 1;
        let len = next_solution.route.len();
        let num_to_change = ((len as f64) * temp * state.rng.gen::<f64>()).ceil() as usize;
        steer_towards_best(
            &mut next_solution.route,
            &state.best_so_far.route,
            num_to_change.min(len),
            &mut state.rng,
        );
    }

    if iteration % 20 == 0 && params.tabu_len_lower < params.tabu_len_upper {
        state.tabu_resizes += 1;
        state.len_tabu_list = state
            .rng
            .gen_range(params.tabu_len_lower..params.tabu_len_upper);
    }

    // only shake a stagnating search
    if state.temperature_factor > 1
        && state.rng.gen::<f64>() * state.rng.gen_range(0.4..0.6)
            <= temp * state.rng.gen_range(0.8..1.0)
    {
        final_mutation(&mut next_solution.route, &mut state.rng);
        state.mutations += 1;
    }

    next_solution.route != before
}

/// Tabu search over the order of an already routed set of locations. Starts
/// from a feasible route and returns the best feasible route found.
pub fn improve(
    problem: &RoutingProblem,
    initial: Route,
    params: &TabuParams,
    deadline: &mut Deadline,
) -> Route {
    let max_no_improvement = calculate_max_no_improvement(initial.route.len());
    let mut state = SearchState::new(initial, params);

    let loop_span = span!(Level::DEBUG, "tabu_search", route_len = state.best_so_far.route.len());
    let _loop_guard = loop_span.enter();

    for iteration in 1..=params.max_iterations {
        if state.has_ended || deadline.should_stop() {
            break;
        }
        perform_iteration(iteration, &mut state, problem, params, max_no_improvement, deadline);
    }

    debug!(
        "Tabu search done: best {} at iteration {}, max stagnation {}, rollback {}, steer {}, tabu_len {}, mutation {}",
        state.best_so_far.fitness,
        state.best_so_far_iteration,
        state.max_stagnation,
        state.rollbacks,
        state.steers,
        state.tabu_resizes,
        state.mutations
    );
    state.best_so_far
}

use super::{Bounds, Driver, DriverSummary, PenalisedObjective, Problem, clamp_to_bounds};
use crate::engine::error::EngineError;
use argmin::core::{CostFunction, Error, Executor, State};
use argmin::solver::neldermead::NelderMead as Simplex;
use std::cell::RefCell;
use tracing::info;

const NONZERO_STEP: f64 = 0.05;
const ZERO_STEP: f64 = 0.00025;

/// Downhill simplex (argmin's Nelder–Mead) over the scaled, bounded design
/// space.
#[derive(Debug, Clone)]
pub struct NelderMead {
    max_iterations: usize,
    tolerance: f64,
}

impl NelderMead {
    pub fn new(max_iterations: usize, tolerance: f64) -> Self {
        Self {
            max_iterations,
            tolerance,
        }
    }
}

/// Cost adapter handed to the executor. `cost` only gets `&self`, so the
/// objective sits behind a `RefCell`; the first evaluation error is parked in
/// `failure` and handed back unchanged once the executor returns.
struct PenalisedCost<'o, 'p> {
    objective: &'o RefCell<PenalisedObjective<'p>>,
    failure: &'o RefCell<Option<EngineError>>,
}

impl CostFunction for PenalisedCost<'_, '_> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, param: &Self::Param) -> Result<Self::Output, Error> {
        match self.objective.borrow_mut().value(param) {
            Ok(value) => Ok(value),
            Err(e) => {
                let message = e.to_string();
                self.failure.borrow_mut().get_or_insert(e);
                Err(Error::msg(message))
            }
        }
    }
}

/// Start point plus one vertex per axis, 5% away (0.00025 for zeros); a step
/// that the bounds swallow is taken in the other direction.
fn initial_simplex(start: &[f64], bounds: &Bounds) -> Vec<Vec<f64>> {
    let mut vertices = Vec::with_capacity(start.len() + 1);
    vertices.push(start.to_vec());
    for i in 0..start.len() {
        let step = if start[i] != 0.0 {
            NONZERO_STEP * start[i]
        } else {
            ZERO_STEP
        };
        let mut vertex = start.to_vec();
        vertex[i] += step;
        clamp_to_bounds(&mut vertex, bounds);
        if vertex[i] == start[i] {
            vertex[i] -= step;
        }
        vertices.push(vertex);
    }
    vertices
}

impl Driver for NelderMead {
    fn name(&self) -> &'static str {
        "nelder-mead"
    }

    fn run(&mut self, problem: &mut dyn Problem) -> Result<DriverSummary, EngineError> {
        if problem.dimension() == 0 {
            return Err(EngineError::Driver {
                driver: self.name(),
                reason: "there is no design variable to optimise".to_string(),
            });
        }

        let objective = RefCell::new(PenalisedObjective::new(problem));
        let failure = RefCell::new(None);
        let simplex = {
            let objective = objective.borrow();
            initial_simplex(&objective.scaled_start(), &objective.scaled_bounds())
        };

        let driver_error = |e: Error| EngineError::Driver {
            driver: "nelder-mead",
            reason: e.to_string(),
        };
        let solver: Simplex<Vec<f64>, f64> = Simplex::new(simplex)
            .with_sd_tolerance(self.tolerance)
            .map_err(driver_error)?;
        let cost = PenalisedCost {
            objective: &objective,
            failure: &failure,
        };
        let max_iterations = self.max_iterations as u64;
        let outcome = Executor::new(cost, solver)
            .configure(|state| state.max_iters(max_iterations))
            .run()
            .map(|result| result.state.get_iter());

        if let Some(error) = failure.into_inner() {
            return Err(error);
        }
        let iterations = outcome.map_err(driver_error)?;

        let message = if iterations < max_iterations {
            format!("Converged after {} iteration(s)", iterations)
        } else {
            format!("Maximum number of iterations ({}) reached", self.max_iterations)
        };
        let objective = objective.into_inner();
        info!("{} ({} evaluations).", message, objective.evaluations());
        objective.finish(self.name(), message)
    }
}

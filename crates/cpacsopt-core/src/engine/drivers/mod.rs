//! Drivers that choose design points and hand them to a [`Problem`].
//!
//! A driver never touches CPACS files or modules directly: it sees a vector
//! of design values, asks the problem to evaluate it and gets back the
//! (minimised) objective plus one value per constraint.

mod doe;
mod nelder_mead;

pub use doe::{FullFactorial, UniformSampler};
pub use nelder_mead::NelderMead;

use super::config::{DoeGenerator, OptimiserAlgorithm, RoutineConfig, RoutineType};
use super::error::EngineError;

/// Weight of the quadratic exterior penalty applied to constraint violations.
pub const PENALTY_WEIGHT: f64 = 1e3;

pub type Bounds = Vec<(Option<f64>, Option<f64>)>;

#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    /// Value to minimise.
    pub objective: f64,
    pub constraints: Vec<f64>,
}

pub trait Problem {
    fn dimension(&self) -> usize;
    fn initial_point(&self) -> Vec<f64>;
    fn bounds(&self) -> Bounds;
    fn constraint_bounds(&self) -> Bounds;
    fn evaluate(&mut self, point: &[f64]) -> Result<Evaluation, EngineError>;
}

pub trait Driver {
    fn name(&self) -> &'static str;

    /// Number of evaluations the driver will request, when it is known upfront.
    fn expected_evaluations(&self, _dimension: usize) -> Option<u64> {
        None
    }

    fn run(&mut self, problem: &mut dyn Problem) -> Result<DriverSummary, EngineError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct DriverSummary {
    pub best_point: Vec<f64>,
    pub best_objective: f64,
    pub evaluations: usize,
    pub feasible: bool,
    pub message: String,
}

pub fn build_driver(config: &RoutineConfig) -> Box<dyn Driver> {
    match config.routine_type {
        RoutineType::Optimisation => {
            let options = &config.optimiser;
            match options.algorithm {
                OptimiserAlgorithm::NelderMead => {
                    Box::new(NelderMead::new(options.max_iterations, options.tolerance))
                }
            }
        }
        RoutineType::DesignOfExperiments => match config.doe {
            DoeGenerator::Uniform { samples, seed } => Box::new(UniformSampler::new(samples, seed)),
            DoeGenerator::FullFactorial { levels } => Box::new(FullFactorial::new(levels)),
        },
    }
}

/// Sum of squared distances of each value outside its bounds.
///
/// A non-finite value counts as infinitely infeasible.
pub fn constraint_violation(values: &[f64], bounds: &[(Option<f64>, Option<f64>)]) -> f64 {
    values
        .iter()
        .zip(bounds)
        .map(|(&value, &(lower, upper))| {
            if !value.is_finite() {
                return f64::INFINITY;
            }
            let below = lower.map_or(0.0, |l| (l - value).max(0.0));
            let above = upper.map_or(0.0, |u| (value - u).max(0.0));
            below * below + above * above
        })
        .sum()
}

pub fn clamp_to_bounds(point: &mut [f64], bounds: &[(Option<f64>, Option<f64>)]) {
    for (value, &(lower, upper)) in point.iter_mut().zip(bounds) {
        if let Some(l) = lower {
            *value = value.max(l);
        }
        if let Some(u) = upper {
            *value = value.min(u);
        }
    }
}

/// Per-variable reference magnitudes, `floor(log10(|x0| + 1) + 1)`.
///
/// Drivers work on `x / ref`, which keeps variables of very different
/// magnitudes (a speed in m/s next to a sweep angle) on comparable steps.
#[derive(Debug, Clone, PartialEq)]
pub struct Scaling {
    reference: Vec<f64>,
}

impl Scaling {
    pub fn from_initial(initial: &[f64]) -> Self {
        Self {
            reference: initial
                .iter()
                .map(|x0| ((x0.abs() + 1.0).log10() + 1.0).floor())
                .collect(),
        }
    }

    pub fn reference(&self) -> &[f64] {
        &self.reference
    }

    pub fn to_scaled(&self, point: &[f64]) -> Vec<f64> {
        point
            .iter()
            .zip(&self.reference)
            .map(|(x, r)| x / r)
            .collect()
    }

    pub fn to_physical(&self, scaled: &[f64]) -> Vec<f64> {
        scaled
            .iter()
            .zip(&self.reference)
            .map(|(z, r)| z * r)
            .collect()
    }

    pub fn scale_bounds(&self, bounds: &[(Option<f64>, Option<f64>)]) -> Bounds {
        bounds
            .iter()
            .zip(&self.reference)
            .map(|(&(lower, upper), r)| (lower.map(|l| l / r), upper.map(|u| u / r)))
            .collect()
    }
}

/// Keeps the best point seen so far: feasible beats infeasible, then the
/// lower objective (or the lower violation between infeasible points) wins.
#[derive(Debug, Clone, Default)]
pub(crate) struct BestTracker {
    best: Option<(Vec<f64>, f64, f64)>,
    evaluations: usize,
}

impl BestTracker {
    pub(crate) fn observe(&mut self, point: &[f64], objective: f64, violation: f64) {
        self.evaluations += 1;
        let better = match &self.best {
            None => true,
            Some((_, best_objective, best_violation)) => {
                match (violation == 0.0, *best_violation == 0.0) {
                    (true, false) => true,
                    (false, true) => false,
                    (true, true) => objective < *best_objective,
                    (false, false) => violation < *best_violation,
                }
            }
        };
        if better {
            self.best = Some((point.to_vec(), objective, violation));
        }
    }

    pub(crate) fn evaluations(&self) -> usize {
        self.evaluations
    }

    pub(crate) fn into_summary(
        self,
        driver: &'static str,
        message: String,
    ) -> Result<DriverSummary, EngineError> {
        let evaluations = self.evaluations;
        let (best_point, best_objective, violation) =
            self.best.ok_or_else(|| EngineError::Driver {
                driver,
                reason: "no point was evaluated".to_string(),
            })?;
        Ok(DriverSummary {
            best_point,
            best_objective,
            evaluations,
            feasible: violation == 0.0,
            message,
        })
    }
}

/// Wraps a problem for the optimisers: works in scaled coordinates, clamps to
/// the variable bounds and folds constraint violations into the objective.
pub(crate) struct PenalisedObjective<'p> {
    problem: &'p mut dyn Problem,
    scaling: Scaling,
    bounds: Bounds,
    constraint_bounds: Bounds,
    tracker: BestTracker,
}

impl<'p> PenalisedObjective<'p> {
    pub(crate) fn new(problem: &'p mut dyn Problem) -> Self {
        let scaling = Scaling::from_initial(&problem.initial_point());
        let bounds = problem.bounds();
        let constraint_bounds = problem.constraint_bounds();
        Self {
            problem,
            scaling,
            bounds,
            constraint_bounds,
            tracker: BestTracker::default(),
        }
    }

    /// Starting point in scaled coordinates, inside the bounds.
    pub(crate) fn scaled_start(&self) -> Vec<f64> {
        let mut start = self.problem.initial_point();
        clamp_to_bounds(&mut start, &self.bounds);
        self.scaling.to_scaled(&start)
    }

    pub(crate) fn scaled_bounds(&self) -> Bounds {
        self.scaling.scale_bounds(&self.bounds)
    }

    pub(crate) fn value(&mut self, scaled: &[f64]) -> Result<f64, EngineError> {
        let mut point = self.scaling.to_physical(scaled);
        clamp_to_bounds(&mut point, &self.bounds);
        let evaluation = self.problem.evaluate(&point)?;
        let violation = constraint_violation(&evaluation.constraints, &self.constraint_bounds);
        self.tracker
            .observe(&point, evaluation.objective, violation);
        Ok(evaluation.objective + PENALTY_WEIGHT * violation)
    }

    pub(crate) fn evaluations(&self) -> usize {
        self.tracker.evaluations()
    }

    pub(crate) fn finish(
        self,
        driver: &'static str,
        message: String,
    ) -> Result<DriverSummary, EngineError> {
        self.tracker.into_summary(driver, message)
    }
}

/// Checks that every design variable has both bounds, as sampling drivers need.
pub(crate) fn finite_box(
    driver: &'static str,
    bounds: &[(Option<f64>, Option<f64>)],
) -> Result<Vec<(f64, f64)>, EngineError> {
    bounds
        .iter()
        .enumerate()
        .map(|(i, bound)| match *bound {
            (Some(lower), Some(upper)) if lower.is_finite() && upper.is_finite() => {
                Ok((lower, upper))
            }
            _ => Err(EngineError::Driver {
                driver,
                reason: format!("design variable #{} needs both a min and a max", i + 1),
            }),
        })
        .collect()
}

use super::{BestTracker, Driver, DriverSummary, Problem, constraint_violation, finite_box};
use crate::engine::error::EngineError;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

fn evaluate_all<I>(
    driver: &'static str,
    problem: &mut dyn Problem,
    points: I,
) -> Result<DriverSummary, EngineError>
where
    I: IntoIterator<Item = Vec<f64>>,
{
    let constraint_bounds = problem.constraint_bounds();
    let mut tracker = BestTracker::default();
    for point in points {
        debug!(?point, "Evaluating sample.");
        let evaluation = problem.evaluate(&point)?;
        let violation = constraint_violation(&evaluation.constraints, &constraint_bounds);
        tracker.observe(&point, evaluation.objective, violation);
    }
    let message = format!("Evaluated {} sample(s)", tracker.evaluations());
    info!("{}.", message);
    tracker.into_summary(driver, message)
}

/// Independent uniform samples inside the design-variable bounds.
#[derive(Debug, Clone)]
pub struct UniformSampler {
    samples: usize,
    seed: Option<u64>,
}

impl UniformSampler {
    pub fn new(samples: usize, seed: Option<u64>) -> Self {
        Self { samples, seed }
    }
}

impl Driver for UniformSampler {
    fn name(&self) -> &'static str {
        "uniform"
    }

    fn expected_evaluations(&self, _dimension: usize) -> Option<u64> {
        Some(self.samples as u64)
    }

    fn run(&mut self, problem: &mut dyn Problem) -> Result<DriverSummary, EngineError> {
        let ranges = finite_box(self.name(), &problem.bounds())?;
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let points: Vec<Vec<f64>> = (0..self.samples)
            .map(|_| {
                ranges
                    .iter()
                    .map(|&(lower, upper)| rng.gen_range(lower..=upper))
                    .collect()
            })
            .collect();
        evaluate_all(self.name(), problem, points)
    }
}

/// Every combination of `levels` evenly spaced values per design variable.
#[derive(Debug, Clone)]
pub struct FullFactorial {
    levels: usize,
}

impl FullFactorial {
    pub fn new(levels: usize) -> Self {
        Self { levels }
    }

    fn grid(&self, ranges: &[(f64, f64)]) -> Vec<Vec<f64>> {
        let axis = |(lower, upper): (f64, f64)| -> Vec<f64> {
            (0..self.levels)
                .map(|k| lower + (upper - lower) * k as f64 / (self.levels - 1) as f64)
                .collect()
        };
        ranges.iter().fold(vec![Vec::new()], |points, &range| {
            let values = axis(range);
            points
                .into_iter()
                .flat_map(|prefix| {
                    values.iter().map(move |&v| {
                        let mut point = prefix.clone();
                        point.push(v);
                        point
                    })
                })
                .collect()
        })
    }
}

impl Driver for FullFactorial {
    fn name(&self) -> &'static str {
        "full-factorial"
    }

    fn expected_evaluations(&self, dimension: usize) -> Option<u64> {
        u32::try_from(dimension)
            .ok()
            .and_then(|d| (self.levels as u64).checked_pow(d))
    }

    fn run(&mut self, problem: &mut dyn Problem) -> Result<DriverSummary, EngineError> {
        let ranges = finite_box(self.name(), &problem.bounds())?;
        let points = self.grid(&ranges);
        evaluate_all(self.name(), problem, points)
    }
}

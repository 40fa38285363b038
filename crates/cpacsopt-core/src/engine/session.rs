use super::components::ComponentGraph;
use super::config::{DoeGenerator, RoutineConfig, RoutineType};
use super::drivers::{Evaluation, Problem};
use super::error::EngineError;
use super::progress::ProgressReporter;
use super::runner::ModuleRunner;
use super::variables::{DesignVariableDict, ResultVariableDict};
use super::workspace::ModuleWorkspace;
use crate::core::expression::Expression;
use std::path::PathBuf;

/// Settings of one optimisation or design-of-experiments run.
#[derive(Debug, Clone, PartialEq)]
pub struct Routine {
    pub routine_type: RoutineType,
    pub modules: Vec<String>,
    /// Identifier of the driver algorithm, for logs and the recorder.
    pub driver: String,
    pub objective: Expression,
    /// Run timestamp, `%Y-%m-%d_%H-%M-%S`.
    pub date: String,
}

impl Routine {
    pub fn from_config(config: &RoutineConfig, date: String) -> Result<Self, EngineError> {
        let driver = match config.routine_type {
            RoutineType::Optimisation => config.optimiser.algorithm.to_string(),
            RoutineType::DesignOfExperiments => match config.doe {
                DoeGenerator::Uniform { .. } => "uniform".to_string(),
                DoeGenerator::FullFactorial { .. } => "full-factorial".to_string(),
            },
        };
        Ok(Self {
            routine_type: config.routine_type,
            modules: config.modules.clone(),
            driver,
            objective: Expression::parse(&config.objective)?,
            date,
        })
    }

    pub fn first_module(&self) -> &str {
        &self.modules[0]
    }

    pub fn last_module(&self) -> &str {
        &self.modules[self.modules.len() - 1]
    }
}

/// Everything one run needs, threaded explicitly through every evaluation.
///
/// Only one evaluation can be in flight: the iteration driver borrows the
/// session mutably while it rewrites the CPACS files on disk.
pub struct OptimisationSession<'a> {
    pub routine: Routine,
    pub design: DesignVariableDict,
    pub results: ResultVariableDict,
    pub(crate) workspace: ModuleWorkspace,
    pub(crate) working_dir: PathBuf,
    pub(crate) snapshot_every: usize,
    pub(crate) runner: &'a dyn ModuleRunner,
    pub(crate) reporter: &'a ProgressReporter<'a>,
    pub(crate) counter: usize,
}

impl<'a> OptimisationSession<'a> {
    pub fn new(
        routine: Routine,
        (results, design): (ResultVariableDict, DesignVariableDict),
        config: &RoutineConfig,
        runner: &'a dyn ModuleRunner,
        reporter: &'a ProgressReporter<'a>,
    ) -> Result<Self, EngineError> {
        for name in routine.objective.variables() {
            if !results.contains_key(name) {
                return Err(EngineError::UndefinedVariable(name.to_string()));
            }
        }
        if design.is_empty() {
            return Err(EngineError::InvalidDeclaration(
                "no design variable is declared".to_string(),
            ));
        }

        Ok(Self {
            routine,
            design,
            results,
            workspace: ModuleWorkspace::new(config.workflow.root.clone()),
            working_dir: config.workflow.working_dir.clone(),
            snapshot_every: config.workflow.snapshot_every,
            runner,
            reporter,
            counter: 0,
        })
    }

    pub fn workspace(&self) -> &ModuleWorkspace {
        &self.workspace
    }

    /// Number of iterations started so far.
    pub fn iterations(&self) -> usize {
        self.counter
    }

    pub fn design_keys(&self) -> Vec<String> {
        self.design.keys().cloned().collect()
    }

    pub fn result_keys(&self) -> Vec<String> {
        self.results.keys().cloned().collect()
    }
}

impl Problem for OptimisationSession<'_> {
    fn dimension(&self) -> usize {
        self.design.len()
    }

    fn initial_point(&self) -> Vec<f64> {
        self.design
            .values()
            .map(|entry| entry.initial().unwrap_or_default())
            .collect()
    }

    fn bounds(&self) -> Vec<(Option<f64>, Option<f64>)> {
        self.design.values().map(|entry| entry.bounds()).collect()
    }

    fn constraint_bounds(&self) -> Vec<(Option<f64>, Option<f64>)> {
        self.results.values().map(|entry| entry.bounds()).collect()
    }

    fn evaluate(&mut self, point: &[f64]) -> Result<Evaluation, EngineError> {
        ComponentGraph::new().evaluate(self, point)
    }
}

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

pub const DEFAULT_OBJECTIVE: &str = "cl/cd";
pub const DEFAULT_MAX_ITERATIONS: usize = 10;
pub const DEFAULT_TOLERANCE: f64 = 1e-6;
pub const DEFAULT_DOE_SAMPLES: usize = 10;
pub const DEFAULT_SNAPSHOT_EVERY: usize = 1;
pub const DEFAULT_RECORDER_FILE: &str = "Driver_recorder.csv";

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Invalid value for '{parameter}': {reason}")]
    InvalidValue {
        parameter: &'static str,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutineType {
    DesignOfExperiments,
    Optimisation,
}

impl FromStr for RoutineType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "doe" | "design-of-experiments" => Ok(RoutineType::DesignOfExperiments),
            "optim" | "optimisation" | "optimization" => Ok(RoutineType::Optimisation),
            other => Err(ConfigError::InvalidValue {
                parameter: "routine.type",
                reason: format!("unknown routine type '{}' (expected 'optim' or 'doe')", other),
            }),
        }
    }
}

impl fmt::Display for RoutineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoutineType::DesignOfExperiments => f.write_str("DoE"),
            RoutineType::Optimisation => f.write_str("Optim"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OptimiserAlgorithm {
    #[default]
    NelderMead,
}

impl FromStr for OptimiserAlgorithm {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "nelder-mead" | "neldermead" => Ok(OptimiserAlgorithm::NelderMead),
            other => Err(ConfigError::InvalidValue {
                parameter: "optimiser.algorithm",
                reason: format!("unknown algorithm '{}' (expected 'nelder-mead')", other),
            }),
        }
    }
}

impl fmt::Display for OptimiserAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptimiserAlgorithm::NelderMead => f.write_str("nelder-mead"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptimiserConfig {
    pub algorithm: OptimiserAlgorithm,
    pub max_iterations: usize,
    pub tolerance: f64,
}

impl Default for OptimiserConfig {
    fn default() -> Self {
        Self {
            algorithm: OptimiserAlgorithm::default(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            tolerance: DEFAULT_TOLERANCE,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DoeGenerator {
    Uniform { samples: usize, seed: Option<u64> },
    FullFactorial { levels: usize },
}

impl Default for DoeGenerator {
    fn default() -> Self {
        DoeGenerator::Uniform {
            samples: DEFAULT_DOE_SAMPLES,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowConfig {
    /// Directory holding one sub-directory per module (`<root>/<Module>/ToolInput`).
    pub root: PathBuf,
    /// Parent directory for the per-iteration working directories.
    pub working_dir: PathBuf,
    /// Archive the updated CPACS file every N iterations; 0 disables archiving.
    pub snapshot_every: usize,
    pub recorder_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoutineConfig {
    pub routine_type: RoutineType,
    pub modules: Vec<String>,
    pub objective: String,
    pub optimiser: OptimiserConfig,
    pub doe: DoeGenerator,
    pub workflow: WorkflowConfig,
}

#[derive(Default)]
pub struct RoutineConfigBuilder {
    routine_type: Option<RoutineType>,
    modules: Option<Vec<String>>,
    objective: Option<String>,
    optimiser: Option<OptimiserConfig>,
    doe: Option<DoeGenerator>,
    root: Option<PathBuf>,
    working_dir: Option<PathBuf>,
    snapshot_every: Option<usize>,
    recorder_path: Option<PathBuf>,
}

impl RoutineConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn routine_type(mut self, routine_type: RoutineType) -> Self {
        self.routine_type = Some(routine_type);
        self
    }
    pub fn modules<I, S>(mut self, modules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.modules = Some(modules.into_iter().map(Into::into).collect());
        self
    }
    pub fn objective(mut self, objective: impl Into<String>) -> Self {
        self.objective = Some(objective.into());
        self
    }
    pub fn optimiser(mut self, optimiser: OptimiserConfig) -> Self {
        self.optimiser = Some(optimiser);
        self
    }
    pub fn doe(mut self, generator: DoeGenerator) -> Self {
        self.doe = Some(generator);
        self
    }
    pub fn root(mut self, root: PathBuf) -> Self {
        self.root = Some(root);
        self
    }
    pub fn working_dir(mut self, dir: PathBuf) -> Self {
        self.working_dir = Some(dir);
        self
    }
    pub fn snapshot_every(mut self, every: usize) -> Self {
        self.snapshot_every = Some(every);
        self
    }
    pub fn recorder_path(mut self, path: PathBuf) -> Self {
        self.recorder_path = Some(path);
        self
    }

    pub fn build(self) -> Result<RoutineConfig, ConfigError> {
        let routine_type = self
            .routine_type
            .ok_or(ConfigError::MissingParameter("routine_type"))?;
        let modules = self
            .modules
            .ok_or(ConfigError::MissingParameter("modules"))?;
        if modules.is_empty() {
            return Err(ConfigError::InvalidValue {
                parameter: "modules",
                reason: "at least one module is required".to_string(),
            });
        }
        let root = self.root.ok_or(ConfigError::MissingParameter("root"))?;

        let optimiser = self.optimiser.unwrap_or_default();
        if optimiser.max_iterations == 0 {
            return Err(ConfigError::InvalidValue {
                parameter: "optimiser.max_iterations",
                reason: "must be at least 1".to_string(),
            });
        }
        if !(optimiser.tolerance.is_finite() && optimiser.tolerance >= 0.0) {
            return Err(ConfigError::InvalidValue {
                parameter: "optimiser.tolerance",
                reason: format!("{} is not a non-negative number", optimiser.tolerance),
            });
        }

        let doe = self.doe.unwrap_or_default();
        match doe {
            DoeGenerator::Uniform { samples: 0, .. } => {
                return Err(ConfigError::InvalidValue {
                    parameter: "doe.samples",
                    reason: "must be at least 1".to_string(),
                });
            }
            DoeGenerator::FullFactorial { levels } if levels < 2 => {
                return Err(ConfigError::InvalidValue {
                    parameter: "doe.levels",
                    reason: "a full factorial design needs at least 2 levels".to_string(),
                });
            }
            _ => {}
        }

        let working_dir = self.working_dir.unwrap_or_else(|| root.join("WKDIR"));
        let recorder_path = self
            .recorder_path
            .unwrap_or_else(|| root.join("Optimisation").join(DEFAULT_RECORDER_FILE));

        Ok(RoutineConfig {
            routine_type,
            modules,
            objective: self
                .objective
                .unwrap_or_else(|| DEFAULT_OBJECTIVE.to_string()),
            optimiser,
            doe,
            workflow: WorkflowConfig {
                root,
                working_dir,
                snapshot_every: self.snapshot_every.unwrap_or(DEFAULT_SNAPSHOT_EVERY),
                recorder_path,
            },
        })
    }
}

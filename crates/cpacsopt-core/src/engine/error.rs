use crate::core::cpacs::CpacsError;
use crate::core::expression::ExpressionError;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use super::config::ConfigError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Variable '{key}' has no value at '{xpath}' and declares no default")]
    MissingDeclaration { key: String, xpath: String },

    #[error("Result variable '{key}' not found at '{xpath}'")]
    PathNotFound { key: String, xpath: String },

    #[error("Objective references undefined variable '{0}'")]
    UndefinedVariable(String),

    #[error("Invalid objective expression: {0}")]
    Expression(ExpressionError),

    #[error("Objective '{expression}' evaluated to a non-finite value ({value})")]
    NonFiniteObjective { expression: String, value: f64 },

    #[error("Invalid variable declaration: {0}")]
    InvalidDeclaration(String),

    #[error("No command configured for module '{0}'")]
    UnknownModule(String),

    #[error("Module '{module}' failed: {reason}")]
    ModuleExecution { module: String, reason: String },

    #[error("Module '{module}' did not finish within {timeout:?}")]
    ModuleTimeout { module: String, timeout: Duration },

    #[error("Component '{component}' produced no value for '{key}'")]
    MissingOutput { component: &'static str, key: String },

    #[error("Constraints were read before the objective was evaluated for this point")]
    ConstraintOrdering,

    #[error("CPACS error: {0}")]
    Cpacs(#[from] CpacsError),

    #[error("File I/O error for '{path}': {source}", path = path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Recorder error for '{path}': {source}", path = path.display())]
    Recorder { path: PathBuf, source: csv::Error },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Driver '{driver}' failed: {reason}")]
    Driver { driver: &'static str, reason: String },
}

impl From<ExpressionError> for EngineError {
    fn from(e: ExpressionError) -> Self {
        match e {
            ExpressionError::UndefinedVariable(name) => EngineError::UndefinedVariable(name),
            other => EngineError::Expression(other),
        }
    }
}

impl EngineError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        EngineError::Io {
            path: path.into(),
            source,
        }
    }
}

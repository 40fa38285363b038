//! Declarative input/output metadata of the analysis modules.

pub mod models;
pub mod registry;

pub use models::{CpacsInOut, Integration, ModuleSpec, VarSpec};

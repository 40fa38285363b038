//! # cpacsopt
//!
//! The optimisation control loop of a CEASIOMpy-style aircraft design chain.
//! A driver proposes values for the design variables declared in a CPACS
//! file, the analysis modules run in order on that file, and result variables
//! read back from it feed the objective and the constraints.
//!
//! ## Layers
//!
//! - **[`core`]: Stateless foundation.** The CPACS document and its XPath
//!   addressing, the objective expression language and the module
//!   input/output specs.
//!
//! - **[`engine`]: The loop itself.** Variable dictionaries with append-only
//!   histories, the module workspace and runners, the iteration driver, the
//!   objective/constraint components and the optimisation and
//!   design-of-experiments drivers.
//!
//! - **[`workflows`]: Public API.** [`workflows::routine::run`] performs the
//!   whole routine from a [`engine::config::RoutineConfig`].

pub mod core;
pub mod engine;
pub mod workflows;

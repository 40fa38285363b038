//! # Workflows Module
//!
//! Entry points that tie the [`engine`](crate::engine) and [`core`](crate::core)
//! together into a complete run.
//!
//! - **Routine Workflow** ([`routine`]) - builds the variable dictionaries from
//!   the first module's input, stages the initial CPACS file, runs the
//!   configured driver over the module chain and reports the best design.

pub mod routine;

//! # Engine Module
//!
//! The stateful part of the optimisation loop: variable dictionaries, the
//! module chain, the iteration driver and the drivers that choose design
//! points.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - routine type, module list, objective and driver settings
//! - **Variables** ([`variables`]) - design and result dictionaries with append-only histories
//! - **Module chain** ([`workspace`], [`runner`]) - slot layout on disk and module execution
//! - **Session** ([`session`], [`iteration`]) - one run's state and the per-iteration procedure
//! - **Evaluation graph** ([`components`]) - objective and constraint components seen by a driver
//! - **Drivers** ([`drivers`]) - optimisers and design-of-experiments generators
//! - **Recorder** ([`recorder`]) - one CSV row per evaluated case
//! - **Progress** ([`progress`]) and **Errors** ([`error`])
//!
//! Evaluations are strictly sequential: every iteration rewrites the same
//! slot files, so the session is borrowed mutably for the whole evaluation.

pub mod components;
pub mod config;
pub mod drivers;
pub mod error;
pub mod iteration;
pub mod progress;
pub mod recorder;
pub mod runner;
pub mod session;
pub mod variables;
pub mod workspace;

#[cfg(test)]
pub(crate) mod test_support;

//! # Core Module
//!
//! Stateless building blocks shared by the optimisation engine.
//!
//! - **CPACS access** ([`cpacs`]) - Reading and writing the shared aircraft
//!   description at XPath-like locations, plus aeromap maintenance
//! - **Module metadata** ([`specs`]) - The variables each analysis module
//!   reads from and writes to the CPACS file
//! - **Objective formulas** ([`expression`]) - A sandboxed arithmetic parser
//!   used to turn result variables into a scalar objective

pub mod cpacs;
pub mod expression;
pub mod specs;

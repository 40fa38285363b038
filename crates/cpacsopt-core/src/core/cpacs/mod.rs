//! Access to the shared CPACS aircraft description.
//!
//! The CPACS file is the only channel between successive analysis modules, so
//! everything the optimisation loop reads or writes goes through
//! [`CpacsDocument`] at fixed, XPath-like locations ([`XPath`]).

pub mod aeromap;
pub mod document;
pub mod element;
pub mod xpath;

pub use document::CpacsDocument;
pub use element::{Element, Node};
pub use xpath::XPath;

use thiserror::Error;

pub const CEASIOM_XPATH: &str = "/cpacs/toolspecific/CEASIOMpy";
pub const SU2_XPATH: &str = "/cpacs/toolspecific/CEASIOMpy/aerodynamics/su2";
pub const AEROMAP_UID_XPATH: &str = "/cpacs/toolspecific/CEASIOMpy/aerodynamics/su2/aeroMapUID";
pub const WKDIR_XPATH: &str = "/cpacs/toolspecific/CEASIOMpy/filesPath/wkdirPath";
pub const OPTIM_VARIABLES_XPATH: &str = "/cpacs/toolspecific/CEASIOMpy/Optimisation/variables";
pub const AEROPERFORMANCE_XPATH: &str = "/cpacs/vehicles/aircraft/model/analyses/aeroPerformance";

#[derive(Debug, Error)]
pub enum CpacsError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("XML parsing error for '{path}': {source}")]
    Parse {
        path: String,
        source: xml::reader::Error,
    },
    #[error("'{path}' has no root element")]
    NoRoot { path: String },
    #[error("XML writing error: {0}")]
    Write(#[from] xml::writer::Error),
    #[error("Invalid CPACS path '{xpath}': {reason}")]
    InvalidPath { xpath: String, reason: String },
    #[error("Path '{xpath}' does not start at the document root <{root}>")]
    RootMismatch { xpath: String, root: String },
    #[error("Cannot create element for '{xpath}': {reason}")]
    Unwritable { xpath: String, reason: String },
    #[error("Value '{value}' at '{xpath}' is not a number")]
    NotANumber { xpath: String, value: String },
}

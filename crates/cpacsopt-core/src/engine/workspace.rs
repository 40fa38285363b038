use super::error::EngineError;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Pseudo-module that owns the CPACS file between iterations.
pub const UPDATER_MODULE: &str = "CPACSUpdater";
/// Module directory collecting the initial model, snapshots and the recorder.
pub const OPTIMISATION_MODULE: &str = "Optimisation";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Slot {
    In,
    Out,
    /// A named archive file, `<root>/<module>/<name>.xml`.
    Named(String),
}

impl Slot {
    pub fn named(name: impl Into<String>) -> Self {
        Slot::Named(name.into())
    }
}

/// On-disk layout shared by the module chain.
///
/// Every module reads `<root>/<Module>/ToolInput/ToolInput.xml` and writes
/// `<root>/<Module>/ToolOutput/ToolOutput.xml`; handing a document from one
/// module to the next is a file copy between those slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleWorkspace {
    root: PathBuf,
}

impl ModuleWorkspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn slot(&self, module: &str, slot: &Slot) -> PathBuf {
        let module_dir = self.root.join(module);
        match slot {
            Slot::In => module_dir.join("ToolInput").join("ToolInput.xml"),
            Slot::Out => module_dir.join("ToolOutput").join("ToolOutput.xml"),
            Slot::Named(name) => module_dir.join(format!("{}.xml", name)),
        }
    }

    pub fn tool_input(&self, module: &str) -> PathBuf {
        self.slot(module, &Slot::In)
    }

    pub fn tool_output(&self, module: &str) -> PathBuf {
        self.slot(module, &Slot::Out)
    }

    pub fn copy_module_to_module(
        &self,
        from: &str,
        from_slot: &Slot,
        to: &str,
        to_slot: &Slot,
    ) -> Result<PathBuf, EngineError> {
        let source = self.slot(from, from_slot);
        let target = self.slot(to, to_slot);
        ensure_parent(&target)?;
        fs::copy(&source, &target).map_err(|e| EngineError::io(&source, e))?;
        debug!("Copied {:?} -> {:?}", source, target);
        Ok(target)
    }
}

/// Creates `<working_dir>/Run_<date>/Iter_<iteration>` and returns its path.
pub fn create_iteration_dir(
    working_dir: &Path,
    date: &str,
    iteration: usize,
) -> Result<PathBuf, EngineError> {
    let dir = working_dir
        .join(format!("Run_{}", date))
        .join(format!("Iter_{}", iteration));
    fs::create_dir_all(&dir).map_err(|e| EngineError::io(&dir, e))?;
    Ok(dir)
}

pub(crate) fn ensure_parent(path: &Path) -> Result<(), EngineError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| EngineError::io(parent, e))?;
    }
    Ok(())
}

use super::error::EngineError;
use super::workspace::{ModuleWorkspace, ensure_parent};
use std::collections::HashMap;
use std::fs::File;
use std::future::Future;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::runtime::{Builder, Handle};
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Executes one analysis module.
///
/// A module consumes the document in its input slot and must leave its result
/// in its output slot; nothing else is returned.
pub trait ModuleRunner {
    fn run(&self, module: &str, workspace: &ModuleWorkspace) -> Result<(), EngineError>;
}

impl<F> ModuleRunner for F
where
    F: Fn(&str, &ModuleWorkspace) -> Result<(), EngineError>,
{
    fn run(&self, module: &str, workspace: &ModuleWorkspace) -> Result<(), EngineError> {
        self(module, workspace)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModuleCommand {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
}

impl ModuleCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn working_dir(mut self, dir: PathBuf) -> Self {
        self.working_dir = Some(dir);
        self
    }
}

/// Runs modules as external processes.
///
/// The child gets its slot paths in `CPACS_IN` and `CPACS_OUT`; stdout and
/// stderr go to `<root>/<Module>/run.log`.
#[derive(Debug, Clone, Default)]
pub struct CommandRunner {
    commands: HashMap<String, ModuleCommand>,
    timeout: Option<Duration>,
}

impl CommandRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_command(mut self, module: impl Into<String>, command: ModuleCommand) -> Self {
        self.commands.insert(module.into(), command);
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn has_command(&self, module: &str) -> bool {
        self.commands.contains_key(module)
    }

    fn spawn(
        &self,
        module: &str,
        command: &ModuleCommand,
        workspace: &ModuleWorkspace,
    ) -> Result<(Child, PathBuf), EngineError> {
        let input = workspace.tool_input(module);
        let output = workspace.tool_output(module);
        ensure_parent(&output)?;

        let log_path = workspace.root().join(module).join("run.log");
        let log = File::create(&log_path).map_err(|e| EngineError::io(&log_path, e))?;
        let log_err = log.try_clone().map_err(|e| EngineError::io(&log_path, e))?;

        let mut process = Command::new(&command.program);
        process
            .args(&command.args)
            .env("CPACS_IN", &input)
            .env("CPACS_OUT", &output)
            .stdin(Stdio::null())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(log_err))
            .kill_on_drop(true);
        if let Some(dir) = &command.working_dir {
            process.current_dir(dir);
        }

        debug!("Spawning {:?} for module '{}'", process.as_std(), module);
        let child = process.spawn().map_err(|e| EngineError::ModuleExecution {
            module: module.to_string(),
            reason: format!("could not start '{}': {}", command.program, e),
        })?;
        Ok((child, log_path))
    }

    async fn wait(&self, module: &str, mut child: Child) -> Result<ExitStatus, EngineError> {
        let failed = |e: std::io::Error| EngineError::ModuleExecution {
            module: module.to_string(),
            reason: format!("could not wait for process: {}", e),
        };

        let Some(limit) = self.timeout else {
            return child.wait().await.map_err(failed);
        };

        match timeout(limit, child.wait()).await {
            Ok(status) => status.map_err(failed),
            Err(_) => {
                warn!("Module '{}' exceeded {:?}; killing it.", module, limit);
                // Kills and reaps.
                if let Err(e) = child.kill().await {
                    warn!("Failed to kill and reap module '{}': {}", module, e);
                }
                Err(EngineError::ModuleTimeout {
                    module: module.to_string(),
                    timeout: limit,
                })
            }
        }
    }

    async fn execute(
        &self,
        module: &str,
        command: &ModuleCommand,
        workspace: &ModuleWorkspace,
    ) -> Result<(ExitStatus, PathBuf), EngineError> {
        let (child, log_path) = self.spawn(module, command, workspace)?;
        let status = self.wait(module, child).await?;
        Ok((status, log_path))
    }
}

/// Drives a process future from the synchronous module chain: on the
/// surrounding runtime when there is one (the CLI calls in through
/// `block_in_place`), otherwise on a private current-thread runtime.
fn block_on<F: Future>(module: &str, future: F) -> Result<F::Output, EngineError> {
    if let Ok(handle) = Handle::try_current() {
        return Ok(handle.block_on(future));
    }
    let runtime = Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| EngineError::ModuleExecution {
            module: module.to_string(),
            reason: format!("could not start the process runtime: {}", e),
        })?;
    Ok(runtime.block_on(future))
}

impl ModuleRunner for CommandRunner {
    fn run(&self, module: &str, workspace: &ModuleWorkspace) -> Result<(), EngineError> {
        let command = self
            .commands
            .get(module)
            .ok_or_else(|| EngineError::UnknownModule(module.to_string()))?;

        info!("Running module '{}'", module);
        let (status, log_path) = block_on(module, self.execute(module, command, workspace))??;

        if !status.success() {
            return Err(EngineError::ModuleExecution {
                module: module.to_string(),
                reason: format!("exited with {} (see {:?})", status, log_path),
            });
        }

        let output = workspace.tool_output(module);
        if !output.is_file() {
            return Err(EngineError::ModuleExecution {
                module: module.to_string(),
                reason: format!("finished without writing {:?}", output),
            });
        }
        Ok(())
    }
}

use crate::cli::RunArgs;
use crate::error::{CliError, Result};
use cpacsopt::engine::config::{
    self as core_config, DEFAULT_DOE_SAMPLES, DoeGenerator, OptimiserAlgorithm, OptimiserConfig,
    RoutineType,
};
use cpacsopt::engine::runner::{CommandRunner, ModuleCommand};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialRoutineSection {
    #[serde(rename = "type")]
    routine_type: Option<String>,
    modules: Option<Vec<String>>,
    objective: Option<String>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialOptimiserConfig {
    algorithm: Option<String>,
    max_iterations: Option<usize>,
    tolerance: Option<f64>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialDoeConfig {
    generator: Option<String>,
    samples: Option<usize>,
    seed: Option<u64>,
    levels: Option<usize>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialWorkflowConfig {
    root: Option<PathBuf>,
    working_dir: Option<PathBuf>,
    snapshot_every: Option<usize>,
    recorder_path: Option<PathBuf>,
    module_timeout_secs: Option<u64>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialModuleCommand {
    command: String,
    #[serde(default)]
    args: Vec<String>,
    working_dir: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct PartialRoutineConfig {
    routine: Option<PartialRoutineSection>,
    optimiser: Option<PartialOptimiserConfig>,
    doe: Option<PartialDoeConfig>,
    workflow: Option<PartialWorkflowConfig>,
    #[serde(default)]
    modules: BTreeMap<String, PartialModuleCommand>,
    #[serde(skip)]
    base_dir: PathBuf,
}

/// Everything the `run` command needs after merging file and CLI settings.
#[derive(Debug)]
pub struct RunSettings {
    pub routine: core_config::RoutineConfig,
    pub runner: CommandRunner,
}

fn parse_value<T: FromStr>(key: &str, value: &str, kind: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        CliError::Config(format!("Invalid {} value for {}: {}", kind, key, value))
    })
}

impl PartialRoutineConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        let mut partial: Self = toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })?;
        partial.base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Ok(partial)
    }

    /// Relative paths in the file are taken relative to the file itself.
    fn resolve(&self, path: PathBuf) -> PathBuf {
        if path.is_absolute() {
            path
        } else {
            self.base_dir.join(path)
        }
    }

    pub fn merge_with_cli(mut self, args: &RunArgs) -> Result<RunSettings> {
        self.apply_set_values(&args.set_values)?;

        let routine = self.routine.take().unwrap_or_default();
        let optimiser = self.optimiser.take().unwrap_or_default();
        let doe = self.doe.take().unwrap_or_default();
        let workflow = self.workflow.take().unwrap_or_default();

        let routine_type: RoutineType = args
            .routine_type
            .as_deref()
            .or(routine.routine_type.as_deref())
            .ok_or_else(|| {
                CliError::Config(
                    "`routine.type` is required either in the config file or via --routine-type."
                        .to_string(),
                )
            })?
            .parse()?;

        let modules = if args.modules.is_empty() {
            routine.modules.unwrap_or_default()
        } else {
            args.modules.clone()
        };

        let root = args
            .root
            .clone()
            .or_else(|| workflow.root.clone().map(|p| self.resolve(p)))
            .ok_or_else(|| {
                CliError::Config(
                    "`workflow.root` is required either in the config file or via --root."
                        .to_string(),
                )
            })?;

        let mut builder = core_config::RoutineConfigBuilder::new()
            .routine_type(routine_type)
            .modules(modules.iter().cloned())
            .optimiser(Self::merge_optimiser(args, optimiser)?)
            .doe(Self::merge_doe(args, doe)?)
            .root(root);
        if let Some(objective) = args.objective.clone().or(routine.objective) {
            builder = builder.objective(objective);
        }
        if let Some(dir) = workflow.working_dir.clone() {
            builder = builder.working_dir(self.resolve(dir));
        }
        if let Some(path) = workflow.recorder_path.clone() {
            builder = builder.recorder_path(self.resolve(path));
        }
        if args.no_snapshots {
            builder = builder.snapshot_every(0);
        } else if let Some(every) = workflow.snapshot_every {
            builder = builder.snapshot_every(every);
        }
        let routine_config = builder.build()?;

        let timeout = args
            .module_timeout
            .or(workflow.module_timeout_secs)
            .map(Duration::from_secs);
        let runner = self.build_runner(&routine_config.modules, timeout)?;

        Ok(RunSettings {
            routine: routine_config,
            runner,
        })
    }

    fn merge_optimiser(args: &RunArgs, file: PartialOptimiserConfig) -> Result<OptimiserConfig> {
        let defaults = OptimiserConfig::default();
        let algorithm = match args.algorithm.as_deref().or(file.algorithm.as_deref()) {
            Some(name) => name.parse::<OptimiserAlgorithm>()?,
            None => defaults.algorithm,
        };
        Ok(OptimiserConfig {
            algorithm,
            max_iterations: args
                .max_iterations
                .or(file.max_iterations)
                .unwrap_or(defaults.max_iterations),
            tolerance: args
                .tolerance
                .or(file.tolerance)
                .unwrap_or(defaults.tolerance),
        })
    }

    fn merge_doe(args: &RunArgs, file: PartialDoeConfig) -> Result<DoeGenerator> {
        match file.generator.as_deref().unwrap_or("uniform") {
            "uniform" => Ok(DoeGenerator::Uniform {
                samples: args
                    .samples
                    .or(file.samples)
                    .unwrap_or(DEFAULT_DOE_SAMPLES),
                seed: args.seed.or(file.seed),
            }),
            "full-factorial" => Ok(DoeGenerator::FullFactorial {
                levels: file.levels.ok_or_else(|| {
                    CliError::Config("`doe.generator = \"full-factorial\"` requires `levels`".to_string())
                })?,
            }),
            other => Err(CliError::Config(format!(
                "Unknown DoE generator '{}'. Expected 'uniform' or 'full-factorial'.",
                other
            ))),
        }
    }

    fn build_runner(&self, chain: &[String], timeout: Option<Duration>) -> Result<CommandRunner> {
        let mut runner = CommandRunner::new().with_timeout(timeout);
        for module in chain {
            let partial = self.modules.get(module).ok_or_else(|| {
                CliError::Config(format!(
                    "No command configured for module '{}'. Add a [modules.{}] section.",
                    module, module
                ))
            })?;
            let mut command = ModuleCommand::new(partial.command.clone()).args(partial.args.clone());
            if let Some(dir) = partial.working_dir.clone() {
                command = command.working_dir(self.resolve(dir));
            }
            runner = runner.with_command(module.clone(), command);
        }
        Ok(runner)
    }

    fn apply_set_values(&mut self, set_values: &[String]) -> Result<()> {
        for kv_pair in set_values {
            let Some((key, value_str)) = kv_pair.split_once('=') else {
                return Err(CliError::Config(format!(
                    "Invalid --set format: '{}'. Expected KEY=VALUE.",
                    kv_pair
                )));
            };

            match key {
                "routine.type" => {
                    self.routine
                        .get_or_insert_with(Default::default)
                        .routine_type = Some(value_str.to_string());
                }
                "routine.objective" => {
                    self.routine.get_or_insert_with(Default::default).objective =
                        Some(value_str.to_string());
                }
                "optimiser.algorithm" => {
                    self.optimiser.get_or_insert_with(Default::default).algorithm =
                        Some(value_str.to_string());
                }
                "optimiser.max-iterations" => {
                    self.optimiser
                        .get_or_insert_with(Default::default)
                        .max_iterations = Some(parse_value(key, value_str, "integer")?);
                }
                "optimiser.tolerance" => {
                    self.optimiser.get_or_insert_with(Default::default).tolerance =
                        Some(parse_value(key, value_str, "float")?);
                }
                "doe.generator" => {
                    self.doe.get_or_insert_with(Default::default).generator =
                        Some(value_str.to_string());
                }
                "doe.samples" => {
                    self.doe.get_or_insert_with(Default::default).samples =
                        Some(parse_value(key, value_str, "integer")?);
                }
                "doe.seed" => {
                    self.doe.get_or_insert_with(Default::default).seed =
                        Some(parse_value(key, value_str, "integer")?);
                }
                "doe.levels" => {
                    self.doe.get_or_insert_with(Default::default).levels =
                        Some(parse_value(key, value_str, "integer")?);
                }
                "workflow.snapshot-every" => {
                    self.workflow
                        .get_or_insert_with(Default::default)
                        .snapshot_every = Some(parse_value(key, value_str, "integer")?);
                }
                "workflow.module-timeout-secs" => {
                    self.workflow
                        .get_or_insert_with(Default::default)
                        .module_timeout_secs = Some(parse_value(key, value_str, "integer")?);
                }
                _ => {
                    return Err(CliError::Config(format!(
                        "Unsupported configuration key for --set: '{}'",
                        key
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;
    use once_cell::sync::Lazy;
    use std::fs;
    use tempfile::{TempDir, tempdir};

    static TEST_DIR: Lazy<TempDir> = Lazy::new(|| tempdir().expect("Failed to create temp dir"));

    const BASE_CONFIG: &str = r#"
        [routine]
        type = "optim"
        modules = ["SkinFriction"]

        [workflow]
        root = "modules"

        [modules.SkinFriction]
        command = "python"
        args = ["-m", "ceasiompy.SkinFriction"]
    "#;

    fn write_config_file(name: &str, content: &str) -> PathBuf {
        let file_path = TEST_DIR.path().join(name);
        fs::write(&file_path, content).unwrap();
        file_path
    }

    fn parse_run_args(config_path: &Path, extra: &[&str]) -> RunArgs {
        let mut args = vec![
            "cpacsopt".to_string(),
            "run".to_string(),
            "-c".to_string(),
            config_path.to_str().unwrap().to_string(),
        ];
        args.extend(extra.iter().map(|s| s.to_string()));
        match Cli::parse_from(args).command {
            Commands::Run(run_args) => run_args,
            _ => panic!("Expected 'run' subcommand"),
        }
    }

    #[test]
    fn load_from_file_and_merge_with_defaults() {
        let config_path = write_config_file("config_defaults.toml", BASE_CONFIG);
        let args = parse_run_args(&config_path, &[]);

        let settings = PartialRoutineConfig::from_file(&config_path)
            .unwrap()
            .merge_with_cli(&args)
            .unwrap();
        let config = settings.routine;

        assert_eq!(config.routine_type, RoutineType::Optimisation);
        assert_eq!(config.modules, ["SkinFriction"]);
        assert_eq!(config.objective, "cl/cd");
        assert_eq!(config.optimiser.max_iterations, 10);
        assert_eq!(config.workflow.root, TEST_DIR.path().join("modules"));
        assert_eq!(config.workflow.snapshot_every, 1);
        assert!(settings.runner.has_command("SkinFriction"));
    }

    #[test]
    fn cli_args_override_file_values() {
        let content = format!(
            "{}\n[optimiser]\nmax-iterations = 5 # Will be overridden\n",
            BASE_CONFIG
        );
        let config_path = write_config_file("config_override.toml", &content);
        let args = parse_run_args(
            &config_path,
            &[
                "--max-iterations",
                "40",
                "--objective",
                "cl",
                "--root",
                "/elsewhere",
                "--no-snapshots",
            ],
        );

        let config = PartialRoutineConfig::from_file(&config_path)
            .unwrap()
            .merge_with_cli(&args)
            .unwrap()
            .routine;

        assert_eq!(config.optimiser.max_iterations, 40);
        assert_eq!(config.objective, "cl");
        assert_eq!(config.workflow.root, PathBuf::from("/elsewhere"));
        assert_eq!(config.workflow.snapshot_every, 0);
    }

    #[test]
    fn set_value_overrides_file_and_defaults() {
        let content = format!("{}\n[doe]\nsamples = 3\n", BASE_CONFIG);
        let config_path = write_config_file("config_set.toml", &content);
        let args = parse_run_args(
            &config_path,
            &["-S", "routine.type=doe", "-S", "doe.samples=20", "-S", "doe.seed=9"],
        );

        let config = PartialRoutineConfig::from_file(&config_path)
            .unwrap()
            .merge_with_cli(&args)
            .unwrap()
            .routine;

        assert_eq!(config.routine_type, RoutineType::DesignOfExperiments);
        assert_eq!(
            config.doe,
            DoeGenerator::Uniform {
                samples: 20,
                seed: Some(9)
            }
        );
    }

    #[test]
    fn full_factorial_generator_needs_levels() {
        let content = format!("{}\n[doe]\ngenerator = \"full-factorial\"\n", BASE_CONFIG);
        let config_path = write_config_file("config_factorial.toml", &content);
        let args = parse_run_args(&config_path, &[]);
        let result = PartialRoutineConfig::from_file(&config_path)
            .unwrap()
            .merge_with_cli(&args);
        assert!(matches!(result, Err(CliError::Config(msg)) if msg.contains("levels")));
    }

    #[test]
    fn module_without_command_is_rejected() {
        let config_path = write_config_file("config_no_command.toml", BASE_CONFIG);
        let args = parse_run_args(&config_path, &["-m", "SkinFriction", "-m", "SU2Run"]);
        let result = PartialRoutineConfig::from_file(&config_path)
            .unwrap()
            .merge_with_cli(&args);
        assert!(matches!(result, Err(CliError::Config(msg)) if msg.contains("SU2Run")));
    }

    #[test]
    fn unknown_keys_fail_to_parse() {
        let content = format!("{}\n[optimiser]\nmaxiter = 10\n", BASE_CONFIG);
        let config_path = write_config_file("config_unknown.toml", &content);
        assert!(matches!(
            PartialRoutineConfig::from_file(&config_path),
            Err(CliError::FileParsing { .. })
        ));
    }

    #[test]
    fn malformed_set_values_are_rejected() {
        let config_path = write_config_file("config_bad_set.toml", BASE_CONFIG);
        for bad in ["doe.samples", "doe.samples=many", "forcefield.s-factor=1"] {
            let args = parse_run_args(&config_path, &["-S", bad]);
            let result = PartialRoutineConfig::from_file(&config_path)
                .unwrap()
                .merge_with_cli(&args);
            assert!(matches!(result, Err(CliError::Config(_))), "{}", bad);
        }
    }

    #[test]
    fn missing_routine_type_returns_error() {
        let config_path = write_config_file(
            "config_missing.toml",
            "[workflow]\nroot = \"modules\"\n",
        );
        let args = parse_run_args(&config_path, &[]);
        let result = PartialRoutineConfig::from_file(&config_path)
            .unwrap()
            .merge_with_cli(&args);
        assert!(matches!(result, Err(CliError::Config(msg)) if msg.contains("routine.type")));
    }
}

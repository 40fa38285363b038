use crate::engine::config::RoutineConfig;
use crate::engine::drivers::{DriverSummary, build_driver};
use crate::engine::error::EngineError;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::recorder::{DriverRecorder, RecordedProblem};
use crate::engine::runner::ModuleRunner;
use crate::engine::session::{OptimisationSession, Routine};
use crate::engine::variables::{DesignVariableDict, ResultVariableDict, init_dict};
use crate::engine::workspace::{ModuleWorkspace, OPTIMISATION_MODULE, Slot, UPDATER_MODULE};
use chrono::Local;
use std::path::PathBuf;
use tracing::{info, instrument};

const DATE_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

#[derive(Debug, Clone)]
pub struct RoutineResult {
    pub routine: Routine,
    pub summary: DriverSummary,
    pub design: DesignVariableDict,
    pub results: ResultVariableDict,
    pub iterations: usize,
    pub recorder_path: PathBuf,
}

impl RoutineResult {
    /// Best objective in the orientation it was written (maximised).
    pub fn best_objective(&self) -> f64 {
        -self.summary.best_objective
    }
}

#[instrument(skip_all, name = "routine_workflow")]
pub fn run(
    config: &RoutineConfig,
    runner: &dyn ModuleRunner,
    reporter: &ProgressReporter,
) -> Result<RoutineResult, EngineError> {
    // === Phase 0: Setup ===
    reporter.report(Progress::PhaseStart {
        name: "Preparation",
    });
    let date = Local::now().format(DATE_FORMAT).to_string();
    let routine = Routine::from_config(config, date)?;
    info!(
        routine = %routine.routine_type,
        driver = %routine.driver,
        objective = %routine.objective,
        "Setting up routine for modules {:?}.",
        routine.modules
    );

    let workspace = ModuleWorkspace::new(config.workflow.root.clone());
    let dicts = init_dict(&workspace.tool_input(routine.first_module()))?;
    stage_initial_files(&workspace, routine.first_module())?;
    log_problem_description(&routine, &dicts.0, &dicts.1);

    let mut session = OptimisationSession::new(routine, dicts, config, runner, reporter)?;
    reporter.report(Progress::PhaseFinish);

    // === Phase 1: Driver loop ===
    let mut driver = build_driver(config);
    let mut recorder = DriverRecorder::create(
        &config.workflow.recorder_path,
        &session.design_keys(),
        &session.result_keys(),
    )?;
    reporter.report(Progress::DriverStart {
        expected_evaluations: driver.expected_evaluations(session.design.len()),
    });
    info!("Starting driver '{}'.", driver.name());
    let summary = {
        let mut recorded = RecordedProblem::new(&mut session, &mut recorder);
        driver.run(&mut recorded)?
    };
    reporter.report(Progress::DriverFinish);

    // === Phase 2: Results ===
    let iterations = session.iterations();
    let result = RoutineResult {
        routine: session.routine,
        summary,
        design: session.design,
        results: session.results,
        iterations,
        recorder_path: recorder.path().to_path_buf(),
    };
    log_results(&result);
    Ok(result)
}

/// Copies the first module's document (its output if it has already run,
/// otherwise its input) to `Optimisation/initial.xml` and to the updater
/// input, where the first iteration picks it up.
fn stage_initial_files(workspace: &ModuleWorkspace, first_module: &str) -> Result<(), EngineError> {
    let source = if workspace.tool_output(first_module).is_file() {
        Slot::Out
    } else {
        Slot::In
    };
    workspace.copy_module_to_module(
        first_module,
        &source,
        OPTIMISATION_MODULE,
        &Slot::named("initial"),
    )?;
    workspace.copy_module_to_module(first_module, &source, UPDATER_MODULE, &Slot::In)?;
    Ok(())
}

fn log_problem_description(
    routine: &Routine,
    results: &ResultVariableDict,
    design: &DesignVariableDict,
) {
    info!("-------------------------------------------------------------");
    info!("Routine: {} ({})", routine.routine_type, routine.driver);
    info!("Objective function: {}", routine.objective);
    info!("Design variables:");
    for entry in design.values() {
        info!(
            "  {} = {} in [{}, {}] {}",
            entry.key,
            entry.initial().unwrap_or_default(),
            display_bound(entry.lower_bound),
            display_bound(entry.upper_bound),
            entry.unit.as_deref().unwrap_or("")
        );
    }
    info!("Result variables:");
    for entry in results.values() {
        info!(
            "  {} = {} {}",
            entry.key,
            entry.initial().unwrap_or_default(),
            entry.unit.as_deref().unwrap_or("")
        );
    }
    info!("-------------------------------------------------------------");
}

fn display_bound(bound: Option<f64>) -> String {
    bound.map_or_else(|| "-".to_string(), |b| b.to_string())
}

fn log_results(result: &RoutineResult) {
    info!("{}", result.summary.message);
    info!(
        "Best objective {} = {} after {} evaluation(s){}",
        result.routine.objective,
        result.best_objective(),
        result.summary.evaluations,
        if result.summary.feasible {
            ""
        } else {
            " (constraints violated)"
        }
    );
    for (entry, value) in result.design.values().zip(&result.summary.best_point) {
        info!("  {} = {}", entry.key, value);
    }
    for entry in result.design.values().chain(result.results.values()) {
        info!("History of {}: {:?}", entry.key, entry.history);
    }
    info!("Driver cases recorded in {:?}.", result.recorder_path);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cpacs::CpacsDocument;
    use crate::engine::config::{
        DoeGenerator, OptimiserConfig, RoutineConfigBuilder, RoutineType,
    };
    use crate::engine::test_support::{INITIAL, SPEED_XPATH, fake_aero};
    use crate::engine::workspace::ensure_parent;
    use std::fs;
    use std::sync::{Arc, Mutex};
    use tempfile::{TempDir, tempdir};

    fn staged(module: &str) -> TempDir {
        let dir = tempdir().unwrap();
        let ws = ModuleWorkspace::new(dir.path());
        let input = ws.tool_input(module);
        ensure_parent(&input).unwrap();
        fs::write(&input, INITIAL).unwrap();
        dir
    }

    #[test]
    fn optimisation_drives_speed_towards_the_upper_bound() {
        let dir = staged("Aero");
        let config = RoutineConfigBuilder::new()
            .routine_type(RoutineType::Optimisation)
            .modules(["Aero"])
            .root(dir.path().to_path_buf())
            .optimiser(OptimiserConfig {
                max_iterations: 30,
                ..OptimiserConfig::default()
            })
            .build()
            .unwrap();
        let runner = fake_aero;
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let reporter = ProgressReporter::with_callback(Box::new(move |event| {
            sink.lock().unwrap().push(event);
        }));

        let result = run(&config, &runner, &reporter).unwrap();

        assert!(result.summary.best_point[0] > 200.0);
        assert!(result.summary.best_point[0] <= 300.0);
        assert!(result.best_objective() > 2.0);
        assert_eq!(result.iterations, result.summary.evaluations);

        let speed = &result.design["speed"].history;
        assert_eq!(speed[0], 200.0);
        assert_eq!(speed.len(), result.iterations + 1);
        assert!(
            result
                .results
                .values()
                .all(|e| e.history.len() == result.iterations + 1)
        );

        let ws = ModuleWorkspace::new(dir.path());
        assert!(ws.slot(OPTIMISATION_MODULE, &Slot::named("initial")).is_file());
        let recorded = fs::read_to_string(&result.recorder_path).unwrap();
        assert!(recorded.starts_with("iteration,speed,objective,cl,cd"));
        assert_eq!(recorded.lines().count(), result.iterations + 1);

        let events = events.lock().unwrap();
        assert!(events.contains(&Progress::DriverFinish));
        let finished = events
            .iter()
            .filter(|e| matches!(e, Progress::EvaluationFinish { .. }))
            .count();
        assert_eq!(finished, result.iterations);
    }

    #[test]
    fn design_of_experiments_evaluates_every_sample() {
        let dir = staged("Aero");
        let config = RoutineConfigBuilder::new()
            .routine_type(RoutineType::DesignOfExperiments)
            .modules(["Aero"])
            .root(dir.path().to_path_buf())
            .doe(DoeGenerator::FullFactorial { levels: 3 })
            .build()
            .unwrap();
        let runner = fake_aero;
        let reporter = ProgressReporter::new();

        let result = run(&config, &runner, &reporter).unwrap();

        assert_eq!(result.iterations, 3);
        assert_eq!(result.design["speed"].history, vec![200.0, 100.0, 200.0, 300.0]);
        assert_eq!(result.summary.best_point, vec![300.0]);

        let ws = ModuleWorkspace::new(dir.path());
        let last = CpacsDocument::open(&ws.tool_input(UPDATER_MODULE)).unwrap();
        assert_eq!(last.get_f64(SPEED_XPATH).unwrap(), Some(300.0));
    }

    #[test]
    fn undeclared_objective_fails_before_any_module_runs() {
        let dir = staged("Aero");
        let config = RoutineConfigBuilder::new()
            .routine_type(RoutineType::Optimisation)
            .modules(["Aero"])
            .root(dir.path().to_path_buf())
            .objective("cl/cms")
            .build()
            .unwrap();
        let runner = |_: &str, _: &ModuleWorkspace| -> Result<(), EngineError> {
            panic!("no module may run")
        };
        let reporter = ProgressReporter::new();

        let result = run(&config, &runner, &reporter);

        assert!(matches!(result, Err(EngineError::UndefinedVariable(ref v)) if v == "cms"));
    }

    #[test]
    fn missing_first_module_input_is_an_error() {
        let dir = tempdir().unwrap();
        let config = RoutineConfigBuilder::new()
            .routine_type(RoutineType::Optimisation)
            .modules(["Aero"])
            .root(dir.path().to_path_buf())
            .build()
            .unwrap();
        let runner = fake_aero;
        let reporter = ProgressReporter::new();
        assert!(matches!(
            run(&config, &runner, &reporter),
            Err(EngineError::Cpacs(_))
        ));
    }
}

use crate::cli::RunArgs;
use crate::config::PartialRoutineConfig;
use crate::error::Result;
use crate::utils::progress::CliProgressHandler;
use cpacsopt::{engine::progress::ProgressReporter, workflows};
use tracing::{info, warn};

pub async fn run(args: RunArgs) -> Result<()> {
    let partial_config = PartialRoutineConfig::from_file(&args.config)?;
    info!("Merging configuration from file and CLI arguments...");
    let settings = partial_config.merge_with_cli(&args)?;
    let config = &settings.routine;

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!(
        "Starting {} routine over [{}] in {}...",
        config.routine_type,
        config.modules.join(" -> "),
        config.workflow.root.display()
    );
    info!("Invoking the core routine workflow...");

    let result = tokio::task::block_in_place(|| {
        workflows::routine::run(config, &settings.runner, &reporter)
    })?;

    info!(
        "Workflow finished after {} iteration(s).",
        result.iterations
    );
    println!("{}.", result.summary.message);
    if !result.summary.feasible {
        warn!("No evaluated design satisfied every constraint.");
        println!("Warning: no evaluated design satisfied every constraint.");
    }
    println!(
        "✓ Best {} = {:.6} after {} evaluation(s)",
        result.routine.objective,
        result.best_objective(),
        result.summary.evaluations
    );
    for (key, value) in result.design.keys().zip(&result.summary.best_point) {
        println!("  {:<24} {}", key, value);
    }
    println!("Driver cases written to: {}", result.recorder_path.display());

    Ok(())
}

use super::error::EngineError;
use super::progress::Progress;
use super::session::OptimisationSession;
use super::variables::{ResultVariableDict, VariableEntry, apply_design_variables, update_res_var_dict};
use super::workspace::{
    OPTIMISATION_MODULE, Slot, UPDATER_MODULE, create_iteration_dir, ensure_parent,
};
use crate::core::cpacs::{AEROMAP_UID_XPATH, CpacsDocument, WKDIR_XPATH, aeromap};
use crate::core::expression::Expression;
use indexmap::IndexMap;
use tracing::{debug, info, warn};

/// What one pass through the module chain produced.
#[derive(Debug, Clone, PartialEq)]
pub struct IterationOutcome {
    pub iteration: usize,
    /// Negated objective value, ready for a minimiser.
    pub objective: f64,
    /// Latest value of every result variable, in declaration order.
    pub constraints: IndexMap<String, f64>,
}

impl OptimisationSession<'_> {
    /// Runs the module chain once for the design point at the tail of every
    /// design-variable history and returns the resulting objective.
    pub fn one_iteration(&mut self) -> Result<IterationOutcome, EngineError> {
        self.counter += 1;
        let iteration = self.counter;
        self.reporter
            .report(Progress::EvaluationStart { iteration });
        info!(iteration, "Starting iteration.");

        self.prepare_updated_cpacs(iteration)?;

        if self.snapshot_every > 0 && iteration % self.snapshot_every == 0 {
            let snapshot = self.workspace.copy_module_to_module(
                UPDATER_MODULE,
                &Slot::Out,
                OPTIMISATION_MODULE,
                &Slot::named(format!("iter_{}", iteration)),
            )?;
            debug!("Archived iteration input to {:?}", snapshot);
        }

        self.run_module_chain()?;

        let last = self.routine.last_module().to_string();
        let results_path = self.workspace.tool_output(&last);
        info!("Results will be extracted from: {:?}", results_path);
        let results_doc = CpacsDocument::open(&results_path)?;
        update_res_var_dict(&mut self.results, &results_doc)?;

        let objective = compute_obj(&self.routine.objective, &self.results)?;
        let constraints = self
            .results
            .iter()
            .filter_map(|(key, entry)| entry.latest().map(|v| (key.clone(), v)))
            .collect();

        self.reporter.report(Progress::EvaluationFinish {
            iteration,
            objective,
        });
        Ok(IterationOutcome {
            iteration,
            objective,
            constraints,
        })
    }

    fn prepare_updated_cpacs(&mut self, iteration: usize) -> Result<(), EngineError> {
        let cpacs_in = self.workspace.tool_input(UPDATER_MODULE);
        let cpacs_out = self.workspace.tool_output(UPDATER_MODULE);
        let mut doc = CpacsDocument::open(&cpacs_in)?;

        let wkdir = create_iteration_dir(&self.working_dir, &self.routine.date, iteration)?;
        doc.set_text(WKDIR_XPATH, &wkdir.to_string_lossy())?;

        if let Some(uid) = doc.get_text(AEROMAP_UID_XPATH)?.filter(|u| !u.is_empty()) {
            match aeromap::reset_coefficients(&mut doc, &uid)? {
                Some(removed) => debug!(
                    aeromap = %uid,
                    "Cleared {} coefficient vector(s) from the previous iteration.",
                    removed.len()
                ),
                None => warn!("Aeromap '{}' referenced by the SU2 settings does not exist.", uid),
            }
        }

        apply_design_variables(&mut doc, &self.design)?;
        ensure_parent(&cpacs_out)?;
        doc.save(&cpacs_out)?;
        Ok(())
    }

    fn run_module_chain(&mut self) -> Result<(), EngineError> {
        let modules = self.routine.modules.clone();
        self.workspace
            .copy_module_to_module(UPDATER_MODULE, &Slot::Out, &modules[0], &Slot::In)?;

        for (i, module) in modules.iter().enumerate() {
            if i > 0 {
                self.workspace.copy_module_to_module(
                    &modules[i - 1],
                    &Slot::Out,
                    module,
                    &Slot::In,
                )?;
            }
            self.reporter.report(Progress::ModuleStart {
                name: module.clone(),
            });
            self.runner.run(module, &self.workspace)?;
        }

        self.workspace.copy_module_to_module(
            &modules[modules.len() - 1],
            &Slot::Out,
            UPDATER_MODULE,
            &Slot::In,
        )?;
        Ok(())
    }
}

/// Evaluates the objective formula over the latest result values and negates
/// it: the drivers minimise while objectives are written to be maximised.
pub fn compute_obj(
    objective: &Expression,
    results: &ResultVariableDict,
) -> Result<f64, EngineError> {
    let value = objective.evaluate(|name| results.get(name).and_then(VariableEntry::latest))?;
    if !value.is_finite() {
        return Err(EngineError::NonFiniteObjective {
            expression: objective.source().to_string(),
            value,
        });
    }
    info!("Objective function {} : {}", objective, value);
    Ok(-value)
}

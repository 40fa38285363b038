use super::drivers::Evaluation;
use super::error::EngineError;
use super::session::OptimisationSession;
use indexmap::IndexMap;
use tracing::trace;

/// Named scalar values flowing between components.
pub type Bindings = IndexMap<String, f64>;

/// One node of the evaluation graph seen by a driver.
pub trait Evaluable {
    fn name(&self) -> &'static str;
    fn inputs(&self, session: &OptimisationSession) -> Vec<String>;
    fn outputs(&self, session: &OptimisationSession) -> Vec<String>;
    fn evaluate(
        &self,
        session: &mut OptimisationSession,
        inputs: &Bindings,
    ) -> Result<Bindings, EngineError>;
}

/// Takes the design point, runs one iteration and emits the objective.
///
/// This is the only component that advances the module chain; it also appends
/// the design point to every design-variable history.
#[derive(Debug, Default, Clone, Copy)]
pub struct ObjectiveComponent;

impl Evaluable for ObjectiveComponent {
    fn name(&self) -> &'static str {
        "objective"
    }

    fn inputs(&self, session: &OptimisationSession) -> Vec<String> {
        session.design_keys()
    }

    fn outputs(&self, session: &OptimisationSession) -> Vec<String> {
        vec![session.routine.objective.source().to_string()]
    }

    fn evaluate(
        &self,
        session: &mut OptimisationSession,
        inputs: &Bindings,
    ) -> Result<Bindings, EngineError> {
        for (key, entry) in session.design.iter_mut() {
            let value = inputs
                .get(key)
                .copied()
                .ok_or_else(|| EngineError::UndefinedVariable(key.clone()))?;
            entry.push(value);
        }

        let outcome = session.one_iteration()?;
        let mut outputs = Bindings::new();
        outputs.insert(
            session.routine.objective.source().to_string(),
            outcome.objective,
        );
        Ok(outputs)
    }
}

/// Exposes the latest value of every result variable as a constraint.
///
/// It has no inputs of its own and only mirrors what the last iteration
/// produced, so it must run after [`ObjectiveComponent`] for the same point.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConstraintComponent;

impl Evaluable for ConstraintComponent {
    fn name(&self) -> &'static str {
        "constraints"
    }

    fn inputs(&self, _session: &OptimisationSession) -> Vec<String> {
        Vec::new()
    }

    fn outputs(&self, session: &OptimisationSession) -> Vec<String> {
        session.result_keys()
    }

    fn evaluate(
        &self,
        session: &mut OptimisationSession,
        _inputs: &Bindings,
    ) -> Result<Bindings, EngineError> {
        let design_len = session
            .design
            .values()
            .map(|entry| entry.history.len())
            .max()
            .unwrap_or(0);
        if session
            .results
            .values()
            .any(|entry| entry.history.len() < design_len)
        {
            return Err(EngineError::ConstraintOrdering);
        }

        Ok(session
            .results
            .iter()
            .filter_map(|(key, entry)| entry.latest().map(|value| (key.clone(), value)))
            .collect())
    }
}

/// Objective first, constraints second.
pub struct ComponentGraph {
    objective: ObjectiveComponent,
    constraints: ConstraintComponent,
}

impl ComponentGraph {
    pub fn new() -> Self {
        Self {
            objective: ObjectiveComponent,
            constraints: ConstraintComponent,
        }
    }

    pub fn evaluate(
        &self,
        session: &mut OptimisationSession,
        point: &[f64],
    ) -> Result<Evaluation, EngineError> {
        let inputs: Bindings = self
            .objective
            .inputs(session)
            .into_iter()
            .zip(point.iter().copied())
            .collect();
        trace!(component = self.objective.name(), ?inputs, "Evaluating.");
        let objective_out = self.objective.evaluate(session, &inputs)?;
        let objective_key = session.routine.objective.source().to_string();
        let objective = required_output(&self.objective, &objective_out, &objective_key)?;

        trace!(component = self.constraints.name(), "Evaluating.");
        let constraint_out = self.constraints.evaluate(session, &Bindings::new())?;
        let constraints = self
            .constraints
            .outputs(session)
            .iter()
            .map(|key| required_output(&self.constraints, &constraint_out, key))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Evaluation {
            objective,
            constraints,
        })
    }
}

fn required_output(
    component: &dyn Evaluable,
    outputs: &Bindings,
    key: &str,
) -> Result<f64, EngineError> {
    outputs
        .get(key)
        .copied()
        .ok_or_else(|| EngineError::MissingOutput {
            component: component.name(),
            key: key.to_string(),
        })
}

impl Default for ComponentGraph {
    fn default() -> Self {
        Self::new()
    }
}

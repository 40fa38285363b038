#[derive(Debug, Clone, PartialEq)]
pub enum Progress {
    PhaseStart { name: &'static str },
    PhaseFinish,

    /// Total number of evaluations the driver expects to request, if known.
    DriverStart { expected_evaluations: Option<u64> },
    EvaluationStart { iteration: usize },
    EvaluationFinish { iteration: usize, objective: f64 },
    ModuleStart { name: String },
    DriverFinish,

    Message(String),
}

pub type ProgressCallback<'a> = Box<dyn Fn(Progress) + Send + Sync + 'a>;

#[derive(Default)]
pub struct ProgressReporter<'a> {
    callback: Option<ProgressCallback<'a>>,
}

impl<'a> ProgressReporter<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_callback(callback: ProgressCallback<'a>) -> Self {
        Self {
            callback: Some(callback),
        }
    }

    #[inline]
    pub fn report(&self, event: Progress) {
        if let Some(cb) = &self.callback {
            cb(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn reporter_without_callback_ignores_events() {
        let reporter = ProgressReporter::new();
        reporter.report(Progress::PhaseFinish);
    }

    #[test]
    fn reporter_forwards_events_in_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let reporter = ProgressReporter::with_callback(Box::new(move |event| {
            sink.lock().unwrap().push(event);
        }));

        reporter.report(Progress::EvaluationStart { iteration: 1 });
        reporter.report(Progress::EvaluationFinish {
            iteration: 1,
            objective: -5.0,
        });

        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![
                Progress::EvaluationStart { iteration: 1 },
                Progress::EvaluationFinish {
                    iteration: 1,
                    objective: -5.0
                }
            ]
        );
    }
}

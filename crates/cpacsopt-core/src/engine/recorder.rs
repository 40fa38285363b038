use super::drivers::{Bounds, Evaluation, Problem};
use super::error::EngineError;
use super::workspace::ensure_parent;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Appends one CSV row per driver evaluation.
///
/// Columns: `iteration`, one per design variable, `objective` (the value the
/// driver minimised), one per constraint.
pub struct DriverRecorder {
    path: PathBuf,
    writer: csv::Writer<File>,
    columns: usize,
    rows: usize,
}

impl DriverRecorder {
    pub fn create(
        path: &Path,
        design_keys: &[String],
        constraint_keys: &[String],
    ) -> Result<Self, EngineError> {
        ensure_parent(path)?;
        let mut writer = csv::Writer::from_path(path).map_err(|source| EngineError::Recorder {
            path: path.to_path_buf(),
            source,
        })?;

        let header: Vec<&str> = std::iter::once("iteration")
            .chain(design_keys.iter().map(String::as_str))
            .chain(std::iter::once("objective"))
            .chain(constraint_keys.iter().map(String::as_str))
            .collect();
        writer
            .write_record(&header)
            .map_err(|source| EngineError::Recorder {
                path: path.to_path_buf(),
                source,
            })?;

        Ok(Self {
            path: path.to_path_buf(),
            writer,
            columns: header.len(),
            rows: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn record(&mut self, point: &[f64], evaluation: &Evaluation) -> Result<(), EngineError> {
        self.rows += 1;
        let row: Vec<String> = std::iter::once(self.rows.to_string())
            .chain(point.iter().map(f64::to_string))
            .chain(std::iter::once(evaluation.objective.to_string()))
            .chain(evaluation.constraints.iter().map(f64::to_string))
            .collect();
        if row.len() != self.columns {
            return Err(EngineError::Driver {
                driver: "recorder",
                reason: format!(
                    "row {} has {} column(s), header has {}",
                    self.rows,
                    row.len(),
                    self.columns
                ),
            });
        }
        self.writer
            .write_record(&row)
            .map_err(|source| EngineError::Recorder {
                path: self.path.clone(),
                source,
            })?;
        self.writer
            .flush()
            .map_err(|e| EngineError::io(&self.path, e))?;
        debug!(row = self.rows, "Recorded driver case.");
        Ok(())
    }
}

/// A problem whose every successful evaluation is written to a recorder.
pub struct RecordedProblem<'a> {
    problem: &'a mut dyn Problem,
    recorder: &'a mut DriverRecorder,
}

impl<'a> RecordedProblem<'a> {
    pub fn new(problem: &'a mut dyn Problem, recorder: &'a mut DriverRecorder) -> Self {
        Self { problem, recorder }
    }
}

impl Problem for RecordedProblem<'_> {
    fn dimension(&self) -> usize {
        self.problem.dimension()
    }

    fn initial_point(&self) -> Vec<f64> {
        self.problem.initial_point()
    }

    fn bounds(&self) -> Bounds {
        self.problem.bounds()
    }

    fn constraint_bounds(&self) -> Bounds {
        self.problem.constraint_bounds()
    }

    fn evaluate(&mut self, point: &[f64]) -> Result<Evaluation, EngineError> {
        let evaluation = self.problem.evaluate(point)?;
        self.recorder.record(point, &evaluation)?;
        Ok(evaluation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::drivers::testing::Quadratic;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn records_header_and_one_row_per_evaluation() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("Optimisation").join("Driver_recorder.csv");
        let mut recorder =
            DriverRecorder::create(&path, &["x".to_string()], &["x_out".to_string()]).unwrap();
        let mut problem = Quadratic::new(&[1.0], &[0.0]);
        problem.constraint_bounds = vec![(None, None)];

        {
            let mut recorded = RecordedProblem::new(&mut problem, &mut recorder);
            recorded.evaluate(&[0.0]).unwrap();
            recorded.evaluate(&[2.0]).unwrap();
        }

        assert_eq!(recorder.rows(), 2);
        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines, ["iteration,x,objective,x_out", "1,0,1,0", "2,2,1,2"]);
    }

    #[test]
    fn mismatched_rows_are_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rec.csv");
        let mut recorder = DriverRecorder::create(&path, &["a".to_string()], &[]).unwrap();
        let evaluation = Evaluation {
            objective: 1.0,
            constraints: vec![3.0],
        };
        assert!(recorder.record(&[0.5], &evaluation).is_err());
    }
}

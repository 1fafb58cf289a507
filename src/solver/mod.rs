//! # Answer-Set Solver Driver
//!
//! Contract between the generator and the external ASP solver. The
//! production implementation shells out to `clingo` once per trace slot
//! with the trace length pinned as a constant and a fresh seed, reading the
//! machine-readable JSON output (`--outf=2`).
//!
//! The [`AspSolver`] trait is the seam the generator is written against;
//! tests substitute a scripted solver and never spawn a process.

use serde::Deserialize;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use thiserror::Error;
use tracing::debug;

/// Result of one solver invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SolveOutcome {
    /// Shown symbols of the answer set, e.g. `trace(a,1)`.
    Satisfiable(Vec<String>),
    Unsatisfiable,
}

/// Solver invocation failures. Unsatisfiability is not an error; it is a
/// regular [`SolveOutcome`].
#[derive(Debug, Error)]
pub enum SolverError {
    #[error("failed to launch solver '{command}': {source}")]
    Launch {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to hand the program to the solver: {0}")]
    Stdin(#[from] io::Error),

    #[error("solver produced unreadable output: {0}")]
    Output(String),

    #[error("solver terminated abnormally: {0}")]
    Aborted(String),
}

/// One blocking solver call: enumerate a single answer set of `program`
/// with `num_events` trace positions, using `seed` for the randomised
/// branching heuristics.
pub trait AspSolver {
    fn solve(&self, program: &str, num_events: u32, seed: u32)
        -> Result<SolveOutcome, SolverError>;
}

/// Subprocess driver for clingo.
///
/// Flags mirror the generation contract: `--project`, model limit 1,
/// `--sign-def=rnd`, `--restart-on-model` and a high `--rand-freq` so
/// repeated invocations with fresh seeds explore different models.
#[derive(Debug, Clone)]
pub struct ClingoSolver {
    path: PathBuf,
    rand_freq: f64,
}

impl Default for ClingoSolver {
    fn default() -> Self {
        ClingoSolver {
            path: PathBuf::from("clingo"),
            rand_freq: 0.9,
        }
    }
}

impl ClingoSolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific clingo executable.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        ClingoSolver {
            path: path.into(),
            rand_freq: 0.9,
        }
    }
}

// clingo's --outf=2 JSON shape
#[derive(Debug, Deserialize)]
struct ClingoOutput {
    #[serde(rename = "Result")]
    result: String,
    #[serde(rename = "Call", default)]
    call: Vec<ClingoCall>,
}

#[derive(Debug, Deserialize)]
struct ClingoCall {
    #[serde(rename = "Witnesses", default)]
    witnesses: Vec<ClingoWitness>,
}

#[derive(Debug, Deserialize)]
struct ClingoWitness {
    #[serde(rename = "Value", default)]
    value: Vec<String>,
}

impl AspSolver for ClingoSolver {
    fn solve(
        &self,
        program: &str,
        num_events: u32,
        seed: u32,
    ) -> Result<SolveOutcome, SolverError> {
        let mut child = Command::new(&self.path)
            .arg("-c")
            .arg(format!("t={num_events}"))
            .arg("--project")
            .arg("1")
            .arg(format!("--seed={seed}"))
            .arg("--sign-def=rnd")
            .arg("--restart-on-model")
            .arg(format!("--rand-freq={}", self.rand_freq))
            .arg("--outf=2")
            .arg("-")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| SolverError::Launch {
                command: self.path.display().to_string(),
                source,
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(program.as_bytes())?;
        }
        let output = child.wait_with_output()?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        debug!(
            status = ?output.status.code(),
            bytes = stdout.len(),
            "clingo finished"
        );

        let parsed: ClingoOutput = serde_json::from_str(&stdout).map_err(|_| {
            // clingo exits non-zero for SAT/UNSAT as well, so the JSON body
            // is the source of truth; fall back to stderr when it is absent
            SolverError::Aborted(String::from_utf8_lossy(&output.stderr).trim().to_string())
        })?;

        match parsed.result.as_str() {
            "UNSATISFIABLE" => Ok(SolveOutcome::Unsatisfiable),
            "SATISFIABLE" | "OPTIMUM FOUND" => {
                let witness = parsed
                    .call
                    .iter()
                    .flat_map(|c| c.witnesses.iter())
                    .last()
                    .ok_or_else(|| {
                        SolverError::Output("satisfiable result without a witness".to_string())
                    })?;
                Ok(SolveOutcome::Satisfiable(witness.value.clone()))
            }
            other => Err(SolverError::Output(format!(
                "unexpected solver result '{other}'"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_output_parsing() {
        let raw = r#"{
            "Solver": "clingo version 5.6.2",
            "Call": [{"Witnesses": [{"Value": ["trace(a,1)", "trace(b,2)"]}]}],
            "Result": "SATISFIABLE",
            "Models": {"Number": 1, "More": "yes"}
        }"#;
        let parsed: ClingoOutput = serde_json::from_str(raw).expect("parse");
        assert_eq!(parsed.result, "SATISFIABLE");
        assert_eq!(
            parsed.call[0].witnesses[0].value,
            vec!["trace(a,1)".to_string(), "trace(b,2)".to_string()]
        );
    }

    #[test]
    fn test_unsat_output_parsing() {
        let raw = r#"{"Call": [{}], "Result": "UNSATISFIABLE"}"#;
        let parsed: ClingoOutput = serde_json::from_str(raw).expect("parse");
        assert_eq!(parsed.result, "UNSATISFIABLE");
        assert!(parsed.call[0].witnesses.is_empty());
    }

    #[test]
    fn test_missing_solver_is_a_launch_error() {
        let solver = ClingoSolver::with_path("/nonexistent/clingo-binary");
        let err = solver.solve("activity(a).", 2, 42).expect_err("must fail");
        assert!(matches!(err, SolverError::Launch { .. }));
    }
}

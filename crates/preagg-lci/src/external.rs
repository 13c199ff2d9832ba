//! Evaluator backed by an external program speaking JSON lines.
//!
//! The program is started once per entity with the entity code as its last
//! argument. `PREAGG_RESOURCES` holds the package paths as a platform path
//! list, `PREAGG_ITERATIONS` the number of draws and `PREAGG_RESULT_TYPE` the
//! result tree; `PREAGG_PROJECT_DIR` and `PREAGG_DATABASE` name the system.
//! Each stdout line answers one draw:
//!
//! ```text
//! {"inventory": [[0.1, 0.0], [2.0, 1.5]]}
//! {"error": "singular matrix"}
//! ```

use std::env;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::process::{Child, ChildStdout, Command, Stdio};

use preagg_core::context::ProjectContext;
use preagg_core::errors::{ErrorInfo, PreaggError};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::evaluator::{
    evaluation_error, DrawSession, EvaluationResources, Evaluator, RawInventory, SESSION_CLOSED,
};

/// Environment variable carrying the package paths.
pub const RESOURCES_ENV: &str = "PREAGG_RESOURCES";
/// Environment variable carrying the iteration count.
pub const ITERATIONS_ENV: &str = "PREAGG_ITERATIONS";
/// Environment variable carrying the result type.
pub const RESULT_TYPE_ENV: &str = "PREAGG_RESULT_TYPE";
/// Environment variable carrying the project directory.
pub const PROJECT_ENV: &str = "PREAGG_PROJECT_DIR";
/// Environment variable carrying the database name.
pub const DATABASE_ENV: &str = "PREAGG_DATABASE";

/// Command line of the external evaluator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandEvaluator {
    /// Program to run.
    pub program: PathBuf,
    /// Arguments placed before the entity code.
    #[serde(default)]
    pub args: Vec<String>,
}

impl CommandEvaluator {
    /// Evaluator running `program` with `args`.
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DrawLine {
    Inventory { inventory: Vec<Vec<f64>> },
    Error { error: String },
}

struct CommandSession {
    entity: String,
    child: Child,
    stdout: BufReader<ChildStdout>,
    line: String,
    draws: usize,
}

impl Evaluator for CommandEvaluator {
    fn open(
        &self,
        ctx: &ProjectContext,
        entity: &str,
        resources: &EvaluationResources,
    ) -> Result<Box<dyn DrawSession + '_>, PreaggError> {
        let paths = env::join_paths(&resources.package_paths).map_err(|err| {
            PreaggError::Config(
                ErrorInfo::new("resource-path-list", "package paths cannot form a path list")
                    .with_hint(err.to_string()),
            )
        })?;
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(entity)
            .env(PROJECT_ENV, ctx.project_dir())
            .env(DATABASE_ENV, ctx.database())
            .env(RESOURCES_ENV, paths)
            .env(ITERATIONS_ENV, resources.iterations.to_string())
            .env(RESULT_TYPE_ENV, resources.result_type.dir_name())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|err| {
                PreaggError::Evaluation(
                    ErrorInfo::new("evaluator-spawn", "failed to start evaluator")
                        .with_context("entity", entity)
                        .with_context("program", self.program.display().to_string())
                        .with_hint(err.to_string()),
                )
            })?;
        let stdout = child.stdout.take().ok_or_else(|| {
            evaluation_error("evaluator-stdout", entity, "evaluator stdout unavailable")
        })?;
        debug!(entity, program = %self.program.display(), "started evaluator");
        Ok(Box::new(CommandSession {
            entity: entity.to_string(),
            child,
            stdout: BufReader::new(stdout),
            line: String::new(),
            draws: 0,
        }))
    }
}

impl DrawSession for CommandSession {
    fn next_draw(&mut self) -> Result<RawInventory, PreaggError> {
        self.line.clear();
        let read = self.stdout.read_line(&mut self.line).map_err(|err| {
            evaluation_error("evaluator-read", &self.entity, err.to_string())
        })?;
        if read == 0 {
            if self.draws == 0 {
                return Err(evaluation_error(
                    SESSION_CLOSED,
                    &self.entity,
                    "evaluator exited without producing any draw",
                ));
            }
            return Err(evaluation_error(
                "evaluator-eof",
                &self.entity,
                "evaluator exited before producing the draw",
            ));
        }
        self.draws += 1;
        let parsed: DrawLine = serde_json::from_str(self.line.trim()).map_err(|err| {
            evaluation_error("evaluator-protocol", &self.entity, err.to_string())
        })?;
        match parsed {
            DrawLine::Inventory { inventory } => Ok(RawInventory::from_rows(inventory)),
            DrawLine::Error { error } => Err(evaluation_error("evaluator-draw", &self.entity, error)),
        }
    }

    fn finish(&mut self) -> Result<(), PreaggError> {
        let status = self.child.wait().map_err(|err| {
            evaluation_error("evaluator-wait", &self.entity, err.to_string())
        })?;
        if status.success() {
            Ok(())
        } else {
            Err(evaluation_error(
                "evaluator-status",
                &self.entity,
                format!("evaluator exited with {status}"),
            ))
        }
    }
}

impl Drop for CommandSession {
    fn drop(&mut self) {
        if let Ok(None) = self.child.try_wait() {
            if let Err(err) = self.child.kill() {
                warn!(entity = %self.entity, error = %err, "failed to stop evaluator");
            }
        }
        let _ = self.child.wait();
    }
}

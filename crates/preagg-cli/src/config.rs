//! YAML configuration with command line overrides.

use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use clap::{Args, ValueEnum};
use preagg_core::array::Precision;
use preagg_core::context::ProjectContext;
use preagg_lci::CommandEvaluator;
use serde::{Deserialize, Serialize};

fn default_parallel_jobs() -> usize {
    1
}

fn default_base_name() -> String {
    "base".to_string()
}

/// External inventory calculator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluatorConfig {
    /// Program run once per entity.
    pub program: PathBuf,
    /// Arguments placed before the entity code.
    #[serde(default)]
    pub args: Vec<String>,
}

/// Contents of `preagg.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreaggConfig {
    #[serde(default)]
    pub project_dir: Option<PathBuf>,
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub result_dir: Option<PathBuf>,
    #[serde(default = "default_parallel_jobs")]
    pub parallel_jobs: usize,
    #[serde(default)]
    pub evaluator: Option<EvaluatorConfig>,
    #[serde(default)]
    pub precision: Precision,
    #[serde(default = "default_base_name")]
    pub base_name: String,
}

impl Default for PreaggConfig {
    fn default() -> Self {
        Self {
            project_dir: None,
            database: None,
            result_dir: None,
            parallel_jobs: default_parallel_jobs(),
            evaluator: None,
            precision: Precision::default(),
            base_name: default_base_name(),
        }
    }
}

/// Project location flags shared by every subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct ProjectArgs {
    /// YAML configuration file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// Project directory holding `project.json` and the registry.
    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,
    /// Name of the database whose activities are processed.
    #[arg(long, global = true)]
    pub database: Option<String>,
    /// Root of the result tree.
    #[arg(long, global = true)]
    pub result_dir: Option<PathBuf>,
}

/// Storage precision flag.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrecisionArg {
    F32,
    F64,
}

impl From<PrecisionArg> for Precision {
    fn from(value: PrecisionArg) -> Self {
        match value {
            PrecisionArg::F32 => Precision::F32,
            PrecisionArg::F64 => Precision::F64,
        }
    }
}

impl PreaggConfig {
    /// Parses a YAML configuration.
    pub fn from_yaml(contents: &str) -> Result<Self, Box<dyn Error>> {
        Ok(serde_yaml::from_str(contents)?)
    }

    /// Loads the file named by `--config`, if any, and applies the flags.
    pub fn resolve(args: &ProjectArgs) -> Result<Self, Box<dyn Error>> {
        let mut config = match &args.config {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        if let Some(project_dir) = &args.project_dir {
            config.project_dir = Some(project_dir.clone());
        }
        if let Some(database) = &args.database {
            config.database = Some(database.clone());
        }
        if let Some(result_dir) = &args.result_dir {
            config.result_dir = Some(result_dir.clone());
        }
        Ok(config)
    }

    fn load(path: &Path) -> Result<Self, Box<dyn Error>> {
        let contents = fs::read_to_string(path)
            .map_err(|err| format!("failed to read config {}: {err}", path.display()))?;
        Self::from_yaml(&contents)
    }

    /// Project context built from the resolved locations.
    pub fn context(&self) -> Result<ProjectContext, Box<dyn Error>> {
        let project_dir = self
            .project_dir
            .clone()
            .ok_or("project directory not set: pass --project-dir or set project_dir")?;
        let database = self
            .database
            .clone()
            .ok_or("database not set: pass --database or set database")?;
        let result_dir = self
            .result_dir
            .clone()
            .ok_or("result directory not set: pass --result-dir or set result_dir")?;
        Ok(ProjectContext::new(project_dir, database, result_dir))
    }

    /// The configured evaluator.
    pub fn evaluator(&self) -> Result<CommandEvaluator, Box<dyn Error>> {
        let evaluator = self
            .evaluator
            .as_ref()
            .ok_or("no evaluator configured: set evaluator.program")?;
        Ok(CommandEvaluator::new(
            evaluator.program.clone(),
            evaluator.args.clone(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_fields() {
        let config = PreaggConfig::from_yaml("database: ecoinvent\n").unwrap();
        assert_eq!(config.database.as_deref(), Some("ecoinvent"));
        assert_eq!(config.parallel_jobs, 1);
        assert_eq!(config.base_name, "base");
        assert_eq!(config.precision, Precision::F32);
        assert!(config.context().is_err());
    }

    #[test]
    fn flags_override_file_values() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("preagg.yaml");
        fs::write(
            &path,
            "project_dir: /data/project\ndatabase: db\nresult_dir: /data/results\nparallel_jobs: 8\nprecision: f64\nevaluator:\n  program: solve\n  args: [--fast]\n",
        )
        .unwrap();
        let args = ProjectArgs {
            config: Some(path),
            result_dir: Some(PathBuf::from("/scratch/results")),
            ..ProjectArgs::default()
        };
        let config = PreaggConfig::resolve(&args).unwrap();
        assert_eq!(config.parallel_jobs, 8);
        assert_eq!(config.precision, Precision::F64);
        let ctx = config.context().unwrap();
        assert_eq!(ctx.project_dir(), Path::new("/data/project"));
        assert_eq!(ctx.result_dir(), Path::new("/scratch/results"));
        let evaluator = config.evaluator().unwrap();
        assert_eq!(evaluator.program, PathBuf::from("solve"));
        assert_eq!(evaluator.args, vec!["--fast"]);
    }

    #[test]
    fn missing_evaluator_is_reported() {
        let err = PreaggConfig::default().evaluator().unwrap_err();
        assert!(err.to_string().contains("evaluator.program"));
    }
}

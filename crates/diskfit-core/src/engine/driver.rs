//! Runs the engine stages of one model and handles their outcomes.

use super::process::{
    EngineFailure, EngineInvocation, EngineOutcome, EngineProcess, FailureKind, SubprocessEngine,
};
use super::staging::{PARAMETER_RECORD_FILE, StagingDir};
use super::tier::{Engine, RegimeParameters, Tier, select_tier};
use crate::common::DriverConfig;
use crate::domain::{DiskfitError, DiskfitResult, EngineStage, FailureContext};
use crate::formats::{ControlOptions, DUST_TEMPERATURE_FILE, format_fixed, parse_dust_temperature};
use crate::model::{
    DiskParameters, DustLibrary, FieldBuilder, FreeParameters, ParameterRecord, ParameterSchema,
    PhysicalModel, assemble_model, resolve_parameters,
};
use crate::observables::{ObservableRequests, ObservableSet, VisibilityInterpolator};
use chrono::Utc;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Append-only log of thermal-stage wall times in the working directory.
pub const TIMES_FILE: &str = "times.txt";
const TIMEOUT_ARCHIVE_PREFIX: &str = "params_timeout_";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThermalOutcome {
    Completed { elapsed: Duration },
    /// The engine hit the time limit; the model has no temperatures.
    NoResult,
}

/// Inputs of a full model evaluation.
pub struct DiskModelRun<'a> {
    pub schema: &'a ParameterSchema,
    pub free: &'a FreeParameters,
    pub requests: &'a ObservableRequests,
    pub dust: &'a dyn DustLibrary,
    pub fields: &'a dyn FieldBuilder,
    pub interpolator: &'a dyn VisibilityInterpolator,
    /// Stop after assembling the model.
    pub no_radiative_transfer: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DiskModelOutcome {
    /// Assembled without running the engine.
    ModelOnly(PhysicalModel),
    /// The thermal stage timed out.
    NoResult,
    Observed {
        model: PhysicalModel,
        observables: ObservableSet,
    },
}

pub struct SimulationDriver {
    config: DriverConfig,
    working_dir: PathBuf,
    engine: Box<dyn EngineProcess>,
}

impl SimulationDriver {
    /// `working_dir` receives `times.txt` and timeout archives.
    pub fn new(
        config: DriverConfig,
        working_dir: impl Into<PathBuf>,
        engine: Box<dyn EngineProcess>,
    ) -> Self {
        Self {
            config,
            working_dir: working_dir.into(),
            engine,
        }
    }

    pub fn with_subprocess_engine(config: DriverConfig, working_dir: impl Into<PathBuf>) -> Self {
        let engine = SubprocessEngine::from_config(&config);
        Self::new(config, working_dir, Box::new(engine))
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    pub fn select_tier(&self, params: &DiskParameters) -> Tier {
        select_tier(&RegimeParameters::from(params), &self.config)
    }

    /// Runs one invocation, retrying once when the first attempt fails in a
    /// way classified as transient.
    pub(crate) fn run_engine(
        &self,
        staging: &StagingDir,
        invocation: &EngineInvocation,
        time_limit: Option<Duration>,
    ) -> DiskfitResult<EngineOutcome> {
        let outcome = self.engine.run(staging.path(), invocation, time_limit)?;
        match outcome {
            EngineOutcome::Failed(failure) if failure.kind == FailureKind::Transient => {
                warn!(
                    stage = %invocation.stage,
                    failure = %failure.describe(),
                    "engine failed transiently; retrying once"
                );
                self.engine.run(staging.path(), invocation, time_limit)
            }
            other => Ok(other),
        }
    }

    pub(crate) fn failure_context(&self, staging: &StagingDir) -> FailureContext {
        FailureContext {
            staging_dir: staging.path().to_path_buf(),
            parameter_snapshot: staging
                .read_artifact(PARAMETER_RECORD_FILE)
                .unwrap_or_default(),
        }
    }

    /// Attaches the staging directory and parameter snapshot to an error
    /// that does not carry them yet.
    pub(crate) fn attach_context<T>(
        &self,
        staging: &StagingDir,
        result: DiskfitResult<T>,
    ) -> DiskfitResult<T> {
        result.map_err(|error| match error.context() {
            Some(_) => error,
            None => error.with_context(self.failure_context(staging)),
        })
    }

    pub(crate) fn engine_failure(
        &self,
        staging: &StagingDir,
        stage: EngineStage,
        failure: &EngineFailure,
    ) -> DiskfitError {
        let retried = if failure.kind == FailureKind::Transient {
            " after one retry"
        } else {
            ""
        };
        DiskfitError::computation(
            "RUN.ENGINE_FAILURE",
            format!("{} stage failed{}: {}", stage, retried, failure.describe()),
        )
        .with_context(self.failure_context(staging))
    }

    fn record_elapsed(&self, elapsed: Duration) -> DiskfitResult<()> {
        let path = self.working_dir.join(TIMES_FILE);
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .and_then(|mut file| writeln!(file, "{}", format_fixed(elapsed.as_secs_f64())))
            .map_err(|error| {
                DiskfitError::io_system(
                    "IO.TIMES_WRITE",
                    format!("failed to append to '{}': {}", path.display(), error),
                )
            })
    }

    /// Copies the staged parameter record to the working directory under a
    /// UTC-timestamped name, adding `_<n>` when that name is already taken.
    fn archive_parameters(&self, staging: &StagingDir) -> DiskfitResult<PathBuf> {
        let snapshot = staging.read_artifact(PARAMETER_RECORD_FILE)?;
        let stem = format!(
            "{}{}",
            TIMEOUT_ARCHIVE_PREFIX,
            Utc::now().format("%Y-%m-%d-%H:%M:%S")
        );
        let archive_error = |target: &Path, error: std::io::Error| {
            DiskfitError::io_system(
                "IO.TIMEOUT_ARCHIVE",
                format!(
                    "failed to archive parameters to '{}': {}",
                    target.display(),
                    error
                ),
            )
        };

        let mut attempt = 0u32;
        loop {
            let name = match attempt {
                0 => stem.clone(),
                n => format!("{}_{}", stem, n),
            };
            let target = self.working_dir.join(name);
            match OpenOptions::new().write(true).create_new(true).open(&target) {
                Ok(mut file) => {
                    file.write_all(snapshot.as_bytes())
                        .map_err(|error| archive_error(target.as_path(), error))?;
                    return Ok(target);
                }
                Err(error) if error.kind() == ErrorKind::AlreadyExists => attempt += 1,
                Err(error) => return Err(archive_error(target.as_path(), error)),
            }
        }
    }

    /// Stages the model, runs the thermal Monte-Carlo and reads the dust
    /// temperatures back into `model`. Fatal errors carry the staging
    /// directory and the parameter snapshot.
    pub fn run_thermal_stage(
        &self,
        staging: &StagingDir,
        model: &mut PhysicalModel,
        tier: &Tier,
        record: &ParameterRecord,
    ) -> DiskfitResult<ThermalOutcome> {
        let outcome = self.thermal_stage(staging, model, tier, record);
        self.attach_context(staging, outcome)
    }

    fn thermal_stage(
        &self,
        staging: &StagingDir,
        model: &mut PhysicalModel,
        tier: &Tier,
        record: &ParameterRecord,
    ) -> DiskfitResult<ThermalOutcome> {
        staging.write_artifact(PARAMETER_RECORD_FILE, &record.render())?;
        if tier.engine == Engine::Hyperion {
            return Err(DiskfitError::input_validation(
                "RUN.ENGINE_UNSUPPORTED",
                "the hyperion engine is not supported; disable with_hyperion",
            ));
        }
        staging.stage_model(model, &ControlOptions::thermal(self.config.nphot_therm, true))?;

        info!(
            staging = %staging.path().display(),
            threads = tier.processes,
            "starting thermal stage"
        );
        let invocation = EngineInvocation::thermal(tier.processes);
        match self.run_engine(staging, &invocation, self.config.time_limit())? {
            EngineOutcome::Completed { elapsed } => {
                self.record_elapsed(elapsed)?;
                let source = staging.read_artifact(DUST_TEMPERATURE_FILE)?;
                let temperatures = parse_dust_temperature(&source, model.dims())?;
                model.apply_temperatures(temperatures)?;
                info!(seconds = elapsed.as_secs_f64(), "thermal stage completed");
                Ok(ThermalOutcome::Completed { elapsed })
            }
            EngineOutcome::TimedOut { elapsed } => {
                let archive = self.archive_parameters(staging);
                let logged = self.record_elapsed(elapsed);
                let archive = archive?;
                logged?;
                staging.discard_artifacts()?;
                warn!(
                    seconds = elapsed.as_secs_f64(),
                    archive = %archive.display(),
                    "thermal stage timed out; model has no result"
                );
                Ok(ThermalOutcome::NoResult)
            }
            EngineOutcome::Failed(failure) => {
                Err(self.engine_failure(staging, EngineStage::Thermal, &failure))
            }
        }
    }

    /// Resolves parameters, assembles the model and runs every stage inside
    /// a fresh staging directory that is removed on every exit path.
    pub fn run_disk_model(&self, run: &DiskModelRun<'_>) -> DiskfitResult<DiskModelOutcome> {
        let resolved = resolve_parameters(run.schema, run.free)?;
        let params = DiskParameters::from_resolved(&resolved)?;
        let record = ParameterRecord::new(&resolved, &params);
        let tier = self.select_tier(&params);
        info!(
            regime = ?tier.regime,
            engine = %tier.engine,
            walls = tier.angular_walls,
            "selected tier"
        );

        let mut model = assemble_model(&params, &tier, run.dust, run.fields)?;
        if run.no_radiative_transfer {
            return Ok(DiskModelOutcome::ModelOnly(model));
        }

        let staging = StagingDir::create(&self.config)?;
        match self.run_thermal_stage(&staging, &mut model, &tier, &record)? {
            ThermalOutcome::NoResult => {
                staging.close()?;
                return Ok(DiskModelOutcome::NoResult);
            }
            ThermalOutcome::Completed { .. } => {}
        }

        let observables = self.run_observables(
            &staging,
            &mut model,
            &tier,
            &params,
            run.requests,
            run.interpolator,
        )?;
        staging.close()?;
        Ok(DiskModelOutcome::Observed { model, observables })
    }
}

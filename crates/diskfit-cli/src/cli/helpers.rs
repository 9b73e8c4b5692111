use super::CliError;
use super::commands::ModelInputArgs;
use anyhow::Context;
use diskfit_core::common::{DriverConfig, load_driver_config, load_json_document};
use diskfit_core::domain::{DiskfitResult, StagedArtifact};
use diskfit_core::engine::StagingDir;
use diskfit_core::model::{
    DiskParameters, FreeParameters, ParameterSchema, PhysicalModel, ResolvedParameters,
    resolve_parameters,
};
use std::fs;
use std::path::Path;
use tracing_subscriber::EnvFilter;

pub(super) fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init();
}

pub(super) struct ModelInputs {
    pub(super) config: DriverConfig,
    pub(super) schema: ParameterSchema,
    pub(super) free: FreeParameters,
}

impl ModelInputs {
    pub(super) fn resolve(&self) -> DiskfitResult<(ResolvedParameters, DiskParameters)> {
        let resolved = resolve_parameters(&self.schema, &self.free)?;
        let params = DiskParameters::from_resolved(&resolved)?;
        Ok((resolved, params))
    }
}

pub(super) fn load_model_inputs(args: &ModelInputArgs) -> Result<ModelInputs, CliError> {
    let config = match &args.config {
        Some(path) => load_driver_config(path).map_err(|error| CliError::Compute(error.into()))?,
        None => DriverConfig::default(),
    };
    let schema: ParameterSchema =
        load_json_document(&args.schema).map_err(|error| CliError::Compute(error.into()))?;
    let free: FreeParameters = match &args.free {
        Some(path) => load_json_document(path).map_err(|error| CliError::Compute(error.into()))?,
        None => FreeParameters::new(),
    };
    Ok(ModelInputs {
        config,
        schema,
        free,
    })
}

/// Copies staged files out of the scratch directory before it is removed.
pub(super) fn export_artifacts(
    staging: &StagingDir,
    artifacts: &[StagedArtifact],
    destination: &Path,
) -> Result<usize, CliError> {
    fs::create_dir_all(destination)
        .with_context(|| format!("failed to create '{}'", destination.display()))?;
    for artifact in artifacts {
        let source = staging.path().join(&artifact.relative_path);
        let target = destination.join(&artifact.relative_path);
        fs::copy(&source, &target).with_context(|| {
            format!(
                "failed to copy '{}' to '{}'",
                source.display(),
                target.display()
            )
        })?;
    }
    Ok(artifacts.len())
}

/// One line per dust layer with its temperature range.
pub(super) fn temperature_summary(model: &PhysicalModel) -> Vec<String> {
    model
        .layers
        .iter()
        .map(|layer| match &layer.temperature {
            Some(temperature) => {
                let (low, high) = temperature
                    .iter()
                    .fold((f64::INFINITY, f64::NEG_INFINITY), |(low, high), value| {
                        (low.min(*value), high.max(*value))
                    });
                format!(
                    "{}: T_dust {:.2} .. {:.2} K over {} cells",
                    layer.opacity.name,
                    low,
                    high,
                    temperature.len()
                )
            }
            None => format!("{}: no temperatures", layer.opacity.name),
        })
        .collect()
}

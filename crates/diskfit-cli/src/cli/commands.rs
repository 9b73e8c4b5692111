use super::CliError;
use super::helpers::*;
use anyhow::Context;
use diskfit_core::engine::{
    DiskModelOutcome, DiskModelRun, PARAMETER_RECORD_FILE, RegimeParameters, SimulationDriver,
    StagingDir, select_tier,
};
use diskfit_core::formats::ControlOptions;
use diskfit_core::model::{JsonDustLibrary, ParameterRecord, PowerLawFields, assemble_model};
use diskfit_core::observables::{DirectFourierTransform, ObservableRequests};
use std::fs;
use std::path::PathBuf;
use tracing::info;

#[derive(clap::Args)]
pub(super) struct ModelInputArgs {
    /// Driver configuration (JSON); built-in defaults when omitted
    #[arg(long)]
    pub(super) config: Option<PathBuf>,

    /// Parameter schema (JSON object of name -> {fixed, value})
    #[arg(long)]
    pub(super) schema: PathBuf,

    /// Values of the free parameters (JSON object of name -> number)
    #[arg(long)]
    pub(super) free: Option<PathBuf>,
}

#[derive(clap::Args)]
pub(super) struct StageArgs {
    #[command(flatten)]
    inputs: ModelInputArgs,

    /// Directory holding one `<dust>.json` catalog per dust model
    #[arg(long)]
    dust_dir: PathBuf,

    /// Directory receiving the engine input files
    #[arg(long)]
    output: PathBuf,
}

#[derive(clap::Args)]
pub(super) struct TierArgs {
    #[command(flatten)]
    inputs: ModelInputArgs,
}

#[derive(clap::Args)]
pub(super) struct ThermalArgs {
    #[command(flatten)]
    inputs: ModelInputArgs,

    /// Directory holding one `<dust>.json` catalog per dust model
    #[arg(long)]
    dust_dir: PathBuf,

    /// Directory receiving `times.txt` and timeout archives
    #[arg(long, default_value = ".")]
    working_dir: PathBuf,
}

pub(super) fn run_stage_command(args: StageArgs) -> Result<i32, CliError> {
    let inputs = load_model_inputs(&args.inputs)?;
    let (resolved, params) = inputs.resolve()?;
    let tier = select_tier(&RegimeParameters::from(&params), &inputs.config);
    let library = JsonDustLibrary::new(&args.dust_dir);
    let model = assemble_model(&params, &tier, &library, &PowerLawFields)?;

    let staging = StagingDir::create(&inputs.config)?;
    let control = ControlOptions::thermal(inputs.config.nphot_therm, true);
    let artifacts = staging.stage_model(&model, &control)?;
    let copied = export_artifacts(&staging, &artifacts, &args.output)?;
    staging.close()?;

    let record_path = args.output.join(PARAMETER_RECORD_FILE);
    fs::write(&record_path, ParameterRecord::new(&resolved, &params).render())
        .with_context(|| format!("failed to write '{}'", record_path.display()))?;

    info!(files = copied, output = %args.output.display(), "staged model");
    println!(
        "Staged {} engine input files into {}",
        copied + 1,
        args.output.display()
    );
    Ok(0)
}

pub(super) fn run_tier_command(args: TierArgs) -> Result<i32, CliError> {
    let inputs = load_model_inputs(&args.inputs)?;
    let (_, params) = inputs.resolve()?;
    let tier = select_tier(&RegimeParameters::from(&params), &inputs.config);

    let summary = serde_json::json!({
        "regime": tier.regime.as_str(),
        "engine": tier.engine.as_str(),
        "angular_walls": tier.angular_walls,
        "processes": tier.processes,
    });
    let rendered =
        serde_json::to_string_pretty(&summary).context("failed to render tier summary")?;
    println!("{}", rendered);
    Ok(0)
}

pub(super) fn run_thermal_command(args: ThermalArgs) -> Result<i32, CliError> {
    let inputs = load_model_inputs(&args.inputs)?;
    fs::create_dir_all(&args.working_dir).with_context(|| {
        format!(
            "failed to create working directory '{}'",
            args.working_dir.display()
        )
    })?;

    let library = JsonDustLibrary::new(&args.dust_dir);
    let requests = ObservableRequests::default();
    let run = DiskModelRun {
        schema: &inputs.schema,
        free: &inputs.free,
        requests: &requests,
        dust: &library,
        fields: &PowerLawFields,
        interpolator: &DirectFourierTransform,
        no_radiative_transfer: false,
    };
    let driver = SimulationDriver::with_subprocess_engine(inputs.config, &args.working_dir);

    match driver.run_disk_model(&run)? {
        DiskModelOutcome::NoResult => {
            println!("Thermal stage hit the time limit; no result");
        }
        DiskModelOutcome::Observed { model, .. } | DiskModelOutcome::ModelOnly(model) => {
            for line in temperature_summary(&model) {
                println!("{}", line);
            }
        }
    }
    Ok(0)
}

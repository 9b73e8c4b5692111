//! Driving the external radiative-transfer engine.
//!
//! A run selects a [`Tier`], stages the model into a private scratch
//! directory, computes dust temperatures with the thermal stage and then
//! ray-traces the requested observables.

pub mod driver;
pub mod observe;
pub mod process;
pub mod staging;
pub mod tier;

pub use driver::{DiskModelOutcome, DiskModelRun, SimulationDriver, TIMES_FILE, ThermalOutcome};
pub use process::{
    EngineFailure, EngineInvocation, EngineOutcome, EngineProcess, FailureKind, ImageGeometry,
    SubprocessEngine,
};
pub use staging::{PARAMETER_RECORD_FILE, StagingDir};
pub use tier::{
    Engine, HYPERION_ANGULAR_WALLS, Regime, RegimeParameters, STANDARD_ANGULAR_WALLS, Tier,
    select_tier,
};

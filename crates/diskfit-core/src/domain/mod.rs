pub mod errors;

pub use errors::{
    ComputeResult, DiskfitError, DiskfitErrorCategory, DiskfitResult, FailureContext,
    FormatResult,
};

use std::fmt::{Display, Formatter};
use std::path::PathBuf;

/// One invocation mode of the external engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineStage {
    Thermal,
    Image,
    Spectrum,
}

impl EngineStage {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Thermal => "mctherm",
            Self::Image => "image",
            Self::Spectrum => "spectrum",
        }
    }

    /// Output file the engine leaves behind for this stage.
    pub const fn output_artifact(self) -> &'static str {
        match self {
            Self::Thermal => "dust_temperature.dat",
            Self::Image => "image.out",
            Self::Spectrum => "spectrum.out",
        }
    }
}

impl Display for EngineStage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedArtifact {
    pub relative_path: PathBuf,
}

impl StagedArtifact {
    pub fn new(relative_path: impl Into<PathBuf>) -> Self {
        Self {
            relative_path: relative_path.into(),
        }
    }
}

pub fn artifact_list(paths: &[&str]) -> Vec<StagedArtifact> {
    paths.iter().copied().map(StagedArtifact::new).collect()
}

use super::assembler::logspace;
use super::parameters::{DiskParameters, GapWindow};
use crate::domain::{DiskfitError, DiskfitResult};
use crate::formats::DustOpacityTable;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum DiskType {
    #[serde(rename = "disk")]
    Plain,
    #[serde(rename = "exptaper")]
    Tapered,
    #[serde(rename = "settled")]
    Settled,
    #[serde(rename = "settledexptaper")]
    SettledTapered,
}

impl DiskType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Plain => "disk",
            Self::Tapered => "exptaper",
            Self::Settled => "settled",
            Self::SettledTapered => "settledexptaper",
        }
    }

    /// Exponentially tapered outer edge.
    pub const fn is_tapered(self) -> bool {
        matches!(self, Self::Tapered | Self::SettledTapered)
    }

    pub const fn is_settled(self) -> bool {
        matches!(self, Self::Settled | Self::SettledTapered)
    }
}

impl FromStr for DiskType {
    type Err = DiskfitError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "disk" => Ok(Self::Plain),
            "exptaper" => Ok(Self::Tapered),
            "settled" => Ok(Self::Settled),
            "settledexptaper" => Ok(Self::SettledTapered),
            other => Err(DiskfitError::input_validation(
                "INPUT.DISK_TYPE",
                format!(
                    "unknown disk_type '{}'; expected disk, exptaper, settled or settledexptaper",
                    other
                ),
            )),
        }
    }
}

impl Display for DiskType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvelopeType {
    #[default]
    None,
    Ulrich,
}

impl FromStr for EnvelopeType {
    type Err = DiskfitError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "none" | "None" | "" => Ok(Self::None),
            "ulrich" => Ok(Self::Ulrich),
            other => Err(DiskfitError::input_validation(
                "INPUT.ENVELOPE_TYPE",
                format!("unknown envelope_type '{}'; expected none or ulrich", other),
            )),
        }
    }
}

/// Grain-size-resolved dust for settled disks.
#[derive(Debug, Clone, PartialEq)]
pub struct SettledDust {
    pub dust_file: String,
    /// Minimum and maximum grain size in microns.
    pub a_min: f64,
    pub a_max: f64,
    pub size_slope: f64,
    pub size_bins: usize,
    pub alpha_settle: f64,
    /// One table per size bin, smallest first.
    pub tables: Vec<DustOpacityTable>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ComponentDust {
    Table(DustOpacityTable),
    Settled(SettledDust),
}

impl SettledDust {
    /// Log-spaced grain-size bin centers in microns, smallest first.
    pub fn bin_sizes(&self) -> Vec<f64> {
        logspace(self.a_min, self.a_max, self.size_bins)
    }
}

impl ComponentDust {
    pub fn tables(&self) -> Vec<&DustOpacityTable> {
        match self {
            Self::Table(table) => vec![table],
            Self::Settled(settled) => settled.tables.iter().collect(),
        }
    }
}

/// One power-law disk population. Radii in AU, mass in solar masses.
#[derive(Debug, Clone, PartialEq)]
pub struct DiskComponent {
    pub disk_type: DiskType,
    pub mass: f64,
    pub inner_radius: f64,
    pub outer_radius: f64,
    pub density_exponent: f64,
    pub scale_height: f64,
    pub flaring_exponent: f64,
    /// Cavity first, then the three gaps.
    pub gaps: [GapWindow; 4],
    pub dust: ComponentDust,
}

/// Rotating, infalling envelope with a bipolar cavity.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvelopeComponent {
    pub mass: f64,
    pub inner_radius: f64,
    pub outer_radius: f64,
    /// Radius where infalling material lands on the disk.
    pub centrifugal_radius: f64,
    pub cavity_exponent: f64,
    pub cavity_factor: f64,
    pub dust: DustOpacityTable,
}

/// Opacity tables available to the disk builders.
#[derive(Debug, Clone, PartialEq)]
pub enum DustChoice {
    /// Large-grain disk dust plus the small-grain envelope dust.
    Mixed {
        disk: DustOpacityTable,
        envelope: DustOpacityTable,
    },
    Settled {
        bins: Vec<DustOpacityTable>,
        envelope: DustOpacityTable,
    },
}

impl DustChoice {
    pub fn envelope(&self) -> &DustOpacityTable {
        match self {
            Self::Mixed { envelope, .. } | Self::Settled { envelope, .. } => envelope,
        }
    }
}

/// Builds the disk populations for `disk_type`.
///
/// Plain and tapered disks put `f_M_large` of the mass into large grains and
/// the rest, if any, into a small-grain population sharing the envelope dust.
/// Settled disks always use one grain-size-resolved population.
pub fn select_disk_model(
    disk_type: DiskType,
    params: &DiskParameters,
    dust: &DustChoice,
) -> DiskfitResult<Vec<DiskComponent>> {
    let gaps = [params.cavity, params.gaps[0], params.gaps[1], params.gaps[2]];
    let component = |mass, density_exponent, scale_height, flaring_exponent, dust| DiskComponent {
        disk_type,
        mass,
        inner_radius: params.r_in,
        outer_radius: params.r_disk,
        density_exponent,
        scale_height,
        flaring_exponent,
        gaps,
        dust,
    };

    match (disk_type, dust) {
        (DiskType::Plain | DiskType::Tapered, DustChoice::Mixed { disk, envelope }) => {
            let mut components = vec![component(
                params.m_disk * params.f_m_large,
                params.alpha_large,
                params.h_0 * params.f_h_large,
                params.beta_large,
                ComponentDust::Table(disk.clone()),
            )];
            if params.f_m_large < 1.0 {
                components.push(component(
                    params.m_disk * (1.0 - params.f_m_large),
                    params.alpha,
                    params.h_0,
                    params.beta,
                    ComponentDust::Table(envelope.clone()),
                ));
            }
            Ok(components)
        }
        (DiskType::Settled | DiskType::SettledTapered, DustChoice::Settled { bins, .. }) => {
            if bins.len() != params.na {
                return Err(DiskfitError::computation(
                    "MODEL.DUST_BINS",
                    format!(
                        "settled disk expects {} grain-size bins, dust library produced {}",
                        params.na,
                        bins.len()
                    ),
                ));
            }
            Ok(vec![component(
                params.m_disk,
                params.alpha,
                params.h_0,
                params.beta,
                ComponentDust::Settled(SettledDust {
                    dust_file: params.dust_file.clone(),
                    a_min: params.a_min,
                    a_max: params.a_max,
                    size_slope: params.p,
                    size_bins: params.na,
                    alpha_settle: params.alpha_settle,
                    tables: bins.clone(),
                }),
            )])
        }
        (disk_type, _) => Err(DiskfitError::internal(
            "INTERNAL.DUST_CHOICE",
            format!("dust choice does not match disk type '{}'", disk_type),
        )),
    }
}

pub fn envelope_component(
    params: &DiskParameters,
    dust: &DustChoice,
) -> Option<EnvelopeComponent> {
    match params.envelope_type {
        EnvelopeType::None => None,
        EnvelopeType::Ulrich => Some(EnvelopeComponent {
            mass: params.m_env,
            inner_radius: params.r_in,
            outer_radius: params.r_env,
            centrifugal_radius: params.r_disk,
            cavity_exponent: params.ksi,
            cavity_factor: params.f_cav,
            dust: dust.envelope().clone(),
        }),
    }
}

//! Engine input/output file formats.
//!
//! Every writer renders one artifact into a `String`; staging code decides
//! where the bytes land. Field order, traversal order and number styles are
//! part of the engine contract, so renderers never reorder or pad values.

pub mod control;
pub mod fields;
pub mod grid;
pub mod lines;
pub mod opacity;
pub mod outputs;
pub mod stars;

pub use control::{ControlOptions, render_control};
pub use fields::{
    parse_dust_temperature, render_dust_density, render_dust_temperature, render_gas_velocity,
    render_number_density,
};
pub use grid::{CoordinateSystem, Grid, GridStyle, parse_grid, render_grid};
pub use lines::{LineSpecies, render_line_index};
pub use opacity::{DustOpacityTable, OpacityFileKind, OpacityFormat, render_opacity_index, render_opacity_table};
pub use outputs::{EngineImage, EngineSpectrum, parse_image, parse_spectrum};
pub use stars::{StellarSource, StellarSpectrum, render_stars, render_wavelength_grid};

use crate::domain::{DiskfitError, FormatResult};
use std::fs;
use std::path::Path;

pub const CONTROL_FILE: &str = "radmc3d.inp";
pub const STARS_FILE: &str = "stars.inp";
pub const WAVELENGTH_FILE: &str = "wavelength_micron.inp";
pub const CAMERA_WAVELENGTH_FILE: &str = "camera_wavelength_micron.inp";
pub const GRID_FILE: &str = "amr_grid.inp";
pub const DUST_DENSITY_FILE: &str = "dust_density.inp";
pub const DUST_TEMPERATURE_FILE: &str = "dust_temperature.dat";
pub const OPACITY_INDEX_FILE: &str = "dustopac.inp";
pub const LINE_INDEX_FILE: &str = "line.inp";
pub const GAS_VELOCITY_FILE: &str = "gas_velocity.inp";

pub fn opacity_table_file(species: &str) -> String {
    format!("dustkappa_{}.inp", species)
}

pub fn number_density_file(species: &str) -> String {
    format!("numberdens_{}.inp", species)
}

/// C `%e` rendering: six mantissa decimals and a signed exponent of at least
/// two digits, e.g. `1.500000e-03`.
pub fn format_exp(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }

    let rendered = format!("{value:.6e}");
    let (mantissa, exponent) = rendered.split_once('e').unwrap_or((rendered.as_str(), "0"));
    let exponent = exponent.parse::<i32>().unwrap_or(0);
    let sign = if exponent < 0 { '-' } else { '+' };
    format!("{}e{}{:02}", mantissa, sign, exponent.abs())
}

/// C `%f` rendering with six decimals.
pub fn format_fixed(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    format!("{value:.6}")
}

pub fn normalize_text_artifact(content: &str) -> String {
    let mut normalized = content.replace("\r\n", "\n").replace('\r', "\n");
    if !normalized.is_empty() && !normalized.ends_with('\n') {
        normalized.push('\n');
    }
    normalized
}

pub fn write_text_artifact(path: &Path, content: &str) -> std::io::Result<()> {
    fs::write(path, normalize_text_artifact(content))
}

/// Splits engine text output into whitespace-separated numeric tokens.
fn numeric_tokens<'a>(
    source: &'a str,
    artifact: &'static str,
) -> impl Iterator<Item = FormatResult<f64>> + 'a {
    source.split_whitespace().map(move |token| {
        token
            .replace(['D', 'd'], "e")
            .parse::<f64>()
            .map_err(|_| {
                DiskfitError::format_mismatch(format!(
                    "{} contains non-numeric token '{}'",
                    artifact, token
                ))
            })
    })
}

/// Cursor over the numeric tokens of one engine file.
///
/// Counts read from the file are only trusted once [`TokenReader::reserve`]
/// has checked them against the tokens actually present.
pub(crate) struct TokenReader {
    values: Vec<f64>,
    cursor: usize,
    artifact: &'static str,
}

impl TokenReader {
    pub(crate) fn new(source: &str, artifact: &'static str) -> FormatResult<Self> {
        let values = numeric_tokens(source, artifact).collect::<FormatResult<Vec<f64>>>()?;
        Ok(Self {
            values,
            cursor: 0,
            artifact,
        })
    }

    pub(crate) fn remaining(&self) -> usize {
        self.values.len() - self.cursor
    }

    pub(crate) fn next(&mut self, what: &str) -> FormatResult<f64> {
        let value = self.values.get(self.cursor).copied().ok_or_else(|| {
            DiskfitError::format_mismatch(format!("{} ended before {}", self.artifact, what))
        })?;
        self.cursor += 1;
        Ok(value)
    }

    /// Reads a non-negative integer.
    pub(crate) fn count(&mut self, what: &str) -> FormatResult<usize> {
        let value = self.next(what)?;
        if !value.is_finite() || value < 0.0 || value.fract() != 0.0 {
            return Err(DiskfitError::format_mismatch(format!(
                "{} has an invalid value {} for {}",
                self.artifact, value, what
            )));
        }
        Ok(value as usize)
    }

    /// Fails unless `needed` more values follow; `None` means the declared
    /// size overflowed.
    pub(crate) fn reserve(&self, needed: Option<usize>, what: &str) -> FormatResult<usize> {
        match needed {
            Some(needed) if needed <= self.remaining() => Ok(needed),
            _ => Err(DiskfitError::format_mismatch(format!(
                "{} ended before {}: {} values left",
                self.artifact,
                what,
                self.remaining()
            ))),
        }
    }

    pub(crate) fn finish(self) -> FormatResult<()> {
        if self.remaining() > 0 {
            return Err(DiskfitError::format_mismatch(format!(
                "{} has {} trailing values",
                self.artifact,
                self.remaining()
            )));
        }
        Ok(())
    }
}

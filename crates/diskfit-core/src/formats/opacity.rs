use super::format_exp;
use crate::domain::{DiskfitError, FormatResult};
use std::fmt::Write as _;

const OPACITY_INDEX_FORMAT: i64 = 2;
const INDEX_HEADER_RULE: &str = "==============================================================";
const INDEX_ENTRY_RULE: &str = "----------------------------------------------------------";

/// Column layout of a `dustkappa_*.inp` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpacityFormat {
    /// Wavelength and absorption.
    Absorption = 1,
    /// Adds scattering opacity.
    Scattering = 2,
    /// Adds the scattering asymmetry parameter g.
    Anisotropic = 3,
}

/// Wavelength-dependent opacity of one dust species (cm^2/g).
#[derive(Debug, Clone, PartialEq)]
pub struct DustOpacityTable {
    pub name: String,
    pub wavelength: Vec<f64>,
    pub absorption: Vec<f64>,
    pub scattering: Option<Vec<f64>>,
    pub asymmetry: Option<Vec<f64>>,
}

impl DustOpacityTable {
    pub fn format(&self) -> OpacityFormat {
        match (&self.scattering, &self.asymmetry) {
            (Some(_), Some(_)) => OpacityFormat::Anisotropic,
            (Some(_), None) => OpacityFormat::Scattering,
            (None, _) => OpacityFormat::Absorption,
        }
    }

    pub fn file_name(&self) -> String {
        super::opacity_table_file(&self.name)
    }

    pub fn validate(&self) -> FormatResult<()> {
        let expected = self.wavelength.len();
        let columns = [
            ("absorption", Some(&self.absorption)),
            ("scattering", self.scattering.as_ref()),
            ("asymmetry", self.asymmetry.as_ref()),
        ];
        for (column, values) in columns {
            if let Some(values) = values
                && values.len() != expected
            {
                return Err(DiskfitError::format_mismatch(format!(
                    "opacity table '{}' {} has {} entries but {} wavelengths",
                    self.name,
                    column,
                    values.len(),
                    expected
                )));
            }
        }
        Ok(())
    }
}

/// Renders `dustkappa_<name>.inp`.
///
/// An asymmetry column without a scattering column is not written.
pub fn render_opacity_table(table: &DustOpacityTable) -> FormatResult<String> {
    table.validate()?;

    let format = table.format();
    let mut out = String::with_capacity(56 * table.wavelength.len() + 16);
    let _ = writeln!(out, "{}", format as i64);
    let _ = writeln!(out, "{}", table.wavelength.len());

    for (index, (wavelength, absorption)) in
        table.wavelength.iter().zip(&table.absorption).enumerate()
    {
        let mut columns = vec![format_exp(*wavelength), format_exp(*absorption)];
        if let Some(scattering) = &table.scattering {
            columns.push(format_exp(scattering[index]));
            if let (OpacityFormat::Anisotropic, Some(asymmetry)) = (format, &table.asymmetry) {
                columns.push(format_exp(asymmetry[index]));
            }
        }
        out.push_str(&columns.join("   "));
        out.push('\n');
    }

    Ok(out)
}

/// Kind of opacity file named in `dustopac.inp`, decided by file-name prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpacityFileKind {
    Kappa,
    ScatteringMatrix,
    Opac,
}

impl OpacityFileKind {
    pub fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "dustkappa" => Some(Self::Kappa),
            "dustkapscatmat" => Some(Self::ScatteringMatrix),
            "dustopac" => Some(Self::Opac),
            _ => None,
        }
    }

    pub const fn code(self) -> i64 {
        match self {
            Self::Kappa => 1,
            Self::ScatteringMatrix => 10,
            Self::Opac => -1,
        }
    }
}

fn split_opacity_file(file_name: &str) -> FormatResult<(OpacityFileKind, &str)> {
    let unknown = || {
        DiskfitError::format_mismatch(format!(
            "opacity file '{}' does not start with dustkappa_, dustkapscatmat_ or dustopac_",
            file_name
        ))
    };
    let (prefix, rest) = file_name.split_once('_').ok_or_else(unknown)?;
    let kind = OpacityFileKind::from_prefix(prefix).ok_or_else(unknown)?;
    let species = rest.split('.').next().unwrap_or(rest);
    if species.is_empty() {
        return Err(DiskfitError::format_mismatch(format!(
            "opacity file '{}' names no species",
            file_name
        )));
    }
    Ok((kind, species))
}

/// Renders `dustopac.inp` from the opacity file names, in layer order.
pub fn render_opacity_index<S: AsRef<str>>(file_names: &[S]) -> FormatResult<String> {
    let entries = file_names
        .iter()
        .map(|name| split_opacity_file(name.as_ref()))
        .collect::<FormatResult<Vec<_>>>()?;

    let mut out = String::new();
    let _ = writeln!(out, "{}", OPACITY_INDEX_FORMAT);
    let _ = writeln!(out, "{}", entries.len());
    let _ = writeln!(out, "{}", INDEX_HEADER_RULE);
    for (kind, species) in entries {
        let _ = writeln!(out, "{}", kind.code());
        out.push_str("0\n");
        let _ = writeln!(out, "{}", species);
        let _ = writeln!(out, "{}", INDEX_ENTRY_RULE);
    }
    Ok(out)
}

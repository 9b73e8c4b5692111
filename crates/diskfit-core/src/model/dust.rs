//! Dust opacities read from JSON catalogs of precomputed grain populations.

use super::assembler::{DustLibrary, logspace};
use crate::common::config::load_json_document;
use crate::domain::{DiskfitError, DiskfitResult};
use crate::formats::DustOpacityTable;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// One grain population of a catalog. Sizes in cm, wavelengths in microns.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CatalogEntry {
    pub a_max: f64,
    pub p: f64,
    pub wavelength: Vec<f64>,
    pub absorption: Vec<f64>,
    #[serde(default)]
    pub scattering: Option<Vec<f64>>,
    #[serde(default)]
    pub asymmetry: Option<Vec<f64>>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DustCatalog {
    pub populations: Vec<CatalogEntry>,
}

impl DustCatalog {
    /// Index of the population closest to `(a_max, p)`, comparing grain
    /// sizes logarithmically.
    pub fn nearest(&self, a_max: f64, p: f64) -> Option<usize> {
        let distance = |entry: &CatalogEntry| {
            (entry.a_max / a_max).log10().abs() + (entry.p - p).abs()
        };
        self.populations
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.a_max > 0.0)
            .min_by(|(_, left), (_, right)| distance(left).total_cmp(&distance(right)))
            .map(|(index, _)| index)
    }
}

/// Resolves a model's `dust_file` to `<directory>/<stem>.json`.
#[derive(Debug, Clone)]
pub struct JsonDustLibrary {
    directory: PathBuf,
}

impl JsonDustLibrary {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    fn stem(dust_file: &str) -> &str {
        Path::new(dust_file)
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or(dust_file)
    }

    fn catalog(&self, dust_file: &str) -> DiskfitResult<DustCatalog> {
        let path = self.directory.join(format!("{}.json", Self::stem(dust_file)));
        Ok(load_json_document(path)?)
    }

    fn table(catalog: &DustCatalog, dust_file: &str, a_max: f64, p: f64) -> DiskfitResult<DustOpacityTable> {
        let index = catalog.nearest(a_max, p).ok_or_else(|| {
            DiskfitError::input_validation(
                "INPUT.DUST_CATALOG",
                format!("dust catalog '{}' has no usable populations", dust_file),
            )
        })?;
        let entry = &catalog.populations[index];
        let table = DustOpacityTable {
            name: format!("{}{}", Self::stem(dust_file), index),
            wavelength: entry.wavelength.clone(),
            absorption: entry.absorption.clone(),
            scattering: entry.scattering.clone(),
            asymmetry: entry.asymmetry.clone(),
        };
        table.validate()?;
        Ok(table)
    }
}

impl DustLibrary for JsonDustLibrary {
    fn opacity(&self, dust_file: &str, a_max_cm: f64, p: f64) -> DiskfitResult<DustOpacityTable> {
        let catalog = self.catalog(dust_file)?;
        Self::table(&catalog, dust_file, a_max_cm, p)
    }

    fn settled_opacities(
        &self,
        dust_file: &str,
        a_min_cm: f64,
        a_max_cm: f64,
        p: f64,
        bins: usize,
    ) -> DiskfitResult<Vec<DustOpacityTable>> {
        let catalog = self.catalog(dust_file)?;
        logspace(a_min_cm, a_max_cm, bins)
            .into_iter()
            .map(|size| Self::table(&catalog, dust_file, size, p))
            .collect()
    }
}

use super::disk::EnvelopeType;
use crate::domain::{DiskfitError, DiskfitResult};
use crate::formats::{DustOpacityTable, Grid, StellarSource};
use ndarray::Array3;

/// Density, temperature and opacity of one dust population on the grid.
#[derive(Debug, Clone, PartialEq)]
pub struct DustLayer {
    /// Dust mass density in g/cm^3, indexed `[ix, iy, iz]`.
    pub density: Array3<f64>,
    /// Filled in by the thermal stage.
    pub temperature: Option<Array3<f64>>,
    pub opacity: DustOpacityTable,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PhysicalModel {
    pub stars: Vec<StellarSource>,
    pub grid: Grid,
    /// Engine wavelength grid in microns.
    pub wavelengths: Vec<f64>,
    /// Disk populations first; the envelope, when present, is last.
    pub layers: Vec<DustLayer>,
    pub envelope_type: EnvelopeType,
}

impl PhysicalModel {
    pub fn dims(&self) -> [usize; 3] {
        self.grid.cell_counts()
    }

    pub fn has_envelope(&self) -> bool {
        self.envelope_type != EnvelopeType::None && !self.layers.is_empty()
    }

    pub fn densities(&self) -> Vec<Array3<f64>> {
        self.layers.iter().map(|layer| layer.density.clone()).collect()
    }

    /// Temperatures of every layer, or `None` before the thermal stage.
    pub fn temperatures(&self) -> Option<Vec<Array3<f64>>> {
        self.layers
            .iter()
            .map(|layer| layer.temperature.clone())
            .collect()
    }

    pub fn opacity_tables(&self) -> impl Iterator<Item = &DustOpacityTable> {
        self.layers.iter().map(|layer| &layer.opacity)
    }

    pub fn apply_temperatures(&mut self, temperatures: Vec<Array3<f64>>) -> DiskfitResult<()> {
        if temperatures.len() != self.layers.len() {
            return Err(DiskfitError::format_mismatch(format!(
                "engine wrote temperatures for {} dust species but the model has {} layers",
                temperatures.len(),
                self.layers.len()
            )));
        }
        for (layer, temperature) in self.layers.iter_mut().zip(temperatures) {
            layer.temperature = Some(temperature);
        }
        Ok(())
    }

    /// Runs `compute` with the last layer (the envelope) removed.
    ///
    /// The layer is put back when `compute` returns, whether it succeeded,
    /// failed or panicked.
    pub fn with_envelope_excluded<R>(&mut self, compute: impl FnOnce(&mut PhysicalModel) -> R) -> R {
        let layer = self.layers.pop();
        let guard = ExcludedLayer { model: self, layer };
        compute(&mut *guard.model)
    }
}

struct ExcludedLayer<'a> {
    model: &'a mut PhysicalModel,
    layer: Option<DustLayer>,
}

impl Drop for ExcludedLayer<'_> {
    fn drop(&mut self) {
        if let Some(layer) = self.layer.take() {
            self.model.layers.push(layer);
        }
    }
}

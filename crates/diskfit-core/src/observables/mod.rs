//! Observation-comparable products derived from engine outputs.

pub mod beam;
pub mod spectrum;
pub mod visibilities;

pub use beam::{Beam, ConvolutionError, convolve_with_beam};
pub use spectrum::{ExtinctionLaw, SpectrumMode, redden_spectrum};
pub use visibilities::{
    DirectFourierTransform, HIGH_RESOLUTION_PIXEL_ARCSEC, LOW_RESOLUTION_PIXEL_ARCSEC,
    ModelImage, PLOT_GRID_EXTENT, PLOT_GRID_POINTS, SPLICE_NPIX, UvSamples, Visibilities, VisibilityInterpolator,
    low_resolution_cutoff, low_resolution_mask, residual_visibilities, splice_cutoff,
    splice_visibilities,
};

use std::collections::BTreeMap;

/// Whether products feed a fit or a plot of the best-fit model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    #[default]
    Fit,
    Plot,
}

impl RunMode {
    pub fn spectrum_mode(self) -> SpectrumMode {
        match self {
            Self::Fit => SpectrumMode::Fit,
            Self::Plot => SpectrumMode::Plot,
        }
    }
}

/// Extra inputs for plotting a visibility dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct VisibilityPlotRequest {
    /// Regular grid the spliced and residual products are sampled on,
    /// normally `UvSamples::plot_grid`.
    pub samples_grid: UvSamples,
    /// Samples of the two-dimensional (ungridded) dataset.
    pub samples_2d: UvSamples,
    /// Geometry and beam of the observed continuum image.
    pub image_npix: usize,
    pub image_pixel_size_arcsec: f64,
    pub beam: Beam,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VisibilityRequest {
    /// Label of the dataset; products are keyed by it.
    pub name: String,
    pub wavelength_um: f64,
    pub npix: usize,
    pub pixel_size_arcsec: f64,
    pub samples: UvSamples,
    /// 1-based dataset index selecting the `flux_uncN` calibration factor.
    pub calibration_index: usize,
    pub plot: Option<VisibilityPlotRequest>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageRequest {
    pub name: String,
    pub wavelength_um: f64,
    pub npix: usize,
    pub pixel_size_arcsec: f64,
    pub beam: Beam,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumRequest {
    /// Observed wavelengths in microns, used in fit mode.
    pub wavelengths_um: Vec<f64>,
    pub extinction: ExtinctionLaw,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ObservableRequests {
    pub mode: RunMode,
    pub visibilities: Vec<VisibilityRequest>,
    pub images: Vec<ImageRequest>,
    pub spectrum: Option<SpectrumRequest>,
    /// Also compute disk-only visibilities for models with an envelope.
    /// Only honored in plot mode.
    pub disk_visibilities: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelSpectrum {
    pub wavelength_um: Vec<f64>,
    /// log10(Jy) in fit mode, Jy in plot mode.
    pub flux: Vec<f64>,
    pub mode: SpectrumMode,
}

/// Everything a run produced, keyed by dataset label plus a variant suffix
/// (`high`, `low`, `test`, `_high`, `diff`, `_2d`, `_disk`).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ObservableSet {
    pub visibilities: BTreeMap<String, Visibilities>,
    pub images: BTreeMap<String, ModelImage>,
    pub spectra: BTreeMap<String, ModelSpectrum>,
}

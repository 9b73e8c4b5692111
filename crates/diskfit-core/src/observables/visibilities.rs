//! Interferometric visibilities sampled from model images.

use crate::common::constants::{ARCSEC, PI};
use crate::domain::{DiskfitError, DiskfitResult};
use ndarray::Array2;
use num_complex::Complex64;

/// Image side length, in pixels, of both splice renderings.
pub const SPLICE_NPIX: usize = 256;
pub const HIGH_RESOLUTION_PIXEL_ARCSEC: f64 = 0.02;
pub const LOW_RESOLUTION_PIXEL_ARCSEC: f64 = 0.2;
/// Half-extent, in wavelengths, and points per axis of the plotting grid.
pub const PLOT_GRID_EXTENT: f64 = 2.0e6;
pub const PLOT_GRID_POINTS: usize = 2000;

/// Baseline coordinates in wavelengths at one observing frequency.
#[derive(Debug, Clone, PartialEq)]
pub struct UvSamples {
    pub u: Vec<f64>,
    pub v: Vec<f64>,
    pub frequency_hz: f64,
}

impl UvSamples {
    pub fn new(u: Vec<f64>, v: Vec<f64>, frequency_hz: f64) -> DiskfitResult<Self> {
        if u.len() != v.len() {
            return Err(DiskfitError::computation(
                "OBS.VISIBILITY_MISMATCH",
                format!("{} u coordinates but {} v coordinates", u.len(), v.len()),
            ));
        }
        Ok(Self { u, v, frequency_hz })
    }

    /// `points x points` samples on a regular square grid spanning
    /// `[-extent, extent]` along both axes, u varying fastest.
    pub fn square_grid(extent: f64, points: usize, frequency_hz: f64) -> Self {
        let axis: Vec<f64> = ndarray::Array1::linspace(-extent, extent, points).to_vec();
        let (mut u, mut v) = (Vec::with_capacity(points * points), Vec::with_capacity(points * points));
        for vy in &axis {
            for ux in &axis {
                u.push(*ux);
                v.push(*vy);
            }
        }
        Self { u, v, frequency_hz }
    }

    /// The regular grid that plotted visibility profiles are sampled on.
    pub fn plot_grid(frequency_hz: f64) -> Self {
        Self::square_grid(PLOT_GRID_EXTENT, PLOT_GRID_POINTS, frequency_hz)
    }

    pub fn len(&self) -> usize {
        self.u.len()
    }

    pub fn is_empty(&self) -> bool {
        self.u.is_empty()
    }

    /// Projected baseline length per sample.
    pub fn uvdist(&self) -> Vec<f64> {
        self.u
            .iter()
            .zip(&self.v)
            .map(|(u, v)| u.hypot(*v))
            .collect()
    }

    /// The samples where `mask` is set, in order.
    pub fn select(&self, mask: &[bool]) -> Self {
        let keep = |values: &[f64]| {
            values
                .iter()
                .zip(mask)
                .filter(|(_, keep)| **keep)
                .map(|(value, _)| *value)
                .collect()
        };
        Self {
            u: keep(&self.u),
            v: keep(&self.v),
            frequency_hz: self.frequency_hz,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Visibilities {
    pub u: Vec<f64>,
    pub v: Vec<f64>,
    pub real: Vec<f64>,
    pub imag: Vec<f64>,
    pub weights: Vec<f64>,
}

impl Visibilities {
    pub fn len(&self) -> usize {
        self.real.len()
    }

    pub fn is_empty(&self) -> bool {
        self.real.is_empty()
    }
}

/// A single-wavelength model image in Jy/pixel, indexed `[x, y]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelImage {
    pub wavelength_um: f64,
    pub pixel_size_arcsec: f64,
    pub flux: Array2<f64>,
}

/// Samples the Fourier transform of a model image at given baselines.
pub trait VisibilityInterpolator {
    /// `offset_arcsec` shifts the image center by (RA, Dec) before sampling.
    fn interpolate(
        &self,
        samples: &UvSamples,
        image: &ModelImage,
        offset_arcsec: [f64; 2],
    ) -> DiskfitResult<Visibilities>;
}

/// Exact discrete Fourier transform over the non-zero pixels of the image.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectFourierTransform;

impl VisibilityInterpolator for DirectFourierTransform {
    fn interpolate(
        &self,
        samples: &UvSamples,
        image: &ModelImage,
        offset_arcsec: [f64; 2],
    ) -> DiskfitResult<Visibilities> {
        let (nx, ny) = image.flux.dim();
        let pixel = image.pixel_size_arcsec * ARCSEC;
        let center = [(nx as f64 - 1.0) / 2.0, (ny as f64 - 1.0) / 2.0];
        let sources: Vec<(f64, f64, f64)> = image
            .flux
            .indexed_iter()
            .filter(|(_, flux)| **flux != 0.0)
            .map(|((ix, iy), flux)| {
                (
                    (ix as f64 - center[0]) * pixel + offset_arcsec[0] * ARCSEC,
                    (iy as f64 - center[1]) * pixel + offset_arcsec[1] * ARCSEC,
                    *flux,
                )
            })
            .collect();

        let (mut real, mut imag) = (Vec::with_capacity(samples.len()), Vec::with_capacity(samples.len()));
        for (u, v) in samples.u.iter().zip(&samples.v) {
            let total: Complex64 = sources
                .iter()
                .map(|(l, m, flux)| Complex64::from_polar(*flux, -2.0 * PI * (u * l + v * m)))
                .sum();
            real.push(total.re);
            imag.push(total.im);
        }

        Ok(Visibilities {
            u: samples.u.clone(),
            v: samples.v.clone(),
            real,
            imag,
            weights: vec![1.0; samples.len()],
        })
    }
}

/// Baseline length below which the low-resolution rendering is used:
/// `2 / (npix * pixel)` with the pixel size in radians.
pub fn low_resolution_cutoff(npix: usize, pixel_size_arcsec: f64) -> f64 {
    2.0 / (npix as f64 * pixel_size_arcsec * ARCSEC)
}

pub fn splice_cutoff() -> f64 {
    low_resolution_cutoff(SPLICE_NPIX, LOW_RESOLUTION_PIXEL_ARCSEC)
}

pub fn low_resolution_mask(samples: &UvSamples, cutoff: f64) -> Vec<bool> {
    samples.uvdist().into_iter().map(|uvdist| uvdist < cutoff).collect()
}

/// Combines high- and low-resolution interpolations of the same samples.
///
/// `high` covers every sample; `low` covers only the samples below `cutoff`,
/// in sample order. Short baselines take the low-resolution values, all
/// others the high-resolution ones.
pub fn splice_visibilities(
    samples: &UvSamples,
    high: &Visibilities,
    low: &Visibilities,
    cutoff: f64,
) -> DiskfitResult<Visibilities> {
    let mask = low_resolution_mask(samples, cutoff);
    let short = mask.iter().filter(|is_short| **is_short).count();
    if high.len() != samples.len() || low.len() != short {
        return Err(DiskfitError::computation(
            "OBS.VISIBILITY_MISMATCH",
            format!(
                "splice expects {} high-resolution and {} low-resolution values, got {} and {}",
                samples.len(),
                short,
                high.len(),
                low.len()
            ),
        ));
    }

    let mut spliced = high.clone();
    let short_indices = mask
        .iter()
        .enumerate()
        .filter(|(_, is_short)| **is_short)
        .map(|(index, _)| index);
    for (low_index, index) in short_indices.enumerate() {
        spliced.real[index] = low.real[low_index];
        spliced.imag[index] = low.imag[low_index];
    }
    Ok(spliced)
}

/// `test - reference`, sample by sample, keeping the test weights.
pub fn residual_visibilities(
    test: &Visibilities,
    reference: &Visibilities,
) -> DiskfitResult<Visibilities> {
    if test.len() != reference.len() {
        return Err(DiskfitError::computation(
            "OBS.VISIBILITY_MISMATCH",
            format!(
                "residual needs equal lengths, got {} and {}",
                test.len(),
                reference.len()
            ),
        ));
    }
    let difference = |left: &[f64], right: &[f64]| {
        left.iter().zip(right).map(|(a, b)| a - b).collect::<Vec<_>>()
    };
    Ok(Visibilities {
        u: test.u.clone(),
        v: test.v.clone(),
        real: difference(&test.real, &reference.real),
        imag: difference(&test.imag, &reference.imag),
        weights: test.weights.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::{
        DirectFourierTransform, ModelImage, UvSamples, Visibilities, VisibilityInterpolator,
        low_resolution_mask, residual_visibilities, splice_cutoff, splice_visibilities,
    };
    use crate::common::constants::ARCSEC;
    use ndarray::Array2;

    fn constant(samples: &UvSamples, value: f64) -> Visibilities {
        Visibilities {
            u: samples.u.clone(),
            v: samples.v.clone(),
            real: vec![value; samples.len()],
            imag: vec![-value; samples.len()],
            weights: vec![1.0; samples.len()],
        }
    }

    #[test]
    fn cutoff_matches_low_resolution_field_of_view() {
        let expected = 2.0 / (256.0 * 0.2 * ARCSEC);
        assert!((splice_cutoff() - expected).abs() <= 1e-9 * expected);
    }

    #[test]
    fn splice_takes_low_values_strictly_below_the_cutoff() {
        let cutoff = splice_cutoff();
        let lengths = [0.1, 0.5, 0.999, 1.0, 1.001, 3.0].map(|f| f * cutoff);
        let samples = UvSamples::new(lengths.to_vec(), vec![0.0; lengths.len()], 230e9)
            .expect("samples");
        let mask = low_resolution_mask(&samples, cutoff);
        let high = constant(&samples, 1.0);
        let low = constant(&samples.select(&mask), 7.0);

        let spliced = splice_visibilities(&samples, &high, &low, cutoff).expect("splice");
        for (index, length) in lengths.iter().enumerate() {
            let expected = if *length < cutoff { 7.0 } else { 1.0 };
            assert_eq!(spliced.real[index], expected, "sample {}", index);
            assert_eq!(spliced.imag[index], -expected, "sample {}", index);
        }
        assert_eq!(spliced.u, samples.u);
    }

    #[test]
    fn splice_rejects_misaligned_inputs() {
        let cutoff = splice_cutoff();
        let samples =
            UvSamples::new(vec![0.1 * cutoff, 2.0 * cutoff], vec![0.0, 0.0], 230e9).expect("samples");
        let high = constant(&samples, 1.0);
        let error = splice_visibilities(&samples, &high, &high, cutoff)
            .expect_err("low set is too long");
        assert_eq!(error.placeholder(), "OBS.VISIBILITY_MISMATCH");
    }

    #[test]
    fn centered_point_source_has_flat_real_visibilities() {
        let mut flux = Array2::zeros((5, 5));
        flux[[2, 2]] = 3.0;
        let image = ModelImage {
            wavelength_um: 1300.0,
            pixel_size_arcsec: 0.1,
            flux,
        };
        let samples =
            UvSamples::new(vec![0.0, 1.0e5, -2.0e5], vec![0.0, 3.0e5, 1.0e5], 230e9).expect("samples");

        let vis = DirectFourierTransform
            .interpolate(&samples, &image, [0.0, 0.0])
            .expect("interpolate");
        for index in 0..samples.len() {
            assert!((vis.real[index] - 3.0).abs() < 1e-12);
            assert!(vis.imag[index].abs() < 1e-12);
        }
    }

    #[test]
    fn offset_point_source_keeps_amplitude_and_shifts_phase() {
        let mut flux = Array2::zeros((5, 5));
        flux[[2, 2]] = 1.0;
        let image = ModelImage {
            wavelength_um: 1300.0,
            pixel_size_arcsec: 0.1,
            flux,
        };
        let u = 1.0 / (4.0 * ARCSEC);
        let samples = UvSamples::new(vec![u], vec![0.0], 230e9).expect("samples");

        let vis = DirectFourierTransform
            .interpolate(&samples, &image, [1.0, 0.0])
            .expect("interpolate");
        // A one-arcsec shift at this baseline is a quarter turn of phase.
        assert!(vis.real[0].abs() < 1e-12);
        assert!((vis.imag[0] + 1.0).abs() < 1e-12);
    }

    #[test]
    fn residual_is_sample_wise_difference() {
        let samples = UvSamples::square_grid(1.0e6, 3, 230e9);
        assert_eq!(samples.len(), 9);
        assert_eq!((samples.u[1], samples.v[1]), (0.0, -1.0e6));

        let diff = residual_visibilities(&constant(&samples, 5.0), &constant(&samples, 2.0))
            .expect("residual");
        assert!(diff.real.iter().all(|value| *value == 3.0));
        assert!(diff.imag.iter().all(|value| *value == -3.0));
    }
}

//! Interstellar reddening of model spectral energy distributions.

use crate::common::config::load_json_document;
use crate::domain::{DiskfitError, DiskfitResult};
use serde::Deserialize;
use std::path::Path;

const K_BAND_MICRON: f64 = 2.2;

/// How a reddened spectrum is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpectrumMode {
    /// log10 of the flux, for comparison against data in a fit.
    Fit,
    /// Linear flux, for plotting.
    Plot,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
struct ExtinctionTable {
    wavelength: Vec<f64>,
    a_lambda_over_a_k: Vec<f64>,
}

/// Extinction curve expressed as `A_lambda / A_K`.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtinctionLaw {
    /// Cardelli, Clayton & Mathis (1989) with total-to-selective ratio `r_v`.
    Cardelli { r_v: f64 },
    /// Tabulated curve, interpolated in log wavelength and clamped at the
    /// ends of the table.
    Tabulated {
        wavelength: Vec<f64>,
        a_lambda_over_a_k: Vec<f64>,
    },
}

impl Default for ExtinctionLaw {
    fn default() -> Self {
        Self::Cardelli { r_v: 3.1 }
    }
}

impl ExtinctionLaw {
    /// Reads `{"wavelength": [...], "a_lambda_over_a_k": [...]}` with
    /// wavelengths in microns, strictly increasing.
    pub fn load_table(path: impl AsRef<Path>) -> DiskfitResult<Self> {
        let path = path.as_ref();
        let table: ExtinctionTable = load_json_document(path)?;
        let ordered = table.wavelength.windows(2).all(|pair| pair[0] < pair[1]);
        if table.wavelength.len() < 2
            || table.wavelength.len() != table.a_lambda_over_a_k.len()
            || !ordered
            || table.wavelength[0] <= 0.0
        {
            return Err(DiskfitError::input_validation(
                "INPUT.EXTINCTION_TABLE",
                format!(
                    "'{}' needs at least two positive, increasing wavelengths with one extinction value each",
                    path.display()
                ),
            ));
        }
        Ok(Self::Tabulated {
            wavelength: table.wavelength,
            a_lambda_over_a_k: table.a_lambda_over_a_k,
        })
    }

    /// `A_lambda / A_K` at `wavelength_um`.
    pub fn relative_extinction(&self, wavelength_um: f64) -> f64 {
        match self {
            Self::Cardelli { r_v } => {
                cardelli_a_over_av(wavelength_um, *r_v) / cardelli_a_over_av(K_BAND_MICRON, *r_v)
            }
            Self::Tabulated {
                wavelength,
                a_lambda_over_a_k,
            } => interpolate_log_wavelength(wavelength, a_lambda_over_a_k, wavelength_um),
        }
    }
}

/// CCM89 `A_lambda / A_V`. Beyond 3.3 micron the infrared power law is
/// extended; below 0.1 micron the far-UV polynomial is held at its edge.
fn cardelli_a_over_av(wavelength_um: f64, r_v: f64) -> f64 {
    let x = (1.0 / wavelength_um).min(10.0);
    let (a, b) = if x < 1.1 {
        (0.574 * x.powf(1.61), -0.527 * x.powf(1.61))
    } else if x < 3.3 {
        let y = x - 1.82;
        let a = 1.0 + 0.17699 * y - 0.50447 * y.powi(2) - 0.02427 * y.powi(3)
            + 0.72085 * y.powi(4)
            + 0.01979 * y.powi(5)
            - 0.77530 * y.powi(6)
            + 0.32999 * y.powi(7);
        let b = 1.41338 * y + 2.28305 * y.powi(2) + 1.07233 * y.powi(3)
            - 5.38434 * y.powi(4)
            - 0.62251 * y.powi(5)
            + 5.30260 * y.powi(6)
            - 2.09002 * y.powi(7);
        (a, b)
    } else if x <= 8.0 {
        let (fa, fb) = if x >= 5.9 {
            let z = x - 5.9;
            (
                -0.04473 * z.powi(2) - 0.009779 * z.powi(3),
                0.2130 * z.powi(2) + 0.1207 * z.powi(3),
            )
        } else {
            (0.0, 0.0)
        };
        (
            1.752 - 0.316 * x - 0.104 / ((x - 4.67).powi(2) + 0.341) + fa,
            -3.090 + 1.825 * x + 1.206 / ((x - 4.62).powi(2) + 0.263) + fb,
        )
    } else {
        let z = x - 8.0;
        (
            -1.073 - 0.628 * z + 0.137 * z.powi(2) - 0.070 * z.powi(3),
            13.670 + 4.257 * z - 0.420 * z.powi(2) + 0.374 * z.powi(3),
        )
    };
    a + b / r_v
}

fn interpolate_log_wavelength(wavelength: &[f64], values: &[f64], target: f64) -> f64 {
    let last = wavelength.len() - 1;
    if target <= wavelength[0] {
        return values[0];
    }
    if target >= wavelength[last] {
        return values[last];
    }
    let upper = wavelength.partition_point(|w| *w < target);
    let lower = upper - 1;
    let t = (target.ln() - wavelength[lower].ln()) / (wavelength[upper].ln() - wavelength[lower].ln());
    values[lower] + t * (values[upper] - values[lower])
}

/// Dims `flux` by `A_K` magnitudes of K-band extinction scaled along `law`.
pub fn redden_spectrum(
    wavelength_um: &[f64],
    flux: &[f64],
    a_k: f64,
    law: &ExtinctionLaw,
    mode: SpectrumMode,
) -> DiskfitResult<Vec<f64>> {
    if wavelength_um.len() != flux.len() {
        return Err(DiskfitError::format_mismatch(format!(
            "spectrum has {} wavelengths but {} flux values",
            wavelength_um.len(),
            flux.len()
        )));
    }
    Ok(wavelength_um
        .iter()
        .zip(flux)
        .map(|(wavelength, flux)| {
            let reddened = flux * 10f64.powf(-0.4 * a_k * law.relative_extinction(*wavelength));
            match mode {
                SpectrumMode::Fit => reddened.log10(),
                SpectrumMode::Plot => reddened,
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::{ExtinctionLaw, SpectrumMode, cardelli_a_over_av, redden_spectrum};
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn cardelli_law_is_normalized_at_k_band() {
        let law = ExtinctionLaw::default();
        assert!((law.relative_extinction(2.2) - 1.0).abs() < 1e-12);
        assert!(law.relative_extinction(0.55) > law.relative_extinction(1.2));
        assert!(law.relative_extinction(1.2) > law.relative_extinction(2.2));
    }

    #[test]
    fn cardelli_v_band_is_unity_relative_to_a_v() {
        let a_v = cardelli_a_over_av(1.0 / 1.82, 3.1);
        assert!((a_v - 1.0).abs() < 1e-12);
    }

    #[test]
    fn fit_mode_stores_log_flux_and_plot_mode_linear() {
        let wave = [2.2, 1000.0];
        let flux = [10.0, 1.0];
        let law = ExtinctionLaw::default();

        let plot = redden_spectrum(&wave, &flux, 1.0, &law, SpectrumMode::Plot).expect("plot");
        assert!((plot[0] - 10.0 * 10f64.powf(-0.4)).abs() < 1e-12);
        assert!(plot[1] < 1.0 && plot[1] > 0.999);

        let fit = redden_spectrum(&wave, &flux, 1.0, &law, SpectrumMode::Fit).expect("fit");
        assert!((fit[0] - (1.0 - 0.4)).abs() < 1e-12);
    }

    #[test]
    fn zero_extinction_leaves_flux_unchanged() {
        let plot = redden_spectrum(
            &[0.5, 5.0],
            &[2.0, 3.0],
            0.0,
            &ExtinctionLaw::default(),
            SpectrumMode::Plot,
        )
        .expect("plot");
        assert_eq!(plot, vec![2.0, 3.0]);
    }

    #[test]
    fn tabulated_law_interpolates_and_clamps() {
        let dir = TempDir::new().expect("tempdir should create");
        let path = dir.path().join("mcclure.json");
        fs::write(
            &path,
            r#"{"wavelength": [1.0, 10.0, 100.0], "a_lambda_over_a_k": [3.0, 1.0, 0.5]}"#,
        )
        .expect("table should write");

        let law = ExtinctionLaw::load_table(&path).expect("table should load");
        assert!((law.relative_extinction(10f64.sqrt()) - 2.0).abs() < 1e-12);
        assert_eq!(law.relative_extinction(0.1), 3.0);
        assert_eq!(law.relative_extinction(1.0e4), 0.5);
    }

    #[test]
    fn unordered_table_is_rejected() {
        let dir = TempDir::new().expect("tempdir should create");
        let path = dir.path().join("bad.json");
        fs::write(
            &path,
            r#"{"wavelength": [10.0, 1.0], "a_lambda_over_a_k": [1.0, 3.0]}"#,
        )
        .expect("table should write");
        let error = ExtinctionLaw::load_table(&path).expect_err("unordered table should fail");
        assert_eq!(error.placeholder(), "INPUT.EXTINCTION_TABLE");
    }

    #[test]
    fn length_mismatch_is_a_format_error() {
        let error = redden_spectrum(
            &[1.0],
            &[1.0, 2.0],
            1.0,
            &ExtinctionLaw::default(),
            SpectrumMode::Fit,
        )
        .expect_err("mismatch should fail");
        assert_eq!(error.placeholder(), "FORMAT.MISMATCH");
    }
}

use super::{format_exp, format_fixed};
use crate::domain::{DiskfitError, FormatResult};
use std::fmt::Write as _;

/// How a star's emission is described to the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum StellarSpectrum {
    /// Blackbody with this effective temperature in Kelvin.
    Temperature(f64),
    /// Explicit flux, one value per wavelength-grid entry.
    Flux(Vec<f64>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct StellarSource {
    /// Radius in cm.
    pub radius: f64,
    /// Mass in g.
    pub mass: f64,
    /// Position in cm.
    pub position: [f64; 3],
    pub spectrum: Option<StellarSpectrum>,
}

impl StellarSource {
    pub fn blackbody(radius: f64, mass: f64, temperature: f64) -> Self {
        Self {
            radius,
            mass,
            position: [0.0; 3],
            spectrum: Some(StellarSpectrum::Temperature(temperature)),
        }
    }
}

/// Renders `stars.inp`.
///
/// Temperature-defined stars are written as the negative sentinel `-T`;
/// a zero or missing temperature is treated as "no spectrum".
pub fn render_stars(sources: &[StellarSource], wavelengths: &[f64]) -> FormatResult<String> {
    for (index, source) in sources.iter().enumerate() {
        match &source.spectrum {
            None => return Err(DiskfitError::missing_spectrum(index)),
            Some(StellarSpectrum::Temperature(temperature))
                if !temperature.is_finite() || *temperature <= 0.0 =>
            {
                return Err(DiskfitError::missing_spectrum(index));
            }
            Some(StellarSpectrum::Flux(flux)) if flux.len() != wavelengths.len() => {
                return Err(DiskfitError::format_mismatch(format!(
                    "star {} flux has {} entries but the wavelength grid has {}",
                    index,
                    flux.len(),
                    wavelengths.len()
                )));
            }
            Some(_) => {}
        }
    }

    let mut out = String::new();
    out.push_str("2\n");
    let _ = writeln!(out, "{}  {}", sources.len(), wavelengths.len());

    for source in sources {
        let _ = writeln!(
            out,
            "{}   {}   {}   {}   {}",
            format_exp(source.radius),
            format_exp(source.mass),
            format_exp(source.position[0]),
            format_exp(source.position[1]),
            format_exp(source.position[2])
        );
    }

    for wavelength in wavelengths {
        let _ = writeln!(out, "{}", format_exp(*wavelength));
    }

    for source in sources {
        match &source.spectrum {
            Some(StellarSpectrum::Temperature(temperature)) => {
                let _ = writeln!(out, "{}", format_fixed(-temperature));
            }
            Some(StellarSpectrum::Flux(flux)) => {
                for value in flux {
                    let _ = writeln!(out, "{}", format_exp(*value));
                }
            }
            None => {}
        }
    }

    Ok(out)
}

/// Renders `wavelength_micron.inp` (and the identically laid out camera
/// wavelength file).
pub fn render_wavelength_grid(wavelengths: &[f64]) -> String {
    let mut out = String::with_capacity(16 * (wavelengths.len() + 1));
    let _ = writeln!(out, "{}", wavelengths.len());
    for wavelength in wavelengths {
        let _ = writeln!(out, "{}", format_exp(*wavelength));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::{StellarSource, StellarSpectrum, render_stars, render_wavelength_grid};
    use crate::domain::DiskfitErrorCategory;

    #[test]
    fn temperature_star_is_written_as_negative_sentinel() {
        let star = StellarSource::blackbody(6.96e10, 1.989e33, 4000.0);
        let rendered = render_stars(&[star], &[0.1, 1.0]).expect("star should render");

        assert_eq!(
            rendered,
            "2\n1  2\n6.960000e+10   1.989000e+33   0.000000e+00   0.000000e+00   0.000000e+00\n\
             1.000000e-01\n1.000000e+00\n-4000.000000\n"
        );
    }

    #[test]
    fn flux_star_writes_one_value_per_wavelength() {
        let star = StellarSource {
            radius: 1.0,
            mass: 2.0,
            position: [0.0, 0.0, 0.0],
            spectrum: Some(StellarSpectrum::Flux(vec![3.0e-20, 4.0e-21])),
        };
        let rendered = render_stars(&[star], &[1.0, 10.0]).expect("star should render");
        let lines: Vec<&str> = rendered.lines().collect();

        assert_eq!(lines.len(), 7);
        assert_eq!(lines[5], "3.000000e-20");
        assert_eq!(lines[6], "4.000000e-21");
    }

    #[test]
    fn star_without_spectrum_fails_fast() {
        let mut star = StellarSource::blackbody(1.0, 1.0, 4000.0);
        star.spectrum = None;
        let error = render_stars(&[StellarSource::blackbody(1.0, 1.0, 5000.0), star], &[1.0])
            .expect_err("missing spectrum should fail");

        assert_eq!(error.placeholder(), "FORMAT.MISSING_SPECTRUM");
        assert!(error.message().contains("star 1"));
    }

    #[test]
    fn zero_temperature_counts_as_missing_spectrum() {
        let star = StellarSource::blackbody(1.0, 1.0, 0.0);
        let error = render_stars(&[star], &[1.0]).expect_err("zero temperature should fail");
        assert_eq!(error.placeholder(), "FORMAT.MISSING_SPECTRUM");
    }

    #[test]
    fn flux_length_must_match_wavelength_grid() {
        let star = StellarSource {
            radius: 1.0,
            mass: 1.0,
            position: [0.0; 3],
            spectrum: Some(StellarSpectrum::Flux(vec![1.0])),
        };
        let error = render_stars(&[star], &[1.0, 2.0]).expect_err("short flux should fail");
        assert_eq!(error.category(), DiskfitErrorCategory::FormatError);
        assert_eq!(error.placeholder(), "FORMAT.MISMATCH");
    }

    #[test]
    fn wavelength_grid_writes_count_then_values() {
        assert_eq!(
            render_wavelength_grid(&[0.1, 1.0e5]),
            "2\n1.000000e-01\n1.000000e+05\n"
        );
    }
}

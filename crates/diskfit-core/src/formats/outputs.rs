use super::TokenReader;
use crate::common::constants::{JANSKY, PC};
use crate::domain::{DiskfitError, FormatResult};
use ndarray::{Array2, Array3, s};

/// Engine image cube. `intensity` is indexed `[ix, iy, ilam]` in
/// erg s^-1 cm^-2 Hz^-1 ster^-1.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineImage {
    /// Pixel size along x and y in cm.
    pub pixel_size: [f64; 2],
    pub wavelengths: Vec<f64>,
    pub intensity: Array3<f64>,
}

impl EngineImage {
    pub fn dims(&self) -> (usize, usize, usize) {
        self.intensity.dim()
    }

    /// Flux per pixel in Jy for a source at `distance_pc`.
    pub fn to_janskys_per_pixel(&self, distance_pc: f64) -> Array3<f64> {
        let distance = distance_pc * PC;
        let solid_angle = self.pixel_size[0] * self.pixel_size[1] / (distance * distance);
        self.intensity.mapv(|value| value * solid_angle / JANSKY)
    }

    /// One wavelength plane of a cube.
    pub fn plane(cube: &Array3<f64>, ilam: usize) -> Array2<f64> {
        cube.slice(s![.., .., ilam]).to_owned()
    }
}

/// Engine spectral energy distribution; `flux` in erg s^-1 cm^-2 Hz^-1
/// as seen from 1 pc.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSpectrum {
    pub wavelength: Vec<f64>,
    pub flux: Vec<f64>,
}

impl EngineSpectrum {
    /// Flux density in Jy for a source at `distance_pc`.
    pub fn to_janskys(&self, distance_pc: f64) -> Vec<f64> {
        let scale = 1.0 / (JANSKY * distance_pc * distance_pc);
        self.flux.iter().map(|value| value * scale).collect()
    }
}

fn check_output_format(iformat: usize, artifact: &str) -> FormatResult<()> {
    // 1 is the observer at infinity, 3 the local observer; both share a layout.
    if iformat != 1 && iformat != 3 {
        return Err(DiskfitError::format_mismatch(format!(
            "unsupported {} format {}",
            artifact, iformat
        )));
    }
    Ok(())
}

/// Reads an ASCII `image.out`.
pub fn parse_image(source: &str) -> FormatResult<EngineImage> {
    let mut reader = TokenReader::new(source, "image.out")?;

    check_output_format(reader.count("the format number")?, "image.out")?;
    let nx = reader.count("the x pixel count")?;
    let ny = reader.count("the y pixel count")?;
    let nlam = reader.count("the wavelength count")?;
    let pixel_size = [
        reader.next("the x pixel size")?,
        reader.next("the y pixel size")?,
    ];

    if nx == 0 || ny == 0 || nlam == 0 {
        return Err(DiskfitError::format_mismatch(format!(
            "image.out declares an empty cube of {}x{} pixels and {} wavelengths",
            nx, ny, nlam
        )));
    }
    reader.reserve(
        nx.checked_mul(ny)
            .and_then(|pixels| pixels.checked_mul(nlam))
            .and_then(|values| values.checked_add(nlam)),
        "the image values were complete",
    )?;

    let mut wavelengths = Vec::with_capacity(nlam);
    for _ in 0..nlam {
        wavelengths.push(reader.next("the wavelength list was complete")?);
    }

    let mut intensity = Array3::<f64>::zeros((nx, ny, nlam));
    for ilam in 0..nlam {
        for iy in 0..ny {
            for ix in 0..nx {
                intensity[[ix, iy, ilam]] = reader.next("the image values were complete")?;
            }
        }
    }
    reader.finish()?;

    Ok(EngineImage {
        pixel_size,
        wavelengths,
        intensity,
    })
}

/// Reads an ASCII `spectrum.out`.
pub fn parse_spectrum(source: &str) -> FormatResult<EngineSpectrum> {
    let mut reader = TokenReader::new(source, "spectrum.out")?;

    check_output_format(reader.count("the format number")?, "spectrum.out")?;
    let nlam = reader.count("the wavelength count")?;
    reader.reserve(nlam.checked_mul(2), "the spectrum rows were complete")?;
    let mut wavelength = Vec::with_capacity(nlam);
    let mut flux = Vec::with_capacity(nlam);
    for _ in 0..nlam {
        wavelength.push(reader.next("the spectrum rows were complete")?);
        flux.push(reader.next("the spectrum rows were complete")?);
    }
    reader.finish()?;

    Ok(EngineSpectrum { wavelength, flux })
}

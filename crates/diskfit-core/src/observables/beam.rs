//! Gaussian beam convolution for model images.

use crate::common::constants::{FWHM_TO_SIGMA, PI};
use ndarray::{Array2, ArrayView2};

/// Kernel half-width in units of the larger beam sigma.
const KERNEL_HALF_WIDTH_SIGMAS: f64 = 4.0;

/// Elliptical Gaussian beam. Sizes are FWHM in arcsec; the position angle is
/// measured East of North in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Beam {
    pub major_arcsec: f64,
    pub minor_arcsec: f64,
    pub position_angle_deg: f64,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConvolutionError {
    #[error("beam axes must be finite and positive, got {major} x {minor} arcsec")]
    InvalidBeam { major: f64, minor: f64 },
    #[error("pixel scale must be finite and positive, got {0} arcsec")]
    InvalidPixelScale(f64),
}

impl Beam {
    fn validate(&self, pixel_scale_arcsec: f64) -> Result<(), ConvolutionError> {
        let positive = |value: f64| value.is_finite() && value > 0.0;
        if !positive(self.major_arcsec) || !positive(self.minor_arcsec) {
            return Err(ConvolutionError::InvalidBeam {
                major: self.major_arcsec,
                minor: self.minor_arcsec,
            });
        }
        if !positive(pixel_scale_arcsec) {
            return Err(ConvolutionError::InvalidPixelScale(pixel_scale_arcsec));
        }
        Ok(())
    }

    /// Unit-sum kernel sampled on the image pixel grid. The side length is
    /// always odd so the peak sits on the center pixel.
    pub fn kernel(&self, pixel_scale_arcsec: f64) -> Result<Array2<f64>, ConvolutionError> {
        self.validate(pixel_scale_arcsec)?;

        let sigma_x = self.major_arcsec / FWHM_TO_SIGMA / pixel_scale_arcsec;
        let sigma_y = self.minor_arcsec / FWHM_TO_SIGMA / pixel_scale_arcsec;
        let angle = (90.0 - self.position_angle_deg) * PI / 180.0;
        let (sin, cos) = angle.sin_cos();

        let half = (KERNEL_HALF_WIDTH_SIGMAS * sigma_x.max(sigma_y)).ceil() as usize;
        let size = 2 * half + 1;
        let mut kernel = Array2::from_shape_fn((size, size), |(i, j)| {
            let x = i as f64 - half as f64;
            let y = j as f64 - half as f64;
            let xp = x * cos - y * sin;
            let yp = x * sin + y * cos;
            (-0.5 * ((xp / sigma_x).powi(2) + (yp / sigma_y).powi(2))).exp()
        });

        let sum = kernel.sum();
        if sum > 0.0 {
            kernel.mapv_inplace(|value| value / sum);
        }
        Ok(kernel)
    }
}

/// Zero-padded linear convolution returning an array the size of `image`.
pub fn convolve_same(image: &ArrayView2<f64>, kernel: &ArrayView2<f64>) -> Array2<f64> {
    let (rows, cols) = image.dim();
    let (ker_rows, ker_cols) = kernel.dim();
    let pad_rows = (ker_rows / 2) as isize;
    let pad_cols = (ker_cols / 2) as isize;

    Array2::from_shape_fn((rows, cols), |(i, j)| {
        let mut sum = 0.0;
        for ki in 0..ker_rows {
            let row = i as isize + pad_rows - ki as isize;
            if row < 0 || row >= rows as isize {
                continue;
            }
            for kj in 0..ker_cols {
                let col = j as isize + pad_cols - kj as isize;
                if col >= 0 && col < cols as isize {
                    sum += image[[row as usize, col as usize]] * kernel[[ki, kj]];
                }
            }
        }
        sum
    })
}

pub fn convolve_with_beam(
    image: &Array2<f64>,
    beam: &Beam,
    pixel_scale_arcsec: f64,
) -> Result<Array2<f64>, ConvolutionError> {
    let kernel = beam.kernel(pixel_scale_arcsec)?;
    Ok(convolve_same(&image.view(), &kernel.view()))
}

#[cfg(test)]
mod tests {
    use super::{Beam, ConvolutionError, convolve_same, convolve_with_beam};
    use ndarray::{Array2, array};

    fn round_beam() -> Beam {
        Beam {
            major_arcsec: 0.1,
            minor_arcsec: 0.1,
            position_angle_deg: 0.0,
        }
    }

    #[test]
    fn kernel_is_normalized_and_centered() {
        let kernel = round_beam().kernel(0.01).expect("kernel should build");
        let (rows, cols) = kernel.dim();
        assert_eq!(rows % 2, 1);
        assert_eq!(rows, cols);

        assert!((kernel.sum() - 1.0).abs() < 1e-12);
        let center = rows / 2;
        let peak = kernel.iter().cloned().fold(f64::MIN, f64::max);
        assert_eq!(kernel[[center, center]], peak);
    }

    #[test]
    fn elongated_beam_follows_position_angle() {
        // PA 0 points the major axis north, which is the second image axis.
        let beam = Beam {
            major_arcsec: 0.3,
            minor_arcsec: 0.1,
            position_angle_deg: 0.0,
        };
        let kernel = beam.kernel(0.01).expect("kernel should build");
        let c = kernel.dim().0 / 2;
        assert!(kernel[[c, c + 10]] > kernel[[c + 10, c]]);

        let rotated = Beam {
            position_angle_deg: 90.0,
            ..beam
        };
        let kernel = rotated.kernel(0.01).expect("kernel should build");
        assert!(kernel[[c + 10, c]] > kernel[[c, c + 10]]);
    }

    #[test]
    fn convolution_preserves_shape_and_interior_flux() {
        let mut image = Array2::zeros((64, 64));
        image[[32, 32]] = 5.0;

        let convolved = convolve_with_beam(&image, &round_beam(), 0.01).expect("convolution");
        assert_eq!(convolved.dim(), (64, 64));
        assert!((convolved.sum() - 5.0).abs() < 1e-9);
        assert!(convolved[[32, 32]] < 5.0);
        assert!((convolved[[31, 32]] - convolved[[33, 32]]).abs() < 1e-15);
    }

    #[test]
    fn same_mode_matches_hand_computed_sum() {
        let image = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0], [7.0, 8.0, 9.0]];
        let kernel = array![[0.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 0.0, 0.0]];

        let result = convolve_same(&image.view(), &kernel.view());
        let expected = array![[0.0, 1.0, 2.0], [0.0, 4.0, 5.0], [0.0, 7.0, 8.0]];
        assert_eq!(result, expected);
    }

    #[test]
    fn degenerate_inputs_are_rejected() {
        let image = Array2::zeros((4, 4));
        let flat = Beam {
            minor_arcsec: 0.0,
            ..round_beam()
        };
        assert!(matches!(
            convolve_with_beam(&image, &flat, 0.01),
            Err(ConvolutionError::InvalidBeam { .. })
        ));
        assert_eq!(
            convolve_with_beam(&image, &round_beam(), -1.0),
            Err(ConvolutionError::InvalidPixelScale(-1.0))
        );
    }
}

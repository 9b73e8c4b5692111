//! CGS astronomical constants shared by the model assembler, the engine
//! output readers and the observable builders.

pub const PI: f64 = std::f64::consts::PI;
pub const AU: f64 = 1.495_978_707e13;
pub const PC: f64 = 3.085_677_581_491_367e18;
pub const M_SUN: f64 = 1.988_47e33;
pub const L_SUN: f64 = 3.828e33;
pub const R_SUN: f64 = 6.957e10;
pub const SIGMA_SB: f64 = 5.670_374_419e-5;
pub const ARCSEC: f64 = PI / 180.0 / 3600.0;
pub const JANSKY: f64 = 1.0e-23;
/// FWHM of a Gaussian in units of its standard deviation, as tabulated by
/// radio-astronomy beam headers.
pub const FWHM_TO_SIGMA: f64 = 2.355;

#[cfg(test)]
mod tests {
    use super::{ARCSEC, AU, JANSKY, L_SUN, M_SUN, PC, PI, R_SUN, SIGMA_SB};

    #[test]
    fn constants_match_expected_relationships() {
        assert!((ARCSEC * 180.0 * 3600.0 - PI).abs() <= 1.0e-15);
        assert!((PC / AU - 206_264.806).abs() < 1.0e-2);
    }

    #[test]
    fn physics_constants_remain_finite_and_positive() {
        for value in [AU, PC, M_SUN, L_SUN, R_SUN, SIGMA_SB, ARCSEC, JANSKY] {
            assert!(value.is_finite());
            assert!(value > 0.0);
        }
    }
}

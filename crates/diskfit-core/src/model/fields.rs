//! Analytic density laws on a spherical grid.

use super::assembler::FieldBuilder;
use super::disk::{ComponentDust, DiskComponent, EnvelopeComponent};
use crate::common::constants::{AU, M_SUN};
use crate::domain::{DiskfitError, DiskfitResult};
use crate::formats::{CoordinateSystem, Grid};
use ndarray::Array3;

const BISECTION_STEPS: usize = 60;

/// Flared power-law disks and the Ulrich (1976) rotating collapse envelope.
///
/// Densities are normalized so that twice the grid integral (the grid covers
/// one hemisphere) equals the component mass.
#[derive(Debug, Clone, Copy, Default)]
pub struct PowerLawFields;

struct CellCenter {
    radius: f64,
    cos_theta: f64,
    /// Cylindrical radius and height in AU.
    cyl_radius_au: f64,
    height_au: f64,
}

fn require_spherical(grid: &Grid) -> DiskfitResult<()> {
    if grid.coordinate_system != CoordinateSystem::Spherical {
        return Err(DiskfitError::input_validation(
            "INPUT.GRID_COORDINATES",
            "analytic density laws need a spherical grid",
        ));
    }
    Ok(())
}

fn cell_center(grid: &Grid, ix: usize, iy: usize) -> CellCenter {
    let radius = 0.5 * (grid.x_edges[ix] + grid.x_edges[ix + 1]);
    let theta = 0.5 * (grid.y_edges[iy] + grid.y_edges[iy + 1]);
    CellCenter {
        radius,
        cos_theta: theta.cos(),
        cyl_radius_au: radius * theta.sin() / AU,
        height_au: radius * theta.cos() / AU,
    }
}

fn cell_volume(grid: &Grid, ix: usize, iy: usize, iz: usize) -> f64 {
    let (r0, r1) = (grid.x_edges[ix], grid.x_edges[ix + 1]);
    let (t0, t1) = (grid.y_edges[iy], grid.y_edges[iy + 1]);
    let (p0, p1) = (grid.z_edges[iz], grid.z_edges[iz + 1]);
    (r1.powi(3) - r0.powi(3)) / 3.0 * (t0.cos() - t1.cos()) * (p1 - p0)
}

/// Scales `shape` so the grid holds `mass_msun` solar masses.
fn normalize(grid: &Grid, mut shape: Array3<f64>, mass_msun: f64) -> DiskfitResult<Array3<f64>> {
    let integral: f64 = shape
        .indexed_iter()
        .map(|((ix, iy, iz), value)| value * cell_volume(grid, ix, iy, iz))
        .sum::<f64>()
        * 2.0;
    if mass_msun == 0.0 {
        shape.fill(0.0);
        return Ok(shape);
    }
    if !(integral > 0.0 && integral.is_finite()) {
        return Err(DiskfitError::computation(
            "MODEL.EMPTY_DENSITY",
            format!(
                "density law places no material on the grid for a {:e} M_sun component",
                mass_msun
            ),
        ));
    }
    shape *= mass_msun * M_SUN / integral;
    Ok(shape)
}

impl PowerLawFields {
    /// Unnormalized disk density for one grain population.
    fn disk_shape(grid: &Grid, component: &DiskComponent, height_factor: f64) -> Array3<f64> {
        let [nx, ny, nz] = grid.cell_counts();
        let surface_exponent = component.density_exponent - component.flaring_exponent;
        Array3::from_shape_fn((nx, ny, nz), |(ix, iy, _)| {
            let cell = cell_center(grid, ix, iy);
            let r = cell.cyl_radius_au;
            if r < component.inner_radius {
                return 0.0;
            }
            let taper = if component.disk_type.is_tapered() {
                (-(r / component.outer_radius).powf(2.0 - surface_exponent)).exp()
            } else if r > component.outer_radius {
                return 0.0;
            } else {
                1.0
            };
            let h = component.scale_height * r.powf(component.flaring_exponent) * height_factor;
            let depletion = component
                .gaps
                .iter()
                .filter(|gap| r >= gap.inner && r < gap.outer)
                .map(|gap| gap.delta)
                .product::<f64>();
            r.powf(-component.density_exponent)
                * (-0.5 * (cell.height_au / h).powi(2)).exp()
                * taper
                * depletion
        })
    }
}

impl FieldBuilder for PowerLawFields {
    fn disk_density(
        &self,
        grid: &Grid,
        component: &DiskComponent,
    ) -> DiskfitResult<Vec<Array3<f64>>> {
        require_spherical(grid)?;
        match &component.dust {
            ComponentDust::Table(_) => Ok(vec![normalize(
                grid,
                Self::disk_shape(grid, component, 1.0),
                component.mass,
            )?]),
            ComponentDust::Settled(settled) => {
                // Mass per log-spaced bin scales as a^(4-p); larger grains
                // settle toward the midplane with Stokes number ~ a / a_max.
                let sizes = settled.bin_sizes();
                let weights: Vec<f64> = sizes
                    .iter()
                    .map(|a| a.powf(4.0 - settled.size_slope))
                    .collect();
                let total: f64 = weights.iter().sum();
                sizes
                    .iter()
                    .zip(&weights)
                    .map(|(size, weight)| {
                        let stokes = size / settled.a_max;
                        let height_factor =
                            (settled.alpha_settle / (settled.alpha_settle + stokes)).sqrt();
                        normalize(
                            grid,
                            Self::disk_shape(grid, component, height_factor),
                            component.mass * weight / total,
                        )
                    })
                    .collect()
            }
        }
    }

    fn envelope_density(
        &self,
        grid: &Grid,
        envelope: &EnvelopeComponent,
    ) -> DiskfitResult<Array3<f64>> {
        require_spherical(grid)?;
        let [nx, ny, nz] = grid.cell_counts();
        let rc = envelope.centrifugal_radius * AU;
        let shape = Array3::from_shape_fn((nx, ny, nz), |(ix, iy, _)| {
            let cell = cell_center(grid, ix, iy);
            let r_au = cell.radius / AU;
            if r_au < envelope.inner_radius || r_au > envelope.outer_radius {
                return 0.0;
            }
            let zeta = cell.radius / rc;
            let mu = cell.cos_theta;
            let mu0 = streamline_origin(mu, zeta).max(1.0e-12);
            let mut density =
                zeta.powf(-1.5) / (1.0 + mu / mu0).sqrt() / (mu / mu0 + 2.0 * mu0 * mu0 / zeta);
            if cell.height_au > cell.cyl_radius_au.powf(envelope.cavity_exponent) {
                density *= envelope.cavity_factor;
            }
            density
        });
        normalize(grid, shape, envelope.mass)
    }
}

/// Solves `mu0^3 + mu0 (zeta - 1) - mu zeta = 0` for the launch angle of the
/// streamline through `(mu, zeta)`.
fn streamline_origin(mu: f64, zeta: f64) -> f64 {
    let residual = |mu0: f64| mu0.powi(3) + mu0 * (zeta - 1.0) - mu * zeta;
    let (mut low, mut high) = (0.0_f64, 1.0_f64);
    for _ in 0..BISECTION_STEPS {
        let mid = 0.5 * (low + high);
        if residual(mid) < 0.0 {
            low = mid;
        } else {
            high = mid;
        }
    }
    0.5 * (low + high)
}

//! Turns resolved disk parameters into a gridded [`PhysicalModel`].

use super::disk::{
    DiskComponent, DustChoice, EnvelopeComponent, envelope_component, select_disk_model,
};
use super::parameters::DiskParameters;
use super::physical::{DustLayer, PhysicalModel};
use crate::common::constants::{AU, L_SUN, M_SUN, PI, SIGMA_SB};
use crate::domain::{DiskfitError, DiskfitResult};
use crate::engine::Tier;
use crate::formats::{CoordinateSystem, DustOpacityTable, Grid, StellarSource};
use ndarray::{Array1, Array3};

pub const RADIAL_WALLS: usize = 100;
pub const AZIMUTHAL_WALLS: usize = 2;
pub const WAVELENGTH_MIN_MICRON: f64 = 0.1;
pub const WAVELENGTH_MAX_MICRON: f64 = 1.0e5;
pub const WAVELENGTH_COUNT: usize = 500;

/// Grain size of the small-grain envelope population, in cm, and its
/// size-distribution slope.
const ENVELOPE_GRAIN_SIZE_CM: f64 = 1.0e-4;
const ENVELOPE_SIZE_SLOPE: f64 = 3.5;
const MICRON_TO_CM: f64 = 1.0e-4;

/// Source of dust opacity tables.
pub trait DustLibrary {
    /// Opacity of a grain population with maximum size `a_max_cm` and
    /// size-distribution slope `p`.
    fn opacity(&self, dust_file: &str, a_max_cm: f64, p: f64) -> DiskfitResult<DustOpacityTable>;

    /// One opacity table per grain-size bin of a settled disk.
    fn settled_opacities(
        &self,
        dust_file: &str,
        a_min_cm: f64,
        a_max_cm: f64,
        p: f64,
        bins: usize,
    ) -> DiskfitResult<Vec<DustOpacityTable>>;
}

/// Density-law collaborator: fills grid-shaped density arrays.
pub trait FieldBuilder {
    /// Dust density of a disk component, one array per opacity table of
    /// the component.
    fn disk_density(&self, grid: &Grid, component: &DiskComponent)
    -> DiskfitResult<Vec<Array3<f64>>>;

    fn envelope_density(
        &self,
        grid: &Grid,
        envelope: &EnvelopeComponent,
    ) -> DiskfitResult<Array3<f64>>;
}

pub fn load_dust(params: &DiskParameters, library: &dyn DustLibrary) -> DiskfitResult<DustChoice> {
    let envelope = library.opacity(
        &params.envelope_dust,
        ENVELOPE_GRAIN_SIZE_CM,
        ENVELOPE_SIZE_SLOPE,
    )?;
    if params.disk_type.is_settled() {
        let bins = library.settled_opacities(
            &params.dust_file,
            params.a_min * MICRON_TO_CM,
            params.a_max * MICRON_TO_CM,
            params.p,
            params.na,
        )?;
        Ok(DustChoice::Settled { bins, envelope })
    } else {
        let disk = library.opacity(&params.dust_file, params.a_max * MICRON_TO_CM, params.p)?;
        Ok(DustChoice::Mixed { disk, envelope })
    }
}

pub fn logspace(start: f64, stop: f64, count: usize) -> Vec<f64> {
    Array1::logspace(10.0, start.log10(), stop.log10(), count).to_vec()
}

/// Spherical grid: log-spaced radial walls from `R_in` to `R_env`, polar
/// walls from the pole to the midplane, one azimuthal cell.
pub fn spherical_grid(r_in_au: f64, r_out_au: f64, angular_walls: usize) -> DiskfitResult<Grid> {
    if !(r_in_au > 0.0 && r_out_au > r_in_au) {
        return Err(DiskfitError::input_validation(
            "INPUT.GRID_EXTENT",
            format!(
                "grid needs 0 < R_in < R_env, got R_in={} R_env={}",
                r_in_au, r_out_au
            ),
        ));
    }
    if angular_walls < 2 {
        return Err(DiskfitError::input_validation(
            "INPUT.GRID_EXTENT",
            format!("grid needs at least 2 polar walls, got {}", angular_walls),
        ));
    }

    Ok(Grid::regular(
        logspace(r_in_au * AU, r_out_au * AU, RADIAL_WALLS),
        Array1::linspace(0.0, PI / 2.0, angular_walls).to_vec(),
        Array1::linspace(0.0, 2.0 * PI, AZIMUTHAL_WALLS).to_vec(),
        CoordinateSystem::Spherical,
    ))
}

/// Star of `mass` and `luminosity` (solar units) radiating as a blackbody.
pub fn blackbody_star(mass: f64, luminosity: f64, temperature: f64) -> DiskfitResult<StellarSource> {
    if !(temperature > 0.0 && luminosity > 0.0) {
        return Err(DiskfitError::input_validation(
            "INPUT.STAR",
            format!(
                "star needs positive luminosity and temperature, got L={} T={}",
                luminosity, temperature
            ),
        ));
    }
    let radius =
        (luminosity * L_SUN / (4.0 * PI * SIGMA_SB * temperature.powi(4))).sqrt();
    Ok(StellarSource::blackbody(radius, mass * M_SUN, temperature))
}

fn check_layer_shape(field: &Array3<f64>, grid: &Grid, what: &str) -> DiskfitResult<()> {
    let [nx, ny, nz] = grid.cell_counts();
    if field.dim() != (nx, ny, nz) {
        return Err(DiskfitError::format_mismatch(format!(
            "{} density has shape {:?} but the grid has {}x{}x{} cells",
            what,
            field.dim(),
            nx,
            ny,
            nz
        )));
    }
    Ok(())
}

fn disk_layers(
    grid: &Grid,
    component: &DiskComponent,
    fields: &dyn FieldBuilder,
) -> DiskfitResult<Vec<DustLayer>> {
    let densities = fields.disk_density(grid, component)?;
    let tables = component.dust.tables();
    if densities.len() != tables.len() {
        return Err(DiskfitError::computation(
            "MODEL.LAYER_MISMATCH",
            format!(
                "{} disk produced {} density arrays for {} opacity tables",
                component.disk_type,
                densities.len(),
                tables.len()
            ),
        ));
    }

    densities
        .into_iter()
        .zip(tables)
        .map(|(density, opacity)| {
            check_layer_shape(&density, grid, "disk")?;
            Ok(DustLayer {
                density,
                temperature: None,
                opacity: opacity.clone(),
            })
        })
        .collect()
}

pub fn assemble_model(
    params: &DiskParameters,
    tier: &Tier,
    library: &dyn DustLibrary,
    fields: &dyn FieldBuilder,
) -> DiskfitResult<PhysicalModel> {
    let star = blackbody_star(params.m_star, params.l_star, params.t_star)?;
    let grid = spherical_grid(params.r_in, params.r_env, tier.angular_walls)?;
    let dust = load_dust(params, library)?;

    let mut layers = Vec::new();
    for component in select_disk_model(params.disk_type, params, &dust)? {
        layers.extend(disk_layers(&grid, &component, fields)?);
    }
    if let Some(envelope) = envelope_component(params, &dust) {
        let density = fields.envelope_density(&grid, &envelope)?;
        check_layer_shape(&density, &grid, "envelope")?;
        layers.push(DustLayer {
            density,
            temperature: None,
            opacity: envelope.dust,
        });
    }

    Ok(PhysicalModel {
        stars: vec![star],
        grid,
        wavelengths: logspace(WAVELENGTH_MIN_MICRON, WAVELENGTH_MAX_MICRON, WAVELENGTH_COUNT),
        layers,
        envelope_type: params.envelope_type,
    })
}

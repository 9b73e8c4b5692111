use super::{TokenReader, format_exp, format_fixed};
use crate::domain::{DiskfitError, FormatResult};
use ndarray::Array3;
use std::fmt::Write as _;

const FIELD_FILE_FORMAT: usize = 1;

fn check_shape(field: &Array3<f64>, dims: [usize; 3], label: &str) -> FormatResult<()> {
    if field.dim() != (dims[0], dims[1], dims[2]) {
        let (nx, ny, nz) = field.dim();
        return Err(DiskfitError::format_mismatch(format!(
            "{} has shape {}x{}x{} but the grid has {}x{}x{} cells",
            label, nx, ny, nz, dims[0], dims[1], dims[2]
        )));
    }
    Ok(())
}

/// Visits every cell with x varying fastest, then y, then z.
fn for_each_cell(dims: [usize; 3], mut visit: impl FnMut(usize, usize, usize)) {
    for iz in 0..dims[2] {
        for iy in 0..dims[1] {
            for ix in 0..dims[0] {
                visit(ix, iy, iz);
            }
        }
    }
}

fn render_species_fields(
    fields: &[Array3<f64>],
    dims: [usize; 3],
    label: &str,
    format_value: fn(f64) -> String,
) -> FormatResult<String> {
    for (species, field) in fields.iter().enumerate() {
        check_shape(field, dims, &format!("{} species {}", label, species))?;
    }

    let ncells: usize = dims.iter().product();
    let mut out = String::with_capacity(14 * ncells * fields.len() + 32);
    let _ = writeln!(out, "{}", FIELD_FILE_FORMAT);
    let _ = writeln!(out, "{}", ncells);
    let _ = writeln!(out, "{}", fields.len());

    for field in fields {
        for_each_cell(dims, |ix, iy, iz| {
            let _ = writeln!(out, "{}", format_value(field[[ix, iy, iz]]));
        });
    }

    Ok(out)
}

/// Renders `dust_density.inp` for one or more dust species (g/cm^3).
pub fn render_dust_density(densities: &[Array3<f64>], dims: [usize; 3]) -> FormatResult<String> {
    render_species_fields(densities, dims, "dust density", format_exp)
}

/// Renders `dust_temperature.dat` (Kelvin, fixed notation).
pub fn render_dust_temperature(
    temperatures: &[Array3<f64>],
    dims: [usize; 3],
) -> FormatResult<String> {
    render_species_fields(temperatures, dims, "dust temperature", format_fixed)
}

/// Reads the engine's `dust_temperature.dat` into one array per species.
pub fn parse_dust_temperature(source: &str, dims: [usize; 3]) -> FormatResult<Vec<Array3<f64>>> {
    let mut reader = TokenReader::new(source, "dust_temperature.dat")?;

    let iformat = reader.count("the format number")?;
    if iformat != FIELD_FILE_FORMAT {
        return Err(DiskfitError::format_mismatch(format!(
            "unsupported dust_temperature.dat format {}",
            iformat
        )));
    }

    let ncells = reader.count("the cell count")?;
    let expected: usize = dims.iter().product();
    if ncells != expected || ncells == 0 {
        return Err(DiskfitError::format_mismatch(format!(
            "dust_temperature.dat holds {} cells but the grid has {}",
            ncells, expected
        )));
    }

    let nspecies = reader.count("the species count")?;
    reader.reserve(nspecies.checked_mul(ncells), "the last cell value")?;
    let mut fields = Vec::with_capacity(nspecies);
    for _ in 0..nspecies {
        let mut field = Array3::<f64>::zeros((dims[0], dims[1], dims[2]));
        let mut failure = None;
        for_each_cell(dims, |ix, iy, iz| {
            if failure.is_some() {
                return;
            }
            match reader.next("the last cell value") {
                Ok(value) => field[[ix, iy, iz]] = value,
                Err(error) => failure = Some(error),
            }
        });
        if let Some(error) = failure {
            return Err(error);
        }
        fields.push(field);
    }
    reader.finish()?;

    Ok(fields)
}

/// Renders `numberdens_<species>.inp` for a gas species (cm^-3).
pub fn render_number_density(density: &Array3<f64>, dims: [usize; 3]) -> FormatResult<String> {
    check_shape(density, dims, "number density")?;

    let ncells: usize = dims.iter().product();
    let mut out = String::with_capacity(14 * ncells + 16);
    let _ = writeln!(out, "{}", FIELD_FILE_FORMAT);
    let _ = writeln!(out, "{}", ncells);
    for_each_cell(dims, |ix, iy, iz| {
        let _ = writeln!(out, "{}", format_exp(density[[ix, iy, iz]]));
    });
    Ok(out)
}

/// Renders `gas_velocity.inp`; `velocity` holds the x, y, z components (cm/s).
pub fn render_gas_velocity(velocity: &[Array3<f64>; 3], dims: [usize; 3]) -> FormatResult<String> {
    for (axis, component) in ["x", "y", "z"].iter().zip(velocity) {
        check_shape(component, dims, &format!("gas velocity {}", axis))?;
    }

    let ncells: usize = dims.iter().product();
    let mut out = String::with_capacity(40 * ncells + 16);
    let _ = writeln!(out, "{}", FIELD_FILE_FORMAT);
    let _ = writeln!(out, "{}", ncells);
    for_each_cell(dims, |ix, iy, iz| {
        let _ = writeln!(
            out,
            "{} {} {}",
            format_exp(velocity[0][[ix, iy, iz]]),
            format_exp(velocity[1][[ix, iy, iz]]),
            format_exp(velocity[2][[ix, iy, iz]])
        );
    });
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::{
        parse_dust_temperature, render_dust_density, render_dust_temperature, render_gas_velocity,
        render_number_density,
    };
    use ndarray::Array3;

    fn indexed_field(dims: [usize; 3]) -> Array3<f64> {
        Array3::from_shape_fn((dims[0], dims[1], dims[2]), |(ix, iy, iz)| {
            (ix + 10 * iy + 100 * iz) as f64
        })
    }

    #[test]
    fn density_is_written_x_fastest_then_y_then_z() {
        let dims = [2, 2, 2];
        let rendered = render_dust_density(&[indexed_field(dims)], dims).expect("density should render");
        let lines: Vec<&str> = rendered.lines().collect();

        assert_eq!(&lines[..3], &["1", "8", "1"]);
        let values: Vec<f64> = lines[3..]
            .iter()
            .map(|line| line.parse::<f64>().expect("value should parse"))
            .collect();
        assert_eq!(values, vec![0.0, 1.0, 10.0, 11.0, 100.0, 101.0, 110.0, 111.0]);
    }

    #[test]
    fn multiple_species_are_written_back_to_back() {
        let dims = [1, 2, 1];
        let first = Array3::from_elem((1, 2, 1), 1.0e-18);
        let second = Array3::from_elem((1, 2, 1), 2.0e-20);
        let rendered = render_dust_density(&[first, second], dims).expect("density should render");

        assert_eq!(
            rendered,
            "1\n2\n2\n1.000000e-18\n1.000000e-18\n2.000000e-20\n2.000000e-20\n"
        );
    }

    #[test]
    fn shape_mismatch_is_rejected() {
        let error = render_dust_density(&[Array3::zeros((2, 2, 1))], [2, 1, 1])
            .expect_err("mismatched shape should fail");
        assert_eq!(error.placeholder(), "FORMAT.MISMATCH");
        assert!(error.message().contains("species 0"));
    }

    #[test]
    fn temperature_uses_fixed_notation_and_parses_back() {
        let dims = [3, 2, 1];
        let field = indexed_field(dims).mapv(|value| value + 20.5);
        let rendered = render_dust_temperature(std::slice::from_ref(&field), dims)
            .expect("temperature should render");
        assert!(rendered.lines().nth(3) == Some("20.500000"));

        let parsed = parse_dust_temperature(&rendered, dims).expect("temperature should parse");
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0], field);
    }

    #[test]
    fn temperature_with_wrong_cell_count_is_rejected() {
        let error = parse_dust_temperature("1\n4\n1\n10.0\n10.0\n10.0\n10.0\n", [3, 1, 1])
            .expect_err("cell count mismatch should fail");
        assert_eq!(error.placeholder(), "FORMAT.MISMATCH");
    }

    #[test]
    fn truncated_temperature_file_is_rejected() {
        let error = parse_dust_temperature("1\n2\n1\n10.0\n", [2, 1, 1])
            .expect_err("truncated file should fail");
        assert!(error.message().contains("ended before"));
    }

    #[test]
    fn oversized_species_count_is_rejected_without_allocating() {
        let error = parse_dust_temperature("1\n1\n1e19\n5.0\n", [1, 1, 1])
            .expect_err("species count exceeds the values present");
        assert_eq!(error.placeholder(), "FORMAT.MISMATCH");
        assert!(error.message().contains("ended before"));
    }

    #[test]
    fn fractional_header_counts_are_rejected() {
        let error = parse_dust_temperature("1.9\n1.7\n1\n5.0\n", [1, 1, 1])
            .expect_err("fractional format number");
        assert_eq!(error.placeholder(), "FORMAT.MISMATCH");
        assert!(error.message().contains("invalid value 1.9"));

        let error = parse_dust_temperature("1\n1.7\n1\n5.0\n", [1, 1, 1])
            .expect_err("fractional cell count");
        assert!(error.message().contains("invalid value 1.7"));
    }

    #[test]
    fn number_density_has_no_species_line() {
        let rendered = render_number_density(&Array3::from_elem((2, 1, 1), 5.0), [2, 1, 1])
            .expect("number density should render");
        assert_eq!(rendered, "1\n2\n5.000000e+00\n5.000000e+00\n");
    }

    #[test]
    fn gas_velocity_writes_three_components_per_cell() {
        let dims = [1, 1, 2];
        let velocity = [
            Array3::from_elem((1, 1, 2), 1.0),
            Array3::from_elem((1, 1, 2), 0.0),
            Array3::from_shape_vec((1, 1, 2), vec![-1.0, 2.0]).expect("shape should fit"),
        ];
        let rendered = render_gas_velocity(&velocity, dims).expect("velocity should render");
        assert_eq!(
            rendered,
            "1\n2\n1.000000e+00 0.000000e+00 -1.000000e+00\n1.000000e+00 0.000000e+00 2.000000e+00\n"
        );
    }
}

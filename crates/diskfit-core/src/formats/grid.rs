use super::{TokenReader, format_exp};
use crate::domain::{DiskfitError, FormatResult};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

const GRID_FILE_FORMAT: usize = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GridStyle {
    #[default]
    Regular,
    Octree,
    Amr,
}

impl GridStyle {
    pub const fn code(self) -> i64 {
        match self {
            Self::Regular => 0,
            Self::Octree => 1,
            Self::Amr => 10,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Regular => "regular",
            Self::Octree => "octree",
            Self::Amr => "amr",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CoordinateSystem {
    #[default]
    Cartesian,
    Spherical,
    Cylindrical,
}

impl CoordinateSystem {
    pub const fn code(self) -> i64 {
        match self {
            Self::Cartesian => 0,
            Self::Spherical => 100,
            Self::Cylindrical => 200,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Cartesian),
            100 => Some(Self::Spherical),
            200 => Some(Self::Cylindrical),
            _ => None,
        }
    }
}

/// Cell-wall coordinates along the three axes.
///
/// For spherical grids x is radius (cm), y the polar angle and z the
/// azimuth (radians).
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    pub x_edges: Vec<f64>,
    pub y_edges: Vec<f64>,
    pub z_edges: Vec<f64>,
    pub style: GridStyle,
    pub coordinate_system: CoordinateSystem,
}

impl Grid {
    pub fn regular(
        x_edges: Vec<f64>,
        y_edges: Vec<f64>,
        z_edges: Vec<f64>,
        coordinate_system: CoordinateSystem,
    ) -> Self {
        Self {
            x_edges,
            y_edges,
            z_edges,
            style: GridStyle::Regular,
            coordinate_system,
        }
    }

    pub fn cell_counts(&self) -> [usize; 3] {
        [
            self.x_edges.len().saturating_sub(1),
            self.y_edges.len().saturating_sub(1),
            self.z_edges.len().saturating_sub(1),
        ]
    }

    pub fn active_axes(&self) -> [bool; 3] {
        self.cell_counts().map(|count| count > 1)
    }

    pub fn cell_count(&self) -> usize {
        self.cell_counts().iter().product()
    }

    fn axes(&self) -> [(&'static str, &[f64]); 3] {
        [
            ("x", &self.x_edges),
            ("y", &self.y_edges),
            ("z", &self.z_edges),
        ]
    }
}

/// Renders `amr_grid.inp`. Only regular grids are supported.
pub fn render_grid(grid: &Grid) -> FormatResult<String> {
    if grid.style != GridStyle::Regular {
        return Err(DiskfitError::unsupported_grid_style(grid.style.as_str()));
    }

    for (axis, edges) in grid.axes() {
        if edges.len() < 2 {
            return Err(DiskfitError::format_mismatch(format!(
                "grid axis {} needs at least two cell walls, got {}",
                axis,
                edges.len()
            )));
        }
    }

    let [nx, ny, nz] = grid.cell_counts();
    let [ax, ay, az] = grid.active_axes();

    let mut out = String::new();
    let _ = writeln!(out, "{}", GRID_FILE_FORMAT);
    let _ = writeln!(out, "{}", grid.style.code());
    let _ = writeln!(out, "{}", grid.coordinate_system.code());
    out.push_str("0\n");
    let _ = writeln!(out, "{}  {}  {}", ax as i32, ay as i32, az as i32);
    let _ = writeln!(out, "{}  {}  {}", nx, ny, nz);

    for (_, edges) in grid.axes() {
        for edge in edges {
            let _ = writeln!(out, "{}", format_exp(*edge));
        }
    }

    Ok(out)
}

/// Reads a regular `amr_grid.inp` back into a [`Grid`].
pub fn parse_grid(source: &str) -> FormatResult<Grid> {
    let mut reader = TokenReader::new(source, "amr_grid.inp")?;

    let iformat = reader.count("the format number")?;
    if iformat != GRID_FILE_FORMAT {
        return Err(DiskfitError::format_mismatch(format!(
            "unsupported amr_grid.inp format {}",
            iformat
        )));
    }
    match reader.count("the grid style")? {
        0 => {}
        1 => return Err(DiskfitError::unsupported_grid_style("octree")),
        10 => return Err(DiskfitError::unsupported_grid_style("amr")),
        other => {
            return Err(DiskfitError::format_mismatch(format!(
                "unknown grid style code {}",
                other
            )));
        }
    }
    let code = reader.count("the coordinate system")?;
    let coordinate_system = i64::try_from(code)
        .ok()
        .and_then(CoordinateSystem::from_code)
        .ok_or_else(|| {
            DiskfitError::format_mismatch(format!("unknown coordinate system code {}", code))
        })?;
    reader.count("the grid info flag")?;

    let mut declared_active = [false; 3];
    for flag in &mut declared_active {
        *flag = reader.count("the active axis flags")? != 0;
    }
    let mut counts = [0usize; 3];
    for count in &mut counts {
        *count = reader.count("the cell counts")?;
    }

    let walls = counts
        .iter()
        .try_fold(0usize, |total, count| total.checked_add(count.checked_add(1)?));
    reader.reserve(walls, "the cell walls")?;

    let mut take = |count: usize| -> FormatResult<Vec<f64>> {
        (0..=count).map(|_| reader.next("the cell walls")).collect()
    };
    let x_edges = take(counts[0])?;
    let y_edges = take(counts[1])?;
    let z_edges = take(counts[2])?;
    reader.finish()?;

    let grid = Grid::regular(x_edges, y_edges, z_edges, coordinate_system);
    if declared_active != grid.active_axes() {
        return Err(DiskfitError::format_mismatch(format!(
            "amr_grid.inp active flags {:?} disagree with cell counts {:?}",
            declared_active,
            grid.cell_counts()
        )));
    }

    Ok(grid)
}

#[cfg(test)]
mod tests {
    use super::{CoordinateSystem, Grid, GridStyle, parse_grid, render_grid};

    fn spherical_grid() -> Grid {
        Grid::regular(
            vec![1.0e13, 2.0e13, 4.0e13, 8.0e13],
            vec![0.0, 0.5, 1.0],
            vec![0.0, 6.283_185],
            CoordinateSystem::Spherical,
        )
    }

    #[test]
    fn regular_spherical_grid_layout() {
        let rendered = render_grid(&spherical_grid()).expect("grid should render");
        let lines: Vec<&str> = rendered.lines().collect();

        assert_eq!(&lines[..6], &["1", "0", "100", "0", "1  1  0", "3  2  1"]);
        assert_eq!(lines[6], "1.000000e+13");
        assert_eq!(lines[10], "0.000000e+00");
        assert_eq!(lines.len(), 6 + 4 + 3 + 2);
    }

    #[test]
    fn grid_round_trip_preserves_counts_edges_and_flags() {
        let grid = spherical_grid();
        let parsed = parse_grid(&render_grid(&grid).expect("grid should render"))
            .expect("grid should parse");

        assert_eq!(parsed.cell_counts(), [3, 2, 1]);
        assert_eq!(parsed.active_axes(), [true, true, false]);
        assert_eq!(parsed.x_edges, grid.x_edges);
        assert_eq!(parsed.y_edges, grid.y_edges);
        assert_eq!(parsed.coordinate_system, CoordinateSystem::Spherical);
    }

    #[test]
    fn non_regular_styles_are_rejected() {
        for (style, name) in [(GridStyle::Octree, "octree"), (GridStyle::Amr, "amr")] {
            let mut grid = spherical_grid();
            grid.style = style;
            let error = render_grid(&grid).expect_err("non-regular grid should fail");
            assert_eq!(error.placeholder(), "FORMAT.UNSUPPORTED_GRID_STYLE");
            assert!(error.message().starts_with(name));
        }
    }

    #[test]
    fn axis_without_cells_is_a_format_mismatch() {
        let grid = Grid::regular(vec![1.0], vec![0.0, 1.0], vec![0.0, 1.0], CoordinateSystem::Cartesian);
        let error = render_grid(&grid).expect_err("degenerate axis should fail");
        assert_eq!(error.placeholder(), "FORMAT.MISMATCH");
    }

    #[test]
    fn truncated_grid_file_is_rejected() {
        let rendered = render_grid(&spherical_grid()).expect("grid should render");
        let truncated: String = rendered.lines().take(12).collect::<Vec<_>>().join("\n");
        let error = parse_grid(&truncated).expect_err("truncated file should fail");
        assert_eq!(error.placeholder(), "FORMAT.MISMATCH");
    }

    #[test]
    fn overflowing_cell_counts_are_rejected() {
        let source = "1\n0\n0\n0\n1 1 1\n1.8446744073709552e19 1.8446744073709552e19 1\n0 1\n";
        let error = parse_grid(source).expect_err("wall count overflows");
        assert_eq!(error.placeholder(), "FORMAT.MISMATCH");
        assert!(error.message().contains("ended before the cell walls"));
    }

    #[test]
    fn fractional_cell_counts_are_rejected() {
        let source = "1\n0\n0\n0\n1 0 0\n1.5 1 1\n0 1 2\n0 1\n0 1\n";
        let error = parse_grid(source).expect_err("fractional count");
        assert_eq!(error.placeholder(), "FORMAT.MISMATCH");
        assert!(error.message().contains("invalid value 1.5"));
    }
}

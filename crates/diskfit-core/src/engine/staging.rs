//! Per-run working directory holding engine inputs and outputs.

use crate::common::DriverConfig;
use crate::domain::{DiskfitError, DiskfitResult, StagedArtifact, artifact_list};
use crate::formats::{
    CONTROL_FILE, ControlOptions, DUST_DENSITY_FILE, DUST_TEMPERATURE_FILE, GRID_FILE,
    OPACITY_INDEX_FILE, STARS_FILE, WAVELENGTH_FILE, render_control, render_dust_density,
    render_dust_temperature, render_grid, render_opacity_index, render_opacity_table,
    render_stars, render_wavelength_grid, write_text_artifact,
};
use crate::model::PhysicalModel;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};

pub const PARAMETER_RECORD_FILE: &str = "params.txt";

/// Ray-tracing outputs that must not survive into the next invocation.
const RAY_TRACING_OUTPUTS: &[&str] = &["image.out", "spectrum.out"];

/// Isolated staging directory, removed when dropped.
#[derive(Debug)]
pub struct StagingDir {
    dir: TempDir,
}

impl StagingDir {
    /// Creates `temp_<source>_<rank>*` under the configured scratch root.
    pub fn create(config: &DriverConfig) -> DiskfitResult<Self> {
        fs::create_dir_all(&config.scratch_root).map_err(|error| {
            DiskfitError::io_system(
                "IO.STAGING_CREATE",
                format!(
                    "failed to create scratch root '{}': {}",
                    config.scratch_root.display(),
                    error
                ),
            )
        })?;
        let dir = tempfile::Builder::new()
            .prefix(&format!("temp_{}_{}", config.source, config.rank))
            .tempdir_in(&config.scratch_root)
            .map_err(|error| {
                DiskfitError::io_system(
                    "IO.STAGING_CREATE",
                    format!(
                        "failed to create staging directory in '{}': {}",
                        config.scratch_root.display(),
                        error
                    ),
                )
            })?;
        debug!(path = %dir.path().display(), "created staging directory");
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn artifact_path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn write_artifact(&self, name: &str, content: &str) -> DiskfitResult<()> {
        let path = self.artifact_path(name);
        write_text_artifact(&path, content).map_err(|error| {
            DiskfitError::io_system(
                "IO.ARTIFACT_WRITE",
                format!("failed to write '{}': {}", path.display(), error),
            )
        })
    }

    pub fn read_artifact(&self, name: &str) -> DiskfitResult<String> {
        let path = self.artifact_path(name);
        fs::read_to_string(&path).map_err(|error| {
            DiskfitError::io_system(
                "IO.ARTIFACT_READ",
                format!("failed to read '{}': {}", path.display(), error),
            )
        })
    }

    /// Removes `name` if present.
    pub fn remove_artifact(&self, name: &str) -> DiskfitResult<()> {
        let path = self.artifact_path(name);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(()),
            Err(error) => Err(DiskfitError::io_system(
                "IO.ARTIFACT_REMOVE",
                format!("failed to remove '{}': {}", path.display(), error),
            )),
        }
    }

    /// Deletes every file in the directory, keeping the directory itself.
    pub fn discard_artifacts(&self) -> DiskfitResult<()> {
        let entries = fs::read_dir(self.path()).map_err(|error| {
            DiskfitError::io_system(
                "IO.ARTIFACT_REMOVE",
                format!("failed to list '{}': {}", self.path().display(), error),
            )
        })?;
        for entry in entries.flatten() {
            if entry.path().is_file()
                && let Some(name) = entry.file_name().to_str()
            {
                self.remove_artifact(name)?;
            }
        }
        Ok(())
    }

    /// Writes the full input set for a run: control switches, stars,
    /// wavelengths, grid, opacities and the density/temperature fields.
    pub fn stage_model(
        &self,
        model: &PhysicalModel,
        control: &ControlOptions,
    ) -> DiskfitResult<Vec<StagedArtifact>> {
        self.write_artifact(CONTROL_FILE, &render_control(control))?;
        self.write_artifact(STARS_FILE, &render_stars(&model.stars, &model.wavelengths)?)?;
        self.write_artifact(WAVELENGTH_FILE, &render_wavelength_grid(&model.wavelengths))?;
        self.write_artifact(GRID_FILE, &render_grid(&model.grid)?)?;

        let mut opacity_files = Vec::new();
        for table in model.opacity_tables() {
            let file_name = table.file_name();
            self.write_artifact(&file_name, &render_opacity_table(table)?)?;
            opacity_files.push(file_name);
        }
        self.write_artifact(OPACITY_INDEX_FILE, &render_opacity_index(&opacity_files)?)?;

        let mut staged = artifact_list(&[
            CONTROL_FILE,
            STARS_FILE,
            WAVELENGTH_FILE,
            GRID_FILE,
            OPACITY_INDEX_FILE,
        ]);
        staged.extend(opacity_files.into_iter().map(StagedArtifact::new));
        staged.extend(self.stage_fields(model)?);
        Ok(staged)
    }

    /// Rewrites the density file and, once known, the temperature file, so
    /// the staged fields match the model's current layers.
    pub fn stage_fields(&self, model: &PhysicalModel) -> DiskfitResult<Vec<StagedArtifact>> {
        let dims = model.dims();
        self.write_artifact(DUST_DENSITY_FILE, &render_dust_density(&model.densities(), dims)?)?;
        let mut staged = artifact_list(&[DUST_DENSITY_FILE]);

        match model.temperatures() {
            Some(temperatures) => {
                self.write_artifact(
                    DUST_TEMPERATURE_FILE,
                    &render_dust_temperature(&temperatures, dims)?,
                )?;
                staged.push(StagedArtifact::new(DUST_TEMPERATURE_FILE));
            }
            None => self.remove_artifact(DUST_TEMPERATURE_FILE)?,
        }

        let opacity_files: Vec<String> =
            model.opacity_tables().map(|table| table.file_name()).collect();
        self.write_artifact(OPACITY_INDEX_FILE, &render_opacity_index(&opacity_files)?)?;
        Ok(staged)
    }

    /// Removes stale engine outputs before a new invocation.
    pub fn clear_outputs(&self) -> DiskfitResult<()> {
        RAY_TRACING_OUTPUTS
            .iter()
            .try_for_each(|name| self.remove_artifact(name))
    }

    /// Removes the directory now, reporting failures instead of ignoring them.
    pub fn close(self) -> DiskfitResult<()> {
        let path = self.path().to_path_buf();
        self.dir.close().map_err(|error| {
            warn!(path = %path.display(), %error, "failed to remove staging directory");
            DiskfitError::io_system(
                "IO.STAGING_REMOVE",
                format!("failed to remove '{}': {}", path.display(), error),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::StagingDir;
    use crate::common::DriverConfig;
    use crate::formats::{
        ControlOptions, DUST_DENSITY_FILE, DUST_TEMPERATURE_FILE, OPACITY_INDEX_FILE,
        parse_dust_temperature, parse_grid,
    };
    use crate::model::physical::tests::two_layer_model;
    use tempfile::TempDir;

    fn config(root: &TempDir) -> DriverConfig {
        DriverConfig {
            scratch_root: root.path().join("scratch"),
            source: "hltau".to_string(),
            rank: 3,
            ..DriverConfig::default()
        }
    }

    #[test]
    fn staging_directory_is_named_by_source_and_rank_and_removed_on_drop() {
        let root = TempDir::new().expect("tempdir should create");
        let staging = StagingDir::create(&config(&root)).expect("staging should create");
        let path = staging.path().to_path_buf();

        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .expect("utf-8 name");
        assert!(name.starts_with("temp_hltau_3"));
        assert!(path.starts_with(root.path().join("scratch")));

        drop(staging);
        assert!(!path.exists());
    }

    #[test]
    fn staged_model_files_read_back() {
        let root = TempDir::new().expect("tempdir should create");
        let staging = StagingDir::create(&config(&root)).expect("staging should create");
        let model = two_layer_model();

        let staged = staging
            .stage_model(&model, &ControlOptions::thermal(1000, true))
            .expect("model should stage");
        for artifact in &staged {
            assert!(staging.path().join(&artifact.relative_path).is_file());
        }
        assert!(staging.path().join("dustkappa_disk.inp").is_file());

        let grid = parse_grid(&staging.read_artifact("amr_grid.inp").expect("grid readable"))
            .expect("grid parses");
        assert_eq!(grid.cell_counts(), model.grid.cell_counts());
        assert_eq!(grid.x_edges, model.grid.x_edges);

        let temperatures = parse_dust_temperature(
            &staging
                .read_artifact(DUST_TEMPERATURE_FILE)
                .expect("temperature readable"),
            model.dims(),
        )
        .expect("temperature parses");
        assert_eq!(temperatures.len(), 2);
    }

    #[test]
    fn restaging_without_the_envelope_drops_one_species() {
        let root = TempDir::new().expect("tempdir should create");
        let staging = StagingDir::create(&config(&root)).expect("staging should create");
        let mut model = two_layer_model();
        staging
            .stage_model(&model, &ControlOptions::default())
            .expect("model should stage");

        model
            .with_envelope_excluded(|disk_only| staging.stage_fields(disk_only))
            .expect("fields should restage");
        let density = staging.read_artifact(DUST_DENSITY_FILE).expect("density readable");
        assert_eq!(density.lines().nth(2), Some("1"));
        let index = staging.read_artifact(OPACITY_INDEX_FILE).expect("index readable");
        assert_eq!(index.lines().nth(1), Some("1"));

        staging.stage_fields(&model).expect("fields should restage");
        let density = staging.read_artifact(DUST_DENSITY_FILE).expect("density readable");
        assert_eq!(density.lines().nth(2), Some("2"));
    }

    #[test]
    fn discard_removes_files_but_keeps_the_directory() {
        let root = TempDir::new().expect("tempdir should create");
        let staging = StagingDir::create(&config(&root)).expect("staging should create");
        staging.write_artifact("a.inp", "1\n").expect("write");
        staging.write_artifact("b.out", "2\n").expect("write");

        staging.discard_artifacts().expect("discard");
        assert!(staging.path().is_dir());
        assert_eq!(std::fs::read_dir(staging.path()).expect("list").count(), 0);

        let path = staging.path().to_path_buf();
        staging.close().expect("close");
        assert!(!path.exists());
    }
}

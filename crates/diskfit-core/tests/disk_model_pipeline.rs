use diskfit_core::common::DriverConfig;
use diskfit_core::domain::DiskfitError;
use diskfit_core::engine::StagingDir;
use diskfit_core::formats::{
    CoordinateSystem, DUST_DENSITY_FILE, DustOpacityTable, Grid, StellarSource, parse_grid,
    render_grid,
};
use diskfit_core::model::{DustLayer, EnvelopeType, PhysicalModel};
use diskfit_core::observables::{UvSamples, Visibilities, splice_cutoff, splice_visibilities};
use ndarray::Array3;
use tempfile::TempDir;

fn visibilities(samples: &UvSamples, real: Vec<f64>) -> Visibilities {
    let imag = vec![0.0; real.len()];
    Visibilities {
        u: samples.u.clone(),
        v: samples.v.clone(),
        real,
        imag,
        weights: vec![1.0; samples.len()],
    }
}

#[test]
fn splice_takes_short_baselines_from_the_low_resolution_image() {
    let cutoff = splice_cutoff();
    let samples = UvSamples::new(
        vec![0.1 * cutoff, 3.0 * cutoff, 0.0, 10.0 * cutoff],
        vec![0.0, 0.0, 0.5 * cutoff, 0.0],
        2.3e11,
    )
    .expect("samples");
    let high = visibilities(&samples, vec![1.0, 2.0, 3.0, 4.0]);
    let short = UvSamples::new(vec![0.1 * cutoff, 0.0], vec![0.0, 0.5 * cutoff], 2.3e11)
        .expect("short samples");
    let low = visibilities(&short, vec![10.0, 30.0]);

    let spliced = splice_visibilities(&samples, &high, &low, cutoff).expect("splice");
    assert_eq!(spliced.real, vec![10.0, 2.0, 30.0, 4.0]);
    assert_eq!(spliced.u, samples.u);

    let error = splice_visibilities(&samples, &high, &high, cutoff)
        .expect_err("low covers the wrong samples");
    assert_eq!(error.placeholder(), "OBS.VISIBILITY_MISMATCH");
}

#[test]
fn spherical_grid_round_trips_through_amr_grid() {
    let grid = Grid::regular(
        vec![1.0e13, 2.5e13, 4.0e13, 1.0e14],
        vec![0.0, 0.5, 1.5],
        vec![0.0, 6.25],
        CoordinateSystem::Spherical,
    );

    let parsed = parse_grid(&render_grid(&grid).expect("grid renders")).expect("grid parses");
    assert_eq!(parsed, grid);
    assert_eq!(parsed.cell_counts(), [3, 2, 1]);
}

fn envelope_model() -> PhysicalModel {
    let layer = |name: &str, density: f64| DustLayer {
        density: Array3::from_elem((3, 2, 1), density),
        temperature: Some(Array3::from_elem((3, 2, 1), 20.0)),
        opacity: DustOpacityTable {
            name: name.to_string(),
            wavelength: vec![1.0, 1000.0],
            absorption: vec![100.0, 1.0],
            scattering: None,
            asymmetry: None,
        },
    };
    PhysicalModel {
        stars: vec![StellarSource::blackbody(6.96e10, 1.99e33, 4000.0)],
        grid: Grid::regular(
            vec![1.0e13, 2.5e13, 4.0e13, 1.0e14],
            vec![0.0, 0.5, 1.5],
            vec![0.0, 6.25],
            CoordinateSystem::Spherical,
        ),
        wavelengths: vec![1.0, 1000.0],
        layers: vec![layer("disk", 1.0e-16), layer("envelope", 1.0e-20)],
        envelope_type: EnvelopeType::Ulrich,
    }
}

#[test]
fn disk_only_staging_restores_the_envelope_after_a_failure() {
    let root = TempDir::new().expect("tempdir should be created");
    let config = DriverConfig {
        scratch_root: root.path().to_path_buf(),
        ..DriverConfig::default()
    };
    let staging = StagingDir::create(&config).expect("staging should create");
    let mut model = envelope_model();
    staging
        .stage_model(&model, &Default::default())
        .expect("model should stage");

    let result: Result<(), DiskfitError> = model.with_envelope_excluded(|disk_only| {
        staging.stage_fields(disk_only)?;
        assert_eq!(disk_only.layers.len(), 1);
        Err(DiskfitError::computation("RUN.ENGINE_FAILURE", "image stage failed"))
    });
    assert!(result.is_err());
    assert_eq!(model, envelope_model());

    staging.stage_fields(&model).expect("full model restages");
    let density = staging
        .read_artifact(DUST_DENSITY_FILE)
        .expect("density readable");
    assert_eq!(density.lines().nth(2), Some("2"));
}

#[cfg(unix)]
mod subprocess {
    use diskfit_core::common::DriverConfig;
    use diskfit_core::common::constants::{JANSKY, PC};
    use diskfit_core::engine::{DiskModelOutcome, DiskModelRun, SimulationDriver, TIMES_FILE};
    use diskfit_core::model::{
        FreeParameters, JsonDustLibrary, ParameterSchema, ParameterSpec, ParameterValue,
        PowerLawFields,
    };
    use diskfit_core::observables::{
        Beam, DirectFourierTransform, ExtinctionLaw, ImageRequest, ObservableRequests,
        SpectrumRequest,
    };
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    const CATALOG: &str = r#"{
      "populations": [
        { "a_max": 1.0e-4, "p": 3.5, "wavelength": [0.1, 1.0, 1000.0], "absorption": [1.0e4, 1.0e3, 1.0] },
        { "a_max": 1.0, "p": 3.5, "wavelength": [0.1, 1.0, 1000.0], "absorption": [1.0e2, 1.0e2, 10.0] }
      ]
    }"#;

    /// Answers each stage with a deterministic output file.
    const FAKE_ENGINE: &str = r#"case "$1" in
  mctherm)
    awk 'NR <= 3 { print; next } { print 25 }' dust_density.inp > dust_temperature.dat ;;
  image)
    awk -v n="$3" 'BEGIN { print 1; print n, n; print 1; print 1e13, 1e13; print 2.2;
      for (i = 0; i < n * n; i++) print (i == n * n / 2 + n / 2 ? 1e-10 : 0) }' > image.out ;;
  spectrum)
    awk 'NR == 1 { print 1; print $1; print ""; next } { print $1, 1e-20 }' \
      camera_wavelength_micron.inp > spectrum.out ;;
esac"#;

    struct Setup {
        root: TempDir,
        schema: ParameterSchema,
        free: FreeParameters,
    }

    impl Setup {
        fn new() -> Self {
            let root = TempDir::new().expect("tempdir should be created");
            fs::create_dir_all(root.path().join("dust")).expect("dust dir");
            fs::write(root.path().join("dust/pollack_new.json"), CATALOG).expect("catalog");
            fs::create_dir_all(root.path().join("scratch")).expect("scratch dir");
            fs::create_dir_all(root.path().join("work")).expect("work dir");

            let number = |value| ParameterSpec::fixed(ParameterValue::Number(value));
            let mut schema = ParameterSchema::new();
            schema
                .insert("logM_disk", number(-4.0))
                .insert("logR_in", number(-1.0))
                .insert("logR_disk", number(2.0))
                .insert("logh_0", number(-1.0))
                .insert("logR_env", number(3.0))
                .insert("beta", number(1.2))
                .insert("gamma", ParameterSpec::free());
            let free = FreeParameters::from([("gamma".to_string(), 1.0)]);
            Self { root, schema, free }
        }

        fn path(&self, name: &str) -> PathBuf {
            self.root.path().join(name)
        }

        fn driver(&self, script: &str, time_limit_seconds: u64) -> SimulationDriver {
            let engine = self.path("engine.sh");
            fs::write(&engine, format!("#!/bin/sh\n{}\n", script)).expect("script");
            fs::set_permissions(&engine, fs::Permissions::from_mode(0o755)).expect("chmod");
            let config = DriverConfig {
                engine_executable: engine,
                scratch_root: self.path("scratch"),
                time_limit_seconds,
                poll_interval_ms: 10,
                ..DriverConfig::default()
            };
            SimulationDriver::with_subprocess_engine(config, self.path("work"))
        }

        fn run(&self, driver: &SimulationDriver, requests: &ObservableRequests) -> DiskModelOutcome {
            let library = JsonDustLibrary::new(self.path("dust"));
            let run = DiskModelRun {
                schema: &self.schema,
                free: &self.free,
                requests,
                dust: &library,
                fields: &PowerLawFields,
                interpolator: &DirectFourierTransform,
                no_radiative_transfer: false,
            };
            driver.run_disk_model(&run).expect("model run")
        }
    }

    fn is_empty(dir: &Path) -> bool {
        fs::read_dir(dir).expect("dir lists").next().is_none()
    }

    #[test]
    fn timed_out_thermal_stage_yields_no_result() {
        let setup = Setup::new();
        let driver = setup.driver("exec sleep 30", 1);

        let outcome = setup.run(&driver, &ObservableRequests::default());

        assert_eq!(outcome, DiskModelOutcome::NoResult);
        let times = fs::read_to_string(setup.path("work").join(TIMES_FILE)).expect("times");
        assert_eq!(times.lines().count(), 1);
        let elapsed: f64 = times.trim().parse().expect("elapsed seconds");
        assert!(elapsed >= 1.0);
        assert!(is_empty(&setup.path("scratch")));
    }

    #[test]
    fn completed_run_produces_images_and_spectrum() {
        let setup = Setup::new();
        let driver = setup.driver(FAKE_ENGINE, 60);
        let requests = ObservableRequests {
            images: vec![ImageRequest {
                name: "K".to_string(),
                wavelength_um: 2.2,
                npix: 16,
                pixel_size_arcsec: 0.1,
                beam: Beam {
                    major_arcsec: 0.2,
                    minor_arcsec: 0.2,
                    position_angle_deg: 0.0,
                },
            }],
            spectrum: Some(SpectrumRequest {
                wavelengths_um: vec![1.0, 10.0, 1000.0],
                extinction: ExtinctionLaw::default(),
            }),
            ..ObservableRequests::default()
        };

        let DiskModelOutcome::Observed { model, observables } = setup.run(&driver, &requests)
        else {
            panic!("run should produce observables");
        };

        let temperatures = model.temperatures().expect("temperatures");
        assert!(temperatures.iter().all(|t| t.iter().all(|value| *value == 25.0)));

        let image = &observables.images["K"];
        assert_eq!(image.flux.dim(), (16, 16));
        let point_flux = 1.0e-10 * 1.0e26 / (140.0 * PC).powi(2) / JANSKY;
        assert!((image.flux.sum() / point_flux - 1.0).abs() < 1e-9);

        let sed = &observables.spectra["SED"];
        assert_eq!(sed.wavelength_um, vec![1.0, 10.0, 1000.0]);
        let expected = (1.0e-20 / (JANSKY * 140.0 * 140.0)).log10();
        assert!(sed.flux.iter().all(|flux| (flux - expected).abs() < 1e-9));

        assert!(is_empty(&setup.path("scratch")));
    }
}

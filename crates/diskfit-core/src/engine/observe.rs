//! Ray-traced images, visibilities and spectra of a model with known
//! dust temperatures.

use super::driver::SimulationDriver;
use super::process::{EngineInvocation, EngineOutcome, ImageGeometry};
use super::staging::StagingDir;
use super::tier::Tier;
use crate::domain::{DiskfitError, DiskfitResult, EngineStage};
use crate::formats::{
    CAMERA_WAVELENGTH_FILE, CONTROL_FILE, ControlOptions, EngineImage, parse_image,
    parse_spectrum, render_control, render_wavelength_grid,
};
use crate::model::{DiskParameters, EnvelopeType, PhysicalModel};
use crate::model::assembler::logspace;
use crate::observables::{
    HIGH_RESOLUTION_PIXEL_ARCSEC, ImageRequest, LOW_RESOLUTION_PIXEL_ARCSEC, ModelImage,
    ModelSpectrum, ObservableRequests, ObservableSet, RunMode, SPLICE_NPIX, SpectrumRequest,
    UvSamples, Visibilities, VisibilityInterpolator, VisibilityRequest, convolve_with_beam,
    low_resolution_mask, redden_spectrum, residual_visibilities, splice_cutoff,
    splice_visibilities,
};
use tracing::info;

/// Camera wavelengths of plot-mode SEDs, in microns.
const PLOT_SED_POINTS: usize = 50;
const PLOT_SED_MIN_MICRON: f64 = 0.1;
const PLOT_SED_MAX_MICRON: f64 = 1.0e4;
const DISK_ONLY_NPIX: usize = 2048;
const DISK_ONLY_PIXEL_ARCSEC: f64 = 0.05;
const SED_NAME: &str = "SED";

/// Viewing geometry shared by every rendering of one model.
#[derive(Debug, Clone, Copy)]
struct Camera {
    inclination_deg: f64,
    position_angle_deg: f64,
    distance_pc: f64,
    offset_arcsec: [f64; 2],
}

impl Camera {
    fn from_params(params: &DiskParameters) -> Self {
        Self {
            inclination_deg: params.inclination,
            position_angle_deg: params.position_angle,
            distance_pc: params.dpc,
            offset_arcsec: [-params.x0, -params.y0],
        }
    }

    fn geometry(&self, npix: usize, pixel_size_arcsec: f64, wavelength_um: f64) -> ImageGeometry {
        ImageGeometry {
            npix,
            pixel_size_arcsec,
            wavelength_um,
            inclination_deg: self.inclination_deg,
            position_angle_deg: self.position_angle_deg,
            distance_pc: self.distance_pc,
        }
    }
}

impl SimulationDriver {
    fn ray_tracing_control(&self) -> ControlOptions {
        ControlOptions::ray_tracing(self.config().nphot_scat, self.config().mc_scat_maxtauabs)
    }

    fn run_ray_tracing(
        &self,
        staging: &StagingDir,
        invocation: &EngineInvocation,
        control: &ControlOptions,
    ) -> DiskfitResult<String> {
        staging.write_artifact(CONTROL_FILE, &render_control(control))?;
        staging.clear_outputs()?;
        match self.run_engine(staging, invocation, None)? {
            EngineOutcome::Completed { .. } => staging
                .read_artifact(invocation.stage.output_artifact())
                .map_err(|error| error.with_context(self.failure_context(staging))),
            EngineOutcome::TimedOut { elapsed } => Err(DiskfitError::computation(
                "RUN.ENGINE_TIMEOUT",
                format!(
                    "{} stage reported a timeout after {:.1} s",
                    invocation.stage,
                    elapsed.as_secs_f64()
                ),
            )
            .with_context(self.failure_context(staging))),
            EngineOutcome::Failed(failure) => {
                Err(self.engine_failure(staging, invocation.stage, &failure))
            }
        }
    }

    /// Ray-traces one single-wavelength image and converts it to Jy/pixel.
    pub fn render_image(
        &self,
        staging: &StagingDir,
        tier: &Tier,
        geometry: &ImageGeometry,
    ) -> DiskfitResult<ModelImage> {
        let invocation = EngineInvocation::image(geometry, tier.processes);
        let source = self.run_ray_tracing(staging, &invocation, &self.ray_tracing_control())?;
        let image = self.attach_context(staging, parse_image(&source))?;
        let cube = image.to_janskys_per_pixel(geometry.distance_pc);
        Ok(ModelImage {
            wavelength_um: geometry.wavelength_um,
            pixel_size_arcsec: geometry.pixel_size_arcsec,
            flux: EngineImage::plane(&cube, 0),
        })
    }

    fn render_spectrum(
        &self,
        staging: &StagingDir,
        tier: &Tier,
        camera: &Camera,
        wavelengths_um: &[f64],
    ) -> DiskfitResult<(Vec<f64>, Vec<f64>)> {
        staging.write_artifact(CAMERA_WAVELENGTH_FILE, &render_wavelength_grid(wavelengths_um))?;
        let mut control = self.ray_tracing_control();
        control.nphot_spec = Some(self.config().nphot_spec);
        control.camera_scatsrc_allfreq = Some(1);

        let invocation = EngineInvocation::spectrum(
            camera.inclination_deg,
            camera.position_angle_deg,
            tier.processes,
        );
        let spectrum = parse_spectrum(&self.run_ray_tracing(staging, &invocation, &control)?)?;
        let flux = spectrum.to_janskys(camera.distance_pc);
        Ok((spectrum.wavelength, flux))
    }

    #[allow(clippy::too_many_arguments)]
    fn observe_visibilities(
        &self,
        staging: &StagingDir,
        model: &mut PhysicalModel,
        tier: &Tier,
        params: &DiskParameters,
        camera: &Camera,
        request: &VisibilityRequest,
        requests: &ObservableRequests,
        interpolator: &dyn VisibilityInterpolator,
        products: &mut ObservableSet,
    ) -> DiskfitResult<()> {
        let name = &request.name;
        let wavelength = request.wavelength_um;

        let mut image = self.render_image(
            staging,
            tier,
            &camera.geometry(request.npix, request.pixel_size_arcsec, wavelength),
        )?;
        image.flux *= params.flux_calibration(request.calibration_index);
        products.visibilities.insert(
            name.clone(),
            interpolator.interpolate(&request.samples, &image, camera.offset_arcsec)?,
        );

        let high = self.render_image(
            staging,
            tier,
            &camera.geometry(SPLICE_NPIX, HIGH_RESOLUTION_PIXEL_ARCSEC, wavelength),
        )?;
        let low = self.render_image(
            staging,
            tier,
            &camera.geometry(SPLICE_NPIX, LOW_RESOLUTION_PIXEL_ARCSEC, wavelength),
        )?;

        let sample_set = match (requests.mode, &request.plot) {
            (RunMode::Plot, Some(plot)) => plot.samples_grid.clone(),
            _ => request.samples.clone(),
        };
        let cutoff = splice_cutoff();
        let high_vis = interpolator.interpolate(&sample_set, &high, camera.offset_arcsec)?;
        let short = sample_set.select(&low_resolution_mask(&sample_set, cutoff));
        let low_vis = interpolator.interpolate(&short, &low, camera.offset_arcsec)?;
        let test = splice_visibilities(&sample_set, &high_vis, &low_vis, cutoff)?;
        products.visibilities.insert(format!("{}high", name), high_vis);
        products.visibilities.insert(format!("{}low", name), low_vis);

        if let (RunMode::Plot, Some(plot)) = (requests.mode, &request.plot) {
            let full = interpolator.interpolate(&sample_set, &image, camera.offset_arcsec)?;
            products
                .visibilities
                .insert(format!("{}diff", name), residual_visibilities(&test, &full)?);
            products.visibilities.insert(format!("{}_high", name), full);
            products.visibilities.insert(
                format!("{}_2d", name),
                interpolator.interpolate(&plot.samples_2d, &image, camera.offset_arcsec)?,
            );

            let mirrored = Camera {
                position_angle_deg: -camera.position_angle_deg,
                ..*camera
            };
            let continuum = self.render_image(
                staging,
                tier,
                &mirrored.geometry(plot.image_npix, plot.image_pixel_size_arcsec, wavelength),
            )?;
            image = ModelImage {
                flux: convolve_with_beam(&continuum.flux, &plot.beam, plot.image_pixel_size_arcsec)
                    .map_err(|error| DiskfitError::input_validation("OBS.BEAM", error.to_string()))?,
                ..continuum
            };

            if requests.disk_visibilities
                && model.has_envelope()
                && model.envelope_type == EnvelopeType::Ulrich
            {
                let disk_only = self.disk_only_visibilities(
                    staging,
                    model,
                    tier,
                    camera,
                    &sample_set,
                    wavelength,
                    interpolator,
                )?;
                products.visibilities.insert(format!("{}_disk", name), disk_only);
            }
        }

        products.visibilities.insert(format!("{}test", name), test);
        products.images.insert(name.clone(), image);
        Ok(())
    }

    /// Visibilities of the model without its envelope. The staged fields are
    /// rewritten for the disk-only model and restored afterwards, and the
    /// model itself is restored even when rendering fails.
    #[allow(clippy::too_many_arguments)]
    fn disk_only_visibilities(
        &self,
        staging: &StagingDir,
        model: &mut PhysicalModel,
        tier: &Tier,
        camera: &Camera,
        samples: &UvSamples,
        wavelength_um: f64,
        interpolator: &dyn VisibilityInterpolator,
    ) -> DiskfitResult<Visibilities> {
        let result = model.with_envelope_excluded(|disk_only| {
            staging.stage_fields(disk_only)?;
            let image = self.render_image(
                staging,
                tier,
                &camera.geometry(DISK_ONLY_NPIX, DISK_ONLY_PIXEL_ARCSEC, wavelength_um),
            )?;
            interpolator.interpolate(samples, &image, camera.offset_arcsec)
        });
        staging.stage_fields(model)?;
        result
    }

    fn observe_image(
        &self,
        staging: &StagingDir,
        tier: &Tier,
        camera: &Camera,
        request: &ImageRequest,
    ) -> DiskfitResult<ModelImage> {
        let image = self.render_image(
            staging,
            tier,
            &camera.geometry(request.npix, request.pixel_size_arcsec, request.wavelength_um),
        )?;
        let flux = convolve_with_beam(&image.flux, &request.beam, request.pixel_size_arcsec)
            .map_err(|error| DiskfitError::input_validation("OBS.BEAM", error.to_string()))?;
        Ok(ModelImage { flux, ..image })
    }

    fn observe_spectrum(
        &self,
        staging: &StagingDir,
        tier: &Tier,
        params: &DiskParameters,
        camera: &Camera,
        request: &SpectrumRequest,
        mode: RunMode,
    ) -> DiskfitResult<ModelSpectrum> {
        let wavelengths = match mode {
            RunMode::Fit => request.wavelengths_um.clone(),
            RunMode::Plot => logspace(PLOT_SED_MIN_MICRON, PLOT_SED_MAX_MICRON, PLOT_SED_POINTS),
        };
        let (wavelength_um, flux) = self.render_spectrum(staging, tier, camera, &wavelengths)?;
        let spectrum_mode = mode.spectrum_mode();
        let flux = redden_spectrum(
            &wavelength_um,
            &flux,
            params.a_k,
            &request.extinction,
            spectrum_mode,
        )?;
        Ok(ModelSpectrum {
            wavelength_um,
            flux,
            mode: spectrum_mode,
        })
    }

    /// Renders every requested product from a model whose temperatures are
    /// known and whose inputs are staged in `staging`. Errors carry the
    /// staging directory and the parameter snapshot.
    pub fn run_observables(
        &self,
        staging: &StagingDir,
        model: &mut PhysicalModel,
        tier: &Tier,
        params: &DiskParameters,
        requests: &ObservableRequests,
        interpolator: &dyn VisibilityInterpolator,
    ) -> DiskfitResult<ObservableSet> {
        let products = self.observables(staging, model, tier, params, requests, interpolator);
        self.attach_context(staging, products)
    }

    fn observables(
        &self,
        staging: &StagingDir,
        model: &mut PhysicalModel,
        tier: &Tier,
        params: &DiskParameters,
        requests: &ObservableRequests,
        interpolator: &dyn VisibilityInterpolator,
    ) -> DiskfitResult<ObservableSet> {
        if model.temperatures().is_none() {
            return Err(DiskfitError::internal(
                "INTERNAL.MISSING_TEMPERATURE",
                "observables need dust temperatures from a completed thermal stage",
            ));
        }
        let camera = Camera::from_params(params);
        let mut products = ObservableSet::default();

        for request in &requests.visibilities {
            info!(dataset = %request.name, "rendering visibilities");
            self.observe_visibilities(
                staging,
                model,
                tier,
                params,
                &camera,
                request,
                requests,
                interpolator,
                &mut products,
            )?;
        }

        for request in &requests.images {
            info!(dataset = %request.name, "rendering image");
            let image = self.observe_image(staging, tier, &camera, request)?;
            products.images.insert(request.name.clone(), image);
        }

        if let Some(request) = &requests.spectrum {
            info!(stage = %EngineStage::Spectrum, "rendering spectrum");
            let spectrum =
                self.observe_spectrum(staging, tier, params, &camera, request, requests.mode)?;
            products.spectra.insert(SED_NAME.to_string(), spectrum);
        }

        Ok(products)
    }
}

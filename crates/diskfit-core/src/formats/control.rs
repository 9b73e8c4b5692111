use super::format_fixed;
use serde::{Deserialize, Serialize};

/// Engine switches for `radmc3d.inp`.
///
/// `None` means "leave the engine default"; nothing is written for it.
/// Cross-option consistency is left to the engine.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ControlOptions {
    pub incl_dust: Option<i32>,
    pub incl_lines: Option<i32>,
    pub incl_freefree: Option<i32>,
    pub nphot_therm: Option<u64>,
    pub nphot_scat: Option<u64>,
    pub nphot_spec: Option<u64>,
    pub iseed: Option<i32>,
    pub ifast: Option<i32>,
    pub enthres: Option<f64>,
    pub itempdecoup: Option<i32>,
    pub istar_sphere: Option<i32>,
    pub ntemp: Option<i32>,
    pub temp0: Option<f64>,
    pub temp1: Option<f64>,
    pub scattering_mode_max: Option<i32>,
    pub rto_style: Option<i32>,
    pub camera_tracemode: Option<i32>,
    pub camera_nrrefine: Option<i32>,
    pub camera_refine_criterion: Option<f64>,
    pub camera_incl_stars: Option<i32>,
    pub camera_starsphere_nrpix: Option<i32>,
    pub camera_spher_cavity_relres: Option<f64>,
    pub camera_localobs_projection: Option<i32>,
    pub camera_min_dangle: Option<f64>,
    pub camera_max_dangle: Option<f64>,
    pub camera_min_dr: Option<f64>,
    pub camera_diagnostics_subpix: Option<i32>,
    pub camera_secondorder: Option<i32>,
    pub camera_interpol_jnu: Option<i32>,
    pub mc_weighted_photons: Option<i32>,
    pub optimized_motion: Option<i32>,
    pub lines_mode: Option<i32>,
    pub lines_maxdoppler: Option<f64>,
    pub lines_partition_ntempint: Option<i32>,
    pub lines_partition_temp0: Option<f64>,
    pub lines_partition_temp1: Option<f64>,
    pub lines_show_pictograms: Option<i32>,
    pub tgas_eq_tdust: Option<i32>,
    pub subbox_nx: Option<i32>,
    pub subbox_ny: Option<i32>,
    pub subbox_nz: Option<i32>,
    pub subbox_x0: Option<i64>,
    pub subbox_x1: Option<i64>,
    pub subbox_y0: Option<i64>,
    pub subbox_y1: Option<i64>,
    pub subbox_z0: Option<i64>,
    pub subbox_z1: Option<i64>,
    pub modified_random_walk: Option<i32>,
    pub mrw_gamma: Option<f64>,
    pub mrw_tauthres: Option<f64>,
    pub mrw_count_trigger: Option<i32>,
    pub mc_scat_maxtauabs: Option<f64>,
    pub camera_scatsrc_allfreq: Option<i32>,
}

impl ControlOptions {
    /// Switches used for the thermal Monte-Carlo run, with the modified random
    /// walk tuned for optically thick disk midplanes.
    pub fn thermal(nphot_therm: u64, modified_random_walk: bool) -> Self {
        let mut options = Self {
            nphot_therm: Some(nphot_therm),
            ..Self::default()
        };
        if modified_random_walk {
            options.modified_random_walk = Some(1);
            options.mrw_gamma = Some(2.0);
            options.mrw_tauthres = Some(10.0);
            options.mrw_count_trigger = Some(100);
        }
        options
    }

    /// Switches for image and SED ray tracing.
    pub fn ray_tracing(nphot_scat: u64, mc_scat_maxtauabs: f64) -> Self {
        Self {
            nphot_scat: Some(nphot_scat),
            nphot_spec: Some(nphot_scat),
            mc_scat_maxtauabs: Some(mc_scat_maxtauabs),
            ..Self::default()
        }
    }
}

enum ControlValue {
    Int(Option<i64>),
    Float(Option<f64>),
}

pub fn render_control(options: &ControlOptions) -> String {
    let int = |value: Option<i32>| ControlValue::Int(value.map(i64::from));
    let count = |value: Option<u64>| ControlValue::Int(value.map(|v| v as i64));
    let float = ControlValue::Float;

    let entries: [(&str, ControlValue); 53] = [
        ("incl_dust", int(options.incl_dust)),
        ("incl_lines", int(options.incl_lines)),
        ("incl_freefree", int(options.incl_freefree)),
        ("nphot_therm", count(options.nphot_therm)),
        ("nphot_scat", count(options.nphot_scat)),
        ("nphot_spec", count(options.nphot_spec)),
        ("iseed", int(options.iseed)),
        ("ifast", int(options.ifast)),
        ("enthres", float(options.enthres)),
        ("itempdecoup", int(options.itempdecoup)),
        ("istar_sphere", int(options.istar_sphere)),
        ("ntemp", int(options.ntemp)),
        ("temp0", float(options.temp0)),
        ("temp1", float(options.temp1)),
        ("scattering_mode_max", int(options.scattering_mode_max)),
        ("rto_style", int(options.rto_style)),
        ("camera_tracemode", int(options.camera_tracemode)),
        ("camera_nrrefine", int(options.camera_nrrefine)),
        ("camera_refine_criterion", float(options.camera_refine_criterion)),
        ("camera_incl_stars", int(options.camera_incl_stars)),
        ("camera_starsphere_nrpix", int(options.camera_starsphere_nrpix)),
        ("camera_spher_cavity_relres", float(options.camera_spher_cavity_relres)),
        ("camera_localobs_projection", int(options.camera_localobs_projection)),
        ("camera_min_dangle", float(options.camera_min_dangle)),
        ("camera_max_dangle", float(options.camera_max_dangle)),
        ("camera_min_dr", float(options.camera_min_dr)),
        ("camera_diagnostics_subpix", int(options.camera_diagnostics_subpix)),
        ("camera_secondorder", int(options.camera_secondorder)),
        ("camera_interpol_jnu", int(options.camera_interpol_jnu)),
        ("mc_weighted_photons", int(options.mc_weighted_photons)),
        ("optimized_motion", int(options.optimized_motion)),
        ("lines_mode", int(options.lines_mode)),
        ("lines_maxdoppler", float(options.lines_maxdoppler)),
        ("lines_partition_ntempint", int(options.lines_partition_ntempint)),
        ("lines_partition_temp0", float(options.lines_partition_temp0)),
        ("lines_partition_temp1", float(options.lines_partition_temp1)),
        ("lines_show_pictograms", int(options.lines_show_pictograms)),
        ("tgas_eq_tdust", int(options.tgas_eq_tdust)),
        ("subbox_nx", int(options.subbox_nx)),
        ("subbox_ny", int(options.subbox_ny)),
        ("subbox_nz", int(options.subbox_nz)),
        ("subbox_x0", ControlValue::Int(options.subbox_x0)),
        ("subbox_x1", ControlValue::Int(options.subbox_x1)),
        ("subbox_y0", ControlValue::Int(options.subbox_y0)),
        ("subbox_y1", ControlValue::Int(options.subbox_y1)),
        ("subbox_z0", ControlValue::Int(options.subbox_z0)),
        ("subbox_z1", ControlValue::Int(options.subbox_z1)),
        ("modified_random_walk", int(options.modified_random_walk)),
        ("mrw_gamma", float(options.mrw_gamma)),
        ("mrw_tauthres", float(options.mrw_tauthres)),
        ("mrw_count_trigger", int(options.mrw_count_trigger)),
        ("mc_scat_maxtauabs", float(options.mc_scat_maxtauabs)),
        ("camera_scatsrc_allfreq", int(options.camera_scatsrc_allfreq)),
    ];

    let mut out = String::new();
    for (key, value) in entries {
        let rendered = match value {
            ControlValue::Int(Some(value)) => value.to_string(),
            ControlValue::Float(Some(value)) => format_fixed(value),
            ControlValue::Int(None) | ControlValue::Float(None) => continue,
        };
        out.push_str(key);
        out.push_str(" = ");
        out.push_str(&rendered);
        out.push('\n');
    }
    out
}

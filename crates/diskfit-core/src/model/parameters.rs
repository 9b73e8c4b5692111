//! Parameter schema resolution and the typed disk-parameter record.
//!
//! A schema entry is either fixed (a literal, or an alias naming another
//! schema key) or free (its value comes from the fitter). Keys spelled
//! `log<name>` hold base-10 logarithms and resolve to `<name>`.

use super::disk::{DiskType, EnvelopeType};
use crate::domain::{DiskfitError, DiskfitResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter, Write as _};

const LOG_PREFIX: &str = "log";

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Number(f64),
    Text(String),
}

impl Display for ParameterValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(value) => write!(f, "{}", value),
            Self::Text(value) => f.write_str(value),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ParameterSpec {
    pub fixed: bool,
    #[serde(default)]
    pub value: Option<ParameterValue>,
}

impl ParameterSpec {
    pub fn fixed(value: ParameterValue) -> Self {
        Self {
            fixed: true,
            value: Some(value),
        }
    }

    pub fn free() -> Self {
        Self {
            fixed: false,
            value: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct ParameterSchema {
    entries: BTreeMap<String, ParameterSpec>,
}

impl ParameterSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, spec: ParameterSpec) -> &mut Self {
        self.entries.insert(key.into(), spec);
        self
    }

    pub fn get(&self, key: &str) -> Option<&ParameterSpec> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keys the fitter must supply.
    pub fn free_keys(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(|(_, spec)| !spec.fixed)
            .map(|(key, _)| key.as_str())
    }

    /// Whether a fixed value names another schema key and so acts as an alias.
    fn alias_target<'a>(&self, value: &'a ParameterValue) -> Option<&'a str> {
        match value {
            ParameterValue::Text(target) if self.entries.contains_key(target) => {
                Some(target.as_str())
            }
            _ => None,
        }
    }
}

/// Values supplied by the fitter for the free schema keys.
pub type FreeParameters = BTreeMap<String, f64>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedParameters {
    values: BTreeMap<String, ParameterValue>,
}

impl ResolvedParameters {
    pub fn get(&self, key: &str) -> Option<&ParameterValue> {
        self.values.get(key)
    }

    pub fn number(&self, key: &str) -> DiskfitResult<Option<f64>> {
        match self.values.get(key) {
            None => Ok(None),
            Some(ParameterValue::Number(value)) => Ok(Some(*value)),
            Some(ParameterValue::Text(text)) => Err(DiskfitError::input_validation(
                "INPUT.PARAMETER_TYPE",
                format!("parameter '{}' must be numeric, got '{}'", key, text),
            )),
        }
    }

    pub fn text(&self, key: &str) -> Option<String> {
        self.values.get(key).map(ToString::to_string)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParameterValue)> {
        self.values.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

fn missing(key: &str, detail: &str) -> DiskfitError {
    DiskfitError::input_validation(
        "INPUT.PARAMETER_MISSING",
        format!("parameter '{}' {}", key, detail),
    )
}

fn free_value(free: &FreeParameters, key: &str) -> DiskfitResult<ParameterValue> {
    free.get(key)
        .copied()
        .map(ParameterValue::Number)
        .ok_or_else(|| missing(key, "is free but the fitter supplied no value"))
}

fn resolve_one(
    schema: &ParameterSchema,
    free: &FreeParameters,
    key: &str,
    spec: &ParameterSpec,
) -> DiskfitResult<ParameterValue> {
    if !spec.fixed {
        return free_value(free, key);
    }

    let value = spec
        .value
        .as_ref()
        .ok_or_else(|| missing(key, "is fixed but has no value"))?;
    let Some(target) = schema.alias_target(value) else {
        return Ok(value.clone());
    };

    let Some(target_spec) = schema.get(target) else {
        return Err(missing(target, "is referenced but not declared"));
    };
    if !target_spec.fixed {
        return free_value(free, target);
    }
    let target_value = target_spec
        .value
        .as_ref()
        .ok_or_else(|| missing(target, "is fixed but has no value"))?;
    if let Some(next) = schema.alias_target(target_value) {
        return Err(DiskfitError::input_validation(
            "INPUT.PARAMETER_ALIAS_DEPTH",
            format!(
                "parameter '{}' aliases '{}', which aliases '{}'; only one level of indirection is allowed",
                key, target, next
            ),
        ));
    }
    Ok(target_value.clone())
}

/// Resolves every schema key to a concrete value, decoding `log` keys.
///
/// Only schema keys appear in the result; fitter values for undeclared keys
/// are ignored.
pub fn resolve_parameters(
    schema: &ParameterSchema,
    free: &FreeParameters,
) -> DiskfitResult<ResolvedParameters> {
    let mut values = BTreeMap::new();
    for (key, spec) in &schema.entries {
        let value = resolve_one(schema, free, key, spec)?;
        match key.strip_prefix(LOG_PREFIX) {
            Some(linear_key) if !linear_key.is_empty() => {
                let ParameterValue::Number(exponent) = value else {
                    return Err(DiskfitError::input_validation(
                        "INPUT.PARAMETER_TYPE",
                        format!("logarithmic parameter '{}' must be numeric", key),
                    ));
                };
                if linear_fields().any(|field| field == linear_key) {
                    return Err(DiskfitError::input_validation(
                        "INPUT.PARAMETER_SCALE",
                        format!("parameter '{}' is linear and has no '{}' form", linear_key, key),
                    ));
                }
                values.insert(
                    linear_key.to_string(),
                    ParameterValue::Number(10f64.powf(exponent)),
                );
            }
            _ => {
                values.insert(key.clone(), value);
            }
        }
    }
    Ok(ResolvedParameters { values })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterScale {
    Linear,
    Logarithmic,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum FieldDefault {
    Required,
    Value(f64),
    SameAs(&'static str),
}

/// Numeric disk parameters with their conventional scale and default.
const NUMERIC_FIELDS: &[(&str, ParameterScale, FieldDefault)] = {
    use FieldDefault::{Required, SameAs, Value};
    use ParameterScale::{Linear, Logarithmic};
    &[
        ("M_star", Logarithmic, Value(1.0)),
        ("L_star", Logarithmic, Value(1.0)),
        ("T_star", Logarithmic, Value(4000.0)),
        ("M_disk", Logarithmic, Required),
        ("R_in", Logarithmic, Required),
        ("R_disk", Logarithmic, Required),
        ("h_0", Logarithmic, Required),
        ("beta", Linear, Required),
        ("gamma", Linear, Required),
        ("beta_large", Linear, SameAs("beta")),
        ("f_M_large", Linear, Value(1.0)),
        ("f_h_large", Linear, Value(1.0)),
        ("R_cav", Logarithmic, SameAs("R_in")),
        ("delta_cav", Logarithmic, Value(1.0)),
        ("R_gap1", Linear, SameAs("R_in")),
        ("w_gap1", Linear, Value(0.0)),
        ("delta_gap1", Logarithmic, Value(1.0)),
        ("R_gap2", Linear, SameAs("R_in")),
        ("w_gap2", Linear, Value(0.0)),
        ("delta_gap2", Logarithmic, Value(1.0)),
        ("R_gap3", Linear, SameAs("R_in")),
        ("w_gap3", Linear, Value(0.0)),
        ("delta_gap3", Logarithmic, Value(1.0)),
        ("a_min", Logarithmic, Value(0.05)),
        ("a_max", Logarithmic, Value(1.0)),
        ("p", Linear, Value(3.5)),
        ("na", Linear, Value(100.0)),
        ("alpha_settle", Logarithmic, Value(3.0e-4)),
        ("M_env", Logarithmic, Value(0.0)),
        ("R_env", Logarithmic, Required),
        ("ksi", Linear, Value(1.0)),
        ("f_cav", Linear, Value(0.5)),
        ("i", Linear, Value(0.0)),
        ("pa", Linear, Value(0.0)),
        ("x0", Linear, Value(0.0)),
        ("y0", Linear, Value(0.0)),
        ("dpc", Linear, Value(140.0)),
        ("Ak", Linear, Value(0.0)),
    ]
};

const DEFAULT_DUST_FILE: &str = "pollack_new.hdf5";

pub fn parameter_scale(name: &str) -> Option<ParameterScale> {
    NUMERIC_FIELDS
        .iter()
        .find(|(field, _, _)| *field == name)
        .map(|(_, scale, _)| *scale)
}

fn linear_fields() -> impl Iterator<Item = &'static str> {
    NUMERIC_FIELDS
        .iter()
        .filter(|(_, scale, _)| *scale == ParameterScale::Linear)
        .map(|(field, _, _)| *field)
}

/// A depleted annulus in the disk, in AU.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GapWindow {
    pub inner: f64,
    pub outer: f64,
    /// Density multiplier inside the window.
    pub delta: f64,
}

impl GapWindow {
    pub fn from_center(center: f64, width: f64, delta: f64) -> Self {
        Self {
            inner: center - width / 2.0,
            outer: center + width / 2.0,
            delta,
        }
    }
}

/// Fully resolved model parameters. Masses in solar masses, radii in AU,
/// angles in degrees, distance in pc, `a_min`/`a_max` in microns.
#[derive(Debug, Clone, PartialEq)]
pub struct DiskParameters {
    pub disk_type: DiskType,
    pub envelope_type: EnvelopeType,
    pub dust_file: String,
    pub envelope_dust: String,
    pub m_star: f64,
    pub l_star: f64,
    pub t_star: f64,
    pub m_disk: f64,
    pub r_in: f64,
    pub r_disk: f64,
    /// Scale height at 1 AU; rescaled by `R_disk^beta` for tapered disks.
    pub h_0: f64,
    pub beta: f64,
    pub gamma: f64,
    pub beta_large: f64,
    pub alpha: f64,
    pub alpha_large: f64,
    pub f_m_large: f64,
    pub f_h_large: f64,
    pub cavity: GapWindow,
    pub gaps: [GapWindow; 3],
    pub a_min: f64,
    pub a_max: f64,
    pub p: f64,
    pub na: usize,
    pub alpha_settle: f64,
    pub m_env: f64,
    pub r_env: f64,
    pub ksi: f64,
    pub f_cav: f64,
    pub inclination: f64,
    pub position_angle: f64,
    pub x0: f64,
    pub y0: f64,
    pub dpc: f64,
    pub a_k: f64,
    /// `flux_unc<n>` values, indexed from dataset 1.
    pub flux_calibration: BTreeMap<usize, f64>,
}

impl DiskParameters {
    pub fn from_resolved(resolved: &ResolvedParameters) -> DiskfitResult<Self> {
        let mut numbers = BTreeMap::new();
        for (field, _, default) in NUMERIC_FIELDS {
            let value = match (resolved.number(field)?, default) {
                (Some(value), _) => value,
                (None, FieldDefault::Value(value)) => *value,
                (None, FieldDefault::SameAs(other)) => match resolved.number(other)? {
                    Some(value) => value,
                    None => return Err(missing(other, "is required")),
                },
                (None, FieldDefault::Required) => return Err(missing(field, "is required")),
            };
            if !value.is_finite() {
                return Err(DiskfitError::input_validation(
                    "INPUT.PARAMETER_VALUE",
                    format!("parameter '{}' must be finite, got {}", field, value),
                ));
            }
            numbers.insert(*field, value);
        }
        let n = |field: &str| numbers.get(field).copied().unwrap_or_default();

        let disk_type = match resolved.text("disk_type") {
            Some(tag) => tag.parse::<DiskType>()?,
            None => DiskType::Plain,
        };
        let envelope_type = match resolved.text("envelope_type") {
            Some(tag) => tag.parse::<EnvelopeType>()?,
            None => EnvelopeType::None,
        };

        let mut h_0 = n("h_0");
        if disk_type.is_tapered() {
            h_0 *= n("R_disk").powf(n("beta"));
        }

        let gap = |index: usize| {
            GapWindow::from_center(
                n(&format!("R_gap{}", index)),
                n(&format!("w_gap{}", index)),
                n(&format!("delta_gap{}", index)),
            )
        };

        let mut flux_calibration = BTreeMap::new();
        for (key, _) in resolved.iter() {
            if let Some(index) = key
                .strip_prefix("flux_unc")
                .and_then(|suffix| suffix.parse::<usize>().ok())
                && let Some(value) = resolved.number(key)?
            {
                flux_calibration.insert(index, value);
            }
        }

        let na = n("na");
        if na < 1.0 || na.fract() != 0.0 {
            return Err(DiskfitError::input_validation(
                "INPUT.PARAMETER_VALUE",
                format!("parameter 'na' must be a positive integer, got {}", na),
            ));
        }

        Ok(Self {
            disk_type,
            envelope_type,
            dust_file: resolved
                .text("dust_file")
                .unwrap_or_else(|| DEFAULT_DUST_FILE.to_string()),
            envelope_dust: resolved
                .text("envelope_dust")
                .unwrap_or_else(|| DEFAULT_DUST_FILE.to_string()),
            m_star: n("M_star"),
            l_star: n("L_star"),
            t_star: n("T_star"),
            m_disk: n("M_disk"),
            r_in: n("R_in"),
            r_disk: n("R_disk"),
            h_0,
            beta: n("beta"),
            gamma: n("gamma"),
            beta_large: n("beta_large"),
            alpha: n("gamma") + n("beta"),
            alpha_large: n("gamma") + n("beta_large"),
            f_m_large: n("f_M_large"),
            f_h_large: n("f_h_large"),
            cavity: GapWindow {
                inner: n("R_in"),
                outer: n("R_cav"),
                delta: n("delta_cav"),
            },
            gaps: [gap(1), gap(2), gap(3)],
            a_min: n("a_min"),
            a_max: n("a_max"),
            p: n("p"),
            na: na as usize,
            alpha_settle: n("alpha_settle"),
            m_env: n("M_env"),
            r_env: n("R_env"),
            ksi: n("ksi"),
            f_cav: n("f_cav"),
            inclination: n("i"),
            position_angle: n("pa"),
            x0: n("x0"),
            y0: n("y0"),
            dpc: n("dpc"),
            a_k: n("Ak"),
            flux_calibration,
        })
    }

    /// Flux-calibration factor of visibility dataset `index` (1-based).
    pub fn flux_calibration(&self, index: usize) -> f64 {
        self.flux_calibration.get(&index).copied().unwrap_or(1.0)
    }
}

/// The resolved parameters plus derived quantities, as archived in
/// `params.txt`.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterRecord {
    entries: BTreeMap<String, String>,
}

impl ParameterRecord {
    pub fn new(resolved: &ResolvedParameters, disk: &DiskParameters) -> Self {
        let mut entries: BTreeMap<String, String> = resolved
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();

        let mut derived = vec![
            ("h_0".to_string(), disk.h_0),
            ("alpha".to_string(), disk.alpha),
            ("alpha_large".to_string(), disk.alpha_large),
        ];
        for (index, gap) in disk.gaps.iter().enumerate() {
            derived.push((format!("R_in_gap{}", index + 1), gap.inner));
            derived.push((format!("R_out_gap{}", index + 1), gap.outer));
        }
        for (key, value) in derived {
            entries.insert(key, value.to_string());
        }

        Self { entries }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for (key, value) in &self.entries {
            let _ = writeln!(out, "{} = {}", key, value);
        }
        out
    }
}

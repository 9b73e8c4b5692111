use crate::common::DriverConfig;
use crate::model::DiskParameters;
use std::fmt::{Display, Formatter};

pub const STANDARD_ANGULAR_WALLS: usize = 101;
pub const HYPERION_ANGULAR_WALLS: usize = 201;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Engine {
    Radmc3d,
    Hyperion,
}

impl Engine {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Radmc3d => "radmc3d",
            Self::Hyperion => "hyperion",
        }
    }
}

impl Display for Engine {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Regime {
    Standard,
    /// Optically thick or compact models that need more compute.
    HighMass,
}

impl Regime {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::HighMass => "high_mass",
        }
    }
}

/// Engine choice and resolution for one model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tier {
    pub regime: Regime,
    pub engine: Engine,
    /// Polar cell walls of the spherical grid.
    pub angular_walls: usize,
    /// Engine threads.
    pub processes: usize,
}

/// The model quantities tier selection looks at. Masses in solar masses,
/// radii in AU.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegimeParameters {
    pub m_disk: f64,
    pub r_disk: f64,
    pub m_env: f64,
    pub r_env: f64,
    pub h_0: f64,
}

impl From<&DiskParameters> for RegimeParameters {
    fn from(params: &DiskParameters) -> Self {
        Self {
            m_disk: params.m_disk,
            r_disk: params.r_disk,
            m_env: params.m_env,
            r_env: params.r_env,
            h_0: params.h_0,
        }
    }
}

impl RegimeParameters {
    pub fn regime(&self) -> Regime {
        let high_mass = self.m_disk > 0.001
            || self.r_disk < 50.0
            || self.m_env > 0.001
            || self.r_env < 500.0
            || self.h_0 > 0.25;
        if high_mass {
            Regime::HighMass
        } else {
            Regime::Standard
        }
    }
}

pub fn select_tier(params: &RegimeParameters, config: &DriverConfig) -> Tier {
    let cap = |processes: usize| match config.max_threads {
        Some(limit) => processes.min(limit),
        None => processes,
    };

    match params.regime() {
        Regime::HighMass if config.with_hyperion => Tier {
            regime: Regime::HighMass,
            engine: Engine::Hyperion,
            angular_walls: HYPERION_ANGULAR_WALLS,
            processes: cap(config.ncpus_highmass),
        },
        Regime::HighMass => Tier {
            regime: Regime::HighMass,
            engine: Engine::Radmc3d,
            angular_walls: STANDARD_ANGULAR_WALLS,
            processes: cap(config.ncpus_highmass),
        },
        Regime::Standard => Tier {
            regime: Regime::Standard,
            engine: Engine::Radmc3d,
            angular_walls: STANDARD_ANGULAR_WALLS,
            processes: cap(config.ncpus),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::{Engine, Regime, RegimeParameters, select_tier};
    use crate::common::DriverConfig;

    fn light() -> RegimeParameters {
        RegimeParameters {
            m_disk: 1.0e-4,
            r_disk: 100.0,
            m_env: 1.0e-4,
            r_env: 1000.0,
            h_0: 0.1,
        }
    }

    fn config() -> DriverConfig {
        DriverConfig {
            ncpus: 2,
            ncpus_highmass: 8,
            ..DriverConfig::default()
        }
    }

    #[test]
    fn light_extended_model_is_standard() {
        let tier = select_tier(&light(), &config());
        assert_eq!(tier.regime, Regime::Standard);
        assert_eq!(tier.engine, Engine::Radmc3d);
        assert_eq!(tier.angular_walls, 101);
        assert_eq!(tier.processes, 2);
    }

    #[test]
    fn each_threshold_alone_selects_high_mass() {
        let cases = [
            RegimeParameters { m_disk: 0.0011, ..light() },
            RegimeParameters { r_disk: 49.0, ..light() },
            RegimeParameters { m_env: 0.0011, ..light() },
            RegimeParameters { r_env: 499.0, ..light() },
            RegimeParameters { h_0: 0.26, ..light() },
        ];
        for params in cases {
            let tier = select_tier(&params, &config());
            assert_eq!(tier.regime, Regime::HighMass, "{:?}", params);
            assert_eq!(tier.processes, 8);
            assert_eq!(tier.angular_walls, 101);
        }
    }

    #[test]
    fn thresholds_are_strict() {
        let params = RegimeParameters {
            m_disk: 0.001,
            r_disk: 50.0,
            m_env: 0.001,
            r_env: 500.0,
            h_0: 0.25,
        };
        assert_eq!(select_tier(&params, &config()).regime, Regime::Standard);
    }

    #[test]
    fn hyperion_flag_switches_high_mass_engine() {
        let config = DriverConfig {
            with_hyperion: true,
            ..config()
        };
        let heavy = RegimeParameters { m_disk: 0.01, ..light() };

        let tier = select_tier(&heavy, &config);
        assert_eq!(tier.engine, Engine::Hyperion);
        assert_eq!(tier.angular_walls, 201);
        assert_eq!(select_tier(&light(), &config).engine, Engine::Radmc3d);
    }

    #[test]
    fn thread_cap_limits_processes() {
        let config = DriverConfig {
            max_threads: Some(4),
            ..config()
        };
        let heavy = RegimeParameters { h_0: 0.5, ..light() };
        assert_eq!(select_tier(&heavy, &config).processes, 4);
        assert_eq!(select_tier(&light(), &config).processes, 2);
    }

    #[test]
    fn selection_is_repeatable() {
        let params = RegimeParameters { r_env: 300.0, ..light() };
        assert_eq!(select_tier(&params, &config()), select_tier(&params, &config()));
    }
}

//! The external radiative-transfer engine as a bounded subprocess.

use crate::common::DriverConfig;
use crate::domain::{DiskfitError, DiskfitResult, EngineStage};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Camera setup for one ray-traced image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageGeometry {
    pub npix: usize,
    pub pixel_size_arcsec: f64,
    pub wavelength_um: f64,
    pub inclination_deg: f64,
    pub position_angle_deg: f64,
    pub distance_pc: f64,
}

impl ImageGeometry {
    /// Side length of the image in AU at the source distance.
    pub fn size_au(&self) -> f64 {
        self.npix as f64 * self.pixel_size_arcsec * self.distance_pc
    }
}

/// Engine command line: the stage keyword followed by its arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineInvocation {
    pub stage: EngineStage,
    pub arguments: Vec<String>,
}

impl EngineInvocation {
    pub fn thermal(threads: usize) -> Self {
        Self {
            stage: EngineStage::Thermal,
            arguments: vec!["setthreads".to_string(), threads.to_string()],
        }
    }

    pub fn image(geometry: &ImageGeometry, threads: usize) -> Self {
        let arguments = [
            ("npix", geometry.npix.to_string()),
            ("sizeau", geometry.size_au().to_string()),
            ("lambda", geometry.wavelength_um.to_string()),
            ("incl", geometry.inclination_deg.to_string()),
            ("posang", geometry.position_angle_deg.to_string()),
            ("setthreads", threads.to_string()),
        ];
        Self {
            stage: EngineStage::Image,
            arguments: arguments
                .into_iter()
                .flat_map(|(key, value)| [key.to_string(), value])
                .collect(),
        }
    }

    /// Spectrum at the wavelengths of `camera_wavelength_micron.inp`.
    pub fn spectrum(inclination_deg: f64, position_angle_deg: f64, threads: usize) -> Self {
        Self {
            stage: EngineStage::Spectrum,
            arguments: vec![
                "loadlambda".to_string(),
                "incl".to_string(),
                inclination_deg.to_string(),
                "posang".to_string(),
                position_angle_deg.to_string(),
                "setthreads".to_string(),
                threads.to_string(),
            ],
        }
    }

    pub fn command_line(&self) -> Vec<String> {
        std::iter::once(self.stage.as_str().to_string())
            .chain(self.arguments.iter().cloned())
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Worth exactly one retry with identical inputs.
    Transient,
    Fatal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineFailure {
    pub kind: FailureKind,
    pub exit_code: Option<i32>,
    pub signal: Option<i32>,
}

impl EngineFailure {
    pub fn describe(&self) -> String {
        match (self.exit_code, self.signal) {
            (Some(code), _) => format!("engine exited with status {}", code),
            (None, Some(signal)) => format!("engine was terminated by signal {}", signal),
            (None, None) => "engine terminated abnormally".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineOutcome {
    Completed { elapsed: Duration },
    TimedOut { elapsed: Duration },
    Failed(EngineFailure),
}

/// Runs one engine invocation inside `working_dir`.
///
/// Expected terminations are reported as an [`EngineOutcome`]; only a
/// failure to start or supervise the process is an error.
pub trait EngineProcess {
    fn run(
        &self,
        working_dir: &Path,
        invocation: &EngineInvocation,
        time_limit: Option<Duration>,
    ) -> DiskfitResult<EngineOutcome>;
}

#[derive(Debug, Clone)]
pub struct SubprocessEngine {
    executable: PathBuf,
    nice: Option<i32>,
    transient_exit_codes: Vec<i32>,
    poll_interval: Duration,
}

impl SubprocessEngine {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            nice: None,
            transient_exit_codes: Vec::new(),
            poll_interval: Duration::from_millis(100),
        }
    }

    pub fn from_config(config: &DriverConfig) -> Self {
        Self {
            executable: config.engine_executable.clone(),
            nice: config.nice,
            transient_exit_codes: config.transient_exit_codes.clone(),
            poll_interval: config.poll_interval(),
        }
    }

    pub fn with_transient_exit_codes(mut self, codes: Vec<i32>) -> Self {
        self.transient_exit_codes = codes;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    fn command(&self, working_dir: &Path, invocation: &EngineInvocation) -> Command {
        let mut command = match self.nice {
            Some(hint) => {
                let mut command = Command::new("nice");
                command.arg("-n").arg(hint.to_string()).arg(&self.executable);
                command
            }
            None => Command::new(&self.executable),
        };
        command
            .args(invocation.command_line())
            .current_dir(working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        command
    }

    fn classify(&self, status: ExitStatus) -> EngineFailure {
        let exit_code = status.code();
        let signal = termination_signal(status);
        let transient = match exit_code {
            Some(code) => self.transient_exit_codes.contains(&code),
            None => signal.is_some(),
        };
        EngineFailure {
            kind: if transient {
                FailureKind::Transient
            } else {
                FailureKind::Fatal
            },
            exit_code,
            signal,
        }
    }

    fn supervise(
        &self,
        child: &mut Child,
        started: Instant,
        time_limit: Option<Duration>,
    ) -> std::io::Result<EngineOutcome> {
        loop {
            if let Some(status) = child.try_wait()? {
                let elapsed = started.elapsed();
                if status.success() {
                    return Ok(EngineOutcome::Completed { elapsed });
                }
                return Ok(EngineOutcome::Failed(self.classify(status)));
            }
            if let Some(limit) = time_limit
                && started.elapsed() >= limit
            {
                if let Err(error) = child.kill() {
                    warn!(%error, "failed to kill timed-out engine");
                }
                child.wait()?;
                return Ok(EngineOutcome::TimedOut {
                    elapsed: started.elapsed(),
                });
            }
            thread::sleep(self.poll_interval);
        }
    }
}

#[cfg(unix)]
fn termination_signal(status: ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn termination_signal(_status: ExitStatus) -> Option<i32> {
    None
}

impl EngineProcess for SubprocessEngine {
    fn run(
        &self,
        working_dir: &Path,
        invocation: &EngineInvocation,
        time_limit: Option<Duration>,
    ) -> DiskfitResult<EngineOutcome> {
        debug!(
            executable = %self.executable.display(),
            command = ?invocation.command_line(),
            "starting engine"
        );
        let started = Instant::now();
        let mut child = self
            .command(working_dir, invocation)
            .spawn()
            .map_err(|error| {
                DiskfitError::io_system(
                    "IO.ENGINE_SPAWN",
                    format!(
                        "failed to start engine '{}': {}",
                        self.executable.display(),
                        error
                    ),
                )
            })?;

        self.supervise(&mut child, started, time_limit)
            .map_err(|error| {
                DiskfitError::io_system(
                    "IO.ENGINE_WAIT",
                    format!("failed to supervise engine process: {}", error),
                )
            })
    }
}

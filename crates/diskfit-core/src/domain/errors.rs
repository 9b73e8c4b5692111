use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub type DiskfitResult<T> = Result<T, DiskfitError>;
pub type FormatResult<T> = DiskfitResult<T>;
pub type ComputeResult<T> = DiskfitResult<T>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiskfitErrorCategory {
    Success,
    InputValidationError,
    FormatError,
    IoSystemError,
    ComputationError,
    InternalError,
}

impl DiskfitErrorCategory {
    pub const fn exit_code(self) -> i32 {
        match self {
            Self::Success => 0,
            Self::InputValidationError => 2,
            Self::IoSystemError => 3,
            Self::ComputationError => 4,
            Self::InternalError => 5,
            Self::FormatError => 6,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "Success",
            Self::InputValidationError => "InputValidationError",
            Self::FormatError => "FormatError",
            Self::IoSystemError => "IoSystemError",
            Self::ComputationError => "ComputationError",
            Self::InternalError => "InternalError",
        }
    }

    pub const fn is_fatal(self) -> bool {
        !matches!(self, Self::Success)
    }
}

/// Where a fatal engine failure happened, so the run can be reproduced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureContext {
    pub staging_dir: PathBuf,
    pub parameter_snapshot: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskfitError {
    category: DiskfitErrorCategory,
    placeholder: &'static str,
    message: String,
    context: Option<Box<FailureContext>>,
}

impl DiskfitError {
    pub fn new(
        category: DiskfitErrorCategory,
        placeholder: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            placeholder,
            message: message.into(),
            context: None,
        }
    }

    pub fn input_validation(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(
            DiskfitErrorCategory::InputValidationError,
            placeholder,
            message,
        )
    }

    pub fn format(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(DiskfitErrorCategory::FormatError, placeholder, message)
    }

    pub fn io_system(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(DiskfitErrorCategory::IoSystemError, placeholder, message)
    }

    pub fn computation(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(DiskfitErrorCategory::ComputationError, placeholder, message)
    }

    pub fn internal(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(DiskfitErrorCategory::InternalError, placeholder, message)
    }

    pub fn missing_spectrum(star_index: usize) -> Self {
        Self::format(
            "FORMAT.MISSING_SPECTRUM",
            format!(
                "star {} has neither an effective temperature nor a flux spectrum",
                star_index
            ),
        )
    }

    pub fn unsupported_grid_style(style: &str) -> Self {
        Self::format(
            "FORMAT.UNSUPPORTED_GRID_STYLE",
            format!("{} grids are not implemented; only regular grids can be written", style),
        )
    }

    pub fn format_mismatch(message: impl Into<String>) -> Self {
        Self::format("FORMAT.MISMATCH", message)
    }

    pub fn with_context(mut self, context: FailureContext) -> Self {
        self.context = Some(Box::new(context));
        self
    }

    pub const fn category(&self) -> DiskfitErrorCategory {
        self.category
    }

    pub const fn placeholder(&self) -> &'static str {
        self.placeholder
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn context(&self) -> Option<&FailureContext> {
        self.context.as_deref()
    }

    pub const fn exit_code(&self) -> i32 {
        self.category.exit_code()
    }

    pub fn diagnostic_line(&self) -> String {
        let severity = if self.category.is_fatal() {
            "ERROR"
        } else {
            "INFO"
        };
        match &self.context {
            Some(context) => format!(
                "{}: [{}] {} (staging dir '{}')",
                severity,
                self.placeholder,
                self.message,
                context.staging_dir.display()
            ),
            None => format!("{}: [{}] {}", severity, self.placeholder, self.message),
        }
    }

    pub fn fatal_exit_line(&self) -> Option<String> {
        self.category
            .is_fatal()
            .then(|| format!("FATAL EXIT CODE: {}", self.exit_code()))
    }
}

impl Display for DiskfitError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} [{}] {}",
            self.category.as_str(),
            self.placeholder,
            self.message
        )
    }
}

impl Error for DiskfitError {}

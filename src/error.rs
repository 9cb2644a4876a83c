use std::fmt::Display;
use std::io;

use strum_macros::{AsRefStr, Display as StrumDisplay};
use thiserror::Error;

use crate::ioctl::PortRequest;
use crate::FpgaError::{Exception, InvalidParam};

/// Type alias for `Result<T, FpgaError>`.
pub type FpgaResult<T> = Result<T, FpgaError>;

/// An error that occurred while enumerating, opening or driving an FPGA port.
#[derive(Debug, Error)]
pub enum FpgaError {
    #[error("Invalid parameter: {message}")]
    InvalidParam { message: String },
    #[error("Exception: {message}")]
    Exception { message: String },
    #[error("Port {name} not found")]
    NotFound { name: String },
    #[error("Port {name} found but still in use")]
    Busy { name: String },
    #[error("Out of memory: {cause}")]
    NoMemory { cause: io::Error },
    #[error("Not supported: {message}")]
    NotSupported { message: String },
    #[error("IoError: {cause}")]
    IoError { cause: io::Error },
    #[error("PermissionDenied: {cause}")]
    PermissionDenied { cause: io::Error },
    #[error("Failed to parse given message {message}: {cause}")]
    ParseError { message: String, cause: String },
}

/// Result codes of the C accelerator API, kept for callers that report
/// outcomes in that vocabulary.
#[derive(AsRefStr, StrumDisplay, Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ResultCode {
    #[strum(serialize = "FPGA_OK")]
    Ok,
    #[strum(serialize = "FPGA_INVALID_PARAM")]
    InvalidParam,
    #[strum(serialize = "FPGA_BUSY")]
    Busy,
    #[strum(serialize = "FPGA_EXCEPTION")]
    Exception,
    #[strum(serialize = "FPGA_NOT_FOUND")]
    NotFound,
    #[strum(serialize = "FPGA_NO_MEMORY")]
    NoMemory,
    #[strum(serialize = "FPGA_NOT_SUPPORTED")]
    NotSupported,
    #[strum(serialize = "FPGA_NO_DRIVER")]
    NoDriver,
    #[strum(serialize = "FPGA_NO_DAEMON")]
    NoDaemon,
    #[strum(serialize = "FPGA_NO_ACCESS")]
    NoAccess,
    #[strum(serialize = "FPGA_RECONF_ERROR")]
    ReconfError,
}

impl ResultCode {
    /// Collapses a result into its code, `Ok` for success.
    pub fn of<T>(result: &FpgaResult<T>) -> ResultCode {
        match result {
            Ok(_) => ResultCode::Ok,
            Err(e) => e.code(),
        }
    }
}

impl FpgaError {
    pub(crate) fn invalid_param<S: ToString>(message: S) -> FpgaError {
        InvalidParam {
            message: message.to_string(),
        }
    }

    pub(crate) fn exception<S: ToString>(message: S) -> FpgaError {
        Exception {
            message: message.to_string(),
        }
    }

    pub(crate) fn not_found<D: Display>(name: D) -> FpgaError {
        FpgaError::NotFound {
            name: name.to_string(),
        }
    }

    pub(crate) fn busy<D: Display>(name: D) -> FpgaError {
        FpgaError::Busy {
            name: name.to_string(),
        }
    }

    pub(crate) fn not_supported<S: ToString>(message: S) -> FpgaError {
        FpgaError::NotSupported {
            message: message.to_string(),
        }
    }

    pub(crate) fn parse_error<S: ToString, C: ToString>(message: S, cause: C) -> FpgaError {
        FpgaError::ParseError {
            message: message.to_string(),
            cause: cause.to_string(),
        }
    }

    /// Maps a failed ioctl to an error. The driver reports malformed
    /// arguments with `EINVAL` or `EFAULT`; anything else is unexpected.
    pub(crate) fn from_ioctl(request: PortRequest, cause: io::Error) -> FpgaError {
        match cause.raw_os_error() {
            Some(libc::EINVAL) | Some(libc::EFAULT) => {
                Self::invalid_param(format!("{request} rejected its argument: {cause}"))
            }
            _ => Self::exception(format!("{request} failed: {cause}")),
        }
    }

    /// Returns the C API result code describing this error.
    pub fn code(&self) -> ResultCode {
        match self {
            FpgaError::InvalidParam { .. } => ResultCode::InvalidParam,
            FpgaError::Exception { .. } => ResultCode::Exception,
            FpgaError::NotFound { .. } => ResultCode::NotFound,
            FpgaError::Busy { .. } => ResultCode::Busy,
            FpgaError::NoMemory { .. } => ResultCode::NoMemory,
            FpgaError::NotSupported { .. } => ResultCode::NotSupported,
            FpgaError::PermissionDenied { .. } => ResultCode::NoAccess,
            FpgaError::IoError { .. } | FpgaError::ParseError { .. } => ResultCode::Exception,
        }
    }
}

impl From<io::Error> for FpgaError {
    fn from(e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::PermissionDenied {
            Self::PermissionDenied { cause: e }
        } else {
            Self::IoError { cause: e }
        }
    }
}

use std::fmt;

use thiserror::Error;

use crate::{Quality, Status};

#[derive(Debug, Error)]
pub enum DpfpError {
    #[error("Fail on init: {0}")]
    InitError(InitCause),
    #[error("No fingerprint reader found")]
    NoDevice,
    #[error("Can not open reader `{name}`. Native status: {status}")]
    OpenError { name: String, status: Status },
    #[error("Reader name contains an interior NUL byte")]
    InvalidName,
    #[error("Capture failed. Native status: {0}")]
    CaptureError(Status),
    #[error("Capture was not successful. Quality: {0}")]
    PoorCapture(Quality),
    #[error("Invalid parameter {0}")]
    InvalidParameter(Operation),
    #[error("Template extraction failed {context}. Native status: {status}")]
    Extraction { context: Operation, status: Status },
    #[error("An enrollment is already in progress")]
    AlreadyInProgress,
    #[error("Enrollment has not been started")]
    NotStarted,
    #[error("Enrollment needs more views before a template can be created")]
    NotReady,
    #[error("Size probe {0} reported more data without a size")]
    EmptyProbe(Operation),
    #[error("Buffer of {allocated} bytes still too small {context}, {required} bytes requested")]
    BufferTooSmall {
        context: Operation,
        allocated: usize,
        required: usize,
    },
    #[error("WSQ compression failed {context}. Native status: {status}")]
    Compression { context: Operation, status: Status },
    #[error("Invalid image: {0}")]
    InvalidImage(String),
    #[error("Invalid template: {0}")]
    InvalidTemplate(String),
    #[error("Can not convert from `{0}`")]
    TryFromError(i64),
    #[error("Failed {context}. Native status: {status}")]
    Native { context: Operation, status: Status },
    #[error("Failed to save image: {0}")]
    SaveImage(#[from] image::ImageError),
}

impl DpfpError {
    /// Maps a failed native status to the most specific error for the operation.
    pub(crate) fn from_status(context: Operation, status: Status) -> Self {
        match status {
            Status::InvalidParameter => DpfpError::InvalidParameter(context),
            Status::EnrollmentInProgress => DpfpError::AlreadyInProgress,
            Status::EnrollmentNotStarted => DpfpError::NotStarted,
            Status::EnrollmentNotReady => DpfpError::NotReady,
            status => match context {
                Operation::Init => DpfpError::InitError(InitCause::Status(status)),
                Operation::Capture | Operation::StreamImage => DpfpError::CaptureError(status),
                Operation::CreateFromRaw | Operation::CreateFromFid | Operation::Convert => {
                    DpfpError::Extraction { context, status }
                }
                Operation::StartCompression
                | Operation::ConfigureCompression
                | Operation::Compress
                | Operation::Expand
                | Operation::ProcessedData
                | Operation::FinishCompression => DpfpError::Compression { context, status },
                _ => DpfpError::Native { context, status },
            },
        }
    }

    /// Native status carried by the error, if any.
    pub fn status(&self) -> Option<Status> {
        match self {
            DpfpError::InitError(InitCause::Status(status))
            | DpfpError::OpenError { status, .. }
            | DpfpError::CaptureError(status)
            | DpfpError::Extraction { status, .. }
            | DpfpError::Compression { status, .. }
            | DpfpError::Native { status, .. } => Some(*status),
            DpfpError::InvalidParameter(_) => Some(Status::InvalidParameter),
            DpfpError::AlreadyInProgress => Some(Status::EnrollmentInProgress),
            DpfpError::NotStarted => Some(Status::EnrollmentNotStarted),
            DpfpError::NotReady => Some(Status::EnrollmentNotReady),
            _ => None,
        }
    }
}

/// Checks a native status, mapping anything but success to an error.
pub(crate) fn check(code: libc::c_int, context: Operation) -> crate::Result<()> {
    match Status::from(code) {
        Status::Success => Ok(()),
        status => Err(DpfpError::from_status(context, status)),
    }
}

impl From<dpfp_sys::LoadError> for DpfpError {
    fn from(error: dpfp_sys::LoadError) -> Self {
        DpfpError::InitError(InitCause::Load(error))
    }
}

#[derive(Debug, Error)]
pub enum InitCause {
    #[error("{0}")]
    Load(#[from] dpfp_sys::LoadError),
    #[error("native status {0}")]
    Status(Status),
}

/// Vendor call an error originated from.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Operation {
    Init,
    Version,
    QueryDevices,
    Open,
    Close,
    Status,
    Capabilities,
    GetParameter,
    SetParameter,
    Capture,
    StartStream,
    StopStream,
    StreamImage,
    CreateFromRaw,
    CreateFromFid,
    Convert,
    Compare,
    Identify,
    StartEnrollment,
    AddToEnrollment,
    CreateEnrollment,
    FinishEnrollment,
    StartCompression,
    ConfigureCompression,
    Compress,
    Expand,
    ProcessedData,
    FinishCompression,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        let string = match self {
            Operation::Init => "on init",
            Operation::Version => "on querying version",
            Operation::QueryDevices => "on querying devices",
            Operation::Open => "on opening reader",
            Operation::Close => "on closing reader",
            Operation::Status => "on reading device status",
            Operation::Capabilities => "on reading device capabilities",
            Operation::GetParameter => "on reading reader parameter",
            Operation::SetParameter => "on writing reader parameter",
            Operation::Capture => "on capture",
            Operation::StartStream => "on starting stream",
            Operation::StopStream => "on stopping stream",
            Operation::StreamImage => "on fetching stream image",
            Operation::CreateFromRaw => "on creating template from raw image",
            Operation::CreateFromFid => "on creating template from FID",
            Operation::Convert => "on converting template",
            Operation::Compare => "on compare",
            Operation::Identify => "on identify",
            Operation::StartEnrollment => "on starting enrollment",
            Operation::AddToEnrollment => "on adding to enrollment",
            Operation::CreateEnrollment => "on creating enrollment template",
            Operation::FinishEnrollment => "on finishing enrollment",
            Operation::StartCompression => "on starting compression",
            Operation::ConfigureCompression => "on configuring compression",
            Operation::Compress => "on compress",
            Operation::Expand => "on expand",
            Operation::ProcessedData => "on fetching processed data",
            Operation::FinishCompression => "on finishing compression",
        };

        write!(f, "{}", string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enrollment_codes_map_to_dedicated_variants() {
        let err = DpfpError::from_status(Operation::CreateEnrollment, Status::EnrollmentNotReady);
        assert!(matches!(err, DpfpError::NotReady));

        let err = DpfpError::from_status(Operation::AddToEnrollment, Status::EnrollmentNotStarted);
        assert!(matches!(err, DpfpError::NotStarted));
    }

    #[test]
    fn capture_failures_keep_native_status() {
        let err = DpfpError::from_status(Operation::Capture, Status::DeviceFailure);
        assert!(matches!(err, DpfpError::CaptureError(Status::DeviceFailure)));
        assert_eq!(err.status(), Some(Status::DeviceFailure));
    }

    #[test]
    fn check_passes_success_through() {
        assert!(check(0, Operation::Compare).is_ok());
        let err = check(dpfp_sys::DPFJ_E_FAILURE, Operation::Compare).unwrap_err();
        assert!(matches!(
            err,
            DpfpError::Native {
                context: Operation::Compare,
                status: Status::Failure
            }
        ));
    }
}

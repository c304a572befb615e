use std::fmt;
use dpfp_sys as sys;
use libc::c_int;

/// Status code returned by every vendor call, decoded into the cases callers act on.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Status {
    Success,
    /// Output buffer missing or too small; the size out-parameter holds the required size.
    MoreData,
    InvalidParameter,
    EnrollmentInProgress,
    EnrollmentNotStarted,
    /// Not enough views were added to create an enrollment template.
    EnrollmentNotReady,
    Failure,
    NotImplemented,
    NoData,
    InvalidDevice,
    DeviceBusy,
    DeviceFailure,
    CompressionNotStarted,
    InvalidWsqParameter,
    WsqFailure,
    WsqLibNotFound,
    Other(i32),
}

impl Status {
    pub fn is_success(self) -> bool {
        self == Status::Success
    }

    /// Native value of the status. Codes shared by both libraries report the matching
    /// library's value.
    pub fn code(self) -> i32 {
        match self {
            Status::Success => sys::DPFJ_SUCCESS,
            Status::MoreData => sys::DPFJ_E_MORE_DATA,
            Status::InvalidParameter => sys::DPFJ_E_INVALID_PARAMETER,
            Status::EnrollmentInProgress => sys::DPFJ_E_ENROLLMENT_IN_PROGRESS,
            Status::EnrollmentNotStarted => sys::DPFJ_E_ENROLLMENT_NOT_STARTED,
            Status::EnrollmentNotReady => sys::DPFJ_E_ENROLLMENT_NOT_READY,
            Status::Failure => sys::DPFJ_E_FAILURE,
            Status::NotImplemented => sys::DPFPDD_E_NOT_IMPLEMENTED,
            Status::NoData => sys::DPFPDD_E_NO_DATA,
            Status::InvalidDevice => sys::DPFPDD_E_INVALID_DEVICE,
            Status::DeviceBusy => sys::DPFPDD_E_DEVICE_BUSY,
            Status::DeviceFailure => sys::DPFPDD_E_DEVICE_FAILURE,
            Status::CompressionNotStarted => sys::DPFJ_E_COMPRESSION_NOT_STARTED,
            Status::InvalidWsqParameter => sys::DPFJ_E_COMPRESSION_INVALID_WSQ_PARAMETER,
            Status::WsqFailure => sys::DPFJ_E_COMPRESSION_WSQ_FAILURE,
            Status::WsqLibNotFound => sys::DPFJ_E_COMPRESSION_WSQ_LIB_NOT_FOUND,
            Status::Other(code) => code,
        }
    }
}

impl From<c_int> for Status {
    fn from(code: c_int) -> Self {
        match code {
            0 => Status::Success,
            sys::DPFJ_E_MORE_DATA => Status::MoreData,
            sys::DPFJ_E_INVALID_PARAMETER | sys::DPFPDD_E_INVALID_PARAMETER => {
                Status::InvalidParameter
            }
            sys::DPFJ_E_ENROLLMENT_IN_PROGRESS => Status::EnrollmentInProgress,
            sys::DPFJ_E_ENROLLMENT_NOT_STARTED => Status::EnrollmentNotStarted,
            sys::DPFJ_E_ENROLLMENT_NOT_READY => Status::EnrollmentNotReady,
            sys::DPFJ_E_FAILURE | sys::DPFPDD_E_FAILURE => Status::Failure,
            sys::DPFPDD_E_NOT_IMPLEMENTED => Status::NotImplemented,
            sys::DPFPDD_E_NO_DATA => Status::NoData,
            sys::DPFPDD_E_INVALID_DEVICE => Status::InvalidDevice,
            sys::DPFPDD_E_DEVICE_BUSY => Status::DeviceBusy,
            sys::DPFPDD_E_DEVICE_FAILURE => Status::DeviceFailure,
            sys::DPFJ_E_COMPRESSION_NOT_STARTED => Status::CompressionNotStarted,
            sys::DPFJ_E_COMPRESSION_INVALID_WSQ_PARAMETER => Status::InvalidWsqParameter,
            sys::DPFJ_E_COMPRESSION_WSQ_FAILURE => Status::WsqFailure,
            sys::DPFJ_E_COMPRESSION_WSQ_LIB_NOT_FOUND => Status::WsqLibNotFound,
            other => Status::Other(other),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        let string = match self {
            Status::Success => "success",
            Status::MoreData => "more data",
            Status::InvalidParameter => "invalid parameter",
            Status::EnrollmentInProgress => "enrollment in progress",
            Status::EnrollmentNotStarted => "enrollment not started",
            Status::EnrollmentNotReady => "enrollment not ready",
            Status::Failure => "failure",
            Status::NotImplemented => "not implemented",
            Status::NoData => "no data",
            Status::InvalidDevice => "invalid device",
            Status::DeviceBusy => "device busy",
            Status::DeviceFailure => "device failure",
            Status::CompressionNotStarted => "compression not started",
            Status::InvalidWsqParameter => "invalid WSQ parameter",
            Status::WsqFailure => "WSQ failure",
            Status::WsqLibNotFound => "WSQ library not found",
            Status::Other(_) => "unknown status",
        };

        write!(f, "{} (0x{:08X})", string, self.code())
    }
}

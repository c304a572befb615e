use std::ffi::{CString, OsStr};
use std::fmt;
use std::mem;
use std::sync::Arc;

use dpfp_sys::{DeviceLibrary, DPFPDD_DEV_INFO, DPFPDD_VERSION, DPFPDD_VER_INFO};
use tracing::{debug, info, warn};

use crate::api::{RawDevice, ReaderApi};
use crate::{Device, DpfpError, InitCause, Operation, Status};

/// Initialised reader library. Shuts the library down once the session and every device
/// opened from it are dropped.
pub(crate) struct Session {
    pub(crate) api: Arc<dyn ReaderApi>,
}

impl Drop for Session {
    fn drop(&mut self) {
        match Status::from(self.api.exit()) {
            Status::Success => debug!("reader library shut down"),
            status => warn!(%status, "reader library exit failed"),
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session").field("api", &self.api).finish()
    }
}

/// Entry point to the reader library.
#[derive(Debug, Clone)]
pub struct Dpfp {
    session: Arc<Session>,
}

impl Dpfp {
    /// Initialises the reader library behind `api`.
    ///
    /// Nothing is shut down when init fails; on success the library is shut down after the
    /// last clone of the returned value and every `Device` opened from it are dropped.
    pub fn new(api: Arc<dyn ReaderApi>) -> crate::Result<Dpfp> {
        match Status::from(api.init()) {
            Status::Success => {
                debug!("reader library initialised");
                Ok(Dpfp {
                    session: Arc::new(Session { api }),
                })
            }
            status => Err(DpfpError::InitError(InitCause::Status(status))),
        }
    }

    /// Loads `dpfpdd` from the library search path and initialises it.
    pub fn load() -> crate::Result<Dpfp> {
        let library = DeviceLibrary::load()?;
        Dpfp::new(Arc::new(library))
    }

    /// Loads the reader library from an explicit path and initialises it.
    pub fn load_from<P: AsRef<OsStr>>(path: P) -> crate::Result<Dpfp> {
        let library = DeviceLibrary::load_from(path)?;
        Dpfp::new(Arc::new(library))
    }

    pub(crate) fn api(&self) -> &dyn ReaderApi {
        self.session.api.as_ref()
    }

    /// Version of the library and of the API it implements.
    pub fn version(&self) -> crate::Result<LibraryVersion> {
        let mut version = DPFPDD_VERSION {
            size: mem::size_of::<DPFPDD_VERSION>() as u32,
            ..Default::default()
        };
        crate::errors::check(self.api().version(&mut version), Operation::Version)?;

        Ok(LibraryVersion {
            library: version.lib_ver.into(),
            api: version.api_ver.into(),
        })
    }

    /// Lists connected readers.
    ///
    /// The first query only asks for the number of readers; the second fills exactly that
    /// many entries.
    pub fn enumerate(&self) -> crate::Result<Vec<DeviceInfo>> {
        let mut count = 0u32;
        match Status::from(self.api().query_devices(&mut count, None)) {
            Status::Success | Status::MoreData => {}
            status => return Err(DpfpError::from_status(Operation::QueryDevices, status)),
        }
        if count == 0 {
            return Err(DpfpError::NoDevice);
        }

        let entry = DPFPDD_DEV_INFO {
            size: mem::size_of::<DPFPDD_DEV_INFO>() as u32,
            ..Default::default()
        };
        let mut entries = vec![entry; count as usize];
        crate::errors::check(
            self.api().query_devices(&mut count, Some(&mut entries)),
            Operation::QueryDevices,
        )?;
        entries.truncate(count as usize);

        let devices: Vec<DeviceInfo> = entries.iter().map(DeviceInfo::from).collect();
        if devices.is_empty() {
            return Err(DpfpError::NoDevice);
        }
        info!(count = devices.len(), "readers found");

        Ok(devices)
    }

    /// Opens a reader by name with the library's default priority.
    pub fn open(&self, name: &str) -> crate::Result<Device> {
        self.open_inner(name, None)
    }

    /// Opens a reader through open-ext with an explicit priority.
    pub fn open_with_priority(&self, name: &str, priority: Priority) -> crate::Result<Device> {
        self.open_inner(name, Some(priority.raw()))
    }

    /// Opens the first reader reported by `enumerate`.
    pub fn open_first(&self) -> crate::Result<Device> {
        let devices = self.enumerate()?;
        let first = devices.first().ok_or(DpfpError::NoDevice)?;

        self.open(&first.name)
    }

    fn open_inner(&self, name: &str, priority: Option<u32>) -> crate::Result<Device> {
        let c_name = CString::new(name).map_err(|_| DpfpError::InvalidName)?;
        let mut handle = RawDevice::null();
        match Status::from(self.api().open(&c_name, priority, &mut handle)) {
            Status::Success if !handle.is_null() => {
                info!(reader = name, "reader opened");
                Ok(Device::new(self.session.clone(), handle, name.to_string()))
            }
            Status::Success => Err(DpfpError::OpenError {
                name: name.to_string(),
                status: Status::InvalidDevice,
            }),
            status => Err(DpfpError::OpenError {
                name: name.to_string(),
                status,
            }),
        }
    }
}

/// Reader entry reported by `Dpfp::enumerate`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub name: String,
}

impl From<&DPFPDD_DEV_INFO> for DeviceInfo {
    fn from(info: &DPFPDD_DEV_INFO) -> Self {
        let name: Vec<u8> = info
            .name
            .iter()
            .take_while(|&&c| c != 0)
            .map(|&c| c as u8)
            .collect();

        DeviceInfo {
            name: String::from_utf8_lossy(&name).into_owned(),
        }
    }
}

/// How an opened reader is shared with other processes.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Priority {
    Cooperative,
    Exclusive,
}

impl Priority {
    pub fn raw(self) -> u32 {
        match self {
            Priority::Cooperative => dpfp_sys::DPFPDD_PRIORITY_COOPERATIVE,
            Priority::Exclusive => dpfp_sys::DPFPDD_PRIORITY_EXCLUSIVE,
        }
    }
}

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct Version {
    pub major: i32,
    pub minor: i32,
    pub maintenance: i32,
}

impl From<DPFPDD_VER_INFO> for Version {
    fn from(info: DPFPDD_VER_INFO) -> Self {
        Version {
            major: info.major,
            minor: info.minor,
            maintenance: info.maintenance,
        }
    }
}

impl From<dpfp_sys::DPFJ_VER_INFO> for Version {
    fn from(info: dpfp_sys::DPFJ_VER_INFO) -> Self {
        Version {
            major: info.major,
            minor: info.minor,
            maintenance: info.maintenance,
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        write!(f, "{}.{}.{}", self.major, self.minor, self.maintenance)
    }
}

/// Library version together with the version of the API it implements.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct LibraryVersion {
    pub library: Version,
    pub api: Version,
}

impl fmt::Display for LibraryVersion {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        write!(f, "library {}, API {}", self.library, self.api)
    }
}

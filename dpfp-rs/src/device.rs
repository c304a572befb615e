use std::fmt;
use std::mem;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use dpfp_sys as sys;
use tracing::{debug, trace, warn};

use crate::api::{RawDevice, ReaderApi};
use crate::errors::check;
use crate::probe::fetch_sized;
use crate::reader::Session;
use crate::{DpfpError, ImageFormat, ImageProcessing, Operation, RawImage, Status};

/// Opened fingerprint reader. Closed on drop.
#[derive(Debug)]
pub struct Device {
    session: Arc<Session>,
    handle: RawDevice,
    name: String,
}

impl Device {
    pub(crate) fn new(session: Arc<Session>, handle: RawDevice, name: String) -> Self {
        Device {
            session,
            handle,
            name,
        }
    }

    fn api(&self) -> &dyn ReaderApi {
        self.session.api.as_ref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current state of the reader and whether a finger rests on it.
    pub fn status(&self) -> crate::Result<DeviceStatus> {
        let mut status = sys::DPFPDD_DEV_STATUS {
            size: mem::size_of::<sys::DPFPDD_DEV_STATUS>() as u32,
            ..Default::default()
        };
        check(self.api().device_status(self.handle, &mut status), Operation::Status)?;

        Ok(DeviceStatus::from(status))
    }

    pub fn capabilities(&self) -> crate::Result<Capabilities> {
        let mut caps = sys::DPFPDD_DEV_CAPS {
            size: mem::size_of::<sys::DPFPDD_DEV_CAPS>() as u32,
            ..Default::default()
        };
        check(self.api().capabilities(self.handle, &mut caps), Operation::Capabilities)?;

        Ok(Capabilities::from(caps))
    }

    /// Reads a raw reader parameter of `len` bytes.
    pub fn parameter(&self, id: Parameter, len: usize) -> crate::Result<Vec<u8>> {
        let mut buffer = vec![0u8; len];
        check(
            self.api().get_parameter(self.handle, id.raw(), &mut buffer),
            Operation::GetParameter,
        )?;

        Ok(buffer)
    }

    pub fn set_parameter(&self, id: Parameter, value: &[u8]) -> crate::Result<()> {
        check(
            self.api().set_parameter(self.handle, id.raw(), value),
            Operation::SetParameter,
        )
    }

    /// Captures one image, blocking until a finger is scanned or `timeout_ms` elapses.
    ///
    /// The first call asks the reader for the image size, the second fetches the image into
    /// a buffer of that size. A capture the reader marks as unsuccessful is returned as
    /// `PoorCapture` carrying the quality flags.
    pub fn capture(&self, params: &CaptureParams, timeout_ms: u32) -> crate::Result<Capture> {
        let param = params.to_raw();
        let mut result = empty_result();
        let probed = fetch_sized(Operation::Capture, |image, size| {
            self.api()
                .capture(self.handle, &param, timeout_ms, &mut result, size, image)
        })?;

        let result = CaptureResult::from(result);
        if !result.success {
            debug!(quality = %result.quality, "capture unsuccessful");
            return Err(DpfpError::PoorCapture(result.quality));
        }

        debug!(
            reader = %self.name,
            bytes = probed.data.len(),
            width = result.info.width,
            height = result.info.height,
            "image captured"
        );
        Ok(Capture {
            result,
            format: params.image_format,
            data: probed.data,
        })
    }

    /// Puts the reader in streaming mode until the returned guard is stopped or dropped.
    pub fn start_stream(&self) -> crate::Result<Stream<'_>> {
        check(self.api().start_stream(self.handle), Operation::StartStream)?;
        debug!(reader = %self.name, "streaming started");

        Ok(Stream {
            device: self,
            stopped: false,
        })
    }

    /// Polls the reader status until a finger is detected or `timeout` elapses.
    pub fn wait_for_finger(&self, poll: Duration, timeout: Duration) -> crate::Result<bool> {
        let started = Instant::now();
        loop {
            if self.status()?.finger_detected {
                return Ok(true);
            }
            if started.elapsed() >= timeout {
                return Ok(false);
            }
            thread::sleep(poll);
        }
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        match Status::from(self.api().close(self.handle)) {
            Status::Success => debug!(reader = %self.name, "reader closed"),
            status => warn!(reader = %self.name, %status, "closing reader failed"),
        }
    }
}

fn empty_result() -> sys::DPFPDD_CAPTURE_RESULT {
    sys::DPFPDD_CAPTURE_RESULT {
        size: mem::size_of::<sys::DPFPDD_CAPTURE_RESULT>() as u32,
        info: sys::DPFPDD_IMAGE_INFO {
            size: mem::size_of::<sys::DPFPDD_IMAGE_INFO>() as u32,
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Streaming session on a reader. Stops streaming when dropped.
#[derive(Debug)]
pub struct Stream<'d> {
    device: &'d Device,
    stopped: bool,
}

impl<'d> Stream<'d> {
    /// Fetches the current frame of the stream.
    pub fn frame(&self, params: &CaptureParams) -> crate::Result<Capture> {
        let device = self.device;
        let param = params.to_raw();
        let mut result = empty_result();
        let probed = fetch_sized(Operation::StreamImage, |image, size| {
            device
                .api()
                .stream_image(device.handle, &param, &mut result, size, image)
        })?;
        trace!(bytes = probed.data.len(), "stream frame");

        Ok(Capture {
            result: CaptureResult::from(result),
            format: params.image_format,
            data: probed.data,
        })
    }

    /// Whether a finger currently rests on the reader.
    pub fn finger_detected(&self) -> crate::Result<bool> {
        Ok(self.device.status()?.finger_detected)
    }

    pub fn stop(mut self) -> crate::Result<()> {
        self.stopped = true;
        check(
            self.device.api().stop_stream(self.device.handle),
            Operation::StopStream,
        )
    }
}

impl<'d> Drop for Stream<'d> {
    fn drop(&mut self) {
        if !self.stopped {
            if let Err(error) = check(
                self.device.api().stop_stream(self.device.handle),
                Operation::StopStream,
            ) {
                warn!(%error, "stopping stream failed");
            }
        }
    }
}

/// Reader settings for one capture.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct CaptureParams {
    pub image_format: ImageFormat,
    pub processing: ImageProcessing,
    /// Requested resolution in dots per inch.
    pub resolution: u32,
}

impl CaptureParams {
    pub(crate) fn to_raw(&self) -> sys::DPFPDD_CAPTURE_PARAM {
        sys::DPFPDD_CAPTURE_PARAM {
            size: mem::size_of::<sys::DPFPDD_CAPTURE_PARAM>() as u32,
            image_fmt: self.image_format.raw(),
            image_proc: self.processing.raw(),
            image_res: self.resolution,
        }
    }
}

impl Default for CaptureParams {
    fn default() -> Self {
        CaptureParams {
            image_format: ImageFormat::Iso19794,
            processing: ImageProcessing::Enhanced,
            resolution: 500,
        }
    }
}

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    pub resolution: u32,
    pub bpp: u32,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct CaptureResult {
    pub success: bool,
    pub quality: Quality,
    pub score: u32,
    pub info: ImageInfo,
}

impl From<sys::DPFPDD_CAPTURE_RESULT> for CaptureResult {
    fn from(result: sys::DPFPDD_CAPTURE_RESULT) -> Self {
        CaptureResult {
            success: result.success != 0,
            quality: Quality(result.quality as u32),
            score: result.score,
            info: ImageInfo {
                width: result.info.width,
                height: result.info.height,
                resolution: result.info.res,
                bpp: result.info.bpp,
            },
        }
    }
}

/// Image returned by the reader, interchange envelope included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capture {
    pub result: CaptureResult,
    pub format: ImageFormat,
    pub data: Vec<u8>,
}

impl Capture {
    /// Length of the envelope in front of the pixels, `None` when the data is shorter than
    /// the raster the reader reported.
    pub fn envelope_len(&self) -> Option<usize> {
        let info = self.result.info;
        let raster = info.width as usize * info.height as usize * ((info.bpp as usize + 7) / 8);
        self.data.len().checked_sub(raster)
    }

    /// Pixel raster with the envelope stripped.
    pub fn raster(&self) -> crate::Result<RawImage> {
        let info = self.result.info;
        let image = RawImage::from_record(
            &self.data,
            info.width,
            info.height,
            info.resolution,
            info.bpp,
        )?;
        if let Some(envelope) = self.envelope_len() {
            if envelope != self.format.envelope_len() {
                debug!(
                    envelope,
                    nominal = self.format.envelope_len(),
                    format = %self.format,
                    "unexpected envelope length"
                );
            }
        }

        Ok(image)
    }
}

/// Quality flags reported with a capture. Empty means a good scan.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub struct Quality(pub u32);

impl Quality {
    pub const GOOD: Quality = Quality(sys::DPFPDD_QUALITY_GOOD as u32);
    pub const TIMED_OUT: Quality = Quality(sys::DPFPDD_QUALITY_TIMED_OUT as u32);
    pub const CANCELED: Quality = Quality(sys::DPFPDD_QUALITY_CANCELED as u32);
    pub const NO_FINGER: Quality = Quality(sys::DPFPDD_QUALITY_NO_FINGER as u32);
    pub const FAKE_FINGER: Quality = Quality(sys::DPFPDD_QUALITY_FAKE_FINGER as u32);
    pub const FINGER_TOO_LEFT: Quality = Quality(sys::DPFPDD_QUALITY_FINGER_TOO_LEFT as u32);
    pub const FINGER_TOO_RIGHT: Quality = Quality(sys::DPFPDD_QUALITY_FINGER_TOO_RIGHT as u32);
    pub const FINGER_TOO_HIGH: Quality = Quality(sys::DPFPDD_QUALITY_FINGER_TOO_HIGH as u32);
    pub const FINGER_TOO_LOW: Quality = Quality(sys::DPFPDD_QUALITY_FINGER_TOO_LOW as u32);
    pub const FINGER_OFF_CENTER: Quality = Quality(sys::DPFPDD_QUALITY_FINGER_OFF_CENTER as u32);
    pub const SCAN_SKEWED: Quality = Quality(sys::DPFPDD_QUALITY_SCAN_SKEWED as u32);
    pub const SCAN_TOO_SHORT: Quality = Quality(sys::DPFPDD_QUALITY_SCAN_TOO_SHORT as u32);
    pub const SCAN_TOO_LONG: Quality = Quality(sys::DPFPDD_QUALITY_SCAN_TOO_LONG as u32);
    pub const SCAN_TOO_SLOW: Quality = Quality(sys::DPFPDD_QUALITY_SCAN_TOO_SLOW as u32);
    pub const SCAN_TOO_FAST: Quality = Quality(sys::DPFPDD_QUALITY_SCAN_TOO_FAST as u32);
    pub const SCAN_WRONG_DIRECTION: Quality =
        Quality(sys::DPFPDD_QUALITY_SCAN_WRONG_DIRECTION as u32);
    pub const READER_DIRTY: Quality = Quality(sys::DPFPDD_QUALITY_READER_DIRTY as u32);

    const NAMES: [(Quality, &'static str); 16] = [
        (Quality::TIMED_OUT, "timed out"),
        (Quality::CANCELED, "canceled"),
        (Quality::NO_FINGER, "no finger"),
        (Quality::FAKE_FINGER, "fake finger"),
        (Quality::FINGER_TOO_LEFT, "finger too left"),
        (Quality::FINGER_TOO_RIGHT, "finger too right"),
        (Quality::FINGER_TOO_HIGH, "finger too high"),
        (Quality::FINGER_TOO_LOW, "finger too low"),
        (Quality::FINGER_OFF_CENTER, "finger off center"),
        (Quality::SCAN_SKEWED, "scan skewed"),
        (Quality::SCAN_TOO_SHORT, "scan too short"),
        (Quality::SCAN_TOO_LONG, "scan too long"),
        (Quality::SCAN_TOO_SLOW, "scan too slow"),
        (Quality::SCAN_TOO_FAST, "scan too fast"),
        (Quality::SCAN_WRONG_DIRECTION, "wrong direction"),
        (Quality::READER_DIRTY, "reader dirty"),
    ];

    pub fn is_good(self) -> bool {
        self.0 == 0
    }

    pub fn contains(self, flag: Quality) -> bool {
        flag.0 != 0 && self.0 & flag.0 == flag.0
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        if self.is_good() {
            return write!(f, "good");
        }

        let names: Vec<&str> = Quality::NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        if names.is_empty() {
            write!(f, "0x{:X}", self.0)
        } else {
            write!(f, "{}", names.join(", "))
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum DeviceState {
    Ready,
    Busy,
    NeedsCalibration,
    Failed,
    Unknown(u32),
}

impl From<u32> for DeviceState {
    fn from(value: u32) -> Self {
        match value {
            sys::DPFPDD_STATUS_READY => DeviceState::Ready,
            sys::DPFPDD_STATUS_BUSY => DeviceState::Busy,
            sys::DPFPDD_STATUS_NEED_CALIBRATION => DeviceState::NeedsCalibration,
            sys::DPFPDD_STATUS_FAILURE => DeviceState::Failed,
            n => DeviceState::Unknown(n),
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct DeviceStatus {
    pub state: DeviceState,
    pub finger_detected: bool,
}

impl From<sys::DPFPDD_DEV_STATUS> for DeviceStatus {
    fn from(status: sys::DPFPDD_DEV_STATUS) -> Self {
        DeviceStatus {
            state: DeviceState::from(status.status),
            finger_detected: status.finger_detected != 0,
        }
    }
}

#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Capabilities {
    pub can_capture_image: bool,
    pub can_stream_image: bool,
    pub can_extract_features: bool,
    pub can_match: bool,
    pub can_identify: bool,
    pub has_fingerprint_storage: bool,
    pub indicator_type: u32,
    pub has_power_management: bool,
    pub has_calibration: bool,
    pub piv_compliant: bool,
    /// Supported capture resolutions in dpi.
    pub resolutions: Vec<u32>,
}

impl From<sys::DPFPDD_DEV_CAPS> for Capabilities {
    fn from(caps: sys::DPFPDD_DEV_CAPS) -> Self {
        let count = (caps.resolution_cnt as usize).min(caps.resolutions.len());

        Capabilities {
            can_capture_image: caps.can_capture_image != 0,
            can_stream_image: caps.can_stream_image != 0,
            can_extract_features: caps.can_extract_features != 0,
            can_match: caps.can_match != 0,
            can_identify: caps.can_identify != 0,
            has_fingerprint_storage: caps.has_fp_storage != 0,
            indicator_type: caps.indicator_type,
            has_power_management: caps.has_pwr_mgmt != 0,
            has_calibration: caps.has_calibration != 0,
            piv_compliant: caps.piv_compliant != 0,
            resolutions: caps.resolutions[..count].to_vec(),
        }
    }
}

/// Reader parameters accessible through `Device::parameter` and `Device::set_parameter`.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Parameter {
    /// Image rotation, `u32` degrees.
    Rotate,
    /// Finger detection in streaming mode, `u32` 0 or 1.
    FingerDetectEnable,
    IoMap,
    Other(u32),
}

impl Parameter {
    pub fn raw(self) -> u32 {
        match self {
            Parameter::Rotate => sys::DPFPDD_PARMID_ROTATE,
            Parameter::FingerDetectEnable => sys::DPFPDD_PARMID_FINGERDETECT_ENABLE,
            Parameter::IoMap => sys::DPFPDD_PARMID_IOMAP,
            Parameter::Other(id) => id,
        }
    }
}

//! Seams between the safe wrappers and the vendor libraries.
//!
//! Each trait mirrors one native library call for call, with raw pointers replaced by
//! slices and references. Methods return the native status code untouched; decoding
//! it is the job of the safe layer. The loaded libraries from `dpfp-sys` implement these
//! traits, and so does the scripted SDK used in tests.

use std::ffi::CStr;
use std::fmt;

use dpfp_sys::{
    DPFJ_CANDIDATE, DPFJ_VERSION, DPFPDD_CAPTURE_PARAM, DPFPDD_CAPTURE_RESULT, DPFPDD_DEV,
    DPFPDD_DEV_CAPS, DPFPDD_DEV_INFO, DPFPDD_DEV_STATUS, DPFPDD_VERSION,
};
use libc::c_int;

/// Reader handle as handed out by the device library.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct RawDevice(pub DPFPDD_DEV);

// The device library allows a handle to be used from any thread, one call at a time.
unsafe impl Send for RawDevice {}

impl RawDevice {
    pub fn null() -> Self {
        RawDevice(std::ptr::null_mut())
    }

    pub fn is_null(self) -> bool {
        self.0.is_null()
    }
}

/// Calls of the reader library (`dpfpdd`).
#[allow(clippy::too_many_arguments)]
pub trait ReaderApi: Send + Sync + fmt::Debug {
    fn version(&self, version: &mut DPFPDD_VERSION) -> c_int;

    fn init(&self) -> c_int;

    fn exit(&self) -> c_int;

    /// `count` carries the capacity of `devices` in and the number of readers out.
    fn query_devices(&self, count: &mut u32, devices: Option<&mut [DPFPDD_DEV_INFO]>) -> c_int;

    /// Opens with the default priority when `priority` is `None`, through open-ext otherwise.
    fn open(&self, name: &CStr, priority: Option<u32>, device: &mut RawDevice) -> c_int;

    fn close(&self, device: RawDevice) -> c_int;

    fn device_status(&self, device: RawDevice, status: &mut DPFPDD_DEV_STATUS) -> c_int;

    fn capabilities(&self, device: RawDevice, caps: &mut DPFPDD_DEV_CAPS) -> c_int;

    fn get_parameter(&self, device: RawDevice, id: u32, buffer: &mut [u8]) -> c_int;

    fn set_parameter(&self, device: RawDevice, id: u32, buffer: &[u8]) -> c_int;

    fn capture(
        &self,
        device: RawDevice,
        param: &DPFPDD_CAPTURE_PARAM,
        timeout_ms: u32,
        result: &mut DPFPDD_CAPTURE_RESULT,
        size: &mut u32,
        image: Option<&mut [u8]>,
    ) -> c_int;

    fn start_stream(&self, device: RawDevice) -> c_int;

    fn stop_stream(&self, device: RawDevice) -> c_int;

    fn stream_image(
        &self,
        device: RawDevice,
        param: &DPFPDD_CAPTURE_PARAM,
        result: &mut DPFPDD_CAPTURE_RESULT,
        size: &mut u32,
        image: Option<&mut [u8]>,
    ) -> c_int;
}

/// Calls of the feature extraction and matching library (`dpfj`).
#[allow(clippy::too_many_arguments)]
pub trait MatchApi: Send + Sync + fmt::Debug {
    fn version(&self, version: &mut DPFJ_VERSION) -> c_int;

    fn create_fmd_from_raw(
        &self,
        image: &[u8],
        width: u32,
        height: u32,
        dpi: u32,
        finger_position: c_int,
        cbeff_id: u32,
        fmd_type: c_int,
        fmd: Option<&mut [u8]>,
        fmd_size: &mut u32,
    ) -> c_int;

    fn create_fmd_from_fid(
        &self,
        fid_type: c_int,
        fid: &[u8],
        fmd_type: c_int,
        fmd: Option<&mut [u8]>,
        fmd_size: &mut u32,
    ) -> c_int;

    fn fmd_convert(
        &self,
        from_type: c_int,
        fmd: &[u8],
        to_type: c_int,
        converted: Option<&mut [u8]>,
        converted_size: &mut u32,
    ) -> c_int;

    fn compare(
        &self,
        first_type: c_int,
        first: &[u8],
        first_view: u32,
        second_type: c_int,
        second: &[u8],
        second_view: u32,
        score: &mut u32,
    ) -> c_int;

    /// `candidate_count` carries the capacity of `candidates` in and the hit count out.
    fn identify(
        &self,
        probe_type: c_int,
        probe: &[u8],
        probe_view: u32,
        gallery_type: c_int,
        gallery: &[&[u8]],
        threshold: u32,
        candidate_count: &mut u32,
        candidates: &mut [DPFJ_CANDIDATE],
    ) -> c_int;

    fn start_enrollment(&self, fmd_type: c_int) -> c_int;

    fn add_to_enrollment(&self, fmd_type: c_int, fmd: &[u8], view: u32) -> c_int;

    fn create_enrollment_fmd(&self, fmd: Option<&mut [u8]>, fmd_size: &mut u32) -> c_int;

    fn finish_enrollment(&self) -> c_int;
}

/// Calls of the WSQ compression library (`dpfj_compression`).
#[allow(clippy::too_many_arguments)]
pub trait CompressionApi: Send + Sync + fmt::Debug {
    fn start_compression(&self) -> c_int;

    fn finish_compression(&self) -> c_int;

    fn set_wsq_bitrate(&self, bitrate_x100: u32, tolerance_aw: u32) -> c_int;

    fn set_wsq_size(&self, size: u32, tolerance_aw: u32) -> c_int;

    fn compress_raw(
        &self,
        image: &[u8],
        width: u32,
        height: u32,
        dpi: u32,
        bpp: u32,
        algorithm: c_int,
    ) -> c_int;

    fn compress_fid(&self, fid_type: c_int, fid: &[u8], algorithm: c_int) -> c_int;

    fn expand_raw(
        &self,
        data: &[u8],
        algorithm: c_int,
        width: &mut u32,
        height: &mut u32,
        dpi: &mut u32,
        bpp: &mut u32,
    ) -> c_int;

    fn expand_fid(&self, fid_type: c_int, data: &[u8], algorithm: c_int) -> c_int;

    fn processed_data(&self, data: Option<&mut [u8]>, size: &mut u32) -> c_int;
}

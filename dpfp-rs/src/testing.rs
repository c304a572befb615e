//! Scripted in-process stand-in for the vendor libraries.
//!
//! `ScriptedSdk` implements all three library traits with deterministic behaviour:
//! captures are an interchange header followed by pixels derived from the current finger,
//! templates are derived from the pixels (so the same finger always yields the same
//! template), and compare scores count differing template bytes. Every lifecycle call is
//! counted so tests can check bracketing.

use std::collections::{HashMap, VecDeque};
use std::ffi::CStr;
use std::sync::{Arc, Mutex, MutexGuard};

use dpfp_sys as sys;
use libc::c_int;

use crate::api::{CompressionApi, MatchApi, RawDevice, ReaderApi};

/// Outcome of the next capture fetch.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CaptureOutcome {
    /// Image of the current finger.
    Image,
    /// Unsuccessful capture with the given quality flags.
    Poor(u32),
    /// Native error code.
    Fail(i32),
}

/// Number of times each lifecycle call was made.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct Calls {
    pub init: usize,
    pub exit: usize,
    pub open: usize,
    pub close: usize,
    pub capture: usize,
    pub start_stream: usize,
    pub stop_stream: usize,
    pub start_enrollment: usize,
    pub add_to_enrollment: usize,
    pub finish_enrollment: usize,
    pub start_compression: usize,
    pub finish_compression: usize,
    pub compare: usize,
    pub identify: usize,
}

/// Behaviour knobs and internal state of the scripted SDK.
#[derive(Debug)]
pub struct SdkState {
    pub devices: Vec<String>,
    /// Returned by init instead of success.
    pub init_status: Option<i32>,
    pub width: u32,
    pub height: u32,
    pub resolution: u32,
    /// Seed of the pixels of the next captures; different fingers give different templates.
    pub finger: u8,
    /// Consumed one per capture fetch; empty means `CaptureOutcome::Image`.
    pub captures: VecDeque<CaptureOutcome>,
    /// Views the enrollment accumulator needs before it is ready.
    pub views_required: usize,
    pub fmd_len: usize,
    /// Status polls before the reader reports a finger.
    pub finger_after_polls: usize,
    pub add_status: Option<i32>,
    pub finish_enrollment_status: Option<i32>,
    pub calls: Calls,
    pub parameters: HashMap<u32, Vec<u8>>,
    pub open_handles: Vec<usize>,
    pub next_handle: usize,
    pub status_polls: usize,
    pub streaming: bool,
    pub enrollment: Option<Vec<Vec<u8>>>,
    pub compression_started: bool,
    pub processed: Option<Vec<u8>>,
}

impl Default for SdkState {
    fn default() -> Self {
        SdkState {
            devices: vec!["ExampleReader".to_string()],
            init_status: None,
            width: 400,
            height: 500,
            resolution: 500,
            finger: 1,
            captures: VecDeque::new(),
            views_required: 2,
            fmd_len: 350,
            finger_after_polls: 0,
            add_status: None,
            finish_enrollment_status: None,
            calls: Calls::default(),
            parameters: HashMap::new(),
            open_handles: Vec::new(),
            next_handle: 1,
            status_polls: 0,
            streaming: false,
            enrollment: None,
            compression_started: false,
            processed: None,
        }
    }
}

impl SdkState {
    fn envelope_len(image_fmt: u32) -> usize {
        match image_fmt {
            sys::DPFPDD_IMG_FMT_ANSI381 => 50,
            sys::DPFPDD_IMG_FMT_ISOIEC19794 => 46,
            _ => 0,
        }
    }

    fn image_len(&self, image_fmt: u32) -> usize {
        SdkState::envelope_len(image_fmt) + (self.width * self.height) as usize
    }

    fn is_open(&self, device: RawDevice) -> bool {
        self.open_handles.contains(&(device.0 as usize))
    }
}

/// In-process implementation of the reader, matching and compression libraries.
#[derive(Debug, Default)]
pub struct ScriptedSdk {
    state: Mutex<SdkState>,
}

impl ScriptedSdk {
    pub fn new() -> Arc<Self> {
        Arc::new(ScriptedSdk::default())
    }

    pub fn with_state(state: SdkState) -> Arc<Self> {
        Arc::new(ScriptedSdk {
            state: Mutex::new(state),
        })
    }

    pub fn state(&self) -> MutexGuard<'_, SdkState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn calls(&self) -> Calls {
        self.state().calls
    }

    /// Switches the finger the next captures are taken from.
    pub fn place_finger(&self, finger: u8) {
        self.state().finger = finger;
    }

    /// Queues outcomes for the next capture fetches.
    pub fn script_captures<I: IntoIterator<Item = CaptureOutcome>>(&self, outcomes: I) {
        self.state().captures.extend(outcomes);
    }

    /// Pixels the reader returns for `finger`.
    pub fn pixels(width: u32, height: u32, finger: u8) -> Vec<u8> {
        (0..(width * height) as usize)
            .map(|i| finger.wrapping_mul(37).wrapping_add((i % 251) as u8))
            .collect()
    }

    /// Template the matcher derives from `pixels`.
    pub fn template_for(pixels: &[u8], len: usize) -> Vec<u8> {
        let mut hash: u32 = 0x811C_9DC5;
        for byte in pixels {
            hash ^= u32::from(*byte);
            hash = hash.wrapping_mul(0x0100_0193);
        }

        let mut template = b"FMR\0".to_vec();
        let mut state = hash;
        while template.len() < len {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            template.push(state as u8);
        }
        template
    }

    /// Dissimilarity the matcher reports: differing bytes, scaled.
    pub fn score(first: &[u8], second: &[u8]) -> u32 {
        let differing = first
            .iter()
            .zip(second.iter())
            .filter(|(a, b)| a != b)
            .count()
            + (first.len() as isize - second.len() as isize).unsigned_abs();

        (differing as u32).saturating_mul(1000)
    }

    fn write_probed(data: &[u8], buffer: Option<&mut [u8]>, size: &mut u32) -> c_int {
        match buffer {
            Some(buffer) if buffer.len() >= data.len() => {
                buffer[..data.len()].copy_from_slice(data);
                *size = data.len() as u32;
                sys::DPFJ_SUCCESS
            }
            _ => {
                *size = data.len() as u32;
                sys::DPFJ_E_MORE_DATA
            }
        }
    }

    fn fill_image(
        state: &mut SdkState,
        param: &sys::DPFPDD_CAPTURE_PARAM,
        result: &mut sys::DPFPDD_CAPTURE_RESULT,
        size: &mut u32,
        image: Option<&mut [u8]>,
    ) -> c_int {
        let required = state.image_len(param.image_fmt);
        let image = match image {
            Some(image) if image.len() >= required => image,
            _ => {
                *size = required as u32;
                return sys::DPFPDD_E_MORE_DATA;
            }
        };

        match state.captures.pop_front().unwrap_or(CaptureOutcome::Image) {
            CaptureOutcome::Fail(code) => code,
            CaptureOutcome::Poor(quality) => {
                result.success = 0;
                result.quality = quality as c_int;
                *size = 0;
                sys::DPFPDD_SUCCESS
            }
            CaptureOutcome::Image => {
                let envelope = SdkState::envelope_len(param.image_fmt);
                for byte in image[..envelope].iter_mut() {
                    *byte = 0;
                }
                if envelope > 0 {
                    image[..4].copy_from_slice(b"FIR\0");
                }
                let pixels = ScriptedSdk::pixels(state.width, state.height, state.finger);
                image[envelope..required].copy_from_slice(&pixels);

                result.success = 1;
                result.quality = sys::DPFPDD_QUALITY_GOOD;
                result.score = 0;
                result.info.width = state.width;
                result.info.height = state.height;
                result.info.res = state.resolution;
                result.info.bpp = 8;
                *size = required as u32;
                sys::DPFPDD_SUCCESS
            }
        }
    }
}

impl ReaderApi for ScriptedSdk {
    fn version(&self, version: &mut sys::DPFPDD_VERSION) -> c_int {
        version.lib_ver = sys::DPFPDD_VER_INFO {
            major: 3,
            minor: 4,
            maintenance: 1,
        };
        version.api_ver = sys::DPFPDD_VER_INFO {
            major: 1,
            minor: 0,
            maintenance: 0,
        };
        sys::DPFPDD_SUCCESS
    }

    fn init(&self) -> c_int {
        let mut state = self.state();
        if let Some(status) = state.init_status {
            return status;
        }
        state.calls.init += 1;
        sys::DPFPDD_SUCCESS
    }

    fn exit(&self) -> c_int {
        self.state().calls.exit += 1;
        sys::DPFPDD_SUCCESS
    }

    fn query_devices(
        &self,
        count: &mut u32,
        devices: Option<&mut [sys::DPFPDD_DEV_INFO]>,
    ) -> c_int {
        let state = self.state();
        let found = state.devices.len();
        match devices {
            Some(devices) if devices.len() >= found && *count as usize >= found => {
                for (entry, name) in devices.iter_mut().zip(state.devices.iter()) {
                    entry.name = [0; sys::MAX_DEVICE_NAME_LENGTH];
                    for (slot, byte) in entry.name.iter_mut().zip(name.bytes()) {
                        *slot = byte as libc::c_char;
                    }
                }
                *count = found as u32;
                sys::DPFPDD_SUCCESS
            }
            _ => {
                *count = found as u32;
                if found == 0 {
                    sys::DPFPDD_SUCCESS
                } else {
                    sys::DPFPDD_E_MORE_DATA
                }
            }
        }
    }

    fn open(&self, name: &CStr, _priority: Option<u32>, device: &mut RawDevice) -> c_int {
        let mut state = self.state();
        let name = name.to_string_lossy();
        if !state.devices.iter().any(|known| *known == name) {
            return sys::DPFPDD_E_INVALID_DEVICE;
        }
        let handle = state.next_handle;
        state.next_handle += 1;
        state.open_handles.push(handle);
        state.calls.open += 1;
        *device = RawDevice(handle as sys::DPFPDD_DEV);
        sys::DPFPDD_SUCCESS
    }

    fn close(&self, device: RawDevice) -> c_int {
        let mut state = self.state();
        if !state.is_open(device) {
            return sys::DPFPDD_E_INVALID_DEVICE;
        }
        state.open_handles.retain(|&handle| handle != device.0 as usize);
        state.calls.close += 1;
        sys::DPFPDD_SUCCESS
    }

    fn device_status(&self, device: RawDevice, status: &mut sys::DPFPDD_DEV_STATUS) -> c_int {
        let mut state = self.state();
        if !state.is_open(device) {
            return sys::DPFPDD_E_INVALID_DEVICE;
        }
        state.status_polls += 1;
        status.status = sys::DPFPDD_STATUS_READY;
        status.finger_detected = (state.status_polls > state.finger_after_polls) as c_int;
        sys::DPFPDD_SUCCESS
    }

    fn capabilities(&self, device: RawDevice, caps: &mut sys::DPFPDD_DEV_CAPS) -> c_int {
        let state = self.state();
        if !state.is_open(device) {
            return sys::DPFPDD_E_INVALID_DEVICE;
        }
        caps.can_capture_image = 1;
        caps.can_stream_image = 1;
        caps.can_extract_features = 1;
        caps.can_match = 1;
        caps.can_identify = 1;
        caps.resolution_cnt = 1;
        caps.resolutions[0] = state.resolution;
        sys::DPFPDD_SUCCESS
    }

    fn get_parameter(&self, device: RawDevice, id: u32, buffer: &mut [u8]) -> c_int {
        let state = self.state();
        if !state.is_open(device) {
            return sys::DPFPDD_E_INVALID_DEVICE;
        }
        match state.parameters.get(&id) {
            Some(value) if value.len() == buffer.len() => {
                buffer.copy_from_slice(value);
                sys::DPFPDD_SUCCESS
            }
            Some(_) => sys::DPFPDD_E_INVALID_PARAMETER,
            None => sys::DPFPDD_E_NOT_IMPLEMENTED,
        }
    }

    fn set_parameter(&self, device: RawDevice, id: u32, buffer: &[u8]) -> c_int {
        let mut state = self.state();
        if !state.is_open(device) {
            return sys::DPFPDD_E_INVALID_DEVICE;
        }
        state.parameters.insert(id, buffer.to_vec());
        sys::DPFPDD_SUCCESS
    }

    fn capture(
        &self,
        device: RawDevice,
        param: &sys::DPFPDD_CAPTURE_PARAM,
        _timeout_ms: u32,
        result: &mut sys::DPFPDD_CAPTURE_RESULT,
        size: &mut u32,
        image: Option<&mut [u8]>,
    ) -> c_int {
        let mut state = self.state();
        if !state.is_open(device) {
            return sys::DPFPDD_E_INVALID_DEVICE;
        }
        if image.is_some() {
            state.calls.capture += 1;
        }
        ScriptedSdk::fill_image(&mut state, param, result, size, image)
    }

    fn start_stream(&self, device: RawDevice) -> c_int {
        let mut state = self.state();
        if !state.is_open(device) {
            return sys::DPFPDD_E_INVALID_DEVICE;
        }
        state.streaming = true;
        state.calls.start_stream += 1;
        sys::DPFPDD_SUCCESS
    }

    fn stop_stream(&self, device: RawDevice) -> c_int {
        let mut state = self.state();
        if !state.is_open(device) || !state.streaming {
            return sys::DPFPDD_E_FAILURE;
        }
        state.streaming = false;
        state.calls.stop_stream += 1;
        sys::DPFPDD_SUCCESS
    }

    fn stream_image(
        &self,
        device: RawDevice,
        param: &sys::DPFPDD_CAPTURE_PARAM,
        result: &mut sys::DPFPDD_CAPTURE_RESULT,
        size: &mut u32,
        image: Option<&mut [u8]>,
    ) -> c_int {
        let mut state = self.state();
        if !state.is_open(device) || !state.streaming {
            return sys::DPFPDD_E_FAILURE;
        }
        ScriptedSdk::fill_image(&mut state, param, result, size, image)
    }
}

impl MatchApi for ScriptedSdk {
    fn version(&self, version: &mut sys::DPFJ_VERSION) -> c_int {
        version.lib_ver = sys::DPFJ_VER_INFO {
            major: 3,
            minor: 4,
            maintenance: 1,
        };
        version.api_ver = sys::DPFJ_VER_INFO {
            major: 1,
            minor: 0,
            maintenance: 0,
        };
        sys::DPFJ_SUCCESS
    }

    fn create_fmd_from_raw(
        &self,
        image: &[u8],
        width: u32,
        height: u32,
        _dpi: u32,
        _finger_position: c_int,
        _cbeff_id: u32,
        _fmd_type: c_int,
        fmd: Option<&mut [u8]>,
        fmd_size: &mut u32,
    ) -> c_int {
        if width == 0 || height == 0 || image.len() != (width * height) as usize {
            return sys::DPFJ_E_INVALID_PARAMETER;
        }
        let len = self.state().fmd_len;
        ScriptedSdk::write_probed(&ScriptedSdk::template_for(image, len), fmd, fmd_size)
    }

    fn create_fmd_from_fid(
        &self,
        fid_type: c_int,
        fid: &[u8],
        _fmd_type: c_int,
        fmd: Option<&mut [u8]>,
        fmd_size: &mut u32,
    ) -> c_int {
        let envelope = match fid_type {
            sys::DPFJ_FID_ANSI_381_2004 => 50,
            sys::DPFJ_FID_ISO_19794_4_2005 => 46,
            _ => return sys::DPFJ_E_INVALID_PARAMETER,
        };
        if fid.len() <= envelope {
            return sys::DPFJ_E_INVALID_PARAMETER;
        }
        let len = self.state().fmd_len;
        ScriptedSdk::write_probed(&ScriptedSdk::template_for(&fid[envelope..], len), fmd, fmd_size)
    }

    fn fmd_convert(
        &self,
        _from_type: c_int,
        fmd: &[u8],
        _to_type: c_int,
        converted: Option<&mut [u8]>,
        converted_size: &mut u32,
    ) -> c_int {
        ScriptedSdk::write_probed(fmd, converted, converted_size)
    }

    fn compare(
        &self,
        _first_type: c_int,
        first: &[u8],
        _first_view: u32,
        _second_type: c_int,
        second: &[u8],
        _second_view: u32,
        score: &mut u32,
    ) -> c_int {
        self.state().calls.compare += 1;
        *score = ScriptedSdk::score(first, second);
        sys::DPFJ_SUCCESS
    }

    fn identify(
        &self,
        _probe_type: c_int,
        probe: &[u8],
        _probe_view: u32,
        _gallery_type: c_int,
        gallery: &[&[u8]],
        threshold: u32,
        candidate_count: &mut u32,
        candidates: &mut [sys::DPFJ_CANDIDATE],
    ) -> c_int {
        self.state().calls.identify += 1;
        let capacity = (*candidate_count as usize).min(candidates.len());
        let mut found = 0;
        for (index, fmd) in gallery.iter().enumerate() {
            if found == capacity {
                break;
            }
            if ScriptedSdk::score(probe, fmd) < threshold {
                candidates[found].fmd_idx = index as u32;
                candidates[found].view_idx = 0;
                found += 1;
            }
        }
        *candidate_count = found as u32;
        sys::DPFJ_SUCCESS
    }

    fn start_enrollment(&self, _fmd_type: c_int) -> c_int {
        let mut state = self.state();
        if state.enrollment.is_some() {
            return sys::DPFJ_E_ENROLLMENT_IN_PROGRESS;
        }
        state.enrollment = Some(Vec::new());
        state.calls.start_enrollment += 1;
        sys::DPFJ_SUCCESS
    }

    fn add_to_enrollment(&self, _fmd_type: c_int, fmd: &[u8], _view: u32) -> c_int {
        let mut state = self.state();
        state.calls.add_to_enrollment += 1;
        if let Some(status) = state.add_status {
            return status;
        }
        let required = state.views_required;
        match state.enrollment.as_mut() {
            None => sys::DPFJ_E_ENROLLMENT_NOT_STARTED,
            Some(views) => {
                views.push(fmd.to_vec());
                if views.len() >= required {
                    sys::DPFJ_SUCCESS
                } else {
                    sys::DPFJ_E_MORE_DATA
                }
            }
        }
    }

    fn create_enrollment_fmd(&self, fmd: Option<&mut [u8]>, fmd_size: &mut u32) -> c_int {
        let state = self.state();
        match state.enrollment.as_ref() {
            None => sys::DPFJ_E_ENROLLMENT_NOT_STARTED,
            Some(views) if views.len() < state.views_required => sys::DPFJ_E_ENROLLMENT_NOT_READY,
            Some(views) => match views.first() {
                Some(first) => ScriptedSdk::write_probed(first, fmd, fmd_size),
                None => sys::DPFJ_E_ENROLLMENT_NOT_READY,
            },
        }
    }

    fn finish_enrollment(&self) -> c_int {
        let mut state = self.state();
        state.calls.finish_enrollment += 1;
        state.enrollment = None;
        state.finish_enrollment_status.unwrap_or(sys::DPFJ_SUCCESS)
    }
}

const WSQ_RAW_TAG: &[u8; 4] = b"WSQ\0";
const WSQ_FID_TAG: &[u8; 4] = b"WSF\0";

impl CompressionApi for ScriptedSdk {
    fn start_compression(&self) -> c_int {
        let mut state = self.state();
        if state.compression_started {
            return sys::DPFJ_E_FAILURE;
        }
        state.compression_started = true;
        state.calls.start_compression += 1;
        sys::DPFJ_SUCCESS
    }

    fn finish_compression(&self) -> c_int {
        let mut state = self.state();
        state.compression_started = false;
        state.processed = None;
        state.calls.finish_compression += 1;
        sys::DPFJ_SUCCESS
    }

    fn set_wsq_bitrate(&self, bitrate_x100: u32, _tolerance_aw: u32) -> c_int {
        if !self.state().compression_started {
            return sys::DPFJ_E_COMPRESSION_NOT_STARTED;
        }
        if bitrate_x100 == 0 {
            return sys::DPFJ_E_COMPRESSION_INVALID_WSQ_PARAMETER;
        }
        sys::DPFJ_SUCCESS
    }

    fn set_wsq_size(&self, size: u32, _tolerance_aw: u32) -> c_int {
        if !self.state().compression_started {
            return sys::DPFJ_E_COMPRESSION_NOT_STARTED;
        }
        if size == 0 {
            return sys::DPFJ_E_COMPRESSION_INVALID_WSQ_PARAMETER;
        }
        sys::DPFJ_SUCCESS
    }

    fn compress_raw(
        &self,
        image: &[u8],
        width: u32,
        height: u32,
        dpi: u32,
        bpp: u32,
        _algorithm: c_int,
    ) -> c_int {
        let mut state = self.state();
        if !state.compression_started {
            return sys::DPFJ_E_COMPRESSION_NOT_STARTED;
        }
        let mut wsq = WSQ_RAW_TAG.to_vec();
        for value in &[width, height, dpi, bpp] {
            wsq.extend_from_slice(&value.to_le_bytes());
        }
        wsq.extend_from_slice(image);
        state.processed = Some(wsq);
        sys::DPFJ_SUCCESS
    }

    fn compress_fid(&self, _fid_type: c_int, fid: &[u8], _algorithm: c_int) -> c_int {
        let mut state = self.state();
        if !state.compression_started {
            return sys::DPFJ_E_COMPRESSION_NOT_STARTED;
        }
        let mut wsq = WSQ_FID_TAG.to_vec();
        wsq.extend_from_slice(fid);
        state.processed = Some(wsq);
        sys::DPFJ_SUCCESS
    }

    fn expand_raw(
        &self,
        data: &[u8],
        _algorithm: c_int,
        width: &mut u32,
        height: &mut u32,
        dpi: &mut u32,
        bpp: &mut u32,
    ) -> c_int {
        let mut state = self.state();
        if !state.compression_started {
            return sys::DPFJ_E_COMPRESSION_NOT_STARTED;
        }
        if data.len() < 20 || !data.starts_with(WSQ_RAW_TAG) {
            return sys::DPFJ_E_COMPRESSION_WSQ_FAILURE;
        }
        let field = |index: usize| {
            let start = 4 + index * 4;
            let mut bytes = [0u8; 4];
            bytes.copy_from_slice(&data[start..start + 4]);
            u32::from_le_bytes(bytes)
        };
        *width = field(0);
        *height = field(1);
        *dpi = field(2);
        *bpp = field(3);
        state.processed = Some(data[20..].to_vec());
        sys::DPFJ_SUCCESS
    }

    fn expand_fid(&self, _fid_type: c_int, data: &[u8], _algorithm: c_int) -> c_int {
        let mut state = self.state();
        if !state.compression_started {
            return sys::DPFJ_E_COMPRESSION_NOT_STARTED;
        }
        if !data.starts_with(WSQ_FID_TAG) {
            return sys::DPFJ_E_COMPRESSION_WSQ_FAILURE;
        }
        state.processed = Some(data[4..].to_vec());
        sys::DPFJ_SUCCESS
    }

    fn processed_data(&self, data: Option<&mut [u8]>, size: &mut u32) -> c_int {
        let state = self.state();
        if !state.compression_started {
            return sys::DPFJ_E_COMPRESSION_NOT_STARTED;
        }
        match state.processed.as_ref() {
            Some(processed) => ScriptedSdk::write_probed(processed, data, size),
            None => sys::DPFJ_E_FAILURE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_pixels_give_same_template() {
        let pixels = ScriptedSdk::pixels(8, 8, 3);
        let first = ScriptedSdk::template_for(&pixels, 350);
        assert_eq!(first, ScriptedSdk::template_for(&pixels, 350));
        assert!(first.starts_with(b"FMR\0"));
        assert_eq!(first.len(), 350);
    }

    #[test]
    fn different_fingers_score_far_apart() {
        let a = ScriptedSdk::template_for(&ScriptedSdk::pixels(8, 8, 1), 350);
        let b = ScriptedSdk::template_for(&ScriptedSdk::pixels(8, 8, 2), 350);
        assert_eq!(ScriptedSdk::score(&a, &a), 0);
        assert!(ScriptedSdk::score(&a, &b) > 100_000);
    }
}

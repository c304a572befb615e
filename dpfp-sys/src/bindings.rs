// Layouts and entry points of dpfpdd, dpfj and dpfj_compression.

use libc::{c_char, c_int, c_uchar, c_uint};

pub const DP_FACILITY: c_int = 0x05BA;

/// Composes a vendor status code from the facility and the error number.
pub const fn DPERROR(code: c_int) -> c_int {
    (DP_FACILITY << 16) | code
}

// Status codes

pub const DPFPDD_SUCCESS: c_int = 0;
pub const DPFPDD_E_NOT_IMPLEMENTED: c_int = DPERROR(0x0a);
pub const DPFPDD_E_FAILURE: c_int = DPERROR(0x0b);
pub const DPFPDD_E_NO_DATA: c_int = DPERROR(0x0c);
pub const DPFPDD_E_MORE_DATA: c_int = DPERROR(0x0d);
pub const DPFPDD_E_INVALID_PARAMETER: c_int = DPERROR(0x14);
pub const DPFPDD_E_INVALID_DEVICE: c_int = DPERROR(0x15);
pub const DPFPDD_E_DEVICE_BUSY: c_int = DPERROR(0x1e);
pub const DPFPDD_E_DEVICE_FAILURE: c_int = DPERROR(0x1f);

pub const DPFJ_SUCCESS: c_int = 0;
pub const DPFJ_E_INVALID_PARAMETER: c_int = DPERROR(0x01);
pub const DPFJ_E_ENROLLMENT_IN_PROGRESS: c_int = DPERROR(0x02);
pub const DPFJ_E_ENROLLMENT_NOT_STARTED: c_int = DPERROR(0x03);
pub const DPFJ_E_FAILURE: c_int = DPERROR(0x04);
pub const DPFJ_E_MORE_DATA: c_int = DPERROR(0x0d);
/// Returned by `dpfj_create_enrollment_fmd` before enough views were added.
pub const DPFJ_E_ENROLLMENT_NOT_READY: c_int = DPERROR(0x12f);

pub const DPFJ_E_COMPRESSION_NOT_STARTED: c_int = DPERROR(0x142);
pub const DPFJ_E_COMPRESSION_INVALID_WSQ_PARAMETER: c_int = DPERROR(0x14a);
pub const DPFJ_E_COMPRESSION_WSQ_FAILURE: c_int = DPERROR(0x14b);
pub const DPFJ_E_COMPRESSION_WSQ_LIB_NOT_FOUND: c_int = DPERROR(0x14c);

// Reader

pub const MAX_DEVICE_NAME_LENGTH: usize = 256;
pub const DPFPDD_MAX_RESOLUTIONS: usize = 10;

pub const DPFPDD_PRIORITY_COOPERATIVE: c_uint = 2;
pub const DPFPDD_PRIORITY_EXCLUSIVE: c_uint = 4;

pub const DPFPDD_STATUS_READY: c_uint = 0;
pub const DPFPDD_STATUS_BUSY: c_uint = 1;
pub const DPFPDD_STATUS_NEED_CALIBRATION: c_uint = 2;
pub const DPFPDD_STATUS_FAILURE: c_uint = 3;

pub const DPFPDD_QUALITY_GOOD: c_int = 0;
pub const DPFPDD_QUALITY_TIMED_OUT: c_int = 1;
pub const DPFPDD_QUALITY_CANCELED: c_int = 1 << 1;
pub const DPFPDD_QUALITY_NO_FINGER: c_int = 1 << 2;
pub const DPFPDD_QUALITY_FAKE_FINGER: c_int = 1 << 3;
pub const DPFPDD_QUALITY_FINGER_TOO_LEFT: c_int = 1 << 4;
pub const DPFPDD_QUALITY_FINGER_TOO_RIGHT: c_int = 1 << 5;
pub const DPFPDD_QUALITY_FINGER_TOO_HIGH: c_int = 1 << 6;
pub const DPFPDD_QUALITY_FINGER_TOO_LOW: c_int = 1 << 7;
pub const DPFPDD_QUALITY_FINGER_OFF_CENTER: c_int = 1 << 8;
pub const DPFPDD_QUALITY_SCAN_SKEWED: c_int = 1 << 9;
pub const DPFPDD_QUALITY_SCAN_TOO_SHORT: c_int = 1 << 10;
pub const DPFPDD_QUALITY_SCAN_TOO_LONG: c_int = 1 << 11;
pub const DPFPDD_QUALITY_SCAN_TOO_SLOW: c_int = 1 << 12;
pub const DPFPDD_QUALITY_SCAN_TOO_FAST: c_int = 1 << 13;
pub const DPFPDD_QUALITY_SCAN_WRONG_DIRECTION: c_int = 1 << 14;
pub const DPFPDD_QUALITY_READER_DIRTY: c_int = 1 << 15;

pub const DPFPDD_IMG_FMT_PIXEL_BUFFER: c_uint = 0;
pub const DPFPDD_IMG_FMT_ANSI381: c_uint = 0x001B0401;
pub const DPFPDD_IMG_FMT_ISOIEC19794: c_uint = 0x01010007;

pub const DPFPDD_IMG_PROC_DEFAULT: c_uint = 0;
pub const DPFPDD_IMG_PROC_PIV: c_uint = 1;
pub const DPFPDD_IMG_PROC_ENHANCED: c_uint = 2;
pub const DPFPDD_IMG_PROC_UNPROCESSED: c_uint = 0x52617749;

pub const DPFPDD_PARMID_ROTATE: c_uint = 0x100;
pub const DPFPDD_PARMID_FINGERDETECT_ENABLE: c_uint = 0x104;
pub const DPFPDD_PARMID_IOMAP: c_uint = 0x105;

// Matching

pub const DPFJ_FMD_ANSI_378_2004: c_int = 0x001B0001;
pub const DPFJ_FMD_ISO_19794_2_2005: c_int = 0x01010001;
pub const DPFJ_FMD_DP_PRE_REG_FEATURES: c_int = 0;
pub const DPFJ_FMD_DP_REG_FEATURES: c_int = 1;
pub const DPFJ_FMD_DP_VER_FEATURES: c_int = 2;

pub const DPFJ_FID_ANSI_381_2004: c_int = 0x001B0401;
pub const DPFJ_FID_ISO_19794_4_2005: c_int = 0x01010007;

pub const DPFJ_POSITION_UNKNOWN: c_int = 0;
pub const DPFJ_POSITION_RTHUMB: c_int = 1;
pub const DPFJ_POSITION_RINDEX: c_int = 2;
pub const DPFJ_POSITION_RMIDDLE: c_int = 3;
pub const DPFJ_POSITION_RRING: c_int = 4;
pub const DPFJ_POSITION_RLITTLE: c_int = 5;
pub const DPFJ_POSITION_LTHUMB: c_int = 6;
pub const DPFJ_POSITION_LINDEX: c_int = 7;
pub const DPFJ_POSITION_LMIDDLE: c_int = 8;
pub const DPFJ_POSITION_LRING: c_int = 9;
pub const DPFJ_POSITION_LLITTLE: c_int = 10;

/// Dissimilarity scores are expressed as a fraction of this value.
pub const DPFJ_PROBABILITY_ONE: c_uint = 0x7FFFFFFF;

// Compression

pub const DPFJ_COMPRESSION_WSQ_NIST: c_int = 1;
pub const DPFJ_COMPRESSION_WSQ_AWARE: c_int = 2;

#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DPFPDD_VER_INFO {
    pub major: c_int,
    pub minor: c_int,
    pub maintenance: c_int,
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct DPFPDD_VERSION {
    pub size: c_uint,
    pub lib_ver: DPFPDD_VER_INFO,
    pub api_ver: DPFPDD_VER_INFO,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct DPFPDD_DEV_INFO {
    pub size: c_uint,
    pub name: [c_char; MAX_DEVICE_NAME_LENGTH],
}

impl Default for DPFPDD_DEV_INFO {
    fn default() -> Self {
        DPFPDD_DEV_INFO {
            size: 0,
            name: [0; MAX_DEVICE_NAME_LENGTH],
        }
    }
}

impl std::fmt::Debug for DPFPDD_DEV_INFO {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name: Vec<u8> = self
            .name
            .iter()
            .take_while(|&&c| c != 0)
            .map(|&c| c as u8)
            .collect();
        f.debug_struct("DPFPDD_DEV_INFO")
            .field("size", &self.size)
            .field("name", &String::from_utf8_lossy(&name))
            .finish()
    }
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct DPFPDD_DEV_STATUS {
    pub size: c_uint,
    pub status: c_uint,
    pub finger_detected: c_int,
    pub data: [c_uchar; 1],
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct DPFPDD_DEV_CAPS {
    pub size: c_uint,
    pub can_capture_image: c_int,
    pub can_stream_image: c_int,
    pub can_extract_features: c_int,
    pub can_match: c_int,
    pub can_identify: c_int,
    pub has_fp_storage: c_int,
    pub indicator_type: c_uint,
    pub has_pwr_mgmt: c_int,
    pub has_calibration: c_int,
    pub piv_compliant: c_int,
    pub resolution_cnt: c_uint,
    pub resolutions: [c_uint; DPFPDD_MAX_RESOLUTIONS],
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DPFPDD_IMAGE_INFO {
    pub size: c_uint,
    pub width: c_uint,
    pub height: c_uint,
    pub res: c_uint,
    pub bpp: c_uint,
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct DPFPDD_CAPTURE_PARAM {
    pub size: c_uint,
    pub image_fmt: c_uint,
    pub image_proc: c_uint,
    pub image_res: c_uint,
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct DPFPDD_CAPTURE_RESULT {
    pub size: c_uint,
    pub success: c_int,
    pub quality: c_int,
    pub score: c_uint,
    pub info: DPFPDD_IMAGE_INFO,
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DPFJ_VER_INFO {
    pub major: c_int,
    pub minor: c_int,
    pub maintenance: c_int,
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct DPFJ_VERSION {
    pub size: c_uint,
    pub lib_ver: DPFJ_VER_INFO,
    pub api_ver: DPFJ_VER_INFO,
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DPFJ_CANDIDATE {
    pub size: c_uint,
    pub fmd_idx: c_uint,
    pub view_idx: c_uint,
}

#[repr(C)]
pub struct dpfpdd_dev {
    _private: [u8; 0],
}

pub type DPFPDD_DEV = *mut dpfpdd_dev;

// dpfpdd

pub type dpfpdd_version = unsafe extern "system" fn(ver: *mut DPFPDD_VERSION) -> c_int;
pub type dpfpdd_init = unsafe extern "system" fn() -> c_int;
pub type dpfpdd_exit = unsafe extern "system" fn() -> c_int;
pub type dpfpdd_query_devices =
    unsafe extern "system" fn(dev_cnt: *mut c_uint, dev_infos: *mut DPFPDD_DEV_INFO) -> c_int;
pub type dpfpdd_open =
    unsafe extern "system" fn(dev_name: *const c_char, pdev: *mut DPFPDD_DEV) -> c_int;
pub type dpfpdd_open_ext = unsafe extern "system" fn(
    dev_name: *const c_char,
    priority: c_uint,
    pdev: *mut DPFPDD_DEV,
) -> c_int;
pub type dpfpdd_close = unsafe extern "system" fn(dev: DPFPDD_DEV) -> c_int;
pub type dpfpdd_get_device_status =
    unsafe extern "system" fn(dev: DPFPDD_DEV, dev_status: *mut DPFPDD_DEV_STATUS) -> c_int;
pub type dpfpdd_get_device_capabilities =
    unsafe extern "system" fn(dev: DPFPDD_DEV, dev_caps: *mut DPFPDD_DEV_CAPS) -> c_int;
pub type dpfpdd_get_parameter = unsafe extern "system" fn(
    dev: DPFPDD_DEV,
    parm_id: c_uint,
    size: c_uint,
    buffer: *mut c_uchar,
) -> c_int;
pub type dpfpdd_set_parameter = unsafe extern "system" fn(
    dev: DPFPDD_DEV,
    parm_id: c_uint,
    size: c_uint,
    buffer: *mut c_uchar,
) -> c_int;
pub type dpfpdd_capture = unsafe extern "system" fn(
    dev: DPFPDD_DEV,
    capture_parm: *mut DPFPDD_CAPTURE_PARAM,
    timeout_cnt: c_uint,
    capture_result: *mut DPFPDD_CAPTURE_RESULT,
    image_size: *mut c_uint,
    image_data: *mut c_uchar,
) -> c_int;
pub type dpfpdd_start_stream = unsafe extern "system" fn(dev: DPFPDD_DEV) -> c_int;
pub type dpfpdd_stop_stream = unsafe extern "system" fn(dev: DPFPDD_DEV) -> c_int;
pub type dpfpdd_get_stream_image = unsafe extern "system" fn(
    dev: DPFPDD_DEV,
    capture_parm: *mut DPFPDD_CAPTURE_PARAM,
    capture_result: *mut DPFPDD_CAPTURE_RESULT,
    image_size: *mut c_uint,
    image_data: *mut c_uchar,
) -> c_int;

// dpfj

pub type dpfj_version = unsafe extern "system" fn(ver: *mut DPFJ_VERSION) -> c_int;
pub type dpfj_create_fmd_from_raw = unsafe extern "system" fn(
    image_data: *const c_uchar,
    image_size: c_uint,
    image_width: c_uint,
    image_height: c_uint,
    image_dpi: c_uint,
    finger_pos: c_int,
    cbeff_id: c_uint,
    fmd_type: c_int,
    fmd: *mut c_uchar,
    fmd_size: *mut c_uint,
) -> c_int;
pub type dpfj_create_fmd_from_fid = unsafe extern "system" fn(
    fid_type: c_int,
    fid: *const c_uchar,
    fid_size: c_uint,
    fmd_type: c_int,
    fmd: *mut c_uchar,
    fmd_size: *mut c_uint,
) -> c_int;
pub type dpfj_fmd_convert = unsafe extern "system" fn(
    fmd1_type: c_int,
    fmd1: *const c_uchar,
    fmd1_size: c_uint,
    fmd2_type: c_int,
    fmd2: *mut c_uchar,
    fmd2_size: *mut c_uint,
) -> c_int;
pub type dpfj_compare = unsafe extern "system" fn(
    fmd1_type: c_int,
    fmd1: *const c_uchar,
    fmd1_size: c_uint,
    fmd1_view_idx: c_uint,
    fmd2_type: c_int,
    fmd2: *const c_uchar,
    fmd2_size: c_uint,
    fmd2_view_idx: c_uint,
    score: *mut c_uint,
) -> c_int;
pub type dpfj_identify = unsafe extern "system" fn(
    fmd1_type: c_int,
    fmd1: *const c_uchar,
    fmd1_size: c_uint,
    fmd1_view_idx: c_uint,
    fmds_type: c_int,
    fmds_cnt: c_uint,
    fmds: *mut *mut c_uchar,
    fmds_size: *mut c_uint,
    threshold_score: c_uint,
    candidate_cnt: *mut c_uint,
    candidates: *mut DPFJ_CANDIDATE,
) -> c_int;
pub type dpfj_start_enrollment = unsafe extern "system" fn(fmd_type: c_int) -> c_int;
pub type dpfj_add_to_enrollment = unsafe extern "system" fn(
    fmd_type: c_int,
    fmd: *const c_uchar,
    fmd_size: c_uint,
    fmd_view_idx: c_uint,
) -> c_int;
pub type dpfj_create_enrollment_fmd =
    unsafe extern "system" fn(fmd: *mut c_uchar, fmd_size: *mut c_uint) -> c_int;
pub type dpfj_finish_enrollment = unsafe extern "system" fn() -> c_int;

// dpfj_compression

pub type dpfj_start_compression = unsafe extern "system" fn() -> c_int;
pub type dpfj_finish_compression = unsafe extern "system" fn() -> c_int;
pub type dpfj_set_wsq_bitrate =
    unsafe extern "system" fn(bitrate_x100: c_uint, tolerance_aw: c_uint) -> c_int;
pub type dpfj_set_wsq_size = unsafe extern "system" fn(size: c_uint, tolerance_aw: c_uint) -> c_int;
pub type dpfj_compress_raw = unsafe extern "system" fn(
    image_data: *const c_uchar,
    image_size: c_uint,
    image_width: c_uint,
    image_height: c_uint,
    image_dpi: c_uint,
    image_bpp: c_uint,
    compression_alg: c_int,
) -> c_int;
pub type dpfj_compress_fid = unsafe extern "system" fn(
    fid_type: c_int,
    fid: *const c_uchar,
    fid_size: c_uint,
    compression_alg: c_int,
) -> c_int;
pub type dpfj_expand_raw = unsafe extern "system" fn(
    image_data: *const c_uchar,
    image_size: c_uint,
    compression_alg: c_int,
    image_width: *mut c_uint,
    image_height: *mut c_uint,
    image_dpi: *mut c_uint,
    image_bpp: *mut c_uint,
) -> c_int;
pub type dpfj_expand_fid = unsafe extern "system" fn(
    fid_type: c_int,
    fid: *const c_uchar,
    fid_size: c_uint,
    compression_alg: c_int,
) -> c_int;
pub type dpfj_get_processed_data =
    unsafe extern "system" fn(image_data: *mut c_uchar, image_size: *mut c_uint) -> c_int;

use std::ffi::CStr;
use std::ptr;

use dpfp_sys::{
    CompressionLibrary, DeviceLibrary, MatchingLibrary, DPFJ_CANDIDATE, DPFJ_VERSION,
    DPFPDD_CAPTURE_PARAM, DPFPDD_CAPTURE_RESULT, DPFPDD_DEV_CAPS, DPFPDD_DEV_INFO,
    DPFPDD_DEV_STATUS, DPFPDD_VERSION,
};
use libc::{c_int, c_uchar, c_uint};

use crate::api::{CompressionApi, MatchApi, RawDevice, ReaderApi};

fn out_ptr<T>(buffer: Option<&mut [T]>) -> *mut T {
    buffer.map_or(ptr::null_mut(), |buffer| buffer.as_mut_ptr())
}

// Every call below passes pointers derived from live references or slices whose length
// matches the size argument handed to the library.

impl ReaderApi for DeviceLibrary {
    fn version(&self, version: &mut DPFPDD_VERSION) -> c_int {
        unsafe { (self.dpfpdd_version)(version) }
    }

    fn init(&self) -> c_int {
        unsafe { (self.dpfpdd_init)() }
    }

    fn exit(&self) -> c_int {
        unsafe { (self.dpfpdd_exit)() }
    }

    fn query_devices(&self, count: &mut u32, devices: Option<&mut [DPFPDD_DEV_INFO]>) -> c_int {
        unsafe { (self.dpfpdd_query_devices)(count, out_ptr(devices)) }
    }

    fn open(&self, name: &CStr, priority: Option<u32>, device: &mut RawDevice) -> c_int {
        match priority {
            None => unsafe { (self.dpfpdd_open)(name.as_ptr(), &mut device.0) },
            Some(priority) => unsafe {
                (self.dpfpdd_open_ext)(name.as_ptr(), priority, &mut device.0)
            },
        }
    }

    fn close(&self, device: RawDevice) -> c_int {
        unsafe { (self.dpfpdd_close)(device.0) }
    }

    fn device_status(&self, device: RawDevice, status: &mut DPFPDD_DEV_STATUS) -> c_int {
        unsafe { (self.dpfpdd_get_device_status)(device.0, status) }
    }

    fn capabilities(&self, device: RawDevice, caps: &mut DPFPDD_DEV_CAPS) -> c_int {
        unsafe { (self.dpfpdd_get_device_capabilities)(device.0, caps) }
    }

    fn get_parameter(&self, device: RawDevice, id: u32, buffer: &mut [u8]) -> c_int {
        unsafe {
            (self.dpfpdd_get_parameter)(device.0, id, buffer.len() as c_uint, buffer.as_mut_ptr())
        }
    }

    fn set_parameter(&self, device: RawDevice, id: u32, buffer: &[u8]) -> c_int {
        // The library takes a mutable pointer but only reads the value.
        unsafe {
            (self.dpfpdd_set_parameter)(
                device.0,
                id,
                buffer.len() as c_uint,
                buffer.as_ptr() as *mut c_uchar,
            )
        }
    }

    fn capture(
        &self,
        device: RawDevice,
        param: &DPFPDD_CAPTURE_PARAM,
        timeout_ms: u32,
        result: &mut DPFPDD_CAPTURE_RESULT,
        size: &mut u32,
        image: Option<&mut [u8]>,
    ) -> c_int {
        let mut param = *param;
        unsafe {
            (self.dpfpdd_capture)(device.0, &mut param, timeout_ms, result, size, out_ptr(image))
        }
    }

    fn start_stream(&self, device: RawDevice) -> c_int {
        unsafe { (self.dpfpdd_start_stream)(device.0) }
    }

    fn stop_stream(&self, device: RawDevice) -> c_int {
        unsafe { (self.dpfpdd_stop_stream)(device.0) }
    }

    fn stream_image(
        &self,
        device: RawDevice,
        param: &DPFPDD_CAPTURE_PARAM,
        result: &mut DPFPDD_CAPTURE_RESULT,
        size: &mut u32,
        image: Option<&mut [u8]>,
    ) -> c_int {
        let mut param = *param;
        unsafe {
            (self.dpfpdd_get_stream_image)(device.0, &mut param, result, size, out_ptr(image))
        }
    }
}

impl MatchApi for MatchingLibrary {
    fn version(&self, version: &mut DPFJ_VERSION) -> c_int {
        unsafe { (self.dpfj_version)(version) }
    }

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
    ) -> c_int {
        unsafe {
            (self.dpfj_create_fmd_from_raw)(
                image.as_ptr(),
                image.len() as c_uint,
                width,
                height,
                dpi,
                finger_position,
                cbeff_id,
                fmd_type,
                out_ptr(fmd),
                fmd_size,
            )
        }
    }

    fn create_fmd_from_fid(
        &self,
        fid_type: c_int,
        fid: &[u8],
        fmd_type: c_int,
        fmd: Option<&mut [u8]>,
        fmd_size: &mut u32,
    ) -> c_int {
        unsafe {
            (self.dpfj_create_fmd_from_fid)(
                fid_type,
                fid.as_ptr(),
                fid.len() as c_uint,
                fmd_type,
                out_ptr(fmd),
                fmd_size,
            )
        }
    }

    fn fmd_convert(
        &self,
        from_type: c_int,
        fmd: &[u8],
        to_type: c_int,
        converted: Option<&mut [u8]>,
        converted_size: &mut u32,
    ) -> c_int {
        unsafe {
            (self.dpfj_fmd_convert)(
                from_type,
                fmd.as_ptr(),
                fmd.len() as c_uint,
                to_type,
                out_ptr(converted),
                converted_size,
            )
        }
    }

    fn compare(
        &self,
        first_type: c_int,
        first: &[u8],
        first_view: u32,
        second_type: c_int,
        second: &[u8],
        second_view: u32,
        score: &mut u32,
    ) -> c_int {
        unsafe {
            (self.dpfj_compare)(
                first_type,
                first.as_ptr(),
                first.len() as c_uint,
                first_view,
                second_type,
                second.as_ptr(),
                second.len() as c_uint,
                second_view,
                score,
            )
        }
    }

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
    ) -> c_int {
        // The gallery arrays are declared mutable but are only read.
        let mut pointers: Vec<*mut c_uchar> = gallery
            .iter()
            .map(|fmd| fmd.as_ptr() as *mut c_uchar)
            .collect();
        let mut sizes: Vec<c_uint> = gallery.iter().map(|fmd| fmd.len() as c_uint).collect();

        unsafe {
            (self.dpfj_identify)(
                probe_type,
                probe.as_ptr(),
                probe.len() as c_uint,
                probe_view,
                gallery_type,
                gallery.len() as c_uint,
                pointers.as_mut_ptr(),
                sizes.as_mut_ptr(),
                threshold,
                candidate_count,
                candidates.as_mut_ptr(),
            )
        }
    }

    fn start_enrollment(&self, fmd_type: c_int) -> c_int {
        unsafe { (self.dpfj_start_enrollment)(fmd_type) }
    }

    fn add_to_enrollment(&self, fmd_type: c_int, fmd: &[u8], view: u32) -> c_int {
        unsafe { (self.dpfj_add_to_enrollment)(fmd_type, fmd.as_ptr(), fmd.len() as c_uint, view) }
    }

    fn create_enrollment_fmd(&self, fmd: Option<&mut [u8]>, fmd_size: &mut u32) -> c_int {
        unsafe { (self.dpfj_create_enrollment_fmd)(out_ptr(fmd), fmd_size) }
    }

    fn finish_enrollment(&self) -> c_int {
        unsafe { (self.dpfj_finish_enrollment)() }
    }
}

impl CompressionApi for CompressionLibrary {
    fn start_compression(&self) -> c_int {
        unsafe { (self.dpfj_start_compression)() }
    }

    fn finish_compression(&self) -> c_int {
        unsafe { (self.dpfj_finish_compression)() }
    }

    fn set_wsq_bitrate(&self, bitrate_x100: u32, tolerance_aw: u32) -> c_int {
        unsafe { (self.dpfj_set_wsq_bitrate)(bitrate_x100, tolerance_aw) }
    }

    fn set_wsq_size(&self, size: u32, tolerance_aw: u32) -> c_int {
        unsafe { (self.dpfj_set_wsq_size)(size, tolerance_aw) }
    }

    fn compress_raw(
        &self,
        image: &[u8],
        width: u32,
        height: u32,
        dpi: u32,
        bpp: u32,
        algorithm: c_int,
    ) -> c_int {
        unsafe {
            (self.dpfj_compress_raw)(
                image.as_ptr(),
                image.len() as c_uint,
                width,
                height,
                dpi,
                bpp,
                algorithm,
            )
        }
    }

    fn compress_fid(&self, fid_type: c_int, fid: &[u8], algorithm: c_int) -> c_int {
        unsafe { (self.dpfj_compress_fid)(fid_type, fid.as_ptr(), fid.len() as c_uint, algorithm) }
    }

    fn expand_raw(
        &self,
        data: &[u8],
        algorithm: c_int,
        width: &mut u32,
        height: &mut u32,
        dpi: &mut u32,
        bpp: &mut u32,
    ) -> c_int {
        unsafe {
            (self.dpfj_expand_raw)(
                data.as_ptr(),
                data.len() as c_uint,
                algorithm,
                width,
                height,
                dpi,
                bpp,
            )
        }
    }

    fn expand_fid(&self, fid_type: c_int, data: &[u8], algorithm: c_int) -> c_int {
        unsafe { (self.dpfj_expand_fid)(fid_type, data.as_ptr(), data.len() as c_uint, algorithm) }
    }

    fn processed_data(&self, data: Option<&mut [u8]>, size: &mut u32) -> c_int {
        unsafe { (self.dpfj_get_processed_data)(out_ptr(data), size) }
    }
}

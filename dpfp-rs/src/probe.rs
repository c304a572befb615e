use libc::c_int;
use tracing::trace;

use crate::{DpfpError, Operation, Status};

/// Output of a buffer-producing call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Probed {
    pub data: Vec<u8>,
    /// Size reported by the probing call.
    pub required_size: usize,
}

/// Runs a buffer-producing vendor call with the two-phase size protocol.
///
/// `call` receives the output buffer (`None` on the probing call) and the size in/out
/// parameter, and returns the native status. The first invocation passes no buffer and a
/// size of zero; the library answers `MoreData` (or `Success`) with the required size. The
/// second invocation passes a buffer of exactly that size. The returned data is truncated
/// to the size written by the second call.
///
/// `MoreData` with a zero size, or `MoreData` on the fetch, are errors: the call is never
/// retried with a larger buffer.
pub fn fetch_sized<F>(context: Operation, mut call: F) -> crate::Result<Probed>
where
    F: FnMut(Option<&mut [u8]>, &mut u32) -> c_int,
{
    let mut size = 0u32;
    match Status::from(call(None, &mut size)) {
        Status::Success if size == 0 => {
            trace!(%context, "nothing to fetch");
            return Ok(Probed {
                data: Vec::new(),
                required_size: 0,
            });
        }
        Status::Success | Status::MoreData => {}
        status => return Err(DpfpError::from_status(context, status)),
    }

    if size == 0 {
        return Err(DpfpError::EmptyProbe(context));
    }

    let required_size = size as usize;
    trace!(%context, required_size, "size probed");
    let mut buffer = vec![0u8; required_size];
    match Status::from(call(Some(&mut buffer), &mut size)) {
        Status::Success => {
            buffer.truncate((size as usize).min(required_size));
            Ok(Probed {
                data: buffer,
                required_size,
            })
        }
        Status::MoreData => Err(DpfpError::BufferTooSmall {
            context,
            allocated: required_size,
            required: size as usize,
        }),
        status => Err(DpfpError::from_status(context, status)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dpfp_sys as sys;

    fn producer(payload: &'static [u8]) -> impl FnMut(Option<&mut [u8]>, &mut u32) -> c_int {
        move |buffer, size| match buffer {
            None => {
                *size = payload.len() as u32;
                sys::DPFJ_E_MORE_DATA
            }
            Some(buffer) if buffer.len() < payload.len() => {
                *size = payload.len() as u32;
                sys::DPFJ_E_MORE_DATA
            }
            Some(buffer) => {
                buffer[..payload.len()].copy_from_slice(payload);
                *size = payload.len() as u32;
                sys::DPFJ_SUCCESS
            }
        }
    }

    #[test]
    fn fetches_exactly_the_probed_size() {
        let probed = fetch_sized(Operation::Capture, producer(b"FMR\0abc")).unwrap();
        assert_eq!(probed.data, b"FMR\0abc");
        assert_eq!(probed.required_size, 7);
    }

    #[test]
    fn second_call_receives_buffer_of_probed_size() {
        let mut seen = Vec::new();
        fetch_sized(Operation::Compress, |buffer, size| {
            seen.push((buffer.map(|b| b.len()), *size));
            *size = 16;
            if seen.len() == 1 {
                sys::DPFJ_E_MORE_DATA
            } else {
                sys::DPFJ_SUCCESS
            }
        })
        .unwrap();
        assert_eq!(seen, vec![(None, 0), (Some(16), 16)]);
    }

    #[test]
    fn truncates_to_written_size() {
        let probed = fetch_sized(Operation::ProcessedData, |buffer, size| {
            if buffer.is_none() {
                *size = 10;
            } else {
                *size = 4;
            }
            sys::DPFJ_SUCCESS
        })
        .unwrap();
        assert_eq!(probed.data.len(), 4);
        assert_eq!(probed.required_size, 10);
    }

    #[test]
    fn success_without_size_is_empty() {
        let probed = fetch_sized(Operation::ProcessedData, |_, _| sys::DPFJ_SUCCESS).unwrap();
        assert!(probed.data.is_empty());
    }

    #[test]
    fn more_data_without_size_is_an_error() {
        let err = fetch_sized(Operation::Capture, |_, _| sys::DPFJ_E_MORE_DATA).unwrap_err();
        assert!(matches!(err, DpfpError::EmptyProbe(Operation::Capture)));
    }

    #[test]
    fn more_data_on_fetch_is_an_error() {
        let err = fetch_sized(Operation::CreateFromRaw, |_, size| {
            *size += 8;
            sys::DPFJ_E_MORE_DATA
        })
        .unwrap_err();
        match err {
            DpfpError::BufferTooSmall {
                allocated,
                required,
                ..
            } => {
                assert_eq!(allocated, 8);
                assert_eq!(required, 16);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn native_failure_on_probe_surfaces() {
        let err = fetch_sized(Operation::Capture, |_, _| sys::DPFPDD_E_DEVICE_FAILURE).unwrap_err();
        assert_eq!(err.status(), Some(Status::DeviceFailure));
    }
}

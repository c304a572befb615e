use std::ffi::OsStr;
use std::fmt;

use libloading::Library;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot load library `{path}`: {source}")]
    Open {
        path: String,
        source: libloading::Error,
    },
    #[error("library `{library}` has no symbol `{symbol}`: {source}")]
    Symbol {
        library: &'static str,
        symbol: &'static str,
        source: libloading::Error,
    },
}

unsafe fn symbol<T: Copy>(
    library: &Library,
    owner: &'static str,
    name: &'static str,
) -> Result<T, LoadError> {
    library
        .get::<T>(name.as_bytes())
        .map(|symbol| *symbol)
        .map_err(|source| LoadError::Symbol {
            library: owner,
            symbol: name,
            source,
        })
}

macro_rules! native_library {
    ($(#[$meta:meta])* $name:ident, $stem:expr, { $($sym:ident),* $(,)? }) => {
        $(#[$meta])*
        pub struct $name {
            $(pub $sym: crate::bindings::$sym,)*
            _library: Library,
        }

        impl $name {
            /// File stem of the library, without platform prefix and extension.
            pub const FILE_STEM: &'static str = $stem;

            /// Loads the library by its platform file name from the loader search path.
            pub fn load() -> Result<Self, LoadError> {
                Self::load_from(libloading::library_filename(Self::FILE_STEM))
            }

            /// Loads the library from an explicit path and resolves every entry point.
            pub fn load_from<P: AsRef<OsStr>>(path: P) -> Result<Self, LoadError> {
                let path = path.as_ref();
                // Loading runs the library initialisers; the vendor libraries have none
                // with observable side effects beyond their own state.
                let library = unsafe { Library::new(path) }.map_err(|source| LoadError::Open {
                    path: path.to_string_lossy().into_owned(),
                    source,
                })?;

                Ok($name {
                    $($sym: unsafe { symbol(&library, $stem, stringify!($sym))? },)*
                    _library: library,
                })
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_struct(stringify!($name)).finish_non_exhaustive()
            }
        }
    };
}

native_library!(
    /// Entry points of the reader library (`dpfpdd`).
    DeviceLibrary, "dpfpdd", {
        dpfpdd_version,
        dpfpdd_init,
        dpfpdd_exit,
        dpfpdd_query_devices,
        dpfpdd_open,
        dpfpdd_open_ext,
        dpfpdd_close,
        dpfpdd_get_device_status,
        dpfpdd_get_device_capabilities,
        dpfpdd_get_parameter,
        dpfpdd_set_parameter,
        dpfpdd_capture,
        dpfpdd_start_stream,
        dpfpdd_stop_stream,
        dpfpdd_get_stream_image,
    }
);

native_library!(
    /// Entry points of the feature extraction and matching library (`dpfj`).
    MatchingLibrary, "dpfj", {
        dpfj_version,
        dpfj_create_fmd_from_raw,
        dpfj_create_fmd_from_fid,
        dpfj_fmd_convert,
        dpfj_compare,
        dpfj_identify,
        dpfj_start_enrollment,
        dpfj_add_to_enrollment,
        dpfj_create_enrollment_fmd,
        dpfj_finish_enrollment,
    }
);

native_library!(
    /// Entry points of the WSQ compression library (`dpfj_compression`).
    CompressionLibrary, "dpfj_compression", {
        dpfj_start_compression,
        dpfj_finish_compression,
        dpfj_set_wsq_bitrate,
        dpfj_set_wsq_size,
        dpfj_compress_raw,
        dpfj_compress_fid,
        dpfj_expand_raw,
        dpfj_expand_fid,
        dpfj_get_processed_data,
    }
);

#![warn(clippy::all)]

mod bindings {
    #![allow(
        non_upper_case_globals,
        non_camel_case_types,
        non_snake_case,
        clippy::unreadable_literal
    )]
    include!("bindings.rs");
}

mod library;

pub use bindings::*;
pub use library::{CompressionLibrary, DeviceLibrary, LoadError, MatchingLibrary};

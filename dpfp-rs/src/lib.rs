#![warn(clippy::all)]

pub mod api;
mod device;
mod enrollment;
mod errors;
mod finger;
mod fmd;
mod format;
mod matcher;
mod native;
mod probe;
mod raster;
mod reader;
mod score;
mod status;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
mod wsq;

pub use crate::{
    device::*, enrollment::*, errors::*, finger::*, fmd::*, format::*, matcher::*,
    probe::*, raster::*, reader::*, score::*, status::*, wsq::*,
};

pub type Result<T> = std::result::Result<T, DpfpError>;

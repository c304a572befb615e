#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod files;
pub mod flows;
pub mod logging;
pub mod quality;
pub mod store;
pub mod worker;

pub use crate::{
    config::Config,
    error::{Error, Result},
    flows::{Event, NewUser, Station},
    store::Store,
};

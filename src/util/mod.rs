//! Utility types shared by both translation directions.
//!
//! - [`Error`] / [`Result`] - Error handling
//! - [`ConversionLog`] - Per-call cumulative log
//! - [`SearchPath`] - Resource file resolution

mod error;
mod log;
mod search;

pub use error::*;
pub use log::*;
pub use search::*;

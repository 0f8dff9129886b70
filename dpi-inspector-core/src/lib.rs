#![forbid(unsafe_code)]

pub mod api;
pub mod capture;
pub mod classify;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod extract;
pub mod flow;
pub mod offline;
pub mod parse;
pub mod rules;
pub mod stats;
pub mod telemetry;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use config::{load_from_path, Config};
pub use error::{DpiError, Result};

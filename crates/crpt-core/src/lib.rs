//! crpt-core: configuration, error types, and batch result types shared by crpt crates

pub mod config;
pub mod error;
pub mod types;

pub use error::{CrptError, CrptResult};

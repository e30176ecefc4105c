//! predjit-common: shared error taxonomy and compiler configuration.

pub mod config;
pub mod error;

pub use config::{JitConfig, OptLevel};
pub use error::{JitError, JitResult};

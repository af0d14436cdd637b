//! Common utilities and types shared across ringguard components.

pub mod error;
pub mod logging;

pub use error::{Error, Result};

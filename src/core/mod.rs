//! Core utilities: configuration, errors, logging, token generation.

pub mod config;
pub mod error;
pub mod logging;
pub mod token;

pub use error::{AppError, AppResult};
pub use logging::init_logger;

#![doc = include_str!("../README.md")]

// -----------------------------------------------------------------------------
// Modules

pub mod engine;
pub mod error;

// -----------------------------------------------------------------------------
// Top-Level exports

pub use engine::{Factory, UnpackEngine};
pub use error::{FactoryError, RegistrationError, UnpackError};

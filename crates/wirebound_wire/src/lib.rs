#![doc = include_str!("../README.md")]

// -----------------------------------------------------------------------------
// Modules

pub mod grammar;
pub mod hash;
pub mod path;
pub mod value;

// -----------------------------------------------------------------------------
// Top-Level exports

pub use grammar::{MalformedWireError, WireForm};
pub use value::{Packable, Placeholder, Value};

//! Flash chip types and database
//!
//! This module describes the parts probing can recognize: their JEDEC
//! identity, erase geometry and feature flags.

mod builtin;
mod database;
mod features;
mod types;

#[cfg(feature = "std")]
mod loader;

pub use database::ChipDatabase;
pub use features::Features;
pub use types::*;

#[cfg(feature = "std")]
pub use loader::*;

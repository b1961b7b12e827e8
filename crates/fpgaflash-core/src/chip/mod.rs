//! Flash chip geometry and database
//!
//! This module provides the geometry description used by the driver and
//! planner, as well as a database of known chips.

mod geometry;

#[cfg(feature = "std")]
mod database;

pub use geometry::FlashGeometry;

#[cfg(feature = "std")]
pub use database::*;

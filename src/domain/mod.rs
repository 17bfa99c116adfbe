//! Domain types and the static pricing catalog.

pub mod assessment;
pub mod catalog;

pub use assessment::*;

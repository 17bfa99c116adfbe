//! Field-assessment worksheet service.
//!
//! Accepts one completed assessment per request and writes a formatted
//! worksheet (header, bilingual scope, sketch, priced line-item table,
//! photo gallery) into a spreadsheet document for downstream PDF
//! generation.

pub mod api;
pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod logging;
pub mod middleware;
pub mod pipeline;
pub mod routes;
pub mod services;

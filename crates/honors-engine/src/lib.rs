//! Library crate for the school administration platform's honor
//! qualification engine and its service plumbing.

pub mod config;
pub mod error;
pub mod honors;
pub mod telemetry;

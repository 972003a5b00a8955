//! Utilities shared by the ChatterX binaries: logging setup and time handling.

pub mod logger;
pub mod time;

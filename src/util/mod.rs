//! Utility types and functions

pub mod config;
pub mod diagnostic;
pub mod logger;

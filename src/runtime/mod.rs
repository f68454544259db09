//! Runtime system
//!
//! This module contains buffer management, dependency resolution and the
//! serial execution engine.

pub mod memory;
pub mod resolver;
pub mod scheduler;

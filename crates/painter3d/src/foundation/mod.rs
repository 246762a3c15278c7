//! Foundation utilities shared by every subsystem
//!
//! Math types and logging. Everything here is dependency-light and free of
//! rendering policy.

pub mod logging;
pub mod math;

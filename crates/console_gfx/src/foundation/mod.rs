//! Foundation utilities shared across the crate

pub mod math;
pub mod time;

//! Actuator drivers and motion primitives.

pub mod actuator;
pub mod limit_switch;
pub mod motion;
pub mod servo;

//! HTML rendering of the display step.

pub mod views;

//! Small shared helpers.

pub mod sleep;

pub use sleep::*;

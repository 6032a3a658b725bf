//! Processors module - domain-specific processing logic
//!
//! - `image`: decode/resize/encode and blur hash primitives
//! - `setup`: logger and folder initialization

pub mod image;
pub mod setup;

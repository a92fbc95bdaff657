//! Built-in command sets.
//!
//! Each module exposes `register`, which adds its descriptors to a builder.

pub mod admin;
pub mod calc;
pub mod meta;
pub mod snippet;
pub mod text;

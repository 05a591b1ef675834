#![deny(missing_docs)]

//! A type system for Quack
//!
//! This crate contains the host-side description of the engine's logical types: the closed set of
//! type tags, their parameters (decimal width and scale, enum dictionaries, child types of nested
//! types) and the storage layout each of them uses inside a vector.

pub use decimal::*;
pub use logical::*;
pub use type_id::*;

mod decimal;
mod logical;
mod type_id;

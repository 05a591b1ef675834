#![deny(missing_docs)]

//! Host-side scalar values for Quack.
//!
//! [`Value`] is what a single slot of a vector decodes to and what the appender and parameter
//! binding accept. The wrapper types for decimals, temporal values, bit strings and varints keep
//! the engine's exact representation so that a decoded value can be written back unchanged.

pub use bit::*;
pub use decimal::*;
pub use temporal::*;
pub use value::*;
pub use varint::*;

mod bit;
mod decimal;
mod display;
mod json;
mod temporal;
mod value;
mod varint;

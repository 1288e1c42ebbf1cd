//! Target display model: transfer function and viewing geometry.

pub mod function;
pub mod size;

pub use function::*;
pub use size::*;

//! Output language support: the structured writer and literal escaping.

pub mod escape;
pub mod writer;

pub use writer::{BffWriter, EmitError, Op};

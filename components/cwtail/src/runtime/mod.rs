//! Command execution: wiring backends, operations and stdout together.

pub mod output;
pub mod runtime;

//! Context assembly and the grounding contract

pub mod assembler;
pub mod grounding;

pub use assembler::{ContextAssembler, ContextBundle};
pub use grounding::GroundingGate;

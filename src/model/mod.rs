//! Model structure: architecture parameters and tensor roles

pub mod architecture;
pub mod classify;

pub use architecture::ArchitectureDescriptor;
pub use classify::{classify, TensorClassification, TensorRole};

//! In-memory collaborators for tests of this and the dependent crates.

pub mod mocks;

pub use mocks::*;

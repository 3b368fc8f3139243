//! Testing utilities and mock implementations
//!
//! Lets the dispatcher, synchronizer and handlers be exercised without a
//! Notion workspace, an LLM provider or a search API.

pub mod mocks;

pub use mocks::*;

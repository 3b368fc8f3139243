//! Language model access for the task handlers

pub mod provider;
pub mod providers;

pub use provider::*;
pub use providers::*;

//! Queue processing
//!
//! [`TaskDispatcher`] drives pages through their status lifecycle and
//! [`Poller`] runs it on an interval until shutdown.

pub mod dispatch;
pub mod poller;
pub mod shutdown;

pub use dispatch::{CycleReport, DispatchSettings, PageOutcome, PageReport, TaskDispatcher};
pub use poller::Poller;
pub use shutdown::{wait_for_signal, Shutdown};

//! Result delivery into page content
//!
//! Converts handler output into bounded content blocks, replaces page bodies
//! and updates the status/summary properties.

pub mod builder;
pub mod chunker;
pub mod comments;
pub mod status;
pub mod sync;

pub use builder::{BlockBuilder, RenderRequest};
pub use chunker::{chunk, MAX_CHUNK, STORE_TEXT_LIMIT};
pub use comments::{build_feedback_prompt, collect_comments};
pub use status::StatusFieldUpdater;
pub use sync::{PageSynchronizer, SyncError, SyncOutcome};

//! Notion task runner
//!
//! Polls a Notion database for pages whose status asks for work, hands each
//! page title (or its comments, when iterating) to an LLM-backed handler and
//! writes the result back into the page body.
//!
//! # Overview
//!
//! - [`notion`]: the document store seam and its Notion REST client
//! - [`content`]: chunking, block assembly and body synchronization
//! - [`handlers`]: routing between the research pipeline and plain completion
//! - [`dispatcher`]: the per-page state machine and the polling loop
//! - [`observability`]: logging, metrics and the health endpoint
//!
//! # Quick Start
//!
//! ```rust
//! use notion_taskrunner::content::BlockBuilder;
//! use notion_taskrunner::notion::ContentBlock;
//!
//! let blocks = BlockBuilder::default().build("Summary", Some("steps"), false);
//! assert_eq!(blocks[0], ContentBlock::heading("AI Response"));
//! assert!(blocks.iter().any(ContentBlock::is_divider));
//! ```

pub mod config;
pub mod content;
pub mod dispatcher;
pub mod error;
pub mod handlers;
pub mod llm;
pub mod notion;
pub mod observability;
pub mod testing;

pub use config::{ConfigError, StatusNames, TaskRunnerConfig};
pub use dispatcher::{CycleReport, PageOutcome, PageReport, Poller, TaskDispatcher};
pub use error::{TaskRunnerError, TaskRunnerResult};
pub use handlers::{HandlerOutput, TaskHandler};
pub use notion::{DocumentStore, NotionClient, PageStatus, StoreError};

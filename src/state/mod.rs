//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `VisitedSet`: claimed URLs, optionally journaled to disk for resumable crawls
//! - `CrawlTask`: a queued `(url, depth)` unit of work
//! - `TaskOutcome`: how each dequeued task ended

mod outcome;
mod visited;

pub use outcome::TaskOutcome;
pub use visited::{CrawlTask, StatePaths, VisitedSet};

//! Integration tests for Driftnet
//!
//! Crawls run end-to-end against wiremock servers or an in-process scripted
//! fetcher.

mod common;
mod crawl_tests;
mod engine_tests;
mod resume_tests;
mod store_tests;

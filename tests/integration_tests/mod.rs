//! Integration tests module
//!
//! End-to-end tests of the scraper against an in-memory lookup form
//! (`common::FakeSite`):
//! - One organization search, from fresh form to extracted rows
//! - Results grid pagination
//! - Whole runs with session loss, resume, limits and interruption

pub mod coordinator_test;
pub mod property_test;
pub mod search_test;

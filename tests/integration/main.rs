//! Integration tests for Docent
//!
//! These tests run against wiremock servers standing in for a real site.

mod crawl_tests;
mod pipeline_tests;

//! Integration tests for Sitescribe

mod crawl_tests;
mod output_tests;

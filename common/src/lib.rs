pub mod config;

/// Common utilities shared across the storefront workspace.
///
/// This crate provides shared functionality used by the `retail` and
/// `shop` crates:
///
/// - Configuration loading for the server executable
/// - Shared test utilities and unique-id helpers

// Test helpers module - available for both development and test builds
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

// Re-export commonly used test utilities for easier access
#[cfg(any(test, feature = "test-helpers"))]
pub use test_helpers::{
    generate_unique_id, get_test_database_url, get_test_in_memory_database_url, TestError,
    TestResult,
};

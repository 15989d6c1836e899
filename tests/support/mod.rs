//! Shared utilities for integration tests.

pub mod fake_browser;

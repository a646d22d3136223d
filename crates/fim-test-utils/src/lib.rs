//! Shared test utilities for the file integrity monitor workspace.
//!
//! This crate provides standardised fixtures so crate test suites do not
//! each build their own temporary trees. It is a dev-dependency only, never
//! published.
//!
//! # Modules
//!
//! - [`tree`]: [`TestTree`], a monitored directory plus a separate engine
//!   state directory inside one temporary root
//! - [`wait`]: polling helpers for asynchronous (watch mode) assertions

pub mod tree;
pub mod wait;

pub use tree::TestTree;
pub use wait::wait_until;

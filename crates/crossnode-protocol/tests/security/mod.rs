//! Security tests for replay protection and request/response correlation
//!
//! These tests verify:
//! - Replayed requests and responses are refused
//! - Concurrent deliveries of one message are accepted exactly once
//! - A response consumes its correlation entry
//! - Expired correlation entries are not served

pub mod correlation_tests;
pub mod replay_tests;

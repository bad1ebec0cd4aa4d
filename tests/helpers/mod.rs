// ABOUTME: Test helper module exports for integration tests
// ABOUTME: Each integration test crate pulls in only what it needs

#![allow(dead_code)]

pub mod axum_test;

//! Integration test binary -- all integration tests consolidated into a single
//! binary to reduce link time.

// Allow unwrap/expect in test code
#![allow(clippy::unwrap_used, clippy::expect_used)]

mod helpers;

mod file_queue_lifecycle;
mod profile_identity_startup;
mod tagged_payloads;

//! Integration tests for pack verification.
//!
//! Run with: `cargo test --test integration`

mod cli;
mod verify_scenarios;

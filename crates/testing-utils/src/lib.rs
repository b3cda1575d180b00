//! # Scheduler Testing Utils
//!
//! Shared testing utilities for the trigger scheduling engine.
//!
//! ## Features
//!
//! - **Controllable Clock**: `ManualClock` drives scanner and ring decisions from tests
//! - **Test Doubles**: recording dispatcher, flaky job store and handler doubles
//! - **Test Data Builders**: `JobBuilder` for job definitions with sensible defaults
//! - **Helpers**: polling utilities that cooperate with paused tokio time
//!
//! ## Usage
//!
//! ```toml
//! [dev-dependencies]
//! scheduler-testing-utils = { path = "../testing-utils" }
//! ```

pub mod builders;
pub mod helpers;
pub mod mocks;

pub use builders::*;
pub use helpers::*;
pub use mocks::*;

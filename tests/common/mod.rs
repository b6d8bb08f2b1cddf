//! Common test utilities for video-dl integration tests

#[allow(dead_code)]
pub mod assertions;
#[allow(dead_code)]
pub mod fake_tool;

#[allow(unused_imports)]
pub use assertions::*;
pub use fake_tool::*;

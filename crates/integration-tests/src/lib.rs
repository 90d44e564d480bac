//! Test doubles and harness for exercising the full router without any
//! external system: in-memory implementations of every port plus a
//! [`harness::TestApp`] that wires them into the real service stack.

#[cfg(feature = "web-axum")]
pub mod harness;
pub mod memory;

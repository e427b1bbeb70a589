//! Strata schema cluster node
//!
//! Library half of the server binary so integration tests can drive the
//! same startup path as `main`.

pub mod lifecycle;
pub mod logging;

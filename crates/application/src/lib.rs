//! sans application layer
//!
//! Ports implemented by the infrastructure crate, the pure classification
//! and arbitration services, and the per-query resolution use case.
pub mod metrics;
pub mod ports;
pub mod services;
pub mod use_cases;

//! Process-wide logging setup.

/// Tracing configuration (filters, layers).
pub mod tracing;

pub use self::tracing::{default_directive, init};

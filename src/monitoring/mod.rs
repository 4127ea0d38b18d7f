/*!
 * Monitoring Module
 * Metrics registry and tracing setup
 */

pub mod metrics;
pub mod tracer;

// Re-export for convenience
pub use metrics::{Metrics, MetricsSnapshot};
pub use tracer::init_tracing;

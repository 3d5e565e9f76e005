// Observability: metrics recorded by the import pipeline

pub mod metrics;

pub use metrics::MetricName;

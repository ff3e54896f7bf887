mod registry;

pub use registry::Metrics;

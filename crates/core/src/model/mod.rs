pub mod otlp;
pub mod span;
pub mod waterfall;

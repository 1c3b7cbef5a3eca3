pub mod attrs;
pub mod flatten;
pub mod hierarchy;
pub mod normalize;
pub mod otlp;
pub mod pipeline;
pub mod server;
pub mod tempo;

pub use pipeline::{build_waterfall, build_waterfall_tree};

pub mod config;
pub mod io;
pub mod metrics;
pub mod pipeline;
pub mod sample;
pub mod segment;

pub use config::*;
pub use metrics::*;
pub use sample::*;

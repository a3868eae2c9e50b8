pub mod config;
pub mod memory;
pub mod options;
pub mod pipeline;
pub mod resolver;

pub use config::Config;
pub use options::{IndexOptions, SearchOptions};

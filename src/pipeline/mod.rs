/// Ordered execution of the pipeline stages
pub mod executor;

pub use executor::{Pipeline, PipelineOptions, PipelineReport};

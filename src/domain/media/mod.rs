pub mod pipeline;
pub mod references;
pub mod validate;
pub mod variants;

pub use pipeline::MediaPipeline;

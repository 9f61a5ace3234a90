pub mod config;
pub mod error;
pub mod llm;
pub mod models;
pub mod pipeline;
pub mod service;
pub mod store;

pub use config::ServiceConfig;
pub use error::{PipelineError, PipelineResult};
pub use service::{AppState, create_app};

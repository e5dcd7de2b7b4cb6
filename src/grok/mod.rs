pub mod client;
pub mod error;
pub mod photo;
pub mod types;

pub use client::{EvaluationRequest, Evaluator, GrokClient};
pub use error::GrokError;

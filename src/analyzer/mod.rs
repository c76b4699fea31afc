//! Outbound outfit-analysis pipeline: image encoding, request construction,
//! bounded retry on rate limiting, and response shaping.

pub mod client;
pub mod image_prep;
pub mod prompts;
pub mod types;

pub use client::{AnalysisClient, ClientConfig};
pub use types::{AnalysisOptions, AnalysisResult, EncodedImage};

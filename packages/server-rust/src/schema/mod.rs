//! Schema inference over a [`DocumentStore`](crate::traits::DocumentStore).

pub mod inference;

pub use inference::{SchemaInferenceEngine, DEFAULT_SAMPLE_SIZE, DEFAULT_SAMPLE_TIMEOUT};

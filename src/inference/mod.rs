//! Inference subsystem: hashing, the model seam, and the request pipeline.

pub mod hashing;
pub mod model;
pub mod orchestrator;

pub use model::{load_classifier, Classifier, LinearTextModel, Prediction};
pub use orchestrator::{
    CachedPrediction, InferenceOutcome, InferenceRequest, InferenceResponse, RequestOrchestrator,
};

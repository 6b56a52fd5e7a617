use thiserror::Error;

/// Column order expected by the model: temperature, then pressure.
pub type FeatureVector = [f32; 2];

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("ONNX runtime unavailable: {0}")]
    Runtime(#[source] ort::Error),
    #[error("failed to load model from {path}: {source}")]
    Corrupt { path: String, source: ort::Error },
    #[error("model at {path} has no output named `{output}`")]
    MissingOutput { path: String, output: String },
    #[error("inference failed: {0}")]
    Inference(String),
    #[error("model returned no label")]
    EmptyOutput,
}

/// Anything able to classify a single feature vector into a binary label.
///
/// A label of `1` marks a golden batch; every other value is a failure.
pub trait ModelService: Send + Sync + 'static {
    fn predict(&self, features: FeatureVector) -> Result<i64, ModelError>;
}

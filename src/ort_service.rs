use crate::{
    config::ModelConfig,
    model_service::{FeatureVector, ModelError, ModelService},
};
use ndarray::Array2;
use ort::{
    session::{
        builder::{GraphOptimizationLevel, SessionBuilder},
        Session,
    },
    value::TensorRef,
};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

fn to_input(features: FeatureVector) -> Array2<f32> {
    Array2::from_shape_fn((1, 2), |(_, col)| features[col])
}

fn session_builder() -> Result<SessionBuilder, ort::Error> {
    Session::builder()?.with_optimization_level(GraphOptimizationLevel::Level3)
}

fn check_label_output<'a>(
    mut outputs: impl Iterator<Item = &'a str>,
    label_output: &str,
    path: &str,
) -> Result<(), ModelError> {
    if outputs.any(|name| name == label_output) {
        return Ok(());
    }
    Err(ModelError::MissingOutput {
        path: path.to_string(),
        output: label_output.to_string(),
    })
}

#[derive(Clone)]
pub struct OrtModelService {
    sessions: Arc<Vec<Arc<Mutex<Session>>>>,
    counter: Arc<AtomicUsize>,
    label_output: String,
}

impl OrtModelService {
    pub fn new(model_config: &ModelConfig) -> Result<Self, ModelError> {
        let path = model_config.get_path();
        let num_instances = model_config.num_instances.max(1);

        let sessions = (0..num_instances)
            .map(|_| {
                let session = session_builder()
                    .map_err(ModelError::Runtime)?
                    .commit_from_file(&path)
                    .map_err(|source| ModelError::Corrupt {
                        path: path.display().to_string(),
                        source,
                    })?;
                Ok(Arc::new(Mutex::new(session)))
            })
            .collect::<Result<Vec<_>, ModelError>>()?;

        {
            let session = sessions[0]
                .lock()
                .map_err(|e| ModelError::Inference(format!("session mutex poisoned: {}", e)))?;
            check_label_output(
                session.outputs.iter().map(|output| output.name.as_str()),
                &model_config.label_output,
                &path.display().to_string(),
            )?;
        }

        tracing::info!("Created {} ONNX sessions", num_instances);

        Ok(Self {
            sessions: Arc::new(sessions),
            counter: Arc::new(AtomicUsize::new(0)),
            label_output: model_config.label_output.clone(),
        })
    }

    fn run_inference(&self, input: &Array2<f32>) -> Result<i64, ModelError> {
        let index = self.counter.fetch_add(1, Ordering::Relaxed) % self.sessions.len();
        let mut session = self.sessions[index]
            .lock()
            .map_err(|e| ModelError::Inference(format!("session mutex poisoned: {}", e)))?;

        tracing::debug!("Handling request with session {}", index);

        let tensor_ref = TensorRef::from_array_view(input.view())
            .map_err(|e| ModelError::Inference(format!("failed to build tensor: {}", e)))?;

        let outputs = session
            .run(ort::inputs![tensor_ref])
            .map_err(|e| ModelError::Inference(e.to_string()))?;

        let (_, labels) = outputs[self.label_output.as_str()]
            .try_extract_tensor::<i64>()
            .map_err(|e| ModelError::Inference(format!("failed to extract label: {}", e)))?;

        labels.first().copied().ok_or(ModelError::EmptyOutput)
    }
}

impl ModelService for OrtModelService {
    fn predict(&self, features: FeatureVector) -> Result<i64, ModelError> {
        self.run_inference(&to_input(features))
    }
}

/// Loads the classifier once at startup.
///
/// A missing artifact is not an error: the service starts without a model and
/// reports it as unavailable. An artifact that exists but cannot be loaded is.
pub fn load_model(model_config: &ModelConfig) -> Result<Option<OrtModelService>, ModelError> {
    let path = model_config.get_path();
    if !path.exists() {
        tracing::warn!(
            "Model file not found at {}; /predict will answer 500 until it is deployed",
            path.display()
        );
        return Ok(None);
    }

    let service = OrtModelService::new(model_config)?;
    tracing::info!("Model loaded from {}", path.display());

    Ok(Some(service))
}

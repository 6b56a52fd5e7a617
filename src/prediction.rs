use crate::error::PredictError;
use crate::model_service::FeatureVector;
use serde::Serialize;
use serde_json::{Map, Value};

pub const TEMPERATURE: &str = "temperature";
pub const PRESSURE: &str = "pressure";

/// Validated model input, echoed back in the response.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BatchInput {
    pub temperature: f64,
    pub pressure: f64,
}

impl BatchInput {
    /// Parses a raw request body. Any content type is accepted as long as the
    /// bytes are a JSON object carrying both readings.
    pub fn from_body(body: &[u8]) -> Result<Self, PredictError> {
        let value: Value = serde_json::from_slice(body)
            .map_err(|e| PredictError::InvalidInput(format!("Malformed JSON body: {}", e)))?;

        let fields = value.as_object().ok_or_else(|| {
            PredictError::InvalidInput("Request body must be a JSON object".to_string())
        })?;

        Ok(Self {
            temperature: read_number(fields, TEMPERATURE)?,
            pressure: read_number(fields, PRESSURE)?,
        })
    }

    pub fn features(&self) -> FeatureVector {
        [self.temperature as f32, self.pressure as f32]
    }
}

fn read_number(fields: &Map<String, Value>, name: &str) -> Result<f64, PredictError> {
    let number = match fields.get(name) {
        None | Some(Value::Null) => {
            return Err(PredictError::InvalidInput(format!(
                "Missing required field: {}",
                name
            )))
        }
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(_) => None,
    };

    // The model consumes f32 features.
    match number {
        Some(n) if n.is_finite() && n.abs() <= f64::from(f32::MAX) => Ok(n),
        Some(n) if n.is_finite() => Err(PredictError::InvalidInput(format!(
            "Field '{}' is out of range",
            name
        ))),
        Some(_) => Err(PredictError::InvalidInput(format!(
            "Field '{}' must be a finite number",
            name
        ))),
        None => Err(PredictError::InvalidInput(format!(
            "Field '{}' must be a number",
            name
        ))),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Verdict {
    Pass,
    Fail,
}

impl Verdict {
    pub fn from_label(label: i64) -> Self {
        if label == 1 {
            Verdict::Pass
        } else {
            Verdict::Fail
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Pass => "Pass",
            Verdict::Fail => "Fail",
        }
    }

    pub fn is_golden_batch(&self) -> bool {
        matches!(self, Verdict::Pass)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionResponse {
    pub input: BatchInput,
    pub prediction: Verdict,
    pub is_golden_batch: bool,
}

impl PredictionResponse {
    pub fn new(input: BatchInput, label: i64) -> Self {
        let prediction = Verdict::from_label(label);
        Self {
            input,
            prediction,
            is_golden_batch: prediction.is_golden_batch(),
        }
    }
}

//! Online inference over a loaded [`ArtifactBundle`](crate::artifact::ArtifactBundle).
//!
//! [`InferenceService`] owns the bundle; [`handle_request`] maps one JSON
//! request onto it and renders either the result or an
//! [`ErrorResponse`](crate::error::ErrorResponse) with its HTTP status.

mod service;

pub use service::InferenceService;

use crate::dataset::CustomerRecord;
use crate::error::{ChurnError, ErrorResponse};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Answer for one customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    /// 1 if the customer is predicted to churn.
    pub churn_prediction: u8,
    pub churn_probability: f64,
    pub model_version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    /// `"ok"` or `"degraded"`.
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,
    /// Why the model failed to load, when degraded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Description of the loaded model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub model_version: String,
    pub run_id: String,
    pub created_at: DateTime<Utc>,
    pub model_kind: String,
    pub accuracy: f64,
    pub hyperparameters: BTreeMap<String, String>,
    pub numeric_features: Vec<String>,
    pub categorical_features: Vec<String>,
    pub n_features: usize,
}

/// One request of the line protocol.
///
/// ```json
/// {"op": "predict", "record": {"tenure": 2, "Contract": "Month-to-month"}}
/// {"op": "predict_batch", "records": [{...}, {...}]}
/// {"op": "health"}
/// {"op": "model_info"}
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    Predict { record: CustomerRecord },
    PredictBatch { records: Vec<CustomerRecord> },
    Health,
    ModelInfo,
}

/// Rendered answer: HTTP-style status plus JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: u16,
    pub body: serde_json::Value,
}

impl Response {
    fn ok<T: Serialize>(body: &T) -> Self {
        match serde_json::to_value(body) {
            Ok(body) => Self { status: 200, body },
            Err(e) => Self::error(&ChurnError::from(e)),
        }
    }

    fn error(err: &ChurnError) -> Self {
        let ErrorResponse { error, status } = err.to_response();
        Self {
            status,
            body: serde_json::json!({ "error": error, "status": status }),
        }
    }

    fn bad_request(message: String) -> Self {
        Self {
            status: 400,
            body: serde_json::json!({ "error": message, "status": 400 }),
        }
    }
}

/// Parse and answer one request line. Never panics, never fails.
pub fn handle_request(service: &InferenceService, line: &str) -> Response {
    let request: Request = match serde_json::from_str(line) {
        Ok(request) => request,
        Err(e) => return Response::bad_request(format!("malformed request: {}", e)),
    };

    let result = match request {
        Request::Predict { record } => service.predict(&record).map(|r| Response::ok(&r)),
        Request::PredictBatch { records } => {
            service.predict_batch(&records).map(|r| Response::ok(&r))
        }
        Request::Health => {
            let mut response = Response::ok(&service.health());
            if !service.is_ready() {
                response.status = 503;
            }
            Ok(response)
        }
        Request::ModelInfo => service.model_info().map(|info| Response::ok(&info)),
    };

    result.unwrap_or_else(|err| {
        if err.is_client_error() {
            log::debug!("Rejected request: {}", err);
        } else {
            log::warn!("Request failed: {}", err);
        }
        Response::error(&err)
    })
}

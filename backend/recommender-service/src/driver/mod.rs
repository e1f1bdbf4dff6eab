use crate::error::EngineError;
use crate::models::{RecommendationOutput, RecommendationRequest};
use crate::services::RecommendationOrchestrator;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

/// One JSON line on stdin. `request_id` is echoed back; a fresh one is
/// generated when absent.
#[derive(Debug, Deserialize)]
struct RequestEnvelope {
    #[serde(default)]
    request_id: Option<String>,
    #[serde(flatten)]
    request: RecommendationRequest,
}

#[derive(Debug, Serialize)]
pub struct ResponseEnvelope {
    pub request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<RecommendationOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub status: u16,
    pub message: String,
}

impl From<&EngineError> for ErrorBody {
    fn from(err: &EngineError) -> Self {
        Self {
            code: err.code(),
            status: err.status_code(),
            message: err.to_string(),
        }
    }
}

/// JSON-lines front end over the orchestrator.
#[derive(Clone)]
pub struct LineDriver {
    orchestrator: Arc<RecommendationOrchestrator>,
}

impl LineDriver {
    pub fn new(orchestrator: Arc<RecommendationOrchestrator>) -> Self {
        Self { orchestrator }
    }

    /// Decode one line, run it on the blocking pool and encode the reply.
    pub async fn handle_line(&self, line: &str) -> String {
        let envelope = self.process(line).await;
        serde_json::to_string(&envelope).unwrap_or_else(|e| {
            error!(error = %e, "Failed to encode response");
            format!(
                r#"{{"request_id":"{}","error":{{"code":"internal","status":500,"message":"response encoding failed"}}}}"#,
                envelope.request_id
            )
        })
    }

    async fn process(&self, line: &str) -> ResponseEnvelope {
        let parsed: RequestEnvelope = match serde_json::from_str(line) {
            Ok(parsed) => parsed,
            Err(e) => return failure(Uuid::new_v4().to_string(), &EngineError::from(e)),
        };
        let request_id = parsed
            .request_id
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let request = parsed.request;

        info!(
            request_id = %request_id,
            user_id = %request.user_id,
            strategy = %request.strategy,
            limit = request.limit,
            "Recommendation request"
        );

        let orchestrator = Arc::clone(&self.orchestrator);
        let outcome = tokio::task::spawn_blocking(move || orchestrator.recommend(&request)).await;

        match outcome {
            Ok(Ok(output)) => ResponseEnvelope {
                request_id,
                result: Some(output),
                error: None,
            },
            Ok(Err(e)) => {
                error!(request_id = %request_id, code = e.code(), error = %e, "Recommendation failed");
                failure(request_id, &e)
            }
            Err(join_err) => {
                error!(request_id = %request_id, error = %join_err, "Recommendation task panicked");
                failure(
                    request_id,
                    &EngineError::ServiceUnavailable("recommendation task aborted".to_string()),
                )
            }
        }
    }
}

fn failure(request_id: String, err: &EngineError) -> ResponseEnvelope {
    ResponseEnvelope {
        request_id,
        result: None,
        error: Some(err.into()),
    }
}

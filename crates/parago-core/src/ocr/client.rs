//! Analysis job submission and polling.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::error::OcrError;
use crate::models::OcrConfig;
use crate::ocr::protocol::{AnalyzeOperation, AnalyzeResult, OperationStatus};
use crate::ocr::MediaType;

/// Opaque reference to a running analysis job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRef {
    /// Poll URL returned by the vendor at submission time.
    pub url: String,
}

/// Transport seam for the analysis vendor. The HTTP implementation talks to
/// the real service; tests script responses through a fake.
#[async_trait]
pub trait AnalyzeBackend: Send + Sync {
    /// Submit a document for analysis and return the job reference.
    async fn submit(&self, bytes: &[u8], media_type: MediaType) -> Result<JobRef, OcrError>;

    /// Fetch the current state of a job.
    async fn poll(&self, job: &JobRef) -> Result<AnalyzeOperation, OcrError>;
}

/// HTTP backend for the document-analysis vendor.
pub struct HttpAnalyzeBackend {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model_id: String,
    api_version: String,
}

impl HttpAnalyzeBackend {
    /// Build a backend from the OCR section of the configuration.
    pub fn new(config: &OcrConfig) -> Result<Self, OcrError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model_id: config.model_id.clone(),
            api_version: config.api_version.clone(),
        })
    }

    fn analyze_url(&self) -> String {
        format!(
            "{}/documentintelligence/documentModels/{}:analyze?api-version={}",
            self.endpoint, self.model_id, self.api_version
        )
    }
}

#[async_trait]
impl AnalyzeBackend for HttpAnalyzeBackend {
    async fn submit(&self, bytes: &[u8], media_type: MediaType) -> Result<JobRef, OcrError> {
        let response = self
            .client
            .post(self.analyze_url())
            .header("Ocp-Apim-Subscription-Key", &self.api_key)
            .header("Content-Type", media_type.as_mime())
            .body(bytes.to_vec())
            .send()
            .await?;

        let status = response.status();
        if status.is_client_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(OcrError::InvalidDocument(body));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OcrError::UnexpectedStatus {
                status: status.as_u16(),
                body,
            });
        }

        let job_url = response
            .headers()
            .get("Operation-Location")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or(OcrError::MissingJobReference)?;

        Ok(JobRef { url: job_url })
    }

    async fn poll(&self, job: &JobRef) -> Result<AnalyzeOperation, OcrError> {
        let response = self
            .client
            .get(&job.url)
            .header("Ocp-Apim-Subscription-Key", &self.api_key)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OcrError::UnexpectedStatus {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

/// Drives an analysis job from submission to a terminal state.
pub struct OcrClient {
    backend: Arc<dyn AnalyzeBackend>,
    poll_interval: Duration,
    max_polls: u32,
}

impl OcrClient {
    pub fn new(backend: Arc<dyn AnalyzeBackend>, config: &OcrConfig) -> Self {
        Self {
            backend,
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            max_polls: config.max_polls,
        }
    }

    /// Analyze a document and wait for the result.
    ///
    /// Waits one interval before each poll and performs at most `max_polls`
    /// polls. A job that reaches a terminal state on the final poll still
    /// resolves normally; only a job that never leaves the in-progress
    /// states times out.
    pub async fn analyze(
        &self,
        bytes: &[u8],
        media_type: MediaType,
    ) -> Result<AnalyzeResult, OcrError> {
        let job = self.backend.submit(bytes, media_type).await?;
        debug!(job = %job.url, "analysis job submitted");

        for attempt in 1..=self.max_polls {
            tokio::time::sleep(self.poll_interval).await;
            let operation = self.backend.poll(&job).await?;
            match operation.status {
                OperationStatus::Succeeded => {
                    debug!(attempt, "analysis job succeeded");
                    return operation.analyze_result.ok_or(OcrError::EmptyResult);
                }
                OperationStatus::Failed => {
                    let error = operation.error.unwrap_or_else(|| {
                        crate::ocr::protocol::VendorError {
                            code: "Unknown".to_string(),
                            message: "analysis failed without detail".to_string(),
                        }
                    });
                    if error.is_content_error() {
                        return Err(OcrError::InvalidDocument(error.message));
                    }
                    return Err(OcrError::Analysis {
                        code: error.code,
                        message: error.message,
                    });
                }
                OperationStatus::NotStarted | OperationStatus::Running => {
                    debug!(attempt, "analysis job still in progress");
                }
            }
        }

        Err(OcrError::Timeout {
            polls: self.max_polls,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::protocol::VendorError;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    /// Backend that replays a scripted list of poll responses.
    struct ScriptedBackend {
        polls: Mutex<VecDeque<AnalyzeOperation>>,
        submit_error: Option<fn() -> OcrError>,
    }

    impl ScriptedBackend {
        fn new(polls: Vec<AnalyzeOperation>) -> Self {
            Self {
                polls: Mutex::new(polls.into()),
                submit_error: None,
            }
        }
    }

    #[async_trait]
    impl AnalyzeBackend for ScriptedBackend {
        async fn submit(&self, _bytes: &[u8], _media: MediaType) -> Result<JobRef, OcrError> {
            if let Some(make_err) = self.submit_error {
                return Err(make_err());
            }
            Ok(JobRef {
                url: "https://vendor.invalid/jobs/1".to_string(),
            })
        }

        async fn poll(&self, _job: &JobRef) -> Result<AnalyzeOperation, OcrError> {
            self.polls.lock().pop_front().ok_or(OcrError::Analysis {
                code: "ScriptExhausted".to_string(),
                message: "poll called more times than scripted".to_string(),
            })
        }
    }

    fn running() -> AnalyzeOperation {
        AnalyzeOperation {
            status: OperationStatus::Running,
            analyze_result: None,
            error: None,
        }
    }

    fn succeeded() -> AnalyzeOperation {
        AnalyzeOperation {
            status: OperationStatus::Succeeded,
            analyze_result: Some(AnalyzeResult {
                content: "done".to_string(),
                documents: Vec::new(),
            }),
            error: None,
        }
    }

    fn client(backend: ScriptedBackend) -> OcrClient {
        let config = OcrConfig {
            poll_interval_ms: 0,
            max_polls: 50,
            ..OcrConfig::default()
        };
        OcrClient::new(Arc::new(backend), &config)
    }

    #[tokio::test]
    async fn test_immediate_success() {
        let ocr = client(ScriptedBackend::new(vec![succeeded()]));
        let result = ocr.analyze(b"bytes", MediaType::Jpeg).await.unwrap();
        assert_eq!(result.content, "done");
    }

    #[tokio::test]
    async fn test_success_on_final_poll() {
        let mut polls: Vec<AnalyzeOperation> = (0..49).map(|_| running()).collect();
        polls.push(succeeded());
        let ocr = client(ScriptedBackend::new(polls));
        let result = ocr.analyze(b"bytes", MediaType::Jpeg).await.unwrap();
        assert_eq!(result.content, "done");
    }

    #[tokio::test]
    async fn test_timeout_after_poll_budget() {
        let polls: Vec<AnalyzeOperation> = (0..50).map(|_| running()).collect();
        let ocr = client(ScriptedBackend::new(polls));
        let err = ocr.analyze(b"bytes", MediaType::Jpeg).await.unwrap_err();
        assert!(matches!(err, OcrError::Timeout { polls: 50 }));
    }

    #[tokio::test]
    async fn test_not_started_counts_as_in_progress() {
        let polls = vec![
            AnalyzeOperation {
                status: OperationStatus::NotStarted,
                analyze_result: None,
                error: None,
            },
            running(),
            succeeded(),
        ];
        let ocr = client(ScriptedBackend::new(polls));
        assert!(ocr.analyze(b"bytes", MediaType::Png).await.is_ok());
    }

    #[tokio::test]
    async fn test_content_error_maps_to_invalid_document() {
        let polls = vec![AnalyzeOperation {
            status: OperationStatus::Failed,
            analyze_result: None,
            error: Some(VendorError {
                code: "InvalidContent".to_string(),
                message: "corrupted file".to_string(),
            }),
        }];
        let ocr = client(ScriptedBackend::new(polls));
        let err = ocr.analyze(b"bytes", MediaType::Pdf).await.unwrap_err();
        assert!(matches!(err, OcrError::InvalidDocument(msg) if msg == "corrupted file"));
    }

    #[tokio::test]
    async fn test_service_error_maps_to_analysis() {
        let polls = vec![AnalyzeOperation {
            status: OperationStatus::Failed,
            analyze_result: None,
            error: Some(VendorError {
                code: "InternalServerError".to_string(),
                message: "try again later".to_string(),
            }),
        }];
        let ocr = client(ScriptedBackend::new(polls));
        let err = ocr.analyze(b"bytes", MediaType::Pdf).await.unwrap_err();
        assert!(matches!(err, OcrError::Analysis { code, .. } if code == "InternalServerError"));
    }

    #[tokio::test]
    async fn test_succeeded_without_payload_is_empty_result() {
        let polls = vec![AnalyzeOperation {
            status: OperationStatus::Succeeded,
            analyze_result: None,
            error: None,
        }];
        let ocr = client(ScriptedBackend::new(polls));
        let err = ocr.analyze(b"bytes", MediaType::Jpeg).await.unwrap_err();
        assert!(matches!(err, OcrError::EmptyResult));
    }

    #[tokio::test]
    async fn test_missing_job_reference_propagates() {
        let backend = ScriptedBackend {
            polls: Mutex::new(VecDeque::new()),
            submit_error: Some(|| OcrError::MissingJobReference),
        };
        let ocr = client(backend);
        let err = ocr.analyze(b"bytes", MediaType::Jpeg).await.unwrap_err();
        assert!(matches!(err, OcrError::MissingJobReference));
    }
}

//! Job-based generation client (submit, then poll by id).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::{StatusCode, Url};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use genrun_core::{JobHandle, JobStatus, VideoRequest};

use crate::backend::{JobBackend, StatusQuery};
use crate::error::{truncate_body, ClientError};

/// Submission body sent to the job endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobSubmission {
    pub prompt: String,
    pub model: String,
    pub aspect_ratio: String,
    pub hd: bool,
    pub duration: u32,
    pub watermark: bool,
    pub private: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
}

impl JobSubmission {
    /// Build a submission, falling back to `default_model` when the request names none.
    pub fn from_request(request: &VideoRequest, default_model: &str) -> Self {
        Self {
            prompt: request.prompt.clone(),
            model: request
                .model
                .clone()
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| default_model.to_string()),
            aspect_ratio: request.aspect_ratio.as_str().to_string(),
            hd: request.hd,
            duration: request.duration_secs,
            watermark: request.watermark,
            private: request.private,
            images: request.image_urls.clone(),
        }
    }
}

/// Client for a job-based provider.
#[derive(Debug, Clone)]
pub struct JobClient {
    inner: reqwest::Client,
    api_url: String,
    api_key: String,
    timeout: Duration,
}

impl JobClient {
    /// Create a new job client. `timeout` bounds each single request.
    pub fn new(api_url: &str, api_key: &str, timeout: Duration) -> Self {
        Self {
            inner: reqwest::Client::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            timeout,
        }
    }

    async fn read_json(response: reqwest::Response) -> Result<Value, ClientError> {
        let status = response.status();
        let body = response.text().await?;

        if status == StatusCode::NOT_FOUND {
            return Err(ClientError::NotFound(truncate_body(&body, 256)));
        }
        if !status.is_success() {
            if body.to_ascii_lowercase().contains("not found") {
                return Err(ClientError::NotFound(truncate_body(&body, 256)));
            }
            return Err(ClientError::Status {
                status: status.as_u16(),
                body: truncate_body(&body, 512),
            });
        }

        serde_json::from_str(&body).map_err(|e| ClientError::Decode(format!("invalid JSON: {}", e)))
    }
}

#[async_trait]
impl JobBackend for JobClient {
    async fn submit(&self, submission: &JobSubmission) -> Result<JobHandle, ClientError> {
        info!(
            url = %self.api_url,
            model = %submission.model,
            hd = submission.hd,
            duration = submission.duration,
            "Submitting job"
        );

        let response = self
            .inner
            .post(&self.api_url)
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .timeout(self.timeout)
            .json(submission)
            .send()
            .await?;

        let value = Self::read_json(response).await?;
        parse_submit_response(&value)
    }

    async fn status(&self, handle: &JobHandle) -> Result<StatusQuery, ClientError> {
        let url = status_url(&self.api_url, handle)?;
        debug!(url = %url, "Querying job status");

        let response = self
            .inner
            .get(url)
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .timeout(self.timeout)
            .send()
            .await?;

        match Self::read_json(response).await {
            Ok(value) => parse_status_response(&value).map(StatusQuery::Found),
            Err(ClientError::NotFound(_)) => Ok(StatusQuery::NotFound),
            Err(e) => Err(e),
        }
    }
}

/// Status endpoint for a job: the submission URL plus the escaped job id.
pub fn status_url(api_url: &str, handle: &JobHandle) -> Result<Url, ClientError> {
    let mut url = Url::parse(api_url).map_err(|e| ClientError::InvalidUrl(format!("{}: {}", api_url, e)))?;
    url.path_segments_mut()
        .map_err(|_| ClientError::InvalidUrl(format!("{}: cannot be a base", api_url)))?
        .pop_if_empty()
        .push(handle.as_str());
    Ok(url)
}

/// Providers wrap payloads in `data` inconsistently; look in both places.
fn field<'a>(value: &'a Value, names: &[&str]) -> Option<&'a Value> {
    let scopes = [Some(value), value.get("data")];
    scopes
        .into_iter()
        .flatten()
        .flat_map(|scope| names.iter().filter_map(move |name| scope.get(*name)))
        .find(|v| !v.is_null())
}

fn string_field(value: &Value, names: &[&str]) -> Option<String> {
    field(value, names).and_then(|v| match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(_) => v.get("message").and_then(Value::as_str).map(str::to_string),
        _ => None,
    })
}

/// Extract the job id from a submission response.
pub fn parse_submit_response(value: &Value) -> Result<JobHandle, ClientError> {
    if let Some(error) = string_field(value, &["error"]) {
        return Err(ClientError::Provider(error));
    }

    string_field(value, &["id", "task_id", "job_id"])
        .filter(|id| !id.trim().is_empty())
        .map(JobHandle::new)
        .ok_or_else(|| ClientError::Decode(format!("no job id in response: {}", value)))
}

/// Parse a progress value given as a number or a string such as `"45%"`.
fn parse_progress(value: &Value) -> Option<u8> {
    let raw = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse::<f64>().ok()?,
        _ => return None,
    };
    Some(raw.clamp(0.0, 100.0).round() as u8)
}

/// Turn a status response into a [`JobStatus`].
pub fn parse_status_response(value: &Value) -> Result<JobStatus, ClientError> {
    let status = string_field(value, &["status", "state"])
        .ok_or_else(|| ClientError::Decode(format!("no status in response: {}", value)))?;
    let progress = field(value, &["progress"]).and_then(parse_progress);
    let result_url = string_field(value, &["video_url", "result_url", "url", "output_url"]);
    let error = string_field(value, &["error", "fail_reason", "failure_reason"]);

    Ok(JobStatus::from_parts(&status, progress, result_url, error))
}

#[cfg(test)]
mod tests {
    use super::*;
    use genrun_core::AspectRatio;
    use serde_json::json;

    #[test]
    fn test_submission_from_request() {
        let request = VideoRequest::new("waves at dusk")
            .with_hd(true)
            .with_duration(15)
            .with_aspect_ratio(AspectRatio::Portrait);
        let submission = JobSubmission::from_request(&request, "video-default");

        assert_eq!(submission.model, "video-default");
        assert_eq!(submission.aspect_ratio, "9:16");
        assert_eq!(submission.duration, 15);
        assert!(submission.private);

        let value = serde_json::to_value(&submission).unwrap();
        assert!(value.get("images").is_none());
    }

    #[test]
    fn test_parse_submit_response() {
        assert_eq!(
            parse_submit_response(&json!({"id": "job-1"})).unwrap(),
            JobHandle::new("job-1")
        );
        assert_eq!(
            parse_submit_response(&json!({"data": {"task_id": 42}})).unwrap(),
            JobHandle::new("42")
        );
        assert!(matches!(
            parse_submit_response(&json!({"error": {"message": "bad prompt"}})),
            Err(ClientError::Provider(_))
        ));
        assert!(matches!(
            parse_submit_response(&json!({"ok": true})),
            Err(ClientError::Decode(_))
        ));
    }

    #[test]
    fn test_parse_status_response() {
        let running = parse_status_response(&json!({"status": "processing", "progress": "45%"})).unwrap();
        assert_eq!(running, JobStatus::Running { progress: Some(45) });

        let done = parse_status_response(&json!({
            "data": {"status": "SUCCESS", "video_url": "https://cdn/v.mp4"}
        }))
        .unwrap();
        assert_eq!(
            done,
            JobStatus::Succeeded {
                result_url: Some("https://cdn/v.mp4".to_string())
            }
        );

        let failed = parse_status_response(&json!({"status": "failed", "fail_reason": "nsfw"})).unwrap();
        assert_eq!(
            failed,
            JobStatus::Failed {
                reason: Some("nsfw".to_string())
            }
        );
    }

    #[test]
    fn test_status_url_escapes_job_id() {
        let url = status_url("http://127.0.0.1:8000/v1/videos", &JobHandle::new("job-1")).unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:8000/v1/videos/job-1");

        let url = status_url("https://api.example/videos/", &JobHandle::new("a/b?c d#e")).unwrap();
        assert_eq!(url.as_str(), "https://api.example/videos/a%2Fb%3Fc%20d%23e");
        assert_eq!(url.path_segments().map(|s| s.count()), Some(2));

        assert!(matches!(
            status_url("not a url", &JobHandle::new("job-1")),
            Err(ClientError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_parse_progress() {
        assert_eq!(parse_progress(&json!(12.6)), Some(13));
        assert_eq!(parse_progress(&json!(" 80 % ")), Some(80));
        assert_eq!(parse_progress(&json!(-5)), Some(0));
        assert_eq!(parse_progress(&json!("soon")), None);
    }
}

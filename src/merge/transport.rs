//! Requests to the remote merge service

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::Url;
use tracing::debug;

use crate::config::Config;
use crate::error::CollaboratorError;
use crate::queue::QueueSnapshot;
use crate::validate::PDF_MEDIA_TYPE;

/// Path of the merge endpoint, relative to the service base URL
pub const MERGE_PATH: &str = "pdf/merge";

/// Multipart field name carrying each input file
pub const FORM_FIELD: &str = "files";

/// One input document of a merge request
#[derive(Debug, Clone)]
pub struct MergePart {
    pub file_name: String,
    pub content: Arc<[u8]>,
}

/// Ordered inputs of one merge; part order is output document order
#[derive(Debug, Clone, Default)]
pub struct MergeRequest {
    parts: Vec<MergePart>,
}

impl MergeRequest {
    pub fn from_snapshot(snapshot: &QueueSnapshot) -> Self {
        let parts = snapshot
            .entries()
            .iter()
            .map(|entry| MergePart {
                file_name: entry.name().to_string(),
                content: entry.shared_content(),
            })
            .collect();
        Self { parts }
    }

    pub fn parts(&self) -> &[MergePart] {
        &self.parts
    }

    pub fn file_names(&self) -> Vec<&str> {
        self.parts.iter().map(|p| p.file_name.as_str()).collect()
    }

    pub fn into_parts(self) -> Vec<MergePart> {
        self.parts
    }
}

/// Sends a merge request to the merge service and returns the merged PDF
///
/// # Example (scripted transport for testing)
///
/// ```ignore
/// struct Fixed(Vec<u8>);
///
/// impl MergeTransport for Fixed {
///     async fn merge(&self, _request: MergeRequest) -> Result<Vec<u8>, CollaboratorError> {
///         Ok(self.0.clone())
///     }
/// }
/// ```
pub trait MergeTransport: Send + Sync {
    fn merge(
        &self,
        request: MergeRequest,
    ) -> impl Future<Output = Result<Vec<u8>, CollaboratorError>> + Send;
}

/// Build the merge endpoint from a base URL, tolerating a trailing slash
pub fn merge_endpoint(base_url: &str) -> Result<Url, CollaboratorError> {
    let base = base_url.trim().trim_end_matches('/');
    Url::parse(&format!("{}/{}", base, MERGE_PATH))
        .map_err(|e| CollaboratorError::InvalidEndpoint(format!("{}: {}", base_url, e)))
}

/// [`MergeTransport`] that POSTs a multipart form over HTTP
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpTransport {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, CollaboratorError> {
        let endpoint = merge_endpoint(base_url)?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CollaboratorError::Transport(e.to_string()))?;
        Ok(Self { client, endpoint })
    }

    pub fn from_config(config: &Config) -> Result<Self, CollaboratorError> {
        Self::new(&config.api_base_url, config.request_timeout)
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn build_form(request: MergeRequest) -> Result<Form, CollaboratorError> {
        let mut form = Form::new();
        for part in request.into_parts() {
            let body = Part::bytes(part.content.to_vec())
                .file_name(part.file_name)
                .mime_str(PDF_MEDIA_TYPE)
                .map_err(|e| CollaboratorError::Transport(e.to_string()))?;
            form = form.part(FORM_FIELD, body);
        }
        Ok(form)
    }
}

impl MergeTransport for HttpTransport {
    async fn merge(&self, request: MergeRequest) -> Result<Vec<u8>, CollaboratorError> {
        debug!(endpoint = %self.endpoint, parts = request.parts().len(), "Sending merge request");
        let form = Self::build_form(request)?;

        let response = self
            .client
            .post(self.endpoint.clone())
            .multipart(form)
            .send()
            .await
            .map_err(|e| CollaboratorError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CollaboratorError::rejected(status.as_u16(), &body));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| CollaboratorError::Transport(e.to_string()))?;
        debug!(status = status.as_u16(), len = bytes.len(), "Merge service responded");
        Ok(bytes.to_vec())
    }
}

//! Diagram rendering via the Kroki service.
//!
//! [`RenderClient`] is the seam between the pipeline and the network.
//! [`KrokiClient`] implements it with a blocking `ureq` agent:
//! `POST {base}/{kind}/{format}` with the diagram source as a plain-text body.

use std::time::Duration;

use ureq::Agent;

use crate::consts::ERROR_BODY_LIMIT;
use crate::language::DiagramFormat;

/// Bytes returned by the render service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPayload {
    pub mime: String,
    pub bytes: Vec<u8>,
}

/// Transport-level render failure.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The service answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("request failed: {0}")]
    Request(String),
    #[error("failed to read response: {0}")]
    Body(String),
}

/// Renders diagram sources into images.
///
/// Clients are shared with render worker threads.
pub trait RenderClient: Send + Sync {
    fn render(
        &self,
        kind: &str,
        format: DiagramFormat,
        source: &str,
    ) -> Result<RenderedPayload, TransportError>;
}

/// Create HTTP agent with the specified timeout.
///
/// Non-success statuses are returned as responses so the error body can be
/// read.
pub fn create_agent(timeout: Duration) -> Agent {
    Agent::config_builder()
        .timeout_global(Some(timeout))
        .http_status_as_error(false)
        .build()
        .into()
}

/// [`RenderClient`] backed by a Kroki server.
///
/// # Example
///
/// ```ignore
/// use std::time::Duration;
/// use docweave_diagrams::{DiagramFormat, KrokiClient, RenderClient};
///
/// let client = KrokiClient::new("https://kroki.io", Duration::from_secs(30));
/// let payload = client.render("graphviz", DiagramFormat::Svg, "digraph { a -> b }")?;
/// ```
pub struct KrokiClient {
    agent: Agent,
    base_url: String,
}

impl KrokiClient {
    /// Create a client for the server at `base_url`.
    #[must_use]
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let base_url: String = base_url.into();
        Self {
            agent: create_agent(timeout),
            base_url: base_url.trim_end_matches('/').to_owned(),
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, kind: &str, format: DiagramFormat) -> String {
        format!(
            "{}/{}/{}",
            self.base_url,
            kind.trim().to_ascii_lowercase(),
            format.as_str()
        )
    }
}

impl RenderClient for KrokiClient {
    fn render(
        &self,
        kind: &str,
        format: DiagramFormat,
        source: &str,
    ) -> Result<RenderedPayload, TransportError> {
        let url = self.endpoint(kind, format);
        tracing::debug!(url = %url, bytes = source.len(), "Sending diagram to Kroki");

        let response = self
            .agent
            .post(&url)
            .header("Content-Type", "text/plain; charset=utf-8")
            .header("Accept", format.mime())
            .send(source.as_bytes())
            .map_err(|e| match e {
                ureq::Error::Timeout(_) => TransportError::Timeout(e.to_string()),
                other => TransportError::Request(other.to_string()),
            })?;

        let status = response.status().as_u16();
        let mut body = response.into_body();

        if !(200..300).contains(&status) {
            let error_body = body
                .read_to_string()
                .unwrap_or_else(|_| String::from("(unable to read error body)"));
            return Err(TransportError::Status {
                status,
                body: truncate_chars(error_body.trim(), ERROR_BODY_LIMIT),
            });
        }

        let bytes = body
            .read_to_vec()
            .map_err(|e| TransportError::Body(e.to_string()))?;

        Ok(RenderedPayload {
            mime: format.mime().to_owned(),
            bytes,
        })
    }
}

/// First `limit` characters of `text`.
fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((end, _)) => text[..end].to_owned(),
        None => text.to_owned(),
    }
}

//! HTTP transport seam.
//!
//! The client never talks to `reqwest` directly; it hands a [`FormRequest`] to
//! a [`Transport`]. [`ReqwestTransport`] is the default. Tests and hosts with
//! their own HTTP stack supply another implementation through
//! [`crate::SubmissionOptions::transport`].

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ClientError;
use crate::forms::{FormFields, PartValue};
use crate::request::{FormRequest, RequestBody};

/// Status and headers of a server response, without the body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseMeta {
    pub status: u16,
    /// Header names are lower-cased.
    pub headers: BTreeMap<String, String>,
}

impl ResponseMeta {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// A fully-read server response.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub meta: ResponseMeta,
    pub body: Vec<u8>,
}

impl TransportResponse {
    /// Decode the body as JSON.
    pub fn json(&self) -> Result<Value, ClientError> {
        serde_json::from_slice(&self.body).map_err(|e| {
            ClientError::Decode(format!("status {}: {e}", self.meta.status))
        })
    }
}

/// Sends one request and reads the whole response. Implementations must not
/// retry.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, url: &str, request: FormRequest) -> Result<TransportResponse, ClientError>;
}

/// Default transport backed by `reqwest::Client`.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    http: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a preconfigured `reqwest::Client` (timeouts, proxies, TLS).
    pub fn with_http_client(http: reqwest::Client) -> Self {
        Self { http }
    }
}

fn multipart_form(fields: FormFields) -> Result<reqwest::multipart::Form, ClientError> {
    let mut form = reqwest::multipart::Form::new();
    for part in fields.iter() {
        form = match &part.value {
            PartValue::Text(value) => form.text(part.name.clone(), value.clone()),
            PartValue::File {
                file_name,
                mime_type,
                bytes,
            } => {
                let mut file = reqwest::multipart::Part::bytes(bytes.clone())
                    .file_name(file_name.clone());
                if let Some(mime) = mime_type {
                    file = file.mime_str(mime).map_err(|e| {
                        ClientError::InvalidData(format!("invalid mime type {mime}: {e}"))
                    })?;
                }
                form.part(part.name.clone(), file)
            }
        };
    }
    Ok(form)
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, url: &str, request: FormRequest) -> Result<TransportResponse, ClientError> {
        let mut req = self.http.request(request.method.clone(), url);
        for (name, value) in &request.headers {
            req = req.header(name.as_str(), value.as_str());
        }

        // reqwest sets the boundary-bearing Content-Type for multipart bodies.
        req = match request.body {
            RequestBody::Json(json) => req.body(json),
            RequestBody::Multipart(fields) => req.multipart(multipart_form(fields)?),
        };

        let resp = req
            .send()
            .await
            .map_err(|e| ClientError::Http(format!("request failed: {e}")))?;

        let status = resp.status().as_u16();
        let headers = resp
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();

        let body = resp
            .bytes()
            .await
            .map_err(|e| ClientError::Http(format!("failed to read response body: {e}")))?;

        Ok(TransportResponse {
            meta: ResponseMeta { status, headers },
            body: body.to_vec(),
        })
    }
}

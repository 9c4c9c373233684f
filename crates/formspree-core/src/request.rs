//! Turns submission data into a transport-agnostic request.

use std::collections::BTreeMap;

use crate::constants::{CLIENT_HEADER, SESSION_DATA_HEADER};
use crate::error::ClientError;
use crate::forms::{FormFields, SubmissionData};
use crate::session::SessionSnapshot;
use crate::utils::{client_header, encode64};

/// Fetch-style request mode. Only cross-origin requests are issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMode {
    Cors,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// Serialized JSON object.
    Json(String),
    /// Handed to the transport, which encodes it and picks the boundary.
    Multipart(FormFields),
}

/// Everything the transport needs besides the URL.
#[derive(Debug, Clone)]
pub struct FormRequest {
    pub method: reqwest::Method,
    pub mode: RequestMode,
    pub headers: BTreeMap<String, String>,
    pub body: RequestBody,
}

impl FormRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// The JSON body, if this is not a multipart request.
    pub fn json_body(&self) -> Option<&str> {
        match &self.body {
            RequestBody::Json(json) => Some(json),
            RequestBody::Multipart(_) => None,
        }
    }
}

/// Build the request for one round trip.
///
/// The session snapshot, when present, travels in the
/// `Formspree-Session-Data` header and never in the body.
pub fn build_request(
    data: &SubmissionData,
    client_name: Option<&str>,
    session: Option<&SessionSnapshot>,
) -> Result<FormRequest, ClientError> {
    let mut headers = BTreeMap::new();
    headers.insert("Accept".to_string(), "application/json".to_string());
    headers.insert(CLIENT_HEADER.to_string(), client_header(client_name));

    if let Some(snapshot) = session {
        headers.insert(SESSION_DATA_HEADER.to_string(), encode64(snapshot)?);
    }

    let body = match data {
        SubmissionData::Multipart(fields) => RequestBody::Multipart(fields.clone()),
        SubmissionData::Json(map) => {
            headers.insert("Content-Type".to_string(), "application/json".to_string());
            RequestBody::Json(serde_json::to_string(map)?)
        }
    };

    Ok(FormRequest {
        method: reqwest::Method::POST,
        mode: RequestMode::Cors,
        headers,
        body,
    })
}

/// `{endpoint}/f/{form_key}`, or `{endpoint}/p/{project}/f/{form_key}` when
/// the client is scoped to a project.
pub fn submission_url(endpoint: &str, project: Option<&str>, form_key: &str) -> String {
    let endpoint = endpoint.trim_end_matches('/');
    match project {
        Some(project) => format!("{endpoint}/p/{project}/f/{form_key}"),
        None => format!("{endpoint}/f/{form_key}"),
    }
}

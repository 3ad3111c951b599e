//! CloudFormation custom resource events and responses.
use serde::Deserialize;
use serde_json::{Map, Value};
use snafu::prelude::*;

use crate::{Error, RespondSnafu, SerializeResponseSnafu};

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub enum RequestType {
    Create,
    Update,
    Delete,
}

#[derive(Clone, Debug, PartialEq, serde::Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CustomResourceRequest {
    pub request_type: RequestType,
    #[serde(rename = "ResponseURL")]
    pub response_url: String,
    pub stack_id: String,
    pub request_id: String,
    pub resource_type: String,
    pub logical_resource_id: String,
    /// Absent on `Create`.
    #[serde(default)]
    pub physical_resource_id: Option<String>,
    #[serde(default)]
    pub resource_properties: Map<String, Value>,
}

impl CustomResourceRequest {
    /// A string property, eg `ParameterName`.
    pub fn property(&self, name: &str) -> Option<&str> {
        self.resource_properties.get(name).and_then(Value::as_str)
    }

    /// A list property. A single string is split on commas.
    pub fn list_property(&self, name: &str) -> Option<Vec<String>> {
        match self.resource_properties.get(name)? {
            Value::Array(values) => Some(
                values
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_owned)
                    .collect(),
            ),
            Value::String(s) => Some(
                s.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_owned)
                    .collect(),
            ),
            _ => None,
        }
    }
}

/// The fields needed to answer an event, read without validating the rest.
#[derive(Clone, Debug, Default, PartialEq, serde::Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct EventEnvelope {
    #[serde(rename = "ResponseURL")]
    pub response_url: Option<String>,
    pub stack_id: String,
    pub request_id: String,
    pub logical_resource_id: String,
    pub physical_resource_id: Option<String>,
}

impl EventEnvelope {
    /// Empty if the payload is not even shaped like an event.
    pub fn read(payload: &Value) -> Self {
        Self::deserialize(payload).unwrap_or_default()
    }

    pub fn failure(&self, reason: impl Into<String>) -> CustomResourceResponse {
        CustomResourceResponse {
            status: ResponseStatus::Failed,
            reason: Some(reason.into()),
            physical_resource_id: self
                .physical_resource_id
                .clone()
                .unwrap_or_else(|| self.logical_resource_id.clone()),
            stack_id: self.stack_id.clone(),
            request_id: self.request_id.clone(),
            logical_resource_id: self.logical_resource_id.clone(),
            data: Map::new(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponseStatus {
    Success,
    Failed,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CustomResourceResponse {
    pub status: ResponseStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub physical_resource_id: String,
    pub stack_id: String,
    pub request_id: String,
    pub logical_resource_id: String,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub data: Map<String, Value>,
}

impl CustomResourceResponse {
    pub fn success(
        request: &CustomResourceRequest,
        physical_resource_id: impl Into<String>,
        data: Map<String, Value>,
    ) -> Self {
        CustomResourceResponse {
            status: ResponseStatus::Success,
            reason: None,
            physical_resource_id: physical_resource_id.into(),
            stack_id: request.stack_id.clone(),
            request_id: request.request_id.clone(),
            logical_resource_id: request.logical_resource_id.clone(),
            data,
        }
    }

    /// Keeps the physical id CloudFormation already knows, so a failed
    /// update does not look like a replacement.
    pub fn failure(request: &CustomResourceRequest, reason: impl Into<String>) -> Self {
        CustomResourceResponse {
            status: ResponseStatus::Failed,
            reason: Some(reason.into()),
            physical_resource_id: request
                .physical_resource_id
                .clone()
                .unwrap_or_else(|| request.logical_resource_id.clone()),
            stack_id: request.stack_id.clone(),
            request_id: request.request_id.clone(),
            logical_resource_id: request.logical_resource_id.clone(),
            data: Map::new(),
        }
    }
}

/// Uploads `response` to the event's pre-signed URL.
pub async fn send_response(
    client: &reqwest::Client,
    url: &str,
    response: &CustomResourceResponse,
) -> Result<(), Error> {
    let body = serde_json::to_vec(response).context(SerializeResponseSnafu)?;
    tracing::info!(
        "responding {:?} for '{}'",
        response.status,
        response.logical_resource_id
    );
    // The URL is signed without a content type.
    client
        .put(url)
        .header(reqwest::header::CONTENT_TYPE, "")
        .header(reqwest::header::CONTENT_LENGTH, body.len())
        .body(body)
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .context(RespondSnafu { url })?;
    Ok(())
}

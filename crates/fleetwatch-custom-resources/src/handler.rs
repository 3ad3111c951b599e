//! Dispatches custom resource events to their implementations.
use serde_json::{Map, Value};
use snafu::prelude::*;

use crate::{
    cfn::{CustomResourceRequest, CustomResourceResponse, EventEnvelope, RequestType},
    indexing::{self, IndexingApi, IndexingConfiguration, DEFAULT_SHADOW_NAMES},
    ssm_reader::ParameterSource,
    BootstrapSnafu, Error, EventSnafu, MissingPropertySnafu, ReadParameterSnafu,
};

pub const FLEET_INDEXING_RESOURCE_TYPE: &str = "Custom::FleetIndexing";
pub const PARAMETER_READER_RESOURCE_TYPE: &str = "Custom::SsmParameterReader";

/// Physical id of the account-wide indexing configuration.
pub const FLEET_INDEXING_PHYSICAL_ID: &str = "IoTFleetIndexingConfiguration";

/// What a successful handler reports back.
#[derive(Clone, Debug, PartialEq)]
pub struct Handled {
    pub physical_resource_id: String,
    pub data: Map<String, Value>,
}

/// Everything the handlers talk to.
pub struct Services<I, P> {
    pub indexing: I,
    pub parameters: P,
}

pub fn parse_request(payload: Value) -> Result<CustomResourceRequest, Error> {
    serde_json::from_value(payload).context(EventSnafu)
}

async fn fleet_indexing<I: IndexingApi>(
    api: &I,
    request: &CustomResourceRequest,
) -> Result<Handled, Error> {
    let handled = Handled {
        physical_resource_id: FLEET_INDEXING_PHYSICAL_ID.to_owned(),
        data: Map::from_iter([("Status".to_owned(), Value::from("SUCCESS"))]),
    };
    if request.request_type == RequestType::Delete {
        // Indexing is left on, other stacks in the account may rely on it.
        tracing::info!("nothing to do on delete");
        return Ok(handled);
    }
    let names = request
        .list_property("NamedShadowNames")
        .unwrap_or_else(|| DEFAULT_SHADOW_NAMES.map(str::to_owned).to_vec());
    let desired = IndexingConfiguration::desired(&names);
    if let Some(timestamp) = request.property("DeploymentTimestamp") {
        tracing::info!("deployment at {timestamp}");
    }
    let report = indexing::bootstrap(api, &desired)
        .await
        .context(BootstrapSnafu)?;
    tracing::info!(
        "fleet indexing finished after {} passes, converged: {}",
        report.passes,
        report.converged
    );
    Ok(handled)
}

async fn read_parameter<P: ParameterSource>(
    parameters: &P,
    request: &CustomResourceRequest,
) -> Result<Handled, Error> {
    let name = request
        .property("ParameterName")
        .context(MissingPropertySnafu {
            name: "ParameterName",
        })?;
    let region = request
        .property("Region")
        .context(MissingPropertySnafu { name: "Region" })?;
    let physical_resource_id = format!("{name}-{region}");
    if request.request_type == RequestType::Delete {
        return Ok(Handled {
            physical_resource_id,
            data: Map::new(),
        });
    }
    let value = parameters
        .get_parameter(name, region)
        .await
        .context(ReadParameterSnafu {
            name: name.to_owned(),
            region: region.to_owned(),
        })?;
    Ok(Handled {
        physical_resource_id,
        data: Map::from_iter([("Value".to_owned(), Value::from(value))]),
    })
}

/// Runs the handler for the request's resource type.
pub async fn dispatch<I: IndexingApi, P: ParameterSource>(
    services: &Services<I, P>,
    request: &CustomResourceRequest,
) -> Result<Handled, Error> {
    tracing::info!(
        "{:?} {} '{}'",
        request.request_type,
        request.resource_type,
        request.logical_resource_id
    );
    match request.resource_type.as_str() {
        FLEET_INDEXING_RESOURCE_TYPE => fleet_indexing(&services.indexing, request).await,
        PARAMETER_READER_RESOURCE_TYPE => read_parameter(&services.parameters, request).await,
        other => Err(Error::UnsupportedResourceType {
            resource_type: other.to_owned(),
        }),
    }
}

/// Builds the response for `request`. Failures become `FAILED` responses
/// carrying the whole error chain.
pub async fn respond<I: IndexingApi, P: ParameterSource>(
    services: &Services<I, P>,
    request: &CustomResourceRequest,
) -> CustomResourceResponse {
    match dispatch(services, request).await {
        Ok(handled) => {
            CustomResourceResponse::success(request, handled.physical_resource_id, handled.data)
        }
        Err(e) => {
            let reason = crate::error_chain(&e);
            tracing::error!("{reason}");
            CustomResourceResponse::failure(request, reason)
        }
    }
}

/// Builds the response to a raw event, along with the URL it goes to.
///
/// An event that does not parse is still answered `FAILED` when it carries a
/// response URL. Without one there is nobody to answer, so it errs.
pub async fn answer<I: IndexingApi, P: ParameterSource>(
    services: &Services<I, P>,
    payload: Value,
) -> Result<(String, CustomResourceResponse), Error> {
    let envelope = EventEnvelope::read(&payload);
    match parse_request(payload) {
        Ok(request) => {
            let response = respond(services, &request).await;
            Ok((request.response_url, response))
        }
        Err(e) => {
            let Some(url) = envelope.response_url.clone() else {
                return Err(e);
            };
            let reason = crate::error_chain(&e);
            tracing::error!("{reason}");
            Ok((url, envelope.failure(reason)))
        }
    }
}

//! Custom resources of the FleetWatch stacks.
//!
//! A single Lambda function serves every custom resource type declared by
//! the infrastructure:
//!
//! - `Custom::FleetIndexing` runs the [fleet indexing bootstrap](indexing).
//! - `Custom::SsmParameterReader` reads a parameter from another region.
//!
//! CloudFormation waits on the pre-signed response URL of every event, so
//! each event is answered exactly once, with `FAILED` if anything went wrong.
use snafu::prelude::*;

pub mod cfn;
pub mod handler;
pub mod indexing;
pub mod ssm_reader;
#[cfg(test)]
mod test;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("Could not parse the custom resource event"))]
    Event { source: serde_json::Error },

    #[snafu(display("Unsupported custom resource type '{resource_type}'"))]
    UnsupportedResourceType { resource_type: String },

    #[snafu(display("Missing resource property '{name}'"))]
    MissingProperty { name: String },

    #[snafu(display("Fleet indexing bootstrap failed"))]
    Bootstrap { source: indexing::BootstrapError },

    #[snafu(display("Could not read parameter '{name}' in {region}"))]
    ReadParameter {
        name: String,
        region: String,
        source: anyhow::Error,
    },

    #[snafu(display("Could not serialize the response"))]
    SerializeResponse { source: serde_json::Error },

    #[snafu(display("Could not send the response to '{url}'"))]
    Respond { url: String, source: reqwest::Error },
}

/// Renders an error and all of its sources on one line.
pub fn error_chain(err: &dyn std::error::Error) -> String {
    let mut chain = vec![err.to_string()];
    let mut source = err.source();
    while let Some(err) = source {
        chain.push(err.to_string());
        source = err.source();
    }
    chain.join(": ")
}

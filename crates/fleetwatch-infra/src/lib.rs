//! # FleetWatch infrastructure
//!
//! Declares the FleetWatch stacks with [`synth`]:
//!
//! - a WAF stack in `us-east-1` holding the CloudFront web ACL,
//! - the app stack holding identity, the GraphQL API and its resolvers,
//!   the device statistics pipeline, user preferences and the website.
//!
//! Everything starts from a [`config::Config`], resolved once at program
//! entry and passed by reference to every construct. Constructs never look
//! at the environment themselves.
use snafu::prelude::*;

pub mod assets;
pub mod config;
pub mod constructs;
pub mod frontend;
pub mod publish;
pub mod stacks;
#[cfg(test)]
mod test;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("Configuration error: {source}"))]
    Config { source: config::Error },

    #[snafu(display("{source}"))]
    Synth { source: synth::Error },

    #[snafu(display("Only supported region for WAFv2 scope when set to CLOUDFRONT is us-east-1"))]
    UnsupportedRegion { region: String },

    #[snafu(display("An identity pool needs at least one identity provider"))]
    MissingIdentityProvider,

    #[snafu(display("Could not read the GraphQL schema at {path:?}: {source}"))]
    ReadSchema {
        path: std::path::PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("Missing asset '{name}', nothing found at {path:?}"))]
    MissingAsset {
        name: String,
        path: std::path::PathBuf,
    },

    #[snafu(display("Asset '{name}' is not registered"))]
    UnknownAsset { name: String },

    #[snafu(display("Asset '{name}' is already registered"))]
    DuplicateAsset { name: String },

    #[snafu(display("Could not hash asset '{name}': {source}"))]
    HashAsset { name: String, source: anyhow::Error },

    #[snafu(display("Could not package asset '{name}': {source}"))]
    Zip {
        name: String,
        source: zip::result::ZipError,
    },

    #[snafu(display("{msg} {path:?}: {source}"))]
    Io {
        msg: &'static str,
        path: std::path::PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("Could not list files in {path:?}: {source}"))]
    ListFiles {
        path: std::path::PathBuf,
        source: anyhow::Error,
    },

    #[snafu(display("Stack '{stack}' has no output '{name}'"))]
    MissingOutput { name: String, stack: String },

    #[snafu(display("Could not serialize '{name}': {source}"))]
    Serialize {
        name: String,
        source: serde_json::Error,
    },

    #[snafu(display("Could not {action}: {source}"))]
    Aws {
        action: String,
        source: anyhow::Error,
    },
}

impl From<synth::Error> for Error {
    fn from(source: synth::Error) -> Self {
        Error::Synth { source }
    }
}

impl From<config::Error> for Error {
    fn from(source: config::Error) -> Self {
        Error::Config { source }
    }
}

pub type Result<T, E = Error> = core::result::Result<T, E>;

//! The web app's runtime configuration, built from deployed stack outputs.
use std::collections::BTreeMap;

use snafu::prelude::*;

use crate::{
    stacks::{
        OUTPUT_ACCOUNT_ID, OUTPUT_APPSYNC_URL, OUTPUT_IDENTITY_POOL_ID, OUTPUT_REGION,
        OUTPUT_USER_POOL_ID, OUTPUT_WEB_CLIENT_ID,
    },
    MissingOutputSnafu, Result, SerializeSnafu,
};

/// Served next to the web app as `config.json`.
pub const CONFIG_FILE: &str = "config.json";

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrontendConfig {
    pub user_pool_id: String,
    pub user_pool_client_id: String,
    pub identity_pool_id: String,
    #[serde(rename = "appSyncURL")]
    pub app_sync_url: String,
    pub region: String,
    pub account: String,
}

impl FrontendConfig {
    /// Picks the frontend values out of the app stack's outputs.
    pub fn from_outputs(stack: &str, outputs: &BTreeMap<String, String>) -> Result<Self> {
        let get = |name: &str| -> Result<String> {
            outputs.get(name).cloned().context(MissingOutputSnafu {
                name,
                stack,
            })
        };
        Ok(FrontendConfig {
            user_pool_id: get(OUTPUT_USER_POOL_ID)?,
            user_pool_client_id: get(OUTPUT_WEB_CLIENT_ID)?,
            identity_pool_id: get(OUTPUT_IDENTITY_POOL_ID)?,
            app_sync_url: get(OUTPUT_APPSYNC_URL)?,
            region: get(OUTPUT_REGION)?,
            account: get(OUTPUT_ACCOUNT_ID)?,
        })
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context(SerializeSnafu { name: CONFIG_FILE })
    }
}

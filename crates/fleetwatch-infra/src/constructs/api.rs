//! The GraphQL API and the Python layer its resolvers share.
use snafu::prelude::*;
use synth::{
    aws::{
        appsync::{
            AdditionalAuthenticationProvider, AuthenticationType, GraphQlApi, GraphQlSchema,
            LogConfig, UserPoolConfig,
        },
        iam::Role,
        lambda::{LayerVersion, Runtime},
    },
    Stack, Token,
};

use super::ApiOutputs;
use crate::{
    assets::{AssetCatalog, PYTHON_LAYER_ASSET},
    config::Config,
    ReadSchemaSnafu, Result,
};

pub const LOGS_POLICY: &str = "service-role/AWSAppSyncPushToCloudWatchLogs";

pub struct ApiProps<'a> {
    pub user_pool_id: Token,
    pub assets: &'a AssetCatalog,
}

pub fn api(stack: &mut Stack, config: &Config, props: &ApiProps) -> Result<ApiOutputs> {
    let definition = std::fs::read_to_string(&config.schema_path).context(ReadSchemaSnafu {
        path: &config.schema_path,
    })?;

    let logs_role = stack.resource(
        "AppSyncServiceRole",
        Role::assumed_by_service("appsync.amazonaws.com").with_managed_policy(LOGS_POLICY),
    )?;
    let api = stack.resource(
        "DeviceApi",
        GraphQlApi {
            name: format!("{}-things-api", config.stack_name),
            authentication_type: AuthenticationType::UserPool,
            user_pool_config: Some(UserPoolConfig {
                user_pool_id: props.user_pool_id.clone(),
                aws_region: config.region.clone(),
                default_action: "ALLOW".to_owned(),
            }),
            additional_authentication_providers: vec![AdditionalAuthenticationProvider {
                authentication_type: AuthenticationType::Iam,
            }],
            log_config: Some(LogConfig {
                cloud_watch_logs_role_arn: logs_role.output().arn.clone(),
                field_log_level: "ALL".to_owned(),
                exclude_verbose_content: false,
            }),
            xray_enabled: false,
        },
    )?;
    let schema = stack.resource(
        "DeviceApiSchema",
        GraphQlSchema {
            api_id: api.output().api_id.clone(),
            definition,
        },
    )?;
    let layer = stack.resource(
        "PythonSharedLayer",
        LayerVersion {
            description: Some("Shared Python utilities for AppSync resolvers".to_owned()),
            content: props.assets.code(PYTHON_LAYER_ASSET)?,
            compatible_runtimes: vec![Runtime::Python310, Runtime::Python312],
        },
    )?;

    Ok(ApiOutputs {
        api_id: api.output().api_id.clone(),
        arn: api.output().arn.clone(),
        graphql_url: api.output().graphql_url.clone(),
        layer_arn: layer.output().arn.clone(),
        schema,
    })
}

//! The FleetWatch stacks.
use synth::{aws::wafv2::Scope, App, Stack};

use crate::{
    assets::{self, AssetCatalog},
    config::Config,
    constructs::{
        api::{api, ApiProps},
        custom_resources::{
            fleet_indexing, handler, ssm_reader, FleetIndexingProps, HandlerProps, SsmReaderProps,
        },
        device_stats::{device_stats, DeviceStatsProps},
        firewall::{firewall, FirewallProps},
        fleet::{fleet_resolvers, FleetProps},
        identity::identity,
        user_preferences::{user_preferences, UserPreferencesProps},
        website::{website, WebsiteProps},
    },
    Result,
};

pub const OUTPUT_ACCOUNT_ID: &str = "AwsAccountId";
pub const OUTPUT_REGION: &str = "AwsRegion";
pub const OUTPUT_APPSYNC_URL: &str = "AppSyncUrl";
pub const OUTPUT_USER_POOL_ID: &str = "UserPoolId";
pub const OUTPUT_IDENTITY_POOL_ID: &str = "IdentityPoolId";
pub const OUTPUT_WEB_CLIENT_ID: &str = "WebClientId";

/// The CloudFront web ACL. CloudFront scoped ACLs only exist in `us-east-1`.
pub fn waf_stack(config: &Config) -> Result<Stack> {
    let mut stack = Stack::new(&config.waf_stack_name, &config.waf_region, &config.account)
        .with_description("FleetWatch CloudFront web ACL");
    firewall(
        &mut stack,
        &FirewallProps {
            scope: Scope::CloudFront,
            region: config.waf_region.clone(),
            parameter_name: config.waf_parameter_name(),
        },
    )?;
    Ok(stack)
}

/// Everything else, in the app's region.
pub fn app_stack(config: &Config, assets: &AssetCatalog) -> Result<Stack> {
    let mut stack = Stack::new(&config.stack_name, &config.region, &config.account)
        .with_description("FleetWatch IoT fleet monitoring");

    let handler = handler(&mut stack, config, &HandlerProps { assets })?;
    fleet_indexing(&mut stack, config, &FleetIndexingProps { handler: &handler })?;

    let identity = identity(&mut stack, config)?;

    let waf_parameter = config.waf_parameter_name();
    let web_acl_arn = ssm_reader(
        &mut stack,
        &SsmReaderProps {
            handler: &handler,
            id: "WafAclArnReader",
            parameter_name: &waf_parameter,
            region: &config.waf_region,
        },
    )?;

    let api = api(
        &mut stack,
        config,
        &ApiProps {
            user_pool_id: identity.user_pool_id.clone(),
            assets,
        },
    )?;
    let resolvers = fleet_resolvers(
        &mut stack,
        config,
        &FleetProps {
            api: &api,
            assets,
        },
    )?;
    log::debug!("declared {} fleet resolvers", resolvers.len());
    device_stats(
        &mut stack,
        config,
        &DeviceStatsProps {
            api: &api,
            assets,
        },
    )?;
    user_preferences(&mut stack, config, &UserPreferencesProps { api: &api })?;
    website(
        &mut stack,
        config,
        &WebsiteProps {
            web_acl_arn: Some(web_acl_arn),
        },
    )?;

    stack.output(OUTPUT_ACCOUNT_ID, &config.account, None)?;
    stack.output(OUTPUT_REGION, &config.region, None)?;
    stack.output(OUTPUT_APPSYNC_URL, &api.graphql_url, None)?;
    stack.output(OUTPUT_USER_POOL_ID, &identity.user_pool_id, None)?;
    stack.output(OUTPUT_IDENTITY_POOL_ID, &identity.identity_pool_id, None)?;
    stack.output(OUTPUT_WEB_CLIENT_ID, &identity.web_client_id, None)?;
    Ok(stack)
}

/// Builds both stacks from `config` and the assets it points at.
pub fn app(config: &Config) -> Result<App> {
    let assets = assets::catalog(config)?;
    app_with_assets(config, &assets)
}

/// Like [`app`], with an already built asset catalog.
pub fn app_with_assets(config: &Config, assets: &AssetCatalog) -> Result<App> {
    let mut app = App::new();
    app.add_stack(waf_stack(config)?)?;
    app.add_stack(app_stack(config, assets)?)?;
    app.stack_depends_on(&config.stack_name, &config.waf_stack_name)?;
    Ok(app)
}

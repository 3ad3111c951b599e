//! Custom resources served by the `custom-resources` Lambda.
//!
//! A single handler function backs every custom resource type in the app
//! stack. Its ARN is the `ServiceToken` of each custom resource.
use synth::{
    aws::{
        custom::CustomResource,
        iam::{Role, Statement},
        lambda::{Architecture, Function, FunctionOutput, Runtime},
        logs::LogGroup,
    },
    Stack, StackResource, Token,
};

use super::{fleet::SHADOW_NAMES, BASIC_EXECUTION_POLICY};
use crate::{
    assets::{AssetCatalog, CUSTOM_RESOURCE_ASSET},
    config::{Config, WAF_REGION},
    Result,
};

pub const FLEET_INDEXING_RESOURCE_TYPE: &str = "Custom::FleetIndexing";
pub const PARAMETER_READER_RESOURCE_TYPE: &str = "Custom::SsmParameterReader";

pub const HANDLER_TIMEOUT: u32 = 300;
pub const LOG_RETENTION_DAYS: u32 = 7;

pub struct HandlerProps<'a> {
    pub assets: &'a AssetCatalog,
}

#[derive(Clone, Debug)]
pub struct HandlerOutputs {
    pub function: FunctionOutput,
    pub log_group: StackResource<LogGroup>,
}

impl HandlerOutputs {
    pub fn service_token(&self) -> Token {
        self.function.arn.clone()
    }

    /// Custom resources wait for the log group, so the function never
    /// creates it first.
    fn wait_for_logs<T: synth::Resource>(
        &self,
        stack: &mut Stack,
        resource: &StackResource<T>,
    ) -> Result<()> {
        resource.depends_on(stack, &self.log_group)?;
        Ok(())
    }
}

/// Declares the handler function, its role and its log group.
pub fn handler(stack: &mut Stack, config: &Config, props: &HandlerProps) -> Result<HandlerOutputs> {
    let waf_parameter = synth::aws::arn(
        "ssm",
        WAF_REGION,
        &config.account,
        &format!("parameter/{}", config.waf_parameter_name()),
    );
    let role = stack.resource(
        "CustomResourceHandlerRole",
        Role::assumed_by_service("lambda.amazonaws.com")
            .with_managed_policy(BASIC_EXECUTION_POLICY)
            .with_policy(
                "CustomResourceHandlerPolicy",
                [
                    Statement::allow(
                        [
                            "iot:GetIndexingConfiguration",
                            "iot:UpdateIndexingConfiguration",
                            "iot:DescribeIndex",
                        ],
                        ["*"],
                    ),
                    Statement::allow(["ssm:GetParameter"], [waf_parameter]),
                ],
            ),
    )?;
    let function = stack.resource(
        "CustomResourceHandlerFunction",
        Function::new(
            Runtime::ProvidedAl2023,
            "bootstrap",
            props.assets.code(CUSTOM_RESOURCE_ASSET)?,
            role.output().arn.clone(),
        )
        .with_architecture(Architecture::X86_64)
        .with_timeout(HANDLER_TIMEOUT)
        .with_env("RUST_LOG", "info"),
    )?;
    let log_group = stack.resource(
        "CustomResourceHandlerLogGroup",
        LogGroup {
            log_group_name: Some(Token::concat([
                "/aws/lambda/".into(),
                function.output().name.clone(),
            ])),
            retention_in_days: Some(LOG_RETENTION_DAYS),
        },
    )?;
    Ok(HandlerOutputs {
        function: function.output().clone(),
        log_group,
    })
}

pub struct FleetIndexingProps<'a> {
    pub handler: &'a HandlerOutputs,
}

/// Turns on fleet indexing, including the named shadows the app reads.
///
/// The deployment timestamp changes on every synth, so the indexing
/// configuration is reapplied on every deployment.
pub fn fleet_indexing(
    stack: &mut Stack,
    config: &Config,
    props: &FleetIndexingProps,
) -> Result<Token> {
    let shadow_names = SHADOW_NAMES
        .iter()
        .map(|name| Token::from(*name))
        .collect::<Vec<_>>();
    let indexing = stack.resource(
        "FleetIndexing",
        CustomResource::new(FLEET_INDEXING_RESOURCE_TYPE, props.handler.service_token())
            .with_property("DeploymentTimestamp", config.deployment_timestamp.as_str())
            .with_property("NamedShadowNames", shadow_names),
    )?;
    props.handler.wait_for_logs(stack, &indexing)?;
    Ok(indexing.output().reference())
}

pub struct SsmReaderProps<'a> {
    pub handler: &'a HandlerOutputs,
    /// Logical id of the reader.
    pub id: &'a str,
    pub parameter_name: &'a str,
    pub region: &'a str,
}

/// Reads an SSM parameter, possibly from another region. Returns the value.
pub fn ssm_reader(stack: &mut Stack, props: &SsmReaderProps) -> Result<Token> {
    let reader = stack.resource(
        props.id,
        CustomResource::new(PARAMETER_READER_RESOURCE_TYPE, props.handler.service_token())
            .with_property("ParameterName", props.parameter_name)
            .with_property("Region", props.region),
    )?;
    props.handler.wait_for_logs(stack, &reader)?;
    Ok(reader.output().attribute("Value"))
}

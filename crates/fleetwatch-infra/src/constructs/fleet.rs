//! Resolvers answering queries about the device fleet.
//!
//! Each resolver is backed by a Python function reading from AWS IoT. The
//! functions only differ by their code, runtime, limits and permissions, so
//! they are declared from [`FLEET_FUNCTIONS`].
use synth::{
    aws::{iam::Statement, lambda::Runtime},
    Stack,
};

use super::{
    iot_arn, lambda_data_source, python_function, resolver, thing_index_arn, ApiOutputs,
    PythonFunctionProps, RESPONSE_TEMPLATE,
};
use crate::{assets::AssetCatalog, config::Config, Result};

/// Named shadows devices report to, besides the classic shadow.
pub const SHADOW_NAMES: [&str; 3] = ["state", "$package", "schedule"];

/// Retained topics a device publishes below its topic root.
pub const RETAINED_TOPIC_SUFFIXES: [&str; 3] = ["info", "meta", "sensor"];

#[derive(Clone, Copy, Debug)]
pub struct FleetFunction {
    /// Logical id prefix.
    pub id: &'static str,
    /// Directory name below `lambda-functions/python`.
    pub asset: &'static str,
    pub runtime: Runtime,
    pub timeout: Option<u32>,
    pub memory_size: Option<u32>,
    /// `Query` fields resolved by this function.
    pub fields: &'static [&'static str],
    /// What the function is allowed to do, on top of writing logs.
    pub statements: fn(&Config) -> Vec<Statement>,
}

pub const FLEET_FUNCTIONS: [FleetFunction; 11] = [
    FleetFunction {
        id: "ListThings",
        asset: "get_thing_list",
        runtime: Runtime::Python312,
        timeout: Some(30),
        memory_size: Some(128),
        fields: &["listThings"],
        statements: list_things_policy,
    },
    FleetFunction {
        id: "GetThingCount",
        asset: "get_thing_count",
        runtime: Runtime::Python310,
        timeout: None,
        memory_size: None,
        fields: &["getThingCount"],
        statements: thing_count_policy,
    },
    FleetFunction {
        id: "GetThingShadow",
        asset: "get_thing_shadow",
        runtime: Runtime::Python312,
        timeout: None,
        memory_size: None,
        fields: &["getThingShadow"],
        statements: thing_shadow_policy,
    },
    FleetFunction {
        id: "GetRetainedTopic",
        asset: "get_retained_topic",
        runtime: Runtime::Python312,
        timeout: None,
        memory_size: None,
        fields: &["getRetainedTopic"],
        statements: retained_topic_policy,
    },
    FleetFunction {
        id: "GetCloudwatchMetricData",
        asset: "get_cloudwatch_metric_data",
        runtime: Runtime::Python312,
        timeout: None,
        memory_size: None,
        fields: &["getCloudwatchMetricData"],
        statements: metric_data_policy,
    },
    FleetFunction {
        id: "ListJobs",
        asset: "get_job_list",
        runtime: Runtime::Python310,
        timeout: None,
        memory_size: None,
        fields: &["listJobs"],
        statements: job_list_policy,
    },
    FleetFunction {
        id: "GetJobDetails",
        asset: "get_job_details",
        runtime: Runtime::Python310,
        timeout: None,
        memory_size: None,
        fields: &["getJobDetails"],
        statements: job_details_policy,
    },
    FleetFunction {
        id: "ListJobExecutions",
        asset: "get_job_execution_list",
        runtime: Runtime::Python310,
        timeout: None,
        memory_size: None,
        fields: &["listJobExecutionsForJob", "listJobExecutionsForThing"],
        statements: job_execution_list_policy,
    },
    FleetFunction {
        id: "GetDevice",
        asset: "get_device",
        runtime: Runtime::Python312,
        timeout: Some(30),
        memory_size: Some(128),
        fields: &["getDevice"],
        statements: device_policy,
    },
    FleetFunction {
        id: "GetDefenderMetricData",
        asset: "get_defender_metric_data",
        runtime: Runtime::Python310,
        timeout: Some(30),
        memory_size: None,
        fields: &["getDefenderMetricData"],
        statements: defender_metric_data_policy,
    },
    FleetFunction {
        id: "ListThingGroups",
        asset: "get_thing_group_list",
        runtime: Runtime::Python312,
        timeout: Some(30),
        memory_size: None,
        fields: &["listThingGroups"],
        statements: thing_group_list_policy,
    },
];

fn list_things_policy(config: &Config) -> Vec<Statement> {
    vec![Statement::allow(["iot:SearchIndex"], [thing_index_arn(config)])]
}

fn thing_count_policy(config: &Config) -> Vec<Statement> {
    vec![Statement::allow(["iot:GetStatistics"], [thing_index_arn(config)])]
}

fn thing_shadow_policy(config: &Config) -> Vec<Statement> {
    let mut resources = vec![iot_arn(config, "thing/*")];
    resources.extend(
        SHADOW_NAMES
            .iter()
            .map(|name| iot_arn(config, &format!("thing/*/{name}"))),
    );
    vec![Statement::allow(["iot:GetThingShadow"], resources)]
}

fn retained_topic_policy(config: &Config) -> Vec<Statement> {
    let mut resources = RETAINED_TOPIC_SUFFIXES
        .iter()
        .map(|suffix| iot_arn(config, &format!("topic/things/*/topics/{suffix}")))
        .collect::<Vec<_>>();
    resources.push(iot_arn(config, "topic/device/*/state"));
    resources.extend(
        RETAINED_TOPIC_SUFFIXES
            .iter()
            .map(|suffix| iot_arn(config, &format!("topic/device/*/{suffix}"))),
    );
    vec![Statement::allow(["iot:GetRetainedMessage"], resources)]
}

fn metric_data_policy(_: &Config) -> Vec<Statement> {
    vec![Statement::allow(["cloudwatch:GetMetricData"], ["*"])]
}

fn job_list_policy(_: &Config) -> Vec<Statement> {
    vec![Statement::allow(
        [
            "iot:ListJobs",
            "iot:ListThings",
            "iot:ListThingGroups",
            "iot:DescribeJob",
        ],
        ["*"],
    )]
}

fn job_details_policy(config: &Config) -> Vec<Statement> {
    vec![Statement::allow(["iot:DescribeJob"], [iot_arn(config, "job/*")])]
}

fn job_execution_list_policy(_: &Config) -> Vec<Statement> {
    vec![Statement::allow(
        [
            "iot:ListJobExecutionsForJob",
            "iot:ListJobExecutionsForThing",
        ],
        ["*"],
    )]
}

fn device_policy(config: &Config) -> Vec<Statement> {
    vec![
        Statement::allow(
            ["iot:DescribeThing", "iot:ListThingGroupsForThing"],
            [iot_arn(config, "thing/*")],
        ),
        Statement::allow(["iot:SearchIndex"], [thing_index_arn(config)]),
    ]
}

fn defender_metric_data_policy(config: &Config) -> Vec<Statement> {
    vec![Statement::allow(
        ["iot:ListMetricValues"],
        [iot_arn(config, "thing/*")],
    )]
}

fn thing_group_list_policy(config: &Config) -> Vec<Statement> {
    vec![
        Statement::allow(
            [
                "iot:ListThingGroupsForThing",
                "iot:ListThingsInThingGroup",
                "iot:DescribeThingGroup",
            ],
            [iot_arn(config, "thinggroup/*"), iot_arn(config, "thing/*")],
        ),
        Statement::allow(["iot:ListThingGroups"], ["*"]),
        Statement::allow(["iot:SearchIndex"], [thing_index_arn(config)]),
    ]
}

pub struct FleetProps<'a> {
    pub api: &'a ApiOutputs,
    pub assets: &'a AssetCatalog,
}

/// Declares every fleet function, its data source and its resolvers.
///
/// Returns the logical ids of the resolvers.
pub fn fleet_resolvers(
    stack: &mut Stack,
    config: &Config,
    props: &FleetProps,
) -> Result<Vec<String>> {
    let mut resolvers = vec![];
    for fleet_function in FLEET_FUNCTIONS.iter() {
        let function = python_function(
            stack,
            props.assets,
            &PythonFunctionProps {
                id: fleet_function.id,
                asset: fleet_function.asset,
                runtime: fleet_function.runtime,
                timeout: fleet_function.timeout,
                memory_size: fleet_function.memory_size,
                statements: (fleet_function.statements)(config),
                env: vec![],
                layer: Some(props.api.layer_arn.clone()),
            },
        )?;
        let data_source =
            lambda_data_source(stack, props.api, fleet_function.id, &function.function)?;
        for field in fleet_function.fields {
            let resolver = resolver(
                stack,
                props.api,
                "Query",
                field,
                &data_source,
                None,
                RESPONSE_TEMPLATE,
            )?;
            log::debug!("resolving Query.{field} with '{}'", function.function.id());
            resolvers.push(resolver.id().to_owned());
        }
    }
    Ok(resolvers)
}

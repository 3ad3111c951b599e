//! Fleet statistics, sampled every minute.
//!
//! A scheduled monitor function aggregates fleet state into the device stats
//! table. The API writes samples through `createDeviceStats` and reads the
//! latest one through `getLatestDeviceStats`.
use synth::{
    aws::{
        dynamodb::{
            self, AttributeType, GlobalSecondaryIndex, KeySchemaElement, ProjectionType, Table,
            TableOutput,
        },
        events::{Rule, Target},
        iam::Statement,
        lambda::{FunctionOutput, Permission, Runtime},
    },
    DeletionPolicy, Stack, Token,
};

use super::{
    dynamodb_data_source, iot_arn, lambda_data_source, python_function, resolver,
    thing_index_arn, ApiOutputs, PythonFunctionProps, DYNAMODB_RESULT_TEMPLATE, RESPONSE_TEMPLATE,
};
use crate::{assets::AssetCatalog, config::Config, Result};

pub const LATEST_RECORD_INDEX: &str = "LatestRecordIndex";
pub const METRIC_NAMESPACE: &str = "FleetWatch/DeviceStats";
pub const SCHEDULE: &str = "rate(1 minute)";

pub const LATEST_STATS_ASSET: &str = "get_latest_stats";
pub const MONITOR_ASSET: &str = "device_stats_monitor";
pub const FUNCTIONS: [&str; 2] = [LATEST_STATS_ASSET, MONITOR_ASSET];

pub const CREATE_DEVICE_STATS_REQUEST: &str = r#"
#set($input = $util.dynamodb.toMapValues($ctx.args.input))
{
  "version": "2017-02-28",
  "operation": "PutItem",
  "key": {
    "recordTime": $util.dynamodb.toDynamoDBJson($ctx.args.input.recordTime)
  },
  "attributeValues": $util.toJson($input)
}"#;

/// The device stats table: one item per sample, keyed by its time.
pub fn device_stats_table() -> Table {
    Table {
        global_secondary_indexes: vec![GlobalSecondaryIndex {
            index_name: LATEST_RECORD_INDEX.to_owned(),
            key_schema: vec![
                KeySchemaElement::partition_key("status", AttributeType::String),
                KeySchemaElement::sort_key("recordTime", AttributeType::String),
            ],
            projection: ProjectionType::All,
        }],
        time_to_live_attribute: Some("ttl".to_owned()),
        point_in_time_recovery: true,
        ..Table::new(KeySchemaElement::partition_key(
            "recordTime",
            AttributeType::String,
        ))
    }
}

pub struct DeviceStatsProps<'a> {
    pub api: &'a ApiOutputs,
    pub assets: &'a AssetCatalog,
}

#[derive(Clone, Debug)]
pub struct DeviceStatsOutputs {
    pub table: TableOutput,
    pub monitor: FunctionOutput,
    pub schedule_arn: Token,
}

pub fn device_stats(
    stack: &mut Stack,
    config: &Config,
    props: &DeviceStatsProps,
) -> Result<DeviceStatsOutputs> {
    let table = stack.resource("DeviceStatsTable", device_stats_table())?;
    table.deletion_policy(stack, DeletionPolicy::Delete)?;
    let table_arns = [table.output().arn.clone(), table.output().indexes_arn()];

    let data_source = dynamodb_data_source(stack, config, props.api, "DeviceStats", &table)?;
    resolver(
        stack,
        props.api,
        "Mutation",
        "createDeviceStats",
        &data_source,
        Some(CREATE_DEVICE_STATS_REQUEST),
        DYNAMODB_RESULT_TEMPLATE,
    )?;

    let latest = python_function(
        stack,
        props.assets,
        &PythonFunctionProps {
            id: "GetLatestStats",
            asset: LATEST_STATS_ASSET,
            runtime: Runtime::Python312,
            timeout: None,
            memory_size: None,
            statements: vec![Statement::allow(
                dynamodb::READ_ACTIONS,
                table_arns.clone(),
            )],
            env: vec![
                ("DEVICE_STATS_TABLE", table.output().name.clone()),
                ("DEVICE_STATS_INDEX", LATEST_RECORD_INDEX.into()),
            ],
            layer: Some(props.api.layer_arn.clone()),
        },
    )?;
    let latest_source = lambda_data_source(stack, props.api, "GetLatestStats", &latest.function)?;
    resolver(
        stack,
        props.api,
        "Query",
        "getLatestDeviceStats",
        &latest_source,
        None,
        RESPONSE_TEMPLATE,
    )?;

    let monitor = python_function(
        stack,
        props.assets,
        &PythonFunctionProps {
            id: "DeviceStatsMonitor",
            asset: MONITOR_ASSET,
            runtime: Runtime::Python312,
            timeout: Some(300),
            memory_size: Some(1024),
            statements: vec![
                Statement::allow(["cloudwatch:PutMetricData"], ["*"]).with_condition(
                    "StringEquals",
                    "cloudwatch:namespace",
                    METRIC_NAMESPACE,
                ),
                Statement::allow(
                    ["iot:SearchIndex", "iot:ListThingGroupsForThing"],
                    [thing_index_arn(config), iot_arn(config, "thing/*")],
                ),
                Statement::allow(
                    ["appsync:GraphQL"],
                    [Token::concat([props.api.arn.clone(), "/*".into()])],
                ),
                Statement::allow(dynamodb::WRITE_ACTIONS, table_arns),
            ],
            env: vec![
                ("APPSYNC_API_URL", props.api.graphql_url.clone()),
                ("DEVICE_STATS_TABLE", table.output().name.clone()),
            ],
            layer: Some(props.api.layer_arn.clone()),
        },
    )?;
    let monitor_arn = monitor.function.output().arn.clone();
    let schedule = stack.resource(
        "DeviceStatsSchedule",
        Rule::schedule(
            SCHEDULE,
            vec![Target {
                arn: monitor_arn,
                id: "DeviceStatsMonitor".to_owned(),
            }],
        ),
    )?;
    stack.resource(
        "DeviceStatsMonitorEventBridgeInvoke",
        Permission {
            source_arn: Some(schedule.output().arn.clone()),
            ..Permission::invoke(
                monitor.function.output().arn.clone(),
                "events.amazonaws.com",
            )
        },
    )?;

    Ok(DeviceStatsOutputs {
        table: table.output().clone(),
        monitor: monitor.function.output().clone(),
        schedule_arn: schedule.output().arn.clone(),
    })
}

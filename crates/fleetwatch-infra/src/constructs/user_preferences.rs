//! Per-user preferences, keyed by the caller's user name.
use synth::{
    aws::dynamodb::{AttributeType, KeySchemaElement, Table, TableOutput},
    DeletionPolicy, Stack,
};

use super::{dynamodb_data_source, resolver, ApiOutputs, DYNAMODB_RESULT_TEMPLATE};
use crate::{config::Config, Result};

pub const PUT_PREFERENCES_REQUEST: &str = r#"
#set($input = $ctx.args.input)
{
  "version" : "2017-02-28",
  "operation": "PutItem",
  "key": {
    "userID": $util.dynamodb.toDynamoDBJson($context.identity.username)
  },
  "attributeValues": $util.dynamodb.toMapValuesJson($input)
}"#;

pub const GET_PREFERENCES_REQUEST: &str = r#"
{
  "version": "2017-02-28",
  "operation": "GetItem",
  "key": {
    "userID": $util.dynamodb.toDynamoDBJson($context.identity.username)
  },
  "consistentRead": true
}"#;

pub fn user_preferences_table() -> Table {
    Table {
        time_to_live_attribute: Some("ttl".to_owned()),
        point_in_time_recovery: true,
        ..Table::new(KeySchemaElement::partition_key(
            "userID",
            AttributeType::String,
        ))
    }
}

pub struct UserPreferencesProps<'a> {
    pub api: &'a ApiOutputs,
}

pub fn user_preferences(
    stack: &mut Stack,
    config: &Config,
    props: &UserPreferencesProps,
) -> Result<TableOutput> {
    let table = stack.resource("UserPreferencesTable", user_preferences_table())?;
    table.deletion_policy(stack, DeletionPolicy::Delete)?;
    let data_source = dynamodb_data_source(stack, config, props.api, "UserPreferences", &table)?;
    resolver(
        stack,
        props.api,
        "Mutation",
        "putPersistedUserPreferences",
        &data_source,
        Some(PUT_PREFERENCES_REQUEST),
        DYNAMODB_RESULT_TEMPLATE,
    )?;
    resolver(
        stack,
        props.api,
        "Query",
        "getPersistedUserPreferences",
        &data_source,
        Some(GET_PREFERENCES_REQUEST),
        DYNAMODB_RESULT_TEMPLATE,
    )?;
    Ok(table.output().clone())
}

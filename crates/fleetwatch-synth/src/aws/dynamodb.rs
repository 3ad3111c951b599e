//! AWS DynamoDB infrastructure.
use crate::{HasDependencies, Resource, Token};

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, HasDependencies)]
pub enum KeyType {
    #[serde(rename = "HASH")]
    Hash,
    #[serde(rename = "RANGE")]
    Range,
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, HasDependencies)]
pub enum AttributeType {
    #[serde(rename = "B")]
    Binary,
    #[serde(rename = "N")]
    Number,
    #[serde(rename = "S")]
    String,
}

#[derive(Debug, Clone, PartialEq, HasDependencies)]
pub struct KeySchemaElement {
    pub attribute_name: String,
    pub key_type: KeyType,
    pub attribute_type: AttributeType,
}

impl KeySchemaElement {
    pub fn partition_key(name: impl Into<String>, type_is: AttributeType) -> Self {
        KeySchemaElement {
            attribute_name: name.into(),
            key_type: KeyType::Hash,
            attribute_type: type_is,
        }
    }

    pub fn sort_key(name: impl Into<String>, type_is: AttributeType) -> Self {
        KeySchemaElement {
            attribute_name: name.into(),
            key_type: KeyType::Range,
            attribute_type: type_is,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, HasDependencies)]
pub enum BillingMode {
    #[default]
    PayPerRequest,
    Provisioned {
        read_capacity_units: u64,
        write_capacity_units: u64,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize, HasDependencies)]
pub enum ProjectionType {
    #[default]
    #[serde(rename = "ALL")]
    All,
    #[serde(rename = "KEYS_ONLY")]
    KeysOnly,
}

#[derive(Debug, Clone, PartialEq, HasDependencies)]
pub struct GlobalSecondaryIndex {
    pub index_name: String,
    pub key_schema: Vec<KeySchemaElement>,
    pub projection: ProjectionType,
}

/// A DynamoDB table.
///
/// Attribute definitions are derived from the key schemas of the table and
/// its indexes.
#[derive(Debug, Clone, PartialEq, HasDependencies)]
pub struct Table {
    pub table_name: Option<String>,
    pub key_schema: Vec<KeySchemaElement>,
    pub global_secondary_indexes: Vec<GlobalSecondaryIndex>,
    pub billing_mode: BillingMode,
    /// Name of the attribute holding each item's expiry time.
    pub time_to_live_attribute: Option<String>,
    pub point_in_time_recovery: bool,
}

impl Table {
    pub fn new(partition_key: KeySchemaElement) -> Self {
        Table {
            table_name: None,
            key_schema: vec![partition_key],
            global_secondary_indexes: vec![],
            billing_mode: BillingMode::default(),
            time_to_live_attribute: None,
            point_in_time_recovery: false,
        }
    }

    fn attribute_definitions(&self) -> Vec<(String, AttributeType)> {
        let mut definitions: Vec<(String, AttributeType)> = vec![];
        let all_keys = self.key_schema.iter().chain(
            self.global_secondary_indexes
                .iter()
                .flat_map(|index| index.key_schema.iter()),
        );
        for key in all_keys {
            if !definitions.iter().any(|(name, _)| *name == key.attribute_name) {
                definitions.push((key.attribute_name.clone(), key.attribute_type));
            }
        }
        definitions
    }
}

fn key_schema_json(keys: &[KeySchemaElement]) -> serde_json::Value {
    keys.iter()
        .map(|key| {
            serde_json::json!({
                "AttributeName": key.attribute_name,
                "KeyType": key.key_type,
            })
        })
        .collect()
}

impl serde::Serialize for Table {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;

        let mut map = serializer.serialize_map(None)?;
        if let Some(name) = &self.table_name {
            map.serialize_entry("TableName", name)?;
        }
        map.serialize_entry("KeySchema", &key_schema_json(&self.key_schema))?;
        let definitions = self
            .attribute_definitions()
            .into_iter()
            .map(|(name, ty)| {
                serde_json::json!({
                    "AttributeName": name,
                    "AttributeType": ty,
                })
            })
            .collect::<Vec<_>>();
        map.serialize_entry("AttributeDefinitions", &definitions)?;
        match self.billing_mode {
            BillingMode::PayPerRequest => {
                map.serialize_entry("BillingMode", "PAY_PER_REQUEST")?;
            }
            BillingMode::Provisioned {
                read_capacity_units,
                write_capacity_units,
            } => {
                map.serialize_entry("BillingMode", "PROVISIONED")?;
                map.serialize_entry(
                    "ProvisionedThroughput",
                    &serde_json::json!({
                        "ReadCapacityUnits": read_capacity_units,
                        "WriteCapacityUnits": write_capacity_units,
                    }),
                )?;
            }
        }
        if !self.global_secondary_indexes.is_empty() {
            let indexes = self
                .global_secondary_indexes
                .iter()
                .map(|index| {
                    serde_json::json!({
                        "IndexName": index.index_name,
                        "KeySchema": key_schema_json(&index.key_schema),
                        "Projection": { "ProjectionType": index.projection },
                    })
                })
                .collect::<Vec<_>>();
            map.serialize_entry("GlobalSecondaryIndexes", &indexes)?;
        }
        if let Some(attribute) = &self.time_to_live_attribute {
            map.serialize_entry(
                "TimeToLiveSpecification",
                &serde_json::json!({ "AttributeName": attribute, "Enabled": true }),
            )?;
        }
        if self.point_in_time_recovery {
            map.serialize_entry(
                "PointInTimeRecoverySpecification",
                &serde_json::json!({ "PointInTimeRecoveryEnabled": true }),
            )?;
        }
        map.end()
    }
}

#[derive(Clone, Debug)]
pub struct TableOutput {
    pub name: Token,
    pub arn: Token,
}

impl TableOutput {
    /// ARN covering every index of the table.
    pub fn indexes_arn(&self) -> Token {
        Token::concat([self.arn.clone(), "/index/*".into()])
    }
}

impl Resource for Table {
    type Output = TableOutput;

    fn resource_type(&self) -> &str {
        "AWS::DynamoDB::Table"
    }

    fn output(&self, logical_id: &str) -> Self::Output {
        TableOutput {
            name: Token::reference(logical_id),
            arn: Token::attribute(logical_id, "Arn"),
        }
    }
}

/// Actions granting read access to a table and its indexes.
pub const READ_ACTIONS: [&str; 6] = [
    "dynamodb:BatchGetItem",
    "dynamodb:GetItem",
    "dynamodb:Query",
    "dynamodb:Scan",
    "dynamodb:ConditionCheckItem",
    "dynamodb:DescribeTable",
];

/// Actions granting write access to a table.
pub const WRITE_ACTIONS: [&str; 5] = [
    "dynamodb:BatchWriteItem",
    "dynamodb:PutItem",
    "dynamodb:UpdateItem",
    "dynamodb:DeleteItem",
    "dynamodb:DescribeTable",
];
